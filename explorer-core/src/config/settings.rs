use std::time::Duration;

use config::Config;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::SEPARATOR;

#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(default)]
pub struct ExplorerSettings {
    /// store endpoints; empty means no host is configured
    #[builder(default)]
    pub endpoints: Vec<String>,
    #[builder(default = SEPARATOR.to_string())]
    pub root_prefix: String,
    /// how long delete_keys waits before reporting completion
    #[builder(default = Duration::from_millis(100))]
    pub delete_settle: Duration,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            root_prefix: SEPARATOR.to_string(),
            delete_settle: Duration::from_millis(100),
        }
    }
}

impl ExplorerSettings {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let settings: Self = config.get("explorer")?;
        Ok(settings)
    }
}
