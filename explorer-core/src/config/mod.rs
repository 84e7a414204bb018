use config::builder::DefaultState;
use config::{File, FileFormat, Source};

use crate::EXPLORER_CONFIG;

pub mod settings;

pub use settings::ExplorerSettings;

/// layers caller sources over the embedded defaults
#[derive(Debug)]
pub struct SettingsBuilder {
    builder: config::ConfigBuilder<DefaultState>,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        let builder =
            config::Config::builder().add_source(File::from_str(EXPLORER_CONFIG, FileFormat::Toml));
        Self { builder }
    }
}

impl SettingsBuilder {
    pub fn add_source<T>(self, source: T) -> Self
    where
        T: Source + Send + Sync + 'static,
    {
        Self {
            builder: self.builder.add_source(source),
        }
    }

    pub fn build(self) -> anyhow::Result<ExplorerSettings> {
        let config = self.builder.build()?;
        ExplorerSettings::new(&config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use config::{File, FileFormat};

    use crate::config::SettingsBuilder;

    #[test]
    fn test_embedded_defaults() -> anyhow::Result<()> {
        let settings = SettingsBuilder::default().build()?;
        assert!(settings.endpoints.is_empty());
        assert_eq!(settings.root_prefix, "/");
        assert_eq!(settings.delete_settle, Duration::from_millis(100));
        Ok(())
    }

    #[test]
    fn test_caller_source_overrides_defaults() -> anyhow::Result<()> {
        let overrides = r#"
            [explorer]
            endpoints = ["http://127.0.0.1:2379"]
            root_prefix = "/apps/"
        "#;
        let settings = SettingsBuilder::default()
            .add_source(File::from_str(overrides, FileFormat::Toml))
            .build()?;
        assert_eq!(settings.endpoints, vec!["http://127.0.0.1:2379".to_string()]);
        assert_eq!(settings.root_prefix, "/apps/");
        assert_eq!(settings.delete_settle, Duration::from_millis(100));
        Ok(())
    }

    #[test]
    fn test_settings_roundtrip() -> anyhow::Result<()> {
        let settings = SettingsBuilder::default().build()?;
        let rendered = toml::to_string(&settings)?;
        assert!(rendered.contains("root_prefix"));
        Ok(())
    }
}
