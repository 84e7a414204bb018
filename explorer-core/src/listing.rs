use serde::{Deserialize, Serialize};

/// raw response shape of a get request, prior to parsing into the tree model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeListing {
    pub node: Option<ListingNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingNode {
    pub key: String,
    pub dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<ListingNode>,
}

impl ListingNode {
    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            dir: false,
            value: Some(value.into()),
            nodes: Vec::new(),
        }
    }

    pub fn directory(key: impl Into<String>, nodes: Vec<ListingNode>) -> Self {
        Self {
            key: key.into(),
            dir: true,
            value: None,
            nodes,
        }
    }

    /// a root with neither populated directory nodes nor a value carries
    /// nothing to merge
    pub fn has_payload(&self) -> bool {
        (self.dir && !self.nodes.is_empty()) || self.value.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    pub name: String,
}
