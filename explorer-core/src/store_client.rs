use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use etcd_client::{Client, DeleteOptions, GetOptions};
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::listing::{ListingNode, MemberInfo, NodeListing};
use crate::SEPARATOR;

/// surface the core consumes from the backing coordination service
#[async_trait]
pub trait StoreClient: Send + Sync + Debug {
    /// Ok(None) means nothing is stored under the prefix, not an error
    async fn get(&self, prefix: &str, recursive: bool) -> Result<Option<NodeListing>>;

    async fn put(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, prefix: &str, recursive: bool) -> Result<()>;

    async fn list_members(&self) -> Result<Vec<MemberInfo>>;
}

/// store client over the etcd v3 API; the flat keyspace is assembled into the
/// nested listing shape, directories synthesized from key structure
pub struct EtcdStoreClient {
    client: Client,
}

impl EtcdStoreClient {
    pub async fn connect(endpoints: &[String]) -> anyhow::Result<Self> {
        let mut client = Client::connect(endpoints, None).await?;
        // probe once so a dead endpoint shows up at connect time
        match client.status().await {
            Ok(status) => debug!("connected, server version {}", status.version()),
            Err(error) => warn!("status probe failed after connect: {}", error),
        }
        Ok(Self { client })
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Debug for EtcdStoreClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EtcdStoreClient").finish_non_exhaustive()
    }
}

#[async_trait]
impl StoreClient for EtcdStoreClient {
    async fn get(&self, prefix: &str, recursive: bool) -> Result<Option<NodeListing>> {
        let mut client = self.client.clone();
        let dir_prefix = ensure_dir(prefix);
        let options = GetOptions::new().with_prefix();
        let resp = client.get(dir_prefix.as_str(), Some(options)).await?;
        if !resp.kvs().is_empty() {
            let mut pairs = Vec::with_capacity(resp.kvs().len());
            for kv in resp.kvs() {
                let key = kv
                    .key_str()
                    .map_err(|error| StoreError::Malformed(error.to_string()))?;
                let value = kv
                    .value_str()
                    .map_err(|error| StoreError::Malformed(error.to_string()))?;
                pairs.push((key.to_string(), value.to_string()));
            }
            let node = assemble_listing(&dir_prefix, pairs, recursive);
            return Ok(Some(NodeListing { node: Some(node) }));
        }
        // no children; the prefix may still name a single leaf
        let bare = prefix.trim_end_matches(SEPARATOR);
        if bare.is_empty() {
            return Ok(None);
        }
        let resp = client.get(bare, None).await?;
        match resp.kvs().first() {
            Some(kv) => {
                let key = kv
                    .key_str()
                    .map_err(|error| StoreError::Malformed(error.to_string()))?;
                let value = kv
                    .value_str()
                    .map_err(|error| StoreError::Malformed(error.to_string()))?;
                Ok(Some(NodeListing {
                    node: Some(ListingNode::leaf(key, value)),
                }))
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let mut client = self.client.clone();
        client
            .put(key, value, None)
            .await
            .map_err(|error| StoreError::Mutation(error.to_string()))?;
        Ok(())
    }

    async fn delete(&self, prefix: &str, recursive: bool) -> Result<()> {
        let mut client = self.client.clone();
        if recursive {
            let options = DeleteOptions::new().with_prefix();
            client
                .delete(ensure_dir(prefix), Some(options))
                .await
                .map_err(|error| StoreError::Mutation(error.to_string()))?;
        }
        // the bare key may hold a value of its own
        let bare = prefix.trim_end_matches(SEPARATOR);
        if !bare.is_empty() {
            client
                .delete(bare, None)
                .await
                .map_err(|error| StoreError::Mutation(error.to_string()))?;
        }
        Ok(())
    }

    async fn list_members(&self) -> Result<Vec<MemberInfo>> {
        let mut client = self.client.clone();
        let resp = client.member_list().await?;
        let members = resp
            .members()
            .iter()
            .map(|member| MemberInfo {
                name: member.name().to_string(),
            })
            .collect();
        Ok(members)
    }
}

fn ensure_dir(prefix: &str) -> String {
    if prefix.ends_with(SEPARATOR) {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, SEPARATOR)
    }
}

#[derive(Debug)]
enum FlatNode {
    Dir(BTreeMap<String, FlatNode>),
    Leaf(String),
}

/// nest a flat range read under its prefix; in one-level mode child
/// directories are emitted as empty stubs
fn assemble_listing(dir_prefix: &str, pairs: Vec<(String, String)>, recursive: bool) -> ListingNode {
    let mut root: BTreeMap<String, FlatNode> = BTreeMap::new();
    for (key, value) in pairs {
        let Some(rest) = key.strip_prefix(dir_prefix) else {
            continue;
        };
        let mut segments = rest.split(SEPARATOR).filter(|s| !s.is_empty());
        let Some(first) = segments.next() else {
            continue;
        };
        let mut current = &mut root;
        let mut segment = first.to_string();
        loop {
            match segments.next() {
                None => {
                    // deeper keys win over a conflicting value at the same path
                    current.entry(segment).or_insert(FlatNode::Leaf(value));
                    break;
                }
                Some(next) => {
                    let entry = current
                        .entry(segment)
                        .or_insert_with(|| FlatNode::Dir(BTreeMap::new()));
                    if matches!(entry, FlatNode::Leaf(_)) {
                        *entry = FlatNode::Dir(BTreeMap::new());
                    }
                    match entry {
                        FlatNode::Dir(map) => current = map,
                        FlatNode::Leaf(_) => break,
                    }
                    segment = next.to_string();
                }
            }
        }
    }
    let bare = dir_prefix.trim_end_matches(SEPARATOR);
    let root_key = if bare.is_empty() { SEPARATOR } else { bare };
    to_listing(root_key.to_string(), root, recursive)
}

fn to_listing(key: String, children: BTreeMap<String, FlatNode>, recursive: bool) -> ListingNode {
    let child_prefix = if key.ends_with(SEPARATOR) {
        key.clone()
    } else {
        format!("{}{}", key, SEPARATOR)
    };
    let nodes = children
        .into_iter()
        .map(|(segment, node)| {
            let child_key = format!("{}{}", child_prefix, segment);
            match node {
                FlatNode::Leaf(value) => ListingNode::leaf(child_key, value),
                FlatNode::Dir(map) => {
                    if recursive {
                        to_listing(child_key, map, true)
                    } else {
                        ListingNode::directory(child_key, Vec::new())
                    }
                }
            }
        })
        .collect();
    ListingNode::directory(key, nodes)
}

#[cfg(test)]
mod tests {
    use crate::store_client::assemble_listing;

    fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_assemble_one_level() {
        let listing = assemble_listing(
            "/a/",
            pairs(&[("/a/b", "1"), ("/a/c/d", "2")]),
            false,
        );
        assert_eq!(listing.key, "/a");
        assert!(listing.dir);
        assert_eq!(listing.nodes.len(), 2);

        let b = &listing.nodes[0];
        assert_eq!(b.key, "/a/b");
        assert!(!b.dir);
        assert_eq!(b.value.as_deref(), Some("1"));

        let c = &listing.nodes[1];
        assert_eq!(c.key, "/a/c");
        assert!(c.dir);
        assert!(c.nodes.is_empty());
    }

    #[test]
    fn test_assemble_recursive() {
        let listing = assemble_listing(
            "/a/",
            pairs(&[("/a/b", "1"), ("/a/c/d", "2")]),
            true,
        );
        let c = &listing.nodes[1];
        assert!(c.dir);
        assert_eq!(c.nodes.len(), 1);
        assert_eq!(c.nodes[0].key, "/a/c/d");
        assert_eq!(c.nodes[0].value.as_deref(), Some("2"));
    }

    #[test]
    fn test_assemble_root_prefix() {
        let listing = assemble_listing("/", pairs(&[("/top", "v")]), true);
        assert_eq!(listing.key, "/");
        assert_eq!(listing.nodes[0].key, "/top");
    }

    #[test]
    fn test_deeper_keys_win_over_conflicting_value() {
        // both a value at /a/b and keys below it can exist in the flat
        // keyspace; the directory shape wins
        let listing = assemble_listing(
            "/a/",
            pairs(&[("/a/b", "1"), ("/a/b/c", "2")]),
            true,
        );
        assert_eq!(listing.nodes.len(), 1);
        let b = &listing.nodes[0];
        assert!(b.dir);
        assert_eq!(b.nodes.len(), 1);
        assert_eq!(b.nodes[0].key, "/a/b/c");
    }
}
