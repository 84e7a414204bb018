use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::HashMap;
use itertools::Itertools;
use parking_lot::RwLock;

use crate::SEPARATOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Directory,
    Leaf,
}

/// one path segment of the store namespace; cheaply cloneable handle, shared
/// between the synchronizer and its consumers
#[derive(Clone)]
pub struct KeyValueTreeNode {
    inner: Arc<Inner>,
}

struct Inner {
    prefix: String,
    kind: NodeKind,
    value: Option<String>,
    children: RwLock<HashMap<String, KeyValueTreeNode>>,
    busy: AtomicBool,
}

impl KeyValueTreeNode {
    pub fn directory(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.ends_with(SEPARATOR) {
            prefix.push_str(SEPARATOR);
        }
        Self::new(prefix, NodeKind::Directory, None)
    }

    pub fn leaf(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key.into(), NodeKind::Leaf, Some(value.into()))
    }

    fn new(prefix: String, kind: NodeKind, value: Option<String>) -> Self {
        let inner = Inner {
            prefix,
            kind,
            value,
            children: RwLock::new(HashMap::default()),
            busy: AtomicBool::new(false),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn kind(&self) -> NodeKind {
        self.inner.kind
    }

    pub fn is_leaf(&self) -> bool {
        self.inner.kind == NodeKind::Leaf
    }

    pub fn value(&self) -> Option<&str> {
        self.inner.value.as_deref()
    }

    /// last path component, used as the display name
    pub fn segment(&self) -> &str {
        self.inner
            .prefix
            .trim_end_matches(SEPARATOR)
            .rsplit(SEPARATOR)
            .next()
            .unwrap_or("")
    }

    /// snapshot sorted by prefix; re-request after each change notification
    pub fn children(&self) -> Vec<KeyValueTreeNode> {
        self.inner
            .children
            .read()
            .values()
            .cloned()
            .sorted_by(|a, b| a.prefix().cmp(b.prefix()))
            .collect()
    }

    pub fn child(&self, segment: &str) -> Option<KeyValueTreeNode> {
        self.inner.children.read().get(segment).cloned()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.read().len()
    }

    /// the store is the sole source of truth: each successful fetch replaces
    /// the children wholesale, nodes absent from the newest listing are gone
    pub(crate) fn replace_children(&self, children: HashMap<String, KeyValueTreeNode>) {
        *self.inner.children.write() = children;
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// a fetch may start only if the false -> true transition succeeds
    pub(crate) fn begin_update(&self) -> bool {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_update(&self) {
        self.inner.busy.store(false, Ordering::Release);
    }
}

impl Debug for KeyValueTreeNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueTreeNode")
            .field("prefix", &self.inner.prefix)
            .field("kind", &self.inner.kind)
            .field("value", &self.inner.value)
            .field("children", &self.child_count())
            .field("busy", &self.is_busy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ahash::HashMap;

    use crate::tree::{KeyValueTreeNode, NodeKind};

    #[test]
    fn test_directory_prefix_is_separator_terminated() {
        let node = KeyValueTreeNode::directory("/config");
        assert_eq!(node.prefix(), "/config/");
        assert_eq!(node.segment(), "config");
        assert_eq!(node.kind(), NodeKind::Directory);

        let root = KeyValueTreeNode::directory("/");
        assert_eq!(root.prefix(), "/");
        assert_eq!(root.segment(), "");
    }

    #[test]
    fn test_busy_transition_is_exclusive() {
        let node = KeyValueTreeNode::directory("/a/");
        assert!(node.begin_update());
        assert!(!node.begin_update());
        assert!(node.is_busy());
        node.end_update();
        assert!(!node.is_busy());
        assert!(node.begin_update());
    }

    #[test]
    fn test_replace_children_drops_stale_entries() {
        let node = KeyValueTreeNode::directory("/a/");
        let mut first = HashMap::default();
        first.insert("old".to_string(), KeyValueTreeNode::leaf("/a/old", "1"));
        node.replace_children(first);
        assert!(node.child("old").is_some());

        let mut second = HashMap::default();
        second.insert("new".to_string(), KeyValueTreeNode::leaf("/a/new", "2"));
        node.replace_children(second);
        assert!(node.child("old").is_none());
        let new = node.child("new").expect("replaced child");
        assert!(new.is_leaf());
        assert_eq!(new.value(), Some("2"));
    }

    #[test]
    fn test_children_sorted_by_prefix() {
        let node = KeyValueTreeNode::directory("/a/");
        let mut children = HashMap::default();
        children.insert("b".to_string(), KeyValueTreeNode::leaf("/a/b", "1"));
        children.insert("sub".to_string(), KeyValueTreeNode::directory("/a/sub/"));
        children.insert("aa".to_string(), KeyValueTreeNode::leaf("/a/aa", "2"));
        node.replace_children(children);
        let segments = node
            .children()
            .iter()
            .map(|c| c.segment().to_string())
            .collect::<Vec<_>>();
        assert_eq!(segments, vec!["aa", "b", "sub"]);
    }
}
