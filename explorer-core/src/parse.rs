use ahash::HashMap;

use crate::listing::ListingNode;
use crate::tree::KeyValueTreeNode;
use crate::SEPARATOR;

/// scratch tree a listing is linearized into before real nodes are built
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ParsedNode {
    Directory(HashMap<String, ParsedNode>),
    Leaf(String),
}

impl ParsedNode {
    fn dir() -> Self {
        ParsedNode::Directory(HashMap::default())
    }
}

struct WorkItem<'a> {
    node: &'a ListingNode,
    prefix: String,
    path: Vec<String>,
}

/// linearize a nested listing into segment-keyed containers with an explicit
/// work stack; recursive and one-level fetches share this single code path
///
/// returns None when the root carries nothing to merge
pub(crate) fn parse_listing(
    root: &ListingNode,
    prefix: &str,
    recursive: bool,
    strip_prefix: bool,
) -> Option<HashMap<String, ParsedNode>> {
    if !root.has_payload() {
        return None;
    }
    let mut result: HashMap<String, ParsedNode> = HashMap::default();
    let mut base = Vec::new();
    if !strip_prefix {
        // root the result at the true top so multiple prefixes can be merged
        // into one combined view
        for segment in prefix.split(SEPARATOR).filter(|s| !s.is_empty()) {
            insert(&mut result, &base, segment.to_string(), ParsedNode::dir());
            base.push(segment.to_string());
        }
    }
    let mut work = vec![WorkItem {
        node: root,
        prefix: prefix.to_string(),
        path: base,
    }];
    while let Some(WorkItem { node, prefix, path }) = work.pop() {
        if !node.dir {
            let segment = node.key.rsplit(SEPARATOR).next().unwrap_or_default();
            if segment.is_empty() {
                continue;
            }
            let value = node.value.clone().unwrap_or_default();
            insert(&mut result, &path, segment.to_string(), ParsedNode::Leaf(value));
        } else {
            for child in &node.nodes {
                let segment = remove_prefix(&child.key, &prefix);
                if segment.is_empty() {
                    continue;
                }
                if child.dir {
                    insert(&mut result, &path, segment.clone(), ParsedNode::dir());
                    if recursive {
                        let mut child_path = path.clone();
                        child_path.push(segment);
                        work.push(WorkItem {
                            node: child,
                            prefix: format!("{}{}", child.key, SEPARATOR),
                            path: child_path,
                        });
                    }
                } else {
                    let value = child.value.clone().unwrap_or_default();
                    insert(&mut result, &path, segment, ParsedNode::Leaf(value));
                }
            }
        }
    }
    Some(result)
}

/// exact substring removal, not separator splitting: after a one-level fetch
/// the remainder may span several levels and is used as one opaque key
fn remove_prefix(key: &str, prefix: &str) -> String {
    key.strip_prefix(prefix).unwrap_or(key).to_string()
}

fn insert(root: &mut HashMap<String, ParsedNode>, path: &[String], segment: String, node: ParsedNode) {
    let mut current = root;
    for step in path {
        let entry = current
            .entry(step.clone())
            .or_insert_with(ParsedNode::dir);
        match entry {
            ParsedNode::Directory(map) => current = map,
            // a leaf on the walk means the listing contradicted itself
            ParsedNode::Leaf(_) => return,
        }
    }
    match node {
        // keep an already-populated container over a fresh empty one
        ParsedNode::Directory(ref map) if map.is_empty() => {
            current.entry(segment).or_insert(node);
        }
        _ => {
            current.insert(segment, node);
        }
    }
}

/// one-shot conversion of the scratch tree into children of the fetched node
pub(crate) fn into_children(
    parent_prefix: &str,
    parsed: HashMap<String, ParsedNode>,
) -> HashMap<String, KeyValueTreeNode> {
    let mut children = HashMap::default();
    for (segment, node) in parsed {
        match node {
            ParsedNode::Leaf(value) => {
                let key = join(parent_prefix, &segment);
                children.insert(segment, KeyValueTreeNode::leaf(key, value));
            }
            ParsedNode::Directory(map) => {
                let prefix = format!("{}{}", join(parent_prefix, &segment), SEPARATOR);
                let child = KeyValueTreeNode::directory(prefix.clone());
                child.replace_children(into_children(&prefix, map));
                children.insert(segment, child);
            }
        }
    }
    children
}

fn join(parent: &str, segment: &str) -> String {
    if parent.ends_with(SEPARATOR) {
        format!("{}{}", parent, segment)
    } else {
        format!("{}{}{}", parent, SEPARATOR, segment)
    }
}
