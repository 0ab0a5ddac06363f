use std::collections::BTreeMap;

use super::naming::{MASTER, SEPARATOR};
use super::types::{BranchEntry, BranchNode};

#[derive(Debug)]
struct NodeBuilder {
    treeish: String,
    description: String,
    children: BTreeMap<String, NodeBuilder>,
}

impl NodeBuilder {
    fn into_node(self) -> BranchNode {
        BranchNode {
            treeish: self.treeish,
            description: self.description,
            children: sorted(self.children),
        }
    }
}

fn sorted(level: BTreeMap<String, NodeBuilder>) -> Vec<BranchNode> {
    let mut nodes: Vec<BranchNode> = level.into_values().map(NodeBuilder::into_node).collect();
    nodes.sort_by(|a, b| {
        a.description
            .cmp(&b.description)
            .then_with(|| a.treeish.cmp(&b.treeish))
    });
    nodes
}

/// Rebuild the `--` hierarchy of every branch except master, scoped to the
/// subtree under `scope` (the whole forest when `scope` is master).
///
/// Segments that are not branches themselves get their own name as the
/// description.
pub fn build_forest(entries: &[BranchEntry], scope: &str) -> Vec<BranchNode> {
    let mut roots: BTreeMap<String, NodeBuilder> = BTreeMap::new();

    for entry in entries.iter().filter(|e| !e.detached && e.name != MASTER) {
        let segments: Vec<&str> = entry.name.split(SEPARATOR).collect();
        let last = segments.len() - 1;
        let mut level = &mut roots;
        for (depth, segment) in segments.iter().enumerate() {
            let node = level
                .entry(segment.to_string())
                .or_insert_with(|| NodeBuilder {
                    treeish: segments[..=depth].join(SEPARATOR),
                    description: segment.to_string(),
                    children: BTreeMap::new(),
                });
            if depth == last {
                node.description = entry.subject.clone();
            }
            level = &mut node.children;
        }
    }

    if scope == MASTER {
        return sorted(roots);
    }

    let mut level = roots;
    for segment in scope.split(SEPARATOR) {
        match level.remove(segment) {
            Some(node) => level = node.children,
            None => return Vec::new(),
        }
    }
    sorted(level)
}
