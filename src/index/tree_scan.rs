use crate::record::RecordId;
use crate::types::Value;

use super::btree::BPlusTree;
use super::NodeId;

/// Cursor yielding every `(key, rid)` pair in ascending key order by walking
/// the leaf chain from the leftmost leaf. Chain exhaustion is the iterator
/// end.
pub struct TreeScan<'t> {
    tree: &'t BPlusTree,
    node: Option<NodeId>,
    pos: usize,
}

impl<'t> TreeScan<'t> {
    pub(super) fn new(tree: &'t BPlusTree) -> Self {
        Self {
            tree,
            node: tree.leftmost_leaf(),
            pos: 0,
        }
    }
}

impl Iterator for TreeScan<'_> {
    type Item = (Value, RecordId);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let node_id = self.node?;
            match self.tree.leaf_entry(node_id, self.pos) {
                Some(entry) => {
                    self.pos += 1;
                    return Some(entry);
                }
                None => {
                    self.node = self.tree.leaf_next(node_id);
                    self.pos = 0;
                }
            }
        }
    }
}
