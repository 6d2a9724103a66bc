use crate::buffer_pool::{ArcBufferPool, BufferPool, Strategy};
use crate::disk_manager::DiskManager;
use crate::errors::Error;
use crate::pages::PageId;
use crate::record::RecordId;
use crate::types::{DataType, Value};
use anyhow::{bail, ensure, Result};

use super::tree_scan::TreeScan;
use super::{Key, NodeId};

const HEADER_PAGE: PageId = 0;

/// Cap on the branching factor so nodes stay pageable when a future revision
/// spills them to the index file.
pub const MAX_FANOUT: usize = 256;

#[derive(Debug)]
enum NodeKind {
    Leaf {
        rids: Vec<RecordId>,
        next: Option<NodeId>,
    },
    Internal {
        children: Vec<NodeId>,
    },
}

#[derive(Debug)]
struct Node {
    keys: Vec<Key>,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    fn children(&self) -> &Vec<NodeId> {
        match &self.kind {
            NodeKind::Internal { children } => children,
            NodeKind::Leaf { .. } => unreachable!("leaves have no children"),
        }
    }

    fn children_mut(&mut self) -> &mut Vec<NodeId> {
        match &mut self.kind {
            NodeKind::Internal { children } => children,
            NodeKind::Leaf { .. } => unreachable!("leaves have no children"),
        }
    }

    fn rids_mut(&mut self) -> &mut Vec<RecordId> {
        match &mut self.kind {
            NodeKind::Leaf { rids, .. } => rids,
            NodeKind::Internal { .. } => unreachable!("internal nodes hold no rids"),
        }
    }
}

/// B+ tree keyed by a typed value, mapping each key to a record id. Nodes
/// live in an arena indexed by [`NodeId`]; the index file only persists the
/// `(key_type, fanout)` header, kept behind a small buffer pool.
#[derive(Debug)]
pub struct BPlusTree {
    name: String,
    bpm: ArcBufferPool,
    key_type: DataType,
    fanout: usize,
    nodes: Vec<Option<Node>>,
    free_nodes: Vec<NodeId>,
    root: Option<NodeId>,
    num_entries: usize,
}

impl BPlusTree {
    pub fn create(name: &str, key_type: DataType, fanout: usize) -> Result<Self> {
        ensure!(
            (3..=MAX_FANOUT).contains(&fanout),
            Error::FanoutTooLarge(fanout)
        );

        DiskManager::create(name)?;
        let bpm = BufferPool::shared(name, 1, Strategy::Lru)?;

        let mut pool = bpm.lock();
        let frame = pool.pin(HEADER_PAGE)?;
        frame
            .page_mut()
            .write_bytes(0, 4, &key_type.code().to_le_bytes());
        frame
            .page_mut()
            .write_bytes(4, 8, &(fanout as i32).to_le_bytes());
        pool.mark_dirty(&HEADER_PAGE)?;
        pool.unpin(&HEADER_PAGE)?;
        pool.force_page(&HEADER_PAGE)?;
        drop(pool);

        Ok(Self {
            name: name.to_string(),
            bpm,
            key_type,
            fanout,
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            root: None,
            num_entries: 0,
        })
    }

    /// Reads the header back; the node graph starts out empty, nodes are not
    /// persisted in this revision.
    pub fn open(name: &str) -> Result<Self> {
        let bpm = BufferPool::shared(name, 1, Strategy::Lru)?;

        let mut pool = bpm.lock();
        let frame = pool.pin(HEADER_PAGE)?;
        let code = i32::from_le_bytes(frame.page().read_bytes(0, 4).try_into().unwrap());
        let fanout = i32::from_le_bytes(frame.page().read_bytes(4, 8).try_into().unwrap()) as usize;
        pool.unpin(&HEADER_PAGE)?;
        drop(pool);

        let key_type = DataType::from_code(code)?;
        ensure!(
            (3..=MAX_FANOUT).contains(&fanout),
            Error::FanoutTooLarge(fanout)
        );

        Ok(Self {
            name: name.to_string(),
            bpm,
            key_type,
            fanout,
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            root: None,
            num_entries: 0,
        })
    }

    pub fn close(self) -> Result<()> {
        self.bpm.lock().shutdown()
    }

    pub fn destroy(name: &str) -> Result<()> {
        DiskManager::destroy(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_type(&self) -> DataType {
        self.key_type
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    /// Live nodes in the arena.
    pub fn num_nodes(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    /// `(key, rid)` pairs inserted minus deleted.
    pub fn num_entries(&self) -> usize {
        self.num_entries
    }

    pub fn find(&self, key: &Value) -> Result<RecordId> {
        self.check_key_type(key)?;
        let Some(root) = self.root else {
            bail!(Error::KeyNotFound);
        };

        let key = Key::new(key.clone());
        let leaf_id = self.find_leaf(root, &key);
        let node = self.node(leaf_id);

        match node.keys.iter().position(|k| k == &key) {
            Some(pos) => {
                let NodeKind::Leaf { rids, .. } = &node.kind else {
                    unreachable!("find_leaf returns a leaf")
                };
                Ok(rids[pos])
            }
            None => bail!(Error::KeyNotFound),
        }
    }

    /// Inserts beside existing equal keys; uniqueness is not enforced.
    pub fn insert(&mut self, key: Value, rid: RecordId) -> Result<()> {
        self.check_key_type(&key)?;
        let key = Key::new(key);

        match self.root {
            None => {
                let leaf = self.alloc(Node {
                    keys: vec![key],
                    parent: None,
                    kind: NodeKind::Leaf {
                        rids: vec![rid],
                        next: None,
                    },
                });
                self.root = Some(leaf);
            }
            Some(root) => {
                let leaf_id = self.find_leaf(root, &key);
                self.insert_into_leaf(leaf_id, key, rid);
            }
        }

        self.num_entries += 1;
        Ok(())
    }

    pub fn delete(&mut self, key: &Value) -> Result<()> {
        self.check_key_type(key)?;
        let Some(root) = self.root else {
            bail!(Error::KeyNotFound);
        };

        let key = Key::new(key.clone());
        let leaf_id = self.find_leaf(root, &key);

        let node = self.node_mut(leaf_id);
        let Some(pos) = node.keys.iter().position(|k| k == &key) else {
            bail!(Error::KeyNotFound);
        };
        let Node { keys, kind, .. } = node;
        let NodeKind::Leaf { rids, .. } = kind else {
            unreachable!("find_leaf returns a leaf")
        };
        keys.remove(pos);
        rids.remove(pos);

        self.num_entries -= 1;

        if Some(leaf_id) == self.root {
            if self.node(leaf_id).keys.is_empty() {
                self.free(leaf_id);
                self.root = None;
            }
            return Ok(());
        }

        if self.node(leaf_id).keys.len() >= self.min_keys() {
            if pos == 0 {
                self.update_separator(leaf_id);
            }
            return Ok(());
        }

        self.rebalance_leaf(leaf_id);
        Ok(())
    }

    /// Cursor over every `(key, rid)` pair in ascending key order.
    pub fn scan(&self) -> TreeScan<'_> {
        TreeScan::new(self)
    }

    fn check_key_type(&self, key: &Value) -> Result<()> {
        ensure!(
            key.dtype() == self.key_type,
            Error::KeyTypeMismatch(self.key_type.to_string(), key.dtype().to_string())
        );
        Ok(())
    }

    /// Minimum keys of a non-root node: `ceil(fanout / 2) - 1`.
    fn min_keys(&self) -> usize {
        self.fanout.div_ceil(2) - 1
    }

    fn node(&self, node_id: NodeId) -> &Node {
        self.nodes[node_id].as_ref().unwrap()
    }

    fn node_mut(&mut self, node_id: NodeId) -> &mut Node {
        self.nodes[node_id].as_mut().unwrap()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        match self.free_nodes.pop() {
            Some(node_id) => {
                self.nodes[node_id] = Some(node);
                node_id
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn free(&mut self, node_id: NodeId) {
        self.nodes[node_id] = None;
        self.free_nodes.push(node_id);
    }

    /// Descends to the leaf that owns `key`; equal keys sit right of their
    /// separator.
    fn find_leaf(&self, mut node_id: NodeId, key: &Key) -> NodeId {
        loop {
            let node = self.node(node_id);
            match &node.kind {
                NodeKind::Leaf { .. } => return node_id,
                NodeKind::Internal { children } => {
                    let idx = node.keys.partition_point(|k| k <= key);
                    node_id = children[idx];
                }
            }
        }
    }

    fn child_index(&self, parent_id: NodeId, child_id: NodeId) -> usize {
        self.node(parent_id)
            .children()
            .iter()
            .position(|c| *c == child_id)
            .expect("child is linked to its parent")
    }

    /// The position of the leftmost leaf whose first key changed may serve as
    /// a separator somewhere up the tree; refresh it.
    fn update_separator(&mut self, node_id: NodeId) {
        let Some(first_key) = self.node(node_id).keys.first().cloned() else {
            return;
        };

        let mut child = node_id;
        while let Some(parent_id) = self.node(child).parent {
            let idx = self.child_index(parent_id, child);
            if idx > 0 {
                self.node_mut(parent_id).keys[idx - 1] = first_key;
                return;
            }
            child = parent_id;
        }
    }

    fn insert_into_leaf(&mut self, leaf_id: NodeId, key: Key, rid: RecordId) {
        let max_keys = self.fanout - 1;
        let split_at = self.fanout.div_ceil(2);

        let node = self.node_mut(leaf_id);
        let parent = node.parent;
        let pos = node.keys.partition_point(|k| *k <= key);
        let Node { keys, kind, .. } = node;
        let NodeKind::Leaf { rids, next } = kind else {
            unreachable!("insert lands on a leaf")
        };

        keys.insert(pos, key);
        rids.insert(pos, rid);

        if keys.len() <= max_keys {
            return;
        }

        // overflow: `fanout` entries, split at ceil(fanout / 2); the right
        // node's first key separates the halves
        let right_keys = keys.split_off(split_at);
        let right_rids = rids.split_off(split_at);
        let right_next = next.take();
        let sep = right_keys[0].clone();

        let right_id = self.alloc(Node {
            keys: right_keys,
            parent,
            kind: NodeKind::Leaf {
                rids: right_rids,
                next: right_next,
            },
        });

        // link the new right half into the leaf chain
        if let NodeKind::Leaf { next, .. } = &mut self.node_mut(leaf_id).kind {
            *next = Some(right_id);
        }

        self.insert_parent(leaf_id, right_id, sep);
    }

    /// Registers `right_id` (and its separator) beside `left_id` in their
    /// parent, growing a new root or splitting the parent as needed. An
    /// internal split moves the middle key up instead of keeping it.
    fn insert_parent(&mut self, left_id: NodeId, right_id: NodeId, sep: Key) {
        let Some(parent_id) = self.node(left_id).parent else {
            let root_id = self.alloc(Node {
                keys: vec![sep],
                parent: None,
                kind: NodeKind::Internal {
                    children: vec![left_id, right_id],
                },
            });
            self.node_mut(left_id).parent = Some(root_id);
            self.node_mut(right_id).parent = Some(root_id);
            self.root = Some(root_id);
            return;
        };

        self.node_mut(right_id).parent = Some(parent_id);

        let idx = self.child_index(parent_id, left_id);
        let max_keys = self.fanout - 1;
        let split_at = self.fanout.div_ceil(2);

        let node = self.node_mut(parent_id);
        let Node { keys, kind, .. } = node;
        let NodeKind::Internal { children } = kind else {
            unreachable!("parents are internal")
        };

        keys.insert(idx, sep);
        children.insert(idx + 1, right_id);

        if keys.len() <= max_keys {
            return;
        }

        let promoted = keys[split_at - 1].clone();
        let right_keys = keys.split_off(split_at);
        keys.pop(); // the promoted key belongs to neither half
        let right_children = children.split_off(split_at);

        let new_right_id = self.alloc(Node {
            keys: right_keys,
            parent: None,
            kind: NodeKind::Internal {
                children: right_children.clone(),
            },
        });
        for child in right_children {
            self.node_mut(child).parent = Some(new_right_id);
        }

        self.insert_parent(parent_id, new_right_id, promoted);
    }

    /// Restores the occupancy of an underfull leaf: borrow from the left
    /// sibling, then the right, then merge with a neighbour.
    fn rebalance_leaf(&mut self, leaf_id: NodeId) {
        let parent_id = self.node(leaf_id).parent.expect("root is handled by delete");
        let idx = self.child_index(parent_id, leaf_id);
        let min = self.min_keys();
        let sibling_count = self.node(parent_id).children().len();

        if idx > 0 {
            let left_id = self.node(parent_id).children()[idx - 1];
            if self.node(left_id).keys.len() > min {
                let (key, rid) = {
                    let left = self.node_mut(left_id);
                    let key = left.keys.pop().unwrap();
                    let rid = left.rids_mut().pop().unwrap();
                    (key, rid)
                };
                let leaf = self.node_mut(leaf_id);
                leaf.keys.insert(0, key);
                leaf.rids_mut().insert(0, rid);
                self.update_separator(leaf_id);
                return;
            }
        }

        if idx + 1 < sibling_count {
            let right_id = self.node(parent_id).children()[idx + 1];
            if self.node(right_id).keys.len() > min {
                let (key, rid) = {
                    let right = self.node_mut(right_id);
                    (right.keys.remove(0), right.rids_mut().remove(0))
                };
                let leaf = self.node_mut(leaf_id);
                leaf.keys.push(key);
                leaf.rids_mut().push(rid);
                self.update_separator(leaf_id);
                self.update_separator(right_id);
                return;
            }
        }

        if idx > 0 {
            let left_id = self.node(parent_id).children()[idx - 1];
            self.merge_leaves(left_id, leaf_id, parent_id, idx);
        } else {
            let right_id = self.node(parent_id).children()[idx + 1];
            self.merge_leaves(leaf_id, right_id, parent_id, idx + 1);
            self.update_separator(leaf_id);
        }
    }

    /// Folds leaf `b` (the right neighbour, at `b_index` in the parent) into
    /// leaf `a` and drops their separator.
    fn merge_leaves(&mut self, a_id: NodeId, b_id: NodeId, parent_id: NodeId, b_index: usize) {
        let b = self.nodes[b_id].take().expect("merging a live node");
        self.free_nodes.push(b_id);
        let NodeKind::Leaf {
            rids: b_rids,
            next: b_next,
        } = b.kind
        else {
            unreachable!("leaf merge")
        };

        let a = self.node_mut(a_id);
        a.keys.extend(b.keys);
        let NodeKind::Leaf { rids, next } = &mut a.kind else {
            unreachable!("leaf merge")
        };
        rids.extend(b_rids);
        *next = b_next;

        let parent = self.node_mut(parent_id);
        parent.keys.remove(b_index - 1);
        parent.children_mut().remove(b_index);

        self.rebalance_internal(parent_id);
    }

    /// Restores the occupancy of an underfull internal node; separators
    /// rotate through the parent on a borrow and come down on a merge.
    fn rebalance_internal(&mut self, node_id: NodeId) {
        if Some(node_id) == self.root {
            if self.node(node_id).keys.is_empty() {
                // an empty internal root hands the tree to its only child
                let child = self.node(node_id).children()[0];
                self.node_mut(child).parent = None;
                self.free(node_id);
                self.root = Some(child);
            }
            return;
        }

        if self.node(node_id).keys.len() >= self.min_keys() {
            return;
        }

        let parent_id = self.node(node_id).parent.expect("non-root node");
        let idx = self.child_index(parent_id, node_id);
        let min = self.min_keys();
        let sibling_count = self.node(parent_id).children().len();

        if idx > 0 {
            let left_id = self.node(parent_id).children()[idx - 1];
            if self.node(left_id).keys.len() > min {
                let sep = self.node(parent_id).keys[idx - 1].clone();
                let (up_key, moved_child) = {
                    let left = self.node_mut(left_id);
                    (left.keys.pop().unwrap(), left.children_mut().pop().unwrap())
                };
                let node = self.node_mut(node_id);
                node.keys.insert(0, sep);
                node.children_mut().insert(0, moved_child);
                self.node_mut(moved_child).parent = Some(node_id);
                self.node_mut(parent_id).keys[idx - 1] = up_key;
                return;
            }
        }

        if idx + 1 < sibling_count {
            let right_id = self.node(parent_id).children()[idx + 1];
            if self.node(right_id).keys.len() > min {
                let sep = self.node(parent_id).keys[idx].clone();
                let (up_key, moved_child) = {
                    let right = self.node_mut(right_id);
                    (right.keys.remove(0), right.children_mut().remove(0))
                };
                let node = self.node_mut(node_id);
                node.keys.push(sep);
                node.children_mut().push(moved_child);
                self.node_mut(moved_child).parent = Some(node_id);
                self.node_mut(parent_id).keys[idx] = up_key;
                return;
            }
        }

        if idx > 0 {
            let left_id = self.node(parent_id).children()[idx - 1];
            self.merge_internal(left_id, node_id, parent_id, idx);
        } else {
            let right_id = self.node(parent_id).children()[idx + 1];
            self.merge_internal(node_id, right_id, parent_id, idx + 1);
        }
    }

    /// Folds internal node `b` into `a`, pulling their separator down
    /// between the two key runs.
    fn merge_internal(&mut self, a_id: NodeId, b_id: NodeId, parent_id: NodeId, b_index: usize) {
        let sep = self.node(parent_id).keys[b_index - 1].clone();

        let b = self.nodes[b_id].take().expect("merging a live node");
        self.free_nodes.push(b_id);
        let NodeKind::Internal {
            children: b_children,
        } = b.kind
        else {
            unreachable!("internal merge")
        };

        let a = self.node_mut(a_id);
        a.keys.push(sep);
        a.keys.extend(b.keys);
        a.children_mut().extend(b_children.iter().copied());

        for child in b_children {
            self.node_mut(child).parent = Some(a_id);
        }

        let parent = self.node_mut(parent_id);
        parent.keys.remove(b_index - 1);
        parent.children_mut().remove(b_index);

        self.rebalance_internal(parent_id);
    }

    pub(super) fn leftmost_leaf(&self) -> Option<NodeId> {
        let mut node_id = self.root?;
        loop {
            match &self.node(node_id).kind {
                NodeKind::Leaf { .. } => return Some(node_id),
                NodeKind::Internal { children } => node_id = children[0],
            }
        }
    }

    pub(super) fn leaf_entry(&self, node_id: NodeId, pos: usize) -> Option<(Value, RecordId)> {
        let node = self.node(node_id);
        let NodeKind::Leaf { rids, .. } = &node.kind else {
            unreachable!("the scan walks the leaf chain")
        };
        let key = node.keys.get(pos)?;
        Some((key.value().clone(), rids[pos]))
    }

    pub(super) fn leaf_next(&self, node_id: NodeId) -> Option<NodeId> {
        match &self.node(node_id).kind {
            NodeKind::Leaf { next, .. } => *next,
            NodeKind::Internal { .. } => unreachable!("the scan walks the leaf chain"),
        }
    }
}

#[cfg(test)]
impl BPlusTree {
    fn root_keys(&self) -> Vec<Value> {
        match self.root {
            Some(root) => self
                .node(root)
                .keys
                .iter()
                .map(|k| k.value().clone())
                .collect(),
            None => Vec::new(),
        }
    }

    fn leaf_keys(&self) -> Vec<Vec<Value>> {
        let mut leaves = Vec::new();
        let mut node = self.leftmost_leaf();
        while let Some(node_id) = node {
            leaves.push(
                self.node(node_id)
                    .keys
                    .iter()
                    .map(|k| k.value().clone())
                    .collect(),
            );
            node = self.leaf_next(node_id);
        }
        leaves
    }

    fn check_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.num_entries, 0);
            return;
        };
        assert!(self.node(root).parent.is_none());
        self.check_node(root, root);

        // the leaf chain is sorted and covers every entry
        let chain: Vec<_> = self.scan().map(|(key, _)| Key::new(key)).collect();
        assert_eq!(chain.len(), self.num_entries);
        for pair in chain.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    fn check_node(&self, node_id: NodeId, root: NodeId) {
        let node = self.node(node_id);

        for pair in node.keys.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert!(node.keys.len() <= self.fanout - 1);
        if node_id != root {
            assert!(node.keys.len() >= self.min_keys());
        }

        match &node.kind {
            NodeKind::Leaf { rids, .. } => assert_eq!(rids.len(), node.keys.len()),
            NodeKind::Internal { children } => {
                assert_eq!(children.len(), node.keys.len() + 1);
                for (i, child) in children.iter().enumerate() {
                    assert_eq!(self.node(*child).parent, Some(node_id));
                    let (lo, hi) = self.subtree_bounds(*child);
                    if i > 0 {
                        assert!(lo >= node.keys[i - 1]);
                    }
                    if i < node.keys.len() {
                        assert!(hi <= node.keys[i]);
                    }
                    self.check_node(*child, root);
                }
            }
        }
    }

    fn subtree_bounds(&self, node_id: NodeId) -> (Key, Key) {
        let node = self.node(node_id);
        match &node.kind {
            NodeKind::Leaf { .. } => (
                node.keys.first().unwrap().clone(),
                node.keys.last().unwrap().clone(),
            ),
            NodeKind::Internal { children } => {
                let (lo, _) = self.subtree_bounds(children[0]);
                let (_, hi) = self.subtree_bounds(*children.last().unwrap());
                (lo, hi)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_manager::test_path;
    use anyhow::Result;
    use rand::seq::SliceRandom;
    use rand::thread_rng;

    fn test_tree(fanout: usize) -> Result<(BPlusTree, String)> {
        let path = test_path();
        let tree = BPlusTree::create(&path, DataType::Int, fanout)?;
        Ok((tree, path))
    }

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().map(|v| Value::Int(*v)).collect()
    }

    fn close_and_destroy(tree: BPlusTree, path: &str) -> Result<()> {
        tree.close()?;
        BPlusTree::destroy(path)
    }

    #[test]
    fn test_insert_and_find_single_key() -> Result<()> {
        let (mut tree, path) = test_tree(4)?;

        tree.insert(Value::Int(42), (1, 0))?;
        assert_eq!(tree.find(&Value::Int(42))?, (1, 0));
        assert_eq!(tree.num_entries(), 1);
        assert_eq!(tree.num_nodes(), 1);

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_find_missing_key() -> Result<()> {
        let (mut tree, path) = test_tree(4)?;

        let err = tree.find(&Value::Int(9)).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::KeyNotFound)));

        tree.insert(Value::Int(1), (1, 0))?;
        let err = tree.find(&Value::Int(9)).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::KeyNotFound)));

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_key_type_is_enforced() -> Result<()> {
        let (mut tree, path) = test_tree(4)?;

        let err = tree.insert(Value::Str("a".into()), (1, 0)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::KeyTypeMismatch(_, _))
        ));

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_fanout_bounds() {
        let path = test_path();
        let err = BPlusTree::create(&path, DataType::Int, 2).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::FanoutTooLarge(2))
        ));

        let err = BPlusTree::create(&path, DataType::Int, MAX_FANOUT + 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::FanoutTooLarge(_))
        ));
    }

    #[test]
    fn test_fanout_three_splits() -> Result<()> {
        let (mut tree, path) = test_tree(3)?;

        for key in 1..=4 {
            tree.insert(Value::Int(key), (key, 0))?;
        }
        assert_eq!(tree.root_keys(), ints(&[3]));
        assert_eq!(tree.leaf_keys(), vec![ints(&[1, 2]), ints(&[3, 4])]);

        tree.insert(Value::Int(5), (5, 0))?;
        tree.insert(Value::Int(6), (6, 0))?;
        assert_eq!(tree.root_keys(), ints(&[3, 5]));
        assert_eq!(
            tree.leaf_keys(),
            vec![ints(&[1, 2]), ints(&[3, 4]), ints(&[5, 6])]
        );

        tree.check_invariants();
        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_fanout_four_split_and_delete() -> Result<()> {
        let (mut tree, path) = test_tree(4)?;

        for key in [10, 20, 30, 40, 50] {
            tree.insert(Value::Int(key), (key, 0))?;
        }
        assert_eq!(tree.root_keys(), ints(&[30]));
        assert_eq!(tree.leaf_keys(), vec![ints(&[10, 20]), ints(&[30, 40, 50])]);
        assert_eq!(tree.find(&Value::Int(50))?, (50, 0));

        // deleting the separator key refreshes it to the leaf's new head
        tree.delete(&Value::Int(30))?;
        assert_eq!(tree.leaf_keys(), vec![ints(&[10, 20]), ints(&[40, 50])]);
        assert_eq!(tree.root_keys(), ints(&[40]));

        tree.check_invariants();
        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_delete_borrows_then_merges() -> Result<()> {
        let (mut tree, path) = test_tree(3)?;

        for key in 1..=3 {
            tree.insert(Value::Int(key), (key, 0))?;
        }
        // leaves [1,2] [3]; removing 3 borrows 2 from the left sibling
        tree.delete(&Value::Int(3))?;
        assert_eq!(tree.leaf_keys(), vec![ints(&[1]), ints(&[2])]);
        assert_eq!(tree.root_keys(), ints(&[2]));
        tree.check_invariants();

        // nothing to borrow now; the leaves merge and the root collapses
        tree.delete(&Value::Int(2))?;
        assert_eq!(tree.leaf_keys(), vec![ints(&[1])]);
        assert_eq!(tree.num_nodes(), 1);
        tree.check_invariants();

        tree.delete(&Value::Int(1))?;
        assert_eq!(tree.num_entries(), 0);
        assert_eq!(tree.num_nodes(), 0);
        tree.check_invariants();

        let err = tree.delete(&Value::Int(1)).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::KeyNotFound)));

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_insert_delete_reinsert() -> Result<()> {
        let (mut tree, path) = test_tree(4)?;

        for key in 1..=50 {
            tree.insert(Value::Int(key), (key, 0))?;
        }
        tree.check_invariants();

        for key in (1..=50).step_by(2) {
            tree.delete(&Value::Int(key))?;
            assert!(tree.find(&Value::Int(key)).is_err());
        }
        tree.check_invariants();
        assert_eq!(tree.num_entries(), 25);

        for key in (2..=50).step_by(2) {
            assert_eq!(tree.find(&Value::Int(key))?, (key, 0));
        }

        for key in (1..=50).step_by(2) {
            tree.insert(Value::Int(key), (key, 1))?;
        }
        tree.check_invariants();

        for key in 1..=50 {
            let (page, _) = tree.find(&Value::Int(key))?;
            assert_eq!(page, key);
        }

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_shuffled_bulk_insert_and_delete() -> Result<()> {
        let (mut tree, path) = test_tree(5)?;
        let mut rng = thread_rng();

        let mut keys: Vec<i32> = (0..300).collect();
        keys.shuffle(&mut rng);
        for key in &keys {
            tree.insert(Value::Int(*key), (*key, 0))?;
        }
        tree.check_invariants();
        assert_eq!(tree.num_entries(), 300);

        for key in 0..300 {
            assert_eq!(tree.find(&Value::Int(key))?, (key, 0));
        }

        keys.shuffle(&mut rng);
        for key in keys.iter().take(150) {
            tree.delete(&Value::Int(*key))?;
            assert!(tree.find(&Value::Int(*key)).is_err());
        }
        tree.check_invariants();
        assert_eq!(tree.num_entries(), 150);

        for key in keys.iter().skip(150) {
            assert_eq!(tree.find(&Value::Int(*key))?, (*key, 0));
        }

        for key in keys.iter().skip(150) {
            tree.delete(&Value::Int(*key))?;
        }
        tree.check_invariants();
        assert_eq!(tree.num_entries(), 0);
        assert_eq!(tree.num_nodes(), 0);

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_scan_is_sorted() -> Result<()> {
        let (mut tree, path) = test_tree(4)?;
        let mut rng = thread_rng();

        assert_eq!(tree.scan().count(), 0);

        let mut keys: Vec<i32> = (0..100).collect();
        keys.shuffle(&mut rng);
        for key in keys {
            tree.insert(Value::Int(key), (key, 0))?;
        }

        let scanned: Vec<_> = tree.scan().collect();
        assert_eq!(scanned.len(), 100);
        for (i, (key, rid)) in scanned.iter().enumerate() {
            assert_eq!(*key, Value::Int(i as i32));
            assert_eq!(*rid, (i as i32, 0));
        }

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_duplicate_keys_insert_beside() -> Result<()> {
        let (mut tree, path) = test_tree(3)?;

        tree.insert(Value::Int(7), (1, 0))?;
        tree.insert(Value::Int(7), (2, 0))?;
        assert_eq!(tree.num_entries(), 2);

        // find returns the first match
        assert_eq!(tree.find(&Value::Int(7))?, (1, 0));

        let rids: Vec<_> = tree.scan().map(|(_, rid)| rid).collect();
        assert_eq!(rids, vec![(1, 0), (2, 0)]);

        tree.delete(&Value::Int(7))?;
        assert_eq!(tree.num_entries(), 1);
        assert!(tree.find(&Value::Int(7)).is_ok());

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_string_keys() -> Result<()> {
        let path = test_path();
        let mut tree = BPlusTree::create(&path, DataType::Str, 4)?;

        for name in ["mango", "apple", "peach", "fig", "date", "cherry"] {
            tree.insert(Value::Str(name.into()), (0, 0))?;
        }
        tree.check_invariants();

        let scanned: Vec<_> = tree.scan().map(|(key, _)| key).collect();
        assert_eq!(
            scanned,
            vec![
                Value::Str("apple".into()),
                Value::Str("cherry".into()),
                Value::Str("date".into()),
                Value::Str("fig".into()),
                Value::Str("mango".into()),
                Value::Str("peach".into()),
            ]
        );

        close_and_destroy(tree, &path)
    }

    #[test]
    fn test_index_over_a_table() -> Result<()> {
        use crate::record::schema::{Attribute, Schema};
        use crate::record::Record;
        use crate::table::Table;

        let schema = Schema::new(
            vec![
                Attribute::new("id", DataType::Int, 0),
                Attribute::new("name", DataType::Str, 8),
            ],
            vec![0],
        );
        let table_path = test_path();
        let mut table = Table::create(&table_path, &schema, 5, Strategy::Lru)?;
        let (mut tree, tree_path) = test_tree(4)?;

        for (id, name) in [(3, "three"), (1, "one"), (2, "two")] {
            let record = Record::new(vec![Value::Int(id), Value::Str(name.into())], &schema)?;
            let rid = table.insert(&record)?;
            tree.insert(Value::Int(id), rid)?;
        }

        // the index resolves a key to its record in the heap
        let rid = tree.find(&Value::Int(2))?;
        let record = table.get(rid)?;
        assert_eq!(record.get_attr(1, &schema)?, Value::Str("two".into()));

        // an index scan drives key-ordered access to the table
        let names = tree
            .scan()
            .map(|(_, rid)| {
                table
                    .get(rid)
                    .and_then(|record| record.get_attr(1, &schema))
            })
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(
            names,
            vec![
                Value::Str("one".into()),
                Value::Str("two".into()),
                Value::Str("three".into()),
            ]
        );

        table.close()?;
        Table::destroy(&table_path)?;
        close_and_destroy(tree, &tree_path)
    }

    #[test]
    fn test_header_round_trip() -> Result<()> {
        let path = test_path();
        let tree = BPlusTree::create(&path, DataType::Float, 64)?;
        tree.close()?;

        let tree = BPlusTree::open(&path)?;
        assert_eq!(tree.key_type(), DataType::Float);
        assert_eq!(tree.fanout(), 64);
        assert_eq!(tree.num_entries(), 0);
        assert_eq!(tree.num_nodes(), 0);

        close_and_destroy(tree, &path)
    }
}
