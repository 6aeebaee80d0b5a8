use core::borrow::Borrow;
use core::mem;

use super::arena::NodeArena;
use super::handle::Handle;
use super::node::{ChildSlots, InternalNode, LeafNode, Node, SearchResult};
use crate::stats::Statistics;
use crate::MIN_ORDER;

/// The core B+ tree backing `BPlusTreeMap`.
///
/// Owns the node arena and the tree-wide bookkeeping: root handle, the ends
/// of the leaf chain, the exact entry count, and the capacities derived from
/// the order. All descent, split, rebalance, and bulk-construction logic
/// lives here; the public map is a thin facade over it.
pub(crate) struct RawBPlusTree<K, V> {
    /// Arena storing every node of the tree.
    nodes: NodeArena<K, V>,
    /// Handle to the root node, if the tree is non-empty.
    root: Option<Handle>,
    /// Handle to the leftmost leaf, for forward iteration.
    first_leaf: Option<Handle>,
    /// Handle to the rightmost leaf, for reverse iteration.
    last_leaf: Option<Handle>,
    /// Total number of key-value pairs in the tree.
    len: usize,
    /// Maximum children per internal node; fixed at construction.
    order: usize,
    /// `order - 1`.
    max_keys: usize,
    /// `ceil(order / 2) - 1`; the root is exempt.
    min_keys: usize,
    /// Lifetime operation counters; node counts are filled in on query.
    stats: Statistics,
}

impl<K, V> RawBPlusTree<K, V> {
    pub(crate) fn new(order: usize) -> Self {
        let order = order.max(MIN_ORDER);
        Self {
            nodes: NodeArena::new(),
            root: None,
            first_leaf: None,
            last_leaf: None,
            len: 0,
            order,
            max_keys: order - 1,
            min_keys: order.div_ceil(2) - 1,
            stats: Statistics::default(),
        }
    }

    pub(crate) const fn order(&self) -> usize {
        self.order
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clears all elements from the tree.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.first_leaf = None;
        self.last_leaf = None;
        self.len = 0;
    }

    pub(crate) fn first_leaf(&self) -> Option<Handle> {
        self.first_leaf
    }

    pub(crate) fn last_leaf(&self) -> Option<Handle> {
        self.last_leaf
    }

    /// Resolves a leaf handle for the iterators layered on the leaf chain.
    pub(crate) fn leaf(&self, handle: Handle) -> &LeafNode<K, V> {
        self.nodes.leaf(handle)
    }

    /// Number of levels from the root down to the leaves; 0 when empty.
    pub(crate) fn height(&self) -> usize {
        let Some(mut current) = self.root else {
            return 0;
        };
        let mut height = 1;
        while let Node::Internal(internal) = self.nodes.node(current) {
            current = internal.child(0);
            height += 1;
        }
        height
    }

    /// Nodes one key past capacity split; the left half keeps this many.
    fn split_point(&self) -> usize {
        (self.max_keys + 1) / 2
    }

    /// Snapshot of the operation counters plus current node counts.
    pub(crate) fn statistics(&self) -> Statistics {
        let mut stats = self.stats;
        if let Some(root) = self.root {
            self.count_nodes(root, &mut stats);
        }
        stats
    }

    /// Zeroes the operation counters; node counts are derived, not stored.
    pub(crate) fn reset_statistics(&mut self) {
        self.stats = Statistics::default();
    }

    fn count_nodes(&self, handle: Handle, stats: &mut Statistics) {
        match self.nodes.node(handle) {
            Node::Leaf(_) => stats.leaf_node_count += 1,
            Node::Internal(internal) => {
                stats.internal_node_count += 1;
                for index in 0..internal.child_count() {
                    self.count_nodes(internal.child(index), stats);
                }
            }
        }
    }

    /// Mean occupancy of the leaves relative to `max_keys`; 0 when empty.
    pub(crate) fn average_leaf_fill_factor(&self) -> f64 {
        let mut leaves = 0usize;
        let mut filled = 0usize;
        let mut current = self.first_leaf;
        while let Some(handle) = current {
            let leaf = self.nodes.leaf(handle);
            leaves += 1;
            filled += leaf.key_count();
            current = leaf.next();
        }
        if leaves == 0 {
            0.0
        } else {
            filled as f64 / (leaves * self.max_keys) as f64
        }
    }

    /// Mean occupancy of the internal nodes relative to `max_keys`; 0 when
    /// the tree has no internal level.
    pub(crate) fn average_internal_fill_factor(&self) -> f64 {
        let mut internals = 0usize;
        let mut filled = 0usize;
        if let Some(root) = self.root {
            self.sum_internal_fill(root, &mut internals, &mut filled);
        }
        if internals == 0 {
            0.0
        } else {
            filled as f64 / (internals * self.max_keys) as f64
        }
    }

    fn sum_internal_fill(&self, handle: Handle, internals: &mut usize, filled: &mut usize) {
        if let Node::Internal(internal) = self.nodes.node(handle) {
            *internals += 1;
            *filled += internal.key_count();
            for index in 0..internal.child_count() {
                self.sum_internal_fill(internal.child(index), internals, filled);
            }
        }
    }
}

impl<K: Ord, V> RawBPlusTree<K, V> {
    /// Descends to the unique leaf that could hold `key`.
    ///
    /// The descent never branches on equality: a key equal to a separator
    /// always goes right, which is what makes the target leaf unique.
    fn find_leaf<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root?;
        loop {
            match self.nodes.node(current) {
                Node::Internal(internal) => {
                    current = internal.child(internal.find_child_index(key));
                }
                Node::Leaf(_) => return Some(current),
            }
        }
    }

    /// Locates a key, returning its leaf handle and slot index.
    pub(crate) fn search<Q>(&self, key: &Q) -> Option<(Handle, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf_handle = self.find_leaf(key)?;
        match self.nodes.leaf(leaf_handle).search(key) {
            SearchResult::Found(index) => Some((leaf_handle, index)),
            SearchResult::NotFound(_) => None,
        }
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (leaf_handle, index) = self.search(key)?;
        Some(self.nodes.leaf(leaf_handle).value(index))
    }

    pub(crate) fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (leaf_handle, index) = self.search(key)?;
        Some(self.nodes.leaf_mut(leaf_handle).value_mut(index))
    }

    pub(crate) fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (leaf_handle, index) = self.search(key)?;
        let leaf = self.nodes.leaf(leaf_handle);
        Some((leaf.key(index), leaf.value(index)))
    }

    pub(crate) fn first_key_value(&self) -> Option<(&K, &V)> {
        let leaf = self.nodes.leaf(self.first_leaf?);
        Some((leaf.key(0), leaf.value(0)))
    }

    pub(crate) fn last_key_value(&self) -> Option<(&K, &V)> {
        let leaf = self.nodes.leaf(self.last_leaf?);
        let index = leaf.key_count() - 1;
        Some((leaf.key(index), leaf.value(index)))
    }

    /// Position of the first entry with key >= `key`.
    pub(crate) fn lower_bound<Q>(&self, key: &Q) -> Option<(Handle, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf_handle = self.find_leaf(key)?;
        let leaf = self.nodes.leaf(leaf_handle);
        match leaf.search(key) {
            SearchResult::Found(index) => Some((leaf_handle, index)),
            SearchResult::NotFound(index) => {
                if index < leaf.key_count() {
                    return Some((leaf_handle, index));
                }
                // Live leaves are never empty, so the next leaf's first
                // slot is the bound.
                leaf.next().map(|next| (next, 0))
            }
        }
    }

    /// Position of the last entry with key <= `key`.
    pub(crate) fn last_at_most<Q>(&self, key: &Q) -> Option<(Handle, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf_handle = self.find_leaf(key)?;
        let leaf = self.nodes.leaf(leaf_handle);
        match leaf.search(key) {
            SearchResult::Found(index) => Some((leaf_handle, index)),
            SearchResult::NotFound(index) => {
                if index > 0 {
                    return Some((leaf_handle, index - 1));
                }
                let prev = leaf.prev()?;
                let prev_leaf = self.nodes.leaf(prev);
                Some((prev, prev_leaf.key_count() - 1))
            }
        }
    }

    /// Checks every structural invariant. Returns `false` on the first
    /// violation rather than panicking, so tests can assert either way.
    ///
    /// Separators are checked for routing correctness (every key in a
    /// subtree lies inside its separator window) rather than for exact
    /// equality with the subtree minimum: removing a leaf's first key
    /// legitimately leaves the old copy behind in an ancestor, and the
    /// equal-descends-right rule keeps lookups correct regardless.
    pub(crate) fn validate(&self) -> bool {
        let Some(root) = self.root else {
            return self.len == 0
                && self.nodes.live() == 0
                && self.first_leaf.is_none()
                && self.last_leaf.is_none();
        };
        if self.nodes.node(root).parent().is_some() {
            return false;
        }

        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        let mut visited = 0;
        if !self.validate_node(root, 0, None, None, &mut leaf_depth, &mut leaves, &mut visited) {
            return false;
        }
        // Every live arena slot must be reachable from the root.
        visited == self.nodes.live() && self.validate_leaf_chain(&leaves)
    }

    /// `lower` is inclusive, `upper` exclusive: a key equal to a separator
    /// must sit in the subtree on the separator's right.
    #[allow(clippy::too_many_arguments)]
    fn validate_node(
        &self,
        handle: Handle,
        depth: usize,
        lower: Option<&K>,
        upper: Option<&K>,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<Handle>,
        visited: &mut usize,
    ) -> bool {
        let node = self.nodes.node(handle);
        *visited += 1;

        // Occupancy bounds; the root is exempt from the lower one.
        if self.root != Some(handle)
            && (node.key_count() < self.min_keys || node.key_count() > self.max_keys)
        {
            return false;
        }

        let keys = match node {
            Node::Leaf(leaf) => leaf.keys(),
            Node::Internal(internal) => internal.keys(),
        };
        if !strictly_ascending(keys) {
            return false;
        }
        if let Some(first) = keys.first() {
            if lower.is_some_and(|lo| first < lo) {
                return false;
            }
        }
        if let Some(last) = keys.last() {
            if upper.is_some_and(|hi| last >= hi) {
                return false;
            }
        }

        match node {
            Node::Leaf(_) => {
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(expected) if depth != expected => return false,
                    Some(_) => {}
                }
                leaves.push(handle);
                true
            }
            Node::Internal(internal) => {
                if internal.child_count() != internal.key_count() + 1 {
                    return false;
                }
                for index in 0..internal.child_count() {
                    let child = internal.child(index);
                    if self.nodes.node(child).parent() != Some(handle) {
                        return false;
                    }
                    let child_lower = if index == 0 { lower } else { Some(internal.key(index - 1)) };
                    let child_upper = if index == internal.key_count() {
                        upper
                    } else {
                        Some(internal.key(index))
                    };
                    if !self.validate_node(child, depth + 1, child_lower, child_upper, leaf_depth, leaves, visited)
                    {
                        return false;
                    }
                }
                true
            }
        }
    }

    fn validate_leaf_chain(&self, leaves: &[Handle]) -> bool {
        if self.first_leaf != leaves.first().copied() || self.last_leaf != leaves.last().copied() {
            return false;
        }

        let mut expected_prev = None;
        for (index, &handle) in leaves.iter().enumerate() {
            let leaf = self.nodes.leaf(handle);
            if leaf.prev() != expected_prev || leaf.next() != leaves.get(index + 1).copied() {
                return false;
            }
            // Keys must keep ascending across the leaf boundary.
            if index > 0 {
                let prev_leaf = self.nodes.leaf(leaves[index - 1]);
                if prev_leaf.key(prev_leaf.key_count() - 1) >= leaf.key(0) {
                    return false;
                }
            }
            expected_prev = Some(handle);
        }

        let total: usize = leaves.iter().map(|&h| self.nodes.leaf(h).key_count()).sum();
        total == self.len
    }

    /// Smallest key in the subtree rooted at `handle`.
    fn leftmost_key(&self, handle: Handle) -> &K {
        let mut current = handle;
        loop {
            match self.nodes.node(current) {
                Node::Internal(internal) => current = internal.child(0),
                Node::Leaf(leaf) => return leaf.key(0),
            }
        }
    }
}

impl<K: Ord + Clone, V> RawBPlusTree<K, V> {
    /// Inserts a key-value pair, returning the previous value if the key was
    /// already present. A duplicate key updates in place with no structural
    /// change.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.stats.insert_count += 1;

        if self.root.is_none() {
            let mut leaf = LeafNode::new();
            leaf.push_back(key, value);
            let handle = self.nodes.alloc(Node::Leaf(leaf));
            self.root = Some(handle);
            self.first_leaf = Some(handle);
            self.last_leaf = Some(handle);
            self.len = 1;
            return None;
        }

        let leaf_handle = self.find_leaf(&key).expect("non-empty tree has a leaf for every key");
        let leaf = self.nodes.leaf_mut(leaf_handle);
        match leaf.search(&key) {
            SearchResult::Found(index) => Some(mem::replace(leaf.value_mut(index), value)),
            SearchResult::NotFound(index) => {
                leaf.insert_at(index, key, value);
                let overfull = leaf.key_count() > self.max_keys;
                self.len += 1;
                if overfull {
                    self.split_leaf(leaf_handle);
                }
                None
            }
        }
    }

    /// Splits an overfull leaf, splices the new leaf into the chain, and
    /// promotes a copy of its first key (the key itself stays in the leaf).
    fn split_leaf(&mut self, leaf_handle: Handle) {
        self.stats.leaf_split_count += 1;
        let split_point = self.split_point();
        let leaf = self.nodes.leaf_mut(leaf_handle);
        let mut right = leaf.split_off(split_point);
        let old_next = leaf.next();
        right.set_prev(Some(leaf_handle));
        right.set_next(old_next);
        let promoted = right.key(0).clone();

        let right_handle = self.nodes.alloc(Node::Leaf(right));
        self.nodes.leaf_mut(leaf_handle).set_next(Some(right_handle));
        if let Some(next) = old_next {
            self.nodes.leaf_mut(next).set_prev(Some(right_handle));
        }
        if self.last_leaf == Some(leaf_handle) {
            self.last_leaf = Some(right_handle);
        }

        self.insert_into_parent(leaf_handle, promoted, right_handle);
    }

    /// Splits an overfull internal node. The key at the split point moves
    /// upward and leaves this level entirely; the children above it move to
    /// the new right node and are reparented.
    fn split_internal(&mut self, node_handle: Handle) {
        self.stats.internal_split_count += 1;
        let split_point = self.split_point();
        let node = self.nodes.internal_mut(node_handle);
        let (promoted, right) = node.split_off(split_point);
        let moved: ChildSlots = right.children().iter().copied().collect();

        let right_handle = self.nodes.alloc(Node::Internal(right));
        for child in moved {
            self.nodes.node_mut(child).set_parent(Some(right_handle));
        }

        self.insert_into_parent(node_handle, promoted, right_handle);
    }

    /// Hangs `right` next to `left` under their parent, keyed by the
    /// promoted separator. Splitting the old root grows a new root with one
    /// key and two children.
    fn insert_into_parent(&mut self, left: Handle, key: K, right: Handle) {
        let Some(parent) = self.nodes.node(left).parent() else {
            let mut new_root = InternalNode::new();
            new_root.push_first_child(left);
            new_root.push_back(key, right);
            let root_handle = self.nodes.alloc(Node::Internal(new_root));
            self.nodes.node_mut(left).set_parent(Some(root_handle));
            self.nodes.node_mut(right).set_parent(Some(root_handle));
            self.root = Some(root_handle);
            return;
        };

        let node = self.nodes.internal_mut(parent);
        let position = node.key_insert_position(&key);
        node.insert_separator(position, key, right);
        self.nodes.node_mut(right).set_parent(Some(parent));

        if self.nodes.node(parent).is_overfull(self.max_keys) {
            self.split_internal(parent);
        }
    }

    /// Removes a key, returning its value if present.
    pub(crate) fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf_handle = self.find_leaf(key)?;
        let leaf = self.nodes.leaf_mut(leaf_handle);
        let index = match leaf.search(key) {
            SearchResult::Found(index) => index,
            SearchResult::NotFound(_) => return None,
        };
        let (_, value) = leaf.remove_at(index);
        self.len -= 1;
        self.stats.remove_count += 1;

        if self.root == Some(leaf_handle) {
            // The root may hold any number of keys; an empty leaf root
            // means the tree is now empty.
            if self.nodes.node(leaf_handle).key_count() == 0 {
                self.nodes.release(leaf_handle);
                self.root = None;
                self.first_leaf = None;
                self.last_leaf = None;
            }
            return Some(value);
        }

        if self.nodes.node(leaf_handle).is_underflow(self.min_keys) {
            self.rebalance(leaf_handle);
        }
        Some(value)
    }

    /// Fixes an underflowing non-root node: borrow from the left sibling if
    /// it can lend, else from the right, else merge with whichever sibling
    /// exists (left preferred). Merging may cascade upward.
    fn rebalance(&mut self, node_handle: Handle) {
        if self.root == Some(node_handle) {
            self.shrink_root(node_handle);
            return;
        }

        let parent_handle = self.nodes.node(node_handle).parent().expect("non-root node has a parent");
        let position = self
            .nodes
            .internal(parent_handle)
            .child_position(node_handle)
            .expect("parent lists every child it owns");

        if position > 0 {
            let left = self.nodes.internal(parent_handle).child(position - 1);
            if self.nodes.node(left).can_lend(self.min_keys) {
                self.borrow_from_left(node_handle, left, parent_handle, position);
                return;
            }
        }

        let parent_keys = self.nodes.internal(parent_handle).key_count();
        if position < parent_keys {
            let right = self.nodes.internal(parent_handle).child(position + 1);
            if self.nodes.node(right).can_lend(self.min_keys) {
                self.borrow_from_right(node_handle, right, parent_handle, position);
                return;
            }
        }

        if position > 0 {
            let left = self.nodes.internal(parent_handle).child(position - 1);
            self.merge(left, node_handle, parent_handle, position - 1);
        } else {
            let right = self.nodes.internal(parent_handle).child(position + 1);
            self.merge(node_handle, right, parent_handle, position);
        }
    }

    /// Collapses a keyless root: an internal root hands the tree to its only
    /// child (height shrinks by one); a leaf root empties the tree.
    fn shrink_root(&mut self, root_handle: Handle) {
        if self.nodes.node(root_handle).key_count() > 0 {
            return;
        }
        match self.nodes.node(root_handle) {
            Node::Internal(internal) => {
                let child = internal.child(0);
                self.nodes.release(root_handle);
                self.nodes.node_mut(child).set_parent(None);
                self.root = Some(child);
            }
            Node::Leaf(_) => {
                self.nodes.release(root_handle);
                self.root = None;
                self.first_leaf = None;
                self.last_leaf = None;
            }
        }
    }

    /// Moves the left sibling's last entry into the node's first slot.
    ///
    /// Leaves transfer the entry directly and refresh the separator to the
    /// node's new first key. Internal nodes rotate through the parent: the
    /// separator comes down in front of the node's keys together with the
    /// lender's last subtree, and the lender's last key goes up.
    fn borrow_from_left(
        &mut self,
        node_handle: Handle,
        left_handle: Handle,
        parent_handle: Handle,
        position: usize,
    ) {
        self.stats.redistribute_count += 1;
        if self.nodes.node(node_handle).is_leaf() {
            let (key, value) = self
                .nodes
                .leaf_mut(left_handle)
                .pop_back()
                .expect("lender holds more than min_keys");
            let node = self.nodes.leaf_mut(node_handle);
            node.push_front(key, value);
            let separator = node.key(0).clone();
            self.nodes.internal_mut(parent_handle).set_key(position - 1, separator);
        } else {
            let separator = self.nodes.internal(parent_handle).key(position - 1).clone();
            let (left_key, left_child) = self
                .nodes
                .internal_mut(left_handle)
                .pop_back()
                .expect("lender holds more than min_keys");
            self.nodes.internal_mut(node_handle).push_front(separator, left_child);
            self.nodes.node_mut(left_child).set_parent(Some(node_handle));
            self.nodes.internal_mut(parent_handle).set_key(position - 1, left_key);
        }
    }

    /// Moves the right sibling's first entry onto the node's end; mirror of
    /// [`Self::borrow_from_left`].
    fn borrow_from_right(
        &mut self,
        node_handle: Handle,
        right_handle: Handle,
        parent_handle: Handle,
        position: usize,
    ) {
        self.stats.redistribute_count += 1;
        if self.nodes.node(node_handle).is_leaf() {
            let (key, value) = self
                .nodes
                .leaf_mut(right_handle)
                .pop_front()
                .expect("lender holds more than min_keys");
            self.nodes.leaf_mut(node_handle).push_back(key, value);
            let separator = self.nodes.leaf(right_handle).key(0).clone();
            self.nodes.internal_mut(parent_handle).set_key(position, separator);
        } else {
            let separator = self.nodes.internal(parent_handle).key(position).clone();
            let (right_key, right_child) = self
                .nodes
                .internal_mut(right_handle)
                .pop_front()
                .expect("lender holds more than min_keys");
            self.nodes.internal_mut(node_handle).push_back(separator, right_child);
            self.nodes.node_mut(right_child).set_parent(Some(node_handle));
            self.nodes.internal_mut(parent_handle).set_key(position, right_key);
        }
    }

    /// Merges `right` into `left` and removes the separator between them
    /// from the parent, recursing upward if the parent underflows.
    ///
    /// A leaf merge splices the chain around the dead leaf and pulls nothing
    /// down (the leaf level already holds every key); an internal merge must
    /// pull the separator down between the two key runs.
    fn merge(
        &mut self,
        left_handle: Handle,
        right_handle: Handle,
        parent_handle: Handle,
        separator_index: usize,
    ) {
        match self.nodes.take(right_handle) {
            Node::Leaf(right) => {
                self.stats.leaf_merge_count += 1;
                let left = self.nodes.leaf_mut(left_handle);
                left.merge_from_right(right);
                let new_next = left.next();
                if let Some(next) = new_next {
                    self.nodes.leaf_mut(next).set_prev(Some(left_handle));
                }
                if self.last_leaf == Some(right_handle) {
                    self.last_leaf = Some(left_handle);
                }
            }
            Node::Internal(right) => {
                self.stats.internal_merge_count += 1;
                let separator = self.nodes.internal(parent_handle).key(separator_index).clone();
                let moved: ChildSlots = right.children().iter().copied().collect();
                self.nodes.internal_mut(left_handle).merge_from_right(separator, right);
                for child in moved {
                    self.nodes.node_mut(child).set_parent(Some(left_handle));
                }
            }
        }

        let removed = self.nodes.internal_mut(parent_handle).remove_separator(separator_index);
        debug_assert_eq!(removed, right_handle);

        if self.root == Some(parent_handle) {
            self.shrink_root(parent_handle);
            return;
        }
        if self.nodes.node(parent_handle).is_underflow(self.min_keys) {
            self.rebalance(parent_handle);
        }
    }

    /// Rebuilds the tree bottom-up from ascending input in O(n).
    ///
    /// Runs of equal consecutive keys coalesce to the last value. Items are
    /// spread over the fewest leaves capacity allows, widened only as far as
    /// needed to keep every leaf at or above minimum occupancy, with the
    /// larger shares handed out first. Each internal level repeats the same
    /// distribution over the level below until one node remains.
    pub(crate) fn bulk_load<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.clear();

        let mut buffer: Vec<(K, V)> = Vec::new();
        for (key, value) in items {
            match buffer.last_mut() {
                Some(last) if last.0 == key => last.1 = value,
                _ => buffer.push((key, value)),
            }
        }
        let total = buffer.len();
        if total == 0 {
            return;
        }

        if total <= self.max_keys {
            let mut leaf = LeafNode::new();
            for (key, value) in buffer {
                leaf.push_back(key, value);
            }
            let handle = self.nodes.alloc(Node::Leaf(leaf));
            self.root = Some(handle);
            self.first_leaf = Some(handle);
            self.last_leaf = Some(handle);
            self.len = total;
            return;
        }

        let mut leaf_count = total.div_ceil(self.max_keys);
        let most_leaves = total / self.min_keys;
        if leaf_count > most_leaves && most_leaves > 0 {
            leaf_count = most_leaves;
        }

        let mut leaves: Vec<Handle> = Vec::with_capacity(leaf_count);
        let mut items = buffer.into_iter();
        let mut remaining = total;
        let mut prev: Option<Handle> = None;
        for leaf_index in 0..leaf_count {
            let share = remaining.div_ceil(leaf_count - leaf_index).min(self.max_keys);
            let mut leaf = LeafNode::new();
            for _ in 0..share {
                let (key, value) = items.next().expect("distribution covers every item");
                leaf.push_back(key, value);
            }
            remaining -= share;
            leaf.set_prev(prev);
            let handle = self.nodes.alloc(Node::Leaf(leaf));
            if let Some(prev_handle) = prev {
                self.nodes.leaf_mut(prev_handle).set_next(Some(handle));
            }
            prev = Some(handle);
            leaves.push(handle);
        }
        self.first_leaf = leaves.first().copied();
        self.last_leaf = leaves.last().copied();

        let max_children = self.max_keys + 1;
        let min_children = self.min_keys + 1;
        let mut level = leaves;
        while level.len() > 1 {
            let child_total = level.len();
            let mut node_count = child_total.div_ceil(max_children);
            let most_nodes = (child_total / min_children).max(1);
            if node_count > most_nodes {
                node_count = most_nodes;
            }

            let mut next_level: Vec<Handle> = Vec::with_capacity(node_count);
            let mut children = level.into_iter();
            let mut remaining = child_total;
            for node_index in 0..node_count {
                let share = remaining.div_ceil(node_count - node_index).min(max_children);
                let mut node = InternalNode::new();
                for slot in 0..share {
                    let child = children.next().expect("distribution covers every child");
                    if slot == 0 {
                        node.push_first_child(child);
                    } else {
                        let separator = self.leftmost_key(child).clone();
                        node.push_back(separator, child);
                    }
                }
                remaining -= share;

                let moved: ChildSlots = node.children().iter().copied().collect();
                let handle = self.nodes.alloc(Node::Internal(node));
                for child in moved {
                    self.nodes.node_mut(child).set_parent(Some(handle));
                }
                next_level.push(handle);
            }
            level = next_level;
        }

        self.root = Some(level[0]);
        self.len = total;
    }
}

fn strictly_ascending<K: Ord>(keys: &[K]) -> bool {
    keys.windows(2).all(|pair| pair[0] < pair[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys_of(tree: &RawBPlusTree<i64, i64>) -> Vec<i64> {
        let mut out = Vec::new();
        let mut current = tree.first_leaf();
        while let Some(handle) = current {
            let leaf = tree.leaf(handle);
            out.extend(leaf.keys().iter().copied());
            current = leaf.next();
        }
        out
    }

    #[test]
    fn order_is_clamped() {
        let tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(0);
        assert_eq!(tree.order(), MIN_ORDER);
        let tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(7);
        assert_eq!(tree.order(), 7);
    }

    #[test]
    fn capacities_follow_order() {
        for order in 3..=12 {
            let tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(order);
            assert_eq!(tree.max_keys, order - 1);
            assert_eq!(tree.min_keys, order.div_ceil(2) - 1);
        }
    }

    #[test]
    fn split_cascades_to_a_new_root() {
        let mut tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(4);
        for key in 1..=10 {
            tree.insert(key, key * 100);
            assert!(tree.validate(), "invalid after inserting {key}");
        }
        assert_eq!(tree.height(), 3);
        assert_eq!(keys_of(&tree), (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn duplicate_insert_updates_in_place() {
        let mut tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(4);
        assert_eq!(tree.insert(7, 1), None);
        assert_eq!(tree.insert(7, 2), Some(1));
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&7), Some(&2));
        assert!(tree.validate());
    }

    #[test]
    fn stale_separator_misses_correctly() {
        let mut tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(4);
        for key in 1..=8 {
            tree.insert(key, key);
        }
        // Removing a key that also serves as a separator must leave lookups
        // descending past the stale copy to a clean miss.
        assert_eq!(tree.remove(&5), Some(5));
        assert_eq!(tree.get(&5), None);
        assert!(tree.validate());
    }

    #[test]
    fn remove_shrinks_height_back_down() {
        let mut tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(3);
        for key in 1..=30 {
            tree.insert(key, key);
            assert!(tree.validate(), "invalid after inserting {key}");
        }
        let grown = tree.height();
        for key in 1..=29 {
            assert_eq!(tree.remove(&key), Some(key));
            assert!(tree.validate(), "invalid after removing {key}");
        }
        assert_eq!(tree.height(), 1);
        assert!(tree.height() < grown);
        assert_eq!(keys_of(&tree), vec![30]);
    }

    #[test]
    fn remove_last_key_empties_the_tree() {
        let mut tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(4);
        tree.insert(1, 10);
        assert_eq!(tree.remove(&1), Some(10));
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.first_leaf(), None);
        assert_eq!(tree.last_leaf(), None);
        assert!(tree.validate());
    }

    #[test]
    fn bulk_load_coalesces_duplicates_to_last() {
        let mut tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(4);
        tree.bulk_load([(1, 10), (2, 20), (3, 30), (3, 31), (4, 40)]);
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.get(&3), Some(&31));
        assert!(tree.validate());
    }

    #[test]
    fn bulk_load_meets_minimum_occupancy_everywhere() {
        for order in [3usize, 4, 5, 8] {
            for n in [0usize, 1, 2, 3, 7, 10, 50, 257, 1000] {
                let mut tree: RawBPlusTree<usize, usize> = RawBPlusTree::new(order);
                tree.bulk_load((0..n).map(|i| (i, i * 2)));
                assert!(tree.validate(), "invalid bulk load: order {order}, n {n}");
                assert_eq!(tree.len(), n);
                for i in 0..n {
                    assert_eq!(tree.get(&i), Some(&(i * 2)), "order {order}, n {n}, key {i}");
                }
            }
        }
    }

    #[test]
    fn bulk_load_replaces_existing_contents() {
        let mut tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(4);
        for key in 0..100 {
            tree.insert(key, 0);
        }
        tree.bulk_load([(1000, 1), (1001, 2)]);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.get(&50), None);
        assert_eq!(tree.get(&1000), Some(&1));
        assert!(tree.validate());
    }

    #[test]
    fn bounds_land_on_the_right_slots() {
        let mut tree: RawBPlusTree<i64, i64> = RawBPlusTree::new(4);
        for key in [10, 20, 30, 40, 50] {
            tree.insert(key, key);
        }
        let entry = |pos: (Handle, usize)| *tree.leaf(pos.0).key(pos.1);

        assert_eq!(tree.lower_bound(&25).map(entry), Some(30));
        assert_eq!(tree.lower_bound(&30).map(entry), Some(30));
        assert_eq!(tree.lower_bound(&51).map(entry), None);
        assert_eq!(tree.last_at_most(&25).map(entry), Some(20));
        assert_eq!(tree.last_at_most(&30).map(entry), Some(30));
        assert_eq!(tree.last_at_most(&5).map(entry), None);
    }
}
