//! Structural counts and operation counters for a tree.

/// A snapshot of a tree's structural counts and lifetime operation
/// counters, taken by [`statistics`](crate::BPlusTreeMap::statistics).
///
/// Node counts describe the tree as it is now; the operation counters
/// accumulate over the life of the tree (or since the last
/// [`reset_statistics`](crate::BPlusTreeMap::reset_statistics)) and are not
/// touched by `clear` or `bulk_load`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Statistics {
    /// Leaves currently in the tree.
    pub leaf_node_count: usize,
    /// Internal nodes currently in the tree.
    pub internal_node_count: usize,
    /// Calls to `insert`, counting in-place updates of an existing key.
    pub insert_count: u64,
    /// Calls to `remove` that found and removed a key.
    pub remove_count: u64,
    /// Leaf splits performed by inserts.
    pub leaf_split_count: u64,
    /// Internal-node splits performed while propagating leaf splits.
    pub internal_split_count: u64,
    /// Leaf merges performed by removals.
    pub leaf_merge_count: u64,
    /// Internal-node merges performed while rebalancing upward.
    pub internal_merge_count: u64,
    /// Underflows repaired by borrowing from a sibling instead of merging.
    pub redistribute_count: u64,
}

impl Statistics {
    /// Total number of nodes currently in the tree.
    #[must_use]
    pub fn total_node_count(&self) -> usize {
        self.leaf_node_count + self.internal_node_count
    }

    /// Splits at both levels combined.
    #[must_use]
    pub fn total_split_count(&self) -> u64 {
        self.leaf_split_count + self.internal_split_count
    }

    /// Merges at both levels combined.
    #[must_use]
    pub fn total_merge_count(&self) -> u64 {
        self.leaf_merge_count + self.internal_merge_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_sum_their_parts() {
        let stats = Statistics {
            leaf_node_count: 5,
            internal_node_count: 2,
            insert_count: 0,
            remove_count: 0,
            leaf_split_count: 4,
            internal_split_count: 1,
            leaf_merge_count: 3,
            internal_merge_count: 2,
            redistribute_count: 0,
        };
        assert_eq!(stats.total_node_count(), 7);
        assert_eq!(stats.total_split_count(), 5);
        assert_eq!(stats.total_merge_count(), 5);
    }

    #[test]
    fn default_is_all_zero() {
        let stats = Statistics::default();
        assert_eq!(stats.total_node_count(), 0);
        assert_eq!(stats.total_split_count(), 0);
        assert_eq!(stats.total_merge_count(), 0);
        assert_eq!(stats.insert_count, 0);
        assert_eq!(stats.remove_count, 0);
        assert_eq!(stats.redistribute_count, 0);
    }
}
