//! The public B+ tree map and its iterators.

use core::borrow::Borrow;
use core::fmt;
use core::iter::FusedIterator;

use crate::raw::{Handle, RawBPlusTree};
use crate::stats::Statistics;
use crate::DEFAULT_ORDER;

/// An ordered map backed by a B+ tree with linked leaves.
///
/// Every entry lives in a leaf node; internal nodes carry only separator
/// keys that route lookups downward. The leaves chain together in key order,
/// so iteration and range scans walk the chain without re-descending the
/// tree. The branching factor (the *order*) is chosen per tree at
/// construction and fixed for its lifetime.
///
/// It is a logic error for a key to be modified in such a way that its
/// ordering relative to any other key changes while it is in the map.
///
/// # Examples
///
/// ```
/// use leafline::BPlusTreeMap;
///
/// let mut inventory = BPlusTreeMap::new();
/// inventory.insert("bolts", 120);
/// inventory.insert("nuts", 80);
/// inventory.insert("washers", 250);
///
/// assert_eq!(inventory.get(&"nuts"), Some(&80));
///
/// // Entries iterate in key order.
/// for (item, count) in &inventory {
///     println!("{item}: {count}");
/// }
///
/// inventory.remove(&"bolts");
/// assert_eq!(inventory.len(), 2);
/// ```
///
/// A larger order trades taller nodes for a flatter tree:
///
/// ```
/// use leafline::BPlusTreeMap;
///
/// let mut wide: BPlusTreeMap<u64, u64> = BPlusTreeMap::with_order(64);
/// for i in 0..10_000 {
///     wide.insert(i, i * i);
/// }
/// assert!(wide.height() <= 3);
/// ```
pub struct BPlusTreeMap<K, V> {
    pub(crate) raw: RawBPlusTree<K, V>,
}

impl<K, V> BPlusTreeMap<K, V> {
    /// Makes a new, empty map of the default order.
    ///
    /// Does not allocate until the first insertion.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::{BPlusTreeMap, DEFAULT_ORDER};
    ///
    /// let map: BPlusTreeMap<i32, &str> = BPlusTreeMap::new();
    /// assert!(map.is_empty());
    /// assert_eq!(map.order(), DEFAULT_ORDER);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::with_order(DEFAULT_ORDER)
    }

    /// Makes a new, empty map whose nodes hold at most `order` children.
    ///
    /// Orders below [`MIN_ORDER`](crate::MIN_ORDER) are clamped up to it:
    /// below 3 a full node could not split into two non-empty halves.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let map: BPlusTreeMap<i32, i32> = BPlusTreeMap::with_order(16);
    /// assert_eq!(map.order(), 16);
    ///
    /// let clamped: BPlusTreeMap<i32, i32> = BPlusTreeMap::with_order(1);
    /// assert_eq!(clamped.order(), 3);
    /// ```
    #[must_use]
    pub fn with_order(order: usize) -> Self {
        Self {
            raw: RawBPlusTree::new(order),
        }
    }

    /// Returns the order the map was constructed with.
    #[must_use]
    pub fn order(&self) -> usize {
        self.raw.order()
    }

    /// Returns the number of entries in the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// assert_eq!(map.len(), 0);
    /// map.insert(1, "a");
    /// assert_eq!(map.len(), 1);
    /// ```
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the map contains no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Clears the map, removing all entries.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// map.insert(1, "a");
    /// map.clear();
    /// assert!(map.is_empty());
    /// ```
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Returns the number of levels in the tree, counting the leaf level;
    /// an empty map has height 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::with_order(4);
    /// assert_eq!(map.height(), 0);
    /// map.insert(1, ());
    /// assert_eq!(map.height(), 1);
    /// for i in 2..=5 {
    ///     map.insert(i, ());
    /// }
    /// assert_eq!(map.height(), 2);
    /// ```
    #[must_use]
    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// Takes a snapshot of the tree's node counts and lifetime operation
    /// counters.
    ///
    /// Node counts reflect the tree as it stands; the counters accumulate
    /// until [`reset_statistics`](Self::reset_statistics) and survive both
    /// [`clear`](Self::clear) and [`bulk_load`](Self::bulk_load).
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::with_order(4);
    /// for i in 0..4 {
    ///     map.insert(i, i);
    /// }
    /// let stats = map.statistics();
    /// assert_eq!(stats.insert_count, 4);
    /// assert_eq!(stats.leaf_split_count, 1);
    /// assert_eq!(stats.leaf_node_count, 2);
    /// assert_eq!(stats.internal_node_count, 1);
    /// ```
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.raw.statistics()
    }

    /// Zeroes the operation counters. Node counts are derived from the
    /// current tree and are unaffected.
    pub fn reset_statistics(&mut self) {
        self.raw.reset_statistics();
    }

    /// Mean leaf occupancy as a fraction of leaf capacity, between 0 and 1;
    /// 0 for an empty tree.
    ///
    /// Bulk-loaded trees pack close to 1; trees grown by random insertion
    /// settle around the split point.
    #[must_use]
    pub fn average_leaf_fill_factor(&self) -> f64 {
        self.raw.average_leaf_fill_factor()
    }

    /// Mean internal-node occupancy as a fraction of capacity, between 0
    /// and 1; 0 when the tree has no internal level.
    #[must_use]
    pub fn average_internal_fill_factor(&self) -> f64 {
        self.raw.average_internal_fill_factor()
    }
}

impl<K: Ord, V> BPlusTreeMap<K, V> {
    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the
    /// ordering on the borrowed form *must* match the ordering on the key
    /// type.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.get(key)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// map.insert(1, "a");
    /// if let Some(value) = map.get_mut(&1) {
    ///     *value = "b";
    /// }
    /// assert_eq!(map.get(&1), Some(&"b"));
    /// ```
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.get_mut(key)
    }

    /// Returns the key-value pair corresponding to the supplied key.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.get_key_value(key)
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// map.insert(1, "a");
    /// assert!(map.contains_key(&1));
    /// assert!(!map.contains_key(&2));
    /// ```
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.search(key).is_some()
    }

    /// Returns the entry with the smallest key, in O(1) via the head of the
    /// leaf chain.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// assert_eq!(map.first_key_value(), None);
    /// map.insert(2, "b");
    /// map.insert(1, "a");
    /// assert_eq!(map.first_key_value(), Some((&1, &"a")));
    /// ```
    #[must_use]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        self.raw.first_key_value()
    }

    /// Returns the entry with the largest key, in O(1) via the tail of the
    /// leaf chain.
    #[must_use]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        self.raw.last_key_value()
    }

    /// Checks every structural invariant of the tree: occupancy bounds,
    /// in-node and cross-leaf key ordering, uniform leaf depth, separator
    /// placement, parent back-references, and leaf-chain coherence.
    ///
    /// Intended for tests and debugging; a `false` return means the tree
    /// has been corrupted (which would indicate a bug in this crate).
    #[must_use]
    pub fn validate(&self) -> bool {
        self.raw.validate()
    }

    /// Gets an iterator over the entries of the map, sorted by key. The
    /// iterator is double-ended; [`rev`](Iterator::rev) walks the leaf
    /// chain backward.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// map.insert(3, "c");
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// let forward: Vec<i32> = map.iter().map(|(k, _)| *k).collect();
    /// assert_eq!(forward, [1, 2, 3]);
    ///
    /// let backward: Vec<i32> = map.iter().rev().map(|(k, _)| *k).collect();
    /// assert_eq!(backward, [3, 2, 1]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        let front = self.raw.first_leaf().map(|handle| (handle, 0));
        let back = self.raw.last_leaf().map(|handle| {
            let last = self.raw.leaf(handle).key_count() - 1;
            (handle, last)
        });
        Iter {
            tree: &self.raw,
            front,
            back,
            remaining: self.raw.len(),
        }
    }

    /// Gets an iterator over the entries with keys in `[lo, hi]`, sorted by
    /// key and borrowing from the map.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// for i in 0..10 {
    ///     map.insert(i, i * 10);
    /// }
    /// let keys: Vec<i32> = map.range(&3, &6).map(|(k, _)| *k).collect();
    /// assert_eq!(keys, [3, 4, 5, 6]);
    /// ```
    #[must_use]
    pub fn range(&self, lo: &K, hi: &K) -> Range<'_, K, V> {
        let front = self.raw.lower_bound(lo);
        let in_range =
            front.is_some_and(|(handle, index)| self.raw.leaf(handle).key(index) <= hi);
        if !in_range {
            return Range {
                tree: &self.raw,
                front: None,
                back: None,
                exhausted: true,
            };
        }
        // A key in [lo, hi] exists, so the inclusive upper bound does too.
        let back = self.raw.last_at_most(hi);
        Range {
            tree: &self.raw,
            front,
            back,
            exhausted: false,
        }
    }
}

impl<K: Ord + Clone, V> BPlusTreeMap<K, V> {
    /// Inserts a key-value pair into the map.
    ///
    /// If the key is already present its value is overwritten in place and
    /// the old value returned; the tree structure does not change. A new
    /// key goes into its leaf at the sorted position, splitting nodes
    /// upward as needed.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.raw.insert(key, value)
    }

    /// Removes a key from the map, returning its value if it was present.
    ///
    /// A leaf left under minimum occupancy borrows from a sibling when one
    /// can lend, and merges with one otherwise; the fix-up may cascade to
    /// the root and shrink the tree's height.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove(key)
    }

    /// Replaces the map's contents with `items`, which must be sorted
    /// ascending by key, in O(n).
    ///
    /// The tree is built bottom-up: items are spread across leaves so every
    /// node meets minimum occupancy, the leaves are chained, and internal
    /// levels are stacked on top until one node remains. Runs of equal
    /// consecutive keys keep the last value, matching what repeated
    /// [`insert`](Self::insert) calls would leave behind.
    ///
    /// Feeding unsorted input is a logic error: the resulting tree will
    /// fail [`validate`](Self::validate) and misroute lookups.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::with_order(4);
    /// map.bulk_load((0..1000).map(|i| (i, i * 2)));
    /// assert_eq!(map.len(), 1000);
    /// assert_eq!(map.get(&500), Some(&1000));
    /// assert!(map.validate());
    /// ```
    pub fn bulk_load<I>(&mut self, items: I)
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.raw.bulk_load(items);
    }
}

impl<K: Ord + Clone, V: Clone> BPlusTreeMap<K, V> {
    /// Collects every entry with a key in `[lo, hi]` into a vector, sorted
    /// ascending by key.
    ///
    /// Finds the leaf that could hold `lo`, then walks the leaf chain until
    /// the first key above `hi`. Use [`range`](Self::range) to borrow the
    /// entries instead of cloning them.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTreeMap;
    ///
    /// let mut map = BPlusTreeMap::new();
    /// map.insert(10, "a");
    /// map.insert(20, "b");
    /// map.insert(30, "c");
    /// assert_eq!(map.range_query(&10, &20), [(10, "a"), (20, "b")]);
    /// assert!(map.range_query(&21, &29).is_empty());
    /// ```
    #[must_use]
    pub fn range_query(&self, lo: &K, hi: &K) -> Vec<(K, V)> {
        self.range(lo, hi).map(|(key, value)| (key.clone(), value.clone())).collect()
    }
}

impl<K, V> Default for BPlusTreeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug + Ord, V: fmt::Debug> fmt::Debug for BPlusTreeMap<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: Ord + Clone, V> FromIterator<(K, V)> for BPlusTreeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Ord + Clone, V> Extend<(K, V)> for BPlusTreeMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a, K: Ord, V> IntoIterator for &'a BPlusTreeMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// An iterator over the entries of a [`BPlusTreeMap`], sorted by key.
///
/// This `struct` is created by the [`iter`](BPlusTreeMap::iter) method.
/// Positions are (leaf, slot) pairs; advancing past a leaf's last slot hops
/// to the next leaf in the chain.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    tree: &'a RawBPlusTree<K, V>,
    front: Option<(Handle, usize)>,
    back: Option<(Handle, usize)>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (handle, index) = self.front?;
        let leaf = self.tree.leaf(handle);
        let item = (leaf.key(index), leaf.value(index));

        self.remaining -= 1;
        self.front = if index + 1 < leaf.key_count() {
            Some((handle, index + 1))
        } else {
            leaf.next().map(|next| (next, 0))
        };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let (handle, index) = self.back?;
        let leaf = self.tree.leaf(handle);
        let item = (leaf.key(index), leaf.value(index));

        self.remaining -= 1;
        self.back = if index > 0 {
            Some((handle, index - 1))
        } else {
            leaf.prev().map(|prev| {
                let last = self.tree.leaf(prev).key_count() - 1;
                (prev, last)
            })
        };
        Some(item)
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            back: self.back,
            remaining: self.remaining,
        }
    }
}

impl<K, V> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("remaining", &self.remaining).finish()
    }
}

/// An iterator over a sub-range of entries in a [`BPlusTreeMap`].
///
/// This `struct` is created by the [`range`](BPlusTreeMap::range) method.
/// Both bounds are inclusive; the iterator ends when its front and back
/// positions meet.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Range<'a, K, V> {
    tree: &'a RawBPlusTree<K, V>,
    front: Option<(Handle, usize)>,
    back: Option<(Handle, usize)>,
    /// Set once the front and back positions have crossed.
    exhausted: bool,
}

impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let (handle, index) = self.front?;
        let leaf = self.tree.leaf(handle);
        let item = (leaf.key(index), leaf.value(index));

        if self.front == self.back {
            self.exhausted = true;
        } else {
            self.front = if index + 1 < leaf.key_count() {
                Some((handle, index + 1))
            } else {
                leaf.next().map(|next| (next, 0))
            };
        }
        Some(item)
    }
}

impl<K, V> DoubleEndedIterator for Range<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let (handle, index) = self.back?;
        let leaf = self.tree.leaf(handle);
        let item = (leaf.key(index), leaf.value(index));

        if self.front == self.back {
            self.exhausted = true;
        } else {
            self.back = if index > 0 {
                Some((handle, index - 1))
            } else {
                leaf.prev().map(|prev| {
                    let last = self.tree.leaf(prev).key_count() - 1;
                    (prev, last)
                })
            };
        }
        Some(item)
    }
}

impl<K, V> FusedIterator for Range<'_, K, V> {}

impl<K, V> Clone for Range<'_, K, V> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            back: self.back,
            exhausted: self.exhausted,
        }
    }
}

impl<K, V> fmt::Debug for Range<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range").field("exhausted", &self.exhausted).finish()
    }
}
