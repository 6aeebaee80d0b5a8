//! An in-memory B+ tree ordered map for Rust.
//!
//! This crate provides [`BPlusTreeMap`], an ordered key-value index built as
//! a B+ tree with a caller-chosen order. All entries live in leaf nodes that
//! form a doubly-linked chain, so ordered traversal and range scans touch
//! each leaf exactly once:
//!
//! - [`get`](BPlusTreeMap::get) / [`insert`](BPlusTreeMap::insert) /
//!   [`remove`](BPlusTreeMap::remove) - O(log n) point operations
//! - [`range_query`](BPlusTreeMap::range_query) - inclusive range scan over
//!   the leaf chain
//! - [`bulk_load`](BPlusTreeMap::bulk_load) - O(n) bottom-up construction
//!   from presorted input
//! - [`save`](BPlusTreeMap::save) / [`load`](BPlusTreeMap::load) - binary
//!   persistence for fixed-width payload types
//!
//! # Example
//!
//! ```
//! use leafline::BPlusTreeMap;
//!
//! let mut index = BPlusTreeMap::new();
//! index.insert(10, "ten");
//! index.insert(20, "twenty");
//! index.insert(5, "five");
//!
//! assert_eq!(index.get(&10), Some(&"ten"));
//! assert_eq!(index.len(), 3);
//!
//! // Entries come back in key order.
//! let keys: Vec<i32> = index.iter().map(|(k, _)| *k).collect();
//! assert_eq!(keys, [5, 10, 20]);
//!
//! // Inclusive range scan.
//! let hits = index.range_query(&5, &10);
//! assert_eq!(hits, [(5, "five"), (10, "ten")]);
//! ```
//!
//! # Features
//!
//! - **Runtime order** - the branching factor is chosen per tree at
//!   construction ([`BPlusTreeMap::with_order`]), clamped to a minimum of 3
//! - **Linked leaves** - forward and reverse ordered iteration without
//!   re-descending the tree
//! - **Bulk loading** - builds a balanced, minimum-occupancy tree from
//!   sorted input in linear time
//! - **Binary persistence** - compact save/load for bitwise-copyable key
//!   and value types, enforced at compile time
//! - **Structural validation** - [`BPlusTreeMap::validate`] checks every
//!   tree invariant, for use in tests and debugging
//! - **Introspection** - [`BPlusTreeMap::statistics`] reports node counts
//!   and split/merge/redistribute counters; fill-factor queries show how
//!   densely the tree is packed
//!
//! # Implementation
//!
//! Nodes are stored in a slot arena and addressed by niche-optimized
//! handles, so parent and sibling back-references are plain indices rather
//! than owning pointers. Internal nodes hold separator keys where
//! `separator[i]` is the smallest key in the subtree of `children[i + 1]`;
//! a lookup key equal to a separator descends right. Splits promote keys
//! upward, underflows borrow from a sibling or merge with one, and the root
//! grows and shrinks at the top.

#![forbid(keyword_idents)]
#![allow(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]

mod error;
mod persist;
mod raw;
mod stats;

pub mod tree;

pub use error::{Result, TreeError};
pub use stats::Statistics;
pub use tree::{BPlusTreeMap, Iter, Range};

/// The order used by [`BPlusTreeMap::new`].
///
/// A node of order `m` has at most `m` children and `m - 1` keys. Order 4
/// keeps nodes small enough that point operations stay cheap at tiny sizes
/// while still amortizing rebalancing work.
pub const DEFAULT_ORDER: usize = 4;

/// The smallest order a tree can be constructed with.
///
/// Below order 3 a node could not be split into two non-empty halves;
/// [`BPlusTreeMap::with_order`] clamps smaller requests up to this value.
pub const MIN_ORDER: usize = 3;
