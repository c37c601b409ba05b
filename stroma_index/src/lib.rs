// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma Index: a key-addressed 2D AABB index for annotation catalogs.
//!
//! Scenes routinely hold tens of thousands of annotations over images
//! billions of pixels wide, so every pointer interaction starts with a
//! broad-phase query: "which annotations might be under this point or
//! inside this viewport?" This crate answers that in `O(log n + k)` with an
//! R-tree backend, behind a small key-addressed API:
//!
//! - [`SpatialIndex::insert`] has *re-insert* semantics: indexing a key that
//!   is already present replaces its box.
//! - [`SpatialIndex::search`] / [`SpatialIndex::visit_rect`] return every
//!   key whose box intersects a query rectangle (closed edges, zero-area
//!   boxes included, so point annotations are always found).
//! - Exact, tolerance-based refinement of candidates is out of scope here;
//!   that lives with the shape geometry.
//!
//! Keys are application-defined (`Eq + Hash + Clone`); internally they map
//! to dense slots handed to a pluggable [`Backend`]. The default backend is
//! a dynamic R-tree; a linear-scan [`backends::flatvec::FlatVec`] exists for
//! tiny sets and differential testing.
//!
//! ## Minimal example
//!
//! ```rust
//! use kurbo::Rect;
//! use stroma_index::SpatialIndex;
//!
//! let mut index: SpatialIndex<&'static str> = SpatialIndex::new();
//! index.insert("cell-1", Rect::new(0.0, 0.0, 10.0, 10.0));
//! index.insert("cell-2", Rect::new(100.0, 100.0, 110.0, 110.0));
//!
//! let hits = index.search(Rect::new(5.0, 5.0, 20.0, 20.0));
//! assert_eq!(hits, vec![&"cell-1"]);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

use alloc::vec::Vec;
use core::hash::Hash;

use hashbrown::HashMap;
use kurbo::{Point, Rect};

pub mod backend;
pub mod backends;

pub use backend::Backend;
pub use backends::rtree::RTree;

/// A key-addressed spatial index over axis-aligned boxes.
///
/// The index maps each key to one box. Mutations keep the backend and the
/// key table consistent; a key is either fully present (queryable, with a
/// box) or fully absent.
#[derive(Debug)]
pub struct SpatialIndex<K, B = RTree> {
    slots: Vec<Option<(K, Rect)>>,
    free: Vec<usize>,
    by_key: HashMap<K, usize>,
    backend: B,
}

impl<K, B> Default for SpatialIndex<K, B>
where
    K: Eq + Hash + Clone,
    B: Backend + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, B> SpatialIndex<K, B>
where
    K: Eq + Hash + Clone,
    B: Backend + Default,
{
    /// Creates an empty index using the backend's default constructor.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(B::default())
    }
}

impl<K, B> SpatialIndex<K, B>
where
    K: Eq + Hash + Clone,
    B: Backend,
{
    /// Creates an empty index using an explicit backend instance.
    #[must_use]
    pub fn with_backend(backend: B) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_key: HashMap::new(),
            backend,
        }
    }

    /// Number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether the index holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Whether `key` is indexed.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.by_key.contains_key(key)
    }

    /// The indexed box for `key`, if present.
    #[must_use]
    pub fn bounds(&self, key: &K) -> Option<Rect> {
        let slot = *self.by_key.get(key)?;
        self.slots[slot].as_ref().map(|(_, r)| *r)
    }

    /// Iterates over all indexed keys in unspecified order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.by_key.keys()
    }

    /// Indexes `key` with `bounds`.
    ///
    /// Re-insert semantics: a key that is already present has its box
    /// replaced rather than duplicated.
    pub fn insert(&mut self, key: K, bounds: Rect) {
        if let Some(&slot) = self.by_key.get(&key) {
            self.slots[slot] = Some((key, bounds));
            self.backend.update(slot, bounds);
            return;
        }
        let slot = if let Some(slot) = self.free.pop() {
            self.slots[slot] = Some((key.clone(), bounds));
            slot
        } else {
            self.slots.push(Some((key.clone(), bounds)));
            self.slots.len() - 1
        };
        self.by_key.insert(key, slot);
        self.backend.insert(slot, bounds);
    }

    /// Removes `key` from the index. Returns whether it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        let Some(slot) = self.by_key.remove(key) else {
            return false;
        };
        self.slots[slot] = None;
        self.free.push(slot);
        self.backend.remove(slot);
        true
    }

    /// Removes every key.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.by_key.clear();
        self.backend.clear();
    }

    /// Visits every key whose box intersects `rect`.
    pub fn visit_rect<'a, F: FnMut(&'a K)>(&'a self, rect: Rect, mut f: F) {
        self.backend.visit_rect(rect, |slot| {
            if let Some(Some((key, _))) = self.slots.get(slot) {
                f(key);
            }
        });
    }

    /// Visits every key whose box contains `pt`.
    pub fn visit_point<'a, F: FnMut(&'a K)>(&'a self, pt: Point, mut f: F) {
        self.backend.visit_point(pt, |slot| {
            if let Some(Some((key, _))) = self.slots.get(slot) {
                f(key);
            }
        });
    }

    /// Collects every key whose box intersects `rect`.
    #[must_use]
    pub fn search(&self, rect: Rect) -> Vec<&K> {
        let mut out = Vec::new();
        self.visit_rect(rect, |k| out.push(k));
        out
    }
}
