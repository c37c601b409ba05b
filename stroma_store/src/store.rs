// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The observable annotation catalog.

use core::fmt;

use hashbrown::HashMap;
use kurbo::{Point, Rect};
use log::{debug, trace, warn};
use stroma_geometry::hit::{hit_shape, HitParams};
use stroma_index::SpatialIndex;

use crate::annotation::{Annotation, AnnotationId};
use crate::change::ChangeSet;

/// Errors from store mutations. A failed call leaves the store untouched.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An annotation with this id already exists.
    #[error("annotation id already exists: {0}")]
    DuplicateId(AnnotationId),
    /// No annotation with this id exists.
    #[error("unknown annotation id: {0}")]
    UnknownId(AnnotationId),
    /// The replacement annotation carries a different id than the target.
    #[error("annotation id mismatch: expected {expected}, got {got}")]
    IdMismatch {
        /// Id addressed by the call.
        expected: AnnotationId,
        /// Id carried by the replacement annotation.
        got: AnnotationId,
    },
}

/// Handle returned from [`AnnotationStore::observe`], used to unsubscribe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ObserverId(u64);

type ObserverFn = Box<dyn FnMut(&ChangeSet)>;

/// Filter predicate narrowing hit tests to a subset of annotations.
pub type AnnotationFilter<'a> = &'a dyn Fn(&Annotation) -> bool;

/// A keyed annotation catalog over a spatial index, with batched observers.
///
/// The store is the single mutable authority for annotation data; rendering
/// and editing layers hold ids and derived state only, kept current through
/// [`ChangeSet`] events. Every mutation is transactional: precondition
/// failures return an error and change nothing.
///
/// # Batching
///
/// [`AnnotationStore::begin_batch`] opens a batch; mutations then fold into
/// one in-flight [`ChangeSet`] and observers fire exactly once when the
/// outermost [`AnnotationStore::end_batch`] closes it. Outside a batch every
/// mutation fires immediately. Observers run synchronously in subscription
/// order.
pub struct AnnotationStore {
    annotations: HashMap<AnnotationId, Annotation>,
    index: SpatialIndex<AnnotationId>,
    observers: Vec<(ObserverId, ObserverFn)>,
    next_observer: u64,
    batch: ChangeSet,
    batch_depth: u32,
}

impl fmt::Debug for AnnotationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationStore")
            .field("len", &self.annotations.len())
            .field("observers", &self.observers.len())
            .field("batch_depth", &self.batch_depth)
            .finish_non_exhaustive()
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            annotations: HashMap::new(),
            index: SpatialIndex::new(),
            observers: Vec::new(),
            next_observer: 0,
            batch: ChangeSet::default(),
            batch_depth: 0,
        }
    }

    /// Number of annotations in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Looks up an annotation by id.
    #[must_use]
    pub fn get(&self, id: &AnnotationId) -> Option<&Annotation> {
        self.annotations.get(id)
    }

    /// Whether an annotation with `id` exists.
    #[must_use]
    pub fn contains(&self, id: &AnnotationId) -> bool {
        self.annotations.contains_key(id)
    }

    /// Iterates over all annotations in unspecified order.
    pub fn all(&self) -> impl Iterator<Item = &Annotation> {
        self.annotations.values()
    }

    /// Subscribes an observer; it receives every subsequent change event.
    pub fn observe(&mut self, f: impl FnMut(&ChangeSet) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(f)));
        id
    }

    /// Unsubscribes an observer. Returns whether it was subscribed.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Opens a batch. Batches nest; only the outermost close emits.
    pub fn begin_batch(&mut self) {
        self.batch_depth += 1;
    }

    /// Closes a batch, emitting the aggregated event at the outermost close.
    pub fn end_batch(&mut self) {
        match self.batch_depth {
            0 => warn!("end_batch without matching begin_batch"),
            1 => {
                self.batch_depth = 0;
                let set = core::mem::take(&mut self.batch);
                if !set.is_empty() {
                    self.dispatch(&set);
                }
            }
            _ => self.batch_depth -= 1,
        }
    }

    /// Adds a new annotation.
    pub fn add(&mut self, annotation: Annotation) -> Result<(), StoreError> {
        if self.annotations.contains_key(annotation.id()) {
            return Err(StoreError::DuplicateId(annotation.id().clone()));
        }
        debug!("add annotation {}", annotation.id());
        self.index.insert(annotation.id().clone(), annotation.bounds());
        self.annotations
            .insert(annotation.id().clone(), annotation.clone());
        self.record(|set| set.note_created(annotation));
        Ok(())
    }

    /// Adds many annotations as one event. Transactional: if any id is
    /// already present (or duplicated within the input), nothing is added.
    pub fn bulk_add(&mut self, annotations: Vec<Annotation>) -> Result<(), StoreError> {
        for (i, a) in annotations.iter().enumerate() {
            if self.annotations.contains_key(a.id())
                || annotations[..i].iter().any(|b| b.id() == a.id())
            {
                return Err(StoreError::DuplicateId(a.id().clone()));
            }
        }
        self.begin_batch();
        for a in annotations {
            // Ids were validated above; add cannot fail.
            let _ = self.add(a);
        }
        self.end_batch();
        Ok(())
    }

    /// Replaces the annotation with id `id`.
    ///
    /// The replacement must carry the same id. Returns the previous state.
    pub fn update(
        &mut self,
        id: &AnnotationId,
        annotation: Annotation,
    ) -> Result<Annotation, StoreError> {
        if annotation.id() != id {
            return Err(StoreError::IdMismatch {
                expected: id.clone(),
                got: annotation.id().clone(),
            });
        }
        let Some(slot) = self.annotations.get_mut(id) else {
            return Err(StoreError::UnknownId(id.clone()));
        };
        let old = core::mem::replace(slot, annotation.clone());
        self.index.insert(id.clone(), annotation.bounds());
        trace!("update annotation {id}");
        self.record(|set| set.note_updated(old.clone(), annotation));
        Ok(old)
    }

    /// Deletes the annotation with id `id`, returning it.
    pub fn delete(&mut self, id: &AnnotationId) -> Result<Annotation, StoreError> {
        let Some(old) = self.annotations.remove(id) else {
            return Err(StoreError::UnknownId(id.clone()));
        };
        self.index.remove(id);
        debug!("delete annotation {id}");
        self.record(|set| set.note_deleted(old.clone()));
        Ok(old)
    }

    /// Deletes every annotation, emitting a single event.
    pub fn clear(&mut self) {
        if self.annotations.is_empty() {
            return;
        }
        debug!("clear {} annotations", self.annotations.len());
        let all: Vec<Annotation> = self.annotations.drain().map(|(_, a)| a).collect();
        self.index.clear();
        self.record(move |set| {
            for a in all {
                set.note_deleted(a);
            }
        });
    }

    /// Every annotation whose bounds intersect `rect` (broad phase only).
    #[must_use]
    pub fn search(&self, rect: Rect) -> Vec<&Annotation> {
        let mut out = Vec::new();
        self.index.visit_rect(rect, |id| {
            if let Some(a) = self.annotations.get(id) {
                out.push(a);
            }
        });
        out
    }

    /// Exact hit test at `pt` with `tolerance` image pixels.
    ///
    /// Fetches a small candidate set by bounding box, refines with per-shape
    /// geometry, and returns the closest hit (interiors beat tolerant edge
    /// hits). `filter` narrows candidacy before the geometric test.
    #[must_use]
    pub fn get_at(
        &self,
        pt: Point,
        filter: Option<AnnotationFilter<'_>>,
        tolerance: f64,
    ) -> Option<&Annotation> {
        let probe = Rect::new(
            pt.x - tolerance,
            pt.y - tolerance,
            pt.x + tolerance,
            pt.y + tolerance,
        );
        let params = HitParams::uniform(tolerance);
        let mut best: Option<(f64, &Annotation)> = None;
        self.index.visit_rect(probe, |id| {
            let Some(a) = self.annotations.get(id) else {
                return;
            };
            if let Some(f) = filter
                && !f(a)
            {
                return;
            }
            if let Some(score) = hit_shape(a.shape(), pt, &params) {
                let better = best
                    .as_ref()
                    .is_none_or(|(d, _)| score.distance < *d);
                if better {
                    best = Some((score.distance, a));
                }
            }
        });
        best.map(|(_, a)| a)
    }

    fn record(&mut self, f: impl FnOnce(&mut ChangeSet)) {
        if self.batch_depth > 0 {
            f(&mut self.batch);
        } else {
            let mut set = ChangeSet::default();
            f(&mut set);
            if !set.is_empty() {
                self.dispatch(&set);
            }
        }
    }

    fn dispatch(&mut self, set: &ChangeSet) {
        trace!(
            "dispatch change: {} created, {} updated, {} deleted",
            set.created.len(),
            set.updated.len(),
            set.deleted.len()
        );
        for (_, observer) in &mut self.observers {
            observer(set);
        }
    }
}
