// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma Store: the observable annotation catalog.
//!
//! This crate owns annotation data for one slide: a keyed catalog of
//! [`Annotation`] records backed by a spatial index for broad-phase queries,
//! with synchronous, batched change events for the layers that render and
//! edit those annotations.
//!
//! ## Ownership
//!
//! The store is the only mutable authority for annotations. The rendering
//! stage and the handle overlay keep derived state keyed by
//! [`AnnotationId`] and refresh it from [`ChangeSet`] events; nothing else
//! holds annotation data. Undoable mutation goes through command objects in
//! the history crate, which call back into the plain operations here.
//!
//! ## Batching
//!
//! ```rust
//! use kurbo::Point;
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use stroma_geometry::{PointShape, Shape};
//! use stroma_store::{Annotation, AnnotationStore};
//!
//! let mut store = AnnotationStore::new();
//! let events = Rc::new(Cell::new(0));
//! let seen = events.clone();
//! store.observe(move |_| seen.set(seen.get() + 1));
//!
//! store.begin_batch();
//! for i in 0..50 {
//!     let shape = Shape::Point(PointShape { point: Point::new(i as f64, 0.0) });
//!     store.add(Annotation::new(format!("p{i}"), shape)).unwrap();
//! }
//! store.end_batch();
//!
//! // Fifty mutations, one event.
//! assert_eq!(events.get(), 1);
//! ```

mod annotation;
mod change;
mod store;

pub use annotation::{Annotation, AnnotationId, Polarity, Properties, Style};
pub use change::ChangeSet;
pub use store::{AnnotationFilter, AnnotationStore, ObserverId, StoreError};
