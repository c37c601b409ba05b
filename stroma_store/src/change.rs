// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batched change events delivered to store observers.

use crate::annotation::{Annotation, AnnotationId};

/// One observer event: everything that changed since the last event.
///
/// Outside a batch every mutation produces a singleton `ChangeSet`. Inside a
/// batch, mutations fold into one aggregated, deduplicated event:
///
/// - update after create stays a create (with the latest contents),
/// - consecutive updates fold into one `(first old, last new)` pair,
/// - delete after create cancels both,
/// - delete after update reports the pre-batch annotation as deleted.
#[derive(Clone, Debug, Default)]
pub struct ChangeSet {
    /// Annotations created, in creation order.
    pub created: Vec<Annotation>,
    /// Annotations updated, as `(old, new)` pairs in first-update order.
    pub updated: Vec<(Annotation, Annotation)>,
    /// Annotations deleted, in deletion order.
    pub deleted: Vec<Annotation>,
}

impl ChangeSet {
    /// Whether the event carries no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub(crate) fn note_created(&mut self, annotation: Annotation) {
        self.created.push(annotation);
    }

    pub(crate) fn note_updated(&mut self, old: Annotation, new: Annotation) {
        if let Some(created) = self.find_created_mut(new.id()) {
            *created = new;
            return;
        }
        if let Some(updated) = self.find_updated_mut(new.id()) {
            updated.1 = new;
            return;
        }
        self.updated.push((old, new));
    }

    pub(crate) fn note_deleted(&mut self, annotation: Annotation) {
        let id = annotation.id().clone();
        if let Some(pos) = self.created.iter().position(|a| *a.id() == id) {
            self.created.remove(pos);
            return;
        }
        if let Some(pos) = self.updated.iter().position(|(old, _)| *old.id() == id) {
            let (pre_batch, _) = self.updated.remove(pos);
            self.deleted.push(pre_batch);
            return;
        }
        self.deleted.push(annotation);
    }

    fn find_created_mut(&mut self, id: &AnnotationId) -> Option<&mut Annotation> {
        self.created.iter_mut().find(|a| a.id() == id)
    }

    fn find_updated_mut(&mut self, id: &AnnotationId) -> Option<&mut (Annotation, Annotation)> {
        self.updated.iter_mut().find(|(old, _)| old.id() == id)
    }
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use stroma_geometry::{PointShape, Shape};

    use super::ChangeSet;
    use crate::annotation::Annotation;

    fn point(id: &str, x: f64) -> Annotation {
        Annotation::new(
            id,
            Shape::Point(PointShape {
                point: Point::new(x, 0.0),
            }),
        )
    }

    #[test]
    fn update_after_create_stays_create() {
        let mut set = ChangeSet::default();
        set.note_created(point("a", 1.0));
        set.note_updated(point("a", 1.0), point("a", 2.0));
        assert_eq!(set.created.len(), 1);
        assert!(set.updated.is_empty());
        assert_eq!(set.created[0].bounds().x0, 2.0);
    }

    #[test]
    fn updates_fold_to_first_old_last_new() {
        let mut set = ChangeSet::default();
        set.note_updated(point("a", 1.0), point("a", 2.0));
        set.note_updated(point("a", 2.0), point("a", 3.0));
        assert_eq!(set.updated.len(), 1);
        assert_eq!(set.updated[0].0.bounds().x0, 1.0);
        assert_eq!(set.updated[0].1.bounds().x0, 3.0);
    }

    #[test]
    fn delete_cancels_create() {
        let mut set = ChangeSet::default();
        set.note_created(point("a", 1.0));
        set.note_deleted(point("a", 1.0));
        assert!(set.is_empty());
    }

    #[test]
    fn delete_after_update_reports_pre_batch_state() {
        let mut set = ChangeSet::default();
        set.note_updated(point("a", 1.0), point("a", 2.0));
        set.note_deleted(point("a", 2.0));
        assert!(set.updated.is_empty());
        assert_eq!(set.deleted.len(), 1);
        assert_eq!(set.deleted[0].bounds().x0, 1.0);
    }
}
