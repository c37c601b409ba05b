// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Annotator events and the subscription registry.

use core::fmt;

use kurbo::Point;
use stroma_store::{Annotation, AnnotationId};

/// Events emitted by the annotator for the UI layer.
#[derive(Clone, Debug)]
pub enum AnnotatorEvent {
    /// An annotation entered the catalog.
    CreateAnnotation(Annotation),
    /// An annotation's contents changed.
    UpdateAnnotation {
        /// State before the change.
        old: Annotation,
        /// State after the change.
        new: Annotation,
    },
    /// An annotation left the catalog.
    DeleteAnnotation(Annotation),
    /// The selection changed; ids in selection order.
    SelectionChanged(Vec<AnnotationId>),
    /// Right-press hit an annotation; the UI shows its context menu.
    AnnotationMenu {
        /// The annotation under the pointer.
        id: AnnotationId,
        /// Menu anchor in screen pixels.
        screen: Point,
    },
    /// Right-press hit empty canvas; the UI shows the viewer menu.
    ViewerMenu {
        /// Menu anchor in screen pixels.
        screen: Point,
    },
}

/// Event classes for subscription filtering.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    /// [`AnnotatorEvent::CreateAnnotation`].
    CreateAnnotation,
    /// [`AnnotatorEvent::UpdateAnnotation`].
    UpdateAnnotation,
    /// [`AnnotatorEvent::DeleteAnnotation`].
    DeleteAnnotation,
    /// [`AnnotatorEvent::SelectionChanged`].
    SelectionChanged,
    /// [`AnnotatorEvent::AnnotationMenu`].
    AnnotationMenu,
    /// [`AnnotatorEvent::ViewerMenu`].
    ViewerMenu,
}

impl AnnotatorEvent {
    /// The event's class.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::CreateAnnotation(_) => EventKind::CreateAnnotation,
            Self::UpdateAnnotation { .. } => EventKind::UpdateAnnotation,
            Self::DeleteAnnotation(_) => EventKind::DeleteAnnotation,
            Self::SelectionChanged(_) => EventKind::SelectionChanged,
            Self::AnnotationMenu { .. } => EventKind::AnnotationMenu,
            Self::ViewerMenu { .. } => EventKind::ViewerMenu,
        }
    }
}

/// Handle returned from [`EventEmitter::on`], used to unsubscribe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(u64);

type ListenerFn = Box<dyn FnMut(&AnnotatorEvent)>;

/// Subscription registry; listeners run synchronously in subscription
/// order.
#[derive(Default)]
pub struct EventEmitter {
    listeners: Vec<(ListenerId, EventKind, ListenerFn)>,
    next: u64,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Subscribes to events of `kind`.
    pub fn on(&mut self, kind: EventKind, f: impl FnMut(&AnnotatorEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.listeners.push((id, kind, Box::new(f)));
        id
    }

    /// Unsubscribes a listener. Returns whether it was subscribed.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Delivers `event` to every listener subscribed to its kind.
    pub fn emit(&mut self, event: &AnnotatorEvent) {
        let kind = event.kind();
        for (_, k, f) in &mut self.listeners {
            if *k == kind {
                f(event);
            }
        }
    }
}
