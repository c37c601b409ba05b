// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroma Layers: ordered rendering layers for annotation composition.
//!
//! A layer groups annotations for rendering: it carries visibility, a lock
//! flag, an opacity, and a z-index, plus an optional membership *filter* — a
//! predicate over annotations. An annotation renders inside every layer
//! whose filter accepts it; a layer without a filter instead matches
//! annotations whose `properties.layer` names its id.
//!
//! [`LayerManager::composition_order`] resolves the draw order: visible
//! layers ascending by z-index, stable by creation order for equal indices.
//! The built-in `image` pseudo-layer (z −1) only carries the underlying
//! image's visibility; annotations never resolve into it.
//!
//! Mask polarity helpers build the filters used to keep negative masks
//! composited above positive masks regardless of insertion order:
//!
//! ```rust
//! use stroma_layers::{Layer, LayerManager, mask_polarity_filter};
//! use stroma_store::Polarity;
//!
//! let mut layers = LayerManager::new();
//! layers
//!     .create(
//!         Layer::new("pos").with_z_index(1).with_filter(mask_polarity_filter(Polarity::Positive)),
//!     )
//!     .unwrap();
//! layers
//!     .create(
//!         Layer::new("neg").with_z_index(2).with_filter(mask_polarity_filter(Polarity::Negative)),
//!     )
//!     .unwrap();
//! let order: Vec<_> = layers.composition_order().map(|l| l.id.as_str()).collect();
//! assert_eq!(order, ["pos", "neg"]);
//! ```

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use log::debug;
use stroma_geometry::Shape;
use stroma_store::{Annotation, Polarity};

/// Id of the built-in pseudo-layer carrying the underlying image visibility.
pub const IMAGE_LAYER_ID: &str = "image";

/// Cheap-to-clone string identifier for a layer.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct LayerId(Arc<str>);

impl LayerId {
    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for LayerId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Membership predicate assigning annotations to a layer.
pub type LayerFilter = Rc<dyn Fn(&Annotation) -> bool>;

/// One rendering layer.
#[derive(Clone)]
pub struct Layer {
    /// Unique id within the manager.
    pub id: LayerId,
    /// Display name.
    pub name: String,
    /// Whether the layer (and its annotations) render at all.
    pub visible: bool,
    /// Whether interactive edits on member annotations are blocked.
    pub locked: bool,
    /// Group opacity in `[0, 1]`.
    pub opacity: f32,
    /// Composition order; smaller renders lower.
    pub z_index: i32,
    /// Membership filter; overrides `properties.layer` routing when set.
    pub filter: Option<LayerFilter>,
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visible", &self.visible)
            .field("locked", &self.locked)
            .field("opacity", &self.opacity)
            .field("z_index", &self.z_index)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl Layer {
    /// Creates a visible, unlocked, fully opaque layer at z 0, named after
    /// its id.
    #[must_use]
    pub fn new(id: impl Into<LayerId>) -> Self {
        let id = id.into();
        let name = id.as_str().to_owned();
        Self {
            id,
            name,
            visible: true,
            locked: false,
            opacity: 1.0,
            z_index: 0,
            filter: None,
        }
    }

    /// Builder-style display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder-style z-index.
    #[must_use]
    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = z_index;
        self
    }

    /// Builder-style opacity (clamped to `[0, 1]`).
    #[must_use]
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    /// Builder-style membership filter.
    #[must_use]
    pub fn with_filter(mut self, filter: LayerFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Whether this layer accepts `annotation`.
    ///
    /// A filter decides outright; without one, the annotation's
    /// `properties.layer` must name this layer.
    #[must_use]
    pub fn accepts(&self, annotation: &Annotation) -> bool {
        match &self.filter {
            Some(f) => f(annotation),
            None => annotation
                .properties
                .layer
                .as_deref()
                .is_some_and(|l| l == self.id.as_str()),
        }
    }
}

/// Errors from layer mutations.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// A layer with this id already exists.
    #[error("layer id already exists: {0}")]
    DuplicateLayer(LayerId),
    /// No layer with this id exists.
    #[error("unknown layer id: {0}")]
    UnknownLayer(LayerId),
    /// The built-in image pseudo-layer cannot be deleted.
    #[error("the image pseudo-layer cannot be deleted")]
    BuiltInLayer,
}

/// What changed in a [`LayerEvent`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LayerEventKind {
    /// A layer was created.
    Created,
    /// A layer's attributes or filter changed.
    Updated,
    /// A layer was deleted.
    Deleted,
}

/// Structural change notification.
#[derive(Clone, Debug)]
pub struct LayerEvent {
    /// The affected layer.
    pub layer: LayerId,
    /// What happened to it.
    pub kind: LayerEventKind,
}

/// Handle returned from [`LayerManager::observe`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct LayerObserverId(u64);

type LayerObserverFn = Box<dyn FnMut(&LayerEvent)>;

/// Stores layers by id and resolves composition order and membership.
pub struct LayerManager {
    /// Layers in creation order; the stable tiebreak for equal z-indices.
    layers: Vec<Layer>,
    observers: Vec<(LayerObserverId, LayerObserverFn)>,
    next_observer: u64,
}

impl fmt::Debug for LayerManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerManager")
            .field("layers", &self.layers)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerManager {
    /// Creates a manager seeded with the built-in image pseudo-layer.
    #[must_use]
    pub fn new() -> Self {
        let image = Layer::new(IMAGE_LAYER_ID)
            .with_name("Image")
            .with_z_index(-1);
        Self {
            layers: vec![image],
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Subscribes an observer for structural changes.
    pub fn observe(&mut self, f: impl FnMut(&LayerEvent) + 'static) -> LayerObserverId {
        let id = LayerObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(f)));
        id
    }

    /// Unsubscribes an observer. Returns whether it was subscribed.
    pub fn unobserve(&mut self, id: LayerObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    /// Adds a new layer.
    pub fn create(&mut self, layer: Layer) -> Result<(), LayerError> {
        if self.get(&layer.id).is_some() {
            return Err(LayerError::DuplicateLayer(layer.id));
        }
        debug!("create layer {}", layer.id);
        let id = layer.id.clone();
        self.layers.push(layer);
        self.emit(id, LayerEventKind::Created);
        Ok(())
    }

    /// Looks up a layer by id.
    #[must_use]
    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == *id)
    }

    /// Iterates over all layers in creation order, the image pseudo-layer
    /// first.
    pub fn all(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    /// Applies `f` to the layer with id `id` and notifies observers.
    pub fn update(
        &mut self,
        id: &LayerId,
        f: impl FnOnce(&mut Layer),
    ) -> Result<(), LayerError> {
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.id == *id)
            .ok_or_else(|| LayerError::UnknownLayer(id.clone()))?;
        f(layer);
        layer.opacity = layer.opacity.clamp(0.0, 1.0);
        self.emit(id.clone(), LayerEventKind::Updated);
        Ok(())
    }

    /// Sets layer visibility.
    pub fn set_visible(&mut self, id: &LayerId, visible: bool) -> Result<(), LayerError> {
        self.update(id, |l| l.visible = visible)
    }

    /// Sets the layer lock flag.
    pub fn set_locked(&mut self, id: &LayerId, locked: bool) -> Result<(), LayerError> {
        self.update(id, |l| l.locked = locked)
    }

    /// Sets layer opacity (clamped to `[0, 1]`).
    pub fn set_opacity(&mut self, id: &LayerId, opacity: f32) -> Result<(), LayerError> {
        self.update(id, |l| l.opacity = opacity)
    }

    /// Sets the layer z-index.
    pub fn set_z_index(&mut self, id: &LayerId, z_index: i32) -> Result<(), LayerError> {
        self.update(id, |l| l.z_index = z_index)
    }

    /// Replaces the layer's membership filter.
    pub fn set_filter(
        &mut self,
        id: &LayerId,
        filter: Option<LayerFilter>,
    ) -> Result<(), LayerError> {
        self.update(id, |l| l.filter = filter)
    }

    /// Deletes a layer. The image pseudo-layer is refused.
    pub fn delete(&mut self, id: &LayerId) -> Result<(), LayerError> {
        if id.as_str() == IMAGE_LAYER_ID {
            return Err(LayerError::BuiltInLayer);
        }
        let before = self.layers.len();
        self.layers.retain(|l| l.id != *id);
        if self.layers.len() == before {
            return Err(LayerError::UnknownLayer(id.clone()));
        }
        debug!("delete layer {id}");
        self.emit(id.clone(), LayerEventKind::Deleted);
        Ok(())
    }

    /// Visible annotation layers, ascending by z-index, stable by creation
    /// order. The image pseudo-layer is excluded.
    pub fn composition_order(&self) -> impl Iterator<Item = &Layer> {
        let mut visible: Vec<&Layer> = self
            .layers
            .iter()
            .filter(|l| l.visible && l.id.as_str() != IMAGE_LAYER_ID)
            .collect();
        visible.sort_by_key(|l| l.z_index);
        visible.into_iter()
    }

    /// Every annotation layer accepting `annotation`, in composition order.
    #[must_use]
    pub fn resolve(&self, annotation: &Annotation) -> Vec<&LayerId> {
        self.composition_order()
            .filter(|l| l.accepts(annotation))
            .map(|l| &l.id)
            .collect()
    }

    /// Whether the underlying image should be shown.
    #[must_use]
    pub fn image_visible(&self) -> bool {
        self.get(&IMAGE_LAYER_ID.into()).is_none_or(|l| l.visible)
    }

    fn emit(&mut self, layer: LayerId, kind: LayerEventKind) {
        let event = LayerEvent { layer, kind };
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
    }
}

/// Whether an annotation's shape is a segmentation mask shape.
///
/// Masks are area shapes produced by segmentation: polygons, multipolygons,
/// and closed freehand paths.
#[must_use]
pub fn is_mask_shape(annotation: &Annotation) -> bool {
    match annotation.shape() {
        Shape::Polygon(_) | Shape::MultiPolygon(_) => true,
        Shape::Freehand(f) => f.closed,
        _ => false,
    }
}

/// Builds the filter `is_mask_shape ∧ classification == polarity`.
///
/// Used to split masks into one layer per polarity so negative masks always
/// composite above positive masks.
#[must_use]
pub fn mask_polarity_filter(polarity: Polarity) -> LayerFilter {
    Rc::new(move |a: &Annotation| {
        is_mask_shape(a) && a.properties.classification == Some(polarity)
    })
}

#[cfg(test)]
mod tests {
    use kurbo::Point;
    use stroma_geometry::{PointShape, PolygonShape, Shape};
    use stroma_store::{Annotation, Polarity};

    use super::*;

    fn poly_ann(id: &str, polarity: Option<Polarity>) -> Annotation {
        let mut a = Annotation::new(
            id,
            Shape::Polygon(PolygonShape::new(vec![
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(0.0, 1.0),
            ])),
        );
        a.properties.classification = polarity;
        a
    }

    #[test]
    fn composition_order_sorts_by_z_stable() {
        let mut layers = LayerManager::new();
        layers.create(Layer::new("b").with_z_index(1)).unwrap();
        layers.create(Layer::new("a").with_z_index(0)).unwrap();
        layers.create(Layer::new("c").with_z_index(1)).unwrap();

        let order: Vec<_> = layers.composition_order().map(|l| l.id.as_str()).collect();
        // Equal z keeps creation order: b before c.
        assert_eq!(order, ["a", "b", "c"]);
    }

    #[test]
    fn hidden_layers_drop_out_of_composition() {
        let mut layers = LayerManager::new();
        layers.create(Layer::new("a")).unwrap();
        layers.create(Layer::new("b")).unwrap();
        layers.set_visible(&"a".into(), false).unwrap();

        let order: Vec<_> = layers.composition_order().map(|l| l.id.as_str()).collect();
        assert_eq!(order, ["b"]);
    }

    #[test]
    fn filter_overrides_property_routing() {
        let mut layers = LayerManager::new();
        layers
            .create(Layer::new("masks").with_filter(mask_polarity_filter(Polarity::Positive)))
            .unwrap();
        layers.create(Layer::new("named")).unwrap();

        let pos = poly_ann("m", Some(Polarity::Positive));
        assert_eq!(layers.resolve(&pos), [&LayerId::from("masks")]);

        // Property routing only applies to filterless layers.
        let mut named = Annotation::new(
            "n",
            Shape::Point(PointShape {
                point: Point::new(0.0, 0.0),
            }),
        );
        named.properties.layer = Some("named".to_owned());
        assert_eq!(layers.resolve(&named), [&LayerId::from("named")]);
    }

    #[test]
    fn polarity_layers_order_negative_above_positive() {
        let mut layers = LayerManager::new();
        layers
            .create(
                Layer::new("neg")
                    .with_z_index(2)
                    .with_filter(mask_polarity_filter(Polarity::Negative)),
            )
            .unwrap();
        layers
            .create(
                Layer::new("pos")
                    .with_z_index(1)
                    .with_filter(mask_polarity_filter(Polarity::Positive)),
            )
            .unwrap();

        let order: Vec<_> = layers.composition_order().map(|l| l.id.as_str()).collect();
        assert_eq!(order, ["pos", "neg"]);

        assert_eq!(
            layers.resolve(&poly_ann("p", Some(Polarity::Positive))),
            [&LayerId::from("pos")]
        );
        assert_eq!(
            layers.resolve(&poly_ann("n", Some(Polarity::Negative))),
            [&LayerId::from("neg")]
        );
        assert!(layers.resolve(&poly_ann("x", None)).is_empty());
    }

    #[test]
    fn image_pseudo_layer_is_protected() {
        let mut layers = LayerManager::new();
        assert!(layers.image_visible());
        assert!(matches!(
            layers.delete(&IMAGE_LAYER_ID.into()),
            Err(LayerError::BuiltInLayer)
        ));
        layers.set_visible(&IMAGE_LAYER_ID.into(), false).unwrap();
        assert!(!layers.image_visible());
        // Never part of annotation composition.
        assert!(layers.composition_order().next().is_none());
    }

    #[test]
    fn observers_see_structural_changes() {
        let mut layers = LayerManager::new();
        let events = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = events.clone();
        layers.observe(move |e| sink.borrow_mut().push((e.layer.clone(), e.kind)));

        layers.create(Layer::new("a")).unwrap();
        layers.set_opacity(&"a".into(), 0.5).unwrap();
        layers.delete(&"a".into()).unwrap();

        let events = events.borrow();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].1, LayerEventKind::Created);
        assert_eq!(events[1].1, LayerEventKind::Updated);
        assert_eq!(events[2].1, LayerEventKind::Deleted);
    }
}
