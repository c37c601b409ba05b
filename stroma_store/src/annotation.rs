// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Annotation records: identity, shape with cached bounds, properties, style.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use kurbo::Rect;
use peniko::Color;
use stroma_geometry::Shape;

/// Cheap-to-clone string identifier, unique within one store.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(Arc<str>);

impl AnnotationId {
    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AnnotationId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for AnnotationId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mask polarity used by classification and category properties.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Polarity {
    /// Foreground / include.
    Positive,
    /// Background / exclude.
    Negative,
}

impl Polarity {
    /// Canonical lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }

    /// Parses the canonical lowercase name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            _ => None,
        }
    }
}

/// Free-form annotation metadata with first-class recognized keys.
///
/// The recognized keys drive engine behavior (layer routing, mask polarity,
/// tool bookkeeping); everything else rides along in `extra` untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
    /// Target layer id, used when that layer declares no filter.
    pub layer: Option<String>,
    /// Prompt polarity for assisted segmentation inputs.
    pub category: Option<Polarity>,
    /// Mask polarity for composition (negative masks render above positive).
    pub classification: Option<Polarity>,
    /// Producer of the annotation (tool name, import, analysis pass).
    pub source: Option<String>,
    /// Human-readable label.
    pub label: Option<String>,
    /// Arbitrary tags.
    pub tags: Vec<String>,
    /// Transient marker: part of an in-progress split preview. Annotations
    /// carrying it get no edit handles.
    pub split_preview: bool,
    /// Transient marker: an in-progress tool shape that is already rendered
    /// live but not yet committed to history.
    pub drawing: bool,
    /// Unrecognized key/value pairs, carried verbatim.
    pub extra: BTreeMap<String, String>,
}

/// Per-annotation style override; unset fields fall back to the stage style.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Style {
    /// Fill color.
    pub fill: Option<Color>,
    /// Fill opacity in `[0, 1]`.
    pub fill_opacity: Option<f32>,
    /// Stroke color.
    pub stroke: Option<Color>,
    /// Stroke opacity in `[0, 1]`.
    pub stroke_opacity: Option<f32>,
    /// Stroke width in screen pixels.
    pub stroke_width: Option<f64>,
    /// Point marker radius in screen pixels.
    pub point_radius: Option<f64>,
}

/// One annotation: identity, geometry, metadata, optional style override.
///
/// The bounding box is cached and kept in sync with the shape; replacing the
/// shape through [`Annotation::set_shape`] or [`Annotation::with_shape`] is
/// the only way to change geometry, so the cache cannot go stale.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    id: AnnotationId,
    shape: Shape,
    bounds: Rect,
    /// Metadata driving layer routing and tool behavior.
    pub properties: Properties,
    /// Optional per-annotation style override.
    pub style: Option<Style>,
}

impl Annotation {
    /// Creates an annotation, computing its bounds from the shape.
    #[must_use]
    pub fn new(id: impl Into<AnnotationId>, shape: Shape) -> Self {
        let bounds = shape.bounds();
        Self {
            id: id.into(),
            shape,
            bounds,
            properties: Properties::default(),
            style: None,
        }
    }

    /// Builder-style properties assignment.
    #[must_use]
    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Builder-style style assignment.
    #[must_use]
    pub fn with_style(mut self, style: Style) -> Self {
        self.style = Some(style);
        self
    }

    /// The annotation's id.
    #[must_use]
    pub fn id(&self) -> &AnnotationId {
        &self.id
    }

    /// The annotation's shape.
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The cached tight bounding box of the shape.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Replaces the shape, recomputing the cached bounds.
    pub fn set_shape(&mut self, shape: Shape) {
        self.bounds = shape.bounds();
        self.shape = shape;
    }

    /// Returns a copy carrying `shape` (bounds recomputed).
    #[must_use]
    pub fn with_shape(&self, shape: Shape) -> Self {
        let mut out = self.clone();
        out.set_shape(shape);
        out
    }
}

#[cfg(test)]
mod tests {
    use kurbo::{Point, Rect};
    use stroma_geometry::{PolygonShape, RectangleShape, Shape};

    use super::*;

    #[test]
    fn bounds_cache_follows_shape() {
        let mut ann = Annotation::new(
            "a",
            Shape::Rectangle(RectangleShape::new(0.0, 0.0, 10.0, 10.0)),
        );
        assert_eq!(ann.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));

        ann.set_shape(Shape::Polygon(PolygonShape::new(vec![
            Point::new(5.0, 5.0),
            Point::new(25.0, 5.0),
            Point::new(25.0, 40.0),
        ])));
        assert_eq!(ann.bounds(), Rect::new(5.0, 5.0, 25.0, 40.0));
        assert_eq!(ann.bounds(), ann.shape().bounds());
    }

    #[test]
    fn polarity_parse_roundtrip() {
        assert_eq!(Polarity::parse("positive"), Some(Polarity::Positive));
        assert_eq!(Polarity::parse("negative"), Some(Polarity::Negative));
        assert_eq!(Polarity::parse("Positive"), None);
        assert_eq!(Polarity::Negative.as_str(), "negative");
    }

    #[test]
    fn ids_compare_by_content() {
        let a: AnnotationId = "cell-1".into();
        let b: AnnotationId = String::from("cell-1").into();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "cell-1");
    }
}
