// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GeoJSON import/export for annotations.
//!
//! Geometry mapping (both directions where unambiguous):
//!
//! | shape | GeoJSON |
//! |---|---|
//! | point | `Point` |
//! | rectangle, polygon, closed freehand | `Polygon` |
//! | multipolygon | `MultiPolygon` |
//! | open freehand | `LineString` |
//!
//! Rectangles flatten to polygons on export and come back as polygons.
//! Raster patches have no GeoJSON representation and are skipped.
//! Recognized properties round-trip through the feature `properties`
//! member; transient markers (`drawing`, split previews) are dropped.

use kurbo::Point;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use stroma_geometry::{FreehandShape, MultiPolygonShape, PointShape, PolygonShape, Shape};
use stroma_store::{Annotation, Polarity};

use crate::FormatError;

type Position = [f64; 2];

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Point {
        coordinates: Position,
    },
    LineString {
        coordinates: Vec<Position>,
    },
    Polygon {
        coordinates: Vec<Vec<Position>>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Vec<Position>>>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    geometry: Geometry,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<Feature>,
}

/// Serializes annotations to a GeoJSON `FeatureCollection` string.
///
/// Raster-patch annotations are skipped; everything else maps per the
/// module table.
pub fn export(annotations: &[Annotation]) -> Result<String, FormatError> {
    let features = annotations
        .iter()
        .filter_map(feature_from_annotation)
        .collect();
    let collection = FeatureCollection {
        kind: "FeatureCollection".to_owned(),
        features,
    };
    Ok(serde_json::to_string_pretty(&collection)?)
}

/// Parses a GeoJSON `FeatureCollection` into annotations.
///
/// Features without an `id` get `feature-{index}`.
pub fn import(text: &str) -> Result<Vec<Annotation>, FormatError> {
    let collection: FeatureCollection = serde_json::from_str(text)?;
    collection
        .features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| annotation_from_feature(feature, i))
        .collect()
}

fn position(p: Point) -> Position {
    [p.x, p.y]
}

fn point(p: Position) -> Point {
    Point::new(p[0], p[1])
}

/// Closes a ring GeoJSON-style: the first position repeats at the end.
fn closed_ring(points: &[Point]) -> Vec<Position> {
    let mut out: Vec<Position> = points.iter().copied().map(position).collect();
    if let Some(&first) = out.first() {
        out.push(first);
    }
    out
}

/// Strips the GeoJSON closing position if present.
fn open_ring(ring: Vec<Position>) -> Vec<Point> {
    let mut points: Vec<Point> = ring.into_iter().map(point).collect();
    if points.len() >= 2 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn feature_from_annotation(annotation: &Annotation) -> Option<Feature> {
    let geometry = match annotation.shape() {
        Shape::Point(p) => Geometry::Point {
            coordinates: position(p.point),
        },
        Shape::Rectangle(r) => {
            let rect = r.rect();
            Geometry::Polygon {
                coordinates: vec![closed_ring(&[
                    Point::new(rect.x0, rect.y0),
                    Point::new(rect.x1, rect.y0),
                    Point::new(rect.x1, rect.y1),
                    Point::new(rect.x0, rect.y1),
                ])],
            }
        }
        Shape::Polygon(p) => Geometry::Polygon {
            coordinates: vec![closed_ring(&p.points)],
        },
        Shape::Freehand(f) if f.closed => Geometry::Polygon {
            coordinates: vec![closed_ring(&f.points)],
        },
        Shape::Freehand(f) => Geometry::LineString {
            coordinates: f.points.iter().copied().map(position).collect(),
        },
        Shape::MultiPolygon(m) => Geometry::MultiPolygon {
            coordinates: m
                .polygons
                .iter()
                .map(|ring| vec![closed_ring(ring)])
                .collect(),
        },
        Shape::Image(_) => return None,
    };
    Some(Feature {
        kind: "Feature".to_owned(),
        id: Some(annotation.id().as_str().to_owned()),
        geometry,
        properties: properties_to_map(annotation),
    })
}

fn annotation_from_feature(feature: Feature, index: usize) -> Result<Annotation, FormatError> {
    let shape = match feature.geometry {
        Geometry::Point { coordinates } => Shape::Point(PointShape {
            point: point(coordinates),
        }),
        Geometry::LineString { coordinates } => Shape::Freehand(FreehandShape::new(
            coordinates.into_iter().map(point).collect(),
            false,
        )),
        Geometry::Polygon { mut coordinates } => {
            if coordinates.is_empty() {
                return Err(FormatError::UnsupportedGeometry(
                    "polygon without rings".to_owned(),
                ));
            }
            // Only the exterior ring is kept; holes are out of model.
            let ring = open_ring(coordinates.swap_remove(0));
            if ring.len() < 3 {
                return Err(FormatError::UnsupportedGeometry(
                    "polygon ring with fewer than 3 positions".to_owned(),
                ));
            }
            Shape::Polygon(PolygonShape::new(ring))
        }
        Geometry::MultiPolygon { coordinates } => {
            let rings = coordinates
                .into_iter()
                .filter_map(|mut polygon| {
                    (!polygon.is_empty()).then(|| open_ring(polygon.swap_remove(0)))
                })
                .collect();
            Shape::MultiPolygon(MultiPolygonShape::new(rings))
        }
    };
    let id = feature.id.unwrap_or_else(|| format!("feature-{index}"));
    let mut annotation = Annotation::new(id, shape);
    apply_properties(&mut annotation, &feature.properties);
    Ok(annotation)
}

fn properties_to_map(annotation: &Annotation) -> Map<String, Value> {
    let p = &annotation.properties;
    let mut map = Map::new();
    if let Some(layer) = &p.layer {
        map.insert("layer".to_owned(), Value::String(layer.clone()));
    }
    if let Some(category) = p.category {
        map.insert("category".to_owned(), Value::String(category.as_str().to_owned()));
    }
    if let Some(classification) = p.classification {
        map.insert(
            "classification".to_owned(),
            Value::String(classification.as_str().to_owned()),
        );
    }
    if let Some(source) = &p.source {
        map.insert("source".to_owned(), Value::String(source.clone()));
    }
    if let Some(label) = &p.label {
        map.insert("label".to_owned(), Value::String(label.clone()));
    }
    if !p.tags.is_empty() {
        map.insert(
            "tags".to_owned(),
            Value::Array(p.tags.iter().cloned().map(Value::String).collect()),
        );
    }
    for (k, v) in &p.extra {
        map.insert(k.clone(), Value::String(v.clone()));
    }
    map
}

fn apply_properties(annotation: &mut Annotation, map: &Map<String, Value>) {
    let p = &mut annotation.properties;
    for (key, value) in map {
        match (key.as_str(), value) {
            ("layer", Value::String(s)) => p.layer = Some(s.clone()),
            ("category", Value::String(s)) => p.category = Polarity::parse(s),
            ("classification", Value::String(s)) => p.classification = Polarity::parse(s),
            ("source", Value::String(s)) => p.source = Some(s.clone()),
            ("label", Value::String(s)) => p.label = Some(s.clone()),
            ("tags", Value::Array(values)) => {
                p.tags = values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect();
            }
            (_, Value::String(s)) => {
                p.extra.insert(key.clone(), s.clone());
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use stroma_geometry::RectangleShape;

    use super::*;

    #[test]
    fn shapes_map_to_documented_geometry_types() {
        let annotations = vec![
            Annotation::new(
                "pt",
                Shape::Point(PointShape {
                    point: Point::new(1.0, 2.0),
                }),
            ),
            Annotation::new(
                "rect",
                Shape::Rectangle(RectangleShape::new(0.0, 0.0, 10.0, 5.0)),
            ),
            Annotation::new(
                "open",
                Shape::Freehand(FreehandShape::new(
                    vec![Point::new(0.0, 0.0), Point::new(5.0, 5.0)],
                    false,
                )),
            ),
            Annotation::new(
                "closed",
                Shape::Freehand(FreehandShape::new(
                    vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(0.0, 5.0)],
                    true,
                )),
            ),
            Annotation::new(
                "multi",
                Shape::MultiPolygon(MultiPolygonShape::new(vec![vec![
                    Point::new(0.0, 0.0),
                    Point::new(1.0, 0.0),
                    Point::new(0.0, 1.0),
                ]])),
            ),
        ];
        let text = export(&annotations).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let kinds: Vec<&str> = value["features"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["geometry"]["type"].as_str().unwrap())
            .collect();
        assert_eq!(
            kinds,
            ["Point", "Polygon", "LineString", "Polygon", "MultiPolygon"]
        );
    }

    #[test]
    fn roundtrip_preserves_geometry_and_properties() {
        let mut ann = Annotation::new(
            "cell-7",
            Shape::Polygon(PolygonShape::new(vec![
                Point::new(10.0, 10.0),
                Point::new(30.0, 12.0),
                Point::new(20.0, 40.0),
            ])),
        );
        ann.properties.layer = Some("tumor".to_owned());
        ann.properties.classification = Some(Polarity::Positive);
        ann.properties.tags = vec!["reviewed".to_owned()];
        ann.properties
            .extra
            .insert("grader".to_owned(), "nk".to_owned());

        let text = export(std::slice::from_ref(&ann)).unwrap();
        let back = import(&text).unwrap();
        assert_eq!(back.len(), 1);
        let b = &back[0];
        assert_eq!(b.id().as_str(), "cell-7");
        assert_eq!(b.shape(), ann.shape());
        assert_eq!(b.properties.layer.as_deref(), Some("tumor"));
        assert_eq!(b.properties.classification, Some(Polarity::Positive));
        assert_eq!(b.properties.tags, ["reviewed"]);
        assert_eq!(b.properties.extra.get("grader").map(String::as_str), Some("nk"));
    }

    #[test]
    fn rings_close_on_export_and_open_on_import() {
        let ann = Annotation::new(
            "tri",
            Shape::Polygon(PolygonShape::new(vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(0.0, 10.0),
            ])),
        );
        let text = export(std::slice::from_ref(&ann)).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let ring = value["features"][0]["geometry"]["coordinates"][0]
            .as_array()
            .unwrap();
        // GeoJSON rings repeat the first position.
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.first(), ring.last());

        let back = import(&text).unwrap();
        let Shape::Polygon(p) = back[0].shape() else {
            panic!("triangle imports as polygon");
        };
        assert_eq!(p.points.len(), 3);
    }

    #[test]
    fn features_without_ids_are_numbered() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [3.0, 4.0]}, "properties": {}}
            ]
        }"#;
        let back = import(text).unwrap();
        assert_eq!(back[0].id().as_str(), "feature-0");
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        let text = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 1.0]]]}, "properties": {}}
            ]
        }"#;
        assert!(import(text).is_err());
    }
}
