// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Catalog behavior across the spatial index and the observer contract.

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::{Point, Rect};
use stroma_geometry::{PointShape, PolygonShape, RectangleShape, Shape};
use stroma_store::{Annotation, AnnotationId, AnnotationStore, ChangeSet};

fn point_ann(id: &str, x: f64, y: f64) -> Annotation {
    Annotation::new(
        id,
        Shape::Point(PointShape {
            point: Point::new(x, y),
        }),
    )
}

#[test]
fn batched_mutations_fire_one_deduplicated_event() {
    let mut store = AnnotationStore::new();
    let events: Rc<RefCell<Vec<ChangeSet>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    store.observe(move |set| sink.borrow_mut().push(set.clone()));

    store.begin_batch();
    for i in 0..50 {
        store
            .add(point_ann(&format!("p{i}"), f64::from(i), 0.0))
            .unwrap();
    }
    for i in 0..10 {
        let id: AnnotationId = format!("p{i}").as_str().into();
        store.delete(&id).unwrap();
    }
    store.end_batch();

    let events = events.borrow();
    assert_eq!(events.len(), 1, "one batch, one event");
    assert_eq!(events[0].created.len(), 40);
    assert_eq!(events[0].updated.len(), 0);
    // Creations deleted within the same batch cancel entirely.
    assert_eq!(events[0].deleted.len(), 0);
    assert_eq!(store.len(), 40);
}

#[test]
fn events_outside_batches_fire_immediately_in_order() {
    let mut store = AnnotationStore::new();
    let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    store.observe(move |set| {
        for a in &set.created {
            sink.borrow_mut().push(format!("+{}", a.id()));
        }
        for a in &set.deleted {
            sink.borrow_mut().push(format!("-{}", a.id()));
        }
    });

    store.add(point_ann("a", 0.0, 0.0)).unwrap();
    store.add(point_ann("b", 1.0, 0.0)).unwrap();
    store.delete(&"a".into()).unwrap();

    assert_eq!(*log.borrow(), ["+a", "+b", "-a"]);
}

#[test]
fn observers_run_in_subscription_order() {
    let mut store = AnnotationStore::new();
    let order: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    for tag in [1_u8, 2, 3] {
        let sink = order.clone();
        store.observe(move |_| sink.borrow_mut().push(tag));
    }
    store.add(point_ann("a", 0.0, 0.0)).unwrap();
    assert_eq!(*order.borrow(), [1, 2, 3]);
}

#[test]
fn hit_test_tolerance_in_image_pixels() {
    let mut store = AnnotationStore::new();
    store.add(point_ann("p", 1000.0, 1000.0)).unwrap();

    // At zoom z a ~5 screen px tolerance is 5/z image px; with z = 2 the
    // tolerance is 2.5 image px.
    let z = 2.0;
    let tol = 5.0 / z;
    assert!(store
        .get_at(Point::new(1000.0 + 4.0 / z, 1000.0), None, tol)
        .is_some());
    assert!(store
        .get_at(Point::new(1000.0 + 10.0 / z, 1000.0), None, tol)
        .is_none());
}

#[test]
fn get_at_prefers_interior_over_tolerant_edge() {
    let mut store = AnnotationStore::new();
    store
        .add(Annotation::new(
            "rect",
            Shape::Rectangle(RectangleShape::new(0.0, 0.0, 10.0, 10.0)),
        ))
        .unwrap();
    store
        .add(Annotation::new(
            "poly",
            Shape::Polygon(PolygonShape::new(vec![
                Point::new(9.0, 0.0),
                Point::new(30.0, 0.0),
                Point::new(30.0, 10.0),
                Point::new(9.0, 10.0),
            ])),
        ))
        .unwrap();

    // Inside the polygon, just outside the rectangle: the interior wins.
    let hit = store.get_at(Point::new(11.0, 5.0), None, 3.0).unwrap();
    assert_eq!(hit.id().as_str(), "poly");
}

#[test]
fn get_at_honors_filter() {
    let mut store = AnnotationStore::new();
    let mut tagged = point_ann("tagged", 5.0, 5.0);
    tagged.properties.label = Some("keep".to_string());
    store.add(tagged).unwrap();
    store.add(point_ann("plain", 5.0, 5.0)).unwrap();

    let filter = |a: &Annotation| a.properties.label.is_some();
    let hit = store
        .get_at(Point::new(5.0, 5.0), Some(&filter), 1.0)
        .unwrap();
    assert_eq!(hit.id().as_str(), "tagged");
}

#[test]
fn index_stays_consistent_with_catalog() {
    let mut store = AnnotationStore::new();
    for i in 0..30 {
        store
            .add(point_ann(&format!("p{i}"), f64::from(i) * 10.0, 0.0))
            .unwrap();
    }
    for i in (0..30).step_by(2) {
        store.delete(&format!("p{i}").as_str().into()).unwrap();
    }

    // Every survivor is searchable; every deleted id is gone.
    let hits = store.search(Rect::new(-1.0, -1.0, 1000.0, 1.0));
    assert_eq!(hits.len(), 15);
    for a in hits {
        assert!(store.get(a.id()).is_some());
    }
    assert!(store.get(&"p0".into()).is_none());
    assert!(store
        .get_at(Point::new(0.0, 0.0), None, 1.0)
        .is_none());
}

#[test]
fn failed_preconditions_do_not_mutate() {
    let mut store = AnnotationStore::new();
    store.add(point_ann("a", 0.0, 0.0)).unwrap();

    assert!(store.add(point_ann("a", 5.0, 5.0)).is_err());
    assert_eq!(store.get(&"a".into()).unwrap().bounds().x0, 0.0);

    assert!(store.update(&"missing".into(), point_ann("missing", 1.0, 1.0)).is_err());
    assert!(store
        .update(&"a".into(), point_ann("b", 1.0, 1.0))
        .is_err());
    assert_eq!(store.len(), 1);

    // Bulk add with an internal duplicate adds nothing.
    assert!(store
        .bulk_add(vec![point_ann("x", 0.0, 0.0), point_ann("x", 1.0, 1.0)])
        .is_err());
    assert!(store.get(&"x".into()).is_none());
}

#[test]
fn clear_emits_single_event_with_everything_deleted() {
    let mut store = AnnotationStore::new();
    for i in 0..5 {
        store.add(point_ann(&format!("p{i}"), f64::from(i), 0.0)).unwrap();
    }
    let events: Rc<RefCell<Vec<ChangeSet>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = events.clone();
    store.observe(move |set| sink.borrow_mut().push(set.clone()));

    store.clear();
    assert!(store.is_empty());
    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].deleted.len(), 5);
}
