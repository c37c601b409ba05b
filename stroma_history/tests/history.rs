// Copyright 2026 the Stroma Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Round-trip, merging, and batching behavior of the command stack.

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::Point;
use stroma_geometry::{PointShape, PolygonShape, RectangleShape, Shape};
use stroma_history::{
    BatchCommand, BoxedCommand, CreateCommand, DeleteCommand, History, HistoryOptions,
    UpdateCommand,
};
use stroma_store::{Annotation, AnnotationStore};

fn rect_ann(id: &str, x: f64, w: f64) -> Annotation {
    Annotation::new(id, Shape::Rectangle(RectangleShape::new(x, 0.0, w, 10.0)))
}

fn snapshot(store: &AnnotationStore) -> Vec<Annotation> {
    let mut all: Vec<Annotation> = store.all().cloned().collect();
    all.sort_by(|a, b| a.id().cmp(b.id()));
    all
}

#[test]
fn execute_undo_redo_roundtrip_is_deep_equal() {
    let mut store = AnnotationStore::new();
    // Disable merging so every command is its own step.
    let mut history = History::with_options(HistoryOptions {
        enable_merging: false,
        ..HistoryOptions::default()
    });

    let empty = snapshot(&store);

    let commands: Vec<BoxedCommand> = vec![
        Box::new(CreateCommand::new(rect_ann("a", 0.0, 10.0))),
        Box::new(CreateCommand::new(rect_ann("b", 50.0, 5.0))),
        Box::new(UpdateCommand::new(
            rect_ann("a", 0.0, 10.0),
            rect_ann("a", 100.0, 20.0),
        )),
        Box::new(DeleteCommand::new(rect_ann("b", 50.0, 5.0))),
        Box::new(CreateCommand::new(rect_ann("c", 7.0, 7.0))),
    ];

    for cmd in commands {
        history.execute(&mut store, cmd).unwrap();
    }
    let applied = snapshot(&store);
    assert_eq!(applied.len(), 2);

    while history.undo(&mut store).unwrap() {}
    assert_eq!(snapshot(&store), empty);

    while history.redo(&mut store).unwrap() {}
    assert_eq!(snapshot(&store), applied);
}

#[test]
fn merged_updates_equal_individually_applied_updates() {
    // Merge-enabled history.
    let mut store_merged = AnnotationStore::new();
    let mut merged = History::new();

    // Merge-disabled history over an identical store.
    let mut store_plain = AnnotationStore::new();
    let mut plain = History::with_options(HistoryOptions {
        enable_merging: false,
        ..HistoryOptions::default()
    });

    for (store, history) in [
        (&mut store_merged, &mut merged),
        (&mut store_plain, &mut plain),
    ] {
        history
            .execute(store, Box::new(CreateCommand::new(rect_ann("a", 0.0, 1.0))))
            .unwrap();
        let mut prev = rect_ann("a", 0.0, 1.0);
        for step in 1..=10 {
            let next = rect_ann("a", f64::from(step), 1.0);
            history
                .execute(store, Box::new(UpdateCommand::new(prev, next.clone())))
                .unwrap();
            prev = next;
        }
    }

    // Same final state either way.
    assert_eq!(snapshot(&store_merged), snapshot(&store_plain));

    // Merging collapsed the burst: create + one merged update.
    assert_eq!(merged.status().undo_size, 2);
    assert_eq!(plain.status().undo_size, 11);

    // One undo of the merged step restores the pre-burst state.
    merged.undo(&mut store_merged).unwrap();
    assert_eq!(store_merged.get(&"a".into()).unwrap().bounds().x0, 0.0);
}

#[test]
fn merge_does_not_cross_annotation_ids() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();

    history
        .execute(&mut store, Box::new(CreateCommand::new(rect_ann("a", 0.0, 1.0))))
        .unwrap();
    history
        .execute(&mut store, Box::new(CreateCommand::new(rect_ann("b", 5.0, 1.0))))
        .unwrap();
    history
        .execute(
            &mut store,
            Box::new(UpdateCommand::new(
                rect_ann("a", 0.0, 1.0),
                rect_ann("a", 1.0, 1.0),
            )),
        )
        .unwrap();
    history
        .execute(
            &mut store,
            Box::new(UpdateCommand::new(
                rect_ann("b", 5.0, 1.0),
                rect_ann("b", 6.0, 1.0),
            )),
        )
        .unwrap();

    // Two creates plus two non-merging updates.
    assert_eq!(history.status().undo_size, 4);
}

#[test]
fn batch_undoes_as_one_step_in_reverse() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();

    history.begin_batch("add three");
    for (id, x) in [("a", 0.0), ("b", 20.0), ("c", 40.0)] {
        history
            .execute(&mut store, Box::new(CreateCommand::new(rect_ann(id, x, 5.0))))
            .unwrap();
    }
    history.end_batch();

    assert_eq!(store.len(), 3);
    assert_eq!(history.status().undo_size, 1);

    history.undo(&mut store).unwrap();
    assert!(store.is_empty());
    history.redo(&mut store).unwrap();
    assert_eq!(store.len(), 3);
}

#[test]
fn batch_command_revert_replays_children_in_reverse() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();

    // Create then update the same annotation inside one batch: reverse
    // order on revert is what makes the undo valid.
    let cmd = BatchCommand::new(
        vec![
            Box::new(CreateCommand::new(rect_ann("a", 0.0, 5.0))) as BoxedCommand,
            Box::new(UpdateCommand::new(
                rect_ann("a", 0.0, 5.0),
                rect_ann("a", 9.0, 5.0),
            )),
        ],
        "create and move",
    );
    history.execute(&mut store, Box::new(cmd)).unwrap();
    assert_eq!(store.get(&"a".into()).unwrap().bounds().x0, 9.0);

    history.undo(&mut store).unwrap();
    assert!(store.is_empty());
}

#[test]
fn disabled_execution_records_nothing() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();

    history.while_disabled(|h| {
        h.execute(&mut store, Box::new(CreateCommand::new(rect_ann("a", 0.0, 5.0))))
    })
    .unwrap();

    assert_eq!(store.len(), 1);
    assert!(!history.can_undo());
}

#[test]
fn record_pushes_without_reapplying() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();

    // The gesture already put the annotation in the store.
    store.add(rect_ann("a", 0.0, 5.0)).unwrap();
    history.record(Box::new(CreateCommand::new(rect_ann("a", 0.0, 5.0))));

    assert_eq!(store.len(), 1);
    assert!(history.can_undo());
    history.undo(&mut store).unwrap();
    assert!(store.is_empty());
    history.redo(&mut store).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
fn undo_cap_drops_oldest() {
    let mut store = AnnotationStore::new();
    let mut history = History::with_options(HistoryOptions {
        max_history_size: 5,
        enable_merging: false,
    });

    for i in 0..8 {
        history
            .execute(
                &mut store,
                Box::new(CreateCommand::new(rect_ann(&format!("a{i}"), f64::from(i) * 10.0, 5.0))),
            )
            .unwrap();
    }
    assert_eq!(history.status().undo_size, 5);

    while history.undo(&mut store).unwrap() {}
    // Only the five newest creations could be undone.
    assert_eq!(store.len(), 3);
}

#[test]
fn new_execution_clears_redo() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();

    history
        .execute(&mut store, Box::new(CreateCommand::new(rect_ann("a", 0.0, 5.0))))
        .unwrap();
    history.undo(&mut store).unwrap();
    assert!(history.can_redo());

    history
        .execute(&mut store, Box::new(CreateCommand::new(rect_ann("b", 9.0, 5.0))))
        .unwrap();
    assert!(!history.can_redo());
}

#[test]
fn observers_see_every_status_change() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();
    let statuses = Rc::new(RefCell::new(Vec::new()));
    let sink = statuses.clone();
    history.observe(move |s| sink.borrow_mut().push(*s));

    history
        .execute(&mut store, Box::new(CreateCommand::new(rect_ann("a", 0.0, 5.0))))
        .unwrap();
    history.undo(&mut store).unwrap();
    history.redo(&mut store).unwrap();
    history.clear();

    let statuses = statuses.borrow();
    assert_eq!(statuses.len(), 4);
    assert!(statuses[0].can_undo && !statuses[0].can_redo);
    assert!(!statuses[1].can_undo && statuses[1].can_redo);
    assert!(statuses[2].can_undo && !statuses[2].can_redo);
    assert_eq!(statuses[3].undo_size, 0);
}

#[test]
fn polygon_update_roundtrip_preserves_vertices() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();

    let original = Annotation::new(
        "poly",
        Shape::Polygon(PolygonShape::new(vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ])),
    );
    history
        .execute(&mut store, Box::new(CreateCommand::new(original.clone())))
        .unwrap();

    let edited = original.with_shape(Shape::Polygon(PolygonShape::new(vec![
        Point::new(0.0, 0.0),
        Point::new(20.0, 0.0),
        Point::new(10.0, 10.0),
        Point::new(0.0, 10.0),
    ])));
    history
        .execute(
            &mut store,
            Box::new(UpdateCommand::new(original.clone(), edited)),
        )
        .unwrap();

    history.undo(&mut store).unwrap();
    assert_eq!(store.get(&"poly".into()).unwrap(), &original);
}

#[test]
fn point_shape_roundtrip() {
    let mut store = AnnotationStore::new();
    let mut history = History::new();
    let ann = Annotation::new(
        "p",
        Shape::Point(PointShape {
            point: Point::new(3.0, 4.0),
        }),
    );
    history
        .execute(&mut store, Box::new(CreateCommand::new(ann.clone())))
        .unwrap();
    history.undo(&mut store).unwrap();
    assert!(store.is_empty());
    history.redo(&mut store).unwrap();
    assert_eq!(store.get(&"p".into()).unwrap(), &ann);
}
