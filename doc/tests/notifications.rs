//! Observer notifications and the saved-state rules as seen through them.

mod common;

use common::{Recorder, TIMEOUT, new_doc, populate};
use pixeldoc::{Change, DocCmd, DocView, EventMask, Field, ObjectKind, Rect};

#[test]
fn test_removal_is_bracketed() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();
    let recorder = Recorder::watching(fx.layer);
    writer.subscribe(EventMask::all(), Box::new(recorder.clone()));

    writer.apply(DocCmd::remove(fx.layer)).unwrap();
    assert_eq!(
        recorder.take(),
        vec![
            (
                Change::BeforeRemove {
                    id: fx.layer,
                    kind: ObjectKind::Layer
                },
                true
            ),
            (
                Change::AfterRemove {
                    id: fx.layer,
                    kind: ObjectKind::Layer
                },
                false
            ),
            (
                Change::Committed {
                    label: "Remove Layer".into()
                },
                false
            ),
            (Change::SavedStateChanged { saved: false }, false),
        ]
    );

    writer.undo().unwrap();
    assert_eq!(
        recorder.take(),
        vec![
            (
                Change::Added {
                    id: fx.layer,
                    kind: ObjectKind::Layer
                },
                true
            ),
            (
                Change::Undone {
                    label: "Remove Layer".into()
                },
                true
            ),
            (Change::SavedStateChanged { saved: true }, true),
        ]
    );
}

#[test]
fn test_undo_of_add_is_bracketed() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();
    let tag = writer.apply(DocCmd::add_tag("Run", 1, 2)).unwrap().unwrap();

    let recorder = Recorder::watching(tag);
    writer.subscribe(EventMask::REMOVED, Box::new(recorder.clone()));
    writer.undo().unwrap();
    assert_eq!(
        recorder.take(),
        vec![
            (
                Change::BeforeRemove {
                    id: tag,
                    kind: ObjectKind::Tag
                },
                true
            ),
            (
                Change::AfterRemove {
                    id: tag,
                    kind: ObjectKind::Tag
                },
                false
            ),
        ]
    );
    assert!(writer.graph().contains(fx.tag));
}

#[test]
fn test_field_change_and_commit_order() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();
    let recorder = Recorder::default();
    writer.subscribe(EventMask::MODIFIED | EventMask::HISTORY, Box::new(recorder.clone()));

    let mut tx = writer.transaction("Tweak");
    tx.execute(DocCmd::set_layer_opacity(fx.layer, 3)).unwrap();
    tx.execute(DocCmd::set_frame_duration(fx.frames[0], 33)).unwrap();
    tx.commit().unwrap();

    assert_eq!(
        recorder.changes(),
        vec![
            Change::Modified {
                id: fx.layer,
                field: Field::LayerOpacity
            },
            Change::Modified {
                id: fx.frames[0],
                field: Field::FrameDuration
            },
            Change::Committed {
                label: "Tweak".into()
            },
        ]
    );
}

#[test]
fn test_rollback_notifies_once() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();
    let recorder = Recorder::default();
    writer.subscribe(EventMask::HISTORY, Box::new(recorder.clone()));

    let mut tx = writer.transaction("Abandoned");
    tx.execute(DocCmd::set_layer_name(fx.layer, "x")).unwrap();
    tx.rollback().unwrap();

    {
        let mut tx = writer.transaction("Dropped");
        tx.execute(DocCmd::set_layer_name(fx.layer, "y")).unwrap();
    }

    assert_eq!(
        recorder.changes(),
        vec![
            Change::RolledBack {
                label: "Abandoned".into()
            },
            Change::RolledBack {
                label: "Dropped".into()
            },
        ]
    );
    assert_eq!(writer.graph().layer(fx.layer).unwrap().name, "Layer 1");
}

#[test]
fn test_unsubscribed_observer_gets_nothing() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();
    let recorder = Recorder::default();
    let id = writer.subscribe(EventMask::all(), Box::new(recorder.clone()));
    assert!(writer.unsubscribe(id).is_some());

    writer.apply(DocCmd::remove(fx.slice)).unwrap();
    assert!(recorder.changes().is_empty());
}

// ---------------------------------------------------------------------------
// Saved state
// ---------------------------------------------------------------------------

#[test]
fn test_saved_state_follows_undo_and_redo() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();
    let recorder = Recorder::default();
    writer.subscribe(EventMask::SAVED_STATE, Box::new(recorder.clone()));
    assert!(writer.history().is_in_saved_state());

    writer.apply(DocCmd::set_layer_opacity(fx.layer, 1)).unwrap();
    writer.apply(DocCmd::set_layer_opacity(fx.layer, 2)).unwrap();
    writer.undo().unwrap();
    writer.undo().unwrap();
    assert!(writer.history().is_in_saved_state());
    writer.redo().unwrap();

    // Only transitions are reported.
    assert_eq!(
        recorder.changes(),
        vec![
            Change::SavedStateChanged { saved: false },
            Change::SavedStateChanged { saved: true },
            Change::SavedStateChanged { saved: false },
        ]
    );
}

#[test]
fn test_saved_state_lost_with_discarded_branch() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();

    writer.apply(DocCmd::set_layer_opacity(fx.layer, 1)).unwrap();
    writer.mark_saved_state();
    writer.undo().unwrap();
    assert_eq!(writer.history().save_distance(), Some(-1));

    // The save point lived on the redo branch this discards.
    writer.apply(DocCmd::set_layer_opacity(fx.layer, 9)).unwrap();
    assert_eq!(writer.history().save_distance(), None);
    writer.undo().unwrap();
    assert!(!writer.history().is_in_saved_state());
    writer.undo().unwrap();
    assert!(!writer.history().is_in_saved_state());

    writer.mark_saved_state();
    assert!(writer.history().is_in_saved_state());
}

#[test]
fn test_impossible_saved_state_is_sticky() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();
    let recorder = Recorder::default();
    writer.subscribe(EventMask::SAVED_STATE, Box::new(recorder.clone()));

    writer.impossible_to_back_to_saved_state();
    writer.apply(DocCmd::set_layer_opacity(fx.layer, 1)).unwrap();
    writer.undo().unwrap();
    assert!(!writer.history().is_in_saved_state());

    writer.mark_saved_state();
    assert!(writer.history().is_in_saved_state());
    assert_eq!(
        recorder.changes(),
        vec![
            Change::SavedStateChanged { saved: false },
            Change::SavedStateChanged { saved: true },
        ]
    );
}

#[test]
fn test_view_changes_keep_document_saved() {
    let doc = new_doc();
    let fx = populate(&doc);
    let mut writer = doc.write(TIMEOUT).unwrap();
    assert!(writer.history().is_in_saved_state());
    let before = *writer.view();

    let saved = Recorder::default();
    writer.subscribe(EventMask::SAVED_STATE, Box::new(saved.clone()));
    let view = Recorder::default();
    writer.subscribe(EventMask::VIEW, Box::new(view.clone()));

    let selection = Some(Rect::new(2, 2, 4, 4));
    let mut tx = writer.transaction("Look Around");
    tx.execute(DocCmd::set_current_frame(2)).unwrap();
    tx.execute(DocCmd::set_current_layer(fx.child)).unwrap();
    tx.execute(DocCmd::set_selection(selection)).unwrap();
    assert!(tx.commit().unwrap());

    let moved = DocView {
        frame: 2,
        layer: fx.child,
        selection,
    };
    assert_eq!(*writer.view(), moved);
    assert!(writer.history().can_undo());
    assert_eq!(writer.history().undo_label(), Some("Look Around"));
    assert!(writer.history().is_in_saved_state());
    assert_eq!(view.take().len(), 3);

    writer.undo().unwrap();
    assert_eq!(*writer.view(), before);
    assert!(writer.history().is_in_saved_state());
    assert_eq!(view.take().len(), 3);

    writer.redo().unwrap();
    assert_eq!(*writer.view(), moved);
    assert!(writer.history().is_in_saved_state());
    assert!(saved.take().is_empty());

    // A content edit on top still leaves the saved state.
    writer.apply(DocCmd::set_layer_opacity(fx.layer, 9)).unwrap();
    assert_eq!(
        saved.changes(),
        vec![Change::SavedStateChanged { saved: false }]
    );
}
