//! Shared helpers for the pixeldoc integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pixeldoc::graph::Rgba;
use pixeldoc::{
    Change, Doc, DocCmd, DocEvent, DocId, DocObserver, Field, ObjectGraph, ObjectId, PixelFormat,
    Rect, Value,
};

/// Lock timeout for single-threaded tests; never actually waited on.
pub const TIMEOUT: Duration = Duration::from_millis(200);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn new_doc() -> Doc {
    init_logging();
    Doc::new(DocId::new(1), 16, 16, PixelFormat::Rgba)
}

/// Ids of the entities [`populate`] creates.
///
/// ```text
/// Root
/// ├── layer   cels at frames 0 and 1
/// └── group
///     └── child   cels at frames 1 and 2
/// frames 0, 1, 2; tag "Walk" 0..=1; slice "Hitbox"
/// ```
#[derive(Debug, Clone)]
pub struct Fixture {
    pub root: ObjectId,
    pub layer: ObjectId,
    pub group: ObjectId,
    pub child: ObjectId,
    pub frames: Vec<ObjectId>,
    pub cel0: ObjectId,
    pub cel1: ObjectId,
    pub child_cel1: ObjectId,
    pub child_cel2: ObjectId,
    pub image0: ObjectId,
    pub tag: ObjectId,
    pub slice: ObjectId,
    pub palette: ObjectId,
}

/// Builds the fixture graph in one committed step and marks it saved.
pub fn populate(doc: &Doc) -> Fixture {
    let mut writer = doc.write(TIMEOUT).unwrap();
    let root = writer.graph().sprite().root;
    let layer = writer.graph().layers()[0];
    let palette = writer.graph().sprite().palette;

    let mut tx = writer.transaction("Setup");
    tx.execute(DocCmd::add_frame(1, 100)).unwrap();
    tx.execute(DocCmd::add_frame(2, 100)).unwrap();
    let group = tx.execute(DocCmd::add_group(root, 1, "Group")).unwrap().unwrap();
    let child = tx.execute(DocCmd::add_layer(group, 0, "Child")).unwrap().unwrap();
    let cel0 = tx.execute(DocCmd::add_cel(layer, 0, 0, 0, 4, 4)).unwrap().unwrap();
    let cel1 = tx.execute(DocCmd::add_cel(layer, 1, 2, 2, 4, 4)).unwrap().unwrap();
    let child_cel1 = tx.execute(DocCmd::add_cel(child, 1, 0, 0, 2, 2)).unwrap().unwrap();
    let child_cel2 = tx.execute(DocCmd::add_cel(child, 2, 1, 1, 2, 2)).unwrap().unwrap();
    let tag = tx.execute(DocCmd::add_tag("Walk", 0, 1)).unwrap().unwrap();
    let slice = tx
        .execute(DocCmd::add_slice("Hitbox", Rect::new(0, 0, 8, 8)))
        .unwrap()
        .unwrap();
    let frames = tx.graph().sprite().frames.clone();
    let image0 = tx.graph().cel(cel0).unwrap().image;
    assert!(tx.commit().unwrap());
    writer.mark_saved_state();

    Fixture {
        root,
        layer,
        group,
        child,
        frames,
        cel0,
        cel1,
        child_cel1,
        child_cel2,
        image0,
        tag,
        slice,
        palette,
    }
}

/// One representative command per [`DocCmd`] family.
#[derive(Debug, Clone, Copy)]
pub enum Family {
    RenameLayer,
    LayerOpacity,
    HideLayer,
    MoveCel,
    FrameDuration,
    CanvasSize,
    TagRange,
    SliceBounds,
    PaletteEntry,
    AddLayer,
    AddGroup,
    AddCel,
    AddFrame,
    AddTag,
    AddSlice,
    RemoveLayer,
    RemoveGroup,
    RemoveCel,
    RemoveFrame,
    RemoveTag,
    RemoveSlice,
    MoveLayer,
    MoveFrame,
    PatchImage,
}

impl Family {
    pub fn cmd(self, fx: &Fixture, graph: &ObjectGraph) -> DocCmd {
        match self {
            Self::RenameLayer => DocCmd::set_layer_name(fx.layer, "Lineart"),
            Self::LayerOpacity => DocCmd::set_layer_opacity(fx.child, 64),
            Self::HideLayer => DocCmd::set_layer_visible(fx.group, false),
            Self::MoveCel => DocCmd::set_cel_position(fx.cel1, -3, 5),
            Self::FrameDuration => DocCmd::set_frame_duration(fx.frames[2], 250),
            Self::CanvasSize => {
                DocCmd::set(graph.sprite_id(), Field::SpriteSize, Value::Size(32, 8))
            }
            Self::TagRange => DocCmd::set(fx.tag, Field::TagRange, Value::Range(1, 2)),
            Self::SliceBounds => {
                DocCmd::set(fx.slice, Field::SliceBounds, Value::Rect(Rect::new(1, 1, 2, 2)))
            }
            Self::PaletteEntry => DocCmd::set(
                fx.palette,
                Field::PaletteEntry(1),
                Value::Color(Rgba::new(255, 0, 0, 255)),
            ),
            Self::AddLayer => DocCmd::add_layer(fx.root, 2, "Top"),
            Self::AddGroup => DocCmd::add_group(fx.group, 1, "Nested"),
            Self::AddCel => DocCmd::add_cel(fx.layer, 2, 0, 0, 3, 3),
            Self::AddFrame => DocCmd::add_frame(1, 40),
            Self::AddTag => DocCmd::add_tag("Idle", 2, 2),
            Self::AddSlice => DocCmd::add_slice("Feet", Rect::new(0, 12, 16, 4)),
            Self::RemoveLayer => DocCmd::remove(fx.layer),
            Self::RemoveGroup => DocCmd::remove(fx.group),
            Self::RemoveCel => DocCmd::remove(fx.cel0),
            Self::RemoveFrame => DocCmd::remove(fx.frames[1]),
            Self::RemoveTag => DocCmd::remove(fx.tag),
            Self::RemoveSlice => DocCmd::remove(fx.slice),
            Self::MoveLayer => DocCmd::move_layer(fx.layer, fx.group, 1),
            Self::MoveFrame => DocCmd::move_frame(fx.frames[0], 2),
            Self::PatchImage => {
                DocCmd::patch_image(fx.image0, Rect::new(1, 1, 2, 2), vec![7; 16])
            }
        }
    }
}

/// Records every event it receives, plus whether `watch` was in the graph
/// at that moment.
#[derive(Clone, Default)]
pub struct Recorder {
    pub events: Arc<Mutex<Vec<(Change, bool)>>>,
    pub watch: Option<ObjectId>,
}

impl Recorder {
    pub fn watching(id: ObjectId) -> Self {
        Self {
            watch: Some(id),
            ..Self::default()
        }
    }

    pub fn changes(&self) -> Vec<Change> {
        self.events.lock().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn take(&self) -> Vec<(Change, bool)> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl DocObserver for Recorder {
    fn on_event(&mut self, graph: &ObjectGraph, event: &DocEvent) {
        let live = self.watch.is_some_and(|id| graph.contains(id));
        self.events.lock().push((event.change.clone(), live));
    }
}
