//! The document command set.
//!
//! Every edit of a sprite document is a [`DocCmd`], a closed set built from
//! a few primitives:
//!
//! - [`SetField`]: one scalar property
//! - [`AddObject`] / [`RemoveObject`]: structural changes; whatever leaves
//!   the graph is suspended, and comes back with its original ids
//! - [`MoveLayer`] / [`MoveFrame`]: reorder the layer tree or the frames
//! - [`PatchImage`]: swaps a rectangle of pixels
//! - [`SetView`]: current frame, current layer or selection; recorded for
//!   undo but never counted as a content change
//!
//! Each primitive notifies the document's observers once its change is fully
//! applied.

mod frame;
mod layer;
mod object;
mod pixels;
mod set_field;
mod view;

pub use frame::MoveFrame;
pub use layer::MoveLayer;
pub use object::{AddObject, NewObject, RemoveObject};
pub use pixels::PatchImage;
pub use set_field::SetField;
pub use view::{SetView, ViewChange};

use pixeldoc_core::undo::{Cmd, CmdResult};

use crate::context::DocContext;
use crate::graph::{Field, GraphResult, ObjectGraph, ObjectId, Rect, Value};

/// A reversible edit of a sprite document.
#[derive(Debug)]
pub enum DocCmd {
    SetField(SetField),
    AddObject(AddObject),
    RemoveObject(RemoveObject),
    MoveLayer(MoveLayer),
    MoveFrame(MoveFrame),
    PatchImage(PatchImage),
    SetView(SetView),
}

macro_rules! dispatch {
    ($self:ident, $cmd:ident => $body:expr) => {
        match $self {
            DocCmd::SetField($cmd) => $body,
            DocCmd::AddObject($cmd) => $body,
            DocCmd::RemoveObject($cmd) => $body,
            DocCmd::MoveLayer($cmd) => $body,
            DocCmd::MoveFrame($cmd) => $body,
            DocCmd::PatchImage($cmd) => $body,
            DocCmd::SetView($cmd) => $body,
        }
    };
}

impl DocCmd {
    // -- Scalar fields ------------------------------------------------------

    pub fn set(target: ObjectId, field: Field, value: Value) -> Self {
        SetField::new(target, field, value).into()
    }

    pub fn set_layer_name(layer: ObjectId, name: impl Into<String>) -> Self {
        Self::set(layer, Field::LayerName, Value::Text(name.into()))
    }

    pub fn set_layer_opacity(layer: ObjectId, opacity: u8) -> Self {
        Self::set(layer, Field::LayerOpacity, Value::U8(opacity))
    }

    pub fn set_layer_visible(layer: ObjectId, visible: bool) -> Self {
        Self::set(layer, Field::LayerVisible, Value::Bool(visible))
    }

    pub fn set_cel_position(cel: ObjectId, x: i32, y: i32) -> Self {
        Self::set(cel, Field::CelPosition, Value::Point(x, y))
    }

    pub fn set_frame_duration(frame: ObjectId, duration: u32) -> Self {
        Self::set(frame, Field::FrameDuration, Value::U32(duration))
    }

    // -- Structure ----------------------------------------------------------

    /// An empty image layer at child `index` of `parent`.
    pub fn add_layer(parent: ObjectId, index: usize, name: impl Into<String>) -> Self {
        AddObject::new(NewObject::Layer {
            name: name.into(),
            parent,
            index,
            group: false,
        })
        .into()
    }

    pub fn add_group(parent: ObjectId, index: usize, name: impl Into<String>) -> Self {
        AddObject::new(NewObject::Layer {
            name: name.into(),
            parent,
            index,
            group: true,
        })
        .into()
    }

    /// A cel of `layer` at `frame` with a blank `width` x `height` image.
    pub fn add_cel(layer: ObjectId, frame: u32, x: i32, y: i32, width: u32, height: u32) -> Self {
        AddObject::new(NewObject::Cel {
            layer,
            frame,
            x,
            y,
            width,
            height,
        })
        .into()
    }

    /// A frame inserted at `index`; cels at or after it move one frame later.
    pub fn add_frame(index: usize, duration: u32) -> Self {
        AddObject::new(NewObject::Frame { index, duration }).into()
    }

    pub fn add_tag(name: impl Into<String>, from: u32, to: u32) -> Self {
        AddObject::new(NewObject::Tag {
            name: name.into(),
            from,
            to,
        })
        .into()
    }

    pub fn add_slice(name: impl Into<String>, bounds: Rect) -> Self {
        AddObject::new(NewObject::Slice {
            name: name.into(),
            bounds,
        })
        .into()
    }

    /// Removes a layer, cel, frame, tag or slice with everything it owns.
    pub fn remove(id: ObjectId) -> Self {
        RemoveObject::new(id).into()
    }

    pub fn move_layer(layer: ObjectId, parent: ObjectId, index: usize) -> Self {
        MoveLayer::new(layer, parent, index).into()
    }

    /// `index` counts the frames after `frame` has been taken out.
    pub fn move_frame(frame: ObjectId, index: usize) -> Self {
        MoveFrame::new(frame, index).into()
    }

    pub fn patch_image(image: ObjectId, rect: Rect, pixels: Vec<u8>) -> Self {
        PatchImage::new(image, rect, pixels).into()
    }

    // -- View ---------------------------------------------------------------

    pub fn set_current_frame(frame: u32) -> Self {
        SetView::new(ViewChange::Frame(frame)).into()
    }

    pub fn set_current_layer(layer: ObjectId) -> Self {
        SetView::new(ViewChange::Layer(layer)).into()
    }

    /// `None` clears the selection.
    pub fn set_selection(selection: Option<Rect>) -> Self {
        SetView::new(ViewChange::Selection(selection)).into()
    }

    /// Reserves the id an add will create and resolves what a remove
    /// targets, so both are known before the command executes.
    pub fn prepare(&mut self, graph: &mut ObjectGraph) -> GraphResult<()> {
        match self {
            Self::AddObject(add) => {
                add.reserve_id(graph.ids_mut())?;
            }
            Self::RemoveObject(remove) => remove.resolve_kind(graph),
            Self::SetField(_)
            | Self::MoveLayer(_)
            | Self::MoveFrame(_)
            | Self::PatchImage(_)
            | Self::SetView(_) => {}
        }
        Ok(())
    }

    /// Id of the entity an add creates, once it is reserved or executed.
    pub fn created_id(&self) -> Option<ObjectId> {
        match self {
            Self::AddObject(add) if !add.id().is_null() => Some(add.id()),
            _ => None,
        }
    }
}

impl Cmd<DocContext> for DocCmd {
    fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
        dispatch!(self, cmd => cmd.execute(ctx))
    }

    fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
        dispatch!(self, cmd => cmd.undo(ctx))
    }

    fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
        dispatch!(self, cmd => cmd.redo(ctx))
    }

    fn label(&self) -> &str {
        dispatch!(self, cmd => cmd.label())
    }

    fn memory_footprint(&self) -> usize {
        dispatch!(self, cmd => cmd.memory_footprint())
    }

    fn modifies_content(&self) -> bool {
        dispatch!(self, cmd => cmd.modifies_content())
    }
}

impl From<SetField> for DocCmd {
    fn from(cmd: SetField) -> Self {
        Self::SetField(cmd)
    }
}

impl From<AddObject> for DocCmd {
    fn from(cmd: AddObject) -> Self {
        Self::AddObject(cmd)
    }
}

impl From<RemoveObject> for DocCmd {
    fn from(cmd: RemoveObject) -> Self {
        Self::RemoveObject(cmd)
    }
}

impl From<MoveLayer> for DocCmd {
    fn from(cmd: MoveLayer) -> Self {
        Self::MoveLayer(cmd)
    }
}

impl From<MoveFrame> for DocCmd {
    fn from(cmd: MoveFrame) -> Self {
        Self::MoveFrame(cmd)
    }
}

impl From<PatchImage> for DocCmd {
    fn from(cmd: PatchImage) -> Self {
        Self::PatchImage(cmd)
    }
}

impl From<SetView> for DocCmd {
    fn from(cmd: SetView) -> Self {
        Self::SetView(cmd)
    }
}
