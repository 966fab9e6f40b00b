//! Structural commands: adding and removing entities.
//!
//! Both directions go through the same two helpers. Taking an entity out of
//! the graph always detaches the whole subtree first and suspends it second;
//! putting it back restores the suspended buffer (original ids, versions
//! bumped) and attaches it at the recorded placement.

use pixeldoc_core::undo::{Cmd, CmdError, CmdResult};

use crate::context::DocContext;
use crate::graph::{
    BlendMode, Cel, Frame, GraphError, GraphResult, IdRegistry, Image, Layer, LayerContent,
    LayerFlags, Object, ObjectData, ObjectGraph, ObjectId, ObjectKind, Placement, Rect, Slice,
    Subtree, Tag,
};
use crate::notify::Change;
use crate::suspend::SuspendedObject;

/// Blueprint of an entity an [`AddObject`] creates.
///
/// Ids are minted when the command executes, not when it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewObject {
    Layer {
        name: String,
        parent: ObjectId,
        index: usize,
        group: bool,
    },
    /// A cel with a blank image in the sprite's pixel format.
    Cel {
        layer: ObjectId,
        frame: u32,
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    Frame {
        index: usize,
        duration: u32,
    },
    /// Appended after the existing tags.
    Tag {
        name: String,
        from: u32,
        to: u32,
    },
    /// Appended after the existing slices.
    Slice {
        name: String,
        bounds: Rect,
    },
}

impl NewObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Layer { .. } => ObjectKind::Layer,
            Self::Cel { .. } => ObjectKind::Cel,
            Self::Frame { .. } => ObjectKind::Frame,
            Self::Tag { .. } => ObjectKind::Tag,
            Self::Slice { .. } => ObjectKind::Slice,
        }
    }

    /// Builds the detached subtree rooted at `id` plus where it goes. Owned
    /// entities get freshly minted ids.
    pub(crate) fn build(
        &self,
        graph: &mut ObjectGraph,
        id: ObjectId,
    ) -> GraphResult<(Subtree, Placement)> {
        let built = match self {
            Self::Layer {
                name,
                parent,
                index,
                group,
            } => {
                let content = if *group {
                    LayerContent::Group {
                        children: Vec::new(),
                    }
                } else {
                    LayerContent::Image { cels: Vec::new() }
                };
                let layer = Layer {
                    name: name.clone(),
                    parent: *parent,
                    flags: LayerFlags::default(),
                    opacity: 255,
                    blend: BlendMode::Normal,
                    content,
                };
                (
                    Subtree::new(id, [Object::new(id, ObjectData::Layer(layer))]),
                    Placement::Layer {
                        parent: *parent,
                        index: *index,
                    },
                )
            }
            Self::Cel {
                layer,
                frame,
                x,
                y,
                width,
                height,
            } => {
                if *width == 0 || *height == 0 {
                    return Err(GraphError::InvalidPlacement(format!(
                        "cel image must not be empty, got {width}x{height}"
                    )));
                }
                let image = graph.ids_mut().mint()?;
                let format = graph.sprite().format;
                let cel = Cel {
                    layer: *layer,
                    frame: *frame,
                    x: *x,
                    y: *y,
                    opacity: 255,
                    image,
                };
                (
                    Subtree::new(
                        id,
                        [
                            Object::new(id, ObjectData::Cel(cel)),
                            Object::new(
                                image,
                                ObjectData::Image(Image::blank(*width, *height, format)),
                            ),
                        ],
                    ),
                    Placement::Cel { layer: *layer },
                )
            }
            Self::Frame { index, duration } => (
                Subtree::new(
                    id,
                    [Object::new(
                        id,
                        ObjectData::Frame(Frame {
                            duration: *duration,
                        }),
                    )],
                ),
                Placement::Frame { index: *index },
            ),
            Self::Tag { name, from, to } => {
                if from > to {
                    return Err(GraphError::InvalidPlacement(format!(
                        "tag range {from}..={to} is reversed"
                    )));
                }
                let tag = Tag {
                    name: name.clone(),
                    from: *from,
                    to: *to,
                    direction: Default::default(),
                };
                (
                    Subtree::new(id, [Object::new(id, ObjectData::Tag(tag))]),
                    Placement::Tag {
                        index: graph.sprite().tags.len(),
                    },
                )
            }
            Self::Slice { name, bounds } => {
                let slice = Slice {
                    name: name.clone(),
                    bounds: *bounds,
                };
                (
                    Subtree::new(id, [Object::new(id, ObjectData::Slice(slice))]),
                    Placement::Slice {
                        index: graph.sprite().slices.len(),
                    },
                )
            }
        };
        Ok(built)
    }

    fn footprint(&self) -> usize {
        match self {
            Self::Layer { name, .. } | Self::Tag { name, .. } | Self::Slice { name, .. } => {
                name.len()
            }
            Self::Cel { .. } | Self::Frame { .. } => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared detach / restore
// ---------------------------------------------------------------------------

/// Detaches `id` (bracketed by removal notifications) and suspends it.
///
/// If suspension fails the subtree is attached again, so the graph ends up
/// as it was and the error is reported as corruption.
fn detach_and_suspend(
    ctx: &mut DocContext,
    id: ObjectId,
) -> CmdResult<(Placement, SuspendedObject)> {
    let placement = ctx.graph.placement_of(id)?;
    let kind = ctx.graph.kind_of(id).ok_or(GraphError::NotFound(id))?;

    let DocContext { graph, bus, store, .. } = ctx;
    let subtree = bus.bracket_removal(graph, id, kind, |g| g.detach(id))?;
    match store.suspend(&subtree) {
        Ok(suspended) => Ok((placement, suspended)),
        Err(e) => {
            log::error!("Failed to suspend {kind:?} {id}: {e}");
            graph.attach(subtree, placement)?;
            bus.notify(graph, Change::Added { id, kind });
            Err(e.into())
        }
    }
}

/// Rebuilds a suspended subtree with its original ids and attaches it at
/// `placement`.
fn restore_and_attach(
    ctx: &mut DocContext,
    suspended: &SuspendedObject,
    placement: Placement,
) -> CmdResult {
    let (id, kind) = (suspended.id(), suspended.kind());
    let subtree = ctx.store.restore(suspended, ctx.graph.ids())?;
    ctx.graph.attach(subtree, placement)?;
    ctx.notify(Change::Added { id, kind });
    Ok(())
}

fn missing_state(what: &str) -> CmdError {
    CmdError::InvalidState(format!("{what} has no suspended data"))
}

// ---------------------------------------------------------------------------
// AddObject
// ---------------------------------------------------------------------------

/// Adds a new entity. Undo suspends it, redo brings it back with the same id.
///
/// The root id is minted on first execute unless it was reserved earlier
/// with [`reserve_id`](Self::reserve_id).
#[derive(Debug)]
pub struct AddObject {
    proto: NewObject,
    id: ObjectId,
    placement: Option<Placement>,
    suspended: Option<SuspendedObject>,
}

impl AddObject {
    pub fn new(proto: NewObject) -> Self {
        Self {
            proto,
            id: ObjectId::NULL,
            placement: None,
            suspended: None,
        }
    }

    /// Id of the created entity; null until reserved or executed.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Mints the root id ahead of execution so the caller knows it before
    /// the command is handed to a transaction.
    pub fn reserve_id(&mut self, ids: &mut IdRegistry) -> GraphResult<ObjectId> {
        if self.id.is_null() {
            self.id = ids.mint()?;
        }
        Ok(self.id)
    }

    pub fn proto(&self) -> &NewObject {
        &self.proto
    }
}

impl Cmd<DocContext> for AddObject {
    fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
        if self.placement.is_some() {
            return Err(CmdError::InvalidState(format!("{} was already executed", self.label())));
        }
        let id = self.reserve_id(ctx.graph.ids_mut())?;
        let (subtree, placement) = self.proto.build(&mut ctx.graph, id)?;
        ctx.graph.attach(subtree, placement)?;
        ctx.notify(Change::Added {
            id,
            kind: self.proto.kind(),
        });
        self.placement = Some(placement);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
        let (placement, suspended) = detach_and_suspend(ctx, self.id)?;
        self.placement = Some(placement);
        self.suspended = Some(suspended);
        Ok(())
    }

    fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
        let (Some(suspended), Some(placement)) = (&self.suspended, self.placement) else {
            return Err(missing_state(self.label()));
        };
        restore_and_attach(ctx, suspended, placement)?;
        self.suspended = None;
        Ok(())
    }

    fn label(&self) -> &str {
        match self.proto {
            NewObject::Layer { group: false, .. } => "New Layer",
            NewObject::Layer { group: true, .. } => "New Group",
            NewObject::Cel { .. } => "New Cel",
            NewObject::Frame { .. } => "New Frame",
            NewObject::Tag { .. } => "New Tag",
            NewObject::Slice { .. } => "New Slice",
        }
    }

    fn memory_footprint(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.proto.footprint()
            + self.suspended.as_ref().map_or(0, SuspendedObject::len)
    }
}

// ---------------------------------------------------------------------------
// RemoveObject
// ---------------------------------------------------------------------------

/// Removes an entity together with everything it owns.
#[derive(Debug)]
pub struct RemoveObject {
    id: ObjectId,
    kind: Option<ObjectKind>,
    placement: Option<Placement>,
    suspended: Option<SuspendedObject>,
}

impl RemoveObject {
    pub fn new(id: ObjectId) -> Self {
        Self {
            id,
            kind: None,
            placement: None,
            suspended: None,
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Looks up what `id` is, so the label is right before execution.
    pub fn resolve_kind(&mut self, graph: &ObjectGraph) {
        if self.kind.is_none() {
            self.kind = graph.kind_of(self.id);
        }
    }

    fn take_out(&mut self, ctx: &mut DocContext) -> CmdResult {
        let (placement, suspended) = detach_and_suspend(ctx, self.id)?;
        self.kind = Some(suspended.kind());
        self.placement = Some(placement);
        self.suspended = Some(suspended);
        Ok(())
    }
}

impl Cmd<DocContext> for RemoveObject {
    fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
        if self.suspended.is_some() {
            return Err(CmdError::InvalidState(format!("{} was already executed", self.label())));
        }
        self.take_out(ctx)
    }

    fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
        let (Some(suspended), Some(placement)) = (&self.suspended, self.placement) else {
            return Err(missing_state(self.label()));
        };
        restore_and_attach(ctx, suspended, placement)?;
        self.suspended = None;
        Ok(())
    }

    fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.take_out(ctx)
    }

    fn label(&self) -> &str {
        match self.kind {
            Some(ObjectKind::Layer) => "Remove Layer",
            Some(ObjectKind::Cel) => "Clear Cel",
            Some(ObjectKind::Frame) => "Remove Frame",
            Some(ObjectKind::Tag) => "Remove Tag",
            Some(ObjectKind::Slice) => "Remove Slice",
            _ => "Remove",
        }
    }

    fn memory_footprint(&self) -> usize {
        std::mem::size_of::<Self>() + self.suspended.as_ref().map_or(0, SuspendedObject::len)
    }
}
