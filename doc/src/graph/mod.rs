//! The sprite object graph.
//!
//! An arena of versioned entities keyed by [`ObjectId`]. Links between
//! entities are ids, never references:
//!
//! - [`ObjectGraph`] — the live graph of one document
//! - [`Subtree`] — entities detached from the graph, ids still reserved
//! - [`Placement`] — where a detached subtree re-attaches
//! - [`GraphSnapshot`] — a cloned copy of the whole graph
//! - [`Field`] / [`Value`] — scalar properties and their values
//!
//! The sprite itself is stored apart from the arena: it always exists and is
//! reached through [`ObjectGraph::sprite`].

mod field;
mod id;
mod object;
mod snapshot;

pub use field::{Field, Value};
pub use id::{IdRegistry, ObjectId, ObjectKind, Version};
pub use object::{
    AniDir, BlendMode, Cel, Frame, Image, Layer, LayerContent, LayerFlags, Object, ObjectData,
    Palette, PixelFormat, Rect, Rgba, Slice, Sprite, Tag,
};
pub use snapshot::GraphSnapshot;

use std::collections::{BTreeMap, HashMap};

use pixeldoc_core::undo::CmdError;

/// Errors reported by graph operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("object {0} not found")]
    NotFound(ObjectId),
    #[error("object {id} is a {actual:?}, expected {expected:?}")]
    KindMismatch {
        id: ObjectId,
        expected: ObjectKind,
        actual: ObjectKind,
    },
    #[error("object {0} cannot be removed")]
    NotRemovable(ObjectId),
    #[error("invalid placement: {0}")]
    InvalidPlacement(String),
    #[error("field {field:?} does not apply to object {id}")]
    FieldMismatch { id: ObjectId, field: Field },
    #[error("invalid value for {field:?}: {reason}")]
    InvalidValue { field: Field, reason: String },
    #[error("object {0} is already in the graph")]
    AlreadyLive(ObjectId),
    #[error("no object ids left in this document")]
    IdsExhausted,
}

impl From<GraphError> for CmdError {
    fn from(e: GraphError) -> Self {
        match &e {
            GraphError::NotFound(_) => CmdError::NotFound(e.to_string()),
            GraphError::AlreadyLive(_) => CmdError::Corrupted(e.to_string()),
            _ => CmdError::InvalidState(e.to_string()),
        }
    }
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Where a detached subtree re-attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Child `index` of the group `parent`.
    Layer { parent: ObjectId, index: usize },
    /// In the cel list of `layer`, at the position given by the cel's frame.
    Cel { layer: ObjectId },
    /// Frame `index` of the sprite.
    Frame { index: usize },
    Tag { index: usize },
    Slice { index: usize },
}

/// Entities removed from the live graph.
///
/// Their ids stay reserved: nothing else can be minted with them, and only
/// attaching this subtree again makes them live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtree {
    root: ObjectId,
    objects: BTreeMap<ObjectId, Object>,
}

impl Subtree {
    pub(crate) fn new(root: ObjectId, objects: impl IntoIterator<Item = Object>) -> Self {
        Self {
            root,
            objects: objects.into_iter().map(|o| (o.id, o)).collect(),
        }
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn root_object(&self) -> Option<&Object> {
        self.objects.get(&self.root)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn memory_footprint(&self) -> usize {
        self.objects.values().map(Object::memory_footprint).sum()
    }

    fn into_objects(self) -> impl Iterator<Item = Object> {
        self.objects.into_values()
    }
}

macro_rules! typed_access {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        pub fn $get(&self, id: ObjectId) -> GraphResult<&$ty> {
            match self.objects.get(&id).map(|o| &o.data) {
                Some(ObjectData::$variant(value)) => Ok(value),
                Some(other) => Err(GraphError::KindMismatch {
                    id,
                    expected: ObjectKind::$variant,
                    actual: other.kind(),
                }),
                None => Err(GraphError::NotFound(id)),
            }
        }

        /// Does not bump the version; callers pair it with `bump`.
        #[allow(dead_code)]
        fn $get_mut(&mut self, id: ObjectId) -> GraphResult<&mut $ty> {
            match self.objects.get_mut(&id).map(|o| &mut o.data) {
                Some(ObjectData::$variant(value)) => Ok(value),
                Some(other) => Err(GraphError::KindMismatch {
                    id,
                    expected: ObjectKind::$variant,
                    actual: other.kind(),
                }),
                None => Err(GraphError::NotFound(id)),
            }
        }
    };
}

/// The live entities of one document.
pub struct ObjectGraph {
    sprite_id: ObjectId,
    sprite_version: Version,
    sprite: Sprite,
    objects: HashMap<ObjectId, Object>,
    ids: IdRegistry,
}

impl ObjectGraph {
    /// Creates a sprite with a root group holding one empty image layer, one
    /// 100 ms frame and a two-colour palette.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let [sprite_id, root, layer, frame, palette] = [1, 2, 3, 4, 5].map(ObjectId::from_raw);
        let mut ids = IdRegistry::with_minted(5);
        ids.mark_live(sprite_id);

        let mut graph = Self {
            sprite_id,
            sprite_version: 0,
            sprite: Sprite {
                width,
                height,
                format,
                root,
                frames: vec![frame],
                tags: Vec::new(),
                slices: Vec::new(),
                palette,
            },
            objects: HashMap::new(),
            ids,
        };
        graph.insert(Object::new(
            root,
            ObjectData::Layer(Layer {
                name: "Root".into(),
                parent: ObjectId::NULL,
                flags: LayerFlags::default(),
                opacity: 255,
                blend: BlendMode::Normal,
                content: LayerContent::Group {
                    children: vec![layer],
                },
            }),
        ));
        graph.insert(Object::new(
            layer,
            ObjectData::Layer(Layer {
                name: "Layer 1".into(),
                parent: root,
                flags: LayerFlags::default(),
                opacity: 255,
                blend: BlendMode::Normal,
                content: LayerContent::Image { cels: Vec::new() },
            }),
        ));
        graph.insert(Object::new(frame, ObjectData::Frame(Frame { duration: 100 })));
        graph.insert(Object::new(
            palette,
            ObjectData::Palette(Palette {
                colors: vec![Rgba::new(0, 0, 0, 255), Rgba::new(255, 255, 255, 255)],
            }),
        ));
        graph
    }

    fn insert(&mut self, object: Object) {
        self.ids.mark_live(object.id);
        self.objects.insert(object.id, object);
    }

    fn take(&mut self, id: ObjectId) -> Option<Object> {
        let object = self.objects.remove(&id)?;
        self.ids.mark_detached(id);
        Some(object)
    }

    fn bump(&mut self, id: ObjectId) {
        if id == self.sprite_id {
            self.sprite_version = self.sprite_version.wrapping_add(1);
        } else if let Some(object) = self.objects.get_mut(&id) {
            object.bump();
        }
    }

    // -- Lookup -------------------------------------------------------------

    pub fn sprite_id(&self) -> ObjectId {
        self.sprite_id
    }

    pub fn sprite(&self) -> &Sprite {
        &self.sprite
    }

    /// The sprite as a versioned entity.
    pub fn sprite_object(&self) -> Object {
        Object {
            id: self.sprite_id,
            version: self.sprite_version,
            data: ObjectData::Sprite(self.sprite.clone()),
        }
    }

    /// Id registry of this document.
    pub fn ids(&self) -> &IdRegistry {
        &self.ids
    }

    pub(crate) fn ids_mut(&mut self) -> &mut IdRegistry {
        &mut self.ids
    }

    /// Non-sprite entity by id.
    pub fn get(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        id == self.sprite_id || self.objects.contains_key(&id)
    }

    pub fn kind_of(&self, id: ObjectId) -> Option<ObjectKind> {
        if id == self.sprite_id {
            return Some(ObjectKind::Sprite);
        }
        self.objects.get(&id).map(Object::kind)
    }

    pub fn version_of(&self, id: ObjectId) -> Option<Version> {
        if id == self.sprite_id {
            return Some(self.sprite_version);
        }
        self.objects.get(&id).map(|o| o.version)
    }

    /// Number of live entities, the sprite included.
    pub fn len(&self) -> usize {
        self.objects.len() + 1
    }

    /// Always `false`: a graph holds at least its sprite.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Non-sprite entities, in no particular order.
    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    typed_access!(layer, layer_mut, Layer, Layer);
    typed_access!(cel, cel_mut, Cel, Cel);
    typed_access!(image, image_mut, Image, Image);
    typed_access!(frame, frame_mut, Frame, Frame);
    typed_access!(tag, tag_mut, Tag, Tag);
    typed_access!(slice, slice_mut, Slice, Slice);
    typed_access!(palette_by_id, palette_mut, Palette, Palette);

    pub fn palette(&self) -> GraphResult<&Palette> {
        self.palette_by_id(self.sprite.palette)
    }

    pub fn total_frames(&self) -> u32 {
        self.sprite.frames.len() as u32
    }

    /// Index of a frame in playback order.
    pub fn frame_index(&self, frame: ObjectId) -> Option<usize> {
        self.sprite.frames.iter().position(|&f| f == frame)
    }

    /// The cel of `layer` at `frame`, if any.
    pub fn cel_at(&self, layer: ObjectId, frame: u32) -> Option<ObjectId> {
        let LayerContent::Image { cels } = &self.layer(layer).ok()?.content else {
            return None;
        };
        cels.iter()
            .copied()
            .find(|&c| self.cel(c).is_ok_and(|cel| cel.frame == frame))
    }

    /// Every layer below the root group, depth first, bottom to top.
    pub fn layers(&self) -> Vec<ObjectId> {
        let mut out = Vec::new();
        self.collect_layers(self.sprite.root, &mut out);
        out
    }

    fn collect_layers(&self, group: ObjectId, out: &mut Vec<ObjectId>) {
        if let Ok(Layer {
            content: LayerContent::Group { children },
            ..
        }) = self.layer(group)
        {
            for &child in children {
                out.push(child);
                self.collect_layers(child, out);
            }
        }
    }

    /// Returns `true` if `id` is `ancestor` or lies below it.
    fn is_within(&self, id: ObjectId, ancestor: ObjectId) -> bool {
        let mut current = id;
        while !current.is_null() {
            if current == ancestor {
                return true;
            }
            current = match self.layer(current) {
                Ok(layer) => layer.parent,
                Err(_) => return false,
            };
        }
        false
    }

    /// Cloned copy of every live entity.
    pub fn snapshot(&self) -> GraphSnapshot {
        let mut snapshot = GraphSnapshot::new(self.sprite_id);
        snapshot.insert(self.sprite_object());
        for object in self.objects.values() {
            snapshot.insert(object.clone());
        }
        snapshot
    }

    // -- Detach / attach ----------------------------------------------------

    /// Where `id` currently sits, i.e. where its subtree would re-attach.
    pub fn placement_of(&self, id: ObjectId) -> GraphResult<Placement> {
        let kind = self.kind_of(id).ok_or(GraphError::NotFound(id))?;
        match kind {
            ObjectKind::Layer => {
                let parent = self.layer(id)?.parent;
                if parent.is_null() {
                    return Err(GraphError::NotRemovable(id));
                }
                let index = self
                    .children(parent)?
                    .iter()
                    .position(|&c| c == id)
                    .ok_or_else(|| {
                        GraphError::InvalidPlacement(format!("{id} missing from its parent"))
                    })?;
                Ok(Placement::Layer { parent, index })
            }
            ObjectKind::Cel => Ok(Placement::Cel {
                layer: self.cel(id)?.layer,
            }),
            ObjectKind::Frame => {
                if self.sprite.frames.len() <= 1 {
                    return Err(GraphError::NotRemovable(id));
                }
                let index = self.frame_index(id).ok_or(GraphError::NotFound(id))?;
                Ok(Placement::Frame { index })
            }
            ObjectKind::Tag => {
                position_in(&self.sprite.tags, id).map(|index| Placement::Tag { index })
            }
            ObjectKind::Slice => {
                position_in(&self.sprite.slices, id).map(|index| Placement::Slice { index })
            }
            ObjectKind::Sprite | ObjectKind::Image | ObjectKind::Palette => {
                Err(GraphError::NotRemovable(id))
            }
        }
    }

    fn children(&self, group: ObjectId) -> GraphResult<&Vec<ObjectId>> {
        match &self.layer(group)?.content {
            LayerContent::Group { children } => Ok(children),
            LayerContent::Image { .. } => Err(GraphError::InvalidPlacement(format!(
                "{group} is not a layer group"
            ))),
        }
    }

    fn children_mut(&mut self, group: ObjectId) -> GraphResult<&mut Vec<ObjectId>> {
        match &mut self.layer_mut(group)?.content {
            LayerContent::Group { children } => Ok(children),
            LayerContent::Image { .. } => Err(GraphError::InvalidPlacement(format!(
                "{group} is not a layer group"
            ))),
        }
    }

    fn cels_mut(&mut self, layer: ObjectId) -> GraphResult<&mut Vec<ObjectId>> {
        match &mut self.layer_mut(layer)?.content {
            LayerContent::Image { cels } => Ok(cels),
            LayerContent::Group { .. } => Err(GraphError::InvalidPlacement(format!(
                "{layer} is not an image layer"
            ))),
        }
    }

    /// Removes `id` and everything it owns from the graph.
    ///
    /// - a layer takes its child layers, cels and images with it
    /// - a cel takes its image
    /// - a frame takes every cel at that frame; later cels shift down one frame
    ///
    /// The returned subtree keeps the entities' ids and versions.
    pub fn detach(&mut self, id: ObjectId) -> GraphResult<Subtree> {
        let placement = self.placement_of(id)?;
        let mut owned = vec![id];
        match placement {
            Placement::Layer { parent, index } => {
                self.collect_owned_by_layer(id, &mut owned);
                self.children_mut(parent)?.remove(index);
                self.bump(parent);
            }
            Placement::Cel { layer } => {
                self.collect_owned_by_cel(id, &mut owned);
                self.cels_mut(layer)?.retain(|&c| c != id);
                self.bump(layer);
            }
            Placement::Frame { index } => {
                let frame = index as u32;
                for layer in self.layers() {
                    if let Some(cel) = self.cel_at(layer, frame) {
                        owned.push(cel);
                        self.collect_owned_by_cel(cel, &mut owned);
                        self.cels_mut(layer)?.retain(|&c| c != cel);
                        self.bump(layer);
                    }
                }
                self.sprite.frames.remove(index);
                self.bump(self.sprite_id);
                self.shift_cels(frame + 1, -1);
            }
            Placement::Tag { index } => {
                self.sprite.tags.remove(index);
                self.bump(self.sprite_id);
            }
            Placement::Slice { index } => {
                self.sprite.slices.remove(index);
                self.bump(self.sprite_id);
            }
        }

        let objects: Vec<Object> = owned.iter().filter_map(|&o| self.take(o)).collect();
        log::trace!("Detached {id} with {} entit(ies)", objects.len());
        Ok(Subtree::new(id, objects))
    }

    fn collect_owned_by_layer(&self, layer: ObjectId, out: &mut Vec<ObjectId>) {
        let Ok(layer) = self.layer(layer) else {
            return;
        };
        match &layer.content {
            LayerContent::Image { cels } => {
                for &cel in cels {
                    out.push(cel);
                    self.collect_owned_by_cel(cel, out);
                }
            }
            LayerContent::Group { children } => {
                for &child in children {
                    out.push(child);
                    self.collect_owned_by_layer(child, out);
                }
            }
        }
    }

    fn collect_owned_by_cel(&self, cel: ObjectId, out: &mut Vec<ObjectId>) {
        if let Ok(cel) = self.cel(cel)
            && !cel.image.is_null()
        {
            out.push(cel.image);
        }
    }

    /// Moves every cel at `from` or later by `delta` frames.
    fn shift_cels(&mut self, from: u32, delta: i64) {
        let shifted: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| matches!(&o.data, ObjectData::Cel(c) if c.frame >= from))
            .map(|o| o.id)
            .collect();
        for id in shifted {
            if let Ok(cel) = self.cel_mut(id) {
                cel.frame = (i64::from(cel.frame) + delta) as u32;
                self.bump(id);
            }
        }
    }

    /// Puts a detached subtree back at `placement`.
    ///
    /// Validates everything before touching the graph: on error the graph is
    /// unchanged.
    pub fn attach(&mut self, subtree: Subtree, placement: Placement) -> GraphResult<()> {
        let root = subtree.root();
        let root_object = subtree.root_object().ok_or_else(|| {
            GraphError::InvalidPlacement(format!("subtree is missing its root {root}"))
        })?;
        if let Some(live) = subtree.iter().map(|o| o.id).find(|&o| self.contains(o)) {
            return Err(GraphError::AlreadyLive(live));
        }

        match (placement, &root_object.data) {
            (Placement::Layer { parent, index }, ObjectData::Layer(layer)) => {
                if layer.parent != parent {
                    return Err(GraphError::InvalidPlacement(format!(
                        "{root} belongs to {}, not {parent}",
                        layer.parent
                    )));
                }
                let children = self.children(parent)?;
                if index > children.len() {
                    return Err(out_of_range("layer", index, children.len()));
                }
                self.children_mut(parent)?.insert(index, root);
                self.bump(parent);
            }
            (Placement::Cel { layer }, ObjectData::Cel(cel)) => {
                self.check_cel_slot(root, cel, layer)?;
                let frame = cel.frame;
                self.insert_cel_sorted(layer, root, frame)?;
            }
            (Placement::Frame { index }, ObjectData::Frame(_)) => {
                if index > self.sprite.frames.len() {
                    return Err(out_of_range("frame", index, self.sprite.frames.len()));
                }
                let cels: Vec<(ObjectId, ObjectId)> = subtree
                    .iter()
                    .filter_map(|o| match &o.data {
                        ObjectData::Cel(c) => Some((o.id, c.layer)),
                        _ => None,
                    })
                    .collect();
                for object in subtree.iter() {
                    if let ObjectData::Cel(cel) = &object.data {
                        if cel.frame != index as u32 {
                            return Err(GraphError::InvalidPlacement(format!(
                                "cel {} is at frame {}, expected {index}",
                                object.id, cel.frame
                            )));
                        }
                        self.check_image_layer(cel.layer)?;
                    }
                }

                self.shift_cels(index as u32, 1);
                self.sprite.frames.insert(index, root);
                self.bump(self.sprite_id);
                for (cel, layer) in cels {
                    self.insert_cel_sorted(layer, cel, index as u32)?;
                }
            }
            (Placement::Tag { index }, ObjectData::Tag(_)) => {
                if index > self.sprite.tags.len() {
                    return Err(out_of_range("tag", index, self.sprite.tags.len()));
                }
                self.sprite.tags.insert(index, root);
                self.bump(self.sprite_id);
            }
            (Placement::Slice { index }, ObjectData::Slice(_)) => {
                if index > self.sprite.slices.len() {
                    return Err(out_of_range("slice", index, self.sprite.slices.len()));
                }
                self.sprite.slices.insert(index, root);
                self.bump(self.sprite_id);
            }
            (placement, data) => {
                return Err(GraphError::InvalidPlacement(format!(
                    "{:?} {root} cannot go to {placement:?}",
                    data.kind()
                )));
            }
        }

        let count = subtree.len();
        for object in subtree.into_objects() {
            self.insert(object);
        }
        log::trace!("Attached {root} with {count} entit(ies)");
        Ok(())
    }

    fn check_image_layer(&self, layer: ObjectId) -> GraphResult<()> {
        match &self.layer(layer)?.content {
            LayerContent::Image { .. } => Ok(()),
            LayerContent::Group { .. } => Err(GraphError::InvalidPlacement(format!(
                "{layer} is not an image layer"
            ))),
        }
    }

    fn check_cel_slot(&self, id: ObjectId, cel: &Cel, layer: ObjectId) -> GraphResult<()> {
        if cel.layer != layer {
            return Err(GraphError::InvalidPlacement(format!(
                "cel {id} belongs to {}, not {layer}",
                cel.layer
            )));
        }
        self.check_image_layer(layer)?;
        if cel.frame >= self.total_frames() {
            return Err(out_of_range("frame", cel.frame as usize, self.sprite.frames.len()));
        }
        if let Some(existing) = self.cel_at(layer, cel.frame) {
            return Err(GraphError::InvalidPlacement(format!(
                "{layer} already has cel {existing} at frame {}",
                cel.frame
            )));
        }
        Ok(())
    }

    /// Inserts `cel` into the layer's list keeping it sorted by frame. The
    /// cel itself may not be in the arena yet, so its frame is passed in.
    fn insert_cel_sorted(&mut self, layer: ObjectId, cel: ObjectId, frame: u32) -> GraphResult<()> {
        let frames: Vec<u32> = match &self.layer(layer)?.content {
            LayerContent::Image { cels } => cels
                .iter()
                .map(|&c| self.cel(c).map_or(u32::MAX, |c| c.frame))
                .collect(),
            LayerContent::Group { .. } => {
                return Err(GraphError::InvalidPlacement(format!(
                    "{layer} is not an image layer"
                )));
            }
        };
        let index = frames.partition_point(|&f| f < frame);
        self.cels_mut(layer)?.insert(index, cel);
        self.bump(layer);
        Ok(())
    }

    /// Moves `layer` to child `index` of `parent`, where `index` counts the
    /// children after `layer` has been taken out.
    ///
    /// Returns the previous `(parent, index)`.
    pub fn move_layer(
        &mut self,
        layer: ObjectId,
        parent: ObjectId,
        index: usize,
    ) -> GraphResult<(ObjectId, usize)> {
        let Placement::Layer {
            parent: old_parent,
            index: old_index,
        } = self.placement_of(layer)?
        else {
            return Err(GraphError::KindMismatch {
                id: layer,
                expected: ObjectKind::Layer,
                actual: self.kind_of(layer).unwrap_or(ObjectKind::Layer),
            });
        };
        if self.is_within(parent, layer) {
            return Err(GraphError::InvalidPlacement(format!(
                "cannot move {layer} into itself"
            )));
        }
        let mut len = self.children(parent)?.len();
        if parent == old_parent {
            len -= 1;
        }
        if index > len {
            return Err(out_of_range("layer", index, len));
        }

        self.children_mut(old_parent)?.remove(old_index);
        self.children_mut(parent)?.insert(index, layer);
        self.layer_mut(layer)?.parent = parent;
        self.bump(old_parent);
        if parent != old_parent {
            self.bump(parent);
        }
        self.bump(layer);
        Ok((old_parent, old_index))
    }

    /// Moves `frame` to playback position `index`, where `index` counts the
    /// frames after `frame` has been taken out. Its cels move with it and the
    /// cels of the frames in between shift by one. Tag ranges are left alone.
    ///
    /// Returns the previous index.
    pub fn move_frame(&mut self, frame: ObjectId, index: usize) -> GraphResult<usize> {
        self.frame(frame)?;
        let from = self.frame_index(frame).ok_or(GraphError::NotFound(frame))?;
        let last = self.sprite.frames.len() - 1;
        if index > last {
            return Err(out_of_range("frame", index, last));
        }
        if index == from {
            return Ok(from);
        }

        let (old, new) = (from as u32, index as u32);
        let remap = move |f: u32| {
            if f == old {
                new
            } else if old < new && f > old && f <= new {
                f - 1
            } else if new < old && f >= new && f < old {
                f + 1
            } else {
                f
            }
        };
        let moved: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| matches!(&o.data, ObjectData::Cel(c) if remap(c.frame) != c.frame))
            .map(|o| o.id)
            .collect();
        for id in moved {
            if let Ok(cel) = self.cel_mut(id) {
                cel.frame = remap(cel.frame);
                self.bump(id);
            }
        }

        self.sprite.frames.remove(from);
        self.sprite.frames.insert(index, frame);
        self.bump(self.sprite_id);

        for layer in self.layers() {
            let resorted = match &self.layer(layer)?.content {
                LayerContent::Image { cels } => {
                    let mut sorted = cels.clone();
                    sorted.sort_by_key(|&c| self.cel(c).map_or(u32::MAX, |c| c.frame));
                    (sorted != *cels).then_some(sorted)
                }
                LayerContent::Group { .. } => None,
            };
            if let Some(sorted) = resorted {
                *self.cels_mut(layer)? = sorted;
                self.bump(layer);
            }
        }
        Ok(from)
    }

    // -- Fields -------------------------------------------------------------

    /// Current value of `field` on `id`.
    pub fn get_field(&self, id: ObjectId, field: Field) -> GraphResult<Value> {
        let mismatch = || GraphError::FieldMismatch { id, field };
        if id == self.sprite_id {
            return match field {
                Field::SpriteSize => Ok(Value::Size(self.sprite.width, self.sprite.height)),
                _ => Err(mismatch()),
            };
        }
        let object = self.objects.get(&id).ok_or(GraphError::NotFound(id))?;
        let value = match (&object.data, field) {
            (ObjectData::Layer(l), Field::LayerName) => Value::Text(l.name.clone()),
            (ObjectData::Layer(l), Field::LayerOpacity) => Value::U8(l.opacity),
            (ObjectData::Layer(l), Field::LayerVisible) => {
                Value::Bool(l.flags.contains(LayerFlags::VISIBLE))
            }
            (ObjectData::Layer(l), Field::LayerEditable) => {
                Value::Bool(l.flags.contains(LayerFlags::EDITABLE))
            }
            (ObjectData::Layer(l), Field::LayerBlend) => Value::Blend(l.blend),
            (ObjectData::Cel(c), Field::CelPosition) => Value::Point(c.x, c.y),
            (ObjectData::Cel(c), Field::CelOpacity) => Value::U8(c.opacity),
            (ObjectData::Frame(f), Field::FrameDuration) => Value::U32(f.duration),
            (ObjectData::Tag(t), Field::TagName) => Value::Text(t.name.clone()),
            (ObjectData::Tag(t), Field::TagRange) => Value::Range(t.from, t.to),
            (ObjectData::Tag(t), Field::TagDirection) => Value::Direction(t.direction),
            (ObjectData::Slice(s), Field::SliceName) => Value::Text(s.name.clone()),
            (ObjectData::Slice(s), Field::SliceBounds) => Value::Rect(s.bounds),
            (ObjectData::Palette(p), Field::PaletteEntry(i)) => {
                let color = p.colors.get(i as usize).ok_or_else(|| GraphError::InvalidValue {
                    field,
                    reason: format!("palette has {} entries", p.colors.len()),
                })?;
                Value::Color(*color)
            }
            _ => return Err(mismatch()),
        };
        Ok(value)
    }

    /// Sets `field` on `id` and bumps its version. Returns the old value.
    pub fn set_field(&mut self, id: ObjectId, field: Field, value: Value) -> GraphResult<Value> {
        let old = self.get_field(id, field)?;
        let wrong_type = || GraphError::InvalidValue {
            field,
            reason: format!("unexpected value {value:?}"),
        };

        if id == self.sprite_id {
            let Value::Size(width, height) = value else {
                return Err(wrong_type());
            };
            if width == 0 || height == 0 {
                return Err(GraphError::InvalidValue {
                    field,
                    reason: "sprite size must be non-zero".into(),
                });
            }
            self.sprite.width = width;
            self.sprite.height = height;
            self.bump(id);
            return Ok(old);
        }

        let object = self.objects.get_mut(&id).ok_or(GraphError::NotFound(id))?;
        match (&mut object.data, field, &value) {
            (ObjectData::Layer(l), Field::LayerName, Value::Text(name)) => l.name = name.clone(),
            (ObjectData::Layer(l), Field::LayerOpacity, Value::U8(v)) => l.opacity = *v,
            (ObjectData::Layer(l), Field::LayerVisible, Value::Bool(v)) => {
                l.flags.set(LayerFlags::VISIBLE, *v)
            }
            (ObjectData::Layer(l), Field::LayerEditable, Value::Bool(v)) => {
                l.flags.set(LayerFlags::EDITABLE, *v)
            }
            (ObjectData::Layer(l), Field::LayerBlend, Value::Blend(v)) => l.blend = *v,
            (ObjectData::Cel(c), Field::CelPosition, Value::Point(x, y)) => {
                c.x = *x;
                c.y = *y;
            }
            (ObjectData::Cel(c), Field::CelOpacity, Value::U8(v)) => c.opacity = *v,
            (ObjectData::Frame(f), Field::FrameDuration, Value::U32(v)) => f.duration = *v,
            (ObjectData::Tag(t), Field::TagName, Value::Text(name)) => t.name = name.clone(),
            (ObjectData::Tag(t), Field::TagRange, Value::Range(from, to)) => {
                if from > to {
                    return Err(GraphError::InvalidValue {
                        field,
                        reason: format!("range {from}..={to} is reversed"),
                    });
                }
                t.from = *from;
                t.to = *to;
            }
            (ObjectData::Tag(t), Field::TagDirection, Value::Direction(d)) => t.direction = *d,
            (ObjectData::Slice(s), Field::SliceName, Value::Text(name)) => s.name = name.clone(),
            (ObjectData::Slice(s), Field::SliceBounds, Value::Rect(r)) => s.bounds = *r,
            (ObjectData::Palette(p), Field::PaletteEntry(i), Value::Color(c)) => {
                // get_field already checked the index.
                if let Some(entry) = p.colors.get_mut(i as usize) {
                    *entry = *c;
                }
            }
            _ => return Err(wrong_type()),
        }
        object.bump();
        Ok(old)
    }

    // -- Pixels -------------------------------------------------------------

    /// Swaps the bytes of `rect` in `image` with `pixels`, row by row.
    ///
    /// `pixels` must hold exactly `rect` worth of tightly packed rows; after
    /// the call it holds the previous content of the region. Calling it
    /// twice restores the image.
    pub fn swap_pixels(
        &mut self,
        image: ObjectId,
        rect: Rect,
        pixels: &mut [u8],
    ) -> GraphResult<()> {
        let target = self.image_mut(image)?;
        let bpp = target.format.bytes_per_pixel();
        let fits = rect.x >= 0
            && rect.y >= 0
            && rect.x as u64 + u64::from(rect.width) <= u64::from(target.width)
            && rect.y as u64 + u64::from(rect.height) <= u64::from(target.height);
        if !fits {
            return Err(GraphError::InvalidPlacement(format!(
                "{rect:?} is outside {}x{} image {image}",
                target.width, target.height
            )));
        }
        let row_len = rect.width as usize * bpp;
        if pixels.len() != row_len * rect.height as usize {
            return Err(GraphError::InvalidPlacement(format!(
                "patch holds {} bytes, region needs {}",
                pixels.len(),
                row_len * rect.height as usize
            )));
        }

        let stride = target.stride();
        if row_len > 0 {
            for (row, patch_row) in pixels.chunks_exact_mut(row_len).enumerate() {
                let start = (rect.y as usize + row) * stride + rect.x as usize * bpp;
                target.pixels[start..start + row_len].swap_with_slice(patch_row);
            }
        }
        self.bump(image);
        Ok(())
    }
}

fn position_in(list: &[ObjectId], id: ObjectId) -> GraphResult<usize> {
    list.iter()
        .position(|&x| x == id)
        .ok_or(GraphError::NotFound(id))
}

fn out_of_range(what: &str, index: usize, len: usize) -> GraphError {
    GraphError::InvalidPlacement(format!("{what} index {index} out of range (len {len})"))
}

impl std::fmt::Debug for ObjectGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectGraph")
            .field("sprite", &self.sprite_id)
            .field("objects", &self.objects.len())
            .field("frames", &self.sprite.frames.len())
            .finish()
    }
}
