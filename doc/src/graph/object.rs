//! Entity types stored in the object graph.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::id::{ObjectId, ObjectKind, Version};

/// Pixel storage format of a sprite and its images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PixelFormat {
    Rgba = 0,
    Grayscale = 1,
    Indexed = 2,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba => 4,
            Self::Grayscale => 2,
            Self::Indexed => 1,
        }
    }
}

/// Layer blend mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum BlendMode {
    #[default]
    Normal = 0,
    Multiply = 1,
    Screen = 2,
    Overlay = 3,
    Darken = 4,
    Lighten = 5,
    Addition = 6,
    Subtract = 7,
}

bitflags! {
    /// Per-layer state bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct LayerFlags: u8 {
        const VISIBLE = 1 << 0;
        const EDITABLE = 1 << 1;
        const BACKGROUND = 1 << 2;
    }
}

impl Default for LayerFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::EDITABLE
    }
}

/// Animation direction of a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum AniDir {
    #[default]
    Forward = 0,
    Reverse = 1,
    PingPong = 2,
}

/// A palette colour.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
#[derive(Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Axis-aligned rectangle in sprite pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// The document root. There is exactly one per graph and it is never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Root layer group.
    pub root: ObjectId,
    /// Frames in playback order; a frame's index is its position here.
    pub frames: Vec<ObjectId>,
    pub tags: Vec<ObjectId>,
    pub slices: Vec<ObjectId>,
    pub palette: ObjectId,
}

/// What a layer holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerContent {
    /// Cels sorted by frame index, at most one per frame.
    Image { cels: Vec<ObjectId> },
    /// Child layers, bottom to top.
    Group { children: Vec<ObjectId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    /// Owning group; null for the root group.
    pub parent: ObjectId,
    pub flags: LayerFlags,
    pub opacity: u8,
    pub blend: BlendMode,
    pub content: LayerContent,
}

impl Layer {
    pub fn is_group(&self) -> bool {
        matches!(self.content, LayerContent::Group { .. })
    }
}

/// A layer's content at one frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cel {
    pub layer: ObjectId,
    pub frame: u32,
    pub x: i32,
    pub y: i32,
    pub opacity: u8,
    /// Owned image; null for an empty cel.
    pub image: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
}

impl Image {
    /// A zero-filled image.
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        let len = width as usize * height as usize * format.bytes_per_pixel();
        Self {
            width,
            height,
            format,
            pixels: vec![0; len],
        }
    }

    /// Bytes per image row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Duration in milliseconds.
    pub duration: u32,
}

/// Named frame range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub from: u32,
    pub to: u32,
    pub direction: AniDir,
}

/// Named rectangular region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice {
    pub name: String,
    pub bounds: Rect,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Palette {
    pub colors: Vec<Rgba>,
}

/// Entity payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectData {
    Sprite(Sprite),
    Layer(Layer),
    Cel(Cel),
    Image(Image),
    Frame(Frame),
    Tag(Tag),
    Slice(Slice),
    Palette(Palette),
}

impl ObjectData {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Sprite(_) => ObjectKind::Sprite,
            Self::Layer(_) => ObjectKind::Layer,
            Self::Cel(_) => ObjectKind::Cel,
            Self::Image(_) => ObjectKind::Image,
            Self::Frame(_) => ObjectKind::Frame,
            Self::Tag(_) => ObjectKind::Tag,
            Self::Slice(_) => ObjectKind::Slice,
            Self::Palette(_) => ObjectKind::Palette,
        }
    }
}

/// One versioned entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub version: Version,
    pub data: ObjectData,
}

impl Object {
    pub fn new(id: ObjectId, data: ObjectData) -> Self {
        Self {
            id,
            version: 0,
            data,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.data.kind()
    }

    /// Records one mutation.
    pub fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    /// Approximate heap and inline bytes held by this entity.
    pub fn memory_footprint(&self) -> usize {
        let heap = match &self.data {
            ObjectData::Sprite(s) => (s.frames.len() + s.tags.len() + s.slices.len()) * 4,
            ObjectData::Layer(l) => {
                l.name.len()
                    + match &l.content {
                        LayerContent::Image { cels } => cels.len() * 4,
                        LayerContent::Group { children } => children.len() * 4,
                    }
            }
            ObjectData::Image(i) => i.pixels.len(),
            ObjectData::Tag(t) => t.name.len(),
            ObjectData::Slice(s) => s.name.len(),
            ObjectData::Palette(p) => std::mem::size_of_val(p.colors.as_slice()),
            ObjectData::Cel(_) | ObjectData::Frame(_) => 0,
        };
        std::mem::size_of::<Self>() + heap
    }
}
