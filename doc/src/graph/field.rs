use super::object::{AniDir, BlendMode, Rect, Rgba};

/// Scalar property of an entity that [`ObjectGraph::set_field`](super::ObjectGraph::set_field)
/// can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    LayerName,
    LayerOpacity,
    LayerVisible,
    LayerEditable,
    LayerBlend,
    CelPosition,
    CelOpacity,
    FrameDuration,
    SpriteSize,
    TagName,
    TagRange,
    TagDirection,
    SliceName,
    SliceBounds,
    /// Palette entry at the given index.
    PaletteEntry(u32),
}

impl Field {
    /// Edit-menu label for a change of this field.
    pub fn label(self) -> &'static str {
        match self {
            Self::LayerName => "Rename Layer",
            Self::LayerOpacity => "Layer Opacity",
            Self::LayerVisible => "Layer Visibility",
            Self::LayerEditable => "Lock Layer",
            Self::LayerBlend => "Layer Blend Mode",
            Self::CelPosition => "Move Cel",
            Self::CelOpacity => "Cel Opacity",
            Self::FrameDuration => "Frame Duration",
            Self::SpriteSize => "Canvas Size",
            Self::TagName => "Rename Tag",
            Self::TagRange => "Tag Range",
            Self::TagDirection => "Tag Direction",
            Self::SliceName => "Rename Slice",
            Self::SliceBounds => "Slice Bounds",
            Self::PaletteEntry(_) => "Palette Entry",
        }
    }
}

/// Value carried by a field change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    U8(u8),
    U32(u32),
    Bool(bool),
    Blend(BlendMode),
    Point(i32, i32),
    Size(u32, u32),
    Range(u32, u32),
    Direction(AniDir),
    Rect(Rect),
    Color(Rgba),
}

impl Value {
    /// Approximate bytes held, for undo memory accounting.
    pub fn memory_footprint(&self) -> usize {
        let heap = match self {
            Self::Text(s) => s.len(),
            _ => 0,
        };
        std::mem::size_of::<Self>() + heap
    }
}
