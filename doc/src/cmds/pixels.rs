use pixeldoc_core::undo::{Cmd, CmdResult};

use crate::context::DocContext;
use crate::graph::{ObjectId, Rect};
use crate::notify::Change;

/// Replaces a rectangle of an image's pixels.
///
/// The command holds the bytes that are *not* in the image: the new pixels
/// before execute, the old ones after. Execute, undo and redo all swap them.
#[derive(Debug, Clone)]
pub struct PatchImage {
    image: ObjectId,
    rect: Rect,
    pixels: Vec<u8>,
}

impl PatchImage {
    /// `pixels` holds `rect` as tightly packed rows in the image's format.
    pub fn new(image: ObjectId, rect: Rect, pixels: Vec<u8>) -> Self {
        Self {
            image,
            rect,
            pixels,
        }
    }

    fn swap(&mut self, ctx: &mut DocContext) -> CmdResult {
        ctx.graph.swap_pixels(self.image, self.rect, &mut self.pixels)?;
        ctx.notify(Change::PixelsModified { image: self.image });
        Ok(())
    }
}

impl Cmd<DocContext> for PatchImage {
    fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.swap(ctx)
    }

    fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.swap(ctx)
    }

    fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.swap(ctx)
    }

    fn label(&self) -> &str {
        "Draw"
    }

    fn memory_footprint(&self) -> usize {
        std::mem::size_of::<Self>() + self.pixels.len()
    }
}
