use pixeldoc_core::undo::{Cmd, CmdError, CmdResult};

use crate::context::DocContext;
use crate::graph::ObjectId;
use crate::notify::Change;

/// Moves a frame to another playback position, taking its cels along.
#[derive(Debug, Clone)]
pub struct MoveFrame {
    frame: ObjectId,
    index: usize,
    from: Option<usize>,
}

impl MoveFrame {
    pub fn new(frame: ObjectId, index: usize) -> Self {
        Self {
            frame,
            index,
            from: None,
        }
    }

    fn apply(&self, ctx: &mut DocContext, index: usize) -> CmdResult<usize> {
        let from = ctx.graph.move_frame(self.frame, index)?;
        ctx.notify(Change::FrameMoved { id: self.frame });
        Ok(from)
    }
}

impl Cmd<DocContext> for MoveFrame {
    fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.from = Some(self.apply(ctx, self.index)?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
        let from = self
            .from
            .ok_or_else(|| CmdError::InvalidState("frame move was never executed".into()))?;
        self.apply(ctx, from)?;
        Ok(())
    }

    fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.apply(ctx, self.index)?;
        Ok(())
    }

    fn label(&self) -> &str {
        "Move Frame"
    }
}
