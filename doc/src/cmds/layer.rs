use pixeldoc_core::undo::{Cmd, CmdError, CmdResult};

use crate::context::DocContext;
use crate::graph::ObjectId;
use crate::notify::Change;

/// Moves a layer to child `index` of group `parent`.
#[derive(Debug, Clone)]
pub struct MoveLayer {
    layer: ObjectId,
    parent: ObjectId,
    index: usize,
    from: Option<(ObjectId, usize)>,
}

impl MoveLayer {
    pub fn new(layer: ObjectId, parent: ObjectId, index: usize) -> Self {
        Self {
            layer,
            parent,
            index,
            from: None,
        }
    }

    fn apply(
        &self,
        ctx: &mut DocContext,
        parent: ObjectId,
        index: usize,
    ) -> CmdResult<(ObjectId, usize)> {
        let from = ctx.graph.move_layer(self.layer, parent, index)?;
        ctx.notify(Change::LayerMoved { id: self.layer });
        Ok(from)
    }
}

impl Cmd<DocContext> for MoveLayer {
    fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.from = Some(self.apply(ctx, self.parent, self.index)?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
        let (parent, index) = self
            .from
            .ok_or_else(|| CmdError::InvalidState("layer move was never executed".into()))?;
        self.apply(ctx, parent, index)?;
        Ok(())
    }

    fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.apply(ctx, self.parent, self.index)?;
        Ok(())
    }

    fn label(&self) -> &str {
        "Move Layer"
    }
}
