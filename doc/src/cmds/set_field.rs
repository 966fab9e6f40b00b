use pixeldoc_core::undo::{Cmd, CmdError, CmdResult};

use crate::context::DocContext;
use crate::graph::{Field, ObjectId, Value};
use crate::notify::Change;

/// Sets one scalar field.
#[derive(Debug, Clone)]
pub struct SetField {
    target: ObjectId,
    field: Field,
    new: Value,
    old: Option<Value>,
}

impl SetField {
    pub fn new(target: ObjectId, field: Field, value: Value) -> Self {
        Self {
            target,
            field,
            new: value,
            old: None,
        }
    }

    pub fn target(&self) -> ObjectId {
        self.target
    }

    fn apply(&self, ctx: &mut DocContext, value: Value) -> CmdResult<Value> {
        let old = ctx.graph.set_field(self.target, self.field, value)?;
        ctx.notify(Change::Modified {
            id: self.target,
            field: self.field,
        });
        Ok(old)
    }
}

impl Cmd<DocContext> for SetField {
    fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
        let old = self.apply(ctx, self.new.clone())?;
        self.old = Some(old);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
        let old = self
            .old
            .clone()
            .ok_or_else(|| CmdError::InvalidState("field change was never executed".into()))?;
        self.apply(ctx, old)?;
        Ok(())
    }

    fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.apply(ctx, self.new.clone())?;
        Ok(())
    }

    fn label(&self) -> &str {
        self.field.label()
    }

    fn memory_footprint(&self) -> usize {
        std::mem::size_of::<Self>()
            + self.new.memory_footprint()
            + self.old.as_ref().map_or(0, Value::memory_footprint)
    }
}
