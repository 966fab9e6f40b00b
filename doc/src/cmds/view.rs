use std::mem;

use pixeldoc_core::undo::{Cmd, CmdError, CmdResult};

use crate::context::DocContext;
use crate::graph::{ObjectId, Rect};
use crate::notify::Change;

/// One edit of the document view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewChange {
    Frame(u32),
    Layer(ObjectId),
    Selection(Option<Rect>),
}

/// Changes the current frame, the current layer or the selection.
///
/// Undoable like any other command, but it does not touch content, so it
/// never moves the document away from its saved state.
#[derive(Debug, Clone)]
pub struct SetView {
    change: ViewChange,
    old: Option<ViewChange>,
}

impl SetView {
    pub fn new(change: ViewChange) -> Self {
        Self { change, old: None }
    }

    pub fn change(&self) -> ViewChange {
        self.change
    }

    fn apply(&self, ctx: &mut DocContext, change: ViewChange) -> CmdResult<ViewChange> {
        let old = match change {
            ViewChange::Frame(frame) => {
                let total = ctx.graph.total_frames();
                if frame >= total {
                    return Err(CmdError::InvalidState(format!(
                        "frame {frame} out of range ({total} frames)"
                    )));
                }
                ViewChange::Frame(mem::replace(&mut ctx.view.frame, frame))
            }
            ViewChange::Layer(layer) => {
                ctx.graph.layer(layer)?;
                if layer == ctx.graph.sprite().root {
                    return Err(CmdError::InvalidState(
                        "the root group cannot be the current layer".into(),
                    ));
                }
                ViewChange::Layer(mem::replace(&mut ctx.view.layer, layer))
            }
            ViewChange::Selection(selection) => {
                if let Some(rect) = selection
                    && (rect.width == 0 || rect.height == 0)
                {
                    return Err(CmdError::InvalidState(format!("empty selection {rect:?}")));
                }
                ViewChange::Selection(mem::replace(&mut ctx.view.selection, selection))
            }
        };
        ctx.notify(Change::ViewChanged);
        Ok(old)
    }
}

impl Cmd<DocContext> for SetView {
    fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.old = Some(self.apply(ctx, self.change)?);
        Ok(())
    }

    fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
        let old = self
            .old
            .ok_or_else(|| CmdError::InvalidState("view change was never executed".into()))?;
        self.apply(ctx, old)?;
        Ok(())
    }

    fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
        self.apply(ctx, self.change)?;
        Ok(())
    }

    fn label(&self) -> &str {
        match self.change {
            ViewChange::Frame(_) => "Go to Frame",
            ViewChange::Layer(_) => "Select Layer",
            ViewChange::Selection(_) => "Change Selection",
        }
    }

    fn modifies_content(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PixelFormat;
    use crate::notify::DocId;

    fn ctx() -> DocContext {
        DocContext::new(DocId::new(1), 8, 8, PixelFormat::Rgba)
    }

    #[test]
    fn selection_round_trip() {
        let mut ctx = ctx();
        let rect = Rect::new(1, 1, 2, 2);
        let mut cmd = SetView::new(ViewChange::Selection(Some(rect)));
        assert!(!cmd.modifies_content());

        cmd.execute(&mut ctx).unwrap();
        assert_eq!(ctx.view.selection, Some(rect));
        cmd.undo(&mut ctx).unwrap();
        assert_eq!(ctx.view.selection, None);
        cmd.redo(&mut ctx).unwrap();
        assert_eq!(ctx.view.selection, Some(rect));
    }

    #[test]
    fn invalid_targets_leave_view_unchanged() {
        let mut ctx = ctx();
        let before = ctx.view;
        let root = ctx.graph.sprite().root;
        let frame = ctx.graph.sprite().frames[0];

        assert!(SetView::new(ViewChange::Frame(1)).execute(&mut ctx).is_err());
        assert!(SetView::new(ViewChange::Layer(root)).execute(&mut ctx).is_err());
        assert!(SetView::new(ViewChange::Layer(frame)).execute(&mut ctx).is_err());
        let empty = Some(Rect::new(0, 0, 0, 4));
        assert!(SetView::new(ViewChange::Selection(empty)).execute(&mut ctx).is_err());
        assert_eq!(ctx.view, before);
    }

    #[test]
    fn starts_on_first_layer() {
        let ctx = ctx();
        assert_eq!(ctx.view.layer, ctx.graph.layers()[0]);
        assert_eq!(ctx.view.frame, 0);
    }
}
