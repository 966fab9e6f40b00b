//! Reversible document commands.
//!
//! This module defines the core abstractions for the undo/redo engine:
//!
//! - [`Editable`] — marker trait for the context commands mutate
//! - [`Cmd`] — one atomic, reversible mutation (Command pattern)
//! - [`CmdError`] / [`CmdResult`] — error handling for commands
//!
//! Commands are self-contained: each implementation stores whatever it needs
//! to invert itself (target ids, old/new values, suspended byte buffers).

use std::fmt;

/// Marker trait for types that commands execute against.
///
/// Implement this on the document context that owns the object graph and
/// whatever else a command needs to touch (notification bus, suspend store).
pub trait Editable: 'static {}

/// Error type for command failures.
///
/// [`Corrupted`](CmdError::Corrupted) marks data-corruption class failures
/// (an id that does not decode back to itself, a restored entity that is
/// already live). Everything else is a recoverable runtime condition that
/// makes the surrounding transaction roll back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CmdError {
    /// The target object was not found.
    #[error("target not found: {0}")]
    NotFound(String),
    /// The target is in an invalid state for this command.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Undo data no longer matches the document.
    #[error("corrupted undo data: {0}")]
    Corrupted(String),
    /// A custom error with a description.
    #[error("{0}")]
    Custom(String),
}

impl CmdError {
    /// Returns `true` for data-corruption class errors.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupted(_))
    }
}

/// Result type for command operations.
pub type CmdResult<T = ()> = Result<T, CmdError>;

/// One atomic, reversible document mutation.
///
/// # Lifecycle
///
/// A command is constructed while its pre-state is still live, then
/// [`execute`](Self::execute)d exactly once, then alternates between
/// [`undo`](Self::undo) and [`redo`](Self::redo) any number of times until the
/// history drops it.
///
/// `undo` must leave the target exactly as it was before `execute`, including
/// the identity of every object it touched. `redo` must be observably
/// equivalent to a second `execute`, but is a separate operation because the
/// forward state is no longer live and has to be rebuilt from whatever `undo`
/// stashed.
///
/// # Failure
///
/// A failing `execute` must leave the target untouched; the enclosing
/// [`Transaction`](super::Transaction) then undoes every command executed
/// before it.
///
/// # Object Safety
///
/// This trait is dyn-compatible so that different command types can share a
/// history as `Box<dyn Cmd<T>>`.
///
/// # Example
///
/// ```ignore
/// #[derive(Debug)]
/// struct SetOpacity {
///     layer: ObjectId,
///     old: u8,
///     new: u8,
/// }
///
/// impl Cmd<DocContext> for SetOpacity {
///     fn execute(&mut self, ctx: &mut DocContext) -> CmdResult {
///         self.old = ctx.graph.layer(self.layer)?.opacity;
///         self.redo(ctx)
///     }
///
///     fn undo(&mut self, ctx: &mut DocContext) -> CmdResult {
///         ctx.graph.layer_mut(self.layer)?.opacity = self.old;
///         Ok(())
///     }
///
///     fn redo(&mut self, ctx: &mut DocContext) -> CmdResult {
///         ctx.graph.layer_mut(self.layer)?.opacity = self.new;
///         Ok(())
///     }
///
///     fn label(&self) -> &str {
///         "Layer Opacity"
///     }
/// }
/// ```
pub trait Cmd<T: Editable>: fmt::Debug + Send {
    /// Applies the command for the first time, recording its pre-state.
    fn execute(&mut self, target: &mut T) -> CmdResult;

    /// Reverts the target to the state before [`execute`](Self::execute).
    fn undo(&mut self, target: &mut T) -> CmdResult;

    /// Re-applies the command after an [`undo`](Self::undo).
    fn redo(&mut self, target: &mut T) -> CmdResult;

    /// A short, human-readable label for the edit menu.
    fn label(&self) -> &str;

    /// Approximate bytes held by this command, used by memory-budgeted
    /// history eviction.
    fn memory_footprint(&self) -> usize {
        std::mem::size_of_val(self)
    }

    /// Whether this command changes document content.
    ///
    /// Selection or view-state commands return `false` so that they do not
    /// move the document away from its saved state.
    fn modifies_content(&self) -> bool {
        true
    }
}
