//! Reversible editing: commands, transactions and the undo history.
//!
//! This module is decoupled from any concrete document type so that the
//! document crate can plug in its own context:
//!
//! - [`Editable`] — marker trait for the context commands mutate
//! - [`Cmd`] — one atomic, reversible mutation (Command pattern)
//! - [`Transaction`] — batch of executed commands committed as one step
//! - [`UndoHistory`] — linear undo/redo timeline with saved-state tracking
//!
//! # Content vs view-state commands
//!
//! Commands return `false` from [`Cmd::modifies_content`] when they only
//! change UI state (selection, scroll). Such entries are fully undoable but
//! do not move the saved-state distance, so
//! [`UndoHistory::has_unsaved_changes`] ignores them.

mod cmd;
mod history;
mod transaction;

pub use cmd::{Cmd, CmdError, CmdResult, Editable};
pub use history::{DEFAULT_MAX_UNDO, UndoEntry, UndoHistory};
pub use transaction::Transaction;
