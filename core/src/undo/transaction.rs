//! Batches of commands committed as one undo step.
//!
//! A [`Transaction`] collects the commands issued during one user-visible
//! operation. Each command executes as soon as it is added, so the document
//! reflects every step immediately (mid-transaction previews work), and the
//! whole batch either lands in the [`UndoHistory`] as a single entry or is
//! rolled back command by command.

use std::fmt;

use super::cmd::{Cmd, CmdError, CmdResult, Editable};
use super::history::{UndoEntry, UndoHistory};

/// An open batch of executed commands.
///
/// Commit with [`commit`](Self::commit) or discard with
/// [`rollback`](Self::rollback). Dropping an open transaction without doing
/// either keeps its effects on the target but records nothing; callers that
/// want rollback-on-drop wrap it (the document layer does).
pub struct Transaction<T: Editable> {
    label: String,
    cmds: Vec<Box<dyn Cmd<T>>>,
    modifies_saved_state: bool,
    aborted: bool,
}

impl<T: Editable> Transaction<T> {
    /// Opens a new, empty transaction.
    pub fn begin(label: impl Into<String>) -> Self {
        let label = label.into();
        log::debug!("Transaction begin: {label}");
        Self {
            label,
            cmds: Vec::new(),
            modifies_saved_state: false,
            aborted: false,
        }
    }

    /// Forces the transaction to count as a content change even if none of
    /// its commands report [`Cmd::modifies_content`].
    pub fn with_modifies_saved_state(mut self, modifies: bool) -> Self {
        self.modifies_saved_state = modifies;
        self
    }

    /// The label shown in the edit menu.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of executed commands in the batch.
    pub fn len(&self) -> usize {
        self.cmds.len()
    }

    /// Returns `true` if no command has been executed yet.
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Returns `true` once a failed [`add`](Self::add) has rolled the batch back.
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Whether committing this batch moves the document away from its saved state.
    pub fn modifies_saved_state(&self) -> bool {
        self.modifies_saved_state || self.cmds.iter().any(|c| c.modifies_content())
    }

    /// Executes `cmd` against `target` and appends it to the batch.
    ///
    /// If execution fails, every command already in the batch is undone in
    /// reverse order, the batch is emptied and marked aborted, and the error
    /// is returned. The target is then exactly as it was when the
    /// transaction began.
    pub fn add(&mut self, mut cmd: Box<dyn Cmd<T>>, target: &mut T) -> CmdResult {
        if self.aborted {
            return Err(CmdError::InvalidState(format!(
                "transaction '{}' was aborted",
                self.label
            )));
        }

        if let Err(e) = cmd.execute(target) {
            log::warn!(
                "'{}' failed inside transaction '{}': {e}; rolling back {} command(s)",
                cmd.label(),
                self.label,
                self.cmds.len()
            );
            // The rollback result is secondary; the caller needs the cause.
            let _ = self.undo_all(target);
            self.aborted = true;
            return Err(e);
        }

        self.cmds.push(cmd);
        Ok(())
    }

    /// Freezes the batch into `history` as one entry.
    ///
    /// Returns `Ok(true)` if an entry was recorded, and `Ok(false)` for an
    /// empty batch or while `history` has recording turned off.
    pub fn commit(self, history: &mut UndoHistory<T>) -> CmdResult<bool> {
        if self.aborted {
            return Err(CmdError::InvalidState(format!(
                "cannot commit aborted transaction '{}'",
                self.label
            )));
        }
        if self.cmds.is_empty() {
            log::debug!("Transaction '{}' committed empty", self.label);
            return Ok(false);
        }

        log::debug!(
            "Transaction commit: {} ({} command(s))",
            self.label,
            self.cmds.len()
        );
        let modifies_content = self.modifies_saved_state();
        Ok(history.add(UndoEntry::new(self.label, self.cmds, modifies_content)))
    }

    /// Undoes every command in strict reverse order and discards the batch
    /// without touching any history.
    ///
    /// Keeps going when one undo fails so the remaining commands still get a
    /// chance to revert; the first error is returned.
    pub fn rollback(mut self, target: &mut T) -> CmdResult {
        log::debug!(
            "Transaction rollback: {} ({} command(s))",
            self.label,
            self.cmds.len()
        );
        self.undo_all(target)
    }

    fn undo_all(&mut self, target: &mut T) -> CmdResult {
        let mut first_error = None;
        while let Some(mut cmd) = self.cmds.pop() {
            if let Err(e) = cmd.undo(target) {
                log::error!("Rollback of '{}' failed: {e}", cmd.label());
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<T: Editable> fmt::Debug for Transaction<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("label", &self.label)
            .field("cmds", &self.cmds.len())
            .field("modifies_saved_state", &self.modifies_saved_state)
            .field("aborted", &self.aborted)
            .finish()
    }
}
