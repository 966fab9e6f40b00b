//! Lock-guarded documents.
//!
//! A [`Doc`] owns one sprite's graph, its undo history, its observers and
//! its suspend store, all behind a [`DocRwLock`]. Access goes through RAII
//! guards:
//!
//! - [`DocReader`]: shared read access; can try to upgrade to a writer
//! - [`DocWriter`]: exclusive access; opens transactions, undoes, redoes
//! - [`DocWeakReader`]: preemptible read access for background work
//!
//! Dropping a guard releases its hold on the lock.

use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::time::Duration;

use pixeldoc_core::lock::{DocRwLock, LockMode, WeakLockFlag};
use pixeldoc_core::undo::{Cmd, CmdError, Transaction, UndoHistory};
use pixeldoc_core::UndoConfig;

use crate::cmds::DocCmd;
use crate::context::{DocContext, DocView};
use crate::graph::{ObjectGraph, ObjectId, PixelFormat};
use crate::notify::{Change, DocId, DocObserver, EventMask, SubscriptionId};
use crate::suspend::StoreUsage;

/// Errors reported by document operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocError {
    #[error("could not {mode:?}-lock {doc} within {timeout:?}")]
    LockTimeout {
        doc: DocId,
        mode: LockMode,
        timeout: Duration,
    },
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    #[error(transparent)]
    Cmd(#[from] CmdError),
}

pub type DocResult<T> = Result<T, DocError>;

struct DocState {
    content: DocContext,
    history: UndoHistory<DocContext>,
}

/// One open sprite document.
pub struct Doc {
    id: DocId,
    lock: DocRwLock,
    state: UnsafeCell<DocState>,
    config: UndoConfig,
}

// SAFETY: `state` is only reached through guards. A `DocWriter` holds the
// write side of `lock`, so it is the only accessor. Readers (blocking or
// weak) only get `&ObjectGraph` and plain history counters and labels; the
// observers and commands, which are `Send` but not `Sync`, are touched only
// through a writer.
unsafe impl Sync for Doc {}

impl Doc {
    /// A new document with the default [`UndoConfig`].
    pub fn new(id: DocId, width: u32, height: u32, format: PixelFormat) -> Self {
        Self::with_config(id, width, height, format, UndoConfig::default())
    }

    pub fn with_config(
        id: DocId,
        width: u32,
        height: u32,
        format: PixelFormat,
        config: UndoConfig,
    ) -> Self {
        log::debug!("Opening {id}: {width}x{height} {format:?}");
        Self {
            id,
            lock: DocRwLock::new(),
            state: UnsafeCell::new(DocState {
                content: DocContext::new(id, width, height, format),
                history: UndoHistory::with_config(&config),
            }),
            config,
        }
    }

    pub fn id(&self) -> DocId {
        self.id
    }

    pub fn config(&self) -> &UndoConfig {
        &self.config
    }

    /// The lock guarding this document, for introspection.
    pub fn lock_state(&self) -> &DocRwLock {
        &self.lock
    }

    /// Takes a read lock, waiting up to `timeout`.
    pub fn read(&self, timeout: Duration) -> DocResult<DocReader<'_>> {
        if self.lock.lock(LockMode::Read, timeout) {
            Ok(DocReader::new(self))
        } else {
            Err(self.timed_out(LockMode::Read, timeout))
        }
    }

    /// Takes the write lock, waiting up to `timeout`.
    pub fn write(&self, timeout: Duration) -> DocResult<DocWriter<'_>> {
        if self.lock.lock(LockMode::Write, timeout) {
            Ok(DocWriter::new(self))
        } else {
            Err(self.timed_out(LockMode::Write, timeout))
        }
    }

    /// Takes a read lock, waiting up to the configured lock timeout.
    pub fn read_default(&self) -> DocResult<DocReader<'_>> {
        self.read(self.config.lock_timeout())
    }

    /// Takes the write lock, waiting up to the configured lock timeout.
    pub fn write_default(&self) -> DocResult<DocWriter<'_>> {
        self.write(self.config.lock_timeout())
    }

    /// Single read attempt.
    pub fn try_read(&self) -> Option<DocReader<'_>> {
        self.read(Duration::ZERO).ok()
    }

    /// Single write attempt.
    pub fn try_write(&self) -> Option<DocWriter<'_>> {
        self.write(Duration::ZERO).ok()
    }

    /// Takes a preemptible read hold published through `flag`.
    ///
    /// Returns `None` while a writer is active or another weak reader exists.
    pub fn weak_read(&self, flag: &WeakLockFlag) -> Option<DocWeakReader<'_>> {
        self.lock.weak_lock(flag).then(|| DocWeakReader {
            doc: self,
            flag: flag.clone(),
            _not_send: PhantomData,
        })
    }

    fn timed_out(&self, mode: LockMode, timeout: Duration) -> DocError {
        log::debug!("Could not {mode:?}-lock {} within {timeout:?}", self.id);
        DocError::LockTimeout {
            doc: self.id,
            mode,
            timeout,
        }
    }

    /// # Safety
    ///
    /// The caller holds a read, weak or write hold on `lock`.
    unsafe fn state(&self) -> &DocState {
        unsafe { &*self.state.get() }
    }

    /// # Safety
    ///
    /// The caller holds the write lock and no other reference into the state
    /// is alive.
    #[allow(clippy::mut_from_ref)]
    unsafe fn state_mut(&self) -> &mut DocState {
        unsafe { &mut *self.state.get() }
    }
}

impl fmt::Debug for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Doc")
            .field("id", &self.id)
            .field("lock", &self.lock)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DocReader
// ---------------------------------------------------------------------------

/// Shared read access to a [`Doc`].
pub struct DocReader<'a> {
    doc: &'a Doc,
    _not_send: PhantomData<*const ()>,
}

impl<'a> DocReader<'a> {
    fn new(doc: &'a Doc) -> Self {
        Self {
            doc,
            _not_send: PhantomData,
        }
    }

    fn state(&self) -> &DocState {
        // SAFETY: this guard holds a read lock.
        unsafe { self.doc.state() }
    }

    pub fn doc(&self) -> &'a Doc {
        self.doc
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.state().content.graph
    }

    pub fn view(&self) -> &DocView {
        &self.state().content.view
    }

    pub fn can_undo(&self) -> bool {
        self.state().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.state().history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.state().history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.state().history.redo_label()
    }

    /// Counts every history change; unchanged means the content is too.
    pub fn revision(&self) -> u64 {
        self.state().history.revision()
    }

    pub fn is_in_saved_state(&self) -> bool {
        self.state().history.is_in_saved_state()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.state().history.has_unsaved_changes()
    }

    /// Tries to turn this read hold into the write lock.
    ///
    /// Only succeeds while this is the sole reader. On failure the read hold
    /// is handed back unchanged.
    pub fn upgrade(self, timeout: Duration) -> Result<DocWriter<'a>, DocReader<'a>> {
        if self.doc.lock.upgrade_to_write(timeout) {
            let this = ManuallyDrop::new(self);
            Ok(DocWriter::new(this.doc))
        } else {
            Err(self)
        }
    }
}

impl Drop for DocReader<'_> {
    fn drop(&mut self) {
        self.doc.lock.unlock();
    }
}

impl fmt::Debug for DocReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocReader").field("doc", &self.doc.id).finish()
    }
}

// ---------------------------------------------------------------------------
// DocWriter
// ---------------------------------------------------------------------------

/// Exclusive access to a [`Doc`].
pub struct DocWriter<'a> {
    doc: &'a Doc,
    _not_send: PhantomData<*const ()>,
}

impl<'a> DocWriter<'a> {
    fn new(doc: &'a Doc) -> Self {
        Self {
            doc,
            _not_send: PhantomData,
        }
    }

    fn state(&self) -> &DocState {
        // SAFETY: this guard holds the write lock.
        unsafe { self.doc.state() }
    }

    fn state_mut(&mut self) -> &mut DocState {
        // SAFETY: this guard holds the write lock, and `&mut self` keeps
        // every other borrow of the state out.
        unsafe { self.doc.state_mut() }
    }

    pub fn doc(&self) -> &'a Doc {
        self.doc
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.state().content.graph
    }

    pub fn view(&self) -> &DocView {
        &self.state().content.view
    }

    pub fn history(&self) -> &UndoHistory<DocContext> {
        &self.state().history
    }

    /// Turns undo recording on or off. While off, commits still apply their
    /// commands but record nothing, and a content change drops the existing
    /// undo and redo steps.
    pub fn set_undo_enabled(&mut self, enabled: bool) {
        self.state_mut().history.set_enabled(enabled);
    }

    pub fn is_undo_enabled(&self) -> bool {
        self.state().history.is_enabled()
    }

    /// Buffers and bytes currently suspended by this document's commands.
    pub fn suspended_usage(&self) -> StoreUsage {
        self.state().content.store.usage()
    }

    /// Opens a transaction. It rolls back on drop unless committed.
    pub fn transaction(&mut self, label: impl Into<String>) -> DocTransaction<'_> {
        DocTransaction {
            state: self.state_mut(),
            tx: Some(Transaction::begin(label)),
        }
    }

    /// Runs `cmd` as a transaction of its own, labelled after the command.
    ///
    /// Returns the id of the entity it created, if any.
    pub fn apply(&mut self, cmd: impl Into<DocCmd>) -> DocResult<Option<ObjectId>> {
        let mut cmd = cmd.into();
        cmd.prepare(&mut self.state_mut().content.graph).map_err(CmdError::from)?;
        let label = cmd.label().to_owned();
        let mut tx = self.transaction(label);
        let created = tx.execute(cmd)?;
        tx.commit()?;
        Ok(created)
    }

    pub fn undo(&mut self) -> DocResult<()> {
        let state = self.state_mut();
        let label = state.history.undo_label().ok_or(DocError::NothingToUndo)?.to_owned();
        let was_saved = state.history.is_in_saved_state();
        state.history.undo(&mut state.content)?;
        state.content.notify(Change::Undone { label });
        state.saved_state_transition(was_saved);
        Ok(())
    }

    pub fn redo(&mut self) -> DocResult<()> {
        let state = self.state_mut();
        let label = state.history.redo_label().ok_or(DocError::NothingToRedo)?.to_owned();
        let was_saved = state.history.is_in_saved_state();
        state.history.redo(&mut state.content)?;
        state.content.notify(Change::Redone { label });
        state.saved_state_transition(was_saved);
        Ok(())
    }

    /// Records the current state as the one on disk.
    pub fn mark_saved_state(&mut self) {
        let state = self.state_mut();
        let was_saved = state.history.is_in_saved_state();
        state.history.mark_saved_state();
        state.saved_state_transition(was_saved);
    }

    /// Records that no point of the history matches the file on disk any
    /// more, until the next [`mark_saved_state`](Self::mark_saved_state).
    pub fn impossible_to_back_to_saved_state(&mut self) {
        let state = self.state_mut();
        let was_saved = state.history.is_in_saved_state();
        state.history.impossible_to_back_to_saved_state();
        state.saved_state_transition(was_saved);
    }

    pub fn subscribe(&mut self, mask: EventMask, observer: Box<dyn DocObserver>) -> SubscriptionId {
        self.state_mut().content.bus.subscribe(mask, observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Option<Box<dyn DocObserver>> {
        self.state_mut().content.bus.unsubscribe(id)
    }

    /// Gives up exclusive access but keeps a read hold.
    pub fn downgrade(self) -> DocReader<'a> {
        let this = ManuallyDrop::new(self);
        this.doc.lock.downgrade_to_read();
        DocReader::new(this.doc)
    }
}

impl Drop for DocWriter<'_> {
    fn drop(&mut self) {
        self.doc.lock.unlock();
    }
}

impl fmt::Debug for DocWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocWriter").field("doc", &self.doc.id).finish()
    }
}

impl DocState {
    fn saved_state_transition(&mut self, was_saved: bool) {
        let saved = self.history.is_in_saved_state();
        if saved != was_saved {
            self.content.notify(Change::SavedStateChanged { saved });
        }
    }
}

// ---------------------------------------------------------------------------
// DocWeakReader
// ---------------------------------------------------------------------------

/// Preemptible read access to a [`Doc`].
///
/// A writer that wants the document flips the flag to `Unlocking`; the
/// holder is expected to poll [`should_release`](Self::should_release)
/// between units of work and drop the guard promptly.
pub struct DocWeakReader<'a> {
    doc: &'a Doc,
    flag: WeakLockFlag,
    _not_send: PhantomData<*const ()>,
}

impl DocWeakReader<'_> {
    pub fn graph(&self) -> &ObjectGraph {
        // SAFETY: this guard holds the weak read hold, which keeps writers out.
        unsafe { &self.doc.state().content.graph }
    }

    pub fn revision(&self) -> u64 {
        // SAFETY: as above.
        unsafe { self.doc.state().history.revision() }
    }

    pub fn should_release(&self) -> bool {
        self.flag.should_release()
    }
}

impl Drop for DocWeakReader<'_> {
    fn drop(&mut self) {
        self.doc.lock.weak_unlock();
    }
}

impl fmt::Debug for DocWeakReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocWeakReader")
            .field("doc", &self.doc.id)
            .field("flag", &self.flag.state())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// DocTransaction
// ---------------------------------------------------------------------------

/// An open transaction on a write-locked document.
///
/// Each [`execute`](Self::execute)d command takes effect immediately.
/// Dropping the transaction without [`commit`](Self::commit) rolls it back.
pub struct DocTransaction<'w> {
    state: &'w mut DocState,
    tx: Option<Transaction<DocContext>>,
}

impl DocTransaction<'_> {
    /// Executes `cmd` and adds it to the batch.
    ///
    /// On failure every command executed so far is undone and the
    /// transaction can only be dropped or rolled back. Returns the id of the
    /// entity `cmd` creates, if any.
    pub fn execute(&mut self, cmd: impl Into<DocCmd>) -> DocResult<Option<ObjectId>> {
        let tx = self
            .tx
            .as_mut()
            .ok_or_else(|| CmdError::InvalidState("transaction already closed".into()))?;
        let mut cmd = cmd.into();
        cmd.prepare(&mut self.state.content.graph).map_err(CmdError::from)?;
        let created = cmd.created_id();
        tx.add(Box::new(cmd), &mut self.state.content)?;
        Ok(created)
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.state.content.graph
    }

    pub fn label(&self) -> &str {
        self.tx.as_ref().map_or("", Transaction::label)
    }

    pub fn len(&self) -> usize {
        self.tx.as_ref().map_or(0, Transaction::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// See [`Transaction::with_modifies_saved_state`].
    pub fn set_modifies_saved_state(&mut self, modifies: bool) {
        self.tx = self.tx.take().map(|tx| tx.with_modifies_saved_state(modifies));
    }

    /// Records the batch as one undo step.
    ///
    /// An empty batch records nothing and notifies nothing, and neither does
    /// a batch committed while undo recording is off (apart from leaving the
    /// saved state). Returns whether a step was recorded.
    pub fn commit(mut self) -> DocResult<bool> {
        let Some(tx) = self.tx.take() else {
            return Ok(false);
        };
        let label = tx.label().to_owned();
        let state = &mut *self.state;
        let was_saved = state.history.is_in_saved_state();
        let recorded = tx.commit(&mut state.history)?;
        if recorded {
            state.content.notify(Change::Committed { label });
        }
        state.saved_state_transition(was_saved);
        Ok(recorded)
    }

    /// Undoes every executed command and records nothing.
    pub fn rollback(mut self) -> DocResult<()> {
        self.rollback_inner()
    }

    fn rollback_inner(&mut self) -> DocResult<()> {
        let Some(tx) = self.tx.take() else {
            return Ok(());
        };
        let label = tx.label().to_owned();
        let result = tx.rollback(&mut self.state.content);
        self.state.content.notify(Change::RolledBack { label });
        result.map_err(DocError::from)
    }
}

impl Drop for DocTransaction<'_> {
    fn drop(&mut self) {
        if self.tx.is_some()
            && let Err(e) = self.rollback_inner()
        {
            log::error!("Rollback on drop failed: {e}");
        }
    }
}

impl fmt::Debug for DocTransaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocTransaction")
            .field("tx", &self.tx)
            .finish()
    }
}
