//! Background backup of open documents.
//!
//! The [`BackupScanner`] thread wakes up every backup period and, for each
//! registered document whose history moved since the last pass, copies out
//! a [`GraphSnapshot`] under a weak lock. The copy checks the weak flag after
//! every object and gives up as soon as a writer asks for the document; the
//! next pass tries again. Finished snapshots go to a [`BackupSink`] after the
//! lock is released.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use pixeldoc_core::UndoConfig;
use pixeldoc_core::lock::WeakLockFlag;

use crate::doc::Doc;
use crate::graph::GraphSnapshot;
use crate::notify::DocId;

/// Errors reported by a [`BackupSink`] or while starting the scanner.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backup of {doc} rejected: {reason}")]
    Rejected { doc: DocId, reason: String },
}

/// Receives finished document snapshots.
pub trait BackupSink: Send {
    fn store(
        &mut self,
        doc: DocId,
        revision: u64,
        snapshot: GraphSnapshot,
    ) -> Result<(), BackupError>;
}

/// Result of one backup attempt on one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// The history did not move since the last copy.
    Unchanged,
    /// A writer holds the document, or another weak reader does.
    Busy,
    /// A writer asked for the document mid-copy.
    Preempted,
    Copied {
        revision: u64,
        snapshot: GraphSnapshot,
    },
}

/// Copies `doc` out under a weak lock published through `flag`.
///
/// `last_revision` is the history revision of the previous successful copy.
pub fn backup_doc(doc: &Doc, flag: &WeakLockFlag, last_revision: Option<u64>) -> BackupOutcome {
    let Some(reader) = doc.weak_read(flag) else {
        return BackupOutcome::Busy;
    };
    let revision = reader.revision();
    if last_revision == Some(revision) {
        return BackupOutcome::Unchanged;
    }

    let graph = reader.graph();
    let mut snapshot = GraphSnapshot::new(graph.sprite_id());
    snapshot.insert(graph.sprite_object());
    for object in graph.objects() {
        if reader.should_release() {
            log::debug!(
                "Backup of {} preempted after {} object(s)",
                doc.id(),
                snapshot.len()
            );
            return BackupOutcome::Preempted;
        }
        snapshot.insert(object.clone());
    }
    BackupOutcome::Copied { revision, snapshot }
}

/// Counters of one scan over the registered documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub stored: usize,
    pub unchanged: usize,
    pub busy: usize,
    pub preempted: usize,
    pub failed: usize,
}

/// Per-scanner memory of what was already backed up.
#[derive(Debug, Default)]
pub struct BackupTracker {
    flag: WeakLockFlag,
    last: HashMap<DocId, u64>,
}

impl BackupTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revision of the last stored copy of `doc`.
    pub fn last_revision(&self, doc: DocId) -> Option<u64> {
        self.last.get(&doc).copied()
    }

    /// Runs one backup attempt on every document in `docs`.
    pub fn scan(&mut self, docs: &[Arc<Doc>], sink: &mut dyn BackupSink) -> ScanReport {
        let mut report = ScanReport::default();
        for doc in docs {
            let id = doc.id();
            match backup_doc(doc, &self.flag, self.last_revision(id)) {
                BackupOutcome::Unchanged => report.unchanged += 1,
                BackupOutcome::Busy => report.busy += 1,
                BackupOutcome::Preempted => report.preempted += 1,
                BackupOutcome::Copied { revision, snapshot } => {
                    let objects = snapshot.len();
                    match sink.store(id, revision, snapshot) {
                        Ok(()) => {
                            log::trace!(
                                "Backed up {id} at revision {revision} ({objects} objects)"
                            );
                            self.last.insert(id, revision);
                            report.stored += 1;
                        }
                        Err(e) => {
                            log::error!("Backup of {id} failed: {e}");
                            report.failed += 1;
                        }
                    }
                }
            }
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Scanner thread
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    /// Waits up to `period`; returns `true` once stop was requested.
    fn wait(&self, period: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.wake.wait_for(&mut stopped, period);
        }
        *stopped
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }
}

/// Background thread backing up a fixed set of documents.
///
/// Stops and joins on [`stop`](Self::stop) or drop.
pub struct BackupScanner {
    signal: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
    period: Duration,
}

impl BackupScanner {
    pub fn spawn(
        docs: Vec<Arc<Doc>>,
        mut sink: Box<dyn BackupSink>,
        period: Duration,
    ) -> Result<Self, BackupError> {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);
        let count = docs.len();

        let thread = thread::Builder::new()
            .name("pixeldoc-backup".into())
            .spawn(move || {
                let mut tracker = BackupTracker::new();
                while !thread_signal.wait(period) {
                    let report = tracker.scan(&docs, sink.as_mut());
                    if report.stored > 0 || report.failed > 0 {
                        log::debug!("Backup pass: {report:?}");
                    }
                    if thread_signal.is_stopped() {
                        break;
                    }
                }
            })?;

        log::info!("Backup scanner started: {count} document(s) every {period:?}");
        Ok(Self {
            signal,
            thread: Some(thread),
            period,
        })
    }

    /// Uses the configured backup period.
    pub fn from_config(
        docs: Vec<Arc<Doc>>,
        sink: Box<dyn BackupSink>,
        config: &UndoConfig,
    ) -> Result<Self, BackupError> {
        Self::spawn(docs, sink, config.backup_period())
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stops the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.signal.stop();
        if thread.join().is_err() {
            log::error!("Backup scanner thread panicked");
        } else {
            log::info!("Backup scanner stopped");
        }
    }
}

impl Drop for BackupScanner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for BackupScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupScanner")
            .field("period", &self.period)
            .field("running", &self.is_running())
            .finish()
    }
}
