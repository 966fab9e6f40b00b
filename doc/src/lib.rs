//! # pixeldoc
//!
//! The sprite document on top of `pixeldoc-core`:
//!
//! - [`graph`]: the object graph of sprite, layers, cels, images, frames,
//!   tags, slices and palette, stored in an arena keyed by [`ObjectId`]
//! - [`cmds`]: the closed set of reversible [`DocCmd`]s
//! - [`suspend`]: byte-buffer storage for entities taken out of the graph
//! - [`notify`]: change notifications and observers
//! - [`doc`]: [`Doc`] with its lock guards and transactions
//! - [`backup`]: background snapshots under preemptible read locks
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use pixeldoc::{Doc, DocCmd, DocId, PixelFormat};
//!
//! let doc = Doc::new(DocId::new(1), 32, 32, PixelFormat::Rgba);
//! let mut writer = doc.write(Duration::from_millis(100)).unwrap();
//!
//! let mut tx = writer.transaction("Add Frames");
//! tx.execute(DocCmd::add_frame(1, 100)).unwrap();
//! tx.execute(DocCmd::add_frame(2, 100)).unwrap();
//! tx.commit().unwrap();
//! assert_eq!(writer.graph().total_frames(), 3);
//!
//! writer.undo().unwrap();
//! assert_eq!(writer.graph().total_frames(), 1);
//! ```

pub mod backup;
pub mod cmds;
pub mod context;
pub mod doc;
pub mod graph;
pub mod notify;
pub mod suspend;

pub use backup::{
    BackupError, BackupOutcome, BackupScanner, BackupSink, BackupTracker, ScanReport,
};
pub use cmds::{DocCmd, NewObject, ViewChange};
pub use context::{DocContext, DocView};
pub use doc::{
    Doc, DocError, DocReader, DocResult, DocTransaction, DocWeakReader, DocWriter,
};
pub use graph::{
    Field, GraphError, GraphSnapshot, ObjectGraph, ObjectId, ObjectKind, PixelFormat, Placement,
    Rect, Value,
};
pub use notify::{Change, DocEvent, DocId, DocObserver, EventMask};
pub use suspend::{SuspendError, SuspendedObject, SuspendedObjectStore};

pub use pixeldoc_core::UndoConfig;
pub use pixeldoc_core::lock::{LockMode, WeakLockFlag};
