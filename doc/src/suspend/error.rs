//! Errors raised while suspending or restoring objects.

use pixeldoc_core::undo::CmdError;

use crate::graph::{ObjectId, ObjectKind};

/// A suspended buffer that does not decode back into the entities it was
/// made from.
///
/// Every variant means the undo data is corrupt, so all of them map to
/// [`CmdError::Corrupted`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuspendError {
    #[error("buffer truncated")]
    Truncated,
    #[error("malformed record: {0}")]
    Format(String),
    #[error("{0} trailing byte(s) after the last record")]
    TrailingBytes(usize),
    #[error("decoded id {decoded} does not match suspended id {expected}")]
    IdMismatch { expected: ObjectId, decoded: ObjectId },
    #[error("decoded kind {decoded:?} does not match suspended kind {expected:?}")]
    KindMismatch {
        expected: ObjectKind,
        decoded: ObjectKind,
    },
    #[error("object {0} is already live")]
    AlreadyLive(ObjectId),
    #[error("object {0} was never minted by this document")]
    UnknownId(ObjectId),
    #[error("object {0} appears twice in one buffer")]
    Duplicate(ObjectId),
    #[error("{0:?} objects cannot be suspended")]
    NotSuspendable(ObjectKind),
    #[error("subtree is missing object {0}")]
    MissingObject(ObjectId),
    #[error("inconsistent record: {0}")]
    Inconsistent(String),
}

impl From<SuspendError> for CmdError {
    fn from(e: SuspendError) -> Self {
        CmdError::Corrupted(e.to_string())
    }
}

pub type SuspendResult<T> = Result<T, SuspendError>;
