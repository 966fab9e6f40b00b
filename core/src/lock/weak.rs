use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// State of a weak read lock, shared between the holder and the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WeakLockState {
    /// The flag is not attached to any lock.
    Unlocked = 0,
    /// The holder owns a weak read lock.
    Locked = 1,
    /// A writer wants the lock; the holder should release it soon.
    Unlocking = 2,
}

impl WeakLockState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Locked,
            2 => Self::Unlocking,
            _ => Self::Unlocked,
        }
    }
}

/// Shared flag published by a weak lock holder.
///
/// Cloning the flag shares the same state. The holder polls
/// [`should_release`](Self::should_release) between units of work and calls
/// `weak_unlock` on the lock as soon as it returns `true`.
#[derive(Clone, Default)]
pub struct WeakLockFlag {
    state: Arc<AtomicU8>,
}

impl WeakLockFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> WeakLockState {
        WeakLockState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` once a writer asked the holder to release the lock.
    pub fn should_release(&self) -> bool {
        self.state() == WeakLockState::Unlocking
    }

    pub(crate) fn set(&self, state: WeakLockState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Flips `Locked` to `Unlocking`. Any other state is left alone.
    pub(crate) fn request_release(&self) -> bool {
        self.state
            .compare_exchange(
                WeakLockState::Locked as u8,
                WeakLockState::Unlocking as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn same_as(&self, other: &WeakLockFlag) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for WeakLockFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WeakLockFlag").field(&self.state()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unlocked() {
        let flag = WeakLockFlag::new();
        assert_eq!(flag.state(), WeakLockState::Unlocked);
        assert!(!flag.should_release());
    }

    #[test]
    fn request_release_only_from_locked() {
        let flag = WeakLockFlag::new();
        assert!(!flag.request_release());
        assert_eq!(flag.state(), WeakLockState::Unlocked);

        flag.set(WeakLockState::Locked);
        assert!(flag.request_release());
        assert!(flag.should_release());
        assert!(!flag.request_release());
    }

    #[test]
    fn clones_share_state() {
        let flag = WeakLockFlag::new();
        let other = flag.clone();
        flag.set(WeakLockState::Locked);
        assert_eq!(other.state(), WeakLockState::Locked);
        assert!(flag.same_as(&other));
        assert!(!flag.same_as(&WeakLockFlag::new()));
    }
}
