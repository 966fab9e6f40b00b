use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::weak::{WeakLockFlag, WeakLockState};

/// Access mode for [`DocRwLock::lock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Read,
    Write,
}

#[derive(Default)]
struct LockState {
    writing: bool,
    readers: usize,
    weak: Option<WeakLockFlag>,
}

impl LockState {
    /// Asks the weak holder, if any, to step aside. Returns `true` if there
    /// is one.
    fn preempt_weak(&self) -> bool {
        match &self.weak {
            Some(flag) => {
                if flag.request_release() {
                    log::trace!("Asked weak lock holder to release");
                }
                true
            }
            None => false,
        }
    }

    fn try_acquire(&mut self, mode: LockMode) -> bool {
        match mode {
            LockMode::Read => {
                if self.writing {
                    return false;
                }
                self.readers += 1;
                true
            }
            LockMode::Write => {
                // Flip the weak holder even if readers keep us out, so it is
                // already gone when they leave.
                let weak = self.preempt_weak();
                if weak || self.writing || self.readers > 0 {
                    return false;
                }
                self.writing = true;
                true
            }
        }
    }

    fn try_upgrade(&mut self) -> bool {
        let weak = self.preempt_weak();
        if weak || self.writing || self.readers != 1 {
            return false;
        }
        self.readers = 0;
        self.writing = true;
        true
    }
}

/// Reader/writer lock guarding one document.
///
/// Any number of readers, or one writer. On top of that, a single *weak*
/// reader may hold the lock alongside ordinary readers; it is meant for
/// background work that must never delay the user. A write or upgrade
/// attempt that finds a weak holder flips its [`WeakLockFlag`] to
/// [`WeakLockState::Unlocking`] and keeps waiting; the holder notices, calls
/// [`weak_unlock`](Self::weak_unlock), and the writer gets in.
///
/// The lock is not reentrant: a thread holding the write lock that asks for
/// it again times out.
///
/// # State invariant
///
/// `writing` excludes both `readers > 0` and a weak holder.
///
/// # Example
///
/// ```ignore
/// let lock = DocRwLock::new();
/// if lock.lock(LockMode::Read, Duration::from_millis(100)) {
///     // ... read the document ...
///     if lock.upgrade_to_write(Duration::ZERO) {
///         // ... modify ...
///         lock.downgrade_to_read();
///     }
///     lock.unlock();
/// }
/// ```
pub struct DocRwLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl DocRwLock {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
        }
    }

    /// Acquires the lock in `mode`, waiting up to `timeout`.
    ///
    /// A zero timeout makes a single attempt. Returns `false` if the lock
    /// could not be acquired in time.
    pub fn lock(&self, mode: LockMode, timeout: Duration) -> bool {
        let acquired = self.wait_for(timeout, |state| state.try_acquire(mode));
        if acquired {
            log::trace!("Acquired {mode:?} lock");
        } else if !timeout.is_zero() {
            log::warn!("Timed out after {timeout:?} waiting for {mode:?} lock");
        }
        acquired
    }

    /// Turns the caller's read lock into a write lock.
    ///
    /// Only succeeds while the caller is the sole reader and no weak holder
    /// remains. On failure the caller still holds its read lock and the lock
    /// state is unchanged (apart from a weak holder being asked to release).
    pub fn upgrade_to_write(&self, timeout: Duration) -> bool {
        let upgraded = self.wait_for(timeout, LockState::try_upgrade);
        if upgraded {
            log::trace!("Upgraded read lock to write");
        } else if !timeout.is_zero() {
            log::warn!("Timed out after {timeout:?} upgrading to write lock");
        }
        upgraded
    }

    /// Turns the caller's write lock back into a read lock.
    pub fn downgrade_to_read(&self) {
        let mut state = self.state.lock();
        if !state.writing {
            log::error!("downgrade_to_read called without a write lock");
            debug_assert!(false, "downgrade_to_read called without a write lock");
            return;
        }
        state.writing = false;
        state.readers = 1;
        drop(state);
        self.released.notify_all();
        log::trace!("Downgraded write lock to read");
    }

    /// Releases a read or write lock held by the caller.
    pub fn unlock(&self) {
        let mut state = self.state.lock();
        if state.writing {
            state.writing = false;
        } else if state.readers > 0 {
            state.readers -= 1;
        } else {
            log::error!("unlock called on an unlocked document lock");
            debug_assert!(false, "unlock called on an unlocked document lock");
            return;
        }
        drop(state);
        self.released.notify_all();
    }

    /// Tries to take a weak read lock, publishing `flag` as its handle.
    ///
    /// Fails without waiting if a writer is active or another weak holder
    /// exists. On success the flag reads [`WeakLockState::Locked`].
    pub fn weak_lock(&self, flag: &WeakLockFlag) -> bool {
        let mut state = self.state.lock();
        if state.writing || state.weak.is_some() {
            return false;
        }
        flag.set(WeakLockState::Locked);
        state.weak = Some(flag.clone());
        log::trace!("Acquired weak lock");
        true
    }

    /// Releases the weak read lock and resets its flag.
    pub fn weak_unlock(&self) {
        let mut state = self.state.lock();
        let Some(flag) = state.weak.take() else {
            log::error!("weak_unlock called without a weak holder");
            debug_assert!(false, "weak_unlock called without a weak holder");
            return;
        };
        flag.set(WeakLockState::Unlocked);
        drop(state);
        self.released.notify_all();
        log::trace!("Released weak lock");
    }

    /// Returns `true` if `flag` is the current weak holder's flag.
    pub fn is_weak_holder(&self, flag: &WeakLockFlag) -> bool {
        self.state
            .lock()
            .weak
            .as_ref()
            .is_some_and(|held| held.same_as(flag))
    }

    /// Returns `true` while a writer holds the lock.
    pub fn is_writing(&self) -> bool {
        self.state.lock().writing
    }

    /// Number of ordinary readers (the weak holder is not counted).
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    /// Returns `true` while a weak holder exists.
    pub fn has_weak_holder(&self) -> bool {
        self.state.lock().weak.is_some()
    }

    fn wait_for(&self, timeout: Duration, mut attempt: impl FnMut(&mut LockState) -> bool) -> bool {
        let mut state = self.state.lock();
        if attempt(&mut state) {
            return true;
        }
        if timeout.is_zero() {
            return false;
        }
        match Instant::now().checked_add(timeout) {
            Some(deadline) => loop {
                let timed_out = self.released.wait_until(&mut state, deadline).timed_out();
                if attempt(&mut state) {
                    return true;
                }
                if timed_out {
                    return false;
                }
            },
            None => loop {
                self.released.wait(&mut state);
                if attempt(&mut state) {
                    return true;
                }
            },
        }
    }

    #[cfg(test)]
    fn raw_state(&self) -> parking_lot::MutexGuard<'_, LockState> {
        self.state.lock()
    }
}

impl Default for DocRwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocRwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DocRwLock")
            .field("writing", &state.writing)
            .field("readers", &state.readers)
            .field("weak", &state.weak.as_ref().map(WeakLockFlag::state))
            .finish()
    }
}
