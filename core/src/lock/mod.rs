//! Document locking.
//!
//! - [`DocRwLock`] — blocking reader/writer lock with timeouts, read-to-write
//!   upgrade and a preemptible weak read mode
//! - [`LockMode`] — read or write
//! - [`WeakLockFlag`] / [`WeakLockState`] — the flag a weak holder shares
//!   with the lock so writers can ask it to step aside
//!
//! The lock only tracks who holds it; it does not own the data it guards.
//! Callers pair it with the data and hand out RAII guards.

mod rwlock;
mod weak;

pub use rwlock::{DocRwLock, LockMode};
pub use weak::{WeakLockFlag, WeakLockState};
