//! # pixeldoc core
//!
//! Document-agnostic building blocks of the pixeldoc editing engine:
//!
//! - [`undo`] — reversible commands, transactions and the undo history
//! - [`lock`] — the document reader/writer lock with weak (preemptible) reads
//! - [`config`] — engine limits and timings loaded from TOML

pub mod config;
pub mod lock;
pub mod undo;

pub use config::{ConfigError, UndoConfig};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
