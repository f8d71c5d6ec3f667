// SPDX-License-Identifier: AGPL-3.0-only

//! Typed errors for riptide configuration, geometry, and I/O.
//!
//! Public APIs return this enum instead of `Result<_, String>` so callers
//! can pattern-match on failure modes (bad config, geometry outside the
//! computing zone, dataset load, checkpoint store) rather than parsing
//! opaque strings. Configuration, geometry, and I/O errors are fatal to
//! the binaries; numerical degeneracies are recovered locally and logged,
//! never surfaced through this type.

use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors arising from configuration, acquisition geometry, dataset
/// loading, or the checkpoint store.
#[derive(Debug)]
pub enum Error {
    /// Missing or inconsistent configuration field.
    Config(String),

    /// Source or receiver outside the computing zone.
    Geometry(String),

    /// Dataset file loading or writing failed (path, underlying cause).
    DataLoad(String),

    /// Read/write failure on the wavefield checkpoint store.
    CheckpointIo(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Geometry(msg) => write!(f, "Geometry error: {msg}"),
            Self::DataLoad(msg) => write!(f, "Dataset I/O failed: {msg}"),
            Self::CheckpointIo(msg) => write!(f, "Checkpoint I/O failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
