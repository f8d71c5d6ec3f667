// SPDX-License-Identifier: AGPL-3.0-only

//! Wavefield checkpoint store.
//!
//! The gradient engine bounds memory at O(grid) instead of O(nt·grid) by
//! persisting the wavefield pair every `check_step` forward steps and
//! reloading it while traversing time in reverse. The store is an opaque
//! byte-stream provider keyed by `(timestep, slot)`; the engine never
//! assumes anything about its layout.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::io;

/// Key for one persisted wavefield: a checkpointed step or the final pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckpointKey {
    /// Wavefield slot (1 or 2) at a checkpointed timestep.
    Step(usize, u8),
    /// Wavefield slot (1 or 2) of the final pair.
    Last(u8),
}

impl CheckpointKey {
    /// Stable file name for this key.
    #[must_use]
    pub fn file_name(&self) -> String {
        match self {
            Self::Step(it, slot) => format!("check_time_{it}_{slot}"),
            Self::Last(slot) => format!("check_time_last_{slot}"),
        }
    }
}

/// Persistence contract used by the gradient engine.
pub trait CheckpointStore {
    /// Persist one wavefield under `key`.
    fn save(&mut self, key: CheckpointKey, field: &[f32]) -> Result<()>;

    /// Load the wavefield stored under `key`, overwriting `field`.
    fn load(&mut self, key: CheckpointKey, field: &mut [f32]) -> Result<()>;
}

/// Directory-backed store: one raw float32 file per key.
#[derive(Debug, Clone)]
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    /// Store rooted at an existing directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at the `CHECKPOINTDIR` environment directory.
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var("CHECKPOINTDIR")
            .map_err(|_| Error::Config("CHECKPOINTDIR is not set".into()))?;
        Ok(Self::new(dir))
    }
}

impl CheckpointStore for DirStore {
    fn save(&mut self, key: CheckpointKey, field: &[f32]) -> Result<()> {
        let path = self.dir.join(key.file_name());
        std::fs::write(&path, io::floats_to_bytes(field))
            .map_err(|e| Error::CheckpointIo(format!("{}: {e}", path.display())))
    }

    fn load(&mut self, key: CheckpointKey, field: &mut [f32]) -> Result<()> {
        let path = self.dir.join(key.file_name());
        let bytes = std::fs::read(&path)
            .map_err(|e| Error::CheckpointIo(format!("{}: {e}", path.display())))?;
        let data = io::bytes_to_floats(&bytes).ok_or_else(|| {
            Error::CheckpointIo(format!("{}: ragged float32 payload", path.display()))
        })?;
        if data.len() != field.len() {
            return Err(Error::CheckpointIo(format!(
                "{}: expected {} floats, found {}",
                path.display(),
                field.len(),
                data.len()
            )));
        }
        field.copy_from_slice(&data);
        Ok(())
    }
}

/// In-memory store for tests and single-process runs that fit in RAM.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    slots: HashMap<CheckpointKey, Vec<f32>>,
}

impl MemStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemStore {
    fn save(&mut self, key: CheckpointKey, field: &[f32]) -> Result<()> {
        self.slots.insert(key, field.to_vec());
        Ok(())
    }

    fn load(&mut self, key: CheckpointKey, field: &mut [f32]) -> Result<()> {
        let data = self
            .slots
            .get(&key)
            .ok_or_else(|| Error::CheckpointIo(format!("missing checkpoint {}", key.file_name())))?;
        if data.len() != field.len() {
            return Err(Error::CheckpointIo(format!(
                "checkpoint {}: expected {} floats, found {}",
                key.file_name(),
                field.len(),
                data.len()
            )));
        }
        field.copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_file_names() {
        assert_eq!(CheckpointKey::Step(150, 1).file_name(), "check_time_150_1");
        assert_eq!(CheckpointKey::Last(2).file_name(), "check_time_last_2");
    }

    #[test]
    fn mem_store_round_trip() {
        let mut store = MemStore::new();
        let field = vec![1.0f32, -2.0, 3.5];
        store.save(CheckpointKey::Step(50, 1), &field).unwrap();
        let mut out = vec![0.0f32; 3];
        store.load(CheckpointKey::Step(50, 1), &mut out).unwrap();
        assert_eq!(out, field);
    }

    #[test]
    fn mem_store_missing_key_fails() {
        let mut store = MemStore::new();
        let mut out = vec![0.0f32; 4];
        let err = store.load(CheckpointKey::Last(1), &mut out).unwrap_err();
        assert!(err.to_string().contains("check_time_last_1"));
    }

    #[test]
    fn dir_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirStore::new(dir.path());
        let field: Vec<f32> = (0..64).map(|i| i as f32).collect();
        store.save(CheckpointKey::Last(2), &field).unwrap();
        assert!(dir.path().join("check_time_last_2").exists());

        let mut out = vec![0.0f32; 64];
        store.load(CheckpointKey::Last(2), &mut out).unwrap();
        assert_eq!(out, field);
    }

    #[test]
    fn dir_store_size_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DirStore::new(dir.path());
        store.save(CheckpointKey::Step(100, 1), &[1.0, 2.0]).unwrap();
        let mut out = vec![0.0f32; 3];
        let err = store.load(CheckpointKey::Step(100, 1), &mut out).unwrap_err();
        assert!(err.to_string().contains("expected 3 floats"));
    }
}
