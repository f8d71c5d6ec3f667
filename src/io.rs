// SPDX-License-Identifier: AGPL-3.0-only

//! Dataset I/O: name=value headers plus raw little-endian float32 arrays.
//!
//! A dataset is a pair of files: a text header of `name=value` lines
//! carrying shape (`n1`, `n2`, `n3`), spacing (`d1`, `d2`), units, and the
//! binary location (`in=`), and the raw float32 payload itself. The
//! default payload path is the header path with `@` appended. Velocity
//! grids are column-major with depth fast; shot gathers are ordered
//! `(is, it, ig)` with receivers fast.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Write as _;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Serialize to raw little-endian float32 bytes.
#[must_use]
pub fn floats_to_bytes(data: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for v in data {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Deserialize raw little-endian float32 bytes; `None` on a ragged length.
#[must_use]
pub fn bytes_to_floats(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Write a float32 array, truncating any existing file.
pub fn write_floats(path: &Path, data: &[f32]) -> Result<()> {
    fs::write(path, floats_to_bytes(data))
        .map_err(|e| Error::DataLoad(format!("{}: {e}", path.display())))
}

/// Append a float32 array to an existing (or new) file.
pub fn append_floats(path: &Path, data: &[f32]) -> Result<()> {
    let mut f = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::DataLoad(format!("{}: {e}", path.display())))?;
    f.write_all(&floats_to_bytes(data))
        .map_err(|e| Error::DataLoad(format!("{}: {e}", path.display())))
}

/// Read a whole float32 array.
pub fn read_floats(path: &Path) -> Result<Vec<f32>> {
    let bytes =
        fs::read(path).map_err(|e| Error::DataLoad(format!("{}: {e}", path.display())))?;
    bytes_to_floats(&bytes).ok_or_else(|| {
        Error::DataLoad(format!(
            "{}: size {} is not a whole number of float32s",
            path.display(),
            bytes.len()
        ))
    })
}

/// Text header of `name=value` pairs describing a binary dataset.
#[derive(Debug, Clone)]
pub struct DatasetHeader {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl DatasetHeader {
    /// Fresh header to be written at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Parse an existing header file.
    pub fn read(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).map_err(|e| Error::DataLoad(format!("{}: {e}", path.display())))?;
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                entries.insert(key.trim().to_string(), value.trim().to_string());
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Set (or replace) an entry.
    pub fn set(&mut self, key: &str, value: impl Display) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    /// Raw entry lookup.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Required integer entry; missing or malformed is a configuration error.
    pub fn require_usize(&self, key: &str) -> Result<usize> {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::Config(format!("no {key} in {}", self.path.display())))
    }

    /// Required float entry; missing or malformed is a configuration error.
    pub fn require_f32(&self, key: &str) -> Result<f32> {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::Config(format!("no {key} in {}", self.path.display())))
    }

    /// Location of the binary payload: the `in=` entry, or `<header>@`.
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        match self.get("in") {
            Some(p) => PathBuf::from(p),
            None => {
                let mut name = self.path.as_os_str().to_os_string();
                name.push("@");
                PathBuf::from(name)
            }
        }
    }

    /// Write the header file.
    pub fn write(&self) -> Result<()> {
        let mut text = String::new();
        for (key, value) in &self.entries {
            let _ = writeln!(text, "{key}={value}");
        }
        fs::write(&self.path, text)
            .map_err(|e| Error::DataLoad(format!("{}: {e}", self.path.display())))
    }
}

/// A velocity grid read from disk: interior shape, spacing, physical m/s.
#[derive(Debug, Clone)]
pub struct VelocityDataset {
    /// Depth cells.
    pub nz: usize,
    /// Lateral cells.
    pub nx: usize,
    /// Depth spacing (m).
    pub dz: f32,
    /// Lateral spacing (m).
    pub dx: f32,
    /// Column-major cell speeds, depth fast.
    pub data: Vec<f32>,
}

/// Read a velocity dataset (`n1=nz, n2=nx, d1=dz, d2=dx`).
pub fn read_velocity(path: &Path) -> Result<VelocityDataset> {
    let header = DatasetHeader::read(path)?;
    let nz = header.require_usize("n1")?;
    let nx = header.require_usize("n2")?;
    let dz = header.require_f32("d1")?;
    let dx = header.require_f32("d2")?;
    let data = read_floats(&header.binary_path())?;
    if data.len() != nz * nx {
        return Err(Error::DataLoad(format!(
            "{}: expected {}×{} = {} cells, found {}",
            path.display(),
            nz,
            nx,
            nz * nx,
            data.len()
        )));
    }
    Ok(VelocityDataset { nz, nx, dz, dx, data })
}

/// Read the observed shot gathers, checking the payload against the
/// configured acquisition (`ns` shots × `nt` samples × `ng` receivers).
pub fn read_shots(path: &Path, ns: usize, nt: usize, ng: usize) -> Result<Vec<f32>> {
    let header = DatasetHeader::read(path)?;
    let data = read_floats(&header.binary_path())?;
    if data.len() != ns * nt * ng {
        return Err(Error::DataLoad(format!(
            "{}: expected {ns}×{nt}×{ng} = {} samples, found {}",
            path.display(),
            ns * nt * ng,
            data.len()
        )));
    }
    Ok(data)
}
