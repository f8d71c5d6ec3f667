// SPDX-License-Identifier: AGPL-3.0-only

//! Inversion configuration.
//!
//! A flat record loaded from a JSON file. Grid shape and spacing are not
//! part of it: they ride the velocity dataset header. Optional fields
//! default to the acquisition conventions of the modeling tool (receiver
//! stride 1 along x, sources and receivers on horizontal lines, 30-cell
//! sponge, 10 Hz Ricker at amplitude 1000).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::geometry::ShotPosition;

fn default_jgx() -> usize {
    1
}

fn default_fm() -> f32 {
    10.0
}

fn default_amp() -> f32 {
    1000.0
}

fn default_nb() -> usize {
    30
}

fn default_vmin() -> f32 {
    1500.0
}

fn default_vmax() -> f32 {
    5500.0
}

fn default_maxdv() -> f32 {
    200.0
}

/// Flat inversion configuration record.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FwiConfig {
    /// Time step (s).
    pub dt: f32,
    /// Time steps per simulation.
    pub nt: usize,
    /// Shot count.
    pub ns: usize,
    /// Receivers per shot.
    pub ng: usize,
    /// Source array origin, x index.
    pub sxbeg: usize,
    /// Source array origin, z index.
    pub szbeg: usize,
    /// Source stride along x.
    pub jsx: usize,
    /// Source stride along z.
    #[serde(default)]
    pub jsz: usize,
    /// Receiver array origin, x index.
    pub gxbeg: usize,
    /// Receiver array origin, z index.
    pub gzbeg: usize,
    /// Receiver stride along x.
    #[serde(default = "default_jgx")]
    pub jgx: usize,
    /// Receiver stride along z.
    #[serde(default)]
    pub jgz: usize,
    /// Ricker dominant frequency (Hz).
    #[serde(default = "default_fm")]
    pub fm: f32,
    /// Ricker amplitude.
    #[serde(default = "default_amp")]
    pub amp: f32,
    /// Sponge thickness (cells).
    #[serde(default = "default_nb")]
    pub nb: usize,
    /// Outer iteration count.
    pub niter: usize,
    /// Initial velocity dataset (header path).
    pub vinit: PathBuf,
    /// Observed shot dataset (header path).
    pub shots: PathBuf,
    /// Output dataset receiving the updated velocity per iteration.
    pub vupdates: PathBuf,
    /// Lower physical clamp (m/s).
    #[serde(default = "default_vmin")]
    pub vmin: f32,
    /// Upper physical clamp (m/s).
    #[serde(default = "default_vmax")]
    pub vmax: f32,
    /// Maximum per-iteration velocity change (m/s).
    #[serde(default = "default_maxdv")]
    pub maxdv: f32,
}

impl FwiConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check scalar consistency (geometry is checked against the grid once
    /// the velocity header is known).
    pub fn validate(&self) -> Result<()> {
        if self.dt <= 0.0 {
            return Err(Error::Config(format!("dt must be positive, got {}", self.dt)));
        }
        if self.nt == 0 || self.ns == 0 || self.ng == 0 || self.niter == 0 {
            return Err(Error::Config(format!(
                "nt, ns, ng, niter must be positive (nt={}, ns={}, ng={}, niter={})",
                self.nt, self.ns, self.ng, self.niter
            )));
        }
        if self.fm <= 0.0 {
            return Err(Error::Config(format!("fm must be positive, got {}", self.fm)));
        }
        if self.vmax <= self.vmin {
            return Err(Error::Config(format!(
                "vmax ({}) must exceed vmin ({})",
                self.vmax, self.vmin
            )));
        }
        if self.maxdv <= 0.0 {
            return Err(Error::Config(format!(
                "maxdv must be positive, got {}",
                self.maxdv
            )));
        }
        Ok(())
    }

    /// Source positions in interior index space.
    #[must_use]
    pub fn source_positions(&self) -> ShotPosition {
        ShotPosition::linear(self.szbeg, self.sxbeg, self.jsz, self.jsx, self.ns)
    }

    /// Receiver positions in interior index space.
    #[must_use]
    pub fn receiver_positions(&self) -> ShotPosition {
        ShotPosition::linear(self.gzbeg, self.gxbeg, self.jgz, self.jgx, self.ng)
    }

    /// Check both arrays against the interior grid.
    pub fn validate_geometry(&self, nz: usize, nx: usize) -> Result<()> {
        self.source_positions().validate(nz, nx, "sources")?;
        self.receiver_positions().validate(nz, nx, "geophones")?;
        Ok(())
    }
}
