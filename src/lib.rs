// SPDX-License-Identifier: AGPL-3.0-only

// Clippy pedantic + numerics-specific allows are in [lints.clippy] in
// Cargo.toml. Library code must propagate errors, not panic:
#![deny(clippy::expect_used, clippy::unwrap_used)]
#![warn(missing_docs)]

//! riptide — time-domain acoustic full waveform inversion
//!
//! Reconstructs a 2-D subsurface velocity model from recorded seismic shot
//! data. Each outer iteration encodes all shots into one ±1 super-shot,
//! simulates it with a damped finite-difference propagator, forms the
//! adjoint-state gradient from checkpointed wavefields, and updates the
//! model along a nonlinear conjugate-gradient direction with a parabolic
//! line search.
//!
//! # Architecture
//!
//! - **`config`** — flat inversion configuration record with validation
//! - **`io`** — name=value header + raw float32 dataset reader/writer
//! - **`velocity`** — padded-grid velocity model in transformed units
//! - **`geometry`** — source/receiver position lists
//! - **`wavelet`** — Ricker source time function
//! - **`propagator`** — Damp4t10d stencil: one time step, damping sponge
//! - **`encoder`** — random ±1 super-shot encoding
//! - **`checkpoint`** — wavefield checkpoint store (bounded-memory reverse)
//! - **`gradient`** — adjoint-state gradient engine
//! - **`cg`** — Polak–Ribière-with-reset direction builder
//! - **`linesearch`** — bracket + parabolic-vertex step selection
//! - **`driver`** — outer iteration orchestration
//! - **`error`** — typed errors for configuration, geometry, and I/O
//!
//! # Binaries
//!
//! `fwi_invert` runs the inversion from a JSON config; `fwi_forward`
//! models the observed shot dataset from a velocity model. Both exit 0 on
//! success and 1 on configuration, geometry, or I/O failure.

/// Polak–Ribière-with-reset conjugate-gradient direction builder.
pub mod cg;
/// Wavefield checkpoint store: trait, directory store, in-memory store.
pub mod checkpoint;
/// Flat inversion configuration record with validation.
pub mod config;
/// Outer iteration orchestration.
pub mod driver;
/// Random ±1 super-shot source/data encoding.
pub mod encoder;
/// Typed errors for configuration, geometry, data, and checkpoint I/O.
pub mod error;
/// Source/receiver position lists in interior and padded index space.
pub mod geometry;
/// Adjoint-state gradient engine with checkpointed reverse correlation.
pub mod gradient;
/// Name=value header + raw little-endian float32 dataset I/O.
pub mod io;
/// Bracket + parabolic-vertex line search with persisted initial step.
pub mod linesearch;
/// Damp4t10d finite-difference propagator with damping sponge boundary.
pub mod propagator;
/// Padded-grid velocity model in transformed units.
pub mod velocity;
/// Ricker source time function.
pub mod wavelet;

pub use cg::CgState;
pub use checkpoint::{CheckpointKey, CheckpointStore, DirStore, MemStore};
pub use config::FwiConfig;
pub use driver::InversionDriver;
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use geometry::ShotPosition;
pub use gradient::GradientEngine;
pub use linesearch::{AlphaState, StepObjective};
pub use propagator::Damp4t10d;
pub use velocity::Velocity;
pub use wavelet::ricker_wavelet;
