// SPDX-License-Identifier: AGPL-3.0-only

//! Outer inversion loop.
//!
//! Per iteration: draw a fresh ±1 encoding, build the encoded super-shot,
//! compute the adjoint-state gradient, mask it, fold it into the CG
//! direction, pick a step length with the line search, and apply the
//! clamped velocity update. The CG state, the persisted initial step, and
//! the velocity all survive across iterations; wavefield checkpoints live
//! only inside one gradient computation.

use std::path::PathBuf;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cg::CgState;
use crate::checkpoint::CheckpointStore;
use crate::config::FwiConfig;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::geometry::ShotPosition;
use crate::gradient::{GradientEngine, DEFAULT_CHECK_STEP};
use crate::io::{self, DatasetHeader, VelocityDataset};
use crate::linesearch::{self, AlphaState, EncodedObjective};
use crate::propagator::Damp4t10d;
use crate::velocity::{to_transformed, Velocity};
use crate::wavelet::ricker_wavelet;

/// Fixed seed for the encoding stream, for reproducible runs.
pub const RANDOM_SEED: u64 = 10;

/// Summary of one outer iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationReport {
    /// Iteration index (0-based).
    pub iteration: usize,
    /// Encoded objective `J₁` at the iteration's starting model.
    pub objective: f64,
    /// Accepted step length.
    pub steplen: f32,
    /// Whether the step came from a parabolic fit (vs a bracket fallback).
    pub parabolic: bool,
}

/// Orchestrates the encoded-super-shot inversion.
#[derive(Debug)]
pub struct InversionDriver {
    prop: Damp4t10d,
    sources: ShotPosition,
    receivers: ShotPosition,
    wavelet: Vec<f32>,
    dobs: Vec<f32>,
    nt: usize,
    ns: usize,
    ng: usize,
    nb: usize,
    niter: usize,
    check_step: usize,
    s_lo: f32,
    s_hi: f32,
    maxdv: f32,
    vupdates: PathBuf,
    cg: CgState,
    alpha: AlphaState,
    rng: StdRng,
    iteration: usize,
}

impl InversionDriver {
    /// Build the driver from a validated config, the initial velocity
    /// dataset (physical m/s), and the observed shot data.
    pub fn new(config: &FwiConfig, model: &VelocityDataset, dobs: Vec<f32>) -> Result<Self> {
        if (model.dz - model.dx).abs() > 1e-6 * model.dx {
            return Err(Error::Config(format!(
                "cell spacing must be square, got dz={} dx={}",
                model.dz, model.dx
            )));
        }
        config.validate_geometry(model.nz, model.nx)?;
        debug_assert_eq!(dobs.len(), config.ns * config.nt * config.ng);

        let (dt, dx, nb) = (config.dt, model.dx, config.nb);
        let mut vel = Velocity::new(model.data.clone(), model.nz, model.nx).expand_domain(nb);
        vel.transform(dx, dt);
        let prop = Damp4t10d::new(vel, dt, dx, config.fm, nb);

        let violations = prop.cfl_violations(config.vmax);
        if violations > 0 {
            tracing::warn!(
                violations,
                vmax = config.vmax,
                "initial model violates the stability bound; the clamp will recover"
            );
        }

        Ok(Self {
            prop,
            sources: config.source_positions().shifted(nb),
            receivers: config.receiver_positions().shifted(nb),
            wavelet: ricker_wavelet(config.nt, config.fm, dt, config.amp),
            dobs,
            nt: config.nt,
            ns: config.ns,
            ng: config.ng,
            nb,
            niter: config.niter,
            check_step: DEFAULT_CHECK_STEP,
            s_lo: to_transformed(config.vmax, dx, dt),
            s_hi: to_transformed(config.vmin, dx, dt),
            maxdv: config.maxdv,
            vupdates: config.vupdates.clone(),
            cg: CgState::new(prop_size(model.nz, model.nx, nb)),
            alpha: AlphaState::new(),
            rng: StdRng::seed_from_u64(RANDOM_SEED),
            iteration: 0,
        })
    }

    /// Override the gradient checkpoint interval.
    #[must_use]
    pub fn with_check_step(mut self, check_step: usize) -> Self {
        self.check_step = check_step;
        self
    }

    /// The bound propagator (current model state).
    #[must_use]
    pub fn propagator(&self) -> &Damp4t10d {
        &self.prop
    }

    /// Iterations completed so far.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Interior velocity slab converted back to physical m/s.
    #[must_use]
    pub fn velocity_interior_mps(&self) -> Velocity {
        let mut v = self.prop.velocity().interior(self.nb);
        v.untransform(self.prop.dx(), self.prop.dt());
        v
    }

    /// Run one outer iteration against the given checkpoint store.
    pub fn iterate<S: CheckpointStore + ?Sized>(&mut self, store: &mut S) -> Result<IterationReport> {
        let encoder = Encoder::random(self.ns, &mut self.rng);
        let encsrc = encoder.encode_source(&self.wavelet);
        let mut encobs = encoder.encode_obs(&self.dobs, self.nt, self.ng);
        self.prop.remove_direct_arrival(
            &mut encobs,
            &self.sources,
            &self.receivers,
            self.nt,
            1.5 / self.prop.fm(),
        );

        let engine = GradientEngine::new(&self.prop, &self.sources, &self.receivers, self.nt)
            .with_check_step(self.check_step);
        let (objective, mut gradient) = engine.compute(&encsrc, &encobs, store)?;
        self.prop.mask_gradient(&mut gradient);

        let direction = self.cg.update(&gradient);

        let mut eval = EncodedObjective::new(
            &self.prop,
            &self.sources,
            &self.receivers,
            &encsrc,
            &encobs,
            direction,
            self.nt,
            self.s_lo,
            self.s_hi,
        );
        let step = linesearch::search(
            &mut eval,
            self.prop.velocity(),
            direction,
            self.prop.dt(),
            self.prop.dx(),
            self.maxdv,
            objective,
            &mut self.alpha,
        )?;

        self.prop
            .velocity_mut()
            .update_along(direction, step.alpha, self.s_lo, self.s_hi);
        self.prop.velocity_mut().refill_boundary(self.nb);

        let report = IterationReport {
            iteration: self.iteration,
            objective,
            steplen: step.alpha,
            parabolic: step.parabolic,
        };
        self.iteration += 1;
        Ok(report)
    }

    /// Run the full inversion, appending the interior model (m/s) to the
    /// `vupdates` dataset after every iteration.
    pub fn run<S: CheckpointStore + ?Sized>(&mut self, store: &mut S) -> Result<()> {
        let interior = self.velocity_interior_mps();
        let mut header = DatasetHeader::new(&self.vupdates);
        header.set("n1", interior.nz);
        header.set("n2", interior.nx);
        header.set("n3", self.niter);
        header.set("d1", self.prop.dx());
        header.set("d2", self.prop.dx());
        header.set("label1", "Depth");
        header.set("label2", "Lateral");
        header.set("unit1", "m");
        header.set("unit2", "m");
        header.write()?;
        io::write_floats(&header.binary_path(), &[])?;

        for _ in 0..self.niter {
            let t_iter = Instant::now();
            let report = self.iterate(store)?;
            tracing::info!(
                iteration = report.iteration,
                objective = report.objective,
                steplen = report.steplen,
                parabolic = report.parabolic,
                elapsed_s = t_iter.elapsed().as_secs_f64(),
                "outer iteration done"
            );
            io::append_floats(&header.binary_path(), &self.velocity_interior_mps().data)?;
        }
        Ok(())
    }
}

const fn prop_size(nz: usize, nx: usize, nb: usize) -> usize {
    (nz + 2 * nb) * (nx + 2 * nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> FwiConfig {
        serde_json::from_value(serde_json::json!({
            "dt": 1e-3,
            "nt": 500,
            "ns": 2,
            "ng": 10,
            "sxbeg": 5, "szbeg": 2, "jsx": 10,
            "gxbeg": 2, "gzbeg": 1, "jgx": 2,
            "nb": 5,
            "niter": 2,
            "vinit": "unused",
            "shots": "unused",
            "vupdates": "unused"
        }))
        .expect("tiny config")
    }

    fn tiny_model() -> VelocityDataset {
        VelocityDataset {
            nz: 20,
            nx: 22,
            dz: 10.0,
            dx: 10.0,
            data: vec![2000.0; 20 * 22],
        }
    }

    #[test]
    fn rejects_rectangular_cells() {
        let cfg = tiny_config();
        let mut model = tiny_model();
        model.dz = 5.0;
        let err = InversionDriver::new(&cfg, &model, vec![0.0; 2 * 500 * 10]).unwrap_err();
        assert!(err.to_string().contains("square"));
    }

    #[test]
    fn rejects_sources_outside_grid() {
        let mut cfg = tiny_config();
        cfg.sxbeg = 21; // second source lands at ix = 31 > nx
        let err = InversionDriver::new(&cfg, &tiny_model(), vec![0.0; 2 * 500 * 10]).unwrap_err();
        assert!(err.to_string().contains("sources exceed"));
    }

    #[test]
    fn construction_transforms_and_pads_the_model() {
        let cfg = tiny_config();
        let driver = InversionDriver::new(&cfg, &tiny_model(), vec![0.0; 2 * 500 * 10]).unwrap();
        let vel = driver.propagator().velocity();
        assert_eq!((vel.nz, vel.nx), (30, 32));
        let s = to_transformed(2000.0, 10.0, 1e-3);
        assert!((vel.at(0, 0) - s).abs() < 1e-4, "padding carries transformed units");
        let back = driver.velocity_interior_mps();
        assert_eq!((back.nz, back.nx), (20, 22));
        assert!((back.at(3, 3) - 2000.0).abs() < 0.1);
    }
}
