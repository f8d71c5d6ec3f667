// SPDX-License-Identifier: AGPL-3.0-only

//! Adjoint-state gradient engine.
//!
//! One gradient evaluation runs four stages:
//!
//!   A. forward-model the encoded super-shot, mute the direct arrival,
//!      form the residual `vsrc = encobs − dcal` and the objective
//!      `J = ½‖vsrc‖²`;
//!   B. turn the residual into the virtual adjoint source by applying a
//!      5-point second-derivative stencil along each receiver trace;
//!   C. re-run the forward simulation, persisting the wavefield pair every
//!      `check_step` steps plus the final pair;
//!   D. walk time backward: reconstruct the source wavefield from the
//!      checkpoints (subtracting the injected source), propagate the
//!      adjoint wavefield forward from the virtual source, and accumulate
//!      the zero-lag cross-correlation into the gradient.
//!
//! The earliest samples carry no reflection energy; correlation stops
//! below 0.3 s of simulated time, with a linear ramp up to 0.4 s.

use rayon::prelude::*;

use crate::checkpoint::{CheckpointKey, CheckpointStore};
use crate::error::Result;
use crate::geometry::ShotPosition;
use crate::propagator::{forward_modeling, Damp4t10d};

/// Simulated time below which correlation contributes nothing.
const MUTE_END_S: f32 = 0.3;
/// Width of the linear ramp from muted to full weight.
const MUTE_RAMP_S: f32 = 0.1;

/// Default checkpoint interval (steps).
pub const DEFAULT_CHECK_STEP: usize = 50;

/// `½‖r‖²`, accumulated in f64.
#[must_use]
pub fn objective(residual: &[f32]) -> f64 {
    0.5 * residual.iter().map(|&r| f64::from(r) * f64::from(r)).sum::<f64>()
}

/// Out-of-place transpose: `src` is `(slow, fast)`, `dst` becomes
/// `(fast, slow)`.
pub fn transpose(src: &[f32], dst: &mut [f32], n_fast: usize, n_slow: usize) {
    debug_assert_eq!(src.len(), n_fast * n_slow);
    debug_assert_eq!(dst.len(), n_fast * n_slow);
    for j in 0..n_slow {
        for i in 0..n_fast {
            dst[i * n_slow + j] = src[j * n_fast + i];
        }
    }
}

/// 4th-accuracy second time derivative along one trace; the first and
/// last two samples are zeroed.
fn second_derivative(trace: &mut [f32]) {
    let n = trace.len();
    let tmp = trace.to_vec();
    for (i, out) in trace.iter_mut().enumerate() {
        if i <= 1 || i + 2 >= n {
            *out = 0.0;
            continue;
        }
        *out = -tmp[i - 2] / 12.0 + 4.0 * tmp[i - 1] / 3.0 - 2.5 * tmp[i]
            + 4.0 * tmp[i + 1] / 3.0
            - tmp[i + 2] / 12.0;
    }
}

/// Turn the data residual (`(it, ig)`, receivers fast) into the virtual
/// adjoint source by filtering each receiver trace in time.
pub fn filter_virtual_source(vsrc: &mut [f32], nt: usize, ng: usize) {
    let mut trans = vec![0.0f32; nt * ng];
    transpose(vsrc, &mut trans, ng, nt);
    for trace in trans.chunks_mut(nt) {
        second_derivative(trace);
    }
    transpose(&trans, vsrc, nt, ng);
}

fn cross_correlate(image: &mut [f32], sp: &[f32], gp: &[f32], scale: f32) {
    image
        .par_iter_mut()
        .zip(sp.par_iter().zip(gp.par_iter()))
        .for_each(|(img, (&s, &g))| {
            *img -= s * g * scale;
        });
}

/// Adjoint-state gradient of the encoded objective with respect to the
/// transformed velocity.
#[derive(Debug)]
pub struct GradientEngine<'a> {
    prop: &'a Damp4t10d,
    src: &'a ShotPosition,
    geo: &'a ShotPosition,
    nt: usize,
    check_step: usize,
}

impl<'a> GradientEngine<'a> {
    /// Engine over the given acquisition with the default checkpoint interval.
    #[must_use]
    pub fn new(prop: &'a Damp4t10d, src: &'a ShotPosition, geo: &'a ShotPosition, nt: usize) -> Self {
        Self {
            prop,
            src,
            geo,
            nt,
            check_step: DEFAULT_CHECK_STEP,
        }
    }

    /// Override the checkpoint interval.
    #[must_use]
    pub fn with_check_step(mut self, check_step: usize) -> Self {
        self.check_step = check_step;
        self
    }

    /// Compute the objective and the (unmasked) gradient for one encoded
    /// super-shot. `encobs` must already have its direct arrival removed.
    pub fn compute<S: CheckpointStore + ?Sized>(
        &self,
        encsrc: &[f32],
        encobs: &[f32],
        store: &mut S,
    ) -> Result<(f64, Vec<f32>)> {
        let ng = self.geo.len();
        let nt = self.nt;

        // Stage A: synthetic data, residual, objective.
        let mut dcal = forward_modeling(self.prop, self.src, self.geo, encsrc, nt);
        self.prop
            .remove_direct_arrival(&mut dcal, self.src, self.geo, nt, 1.5 / self.prop.fm());
        let mut vsrc: Vec<f32> = encobs
            .iter()
            .zip(dcal.iter())
            .map(|(&o, &c)| o - c)
            .collect();
        let obj = objective(&vsrc);

        // Stage B: virtual adjoint source.
        filter_virtual_source(&mut vsrc, nt, ng);

        // Stage C: checkpointed re-forward.
        self.forward_with_checkpoints(encsrc, store)?;

        // Stage D: reverse correlation.
        let gradient = self.reverse_correlate(encsrc, &vsrc, store)?;

        Ok((obj, gradient))
    }

    fn forward_with_checkpoints<S: CheckpointStore + ?Sized>(
        &self,
        encsrc: &[f32],
        store: &mut S,
    ) -> Result<()> {
        let size = self.prop.grid_size();
        let ns = self.src.len();
        let nt = self.nt;
        let mut p0 = vec![0.0f32; size];
        let mut p1 = vec![0.0f32; size];

        for it in 0..nt {
            self.prop
                .add_source(&mut p1, &encsrc[it * ns..(it + 1) * ns], self.src);
            self.prop.step_forward(&mut p0, &p1);
            std::mem::swap(&mut p0, &mut p1);
            // After the swap p0 holds this step's field, p1 the next one.
            if it > 0 && it != nt - 1 && it % self.check_step == 0 {
                store.save(CheckpointKey::Step(it, 1), &p0)?;
                store.save(CheckpointKey::Step(it, 2), &p1)?;
            }
        }
        store.save(CheckpointKey::Last(1), &p0)?;
        store.save(CheckpointKey::Last(2), &p1)?;
        Ok(())
    }

    fn reverse_correlate<S: CheckpointStore + ?Sized>(
        &self,
        encsrc: &[f32],
        vsrc: &[f32],
        store: &mut S,
    ) -> Result<Vec<f32>> {
        let size = self.prop.grid_size();
        let (ns, ng) = (self.src.len(), self.geo.len());
        let nt = self.nt;
        let dt = self.prop.dt();

        let mut sp0 = vec![0.0f32; size];
        let mut sp1 = vec![0.0f32; size];
        let mut gp0 = vec![0.0f32; size];
        let mut gp1 = vec![0.0f32; size];
        let mut gradient = vec![0.0f32; size];

        for it in (0..nt).rev() {
            if it == nt - 1 {
                store.load(CheckpointKey::Last(1), &mut sp1)?;
                store.load(CheckpointKey::Last(2), &mut sp0)?;
            } else if it % self.check_step == 0 && it != 0 {
                store.load(CheckpointKey::Step(it, 1), &mut sp1)?;
                store.load(CheckpointKey::Step(it, 2), &mut sp0)?;
            }

            self.prop.step_backward(&mut sp0, &sp1);
            std::mem::swap(&mut sp0, &mut sp1);
            // sp0 now holds this step's source field; undo its injection.
            self.prop
                .sub_source(&mut sp0, &encsrc[it * ns..(it + 1) * ns], self.src);

            self.prop
                .add_source(&mut gp1, &vsrc[it * ng..(it + 1) * ng], self.geo);
            self.prop.step_forward(&mut gp0, &gp1);
            std::mem::swap(&mut gp0, &mut gp1);

            let t = dt * it as f32;
            if t > MUTE_END_S + MUTE_RAMP_S {
                cross_correlate(&mut gradient, &sp0, &gp0, 1.0);
            } else if t > MUTE_END_S {
                cross_correlate(&mut gradient, &sp0, &gp0, (t - MUTE_END_S) / MUTE_RAMP_S);
            } else {
                break;
            }
        }
        Ok(gradient)
    }
}
