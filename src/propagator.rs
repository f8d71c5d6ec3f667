// SPDX-License-Identifier: AGPL-3.0-only

//! Damp4t10d: finite-difference acoustic propagator with a damping sponge.
//!
//! One time step combines a 10th-order isotropic spatial Laplacian
//! (six-coefficient cross stencil, radius 5), a second-order time update
//! with a 4th-order correction term, and a quadratic damping coefficient
//! in the absorbing margins. Velocity enters in transformed units, so the
//! time update reduces to `(1/s)·∇²p` plus the correction.
//!
//! `step_forward` overwrites the previous field with the next one; the
//! call site swaps the pair. `step_backward` applies the same kernel —
//! time reversal comes entirely from the swapped buffer roles, and the
//! scheme is exactly reversible when the sponge is disabled (`nb = 0`).
//!
//! Damping covers the left, right, and bottom margins. The top margin is
//! the free surface and stays undamped.

use rayon::prelude::*;

use crate::geometry::ShotPosition;
use crate::velocity::{to_physical, Velocity};

/// Laplacian cross-stencil coefficients (Zhang Jinhai's optimized set).
const STENCIL: [f32; 6] = [
    1.534_007_96,
    1.788_587_21,
    -0.316_607_56,
    0.076_121_73,
    -0.016_260_42,
    0.002_167_36,
];

/// Stencil half-width; the outermost `RADIUS - 1` rows/cols are never written.
const RADIUS: usize = 6;

/// Peak damping coefficient at the outer padded edge.
const MAX_DELTA: f32 = 0.05;

/// Interior rows under the free surface zeroed by the gradient mask.
const TOP_MASK_ROWS: usize = 3;

/// Finite-difference propagator bound to a padded, transformed velocity.
#[derive(Debug, Clone)]
pub struct Damp4t10d {
    vel: Velocity,
    dt: f32,
    dx: f32,
    fm: f32,
    nb: usize,
}

impl Damp4t10d {
    /// Bind a propagator to a padded velocity in transformed units.
    #[must_use]
    pub fn new(vel: Velocity, dt: f32, dx: f32, fm: f32, nb: usize) -> Self {
        Self { vel, dt, dx, fm, nb }
    }

    /// The same propagator bound to a different velocity (line-search trials).
    #[must_use]
    pub fn with_velocity(&self, vel: Velocity) -> Self {
        Self {
            vel,
            dt: self.dt,
            dx: self.dx,
            fm: self.fm,
            nb: self.nb,
        }
    }

    /// Bound velocity.
    #[must_use]
    pub fn velocity(&self) -> &Velocity {
        &self.vel
    }

    /// Mutable access to the bound velocity (outer-loop update + refill).
    pub fn velocity_mut(&mut self) -> &mut Velocity {
        &mut self.vel
    }

    /// Time step (s).
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.dt
    }

    /// Cell spacing (m).
    #[must_use]
    pub fn dx(&self) -> f32 {
        self.dx
    }

    /// Dominant source frequency (Hz).
    #[must_use]
    pub fn fm(&self) -> f32 {
        self.fm
    }

    /// Sponge thickness (cells).
    #[must_use]
    pub fn nb(&self) -> usize {
        self.nb
    }

    /// Cells in the padded grid.
    #[must_use]
    pub fn grid_size(&self) -> usize {
        self.vel.len()
    }

    /// Advance one time step: `prev` is overwritten with the next field.
    pub fn step_forward(&self, prev: &mut [f32], curr: &[f32]) {
        self.step(prev, curr);
    }

    /// Reverse-time counterpart; the kernel is symbolically identical and
    /// the call site swaps the roles of the pair.
    pub fn step_backward(&self, prev: &mut [f32], curr: &[f32]) {
        self.step(prev, curr);
    }

    fn step(&self, prev: &mut [f32], curr: &[f32]) {
        let (nz, nx) = (self.vel.nz, self.vel.nx);
        debug_assert_eq!(prev.len(), nz * nx);
        debug_assert_eq!(curr.len(), nz * nx);
        let vel = &self.vel.data;
        let nb = self.nb;
        let d = RADIUS;

        let mut u2 = vec![0.0f32; nz * nx];
        u2.par_chunks_mut(nz).enumerate().for_each(|(ix, col)| {
            if ix < d - 1 || ix >= nx - (d - 1) {
                return;
            }
            for iz in (d - 1)..(nz - (d - 1)) {
                let i = ix * nz + iz;
                let mut lap = -4.0 * STENCIL[0] * curr[i];
                for (k, &a) in STENCIL.iter().enumerate().skip(1) {
                    lap += a
                        * (curr[i - k] + curr[i + k] + curr[i - k * nz] + curr[i + k * nz]);
                }
                col[iz] = lap;
            }
        });

        let u2 = &u2;
        prev.par_chunks_mut(nz).enumerate().for_each(|(ix, col)| {
            if ix < d || ix >= nx - d {
                return;
            }
            for iz in d..(nz - d) {
                let i = ix * nz + iz;
                let mut dist = 0.0f32;
                if nb > 0 {
                    if ix < nb {
                        dist = (nb - ix) as f32 / nb as f32;
                    }
                    if ix >= nx - nb {
                        dist = (ix - (nx - nb) + 1) as f32 / nb as f32;
                    }
                    if iz >= nz - nb {
                        dist = (iz - (nz - nb) + 1) as f32 / nb as f32;
                    }
                }
                let delta = MAX_DELTA * dist * dist;
                let inv_s = 1.0 / vel[i];
                let correction = inv_s * inv_s / 12.0
                    * (u2[i - 1] + u2[i + 1] + u2[i - nz] + u2[i + nz] - 4.0 * u2[i]);
                col[iz] = (2.0 - 2.0 * delta + delta * delta) * curr[i]
                    - (1.0 - 2.0 * delta) * col[iz]
                    + inv_s * u2[i]
                    + correction;
            }
        });
    }

    /// Inject source samples at the given positions.
    pub fn add_source(&self, p: &mut [f32], samples: &[f32], pos: &ShotPosition) {
        self.inject(p, samples, pos, 1.0);
    }

    /// Remove source samples at the given positions (reverse reconstruction).
    pub fn sub_source(&self, p: &mut [f32], samples: &[f32], pos: &ShotPosition) {
        self.inject(p, samples, pos, -1.0);
    }

    fn inject(&self, p: &mut [f32], samples: &[f32], pos: &ShotPosition, sign: f32) {
        debug_assert_eq!(samples.len(), pos.len());
        let nz = self.vel.nz;
        for (k, (iz, ix)) in pos.iter().enumerate() {
            p[ix * nz + iz] += sign * samples[k];
        }
    }

    /// Sample the field at the receiver positions into `out`.
    pub fn record_seis(&self, out: &mut [f32], p: &[f32], pos: &ShotPosition) {
        debug_assert_eq!(out.len(), pos.len());
        let nz = self.vel.nz;
        for (k, (iz, ix)) in pos.iter().enumerate() {
            out[k] = p[ix * nz + iz];
        }
    }

    /// Zero every trace sample within `t_width` seconds of the straight-ray
    /// first arrival for any source/receiver pair. The arrival time uses
    /// the mean of the physical speeds at the two cells plus the Ricker
    /// delay `1/fm`. `data` is `(it, ig)` with receivers fast.
    pub fn remove_direct_arrival(
        &self,
        data: &mut [f32],
        src: &ShotPosition,
        geo: &ShotPosition,
        nt: usize,
        t_width: f32,
    ) {
        let ng = geo.len();
        debug_assert_eq!(data.len(), nt * ng);
        let delay = 1.0 / self.fm;
        for (sz, sx) in src.iter() {
            let cs = to_physical(self.vel.at(sz, sx), self.dx, self.dt);
            for (k, (gz, gx)) in geo.iter().enumerate() {
                let cg = to_physical(self.vel.at(gz, gx), self.dx, self.dt);
                let rz = (sz as f32 - gz as f32) * self.dx;
                let rx = (sx as f32 - gx as f32) * self.dx;
                let t0 = (rz * rz + rx * rx).sqrt() / (0.5 * (cs + cg)) + delay;
                let lo = (((t0 - t_width) / self.dt).ceil().max(0.0)) as usize;
                let hi = ((t0 + t_width) / self.dt).floor() as usize;
                for it in lo..=hi.min(nt.saturating_sub(1)) {
                    data[it * ng + k] = 0.0;
                }
            }
        }
    }

    /// Zero the gradient in the sponge border and the near-surface rows.
    pub fn mask_gradient(&self, g: &mut [f32]) {
        let (nz, nx) = (self.vel.nz, self.vel.nx);
        debug_assert_eq!(g.len(), nz * nx);
        let nb = self.nb;
        for ix in 0..nx {
            for iz in 0..nz {
                let border = ix < nb || ix >= nx - nb || iz >= nz - nb;
                let surface = iz < nb + TOP_MASK_ROWS;
                if border || surface {
                    g[ix * nz + iz] = 0.0;
                }
            }
        }
    }

    /// Count cells violating the stability bound `s ≥ (dx/(dt·vmax))²`.
    /// The caller logs a warning; the clamp bounds recover the state.
    #[must_use]
    pub fn cfl_violations(&self, vmax: f32) -> usize {
        let s_floor = {
            let r = self.dx / (self.dt * vmax);
            r * r
        };
        self.vel.data.iter().filter(|&&s| s < s_floor).count()
    }
}

/// Model one super-shot: propagate `source_time` (`(it, is)`, sources fast)
/// through the bound velocity for `nt` steps, recording the synthetic
/// gather (`(it, ig)`, receivers fast).
#[must_use]
pub fn forward_modeling(
    prop: &Damp4t10d,
    src: &ShotPosition,
    geo: &ShotPosition,
    source_time: &[f32],
    nt: usize,
) -> Vec<f32> {
    let size = prop.grid_size();
    let (ns, ng) = (src.len(), geo.len());
    debug_assert_eq!(source_time.len(), nt * ns);
    let mut p0 = vec![0.0f32; size];
    let mut p1 = vec![0.0f32; size];
    let mut dcal = vec![0.0f32; nt * ng];

    for it in 0..nt {
        prop.add_source(&mut p1, &source_time[it * ns..(it + 1) * ns], src);
        prop.step_forward(&mut p0, &p1);
        prop.record_seis(&mut dcal[it * ng..(it + 1) * ng], &p0, geo);
        std::mem::swap(&mut p0, &mut p1);
    }
    dcal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_prop(nz: usize, nx: usize, nb: usize, c: f32) -> Damp4t10d {
        let (dt, dx) = (1e-3, 10.0);
        let s = crate::velocity::to_transformed(c, dx, dt);
        Damp4t10d::new(Velocity::new(vec![s; nz * nx], nz, nx), dt, dx, 10.0, nb)
    }

    fn gaussian_bump(nz: usize, nx: usize, cz: usize, cx: usize, sigma: f32) -> Vec<f32> {
        let mut p = vec![0.0f32; nz * nx];
        for ix in 0..nx {
            for iz in 0..nz {
                let dz = iz as f32 - cz as f32;
                let dxx = ix as f32 - cx as f32;
                p[ix * nz + iz] = (-(dz * dz + dxx * dxx) / (2.0 * sigma * sigma)).exp();
            }
        }
        p
    }

    #[test]
    fn constant_field_stays_constant() {
        // The cross stencil sums to ~zero on a constant field, so the
        // update degenerates to 2·curr − prev.
        let prop = uniform_prop(32, 32, 0, 2000.0);
        let curr = vec![1.0f32; 32 * 32];
        let mut prev = vec![1.0f32; 32 * 32];
        prop.step_forward(&mut prev, &curr);
        for ix in RADIUS..32 - RADIUS {
            for iz in RADIUS..32 - RADIUS {
                let v = prev[ix * 32 + iz];
                assert!((v - 1.0).abs() < 1e-4, "cell ({iz},{ix}) drifted to {v}");
            }
        }
    }

    #[test]
    fn border_cells_are_never_written() {
        let prop = uniform_prop(24, 24, 0, 2000.0);
        let curr = gaussian_bump(24, 24, 12, 12, 2.0);
        let mut prev = vec![7.0f32; 24 * 24];
        prop.step_forward(&mut prev, &curr);
        for k in 0..24 {
            assert_eq!(prev[k], 7.0, "first column must stay untouched");
            assert_eq!(prev[k * 24 + 2], 7.0, "outer rows must stay untouched");
        }
    }

    #[test]
    fn forward_then_backward_recovers_initial_pair() {
        // With nb = 0 the sponge is disabled and the scheme is exactly
        // time-symmetric.
        let n = 48;
        let prop = uniform_prop(n, n, 0, 2000.0);
        let p0: Vec<f32> = vec![0.0; n * n];
        let p1 = gaussian_bump(n, n, n / 2, n / 2, 3.0);

        let mut prev = p0.clone();
        let mut curr = p1.clone();
        for _ in 0..5 {
            prop.step_forward(&mut prev, &curr);
            std::mem::swap(&mut prev, &mut curr);
        }

        let (mut rprev, mut rcurr) = (curr, prev);
        for _ in 0..5 {
            prop.step_backward(&mut rprev, &rcurr);
            std::mem::swap(&mut rprev, &mut rcurr);
        }

        let err = rprev
            .iter()
            .zip(p1.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(err < 1e-4, "round trip should recover the bump, err={err}");
        let err0 = rcurr
            .iter()
            .zip(p0.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(err0 < 1e-4, "round trip should recover zeros, err={err0}");
    }

    #[test]
    fn radial_symmetry_about_central_source() {
        let n = 41;
        let prop = uniform_prop(n, n, 0, 2000.0);
        let src = ShotPosition::linear(n / 2, n / 2, 0, 0, 1);
        let mut p0 = vec![0.0f32; n * n];
        let mut p1 = vec![0.0f32; n * n];
        for _ in 0..12 {
            prop.add_source(&mut p1, &[1.0], &src);
            prop.step_forward(&mut p0, &p1);
            std::mem::swap(&mut p0, &mut p1);
        }
        // Mirror symmetry through the center in both axes, inside the
        // writable interior.
        for ix in RADIUS..n - RADIUS {
            for iz in RADIUS..n - RADIUS {
                let a = p1[ix * n + iz];
                let b = p1[(n - 1 - ix) * n + (n - 1 - iz)];
                assert!(
                    (a - b).abs() < 1e-4,
                    "field should be symmetric: ({iz},{ix}) {a} vs {b}"
                );
            }
        }
    }

    #[test]
    fn inject_then_subtract_is_identity() {
        let prop = uniform_prop(20, 20, 0, 2000.0);
        let pos = ShotPosition::linear(8, 9, 0, 1, 3);
        let mut p = vec![0.5f32; 20 * 20];
        let orig = p.clone();
        prop.add_source(&mut p, &[1.0, 2.0, 3.0], &pos);
        assert!((p[9 * 20 + 8] - 1.5).abs() < 1e-6);
        prop.sub_source(&mut p, &[1.0, 2.0, 3.0], &pos);
        assert_eq!(p, orig);
    }

    #[test]
    fn record_reads_receiver_cells() {
        let prop = uniform_prop(10, 10, 0, 2000.0);
        let pos = ShotPosition::linear(2, 3, 0, 2, 2);
        let mut p = vec![0.0f32; 100];
        p[3 * 10 + 2] = 4.0;
        p[5 * 10 + 2] = 8.0;
        let mut out = vec![0.0f32; 2];
        prop.record_seis(&mut out, &p, &pos);
        assert_eq!(out, vec![4.0, 8.0]);
    }

    #[test]
    fn direct_arrival_window_is_zeroed() {
        let prop = uniform_prop(30, 30, 0, 2000.0);
        let src = ShotPosition::linear(10, 5, 0, 0, 1);
        let geo = ShotPosition::linear(10, 25, 0, 0, 1);
        let nt = 400;
        let mut data = vec![1.0f32; nt];
        // dist = 200 m, c = 2000 m/s → t0 = 0.1 s + 0.1 s delay = 0.2 s.
        prop.remove_direct_arrival(&mut data, &src, &geo, nt, 0.05);
        assert_eq!(data[200], 0.0, "sample at the arrival must be muted");
        assert_eq!(data[160], 0.0, "window edge inside ±0.05 s must be muted");
        assert_eq!(data[100], 1.0, "early samples must survive");
        assert_eq!(data[300], 1.0, "late samples must survive");
    }

    #[test]
    fn gradient_mask_zeros_border_and_surface() {
        let prop = uniform_prop(20, 20, 4, 2000.0);
        let mut g = vec![1.0f32; 400];
        prop.mask_gradient(&mut g);
        assert_eq!(g[2 * 20 + 10], 0.0, "sponge column masked");
        assert_eq!(g[10 * 20 + 18], 0.0, "bottom sponge masked");
        assert_eq!(g[10 * 20 + 5], 0.0, "near-surface rows masked");
        assert_eq!(g[10 * 20 + 10], 1.0, "deep interior survives");
    }

    #[test]
    fn cfl_counts_too_fast_cells() {
        let mut prop = uniform_prop(10, 10, 0, 2000.0);
        assert_eq!(prop.cfl_violations(5500.0), 0);
        // Make one cell faster than the admissible maximum.
        let s_fast = crate::velocity::to_transformed(9000.0, prop.dx(), prop.dt());
        prop.velocity_mut().data[55] = s_fast;
        assert_eq!(prop.cfl_violations(5500.0), 1);
    }
}
