// SPDX-License-Identifier: AGPL-3.0-only

//! Padded-grid velocity model in transformed units.
//!
//! The propagator carries velocity as `s = (dx/(dt·c))²` where `c` is the
//! physical speed in m/s. The transform is bijective and strictly
//! decreasing in `c`, so the clamp bounds swap: the minimum of `s`
//! corresponds to the maximum physical speed. All clamps and step caps in
//! the inversion are expressed in `s`; conversion to/from m/s happens only
//! at the dataset boundary.

use rayon::prelude::*;

/// Physical speed (m/s) to the transformed propagator unit.
#[must_use]
pub fn to_transformed(c: f32, dx: f32, dt: f32) -> f32 {
    let r = dx / (dt * c);
    r * r
}

/// Transformed propagator unit back to physical speed (m/s).
#[must_use]
pub fn to_physical(s: f32, dx: f32, dt: f32) -> f32 {
    dx / (dt * s.sqrt())
}

/// Dense 2-D velocity grid, column-major with `z` fast: `i = ix·nz + iz`.
///
/// Holds either physical or transformed values depending on the stage;
/// the inversion core works exclusively on the expanded, transformed grid.
#[derive(Debug, Clone)]
pub struct Velocity {
    /// Cell values, length `nz · nx`.
    pub data: Vec<f32>,
    /// Fast (depth) dimension.
    pub nz: usize,
    /// Slow (lateral) dimension.
    pub nx: usize,
}

impl Velocity {
    /// Wrap an existing column-major buffer.
    #[must_use]
    pub fn new(data: Vec<f32>, nz: usize, nx: usize) -> Self {
        debug_assert_eq!(data.len(), nz * nx);
        Self { data, nz, nx }
    }

    /// Value at `(iz, ix)`.
    #[must_use]
    pub fn at(&self, iz: usize, ix: usize) -> f32 {
        self.data[ix * self.nz + iz]
    }

    /// Number of cells.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the grid is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Expand by `nb` cells on every side, replicating the nearest
    /// interior edge cell into the new border.
    #[must_use]
    pub fn expand_domain(&self, nb: usize) -> Self {
        let (nz, nx) = (self.nz + 2 * nb, self.nx + 2 * nb);
        let mut data = vec![0.0f32; nz * nx];
        for ix in 0..nx {
            let sx = ix.saturating_sub(nb).min(self.nx - 1);
            for (iz, cell) in data[ix * nz..(ix + 1) * nz].iter_mut().enumerate() {
                let sz = iz.saturating_sub(nb).min(self.nz - 1);
                *cell = self.data[sx * self.nz + sz];
            }
        }
        Self { data, nz, nx }
    }

    /// Copy the `nz_in × nx_in` interior slab out of a grid expanded by `nb`.
    #[must_use]
    pub fn interior(&self, nb: usize) -> Self {
        let (nz, nx) = (self.nz - 2 * nb, self.nx - 2 * nb);
        let mut data = Vec::with_capacity(nz * nx);
        for ix in 0..nx {
            let col = (ix + nb) * self.nz + nb;
            data.extend_from_slice(&self.data[col..col + nz]);
        }
        Self { data, nz, nx }
    }

    /// Re-assert the border invariant after an interior update: every cell
    /// in the `nb` padding takes the value of its nearest interior cell.
    pub fn refill_boundary(&mut self, nb: usize) {
        if nb == 0 {
            return;
        }
        let (nz, nx) = (self.nz, self.nx);
        for ix in 0..nx {
            let sx = ix.clamp(nb, nx - nb - 1);
            for iz in 0..nz {
                if ix >= nb && ix < nx - nb && iz >= nb && iz < nz - nb {
                    continue;
                }
                let sz = iz.clamp(nb, nz - nb - 1);
                self.data[ix * nz + iz] = self.data[sx * nz + sz];
            }
        }
    }

    /// Map physical speeds to transformed units in place.
    pub fn transform(&mut self, dx: f32, dt: f32) {
        for v in &mut self.data {
            *v = to_transformed(*v, dx, dt);
        }
    }

    /// Map transformed units back to physical speeds in place.
    pub fn untransform(&mut self, dx: f32, dt: f32) {
        for v in &mut self.data {
            *v = to_physical(*v, dx, dt);
        }
    }

    /// Step along a direction with clamping: `v ← clip(v + α·d, lo, hi)`.
    ///
    /// Bounds are in transformed units, so `lo` corresponds to the maximum
    /// physical speed and `hi` to the minimum.
    pub fn update_along(&mut self, direction: &[f32], steplen: f32, lo: f32, hi: f32) {
        debug_assert_eq!(direction.len(), self.data.len());
        self.data
            .par_iter_mut()
            .zip(direction.par_iter())
            .for_each(|(v, &d)| {
                *v = (*v + steplen * d).clamp(lo, hi);
            });
    }

    /// Smallest cell value.
    #[must_use]
    pub fn min_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Largest cell value.
    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_round_trip() {
        let (dx, dt) = (10.0, 0.001);
        for c in [1500.0f32, 2000.0, 3500.0, 5500.0] {
            let s = to_transformed(c, dx, dt);
            let back = to_physical(s, dx, dt);
            assert!(
                (back - c).abs() / c < 1e-6,
                "c → s → c should be identity: {c} vs {back}"
            );
        }
    }

    #[test]
    fn transform_is_decreasing() {
        let (dx, dt) = (10.0, 0.001);
        let s_slow = to_transformed(1500.0, dx, dt);
        let s_fast = to_transformed(5500.0, dx, dt);
        assert!(s_fast < s_slow, "s must decrease with c: {s_fast} vs {s_slow}");
    }

    #[test]
    fn expand_replicates_edges() {
        let v = Velocity::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2); // columns [1,2], [3,4]
        let e = v.expand_domain(2);
        assert_eq!(e.nz, 6);
        assert_eq!(e.nx, 6);
        assert_eq!(e.at(0, 0), 1.0, "corner takes nearest interior cell");
        assert_eq!(e.at(5, 5), 4.0);
        assert_eq!(e.at(0, 3), 3.0, "top border follows its column");
        assert_eq!(e.at(3, 0), 2.0, "left border follows its row");
        assert_eq!(e.at(2, 2), 1.0);
    }

    #[test]
    fn interior_inverts_expand() {
        let v = Velocity::new((0..12).map(|i| i as f32).collect(), 3, 4);
        let round = v.expand_domain(3).interior(3);
        assert_eq!(round.data, v.data);
        assert_eq!((round.nz, round.nx), (3, 4));
    }

    #[test]
    fn refill_restores_border_invariant() {
        let v = Velocity::new(vec![5.0; 9], 3, 3);
        let mut e = v.expand_domain(2);
        // Disturb the interior corner, then refill: the border must track it.
        e.data[2 * e.nz + 2] = 9.0; // interior corner cell (iz=2, ix=2)
        e.refill_boundary(2);
        assert_eq!(e.at(0, 0), 9.0, "corner padding mirrors interior corner");
        assert_eq!(e.at(0, 2), 9.0, "top padding mirrors its column edge");
        assert_eq!(e.at(1, 0), 9.0, "left padding mirrors its row edge");
        assert_eq!(e.at(6, 6), 5.0);
    }

    #[test]
    fn update_clamps_both_sides() {
        let mut v = Velocity::new(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        let d = vec![100.0, -100.0, 0.0, 0.0];
        v.update_along(&d, 1.0, 0.5, 3.5);
        assert_eq!(v.data, vec![3.5, 0.5, 3.0, 3.5]);
    }

    #[test]
    fn min_max_values() {
        let v = Velocity::new(vec![2.0, -1.0, 7.0], 3, 1);
        assert_eq!(v.min_value(), -1.0);
        assert_eq!(v.max_value(), 7.0);
    }
}
