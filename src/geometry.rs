// SPDX-License-Identifier: AGPL-3.0-only

//! Source and receiver positions on the grid.
//!
//! A `ShotPosition` is an ordered list of `(iz, ix)` cell indices generated
//! from a linear-array origin and stride. Positions start in interior index
//! space (as configured) and are shifted by the padding thickness before
//! the propagator sees them.

use crate::error::{Error, Result};

/// Ordered list of source or receiver cell positions.
#[derive(Debug, Clone)]
pub struct ShotPosition {
    positions: Vec<(usize, usize)>,
}

impl ShotPosition {
    /// Linear array: `n` points starting at `(zbeg, xbeg)` with stride
    /// `(jz, jx)` cells.
    #[must_use]
    pub fn linear(zbeg: usize, xbeg: usize, jz: usize, jx: usize, n: usize) -> Self {
        let positions = (0..n).map(|k| (zbeg + k * jz, xbeg + k * jx)).collect();
        Self { positions }
    }

    /// Check every point against the interior grid; `what` names the array
    /// in the error ("sources", "geophones").
    pub fn validate(&self, nz: usize, nx: usize, what: &str) -> Result<()> {
        for &(iz, ix) in &self.positions {
            if iz >= nz || ix >= nx {
                return Err(Error::Geometry(format!(
                    "{what} exceed the computing zone: ({iz}, {ix}) outside {nz}×{nx}"
                )));
            }
        }
        Ok(())
    }

    /// The same positions shifted into padded index space.
    #[must_use]
    pub fn shifted(&self, nb: usize) -> Self {
        let positions = self
            .positions
            .iter()
            .map(|&(iz, ix)| (iz + nb, ix + nb))
            .collect();
        Self { positions }
    }

    /// Sub-range `[lo, hi]` of the array (both ends inclusive).
    #[must_use]
    pub fn clip_range(&self, lo: usize, hi: usize) -> Self {
        Self {
            positions: self.positions[lo..=hi].to_vec(),
        }
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Iterate over `(iz, ix)` points.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.positions.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_array_strides() {
        let p = ShotPosition::linear(2, 10, 0, 5, 3);
        let pts: Vec<_> = p.iter().collect();
        assert_eq!(pts, vec![(2, 10), (2, 15), (2, 20)]);
    }

    #[test]
    fn validate_accepts_in_bounds() {
        let p = ShotPosition::linear(0, 0, 1, 1, 4);
        assert!(p.validate(4, 4, "sources").is_ok());
    }

    #[test]
    fn validate_rejects_out_of_zone() {
        let p = ShotPosition::linear(0, 2, 0, 1, 3); // last point at ix=4
        let err = p.validate(4, 4, "geophones").unwrap_err();
        assert!(err.to_string().contains("geophones exceed the computing zone"));
    }

    #[test]
    fn shifted_offsets_both_axes() {
        let p = ShotPosition::linear(1, 2, 0, 1, 2).shifted(30);
        let pts: Vec<_> = p.iter().collect();
        assert_eq!(pts, vec![(31, 32), (31, 33)]);
    }

    #[test]
    fn clip_range_is_inclusive() {
        let p = ShotPosition::linear(0, 0, 0, 2, 5);
        let c = p.clip_range(1, 1);
        assert_eq!(c.len(), 1);
        assert_eq!(c.iter().next(), Some((0, 2)));
    }
}
