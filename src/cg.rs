// SPDX-License-Identifier: AGPL-3.0-only

//! Nonlinear conjugate-gradient direction with Polak–Ribière reset.
//!
//! `β = (⟨g, g⟩ − ⟨g, g_prev⟩) / ⟨g_prev, g_prev⟩`, floored at zero; a
//! negative β resets the direction to steepest descent. The state carries
//! the previous gradient and reuses the direction buffer in place, so the
//! previous direction is implicit.

/// Direction-builder state persisted across outer iterations.
#[derive(Debug, Clone)]
pub struct CgState {
    prev_gradient: Vec<f32>,
    direction: Vec<f32>,
    iteration: usize,
}

fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum()
}

impl CgState {
    /// Fresh state for a model of `size` cells.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            prev_gradient: vec![0.0; size],
            direction: vec![0.0; size],
            iteration: 0,
        }
    }

    /// Fold the current gradient into the search direction and return it.
    pub fn update(&mut self, gradient: &[f32]) -> &[f32] {
        debug_assert_eq!(gradient.len(), self.direction.len());
        if self.iteration == 0 {
            self.direction.copy_from_slice(gradient);
        } else {
            let a = dot(gradient, gradient);
            let b = dot(gradient, &self.prev_gradient);
            let c = dot(&self.prev_gradient, &self.prev_gradient);
            let mut beta = if c > 0.0 { (a - b) / c } else { 0.0 };
            if beta < 0.0 || !beta.is_finite() {
                beta = 0.0;
            }
            let beta = beta as f32;
            for (d, &g) in self.direction.iter_mut().zip(gradient.iter()) {
                *d = g + beta * *d;
            }
        }
        self.prev_gradient.copy_from_slice(gradient);
        self.iteration += 1;
        &self.direction
    }

    /// Direction from the last update.
    #[must_use]
    pub fn direction(&self) -> &[f32] {
        &self.direction
    }

    /// Number of updates applied so far.
    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_is_steepest_descent() {
        let mut cg = CgState::new(3);
        let d = cg.update(&[1.0, -2.0, 3.0]).to_vec();
        assert_eq!(d, vec![1.0, -2.0, 3.0]);
        assert_eq!(cg.iteration(), 1);
    }

    #[test]
    fn orthogonal_gradients_use_fletcher_reeves_ratio() {
        // With ⟨g, g_prev⟩ = 0, β = ‖g‖²/‖g_prev‖² and d = g + β·d_prev.
        let mut cg = CgState::new(2);
        cg.update(&[2.0, 0.0]);
        let d = cg.update(&[0.0, 1.0]).to_vec();
        // β = 1/4, d_prev = (2, 0) → d = (0.5, 1).
        assert!((d[0] - 0.5).abs() < 1e-6, "d[0] = {}", d[0]);
        assert!((d[1] - 1.0).abs() < 1e-6, "d[1] = {}", d[1]);
    }

    #[test]
    fn negative_beta_resets_to_gradient() {
        // g_prev = (1, 0), g = (0.1, 0): a = 0.01, b = 0.1 → β < 0 → reset.
        let mut cg = CgState::new(2);
        cg.update(&[1.0, 0.0]);
        let d = cg.update(&[0.1, 0.0]).to_vec();
        assert_eq!(d, vec![0.1, 0.0]);
    }

    #[test]
    fn identical_gradients_keep_direction_unscaled() {
        // a = b → β = 0 → d = g.
        let mut cg = CgState::new(2);
        cg.update(&[1.0, 2.0]);
        let d = cg.update(&[1.0, 2.0]).to_vec();
        assert_eq!(d, vec![1.0, 2.0]);
    }

    #[test]
    fn zero_previous_gradient_is_safe() {
        let mut cg = CgState::new(2);
        cg.update(&[0.0, 0.0]);
        let d = cg.update(&[1.0, 1.0]).to_vec();
        assert_eq!(d, vec![1.0, 1.0], "β must fall back to 0 when ‖g_prev‖ = 0");
    }
}
