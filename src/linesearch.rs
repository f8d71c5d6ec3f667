// SPDX-License-Identifier: AGPL-3.0-only

//! Step-length selection: bracket, then parabolic vertex.
//!
//! The search minimizes `J(v + α·d)` along the update direction, subject
//! to a physics cap (no cell may change by more than `maxdv` m/s in one
//! iteration) and to the velocity clamp bounds. It first brackets the
//! minimum by halving `α₂` while `J₂ > J₁` (up to five times) and doubling
//! `α₃` while the objective keeps falling below its linear extrapolation,
//! then takes the vertex of the parabola through the three points.
//!
//! Every `(α, J)` evaluation is kept; when a bracket fails, the search
//! recovers by returning the best point it ever tried and logs a warning —
//! bracket exhaustion and parabolic degeneracy are never surfaced as
//! errors. The accepted α seeds the next iteration's bracket through
//! [`AlphaState`].

use crate::error::Result;
use crate::geometry::ShotPosition;
use crate::gradient::objective;
use crate::propagator::{forward_modeling, Damp4t10d};
use crate::velocity::{to_physical, to_transformed, Velocity};

/// Halving attempts before the left bracket gives up.
const MAX_BRACKET_ITERS: usize = 5;
/// Persisted α below this is considered collapsed and reset.
const MIN_ALPHA: f32 = 1.0e-7;
/// Reset value for a collapsed persisted α.
const RESET_ALPHA: f32 = 1.0e-4;
/// Direction entries below this do not constrain the cap.
const DIR_EPS: f32 = 1.0e-10;
/// Near-colinear slope tolerance for the parabolic fit.
const SLOPE_TOL: f64 = 1.0e-3;
/// Direct-arrival width for line-search evaluations (s).
const EVAL_MUTE_S: f32 = 0.15;

/// J-evaluation strategy along the search ray.
pub trait StepObjective {
    /// Objective at step length `alpha`.
    fn eval(&mut self, alpha: f32) -> Result<f64>;
}

impl<F: FnMut(f32) -> Result<f64>> StepObjective for F {
    fn eval(&mut self, alpha: f32) -> Result<f64> {
        self(alpha)
    }
}

/// Encoded super-shot objective: forward-model the clamped trial velocity
/// and compare against the encoded observation.
#[derive(Debug)]
pub struct EncodedObjective<'a> {
    prop: &'a Damp4t10d,
    src: &'a ShotPosition,
    geo: &'a ShotPosition,
    encsrc: &'a [f32],
    encobs: &'a [f32],
    direction: &'a [f32],
    nt: usize,
    lo: f32,
    hi: f32,
}

impl<'a> EncodedObjective<'a> {
    /// Objective along `direction` from the propagator's current velocity,
    /// clamped to `[lo, hi]` (transformed units).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        prop: &'a Damp4t10d,
        src: &'a ShotPosition,
        geo: &'a ShotPosition,
        encsrc: &'a [f32],
        encobs: &'a [f32],
        direction: &'a [f32],
        nt: usize,
        lo: f32,
        hi: f32,
    ) -> Self {
        Self {
            prop,
            src,
            geo,
            encsrc,
            encobs,
            direction,
            nt,
            lo,
            hi,
        }
    }
}

impl StepObjective for EncodedObjective<'_> {
    fn eval(&mut self, alpha: f32) -> Result<f64> {
        let mut vel = self.prop.velocity().clone();
        vel.update_along(self.direction, alpha, self.lo, self.hi);
        let trial = self.prop.with_velocity(vel);
        let mut dcal = forward_modeling(&trial, self.src, self.geo, self.encsrc, self.nt);
        trial.remove_direct_arrival(&mut dcal, self.src, self.geo, self.nt, EVAL_MUTE_S);
        let residual: Vec<f32> = self
            .encobs
            .iter()
            .zip(dcal.iter())
            .map(|(&o, &c)| o - c)
            .collect();
        Ok(objective(&residual))
    }
}

/// Persisted initial step length, threaded through the outer loop.
#[derive(Debug, Default, Clone)]
pub struct AlphaState {
    alpha: Option<f32>,
}

impl AlphaState {
    /// Uninitialized state; the first search seeds it with its cap.
    #[must_use]
    pub const fn new() -> Self {
        Self { alpha: None }
    }

    /// Initial `(α₂, α₃)` for this iteration. First use adopts `max_alpha3`;
    /// a collapsed value resets to `RESET_ALPHA`.
    fn init_pair(&mut self, max_alpha3: f32) -> (f32, f32) {
        let stored = *self.alpha.get_or_insert(max_alpha3);
        let alpha3 = if stored < MIN_ALPHA { RESET_ALPHA } else { stored };
        (0.5 * alpha3, alpha3)
    }

    /// Persist the accepted step for the next iteration.
    fn record(&mut self, alpha: f32) {
        self.alpha = Some(alpha);
    }

    /// Currently persisted value, if any.
    #[must_use]
    pub fn value(&self) -> Option<f32> {
        self.alpha
    }
}

/// Accepted step length and how it was obtained.
#[derive(Debug, Clone, Copy)]
pub struct StepLen {
    /// Step length to apply.
    pub alpha: f32,
    /// Objective at (or predicted at) `alpha`; NaN when degenerate.
    pub objective: f64,
    /// Whether the parabolic fit ran (false: a fallback branch returned
    /// the best evaluated point).
    pub parabolic: bool,
    /// Whether the fit was near-colinear and the cap was used instead.
    pub degenerate: bool,
}

/// Largest admissible `(α₂, α₃)` so no cell's speed changes by more than
/// `maxdv` m/s: per cell, the α reaching exactly `maxdv` is
/// `(s(c − maxdv) − s)/|d|`; the cap is the minimum over the grid.
#[must_use]
pub fn max_alpha23(vel: &Velocity, direction: &[f32], dt: f32, dx: f32, maxdv: f32) -> (f32, f32) {
    let mut alpha2 = f32::MAX;
    for (&s, &d) in vel.data.iter().zip(direction.iter()) {
        if d.abs() < DIR_EPS {
            continue;
        }
        let c = to_physical(s, dx, dt);
        if c <= maxdv {
            continue;
        }
        let s_shifted = to_transformed(c - maxdv, dx, dt);
        let cap = (s_shifted - s) / d.abs();
        if cap < alpha2 {
            alpha2 = cap;
        }
    }
    if alpha2 == f32::MAX {
        // Vanishing direction: nothing constrains the step; keep the
        // search finite and let the clamp bounds do the real work.
        tracing::warn!("update direction vanishes, step cap defaults to 1");
        return (1.0, 2.0);
    }
    (alpha2, 2.0 * alpha2)
}

/// Vertex `(x, y)` of the parabola through three points (exact fit).
#[must_use]
pub fn parabola_vertex(x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) -> (f64, f64) {
    let denom = (x1 - x2) * (x1 - x3) * (x2 - x3);
    let a = (x3 * (y2 - y1) + x2 * (y1 - y3) + x1 * (y3 - y2)) / denom;
    let b = (x3 * x3 * (y1 - y2) + x2 * x2 * (y3 - y1) + x1 * x1 * (y2 - y3)) / denom;
    let c = (x2 * x3 * (x2 - x3) * y1 + x3 * x1 * (x3 - x1) * y2 + x1 * x2 * (x1 - x2) * y3)
        / denom;
    (-b / (2.0 * a), c - b * b / (4.0 * a))
}

fn best_tried(tried: &[(f32, f64)]) -> (f32, f64) {
    let mut best = tried[0];
    for &(alpha, obj) in &tried[1..] {
        if obj < best.1 {
            best = (alpha, obj);
        }
    }
    best
}

/// Select the step length along `direction` for this iteration.
///
/// `obj1` is the objective at α = 0, already known from the gradient
/// stage. The accepted α is persisted into `state` for the next search.
#[allow(clippy::too_many_arguments)]
pub fn search<O: StepObjective + ?Sized>(
    obj: &mut O,
    vel: &Velocity,
    direction: &[f32],
    dt: f32,
    dx: f32,
    maxdv: f32,
    obj1: f64,
    state: &mut AlphaState,
) -> Result<StepLen> {
    let (_, max_alpha3) = max_alpha23(vel, direction, dt, dx, maxdv);
    let (mut alpha2, mut alpha3) = state.init_pair(max_alpha3);

    let mut obj2 = obj.eval(alpha2)?;
    let mut obj3 = obj.eval(alpha3)?;
    let mut tried: Vec<(f32, f64)> = vec![(alpha2, obj2)];

    // Halve α₂ until the objective drops below J₁.
    let mut iters = 0;
    while iters < MAX_BRACKET_ITERS && obj2 > obj1 {
        alpha3 = alpha2;
        obj3 = obj2;
        alpha2 *= 0.5;
        obj2 = obj.eval(alpha2)?;
        tried.push((alpha2, obj2));
        iters += 1;
    }

    if obj2 > obj1 {
        // Left bracket exhausted: take the best point ever evaluated.
        let (ba, bj) = best_tried(&tried);
        alpha3 = (2.0 * ba).min(max_alpha3);
        obj3 = obj.eval(alpha3)?;
        tried.push((alpha3, obj3));
        let (alpha, objective) = best_tried(&tried);
        tracing::warn!(
            alpha,
            objective,
            "line search could not bracket below J1 by halving; keeping best tried point"
        );
        state.record(alpha);
        return Ok(StepLen {
            alpha,
            objective,
            parabolic: false,
            degenerate: false,
        });
    }

    // Double α₃ while the objective stays below its linear extrapolation.
    tried.clear();
    tried.push((alpha3, obj3));
    let mut hit_cap = false;
    loop {
        let linear = obj1 + (obj2 - obj1) / f64::from(alpha2) * f64::from(alpha3);
        if !(obj3 < linear && obj3 < obj1) {
            break;
        }
        if alpha3 >= max_alpha3 {
            hit_cap = true;
            break;
        }
        alpha2 = alpha3;
        obj2 = obj3;
        alpha3 = (2.0 * alpha3).min(max_alpha3);
        obj3 = obj.eval(alpha3)?;
        tried.push((alpha3, obj3));
    }

    if hit_cap {
        // Right bracket ran into the physics cap: keep the best point.
        let (ba, _) = best_tried(&tried);
        alpha2 = 0.5 * ba;
        obj2 = obj.eval(alpha2)?;
        tried.push((alpha2, obj2));
        let (alpha, objective) = best_tried(&tried);
        tracing::warn!(
            alpha,
            objective,
            "line search hit the per-iteration velocity cap; keeping best tried point"
        );
        state.record(alpha);
        return Ok(StepLen {
            alpha,
            objective,
            parabolic: false,
            degenerate: false,
        });
    }

    // Parabolic vertex through (0, J₁), (α₂, J₂), (α₃, J₃).
    let k1 = (obj2 - obj1) / f64::from(alpha2);
    let k2 = (obj3 - obj2) / f64::from(alpha3 - alpha2);
    let (xv, yv) = parabola_vertex(0.0, obj1, f64::from(alpha2), obj2, f64::from(alpha3), obj3);

    let near_colinear = (k2 - k1).abs() < SLOPE_TOL * k1.abs().max(k2.abs());
    let (alpha4, obj4, degenerate) = if near_colinear || !xv.is_finite() {
        tracing::warn!("three line-search points are near-colinear; stepping to the cap");
        ((2.0 * alpha3).min(max_alpha3), f64::NAN, true)
    } else {
        ((xv as f32).min(max_alpha3), yv, false)
    };

    state.record(alpha4);
    Ok(StepLen {
        alpha: alpha4,
        objective: obj4,
        parabolic: true,
        degenerate,
    })
}
