// SPDX-License-Identifier: AGPL-3.0-only

//! Ricker source time function.

use std::f32::consts::PI;

/// Sample a Ricker wavelet (second derivative of a Gaussian) with dominant
/// frequency `fm`, delayed by one period so the onset is causal:
///
/// `w(t) = amp · (1 − 2(πfm(t − 1/fm))²) · exp(−(πfm(t − 1/fm))²)`
#[must_use]
pub fn ricker_wavelet(nt: usize, fm: f32, dt: f32, amp: f32) -> Vec<f32> {
    (0..nt)
        .map(|it| {
            let arg = PI * fm * (it as f32 * dt - 1.0 / fm);
            let arg2 = arg * arg;
            amp * (1.0 - 2.0 * arg2) * (-arg2).exp()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_at_delay_equals_amplitude() {
        // With fm=10 and dt=1e-3 the delay 1/fm lands exactly on sample 100.
        let w = ricker_wavelet(300, 10.0, 1e-3, 1000.0);
        assert!((w[100] - 1000.0).abs() < 1e-3, "peak should be amp, got {}", w[100]);
        let max = w.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!((max - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn onset_is_quiet() {
        let w = ricker_wavelet(300, 10.0, 1e-3, 1000.0);
        assert!(
            w[0].abs() < 1.0,
            "t=0 sample should be tiny relative to amp=1000, got {}",
            w[0]
        );
    }

    #[test]
    fn side_lobes_are_negative() {
        let w = ricker_wavelet(300, 10.0, 1e-3, 1.0);
        // Zero crossings at arg² = 1/2, i.e. ±22.5 samples around the peak.
        assert!(w[70] < 0.0, "left lobe should be negative, got {}", w[70]);
        assert!(w[130] < 0.0, "right lobe should be negative, got {}", w[130]);
    }

    #[test]
    fn length_matches_nt() {
        assert_eq!(ricker_wavelet(123, 15.0, 2e-3, 1.0).len(), 123);
    }
}
