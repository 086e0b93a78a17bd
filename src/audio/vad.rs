//! Energy-based Voice Activity Detection.
//!
//! Pure functions over a frame's samples: the same input always yields the
//! same output, so the functions are trivially thread-safe.  Callers keep
//! their own silence counter and "speech started" flag across frames (the
//! Listening state does exactly that).

// ---------------------------------------------------------------------------
// RMS energy
// ---------------------------------------------------------------------------

/// Root-mean-square amplitude of a frame, normalised to `[0.0, 1.0]`.
///
/// An all-zero frame yields `0.0`; a full-scale square wave yields ~`1.0`.
pub fn frame_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples
        .iter()
        .map(|&s| {
            let v = f64::from(s) / f64::from(i16::MAX);
            v * v
        })
        .sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

/// Returns `true` when the frame's RMS amplitude exceeds `threshold`.
///
/// A typical threshold is `0.01` for a quiet room; use `0.02`–`0.05` in
/// noisy environments.
pub fn is_voice(samples: &[i16], threshold: f32) -> bool {
    frame_rms(samples) > threshold
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_frame() -> Vec<i16> {
        vec![i16::MAX / 2; 1024]
    }

    #[test]
    fn silence_has_zero_rms() {
        assert_eq!(frame_rms(&[0; 1024]), 0.0);
    }

    #[test]
    fn empty_frame_has_zero_rms() {
        assert_eq!(frame_rms(&[]), 0.0);
    }

    #[test]
    fn half_scale_square_wave_rms() {
        // Constant half-scale signal → RMS ≈ 0.5
        let rms = frame_rms(&loud_frame());
        assert!((rms - 0.5).abs() < 0.01, "rms = {rms}");
    }

    #[test]
    fn is_voice_threshold_behaviour() {
        assert!(is_voice(&loud_frame(), 0.01));
        assert!(!is_voice(&[0; 1024], 0.01));
        // Exactly at the threshold is not voice (strict >)
        assert!(!is_voice(&[0; 1024], 0.0));
    }

    /// Feeding the same frame twice yields the same RMS value — the function
    /// carries no hidden state.
    #[test]
    fn rms_is_idempotent() {
        let frame: Vec<i16> = (0..1024).map(|i| ((i * 37) % 5000) as i16).collect();
        let a = frame_rms(&frame);
        let b = frame_rms(&frame);
        assert_eq!(a, b);
    }

    #[test]
    fn negative_samples_contribute_like_positive() {
        let pos = vec![1000_i16; 1024];
        let neg = vec![-1000_i16; 1024];
        assert!((frame_rms(&pos) - frame_rms(&neg)).abs() < 1e-7);
    }
}
