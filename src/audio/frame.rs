//! Fixed-format PCM audio frames — the unit of capture, playback and queuing.
//!
//! The whole engine runs at one logical format: 16 kHz, mono, 16-bit signed
//! PCM, 1024 samples (64 ms) per frame.  Hardware streams may use more
//! channels; the device layer folds them down to this format before a frame
//! ever reaches a consumer.

// ---------------------------------------------------------------------------
// Format constants
// ---------------------------------------------------------------------------

/// Sample rate of every frame in Hz.
pub const SAMPLE_RATE: u32 = 16_000;

/// Samples per frame (mono).  1024 samples at 16 kHz is 64 ms of audio.
pub const FRAME_SAMPLES: usize = 1024;

/// Bit depth of a sample.
pub const BITS_PER_SAMPLE: u16 = 16;

/// Size of one frame's payload in bytes.
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;

// ---------------------------------------------------------------------------
// AudioFrame
// ---------------------------------------------------------------------------

/// One fixed-duration chunk of mono 16-bit PCM audio.
///
/// Immutable once produced: the capture thread builds frames, every consumer
/// (wake-word detector, VAD, recorder, playback) only reads them.
///
/// # Example
///
/// ```rust
/// use echo_mate::audio::{AudioFrame, FRAME_SAMPLES};
///
/// let frame = AudioFrame::from_samples(vec![0_i16; 100]); // short input
/// assert_eq!(frame.samples().len(), FRAME_SAMPLES);       // zero-padded
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    samples: Vec<i16>,
}

impl AudioFrame {
    /// Build a frame from exactly [`FRAME_SAMPLES`] mono samples.
    ///
    /// Shorter input is zero-padded to the fixed length (used for the final
    /// chunk of a file); longer input is truncated.
    pub fn from_samples(mut samples: Vec<i16>) -> Self {
        samples.resize(FRAME_SAMPLES, 0);
        Self { samples }
    }

    /// A frame of pure silence.
    pub fn silence() -> Self {
        Self {
            samples: vec![0; FRAME_SAMPLES],
        }
    }

    /// The frame's samples (always [`FRAME_SAMPLES`] long).
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    /// Duplicate the mono frame across `channels` interleaved channels.
    ///
    /// Used by the playback thread when the hardware is multi-channel: every
    /// hardware channel carries the same signal (no panning).
    pub fn interleave(&self, channels: u16) -> Vec<i16> {
        let channels = channels.max(1) as usize;
        if channels == 1 {
            return self.samples.clone();
        }
        let mut out = Vec::with_capacity(self.samples.len() * channels);
        for &s in &self.samples {
            for _ in 0..channels {
                out.push(s);
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration_is_64ms() {
        // 1024 / 16000 = 0.064 s
        let ms = FRAME_SAMPLES as f64 * 1000.0 / SAMPLE_RATE as f64;
        assert!((ms - 64.0).abs() < 0.001);
    }

    #[test]
    fn short_input_is_zero_padded() {
        let frame = AudioFrame::from_samples(vec![7; 10]);
        assert_eq!(frame.samples().len(), FRAME_SAMPLES);
        assert_eq!(frame.samples()[9], 7);
        assert_eq!(frame.samples()[10], 0);
    }

    #[test]
    fn long_input_is_truncated() {
        let frame = AudioFrame::from_samples(vec![1; FRAME_SAMPLES + 100]);
        assert_eq!(frame.samples().len(), FRAME_SAMPLES);
    }

    #[test]
    fn interleave_mono_is_identity() {
        let frame = AudioFrame::from_samples(vec![3; FRAME_SAMPLES]);
        assert_eq!(frame.interleave(1), frame.samples());
    }

    #[test]
    fn interleave_duplicates_across_channels() {
        let frame = AudioFrame::from_samples(vec![5; FRAME_SAMPLES]);
        let stereo = frame.interleave(2);
        assert_eq!(stereo.len(), FRAME_SAMPLES * 2);
        assert_eq!(stereo[0], stereo[1]);
        assert_eq!(stereo[2], stereo[3]);
    }

    #[test]
    fn silence_is_all_zeros() {
        assert!(AudioFrame::silence().samples().iter().all(|&s| s == 0));
    }
}
