//! Wake word detection over captured frames.
//!
//! [`WakeWordDetector`] is the seam the session polls in the Idle state.
//! The production implementation wraps `rustpotter`; [`NoWakeDetector`] is
//! the fallback when no model is available, so the rest of the system keeps
//! running (it just never wakes).

use std::path::Path;

use thiserror::Error;

use crate::audio::SAMPLE_RATE;

// ---------------------------------------------------------------------------
// WakeError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WakeError {
    #[error("wake detector init failed: {0}")]
    Init(String),

    #[error("wake model load failed ({path}): {reason}")]
    Model { path: String, reason: String },
}

// ---------------------------------------------------------------------------
// WakeWordDetector
// ---------------------------------------------------------------------------

/// Per-frame hotword scan.
///
/// `detect` returns a positive 1-based model index on a hit, `0` when the
/// frame contains no wake word, and a negative value on an internal engine
/// error.  Errors are soft: the caller logs and keeps polling.
pub trait WakeWordDetector: Send {
    fn detect(&mut self, samples: &[i16]) -> i32;
}

// ---------------------------------------------------------------------------
// RustpotterDetector
// ---------------------------------------------------------------------------

/// `rustpotter`-backed detector.
///
/// The model dictates its own frame length, which rarely matches the
/// engine's, so samples are re-chunked through an internal buffer; a single
/// engine frame may therefore yield zero or several model-sized scans.
pub struct RustpotterDetector {
    potter: rustpotter::Rustpotter,
    /// Loaded wakeword keys, in registration order; a detection maps to
    /// `position + 1`.
    names: Vec<String>,
    /// Carry-over samples shorter than one model frame.
    buffer: Vec<i16>,
    frame_len: usize,
}

impl RustpotterDetector {
    /// Build a detector around a single model file.  `threshold` is the
    /// model score required for a hit (0.0 to 1.0).
    pub fn new(model_path: &Path, threshold: f32) -> Result<Self, WakeError> {
        let mut config = rustpotter::RustpotterConfig::default();
        config.fmt.sample_rate = SAMPLE_RATE as usize;
        config.fmt.channels = 1;
        config.fmt.sample_format = rustpotter::SampleFormat::I16;
        config.detector.threshold = threshold;

        let mut potter = rustpotter::Rustpotter::new(&config)
            .map_err(|e| WakeError::Init(e.to_string()))?;

        let key = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("wakeword")
            .to_string();
        let path_str = model_path.to_string_lossy().into_owned();
        potter
            .add_wakeword_from_file(&key, &path_str)
            .map_err(|e| WakeError::Model {
                path: path_str.clone(),
                reason: e.to_string(),
            })?;

        let frame_len = potter.get_samples_per_frame();
        log::info!("wake: model '{key}' loaded from {path_str} ({frame_len} samples/scan)");

        Ok(Self {
            potter,
            names: vec![key],
            buffer: Vec::with_capacity(frame_len * 2),
            frame_len,
        })
    }
}

impl WakeWordDetector for RustpotterDetector {
    fn detect(&mut self, samples: &[i16]) -> i32 {
        self.buffer.extend_from_slice(samples);

        while self.buffer.len() >= self.frame_len {
            let rest = self.buffer.split_off(self.frame_len);
            let chunk = std::mem::replace(&mut self.buffer, rest);

            if let Some(detection) = self.potter.process_samples(chunk) {
                log::debug!(
                    "wake: hit '{}' (score {:.3})",
                    detection.name,
                    detection.score
                );
                // Leftover audio belongs to the wake word itself; the
                // session clears the capture queue anyway.
                self.buffer.clear();
                return match self.names.iter().position(|n| *n == detection.name) {
                    Some(pos) => (pos + 1) as i32,
                    None => 1,
                };
            }
        }
        0
    }
}

// ---------------------------------------------------------------------------
// NoWakeDetector
// ---------------------------------------------------------------------------

/// Detector used when no model file is configured or loading failed.
/// Never triggers.
pub struct NoWakeDetector;

impl NoWakeDetector {
    pub fn new() -> Self {
        log::warn!("wake: no model available; wake word detection disabled");
        Self
    }
}

impl Default for NoWakeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeWordDetector for NoWakeDetector {
    fn detect(&mut self, _samples: &[i16]) -> i32 {
        0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_detector_never_triggers() {
        let mut detector = NoWakeDetector::new();
        assert_eq!(detector.detect(&[0; 1024]), 0);
        assert_eq!(detector.detect(&[i16::MAX; 1024]), 0);
    }

    #[test]
    fn missing_model_file_fails_construction() {
        let err = RustpotterDetector::new(Path::new("/nonexistent/model.rpw"), 0.4);
        assert!(err.is_err());
    }
}
