//! WAV recording and playback-file access in the engine's fixed format.
//!
//! [`WavRecorder`] is the recording file: `hound` writes a placeholder
//! header up front and backfills the payload/total size fields when the
//! writer is finalised, since the size is unknown until recording ends.
//! [`WavFrameReader`] does the inverse for `play_file`: it skips the header
//! and hands out the payload as frame-sized chunks, zero-padding the tail.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use thiserror::Error;

use super::frame::{AudioFrame, BITS_PER_SAMPLE, FRAME_SAMPLES, SAMPLE_RATE};

// ---------------------------------------------------------------------------
// WavError
// ---------------------------------------------------------------------------

/// Errors while reading or writing WAV files.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV format error: {0}")]
    Format(#[from] hound::Error),
}

/// The engine's canonical container format: 16 kHz mono s16le.
fn engine_spec() -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    }
}

// ---------------------------------------------------------------------------
// WavRecorder
// ---------------------------------------------------------------------------

/// Append-only PCM recording with header backfill on close.
///
/// Created by the engine's `save_start`; the capture thread mirrors every
/// frame through [`write_frame`](Self::write_frame); `save_stop` finalises
/// the header.  Dropping an unfinalised recorder still backfills the header
/// (hound finalises on drop), but errors are then unobservable — prefer
/// [`finalize`](Self::finalize).
pub struct WavRecorder {
    writer: hound::WavWriter<BufWriter<File>>,
}

impl WavRecorder {
    /// Open `path` for recording, truncating any previous file.
    pub fn create(path: &Path) -> Result<Self, WavError> {
        let writer = hound::WavWriter::create(path, engine_spec())?;
        Ok(Self { writer })
    }

    /// Append one frame's samples to the payload.
    pub fn write_frame(&mut self, frame: &AudioFrame) -> Result<(), WavError> {
        for &s in frame.samples() {
            self.writer.write_sample(s)?;
        }
        Ok(())
    }

    /// Close the file, backfilling the payload-size and total-size header
    /// fields.
    pub fn finalize(self) -> Result<(), WavError> {
        self.writer.finalize()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// WavFrameReader
// ---------------------------------------------------------------------------

/// Streams a WAV file's payload as engine frames.
///
/// The container header is consumed on open; every subsequent
/// [`next_frame`](Self::next_frame) yields [`FRAME_SAMPLES`] samples, with
/// the final short chunk zero-padded to the fixed frame length.
pub struct WavFrameReader {
    samples: hound::WavIntoSamples<BufReader<File>, i16>,
}

impl WavFrameReader {
    pub fn open(path: &Path) -> Result<Self, WavError> {
        let reader = hound::WavReader::open(path)?;
        Ok(Self {
            samples: reader.into_samples::<i16>(),
        })
    }

    /// The next frame-sized chunk of payload, or `None` at end of file.
    ///
    /// Unreadable samples (a truncated file) end the stream early rather
    /// than failing playback of everything already decoded.
    pub fn next_frame(&mut self) -> Option<AudioFrame> {
        let mut chunk = Vec::with_capacity(FRAME_SAMPLES);
        for _ in 0..FRAME_SAMPLES {
            match self.samples.next() {
                Some(Ok(s)) => chunk.push(s),
                Some(Err(e)) => {
                    log::warn!("wav: sample decode failed mid-file: {e}");
                    break;
                }
                None => break,
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(AudioFrame::from_samples(chunk))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
