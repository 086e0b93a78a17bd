//! Hardware stream abstraction and its `cpal` implementation.
//!
//! The engine's worker threads speak to the device through two narrow
//! traits, [`CaptureSource`] and [`PlaybackSink`], with blocking `read` /
//! `write` semantics and an explicit [`recover`](CaptureSource::recover)
//! operation for XRUN-style transient failures.  A [`DeviceBuilder`] opens
//! the streams *inside* the worker thread, which keeps the non-`Send`
//! `cpal::Stream` confined to the thread that owns it and lets tests swap in
//! scripted devices.
//!
//! Streams are opened at the engine's fixed 16 kHz rate but at the device's
//! native channel count; the capture thread folds the channels down, the
//! playback thread duplicates its mono frames up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use super::frame::SAMPLE_RATE;

/// How long a blocking `read` waits before reporting [`DeviceError::Timeout`].
const READ_TIMEOUT: Duration = Duration::from_millis(100);

/// Bounded hand-off depth between `write` and the output callback; the bound
/// is what makes `write` pace itself against real playback speed.
const PLAYBACK_CHUNK_DEPTH: usize = 4;

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors surfaced by the hardware layer.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no audio device found on the default host")]
    NoDevice,

    #[error("failed to configure audio stream: {0}")]
    Config(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    /// No data arrived within the read timeout; not an error condition,
    /// the caller simply polls again.
    #[error("audio read timed out")]
    Timeout,

    /// The stream's feeding side is gone; only reopening helps.
    #[error("audio stream closed")]
    Closed,
}

impl DeviceError {
    /// Transient errors are retried in place; the rest require a reopen.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Timeout | DeviceError::Stream(_))
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A source of interleaved 16-bit capture data.
pub trait CaptureSource {
    /// Interleaved channel count of the chunks returned by [`read`](Self::read).
    fn channels(&self) -> u16;

    /// Block (bounded) for the next chunk of interleaved samples.
    fn read(&mut self) -> Result<Vec<i16>, DeviceError>;

    /// Reinitialise the stream state after a failure, reusing the device
    /// handle where possible.
    fn recover(&mut self) -> Result<(), DeviceError>;
}

/// A sink for interleaved 16-bit playback data.
pub trait PlaybackSink {
    /// Interleaved channel count expected by [`write`](Self::write).
    fn channels(&self) -> u16;

    /// Write one interleaved chunk; blocks while the device's buffer is full.
    fn write(&mut self, interleaved: &[i16]) -> Result<(), DeviceError>;

    /// Reinitialise the stream state after a failure.
    fn recover(&mut self) -> Result<(), DeviceError>;
}

/// Opens capture and playback streams.  Called from inside the engine's
/// worker threads, once per (re)open.
pub trait DeviceBuilder: Send + Sync {
    fn open_capture(&self) -> Result<Box<dyn CaptureSource>, DeviceError>;
    fn open_playback(&self) -> Result<Box<dyn PlaybackSink>, DeviceError>;
}

// ---------------------------------------------------------------------------
// CpalDeviceBuilder
// ---------------------------------------------------------------------------

/// Default [`DeviceBuilder`] backed by the system's default cpal host.
#[derive(Debug, Default)]
pub struct CpalDeviceBuilder;

impl CpalDeviceBuilder {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceBuilder for CpalDeviceBuilder {
    fn open_capture(&self) -> Result<Box<dyn CaptureSource>, DeviceError> {
        Ok(Box::new(CpalCapture::open()?))
    }

    fn open_playback(&self) -> Result<Box<dyn PlaybackSink>, DeviceError> {
        Ok(Box::new(CpalPlayback::open()?))
    }
}

// ---------------------------------------------------------------------------
// CpalCapture
// ---------------------------------------------------------------------------

/// Capture stream: the cpal callback forwards raw chunks over a channel and
/// `read` drains it with a bounded wait.
pub struct CpalCapture {
    device: cpal::Device,
    channels: u16,
    _stream: cpal::Stream,
    rx: mpsc::Receiver<Vec<i16>>,
    failed: Arc<AtomicBool>,
}

impl CpalCapture {
    pub fn open() -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(DeviceError::NoDevice)?;
        Self::open_on(device)
    }

    fn open_on(device: cpal::Device) -> Result<Self, DeviceError> {
        let channels = device
            .default_input_config()
            .map_err(|e| DeviceError::Config(e.to_string()))?
            .channels();

        let (stream, rx, failed) = Self::build_stream(&device, channels)?;

        log::info!(
            "device: capture open ({} ch @ {} Hz)",
            channels,
            SAMPLE_RATE
        );

        Ok(Self {
            device,
            channels,
            _stream: stream,
            rx,
            failed,
        })
    }

    fn build_stream(
        device: &cpal::Device,
        channels: u16,
    ) -> Result<(cpal::Stream, mpsc::Receiver<Vec<i16>>, Arc<AtomicBool>), DeviceError> {
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = mpsc::channel::<Vec<i16>>();
        let failed = Arc::new(AtomicBool::new(false));
        let failed_cb = Arc::clone(&failed);

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    // Receiver dropped means the capture thread is gone.
                    let _ = tx.send(data.to_vec());
                },
                move |err: cpal::StreamError| {
                    log::warn!("device: capture stream error: {err}");
                    failed_cb.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| DeviceError::Config(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        Ok((stream, rx, failed))
    }
}

impl CaptureSource for CpalCapture {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn read(&mut self) -> Result<Vec<i16>, DeviceError> {
        if self.failed.swap(false, Ordering::SeqCst) {
            return Err(DeviceError::Stream("capture stream reported failure".into()));
        }
        match self.rx.recv_timeout(READ_TIMEOUT) {
            Ok(chunk) => Ok(chunk),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(DeviceError::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(DeviceError::Closed),
        }
    }

    fn recover(&mut self) -> Result<(), DeviceError> {
        // In-place first: rebuild the stream on the handle we already hold.
        match Self::build_stream(&self.device, self.channels) {
            Ok((stream, rx, failed)) => {
                self._stream = stream;
                self.rx = rx;
                self.failed = failed;
                log::info!("device: capture stream reinitialised");
                Ok(())
            }
            Err(e) => {
                // The handle itself may be stale; reopen from the host.
                log::warn!("device: capture reinit failed ({e}), reopening device");
                let host = cpal::default_host();
                let device = host.default_input_device().ok_or(DeviceError::NoDevice)?;
                *self = Self::open_on(device)?;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CpalPlayback
// ---------------------------------------------------------------------------

/// Playback stream: `write` pushes chunks over a small bounded channel that
/// the output callback drains; a full channel is what gives `write` its
/// blocking, hardware-paced behaviour.
pub struct CpalPlayback {
    device: cpal::Device,
    channels: u16,
    _stream: cpal::Stream,
    tx: mpsc::SyncSender<Vec<i16>>,
    failed: Arc<AtomicBool>,
}

impl CpalPlayback {
    pub fn open() -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;
        Self::open_on(device)
    }

    fn open_on(device: cpal::Device) -> Result<Self, DeviceError> {
        let channels = device
            .default_output_config()
            .map_err(|e| DeviceError::Config(e.to_string()))?
            .channels();

        let (stream, tx, failed) = Self::build_stream(&device, channels)?;

        log::info!(
            "device: playback open ({} ch @ {} Hz)",
            channels,
            SAMPLE_RATE
        );

        Ok(Self {
            device,
            channels,
            _stream: stream,
            tx,
            failed,
        })
    }

    fn build_stream(
        device: &cpal::Device,
        channels: u16,
    ) -> Result<(cpal::Stream, mpsc::SyncSender<Vec<i16>>, Arc<AtomicBool>), DeviceError> {
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(SAMPLE_RATE),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = mpsc::sync_channel::<Vec<i16>>(PLAYBACK_CHUNK_DEPTH);
        let failed = Arc::new(AtomicBool::new(false));
        let failed_cb = Arc::clone(&failed);

        // Carry-over samples between callback invocations: chunk sizes from
        // `write` rarely line up with the hardware buffer size.
        let mut pending: Vec<i16> = Vec::new();
        let mut pos = 0_usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for out in data.iter_mut() {
                        if pos >= pending.len() {
                            match rx.try_recv() {
                                Ok(chunk) => {
                                    pending = chunk;
                                    pos = 0;
                                }
                                // Starved: emit silence rather than stall.
                                Err(_) => {
                                    *out = 0;
                                    continue;
                                }
                            }
                        }
                        *out = pending[pos];
                        pos += 1;
                    }
                },
                move |err: cpal::StreamError| {
                    log::warn!("device: playback stream error: {err}");
                    failed_cb.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| DeviceError::Config(e.to_string()))?;

        stream
            .play()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        Ok((stream, tx, failed))
    }
}

impl PlaybackSink for CpalPlayback {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn write(&mut self, interleaved: &[i16]) -> Result<(), DeviceError> {
        if self.failed.swap(false, Ordering::SeqCst) {
            return Err(DeviceError::Stream(
                "playback stream reported failure".into(),
            ));
        }
        self.tx
            .send(interleaved.to_vec())
            .map_err(|_| DeviceError::Closed)
    }

    fn recover(&mut self) -> Result<(), DeviceError> {
        match Self::build_stream(&self.device, self.channels) {
            Ok((stream, tx, failed)) => {
                self._stream = stream;
                self.tx = tx;
                self.failed = failed;
                log::info!("device: playback stream reinitialised");
                Ok(())
            }
            Err(e) => {
                log::warn!("device: playback reinit failed ({e}), reopening device");
                let host = cpal::default_host();
                let device = host.default_output_device().ok_or(DeviceError::NoDevice)?;
                *self = Self::open_on(device)?;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_transient() {
        assert!(DeviceError::Timeout.is_transient());
        assert!(DeviceError::Stream("xrun".into()).is_transient());
    }

    #[test]
    fn closed_and_open_failures_are_not_transient() {
        assert!(!DeviceError::Closed.is_transient());
        assert!(!DeviceError::NoDevice.is_transient());
        assert!(!DeviceError::Config("bad rate".into()).is_transient());
    }
}
