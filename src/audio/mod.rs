//! Real-time audio: frames, device access, queues, the engine, VAD, and WAV
//! file handling.

pub mod device;
pub mod engine;
pub mod frame;
pub mod queue;
pub mod vad;
pub mod wav;

pub use device::{CaptureSource, CpalDeviceBuilder, DeviceBuilder, DeviceError, PlaybackSink};
pub use engine::{AudioEngine, EngineError};
pub use frame::{AudioFrame, FRAME_BYTES, FRAME_SAMPLES, SAMPLE_RATE};
pub use queue::{CaptureQueue, PlaybackQueue};
pub use vad::{frame_rms, is_voice};
pub use wav::{WavError, WavFrameReader, WavRecorder};
