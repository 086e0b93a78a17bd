//! EchoMate — the runtime core of a voice-assistant device.
//!
//! Continuously captures microphone audio, waits for a wake word, records an
//! utterance bounded by voice-activity detection, hands it to a remote
//! dialogue server, and plays back the synthesized reply, looping until the
//! server ends the conversation.
//!
//! Crate layout:
//!
//! * [`audio`] — the real-time engine: device access, frame queues, WAV
//!   recording/playback, energy VAD.
//! * [`wake`] — wake word detection behind a narrow per-frame interface.
//! * [`net`] — the dialogue server transport (upload, reply, fetch).
//! * [`session`] — the conversation state machine and its supervisor.
//! * [`config`] — TOML settings and platform paths.
//! * [`display`] — state notifications for the device's front panel.

pub mod audio;
pub mod config;
pub mod display;
pub mod net;
pub mod session;
pub mod wake;
