//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for audio capture and voice-activity detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Hardware channel index folded down to the logical mono signal when
    /// the capture device is multi-channel.
    pub capture_channel: u16,
    /// RMS amplitude threshold (0.0 – 1.0); a frame above this level counts
    /// as voice activity.  `0.01` suits a quiet room, `0.02`–`0.05` a noisy
    /// one.
    pub vad_threshold: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_channel: 0,
            vad_threshold: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// WakeConfig
// ---------------------------------------------------------------------------

/// Settings for wake word detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WakeConfig {
    /// Path to the wake word model file.  `None` disables wake detection
    /// (the assistant then never leaves Idle).
    pub model_path: Option<String>,
    /// Detection score threshold (0.0 – 1.0); higher means fewer false
    /// triggers at the cost of sensitivity.
    pub threshold: f32,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            threshold: 0.4,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Settings for the dialogue server the assistant talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Dialogue server host name or IP.
    pub host: String,
    /// Dialogue server TCP port.
    pub port: u16,
    /// Maximum seconds to wait for the utterance upload and its reply.
    pub upload_timeout_secs: u64,
    /// Maximum seconds to wait when fetching the reply audio file.
    pub download_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.137.1".into(),
            port: 5000,
            upload_timeout_secs: 20,
            download_timeout_secs: 15,
        }
    }
}

impl ServerConfig {
    /// Base URL of the dialogue server, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings governing conversation pacing.
///
/// Frame counts are in engine frames of 64 ms each, so e.g. the default
/// `trailing_silence_frames = 12` means roughly 0.77 s of silence ends an
/// utterance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Consecutive silent frames after speech that end the utterance.
    pub trailing_silence_frames: u32,
    /// Frames to wait for speech to start before giving up on the turn.
    pub no_speech_frames: u32,
    /// Hard cap on utterance length in frames.
    pub max_utterance_frames: u32,
    /// Supervisor poll interval in milliseconds.
    pub tick_ms: u64,
    /// Optional WAV file played once at startup as a greeting.
    pub greeting_file: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trailing_silence_frames: 12,
            no_speech_frames: 80,
            max_utterance_frames: 240,
            tick_ms: 5,
            greeting_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use echo_mate::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Audio capture / VAD settings.
    pub audio: AudioConfig,
    /// Wake word settings.
    pub wake: WakeConfig,
    /// Dialogue server settings.
    pub server: ServerConfig,
    /// Conversation pacing settings.
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Verify that a default `AppConfig` can be serialised to TOML and
    /// deserialised back without any data loss.
    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        // AudioConfig
        assert_eq!(original.audio.capture_channel, loaded.audio.capture_channel);
        assert_eq!(original.audio.vad_threshold, loaded.audio.vad_threshold);

        // WakeConfig
        assert_eq!(original.wake.model_path, loaded.wake.model_path);
        assert_eq!(original.wake.threshold, loaded.wake.threshold);

        // ServerConfig
        assert_eq!(original.server.host, loaded.server.host);
        assert_eq!(original.server.port, loaded.server.port);
        assert_eq!(
            original.server.upload_timeout_secs,
            loaded.server.upload_timeout_secs
        );

        // SessionConfig
        assert_eq!(
            original.session.trailing_silence_frames,
            loaded.session.trailing_silence_frames
        );
        assert_eq!(original.session.tick_ms, loaded.session.tick_ms);
        assert_eq!(original.session.greeting_file, loaded.session.greeting_file);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.audio.capture_channel, default.audio.capture_channel);
        assert_eq!(config.server.host, default.server.host);
        assert_eq!(config.wake.threshold, default.wake.threshold);
    }

    /// Verify default values match the device's shipped tuning.
    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.capture_channel, 0);
        assert_eq!(cfg.audio.vad_threshold, 0.01);
        assert!(cfg.wake.model_path.is_none());
        assert_eq!(cfg.server.host, "192.168.137.1");
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.server.base_url(), "http://192.168.137.1:5000");
        assert_eq!(cfg.session.trailing_silence_frames, 12);
        assert_eq!(cfg.session.no_speech_frames, 80);
        assert_eq!(cfg.session.max_utterance_frames, 240);
        assert_eq!(cfg.session.tick_ms, 5);
    }

    /// Verify that modified non-default values survive a round trip.
    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.audio.capture_channel = 1;
        cfg.audio.vad_threshold = 0.03;
        cfg.wake.model_path = Some("/opt/models/hey-echo.rpw".into());
        cfg.wake.threshold = 0.55;
        cfg.server.host = "assistant.local".into();
        cfg.server.port = 8080;
        cfg.session.max_utterance_frames = 500;
        cfg.session.greeting_file = Some("/opt/audio/hello.wav".into());

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.audio.capture_channel, 1);
        assert_eq!(loaded.audio.vad_threshold, 0.03);
        assert_eq!(loaded.wake.model_path, Some("/opt/models/hey-echo.rpw".into()));
        assert_eq!(loaded.wake.threshold, 0.55);
        assert_eq!(loaded.server.host, "assistant.local");
        assert_eq!(loaded.server.port, 8080);
        assert_eq!(loaded.session.max_utterance_frames, 500);
        assert_eq!(loaded.session.greeting_file, Some("/opt/audio/hello.wav".into()));
    }
}
