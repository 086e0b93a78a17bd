//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\echo-mate\
//!   macOS:   ~/Library/Application Support/echo-mate/
//!   Linux:   ~/.config/echo-mate/
//!
//! Data dir (wake models + session temp audio):
//!   Windows: %LOCALAPPDATA%\echo-mate\
//!   macOS:   ~/Library/Application Support/echo-mate/
//!   Linux:   ~/.local/share/echo-mate/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for wake word model files.
    pub models_dir: PathBuf,
    /// Scratch recording of the user's utterance, overwritten every turn.
    pub utterance_file: PathBuf,
    /// Scratch copy of the server's spoken reply, overwritten every turn.
    pub reply_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "echo-mate";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let models_dir = data_dir.join("models");
        let utterance_file = data_dir.join("user_input.wav");
        let reply_file = data_dir.join("reply.wav");

        Self {
            config_dir,
            settings_file,
            models_dir,
            utterance_file,
            reply_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
