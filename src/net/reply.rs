//! The dialogue server's reply payload.

use serde::Deserialize;

/// Parsed body of a `/chat` response.
///
/// The server's schema has grown over time, so parsing is lenient: every
/// field is optional and a malformed body degrades to the default reply
/// (no text, no audio, session continues) rather than failing the turn.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DialogueReply {
    /// Reply transcript, for display and logging.
    pub text: String,
    /// Server-relative reference to the spoken reply audio (e.g.
    /// `/get_audio/reply.wav`).  `None` means a silent turn.
    pub audio_url: Option<String>,
    /// When `true` the server is ending the conversation after this reply.
    pub end_session: bool,
}

impl DialogueReply {
    /// Parse a response body, degrading to [`Default`] on malformed JSON.
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str(body) {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("reply: malformed body ({e}); treating as silent turn");
                Self::default()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
