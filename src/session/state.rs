//! Conversation states and the per-session shared context.

use std::path::PathBuf;

use crate::config::AppPaths;

// ---------------------------------------------------------------------------
// StateKind
// ---------------------------------------------------------------------------

/// Discriminant of [`SessionState`], used for display notifications and
/// logging where the per-state payload is irrelevant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Idle,
    Listening,
    Thinking,
    Speaking,
}

impl StateKind {
    pub fn label(self) -> &'static str {
        match self {
            StateKind::Idle => "idle",
            StateKind::Listening => "listening",
            StateKind::Thinking => "thinking",
            StateKind::Speaking => "speaking",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The four conversation states.
///
/// A closed variant rather than trait objects: the transition table lives in
/// one `match` and the compiler checks it is exhaustive.  Per-state counters
/// travel inside the variant so a fresh entry always starts from zero.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Passively scanning captured frames for the wake word.
    Idle,
    /// Recording an utterance, watching VAD for its end.
    Listening {
        /// Frames consumed since entering the state.
        frames_seen: u32,
        /// Consecutive silent frames since the last voiced frame.
        silent_frames: u32,
        /// Whether any voiced frame has been observed yet.
        speech_started: bool,
    },
    /// Utterance round-trip with the dialogue server.
    Thinking,
    /// Draining the reply through the playback queue.
    Speaking {
        /// `false` when the turn produced no reply audio (silent turn).
        has_audio: bool,
    },
}

impl SessionState {
    /// A fresh Listening state with zeroed counters.
    pub fn listening() -> Self {
        Self::Listening {
            frames_seen: 0,
            silent_frames: 0,
            speech_started: false,
        }
    }

    pub fn kind(&self) -> StateKind {
        match self {
            SessionState::Idle => StateKind::Idle,
            SessionState::Listening { .. } => StateKind::Listening,
            SessionState::Thinking => StateKind::Thinking,
            SessionState::Speaking { .. } => StateKind::Speaking,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// Shared mutable state of one conversation, owned by the state machine.
///
/// Exactly one instance exists per active session; every state reads and
/// writes it through the machine.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Where the current utterance is being recorded.
    pub utterance_path: PathBuf,
    /// Where the server's reply audio is fetched to.
    pub reply_path: PathBuf,
    /// Transcript of the most recent reply, for display.
    pub last_reply_text: String,
    /// Set when the server signalled the end of the conversation; checked
    /// once Speaking has drained.
    pub should_exit: bool,
}

impl SessionContext {
    pub fn new(utterance_path: PathBuf, reply_path: PathBuf) -> Self {
        Self {
            utterance_path,
            reply_path,
            last_reply_text: String::new(),
            should_exit: false,
        }
    }

    pub fn from_paths(paths: &AppPaths) -> Self {
        Self::new(paths.utterance_file.clone(), paths.reply_file.clone())
    }

    /// Clear per-conversation state for a fresh session; the scratch paths
    /// are kept.
    pub fn reset(&mut self) {
        self.last_reply_text.clear();
        self.should_exit = false;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listening_starts_with_zeroed_counters() {
        assert_eq!(
            SessionState::listening(),
            SessionState::Listening {
                frames_seen: 0,
                silent_frames: 0,
                speech_started: false,
            }
        );
    }

    #[test]
    fn kinds_and_labels() {
        assert_eq!(SessionState::Idle.kind().label(), "idle");
        assert_eq!(SessionState::listening().kind().label(), "listening");
        assert_eq!(SessionState::Thinking.kind().label(), "thinking");
        assert_eq!(
            SessionState::Speaking { has_audio: true }.kind().label(),
            "speaking"
        );
    }

    #[test]
    fn reset_clears_conversation_state_but_keeps_paths() {
        let mut ctx = SessionContext::new("a.wav".into(), "b.wav".into());
        ctx.last_reply_text = "goodbye".into();
        ctx.should_exit = true;

        ctx.reset();

        assert!(ctx.last_reply_text.is_empty());
        assert!(!ctx.should_exit);
        assert_eq!(ctx.utterance_path, PathBuf::from("a.wav"));
        assert_eq!(ctx.reply_path, PathBuf::from("b.wav"));
    }
}
