//! The `DialogueSession` state machine.
//!
//! One instance drives one wake-to-goodbye conversation:
//!
//! ```text
//! Idle ──wake──▶ Listening ──utterance done──▶ Thinking ──reply──▶ Speaking
//!                    ▲                                                │
//!                    └───────────── exit flag unset ──────────────────┘
//!                                   exit flag set ──▶ (terminated)
//! ```
//!
//! The machine is advanced by [`step`](DialogueSession::step), called on the
//! supervisor's tick.  A step never blocks the engine's worker threads; it
//! may block the foreground briefly (the upload await, the playback
//! throttle) because the system has a single foreground control flow.
//!
//! Errors degrade, never abort: a failed recording still uploads whatever
//! file exists, a failed upload or fetch becomes a silent Speaking turn.

use std::sync::Arc;

use crate::audio::{is_voice, AudioEngine};
use crate::config::AppConfig;
use crate::display::DisplayNotifier;
use crate::net::DialogueTransport;
use crate::session::state::{SessionContext, SessionState, StateKind};
use crate::wake::WakeWordDetector;

/// Everything a session consumes, bundled so the supervisor can hand it over
/// wholesale.
pub struct SessionServices {
    pub engine: Arc<AudioEngine>,
    pub wake: Box<dyn WakeWordDetector>,
    pub transport: Arc<dyn DialogueTransport>,
    pub display: Box<dyn DisplayNotifier>,
    pub config: AppConfig,
}

/// Outcome of a single tick.
enum Step {
    /// Remain in the current state.
    Stay,
    /// Transition to another state (exit/enter effects apply).
    To(SessionState),
    /// The conversation is over; the machine produces no next state.
    End,
}

// ---------------------------------------------------------------------------
// DialogueSession
// ---------------------------------------------------------------------------

/// Four-state conversation machine.  See the module docs for the cycle.
pub struct DialogueSession {
    services: SessionServices,
    ctx: SessionContext,
    /// `None` once the session has terminated.
    state: Option<SessionState>,
    /// Reply playback runs on a blocking task (the file read throttles on
    /// the playback queue); Speaking waits for it before checking the queue.
    playback_task: Option<tokio::task::JoinHandle<()>>,
}

impl DialogueSession {
    /// Build a session starting in Idle (entry effects applied).
    pub fn new(services: SessionServices, ctx: SessionContext) -> Self {
        let mut session = Self {
            services,
            ctx,
            state: None,
            playback_task: None,
        };
        session.enter(SessionState::Idle);
        session
    }

    /// Current state, `None` after termination.
    pub fn state_kind(&self) -> Option<StateKind> {
        self.state.as_ref().map(SessionState::kind)
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Return a terminated session to a fresh Idle, clearing conversation
    /// state and removing the previous turn's scratch files.
    pub fn reset(&mut self) {
        if let Some(task) = self.playback_task.take() {
            task.abort();
        }
        self.ctx.reset();
        for path in [&self.ctx.utterance_path, &self.ctx.reply_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    log::debug!("session: could not remove {}: {e}", path.display());
                }
            }
        }
        self.state = None;
        self.enter(SessionState::Idle);
    }

    /// Advance the machine by one tick.  Returns `false` once the session
    /// has terminated (and on every call thereafter).
    pub async fn step(&mut self) -> bool {
        let Some(mut state) = self.state.take() else {
            return false;
        };

        let step = match &mut state {
            SessionState::Idle => self.tick_idle(),
            SessionState::Listening {
                frames_seen,
                silent_frames,
                speech_started,
            } => {
                let (f, s, sp) = (*frames_seen, *silent_frames, *speech_started);
                let (step, f, s, sp) = self.tick_listening(f, s, sp);
                (*frames_seen, *silent_frames, *speech_started) = (f, s, sp);
                step
            }
            SessionState::Thinking => self.tick_thinking().await,
            SessionState::Speaking { .. } => self.tick_speaking(),
        };

        match step {
            Step::Stay => {
                self.state = Some(state);
                true
            }
            Step::To(next) => {
                self.exit(&state);
                self.enter(next);
                true
            }
            Step::End => {
                self.exit(&state);
                log::info!("session: conversation ended");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-state ticks
    // -----------------------------------------------------------------------

    /// Drain every available frame through the wake detector.
    fn tick_idle(&mut self) -> Step {
        while let Some(frame) = self.services.engine.get_frame() {
            let hit = self.services.wake.detect(frame.samples());
            if hit > 0 {
                log::info!("session: wake word {hit} detected");
                return Step::To(SessionState::listening());
            }
            if hit < 0 {
                // Detector errors count as "no detection this tick".
                log::debug!("session: wake detector error {hit}");
            }
        }
        Step::Stay
    }

    /// Consume at most one frame, update the VAD counters, decide whether
    /// the utterance is over.
    fn tick_listening(
        &mut self,
        mut frames_seen: u32,
        mut silent_frames: u32,
        mut speech_started: bool,
    ) -> (Step, u32, u32, bool) {
        let Some(frame) = self.services.engine.get_frame() else {
            return (Step::Stay, frames_seen, silent_frames, speech_started);
        };

        frames_seen += 1;
        if is_voice(frame.samples(), self.services.config.audio.vad_threshold) {
            speech_started = true;
            silent_frames = 0;
        } else if speech_started {
            silent_frames += 1;
        }

        let pacing = &self.services.config.session;
        let utterance_over = (speech_started && silent_frames >= pacing.trailing_silence_frames)
            || frames_seen >= pacing.max_utterance_frames
            || (!speech_started && frames_seen >= pacing.no_speech_frames);

        let step = if utterance_over {
            log::info!(
                "session: utterance ended ({frames_seen} frames, speech_started={speech_started})"
            );
            Step::To(SessionState::Thinking)
        } else {
            Step::Stay
        };
        (step, frames_seen, silent_frames, speech_started)
    }

    /// Upload the utterance and fetch the reply audio.
    ///
    /// Every failure path degrades to a silent Speaking turn; the loop stays
    /// bounded because nothing here retries.
    async fn tick_thinking(&mut self) -> Step {
        let reply = match self
            .services
            .transport
            .send_utterance(&self.ctx.utterance_path)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("session: upload failed: {e}");
                return Step::To(SessionState::Speaking { has_audio: false });
            }
        };

        self.ctx.should_exit = reply.end_session;
        self.ctx.last_reply_text = reply.text.clone();
        self.services.display.reply_text(&reply.text);

        let Some(audio_url) = reply.audio_url else {
            return Step::To(SessionState::Speaking { has_audio: false });
        };

        match self
            .services
            .transport
            .fetch_reply_audio(&audio_url, &self.ctx.reply_path)
            .await
        {
            Ok(()) => Step::To(SessionState::Speaking { has_audio: true }),
            Err(e) => {
                log::warn!("session: reply audio fetch failed: {e}");
                Step::To(SessionState::Speaking { has_audio: false })
            }
        }
    }

    /// Wait for the reply to finish playing, then loop or terminate.
    ///
    /// "Finished" means the file feeder has queued its last frame *and* the
    /// playback queue has drained, not a guessed duration.
    fn tick_speaking(&mut self) -> Step {
        if let Some(task) = &self.playback_task {
            if !task.is_finished() {
                return Step::Stay;
            }
            self.playback_task = None;
        }
        if self.services.engine.is_playing() {
            return Step::Stay;
        }

        if self.ctx.should_exit {
            Step::End
        } else {
            Step::To(SessionState::listening())
        }
    }

    // -----------------------------------------------------------------------
    // Transition effects
    // -----------------------------------------------------------------------

    fn enter(&mut self, state: SessionState) {
        self.services.display.state_entered(state.kind());
        match &state {
            SessionState::Idle => {
                self.services.engine.clear_buffer();
            }
            SessionState::Listening { .. } => {
                // Drop the tail of the wake word (or of the previous reply)
                // before recording.
                self.services.engine.clear_buffer();
                if let Err(e) = self.services.engine.save_start(&self.ctx.utterance_path) {
                    // The session proceeds; Thinking uploads whatever file
                    // exists, possibly nothing.
                    log::warn!("session: could not start recording: {e}");
                }
            }
            SessionState::Thinking => {}
            SessionState::Speaking { has_audio } => {
                if *has_audio {
                    let engine = Arc::clone(&self.services.engine);
                    let path = self.ctx.reply_path.clone();
                    self.playback_task = Some(tokio::task::spawn_blocking(move || {
                        if let Err(e) = engine.play_file(&path) {
                            log::warn!("session: reply playback failed: {e}");
                        }
                    }));
                } else {
                    log::info!("session: silent turn (no reply audio)");
                }
            }
        }
        self.state = Some(state);
    }

    fn exit(&mut self, state: &SessionState) {
        if let SessionState::Listening { .. } = state {
            if let Err(e) = self.services.engine.save_stop() {
                log::warn!("session: could not finalise recording: {e}");
            }
        }
        self.services.display.state_exited(state.kind());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
