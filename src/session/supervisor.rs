//! The outer loop that keeps the assistant alive.
//!
//! Owns the one [`DialogueSession`] and advances it on a fixed tick.  When a
//! conversation terminates (the server said goodbye), the session is reset
//! back to Idle wake-word scanning instead of being torn down: the engine
//! and its hardware handles live for the whole process.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::audio::AudioEngine;
use crate::session::machine::{DialogueSession, SessionServices};
use crate::session::state::SessionContext;

pub struct SessionSupervisor {
    session: DialogueSession,
    engine: Arc<AudioEngine>,
    tick: Duration,
    greeting: Option<String>,
}

impl SessionSupervisor {
    pub fn new(services: SessionServices, ctx: SessionContext) -> Self {
        let engine = Arc::clone(&services.engine);
        let tick = Duration::from_millis(services.config.session.tick_ms.max(1));
        let greeting = services.config.session.greeting_file.clone();
        Self {
            session: DialogueSession::new(services, ctx),
            engine,
            tick,
            greeting,
        }
    }

    /// Run forever (until the task is cancelled, e.g. by Ctrl-C in `main`).
    pub async fn run(&mut self) {
        self.play_greeting().await;

        loop {
            let alive = self.session.step().await;
            if !alive {
                log::info!("supervisor: conversation over; rescanning for wake word");
                self.session.reset();
            }
            tokio::time::sleep(self.tick).await;
        }
    }

    /// Play the configured greeting once at startup and wait for it to
    /// finish, so the wake scan does not hear the device's own voice.
    async fn play_greeting(&self) {
        let Some(greeting) = self.greeting.clone() else {
            return;
        };
        log::info!("supervisor: playing greeting {greeting}");

        let engine = Arc::clone(&self.engine);
        let feeder = tokio::task::spawn_blocking(move || engine.play_file(Path::new(&greeting)));
        match feeder.await {
            Ok(Ok(_frames)) => {
                while self.engine.is_playing() {
                    tokio::time::sleep(self.tick).await;
                }
                self.engine.clear_buffer();
            }
            Ok(Err(e)) => log::warn!("supervisor: greeting playback failed: {e}"),
            Err(e) => log::warn!("supervisor: greeting task failed: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
