//! State announcements for whatever front panel the device has.
//!
//! The session machine reports every state entry and exit through
//! [`DisplayNotifier`]; the default [`LogDisplay`] just logs, which is all a
//! headless build needs.  A hardware build plugs in its own notifier (LED
//! ring, small OLED, ...).

use crate::session::StateKind;

/// Sink for conversation state changes.
pub trait DisplayNotifier: Send {
    /// Called after the session enters `state`.
    fn state_entered(&mut self, state: StateKind);

    /// Called just before the session leaves `state`.
    fn state_exited(&mut self, state: StateKind);

    /// Called when a reply transcript is available for display.
    fn reply_text(&mut self, _text: &str) {}
}

/// Logging-only notifier.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl DisplayNotifier for LogDisplay {
    fn state_entered(&mut self, state: StateKind) {
        log::info!("state: -> {}", state.label());
    }

    fn state_exited(&mut self, state: StateKind) {
        log::debug!("state: <- {}", state.label());
    }

    fn reply_text(&mut self, text: &str) {
        if !text.is_empty() {
            log::info!("reply: {text}");
        }
    }
}
