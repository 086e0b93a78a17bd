//! Conversation control: the state machine, its shared context, and the
//! outer supervisor loop.

pub mod machine;
pub mod state;
pub mod supervisor;

pub use machine::{DialogueSession, SessionServices};
pub use state::{SessionContext, SessionState, StateKind};
pub use supervisor::SessionSupervisor;
