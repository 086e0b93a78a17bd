//! Dialogue server transport: utterance upload, reply parsing, and reply
//! audio retrieval.

pub mod client;
pub mod reply;

pub use client::{DialogueTransport, HttpDialogueClient, TransportError};
pub use reply::DialogueReply;
