//! Session management for Warden agents.
//!
//! Gateway-owned session state keyed by `session_key` (`agent:<agent_id>:
//! <suffix>`, supplied by the caller on every `RunRequest`), append-only
//! JSONL transcripts, and a configurable daily/idle reset lifecycle.

pub mod lifecycle;
pub mod store;
pub mod transcript;

pub use lifecycle::{LifecycleManager, ResetReason};
pub use store::SessionStore;
pub use transcript::{TranscriptLine, TranscriptWriter};
