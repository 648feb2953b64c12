//! In-process hybrid (lexical + vector) memory engine for Warden agents.
//!
//! Documents are chunked on paragraph boundaries, indexed both lexically
//! (BM25) and — when an embedding provider is configured — as vectors, and
//! retrieved through a weighted hybrid merge. Change detection skips
//! re-indexing unchanged content by comparing content hashes, and a
//! debounced polling watcher bumps a version counter when a tracked
//! directory's files change.

pub mod chunker;
pub mod context;
pub mod embedding_cache;
pub mod lexical;
pub mod search;
pub mod store;
pub mod watcher;

pub use context::MemoryContextBuilder;
pub use search::{hybrid_search, SearchHit};
pub use store::MemoryStore;
pub use watcher::{spawn_watcher, WatchVersion};
