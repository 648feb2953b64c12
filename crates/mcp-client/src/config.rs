//! MCP configuration types — re-exported from `wd-domain`.
//!
//! The canonical definitions live in `wd_domain::config` so that the
//! gateway config deserializer can include them without depending on
//! the full MCP client crate.

pub use wd_domain::config::{McpConfig, McpServerConfig, McpTransportKind};
