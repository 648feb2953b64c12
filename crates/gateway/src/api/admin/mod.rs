//! Admin endpoints — health, metrics, system info, workspace introspection.
//!
//! All admin-guarded endpoints use the `AdminGuard` extractor (see `guard.rs`),
//! which enforces the admin bearer token. If unset, endpoints are accessible
//! without auth (dev mode).

mod guard;
mod health;
mod workspace;

pub use guard::AdminGuard;
pub use health::{health, metrics, openapi_spec, restart, save_config, system_info};
pub use workspace::{list_skills_detailed, list_workspace_files};
