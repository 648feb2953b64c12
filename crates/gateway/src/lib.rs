//! Warden gateway: HTTP API, turn runtime, and CLI for the agentic
//! AI gateway binary (`wardend`).

#![recursion_limit = "256"]

pub mod announce;
pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod cron;
pub mod guard;
pub mod pruning;
pub mod router;
pub mod runtime;
pub mod scheduler;
pub mod state;
pub mod subagent;
pub mod tools;
pub mod tracing_collector;
pub mod workspace;
