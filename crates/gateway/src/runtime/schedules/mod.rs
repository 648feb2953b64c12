//! Timezone-aware cron evaluation and input validation shared by the
//! [`crate::cron::CronService`] tick loop and its CRUD API.
//!
//! Split into submodules:
//! - [`cron`] — cron expression parsing and next-fire computation
//! - [`validation`] — input validation (cron expressions, timezones)

pub mod cron;
pub mod validation;

pub use cron::{cron_matches, cron_next, cron_next_n, cron_next_n_tz, cron_next_tz, parse_tz};
pub use validation::{validate_cron, validate_timezone};
