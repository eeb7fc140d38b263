//! Utility functions and helpers
//!
//! This module contains timestamp, HTTP-date and atomic-write helpers.

pub mod atomic;
pub mod time;

pub use atomic::atomic_write;
pub use time::{age, epoch_millis, http_date, parse_http_date, truncate_to_secs};
