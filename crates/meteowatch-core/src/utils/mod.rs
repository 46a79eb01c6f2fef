//! Utility functions for display formatting.

pub mod format;

pub use format::{format_clock, format_remaining, format_temperature, truncate_string};
