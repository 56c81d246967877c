//! Utility functions for formatting digest text.

pub mod format;

pub use format::{format_age, format_date};
