//! Output module for reporting on harvested data
//!
//! This module handles:
//! - Loading per-category record counts and the latest run from storage
//! - Printing them as a human-readable report

pub mod stats;

pub use stats::{load_statistics, print_statistics, HarvestStatistics};
