//! Session performance reporting.

mod calculator;

pub use calculator::{PerformanceCalculator, SessionReport};
