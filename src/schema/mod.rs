//! Schema module - Configuration, parameter and report types for tuning runs.

mod config;
mod genes;
mod report;

pub use config::*;
pub use genes::*;
pub use report::*;
