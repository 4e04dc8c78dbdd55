//! Input data sources.
//!
//! Real edges come from CSV files (`crate::io::ingest`); this module provides
//! synthetic icicles with known parameters for demos and tests.

pub mod sample;

pub use sample::*;
