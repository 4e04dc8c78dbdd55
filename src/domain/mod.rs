//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the validated input profile (`EdgeProfile`)
//! - intermediate stage outputs (`StageFit`, `ResidualSeries`, `CriticalPoint`)
//! - fit outputs (`EdgeParams`, `EdgeFit`, `IcicleFit`) and `FitConfig`

pub mod types;

pub use types::*;
