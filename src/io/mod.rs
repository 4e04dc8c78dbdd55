//! Input/output helpers.
//!
//! - edge CSV read/write (`ingest`)
//! - run JSON export (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
