//! `icicle-fit` library crate.
//!
//! The binary (`icefit`) is a thin wrapper around this library so that:
//!
//! - the staged edge fit is testable without spawning processes
//! - the core (`fit`, `math`, `models`) can be embedded without the CLI
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod debug;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod prep;
pub mod report;
