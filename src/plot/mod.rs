//! Terminal plots of intermediate residuals.

pub mod ascii;
pub mod observer;

pub use ascii::*;
pub use observer::*;
