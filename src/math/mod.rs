//! Numerical building blocks: bounded least squares, smoothing, derivatives.

pub mod diff;
pub mod lm;
pub mod ols;
pub mod smooth;
pub mod stats;

pub use diff::*;
pub use lm::*;
pub use ols::*;
pub use smooth::*;
pub use stats::*;
