//! Staged edge fitting.
//!
//! Responsibilities:
//!
//! - fit the distilled-water baseline and the macro oscillation
//! - estimate ripple amplitude, frequency and phase from residual extrema
//! - fit the ripple and assemble the 8-element result
//! - optionally refit all eight parameters together

pub mod amplitude;
pub mod baseline;
pub mod edge;
pub mod macro_osc;
pub mod observer;
pub mod phase;
pub mod refine;
pub mod residual;
pub mod ripple;

pub use amplitude::*;
pub use baseline::*;
pub use edge::*;
pub use macro_osc::*;
pub use observer::*;
pub use phase::*;
pub use refine::*;
pub use residual::*;
pub use ripple::*;
