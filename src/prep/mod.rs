//! Edge preparation: centring pixel edges on the icicle spine and converting
//! them to physical-unit profiles.

pub mod spine;
pub mod units;

pub use spine::*;
pub use units::*;
