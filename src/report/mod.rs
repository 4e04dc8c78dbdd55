//! Reporting utilities: fit quality and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{EdgeParams, EdgeProfile};
use crate::models::edge_response;

/// Root-mean-square of measured minus fitted edge position.
pub fn profile_rms(profile: &EdgeProfile, params: &EdgeParams) -> f64 {
    let sse: f64 = profile
        .z()
        .iter()
        .zip(profile.position())
        .map(|(&z, &y)| {
            let r = y - edge_response(z, params);
            r * r
        })
        .sum();
    (sse / profile.len() as f64).sqrt()
}
