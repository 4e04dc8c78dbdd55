//! Shared icicle pipeline used by `icefit fit` and the integration tests.
//!
//! pixel edges -> spine centring -> profiles -> both edges fitted in
//! parallel -> `IcicleFit`
//!
//! Each edge carries its own observers; their output is handed back to the
//! caller instead of being printed from the worker threads.

use tracing::info;

use crate::debug::DebugRecorder;
use crate::domain::{EdgeFit, EdgeProfile, EdgeSide, FitConfig, IcicleFit};
use crate::error::AppError;
use crate::fit::fit_edge_observed;
use crate::plot::TerminalPlotObserver;
use crate::prep::{build_profile, normalize_spine, UnitConversion};
use crate::report::profile_rms;

/// Everything that shapes one run besides the edges themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub conversion: UnitConversion,
    /// Spine deviation (pixels) above which the spine is line-corrected.
    pub spine_threshold: f64,
    pub config: FitConfig,
    /// Terminal plot size `(width, height)`; `None` disables plotting.
    pub plot: Option<(usize, usize)>,
    pub debug: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            conversion: UnitConversion::default(),
            spine_threshold: 5.0,
            config: FitConfig::default(),
            plot: None,
            debug: false,
        }
    }
}

/// Result and diagnostics of one edge.
#[derive(Debug, Clone)]
pub struct SideOutput {
    pub side: EdgeSide,
    pub samples: usize,
    /// RMS of profile minus fitted response.
    pub rms: f64,
    pub plots: Option<TerminalPlotObserver>,
    pub debug: Option<DebugRecorder>,
}

/// All computed outputs of a single `icefit fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub fit: IcicleFit,
    pub spine_corrected: bool,
    pub left: SideOutput,
    pub right: SideOutput,
}

/// Run the full pipeline on raw pixel edges.
pub fn run_icicle(left: &[f64], right: &[f64], options: &PipelineOptions) -> Result<RunOutput, AppError> {
    let centered = normalize_spine(left, right, options.spine_threshold)?;
    let left_profile = build_profile(&centered.left, &options.conversion)?;
    let right_profile = build_profile(&centered.right, &options.conversion)?;

    let (left_result, right_result) = rayon::join(
        || fit_side(EdgeSide::Left, &left_profile, options),
        || fit_side(EdgeSide::Right, &right_profile, options),
    );
    let (left_fit, left) = left_result?;
    let (right_fit, right) = right_result?;

    let length = last_z(&left_profile).max(last_z(&right_profile));
    Ok(RunOutput {
        fit: IcicleFit {
            left: left_fit,
            right: right_fit,
            length,
        },
        spine_corrected: centered.corrected,
        left,
        right,
    })
}

/// Fit one edge profile with the observers requested in `options`.
pub fn fit_side(
    side: EdgeSide,
    profile: &EdgeProfile,
    options: &PipelineOptions,
) -> Result<(EdgeFit, SideOutput), AppError> {
    let mut observers = (
        options.plot.map(|(w, h)| TerminalPlotObserver::new(w, h)),
        options.debug.then(DebugRecorder::new),
    );

    let fit = fit_edge_observed(profile, &options.config, &mut observers)
        .map_err(|e| AppError::new(e.exit_code(), format!("{} edge: {e}", side.display_name())))?;

    let rms = profile_rms(profile, &fit.parameters);
    let p = &fit.parameters;
    info!(
        side = side.display_name(),
        a = p.scale,
        ripple_amplitude = p.ripple_amplitude,
        ripple_frequency = p.ripple_frequency,
        rms,
        "edge fitted"
    );

    let (plots, debug) = observers;
    Ok((
        fit,
        SideOutput {
            side,
            samples: profile.len(),
            rms,
            plots,
            debug,
        },
    ))
}

fn last_z(profile: &EdgeProfile) -> f64 {
    profile.z().last().copied().unwrap_or(0.0)
}
