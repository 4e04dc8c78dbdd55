//! Command-line parsing for the icicle edge fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the fitting code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::MacroFrequencySeed;
use crate::prep::Orientation;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "icefit", version, about = "Icicle edge profile fitter")]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. info, debug, icicle_fit=trace).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit both edges of an icicle from a `left,right` pixel CSV.
    Fit(FitArgs),
    /// Write a synthetic edge CSV from known parameters.
    Synth(SynthArgs),
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Edge CSV with `left` and `right` pixel columns.
    #[arg(short, long, value_name = "CSV")]
    pub input: PathBuf,

    /// Pixels per unit length.
    #[arg(long, default_value_t = 95.0)]
    pub ppcm: f64,

    /// Spine deviation (pixels) above which a linear spine correction is applied.
    #[arg(long, default_value_t = 5.0)]
    pub spine_threshold: f64,

    /// Row order of the CSV.
    #[arg(long, value_enum, default_value_t = Orientation::BaseFirst)]
    pub orientation: Orientation,

    /// Uniform measurement error (length units); default is half the sampling interval.
    #[arg(long, value_name = "E")]
    pub error: Option<f64>,

    /// Scale covariances by the reduced chi-square instead of treating sigmas as absolute.
    #[arg(long)]
    pub relative_sigma: bool,

    /// Gradient threshold for critical points.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Smoothing resolution (samples) of the amplitude/frequency estimator.
    #[arg(long)]
    pub resolution: Option<usize>,

    /// Number of critical-point pairs to average over.
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Pair critical points over the whole bulk region.
    #[arg(long)]
    pub full_scan: bool,

    /// Return the ripple guesses without the final ripple fit.
    #[arg(long)]
    pub guess_only: bool,

    /// Refit all eight parameters together after the staged fits.
    #[arg(long, conflicts_with = "guess_only")]
    pub refine: bool,

    /// Explicit ripple seed; skips the estimators.
    #[arg(long, value_name = "A,W,PHI", value_parser = parse_triple, allow_hyphen_values = true)]
    pub ripple_seed: Option<[f64; 3]>,

    /// How the macro-oscillation frequency guess is derived.
    #[arg(long, value_enum)]
    pub macro_seed: Option<MacroFrequencySeed>,

    /// JSON fit configuration; flags given here override it.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Export the run (config + both fits) to JSON.
    #[arg(long, value_name = "JSON")]
    pub export: Option<PathBuf>,

    /// Print residual plots.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Write a markdown debug bundle under ./debug.
    #[arg(long)]
    pub debug: bool,
}

#[derive(Debug, Parser, Clone)]
pub struct SynthArgs {
    /// Output CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,

    /// Image rows covered by the icicle.
    #[arg(long, default_value_t = 855)]
    pub rows: usize,

    /// Pixels per unit length.
    #[arg(long, default_value_t = 95.0)]
    pub ppcm: f64,

    /// Gaussian pixel noise (standard deviation).
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Spine drift in columns per row.
    #[arg(long, default_value_t = 0.0)]
    pub lean: f64,

    /// Baseline scale factor `a`.
    #[arg(long, default_value_t = 0.5)]
    pub scale: f64,

    /// Ripple sinusoid.
    #[arg(long, value_name = "A,W,PHI", value_parser = parse_triple, allow_hyphen_values = true, default_value = "0.05,4,0.1")]
    pub ripple: [f64; 3],

    /// Macro sinusoid.
    #[arg(long = "macro", value_name = "A,W,PHI", value_parser = parse_triple, allow_hyphen_values = true, default_value = "0.15,0.6,0.2")]
    pub macro_osc: [f64; 3],

    /// Constant offset.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub offset: f64,
}

/// Parse `A,W,PHI`.
pub fn parse_triple(s: &str) -> Result<[f64; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let [a, w, phi] = parts.as_slice() else {
        return Err(format!("expected three comma-separated numbers, got '{s}'"));
    };
    let parse = |v: &str| v.parse::<f64>().map_err(|e| format!("invalid number '{v}': {e}"));
    Ok([parse(a)?, parse(w)?, parse(phi)?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triple_parses_with_spaces_and_signs() {
        assert_eq!(parse_triple("0.05, 4, -0.1").unwrap(), [0.05, 4.0, -0.1]);
        assert!(parse_triple("1,2").is_err());
        assert!(parse_triple("1,x,3").is_err());
    }

    #[test]
    fn fit_command_parses_flags() {
        let cli = Cli::parse_from([
            "icefit",
            "fit",
            "--input",
            "edges.csv",
            "--ripple-seed",
            "0.05,4,0.1",
            "--macro-seed",
            "profile-length",
            "--guess-only",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.ripple_seed, Some([0.05, 4.0, 0.1]));
        assert_eq!(args.macro_seed, Some(MacroFrequencySeed::ProfileLength));
        assert!(args.guess_only);
        assert!(!args.refine);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn refine_conflicts_with_guess_only() {
        let res = Cli::try_parse_from(["icefit", "fit", "-i", "e.csv", "--refine", "--guess-only"]);
        assert!(res.is_err());
        let cli = Cli::parse_from(["icefit", "fit", "-i", "e.csv", "--refine"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert!(args.refine);
    }

    #[test]
    fn synth_defaults_match_reference_shape() {
        let cli = Cli::parse_from(["icefit", "synth", "-o", "out.csv"]);
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.rows, 855);
        assert_eq!(args.ripple, [0.05, 4.0, 0.1]);
        assert_eq!(args.macro_osc, [0.15, 0.6, 0.2]);
    }
}
