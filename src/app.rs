//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and installs logging
//! - assembles the fit configuration (JSON file, then flags)
//! - runs the icicle pipeline
//! - prints reports/plots
//! - writes optional exports and debug bundles

use clap::Parser;
use tracing::{info, warn};

use crate::cli::{Cli, Command, FitArgs, SynthArgs};
use crate::data::{generate_edges, SyntheticIcicle};
use crate::debug::write_debug_bundle;
use crate::domain::{EdgeParams, FitConfig, MeasurementError, RippleGuess};
use crate::error::AppError;
use crate::io::{load_edges, read_fit_config, write_edges_csv, write_run_json, RunFile};
use crate::prep::UnitConversion;
use crate::report::format_run_summary;

pub mod pipeline;

use pipeline::{run_icicle, PipelineOptions};

/// Entry point for the `icefit` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    crate::logging::init_logging(&cli.log_level)?;

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Synth(args) => handle_synth(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let options = pipeline_options_from_args(&args)?;
    let rows = load_edges(&args.input)?;
    info!(input = %args.input.display(), rows = rows.left.len(), "edges loaded");

    let run = run_icicle(&rows.left, &rows.right, &options).inspect_err(|e| warn!(error = %e, "icicle fit failed"))?;

    println!("{}", format_run_summary(Some(&args.input), Some(&rows), &run));

    for side in [&run.left, &run.right] {
        if let Some(plots) = &side.plots {
            println!("--- {} edge ---", side.side.display_name());
            println!("{}", plots.plots().join("\n"));
        }
    }

    if options.debug {
        let sides: Vec<_> = [&run.left, &run.right]
            .into_iter()
            .filter_map(|s| s.debug.as_ref().map(|d| (s.side, d)))
            .collect();
        let path = write_debug_bundle(Some(&args.input), &options.config, &sides)?;
        println!("Debug bundle: {}", path.display());
    }

    if let Some(path) = &args.export {
        let file = RunFile::new(
            Some(args.input.clone()),
            options.conversion,
            options.spine_threshold,
            options.config.clone(),
            run.fit,
        );
        write_run_json(path, &file)?;
        info!(path = %path.display(), "run exported");
    }

    Ok(())
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let icicle = synthetic_icicle_from_args(&args);
    let edges = generate_edges(&icicle)?;
    write_edges_csv(&args.output, &edges.left, &edges.right)?;
    info!(path = %args.output.display(), rows = icicle.rows, noise = icicle.noise, "synthetic edges written");
    println!("Wrote {} rows to {}", icicle.rows, args.output.display());
    Ok(())
}

pub fn pipeline_options_from_args(args: &FitArgs) -> Result<PipelineOptions, AppError> {
    Ok(PipelineOptions {
        conversion: UnitConversion {
            ppcm: args.ppcm,
            orientation: args.orientation,
            ..UnitConversion::default()
        },
        spine_threshold: args.spine_threshold,
        config: fit_config_from_args(args)?,
        plot: args.plot.then_some((args.width, args.height)),
        debug: args.debug,
    })
}

/// Config file (or defaults), then individual flags on top.
pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => read_fit_config(path)?,
        None => FitConfig::default(),
    };

    if let Some(e) = args.error {
        config.measurement_error = Some(MeasurementError::Uniform(e));
    }
    if args.relative_sigma {
        config.absolute_sigma = false;
    }
    if let Some(t) = args.threshold {
        config.amplitude_threshold = t;
    }
    if let Some(r) = args.resolution {
        config.smoothing_resolution = r;
    }
    if let Some(n) = args.iterations {
        config.iteration_cap = n;
    }
    if args.full_scan {
        config.full_scan = true;
    }
    if args.guess_only {
        config.oscillation_fit = false;
    }
    if args.refine {
        config.refine = true;
    }
    if let Some([amplitude, frequency, phase]) = args.ripple_seed {
        config.ripple_seed = Some(RippleGuess {
            amplitude,
            frequency,
            phase,
        });
    }
    if let Some(seed) = args.macro_seed {
        config.macro_frequency_seed = seed;
    }

    Ok(config)
}

pub fn synthetic_icicle_from_args(args: &SynthArgs) -> SyntheticIcicle {
    let [ra, rw, rphi] = args.ripple;
    let [ma, mw, mphi] = args.macro_osc;
    let params = EdgeParams::from_array([ra, rw, rphi, args.scale, ma, mw, mphi, args.offset]);
    SyntheticIcicle {
        rows: args.rows,
        conversion: UnitConversion {
            ppcm: args.ppcm,
            ..UnitConversion::default()
        },
        left: params,
        right: params,
        lean: args.lean,
        noise: args.noise,
        seed: args.seed,
        ..SyntheticIcicle::reference()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_args(extra: &[&str]) -> FitArgs {
        let mut argv = vec!["icefit", "fit", "--input", "edges.csv"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Command::Fit(args) => args,
            Command::Synth(_) => panic!("expected fit"),
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = fit_config_from_args(&fit_args(&[
            "--threshold",
            "0.03",
            "--guess-only",
            "--relative-sigma",
            "--error",
            "0.02",
        ]))
        .unwrap();
        assert_eq!(config.amplitude_threshold, 0.03);
        assert!(!config.oscillation_fit);
        assert!(!config.absolute_sigma);
        assert_eq!(config.measurement_error, Some(MeasurementError::Uniform(0.02)));
        assert_eq!(config.smoothing_resolution, 3);
        assert!(!config.refine);

        let config = fit_config_from_args(&fit_args(&["--refine"])).unwrap();
        assert!(config.refine && config.oscillation_fit);
    }

    #[test]
    fn plot_size_only_when_requested() {
        let off = pipeline_options_from_args(&fit_args(&[])).unwrap();
        assert_eq!(off.plot, None);
        let on = pipeline_options_from_args(&fit_args(&["--plot", "--width", "60"])).unwrap();
        assert_eq!(on.plot, Some((60, 25)));
    }

    #[test]
    fn synth_args_build_reference_shape() {
        let args = match Cli::parse_from(["icefit", "synth", "-o", "x.csv"]).command {
            Command::Synth(args) => args,
            Command::Fit(_) => panic!("expected synth"),
        };
        assert_eq!(synthetic_icicle_from_args(&args), SyntheticIcicle::reference());
    }
}
