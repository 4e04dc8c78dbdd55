//! Debug bundle writer for inspecting intermediate stages of an edge fit.
//!
//! [`DebugRecorder`] is a stage observer that turns every report into a
//! markdown section; [`write_debug_bundle`] writes the sections of both
//! edges to `debug/icefit_debug_<timestamp>.md`.

use std::fs::{create_dir_all, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::{EdgeParams, EdgeSide, FitConfig, ResidualSeries};
use crate::error::AppError;
use crate::fit::{StageObserver, StageReport};

/// Rows of the residual tables are thinned to about this many.
const MAX_TABLE_ROWS: usize = 40;

#[derive(Debug, Clone, Default)]
pub struct DebugRecorder {
    sections: Vec<String>,
}

impl DebugRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sections(&self) -> &[String] {
        &self.sections
    }
}

impl StageObserver for DebugRecorder {
    fn on_stage(&mut self, report: &StageReport<'_>) {
        let section = match *report {
            StageReport::Baseline { fit, residual } => {
                let mut s = String::from("### Baseline\n");
                s.push_str(&format!("- a: {:.6} ± {:.6}\n", fit.params[0], fit.std_error(0)));
                s.push_str(&format!("- residual sigma: {:.6}\n", residual.sigma()));
                s.push_str(&residual_table(residual));
                s
            }
            StageReport::Macro { fit, residual } => {
                let mut s = String::from("### Macro oscillation\n");
                s.push_str("| param | value | std |\n| - | - | - |\n");
                for (i, label) in ["A", "w", "phi", "C"].iter().enumerate() {
                    s.push_str(&format!("| {label} | {:.6} | {:.6} |\n", fit.params[i], fit.std_error(i)));
                }
                s.push_str(&format!("- residual sigma: {:.6}\n", residual.sigma()));
                s.push_str(&residual_table(residual));
                s
            }
            StageReport::Guess {
                amplitude_frequency: af,
                phase,
            } => {
                let mut s = String::from("### Ripple guess\n");
                s.push_str(&format!("- amplitude: {:.6} (std {:.6})\n", af.amplitude, af.amplitude_std));
                s.push_str(&format!("- frequency: {:.6} (std {:.6})\n", af.frequency, af.frequency_std));
                s.push_str(&format!("- phase: {phase:.6}\n"));
                s.push_str("\n| first | curvature | second | curvature |\n| - | - | - | - |\n");
                for (a, b) in &af.pairs {
                    s.push_str(&format!(
                        "| {} | {:?} | {} | {:?} |\n",
                        a.index, a.curvature, b.index, b.curvature
                    ));
                }
                s
            }
            StageReport::Ripple {
                params,
                uncertainties,
                bulk,
                fitted,
            } => {
                let mut s = format!("### Ripple ({})\n", if fitted { "fit" } else { "guess only" });
                s.push_str(&format!("- bulk: {} samples from z = {:.4}\n", bulk.len(), bulk.z().first().copied().unwrap_or(f64::NAN)));
                s.push_str(&format!("- A: {:.6} ± {:.6}\n", params.amplitude, uncertainties[0]));
                s.push_str(&format!("- w: {:.6} ± {:.6}\n", params.frequency, uncertainties[1]));
                s.push_str(&format!("- phi: {:.6} ± {:.6}\n", params.phase, uncertainties[2]));
                s
            }
            StageReport::Refine { fit, residual } => {
                let mut s = String::from("### Joint refinement\n");
                s.push_str("| param | value | std |\n| - | - | - |\n");
                for (i, label) in EdgeParams::LABELS.iter().enumerate() {
                    s.push_str(&format!("| {label} | {:.6} | {:.6} |\n", fit.params[i], fit.std_error(i)));
                }
                s.push_str(&residual_table(residual));
                s
            }
        };
        self.sections.push(section);
    }
}

/// Write a bundle for both edges under `./debug`.
pub fn write_debug_bundle(
    input: Option<&Path>,
    config: &FitConfig,
    sides: &[(EdgeSide, &DebugRecorder)],
) -> Result<PathBuf, AppError> {
    write_debug_bundle_in(Path::new("debug"), input, config, sides)
}

pub fn write_debug_bundle_in(
    dir: &Path,
    input: Option<&Path>,
    config: &FitConfig,
    sides: &[(EdgeSide, &DebugRecorder)],
) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(2, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("icefit_debug_{ts}.md"));

    let mut file = File::create(&path).map_err(|e| AppError::new(2, format!("Failed to create debug file: {e}")))?;

    let input = input.map(|p| p.display().to_string()).unwrap_or_else(|| "-".to_string());
    let config_json = serde_json::to_string_pretty(config)
        .map_err(|e| AppError::new(2, format!("Failed to serialize fit config: {e}")))?;

    writeln!(file, "# icefit debug bundle").map_err(|e| AppError::new(2, format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- generated: {}", Local::now().to_rfc3339())
        .map_err(|e| AppError::new(2, format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- input: {input}").map_err(|e| AppError::new(2, format!("Failed to write debug header: {e}")))?;
    writeln!(file, "\n## Configuration\n```json\n{config_json}\n```")
        .map_err(|e| AppError::new(2, format!("Failed to write debug header: {e}")))?;

    for (side, recorder) in sides {
        writeln!(file, "\n## Edge: {}", side.display_name())
            .map_err(|e| AppError::new(2, format!("Failed to write debug: {e}")))?;
        if recorder.sections.is_empty() {
            writeln!(file, "(no stage completed)").map_err(|e| AppError::new(2, format!("Failed to write debug: {e}")))?;
        }
        for section in &recorder.sections {
            writeln!(file, "\n{section}").map_err(|e| AppError::new(2, format!("Failed to write debug: {e}")))?;
        }
    }

    Ok(path)
}

fn residual_table(residual: &ResidualSeries) -> String {
    let step = residual.len().div_ceil(MAX_TABLE_ROWS).max(1);
    let mut s = String::from("\n| index | z | residual |\n| - | - | - |\n");
    for (i, (z, v)) in residual.z().iter().zip(residual.values()).enumerate().step_by(step) {
        s.push_str(&format!("| {i} | {z:.4} | {} |\n", fmt_value(*v)));
    }
    s
}

fn fmt_value(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.6}")
    } else {
        "-".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StageFit;
    use nalgebra::DMatrix;

    #[test]
    fn recorder_writes_one_section_per_report() {
        let residual = ResidualSeries::new((0..100).map(|i| i as f64).collect(), vec![0.0; 100], 0.1);
        let fit = StageFit {
            params: [0.5],
            covariance: DMatrix::from_element(1, 1, 1e-4),
        };
        let mut rec = DebugRecorder::new();
        rec.on_stage(&StageReport::Baseline {
            fit: &fit,
            residual: &residual,
        });
        assert_eq!(rec.sections().len(), 1);
        let section = &rec.sections()[0];
        assert!(section.contains("a: 0.500000 ± 0.010000"));
        // 100 rows thinned with step 3.
        assert_eq!(section.lines().filter(|l| l.starts_with("| ") && !l.starts_with("| index") && !l.starts_with("| -")).count(), 34);
    }

    #[test]
    fn refinement_section_lists_all_parameters() {
        let residual = ResidualSeries::new(vec![1.0, 2.0], vec![0.0, 0.0], 0.1);
        let fit = StageFit {
            params: [0.05, 4.0, 0.1, 0.5, 0.15, 0.6, 0.2, 0.0],
            covariance: DMatrix::zeros(8, 8),
        };
        let mut rec = DebugRecorder::new();
        rec.on_stage(&StageReport::Refine {
            fit: &fit,
            residual: &residual,
        });
        let section = &rec.sections()[0];
        assert!(section.starts_with("### Joint refinement"));
        for label in EdgeParams::LABELS {
            assert!(section.contains(&format!("| {label} |")), "{label}");
        }
    }

    #[test]
    fn bundle_lists_both_edges() {
        let dir = std::env::temp_dir().join(format!("icefit_debug_test_{}", std::process::id()));
        let left = DebugRecorder::new();
        let mut right = DebugRecorder::new();
        right.sections.push("### Baseline\n".to_string());
        let path = write_debug_bundle_in(
            &dir,
            None,
            &FitConfig::default(),
            &[(EdgeSide::Left, &left), (EdgeSide::Right, &right)],
        )
        .unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("## Edge: left\n(no stage completed)"));
        assert!(text.contains("## Edge: right"));
        assert!(text.contains("\"tip_divisor\": 5"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
