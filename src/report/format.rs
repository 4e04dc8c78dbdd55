//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays clean and testable
//! - output changes are localized

use std::path::Path;

use crate::app::pipeline::{RunOutput, SideOutput};
use crate::domain::{EdgeFit, EdgeParams};
use crate::io::ingest::EdgeRows;

/// Format the full run summary (input stats + both edge fits).
pub fn format_run_summary(input: Option<&Path>, rows: Option<&EdgeRows>, run: &RunOutput) -> String {
    let mut out = String::new();

    out.push_str("=== icefit - Icicle Edge Fit ===\n");
    if let Some(path) = input {
        out.push_str(&format!("Input: {}\n", path.display()));
    }
    if let Some(rows) = rows {
        out.push_str(&format!("Rows: {}\n", rows.left.len()));
    }
    out.push_str(&format!(
        "Spine: {}\n",
        if run.spine_corrected { "line-corrected" } else { "mean-centred" }
    ));
    out.push_str(&format!(
        "Length: {:.4} | samples: left={} right={}\n",
        run.fit.length, run.left.samples, run.right.samples
    ));

    out.push_str("\nParameters (value ± 1 sigma):\n");
    out.push_str(&format_param_table(&run.fit.left, &run.fit.right));

    out.push_str("\nFit quality:\n");
    for side in [&run.left, &run.right] {
        out.push_str(&format_quality(side));
    }

    out
}

/// Side-by-side table of the 8 parameters of both edges.
pub fn format_param_table(left: &EdgeFit, right: &EdgeFit) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<12} {:>26} {:>26}", "param", "left", "right").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<26} {:-<26}", "", "", "").trim_end());
    out.push('\n');

    let lv = left.parameters.to_array();
    let lu = left.uncertainties.to_array();
    let rv = right.parameters.to_array();
    let ru = right.uncertainties.to_array();
    for (i, label) in EdgeParams::LABELS.iter().enumerate() {
        out.push_str(
            format!(
                "{:<12} {:>26} {:>26}",
                label,
                fmt_pm(lv[i], lu[i]),
                fmt_pm(rv[i], ru[i])
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out
}

fn format_quality(side: &SideOutput) -> String {
    format!("- {:<5}: rms={:.6}\n", side.side.display_name(), side.rms)
}

fn fmt_pm(value: f64, err: f64) -> String {
    format!("{value:.6} ± {err:.6}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(offset: f64) -> EdgeFit {
        EdgeFit {
            parameters: EdgeParams::from_array([0.05, 4.0, 0.1, 0.5, 0.15, 0.6, 0.2, offset]),
            uncertainties: EdgeParams::from_array([0.001; 8]),
        }
    }

    #[test]
    fn param_table_has_one_row_per_label() {
        let table = format_param_table(&fit(0.0), &fit(-0.25));
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2 + 8);
        assert!(lines[0].starts_with("param"));
        assert!(lines[2].starts_with("A_ripple"));
        assert!(lines[2].contains("0.050000 ± 0.001000"));
        assert!(lines[9].starts_with("C_offset"));
        assert!(lines[9].ends_with("-0.250000 ± 0.001000"));
        assert!(lines.iter().all(|l| l == &l.trim_end()));
    }
}
