//! Stage observer that renders residual plots.
//!
//! Plots are buffered rather than printed so that edges fitted in parallel
//! do not interleave their output.

use crate::domain::ResidualSeries;
use crate::fit::{StageObserver, StageReport};
use crate::math::ResponseModel;
use crate::models::{MacroSine, RippleSine};
use crate::plot::ascii::render_residual_plot;

#[derive(Debug, Clone)]
pub struct TerminalPlotObserver {
    width: usize,
    height: usize,
    // Residual after the baseline, kept until the macro fit can be overlaid.
    first_residual: Option<ResidualSeries>,
    plots: Vec<String>,
}

impl TerminalPlotObserver {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            first_residual: None,
            plots: Vec::new(),
        }
    }

    /// Rendered plots in stage order.
    pub fn plots(&self) -> &[String] {
        &self.plots
    }

    pub fn into_output(self) -> String {
        self.plots.join("\n")
    }
}

impl StageObserver for TerminalPlotObserver {
    fn on_stage(&mut self, report: &StageReport<'_>) {
        match *report {
            StageReport::Baseline { fit, residual } => {
                self.first_residual = Some(residual.clone());
                let plot = render_residual_plot(residual, None::<fn(f64) -> f64>, self.width, self.height);
                self.plots
                    .push(format!("Residual after baseline (a = {:.5}):\n{plot}", fit.params[0]));
            }
            StageReport::Macro { fit, residual } => {
                if let Some(first) = self.first_residual.take() {
                    let p = fit.params;
                    let plot = render_residual_plot(
                        &first,
                        Some(|z: f64| MacroSine.evaluate(z, &p)),
                        self.width,
                        self.height,
                    );
                    self.plots.push(format!(
                        "Macro oscillation (A = {:.4}, w = {:.4}, phi = {:.4}, C = {:.4}):\n{plot}",
                        p[0], p[1], p[2], p[3]
                    ));
                }
                let plot = render_residual_plot(residual, None::<fn(f64) -> f64>, self.width, self.height);
                self.plots.push(format!("Residual after macro oscillation:\n{plot}"));
            }
            StageReport::Guess { .. } => {}
            StageReport::Ripple {
                params, bulk, fitted, ..
            } => {
                let p = params.to_array();
                let plot = render_residual_plot(
                    bulk,
                    Some(|z: f64| RippleSine.evaluate(z, &p)),
                    self.width,
                    self.height,
                );
                let label = if fitted { "fit" } else { "guess" };
                self.plots.push(format!("Bulk residual with ripple {label}:\n{plot}"));
            }
            StageReport::Refine { residual, .. } => {
                let plot = render_residual_plot(residual, None::<fn(f64) -> f64>, self.width, self.height);
                self.plots.push(format!("Residual after joint refinement:\n{plot}"));
            }
        }
    }
}
