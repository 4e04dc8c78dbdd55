//! Hook for inspecting intermediate results of the edge fit.
//!
//! Observers are called synchronously after each stage and cannot change
//! the outcome; diagnostics (terminal plots, debug bundles) build on this.

use crate::domain::{ResidualSeries, RippleGuess, StageFit};
use crate::fit::amplitude::AmplitudeFrequencyGuess;

/// Snapshot of one completed stage.
#[derive(Debug, Clone, Copy)]
pub enum StageReport<'a> {
    /// Baseline fit and the residual it leaves.
    Baseline {
        fit: &'a StageFit<1>,
        residual: &'a ResidualSeries,
    },
    /// Macro fit and the full (unbulked) second residual.
    Macro {
        fit: &'a StageFit<4>,
        residual: &'a ResidualSeries,
    },
    /// Estimator output; skipped when the caller supplies a ripple seed.
    Guess {
        amplitude_frequency: &'a AmplitudeFrequencyGuess,
        phase: f64,
    },
    /// Final ripple values. `fitted` is false when the guesses were returned
    /// without a final fit.
    Ripple {
        params: &'a RippleGuess,
        uncertainties: &'a [f64; 3],
        bulk: &'a ResidualSeries,
        fitted: bool,
    },
    /// Joint fit of all eight parameters and what it leaves of the profile.
    Refine {
        fit: &'a StageFit<8>,
        residual: &'a ResidualSeries,
    },
}

pub trait StageObserver {
    fn on_stage(&mut self, report: &StageReport<'_>);
}

impl StageObserver for () {
    fn on_stage(&mut self, _report: &StageReport<'_>) {}
}

impl<O: StageObserver + ?Sized> StageObserver for &mut O {
    fn on_stage(&mut self, report: &StageReport<'_>) {
        (**self).on_stage(report);
    }
}

impl<A: StageObserver, B: StageObserver> StageObserver for (A, B) {
    fn on_stage(&mut self, report: &StageReport<'_>) {
        self.0.on_stage(report);
        self.1.on_stage(report);
    }
}

impl<O: StageObserver> StageObserver for Option<O> {
    fn on_stage(&mut self, report: &StageReport<'_>) {
        if let Some(observer) = self {
            observer.on_stage(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    #[derive(Default)]
    struct Count(usize);

    impl StageObserver for Count {
        fn on_stage(&mut self, _report: &StageReport<'_>) {
            self.0 += 1;
        }
    }

    #[test]
    fn pairs_and_options_forward_reports() {
        let fit = StageFit {
            params: [0.5],
            covariance: DMatrix::zeros(1, 1),
        };
        let residual = ResidualSeries::new(vec![1.0], vec![0.0], 0.1);
        let report = StageReport::Baseline {
            fit: &fit,
            residual: &residual,
        };

        let mut pair = (Count::default(), Some(Count::default()));
        pair.on_stage(&report);
        let mut none: Option<Count> = None;
        none.on_stage(&report);
        assert_eq!(pair.0.0, 1);
        assert_eq!(pair.1.as_ref().map(|c| c.0), Some(1));
    }
}
