use thiserror::Error;

use crate::domain::Stage;
use crate::math::LmError;

/// Failure raised by one stage of the edge-fit pipeline.
///
/// Every variant names the stage it came from; nothing is retried, so the
/// first error aborts the whole fit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("{stage}: invalid input shape: {detail}")]
    InputShape { stage: Stage, detail: String },

    #[error("{stage}: solver failed: {detail}")]
    Convergence { stage: Stage, detail: String },

    #[error("{stage}: no usable critical points: {detail}")]
    DegenerateGuess { stage: Stage, detail: String },

    #[error("{stage}: initial guess outside bounds: {detail}")]
    BoundsViolation { stage: Stage, detail: String },
}

impl FitError {
    pub fn input_shape(stage: Stage, detail: impl Into<String>) -> Self {
        Self::InputShape {
            stage,
            detail: detail.into(),
        }
    }

    pub fn convergence(stage: Stage, detail: impl Into<String>) -> Self {
        Self::Convergence {
            stage,
            detail: detail.into(),
        }
    }

    pub fn degenerate(stage: Stage, detail: impl Into<String>) -> Self {
        Self::DegenerateGuess {
            stage,
            detail: detail.into(),
        }
    }

    pub fn bounds(stage: Stage, detail: impl Into<String>) -> Self {
        Self::BoundsViolation {
            stage,
            detail: detail.into(),
        }
    }

    /// Attribute a solver failure to `stage`.
    pub fn solver(stage: Stage, err: LmError) -> Self {
        match err {
            LmError::TooFewSamples { .. } | LmError::LengthMismatch { .. } | LmError::InvalidSigma { .. } => {
                Self::input_shape(stage, err.to_string())
            }
            LmError::InvertedBounds { .. } | LmError::Infeasible { .. } => Self::bounds(stage, err.to_string()),
            LmError::NonFiniteStart | LmError::MaxIterations { .. } | LmError::NonFiniteCovariance => {
                Self::convergence(stage, err.to_string())
            }
        }
    }

    /// Stage that raised the error.
    pub fn stage(&self) -> Stage {
        match self {
            Self::InputShape { stage, .. }
            | Self::Convergence { stage, .. }
            | Self::DegenerateGuess { stage, .. }
            | Self::BoundsViolation { stage, .. } => *stage,
        }
    }

    /// Process exit code used by the `icefit` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InputShape { .. } => 3,
            Self::Convergence { .. } | Self::DegenerateGuess { .. } | Self::BoundsViolation { .. } => 4,
        }
    }
}

/// Application-level error: a message plus the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_error_message_names_stage() {
        let err = FitError::degenerate(Stage::AmplitudeFrequency, "0 pairs");
        assert_eq!(
            err.to_string(),
            "amplitude/frequency estimate: no usable critical points: 0 pairs"
        );
        assert_eq!(err.stage(), Stage::AmplitudeFrequency);
    }

    #[test]
    fn app_error_keeps_fit_exit_code() {
        let app: AppError = FitError::input_shape(Stage::Input, "too short").into();
        assert_eq!(app.exit_code(), 3);
        let app: AppError = FitError::convergence(Stage::Macro, "max iterations").into();
        assert_eq!(app.exit_code(), 4);
    }

    #[test]
    fn solver_errors_map_to_kinds() {
        let err = FitError::solver(Stage::Macro, LmError::MaxIterations { iterations: 200, cost: 1.0 });
        assert!(matches!(err, FitError::Convergence { stage: Stage::Macro, .. }));
        let err = FitError::solver(
            Stage::Ripple,
            LmError::Infeasible {
                index: 1,
                value: 30.0,
                lower: 0.0,
                upper: 20.0,
            },
        );
        assert!(matches!(err, FitError::BoundsViolation { stage: Stage::Ripple, .. }));
        let err = FitError::solver(Stage::Baseline, LmError::TooFewSamples { needed: 1, got: 0 });
        assert_eq!(err.exit_code(), 3);
    }
}
