//! Run JSON export.
//!
//! The run file is the portable record of one icicle fit: the configuration
//! that produced it plus both edge results, so a fit can be re-plotted or
//! compared later without re-reading the image data.

use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::domain::{FitConfig, IcicleFit};
use crate::error::AppError;
use crate::prep::UnitConversion;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    pub tool: String,
    pub generated: DateTime<Local>,
    pub input: Option<PathBuf>,
    pub conversion: UnitConversion,
    pub spine_threshold: f64,
    pub config: FitConfig,
    pub result: IcicleFit,
}

impl RunFile {
    pub fn new(
        input: Option<PathBuf>,
        conversion: UnitConversion,
        spine_threshold: f64,
        config: FitConfig,
        result: IcicleFit,
    ) -> Self {
        Self {
            tool: "icefit".to_string(),
            generated: Local::now(),
            input,
            conversion,
            spine_threshold,
            config,
            result,
        }
    }
}

/// Write a run JSON file.
pub fn write_run_json(path: &Path, run: &RunFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create run JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, run).map_err(|e| AppError::new(2, format!("Failed to write run JSON: {e}")))?;
    Ok(())
}

/// Read a (possibly partial) fit configuration; missing fields take defaults.
pub fn read_fit_config(path: &Path) -> Result<FitConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open config '{}': {e}", path.display())))?;
    let config: FitConfig =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid config JSON: {e}")))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EdgeFit, EdgeParams};

    fn fit() -> IcicleFit {
        let edge = EdgeFit {
            parameters: EdgeParams::from_array([0.05, 4.0, 0.1, 0.5, 0.15, 0.6, 0.2, 0.0]),
            uncertainties: EdgeParams::from_array([1e-3; 8]),
        };
        IcicleFit {
            left: edge,
            right: edge,
            length: 9.0,
        }
    }

    #[test]
    fn run_file_survives_disk() {
        let path = std::env::temp_dir().join(format!("icefit_run_{}.json", std::process::id()));
        let run = RunFile::new(None, UnitConversion::default(), 5.0, FitConfig::default(), fit());
        write_run_json(&path, &run).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let back: RunFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back.result, run.result);
        assert_eq!(back.config, run.config);
        assert_eq!(back.tool, "icefit");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let path = std::env::temp_dir().join(format!("icefit_cfg_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "amplitude_threshold": 0.03, "macro_frequency_seed": "profile-length" }"#).unwrap();
        let config = read_fit_config(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.amplitude_threshold, 0.03);
        assert_eq!(config.macro_frequency_seed, crate::domain::MacroFrequencySeed::ProfileLength);
        assert_eq!(config.smoothing_resolution, 3);
        assert_eq!(config.solver, crate::math::LmConfig::default());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_fit_config(Path::new("/nonexistent/config.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
