use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::cfd::CfdParams;
use super::constants::RUN_DIR_PREFIX;
use super::error::ConfigError;
use super::jitter::SolveMode;
use super::run::ChannelId;

/// Tunable constants of the extraction pipeline. All voltages are in volts.
///
/// The noise floor and positive-noise threshold are empirical; the defaults are the
/// values used for the 800 V cosmic runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub cfd_fraction: f64,
    pub cfd_noise_floor_v: f64,
    pub noise_threshold_v: f64,
    pub cut_floor_v: f64,
    pub top_bottom_cut_fraction: f64,
    pub cut_histogram_bins: usize,
    pub cut_histogram_max_v: f64,
    pub min_clean_events: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            cfd_fraction: 0.3,
            cfd_noise_floor_v: 0.0005,
            noise_threshold_v: 0.03,
            cut_floor_v: 0.05,
            top_bottom_cut_fraction: 0.9,
            cut_histogram_bins: 100,
            cut_histogram_max_v: 0.5,
            min_clean_events: 10,
        }
    }
}

impl AnalysisConfig {
    pub fn cfd_params(&self) -> CfdParams {
        CfdParams {
            fraction: self.cfd_fraction,
            noise_floor: self.cfd_noise_floor_v,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cfd_fraction > 0.0 && self.cfd_fraction < 1.0) {
            return Err(ConfigError::InvalidValue(
                "cfd_fraction",
                self.cfd_fraction.to_string(),
            ));
        }
        if !(self.top_bottom_cut_fraction >= 0.0) {
            return Err(ConfigError::InvalidValue(
                "top_bottom_cut_fraction",
                self.top_bottom_cut_fraction.to_string(),
            ));
        }
        if self.cut_histogram_bins == 0 {
            return Err(ConfigError::InvalidValue(
                "cut_histogram_bins",
                self.cut_histogram_bins.to_string(),
            ));
        }
        if !(self.cut_histogram_max_v > 0.0) {
            return Err(ConfigError::InvalidValue(
                "cut_histogram_max_v",
                self.cut_histogram_max_v.to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunType {
    /// All stack channels in coincidence; full timing analysis
    #[default]
    FourFold,
    /// A single detector; amplitude spectrum only
    Single,
}

/// Per-run reporting parameters: the amplitude range and binning handed to the
/// downstream Landau fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParams {
    pub landau_lower: f64,
    pub landau_upper: f64,
    pub landau_bins: usize,
    pub run_type: RunType,
    pub notes: Option<String>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            landau_lower: 0.01,
            landau_upper: 0.4,
            landau_bins: 50,
            run_type: RunType::FourFold,
            notes: None,
        }
    }
}

/// Structure representing the application configuration. Contains pathing, run
/// information and the analysis constants.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    pub first_run_number: i32,
    pub last_run_number: i32,
    pub n_threads: i32,
    pub channels: Vec<ChannelId>,
    pub analysis: AnalysisConfig,
    pub solve_mode: SolveMode,
    pub combine_middle_pairs: bool,
    pub default_run_params: RunParams,
    pub run_params: BTreeMap<i32, RunParams>,
    /// MeV per mV for each channel, used only for reporting
    pub calibration: BTreeMap<ChannelId, f64>,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            first_run_number: 0,
            last_run_number: 0,
            n_threads: 1,
            channels: vec![1, 2, 3, 4],
            analysis: AnalysisConfig::default(),
            solve_mode: SolveMode::default(),
            combine_middle_pairs: false,
            default_run_params: RunParams::default(),
            run_params: BTreeMap::new(),
            calibration: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;
        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        config.analysis.validate()?;
        Ok(config)
    }

    /// Reporting parameters for a run, falling back to the defaults
    pub fn get_run_params(&self, run_number: i32) -> &RunParams {
        self.run_params
            .get(&run_number)
            .unwrap_or(&self.default_run_params)
    }

    /// Get the path to the report file of a run
    pub fn get_report_file_name(&self, run_name: &str) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self.output_path.join(format!("{run_name}_report.yml")))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    /// Get the path to the combined jitter file
    pub fn get_combined_file_name(&self) -> Result<PathBuf, ConfigError> {
        if self.output_path.exists() {
            Ok(self.output_path.join("combined_jitter.yml"))
        } else {
            Err(ConfigError::BadFilePath(self.output_path.clone()))
        }
    }

    /// Construct the run directory prefix, e.g. run017
    pub fn get_run_str(run_number: i32) -> String {
        format!("{RUN_DIR_PREFIX}{run_number:0>3}")
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn mev_per_mv(&self, channel: ChannelId) -> Option<f64> {
        self.calibration.get(&channel).copied()
    }
}
