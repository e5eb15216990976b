use crate::path::{Path, PathSet};
use crate::pixels::FAST_SIDE;
use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};

pub const DEFAULT_STORE_PATH: &str = "pixel_duper.store";
pub const MAX_REDUCED_IMAGE_SIZE: usize = 4096;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub search_paths: Vec<String>,
    /// Whether search paths include their subfolders.
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default)]
    pub ignore_paths: Vec<String>,
    /// Roots whose images are preferred when a duplicate pair is reported.
    #[serde(default)]
    pub valid_paths: Vec<String>,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default)]
    pub compare: CompareOptions,
}

impl AppConfig {
    pub fn new(search_paths: Vec<String>) -> Self {
        Self {
            search_paths,
            recursive: true,
            ignore_paths: Vec::new(),
            valid_paths: Vec::new(),
            ignore_patterns: Vec::new(),
            store_path: default_store_path(),
            compare: CompareOptions::default(),
        }
    }

    /// De-overlapped path sets for this configuration.
    pub fn scope(&self) -> SearchScope {
        SearchScope {
            search: directory_set(&self.search_paths, self.recursive),
            ignore: directory_set(&self.ignore_paths, true),
            valid: directory_set(&self.valid_paths, true),
        }
    }
}

fn directory_set(dirs: &[String], subfolders: bool) -> PathSet {
    dirs.iter()
        .map(|d| Path::directory(d, subfolders))
        .collect()
}

/// Read `Config.toml` (or any format the `config` crate recognises under
/// the `Config` stem), then `PIXEL_DUPER__*` environment overrides.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(Environment::with_prefix("PIXEL_DUPER").separator("__"))
        .build()?;
    let config = builder.try_deserialize::<AppConfig>()?;
    config.compare.validate()?;
    Ok(config)
}

#[derive(Debug, Clone)]
pub struct SearchScope {
    pub search: PathSet,
    pub ignore: PathSet,
    pub valid: PathSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareAlgorithm {
    /// Root-mean-square luma difference.
    Squared,
    /// Structural similarity.
    Ssim,
}

/// Thresholds consumed by fingerprinting, defect classification and
/// comparison. Differences are percentages of full scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareOptions {
    pub check_on_equality: bool,
    /// Also match rotated and mirrored copies.
    pub transformed_image: bool,
    pub algorithm: CompareAlgorithm,
    pub threshold_difference: f64,
    /// Cutoff for the 4×4 pre-filter.
    pub fast_threshold_difference: f64,
    pub minimal_image_size: u32,
    pub maximal_image_size: u32,
    /// Edge of the main fingerprint grid.
    pub reduced_image_size: usize,
    pub ignore_frame_width: usize,
    pub ratio_resolution: i32,
    pub check_on_defect: bool,
    pub check_on_blockiness: bool,
    pub blockiness_threshold: f64,
    /// JPEG's own block compression makes the blockiness score unreliable.
    pub check_on_blockiness_only_not_jpeg: bool,
    pub check_on_blurring: bool,
    pub blurring_threshold: f64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            check_on_equality: true,
            transformed_image: false,
            algorithm: CompareAlgorithm::Ssim,
            threshold_difference: 5.0,
            fast_threshold_difference: 15.0,
            minimal_image_size: 64,
            maximal_image_size: 8192,
            reduced_image_size: 32,
            ignore_frame_width: 0,
            ratio_resolution: 32,
            check_on_defect: true,
            check_on_blockiness: false,
            blockiness_threshold: 10.0,
            check_on_blockiness_only_not_jpeg: false,
            check_on_blurring: false,
            blurring_threshold: 32.0,
        }
    }
}

impl CompareOptions {
    /// Reject values the fingerprinting code cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(FAST_SIDE..=MAX_REDUCED_IMAGE_SIZE).contains(&self.reduced_image_size) {
            return Err(ConfigError::Message(format!(
                "compare.reduced_image_size must be between {} and {}, got {}",
                FAST_SIDE, MAX_REDUCED_IMAGE_SIZE, self.reduced_image_size
            )));
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.to_string()
}
