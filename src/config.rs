use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::constants;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub geocoder: GeocoderConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub raw_dir: PathBuf,
    pub organizations_file: String,
    pub education_file: String,
    /// The relation registry is optional; when unset, parent-based sector
    /// fallback is skipped.
    pub relations_file: Option<String>,
    pub merged_dir: PathBuf,
    pub geocoded_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API credential
    pub api_key_env: String,
    /// Minimum delay between two consecutive provider requests
    pub delay_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub timeout_secs: u64,
    pub region_suffix: String,
    pub progress_every: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: PathBuf::from(constants::DEFAULT_RAW_DIR),
            organizations_file: constants::DEFAULT_ORGANIZATIONS_FILE.to_string(),
            education_file: constants::DEFAULT_EDUCATION_FILE.to_string(),
            relations_file: None,
            merged_dir: PathBuf::from(constants::DEFAULT_MERGED_DIR),
            geocoded_dir: PathBuf::from(constants::DEFAULT_GEOCODED_DIR),
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_GEOCODER_URL.to_string(),
            api_key_env: constants::DEFAULT_API_KEY_ENV.to_string(),
            delay_ms: 1000,
            max_attempts: 3,
            backoff_base_ms: 1000,
            backoff_max_ms: 60_000,
            timeout_secs: 10,
            region_suffix: constants::DEFAULT_REGION_SUFFIX.to_string(),
            progress_every: 100,
        }
    }
}

impl Config {
    /// Load the configuration from `path`. A missing file yields the defaults;
    /// a file that exists but cannot be parsed is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let config_content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&config_content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.geocoder.max_attempts == 0 {
            return Err(PipelineError::Config(
                "geocoder.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.geocoder.backoff_max_ms < self.geocoder.backoff_base_ms {
            return Err(PipelineError::Config(
                "geocoder.backoff_max_ms must not be smaller than geocoder.backoff_base_ms"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl PathsConfig {
    pub fn organizations_path(&self) -> PathBuf {
        self.raw_dir.join(&self.organizations_file)
    }

    pub fn education_path(&self) -> PathBuf {
        self.raw_dir.join(&self.education_file)
    }

    pub fn relations_path(&self) -> Option<PathBuf> {
        self.relations_file.as_ref().map(|f| self.raw_dir.join(f))
    }

    pub fn merged_path(&self, sector: &str) -> PathBuf {
        self.merged_dir.join(constants::merged_file_name(sector))
    }

    pub fn geocoded_path(&self, sector: &str) -> PathBuf {
        self.geocoded_dir.join(constants::geocoded_file_name(sector))
    }

    pub fn refined_path(&self, sector: &str) -> PathBuf {
        self.output_dir.join(constants::refined_file_name(sector))
    }
}

impl GeocoderConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API credential from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        let key = std::env::var(&self.api_key_env).map_err(|_| {
            PipelineError::Config(format!(
                "API key not found, set {} in the environment or .env file",
                self.api_key_env
            ))
        })?;
        if key.trim().is_empty() {
            return Err(PipelineError::Config(format!("{} is empty", self.api_key_env)));
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = Config::load(Path::new("/definitely/not/here/config.toml")).unwrap();
        assert_eq!(config.geocoder.delay_ms, 1000);
        assert_eq!(config.geocoder.max_attempts, 3);
        assert_eq!(config.paths.raw_dir, PathBuf::from("data/raw"));
        assert!(config.paths.relations_file.is_none());
    }

    #[test]
    fn test_partial_file_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[paths]\nraw_dir = \"input\"\nrelations_file = \"RELATIES.csv\"\n\n[geocoder]\ndelay_ms = 250"
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.geocoder.delay_ms, 250);
        assert_eq!(config.geocoder.max_attempts, 3);
        assert_eq!(
            config.paths.relations_path(),
            Some(PathBuf::from("input").join("RELATIES.csv"))
        );
        assert_eq!(
            config.paths.merged_path("primary"),
            PathBuf::from("data/processed/final/primary_education_locations.csv")
        );
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[geocoder]\nmax_attempts = 0\n").unwrap();
        assert!(matches!(Config::load(&path), Err(PipelineError::Config(_))));
    }
}
