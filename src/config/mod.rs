//! Handler configuration.
//!
//! Configuration is loaded with precedence: overrides > Env vars > Config file > Defaults
//!
//! # Example config file (shortlist.toml)
//! ```toml
//! method = "hybrid"
//! num_labels = 1000000
//! model_dir = "/var/lib/models/run1"
//! mode = "train"
//! size_shortlist = 300
//! in_memory = false
//! corruption = 200
//! seed = 22
//!
//! [sampler]
//! replace = true
//! oversample = 350
//! ```

pub mod defaults;

pub use defaults::*;

use crate::error::{Result, ShortlistError};
use crate::model::{Mode, ShortlistMethod};
use crate::table::TableBackend;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration of one shortlist handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Candidate source: static, extended, hybrid or dynamic
    pub method: ShortlistMethod,
    /// Number of labels; also the padding index
    pub num_labels: usize,
    /// Directory holding shortlist files
    pub model_dir: PathBuf,
    /// train, test or val
    pub mode: Mode,
    /// Requested shortlist width before corruption
    pub size_shortlist: usize,
    /// Keep tables in memory instead of memory-mapped files
    pub in_memory: bool,
    /// Extra labels appended by hybrid and extended handlers
    pub corruption: usize,
    /// Negative slots kept when positives are subsampled
    pub min_nneg: usize,
    /// Seed for reproducible sampling; OS entropy when unset
    pub seed: Option<u64>,
    /// Negative sampler settings
    pub sampler: SamplerConfig,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            method: ShortlistMethod::Static,
            num_labels: 0,
            model_dir: PathBuf::from("."),
            mode: Mode::Train,
            size_shortlist: 0,
            in_memory: true,
            corruption: DEFAULT_CORRUPTION,
            min_nneg: DEFAULT_MIN_NNEG,
            seed: None,
            sampler: SamplerConfig::default(),
        }
    }
}

impl HandlerConfig {
    pub fn new(method: ShortlistMethod, num_labels: usize, size_shortlist: usize) -> Self {
        Self {
            method,
            num_labels,
            size_shortlist,
            ..Self::default()
        }
    }

    /// Load configuration with precedence: overrides > Env > File > Defaults
    ///
    /// # Arguments
    /// * `config_path` - Optional path to TOML config file
    /// * `overrides` - Caller overrides to apply on top
    pub fn load(
        config_path: Option<&Path>,
        overrides: HandlerOverrides,
    ) -> std::result::Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(HandlerConfig::default()));

        // Layer 1: Config file (if provided)
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Layer 2: Environment variables with SHORTLIST_ prefix
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_NESTING));

        // Layer 3: Caller overrides
        figment = figment.merge(Serialized::defaults(overrides));

        figment.extract().map_err(ConfigError::from)
    }

    /// Load from environment and optional config file only (no overrides)
    pub fn from_env(config_path: Option<&Path>) -> std::result::Result<Self, ConfigError> {
        Self::load(config_path, HandlerOverrides::default())
    }

    /// Width of the fixed shortlist the handler emits.
    pub fn effective_size(&self) -> usize {
        if self.method.widens_shortlist() {
            self.size_shortlist + self.corruption
        } else {
            self.size_shortlist
        }
    }

    pub fn backend(&self) -> TableBackend {
        TableBackend::from_in_memory(self.in_memory)
    }

    /// Labels drawn per call by the dynamic handler's sampler.
    pub fn dynamic_sample_size(&self) -> usize {
        self.sampler.sample_size.unwrap_or(self.size_shortlist)
    }

    /// Labels drawn per call by the hybrid handler's sampler.
    pub fn hybrid_sample_size(&self) -> usize {
        self.corruption + self.sampler.oversample
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_labels == 0 {
            return Err(ShortlistError::invalid_config("num_labels must be positive"));
        }
        if self.size_shortlist == 0 {
            return Err(ShortlistError::invalid_config(
                "size_shortlist must be positive",
            ));
        }
        if self.min_nneg > self.effective_size() {
            return Err(ShortlistError::invalid_config(format!(
                "min_nneg {} exceeds shortlist width {}",
                self.min_nneg,
                self.effective_size()
            )));
        }
        if self.method == ShortlistMethod::Dynamic
            && !self.sampler.replace
            && self.dynamic_sample_size() > self.num_labels
        {
            return Err(ShortlistError::invalid_config(format!(
                "cannot sample {} distinct labels out of {}",
                self.dynamic_sample_size(),
                self.num_labels
            )));
        }
        Ok(())
    }
}

/// Negative sampler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Labels per draw for the dynamic handler (defaults to size_shortlist)
    pub sample_size: Option<usize>,
    /// Sample with replacement (dynamic handler only; hybrid always replaces)
    pub replace: bool,
    /// Extra draws on top of corruption for the hybrid handler
    pub oversample: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            sample_size: None,
            replace: true,
            oversample: DEFAULT_SAMPLER_OVERSAMPLE,
        }
    }
}

/// Caller overrides that take precedence over file and env config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<ShortlistMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_labels: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_shortlist: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_memory: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corruption: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_nneg: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        Self {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = HandlerConfig::default();
        assert_eq!(config.method, ShortlistMethod::Static);
        assert_eq!(config.min_nneg, DEFAULT_MIN_NNEG);
        assert_eq!(config.corruption, DEFAULT_CORRUPTION);
        assert!(config.in_memory);
    }

    #[test]
    fn test_effective_size() {
        let mut config = HandlerConfig::new(ShortlistMethod::Static, 1000, 300);
        assert_eq!(config.effective_size(), 300);
        config.method = ShortlistMethod::Hybrid;
        assert_eq!(config.effective_size(), 500);
        config.method = ShortlistMethod::Extended;
        config.corruption = 20;
        assert_eq!(config.effective_size(), 320);
    }

    #[test]
    fn test_validate() {
        let config = HandlerConfig::new(ShortlistMethod::Static, 1000, 300);
        assert!(config.validate().is_ok());

        let mut small = HandlerConfig::new(ShortlistMethod::Static, 1000, 50);
        assert!(small.validate().is_err());
        small.min_nneg = 10;
        assert!(small.validate().is_ok());

        let mut dynamic = HandlerConfig::new(ShortlistMethod::Dynamic, 100, 200);
        dynamic.sampler.replace = false;
        assert!(dynamic.validate().is_err());

        assert!(HandlerConfig::new(ShortlistMethod::Static, 0, 300)
            .validate()
            .is_err());
    }

    #[test]
    fn test_load_from_file_with_overrides() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
method = "hybrid"
num_labels = 5000
size_shortlist = 300
mode = "test"
in_memory = false

[sampler]
oversample = 50
"#
        )
        .unwrap();

        let overrides = HandlerOverrides {
            size_shortlist: Some(400),
            ..Default::default()
        };
        let config = HandlerConfig::load(Some(file.path()), overrides).unwrap();
        assert_eq!(config.method, ShortlistMethod::Hybrid);
        assert_eq!(config.num_labels, 5000);
        assert_eq!(config.size_shortlist, 400);
        assert_eq!(config.mode, Mode::Test);
        assert!(!config.in_memory);
        assert_eq!(config.sampler.oversample, 50);
        assert!(config.sampler.replace);
    }

    #[test]
    fn test_env_layer_sits_between_file_and_overrides() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "shortlist.toml",
                r#"
num_labels = 800
size_shortlist = 40
corruption = 5
min_nneg = 3
"#,
            )?;
            jail.set_env("SHORTLIST_CORRUPTION", "17");
            jail.set_env("SHORTLIST_MIN_NNEG", "6");
            jail.set_env("SHORTLIST_SAMPLER__SAMPLE_SIZE", "9");

            let overrides = HandlerOverrides {
                min_nneg: Some(8),
                ..Default::default()
            };
            let config = HandlerConfig::load(Some(Path::new("shortlist.toml")), overrides)
                .expect("layered config");
            assert_eq!(config.num_labels, 800);
            assert_eq!(config.corruption, 17);
            assert_eq!(config.min_nneg, 8);
            assert_eq!(config.sampler.sample_size, Some(9));
            assert_eq!(config.sampler.oversample, DEFAULT_SAMPLER_OVERSAMPLE);
            Ok(())
        });
    }

    #[test]
    fn test_unknown_method_in_file_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "method = \"annoy\"").unwrap();
        let err = HandlerConfig::from_env(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("annoy"));
    }

    #[test]
    fn test_method_serde() {
        let json = serde_json::to_string(&ShortlistMethod::Extended).unwrap();
        assert_eq!(json, "\"extended\"");

        let method: ShortlistMethod = serde_json::from_str("\"dynamic\"").unwrap();
        assert_eq!(method, ShortlistMethod::Dynamic);
        assert!(serde_json::from_str::<ShortlistMethod>("\"random\"").is_err());
    }
}
