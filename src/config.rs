//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/neurite/neurite.toml`
//! 3. Local config: file given with `--config`
//! 4. Environment variables: `NEURITE__<SECTION>__<KEY>`

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::confidence::DEFAULT_CONFIDENCE_FACTORS;
use crate::application::prune::{PruneOptions, PruneTarget};
use crate::application::segregation::SegregationOptions;
use crate::application::split::SplitOptions;
use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{FlowMethod, StitchMethod, StrahlerMethod, DEFAULT_SOMA_TAG};

/// Defaults for the analysis entry points.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Retention factor per edge confidence 0..=5
    pub confidence_factors: Vec<f64>,
    /// `standard` or `greedy`
    pub strahler_method: String,
    /// `centrifugal`, `centripetal`, `sum` or `bending`
    pub flow_method: String,
    pub polypre: bool,
    pub reroot_soma: bool,
    pub primary_neurite: bool,
    pub relocate_connectors: bool,
    /// `all`, `leafs` or `none`
    pub stitch_method: String,
    pub segregation_downsample: usize,
    pub soma_tag: String,
    /// Tag the widest node of at least this radius as soma when untagged
    pub soma_radius: Option<f64>,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            confidence_factors: DEFAULT_CONFIDENCE_FACTORS.to_vec(),
            strahler_method: "standard".into(),
            flow_method: "centrifugal".into(),
            polypre: false,
            reroot_soma: true,
            primary_neurite: true,
            relocate_connectors: false,
            stitch_method: "all".into(),
            segregation_downsample: 5,
            soma_tag: DEFAULT_SOMA_TAG.into(),
            soma_radius: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchSettings {
    /// Fan collections out over a thread pool
    pub parallel: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Raw analysis section for intermediate parsing (`None` = not specified).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawAnalysisSettings {
    pub confidence_factors: Option<Vec<f64>>,
    pub strahler_method: Option<String>,
    pub flow_method: Option<String>,
    pub polypre: Option<bool>,
    pub reroot_soma: Option<bool>,
    pub primary_neurite: Option<bool>,
    pub relocate_connectors: Option<bool>,
    pub stitch_method: Option<String>,
    pub segregation_downsample: Option<usize>,
    pub soma_tag: Option<String>,
    pub soma_radius: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawBatchSettings {
    pub parallel: Option<bool>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub analysis: RawAnalysisSettings,
    pub batch: RawBatchSettings,
}

impl AnalysisSettings {
    fn merge(&self, o: &RawAnalysisSettings) -> Self {
        Self {
            confidence_factors: o
                .confidence_factors
                .clone()
                .unwrap_or_else(|| self.confidence_factors.clone()),
            strahler_method: o
                .strahler_method
                .clone()
                .unwrap_or_else(|| self.strahler_method.clone()),
            flow_method: o.flow_method.clone().unwrap_or_else(|| self.flow_method.clone()),
            polypre: o.polypre.unwrap_or(self.polypre),
            reroot_soma: o.reroot_soma.unwrap_or(self.reroot_soma),
            primary_neurite: o.primary_neurite.unwrap_or(self.primary_neurite),
            relocate_connectors: o.relocate_connectors.unwrap_or(self.relocate_connectors),
            stitch_method: o
                .stitch_method
                .clone()
                .unwrap_or_else(|| self.stitch_method.clone()),
            segregation_downsample: o
                .segregation_downsample
                .unwrap_or(self.segregation_downsample),
            soma_tag: o.soma_tag.clone().unwrap_or_else(|| self.soma_tag.clone()),
            soma_radius: o.soma_radius.or(self.soma_radius),
        }
    }
}

/// Unified configuration for neurite.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub analysis: AnalysisSettings,
    pub batch: BatchSettings,
}

/// Get the XDG config directory for neurite.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "neurite").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("neurite.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins wherever it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            analysis: self.analysis.merge(&overlay.analysis),
            batch: BatchSettings {
                parallel: overlay.batch.parallel.unwrap_or(self.batch.parallel),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// A missing global file is skipped; a missing `local` file is an error.
    /// Mode strings are checked before returning.
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(local_path) = local {
            let raw = load_raw_settings(local_path)?;
            current = current.merge_with(&raw);
        }

        current = Self::apply_env_overrides(current)?;
        current.validate()?;
        Ok(current)
    }

    /// Apply NEURITE__* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("NEURITE")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("analysis.confidence_factors"),
            )
            .build()
            .map_err(config_err)?;

        let a = &mut settings.analysis;
        if let Ok(val) = config.get::<Vec<f64>>("analysis.confidence_factors") {
            a.confidence_factors = val;
        }
        if let Ok(val) = config.get_string("analysis.strahler_method") {
            a.strahler_method = val;
        }
        if let Ok(val) = config.get_string("analysis.flow_method") {
            a.flow_method = val;
        }
        if let Ok(val) = config.get_bool("analysis.polypre") {
            a.polypre = val;
        }
        if let Ok(val) = config.get_bool("analysis.reroot_soma") {
            a.reroot_soma = val;
        }
        if let Ok(val) = config.get_bool("analysis.primary_neurite") {
            a.primary_neurite = val;
        }
        if let Ok(val) = config.get_bool("analysis.relocate_connectors") {
            a.relocate_connectors = val;
        }
        if let Ok(val) = config.get_string("analysis.stitch_method") {
            a.stitch_method = val;
        }
        if let Ok(val) = config.get::<usize>("analysis.segregation_downsample") {
            a.segregation_downsample = val;
        }
        if let Ok(val) = config.get_string("analysis.soma_tag") {
            a.soma_tag = val;
        }
        if let Ok(val) = config.get_float("analysis.soma_radius") {
            a.soma_radius = Some(val);
        }
        if let Ok(val) = config.get_bool("batch.parallel") {
            settings.batch.parallel = val;
        }

        Ok(settings)
    }

    fn validate(&self) -> ApplicationResult<()> {
        self.strahler_method()?;
        self.flow_method()?;
        self.stitch_method()?;
        self.confidence_factors()?;
        Ok(())
    }

    pub fn strahler_method(&self) -> ApplicationResult<StrahlerMethod> {
        Ok(self.analysis.strahler_method.parse::<StrahlerMethod>()?)
    }

    pub fn flow_method(&self) -> ApplicationResult<FlowMethod> {
        Ok(self.analysis.flow_method.parse::<FlowMethod>()?)
    }

    pub fn stitch_method(&self) -> ApplicationResult<StitchMethod> {
        Ok(self.analysis.stitch_method.parse::<StitchMethod>()?)
    }

    pub fn confidence_factors(&self) -> ApplicationResult<[f64; 6]> {
        <[f64; 6]>::try_from(self.analysis.confidence_factors.as_slice()).map_err(|_| {
            ApplicationError::Config {
                message: format!(
                    "confidence_factors needs 6 values, got {}",
                    self.analysis.confidence_factors.len()
                ),
            }
        })
    }

    pub fn split_options(&self) -> ApplicationResult<SplitOptions> {
        Ok(SplitOptions {
            method: self.flow_method()?,
            polypre: self.analysis.polypre,
            reroot_soma: self.analysis.reroot_soma,
            primary_neurite: self.analysis.primary_neurite,
        })
    }

    pub fn prune_options(&self, target: PruneTarget) -> ApplicationResult<PruneOptions> {
        Ok(PruneOptions {
            method: self.strahler_method()?,
            reroot_soma: self.analysis.reroot_soma,
            relocate_connectors: self.analysis.relocate_connectors,
            ..PruneOptions::new(target)
        })
    }

    pub fn segregation_options(&self) -> ApplicationResult<SegregationOptions> {
        Ok(SegregationOptions {
            split: self.split_options()?,
            downsample: self.analysis.segregation_downsample,
        })
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# neurite configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/neurite/neurite.toml
#   Local:  file passed with --config
#   Env:    NEURITE__ANALYSIS__FLOW_METHOD=sum, NEURITE__BATCH__PARALLEL=false, ...

[analysis]
# Retention factor per edge confidence 0..=5
# confidence_factors = [1.0, 0.2, 0.4, 0.6, 0.9, 1.0]

# standard | greedy
# strahler_method = "standard"

# centrifugal | centripetal | sum | bending
# flow_method = "centrifugal"

# Weight presynapses by their number of postsynaptic partners
# polypre = false

# reroot_soma = true
# primary_neurite = true
# relocate_connectors = false

# all | leafs | none
# stitch_method = "all"

# segregation_downsample = 5
# soma_tag = "soma"
# soma_radius = 500.0

[batch]
# parallel = true
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_resolving_modes_then_parses_all() {
        let settings = Settings::default();
        assert_eq!(settings.strahler_method().unwrap(), StrahlerMethod::Standard);
        assert_eq!(settings.flow_method().unwrap(), FlowMethod::Centrifugal);
        assert_eq!(settings.stitch_method().unwrap(), StitchMethod::All);
        assert_eq!(settings.confidence_factors().unwrap(), DEFAULT_CONFIDENCE_FACTORS);
    }

    #[test]
    fn given_raw_overlay_when_merging_then_only_specified_fields_change() {
        let base = Settings::default();
        let overlay = RawSettings {
            analysis: RawAnalysisSettings {
                flow_method: Some("sum".into()),
                soma_radius: Some(250.0),
                ..RawAnalysisSettings::default()
            },
            batch: RawBatchSettings {
                parallel: Some(false),
            },
        };

        let merged = base.merge_with(&overlay);

        assert_eq!(merged.analysis.flow_method, "sum");
        assert_eq!(merged.analysis.soma_radius, Some(250.0));
        assert_eq!(merged.analysis.strahler_method, "standard");
        assert!(!merged.batch.parallel);
    }

    #[test]
    fn given_five_confidence_factors_when_resolving_then_config_error() {
        let mut settings = Settings::default();
        settings.analysis.confidence_factors.pop();
        assert!(matches!(
            settings.confidence_factors(),
            Err(ApplicationError::Config { .. })
        ));
    }
}
