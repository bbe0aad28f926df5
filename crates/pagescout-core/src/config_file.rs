//! TOML configuration files.
//!
//! Two locations are read at startup: the user-level file under the
//! platform config directory (`pagescout/config.toml`) and a per-project
//! `.pagescout.toml` in the working directory. The project file overlays
//! the user file field by field; command-line flags and environment
//! variables override both.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::rate_limit::RateLimiters;
use crate::Config;

pub const PROJECT_FILE: &str = ".pagescout.toml";

#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub api_keys: ApiKeysSection,
    pub sources: SourcesSection,
    pub cache: CacheSection,
    pub llm: LlmSection,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiKeysSection {
    pub semantic_scholar: Option<String>,
    pub crossref_mailto: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SourcesSection {
    pub order: Option<Vec<String>>,
    pub disabled: Option<Vec<String>>,
    pub timeout_secs: Option<u64>,
    pub accept_threshold: Option<f64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub path: Option<PathBuf>,
    pub positive_ttl_days: Option<u64>,
    pub negative_ttl_hours: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
}

/// Location of the user-level configuration file.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pagescout").join("config.toml"))
}

impl ConfigFile {
    /// Load and merge the user and project files. Missing files are fine;
    /// unparseable ones are reported and skipped.
    pub fn load() -> Self {
        let mut merged = ConfigFile::default();
        if let Some(user_path) = user_config_path() {
            merged = merged.overlay(Self::load_optional(&user_path));
        }
        merged.overlay(Self::load_optional(Path::new(PROJECT_FILE)))
    }

    fn load_optional(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::from_path(path) {
            Ok(file) => {
                tracing::debug!(path = %path.display(), "loaded config file");
                file
            }
            Err(e) => {
                tracing::warn!(error = %e, "ignoring config file");
                Self::default()
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigFileError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Field-wise merge; set fields in `other` win.
    pub fn overlay(self, other: Self) -> Self {
        Self {
            api_keys: ApiKeysSection {
                semantic_scholar: other.api_keys.semantic_scholar.or(self.api_keys.semantic_scholar),
                crossref_mailto: other.api_keys.crossref_mailto.or(self.api_keys.crossref_mailto),
            },
            sources: SourcesSection {
                order: other.sources.order.or(self.sources.order),
                disabled: other.sources.disabled.or(self.sources.disabled),
                timeout_secs: other.sources.timeout_secs.or(self.sources.timeout_secs),
                accept_threshold: other.sources.accept_threshold.or(self.sources.accept_threshold),
            },
            cache: CacheSection {
                path: other.cache.path.or(self.cache.path),
                positive_ttl_days: other.cache.positive_ttl_days.or(self.cache.positive_ttl_days),
                negative_ttl_hours: other.cache.negative_ttl_hours.or(self.cache.negative_ttl_hours),
            },
            llm: LlmSection {
                enabled: other.llm.enabled.or(self.llm.enabled),
                base_url: other.llm.base_url.or(self.llm.base_url),
                model: other.llm.model.or(self.llm.model),
                api_key: other.llm.api_key.or(self.llm.api_key),
                temperature: other.llm.temperature.or(self.llm.temperature),
                max_tokens: other.llm.max_tokens.or(self.llm.max_tokens),
                timeout_secs: other.llm.timeout_secs.or(self.llm.timeout_secs),
            },
        }
    }

    /// Fold the file's settings into a base [`Config`].
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(key) = self.api_keys.semantic_scholar {
            config.s2_api_key = Some(key);
        }
        if let Some(mailto) = self.api_keys.crossref_mailto {
            config.crossref_mailto = Some(mailto);
        }
        if let Some(order) = self.sources.order {
            config.source_order = order;
        }
        if let Some(disabled) = self.sources.disabled {
            config.disabled_sources = disabled;
        }
        if let Some(secs) = self.sources.timeout_secs {
            config.source_timeout_secs = secs;
        }
        if let Some(threshold) = self.sources.accept_threshold {
            config.accept_threshold = threshold;
        }
        if let Some(path) = self.cache.path {
            config.cache_path = Some(path);
        }
        if let Some(days) = self.cache.positive_ttl_days {
            config.cache_positive_ttl_secs = days * 24 * 60 * 60;
        }
        if let Some(hours) = self.cache.negative_ttl_hours {
            config.cache_negative_ttl_secs = hours * 60 * 60;
        }
        if let Some(enabled) = self.llm.enabled {
            config.llm.enabled = enabled;
        }
        if let Some(base_url) = self.llm.base_url {
            config.llm.base_url = base_url;
        }
        if let Some(model) = self.llm.model {
            config.llm.model = model;
        }
        if let Some(api_key) = self.llm.api_key {
            config.llm.api_key = Some(api_key);
        }
        if let Some(temperature) = self.llm.temperature {
            config.llm.temperature = temperature;
        }
        if let Some(max_tokens) = self.llm.max_tokens {
            config.llm.max_tokens = max_tokens;
        }
        if let Some(secs) = self.llm.timeout_secs {
            config.llm.timeout_secs = secs;
        }
        // Credentials change source quotas.
        config.rate_limiters = Arc::new(RateLimiters::new(
            config.s2_api_key.is_some(),
            config.crossref_mailto.is_some(),
        ));
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
        [api_keys]
        semantic_scholar = "s2-key"
        crossref_mailto = "librarian@example.org"

        [sources]
        order = ["crossref", "dblp"]
        disabled = ["neurips"]
        timeout_secs = 20
        accept_threshold = 0.9

        [cache]
        path = "/tmp/pagescout/cache.db"
        positive_ttl_days = 7
        negative_ttl_hours = 6

        [llm]
        enabled = true
        model = "gpt-4o"
        api_key = "sk-test"
    "#;

    #[test]
    fn parses_all_sections() {
        let file: ConfigFile = toml::from_str(FULL).unwrap();
        assert_eq!(file.api_keys.semantic_scholar.as_deref(), Some("s2-key"));
        assert_eq!(
            file.sources.order.as_deref(),
            Some(&["crossref".to_string(), "dblp".to_string()][..])
        );
        assert_eq!(file.cache.positive_ttl_days, Some(7));
        assert_eq!(file.llm.enabled, Some(true));
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let file: ConfigFile = toml::from_str("").unwrap();
        assert_eq!(file, ConfigFile::default());
    }

    #[test]
    fn partial_file_leaves_rest_unset() {
        let file: ConfigFile = toml::from_str("[llm]\nmodel = \"local\"\n").unwrap();
        assert_eq!(file.llm.model.as_deref(), Some("local"));
        assert_eq!(file.llm.api_key, None);
        assert_eq!(file.api_keys, ApiKeysSection::default());
    }

    #[test]
    fn overlay_prefers_later_file() {
        let base: ConfigFile = toml::from_str(FULL).unwrap();
        let project: ConfigFile =
            toml::from_str("[sources]\ntimeout_secs = 5\n[llm]\nmodel = \"local\"\n").unwrap();
        let merged = base.overlay(project);
        assert_eq!(merged.sources.timeout_secs, Some(5));
        assert_eq!(merged.llm.model.as_deref(), Some("local"));
        // Untouched fields fall through from the base.
        assert_eq!(merged.sources.accept_threshold, Some(0.9));
        assert_eq!(merged.llm.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn apply_folds_into_config() {
        let file: ConfigFile = toml::from_str(FULL).unwrap();
        let config = file.apply(Config::default());
        assert_eq!(config.s2_api_key.as_deref(), Some("s2-key"));
        assert_eq!(config.source_order, vec!["crossref", "dblp"]);
        assert_eq!(config.disabled_sources, vec!["neurips"]);
        assert_eq!(config.accept_threshold, 0.9);
        assert_eq!(config.cache_positive_ttl_secs, 7 * 24 * 60 * 60);
        assert_eq!(config.cache_negative_ttl_secs, 6 * 60 * 60);
        assert!(config.llm.enabled);
        assert_eq!(config.llm.model, "gpt-4o");
        // Temperature stays at the built-in default.
        assert_eq!(config.llm.temperature, 0.3);
    }

    #[test]
    fn apply_rebuilds_rate_limiters_for_credentials() {
        let file: ConfigFile = toml::from_str(FULL).unwrap();
        let config = file.apply(Config::default());
        let without = Config::default();
        assert!(
            config.rate_limiters.current_interval("semantic_scholar").unwrap()
                < without.rate_limiters.current_interval("semantic_scholar").unwrap()
        );
    }

    #[test]
    fn unreadable_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "not [valid toml").unwrap();
        assert!(matches!(
            ConfigFile::from_path(&path),
            Err(ConfigFileError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            ConfigFile::from_path(Path::new("/definitely/not/here.toml")),
            Err(ConfigFileError::Io { .. })
        ));
    }
}
