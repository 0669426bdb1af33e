//! Layered configuration: compiled defaults → optional file → `KRS_*` env
//! overrides → validation. Mirrors the teacher's `PolicyBuilder` /
//! `SecurityPolicy` layering (compiled defaults, `with_file`, `with_env`,
//! `build()` validating via the `validator` crate).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ConfigError;

/// Every knob enumerated in `spec.md` §6, with its documented default.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    #[validate(range(min = 1))]
    pub max_chunk_size: usize,
    #[validate(range(min = 1))]
    pub min_chunk_size: usize,
    pub chunk_overlap: usize,

    #[validate(range(min = 1))]
    pub index_batch_size: usize,
    #[validate(range(min = 1))]
    pub graphiti_concurrency: usize,

    #[validate(range(min = 0.0, max = 100.0))]
    pub score_threshold_deprecated: f64,
    #[validate(range(min = 0.0, max = 100.0))]
    pub score_threshold_archive: f64,
    #[validate(range(min = 1))]
    pub cold_archive_days: i64,

    #[validate(range(min = 0.0, max = 1.0))]
    pub conflict_similarity_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub conflict_confidence_threshold: f64,

    pub quality_boost_weight: f64,

    pub admin_channel: String,

    #[validate(range(min = 1))]
    pub auto_escalate_threshold: u32,
    #[validate(range(min = 1))]
    pub escalate_window_hours: i64,

    #[validate(range(min = 1))]
    pub wiki_reqs_per_sec: u32,
    #[validate(range(min = 1))]
    pub breaker_threshold: u32,
    #[validate(range(min = 1))]
    pub cooldown_seconds: u64,

    pub command_prefix: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            min_chunk_size: 100,
            chunk_overlap: 100,
            index_batch_size: 64,
            graphiti_concurrency: 8,
            score_threshold_deprecated: 40.0,
            score_threshold_archive: 10.0,
            cold_archive_days: 30,
            conflict_similarity_threshold: 0.85,
            conflict_confidence_threshold: 0.7,
            quality_boost_weight: 0.2,
            admin_channel: "#knowledge-admin".to_string(),
            auto_escalate_threshold: 3,
            escalate_window_hours: 24,
            wiki_reqs_per_sec: 5,
            breaker_threshold: 5,
            cooldown_seconds: 60,
            command_prefix: "/".to_string(),
        }
    }
}

/// Builder applying the file → env → validate layering. `with_env` overlays
/// are applied last so they always win, matching the teacher's convention
/// that environment variables are the final, most-specific override.
pub struct ConfigBuilder {
    base: ServiceConfig,
    file_path: Option<PathBuf>,
    use_env: bool,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            base: ServiceConfig::default(),
            file_path: None,
            use_env: false,
        }
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self) -> Self {
        self.use_env = true;
        self
    }

    pub fn build(mut self) -> Result<ServiceConfig, ConfigError> {
        if let Some(path) = self.file_path.clone() {
            self.base = load_from_file(&path)?;
        }

        if self.use_env {
            let _ = dotenvy::dotenv();
            apply_env_overrides(&mut self.base)?;
        }

        self.base.validate()?;
        Ok(self.base)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn load_from_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.display().to_string(),
        source,
    })?;

    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            format: "yaml",
            source: Box::new(e),
        }),
        Some("toml") => toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            format: "toml",
            source: Box::new(e),
        }),
        Some("json") => serde_json::from_str(&contents).map_err(|e| ConfigError::Parse {
            format: "json",
            source: Box::new(e),
        }),
        other => Err(ConfigError::UnsupportedFormat(format!("{other:?}"))),
    }
}

macro_rules! env_override {
    ($base:expr, $key:literal, $field:ident, $parse:expr) => {
        if let Ok(raw) = std::env::var(concat!("KRS_", $key)) {
            $base.$field = $parse(&raw).map_err(|_| ConfigError::ProviderUnconfigured {
                provider: $key,
                reason: format!("invalid value for KRS_{}: {raw}", $key),
            })?;
        }
    };
}

fn apply_env_overrides(base: &mut ServiceConfig) -> Result<(), ConfigError> {
    env_override!(base, "MAX_CHUNK_SIZE", max_chunk_size, str::parse::<usize>);
    env_override!(base, "MIN_CHUNK_SIZE", min_chunk_size, str::parse::<usize>);
    env_override!(base, "CHUNK_OVERLAP", chunk_overlap, str::parse::<usize>);
    env_override!(base, "INDEX_BATCH_SIZE", index_batch_size, str::parse::<usize>);
    env_override!(
        base,
        "GRAPHITI_CONCURRENCY",
        graphiti_concurrency,
        str::parse::<usize>
    );
    env_override!(
        base,
        "SCORE_THRESHOLD_DEPRECATED",
        score_threshold_deprecated,
        str::parse::<f64>
    );
    env_override!(
        base,
        "SCORE_THRESHOLD_ARCHIVE",
        score_threshold_archive,
        str::parse::<f64>
    );
    env_override!(base, "COLD_ARCHIVE_DAYS", cold_archive_days, str::parse::<i64>);
    env_override!(
        base,
        "CONFLICT_SIMILARITY_THRESHOLD",
        conflict_similarity_threshold,
        str::parse::<f64>
    );
    env_override!(
        base,
        "CONFLICT_CONFIDENCE_THRESHOLD",
        conflict_confidence_threshold,
        str::parse::<f64>
    );
    env_override!(
        base,
        "QUALITY_BOOST_WEIGHT",
        quality_boost_weight,
        str::parse::<f64>
    );
    if let Ok(raw) = std::env::var("KRS_ADMIN_CHANNEL") {
        base.admin_channel = raw;
    }
    env_override!(
        base,
        "AUTO_ESCALATE_THRESHOLD",
        auto_escalate_threshold,
        str::parse::<u32>
    );
    env_override!(
        base,
        "ESCALATE_WINDOW_HOURS",
        escalate_window_hours,
        str::parse::<i64>
    );
    env_override!(base, "WIKI_REQS_PER_SEC", wiki_reqs_per_sec, str::parse::<u32>);
    env_override!(base, "THRESHOLD", breaker_threshold, str::parse::<u32>);
    env_override!(base, "COOLDOWN_SECONDS", cooldown_seconds, str::parse::<u64>);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = ServiceConfig::default();
        assert_eq!(cfg.max_chunk_size, 1000);
        assert_eq!(cfg.min_chunk_size, 100);
        assert_eq!(cfg.chunk_overlap, 100);
        assert_eq!(cfg.score_threshold_archive, 10.0);
        assert_eq!(cfg.score_threshold_deprecated, 40.0);
        assert_eq!(cfg.cold_archive_days, 30);
        assert_eq!(cfg.conflict_similarity_threshold, 0.85);
        assert_eq!(cfg.conflict_confidence_threshold, 0.7);
        assert_eq!(cfg.quality_boost_weight, 0.2);
        assert_eq!(cfg.auto_escalate_threshold, 3);
        assert_eq!(cfg.escalate_window_hours, 24);
        assert_eq!(cfg.wiki_reqs_per_sec, 5);
        assert_eq!(cfg.breaker_threshold, 5);
        assert_eq!(cfg.cooldown_seconds, 60);
    }

    #[test]
    fn builder_without_file_or_env_validates_defaults() {
        let cfg = ConfigBuilder::new().build().unwrap();
        assert_eq!(cfg.max_chunk_size, 1000);
    }

    #[test]
    fn rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "max_chunk_size=1000").unwrap();
        let err = ConfigBuilder::new().with_file(&path).build().unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
