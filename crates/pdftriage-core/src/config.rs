use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, Level};

use crate::context::ParseLimits;
use crate::error::ConfigError;
use crate::runner::AnalysisOptions;
use crate::security_log::{SecurityDomain, SecurityEvent, Severity};

const MAX_CONFIG_BYTES: u64 = 1024 * 1024;
const MAX_PAGES: usize = 1_000_000;
const MAX_ANNOTATIONS: usize = 10_000_000;
const MAX_OBJECTS: usize = 10_000_000;
const MAX_DECODE_BYTES: usize = 512 * 1024 * 1024;
const MAX_TOTAL_DECODE_BYTES: usize = 2 * 1024 * 1024 * 1024;
const MAX_DOCUMENT_BYTES: usize = 2 * 1024 * 1024 * 1024;
const MAX_TIME_BUDGET_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    pub analysis: Option<AnalysisConfig>,
    pub profiles: Option<HashMap<String, Profile>>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Profile {
    pub analysis: Option<AnalysisConfig>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct AnalysisConfig {
    pub max_pages: Option<usize>,
    pub max_annotations: Option<usize>,
    pub max_objects: Option<usize>,
    pub max_decode_bytes: Option<usize>,
    pub max_total_decoded_bytes: Option<usize>,
    pub max_document_bytes: Option<usize>,
    pub recover_xref: Option<bool>,
    pub parallel: Option<bool>,
    pub time_budget_ms: Option<u64>,
}

impl Config {
    /// Reads a TOML or YAML file, picked by extension. Unknown extensions
    /// try TOML first.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if let Ok(meta) = fs::metadata(path) {
            if meta.len() > MAX_CONFIG_BYTES {
                return Err(ConfigError::TooLarge { path: path.to_path_buf(), limit: MAX_CONFIG_BYTES });
            }
        }
        let data =
            fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml(&data),
            Some("yaml") | Some("yml") => Self::from_yaml(&data),
            _ => Self::from_toml(&data).or_else(|_| Self::from_yaml(&data)),
        }
    }

    pub fn from_toml(data: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(data)?)
    }

    pub fn from_yaml(data: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Applies `[analysis]`, then the named profile on top of it. Values that
    /// are zero or above their ceiling are rejected and the current value kept.
    pub fn apply(
        &self,
        limits: &mut ParseLimits,
        options: &mut AnalysisOptions,
        profile: Option<&str>,
    ) -> Result<(), ConfigError> {
        if let Some(analysis) = &self.analysis {
            apply_analysis(analysis, limits, options);
        }
        if let Some(name) = profile {
            let selected = self.profiles.as_ref().and_then(|p| p.get(name));
            let Some(selected) = selected else {
                return Err(ConfigError::UnknownProfile(name.to_string()));
            };
            if let Some(analysis) = &selected.analysis {
                info!(profile = name, "Applying config profile");
                apply_analysis(analysis, limits, options);
            }
        }
        Ok(())
    }
}

fn apply_analysis(cfg: &AnalysisConfig, limits: &mut ParseLimits, options: &mut AnalysisOptions) {
    if let Some(v) = bounded("max_pages", cfg.max_pages, MAX_PAGES) {
        options.max_pages = v;
    }
    if let Some(v) = bounded("max_annotations", cfg.max_annotations, MAX_ANNOTATIONS) {
        options.max_annotations = v;
    }
    if let Some(v) = bounded("max_objects", cfg.max_objects, MAX_OBJECTS) {
        limits.max_objects = v;
    }
    if let Some(v) = bounded("max_decode_bytes", cfg.max_decode_bytes, MAX_DECODE_BYTES) {
        limits.max_decode_bytes = v;
    }
    if let Some(v) = bounded("max_total_decoded_bytes", cfg.max_total_decoded_bytes, MAX_TOTAL_DECODE_BYTES) {
        limits.max_total_decoded_bytes = v;
    }
    if let Some(v) = bounded("max_document_bytes", cfg.max_document_bytes, MAX_DOCUMENT_BYTES) {
        limits.max_document_bytes = v;
    }
    if let Some(v) = bounded("time_budget_ms", cfg.time_budget_ms, MAX_TIME_BUDGET_MS) {
        options.time_budget_ms = Some(v);
    }
    if let Some(v) = cfg.recover_xref {
        info!(value = v, "Config override recover_xref");
        limits.recover_xref = v;
    }
    if let Some(v) = cfg.parallel {
        info!(value = v, "Config override parallel");
        options.parallel = v;
    }
}

fn bounded<T>(key: &str, value: Option<T>, ceiling: T) -> Option<T>
where
    T: Copy + PartialOrd + Default + std::fmt::Display,
{
    let v = value?;
    if v == T::default() || v > ceiling {
        let message = format!("Invalid config value {key} = {v} (limit {ceiling}); keeping default");
        SecurityEvent {
            level: Level::WARN,
            domain: SecurityDomain::Config,
            severity: Severity::Low,
            kind: "invalid_config_value",
            page: None,
            message: &message,
        }
        .emit();
        return None;
    }
    info!(key, value = %v, "Config override");
    Some(v)
}
