use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "catalogue.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub debounce_ms: u64,
    pub seed_path: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            seed_path: None,
            log_filter: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    debounce_ms: Option<u64>,
    seed_path: Option<PathBuf>,
    log_filter: Option<String>,
}

/// Defaults, then the config file, then the process environment.
///
/// Without an explicit `config_path` a missing `catalogue.toml` in the working directory is
/// fine; an explicit path that cannot be read is an error.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    match fs::read_to_string(path) {
        Ok(raw) => apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?,
        Err(err) if err.kind() == io::ErrorKind::NotFound && config_path.is_none() => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file '{}'", path.display()))
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.debounce_ms {
        settings.debounce_ms = v;
    }
    if let Some(v) = file_cfg.seed_path {
        settings.seed_path = Some(v);
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    for key in ["CATALOGUE_DEBOUNCE_MS", "APP__DEBOUNCE_MS"] {
        if let Some(parsed) = lookup(key).and_then(|v| v.trim().parse::<u64>().ok()) {
            settings.debounce_ms = parsed;
        }
    }

    for key in ["CATALOGUE_SEED_PATH", "APP__SEED_PATH"] {
        if let Some(v) = lookup(key).filter(|v| !v.trim().is_empty()) {
            settings.seed_path = Some(PathBuf::from(v));
        }
    }

    for key in ["CATALOGUE_LOG", "APP__LOG_FILTER"] {
        if let Some(v) = lookup(key).filter(|v| !v.trim().is_empty()) {
            settings.log_filter = v;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
