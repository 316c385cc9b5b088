//! Configuration loader using figment.
//!
//! # Feature Flags
//!
//! - `toml-config`: `courier.toml` / `config.toml`
//! - `yaml-config`: `courier.yaml` / `courier.yml`
//!
//! # Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile file (`courier.{profile}.toml`)
//! 3. Main file (`courier.toml`)
//! 4. Environment variables (`COURIER_*`)
//! 5. Programmatic overrides ([`ConfigLoader::merge`])
//!
//! Environment variables use `__` as the section separator:
//!
//! - `COURIER_BOT__TOKEN=123:abc` → `bot.token`
//! - `COURIER_INGESTION__MODE=webhook` → `ingestion.mode`
//! - `COURIER_LOGGING__LEVEL=debug` → `logging.level`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .merge(serde_json::json!({ "polling": { "limit": 50 } }))
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::CourierConfig;
use super::validation::validate_config;

const ENV_PREFIX: &str = "COURIER_";
const PROFILE_VAR: &str = "COURIER_PROFILE";
const APP_DIR: &str = "courier";

#[cfg(feature = "toml-config")]
const TOML_NAMES: &[&str] = &["courier.toml", "config.toml"];
#[cfg(feature = "yaml-config")]
const YAML_NAMES: &[&str] = &["courier.yaml", "courier.yml"];

/// Deployment profile selecting `courier.{profile}.*` overlays.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Reads `COURIER_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }

    fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    profile: Profile,
    search_paths: Vec<PathBuf>,
    config_file: Option<PathBuf>,
    load_env: bool,
    overrides: Vec<Serialized<serde_json::Value>>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            config_file: None,
            load_env: true,
            overrides: Vec::new(),
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory to search. Without any, the current directory and
    /// the user config directory (`~/.config/courier`) are searched.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching. A missing file is an
    /// error.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Layers `overrides` on top of every other source. Any serializable
    /// value with the config's shape works, including partial `json!` trees.
    pub fn merge<T: Serialize>(mut self, overrides: T) -> Self {
        match serde_json::to_value(overrides) {
            Ok(value) => self.overrides.push(Serialized::defaults(value)),
            Err(e) => warn!(error = %e, "Ignoring unserializable configuration override"),
        }
        self
    }

    /// Extracts the configuration without validating it.
    pub fn load(self) -> ConfigResult<CourierConfig> {
        let profile = self.profile.clone();
        let config: CourierConfig = self.figment()?.extract()?;

        debug!(
            profile = %profile,
            mode = %config.ingestion.mode,
            logging_level = %config.logging.level,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Extracts and validates the configuration.
    pub fn load_validated(self) -> ConfigResult<CourierConfig> {
        let config = self.load()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(CourierConfig::default()));

        match &self.config_file {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                figment = merge_file(figment, path)?;
            }
            Some(path) => return Err(ConfigError::FileNotFound { path: path.clone() }),
            None => figment = self.search(figment),
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        for overrides in self.overrides {
            figment = figment.merge(overrides);
        }

        Ok(figment)
    }

    fn resolved_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR));
        }
        paths
    }

    fn search(&self, mut figment: Figment) -> Figment {
        let paths = self.resolved_search_paths();
        #[allow(unused_mut)]
        let mut names: Vec<&str> = Vec::new();
        #[cfg(feature = "toml-config")]
        names.extend_from_slice(TOML_NAMES);
        #[cfg(feature = "yaml-config")]
        names.extend_from_slice(YAML_NAMES);

        // The first directory holding a main file wins.
        for dir in &paths {
            let mut found = false;
            for name in &names {
                if let Some(overlay) = profile_variant(name, &self.profile) {
                    let overlay = dir.join(overlay);
                    if overlay.exists() {
                        debug!(path = %overlay.display(), "Loading profile configuration");
                        figment = merge_file(figment.clone(), &overlay).unwrap_or(figment);
                    }
                }

                let main = dir.join(name);
                if main.exists() {
                    info!(path = %main.display(), "Loading configuration file");
                    figment = merge_file(figment.clone(), &main).unwrap_or(figment);
                    found = true;
                    break;
                }
            }
            if found {
                return figment;
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

/// `courier.toml` + `production` → `courier.production.toml`.
fn profile_variant(name: &str, profile: &Profile) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    Some(format!("{}.{}.{}", stem, profile.as_str(), ext))
}

fn merge_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => {
            let _ = figment;
            Err(ConfigError::ParseError(format!(
                "Unsupported or disabled configuration file format: .{ext}"
            )))
        }
    }
}

/// Loads from the default locations.
pub fn load_config() -> ConfigResult<CourierConfig> {
    ConfigLoader::new().load_validated()
}

/// Loads `path` plus environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<CourierConfig> {
    ConfigLoader::new().file(path).load_validated()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{IngestionMode, LogLevel};

    use figment::Jail;

    #[test]
    fn defaults_without_any_source() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.ingestion.mode, IngestionMode::Polling);
            assert_eq!(config.polling.limit, 100);
            assert_eq!(config.polling.interval_ms, 1000);
            assert_eq!(config.webhook.path, "/");
            assert_eq!(config.logging.level, LogLevel::Info);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "courier.toml",
                r#"
                [bot]
                token = "from-file"

                [polling]
                limit = 20
                "#,
            )?;
            jail.set_env("COURIER_BOT__TOKEN", "from-env");
            jail.set_env("COURIER_INGESTION__MODE", "webhook");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.bot.token, "from-env");
            assert_eq!(config.polling.limit, 20);
            assert_eq!(config.ingestion.mode, IngestionMode::Webhook);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn profile_overlay_is_below_main_file() {
        Jail::expect_with(|jail| {
            jail.create_file("courier.production.toml", "[polling]\nlimit = 5\ninterval_ms = 250")?;
            jail.create_file("courier.toml", "[polling]\nlimit = 50")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.polling.limit, 50);
            assert_eq!(config.polling.interval_ms, 250);
            Ok(())
        });
    }

    #[test]
    fn programmatic_overrides_win() {
        Jail::expect_with(|jail| {
            jail.set_env("COURIER_POLLING__LIMIT", "10");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(serde_json::json!({ "polling": { "limit": 3 } }))
                .load()
                .map_err(|e| e.to_string())?;

            assert_eq!(config.polling.limit, 3);
            assert_eq!(config.polling.timeout_secs, 60);
            Ok(())
        });
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let result = ConfigLoader::new()
            .file("/nonexistent/courier.toml")
            .without_env()
            .load();

        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn profile_names_are_normalized() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging"), Profile::Custom("staging".into()));
        assert_eq!(
            profile_variant("courier.toml", &Profile::Production).as_deref(),
            Some("courier.production.toml")
        );
    }
}
