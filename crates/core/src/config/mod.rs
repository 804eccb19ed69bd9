//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRECACHE_*)
//! 2. TOML config file (if PRECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

mod validation;

pub use validation::ConfigError;

/// When a strategy's cache write completes relative to its returned response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheWriteMode {
    /// The write finishes before the response is handed back.
    #[default]
    Await,
    /// The write runs on its own task and outlives the request.
    Detached,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRECACHE_*)
/// 2. TOML config file (if PRECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Stable part of the cache generation name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Version suffix of the cache generation name.
    ///
    /// Bumping it is the only upgrade mechanism: the next activation deletes
    /// every generation with a different name.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Base URL the worker controls. Manifest entries resolve against it and
    /// its origin decides which requests count as same-origin.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Filename of the main document, always served network-first.
    #[serde(default = "default_main_document")]
    pub main_document: String,

    /// Assets written into the generation at install time.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Match cache-first lookups without comparing query strings.
    #[serde(default = "default_true")]
    pub ignore_search: bool,

    /// Extensions (without the dot) that cache-first may back-fill.
    ///
    /// Unset means every fetched asset is cached.
    #[serde(default)]
    pub cache_extensions: Option<Vec<String>>,

    #[serde(default)]
    pub cache_writes: CacheWriteMode,

    /// Path to SQLite cache database.
    ///
    /// Set via PRECACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to read per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds; 0 disables the timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cache_prefix() -> String {
    "precache".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_main_document() -> String {
    "index.html".into()
}

fn default_manifest() -> Vec<String> {
    ["./", "index.html", "manifest.json", "icon-192x192.png", "icon-512x512.png"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./precache.sqlite")
}

fn default_user_agent() -> String {
    "precache/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            scope: default_scope(),
            main_document: default_main_document(),
            manifest: default_manifest(),
            ignore_search: true,
            cache_extensions: None,
            cache_writes: CacheWriteMode::default(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Immutable settings handed to the lifecycle manager and interceptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Name of the current cache generation.
    pub cache_name: String,
    pub scope: Url,
    pub main_document: String,
    /// Manifest entries resolved against `scope`, in declaration order.
    pub manifest: Vec<Url>,
    pub ignore_search: bool,
    /// Lower-cased extensions without the leading dot.
    pub cache_extensions: Option<Vec<String>>,
    pub cache_writes: CacheWriteMode,
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }

    /// Name of the current cache generation, e.g. `precache-v1`.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.cache_version)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRECACHE_`
    /// 2. TOML file from `PRECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PRECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PRECACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Build the worker settings, resolving the scope and manifest URLs.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the scope or a manifest entry
    /// cannot be parsed as a URL.
    pub fn worker(&self) -> Result<WorkerConfig, ConfigError> {
        let scope = self.scope_url()?;

        let manifest = self
            .manifest
            .iter()
            .map(|entry| {
                scope
                    .join(entry)
                    .map_err(|e| ConfigError::Invalid { field: "manifest".into(), reason: format!("{entry}: {e}") })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let cache_extensions = self.cache_extensions.as_ref().map(|exts| {
            exts.iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect()
        });

        Ok(WorkerConfig {
            cache_name: self.cache_name(),
            scope,
            main_document: self.main_document.clone(),
            manifest,
            ignore_search: self.ignore_search,
            cache_extensions,
            cache_writes: self.cache_writes,
        })
    }

    /// Parse the scope, treating it as a directory.
    pub(crate) fn scope_url(&self) -> Result<Url, ConfigError> {
        let raw = if self.scope.ends_with('/') { self.scope.clone() } else { format!("{}/", self.scope) };
        let url = Url::parse(&raw).map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => {
                Err(ConfigError::Invalid { field: "scope".into(), reason: format!("unsupported scheme: {scheme}") })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_name(), "precache-v1");
        assert_eq!(config.main_document, "index.html");
        assert_eq!(config.manifest.len(), 5);
        assert!(config.ignore_search);
        assert!(config.cache_extensions.is_none());
        assert_eq!(config.cache_writes, CacheWriteMode::Await);
        assert_eq!(config.db_path, PathBuf::from("./precache.sqlite"));
        assert_eq!(config.max_bytes, 5_242_880);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Some(Duration::from_millis(20_000)));

        let config = AppConfig { timeout_ms: 0, ..Default::default() };
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_worker_resolves_manifest_against_scope() {
        let config = AppConfig { scope: "https://example.github.io/app".into(), ..Default::default() };
        let worker = config.worker().unwrap();

        assert_eq!(worker.scope.as_str(), "https://example.github.io/app/");
        let urls: Vec<&str> = worker.manifest.iter().map(Url::as_str).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.github.io/app/",
                "https://example.github.io/app/index.html",
                "https://example.github.io/app/manifest.json",
                "https://example.github.io/app/icon-192x192.png",
                "https://example.github.io/app/icon-512x512.png",
            ]
        );
    }

    #[test]
    fn test_worker_normalizes_extensions() {
        let config =
            AppConfig { cache_extensions: Some(vec![".HTML".into(), "json".into(), ".png".into()]), ..Default::default() };
        let worker = config.worker().unwrap();
        assert_eq!(worker.cache_extensions, Some(vec!["html".into(), "json".into(), "png".into()]));
    }

    #[test]
    fn test_worker_rejects_bad_scope() {
        let config = AppConfig { scope: "not a url".into(), ..Default::default() };
        assert!(matches!(config.worker(), Err(ConfigError::Invalid { field, .. }) if field == "scope"));
    }

    #[test]
    fn test_cache_write_mode_deserializes_lowercase() {
        let mode: CacheWriteMode = serde_json::from_str("\"detached\"").unwrap();
        assert_eq!(mode, CacheWriteMode::Detached);
    }
}
