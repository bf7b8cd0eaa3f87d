//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::bundle::registry::{DEFAULT_COMPONENT_DIRS, DEFAULT_COMPONENT_EXCLUDE};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Runtime mode; selects development conveniences.
    pub mode: Mode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Client bundling for SPA pages.
    pub bundler: BundlerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    pub fn is_development(&self) -> bool {
        self.mode == Mode::Development
    }
}

/// Runtime mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { body_bytes: 1024 * 1024 }
    }
}

/// Client bundler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BundlerConfig {
    /// Build program invoked per component.
    pub program: String,

    /// Arguments passed before the entry file.
    pub args: Vec<String>,

    /// Reuse built bundles until the source changes.
    pub cache: bool,

    /// Minify bundles. Defaults to on in production.
    pub minify: Option<bool>,

    /// Inline source maps. Defaults to on in development.
    pub sourcemap: Option<bool>,

    /// Invalidate bundles when component files change (development only).
    pub watch: bool,

    /// Directories scanned for `"use spa"` components.
    pub component_dirs: Vec<String>,

    /// Directory names skipped while scanning.
    pub component_exclude: Vec<String>,

    /// Maximum number of cached props scripts.
    pub props_cache_capacity: usize,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            program: "esbuild".to_string(),
            args: vec!["--bundle".to_string(), "--format=esm".to_string()],
            cache: true,
            minify: None,
            sourcemap: None,
            watch: true,
            component_dirs: DEFAULT_COMPONENT_DIRS.iter().map(|d| d.to_string()).collect(),
            component_exclude: DEFAULT_COMPONENT_EXCLUDE.iter().map(|d| d.to_string()).collect(),
            props_cache_capacity: 1024,
        }
    }
}

impl BundlerConfig {
    pub fn minify(&self, mode: Mode) -> bool {
        self.minify.unwrap_or(mode == Mode::Production)
    }

    pub fn sourcemap(&self, mode: Mode) -> bool {
        self.sourcemap.unwrap_or(mode == Mode::Development)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.limits.body_bytes, 1_048_576);
        assert_eq!(config.bundler.program, "esbuild");
        assert_eq!(config.bundler.component_dirs, vec!["src", "app", "pages", "components"]);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_bundle_option_defaults_follow_mode() {
        let bundler = BundlerConfig::default();
        assert!(!bundler.minify(Mode::Development));
        assert!(bundler.minify(Mode::Production));
        assert!(bundler.sourcemap(Mode::Development));
        assert!(!bundler.sourcemap(Mode::Production));

        let bundler = BundlerConfig {
            minify: Some(true),
            ..BundlerConfig::default()
        };
        assert!(bundler.minify(Mode::Development));
    }

    #[test]
    fn test_partial_toml() {
        let config: ServerConfig = toml::from_str(
            r#"
            mode = "production"

            [listener]
            bind_address = "127.0.0.1:8080"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.timeouts.request_secs, 30);
        assert!(config.bundler.cache);
    }
}
