// /////////////////////////////////////////////////////////////////////////////
// Resumable Upload Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Application Configuration
//!
//! Bootstrap-phase configuration structure: the minimal, validated subset of
//! settings the CLI needs before it can even construct the engine's
//! [`EngineConfig`](resumable_upload::infrastructure::config::EngineConfig).
//!
//! ## Design Philosophy
//!
//! `AppConfig` holds settings resolved during argument parsing and security
//! validation, before `EngineConfig::load` layers in the TOML file and
//! environment overrides. The two configs are deliberately separate: this one
//! is bootstrap-only (input path, log level, dry-run) and never reaches the
//! engine crate; `EngineConfig` is engine-only and never depends on `clap`.
//!
//! ## Immutability
//!
//! All configuration is **immutable** after creation, so it can be shared
//! across async tasks without synchronization.

use std::path::PathBuf;

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Convert to a tracing `Level`
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }

    /// Parse from the CLI's verbose flag and an optional explicit override
    pub fn resolve(verbose: bool, explicit: Option<&str>) -> Self {
        if let Some(level) = explicit {
            return match level.to_lowercase().as_str() {
                "error" => LogLevel::Error,
                "warn" | "warning" => LogLevel::Warn,
                "debug" => LogLevel::Debug,
                "trace" => LogLevel::Trace,
                _ => LogLevel::Info,
            };
        }
        if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

/// Bootstrap-phase application configuration
///
/// Immutable configuration structure holding all settings resolved before the
/// upload engine itself is constructed.
#[derive(Debug, Clone)]
pub struct AppConfig {
    app_name: String,
    log_level: LogLevel,
    input_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    worker_threads: Option<usize>,
    verbose: bool,
    dry_run: bool,
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input_path.as_ref()
    }

    pub fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    pub fn worker_threads(&self) -> Option<usize> {
        self.worker_threads
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Builder for [`AppConfig`]
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    app_name: Option<String>,
    log_level: Option<LogLevel>,
    input_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    worker_threads: Option<usize>,
    verbose: bool,
    dry_run: bool,
}

impl AppConfigBuilder {
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = Some(path.into());
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// # Panics
    ///
    /// Panics if `app_name` was not set.
    pub fn build(self) -> AppConfig {
        self.try_build().expect("app_name is required")
    }

    pub fn try_build(self) -> Result<AppConfig, String> {
        Ok(AppConfig {
            app_name: self.app_name.ok_or("app_name is required")?,
            log_level: self.log_level.unwrap_or_default(),
            input_path: self.input_path,
            config_path: self.config_path,
            worker_threads: self.worker_threads,
            verbose: self.verbose,
            dry_run: self.dry_run,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder_minimal() {
        let config = AppConfig::builder().app_name("resumable-upload").build();

        assert_eq!(config.app_name(), "resumable-upload");
        assert_eq!(config.log_level(), LogLevel::Info);
        assert!(config.input_path().is_none());
        assert!(!config.is_verbose());
        assert!(!config.is_dry_run());
    }

    #[test]
    fn test_config_builder_full() {
        let config = AppConfig::builder()
            .app_name("resumable-upload")
            .log_level(LogLevel::Debug)
            .input_path("/data/file.csv")
            .config_path("/etc/resumable-upload.toml")
            .worker_threads(8)
            .verbose(true)
            .dry_run(true)
            .build();

        assert_eq!(config.log_level(), LogLevel::Debug);
        assert_eq!(config.input_path(), Some(&PathBuf::from("/data/file.csv")));
        assert_eq!(config.worker_threads(), Some(8));
        assert!(config.is_verbose());
        assert!(config.is_dry_run());
    }

    #[test]
    #[should_panic(expected = "app_name is required")]
    fn test_config_builder_missing_app_name() {
        AppConfig::builder().build();
    }

    #[test]
    fn test_config_try_build_failure() {
        let result = AppConfig::builder().try_build();
        assert!(result.is_err());
    }

    #[test]
    fn test_log_level_resolve() {
        assert_eq!(LogLevel::resolve(false, None), LogLevel::Info);
        assert_eq!(LogLevel::resolve(true, None), LogLevel::Debug);
        assert_eq!(LogLevel::resolve(false, Some("trace")), LogLevel::Trace);
        assert_eq!(LogLevel::resolve(true, Some("error")), LogLevel::Error);
    }

    #[test]
    fn test_log_level_to_tracing() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
