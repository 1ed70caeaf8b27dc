//! Configuration management for the Manifold CLI.
//!
//! Configuration is merged from environment variables and command-line
//! flags; CLI flags win. The compiler and registry themselves take explicit
//! paths and options — nothing here leaks into the core as ambient state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default source root for prompt documents
    pub source_root: Option<PathBuf>,

    /// Default manifest output path
    pub manifest_out: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `MANIFOLD_SRC`: default source root
    /// - `MANIFOLD_OUT`: default manifest output path
    /// - `RUST_LOG`: log level
    /// - `NO_COLOR`: disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(src) = std::env::var("MANIFOLD_SRC") {
            config.source_root = Some(PathBuf::from(src));
        }

        if let Ok(out) = std::env::var("MANIFOLD_OUT") {
            config.manifest_out = Some(PathBuf::from(out));
        }

        config.log_level = std::env::var("RUST_LOG").ok();

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables.
    pub fn with_overrides(
        mut self,
        source_root: Option<PathBuf>,
        manifest_out: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(source_root) = source_root {
            self.source_root = Some(source_root);
        }

        if let Some(manifest_out) = manifest_out {
            self.manifest_out = Some(manifest_out);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Resolve the source root, failing when neither flag nor env set one.
    pub fn require_source_root(&self) -> AppResult<&PathBuf> {
        self.source_root
            .as_ref()
            .ok_or_else(|| AppError::Config("No source root given (--src or MANIFOLD_SRC)".into()))
    }

    /// Resolve the manifest output path, failing when unset.
    pub fn require_manifest_out(&self) -> AppResult<&PathBuf> {
        self.manifest_out
            .as_ref()
            .ok_or_else(|| AppError::Config("No output path given (--out or MANIFOLD_OUT)".into()))
    }
}
