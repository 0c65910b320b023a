//! Workspace configuration for Recall.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Environment variables
//! - Explicit overrides
//! - Config file (.recall/config.yaml)
//!
//! Store-specific settings live in the `store` section of the same file and
//! are read by `recall-store`; this module only owns the workspace and
//! logging sections.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const RECALL_DIR: &str = ".recall";

/// Name of the YAML config file inside [`RECALL_DIR`].
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .recall/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Sections of the config file owned by this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceConfig {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `RECALL_WORKSPACE`: Override workspace path
    /// - `RECALL_CONFIG`: Path to config file
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("RECALL_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Ok(config_file) = std::env::var("RECALL_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        config = config.load_file()?;

        // Environment variables override YAML config
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Load configuration for an explicit workspace, ignoring the environment.
    pub fn for_workspace(workspace: impl Into<PathBuf>) -> AppResult<Self> {
        let config = Self {
            workspace: workspace.into(),
            ..Self::default()
        };
        config.load_file()
    }

    fn load_file(self) -> AppResult<Self> {
        if !self.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                self.workspace
            )));
        }

        let config_path = self.config_path();
        if config_path.exists() {
            self.merge_yaml(&config_path)
        } else {
            Ok(self)
        }
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(ws) = config_file.workspace {
            if let Some(path) = ws.path {
                result.workspace = PathBuf::from(path);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply explicit overrides, giving them precedence over the environment.
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
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

    /// Get the path to the .recall directory.
    pub fn recall_dir(&self) -> PathBuf {
        self.workspace.join(RECALL_DIR)
    }

    /// Path of the YAML config file in effect.
    pub fn config_path(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| self.recall_dir().join(CONFIG_FILE_NAME))
    }

    /// Ensure the .recall directory exists.
    pub fn ensure_recall_dir(&self) -> AppResult<()> {
        let recall_dir = self.recall_dir();
        if !recall_dir.exists() {
            std::fs::create_dir_all(&recall_dir).map_err(|e| {
                AppError::Config(format!("Failed to create .recall directory: {}", e))
            })?;
        }
        Ok(())
    }
}
