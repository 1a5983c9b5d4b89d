//! mrjar configuration system
//!
//! Provides configuration management for mrjar builds:
//! - Project configuration (`mrjar.toml` with a `[project]` table)
//! - Workspace configuration (`mrjar.toml` with a `[workspace]` table)
//! - Environment variable overrides (`MRJAR_*`)
//! - Repository-extension registration
//!
//! # Configuration Hierarchy
//!
//! Later sources override earlier ones:
//! 1. Project config (`./mrjar.toml`)
//! 2. Environment variables (`MRJAR_*`)
//! 3. CLI flags (handled by the caller)
//!
//! # Example
//!
//! ```no_run
//! use mrjar_config::ConfigLoader;
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let workspace = loader.load_workspace(Path::new(".")).unwrap();
//! for unit in &workspace.units {
//!     println!("{} at {}", unit.name(), unit.root.display());
//! }
//! ```

pub mod loader;
pub mod project;
pub mod repository;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Workspace member '{member}' has no mrjar.toml")]
    MissingMember { member: PathBuf },

    #[error("Malformed URL for repository '{name}': '{url}' ({reason})")]
    MalformedUrl {
        name: String,
        url: String,
        reason: String,
    },

    #[error("Repository '{0}' is already registered")]
    DuplicateRepository(String),

    #[error("Unknown repository '{0}'")]
    UnknownRepository(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{ConfigLoader, UnitConfig, WorkspaceConfig};
pub use project::{CompilerConfig, ProjectConfig, ProjectSection, VariantsConfig, CONFIG_FILE_NAME};
pub use repository::{
    register_repository_extensions, ExtensionRegistry, MavenRepository, RemoteRepository,
    RepositoryExtension, RepositoryFilter, RepositoryHandler,
};
