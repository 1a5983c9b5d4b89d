//! Project Configuration (mrjar.toml)
//!
//! Handles the per-unit configuration stored in `mrjar.toml` at a project root,
//! and the `[workspace]` table used by a multi-project root.

use crate::repository::RemoteRepository;
use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// File name of every project and workspace configuration
pub const CONFIG_FILE_NAME: &str = "mrjar.toml";

/// Base release used when `project.release` is omitted
pub const DEFAULT_BASE_RELEASE: u32 = 8;

/// Highest release scanned when `variants.supported` is omitted
pub const MAX_SUPPORTED_RELEASE: u32 = 25;

/// Configuration from mrjar.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project metadata; absent for a pure workspace root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectSection>,

    /// Workspace members; absent for a leaf project
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace: Option<WorkspaceSection>,

    /// Release variant layout
    #[serde(default)]
    pub variants: VariantsConfig,

    /// Compiler invocation
    #[serde(default)]
    pub compiler: CompilerConfig,

    /// Repository extension records declared by this project
    #[serde(default, rename = "repository")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repository_declarations: Vec<RemoteRepository>,
}

/// `[project]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    /// Project name, also the archive's base name
    pub name: String,

    /// Project version (semver)
    pub version: String,

    /// Base release: the bytecode baseline of the root archive entries
    #[serde(default = "default_base_release")]
    pub release: u32,

    /// Names of other workspace projects this project compiles against
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    /// Repository accessors to invoke for this project
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<String>,
}

/// `[workspace]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WorkspaceSection {
    /// Member directories, relative to the workspace root
    pub members: Vec<PathBuf>,
}

/// `[variants]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct VariantsConfig {
    /// Source set name: `src/<source-set>/java`, `src/<source-set>/java<N>`
    #[serde(default = "default_source_set")]
    pub source_set: String,

    /// Releases that may carry a variant directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported: Option<Vec<u32>>,

    /// Reject release overrides that have no base counterpart
    #[serde(default = "default_true")]
    pub strict_overrides: bool,
}

impl Default for VariantsConfig {
    fn default() -> Self {
        Self {
            source_set: default_source_set(),
            supported: None,
            strict_overrides: true,
        }
    }
}

/// `[compiler]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CompilerConfig {
    /// Compiler executable
    #[serde(default = "default_javac")]
    pub javac: String,

    /// Extra arguments passed to every compile
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            javac: default_javac(),
            args: Vec::new(),
        }
    }
}

fn default_base_release() -> u32 {
    DEFAULT_BASE_RELEASE
}

fn default_source_set() -> String {
    "main".to_string()
}

fn default_javac() -> String {
    "javac".to_string()
}

fn default_true() -> bool {
    true
}

impl ProjectConfig {
    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load and validate configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.project.is_none() && self.workspace.is_none() {
            return Err(ConfigError::ValidationError(
                "mrjar.toml must declare a [project] or a [workspace] table".to_string(),
            ));
        }

        if let Some(project) = &self.project {
            validate_project(project)?;

            if let Some(supported) = &self.variants.supported {
                for release in supported {
                    if *release <= project.release {
                        return Err(ConfigError::InvalidValue {
                            field: "variants.supported".to_string(),
                            reason: format!(
                                "release {} is not above the base release {}",
                                release, project.release
                            ),
                        });
                    }
                }
            }
        }

        if self.variants.source_set.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "variants.source-set".to_string(),
                reason: "source set cannot be empty".to_string(),
            });
        }

        if self.compiler.javac.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "compiler.javac".to_string(),
                reason: "compiler executable cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the project name, if this is a project
    pub fn project_name(&self) -> Option<&str> {
        self.project.as_ref().map(|p| p.name.as_str())
    }

    /// Get the base release (default when no project table is present)
    pub fn base_release(&self) -> u32 {
        self.project
            .as_ref()
            .map(|p| p.release)
            .unwrap_or(DEFAULT_BASE_RELEASE)
    }

    /// Releases a variant directory may target, all above the base release
    pub fn supported_releases(&self) -> BTreeSet<u32> {
        let base = self.base_release();
        match &self.variants.supported {
            Some(explicit) => explicit.iter().copied().filter(|r| *r > base).collect(),
            None => (base.saturating_add(1)..=MAX_SUPPORTED_RELEASE).collect(),
        }
    }

    /// Check if this configuration declares a workspace
    pub fn is_workspace(&self) -> bool {
        self.workspace.is_some()
    }
}

fn validate_project(project: &ProjectSection) -> ConfigResult<()> {
    if project.name.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "project.name".to_string(),
            reason: "name cannot be empty".to_string(),
        });
    }

    if !project
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(ConfigError::InvalidValue {
            field: "project.name".to_string(),
            reason: format!(
                "'{}' may only contain ASCII letters, digits, '-', '_' and '.'",
                project.name
            ),
        });
    }

    semver::Version::parse(&project.version).map_err(|e| ConfigError::InvalidVersion {
        version: project.version.clone(),
        reason: e.to_string(),
    })?;

    if project.release == 0 || project.release > MAX_SUPPORTED_RELEASE {
        return Err(ConfigError::InvalidValue {
            field: "project.release".to_string(),
            reason: format!(
                "release {} is outside 1..={}",
                project.release, MAX_SUPPORTED_RELEASE
            ),
        });
    }

    if project.dependencies.iter().any(|d| d == &project.name) {
        return Err(ConfigError::InvalidValue {
            field: "project.dependencies".to_string(),
            reason: format!("project '{}' cannot depend on itself", project.name),
        });
    }

    let mut seen = BTreeSet::new();
    if let Some(repeated) = project.dependencies.iter().find(|d| !seen.insert(d.as_str())) {
        return Err(ConfigError::InvalidValue {
            field: "project.dependencies".to_string(),
            reason: format!("'{}' is listed more than once", repeated),
        });
    }

    Ok(())
}
