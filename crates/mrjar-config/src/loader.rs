//! Configuration Loader
//!
//! Loads a workspace (or single project) and applies environment overrides.
//!
//! Precedence, lowest first:
//! 1. `mrjar.toml` files
//! 2. Environment variables (`MRJAR_*`)
//! 3. CLI flags (handled by caller)

use crate::project::{ProjectConfig, ProjectSection, CONFIG_FILE_NAME};
use crate::{ConfigError, ConfigResult};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

/// Overrides `compiler.javac`
pub const ENV_JAVAC: &str = "MRJAR_JAVAC";
/// Overrides `variants.strict-overrides`
pub const ENV_STRICT_OVERRIDES: &str = "MRJAR_STRICT_OVERRIDES";
/// Worker count for building independent units
pub const ENV_JOBS: &str = "MRJAR_JOBS";

/// One compilation unit: a project root and its validated configuration
#[derive(Debug, Clone, PartialEq)]
pub struct UnitConfig {
    /// Directory containing the unit's mrjar.toml
    pub root: PathBuf,
    /// The unit's `[project]` table
    pub project: ProjectSection,
    /// Parsed configuration
    pub config: ProjectConfig,
}

impl UnitConfig {
    /// Project name
    pub fn name(&self) -> &str {
        &self.project.name
    }

    /// Project version
    pub fn version(&self) -> &str {
        &self.project.version
    }

    /// Base release
    pub fn base_release(&self) -> u32 {
        self.project.release
    }

    /// Names of projects this unit depends on
    pub fn dependencies(&self) -> &[String] {
        &self.project.dependencies
    }

    /// Repository accessors this unit invokes
    pub fn repositories(&self) -> &[String] {
        &self.project.repositories
    }

    /// File name of the unit's archive
    pub fn archive_file_name(&self) -> String {
        format!("{}-{}.jar", self.name(), self.version())
    }
}

/// All units of a build, in declaration order
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceConfig {
    /// Directory of the root mrjar.toml
    pub root: PathBuf,
    /// Units: the root project (if any) first, then members in order
    pub units: Vec<UnitConfig>,
    /// Worker count from the environment, if set
    pub jobs: Option<usize>,
}

impl WorkspaceConfig {
    /// Find a unit by project name
    pub fn unit(&self, name: &str) -> Option<&UnitConfig> {
        self.units.iter().find(|u| u.name() == name)
    }
}

/// Configuration loader
pub struct ConfigLoader {
    /// Apply `MRJAR_*` environment overrides
    use_env: bool,
}

impl ConfigLoader {
    /// Create a loader that honours environment overrides
    pub fn new() -> Self {
        Self { use_env: true }
    }

    /// Create a loader that ignores the environment
    pub fn without_env() -> Self {
        Self { use_env: false }
    }

    /// Load the workspace rooted at `dir`.
    ///
    /// A root with only `[project]` yields a single-unit workspace; `[workspace]`
    /// members are loaded in declaration order and must each carry a `[project]`.
    pub fn load_workspace(&self, dir: &Path) -> ConfigResult<WorkspaceConfig> {
        let root_path = dir.join(CONFIG_FILE_NAME);
        let root_config = ProjectConfig::load_from_file(&root_path)?;

        let mut units = Vec::new();

        if root_config.project.is_some() {
            units.push(self.finish_unit(dir.to_path_buf(), root_config.clone())?);
        }

        if let Some(workspace) = &root_config.workspace {
            for member in &workspace.members {
                let member_root = dir.join(member);
                let member_path = member_root.join(CONFIG_FILE_NAME);
                if !member_path.is_file() {
                    return Err(ConfigError::MissingMember {
                        member: member.clone(),
                    });
                }
                units.push(self.load_unit(&member_root)?);
            }
        }

        let mut seen = HashSet::new();
        for unit in &units {
            if !seen.insert(unit.name().to_string()) {
                return Err(ConfigError::ValidationError(format!(
                    "project name '{}' is declared more than once",
                    unit.name()
                )));
            }
        }

        Ok(WorkspaceConfig {
            root: dir.to_path_buf(),
            units,
            jobs: self.env_jobs()?,
        })
    }

    /// Load a single unit from its directory
    pub fn load_unit(&self, dir: &Path) -> ConfigResult<UnitConfig> {
        let path = dir.join(CONFIG_FILE_NAME);
        let config = ProjectConfig::load_from_file(&path)?;
        self.finish_unit(dir.to_path_buf(), config)
    }

    fn finish_unit(&self, root: PathBuf, config: ProjectConfig) -> ConfigResult<UnitConfig> {
        let project = config.project.clone().ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "{} has no [project] table",
                root.join(CONFIG_FILE_NAME).display()
            ))
        })?;
        let config = if self.use_env {
            apply_env_overrides(config)?
        } else {
            config
        };
        Ok(UnitConfig {
            root,
            project,
            config,
        })
    }

    fn env_jobs(&self) -> ConfigResult<Option<usize>> {
        if !self.use_env {
            return Ok(None);
        }
        match env::var(ENV_JOBS) {
            Ok(value) => match value.trim().parse::<usize>() {
                Ok(jobs) if jobs > 0 => Ok(Some(jobs)),
                _ => Err(ConfigError::InvalidValue {
                    field: ENV_JOBS.to_string(),
                    reason: format!("'{}' is not a positive integer", value),
                }),
            },
            Err(_) => Ok(None),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply environment variable overrides to a project config
fn apply_env_overrides(mut config: ProjectConfig) -> ConfigResult<ProjectConfig> {
    if let Ok(javac) = env::var(ENV_JAVAC) {
        if javac.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: ENV_JAVAC.to_string(),
                reason: "compiler executable cannot be empty".to_string(),
            });
        }
        config.compiler.javac = javac;
    }

    if let Ok(strict) = env::var(ENV_STRICT_OVERRIDES) {
        config.variants.strict_overrides =
            matches!(strict.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    Ok(config)
}
