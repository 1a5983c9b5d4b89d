/// Build system error types
use mrjar_config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Configuration error in '{unit}': {message}")]
    Configuration { unit: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Module descriptor conflict in '{unit}': release {release} cannot declare module-info.java (module descriptors need release 9 or later)")]
    ModuleDescriptorConflict { unit: String, release: u32 },

    #[error("Invalid module descriptor in '{unit}' at release {release}: no module declaration in {}", .path.display())]
    InvalidModuleDescriptor {
        unit: String,
        release: u32,
        path: PathBuf,
    },

    #[error("Compilation failed for '{unit}' at release {release}: {message}")]
    Compilation {
        unit: String,
        release: u32,
        message: String,
    },

    #[error("Structural error in '{unit}'{}: {message}", release_suffix(.release))]
    Structural {
        unit: String,
        release: Option<u32>,
        message: String,
    },

    #[error("Build of '{unit}' cancelled")]
    Cancelled { unit: String },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Project not found: {project}")]
    ProjectNotFound { project: String },

    #[error("Archive error at {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("Build cache error: {0}")]
    CacheError(String),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("Build failed: {0}")]
    BuildFailed(String),
}

fn release_suffix(release: &Option<u32>) -> String {
    release
        .map(|r| format!(" at release {}", r))
        .unwrap_or_default()
}

impl BuildError {
    /// Create a configuration error for a unit
    pub fn configuration(unit: impl Into<String>, message: impl ToString) -> Self {
        Self::Configuration {
            unit: unit.into(),
            message: message.to_string(),
        }
    }

    /// Create a compilation error tagged with the offending release
    pub fn compilation(unit: impl Into<String>, release: u32, message: impl ToString) -> Self {
        Self::Compilation {
            unit: unit.into(),
            release,
            message: message.to_string(),
        }
    }

    /// Create a structural error
    pub fn structural(unit: impl Into<String>, release: Option<u32>, message: impl ToString) -> Self {
        Self::Structural {
            unit: unit.into(),
            release,
            message: message.to_string(),
        }
    }

    /// Create an archive error
    pub fn archive(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a project not found error
    pub fn project_not_found(project: impl Into<String>) -> Self {
        Self::ProjectNotFound {
            project: project.into(),
        }
    }

    /// The unit that triggered this error, if known
    pub fn unit(&self) -> Option<&str> {
        match self {
            Self::Configuration { unit, .. }
            | Self::ModuleDescriptorConflict { unit, .. }
            | Self::InvalidModuleDescriptor { unit, .. }
            | Self::Compilation { unit, .. }
            | Self::Structural { unit, .. }
            | Self::Cancelled { unit } => Some(unit),
            _ => None,
        }
    }

    /// The offending release, if the error is tied to one
    pub fn release(&self) -> Option<u32> {
        match self {
            Self::ModuleDescriptorConflict { release, .. }
            | Self::InvalidModuleDescriptor { release, .. }
            | Self::Compilation { release, .. } => Some(*release),
            Self::Structural { release, .. } => *release,
            _ => None,
        }
    }

    /// Whether this error belongs to the configuration class (fatal before compiling)
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::Config(_)
                | Self::ModuleDescriptorConflict { .. }
                | Self::InvalidModuleDescriptor { .. }
                | Self::CircularDependency(_)
                | Self::ProjectNotFound { .. }
        )
    }
}
