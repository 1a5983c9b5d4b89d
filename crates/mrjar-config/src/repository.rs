//! Repository extensions
//!
//! A project declares remote repositories as plain records. Each record is
//! registered under its name in an [`ExtensionRegistry`]; invoking the name later
//! adds a filtered repository entry to a [`RepositoryHandler`]. The registry only
//! stores the record, its parsed URL and a function pointer, so nothing captured
//! at configuration time outlives the configuration phase.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// A named remote repository declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteRepository {
    /// Accessor name, e.g. `sonatypeSnapshots`
    pub name: String,
    /// Repository base URL
    pub url: String,
    /// Serve release artifacts
    #[serde(default = "default_true")]
    pub releases: bool,
    /// Serve snapshot artifacts
    #[serde(default = "default_true")]
    pub snapshots: bool,
}

fn default_true() -> bool {
    true
}

impl RemoteRepository {
    /// Create a repository record
    pub fn new(name: impl Into<String>, url: impl Into<String>, releases: bool, snapshots: bool) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            releases,
            snapshots,
        }
    }

    /// Sonatype OSS snapshot repository
    pub fn sonatype_snapshots() -> Self {
        Self::new(
            "sonatypeSnapshots",
            "https://oss.sonatype.org/content/repositories/snapshots/",
            false,
            true,
        )
    }

    /// Maven Central
    pub fn maven_central() -> Self {
        Self::new(
            "mavenCentral",
            "https://repo.maven.apache.org/maven2/",
            true,
            true,
        )
    }

    /// Records registered before any project declarations
    pub fn builtin() -> Vec<Self> {
        vec![Self::sonatype_snapshots(), Self::maven_central()]
    }

    /// Content filter implied by the release/snapshot flags
    pub fn filter(&self) -> RepositoryFilter {
        match (self.releases, self.snapshots) {
            (true, false) => RepositoryFilter::ReleasesOnly,
            (false, true) => RepositoryFilter::SnapshotsOnly,
            _ => RepositoryFilter::Unfiltered,
        }
    }

    /// Parse and check the URL
    pub fn parse_url(&self) -> ConfigResult<Url> {
        let malformed = |reason: String| ConfigError::MalformedUrl {
            name: self.name.clone(),
            url: self.url.clone(),
            reason,
        };

        let url = Url::parse(&self.url).map_err(|e| malformed(e.to_string()))?;
        if !url.has_host() && url.scheme() != "file" {
            return Err(malformed("URL has no host".to_string()));
        }
        Ok(url)
    }
}

/// Which artifact kinds a repository entry serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepositoryFilter {
    ReleasesOnly,
    SnapshotsOnly,
    Unfiltered,
}

impl fmt::Display for RepositoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReleasesOnly => write!(f, "releases-only"),
            Self::SnapshotsOnly => write!(f, "snapshots-only"),
            Self::Unfiltered => write!(f, "unfiltered"),
        }
    }
}

/// A repository entry added to a handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MavenRepository {
    pub name: String,
    pub url: Url,
    pub filter: RepositoryFilter,
}

/// Ordered collection of repository entries for one project
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryHandler {
    repositories: Vec<MavenRepository>,
}

impl RepositoryHandler {
    /// Create an empty handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a repository entry
    pub fn maven(&mut self, repository: MavenRepository) {
        self.repositories.push(repository);
    }

    /// Entries in the order they were added
    pub fn repositories(&self) -> &[MavenRepository] {
        &self.repositories
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

/// Function applied when an extension is invoked
pub type ApplyFn = fn(&mut RepositoryHandler, &RemoteRepository, &Url);

/// A registered accessor: the declaration plus the function that applies it
#[derive(Debug, Clone)]
pub struct RepositoryExtension {
    pub record: RemoteRepository,
    pub url: Url,
    pub apply: ApplyFn,
    builtin: bool,
}

impl RepositoryExtension {
    /// Whether this extension came from the built-in set
    pub fn is_builtin(&self) -> bool {
        self.builtin
    }
}

/// Default apply function: add the repository with the filter its flags imply
pub fn add_repository(handler: &mut RepositoryHandler, record: &RemoteRepository, url: &Url) {
    handler.maven(MavenRepository {
        name: record.name.clone(),
        url: url.clone(),
        filter: record.filter(),
    });
}

/// Name-keyed registry of repository accessors
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    extensions: BTreeMap<String, RepositoryExtension>,
}

impl ExtensionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in records
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for record in RemoteRepository::builtin() {
            // Built-in URLs are constants known to parse.
            if let Ok(url) = record.parse_url() {
                registry.extensions.insert(
                    record.name.clone(),
                    RepositoryExtension {
                        record,
                        url,
                        apply: add_repository,
                        builtin: true,
                    },
                );
            }
        }
        registry
    }

    /// Register one record.
    ///
    /// The URL is validated here, not when the accessor is invoked. A record may
    /// replace a built-in of the same name but not another declared record.
    pub fn register(&mut self, record: RemoteRepository) -> ConfigResult<()> {
        if record.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repository.name".to_string(),
                reason: "name cannot be empty".to_string(),
            });
        }

        let url = record.parse_url()?;

        if let Some(existing) = self.extensions.get(&record.name) {
            if !existing.builtin {
                return Err(ConfigError::DuplicateRepository(record.name));
            }
        }

        self.extensions.insert(
            record.name.clone(),
            RepositoryExtension {
                record,
                url,
                apply: add_repository,
                builtin: false,
            },
        );
        Ok(())
    }

    /// Invoke a registered accessor against a handler
    pub fn invoke(&self, name: &str, handler: &mut RepositoryHandler) -> ConfigResult<()> {
        let extension = self
            .extensions
            .get(name)
            .ok_or_else(|| ConfigError::UnknownRepository(name.to_string()))?;
        (extension.apply)(handler, &extension.record, &extension.url);
        Ok(())
    }

    /// Look up an accessor
    pub fn get(&self, name: &str) -> Option<&RepositoryExtension> {
        self.extensions.get(name)
    }

    /// Registered accessor names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.extensions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// Register an accessor for every record, failing on the first malformed one
pub fn register_repository_extensions(
    registry: &mut ExtensionRegistry,
    repositories: impl IntoIterator<Item = RemoteRepository>,
) -> ConfigResult<()> {
    for repository in repositories {
        registry.register(repository)?;
    }
    Ok(())
}
