//! Fingerprint cache
//!
//! A unit whose inputs hash to the fingerprint recorded by its last successful
//! build, and whose archive still exists, is up to date.

use crate::archive::StructuralWarning;
use crate::error::{BuildError, BuildResult};
use crate::variant::VariantSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Cache file location relative to a unit root
pub const CACHE_FILE: &str = "build/tmp/mrjar-cache.json";

/// Format version of the cache file
const CACHE_FORMAT: u32 = 2;

/// Hex-encoded SHA-256 over a unit's build inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything besides source content that affects a unit's archive
#[derive(Debug, Clone, Default)]
pub struct FingerprintInputs<'a> {
    /// Compiler executable
    pub compiler: &'a str,
    /// Extra compiler arguments
    pub extra_args: &'a [String],
    /// Override enforcement mode
    pub strict_overrides: bool,
    /// Archive file name
    pub archive_name: &'a str,
    /// Fingerprints of project dependencies, by name
    pub dependencies: BTreeMap<String, Fingerprint>,
}

/// Hash a unit's variants (release, descriptor flag, relative source paths and
/// contents) together with its other inputs
pub fn compute_fingerprint(
    variants: &VariantSet,
    inputs: &FingerprintInputs<'_>,
) -> BuildResult<Fingerprint> {
    let mut hasher = Sha256::new();

    hasher.update(b"mrjar-fingerprint\0");
    hasher.update(variants.unit.as_bytes());
    hasher.update(b"\0");
    hasher.update(inputs.archive_name.as_bytes());
    hasher.update(b"\0");
    hasher.update(inputs.compiler.as_bytes());
    hasher.update(b"\0");
    for arg in inputs.extra_args {
        hasher.update(arg.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update([inputs.strict_overrides as u8]);

    for variant in variants.variants() {
        hasher.update(b"variant\0");
        hasher.update(variant.release.to_le_bytes());
        hasher.update([variant.has_module_descriptor() as u8]);

        for source in variant.source_files()? {
            let relative = source.strip_prefix(&variant.source_root).unwrap_or(&source);
            hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
            hasher.update(b"\0");
            let content = fs::read(&source).map_err(|e| BuildError::io(&source, e))?;
            hasher.update((content.len() as u64).to_le_bytes());
            hasher.update(&content);
        }
    }

    for (name, fingerprint) in &inputs.dependencies {
        hasher.update(b"dependency\0");
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(fingerprint.as_str().as_bytes());
    }

    Ok(Fingerprint(format!("{:x}", hasher.finalize())))
}

/// Contents of the cache file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub format: u32,
    pub fingerprint: Fingerprint,
    pub archive: PathBuf,
    /// Structural warnings raised when the archive was assembled
    #[serde(default)]
    pub warnings: Vec<StructuralWarning>,
}

impl CacheMetadata {
    pub fn new(fingerprint: Fingerprint, archive: PathBuf) -> Self {
        Self {
            format: CACHE_FORMAT,
            fingerprint,
            archive,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<StructuralWarning>) -> Self {
        self.warnings = warnings;
        self
    }
}

/// The cache file of one unit
#[derive(Debug, Clone)]
pub struct BuildCache {
    path: PathBuf,
}

impl BuildCache {
    /// Cache for the unit rooted at `root`
    pub fn for_unit(root: &Path) -> Self {
        Self {
            path: root.join(CACHE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the cache; a missing, unreadable or outdated file counts as empty
    pub fn load(&self) -> Option<CacheMetadata> {
        let content = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<CacheMetadata>(&content) {
            Ok(metadata) if metadata.format == CACHE_FORMAT => Some(metadata),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "ignoring corrupt build cache: {}", e);
                None
            }
        }
    }

    /// The recorded build, if it matches `fingerprint` and its archive exists
    pub fn fresh(&self, fingerprint: &Fingerprint) -> Option<CacheMetadata> {
        self.load()
            .filter(|m| &m.fingerprint == fingerprint && m.archive.is_file())
    }

    /// Whether the recorded build matches `fingerprint` and its archive exists
    pub fn is_fresh(&self, fingerprint: &Fingerprint) -> bool {
        self.fresh(fingerprint).is_some()
    }

    /// Record a successful build
    pub fn store(&self, metadata: &CacheMetadata) -> BuildResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| BuildError::CacheError(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| BuildError::io(&self.path, e))
    }

    /// Forget the recorded build
    pub fn invalidate(&self) -> BuildResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::io(&self.path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{VariantLayout, VariantRegistry};
    use tempfile::TempDir;

    fn unit(root: &Path) -> VariantSet {
        let base = root.join("src/main/java/pkg");
        fs::create_dir_all(&base).unwrap();
        fs::write(base.join("Actor.java"), "class Actor {}").unwrap();
        let layout = VariantLayout {
            source_set: "main".to_string(),
            base_release: 8,
            supported: (9..=25).collect(),
        };
        VariantRegistry::discover("core", root, &layout).unwrap()
    }

    fn inputs<'a>() -> FingerprintInputs<'a> {
        FingerprintInputs {
            compiler: "javac",
            archive_name: "core-1.0.0.jar",
            strict_overrides: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_fingerprint_stable_for_unchanged_inputs() {
        let temp = TempDir::new().unwrap();
        let variants = unit(temp.path());
        let first = compute_fingerprint(&variants, &inputs()).unwrap();
        let second = compute_fingerprint(&variants, &inputs()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), 64);
    }

    #[test]
    fn test_fingerprint_tracks_content_and_args() {
        let temp = TempDir::new().unwrap();
        let variants = unit(temp.path());
        let before = compute_fingerprint(&variants, &inputs()).unwrap();

        let args = vec!["-g".to_string()];
        let mut with_args = inputs();
        with_args.extra_args = &args;
        assert_ne!(compute_fingerprint(&variants, &with_args).unwrap(), before);

        fs::write(
            temp.path().join("src/main/java/pkg/Actor.java"),
            "class Actor { int x; }",
        )
        .unwrap();
        assert_ne!(compute_fingerprint(&variants, &inputs()).unwrap(), before);
    }

    #[test]
    fn test_fingerprint_tracks_dependencies() {
        let temp = TempDir::new().unwrap();
        let variants = unit(temp.path());
        let before = compute_fingerprint(&variants, &inputs()).unwrap();

        let mut with_dep = inputs();
        with_dep
            .dependencies
            .insert("other".to_string(), Fingerprint("abc".to_string()));
        assert_ne!(compute_fingerprint(&variants, &with_dep).unwrap(), before);
    }

    #[test]
    fn test_cache_round_trip_and_freshness() {
        let temp = TempDir::new().unwrap();
        let cache = BuildCache::for_unit(temp.path());
        let archive = temp.path().join("build/libs/core-1.0.0.jar");
        let fingerprint = Fingerprint("f00d".to_string());

        assert!(cache.load().is_none());
        cache
            .store(&CacheMetadata::new(fingerprint.clone(), archive.clone()))
            .unwrap();
        assert_eq!(cache.load().unwrap().fingerprint, fingerprint);

        // Archive missing: not fresh
        assert!(!cache.is_fresh(&fingerprint));
        fs::create_dir_all(archive.parent().unwrap()).unwrap();
        fs::write(&archive, b"jar").unwrap();
        assert!(cache.is_fresh(&fingerprint));
        assert!(!cache.is_fresh(&Fingerprint("other".to_string())));

        cache.invalidate().unwrap();
        assert!(cache.load().is_none());
        cache.invalidate().unwrap();
    }

    #[test]
    fn test_recorded_warnings_survive_reload() {
        let temp = TempDir::new().unwrap();
        let cache = BuildCache::for_unit(temp.path());
        let archive = temp.path().join("core-1.0.0.jar");
        fs::write(&archive, b"jar").unwrap();
        let fingerprint = Fingerprint("f00d".to_string());
        let warning = StructuralWarning {
            unit: "core".to_string(),
            release: Some(9),
            entry: Some("pkg/Extra.class".to_string()),
            message: "no counterpart in the base variant".to_string(),
        };

        cache
            .store(
                &CacheMetadata::new(fingerprint.clone(), archive)
                    .with_warnings(vec![warning.clone()]),
            )
            .unwrap();
        assert_eq!(cache.fresh(&fingerprint).unwrap().warnings, vec![warning]);
    }

    #[test]
    fn test_cache_without_warnings_field_loads() {
        let temp = TempDir::new().unwrap();
        let cache = BuildCache::for_unit(temp.path());
        fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        fs::write(
            cache.path(),
            format!(
                r#"{{"format": {}, "fingerprint": "f00d", "archive": "core.jar"}}"#,
                CACHE_FORMAT
            ),
        )
        .unwrap();
        assert!(cache.load().unwrap().warnings.is_empty());
    }

    #[test]
    fn test_corrupt_cache_ignored() {
        let temp = TempDir::new().unwrap();
        let cache = BuildCache::for_unit(temp.path());
        fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        fs::write(cache.path(), "{ not json").unwrap();
        assert!(cache.load().is_none());
    }
}
