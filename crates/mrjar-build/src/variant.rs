//! Variant Registry
//!
//! Maps the source directory convention of one compilation unit onto an ordered
//! set of release variants:
//!
//! ```text
//! src/<source-set>/java        base variant  -> build/classes/java/<source-set>
//! src/<source-set>/java<N>     release N     -> build/classes/java/java<N>
//! ```

use crate::descriptor::{ModuleDescriptor, FIRST_MODULAR_RELEASE, MODULE_DESCRIPTOR_SOURCE};
use crate::error::{BuildError, BuildResult};
use mrjar_config::ProjectConfig;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directory name of the base source root and the prefix of release roots
const JAVA_DIR: &str = "java";

/// One release-specific source root and its output directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceVariant {
    /// Target release
    pub release: u32,
    /// Source root scanned for `.java` files
    pub source_root: PathBuf,
    /// Class output directory, owned by this variant alone
    pub output_dir: PathBuf,
    /// Module declared by the source root's `module-info.java`
    pub module_descriptor: Option<ModuleDescriptor>,
}

impl SourceVariant {
    /// Create a variant without a module descriptor
    pub fn new(release: u32, source_root: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            release,
            source_root: source_root.into(),
            output_dir: output_dir.into(),
            module_descriptor: None,
        }
    }

    /// Declare a module descriptor in this variant
    pub fn with_module_descriptor(mut self, descriptor: ModuleDescriptor) -> Self {
        self.module_descriptor = Some(descriptor);
        self
    }

    /// Whether this variant's own source root declares a module
    pub fn has_module_descriptor(&self) -> bool {
        self.module_descriptor.is_some()
    }

    /// Path of the variant's `module-info.java`
    pub fn descriptor_path(&self) -> PathBuf {
        self.source_root.join(MODULE_DESCRIPTOR_SOURCE)
    }

    /// All `.java` files under the source root, sorted
    pub fn source_files(&self) -> BuildResult<Vec<PathBuf>> {
        if !self.source_root.exists() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.source_root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.source_root.clone());
                BuildError::io(path, e.into())
            })?;
            if entry.file_type().is_file()
                && entry.path().extension().and_then(|s| s.to_str()) == Some("java")
            {
                files.push(entry.into_path());
            }
        }

        files.sort();
        Ok(files)
    }
}

/// The directory convention for one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantLayout {
    /// Source set name (`main` by default)
    pub source_set: String,
    /// Release of the base variant
    pub base_release: u32,
    /// Releases a `java<N>` directory may target
    pub supported: BTreeSet<u32>,
}

impl VariantLayout {
    /// Layout described by a project configuration
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            source_set: config.variants.source_set.clone(),
            base_release: config.base_release(),
            supported: config.supported_releases(),
        }
    }

    /// `<root>/src/<source-set>`
    pub fn source_set_dir(&self, root: &Path) -> PathBuf {
        root.join("src").join(&self.source_set)
    }

    /// `<root>/src/<source-set>/java`
    pub fn base_source_dir(&self, root: &Path) -> PathBuf {
        self.source_set_dir(root).join(JAVA_DIR)
    }

    /// `<root>/src/<source-set>/java<N>`
    pub fn release_source_dir(&self, root: &Path, release: u32) -> PathBuf {
        self.source_set_dir(root).join(release_dir_name(release))
    }

    /// `<root>/build/classes/java/<source-set>`
    pub fn base_output_dir(&self, root: &Path) -> PathBuf {
        classes_dir(root).join(&self.source_set)
    }

    /// `<root>/build/classes/java/java<N>`
    pub fn release_output_dir(&self, root: &Path, release: u32) -> PathBuf {
        classes_dir(root).join(release_dir_name(release))
    }
}

fn classes_dir(root: &Path) -> PathBuf {
    root.join("build").join("classes").join(JAVA_DIR)
}

fn release_dir_name(release: u32) -> String {
    format!("{}{}", JAVA_DIR, release)
}

/// Parse the release out of a `java<N>` directory name
pub fn parse_release_dir_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(JAVA_DIR)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The ordered variants of one unit; the first is the base variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantSet {
    /// Unit name
    pub unit: String,
    variants: Vec<SourceVariant>,
}

impl VariantSet {
    /// Create a variant set, ordering variants by release.
    ///
    /// Fails if there are no variants or two variants share a release.
    pub fn new(unit: impl Into<String>, mut variants: Vec<SourceVariant>) -> BuildResult<Self> {
        let unit = unit.into();
        if variants.is_empty() {
            return Err(BuildError::configuration(&unit, "no base variant"));
        }

        variants.sort_by_key(|v| v.release);
        for pair in variants.windows(2) {
            if pair[0].release == pair[1].release {
                return Err(BuildError::configuration(
                    &unit,
                    format!("release {} has more than one variant", pair[0].release),
                ));
            }
        }

        Ok(Self { unit, variants })
    }

    /// The lowest-release variant
    pub fn base(&self) -> &SourceVariant {
        &self.variants[0]
    }

    /// Every variant above the base, ascending
    pub fn overrides(&self) -> &[SourceVariant] {
        &self.variants[1..]
    }

    /// All variants, ascending
    pub fn variants(&self) -> &[SourceVariant] {
        &self.variants
    }

    /// The variant a consumer compiled for `release` sees: the highest variant
    /// not above `release`, or the base variant when none qualifies.
    pub fn resolve(&self, release: u32) -> &SourceVariant {
        self.variants
            .iter()
            .rev()
            .find(|v| v.release <= release)
            .unwrap_or_else(|| self.base())
    }

    /// The variant whose descriptor applies at `release`: the highest variant at
    /// or below the resolved one that declares a module. Descriptors carry
    /// upward, so a module declared at 9 is still the module at 11.
    pub fn module_variant(&self, release: u32) -> Option<&SourceVariant> {
        let resolved = self.resolve(release).release;
        self.variants
            .iter()
            .rev()
            .filter(|v| v.release <= resolved)
            .find(|v| v.has_module_descriptor())
    }

    /// The module in effect at `release`, if any
    pub fn module_descriptor(&self, release: u32) -> Option<&ModuleDescriptor> {
        self.module_variant(release)
            .and_then(|v| v.module_descriptor.as_ref())
    }

    /// Variant releases, ascending
    pub fn releases(&self) -> Vec<u32> {
        self.variants.iter().map(|v| v.release).collect()
    }

    /// More than the base variant exists
    pub fn is_multi_release(&self) -> bool {
        self.variants.len() > 1
    }

    /// Any variant declares a module descriptor
    pub fn is_modular(&self) -> bool {
        self.variants.iter().any(|v| v.has_module_descriptor())
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// Scans a unit root for its variants
pub struct VariantRegistry;

impl VariantRegistry {
    /// Discover the variants of the unit at `root`.
    ///
    /// An existing but empty release directory still yields a variant.
    pub fn discover(unit: &str, root: &Path, layout: &VariantLayout) -> BuildResult<VariantSet> {
        let base_dir = layout.base_source_dir(root);
        if !base_dir.is_dir() {
            return Err(BuildError::configuration(
                unit,
                format!("no base variant: {} does not exist", base_dir.display()),
            ));
        }

        let mut variants = vec![SourceVariant::new(
            layout.base_release,
            base_dir,
            layout.base_output_dir(root),
        )];

        let source_set_dir = layout.source_set_dir(root);
        let entries =
            fs::read_dir(&source_set_dir).map_err(|e| BuildError::io(&source_set_dir, e))?;

        let mut releases: BTreeMap<u32, String> = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| BuildError::io(&source_set_dir, e))?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(release) = parse_release_dir_name(&name) else {
                continue;
            };

            if release <= layout.base_release {
                return Err(BuildError::configuration(
                    unit,
                    format!(
                        "variant directory '{}' targets release {} which is not above the base release {}",
                        name, release, layout.base_release
                    ),
                ));
            }
            if !layout.supported.contains(&release) {
                return Err(BuildError::configuration(
                    unit,
                    format!("variant directory '{}' targets unsupported release {}", name, release),
                ));
            }
            if let Some(previous) = releases.insert(release, name.clone()) {
                return Err(BuildError::configuration(
                    unit,
                    format!(
                        "directories '{}' and '{}' both target release {}",
                        previous, name, release
                    ),
                ));
            }
        }

        for (release, name) in releases {
            variants.push(SourceVariant::new(
                release,
                source_set_dir.join(name),
                layout.release_output_dir(root, release),
            ));
        }

        for variant in &mut variants {
            let path = variant.descriptor_path();
            if !path.is_file() {
                continue;
            }
            if variant.release < FIRST_MODULAR_RELEASE {
                return Err(BuildError::ModuleDescriptorConflict {
                    unit: unit.to_string(),
                    release: variant.release,
                });
            }
            variant.module_descriptor = Some(ModuleDescriptor::read(unit, variant.release, &path)?);
        }

        let set = VariantSet::new(unit, variants)?;
        tracing::debug!(unit, releases = ?set.releases(), "discovered variants");
        Ok(set)
    }
}
