//! Archive Assembler
//!
//! Merges the compiled outputs of one unit into a single multi-release
//! archive. The base variant's classes sit at the archive root; every higher
//! variant's classes sit under `META-INF/versions/<release>/`. The manifest
//! carries `Multi-Release: true` exactly when versioned entries exist.
//!
//! Archives are written deterministically (sorted entries, fixed timestamps)
//! to a temporary file next to the destination, checked, and only then moved
//! into place.

use crate::descriptor::MODULE_DESCRIPTOR_CLASS;
use crate::error::{BuildError, BuildResult};
use crate::sequencer::CompiledOutput;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Manifest location inside an archive
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Prefix of the versioned namespace
pub const VERSIONS_PREFIX: &str = "META-INF/versions/";

/// Manifest attribute marking a multi-release archive
pub const MULTI_RELEASE: &str = "Multi-Release";

const MANIFEST_VERSION: &str = "Manifest-Version";
const CREATED_BY: &str = "Created-By";
const MAX_LINE_BYTES: usize = 72;

/// Main section of a jar manifest, attributes kept in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    attributes: Vec<(String, String)>,
}

impl Manifest {
    /// A manifest with `Manifest-Version: 1.0`
    pub fn new() -> Self {
        Self {
            attributes: vec![(MANIFEST_VERSION.to_string(), "1.0".to_string())],
        }
    }

    /// Look up an attribute; names compare case-insensitively
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attributes
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Attributes in order
    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    /// `Multi-Release` is exactly `true`
    pub fn is_multi_release(&self) -> bool {
        self.get(MULTI_RELEASE) == Some("true")
    }

    /// Render with CRLF line endings and 72-byte line wrapping
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.attributes {
            let line = format!("{}: {}", name, value);
            let mut rest = line.as_str();
            let mut limit = MAX_LINE_BYTES;
            let mut first = true;
            while !rest.is_empty() {
                let mut cut = rest.len().min(limit);
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                if !first {
                    out.push(' ');
                }
                out.push_str(&rest[..cut]);
                out.push_str("\r\n");
                rest = &rest[cut..];
                first = false;
                limit = MAX_LINE_BYTES - 1;
            }
        }
        out.push_str("\r\n");
        out
    }

    /// Parse the main section of a manifest
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut attributes: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }
            if let Some(continuation) = line.strip_prefix(' ') {
                match attributes.last_mut() {
                    Some(last) => last.1.push_str(continuation),
                    None => return Err("continuation line before any attribute".to_string()),
                }
                continue;
            }
            let (name, value) = line
                .split_once(": ")
                .ok_or_else(|| format!("malformed manifest line '{}'", line))?;
            attributes.push((name.to_string(), value.to_string()));
        }
        Ok(Self { attributes })
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

/// A non-fatal structural finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralWarning {
    pub unit: String,
    pub release: Option<u32>,
    pub entry: Option<String>,
    pub message: String,
}

impl StructuralWarning {
    /// Convert into the equivalent hard error
    pub fn into_error(self) -> BuildError {
        let message = match &self.entry {
            Some(entry) => format!("{}: {}", entry, self.message),
            None => self.message,
        };
        BuildError::structural(self.unit, self.release, message)
    }
}

/// Entry names of an archive, split by namespace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveLayout {
    /// Entries at the archive root
    pub root_entries: BTreeSet<String>,
    /// Entries under `META-INF/versions/<release>/`, keyed by release
    pub versioned_entries: BTreeMap<u32, BTreeSet<String>>,
    /// Manifest main section
    pub manifest: Manifest,
}

impl ArchiveLayout {
    /// Lay out compiled outputs: the first is the base variant
    pub fn from_outputs(outputs: &[CompiledOutput]) -> Self {
        let mut layout = Self::default();
        let Some((base, overrides)) = outputs.split_first() else {
            return layout;
        };

        layout.root_entries = base.class_files.clone();
        for output in overrides {
            if !output.class_files.is_empty() {
                layout
                    .versioned_entries
                    .insert(output.release, output.class_files.clone());
            }
        }

        if layout.has_versioned_entries() {
            layout.manifest.set(MULTI_RELEASE, "true");
        }
        layout
    }

    pub fn has_versioned_entries(&self) -> bool {
        self.versioned_entries.values().any(|entries| !entries.is_empty())
    }

    /// Versioned entries with no same-path root entry.
    ///
    /// A module descriptor may appear only in a versioned namespace.
    pub fn override_warnings(&self, unit: &str) -> Vec<StructuralWarning> {
        let mut warnings = Vec::new();
        for (release, entries) in &self.versioned_entries {
            for entry in entries {
                if entry == MODULE_DESCRIPTOR_CLASS || self.root_entries.contains(entry) {
                    continue;
                }
                warnings.push(StructuralWarning {
                    unit: unit.to_string(),
                    release: Some(*release),
                    entry: Some(entry.clone()),
                    message: "override has no base counterpart".to_string(),
                });
            }
        }
        warnings
    }

    /// The manifest marker disagrees with the versioned namespace
    pub fn marker_error(&self, unit: &str) -> Option<BuildError> {
        match (self.has_versioned_entries(), self.manifest.get(MULTI_RELEASE)) {
            (true, Some("true")) | (false, None) => None,
            (true, other) => Some(BuildError::structural(
                unit,
                None,
                format!(
                    "versioned entries present but {} is {}",
                    MULTI_RELEASE,
                    other.map(|v| format!("'{}'", v)).unwrap_or_else(|| "missing".to_string())
                ),
            )),
            (false, Some(value)) => Some(BuildError::structural(
                unit,
                None,
                format!("{} is '{}' but no versioned entries exist", MULTI_RELEASE, value),
            )),
        }
    }

    /// Total number of class entries
    pub fn entry_count(&self) -> usize {
        self.root_entries.len() + self.versioned_entries.values().map(BTreeSet::len).sum::<usize>()
    }

    /// Read the layout of an existing archive
    pub fn read(path: &Path) -> BuildResult<Self> {
        let file = File::open(path).map_err(|e| BuildError::io(path, e))?;
        let mut archive = ZipArchive::new(file).map_err(|e| BuildError::archive(path, e))?;

        let mut layout = Self {
            manifest: Manifest { attributes: Vec::new() },
            ..Self::default()
        };
        let mut manifest_found = false;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| BuildError::archive(path, e))?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();

            if name == MANIFEST_PATH {
                let mut text = String::new();
                entry
                    .read_to_string(&mut text)
                    .map_err(|e| BuildError::io(path, e))?;
                layout.manifest = Manifest::parse(&text).map_err(|e| BuildError::archive(path, e))?;
                manifest_found = true;
            } else if let Some(rest) = name.strip_prefix(VERSIONS_PREFIX) {
                let (release, entry_name) = rest.split_once('/').ok_or_else(|| {
                    BuildError::archive(path, format!("malformed versioned entry '{}'", name))
                })?;
                let release: u32 = release.parse().map_err(|_| {
                    BuildError::archive(path, format!("malformed versioned entry '{}'", name))
                })?;
                layout
                    .versioned_entries
                    .entry(release)
                    .or_default()
                    .insert(entry_name.to_string());
            } else if !name.starts_with("META-INF/") {
                layout.root_entries.insert(name);
            }
        }

        if !manifest_found {
            return Err(BuildError::archive(path, format!("{} is missing", MANIFEST_PATH)));
        }
        Ok(layout)
    }
}

/// Outcome of a successful assembly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub archive: PathBuf,
    pub entries: usize,
    pub multi_release: bool,
    pub warnings: Vec<StructuralWarning>,
}

/// Writes one archive per unit
#[derive(Debug, Clone)]
pub struct ArchiveAssembler {
    strict: bool,
    attributes: Vec<(String, String)>,
}

impl ArchiveAssembler {
    /// `strict` turns override warnings into errors
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            attributes: vec![(
                CREATED_BY.to_string(),
                format!("mrjar {}", env!("CARGO_PKG_VERSION")),
            )],
        }
    }

    /// Add a manifest attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Assemble `outputs` (base variant first, ascending) into `destination`
    pub fn assemble(
        &self,
        unit: &str,
        outputs: &[CompiledOutput],
        destination: &Path,
    ) -> BuildResult<AssemblyReport> {
        if outputs.is_empty() {
            return Err(BuildError::structural(unit, None, "no compiled outputs to assemble"));
        }

        let mut layout = ArchiveLayout::from_outputs(outputs);
        for (name, value) in &self.attributes {
            layout.manifest.set(name.clone(), value.clone());
        }

        let warnings = layout.override_warnings(unit);
        if self.strict {
            if let Some(first) = warnings.first() {
                return Err(first.clone().into_error());
            }
        }
        for warning in &warnings {
            tracing::warn!(
                unit,
                release = ?warning.release,
                entry = warning.entry.as_deref().unwrap_or(""),
                "{}",
                warning.message
            );
        }

        let dir = destination
            .parent()
            .ok_or_else(|| BuildError::archive(destination, "destination has no parent directory"))?;
        fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;

        let mut temp = tempfile::Builder::new()
            .prefix(".mrjar-")
            .suffix(".jar.tmp")
            .tempfile_in(dir)
            .map_err(|e| BuildError::io(dir, e))?;

        write_archive(temp.as_file_mut(), &layout, outputs)
            .map_err(|e| BuildError::archive(temp.path(), e))?;

        let written = ArchiveLayout::read(temp.path())?;
        if written.root_entries != layout.root_entries
            || written.versioned_entries != layout.versioned_entries
        {
            return Err(BuildError::structural(
                unit,
                None,
                "written archive does not match the compiled outputs",
            ));
        }
        if let Some(error) = written.marker_error(unit) {
            return Err(error);
        }

        temp.persist(destination)
            .map_err(|e| BuildError::io(destination, e.error))?;

        tracing::debug!(
            unit,
            archive = %destination.display(),
            entries = layout.entry_count(),
            "assembled archive"
        );

        Ok(AssemblyReport {
            archive: destination.to_path_buf(),
            entries: layout.entry_count(),
            multi_release: layout.manifest.is_multi_release(),
            warnings,
        })
    }
}

fn write_archive(
    file: &mut File,
    layout: &ArchiveLayout,
    outputs: &[CompiledOutput],
) -> zip::result::ZipResult<()> {
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut zip = ZipWriter::new(file);

    zip.start_file(MANIFEST_PATH, options)?;
    zip.write_all(layout.manifest.render().as_bytes())?;

    let by_release: BTreeMap<u32, &CompiledOutput> =
        outputs.iter().map(|o| (o.release, o)).collect();

    if let Some(base) = outputs.first() {
        for entry in &layout.root_entries {
            copy_entry(&mut zip, options, entry, &base.output_dir.join(entry))?;
        }
    }

    for (release, entries) in &layout.versioned_entries {
        let Some(output) = by_release.get(release) else {
            continue;
        };
        for entry in entries {
            let name = format!("{}{}/{}", VERSIONS_PREFIX, release, entry);
            copy_entry(&mut zip, options, &name, &output.output_dir.join(entry))?;
        }
    }

    zip.finish()?;
    Ok(())
}

fn copy_entry<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    options: FileOptions,
    name: &str,
    source: &Path,
) -> zip::result::ZipResult<()> {
    zip.start_file(name, options)?;
    let mut file = File::open(source)?;
    io::copy(&mut file, zip)?;
    Ok(())
}

/// Re-open an archive and check its structure.
///
/// A manifest marker that disagrees with the versioned namespace is an error;
/// overrides without a base counterpart are returned as warnings.
pub fn verify_archive(path: &Path, unit: &str) -> BuildResult<(ArchiveLayout, Vec<StructuralWarning>)> {
    let layout = ArchiveLayout::read(path)?;
    if let Some(error) = layout.marker_error(unit) {
        return Err(error);
    }
    let warnings = layout.override_warnings(unit);
    Ok((layout, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn output(root: &Path, release: u32, classes: &[&str]) -> CompiledOutput {
        let dir = root.join(format!("out{}", release));
        for class in classes {
            let path = dir.join(class);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, format!("{}@{}", class, release)).unwrap();
        }
        CompiledOutput {
            release,
            output_dir: dir,
            class_files: classes.iter().map(|c| c.to_string()).collect(),
            module_descriptor: None,
            compiled: true,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_manifest_render_and_parse() {
        let mut manifest = Manifest::new();
        manifest.set("Created-By", "mrjar");
        manifest.set(MULTI_RELEASE, "true");

        let text = manifest.render();
        assert_eq!(
            text,
            "Manifest-Version: 1.0\r\nCreated-By: mrjar\r\nMulti-Release: true\r\n\r\n"
        );
        assert_eq!(Manifest::parse(&text).unwrap(), manifest);
    }

    #[test]
    fn test_manifest_long_lines_wrap() {
        let mut manifest = Manifest::new();
        let long = "x".repeat(150);
        manifest.set("Implementation-Title", long.clone());

        let text = manifest.render();
        assert!(text.split("\r\n").all(|line| line.len() <= MAX_LINE_BYTES));
        assert_eq!(
            Manifest::parse(&text).unwrap().get("Implementation-Title"),
            Some(long.as_str())
        );
    }

    #[test]
    fn test_assemble_multi_release() {
        let temp = TempDir::new().unwrap();
        let outputs = vec![
            output(temp.path(), 8, &["pkg/Actor.class", "pkg/Util.class"]),
            output(temp.path(), 9, &["pkg/Actor.class"]),
            output(temp.path(), 17, &["pkg/Actor.class"]),
        ];
        let destination = temp.path().join("libs/core-1.0.0.jar");

        let report = ArchiveAssembler::new(true)
            .assemble("core", &outputs, &destination)
            .unwrap();
        assert!(report.multi_release);
        assert_eq!(report.entries, 4);
        assert!(report.warnings.is_empty());

        let (layout, warnings) = verify_archive(&destination, "core").unwrap();
        assert!(warnings.is_empty());
        assert!(layout.root_entries.contains("pkg/Actor.class"));
        assert_eq!(
            layout.versioned_entries.keys().copied().collect::<Vec<_>>(),
            vec![9, 17]
        );
        assert_eq!(layout.manifest.get(MULTI_RELEASE), Some("true"));

        let mut archive = ZipArchive::new(File::open(&destination).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("META-INF/versions/17/pkg/Actor.class")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "pkg/Actor.class@17");
    }

    #[test]
    fn test_base_only_has_no_marker() {
        let temp = TempDir::new().unwrap();
        let outputs = vec![output(temp.path(), 8, &["pkg/Actor.class"])];
        let destination = temp.path().join("core.jar");

        let report = ArchiveAssembler::new(true)
            .assemble("core", &outputs, &destination)
            .unwrap();
        assert!(!report.multi_release);

        let (layout, _) = verify_archive(&destination, "core").unwrap();
        assert!(layout.versioned_entries.is_empty());
        assert_eq!(layout.manifest.get(MULTI_RELEASE), None);
    }

    #[test]
    fn test_empty_override_adds_no_namespace() {
        let temp = TempDir::new().unwrap();
        let outputs = vec![
            output(temp.path(), 8, &["pkg/Actor.class"]),
            output(temp.path(), 11, &[]),
        ];

        let layout = ArchiveLayout::from_outputs(&outputs);
        assert!(!layout.has_versioned_entries());
        assert!(!layout.manifest.is_multi_release());
    }

    #[test]
    fn test_override_without_base_counterpart_strict() {
        let temp = TempDir::new().unwrap();
        let outputs = vec![
            output(temp.path(), 8, &["pkg/Actor.class"]),
            output(temp.path(), 9, &["pkg/Actor.class", "pkg/Extra.class"]),
        ];
        let destination = temp.path().join("core.jar");

        let err = ArchiveAssembler::new(true)
            .assemble("core", &outputs, &destination)
            .unwrap_err();
        assert_eq!(err.unit(), Some("core"));
        assert_eq!(err.release(), Some(9));
        assert!(err.to_string().contains("pkg/Extra.class"));
        assert!(!destination.exists());
    }

    #[test]
    fn test_override_without_base_counterpart_permissive() {
        let temp = TempDir::new().unwrap();
        let outputs = vec![
            output(temp.path(), 8, &["pkg/Actor.class"]),
            output(temp.path(), 9, &["pkg/Extra.class", "module-info.class"]),
        ];
        let destination = temp.path().join("core.jar");

        let report = ArchiveAssembler::new(false)
            .assemble("core", &outputs, &destination)
            .unwrap();
        assert_eq!(
            report.warnings,
            vec![StructuralWarning {
                unit: "core".to_string(),
                release: Some(9),
                entry: Some("pkg/Extra.class".to_string()),
                message: "override has no base counterpart".to_string(),
            }]
        );
        assert!(destination.exists());
    }

    #[test]
    fn test_assembly_is_byte_identical() {
        let temp = TempDir::new().unwrap();
        let outputs = vec![
            output(temp.path(), 8, &["pkg/Actor.class", "a/B.class"]),
            output(temp.path(), 17, &["pkg/Actor.class"]),
        ];
        let first = temp.path().join("first.jar");
        let second = temp.path().join("second.jar");

        let assembler = ArchiveAssembler::new(true);
        assembler.assemble("core", &outputs, &first).unwrap();
        assembler.assemble("core", &outputs, &second).unwrap();

        assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
    }

    #[test]
    fn test_marker_error_when_attribute_missing() {
        let mut layout = ArchiveLayout::default();
        layout
            .versioned_entries
            .insert(9, ["pkg/Actor.class".to_string()].into_iter().collect());

        let err = layout.marker_error("core").unwrap();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_read_rejects_archive_without_manifest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plain.jar");
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("pkg/Actor.class", FileOptions::default()).unwrap();
        zip.write_all(b"x").unwrap();
        zip.finish().unwrap();

        assert!(matches!(
            ArchiveLayout::read(&path),
            Err(BuildError::Archive { .. })
        ));
    }
}
