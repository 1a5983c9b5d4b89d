//! Compilation Sequencer
//!
//! Compiles the variants of one unit strictly in ascending release order. A
//! variant above the base sees its own source root, read access to the base
//! variant's compiled output and whatever the module-path resolver supplies
//! for its release. The first failure ends the sequence.
//!
//! When a module is in effect at a variant's release, the variant compiles as
//! part of that module. A variant declaring the module itself patches the base
//! output into it; a variant above the declaring one finds the module on the
//! module path and patches its own sources in.

use crate::compiler::{CompileRequest, Compiler};
use crate::descriptor::ModuleDescriptor;
use crate::error::{BuildError, BuildResult};
use crate::module_path::{dependency_paths, ResolvedDependency};
use crate::variant::{SourceVariant, VariantSet};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

/// The compiled form of one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledOutput {
    /// Release of the variant that produced this output
    pub release: u32,
    /// Directory holding the class files
    pub output_dir: PathBuf,
    /// Class files relative to `output_dir`, `/`-separated
    pub class_files: BTreeSet<String>,
    /// Declared module, when the variant carries a descriptor
    pub module_descriptor: Option<ModuleDescriptor>,
    /// Whether the compiler actually ran (false for an empty source root)
    pub compiled: bool,
    /// Time spent on this variant
    pub elapsed: Duration,
}

/// A sequence that stopped early
#[derive(Debug)]
pub struct SequenceFailure {
    /// Outputs of the variants that completed before the failure
    pub completed: Vec<CompiledOutput>,
    /// The failure, tagged with unit and release
    pub error: BuildError,
}

/// Shared cancellation flag, checked between variants
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the compile steps of one unit
pub struct CompilationSequencer {
    compiler: Arc<dyn Compiler>,
    extra_args: Vec<String>,
    cancellation: Cancellation,
}

impl CompilationSequencer {
    /// Create a sequencer around a compiler
    pub fn new(compiler: Arc<dyn Compiler>) -> Self {
        Self {
            compiler,
            extra_args: Vec::new(),
            cancellation: Cancellation::new(),
        }
    }

    /// Pass extra arguments to every compile step
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    /// Observe a cancellation flag
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Compile every variant of `variants` in ascending release order
    pub fn run(
        &self,
        variants: &VariantSet,
        dependencies: &[ResolvedDependency],
    ) -> Result<Vec<CompiledOutput>, SequenceFailure> {
        let mut completed: Vec<CompiledOutput> = Vec::with_capacity(variants.len());

        for variant in variants.variants() {
            if self.cancellation.is_cancelled() {
                return Err(SequenceFailure {
                    completed,
                    error: BuildError::Cancelled {
                        unit: variants.unit.clone(),
                    },
                });
            }

            let base_output = completed.first().map(|base| base.output_dir.as_path());
            match self.compile_variant(variants, variant, base_output, dependencies) {
                Ok(output) => completed.push(output),
                Err(error) => return Err(SequenceFailure { completed, error }),
            }
        }

        Ok(completed)
    }

    fn compile_variant(
        &self,
        variants: &VariantSet,
        variant: &SourceVariant,
        base_output: Option<&Path>,
        dependencies: &[ResolvedDependency],
    ) -> BuildResult<CompiledOutput> {
        let start = Instant::now();
        let unit = variants.unit.as_str();

        reset_dir(&variant.output_dir)?;

        let module_descriptor = variant.module_descriptor.clone();

        let sources = variant.source_files()?;
        if sources.is_empty() {
            tracing::debug!(unit, release = variant.release, "no sources, skipping compiler");
            return Ok(CompiledOutput {
                release: variant.release,
                output_dir: variant.output_dir.clone(),
                class_files: BTreeSet::new(),
                module_descriptor,
                compiled: false,
                elapsed: start.elapsed(),
            });
        }

        let wiring = dependency_paths(variants, variant.release, dependencies);
        let mut classpath = Vec::new();
        let mut module_path = Vec::new();
        let mut patch_module = None;

        if let Some(base_output) = base_output {
            let declaring = variants.module_variant(variant.release);
            match declaring.and_then(|d| d.module_descriptor.as_ref().map(|m| (d, m))) {
                Some((declaring, descriptor)) if declaring.release == variant.release => {
                    patch_module = Some((descriptor.name.clone(), vec![base_output.to_path_buf()]));
                }
                Some((declaring, descriptor)) => {
                    module_path.push(declaring.output_dir.clone());
                    let mut patches = vec![variant.source_root.clone()];
                    if declaring.output_dir != base_output {
                        patches.push(base_output.to_path_buf());
                    }
                    patch_module = Some((descriptor.name.clone(), patches));
                }
                None => classpath.push(base_output.to_path_buf()),
            }
        }
        classpath.extend(wiring.classpath);
        module_path.extend(wiring.module_path);

        let request = CompileRequest {
            unit: unit.to_string(),
            release: variant.release,
            source_root: variant.source_root.clone(),
            sources,
            output_dir: variant.output_dir.clone(),
            classpath,
            module_path,
            patch_module,
            extra_args: self.extra_args.clone(),
        };

        tracing::debug!(
            unit,
            release = variant.release,
            sources = request.sources.len(),
            compiler = %self.compiler.describe(),
            "compiling variant"
        );

        self.compiler
            .compile(&request)
            .map_err(|message| BuildError::compilation(unit, variant.release, message))?;

        let class_files = collect_class_files(&variant.output_dir)?;
        tracing::debug!(
            unit,
            release = variant.release,
            classes = class_files.len(),
            "compiled variant"
        );

        Ok(CompiledOutput {
            release: variant.release,
            output_dir: variant.output_dir.clone(),
            class_files,
            module_descriptor,
            compiled: true,
            elapsed: start.elapsed(),
        })
    }
}

/// Empty a variant's output directory, creating it if needed
fn reset_dir(dir: &Path) -> BuildResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| BuildError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e))
}

/// Class files under `dir`, relative and `/`-separated
pub fn collect_class_files(dir: &Path) -> BuildResult<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    if !dir.exists() {
        return Ok(files);
    }

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|e| BuildError::io(dir, e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|s| s.to_str()) != Some("class") {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(name);
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{VariantLayout, VariantRegistry};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes one `.class` per source and records every request
    #[derive(Default)]
    struct RecordingCompiler {
        requests: Mutex<Vec<CompileRequest>>,
        fail_release: Option<u32>,
    }

    impl Compiler for RecordingCompiler {
        fn compile(&self, request: &CompileRequest) -> Result<(), String> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail_release == Some(request.release) {
                return Err(format!("error: release {} rejected", request.release));
            }
            for source in &request.sources {
                let relative = source.strip_prefix(&request.source_root).unwrap();
                let target = request.output_dir.join(relative).with_extension("class");
                fs::create_dir_all(target.parent().unwrap()).unwrap();
                fs::write(target, b"class").unwrap();
            }
            Ok(())
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn layout() -> VariantLayout {
        VariantLayout {
            source_set: "main".to_string(),
            base_release: 8,
            supported: (9..=25).collect(),
        }
    }

    fn unit_with_releases(root: &Path) -> VariantSet {
        write(root, "src/main/java/pkg/Actor.java", "class Actor {}");
        write(root, "src/main/java9/pkg/Actor.java", "class Actor {}");
        write(root, "src/main/java17/pkg/Actor.java", "class Actor {}");
        VariantRegistry::discover("core", root, &layout()).unwrap()
    }

    #[test]
    fn test_compiles_in_ascending_order_with_base_visible() {
        let temp = TempDir::new().unwrap();
        let variants = unit_with_releases(temp.path());
        let compiler = Arc::new(RecordingCompiler::default());

        let outputs = CompilationSequencer::new(compiler.clone())
            .run(&variants, &[])
            .unwrap();

        let requests = compiler.requests.lock().unwrap();
        let releases: Vec<_> = requests.iter().map(|r| r.release).collect();
        assert_eq!(releases, vec![8, 9, 17]);

        assert!(requests[0].classpath.is_empty());
        let base_output = variants.base().output_dir.clone();
        assert_eq!(requests[1].classpath, vec![base_output.clone()]);
        assert_eq!(requests[2].classpath, vec![base_output]);

        // Each variant only compiles its own sources
        assert!(requests[2]
            .sources
            .iter()
            .all(|s| s.starts_with(temp.path().join("src/main/java17"))));

        assert_eq!(outputs.len(), 3);
        assert!(outputs
            .iter()
            .all(|o| o.class_files.contains("pkg/Actor.class")));
    }

    #[test]
    fn test_failure_stops_sequence_and_names_release() {
        let temp = TempDir::new().unwrap();
        let variants = unit_with_releases(temp.path());
        let compiler = Arc::new(RecordingCompiler {
            fail_release: Some(9),
            ..Default::default()
        });

        let failure = CompilationSequencer::new(compiler.clone())
            .run(&variants, &[])
            .unwrap_err();

        assert_eq!(failure.completed.len(), 1);
        assert_eq!(failure.error.unit(), Some("core"));
        assert_eq!(failure.error.release(), Some(9));
        assert!(failure.error.to_string().contains("release 9 rejected"));

        let releases: Vec<_> = compiler
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.release)
            .collect();
        assert_eq!(releases, vec![8, 9]);
    }

    #[test]
    fn test_empty_variant_skips_compiler() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/main/java/pkg/Actor.java", "class Actor {}");
        fs::create_dir_all(temp.path().join("src/main/java11")).unwrap();
        let variants = VariantRegistry::discover("core", temp.path(), &layout()).unwrap();
        let compiler = Arc::new(RecordingCompiler::default());

        let outputs = CompilationSequencer::new(compiler.clone())
            .run(&variants, &[])
            .unwrap();

        assert_eq!(compiler.requests.lock().unwrap().len(), 1);
        assert_eq!(outputs.len(), 2);
        assert!(!outputs[1].compiled);
        assert!(outputs[1].class_files.is_empty());
        assert!(outputs[1].output_dir.is_dir());
    }

    #[test]
    fn test_descriptor_in_override_patches_base() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/main/java/pkg/Actor.java", "class Actor {}");
        write(temp.path(), "src/main/java9/pkg/Actor.java", "class Actor {}");
        write(
            temp.path(),
            "src/main/java9/module-info.java",
            "module testproject.core { exports pkg; }",
        );
        let variants = VariantRegistry::discover("core", temp.path(), &layout()).unwrap();
        let compiler = Arc::new(RecordingCompiler::default());

        let outputs = CompilationSequencer::new(compiler.clone())
            .run(&variants, &[])
            .unwrap();

        let requests = compiler.requests.lock().unwrap();
        assert!(requests[1].classpath.is_empty());
        assert_eq!(
            requests[1].patch_module,
            Some((
                "testproject.core".to_string(),
                vec![variants.base().output_dir.clone()]
            ))
        );
        assert_eq!(
            outputs[1].module_descriptor.as_ref().map(|d| d.name.as_str()),
            Some("testproject.core")
        );
    }

    #[test]
    fn test_variant_above_declaring_one_joins_module() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "src/main/java/pkg/Actor.java", "class Actor {}");
        write(temp.path(), "src/main/java9/pkg/Actor.java", "class Actor {}");
        write(
            temp.path(),
            "src/main/java9/module-info.java",
            "module testproject.core { exports pkg; }",
        );
        write(temp.path(), "src/main/java11/pkg/Main.java", "class Main {}");
        let variants = VariantRegistry::discover("core", temp.path(), &layout()).unwrap();
        let compiler = Arc::new(RecordingCompiler::default());

        let outputs = CompilationSequencer::new(compiler.clone())
            .run(&variants, &[])
            .unwrap();

        let requests = compiler.requests.lock().unwrap();
        assert_eq!(requests[2].release, 11);
        assert!(requests[2].classpath.is_empty());
        assert_eq!(
            requests[2].module_path,
            vec![variants.overrides()[0].output_dir.clone()]
        );
        assert_eq!(
            requests[2].patch_module,
            Some((
                "testproject.core".to_string(),
                vec![
                    temp.path().join("src/main/java11"),
                    variants.base().output_dir.clone()
                ]
            ))
        );
        assert_eq!(outputs[2].module_descriptor, None);
    }

    #[test]
    fn test_modular_base_puts_base_on_module_path() {
        let temp = TempDir::new().unwrap();
        let mut layout = layout();
        layout.base_release = 11;
        layout.supported = (12..=25).collect();
        write(temp.path(), "src/main/java/pkg/Actor.java", "class Actor {}");
        write(
            temp.path(),
            "src/main/java/module-info.java",
            "module testproject.core { exports pkg; }",
        );
        write(temp.path(), "src/main/java17/pkg/Actor.java", "class Actor {}");
        let variants = VariantRegistry::discover("core", temp.path(), &layout).unwrap();
        let compiler = Arc::new(RecordingCompiler::default());

        CompilationSequencer::new(compiler.clone())
            .run(&variants, &[])
            .unwrap();

        let requests = compiler.requests.lock().unwrap();
        let base_output = variants.base().output_dir.clone();
        assert_eq!(requests[0].patch_module, None);
        assert_eq!(requests[1].module_path, vec![base_output]);
        assert_eq!(
            requests[1].patch_module,
            Some((
                "testproject.core".to_string(),
                vec![temp.path().join("src/main/java17")]
            ))
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let temp = TempDir::new().unwrap();
        let variants = unit_with_releases(temp.path());
        let compiler = Arc::new(RecordingCompiler::default());
        let cancellation = Cancellation::new();
        cancellation.cancel();

        let failure = CompilationSequencer::new(compiler.clone())
            .with_cancellation(cancellation)
            .run(&variants, &[])
            .unwrap_err();

        assert!(matches!(failure.error, BuildError::Cancelled { .. }));
        assert!(compiler.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stale_outputs_removed() {
        let temp = TempDir::new().unwrap();
        let variants = unit_with_releases(temp.path());
        write(
            temp.path(),
            "build/classes/java/java9/pkg/Stale.class",
            "old",
        );

        let outputs = CompilationSequencer::new(Arc::new(RecordingCompiler::default()))
            .run(&variants, &[])
            .unwrap();

        assert!(!outputs[1].class_files.contains("pkg/Stale.class"));
    }
}
