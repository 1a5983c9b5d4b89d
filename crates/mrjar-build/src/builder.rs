//! Build orchestration across the projects of a workspace
use crate::archive::{ArchiveAssembler, StructuralWarning};
use crate::build_order::{BuildGraph, ProjectNode};
use crate::cache::{compute_fingerprint, BuildCache, CacheMetadata, Fingerprint, FingerprintInputs};
use crate::compiler::{Compiler, JavacCompiler};
use crate::error::{BuildError, BuildResult};
use crate::module_path::{resolve_edges, ModuleEdge, ResolvedDependency};
use crate::sequencer::{Cancellation, CompilationSequencer};
use crate::tasks::{TaskKind, TaskOutcome, TaskPlan, TaskReport};
use crate::variant::{VariantLayout, VariantRegistry, VariantSet};

use mrjar_config::{
    register_repository_extensions, ConfigLoader, ExtensionRegistry, RepositoryHandler,
    UnitConfig, WorkspaceConfig,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Worker threads for independent units (defaults to available parallelism)
    pub jobs: Option<usize>,
    /// Remove every unit's `build/` directory first
    pub clean: bool,
    /// Skip units whose fingerprint matches the last successful build
    pub use_cache: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            jobs: None,
            clean: false,
            use_cache: true,
        }
    }
}

/// Outcome of one unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitReport {
    pub name: String,
    pub outcome: TaskOutcome,
    pub tasks: Vec<TaskReport>,
    pub archive: Option<PathBuf>,
    pub multi_release: bool,
    pub warnings: Vec<StructuralWarning>,
    pub error: Option<String>,
    pub failed_release: Option<u32>,
    pub duration: Duration,
}

impl UnitReport {
    /// Find a task by name
    pub fn task(&self, name: &str) -> Option<&TaskReport> {
        self.tasks.iter().find(|t| t.name == name)
    }

    fn skipped(name: &str, plan: &TaskPlan, reason: String) -> Self {
        Self {
            name: name.to_string(),
            outcome: TaskOutcome::Skipped,
            tasks: plan.uniform(TaskOutcome::Skipped),
            archive: None,
            multi_release: false,
            warnings: Vec::new(),
            error: Some(reason),
            failed_release: None,
            duration: Duration::ZERO,
        }
    }
}

/// Result of a whole build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Units in workspace order
    pub units: Vec<UnitReport>,
    pub total_time: Duration,
}

impl BuildReport {
    /// Every unit succeeded or was up to date
    pub fn success(&self) -> bool {
        self.units
            .iter()
            .all(|u| matches!(u.outcome, TaskOutcome::Success | TaskOutcome::UpToDate))
    }

    /// Find a unit by name
    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Units that did not produce an archive
    pub fn failed_units(&self) -> impl Iterator<Item = &UnitReport> {
        self.units
            .iter()
            .filter(|u| matches!(u.outcome, TaskOutcome::Failed | TaskOutcome::Skipped))
    }
}

/// Per-unit inputs prepared before the build starts
struct UnitJob<'a> {
    unit: &'a UnitConfig,
    variants: &'a VariantSet,
    plan: TaskPlan,
    archive: PathBuf,
    dependencies: Vec<ResolvedDependency>,
    dependency_fingerprints: BTreeMap<String, Fingerprint>,
}

struct UnitResult {
    report: UnitReport,
    fingerprint: Option<Fingerprint>,
}

/// Main builder for orchestrating builds
pub struct Builder {
    workspace: WorkspaceConfig,
    config: BuildConfig,
    compiler: Option<Arc<dyn Compiler>>,
    cancellation: Cancellation,
}

impl Builder {
    /// Load the workspace rooted at `dir`, honouring `MRJAR_*` overrides
    pub fn new(dir: impl AsRef<Path>) -> BuildResult<Self> {
        let workspace = ConfigLoader::new().load_workspace(dir.as_ref())?;
        Ok(Self::from_workspace(workspace))
    }

    /// Build an already loaded workspace
    pub fn from_workspace(workspace: WorkspaceConfig) -> Self {
        let config = BuildConfig {
            jobs: workspace.jobs,
            ..BuildConfig::default()
        };
        Self {
            workspace,
            config,
            compiler: None,
            cancellation: Cancellation::new(),
        }
    }

    /// Set build configuration
    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = config;
        self
    }

    /// Use one compiler for every unit instead of each unit's configured `javac`
    pub fn with_compiler(mut self, compiler: Arc<dyn Compiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Handle that cancels the build between variants
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }

    pub fn workspace(&self) -> &WorkspaceConfig {
        &self.workspace
    }

    /// Project graph of the workspace, validated
    pub fn graph(&self) -> BuildResult<BuildGraph> {
        let mut graph = BuildGraph::new();
        for unit in &self.workspace.units {
            graph.add_project(
                ProjectNode::new(unit.name(), unit.root.clone())
                    .with_dependencies(unit.dependencies().to_vec()),
            );
        }
        graph.validate()?;
        Ok(graph)
    }

    /// Discover the variants of every unit, in workspace order
    pub fn discover_variants(&self) -> BuildResult<Vec<VariantSet>> {
        self.workspace
            .units
            .iter()
            .map(|unit| {
                let layout = VariantLayout::from_config(&unit.config);
                VariantRegistry::discover(unit.name(), &unit.root, &layout)
            })
            .collect()
    }

    /// Module-path/classpath decision for every dependency edge at every
    /// release of the dependent
    pub fn wiring(&self) -> BuildResult<Vec<ModuleEdge>> {
        self.graph()?;
        let variants = self.discover_variants()?;
        let by_name: HashMap<&str, &VariantSet> =
            variants.iter().map(|v| (v.unit.as_str(), v)).collect();

        let mut pairs = Vec::new();
        for (unit, dependent) in self.workspace.units.iter().zip(&variants) {
            for dependency in unit.dependencies() {
                let dependency = by_name
                    .get(dependency.as_str())
                    .copied()
                    .ok_or_else(|| BuildError::project_not_found(dependency.clone()))?;
                pairs.push((dependent, dependency));
            }
        }

        Ok(resolve_edges(&pairs))
    }

    /// Apply every unit's repository accessors, in workspace order
    pub fn repositories(&self) -> BuildResult<Vec<(String, RepositoryHandler)>> {
        self.workspace
            .units
            .iter()
            .map(|unit| -> BuildResult<(String, RepositoryHandler)> {
                let mut registry = ExtensionRegistry::with_builtins();
                register_repository_extensions(
                    &mut registry,
                    unit.config.repository_declarations.iter().cloned(),
                )?;

                let mut handler = RepositoryHandler::new();
                for name in unit.repositories() {
                    registry.invoke(name, &mut handler)?;
                }
                Ok((unit.name().to_string(), handler))
            })
            .collect()
    }

    /// Remove every unit's `build/` directory
    pub fn clean(&self) -> BuildResult<()> {
        for unit in &self.workspace.units {
            let build_dir = unit.root.join("build");
            if build_dir.exists() {
                fs::remove_dir_all(&build_dir).map_err(|e| BuildError::io(&build_dir, e))?;
            }
        }
        Ok(())
    }

    /// Path of a unit's published archive
    pub fn archive_path(unit: &UnitConfig) -> PathBuf {
        unit.root
            .join("build")
            .join("libs")
            .join(unit.archive_file_name())
    }

    /// Execute the build.
    ///
    /// Configuration errors are returned before anything compiles. Compilation
    /// and structural failures are reported per unit; units that do not depend
    /// on a failed unit still build.
    pub fn build(&self) -> BuildResult<BuildReport> {
        let build_start = Instant::now();

        let graph = self.graph()?;
        let groups = graph.parallel_build_groups()?;
        let variants = self.discover_variants()?;
        self.repositories()?;

        if self.config.clean {
            self.clean()?;
        }

        let jobs = self.config.jobs.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .build()
            .map_err(|e| BuildError::BuildFailed(format!("cannot start worker pool: {}", e)))?;

        let units: HashMap<&str, (&UnitConfig, &VariantSet)> = self
            .workspace
            .units
            .iter()
            .zip(&variants)
            .map(|(unit, set)| (unit.name(), (unit, set)))
            .collect();

        tracing::debug!(units = units.len(), groups = groups.len(), jobs, "starting build");

        let mut results: HashMap<String, UnitResult> = HashMap::new();
        let mut blocked: HashMap<String, String> = HashMap::new();

        for group in &groups {
            let mut jobs_in_group = Vec::new();

            for name in group {
                let Some(&(unit, set)) = units.get(name.as_str()) else {
                    return Err(BuildError::project_not_found(name.clone()));
                };
                let plan = TaskPlan::new(&unit.config.variants.source_set, &set.releases());

                if let Some(failed) = blocked.get(name) {
                    tracing::warn!(unit = %name, "skipped: dependency '{}' failed", failed);
                    results.insert(
                        name.clone(),
                        UnitResult {
                            report: UnitReport::skipped(
                                name,
                                &plan,
                                format!("dependency '{}' failed", failed),
                            ),
                            fingerprint: None,
                        },
                    );
                    continue;
                }

                let mut dependencies = Vec::new();
                let mut dependency_fingerprints = BTreeMap::new();
                for dep in unit.dependencies() {
                    let (dep_unit, dep_set) = units
                        .get(dep.as_str())
                        .copied()
                        .ok_or_else(|| BuildError::project_not_found(dep.clone()))?;
                    dependencies.push(ResolvedDependency {
                        variants: dep_set.clone(),
                        archive: Self::archive_path(dep_unit),
                    });
                    if let Some(fingerprint) = results.get(dep).and_then(|r| r.fingerprint.clone()) {
                        dependency_fingerprints.insert(dep.clone(), fingerprint);
                    }
                }

                jobs_in_group.push(UnitJob {
                    unit,
                    variants: set,
                    plan,
                    archive: Self::archive_path(unit),
                    dependencies,
                    dependency_fingerprints,
                });
            }

            let finished: Vec<UnitResult> =
                pool.install(|| jobs_in_group.par_iter().map(|job| self.build_unit(job)).collect());

            for result in finished {
                let name = result.report.name.clone();
                if result.report.outcome.is_failure() || result.report.outcome == TaskOutcome::Skipped {
                    for dependent in graph.dependents_of(&name) {
                        blocked.entry(dependent).or_insert_with(|| name.clone());
                    }
                }
                results.insert(name, result);
            }
        }

        let units = self
            .workspace
            .units
            .iter()
            .filter_map(|unit| results.remove(unit.name()).map(|r| r.report))
            .collect();

        Ok(BuildReport {
            units,
            total_time: build_start.elapsed(),
        })
    }

    fn build_unit(&self, job: &UnitJob<'_>) -> UnitResult {
        let start = Instant::now();
        let name = job.unit.name();
        let config = &job.unit.config;

        let compiler_id = match &self.compiler {
            Some(compiler) => compiler.describe(),
            None => config.compiler.javac.clone(),
        };
        let archive_name = job.unit.archive_file_name();
        let inputs = FingerprintInputs {
            compiler: &compiler_id,
            extra_args: &config.compiler.args,
            strict_overrides: config.variants.strict_overrides,
            archive_name: &archive_name,
            dependencies: job.dependency_fingerprints.clone(),
        };
        let fingerprint = match compute_fingerprint(job.variants, &inputs) {
            Ok(fingerprint) => fingerprint,
            Err(error) => return self.failed(job, job.plan.uniform(TaskOutcome::Skipped), error, start),
        };

        let cache = BuildCache::for_unit(&job.unit.root);
        let recorded = if self.config.use_cache {
            cache.fresh(&fingerprint)
        } else {
            None
        };
        if let Some(recorded) = recorded {
            tracing::info!(unit = name, warnings = recorded.warnings.len(), "up to date");
            return UnitResult {
                report: UnitReport {
                    name: name.to_string(),
                    outcome: TaskOutcome::UpToDate,
                    tasks: job.plan.uniform(TaskOutcome::UpToDate),
                    archive: Some(job.archive.clone()),
                    multi_release: job.variants.is_multi_release(),
                    warnings: recorded.warnings,
                    error: None,
                    failed_release: None,
                    duration: start.elapsed(),
                },
                fingerprint: Some(fingerprint),
            };
        }
        if let Err(error) = cache.invalidate() {
            tracing::warn!(unit = name, "{}", error);
        }

        let compiler: Arc<dyn Compiler> = match &self.compiler {
            Some(compiler) => Arc::clone(compiler),
            None => Arc::new(JavacCompiler::new(&config.compiler.javac)),
        };
        let sequencer = CompilationSequencer::new(compiler)
            .with_extra_args(config.compiler.args.clone())
            .with_cancellation(self.cancellation.clone());

        let mut tasks = job.plan.uniform(TaskOutcome::Skipped);
        let outputs = match sequencer.run(job.variants, &job.dependencies) {
            Ok(outputs) => outputs,
            Err(failure) => {
                for output in &failure.completed {
                    mark(&mut tasks, TaskKind::Compile(output.release), TaskOutcome::Success, output.elapsed);
                }
                if let Some(release) = failure.error.release() {
                    mark(&mut tasks, TaskKind::Compile(release), TaskOutcome::Failed, Duration::ZERO);
                }
                return self.failed(job, tasks, failure.error, start);
            }
        };
        for output in &outputs {
            mark(&mut tasks, TaskKind::Compile(output.release), TaskOutcome::Success, output.elapsed);
        }

        if self.cancellation.is_cancelled() {
            return self.failed(
                job,
                tasks,
                BuildError::Cancelled {
                    unit: name.to_string(),
                },
                start,
            );
        }

        let assemble_start = Instant::now();
        let assembler = ArchiveAssembler::new(config.variants.strict_overrides)
            .with_attribute("Implementation-Title", name)
            .with_attribute("Implementation-Version", job.unit.version());
        let report = match assembler.assemble(name, &outputs, &job.archive) {
            Ok(report) => report,
            Err(error) => {
                mark(&mut tasks, TaskKind::Archive, TaskOutcome::Failed, assemble_start.elapsed());
                return self.failed(job, tasks, error, start);
            }
        };
        mark(&mut tasks, TaskKind::Archive, TaskOutcome::Success, assemble_start.elapsed());

        let metadata = CacheMetadata::new(fingerprint.clone(), job.archive.clone())
            .with_warnings(report.warnings.clone());
        if let Err(error) = cache.store(&metadata) {
            tracing::warn!(unit = name, "could not record build cache: {}", error);
        }

        tracing::info!(
            unit = name,
            archive = %report.archive.display(),
            entries = report.entries,
            multi_release = report.multi_release,
            "built"
        );

        UnitResult {
            report: UnitReport {
                name: name.to_string(),
                outcome: TaskOutcome::Success,
                tasks,
                archive: Some(report.archive),
                multi_release: report.multi_release,
                warnings: report.warnings,
                error: None,
                failed_release: None,
                duration: start.elapsed(),
            },
            fingerprint: Some(fingerprint),
        }
    }

    fn failed(
        &self,
        job: &UnitJob<'_>,
        tasks: Vec<TaskReport>,
        error: BuildError,
        start: Instant,
    ) -> UnitResult {
        let outcome = if matches!(error, BuildError::Cancelled { .. }) {
            TaskOutcome::Skipped
        } else {
            TaskOutcome::Failed
        };
        tracing::info!(unit = job.unit.name(), "failed: {}", error);

        UnitResult {
            report: UnitReport {
                name: job.unit.name().to_string(),
                outcome,
                tasks,
                archive: None,
                multi_release: false,
                warnings: Vec::new(),
                error: Some(error.to_string()),
                failed_release: error.release(),
                duration: start.elapsed(),
            },
            fingerprint: None,
        }
    }
}

fn mark(tasks: &mut [TaskReport], kind: TaskKind, outcome: TaskOutcome, duration: Duration) {
    if let Some(task) = tasks.iter_mut().find(|t| t.kind == kind) {
        task.outcome = outcome;
        task.duration = duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_default() {
        let config = BuildConfig::default();
        assert!(config.jobs.is_none());
        assert!(!config.clean);
        assert!(config.use_cache);
    }

    #[test]
    fn test_report_success_requires_every_unit() {
        let plan = TaskPlan::new("main", &[8]);
        let ok = UnitReport {
            name: "a".to_string(),
            outcome: TaskOutcome::UpToDate,
            tasks: plan.uniform(TaskOutcome::UpToDate),
            archive: None,
            multi_release: false,
            warnings: Vec::new(),
            error: None,
            failed_release: None,
            duration: Duration::ZERO,
        };
        let skipped = UnitReport::skipped("b", &plan, "dependency 'a' failed".to_string());

        let report = BuildReport {
            units: vec![ok.clone()],
            total_time: Duration::ZERO,
        };
        assert!(report.success());

        let report = BuildReport {
            units: vec![ok, skipped],
            total_time: Duration::ZERO,
        };
        assert!(!report.success());
        assert_eq!(report.failed_units().count(), 1);
        assert_eq!(report.unit("b").unwrap().outcome, TaskOutcome::Skipped);
    }
}
