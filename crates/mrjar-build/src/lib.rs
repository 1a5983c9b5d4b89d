//! mrjar build system
//!
//! Builds multi-release archives for the projects of a workspace:
//! - Variant discovery per release (`src/<set>/java`, `src/<set>/java<N>`)
//! - Sequenced per-release compilation with base-output visibility
//! - Per-release module-path/classpath wiring between projects
//! - Deterministic archive assembly with structural checks
//! - Parallel builds of independent projects with fingerprint caching

pub mod archive;
pub mod build_order;
pub mod builder;
pub mod cache;
pub mod compiler;
pub mod descriptor;
pub mod error;
pub mod module_path;
pub mod output;
pub mod sequencer;
pub mod tasks;
pub mod variant;

// Re-export main types
pub use archive::{
    verify_archive, ArchiveAssembler, ArchiveLayout, AssemblyReport, Manifest, StructuralWarning,
    MANIFEST_PATH, MULTI_RELEASE, VERSIONS_PREFIX,
};
pub use build_order::{BuildGraph, ProjectNode};
pub use builder::{BuildConfig, BuildReport, Builder, UnitReport};
pub use cache::{compute_fingerprint, BuildCache, CacheMetadata, Fingerprint, FingerprintInputs};
pub use compiler::{CompileRequest, Compiler, JavacCompiler};
pub use descriptor::ModuleDescriptor;
pub use error::{BuildError, BuildResult};
pub use module_path::{
    dependency_paths, edges_for, resolve_edges, resolve_mode, DependencyPaths, ModuleEdge,
    ResolvedDependency, WiringMode,
};
pub use output::{render_report, OutputMode};
pub use sequencer::{Cancellation, CompilationSequencer, CompiledOutput, SequenceFailure};
pub use tasks::{compile_task_name, TaskKind, TaskOutcome, TaskPlan, TaskReport, ARCHIVE_TASK};
pub use variant::{SourceVariant, VariantLayout, VariantRegistry, VariantSet};

// Re-export configuration types for convenience
pub use mrjar_config::{UnitConfig, WorkspaceConfig};
