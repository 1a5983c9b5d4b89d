//! Module-Path Resolver
//!
//! Decides, per dependency edge and per release, whether a dependency is exposed
//! to the compiler on the module path or on the classpath. Every decision is a
//! pure function of the dependent's variants, the dependency's variants and the
//! release being compiled; nothing is cached between calls.

use crate::variant::VariantSet;
use rayon::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// How a dependency is exposed to a compile step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WiringMode {
    ModulePath,
    Classpath,
}

impl fmt::Display for WiringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModulePath => write!(f, "module-path"),
            Self::Classpath => write!(f, "classpath"),
        }
    }
}

/// One resolved dependency edge at one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleEdge {
    pub from: String,
    pub to: String,
    pub release: u32,
    pub mode: WiringMode,
}

/// Wiring mode for `dependent -> dependency` when compiling at `release`.
///
/// A dependency goes on the module path only if the dependent is itself a
/// module at that release and the dependency is a module at that release. A
/// descriptor declared by a lower variant stays in effect for every release
/// above it.
pub fn resolve_mode(dependent: &VariantSet, dependency: &VariantSet, release: u32) -> WiringMode {
    if dependent.module_descriptor(release).is_none() {
        return WiringMode::Classpath;
    }
    if dependency.module_descriptor(release).is_some() {
        WiringMode::ModulePath
    } else {
        WiringMode::Classpath
    }
}

/// Edges for every release the dependent compiles
pub fn edges_for(dependent: &VariantSet, dependency: &VariantSet) -> Vec<ModuleEdge> {
    dependent
        .variants()
        .iter()
        .map(|variant| ModuleEdge {
            from: dependent.unit.clone(),
            to: dependency.unit.clone(),
            release: variant.release,
            mode: resolve_mode(dependent, dependency, variant.release),
        })
        .collect()
}

/// Resolve the edges of many `(dependent, dependency)` pairs concurrently.
///
/// Output order follows input order.
pub fn resolve_edges(pairs: &[(&VariantSet, &VariantSet)]) -> Vec<ModuleEdge> {
    pairs
        .par_iter()
        .map(|(dependent, dependency)| edges_for(dependent, dependency))
        .collect::<Vec<_>>()
        .into_iter()
        .flatten()
        .collect()
}

/// A built project dependency: its variants and its published archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub variants: VariantSet,
    pub archive: PathBuf,
}

/// Compile-time entries contributed by project dependencies at one release
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPaths {
    pub classpath: Vec<PathBuf>,
    pub module_path: Vec<PathBuf>,
}

impl DependencyPaths {
    pub fn is_empty(&self) -> bool {
        self.classpath.is_empty() && self.module_path.is_empty()
    }
}

/// Split dependency archives between classpath and module path for `release`
pub fn dependency_paths(
    dependent: &VariantSet,
    release: u32,
    dependencies: &[ResolvedDependency],
) -> DependencyPaths {
    let mut paths = DependencyPaths::default();
    for dependency in dependencies {
        match resolve_mode(dependent, &dependency.variants, release) {
            WiringMode::ModulePath => paths.module_path.push(dependency.archive.clone()),
            WiringMode::Classpath => paths.classpath.push(dependency.archive.clone()),
        }
    }
    paths
}
