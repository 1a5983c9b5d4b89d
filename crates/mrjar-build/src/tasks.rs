/// Task surface: one compile task per variant and one archive task per unit
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Name of the archive task
pub const ARCHIVE_TASK: &str = "jar";

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskOutcome {
    /// Ran and succeeded
    Success,
    /// Inputs unchanged since the last successful build
    UpToDate,
    /// Ran and failed
    Failed,
    /// Not attempted because something upstream failed
    Skipped,
}

impl TaskOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "SUCCESS"),
            Self::UpToDate => write!(f, "UP-TO-DATE"),
            Self::Failed => write!(f, "FAILED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// What a task does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "release")]
pub enum TaskKind {
    /// Compile the variant for a release
    Compile(u32),
    /// Assemble the unit's archive
    Archive,
}

/// Outcome of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    /// Deterministic task name, e.g. `compileJava17Java`
    pub name: String,
    pub kind: TaskKind,
    pub outcome: TaskOutcome,
    pub duration: Duration,
}

/// Compile task name for a release.
///
/// The base variant of source set `main` is `compileJava`, of any other set
/// `compile<Set>Java`; release `N` above the base is `compileJava<N>Java`.
pub fn compile_task_name(source_set: &str, release: u32, base_release: u32) -> String {
    if release != base_release {
        return format!("compileJava{}Java", release);
    }
    if source_set == "main" {
        "compileJava".to_string()
    } else {
        format!("compile{}Java", capitalize(source_set))
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The tasks of one unit in execution order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    tasks: Vec<(String, TaskKind)>,
}

impl TaskPlan {
    /// Plan for a unit compiling `releases` (ascending, base first)
    pub fn new(source_set: &str, releases: &[u32]) -> Self {
        let base = releases.first().copied().unwrap_or_default();
        let mut tasks: Vec<(String, TaskKind)> = releases
            .iter()
            .map(|r| (compile_task_name(source_set, *r, base), TaskKind::Compile(*r)))
            .collect();
        tasks.push((ARCHIVE_TASK.to_string(), TaskKind::Archive));
        Self { tasks }
    }

    /// Task names in order
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Tasks that must finish before `name`: lower compile tasks, or every
    /// compile task for the archive task
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        match self.tasks.iter().position(|(n, _)| n == name) {
            Some(index) => self.tasks[..index].iter().map(|(n, _)| n.as_str()).collect(),
            None => Vec::new(),
        }
    }

    /// A report for every task with the same outcome
    pub fn uniform(&self, outcome: TaskOutcome) -> Vec<TaskReport> {
        self.tasks
            .iter()
            .map(|(name, kind)| TaskReport {
                name: name.clone(),
                kind: *kind,
                outcome,
                duration: Duration::ZERO,
            })
            .collect()
    }

    /// Task name for a compile release
    pub fn compile_task(&self, release: u32) -> Option<&str> {
        self.tasks
            .iter()
            .find(|(_, kind)| *kind == TaskKind::Compile(release))
            .map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
