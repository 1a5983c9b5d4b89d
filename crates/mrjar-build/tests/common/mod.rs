//! Shared fixtures: on-disk workspaces and an in-process compiler

#![allow(dead_code)]

use mrjar_build::{Builder, CompileRequest, Compiler};
use mrjar_config::ConfigLoader;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Compiler that turns every `X.java` into `X.class` holding the source text
#[derive(Default)]
pub struct FakeCompiler {
    requests: Mutex<Vec<CompileRequest>>,
    events: Mutex<Vec<String>>,
    failures: HashSet<(String, u32)>,
}

impl FakeCompiler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every compile of `unit` at `release`
    pub fn failing(failures: &[(&str, u32)]) -> Arc<Self> {
        Arc::new(Self {
            failures: failures
                .iter()
                .map(|(unit, release)| (unit.to_string(), *release))
                .collect(),
            ..Self::default()
        })
    }

    pub fn requests(&self) -> Vec<CompileRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_for(&self, unit: &str) -> Vec<CompileRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.unit == unit)
            .collect()
    }

    /// `start <unit> <release>` / `end <unit> <release>` in execution order
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Compiler for FakeCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<(), String> {
        self.requests.lock().unwrap().push(request.clone());
        self.events
            .lock()
            .unwrap()
            .push(format!("start {} {}", request.unit, request.release));

        let result = if self
            .failures
            .contains(&(request.unit.clone(), request.release))
        {
            Err(format!(
                "Actor.java:3: error: cannot find symbol (release {})",
                request.release
            ))
        } else {
            for source in &request.sources {
                let relative = source.strip_prefix(&request.source_root).unwrap();
                let target = request.output_dir.join(relative).with_extension("class");
                fs::create_dir_all(target.parent().unwrap()).unwrap();
                fs::copy(source, target).unwrap();
            }
            Ok(())
        };

        self.events
            .lock()
            .unwrap()
            .push(format!("end {} {}", request.unit, request.release));
        result
    }

    fn describe(&self) -> String {
        "fake-javac".to_string()
    }
}

/// Write a file, creating parent directories
pub fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Minimal `mrjar.toml` for a project
pub fn project_toml(name: &str, dependencies: &[&str], extra: &str) -> String {
    let deps = dependencies
        .iter()
        .map(|d| format!("\"{}\"", d))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "[project]\nname = \"{}\"\nversion = \"1.0.0\"\nrelease = 8\ndependencies = [{}]\n{}",
        name, deps, extra
    )
}

/// A single project at the root with `Actor` declared at the given releases
pub fn single_project(releases: &[u32]) -> TempDir {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "mrjar.toml", &project_toml("core", &[], ""));
    add_actor(temp.path(), releases);
    temp
}

/// Declare `pkg.Actor` in the variant of every release (the first is the base)
pub fn add_actor(root: &Path, releases: &[u32]) {
    for (i, release) in releases.iter().enumerate() {
        let dir = if i == 0 {
            "src/main/java".to_string()
        } else {
            format!("src/main/java{}", release)
        };
        write(
            root,
            &format!("{}/pkg/Actor.java", dir),
            &format!("package pkg; public class Actor {{ /* {} */ }}", release),
        );
    }
}

/// Workspace root listing `members` under `subprojects/`
pub fn workspace(members: &[&str]) -> TempDir {
    let temp = TempDir::new().unwrap();
    let list = members
        .iter()
        .map(|m| format!("\"subprojects/{}\"", m))
        .collect::<Vec<_>>()
        .join(", ");
    write(
        temp.path(),
        "mrjar.toml",
        &format!("[workspace]\nmembers = [{}]\n", list),
    );
    temp
}

/// Builder over the workspace at `root`, ignoring the environment
pub fn builder(root: &Path, compiler: Arc<FakeCompiler>) -> Builder {
    let workspace = ConfigLoader::without_env().load_workspace(root).unwrap();
    Builder::from_workspace(workspace).with_compiler(compiler)
}
