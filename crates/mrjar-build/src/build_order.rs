//! Build order for workspace projects: dependency levels built one after another
use crate::error::{BuildError, BuildResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

/// A project in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectNode {
    /// Project name
    pub name: String,
    /// Project root directory
    pub root: PathBuf,
    /// Project dependencies (other project names)
    pub dependencies: Vec<String>,
}

impl ProjectNode {
    /// Create a new project node
    pub fn new(name: impl Into<String>, root: PathBuf) -> Self {
        Self {
            name: name.into(),
            root,
            dependencies: Vec::new(),
        }
    }

    /// Add dependencies
    pub fn with_dependencies(mut self, dependencies: Vec<String>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// Build graph over workspace projects
#[derive(Debug, Clone)]
pub struct BuildGraph {
    projects: HashMap<String, ProjectNode>,
}

impl BuildGraph {
    /// Create a new empty build graph
    pub fn new() -> Self {
        Self {
            projects: HashMap::new(),
        }
    }

    /// Add a project to the graph
    pub fn add_project(&mut self, project: ProjectNode) {
        self.projects.insert(project.name.clone(), project);
    }

    /// Get a project by name
    pub fn get_project(&self, name: &str) -> Option<&ProjectNode> {
        self.projects.get(name)
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    /// Check that every dependency names a project in the graph
    pub fn validate(&self) -> BuildResult<()> {
        let mut names: Vec<_> = self.projects.keys().collect();
        names.sort();
        for name in names {
            for dep in &self.projects[name].dependencies {
                if !self.projects.contains_key(dep) {
                    return Err(BuildError::project_not_found(format!(
                        "{} (required by {})",
                        dep, name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Group projects into levels that can be built concurrently
    pub fn parallel_build_groups(&self) -> BuildResult<Vec<Vec<String>>> {
        if self.projects.is_empty() {
            return Ok(Vec::new());
        }

        let mut groups = Vec::new();
        let mut built = HashSet::new();

        loop {
            let mut group: Vec<String> = self
                .projects
                .values()
                .filter(|p| !built.contains(&p.name))
                .filter(|p| p.dependencies.iter().all(|d| built.contains(d)))
                .map(|p| p.name.clone())
                .collect();

            if group.is_empty() {
                break;
            }

            group.sort();
            built.extend(group.iter().cloned());
            groups.push(group);
        }

        if built.len() != self.projects.len() {
            return Err(BuildError::CircularDependency(self.find_cycle()));
        }

        Ok(groups)
    }

    /// Every project that depends on `name`, directly or transitively
    pub fn dependents_of(&self, name: &str) -> HashSet<String> {
        let mut found = HashSet::new();
        let mut queue = VecDeque::from([name.to_string()]);
        while let Some(current) = queue.pop_front() {
            for project in self.projects.values() {
                if project.dependencies.contains(&current) && found.insert(project.name.clone()) {
                    queue.push_back(project.name.clone());
                }
            }
        }
        found
    }

    /// Find a cycle in the graph (for error reporting)
    fn find_cycle(&self) -> String {
        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        let mut names: Vec<_> = self.projects.keys().collect();
        names.sort();
        for name in names {
            if let Some(cycle) = self.dfs_find_cycle(name, &mut visited, &mut rec_stack, &mut path) {
                return cycle;
            }
        }

        "unknown cycle".to_string()
    }

    fn dfs_find_cycle(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        rec_stack: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<String> {
        if rec_stack.contains(name) {
            path.push(name.to_string());
            if let Some(start) = path.iter().position(|p| p == name) {
                return Some(path[start..].join(" -> "));
            }
            return Some(path.join(" -> "));
        }

        if visited.contains(name) {
            return None;
        }

        visited.insert(name.to_string());
        rec_stack.insert(name.to_string());
        path.push(name.to_string());

        if let Some(project) = self.projects.get(name) {
            for dep in &project.dependencies {
                if let Some(cycle) = self.dfs_find_cycle(dep, visited, rec_stack, path) {
                    return Some(cycle);
                }
            }
        }

        rec_stack.remove(name);
        path.pop();
        None
    }
}

impl Default for BuildGraph {
    fn default() -> Self {
        Self::new()
    }
}
