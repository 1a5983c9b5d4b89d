//! Compiler adapter
//!
//! The sequencer decides what a compile step sees; a [`Compiler`] only runs it.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Command;

/// Everything one compile step needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// Unit being compiled
    pub unit: String,
    /// Target release (`--release`)
    pub release: u32,
    /// The variant's own source root
    pub source_root: PathBuf,
    /// Source files under `source_root`
    pub sources: Vec<PathBuf>,
    /// Output directory (`-d`)
    pub output_dir: PathBuf,
    /// Classpath entries, in order
    pub classpath: Vec<PathBuf>,
    /// Module path entries, in order
    pub module_path: Vec<PathBuf>,
    /// `--patch-module <name>=<paths>` when compiling as part of a module
    pub patch_module: Option<(String, Vec<PathBuf>)>,
    /// Extra compiler arguments
    pub extra_args: Vec<String>,
}

/// A compile step executor
pub trait Compiler: Send + Sync {
    /// Compile the request's sources into its output directory.
    ///
    /// On failure the error is the compiler's diagnostic output, verbatim.
    fn compile(&self, request: &CompileRequest) -> Result<(), String>;

    /// Short description for logs
    fn describe(&self) -> String {
        "compiler".to_string()
    }
}

/// Runs an external `javac`
#[derive(Debug, Clone)]
pub struct JavacCompiler {
    executable: PathBuf,
}

impl JavacCompiler {
    /// Use the given executable
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// The executable this compiler runs
    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }

    /// Arguments passed to the executable for a request
    pub fn command_line(&self, request: &CompileRequest) -> Result<Vec<OsString>, String> {
        let mut args: Vec<OsString> = vec![
            "--release".into(),
            request.release.to_string().into(),
            "-d".into(),
            request.output_dir.clone().into(),
        ];

        if !request.classpath.is_empty() {
            args.push("-classpath".into());
            args.push(join_paths(&request.classpath)?);
        }

        if !request.module_path.is_empty() {
            args.push("--module-path".into());
            args.push(join_paths(&request.module_path)?);
        }

        if let Some((module, paths)) = &request.patch_module {
            let mut value = OsString::from(format!("{}=", module));
            value.push(join_paths(paths)?);
            args.push("--patch-module".into());
            args.push(value);
        }

        args.extend(request.extra_args.iter().map(OsString::from));
        args.extend(request.sources.iter().map(|s| s.clone().into_os_string()));
        Ok(args)
    }
}

impl Default for JavacCompiler {
    fn default() -> Self {
        Self::new("javac")
    }
}

fn join_paths(paths: &[PathBuf]) -> Result<OsString, String> {
    env::join_paths(paths).map_err(|e| format!("invalid path entry: {}", e))
}

impl Compiler for JavacCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<(), String> {
        let args = self.command_line(request)?;
        tracing::debug!(
            unit = %request.unit,
            release = request.release,
            sources = request.sources.len(),
            "running {}",
            self.executable.display()
        );

        let output = Command::new(&self.executable)
            .args(&args)
            .output()
            .map_err(|e| format!("failed to run {}: {}", self.executable.display(), e))?;

        if output.status.success() {
            return Ok(());
        }

        let mut message = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            if !message.is_empty() {
                message.push('\n');
            }
            message.push_str(stdout.trim_end());
        }
        if message.is_empty() {
            message = format!("{} exited with {}", self.executable.display(), output.status);
        }
        Err(message)
    }

    fn describe(&self) -> String {
        self.executable.display().to_string()
    }
}
