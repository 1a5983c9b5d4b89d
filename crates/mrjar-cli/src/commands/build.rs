//! Build command - compile release variants and assemble archives

use anyhow::{Context, Result};
use mrjar_build::{render_report, BuildConfig, Builder, OutputMode};
use std::path::PathBuf;

/// Build command arguments
#[derive(Default)]
pub struct BuildArgs {
    /// Project or workspace directory
    pub project_dir: PathBuf,
    /// Remove build output first
    pub clean: bool,
    /// Number of parallel jobs
    pub jobs: Option<usize>,
    /// Verbose output
    pub verbose: bool,
    /// Quiet output (failures only)
    pub quiet: bool,
    /// JSON output
    pub json: bool,
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let builder = Builder::new(&args.project_dir).context("Failed to load project")?;

    let config = BuildConfig {
        jobs: args.jobs.or(builder.workspace().jobs),
        clean: args.clean,
        ..BuildConfig::default()
    };
    let builder = builder.with_config(config);

    let output_mode = determine_output_mode(&args);
    let report = builder.build()?;

    if output_mode == OutputMode::Json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_report(&report, output_mode));
    }

    let failed = report.failed_units().count();
    if failed > 0 {
        anyhow::bail!("{} project(s) did not produce an archive", failed);
    }
    Ok(())
}

/// Determine output mode from arguments
fn determine_output_mode(args: &BuildArgs) -> OutputMode {
    if args.json {
        OutputMode::Json
    } else if args.quiet {
        OutputMode::Quiet
    } else if args.verbose {
        OutputMode::Verbose
    } else {
        OutputMode::Normal
    }
}
