use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// Build multi-release Java archives.
///
/// Each project keeps its base sources in `src/main/java` and release-specific
/// overrides in `src/main/java<N>`. The build compiles every release in order
/// and packs the results into one archive under `build/libs/`.
///
/// EXAMPLES:
///     mrjar build                     Build the project in the current directory
///     mrjar build --clean --jobs 4    Clean, then build with 4 workers
///     mrjar variants                  Show the discovered release variants
///     mrjar wiring --json             Show module-path/classpath decisions
///     mrjar verify build/libs/core-1.0.0.jar
///
/// ENVIRONMENT VARIABLES:
///     MRJAR_JAVAC             Compiler executable
///     MRJAR_JOBS              Worker threads for independent projects
///     MRJAR_STRICT_OVERRIDES  Reject overrides without a base counterpart
///     MRJAR_JSON              Set to '1' for JSON output by default
///     RUST_LOG                Log filter
#[derive(Parser)]
#[command(name = "mrjar")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output and debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every release variant and assemble the archives
    ///
    /// EXAMPLES:
    ///     mrjar build
    ///     mrjar build --project-dir ../core --quiet
    #[command(visible_alias = "b")]
    Build {
        /// Project or workspace directory
        #[arg(long, short = 'p', default_value = ".")]
        project_dir: PathBuf,
        /// Remove build output first
        #[arg(long)]
        clean: bool,
        /// Worker threads for independent projects
        #[arg(long, short = 'j')]
        jobs: Option<usize>,
        /// Failures only
        #[arg(long, short = 'q')]
        quiet: bool,
        /// JSON output
        #[arg(long, env = "MRJAR_JSON")]
        json: bool,
    },

    /// List the release variants of every project
    Variants {
        /// Project or workspace directory
        #[arg(long, short = 'p', default_value = ".")]
        project_dir: PathBuf,
        /// JSON output
        #[arg(long, env = "MRJAR_JSON")]
        json: bool,
    },

    /// Show how each dependency is wired at each release
    Wiring {
        /// Project or workspace directory
        #[arg(long, short = 'p', default_value = ".")]
        project_dir: PathBuf,
        /// JSON output
        #[arg(long, env = "MRJAR_JSON")]
        json: bool,
    },

    /// Check the structure of an existing archive
    Verify {
        /// Archive to check
        archive: PathBuf,
        /// Treat overrides without a base counterpart as errors
        #[arg(long)]
        strict: bool,
    },

    /// Print the repository entries each project configures
    Repositories {
        /// Project or workspace directory
        #[arg(long, short = 'p', default_value = ".")]
        project_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build {
            project_dir,
            clean,
            jobs,
            quiet,
            json,
        } => commands::build::run(commands::build::BuildArgs {
            project_dir,
            clean,
            jobs,
            verbose: cli.verbose,
            quiet,
            json,
        }),
        Commands::Variants { project_dir, json } => commands::variants::run(&project_dir, json),
        Commands::Wiring { project_dir, json } => commands::wiring::run(&project_dir, json),
        Commands::Verify { archive, strict } => commands::verify::run(&archive, strict),
        Commands::Repositories { project_dir } => commands::repositories::run(&project_dir),
    }
}
