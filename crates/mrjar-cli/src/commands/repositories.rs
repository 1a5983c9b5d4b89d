//! Repositories command - apply each project's repository accessors

use anyhow::{Context, Result};
use mrjar_build::Builder;
use std::path::Path;

pub fn run(project_dir: &Path) -> Result<()> {
    let builder = Builder::new(project_dir).context("Failed to load project")?;

    for (unit, handler) in builder.repositories()? {
        println!("{}", unit);
        if handler.is_empty() {
            println!("  (none)");
        }
        for repository in handler.repositories() {
            println!("  {} {} ({})", repository.name, repository.url, repository.filter);
        }
    }
    Ok(())
}
