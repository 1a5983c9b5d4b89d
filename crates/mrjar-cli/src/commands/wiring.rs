//! Wiring command - module-path or classpath, per dependency and release

use anyhow::{Context, Result};
use mrjar_build::Builder;
use std::path::Path;

pub fn run(project_dir: &Path, json: bool) -> Result<()> {
    let builder = Builder::new(project_dir).context("Failed to load project")?;
    let edges = builder.wiring()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&edges)?);
        return Ok(());
    }

    if edges.is_empty() {
        println!("no project dependencies");
    }
    for edge in &edges {
        println!("{} -> {} @ {}: {}", edge.from, edge.to, edge.release, edge.mode);
    }
    Ok(())
}
