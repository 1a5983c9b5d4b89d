//! Verify command - structural checks on a built archive

use anyhow::{Context, Result};
use mrjar_build::{verify_archive, MULTI_RELEASE};
use std::path::Path;

pub fn run(archive: &Path, strict: bool) -> Result<()> {
    let unit = archive
        .file_stem()
        .and_then(|s| s.to_str())
        .context("Archive path has no file name")?;

    let (layout, warnings) = verify_archive(archive, unit)?;

    println!("{}", archive.display());
    println!("  root entries: {}", layout.root_entries.len());
    for (release, entries) in &layout.versioned_entries {
        println!("  release {}: {} entries", release, entries.len());
    }
    println!(
        "  {}: {}",
        MULTI_RELEASE,
        layout.manifest.get(MULTI_RELEASE).unwrap_or("absent")
    );

    for warning in &warnings {
        let entry = warning.entry.as_deref().unwrap_or("");
        match warning.release {
            Some(release) => println!("  warning: release {} {}: {}", release, entry, warning.message),
            None => println!("  warning: {}", warning.message),
        }
    }

    if strict {
        if let Some(first) = warnings.into_iter().next() {
            return Err(first.into_error().into());
        }
    }
    Ok(())
}
