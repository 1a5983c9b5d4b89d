//! Variants command - list the release variants each project declares

use anyhow::{Context, Result};
use mrjar_build::{Builder, VariantSet};
use std::fmt::Write;
use std::path::Path;

pub fn run(project_dir: &Path, json: bool) -> Result<()> {
    let builder = Builder::new(project_dir).context("Failed to load project")?;
    let sets = builder.discover_variants()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sets)?);
    } else {
        print!("{}", render(&builder.workspace().root, &sets)?);
    }
    Ok(())
}

fn render(root: &Path, sets: &[VariantSet]) -> Result<String> {
    let mut out = String::new();
    for set in sets {
        let kind = if set.is_multi_release() {
            "multi-release"
        } else {
            "single release"
        };
        writeln!(out, "{} ({})", set.unit, kind)?;

        for variant in set.variants() {
            let base = if variant.release == set.base().release {
                " base"
            } else {
                ""
            };
            let source = variant
                .source_root
                .strip_prefix(root)
                .unwrap_or(&variant.source_root);
            write!(out, "  release {}{}: {}", variant.release, base, source.display())?;
            if let Some(descriptor) = &variant.module_descriptor {
                write!(out, " [module {}]", descriptor.name)?;
            }
            writeln!(out)?;
        }
    }
    Ok(out)
}
