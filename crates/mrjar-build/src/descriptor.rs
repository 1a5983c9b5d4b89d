//! Module descriptor (`module-info.java`) inspection

use crate::error::{BuildError, BuildResult};
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Source file name of a module descriptor
pub const MODULE_DESCRIPTOR_SOURCE: &str = "module-info.java";

/// Compiled file name of a module descriptor
pub const MODULE_DESCRIPTOR_CLASS: &str = "module-info.class";

/// First release able to compile a module descriptor
pub const FIRST_MODULAR_RELEASE: u32 = 9;

/// The identity declared by a module descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleDescriptor {
    /// Module name, e.g. `testproject.core`
    pub name: String,
    /// Declared as `open module`
    pub open: bool,
}

impl ModuleDescriptor {
    /// Parse the module declaration out of descriptor source text
    pub fn parse(source: &str) -> Option<Self> {
        let without_blocks = block_comment_re().replace_all(source, " ");
        let stripped = line_comment_re().replace_all(&without_blocks, " ");

        let captures = declaration_re().captures(&stripped)?;
        let name: String = captures[2].chars().filter(|c| !c.is_whitespace()).collect();

        Some(Self {
            name,
            open: captures.get(1).is_some(),
        })
    }

    /// Read and parse the descriptor of the `release` variant of `unit`
    pub fn read(unit: &str, release: u32, path: &Path) -> BuildResult<Self> {
        let source = fs::read_to_string(path).map_err(|e| BuildError::io(path, e))?;
        Self::parse(&source).ok_or_else(|| BuildError::InvalidModuleDescriptor {
            unit: unit.to_string(),
            release,
            path: path.to_path_buf(),
        })
    }
}

fn block_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").expect("block comment regex must compile"))
}

fn line_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"//[^\n]*").expect("line comment regex must compile"))
}

fn declaration_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(open\s+)?module\s+([A-Za-z_$][\w$]*(?:\s*\.\s*[A-Za-z_$][\w$]*)*)\s*\{",
        )
        .expect("module declaration regex must compile")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_module() {
        let descriptor = ModuleDescriptor::parse(
            "module testproject.core {\n  exports testproject.core;\n}\n",
        )
        .unwrap();
        assert_eq!(descriptor.name, "testproject.core");
        assert!(!descriptor.open);
    }

    #[test]
    fn test_parse_open_module_with_imports() {
        let descriptor = ModuleDescriptor::parse(
            "import java.lang.annotation.Native;\n\nopen module a.b.c {\n  requires java.sql;\n}\n",
        )
        .unwrap();
        assert_eq!(descriptor.name, "a.b.c");
        assert!(descriptor.open);
    }

    #[test]
    fn test_parse_ignores_commented_declarations() {
        let source = "/* module fake.one { } */\n// module fake.two {\nmodule real.module {}\n";
        let descriptor = ModuleDescriptor::parse(source).unwrap();
        assert_eq!(descriptor.name, "real.module");
    }

    #[test]
    fn test_parse_name_split_across_whitespace() {
        let descriptor = ModuleDescriptor::parse("module org . example\n{ }").unwrap();
        assert_eq!(descriptor.name, "org.example");
    }

    #[test]
    fn test_parse_without_declaration() {
        assert!(ModuleDescriptor::parse("package pkg; class Actor {}").is_none());
        assert!(ModuleDescriptor::parse("// module commented.out {").is_none());
    }

    #[test]
    fn test_parse_repeatedly() {
        for i in 0..3 {
            let source = format!("module m{} {{}}", i);
            assert_eq!(ModuleDescriptor::parse(&source).unwrap().name, format!("m{}", i));
        }
    }

    #[test]
    fn test_read_without_declaration_names_release() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(MODULE_DESCRIPTOR_SOURCE);
        fs::write(&path, "// declare the module later\n").unwrap();

        let err = ModuleDescriptor::read("core", 9, &path).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.unit(), Some("core"));
        assert_eq!(err.release(), Some(9));
    }
}
