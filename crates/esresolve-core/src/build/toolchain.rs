//! Contract with the external compiler toolchain.
//!
//! The driver hands each loaded module to [`Toolchain::transform`] and gets
//! back the transformed code plus the import specifiers the toolchain found.
//! Parsing, code generation and minification all live behind this trait.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::plugin::{BoxError, ResolveKind};
use crate::vfs::ContentKind;

/// Options for one transform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    /// Module path or URL.
    pub path: String,
    pub namespace: String,
    pub loader: ContentKind,
}

/// An import discovered by the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub specifier: String,
    pub kind: ResolveKind,
}

impl ImportRecord {
    #[must_use]
    pub fn new(specifier: impl Into<String>, kind: ResolveKind) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
        }
    }
}

/// Output of one transform call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutput {
    pub code: String,
    /// Imports in first-appearance order.
    pub imports: Vec<ImportRecord>,
}

/// External compiler toolchain.
pub trait Toolchain: Send + Sync {
    fn transform(&self, code: &str, options: &TransformOptions) -> Result<TransformOutput, BoxError>;
}

/// Pass-through toolchain: returns code unchanged and discovers imports with
/// a light scanner. Non-script loaders have no imports.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanToolchain;

impl Toolchain for ScanToolchain {
    fn transform(&self, code: &str, options: &TransformOptions) -> Result<TransformOutput, BoxError> {
        let imports = match options.loader {
            ContentKind::Script | ContentKind::ScriptJsx => scan_imports(code),
            _ => Vec::new(),
        };
        Ok(TransformOutput {
            code: code.to_string(),
            imports,
        })
    }
}

struct ImportPatterns {
    block_comment: Regex,
    line_comment: Regex,
    from_clause: Regex,
    side_effect: Regex,
    dynamic: Regex,
    require: Regex,
}

fn patterns() -> &'static ImportPatterns {
    static PATTERNS: OnceLock<ImportPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ImportPatterns {
        block_comment: compile(r"(?s)/\*.*?\*/"),
        line_comment: compile(r"(?m)^\s*//.*$"),
        from_clause: compile(r#"(?m)^\s*(?:import|export)\b[^'";]*?\bfrom\s*['"]([^'"]+)['"]"#),
        side_effect: compile(r#"(?m)^\s*import\s*['"]([^'"]+)['"]"#),
        dynamic: compile(r#"\bimport\s*\(\s*['"]([^'"]+)['"]\s*\)"#),
        require: compile(r#"\brequire\s*\(\s*['"]([^'"]+)['"]\s*\)"#),
    })
}

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => unreachable!("invalid built-in pattern {pattern}: {err}"),
    }
}

/// Find import specifiers in source code without parsing it.
///
/// Covers `import ... from`, `export ... from`, side-effect `import "x"`,
/// `import("x")` and `require("x")` with literal strings. Results are
/// deduplicated by specifier, in first-appearance order.
#[must_use]
pub fn scan_imports(source: &str) -> Vec<ImportRecord> {
    let p = patterns();
    let without_blocks = p.block_comment.replace_all(source, "");
    let code = p.line_comment.replace_all(&without_blocks, "");

    let mut found: Vec<(usize, &str, ResolveKind)> = Vec::new();
    for (regex, kind) in [
        (&p.from_clause, ResolveKind::ImportStatement),
        (&p.side_effect, ResolveKind::ImportStatement),
        (&p.dynamic, ResolveKind::DynamicImport),
        (&p.require, ResolveKind::RequireCall),
    ] {
        for caps in regex.captures_iter(&code) {
            if let Some(m) = caps.get(1) {
                found.push((m.start(), m.as_str(), kind));
            }
        }
    }
    found.sort_by_key(|(pos, _, _)| *pos);

    let mut imports: Vec<ImportRecord> = Vec::new();
    for (_, specifier, kind) in found {
        if !imports.iter().any(|i| i.specifier == specifier) {
            imports.push(ImportRecord::new(specifier, kind));
        }
    }
    imports
}
