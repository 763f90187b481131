use std::path::PathBuf;
use thiserror::Error;

use crate::import_map::ImportMapError;
use crate::plugin::PluginError;

/// Stable error codes surfaced in build reports.
///
/// All codes are SCREAMING_SNAKE_CASE and stable across versions.
pub mod codes {
    /// No probing stage found the requested path.
    pub const FILE_NOT_FOUND: &str = "FILE_NOT_FOUND";
    /// Import map is malformed or a mapping is misconfigured.
    pub const IMPORT_MAP_INVALID: &str = "IMPORT_MAP_INVALID";
    /// Import map entry explicitly blocks the specifier.
    pub const IMPORT_MAP_BLOCKED: &str = "IMPORT_MAP_BLOCKED";
    /// A plugin failed during setup or inside a hook.
    pub const PLUGIN_FAILED: &str = "PLUGIN_FAILED";
    /// Bare specifier with no import map entry.
    pub const UNRESOLVED_SPECIFIER: &str = "UNRESOLVED_SPECIFIER";
    /// The external toolchain rejected a module.
    pub const TRANSFORM_FAILED: &str = "TRANSFORM_FAILED";
    /// Config file could not be read.
    pub const CONFIG_READ: &str = "CONFIG_READ";
    /// Config file could not be parsed.
    pub const CONFIG_PARSE: &str = "CONFIG_PARSE";
}

/// Core error type for esresolve operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot find '{path}'{}", imported_from(.importer))]
    FileNotFound {
        path: String,
        importer: Option<String>,
    },

    #[error(transparent)]
    ImportMap(#[from] ImportMapError),

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Failed to transform {path}: {message}")]
    Transform { path: String, message: String },

    #[error("Failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    #[must_use]
    pub fn not_found(path: impl Into<String>, importer: Option<&str>) -> Self {
        Self::FileNotFound {
            path: path.into(),
            importer: importer.map(str::to_string),
        }
    }

    /// Stable code for reports.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::FileNotFound { .. } => codes::FILE_NOT_FOUND,
            Self::ImportMap(ImportMapError::Blocked { .. }) => codes::IMPORT_MAP_BLOCKED,
            Self::ImportMap(_) => codes::IMPORT_MAP_INVALID,
            Self::Plugin(_) => codes::PLUGIN_FAILED,
            Self::Resolution(_) => codes::UNRESOLVED_SPECIFIER,
            Self::Transform { .. } => codes::TRANSFORM_FAILED,
            Self::ConfigRead { .. } => codes::CONFIG_READ,
            Self::ConfigParse { .. } => codes::CONFIG_PARSE,
        }
    }

    /// Fatal errors stop a build walk; the rest are collected and reported together.
    ///
    /// A blocked specifier is a per-import failure, not a broken map, so it is
    /// batched like any other unresolved import.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ImportMap(err) => !matches!(err, ImportMapError::Blocked { .. }),
            Self::Plugin(_) | Self::ConfigRead { .. } | Self::ConfigParse { .. } => true,
            Self::FileNotFound { .. } | Self::Resolution(_) | Self::Transform { .. } => false,
        }
    }

    /// Name of the plugin responsible, if any.
    #[must_use]
    pub fn plugin_name(&self) -> Option<&str> {
        match self {
            Self::Plugin(err) => Some(&err.plugin),
            _ => None,
        }
    }
}

fn imported_from(importer: &Option<String>) -> String {
    importer
        .as_deref()
        .map(|i| format!(" imported from '{i}'"))
        .unwrap_or_default()
}

/// A bare specifier that nothing could resolve.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Cannot resolve bare specifier '{specifier}'{}{}", imported_from(.importer), hint(.suggestion))]
pub struct ResolutionError {
    pub specifier: String,
    pub importer: Option<String>,
    /// Human-actionable fix, e.g. the package to add to the import map.
    pub suggestion: Option<String>,
}

impl ResolutionError {
    /// Build an error for an unmapped bare specifier, suggesting the package
    /// name that should be added to the import map.
    #[must_use]
    pub fn unmapped(specifier: &str, importer: Option<&str>) -> Self {
        let (package, _) = split_package_name(specifier);
        let suggestion = (!package.is_empty()).then(|| {
            format!("add \"{package}\" to the \"imports\" of your import map")
        });
        Self {
            specifier: specifier.to_string(),
            importer: importer.map(str::to_string),
            suggestion,
        }
    }
}

fn hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_deref()
        .map(|s| format!(" (hint: {s})"))
        .unwrap_or_default()
}

/// Split a bare specifier into package name and optional subpath.
///
/// `@scope/pkg/sub` yields `("@scope/pkg", Some("sub"))`.
#[must_use]
pub fn split_package_name(specifier: &str) -> (&str, Option<&str>) {
    let boundary = if specifier.starts_with('@') {
        specifier
            .match_indices('/')
            .nth(1)
            .map(|(i, _)| i)
    } else {
        specifier.find('/')
    };
    match boundary {
        Some(i) => (&specifier[..i], Some(&specifier[i + 1..])),
        None => (specifier, None),
    }
}

/// Result alias for esresolve operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_package_name() {
        assert_eq!(split_package_name("lodash"), ("lodash", None));
        assert_eq!(split_package_name("lodash/get"), ("lodash", Some("get")));
        assert_eq!(split_package_name("@types/node"), ("@types/node", None));
        assert_eq!(
            split_package_name("@babel/core/lib/parse"),
            ("@babel/core", Some("lib/parse"))
        );
    }

    #[test]
    fn test_unmapped_suggests_package() {
        let err = ResolutionError::unmapped("@scope/ui/button", Some("/src/app.ts"));
        assert_eq!(
            err.suggestion.as_deref(),
            Some("add \"@scope/ui\" to the \"imports\" of your import map")
        );
        let msg = err.to_string();
        assert!(msg.contains("@scope/ui/button"));
        assert!(msg.contains("/src/app.ts"));
        assert!(msg.contains("hint"));
    }

    #[test]
    fn test_not_found_message() {
        let err = Error::not_found("./missing", Some("/src/index.ts"));
        assert_eq!(
            err.to_string(),
            "Cannot find './missing' imported from '/src/index.ts'"
        );
        assert_eq!(err.code(), codes::FILE_NOT_FOUND);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_all_codes_are_screaming_snake_case() {
        let all = [
            codes::FILE_NOT_FOUND,
            codes::IMPORT_MAP_INVALID,
            codes::IMPORT_MAP_BLOCKED,
            codes::PLUGIN_FAILED,
            codes::UNRESOLVED_SPECIFIER,
            codes::TRANSFORM_FAILED,
            codes::CONFIG_READ,
            codes::CONFIG_PARSE,
        ];
        for code in all {
            assert!(
                code.chars().all(|c| c.is_uppercase() || c == '_'),
                "Code '{code}' should be SCREAMING_SNAKE_CASE"
            );
        }
    }
}
