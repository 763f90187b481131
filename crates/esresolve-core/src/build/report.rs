//! Batched outcome of a build walk.

use serde::Serialize;

use crate::error::Error;
use crate::vfs::ContentKind;

/// A module that was resolved, loaded and transformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuiltModule {
    pub path: String,
    pub namespace: String,
    pub loader: ContentKind,
    /// Transformed code; `None` for binary contents.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Resolved paths of this module's imports, in import order.
    pub dependencies: Vec<String>,
}

/// One failure collected during a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildFailure {
    /// Stable error code (see [`crate::error::codes`]).
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub importer: Option<String>,
    /// Plugin responsible, when a plugin failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
}

impl BuildFailure {
    #[must_use]
    pub fn from_error(err: &Error, specifier: Option<&str>, importer: Option<&str>) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            specifier: specifier.map(str::to_string),
            importer: importer.map(str::to_string),
            plugin: err.plugin_name().map(str::to_string),
        }
    }
}

/// Everything a build produced, failures included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Modules in the order they were visited (breadth-first from the entries).
    pub modules: Vec<BuiltModule>,
    /// Specifiers left out of the bundle, deduplicated.
    pub externals: Vec<String>,
    pub failures: Vec<BuildFailure>,
    pub warnings: Vec<String>,
    /// Set when a fatal error stopped the walk early.
    pub aborted: bool,
}

impl BuildReport {
    /// `true` when nothing failed.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.failures.is_empty() && !self.aborted
    }

    pub(crate) fn fail(&mut self, err: &Error, specifier: Option<&str>, importer: Option<&str>) {
        self.failures
            .push(BuildFailure::from_error(err, specifier, importer));
    }

    pub(crate) fn add_external(&mut self, specifier: &str) {
        if !self.externals.iter().any(|e| e == specifier) {
            self.externals.push(specifier.to_string());
        }
    }

    /// Look up a built module by path.
    #[must_use]
    pub fn module(&self, path: &str) -> Option<&BuiltModule> {
        self.modules.iter().find(|m| m.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;

    #[test]
    fn test_failure_carries_code_and_context() {
        let err = Error::not_found("./gone", Some("/src/index.ts"));
        let mut report = BuildReport::default();
        report.fail(&err, Some("./gone"), Some("/src/index.ts"));

        assert!(!report.ok());
        let failure = &report.failures[0];
        assert_eq!(failure.code, codes::FILE_NOT_FOUND);
        assert_eq!(failure.importer.as_deref(), Some("/src/index.ts"));
        assert!(failure.plugin.is_none());
    }

    #[test]
    fn test_externals_dedupe_and_serialize() {
        let mut report = BuildReport::default();
        report.add_external("https://esm.sh/react");
        report.add_external("https://esm.sh/react");
        assert_eq!(report.externals.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["externals"][0], "https://esm.sh/react");
        assert_eq!(json["aborted"], false);
        assert!(report.ok());
    }
}
