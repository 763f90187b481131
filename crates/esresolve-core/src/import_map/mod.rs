//! Import map parsing and resolution.
//!
//! Accepts the browser import map document shape:
//!
//! ```json
//! {
//!   "imports": { "react": "https://esm.sh/react", "lodash/": "https://cdn/lodash/" },
//!   "scopes": { "/src/legacy/": { "react": "https://esm.sh/react@17" } }
//! }
//! ```
//!
//! Keys and values that are absolute URLs or start with `./`, `../` or `/`
//! are resolved against the map's base. Bare keys and values are kept as-is.
//! Scope prefixes are always resolved against the base.
//! An empty-string value blocks the specifier outright.

mod resolve;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::vfs::path::{directory_of, join_dir, normalize};

/// Import map errors.
#[derive(Error, Debug)]
pub enum ImportMapError {
    #[error("Invalid import map JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Import map field \"{field}\" must be a JSON object")]
    NotAnObject { field: String },

    #[error("Import map scope \"{prefix}\" must map to a JSON object")]
    InvalidScope { prefix: String },

    #[error("Import map entry \"{key}\" maps a prefix to \"{target}\", which does not end in '/'")]
    PrefixTargetMissingSlash { key: String, target: String },

    #[error("Specifier \"{specifier}\" is blocked by the import map")]
    Blocked { specifier: String },
}

/// Where an import map entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedTarget {
    /// Normalized target URL, path or bare specifier.
    Url(String),
    /// Empty-string value: the specifier must not resolve.
    Blocked,
}

/// Specifier table, ordered by key length (longest first), document order
/// among equal lengths.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecifierMap {
    entries: Vec<(String, MappedTarget)>,
}

impl SpecifierMap {
    fn insert_sorted(mut entries: Vec<(String, MappedTarget)>) -> Self {
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { entries }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &MappedTarget)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A referrer-prefix scoped override table.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    prefix: String,
    map: SpecifierMap,
}

/// What keys and values are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Base {
    Url(Url),
    /// A virtual directory.
    Dir(String),
}

impl Base {
    fn parse(base: &str) -> Self {
        match Url::parse(base) {
            Ok(url) => Self::Url(url),
            Err(_) if base.is_empty() || base.ends_with('/') => Self::Dir(normalize(base)),
            Err(_) => Self::Dir(directory_of(base)),
        }
    }

    /// Resolve a `./`, `../` or `/` address against this base.
    pub(crate) fn join(&self, address: &str) -> String {
        match self {
            Self::Url(url) => url
                .join(address)
                .map_or_else(|_| address.to_string(), String::from),
            Self::Dir(dir) => keep_trailing_slash(address, join_dir(dir, address)),
        }
    }
}

pub(crate) fn keep_trailing_slash(input: &str, mut resolved: String) -> String {
    if input.ends_with('/') && !resolved.ends_with('/') {
        resolved.push('/');
    }
    resolved
}

/// A parsed, normalized import map. Resolution against it is pure.
#[derive(Debug, Clone)]
pub struct ImportMap {
    base: Base,
    imports: SpecifierMap,
    scopes: Vec<Scope>,
    warnings: Vec<String>,
}

impl Default for ImportMap {
    fn default() -> Self {
        Self {
            base: Base::Dir("/".to_string()),
            imports: SpecifierMap::default(),
            scopes: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ImportMap {
    /// Parse an import map document.
    ///
    /// `base_url` is either an absolute URL or a virtual path; a path ending
    /// in `/` names a directory, anything else names the map file itself.
    pub fn parse(json: &str, base_url: &str) -> Result<Self, ImportMapError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value, base_url)
    }

    /// Parse an already-deserialized import map document.
    pub fn from_value(value: &Value, base_url: &str) -> Result<Self, ImportMapError> {
        let root = value.as_object().ok_or_else(|| ImportMapError::NotAnObject {
            field: "<root>".to_string(),
        })?;

        let base = Base::parse(base_url);
        let mut warnings = Vec::new();

        let imports = match root.get("imports") {
            None => SpecifierMap::default(),
            Some(Value::Object(table)) => parse_table(table, &base, "imports", &mut warnings),
            Some(_) => {
                return Err(ImportMapError::NotAnObject {
                    field: "imports".to_string(),
                })
            }
        };

        let mut scopes: Vec<Scope> = Vec::new();
        match root.get("scopes") {
            None => {}
            Some(Value::Object(table)) => {
                for (raw_prefix, scope_value) in table {
                    let Value::Object(scope_table) = scope_value else {
                        return Err(ImportMapError::InvalidScope {
                            prefix: raw_prefix.clone(),
                        });
                    };
                    let prefix = normalize_scope_prefix(raw_prefix, &base);
                    if scopes.iter().any(|s| s.prefix == prefix) {
                        push_warning(
                            &mut warnings,
                            format!("Ignored duplicate scope \"{raw_prefix}\" (normalizes to \"{prefix}\")"),
                        );
                        continue;
                    }
                    let context = format!("scopes[\"{raw_prefix}\"]");
                    let map = parse_table(scope_table, &base, &context, &mut warnings);
                    scopes.push(Scope { prefix, map });
                }
            }
            Some(_) => {
                return Err(ImportMapError::NotAnObject {
                    field: "scopes".to_string(),
                })
            }
        }
        // Most specific scope first; stable, so document order breaks ties.
        scopes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Ok(Self {
            base,
            imports,
            scopes,
            warnings,
        })
    }

    /// Non-fatal problems found while parsing (ignored entries).
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// `true` when the map has neither imports nor scopes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.imports.is_empty() && self.scopes.is_empty()
    }

    /// Normalized top-level entries, longest key first.
    pub fn imports(&self) -> impl Iterator<Item = (&str, &MappedTarget)> {
        self.imports.iter()
    }

    /// Normalized scope prefixes, most specific first.
    pub fn scope_prefixes(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(|s| s.prefix.as_str())
    }
}

fn parse_table(
    table: &Map<String, Value>,
    base: &Base,
    context: &str,
    warnings: &mut Vec<String>,
) -> SpecifierMap {
    let mut entries: Vec<(String, MappedTarget)> = Vec::with_capacity(table.len());
    for (raw_key, raw_value) in table {
        let Value::String(raw_target) = raw_value else {
            push_warning(
                warnings,
                format!("Ignored non-string value for \"{raw_key}\" in {context}"),
            );
            continue;
        };

        let key = normalize_address(raw_key, base);
        if entries.iter().any(|(k, _)| *k == key) {
            push_warning(
                warnings,
                format!("Ignored duplicate key \"{raw_key}\" in {context} (normalizes to \"{key}\")"),
            );
            continue;
        }

        let target = if raw_target.is_empty() {
            MappedTarget::Blocked
        } else {
            MappedTarget::Url(normalize_address(raw_target, base))
        };
        entries.push((key, target));
    }
    SpecifierMap::insert_sorted(entries)
}

/// Normalize a key or value: absolute URLs are canonicalized, `./`, `../`
/// and `/` addresses are joined to the base, bare specifiers pass through.
pub(crate) fn normalize_address(address: &str, base: &Base) -> String {
    if let Ok(url) = Url::parse(address) {
        return url.into();
    }
    if address.starts_with("./") || address.starts_with("../") || address.starts_with('/') {
        return base.join(address);
    }
    address.to_string()
}

/// Scope prefixes name referrer locations, so they are always joined to
/// the base, bare or not.
pub(crate) fn normalize_scope_prefix(prefix: &str, base: &Base) -> String {
    match Url::parse(prefix) {
        Ok(url) => url.into(),
        Err(_) => base.join(prefix),
    }
}

fn push_warning(warnings: &mut Vec<String>, message: String) {
    warn!(target: "esresolve::import_map", "{message}");
    warnings.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_keys_and_values() {
        let map = ImportMap::parse(
            r#"{
                "imports": {
                    "react": "https://esm.sh/react",
                    "./shim.js": "./vendor/shim.js",
                    "~/": "/src/"
                }
            }"#,
            "/app/",
        )
        .unwrap();

        let entries: Vec<_> = map.imports().collect();
        assert!(entries.contains(&("react", &MappedTarget::Url("https://esm.sh/react".into()))));
        assert!(entries.contains(&(
            "/app/shim.js",
            &MappedTarget::Url("/app/vendor/shim.js".into())
        )));
        assert!(entries.contains(&("~/", &MappedTarget::Url("/src/".into()))));
    }

    #[test]
    fn test_parse_with_url_base() {
        let map = ImportMap::parse(
            r#"{"imports": {"app/": "./js/app/"}, "scopes": {"./legacy/": {}}}"#,
            "https://example.com/site/index.html",
        )
        .unwrap();
        let (key, target) = map.imports().next().unwrap();
        assert_eq!(key, "app/");
        assert_eq!(
            target,
            &MappedTarget::Url("https://example.com/site/js/app/".into())
        );
        assert_eq!(
            map.scope_prefixes().collect::<Vec<_>>(),
            ["https://example.com/site/legacy/"]
        );
    }

    #[test]
    fn test_base_file_path_uses_its_directory() {
        let map = ImportMap::parse(r#"{"imports": {"x": "./x.js"}}"#, "/app/importmap.json")
            .unwrap();
        let (_, target) = map.imports().next().unwrap();
        assert_eq!(target, &MappedTarget::Url("/app/x.js".into()));
    }

    #[test]
    fn test_empty_value_is_blocked() {
        let map = ImportMap::parse(r#"{"imports": {"fs": ""}}"#, "/").unwrap();
        assert_eq!(map.imports().next(), Some(("fs", &MappedTarget::Blocked)));
    }

    #[test]
    fn test_non_string_values_warn() {
        let map = ImportMap::parse(
            r#"{"imports": {"a": 1, "b": null, "c": "./c.js"}}"#,
            "/",
        )
        .unwrap();
        assert_eq!(map.imports().count(), 1);
        assert_eq!(map.warnings().len(), 2);
        assert!(map.warnings()[0].contains("\"a\""));
    }

    #[test]
    fn test_rejects_structural_errors() {
        assert!(matches!(
            ImportMap::parse(r#"{"imports": ["react"]}"#, "/"),
            Err(ImportMapError::NotAnObject { field }) if field == "imports"
        ));
        assert!(matches!(
            ImportMap::parse(r#"{"scopes": "nope"}"#, "/"),
            Err(ImportMapError::NotAnObject { field }) if field == "scopes"
        ));
        assert!(matches!(
            ImportMap::parse(r#"{"scopes": {"/src/": []}}"#, "/"),
            Err(ImportMapError::InvalidScope { prefix }) if prefix == "/src/"
        ));
        assert!(matches!(
            ImportMap::parse("[]", "/"),
            Err(ImportMapError::NotAnObject { .. })
        ));
        assert!(matches!(
            ImportMap::parse("{", "/"),
            Err(ImportMapError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_duplicate_normalized_keys_first_wins() {
        let map = ImportMap::parse(
            r#"{"imports": {"./a.js": "/first.js", "/a.js": "/second.js"}}"#,
            "/",
        )
        .unwrap();
        let entries: Vec<_> = map.imports().collect();
        assert_eq!(entries, [("/a.js", &MappedTarget::Url("/first.js".into()))]);
        assert_eq!(map.warnings().len(), 1);
    }

    #[test]
    fn test_scopes_sorted_most_specific_first() {
        let map = ImportMap::parse(
            r#"{"scopes": {"/src/": {}, "/src/legacy/": {}, "/": {}}}"#,
            "/",
        )
        .unwrap();
        assert_eq!(
            map.scope_prefixes().collect::<Vec<_>>(),
            ["/src/legacy/", "/src/", "/"]
        );
    }

    #[test]
    fn test_bare_scope_prefix_joins_base() {
        let map = ImportMap::parse(
            r#"{"imports": {"react": "/top.js"}, "scopes": {"src/": {"react": "/scoped.js"}}}"#,
            "/",
        )
        .unwrap();
        assert_eq!(map.scope_prefixes().collect::<Vec<_>>(), ["/src/"]);
        assert_eq!(map.resolve("react", "/src/app.ts").unwrap().as_deref(), Some("/scoped.js"));
        assert_eq!(map.resolve("react", "/lib/app.ts").unwrap().as_deref(), Some("/top.js"));

        let nested = ImportMap::parse(r#"{"scopes": {"legacy/": {}}}"#, "/app/map.json").unwrap();
        assert_eq!(nested.scope_prefixes().collect::<Vec<_>>(), ["/app/legacy/"]);

        let remote = ImportMap::parse(r#"{"scopes": {"vendor/": {}}}"#, "https://cdn.example/site/")
            .unwrap();
        assert_eq!(
            remote.scope_prefixes().collect::<Vec<_>>(),
            ["https://cdn.example/site/vendor/"]
        );
    }

    #[test]
    fn test_missing_sections_are_empty() {
        let map = ImportMap::parse("{}", "/").unwrap();
        assert!(map.is_empty());
        assert!(map.warnings().is_empty());
    }
}
