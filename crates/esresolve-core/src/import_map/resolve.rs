//! Import map resolution.
//!
//! Scopes whose prefix is a literal prefix of the referrer are tried from the
//! most specific (longest prefix) to the least; the top-level `imports` table
//! comes last. Inside one table an exact key wins over a prefix key, and among
//! prefix keys (those ending in `/`) the longest one wins.

use tracing::debug;
use url::Url;

use super::{keep_trailing_slash, Base, ImportMap, ImportMapError, MappedTarget, SpecifierMap};
use crate::vfs::path::{normalize, resolve_relative};

/// Outcome of a single table lookup.
#[derive(Debug, PartialEq, Eq)]
enum Lookup {
    Mapped(String),
    Blocked,
    NoEntry,
}

impl SpecifierMap {
    fn lookup(&self, specifier: &str) -> Result<Lookup, ImportMapError> {
        if let Some((_, target)) = self.entries.iter().find(|(key, _)| key == specifier) {
            return Ok(match target {
                MappedTarget::Url(url) => Lookup::Mapped(url.clone()),
                MappedTarget::Blocked => Lookup::Blocked,
            });
        }

        // Entries are longest-first, so the first prefix hit is the most specific.
        let prefix_hit = self
            .entries
            .iter()
            .find(|(key, _)| key.ends_with('/') && specifier.starts_with(key.as_str()));

        match prefix_hit {
            None => Ok(Lookup::NoEntry),
            Some((_, MappedTarget::Blocked)) => Ok(Lookup::Blocked),
            Some((key, MappedTarget::Url(target))) => {
                if !target.ends_with('/') {
                    return Err(ImportMapError::PrefixTargetMissingSlash {
                        key: key.clone(),
                        target: target.clone(),
                    });
                }
                Ok(Lookup::Mapped(format!("{target}{}", &specifier[key.len()..])))
            }
        }
    }
}

impl ImportMap {
    /// Resolve `specifier` as imported by `referrer`.
    ///
    /// Returns `Ok(None)` when no entry applies, so the caller can fall back
    /// to other strategies. A blocked entry is an error, never a fallthrough.
    pub fn resolve(&self, specifier: &str, referrer: &str) -> Result<Option<String>, ImportMapError> {
        let referrer = self.canonical_referrer(referrer);
        let key = canonical_specifier(specifier, &referrer);

        let tables = self
            .scopes
            .iter()
            .filter(|scope| referrer.starts_with(scope.prefix.as_str()))
            .map(|scope| &scope.map)
            .chain(std::iter::once(&self.imports));

        for table in tables {
            match table.lookup(&key)? {
                Lookup::Mapped(target) => {
                    debug!(specifier, referrer = %referrer, target = %target, "import map rewrite");
                    return Ok(Some(target));
                }
                Lookup::Blocked => {
                    return Err(ImportMapError::Blocked {
                        specifier: specifier.to_string(),
                    })
                }
                Lookup::NoEntry => {}
            }
        }

        Ok(None)
    }

    /// Put a referrer in the same form as the scope prefixes.
    fn canonical_referrer(&self, referrer: &str) -> String {
        if let Ok(url) = Url::parse(referrer) {
            return url.into();
        }
        let rooted = normalize(referrer);
        match &self.base {
            Base::Url(_) => self.base.join(&rooted),
            Base::Dir(_) => rooted,
        }
    }
}

/// Path-like specifiers are made absolute against the referrer, so they can
/// match normalized keys. URLs are canonicalized; bare specifiers pass through.
fn canonical_specifier(specifier: &str, referrer: &str) -> String {
    if let Ok(url) = Url::parse(specifier) {
        return url.into();
    }
    let path_like =
        specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/');
    if !path_like {
        return specifier.to_string();
    }
    match Url::parse(referrer) {
        Ok(base) => base
            .join(specifier)
            .map_or_else(|_| specifier.to_string(), String::from),
        Err(_) => keep_trailing_slash(specifier, resolve_relative(referrer, specifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(json: &str) -> ImportMap {
        ImportMap::parse(json, "/").unwrap()
    }

    #[test]
    fn test_exact_match() {
        let m = map(r#"{"imports": {"react": "https://esm.sh/react@18"}}"#);
        assert_eq!(
            m.resolve("react", "/src/app.ts").unwrap().as_deref(),
            Some("https://esm.sh/react@18")
        );
        assert_eq!(m.resolve("vue", "/src/app.ts").unwrap(), None);
    }

    #[test]
    fn test_prefix_match() {
        let m = map(r#"{"imports": {"lodash/": "https://cdn/lodash/"}}"#);
        assert_eq!(
            m.resolve("lodash/debounce", "/src/app.ts").unwrap().as_deref(),
            Some("https://cdn/lodash/debounce")
        );
        // A prefix key does not match the bare package name itself.
        assert_eq!(m.resolve("lodash", "/src/app.ts").unwrap(), None);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let m = map(
            r#"{"imports": {
                "pkg/": "https://cdn/pkg/",
                "pkg/internal/": "https://cdn/pkg-internal/"
            }}"#,
        );
        assert_eq!(
            m.resolve("pkg/internal/x.js", "/a.ts").unwrap().as_deref(),
            Some("https://cdn/pkg-internal/x.js")
        );
        assert_eq!(
            m.resolve("pkg/x.js", "/a.ts").unwrap().as_deref(),
            Some("https://cdn/pkg/x.js")
        );
    }

    #[test]
    fn test_exact_beats_prefix() {
        let m = map(r#"{"imports": {"a/": "/prefix/", "a/b": "/exact.js"}}"#);
        assert_eq!(m.resolve("a/b", "/x.ts").unwrap().as_deref(), Some("/exact.js"));
    }

    #[test]
    fn test_prefix_target_without_slash_is_error() {
        let m = map(r#"{"imports": {"lib/": "https://cdn/lib"}}"#);
        assert!(matches!(
            m.resolve("lib/a.js", "/x.ts"),
            Err(ImportMapError::PrefixTargetMissingSlash { key, .. }) if key == "lib/"
        ));
    }

    #[test]
    fn test_scope_specificity() {
        let m = map(
            r#"{
                "imports": {"react": "https://esm.sh/react@18"},
                "scopes": {
                    "/src/": {"react": "https://esm.sh/react@17"},
                    "/src/legacy/": {"react": "https://esm.sh/react@16"}
                }
            }"#,
        );
        assert_eq!(
            m.resolve("react", "/src/legacy/x.ts").unwrap().as_deref(),
            Some("https://esm.sh/react@16")
        );
        assert_eq!(
            m.resolve("react", "/src/app.ts").unwrap().as_deref(),
            Some("https://esm.sh/react@17")
        );
        assert_eq!(
            m.resolve("react", "/lib/app.ts").unwrap().as_deref(),
            Some("https://esm.sh/react@18")
        );
    }

    #[test]
    fn test_scope_falls_through_to_less_specific() {
        let m = map(
            r#"{
                "imports": {"b": "/top-b.js"},
                "scopes": {
                    "/src/": {"a": "/src-a.js"},
                    "/src/legacy/": {"other": "/other.js"}
                }
            }"#,
        );
        assert_eq!(m.resolve("a", "/src/legacy/x.ts").unwrap().as_deref(), Some("/src-a.js"));
        assert_eq!(m.resolve("b", "/src/legacy/x.ts").unwrap().as_deref(), Some("/top-b.js"));
    }

    #[test]
    fn test_bare_referrer_treated_as_rooted() {
        let m = map(r#"{"scopes": {"/src/": {"a": "/scoped.js"}}}"#);
        assert_eq!(m.resolve("a", "src/app.ts").unwrap().as_deref(), Some("/scoped.js"));
        assert_eq!(m.resolve("a", "./src/app.ts").unwrap().as_deref(), Some("/scoped.js"));
    }

    #[test]
    fn test_blocked_is_hard_failure() {
        let m = map(
            r#"{
                "imports": {"fs": "/shim/fs.js", "internal/": ""},
                "scopes": {"/sandbox/": {"fs": ""}}
            }"#,
        );
        assert!(matches!(
            m.resolve("fs", "/sandbox/a.ts"),
            Err(ImportMapError::Blocked { specifier }) if specifier == "fs"
        ));
        assert!(matches!(
            m.resolve("internal/secret", "/a.ts"),
            Err(ImportMapError::Blocked { .. })
        ));
        assert_eq!(m.resolve("fs", "/a.ts").unwrap().as_deref(), Some("/shim/fs.js"));
    }

    #[test]
    fn test_relative_specifier_keys() {
        let m = map(r#"{"imports": {"/src/config.ts": "/src/config.prod.ts"}}"#);
        assert_eq!(
            m.resolve("./config.ts", "/src/app.ts").unwrap().as_deref(),
            Some("/src/config.prod.ts")
        );
        assert_eq!(m.resolve("./other.ts", "/src/app.ts").unwrap(), None);
    }

    #[test]
    fn test_url_referrers() {
        let m = ImportMap::parse(
            r#"{"scopes": {"https://cdn.example/pkg/": {"dep": "https://cdn.example/dep@2/"}}}"#,
            "https://example.com/",
        )
        .unwrap();
        assert_eq!(
            m.resolve("dep", "https://cdn.example/pkg/index.js").unwrap().as_deref(),
            Some("https://cdn.example/dep@2/")
        );
        assert_eq!(m.resolve("dep", "/src/app.ts").unwrap(), None);
    }

    #[test]
    fn test_resolution_is_pure() {
        let m = map(
            r#"{
                "imports": {"lodash/": "https://cdn/lodash/"},
                "scopes": {"/src/": {"lodash/": "https://cdn/lodash@3/"}}
            }"#,
        );
        let first = m.resolve("lodash/fp", "/src/a.ts").unwrap();
        let _ = m.resolve("lodash/fp", "/lib/b.ts").unwrap();
        let second = m.resolve("lodash/fp", "/src/a.ts").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_deref(), Some("https://cdn/lodash@3/fp"));
    }
}
