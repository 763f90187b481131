//! Project manifest: the in-memory file set plus resolution settings.
//!
//! ```json
//! {
//!   "files": { "/src/index.ts": "import './util';", "/src/util.ts": "" },
//!   "importMap": { "imports": { "react": "https://esm.sh/react@18" } },
//!   "entries": ["/src/index.ts"],
//!   "external": ["node:*"],
//!   "virtual": { "env": "export const mode = 'dev';" },
//!   "config": { "extensions": [".ts", ".js"] }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use esresolve_core::plugin::{ExternalPlugin, HttpPlugin, VirtualModulePlugin};
use esresolve_core::{
    BuildDriver, Config, Error, HttpFetcher, ImportMap, ResourceCache, VirtualFs,
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    /// Path to contents.
    pub files: BTreeMap<String, String>,
    /// Import map document, resolved against `config.baseUrl`.
    pub import_map: Option<serde_json::Value>,
    pub entries: Vec<String>,
    /// Specifiers kept out of the graph.
    pub external: Vec<String>,
    /// In-memory modules served as `virtual:<name>`.
    #[serde(rename = "virtual")]
    pub virtual_modules: BTreeMap<String, String>,
    pub config: Config,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build a driver over this project. With `http`, remote URLs are fetched
    /// instead of being treated as external.
    pub fn into_driver(self, http: bool) -> Result<(BuildDriver, Vec<String>), Error> {
        debug!(files = self.files.len(), entries = self.entries.len(), "loading project");

        let vfs = VirtualFs::from_files(self.files);
        let mut driver = BuildDriver::new(vfs, self.config.clone());

        if let Some(document) = &self.import_map {
            let map = ImportMap::from_value(document, &self.config.base_url)?;
            driver = driver.with_import_map(map);
        }

        if !self.virtual_modules.is_empty() {
            let plugin = self
                .virtual_modules
                .into_iter()
                .fold(VirtualModulePlugin::new(), |plugin, (id, code)| {
                    plugin.module(id, code)
                });
            driver.register(&plugin)?;
        }
        if !self.external.is_empty() {
            driver.register(&ExternalPlugin::new(self.external))?;
        }
        if http {
            let cache = Arc::new(ResourceCache::from_config(&self.config.cache));
            driver.register(&HttpPlugin::new(Arc::new(HttpFetcher::new()), cache))?;
        }

        Ok((driver, self.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(
            &path,
            r#"{
                "files": {"/src/index.ts": "export {}"},
                "entries": ["/src/index.ts"],
                "virtual": {"env": "export default 1"},
                "config": {"extensions": [".ts"]}
            }"#,
        )
        .unwrap();

        let project = Project::load(&path).unwrap();
        assert_eq!(project.entries, ["/src/index.ts"]);
        assert_eq!(project.config.extensions, [".ts"]);
        assert!(project.import_map.is_none());

        let (driver, entries) = project.into_driver(false).unwrap();
        assert_eq!(entries, ["/src/index.ts"]);
        assert_eq!(driver.plugins().plugin_names().collect::<Vec<_>>(), ["virtual"]);
    }

    #[test]
    fn test_invalid_import_map_is_rejected() {
        let project = Project {
            import_map: Some(serde_json::json!({"imports": []})),
            ..Project::default()
        };
        let err = project.into_driver(false).unwrap_err();
        assert_eq!(err.code(), esresolve_core::error::codes::IMPORT_MAP_INVALID);
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempdir().unwrap();
        let err = Project::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }
}
