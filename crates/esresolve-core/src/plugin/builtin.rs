//! Built-in plugins.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BoxError, Filter, LoadOutput, Plugin, PluginBuild, ResolveOutput};
use crate::vfs::{content_kind_of, ContentKind};

/// Namespace used by [`VirtualModulePlugin`].
pub const VIRTUAL_NAMESPACE: &str = "virtual";

/// Plugin that serves modules that exist only in memory.
///
/// `import x from "virtual:config"` resolves to `config` in the `virtual`
/// namespace and loads the registered source.
#[derive(Debug, Clone, Default)]
pub struct VirtualModulePlugin {
    modules: BTreeMap<String, (String, Option<ContentKind>)>,
}

impl VirtualModulePlugin {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a virtual module; the loader is inferred from `id`'s extension.
    #[must_use]
    pub fn module(mut self, id: impl Into<String>, code: impl Into<String>) -> Self {
        self.modules.insert(id.into(), (code.into(), None));
        self
    }

    /// Add a virtual module with an explicit loader.
    #[must_use]
    pub fn module_with_loader(
        mut self,
        id: impl Into<String>,
        code: impl Into<String>,
        loader: ContentKind,
    ) -> Self {
        self.modules.insert(id.into(), (code.into(), Some(loader)));
        self
    }
}

impl Plugin for VirtualModulePlugin {
    fn name(&self) -> &str {
        "virtual"
    }

    fn setup(&self, build: &mut PluginBuild) -> Result<(), BoxError> {
        let modules = Arc::new(self.modules.clone());

        let known = Arc::clone(&modules);
        build.on_resolve(Filter::new("^virtual:")?, move |args| {
            let id = args.path.trim_start_matches("virtual:").to_string();
            let found = known.contains_key(&id);
            async move {
                Ok(found.then(|| ResolveOutput::resolved(id).with_namespace(VIRTUAL_NAMESPACE)))
            }
        });

        build.on_load(Filter::new(".*")?.namespace(VIRTUAL_NAMESPACE), move |args| {
            let output = modules.get(&args.path).map(|(code, loader)| LoadOutput {
                contents: code.clone().into(),
                loader: Some(loader.unwrap_or_else(|| content_kind_of(&args.path))),
            });
            async move { Ok(output) }
        });

        Ok(())
    }
}

/// Plugin that keeps matching specifiers out of the bundle.
///
/// A pattern ending in `*` matches by prefix (`node:*`). Any other pattern
/// matches the package itself and its subpaths (`react`, `react/jsx-runtime`).
#[derive(Debug, Clone, Default)]
pub struct ExternalPlugin {
    patterns: Vec<String>,
}

impl ExternalPlugin {
    #[must_use]
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    fn is_external(patterns: &[String], specifier: &str) -> bool {
        patterns.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => specifier.starts_with(prefix),
            None => {
                specifier == pattern
                    || specifier
                        .strip_prefix(pattern.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        })
    }
}

impl Plugin for ExternalPlugin {
    fn name(&self) -> &str {
        "external"
    }

    fn setup(&self, build: &mut PluginBuild) -> Result<(), BoxError> {
        if self.patterns.is_empty() {
            return Ok(());
        }
        let patterns = Arc::new(self.patterns.clone());
        build.on_resolve(Filter::new(".*")?, move |args| {
            let external = Self::is_external(&patterns, &args.path);
            async move { Ok(external.then(|| ResolveOutput::external(args.path))) }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{LoadArgs, PluginOrchestrator, ResolveArgs, ResolveKind, FILE_NAMESPACE};
    use super::*;

    #[tokio::test]
    async fn test_virtual_module_plugin() {
        let mut plugins = PluginOrchestrator::new();
        plugins
            .register(
                &VirtualModulePlugin::new()
                    .module("config", "export default { debug: true };")
                    .module_with_loader("theme", ":root{}", ContentKind::Style),
            )
            .unwrap();

        let args = ResolveArgs::new("virtual:config", Some("/src/a.ts"), ResolveKind::ImportStatement);
        let resolved = plugins.run_resolve(args).await.unwrap().unwrap();
        assert_eq!(resolved.path, "config");
        assert_eq!(resolved.namespace(), VIRTUAL_NAMESPACE);

        let loaded = plugins
            .run_load(LoadArgs::new("config", VIRTUAL_NAMESPACE))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.contents.as_text(), Some("export default { debug: true };"));
        assert_eq!(loaded.loader, Some(ContentKind::Script));

        let theme = plugins
            .run_load(LoadArgs::new("theme", VIRTUAL_NAMESPACE))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(theme.loader, Some(ContentKind::Style));

        // Unknown ids and other namespaces are left alone.
        let unknown = ResolveArgs::new("virtual:nope", None, ResolveKind::EntryPoint);
        assert!(plugins.run_resolve(unknown).await.unwrap().is_none());
        let file = LoadArgs::new("config", FILE_NAMESPACE);
        assert!(plugins.run_load(file).await.unwrap().is_none());
    }

    #[test]
    fn test_external_patterns() {
        let patterns = vec!["react".to_string(), "node:*".to_string()];
        assert!(ExternalPlugin::is_external(&patterns, "react"));
        assert!(ExternalPlugin::is_external(&patterns, "react/jsx-runtime"));
        assert!(!ExternalPlugin::is_external(&patterns, "react-dom"));
        assert!(ExternalPlugin::is_external(&patterns, "node:fs"));
        assert!(!ExternalPlugin::is_external(&patterns, "./react"));
    }

    #[tokio::test]
    async fn test_external_plugin_marks_external() {
        let mut plugins = PluginOrchestrator::new();
        plugins.register(&ExternalPlugin::new(["node:*"])).unwrap();

        let args = ResolveArgs::new("node:path", Some("/a.ts"), ResolveKind::ImportStatement);
        let out = plugins.run_resolve(args).await.unwrap().unwrap();
        assert!(out.external);
        assert_eq!(out.path, "node:path");

        let args = ResolveArgs::new("./b", Some("/a.ts"), ResolveKind::ImportStatement);
        assert!(plugins.run_resolve(args).await.unwrap().is_none());
    }
}
