//! Plugin orchestration for resolution and loading.
//!
//! A plugin is a named setup routine. During [`PluginOrchestrator::register`]
//! it receives a [`PluginBuild`] and appends `on_resolve` / `on_load`
//! handlers, each guarded by a path [`Filter`] and an optional namespace.
//!
//! Handlers run strictly one after another, in registration order. The first
//! handler that returns `Some` wins and later handlers are never called. A
//! handler error aborts the request and is reported with the plugin's name.
//!
//! ## Example
//!
//! ```
//! use esresolve_core::plugin::{plugin_fn, Filter, PluginOrchestrator, ResolveOutput};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut plugins = PluginOrchestrator::new();
//! plugins.register(&plugin_fn("env", |build| {
//!     build.on_resolve(Filter::new("^env$")?, |args| async move {
//!         Ok(Some(ResolveOutput::resolved(args.path).with_namespace("env")))
//!     });
//!     Ok(())
//! }))?;
//! # Ok(())
//! # }
//! ```

mod builtin;
mod http;

pub use builtin::{ExternalPlugin, VirtualModulePlugin, VIRTUAL_NAMESPACE};
pub use http::{HttpPlugin, HTTP_NAMESPACE};

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use regex_lite::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::vfs::{ContentKind, FileContent};

/// Namespace of ordinary files in the virtual file system.
pub const FILE_NAMESPACE: &str = "file";

/// Error type plugin callbacks may return.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for plugin hooks. `Ok(None)` passes to the next handler.
pub type HookResult<T> = Result<Option<T>, BoxError>;

/// Future returned by a stored hook.
pub type HookFuture<T> = BoxFuture<'static, HookResult<T>>;

type ResolveCallback = Arc<dyn Fn(ResolveArgs) -> HookFuture<ResolveOutput> + Send + Sync>;
type LoadCallback = Arc<dyn Fn(LoadArgs) -> HookFuture<LoadOutput> + Send + Sync>;

/// Error from a plugin, attributed to the plugin that raised it.
#[derive(Error, Debug)]
#[error("[{plugin}] {hook}{}: {source}", while_processing(.path))]
pub struct PluginError {
    /// Plugin name that caused the error.
    pub plugin: String,
    /// Hook that failed (`setup`, `on_resolve` or `on_load`).
    pub hook: &'static str,
    /// Path being processed, for hook failures.
    pub path: Option<String>,
    #[source]
    pub source: BoxError,
}

fn while_processing(path: &Option<String>) -> String {
    path.as_deref()
        .map(|p| format!(" ({p})"))
        .unwrap_or_default()
}

/// Why a resolution was requested. Plugins see it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolveKind {
    EntryPoint,
    ImportStatement,
    DynamicImport,
    RequireCall,
}

/// Arguments to an `on_resolve` handler.
#[derive(Debug, Clone)]
pub struct ResolveArgs {
    /// Specifier as written.
    pub path: String,
    /// Module containing the import; `None` for entry points.
    pub importer: Option<String>,
    /// Namespace of the importer.
    pub namespace: String,
    pub kind: ResolveKind,
}

impl ResolveArgs {
    #[must_use]
    pub fn new(path: impl Into<String>, importer: Option<&str>, kind: ResolveKind) -> Self {
        Self {
            path: path.into(),
            importer: importer.map(str::to_string),
            namespace: FILE_NAMESPACE.to_string(),
            kind,
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }
}

/// Result of a resolve hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOutput {
    /// Resolved module path or URL.
    pub path: String,
    /// Namespace the module lives in; `None` means the file namespace.
    pub namespace: Option<String>,
    /// Whether this module must stay out of the bundle.
    pub external: bool,
}

impl ResolveOutput {
    /// Create a resolved module result.
    pub fn resolved(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: None,
            external: false,
        }
    }

    /// Create an external module result.
    pub fn external(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: None,
            external: true,
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Namespace, defaulting to the file namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(FILE_NAMESPACE)
    }
}

/// Arguments to an `on_load` handler.
#[derive(Debug, Clone)]
pub struct LoadArgs {
    pub path: String,
    pub namespace: String,
}

impl LoadArgs {
    #[must_use]
    pub fn new(path: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: namespace.into(),
        }
    }
}

/// Result of a load hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutput {
    pub contents: FileContent,
    /// Loader override; inferred from the path when `None`.
    pub loader: Option<ContentKind>,
}

impl LoadOutput {
    /// Create a load result from contents, leaving the loader to inference.
    pub fn contents(contents: impl Into<FileContent>) -> Self {
        Self {
            contents: contents.into(),
            loader: None,
        }
    }

    #[must_use]
    pub fn with_loader(mut self, loader: ContentKind) -> Self {
        self.loader = Some(loader);
        self
    }
}

/// Which requests a handler sees: a regex over the path, plus an optional
/// namespace restriction.
#[derive(Debug, Clone)]
pub struct Filter {
    pattern: Regex,
    namespace: Option<String>,
}

impl Filter {
    /// Compile a path filter.
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            namespace: None,
        })
    }

    /// Restrict the handler to one namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    fn matches(&self, path: &str, namespace: &str) -> bool {
        self.namespace.as_deref().map_or(true, |ns| ns == namespace) && self.pattern.is_match(path)
    }
}

struct Handler<C> {
    plugin: Arc<str>,
    filter: Filter,
    callback: C,
}

/// Registration surface handed to a plugin's setup routine.
pub struct PluginBuild {
    plugin: Arc<str>,
    resolve: Vec<Handler<ResolveCallback>>,
    load: Vec<Handler<LoadCallback>>,
}

impl PluginBuild {
    fn new(plugin: &str) -> Self {
        Self {
            plugin: Arc::from(plugin),
            resolve: Vec::new(),
            load: Vec::new(),
        }
    }

    /// Name of the plugin being set up.
    #[must_use]
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Append a resolve handler.
    pub fn on_resolve<F, Fut>(&mut self, filter: Filter, callback: F) -> &mut Self
    where
        F: Fn(ResolveArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<ResolveOutput>> + Send + 'static,
    {
        let callback: ResolveCallback = Arc::new(move |args| callback(args).boxed());
        self.resolve.push(Handler {
            plugin: Arc::clone(&self.plugin),
            filter,
            callback,
        });
        self
    }

    /// Append a load handler.
    pub fn on_load<F, Fut>(&mut self, filter: Filter, callback: F) -> &mut Self
    where
        F: Fn(LoadArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult<LoadOutput>> + Send + 'static,
    {
        let callback: LoadCallback = Arc::new(move |args| callback(args).boxed());
        self.load.push(Handler {
            plugin: Arc::clone(&self.plugin),
            filter,
            callback,
        });
        self
    }
}

/// A resolution/load plugin.
pub trait Plugin: Send + Sync {
    /// Plugin name for attribution in errors.
    fn name(&self) -> &str;

    /// Register handlers. An error rejects every handler added by this call.
    fn setup(&self, build: &mut PluginBuild) -> Result<(), BoxError>;
}

/// Plugin defined by a name and a setup closure.
pub struct FnPlugin<F> {
    name: String,
    setup: F,
}

/// Declare a plugin from a closure.
pub fn plugin_fn<F>(name: impl Into<String>, setup: F) -> FnPlugin<F>
where
    F: Fn(&mut PluginBuild) -> Result<(), BoxError> + Send + Sync,
{
    FnPlugin {
        name: name.into(),
        setup,
    }
}

impl<F> Plugin for FnPlugin<F>
where
    F: Fn(&mut PluginBuild) -> Result<(), BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn setup(&self, build: &mut PluginBuild) -> Result<(), BoxError> {
        (self.setup)(build)
    }
}

/// Ordered registry of resolve and load handlers.
#[derive(Default)]
pub struct PluginOrchestrator {
    plugins: Vec<String>,
    resolve_handlers: Vec<Handler<ResolveCallback>>,
    load_handlers: Vec<Handler<LoadCallback>>,
}

impl std::fmt::Debug for PluginOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginOrchestrator")
            .field("plugins", &self.plugins)
            .field("resolve_handlers", &self.resolve_handlers.len())
            .field("load_handlers", &self.load_handlers.len())
            .finish()
    }
}

impl PluginOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a plugin's setup and append its handlers.
    ///
    /// A failing setup adds nothing; plugins registered earlier stay.
    pub fn register(&mut self, plugin: &dyn Plugin) -> Result<(), PluginError> {
        let name = plugin.name().to_string();
        let mut build = PluginBuild::new(&name);
        plugin.setup(&mut build).map_err(|source| PluginError {
            plugin: name.clone(),
            hook: "setup",
            path: None,
            source,
        })?;

        debug!(
            plugin = %name,
            resolve = build.resolve.len(),
            load = build.load.len(),
            "registered plugin"
        );
        self.resolve_handlers.extend(build.resolve);
        self.load_handlers.extend(build.load);
        self.plugins.push(name);
        Ok(())
    }

    /// Offer a resolution request to the handlers in order.
    pub async fn run_resolve(&self, args: ResolveArgs) -> Result<Option<ResolveOutput>, PluginError> {
        for handler in &self.resolve_handlers {
            if !handler.filter.matches(&args.path, &args.namespace) {
                continue;
            }
            debug!(plugin = %handler.plugin, path = %args.path, "on_resolve");
            match (handler.callback)(args.clone()).await {
                Ok(Some(output)) => return Ok(Some(output)),
                Ok(None) => {}
                Err(source) => {
                    return Err(PluginError {
                        plugin: handler.plugin.to_string(),
                        hook: "on_resolve",
                        path: Some(args.path),
                        source,
                    })
                }
            }
        }
        Ok(None)
    }

    /// Offer a load request to the handlers in order.
    pub async fn run_load(&self, args: LoadArgs) -> Result<Option<LoadOutput>, PluginError> {
        for handler in &self.load_handlers {
            if !handler.filter.matches(&args.path, &args.namespace) {
                continue;
            }
            debug!(plugin = %handler.plugin, path = %args.path, "on_load");
            match (handler.callback)(args.clone()).await {
                Ok(Some(output)) => return Ok(Some(output)),
                Ok(None) => {}
                Err(source) => {
                    return Err(PluginError {
                        plugin: handler.plugin.to_string(),
                        hook: "on_load",
                        path: Some(args.path),
                        source,
                    })
                }
            }
        }
        Ok(None)
    }

    /// Drop every plugin and handler.
    pub fn clear(&mut self) {
        self.plugins.clear();
        self.resolve_handlers.clear();
        self.load_handlers.clear();
    }

    /// Registered plugin names, in registration order.
    pub fn plugin_names(&self) -> impl Iterator<Item = &str> {
        self.plugins.iter().map(String::as_str)
    }

    #[must_use]
    pub fn has_plugins(&self) -> bool {
        !self.plugins.is_empty()
    }

    #[must_use]
    pub fn resolve_handler_count(&self) -> usize {
        self.resolve_handlers.len()
    }

    #[must_use]
    pub fn load_handler_count(&self) -> usize {
        self.load_handlers.len()
    }
}
