//! Build driver.
//!
//! Owns the virtual file system, the optional import map and the plugin
//! orchestrator, and exposes one `resolve` / `load` pair to the external
//! toolchain. [`BuildDriver::build`] walks the module graph breadth-first
//! from the entry points, resolving the imports of each module concurrently.
//!
//! Resolution order for one specifier:
//!
//! 1. Plugins, in registration order (first `Some` wins).
//! 2. The import map. A rewritten specifier is offered to the plugins again,
//!    so a mapping to a URL can be claimed by a remote-loading plugin.
//! 3. Any remaining URL is external.
//! 4. Relative or rooted paths are probed in the VFS.
//! 5. Anything else is an unresolved bare specifier.

mod report;
mod toolchain;

pub use report::{BuildFailure, BuildReport, BuiltModule};
pub use toolchain::{
    scan_imports, ImportRecord, ScanToolchain, Toolchain, TransformOptions, TransformOutput,
};

use std::collections::{HashSet, VecDeque};
use std::ops::ControlFlow;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::error::{Error, ResolutionError, Result};
use crate::import_map::ImportMap;
use crate::plugin::{
    LoadArgs, Plugin, PluginError, PluginOrchestrator, ResolveArgs, ResolveKind, ResolveOutput,
    FILE_NAMESPACE,
};
use crate::vfs::path::{is_path_specifier, normalize};
use crate::vfs::{content_kind_of, ContentKind, FileContent, ResolvedFile, VirtualFs};

/// A resolved module reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedModule {
    pub path: String,
    pub namespace: String,
    pub external: bool,
}

impl ResolvedModule {
    fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: FILE_NAMESPACE.to_string(),
            external: false,
        }
    }

    fn external(path: impl Into<String>) -> Self {
        Self {
            external: true,
            ..Self::file(path)
        }
    }
}

impl From<ResolveOutput> for ResolvedModule {
    fn from(output: ResolveOutput) -> Self {
        Self {
            namespace: output.namespace().to_string(),
            path: output.path,
            external: output.external,
        }
    }
}

/// Contents of a loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedModule {
    pub path: String,
    pub namespace: String,
    pub contents: FileContent,
    pub loader: ContentKind,
}

/// Orchestrates resolution and loading for one project.
#[derive(Debug)]
pub struct BuildDriver {
    vfs: RwLock<VirtualFs>,
    import_map: Option<ImportMap>,
    plugins: PluginOrchestrator,
    config: Config,
}

impl BuildDriver {
    /// Create a driver over a file snapshot. The config's probing lists
    /// replace the snapshot's.
    #[must_use]
    pub fn new(vfs: VirtualFs, config: Config) -> Self {
        let vfs = vfs.with_resolution(config.extensions.clone(), config.index_files.clone());
        Self {
            vfs: RwLock::new(vfs),
            import_map: None,
            plugins: PluginOrchestrator::new(),
            config,
        }
    }

    #[must_use]
    pub fn with_import_map(mut self, import_map: ImportMap) -> Self {
        for warning in import_map.warnings() {
            warn!(warning = %warning, "import map");
        }
        self.import_map = Some(import_map);
        self
    }

    /// Register a plugin after those already registered.
    pub fn register(&mut self, plugin: &dyn Plugin) -> Result<(), PluginError> {
        self.plugins.register(plugin)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn import_map(&self) -> Option<&ImportMap> {
        self.import_map.as_ref()
    }

    #[must_use]
    pub fn plugins(&self) -> &PluginOrchestrator {
        &self.plugins
    }

    /// Copy of the current file table.
    #[must_use]
    pub fn snapshot(&self) -> VirtualFs {
        self.vfs_read().clone()
    }

    /// Insert or replace a file between builds. Returns `false` when the
    /// path lies outside the virtual root and nothing was stored.
    pub fn write_file(&self, path: &str, content: impl Into<FileContent>) -> bool {
        self.vfs_write().write(path, content)
    }

    /// Remove a file between builds.
    pub fn delete_file(&self, path: &str) -> Option<FileContent> {
        self.vfs_write().delete(path)
    }

    fn vfs_read(&self) -> RwLockReadGuard<'_, VirtualFs> {
        self.vfs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn vfs_write(&self) -> RwLockWriteGuard<'_, VirtualFs> {
        self.vfs.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn probe(&self, base: &str, specifier: &str) -> Result<ResolvedFile> {
        self.vfs_read().resolve_with_fallbacks(base, specifier)
    }

    fn read_file(&self, path: &str) -> Result<FileContent> {
        self.vfs_read().read(path).cloned()
    }

    /// Resolve one request.
    pub async fn resolve(&self, args: ResolveArgs) -> Result<ResolvedModule> {
        if let Some(output) = self.plugins.run_resolve(args.clone()).await? {
            return Ok(self.settle_plugin_output(output));
        }

        let importer = args.importer.as_deref();
        let referrer = importer.unwrap_or("/");
        let mut specifier = args.path.clone();

        if let Some(map) = &self.import_map {
            if let Some(target) = map.resolve(&args.path, referrer)? {
                if target != args.path {
                    let rewritten = ResolveArgs {
                        path: target.clone(),
                        ..args.clone()
                    };
                    if let Some(output) = self.plugins.run_resolve(rewritten).await? {
                        return Ok(self.settle_plugin_output(output));
                    }
                }
                specifier = target;
            }
        }

        if !is_path_specifier(&specifier) && Url::parse(&specifier).is_ok() {
            debug!(specifier = %specifier, "unclaimed URL is external");
            return Ok(ResolvedModule::external(specifier));
        }

        let path_like = is_path_specifier(&specifier) || args.kind == ResolveKind::EntryPoint;
        if !path_like {
            return Err(ResolutionError::unmapped(&args.path, importer).into());
        }
        if args.namespace != FILE_NAMESPACE {
            return Err(Error::not_found(&args.path, importer));
        }

        let specifier = if is_path_specifier(&specifier) {
            specifier
        } else {
            normalize(&specifier)
        };
        let found = self
            .probe(referrer, &specifier)
            .map_err(|_| Error::not_found(&args.path, importer))?;
        debug!(specifier = %args.path, path = %found.path, "resolved in vfs");
        Ok(ResolvedModule::file(found.path))
    }

    /// Resolve a static import of `specifier` from a file (or an entry point
    /// when `importer` is `None`).
    pub async fn resolve_specifier(
        &self,
        specifier: &str,
        importer: Option<&str>,
    ) -> Result<ResolvedModule> {
        let kind = if importer.is_some() {
            ResolveKind::ImportStatement
        } else {
            ResolveKind::EntryPoint
        };
        self.resolve(ResolveArgs::new(specifier, importer, kind)).await
    }

    /// A plugin that lands in the file namespace may omit the extension or
    /// name a directory; probe the VFS for it when it is not an exact hit.
    fn settle_plugin_output(&self, output: ResolveOutput) -> ResolvedModule {
        let mut module = ResolvedModule::from(output);
        if module.namespace == FILE_NAMESPACE
            && !module.external
            && module.path.starts_with('/')
        {
            if let Ok(found) = self.probe("/", &module.path) {
                module.path = found.path;
            }
        }
        module
    }

    /// Load a resolved module through the plugins, then the VFS.
    pub async fn load(&self, module: &ResolvedModule) -> Result<LoadedModule> {
        let args = LoadArgs::new(&module.path, &module.namespace);
        if let Some(output) = self.plugins.run_load(args).await? {
            return Ok(LoadedModule {
                path: module.path.clone(),
                namespace: module.namespace.clone(),
                loader: output.loader.unwrap_or_else(|| content_kind_of(&module.path)),
                contents: output.contents,
            });
        }

        if module.namespace != FILE_NAMESPACE {
            return Err(Error::not_found(&module.path, None));
        }
        Ok(LoadedModule {
            path: module.path.clone(),
            namespace: module.namespace.clone(),
            contents: self.read_file(&module.path)?,
            loader: content_kind_of(&module.path),
        })
    }

    /// Walk the module graph from `entries`.
    ///
    /// Non-fatal failures are collected and the walk continues; the first
    /// fatal one stops it with `aborted` set.
    pub async fn build(&self, entries: &[&str], toolchain: &dyn Toolchain) -> BuildReport {
        let mut walk = Walk::default();
        if let Some(map) = &self.import_map {
            walk.report.warnings.extend(map.warnings().iter().cloned());
        }

        let requests = entries
            .iter()
            .map(|entry| self.resolve(ResolveArgs::new(*entry, None, ResolveKind::EntryPoint)));
        let resolved = join_all(requests).await;
        for (entry, result) in entries.iter().zip(resolved) {
            if walk.visit(result, entry, None).is_break() {
                return walk.finish();
            }
        }

        while let Some(pending) = walk.queue.pop_front() {
            let importer = pending.importer.as_deref();
            let loaded = match self.load(&pending.module).await {
                Ok(loaded) => loaded,
                Err(Error::FileNotFound { path, importer: None }) => {
                    let err = Error::not_found(path, importer);
                    if walk.record(&err, Some(&pending.specifier), importer).is_break() {
                        return walk.finish();
                    }
                    continue;
                }
                Err(err) => {
                    if walk.record(&err, Some(&pending.specifier), importer).is_break() {
                        return walk.finish();
                    }
                    continue;
                }
            };

            let Some(code) = loaded.contents.as_text().filter(|_| loaded.loader.is_textual()) else {
                walk.report.modules.push(BuiltModule {
                    path: loaded.path,
                    namespace: loaded.namespace,
                    loader: loaded.loader,
                    code: None,
                    dependencies: Vec::new(),
                });
                continue;
            };

            let options = TransformOptions {
                path: loaded.path.clone(),
                namespace: loaded.namespace.clone(),
                loader: loaded.loader,
            };
            let output = match toolchain.transform(code, &options) {
                Ok(output) => output,
                Err(err) => {
                    let err = Error::Transform {
                        path: loaded.path.clone(),
                        message: err.to_string(),
                    };
                    if walk.record(&err, Some(&loaded.path), None).is_break() {
                        return walk.finish();
                    }
                    continue;
                }
            };

            let requests = output.imports.iter().map(|import| {
                self.resolve(ResolveArgs {
                    path: import.specifier.clone(),
                    importer: Some(loaded.path.clone()),
                    namespace: loaded.namespace.clone(),
                    kind: import.kind,
                })
            });
            let resolved = join_all(requests).await;

            let mut dependencies = Vec::new();
            let mut stop = false;
            for (import, result) in output.imports.iter().zip(resolved) {
                if let Ok(dep) = &result {
                    dependencies.push(dep.path.clone());
                }
                if walk
                    .visit(result, &import.specifier, Some(&loaded.path))
                    .is_break()
                {
                    stop = true;
                    break;
                }
            }

            walk.report.modules.push(BuiltModule {
                path: loaded.path,
                namespace: loaded.namespace,
                loader: loaded.loader,
                code: Some(output.code),
                dependencies,
            });
            if stop {
                return walk.finish();
            }
        }

        walk.finish()
    }
}

/// A module waiting to be loaded, with the import that reached it first.
struct Pending {
    module: ResolvedModule,
    specifier: String,
    importer: Option<String>,
}

/// Traversal state for one build.
#[derive(Default)]
struct Walk {
    report: BuildReport,
    seen: HashSet<(String, String)>,
    queue: VecDeque<Pending>,
}

impl Walk {
    fn visit(
        &mut self,
        result: Result<ResolvedModule>,
        specifier: &str,
        importer: Option<&str>,
    ) -> ControlFlow<()> {
        match result {
            Ok(module) if module.external => {
                self.report.add_external(&module.path);
                ControlFlow::Continue(())
            }
            Ok(module) => {
                if self
                    .seen
                    .insert((module.namespace.clone(), module.path.clone()))
                {
                    self.queue.push_back(Pending {
                        module,
                        specifier: specifier.to_string(),
                        importer: importer.map(str::to_string),
                    });
                }
                ControlFlow::Continue(())
            }
            Err(err) => self.record(&err, Some(specifier), importer),
        }
    }

    fn record(
        &mut self,
        err: &Error,
        specifier: Option<&str>,
        importer: Option<&str>,
    ) -> ControlFlow<()> {
        if err.is_fatal() {
            warn!(code = err.code(), error = %err, "build aborted");
            self.report.fail(err, specifier, importer);
            self.report.aborted = true;
            return ControlFlow::Break(());
        }
        debug!(code = err.code(), error = %err, "build failure collected");
        self.report.fail(err, specifier, importer);
        ControlFlow::Continue(())
    }

    fn finish(self) -> BuildReport {
        info!(
            modules = self.report.modules.len(),
            externals = self.report.externals.len(),
            failures = self.report.failures.len(),
            aborted = self.report.aborted,
            "build finished"
        );
        self.report
    }
}
