#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Module resolution layer for an ES module bundler.
//!
//! A [`BuildDriver`] answers "what module does this specifier name, and what
//! are its contents?" on behalf of an external compiler toolchain, using an
//! in-memory [`VirtualFs`], an optional [`ImportMap`] and a chain of plugins.
//! Remote modules are fetched once and kept in a [`ResourceCache`].

pub mod build;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod import_map;
pub mod plugin;
pub mod vfs;

pub use build::{
    BuildDriver, BuildFailure, BuildReport, BuiltModule, LoadedModule, ResolvedModule,
    ScanToolchain, Toolchain, TransformOptions, TransformOutput,
};
pub use cache::{cache_key, ResourceCache};
pub use config::{CacheConfig, Config};
pub use error::{Error, ResolutionError, Result};
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use import_map::{ImportMap, ImportMapError};
pub use plugin::{
    plugin_fn, Filter, Plugin, PluginBuild, PluginError, PluginOrchestrator, ResolveKind,
};
pub use vfs::{ContentKind, FileContent, VirtualFs};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
