//! Plugin that pulls `http://` and `https://` modules through a [`Fetcher`].

use std::sync::Arc;

use bytes::Bytes;
use url::Url;

use super::{
    BoxError, Filter, HookResult, LoadArgs, LoadOutput, Plugin, PluginBuild, ResolveArgs,
    ResolveOutput,
};
use crate::cache::{cache_key, ResourceCache};
use crate::fetch::Fetcher;
use crate::vfs::path::is_path_specifier;
use crate::vfs::{content_kind_of, FileContent};

/// Namespace of modules claimed by [`HttpPlugin`].
pub const HTTP_NAMESPACE: &str = "http-url";

/// Resolves URL specifiers into the `http-url` namespace, resolves relative
/// imports inside remote modules against the importing URL, and loads bodies
/// through the shared resource cache so each URL is fetched once.
pub struct HttpPlugin {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<ResourceCache<Bytes>>,
}

impl HttpPlugin {
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>, cache: Arc<ResourceCache<Bytes>>) -> Self {
        Self { fetcher, cache }
    }

    /// The cache backing remote loads.
    #[must_use]
    pub fn cache(&self) -> &Arc<ResourceCache<Bytes>> {
        &self.cache
    }
}

impl Plugin for HttpPlugin {
    fn name(&self) -> &str {
        "http"
    }

    fn setup(&self, build: &mut PluginBuild) -> Result<(), BoxError> {
        build.on_resolve(Filter::new("^https?://")?, |args| async move {
            Ok(Some(ResolveOutput::resolved(args.path).with_namespace(HTTP_NAMESPACE)))
        });

        build.on_resolve(Filter::new(".*")?.namespace(HTTP_NAMESPACE), resolve_in_remote);

        let fetcher = Arc::clone(&self.fetcher);
        let cache = Arc::clone(&self.cache);
        build.on_load(Filter::new(".*")?.namespace(HTTP_NAMESPACE), move |args| {
            load_remote(Arc::clone(&fetcher), Arc::clone(&cache), args)
        });

        Ok(())
    }
}

/// Relative and rooted imports inside a remote module resolve against its URL.
async fn resolve_in_remote(args: ResolveArgs) -> HookResult<ResolveOutput> {
    let Some(importer) = args.importer.as_deref() else {
        return Ok(None);
    };
    if !is_path_specifier(&args.path) {
        return Ok(None);
    }
    let url = Url::parse(importer)?.join(&args.path)?;
    Ok(Some(ResolveOutput::resolved(url).with_namespace(HTTP_NAMESPACE)))
}

async fn load_remote(
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<ResourceCache<Bytes>>,
    args: LoadArgs,
) -> HookResult<LoadOutput> {
    let key = cache_key(&args.path, &[]);
    let body = match cache.get(&key) {
        Some(body) => body,
        None => {
            let body = fetcher.fetch(&args.path).await?;
            cache.set(key, body.clone());
            body
        }
    };

    let kind = Url::parse(&args.path)
        .map_or_else(|_| content_kind_of(&args.path), |url| content_kind_of(url.path()));
    let contents = match String::from_utf8(body.to_vec()) {
        Ok(text) => FileContent::Text(text),
        Err(err) => FileContent::Binary(err.into_bytes()),
    };
    Ok(Some(LoadOutput::contents(contents).with_loader(kind)))
}
