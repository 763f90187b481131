//! In-memory virtual file system.
//!
//! Holds the file set of one build, keyed by normalized virtual path, and
//! answers lookups with deterministic extension and index-file probing.
//!
//! ## Probe order
//!
//! `resolve_with_fallbacks("/src/app.ts", "./utils")` tries, stopping at the
//! first hit:
//!
//! 1. `/src/utils`
//! 2. `/src/utils.ts`, `/src/utils.tsx`, ... (each source extension)
//! 3. when the path already ends in a source extension, the same stem with
//!    each other source extension (`./utils.js` finds `/src/utils.ts`)
//! 4. `/src/utils/index.ts`, `/src/utils/index.tsx`, ...

pub mod kind;
pub mod path;

pub use kind::{content_kind_of, ContentKind};

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{Error, Result};
use path::{escapes_root, extension_of, normalize, resolve_relative};

/// Source extensions probed in stages 2 and 3, highest priority first.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".json"];

/// Index files probed in stage 4, highest priority first.
pub const DEFAULT_INDEX_FILES: &[&str] =
    &["index.ts", "index.tsx", "index.js", "index.jsx", "index.mjs"];

/// Contents of a virtual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    /// Raw bytes of the file.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Text view, if the contents are valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(bytes) => std::str::from_utf8(bytes).ok(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// A file found by [`VirtualFs::resolve_with_fallbacks`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Normalized path of the match.
    pub path: String,
    pub content: FileContent,
    pub kind: ContentKind,
}

/// In-memory file table for one build.
///
/// `Clone` copies the whole table; mutations on a clone never reach the
/// original.
#[derive(Debug, Clone)]
pub struct VirtualFs {
    files: BTreeMap<String, FileContent>,
    extensions: Vec<String>,
    index_files: Vec<String>,
}

impl Default for VirtualFs {
    fn default() -> Self {
        Self {
            files: BTreeMap::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            index_files: DEFAULT_INDEX_FILES.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl VirtualFs {
    /// Create an empty file system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from a caller-supplied file set. Keys are normalized;
    /// the input itself is left untouched.
    pub fn from_files<I, P, C>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: AsRef<str>,
        C: Into<FileContent>,
    {
        let mut vfs = Self::new();
        for (path, content) in files {
            vfs.write(path.as_ref(), content);
        }
        vfs
    }

    /// Replace the probing lists (extensions include their dot).
    #[must_use]
    pub fn with_resolution(mut self, extensions: Vec<String>, index_files: Vec<String>) -> Self {
        self.extensions = extensions;
        self.index_files = index_files;
        self
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lookup(path).is_some()
    }

    /// Read a file. The error names the path exactly as requested.
    pub fn read(&self, path: &str) -> Result<&FileContent> {
        self.lookup(path)
            .ok_or_else(|| Error::not_found(path, None))
    }

    /// Read a file as text. Binary contents that are not UTF-8 count as missing text.
    pub fn read_text(&self, path: &str) -> Result<&str> {
        self.read(path)?
            .as_text()
            .ok_or_else(|| Error::not_found(path, None))
    }

    /// Insert or replace a file. Paths outside the root are not stored;
    /// returns whether the file was written.
    pub fn write(&mut self, path: &str, content: impl Into<FileContent>) -> bool {
        if escapes_root(path) {
            warn!(target: "esresolve::vfs", path, "Ignored write outside the virtual root");
            return false;
        }
        self.files.insert(normalize(path), content.into());
        true
    }

    /// Remove a file, returning its previous contents.
    pub fn delete(&mut self, path: &str) -> Option<FileContent> {
        self.files.remove(&normalize(path))
    }

    /// All paths, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolve `specifier` relative to `base` with extension and index probing.
    pub fn resolve_with_fallbacks(&self, base: &str, specifier: &str) -> Result<ResolvedFile> {
        let target = resolve_relative(base, specifier);
        self.probe(&target)
            .ok_or_else(|| Error::not_found(specifier, Some(base)))
    }

    fn probe(&self, target: &str) -> Option<ResolvedFile> {
        // 1. Exact path.
        if let Some(found) = self.hit(target) {
            return Some(found);
        }

        // 2. Append each source extension.
        for ext in &self.extensions {
            if let Some(found) = self.hit(&format!("{target}{ext}")) {
                return Some(found);
            }
        }

        // 3. Swap a known source extension for a sibling one.
        let current = extension_of(target);
        if !current.is_empty() && self.extensions.iter().any(|e| e == current) {
            let stem = &target[..target.len() - current.len()];
            for ext in self.extensions.iter().filter(|e| *e != current) {
                if let Some(found) = self.hit(&format!("{stem}{ext}")) {
                    return Some(found);
                }
            }
        }

        // 4. Directory index.
        let dir = target.trim_end_matches('/');
        for index in &self.index_files {
            if let Some(found) = self.hit(&format!("{dir}/{index}")) {
                return Some(found);
            }
        }

        None
    }

    fn lookup(&self, path: &str) -> Option<&FileContent> {
        if escapes_root(path) {
            return None;
        }
        self.files.get(&normalize(path))
    }

    fn hit(&self, candidate: &str) -> Option<ResolvedFile> {
        let path = normalize(candidate);
        self.lookup(&path).map(|content| ResolvedFile {
            kind: content_kind_of(&path),
            content: content.clone(),
            path,
        })
    }
}
