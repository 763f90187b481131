//! Content classification by extension.

use serde::{Deserialize, Serialize};

use super::path::extension_of;

/// How a module's contents should be treated by the toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContentKind {
    /// JavaScript or TypeScript without JSX.
    #[default]
    #[serde(rename = "js")]
    Script,
    /// JavaScript or TypeScript with JSX.
    #[serde(rename = "jsx")]
    ScriptJsx,
    /// Stylesheets.
    #[serde(rename = "css")]
    Style,
    /// Structured data (JSON).
    #[serde(rename = "json")]
    Data,
    /// Plain text, imported as a string.
    #[serde(rename = "text")]
    Text,
    /// Opaque bytes.
    #[serde(rename = "binary")]
    Binary,
}

impl ContentKind {
    /// Loader tag handed to the toolchain.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Script => "js",
            Self::ScriptJsx => "jsx",
            Self::Style => "css",
            Self::Data => "json",
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }

    /// Whether contents of this kind are expected to be UTF-8.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        !matches!(self, Self::Binary)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const KIND_TABLE: &[(&str, ContentKind)] = &[
    (".js", ContentKind::Script),
    (".mjs", ContentKind::Script),
    (".cjs", ContentKind::Script),
    (".ts", ContentKind::Script),
    (".mts", ContentKind::Script),
    (".cts", ContentKind::Script),
    (".jsx", ContentKind::ScriptJsx),
    (".tsx", ContentKind::ScriptJsx),
    (".css", ContentKind::Style),
    (".scss", ContentKind::Style),
    (".sass", ContentKind::Style),
    (".less", ContentKind::Style),
    (".json", ContentKind::Data),
    (".jsonc", ContentKind::Data),
    (".map", ContentKind::Data),
    (".txt", ContentKind::Text),
    (".md", ContentKind::Text),
    (".html", ContentKind::Text),
    (".htm", ContentKind::Text),
    (".svg", ContentKind::Text),
    (".csv", ContentKind::Text),
    (".png", ContentKind::Binary),
    (".jpg", ContentKind::Binary),
    (".jpeg", ContentKind::Binary),
    (".gif", ContentKind::Binary),
    (".webp", ContentKind::Binary),
    (".avif", ContentKind::Binary),
    (".ico", ContentKind::Binary),
    (".woff", ContentKind::Binary),
    (".woff2", ContentKind::Binary),
    (".ttf", ContentKind::Binary),
    (".otf", ContentKind::Binary),
    (".eot", ContentKind::Binary),
    (".wasm", ContentKind::Binary),
    (".mp3", ContentKind::Binary),
    (".mp4", ContentKind::Binary),
    (".webm", ContentKind::Binary),
    (".pdf", ContentKind::Binary),
    (".zip", ContentKind::Binary),
];

/// Classify a path by its extension. Unknown extensions are scripts.
#[must_use]
pub fn content_kind_of(path: &str) -> ContentKind {
    let ext = extension_of(path).to_ascii_lowercase();
    KIND_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map_or(ContentKind::Script, |(_, kind)| *kind)
}
