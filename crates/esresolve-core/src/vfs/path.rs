//! Virtual path helpers.
//!
//! Virtual paths are plain `/`-separated strings. A normalized path is rooted
//! (leading `/`), has no `.` segments, no repeated separators and no trailing
//! separator. The only exception is a path that starts by climbing out with
//! `..`, which stays relative.

/// Normalize a virtual path. Total and idempotent.
#[must_use]
pub fn normalize(path: &str) -> String {
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    if rest == "." {
        rest = "";
    }

    let relative = rest == ".." || rest.starts_with("../");
    let joined = rest
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/");

    if relative {
        joined
    } else {
        format!("/{joined}")
    }
}

/// Resolve `specifier` against the directory of `base`.
///
/// Absolute specifiers are only normalized. `..` segments that climb past
/// the root are kept, so the result may point outside the virtual root;
/// lookups treat such paths as missing.
#[must_use]
pub fn resolve_relative(base: &str, specifier: &str) -> String {
    if specifier.starts_with('/') {
        return normalize(specifier);
    }

    join_dir(&directory_of(base), specifier)
}

/// Resolve `specifier` against a directory path, popping on `..`.
#[must_use]
pub fn join_dir(dir: &str, specifier: &str) -> String {
    if specifier.starts_with('/') {
        return normalize(specifier);
    }

    let mut stack: Vec<&str> = Vec::new();
    for seg in dir.split('/').chain(specifier.split('/')) {
        match seg {
            "" | "." => {}
            ".." => match stack.last() {
                Some(&top) if top != ".." => {
                    stack.pop();
                }
                _ => stack.push(".."),
            },
            other => stack.push(other),
        }
    }

    format!("/{}", stack.join("/"))
}

/// Directory part of a path (`/` for top-level entries).
#[must_use]
pub fn directory_of(path: &str) -> String {
    let path = normalize(path);
    match path.rfind('/') {
        Some(0) => "/".to_string(),
        Some(i) => path[..i].to_string(),
        None => ".".to_string(),
    }
}

/// Final path segment.
#[must_use]
pub fn basename_of(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Extension of the final segment, including the dot (`.ts`).
///
/// Empty when the basename has no dot, or only a leading one (dotfiles).
#[must_use]
pub fn extension_of(path: &str) -> &str {
    let base = basename_of(path);
    match base.rfind('.') {
        Some(0) | None => "",
        Some(i) => &base[i..],
    }
}

/// `true` for `./x`, `../x`, `.` and `..`.
#[must_use]
pub fn is_relative_specifier(specifier: &str) -> bool {
    specifier.starts_with("./")
        || specifier.starts_with("../")
        || specifier == "."
        || specifier == ".."
}

/// `true` for specifiers the VFS can answer directly (relative or rooted).
#[must_use]
pub fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with('/') || is_relative_specifier(specifier)
}

/// `true` when a path keeps a `..` segment after normalization. Such a
/// path points outside the virtual root and never names a stored file.
#[must_use]
pub fn escapes_root(path: &str) -> bool {
    normalize(path).split('/').any(|seg| seg == "..")
}
