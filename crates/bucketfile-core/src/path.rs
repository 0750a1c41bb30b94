//! Path model for a flat key namespace.
//!
//! Object stores have no directories: a "folder" is a key prefix ending in
//! `/`. These helpers normalize, join and split such keys. Every function is
//! total and never fails; the normalizing ones are idempotent.

/// Characters that are never allowed inside a single key segment.
pub const FORBIDDEN_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Join path segments with exactly one `/` between them.
///
/// Empty segments are skipped and separators at segment boundaries are
/// collapsed, so `join_path(&["a/", "/b"])` is `"a/b"`.
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    let mut out = String::new();
    for part in segments
        .iter()
        .flat_map(|s| s.as_ref().split('/'))
        .filter(|p| !p.is_empty())
    {
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(part);
    }
    out
}

/// Append a trailing `/` unless already present. The empty path stays empty.
pub fn ensure_folder_path(path: &str) -> String {
    if path.is_empty() || path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Remove one trailing `/`. The root path `/` is returned unchanged.
pub fn strip_trailing_slash(path: &str) -> &str {
    if path == "/" {
        return path;
    }
    path.strip_suffix('/').unwrap_or(path)
}

/// Everything before the last `/` of the stripped path, or `""`.
pub fn get_parent_path(path: &str) -> &str {
    let stripped = strip_trailing_slash(path);
    match stripped.rfind('/') {
        Some(idx) => &stripped[..idx],
        None => "",
    }
}

/// Everything after the last `/` of the stripped path, or the whole path.
pub fn get_path_name(path: &str) -> &str {
    let stripped = strip_trailing_slash(path);
    match stripped.rfind('/') {
        Some(idx) => &stripped[idx + 1..],
        None => stripped,
    }
}

/// Sanitize a single path segment.
///
/// Strips forbidden characters (including `/`), collapses runs of dots,
/// trims leading/trailing slashes and collapses repeated slashes.
///
/// This must only be applied to one segment: a multi-segment path loses its
/// separators (`"a/b"` becomes `"ab"`). Use [`join_path`] to assemble the
/// sanitized segments.
pub fn sanitize_path(path: &str) -> String {
    let stripped: String = path.chars().filter(|c| !FORBIDDEN_CHARS.contains(c)).collect();

    let mut out = String::with_capacity(stripped.len());
    let mut prev = None;
    for c in stripped.chars() {
        if (c == '.' || c == '/') && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }

    out.trim_matches('/').to_string()
}

/// Trim every leading and trailing `/`, giving the comparable form of a
/// folder path. The root is `""`.
pub fn normalize_folder(path: &str) -> &str {
    path.trim_matches('/')
}

/// Whether `path` is `folder` itself or lies somewhere below it.
pub fn is_within(path: &str, folder: &str) -> bool {
    let path = normalize_folder(path);
    let folder = normalize_folder(folder);
    if folder.is_empty() {
        return true;
    }
    path == folder
        || path
            .strip_prefix(folder)
            .is_some_and(|rest| rest.starts_with('/'))
}
