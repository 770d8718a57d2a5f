//! Archive path helpers
//!
//! Archive paths are `/`-separated, never start with `/`, and compare as
//! plain strings so that a sorted map yields every directory's contents as
//! one contiguous range.

/// Normalize an archive path.
///
/// Leading slashes are removed and runs of `/` are collapsed into one.
/// A trailing slash is kept because callers use it to denote a subtree.
pub fn clean_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    let mut out = String::with_capacity(trimmed.len());
    let mut previous_slash = false;
    for c in trimmed.chars() {
        if c == '/' {
            if previous_slash {
                continue;
            }
            previous_slash = true;
        } else {
            previous_slash = false;
        }
        out.push(c);
    }
    out
}

/// Directory part of a clean path, `""` for top-level entries.
pub fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(n) => &path[..n],
        None => "",
    }
}

/// Last segment of a path.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(n) => &path[n + 1..],
        None => path,
    }
}

/// Join a destination directory and a relative path.
pub fn append_path(destination: &str, path: &str) -> String {
    let destination = destination.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if destination.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        destination.to_string()
    } else {
        format!("{destination}/{path}")
    }
}

/// Returns true when `path` is `prefix` itself or lies below it.
///
/// A prefix ending in `/` only matches paths below it. Otherwise the match
/// stops at segment boundaries: `a/b` covers `a/b` and `a/b/c` but not `a/bc`.
pub fn in_subtree(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Every ancestor directory of a clean path, nearest first, ending with `""`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    let mut current = Some(path);
    std::iter::from_fn(move || {
        let p = current?;
        if p.is_empty() {
            current = None;
            return None;
        }
        let up = parent(p);
        current = Some(up);
        Some(up)
    })
}
