//! Lexical folder-path normalization.
//!
//! Rule keys, app directories and modified files are all compared as
//! normalized strings: `/` separators, no `.` segments, `..` resolved
//! without touching the filesystem, no trailing slash. The empty relative
//! path is `.`.

/// Normalize `path` lexically.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                // `/..` stays at the root.
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Normalize `path`, resolving it against `root` when relative.
pub fn join(root: &str, path: &str) -> String {
    let path = path.replace('\\', "/");
    if path.starts_with('/') || root.is_empty() || root == "." {
        return normalize(&path);
    }
    normalize(&format!("{}/{}", root, path))
}

/// Express `path` relative to `root` when it lies under it.
pub fn relative_to(root: &str, path: &str) -> String {
    let root = normalize(root);
    let path = normalize(path);
    if root == "." {
        return path;
    }
    if path == root {
        return ".".to_string();
    }
    let prefix = if root == "/" { root.clone() } else { format!("{}/", root) };
    match path.strip_prefix(&prefix) {
        Some(rest) => rest.to_string(),
        None => path,
    }
}

/// Parent of a normalized path; `None` at `.` or `/`.
pub fn parent(path: &str) -> Option<String> {
    if path == "." || path == "/" {
        return None;
    }
    match path.rsplit_once('/') {
        Some(("", _)) => Some("/".to_string()),
        Some((head, _)) => Some(head.to_string()),
        None => Some(".".to_string()),
    }
}

/// `true` when `path` equals `dir` or lies beneath it (both normalized).
pub fn is_within(dir: &str, path: &str) -> bool {
    if dir == "." {
        return !path.starts_with('/') && !path.starts_with("..");
    }
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/') || dir == "/")
}
