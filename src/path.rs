//! Delimiter-aware path helpers
//!
//! Paths are normalised without leading, trailing or repeated delimiters, so
//! `"/data//raw/"` and `"data/raw"` name the same item. The empty string is the
//! top of the hierarchy.

/// Strip leading, trailing and repeated delimiters
pub fn normalize(path: &str, delim: char) -> String {
    path.split(delim).filter(|s| !s.is_empty()).collect::<Vec<_>>().join(&delim.to_string())
}

/// True when any segment is `.` or `..`
pub fn has_dot_segment(path: &str, delim: char) -> bool {
    path.split(delim).any(|s| s == "." || s == "..")
}

/// Join two normalised fragments
pub fn join(base: &str, rest: &str, delim: char) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}{delim}{rest}"),
    }
}

/// Parent of a normalised path, `None` for the top
pub fn parent(path: &str, delim: char) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rfind(delim).map(|i| &path[..i]).unwrap_or(""))
}

/// Proper ancestors of a normalised path, shallowest first, including the top ("").
pub fn ancestors(path: &str, delim: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut cur = parent(path, delim);
    while let Some(p) = cur {
        out.push(p);
        cur = parent(p, delim);
    }
    out.reverse();
    out
}

/// Number of segments
pub fn depth(path: &str, delim: char) -> usize {
    if path.is_empty() {
        0
    } else {
        path.matches(delim).count() + 1
    }
}

/// True when `path` lies strictly below `ancestor`
pub fn is_descendant(path: &str, ancestor: &str, delim: char) -> bool {
    if ancestor.is_empty() {
        return !path.is_empty();
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(delim)
}

/// True when `path` is a direct child of `parent_path`
pub fn is_immediate_child(path: &str, parent_path: &str, delim: char) -> bool {
    is_descendant(path, parent_path, delim) && parent(path, delim) == Some(parent_path)
}

/// Replace the `old` prefix of `path` with `new`, keeping the relative tail
pub fn rebase(path: &str, old: &str, new: &str, delim: char) -> Option<String> {
    if path == old {
        return Some(new.to_string());
    }
    if !is_descendant(path, old, delim) {
        return None;
    }
    let tail = if old.is_empty() { path } else { &path[old.len() + delim.len_utf8()..] };
    Some(join(new, tail, delim))
}
