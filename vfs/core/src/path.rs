//! Pure, lexical path utilities.
//!
//! Nothing here touches the namespace: `..` is collapsed textually, which is
//! also how the resolver treats it once a path has been joined to the
//! working directory.

use smallvec::SmallVec;

type Parts<'a> = SmallVec<[&'a str; 16]>;

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

/// Collapses `.` and `..` in a list of non-empty components.
///
/// With `allow_above_root` the leading `..` that cannot be collapsed are
/// kept (relative paths); otherwise they are dropped (absolute paths).
pub fn normalize_array<'a>(parts: &[&'a str], allow_above_root: bool) -> Vec<&'a str> {
    let mut out: Parts<'a> = SmallVec::new();
    let mut up = 0usize;
    for part in parts.iter().rev() {
        match *part {
            "." | "" => {}
            ".." => up += 1,
            _ if up > 0 => up -= 1,
            part => out.push(part),
        }
    }
    if allow_above_root {
        out.extend(std::iter::repeat_n("..", up));
    }
    out.into_iter().rev().collect()
}

/// Normalizes a path, keeping absoluteness and a trailing slash.
pub fn normalize(path: &str) -> String {
    let absolute = is_absolute(path);
    let trailing_slash = path.ends_with('/');
    let parts: Parts<'_> = path.split('/').filter(|p| !p.is_empty()).collect();
    let mut out = normalize_array(&parts, !absolute).join("/");
    if out.is_empty() && !absolute {
        out.push('.');
    }
    if !out.is_empty() && trailing_slash {
        out.push('/');
    }
    if absolute {
        out.insert(0, '/');
    }
    out
}

/// Everything before the last component: `"/a/b"` gives `"/a"`, `"/a"`
/// gives `"/"` and `"a"` gives `"."`.
pub fn dirname(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return if path.is_empty() { "." } else { "/" };
    }
    match trimmed.rfind('/') {
        None => ".",
        Some(idx) => {
            let dir = trimmed[..idx].trim_end_matches('/');
            if dir.is_empty() { "/" } else { dir }
        }
    }
}

/// The last component after normalization; `"/"` for the root.
pub fn basename(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    let normalized = normalize(path);
    let trimmed = normalized.strip_suffix('/').unwrap_or(&normalized);
    match trimmed.rfind('/') {
        None => trimmed.to_string(),
        Some(idx) => trimmed[idx + 1..].to_string(),
    }
}

pub fn join(paths: &[&str]) -> String {
    normalize(&paths.join("/"))
}

pub fn join2(left: &str, right: &str) -> String {
    normalize(&format!("{left}/{right}"))
}

/// Resolves `paths` right to left until one is absolute, falling back to
/// `cwd`. An empty element yields an empty result.
pub fn resolve(cwd: &str, paths: &[&str]) -> String {
    let mut segments: Vec<&str> = Vec::new();
    let mut absolute = false;
    for path in paths.iter().rev().copied().chain(std::iter::once(cwd)) {
        if path.is_empty() {
            return String::new();
        }
        segments.push(path);
        if is_absolute(path) {
            absolute = true;
            break;
        }
    }
    let parts: Vec<&str> = segments
        .iter()
        .rev()
        .flat_map(|segment| segment.split('/'))
        .filter(|p| !p.is_empty())
        .collect();
    let joined = normalize_array(&parts, !absolute).join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// The relative path leading from `from` to `to`, both resolved against
/// `cwd`. Equal paths give an empty string.
pub fn relative(cwd: &str, from: &str, to: &str) -> String {
    let from = resolve(cwd, &[from]);
    let to = resolve(cwd, &[to]);
    let from_parts: Parts<'_> = from.split('/').filter(|p| !p.is_empty()).collect();
    let to_parts: Parts<'_> = to.split('/').filter(|p| !p.is_empty()).collect();
    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Parts<'_> = SmallVec::new();
    out.extend(std::iter::repeat_n("..", from_parts.len() - common));
    out.extend(to_parts[common..].iter().copied());
    out.join("/")
}

/// Whether the normalized absolute `path` is `ancestor` or lies below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    match path.strip_prefix(ancestor) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || ancestor.ends_with('/'),
        None => false,
    }
}
