//! Path model: conversions between internal folder paths and flat storage keys.
//!
//! Two representations are in play:
//! - an **internal path** always starts with `/`, and the root is exactly `/`;
//! - a **storage key** never starts with `/` and is what the bucket lists as
//!   `name`.
//!
//! Every function here is total. Malformed input produces a best-effort
//! result rather than an error.

pub const SEPARATOR: char = '/';
pub const ROOT: &str = "/";

/// Immediate child of a directory, derived from a relative key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind<'a> {
    /// The entry lives in a deeper folder; this is the immediate child folder.
    Folder(&'a str),
    /// Zero-byte placeholder marking an (otherwise empty) folder.
    FolderMarker(&'a str),
    /// A file directly inside the directory.
    File(&'a str),
}

fn strip_leading(path: &str) -> &str {
    path.strip_prefix(SEPARATOR).unwrap_or(path)
}

fn strip_trailing(path: &str) -> &str {
    path.strip_suffix(SEPARATOR).unwrap_or(path)
}

pub fn is_root(path: &str) -> bool {
    path.is_empty() || path == ROOT
}

/// Strip one leading separator. Root maps to the empty string.
pub fn to_storage_key(internal_path: &str) -> &str {
    strip_leading(internal_path)
}

/// Same transformation as [`to_storage_key`], named for its use on keys that
/// may or may not carry a stray leading separator.
pub fn normalize_key(key: &str) -> &str {
    strip_leading(key)
}

/// Parent of an internal path. The root is its own parent, and so is the
/// parent of any single-segment path.
pub fn parent_of(internal_path: &str) -> String {
    if is_root(internal_path) {
        return ROOT.to_string();
    }
    let clean = strip_trailing(internal_path);
    match clean.rfind(SEPARATOR) {
        Some(idx) if idx > 0 => clean[..idx].to_string(),
        _ => ROOT.to_string(),
    }
}

/// Storage key for `filename` inside `folder_path`.
///
/// ```
/// use par_object_manager::paths::join_key;
/// assert_eq!(
///     join_key("/blog-images/oci-blogs", "Chess_Puzzle.png"),
///     "blog-images/oci-blogs/Chess_Puzzle.png"
/// );
/// ```
pub fn join_key(folder_path: &str, filename: &str) -> String {
    if is_root(folder_path) {
        return filename.to_string();
    }
    let folder = strip_trailing(strip_leading(folder_path));
    if folder.is_empty() {
        return filename.to_string();
    }
    format!("{folder}{SEPARATOR}{filename}")
}

/// Internal path of the child folder `name` under `parent`.
pub fn child_path(parent: &str, name: &str) -> String {
    if is_root(parent) {
        format!("{ROOT}{name}")
    } else {
        format!("{}{SEPARATOR}{name}", strip_trailing(parent))
    }
}

/// Storage prefix under which everything in `internal_path` lives
/// (`folder/sub/`), or `None` for the root.
pub fn listing_prefix(internal_path: &str) -> Option<String> {
    let base = strip_trailing(strip_leading(internal_path));
    if base.is_empty() {
        None
    } else {
        Some(format!("{base}{SEPARATOR}"))
    }
}

/// Suffix of `full_key` below the directory `base_path`, or `None` when the
/// key lives outside that directory.
///
/// The base is treated as a directory: `/folder` owns `folder/x` but not
/// `folder2/x`.
pub fn relative_to<'a>(full_key: &'a str, base_path: &str) -> Option<&'a str> {
    let full_key = strip_leading(full_key);
    let base = strip_trailing(strip_leading(base_path));
    if base.is_empty() {
        return Some(full_key);
    }
    let rest = full_key.strip_prefix(base)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.strip_prefix(SEPARATOR)
}

/// Classify a relative suffix produced by [`relative_to`].
pub fn classify(relative: &str) -> ChildKind<'_> {
    match relative.find(SEPARATOR) {
        Some(idx) if idx > 0 && idx == relative.len() - 1 => {
            ChildKind::FolderMarker(&relative[..idx])
        }
        Some(idx) if idx > 0 => ChildKind::Folder(&relative[..idx]),
        _ if relative.ends_with(SEPARATOR) => {
            ChildKind::FolderMarker(strip_trailing(relative))
        }
        _ => ChildKind::File(relative),
    }
}

/// Display form: root is empty, no leading or trailing separator.
pub fn display_path(internal_path: &str) -> &str {
    if internal_path == ROOT {
        return "";
    }
    strip_trailing(strip_leading(internal_path))
}

/// Inverse of [`display_path`].
pub fn from_display(display: &str) -> String {
    let trimmed = strip_trailing(strip_leading(display.trim()));
    if trimmed.is_empty() {
        ROOT.to_string()
    } else {
        format!("{ROOT}{trimmed}")
    }
}

/// Last segment of a path or key, ignoring one trailing separator.
pub fn file_name(path: &str) -> &str {
    let clean = strip_trailing(path);
    match clean.rfind(SEPARATOR) {
        Some(idx) => &clean[idx + 1..],
        None => clean,
    }
}
