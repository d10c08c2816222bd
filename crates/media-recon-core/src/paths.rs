use crate::error::Error;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// First segments that identify a host mount rather than the library itself.
/// `mnt/<share>/<library-root>` is collapsed to the canonical root name.
const MOUNT_PREFIXES: &[&str] = &["mnt", "data", "pool"];

/// Logical library root a normalized path is rewritten under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaRoot {
    Movies,
    Tv,
}

impl MediaRoot {
    pub fn name(&self) -> &'static str {
        match self {
            MediaRoot::Movies => "movies",
            MediaRoot::Tv => "tv",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            MediaRoot::Movies => &["movies", "films"],
            MediaRoot::Tv => &["tv", "series", "shows"],
        }
    }

    fn is_alias(&self, segment: &str) -> bool {
        let lower = segment.to_ascii_lowercase();
        self.aliases().iter().any(|a| *a == lower)
    }
}

/// Split on either `/` or `\`, dropping empty segments.
pub fn split_any_sep(path: &str) -> Vec<&str> {
    path.split(|c: char| c == '/' || c == '\\').filter(|s| !s.is_empty()).collect()
}

/// Rewrite `raw` into the canonical root-relative form `<root>/<rest...>`.
///
/// Total and deterministic: any input yields a string, and feeding the result
/// back in returns it unchanged. An input with no segments normalizes to "".
pub fn normalize_library_path(raw: &str, root: MediaRoot) -> String {
    let segs = split_any_sep(raw);
    if segs.is_empty() {
        return String::new();
    }

    let rest: &[&str] = if let Some(pos) = segs.iter().take(3).position(|s| root.is_alias(s)) {
        &segs[pos + 1..]
    } else if segs.len() >= 3 && MOUNT_PREFIXES.contains(&segs[0].to_ascii_lowercase().as_str()) {
        // mnt/<share>/<library-root>/...: the library root is replaced below.
        &segs[3..]
    } else {
        &segs[..]
    };

    let mut out = String::from(root.name());
    for seg in rest {
        out.push('/');
        out.push_str(seg);
    }
    out
}

/// First path segment, or the whole path when it has no separator.
pub fn top_level_component(relpath: &str) -> &str {
    relpath.split('/').next().unwrap_or(relpath)
}

/// Lower-cased extension of the final segment, if any.
pub fn extension(relpath: &str) -> Option<String> {
    let name = relpath.rsplit('/').next().unwrap_or(relpath);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            Some(ext.to_ascii_lowercase())
        }
        _ => None,
    }
}

/// Case-sensitive, component-boundary prefix filter: `tv/Library` matches
/// `tv/Library` and `tv/Library/...` but not `tv/LibraryOld/...`.
#[derive(Debug, Clone, Default)]
pub struct FolderFilter {
    folder: Option<String>,
}

impl FolderFilter {
    /// `None` matches every path. A folder that is empty once trailing
    /// slashes are removed (`""`, `"/"`) is rejected rather than widened to
    /// match everything.
    pub fn new(folder: Option<&str>) -> Result<Self, Error> {
        let Some(raw) = folder else {
            return Ok(Self::any());
        };
        let trimmed = raw.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::invalid_input(format!("invalid folder filter '{}'", raw)));
        }
        Ok(Self {
            folder: Some(trimmed.to_string()),
        })
    }

    pub fn any() -> Self {
        Self { folder: None }
    }

    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn matches(&self, path: &str) -> bool {
        match &self.folder {
            None => true,
            Some(folder) => {
                path == folder
                    || (path.starts_with(folder.as_str())
                        && path.as_bytes().get(folder.len()) == Some(&b'/'))
            }
        }
    }
}

/// Join `relative` onto `root`, rejecting any result that would land outside
/// `root`: absolute paths, `..` climbing above the root, and existing
/// ancestors that resolve (through symlinks) to somewhere else.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf, Error> {
    let escape = || Error::PathEscape {
        root: root.to_path_buf(),
        relative: relative.to_string(),
    };

    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(escape());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }
    if parts.is_empty() {
        return Err(escape());
    }

    let mut joined = root.to_path_buf();
    joined.extend(parts);

    if let Ok(canonical_root) = fs::canonicalize(root) {
        if let Some(resolved) = canonicalize_existing_prefix(&joined) {
            if !resolved.starts_with(&canonical_root) {
                return Err(escape());
            }
        }
    }

    Ok(joined)
}

/// Canonicalize the deepest existing ancestor of `path` and re-append the rest.
fn canonicalize_existing_prefix(path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if let Ok(resolved) = fs::canonicalize(existing) {
            let mut out = resolved;
            out.extend(tail.iter().rev());
            return Some(out);
        }
        tail.push(existing.file_name()?);
        existing = existing.parent()?;
    }
}
