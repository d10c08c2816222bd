use crate::error::Error;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// Top-level folder names that are backed up separately.
#[derive(Debug, Clone, Default)]
pub struct BackupAllowlist {
    folders: HashSet<String>,
}

impl BackupAllowlist {
    /// One folder per line; blank lines and `#` comments are ignored.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::invalid_input(format!(
                "backup folder list not found: {}",
                path.display()
            )));
        }
        let text = fs::read_to_string(path)?;
        let list = Self::from_lines(text.lines());
        info!("Loaded {} backup folder(s) from {}", list.len(), path.display());
        Ok(list)
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let folders = lines
            .into_iter()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect();
        Self { folders }
    }

    pub fn contains(&self, top_level: &str) -> bool {
        self.folders.contains(top_level)
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Exact relative paths known to have been deleted by the library manager.
#[derive(Debug, Clone, Default)]
pub struct DeletedSet {
    paths: HashSet<String>,
}

impl DeletedSet {
    /// Union of every list; a missing file is a configuration error.
    pub fn load_all<P: AsRef<Path>>(lists: &[P]) -> Result<Self, Error> {
        let mut set = Self::default();
        for list in lists {
            let list = list.as_ref();
            if !list.is_file() {
                return Err(Error::invalid_input(format!(
                    "deleted-path list not found: {}",
                    list.display()
                )));
            }
            let before = set.len();
            set.extend(fs::read_to_string(list)?.lines());
            info!(
                "Loaded {} deleted path(s) from {}",
                set.len() - before,
                list.display()
            );
        }
        Ok(set)
    }

    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut set = Self::default();
        set.extend(lines);
        set
    }

    fn extend<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        self.paths.extend(
            lines
                .into_iter()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string),
        );
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
