use super::scanner::{FileListScanner, LineStats};
use super::sources::BackupAllowlist;
use crate::error::Error;
use crate::progress::ProgressReporter;
use std::collections::BTreeMap;

/// Bucket for files that sit directly at the list root.
pub const ROOT_BUCKET: &str = "(root)";

/// N+ bucket keys for one file path, using directory components only. A path
/// shallower than a level repeats its deepest directory.
///
/// `a/b/c/file.ext` at 4 levels gives `a`, `a/b`, `a/b/c`, `a/b/c`.
pub fn bucket_keys(path: &str, levels: usize) -> Vec<String> {
    let parts: Vec<&str> = path.split('/').collect();
    let dirs = &parts[..parts.len().saturating_sub(1)];
    if dirs.is_empty() {
        return vec![ROOT_BUCKET.to_string(); levels];
    }
    (1..=levels)
        .map(|n| dirs[..n.min(dirs.len())].join("/"))
        .collect()
}

#[derive(Debug, Clone)]
pub struct LevelSummary {
    pub lines: LineStats,
    /// One map per depth, bucket key to file count.
    pub levels: Vec<BTreeMap<String, u64>>,
}

impl LevelSummary {
    /// Largest buckets at `level` (1-based), ties broken by key.
    pub fn top(&self, level: usize, n: usize) -> Vec<(&str, u64)> {
        let Some(map) = level.checked_sub(1).and_then(|i| self.levels.get(i)) else {
            return Vec::new();
        };
        let mut items: Vec<(&str, u64)> = map.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        items.truncate(n);
        items
    }

    /// Whether a bucket's top-level folder is on the backup allowlist.
    pub fn is_backed_up(key: &str, backup: &BackupAllowlist) -> bool {
        key != ROOT_BUCKET && backup.contains(key.split('/').next().unwrap_or(key))
    }
}

pub fn summarize_levels(
    scanner: &FileListScanner,
    levels: usize,
    reporter: &dyn ProgressReporter,
) -> Result<LevelSummary, Error> {
    if levels == 0 {
        return Err(Error::invalid_input("levels must be at least 1"));
    }
    let mut maps = vec![BTreeMap::new(); levels];
    let lines = scanner.for_each_path("Summarizing", reporter, |path| {
        for (idx, key) in bucket_keys(path, levels).into_iter().enumerate() {
            *maps[idx].entry(key).or_insert(0u64) += 1;
        }
        Ok(())
    })?;
    Ok(LevelSummary {
        lines,
        levels: maps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::FolderFilter;
    use crate::progress::SilentReporter;
    use std::fs;

    #[test]
    fn test_bucket_keys() {
        assert_eq!(bucket_keys("a/b/c/file.ext", 4), vec!["a", "a/b", "a/b/c", "a/b/c"]);
        assert_eq!(bucket_keys("file.ext", 2), vec![ROOT_BUCKET, ROOT_BUCKET]);
        assert_eq!(bucket_keys("a/file.ext", 1), vec!["a"]);
    }

    #[test]
    fn test_summarize_levels() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("list.txt");
        fs::write(&input, "tv/A/1.mkv\ntv/A/2.mkv\ntv/B/1.mkv\nmovies/C/1.mkv\nroot.txt\n").unwrap();

        let scanner = FileListScanner::new(&input, FolderFilter::any());
        let summary = summarize_levels(&scanner, 2, &SilentReporter).unwrap();
        assert_eq!(summary.lines.considered, 5);
        assert_eq!(summary.levels[0].get("tv"), Some(&3));
        assert_eq!(summary.levels[0].get(ROOT_BUCKET), Some(&1));
        assert_eq!(summary.levels[1].get("tv/A"), Some(&2));
        assert_eq!(summary.top(1, 1), vec![("tv", 3)]);
        assert!(summary.top(3, 5).is_empty());

        let backup = BackupAllowlist::from_lines(["tv"]);
        assert!(LevelSummary::is_backed_up("tv/A", &backup));
        assert!(!LevelSummary::is_backed_up(ROOT_BUCKET, &backup));
        assert!(summarize_levels(&scanner, 0, &SilentReporter).is_err());
    }
}
