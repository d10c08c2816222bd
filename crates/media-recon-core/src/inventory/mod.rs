//! Bulk inventory reconciliation: classify a list of relative paths against
//! the live filesystem, the backup allowlist and the known-deleted set.

pub mod levels;
pub mod scanner;
pub mod sources;

use crate::error::Error;
use crate::output::{file_stem, sibling_output, LineWriter};
use crate::paths::{extension, top_level_component};
use crate::progress::ProgressReporter;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub use scanner::{count_lines_binary, FileListScanner, LineStats};
pub use sources::{BackupAllowlist, DeletedSet};

/// Terminal classification of one path, listed in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Found,
    Backup,
    Redownload,
    Missing,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Found,
        Category::Backup,
        Category::Redownload,
        Category::Missing,
    ];

    /// Suffix used for the per-category output file.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Category::Found => "found",
            Category::Backup => "backup",
            Category::Redownload => "redownload",
            Category::Missing => "missing",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Found => "FOUND",
            Category::Backup => "BACKUP",
            Category::Redownload => "REDOWNLOAD",
            Category::Missing => "MISSING",
        })
    }
}

/// Existence check for a relative path under some root.
pub trait PathProbe {
    fn exists(&self, relpath: &str) -> bool;
}

/// Probes the local filesystem under `base`.
#[derive(Debug, Clone)]
pub struct LocalFsProbe {
    base: PathBuf,
    strict_files: bool,
}

impl LocalFsProbe {
    /// With `strict_files`, only regular files count; otherwise any object
    /// (file, directory, symlink target) does.
    pub fn new(base: impl Into<PathBuf>, strict_files: bool) -> Self {
        Self {
            base: base.into(),
            strict_files,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl PathProbe for LocalFsProbe {
    fn exists(&self, relpath: &str) -> bool {
        let probe = self.base.join(relpath.trim_start_matches('/'));
        if self.strict_files {
            probe.is_file()
        } else {
            probe.exists()
        }
    }
}

pub struct InventoryClassifier<'a, P: PathProbe + ?Sized> {
    filesystem: &'a P,
    backup: &'a BackupAllowlist,
    deleted: &'a DeletedSet,
}

impl<'a, P: PathProbe + ?Sized> InventoryClassifier<'a, P> {
    pub fn new(filesystem: &'a P, backup: &'a BackupAllowlist, deleted: &'a DeletedSet) -> Self {
        Self {
            filesystem,
            backup,
            deleted,
        }
    }

    /// FOUND, then BACKUP, then REDOWNLOAD, then MISSING; the first that
    /// applies wins.
    pub fn classify(&self, relpath: &str) -> Category {
        if self.filesystem.exists(relpath) {
            Category::Found
        } else if self.backup.contains(top_level_component(relpath)) {
            Category::Backup
        } else if self.deleted.contains(relpath) {
            Category::Redownload
        } else {
            Category::Missing
        }
    }
}

/// Run-level counts for operator review.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: [u64; 4],
    pub missing_by_top_level: BTreeMap<String, u64>,
    pub missing_by_extension: BTreeMap<String, u64>,
}

impl Tally {
    pub fn record(&mut self, category: Category, relpath: &str) {
        self.counts[category.index()] += 1;
        if category == Category::Missing {
            *self
                .missing_by_top_level
                .entry(top_level_component(relpath).to_string())
                .or_default() += 1;
            let ext = extension(relpath).unwrap_or_else(|| "(none)".to_string());
            *self.missing_by_extension.entry(ext).or_default() += 1;
        }
    }

    pub fn count(&self, category: Category) -> u64 {
        self.counts[category.index()]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// One output file per category, all created before classification starts.
pub struct CategoryWriters {
    writers: Vec<LineWriter>,
}

impl CategoryWriters {
    pub fn create(out_dir: &Path, stem: &str) -> Result<Self, Error> {
        let writers = Category::ALL
            .iter()
            .map(|c| LineWriter::create(sibling_output(out_dir, stem, c.file_suffix())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { writers })
    }

    pub fn write(&mut self, category: Category, relpath: &str) -> Result<(), Error> {
        Ok(self.writers[category.index()].write_line(relpath)?)
    }

    pub fn path(&self, category: Category) -> &Path {
        self.writers[category.index()].path()
    }

    pub fn finish(self) -> Result<BTreeMap<Category, PathBuf>, Error> {
        let mut paths = BTreeMap::new();
        for (category, writer) in Category::ALL.into_iter().zip(self.writers) {
            paths.insert(category, writer.finish()?);
        }
        Ok(paths)
    }
}

#[derive(Debug, Clone)]
pub struct PlanReport {
    pub lines: LineStats,
    pub tally: Tally,
    pub outputs: BTreeMap<Category, PathBuf>,
}

impl PlanReport {
    pub fn output(&self, category: Category) -> Option<&Path> {
        self.outputs.get(&category).map(PathBuf::as_path)
    }
}

/// Stream `input`, classify each path and write it to its category file.
pub fn run_plan<P: PathProbe + ?Sized>(
    scanner: &FileListScanner,
    classifier: &InventoryClassifier<'_, P>,
    out_dir: &Path,
    reporter: &dyn ProgressReporter,
) -> Result<PlanReport, Error> {
    fs::create_dir_all(out_dir)?;
    let stem = file_stem(scanner.path());
    let mut writers = CategoryWriters::create(out_dir, &stem)?;
    let mut tally = Tally::default();

    let lines = scanner.for_each_path("Classifying", reporter, |relpath| {
        let category = classifier.classify(relpath);
        tally.record(category, relpath);
        writers.write(category, relpath)
    })?;

    let outputs = writers.finish()?;
    info!(
        "Classified {} path(s): {} found, {} backup, {} redownload, {} missing",
        tally.total(),
        tally.count(Category::Found),
        tally.count(Category::Backup),
        tally.count(Category::Redownload),
        tally.count(Category::Missing)
    );
    Ok(PlanReport {
        lines,
        tally,
        outputs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct FakeFs(HashSet<&'static str>);

    impl PathProbe for FakeFs {
        fn exists(&self, relpath: &str) -> bool {
            self.0.contains(relpath)
        }
    }

    #[test]
    fn test_redownload_vs_backup_scenario() {
        let fs = FakeFs(HashSet::new());
        let backup = BackupAllowlist::from_lines(["tv"]);
        let deleted = DeletedSet::from_lines(["movies/A/a.mkv"]);
        let classifier = InventoryClassifier::new(&fs, &backup, &deleted);

        assert_eq!(classifier.classify("movies/A/a.mkv"), Category::Redownload);
        assert_eq!(classifier.classify("tv/B/b.mkv"), Category::Backup);
        assert_eq!(classifier.classify("music/C/c.flac"), Category::Missing);
    }

    #[test]
    fn test_found_beats_every_other_category() {
        let fs = FakeFs(["tv/B/b.mkv"].into_iter().collect());
        let backup = BackupAllowlist::from_lines(["tv"]);
        let deleted = DeletedSet::from_lines(["tv/B/b.mkv"]);
        let classifier = InventoryClassifier::new(&fs, &backup, &deleted);
        assert_eq!(classifier.classify("tv/B/b.mkv"), Category::Found);
    }

    #[test]
    fn test_backup_beats_redownload() {
        let fs = FakeFs(HashSet::new());
        let backup = BackupAllowlist::from_lines(["tv"]);
        let deleted = DeletedSet::from_lines(["tv/B/b.mkv"]);
        let classifier = InventoryClassifier::new(&fs, &backup, &deleted);
        assert_eq!(classifier.classify("tv/B/b.mkv"), Category::Backup);
    }

    #[test]
    fn test_tally_breaks_down_missing() {
        let mut tally = Tally::default();
        tally.record(Category::Missing, "music/a.FLAC");
        tally.record(Category::Missing, "music/b.flac");
        tally.record(Category::Missing, "docs/README");
        tally.record(Category::Found, "tv/x.mkv");
        assert_eq!(tally.total(), 4);
        assert_eq!(tally.count(Category::Missing), 3);
        assert_eq!(tally.missing_by_top_level.get("music"), Some(&2));
        assert_eq!(tally.missing_by_extension.get("flac"), Some(&2));
        assert_eq!(tally.missing_by_extension.get("(none)"), Some(&1));
        assert!(!tally.missing_by_top_level.contains_key("tv"));
    }

    #[test]
    fn test_local_probe_strict_mode() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("tv/Show")).unwrap();
        fs::write(tmp.path().join("tv/Show/e1.mkv"), b"x").unwrap();

        let loose = LocalFsProbe::new(tmp.path(), false);
        let strict = LocalFsProbe::new(tmp.path(), true);
        assert!(loose.exists("tv/Show"));
        assert!(!strict.exists("tv/Show"));
        assert!(strict.exists("tv/Show/e1.mkv"));
        assert!(!loose.exists("tv/Show/e2.mkv"));
    }
}
