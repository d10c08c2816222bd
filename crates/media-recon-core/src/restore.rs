//! Copy BACKUP-classified paths back from the archive mount, and verify that
//! the archive actually holds them.

use crate::error::Error;
use crate::inventory::scanner::{FileListScanner, LineStats};
use crate::inventory::{LocalFsProbe, PathProbe};
use crate::outcome::{Outcome, OutcomeCounts};
use crate::output::{file_stem, sibling_output, LineWriter};
use crate::paths::safe_join;
use crate::progress::ProgressReporter;
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn require_dir(path: &Path, what: &str) -> Result<(), Error> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Error::invalid_input(format!(
            "{} is not an existing directory: {}",
            what,
            path.display()
        )))
    }
}

#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub lines: LineStats,
    pub counts: OutcomeCounts,
    pub bytes_copied: u64,
    pub ok_log: PathBuf,
    pub skipped_log: PathBuf,
    pub errors_log: PathBuf,
}

/// Non-destructive restore: never overwrites, so a re-run after an
/// interruption only copies what is still absent.
pub struct RestoreExecutor {
    archive_root: PathBuf,
    restore_root: PathBuf,
}

impl RestoreExecutor {
    pub fn new(archive_root: impl Into<PathBuf>, restore_root: impl Into<PathBuf>) -> Result<Self, Error> {
        let archive_root = archive_root.into();
        let restore_root = restore_root.into();
        require_dir(&archive_root, "archive root")?;
        if restore_root.as_os_str().is_empty() {
            return Err(Error::invalid_input("restore root must not be empty"));
        }
        Ok(Self {
            archive_root,
            restore_root,
        })
    }

    pub fn archive_root(&self) -> &Path {
        &self.archive_root
    }

    pub fn restore_root(&self) -> &Path {
        &self.restore_root
    }

    /// Restore one relative path. Never returns `Err`: escapes, missing
    /// sources and copy failures all come back as [`Outcome::Failed`].
    pub fn restore_one(&self, relpath: &str) -> (Outcome, u64) {
        let (source, dest) = match safe_join(&self.archive_root, relpath)
            .and_then(|src| Ok((src, safe_join(&self.restore_root, relpath)?)))
        {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Rejected {}: {}", relpath, e);
                return (Outcome::Failed(e.to_string()), 0);
            }
        };

        if fs::symlink_metadata(&dest).is_ok() {
            debug!("Skip existing {}", dest.display());
            return (Outcome::Skipped("destination exists".to_string()), 0);
        }
        if !source.is_file() {
            return (
                Outcome::Failed(format!("not in archive: {}", source.display())),
                0,
            );
        }

        let copied = dest
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| copy_preserving_times(&source, &dest));
        match copied {
            Ok(bytes) => (Outcome::Succeeded, bytes),
            Err(e) => {
                warn!("Restore of {} failed: {}", relpath, e);
                (Outcome::Failed(e.to_string()), 0)
            }
        }
    }

    /// Restore every path in `input`, writing `<stem>.restore_ok.txt`,
    /// `<stem>.restore_skipped.txt` and `<stem>.restore_errors.txt`.
    pub fn run(
        &self,
        scanner: &FileListScanner,
        out_dir: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<RestoreReport, Error> {
        fs::create_dir_all(&self.restore_root)?;
        let stem = file_stem(scanner.path());
        let mut ok = LineWriter::create(sibling_output(out_dir, &stem, "restore_ok"))?;
        let mut skipped = LineWriter::create(sibling_output(out_dir, &stem, "restore_skipped"))?;
        let mut errors = LineWriter::create(sibling_output(out_dir, &stem, "restore_errors"))?;
        let mut counts = OutcomeCounts::default();
        let mut bytes_copied = 0u64;

        info!(
            "Restoring from {} into {}",
            self.archive_root.display(),
            self.restore_root.display()
        );
        let lines = scanner.for_each_path("Restoring", reporter, |relpath| {
            let (outcome, bytes) = self.restore_one(relpath);
            counts.record(&outcome);
            bytes_copied += bytes;
            match &outcome {
                Outcome::Succeeded => ok.write_line(relpath)?,
                Outcome::Skipped(_) => skipped.write_line(relpath)?,
                Outcome::Failed(err) => errors.write_pair(relpath, err)?,
            }
            Ok(())
        })?;

        info!(
            "Restore finished: {} ok, {} skipped, {} errors, {} bytes copied",
            counts.succeeded, counts.skipped, counts.failed, bytes_copied
        );
        Ok(RestoreReport {
            lines,
            counts,
            bytes_copied,
            ok_log: ok.finish()?,
            skipped_log: skipped.finish()?,
            errors_log: errors.finish()?,
        })
    }
}

/// Copy into a hidden sibling first and rename into place, so an interrupted
/// copy never leaves a truncated file that a re-run would skip.
fn copy_preserving_times(source: &Path, dest: &Path) -> io::Result<u64> {
    let meta = fs::metadata(source)?;
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let partial = dest.with_file_name(format!(".{}.partial", name));

    let result = fs::copy(source, &partial).and_then(|bytes| {
        filetime::set_file_times(
            &partial,
            FileTime::from_last_access_time(&meta),
            FileTime::from_last_modification_time(&meta),
        )?;
        fs::rename(&partial, dest)?;
        Ok(bytes)
    });
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

#[derive(Debug, Clone)]
pub struct VerifyReport {
    pub lines: LineStats,
    pub confirmed: u64,
    pub missing: u64,
    pub confirmed_log: PathBuf,
    pub missing_log: PathBuf,
}

/// Checks that each BACKUP path is present on the archive mount.
pub struct BackupVerifier {
    archive: LocalFsProbe,
}

impl BackupVerifier {
    pub fn new(archive_root: impl Into<PathBuf>, strict_files: bool) -> Result<Self, Error> {
        let archive_root = archive_root.into();
        require_dir(&archive_root, "archive root")?;
        Ok(Self {
            archive: LocalFsProbe::new(archive_root, strict_files),
        })
    }

    pub fn run(
        &self,
        scanner: &FileListScanner,
        out_dir: &Path,
        reporter: &dyn ProgressReporter,
    ) -> Result<VerifyReport, Error> {
        let stem = file_stem(scanner.path());
        let mut confirmed = LineWriter::create(sibling_output(out_dir, &stem, "backup_confirmed"))?;
        let mut missing = LineWriter::create(sibling_output(out_dir, &stem, "backup_missing"))?;

        let lines = scanner.for_each_path("Verifying", reporter, |relpath| {
            if self.archive.exists(relpath) {
                confirmed.write_line(relpath)?;
            } else {
                missing.write_line(relpath)?;
            }
            Ok(())
        })?;

        let (found, absent) = (confirmed.lines(), missing.lines());
        info!(
            "Archive {}: {} confirmed, {} missing",
            self.archive.base().display(),
            found,
            absent
        );
        Ok(VerifyReport {
            lines,
            confirmed: found,
            missing: absent,
            confirmed_log: confirmed.finish()?,
            missing_log: missing.finish()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    fn archive_with(files: &[(&str, &str)]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (rel, body) in files {
            let p = dir.path().join(rel);
            fs::create_dir_all(p.parent().unwrap()).unwrap();
            fs::write(p, body).unwrap();
        }
        dir
    }

    #[test]
    fn test_restore_one_copies_and_keeps_mtime() {
        let archive = archive_with(&[("tv/Show/e1.mkv", "video")]);
        let old = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(86_400 * 30));
        filetime::set_file_mtime(archive.path().join("tv/Show/e1.mkv"), old).unwrap();
        let restore = tempfile::tempdir().unwrap();

        let exec = RestoreExecutor::new(archive.path(), restore.path()).unwrap();
        let (outcome, bytes) = exec.restore_one("tv/Show/e1.mkv");
        assert_eq!(outcome, Outcome::Succeeded);
        assert_eq!(bytes, 5);

        let dest = restore.path().join("tv/Show/e1.mkv");
        assert_eq!(fs::read_to_string(&dest).unwrap(), "video");
        let meta = fs::metadata(&dest).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
        assert!(!restore.path().join("tv/Show/.e1.mkv.partial").exists());
    }

    #[test]
    fn test_existing_destination_is_never_overwritten() {
        let archive = archive_with(&[("tv/a.mkv", "archive copy")]);
        let restore = archive_with(&[("tv/a.mkv", "local copy")]);

        let exec = RestoreExecutor::new(archive.path(), restore.path()).unwrap();
        let (outcome, _) = exec.restore_one("tv/a.mkv");
        assert!(outcome.skip_reason().is_some());
        assert_eq!(
            fs::read_to_string(restore.path().join("tv/a.mkv")).unwrap(),
            "local copy"
        );
    }

    #[test]
    fn test_traversal_is_rejected_before_any_write() {
        let archive = archive_with(&[("tv/a.mkv", "x")]);
        let restore = tempfile::tempdir().unwrap();
        let exec = RestoreExecutor::new(archive.path(), restore.path().join("out")).unwrap();

        let (outcome, _) = exec.restore_one("../../etc/passwd");
        assert!(outcome.error().unwrap().contains("escapes"));
        assert!(!restore.path().join("out").exists());
    }

    #[test]
    fn test_missing_archive_root_is_configuration_error() {
        let restore = tempfile::tempdir().unwrap();
        let err = RestoreExecutor::new("/no/such/archive", restore.path())
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }
}
