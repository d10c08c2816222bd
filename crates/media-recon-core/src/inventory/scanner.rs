use crate::error::Error;
use crate::paths::FolderFilter;
use crate::progress::ProgressReporter;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

const COUNT_CHUNK: usize = 8 * 1024 * 1024;

/// Line count in binary mode, so the counting pass never trips on encoding.
/// A final line without a trailing newline is counted.
pub fn count_lines_binary(path: &Path) -> io::Result<u64> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; COUNT_CHUNK];
    let mut total = 0u64;
    let mut last = None;
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += buf[..n].iter().filter(|b| **b == b'\n').count() as u64;
        last = Some(buf[n - 1]);
    }
    if matches!(last, Some(b) if b != b'\n') {
        total += 1;
    }
    Ok(total)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LineStats {
    pub lines_read: u64,
    pub blank: u64,
    pub filtered: u64,
    /// Non-blank lines that passed the folder filter.
    pub considered: u64,
}

/// Streams a newline-delimited list of relative paths.
///
/// Input must be valid UTF-8; a malformed line aborts the scan with an error
/// naming the line number.
pub struct FileListScanner {
    path: PathBuf,
    filter: FolderFilter,
    progress_every: u64,
}

impl FileListScanner {
    pub fn new(path: impl Into<PathBuf>, filter: FolderFilter) -> Self {
        Self {
            path: path.into(),
            filter,
            progress_every: 50_000,
        }
    }

    pub fn with_progress_every(mut self, lines: u64) -> Self {
        self.progress_every = lines.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn filter(&self) -> &FolderFilter {
        &self.filter
    }

    /// Call `visit` with each trimmed, non-blank, filter-matching line.
    pub fn for_each_path<F>(&self, label: &str, reporter: &dyn ProgressReporter, mut visit: F) -> Result<LineStats, Error>
    where
        F: FnMut(&str) -> Result<(), Error>,
    {
        if !self.path.is_file() {
            return Err(Error::invalid_input(format!(
                "input file not found: {}",
                self.path.display()
            )));
        }

        let started = Instant::now();
        let total_lines = count_lines_binary(&self.path)?;
        reporter.on_lines_start(label, total_lines);

        let mut reader = BufReader::new(File::open(&self.path)?);
        let mut line = String::new();
        let mut stats = LineStats::default();

        loop {
            line.clear();
            let n = reader.read_line(&mut line).map_err(|e| {
                if e.kind() == io::ErrorKind::InvalidData {
                    Error::invalid_input(format!(
                        "{}: line {} is not valid UTF-8",
                        self.path.display(),
                        stats.lines_read + 1
                    ))
                } else {
                    Error::Io(e)
                }
            })?;
            if n == 0 {
                break;
            }
            stats.lines_read += 1;

            let path = line.trim();
            if path.is_empty() {
                stats.blank += 1;
            } else if !self.filter.matches(path) {
                stats.filtered += 1;
            } else {
                stats.considered += 1;
                visit(path)?;
            }

            if stats.lines_read % self.progress_every == 0 {
                reporter.on_lines_progress(stats.lines_read, total_lines);
            }
        }

        reporter.on_lines_progress(stats.lines_read, total_lines);
        reporter.on_lines_complete(stats.lines_read, started.elapsed().as_secs_f64());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentReporter;
    use std::fs;

    #[test]
    fn test_count_lines_binary() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("list.txt");
        fs::write(&p, "a\nb\nc").unwrap();
        assert_eq!(count_lines_binary(&p).unwrap(), 3);
        fs::write(&p, "a\nb\n").unwrap();
        assert_eq!(count_lines_binary(&p).unwrap(), 2);
        fs::write(&p, "").unwrap();
        assert_eq!(count_lines_binary(&p).unwrap(), 0);
        fs::write(&p, [0xffu8, 0xfe, b'\n']).unwrap();
        assert_eq!(count_lines_binary(&p).unwrap(), 1);
    }

    #[test]
    fn test_streams_with_filter_and_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("list.txt");
        fs::write(&p, "tv/A/a.mkv\n\n   \nmovies/B/b.mkv\ntv/C/c.mkv  \ntvx/D/d.mkv").unwrap();

        let scanner = FileListScanner::new(&p, FolderFilter::new(Some("tv")).unwrap());
        let mut seen = Vec::new();
        let stats = scanner
            .for_each_path("Scanning", &SilentReporter, |path| {
                seen.push(path.to_string());
                Ok(())
            })
            .unwrap();

        assert_eq!(seen, vec!["tv/A/a.mkv", "tv/C/c.mkv"]);
        assert_eq!(stats.lines_read, 6);
        assert_eq!(stats.blank, 2);
        assert_eq!(stats.filtered, 2);
        assert_eq!(stats.considered, 2);
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("list.txt");
        let mut bytes = b"tv/ok.mkv\n".to_vec();
        bytes.extend_from_slice(&[b't', b'v', b'/', 0xff, 0xfe, b'\n']);
        fs::write(&p, bytes).unwrap();

        let scanner = FileListScanner::new(&p, FolderFilter::any());
        let mut visited = 0;
        let err = scanner
            .for_each_path("Scanning", &SilentReporter, |_| {
                visited += 1;
                Ok(())
            })
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(visited, 1);
    }

    #[test]
    fn test_missing_input_is_configuration_error() {
        let scanner = FileListScanner::new("/definitely/not/here.txt", FolderFilter::any());
        let err = scanner
            .for_each_path("Scanning", &SilentReporter, |_| Ok(()))
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
