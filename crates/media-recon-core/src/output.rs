use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Newline-delimited text output that is created (truncated) up front, so a
/// run that finds nothing still leaves an empty file behind.
pub struct LineWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: u64,
}

impl LineWriter {
    pub fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    /// `a<TAB>b`, for error logs.
    pub fn write_pair(&mut self, first: &str, second: &str) -> io::Result<()> {
        let flattened = second.replace(['\n', '\r', '\t'], " ");
        self.writer.write_all(first.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.write_line(&flattened)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        Ok(self.path)
    }
}

/// Write all `lines` to `path`, replacing any previous content.
pub fn write_lines<'a, I>(path: &Path, lines: I) -> io::Result<u64>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut writer = LineWriter::create(path)?;
    for line in lines {
        writer.write_line(line)?;
    }
    let count = writer.lines();
    writer.finish()?;
    Ok(count)
}

/// File name without its final extension: `filelist.disk8.txt` gives `filelist.disk8`.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

/// `<out_dir>/<stem>.<suffix>.txt`
pub fn sibling_output(out_dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    out_dir.join(format!("{}.{}.txt", stem, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_writer_creates_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/out.txt");
        let writer = LineWriter::create(&path).unwrap();
        writer.finish().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_write_pair_flattens_error_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("errors.txt");
        let mut writer = LineWriter::create(&path).unwrap();
        writer.write_pair("tv/a.mkv", "disk\nfull").unwrap();
        writer.finish().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "tv/a.mkv\tdisk full\n");
    }

    #[test]
    fn test_file_stem_and_sibling() {
        assert_eq!(file_stem(Path::new("/x/filelist.disk8.txt")), "filelist.disk8");
        assert_eq!(
            sibling_output(Path::new("out"), "filelist", "found"),
            PathBuf::from("out/filelist.found.txt")
        );
    }
}
