//! Line-oriented JSON record store
//!
//! Records are stored one JSON object per line, optionally compressed. Input
//! files may be plain, `.gz`, `.bz2`, or a `.tar.gz` / `.tar.bz2` archive whose
//! members are JSON-lines files; output files are bzip2 when their name ends
//! in `.bz2` and plain otherwise.

use crate::error::Result;
use bzip2::read::MultiBzDecoder;
use bzip2::write::BzEncoder;
use flate2::read::MultiGzDecoder;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tar::Archive;

/// Compression of a record file, detected from its name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Bzip2,
    TarGzip,
    TarBzip2,
}

impl Compression {
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_lowercase();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Self::TarGzip
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Self::TarBzip2
        } else if name.ends_with(".gz") {
            Self::Gzip
        } else if name.ends_with(".bz2") {
            Self::Bzip2
        } else {
            Self::None
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_archive(self) -> bool {
        matches!(self, Self::TarGzip | Self::TarBzip2)
    }
}

/// Decompressed byte stream of a file; archives are returned undecoded.
fn open_stream(path: &Path, compression: Compression) -> Result<Box<dyn Read>> {
    let file = BufReader::new(File::open(path)?);
    Ok(match compression {
        Compression::None => Box::new(file),
        Compression::Gzip | Compression::TarGzip => Box::new(MultiGzDecoder::new(file)),
        Compression::Bzip2 | Compression::TarBzip2 => Box::new(MultiBzDecoder::new(file)),
    })
}

/// Feed every line of a record file to `visit`, in order, until it breaks.
///
/// Archive members are visited in archive order; directories and other
/// non-file entries are skipped. Lines are passed without their terminator.
///
/// # Errors
///
/// I/O and decompression errors, including invalid UTF-8.
pub fn visit_lines<F>(path: &Path, mut visit: F) -> Result<()>
where
    F: FnMut(&str) -> ControlFlow<()>,
{
    let compression = Compression::from_path(path);
    let stream = open_stream(path, compression)?;

    if !compression.is_archive() {
        visit_reader(BufReader::new(stream), &mut visit)?;
        return Ok(());
    }

    let mut archive = Archive::new(stream);
    for entry in archive.entries()? {
        let entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        debug!("reading archive member {}", entry.path()?.display());
        if visit_reader(BufReader::new(entry), &mut visit)?.is_break() {
            break;
        }
    }
    Ok(())
}

fn visit_reader<R, F>(mut reader: R, visit: &mut F) -> Result<ControlFlow<()>>
where
    R: BufRead,
    F: FnMut(&str) -> ControlFlow<()>,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(ControlFlow::Continue(()));
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        if visit(trimmed).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }
}

/// Number of non-blank lines of a record file.
///
/// # Errors
///
/// See [`visit_lines`].
pub fn count_lines(path: &Path) -> Result<usize> {
    let mut count = 0;
    visit_lines(path, |line| {
        if !line.trim().is_empty() {
            count += 1;
        }
        ControlFlow::Continue(())
    })?;
    Ok(count)
}

/// Parse up to `limit` records; lines that are not JSON are skipped.
///
/// # Errors
///
/// See [`visit_lines`].
pub fn read_records(path: &Path, limit: Option<usize>) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    if limit == Some(0) {
        return Ok(records);
    }
    visit_lines(path, |line| {
        match serde_json::from_str(line) {
            Ok(value) => records.push(value),
            Err(e) => debug!("skipping unparsable line: {e}"),
        }
        if limit.is_some_and(|limit| records.len() >= limit) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    Ok(records)
}

enum Sink {
    Plain(BufWriter<File>),
    Bzip2(BzEncoder<BufWriter<File>>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Bzip2(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Bzip2(w) => w.flush(),
        }
    }
}

/// JSON-lines writer, bzip2 compressed when the path ends in `.bz2`
pub struct JsonlWriter {
    sink: Sink,
    path: PathBuf,
    count: usize,
    flush_each: bool,
}

impl JsonlWriter {
    /// Create (truncate) `path`.
    ///
    /// # Errors
    ///
    /// The file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = BufWriter::new(File::create(&path)?);
        let sink = if Compression::from_path(&path) == Compression::Bzip2 {
            Sink::Bzip2(BzEncoder::new(file, bzip2::Compression::default()))
        } else {
            Sink::Plain(file)
        };
        Ok(Self {
            sink,
            path,
            count: 0,
            flush_each: false,
        })
    }

    /// Flush after every record so a crash keeps everything written so far.
    #[must_use]
    pub fn flush_per_record(mut self) -> Self {
        self.flush_each = true;
        self
    }

    /// Append one serialized record.
    ///
    /// # Errors
    ///
    /// Serialization or write failure.
    pub fn write<T: Serialize + ?Sized>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.sink, record)?;
        self.end_record()
    }

    /// Append a line that already holds one JSON record, verbatim.
    ///
    /// # Errors
    ///
    /// Write failure.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        self.sink.write_all(line.as_bytes())?;
        self.end_record()
    }

    fn end_record(&mut self) -> Result<()> {
        self.sink.write_all(b"\n")?;
        if self.flush_each {
            self.sink.flush()?;
        }
        self.count += 1;
        Ok(())
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Terminate the compressed stream and flush; returns the record count.
    ///
    /// # Errors
    ///
    /// Write failure.
    pub fn finish(self) -> Result<usize> {
        match self.sink {
            Sink::Plain(mut w) => w.flush()?,
            Sink::Bzip2(w) => w.finish()?.flush()?,
        }
        Ok(self.count)
    }
}

/// `<dir>.jsonl.bz2`, the merged error stream of a per-chunk error directory
#[must_use]
pub fn merged_error_path(dir: &Path) -> PathBuf {
    let mut name = dir.as_os_str().to_owned();
    name.push(".jsonl.bz2");
    PathBuf::from(name)
}

/// Concatenate every per-chunk error stream of `dir` into
/// [`merged_error_path`], then delete `dir`.
///
/// Files are merged in name order; completion order of the chunks does not
/// matter. A missing directory merges to zero records and writes nothing.
///
/// # Errors
///
/// I/O errors reading the chunk files or writing the merged file.
pub fn merge_error_streams(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut parts: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .collect();
    parts.sort();

    let mut writer = JsonlWriter::create(merged_error_path(dir))?;
    for part in &parts {
        let mut failure = None;
        let read = visit_lines(part, |line| {
            if line.trim().is_empty() {
                return ControlFlow::Continue(());
            }
            match writer.write_line(line) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            }
        });
        // A chunk killed mid-write leaves a truncated stream; its complete lines are kept
        if let Err(e) = read {
            warn!("error stream {} is damaged: {e}", part.display());
        }
        if let Some(e) = failure {
            return Err(e);
        }
    }
    let merged = writer.finish()?;

    fs::remove_dir_all(dir)?;
    Ok(merged)
}

/// Number of persisted samples in `dir`: `N.png` files with a matching
/// `N.json`. A missing directory holds zero samples.
///
/// # Errors
///
/// The directory exists but cannot be listed.
pub fn count_samples(dir: &Path) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let mut count = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "png") && path.with_extension("json").is_file() {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_records(path: &Path, lines: &[&str]) {
        let mut writer = JsonlWriter::create(path).unwrap();
        for line in lines {
            writer.write_line(line).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_compression_from_name() {
        let cases = [
            ("en.jsonl", Compression::None),
            ("en.jsonl.bz2", Compression::Bzip2),
            ("en.json.gz", Compression::Gzip),
            ("enwiki-NS0-20220301-ENTERPRISE-HTML.json.tar.gz", Compression::TarGzip),
            ("dump.TAR.BZ2", Compression::TarBzip2),
        ];
        for (name, expected) in cases {
            assert_eq!(Compression::from_path(Path::new(name)), expected, "{name}");
        }
    }

    #[test]
    fn test_bz2_writer_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl.bz2");
        let mut writer = JsonlWriter::create(&path).unwrap().flush_per_record();
        writer.write(&json!({"index": 0})).unwrap();
        writer.write(&json!({"index": 1})).unwrap();
        assert_eq!(writer.finish().unwrap(), 2);

        assert_eq!(count_lines(&path).unwrap(), 2);
        let records = read_records(&path, None).unwrap();
        assert_eq!(records[1]["index"], 1);
    }

    #[test]
    fn test_read_records_limit_and_bad_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        write_records(&path, &["{\"a\":1}", "not json", "{\"a\":2}", "{\"a\":3}"]);

        let records = read_records(&path, Some(2)).unwrap();
        assert_eq!(records, vec![json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(count_lines(&path).unwrap(), 4);
    }

    #[test]
    fn test_visit_lines_reads_tar_members() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dump.json.tar.bz2");

        let encoder = BzEncoder::new(File::create(&path).unwrap(), bzip2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, body) in [("a.ndjson", "1\n2\n"), ("b.ndjson", "3\n")] {
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, body.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();

        let mut lines = Vec::new();
        visit_lines(&path, |line| {
            lines.push(line.to_string());
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(lines, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_visit_lines_stops_early() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.jsonl");
        write_records(&path, &["1", "2", "3"]);

        let mut seen = 0;
        visit_lines(&path, |_| {
            seen += 1;
            if seen == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_merge_error_streams() {
        let dir = TempDir::new().unwrap();
        let errors = dir.path().join("errors");
        fs::create_dir(&errors).unwrap();
        write_records(&errors.join("10_20.jsonl.bz2"), &["{\"index\":2}"]);
        write_records(&errors.join("0_10.jsonl.bz2"), &["{\"index\":0}", "{\"index\":1}"]);
        write_records(&errors.join("20_30.jsonl.bz2"), &[]);

        assert_eq!(merge_error_streams(&errors).unwrap(), 3);
        assert!(!errors.exists());

        let merged = read_records(&merged_error_path(&errors), None).unwrap();
        let indices: Vec<_> = merged.iter().map(|r| r["index"].as_u64().unwrap()).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_merge_missing_dir_is_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(merge_error_streams(&dir.path().join("errors")).unwrap(), 0);
    }

    #[test]
    fn test_count_samples_requires_pairs() {
        let dir = TempDir::new().unwrap();
        for name in ["1.png", "1.json", "2.png", "3.json", "4.png", "4.json"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        assert_eq!(count_samples(dir.path()).unwrap(), 2);
        assert_eq!(count_samples(&dir.path().join("missing")).unwrap(), 0);
    }
}
