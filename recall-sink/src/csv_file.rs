use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use recall_core::{OutputRow, SessionRecord};
use tracing::debug;

use crate::{ResultSink, SinkError};

/// UTF-8 CSV output opened in append mode. The header is written only when
/// the file is new or empty, so restarts keep a single header line.
///
/// Each row is encoded in memory and handed to the writer whole. Nothing is
/// buffered between calls, so a failed append leaves no bytes behind to
/// resurface on the next successful one.
pub struct CsvSink<W: Write = File> {
    path: PathBuf,
    out: W,
}

impl CsvSink<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| SinkError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SinkError::io(&path, e))?;
        let is_empty = file
            .metadata()
            .map_err(|e| SinkError::io(&path, e))?
            .len()
            == 0;
        Self::from_writer(path, file, is_empty)
    }
}

impl<W: Write> CsvSink<W> {
    /// Wraps any writer; `path` only labels errors and logs.
    pub fn from_writer(
        path: impl Into<PathBuf>,
        out: W,
        write_header: bool,
    ) -> Result<Self, SinkError> {
        let mut sink = Self {
            path: path.into(),
            out,
        };
        if write_header {
            let header = encode(|w| w.write_record(OutputRow::HEADER), &sink.path)?;
            sink.put(&header)?;
            debug!(path = %sink.path.display(), "wrote results header");
        }
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), SinkError> {
        self.out
            .write_all(bytes)
            .and_then(|()| self.out.flush())
            .map_err(|e| SinkError::io(&self.path, e))
    }
}

fn encode(
    fill: impl FnOnce(&mut csv::Writer<Vec<u8>>) -> csv::Result<()>,
    path: &Path,
) -> Result<Vec<u8>, SinkError> {
    let mut row = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    fill(&mut row)?;
    row.into_inner()
        .map_err(|e| SinkError::io(path, e.into_error()))
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn append(&mut self, record: &SessionRecord) -> Result<(), SinkError> {
        let row = encode(|w| w.serialize(OutputRow::from(record)), &self.path)?;
        self.put(&row)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.out
            .flush()
            .map_err(|e| SinkError::io(&self.path, e))
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::fixtures::{answer, rating};

    /// Writer that errors while `down` is set, keeping what it accepted.
    struct Flaky {
        down: Arc<AtomicBool>,
        written: Vec<u8>,
    }

    impl Write for Flaky {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.down.load(Ordering::SeqCst) {
                return Err(io::Error::other("disk unplugged"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.down.load(Ordering::SeqCst) {
                return Err(io::Error::other("disk unplugged"));
            }
            Ok(())
        }
    }

    fn read_rows(path: &Path) -> (Vec<String>, Vec<csv::StringRecord>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let header = reader
            .headers()
            .unwrap()
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader.records().map(Result::unwrap).collect();
        (header, rows)
    }

    #[test]
    fn writes_header_once_across_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/results.csv");

        let mut sink = CsvSink::open(&path).unwrap();
        sink.append(&answer(0, 0)).unwrap();
        drop(sink);

        let mut sink = CsvSink::open(&path).unwrap();
        sink.append(&rating(0, Some(70))).unwrap();
        sink.flush().unwrap();

        let (header, rows) = read_rows(&path);
        assert_eq!(header, OutputRow::HEADER.to_vec());
        assert_eq!(rows.len(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("record_type").count(), 1);
    }

    #[test]
    fn quotes_and_unicode_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = CsvSink::open(&path).unwrap();
        sink.append(&answer(3, 2)).unwrap();

        let (_, rows) = read_rows(&path);
        let row = &rows[0];
        assert_eq!(&row[0], "answer");
        assert_eq!(&row[8], "3");
        assert_eq!(&row[10], "2");
        assert_eq!(&row[11], "Which line rises, \"A\" or B?");
        assert_eq!(&row[13], "קו כחול");
        assert_eq!(&row[14], "true");
    }

    #[test]
    fn empty_optional_columns_stay_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut sink = CsvSink::open(&path).unwrap();
        sink.append(&rating(1, None)).unwrap();

        let (_, rows) = read_rows(&path);
        assert_eq!(&rows[0][0], "confidence");
        assert_eq!(&rows[0][10], "");
        assert_eq!(&rows[0][17], "");
    }

    #[test]
    fn failed_append_leaves_nothing_for_the_next_write() {
        let down = Arc::new(AtomicBool::new(false));
        let flaky = Flaky {
            down: Arc::clone(&down),
            written: Vec::new(),
        };
        let mut sink = CsvSink::from_writer("flaky.csv", flaky, true).unwrap();

        down.store(true, Ordering::SeqCst);
        assert!(matches!(
            sink.append(&answer(0, 0)),
            Err(SinkError::Io { .. })
        ));
        down.store(false, Ordering::SeqCst);
        sink.append(&answer(0, 1)).unwrap();

        let mut reader = csv::Reader::from_reader(sink.get_ref().written.as_slice());
        let rows: Vec<_> = reader.records().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][10], "1");
    }
}
