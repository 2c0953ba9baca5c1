use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::error::BuildError;

/// Raw stimulus rows exactly as read, before any schema is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StimulusTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl StimulusTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| BuildError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_csv_reader(file)
    }

    /// Reads a CSV with a header row. Cells that are not valid UTF-8 are
    /// decoded lossily instead of failing the whole table.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, BuildError> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let mut lossy = 0usize;
        let mut decode = |bytes: &[u8]| match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                lossy += 1;
                String::from_utf8_lossy(bytes).into_owned()
            }
        };

        let headers: Vec<String> = csv
            .byte_headers()?
            .iter()
            .map(|h| decode(h).trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in csv.byte_records() {
            let record = record?;
            rows.push(record.iter().map(&mut decode).collect());
        }

        if lossy > 0 {
            warn!(cells = lossy, "stimulus table is not valid UTF-8; decoded lossily");
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, cells)| Row { index, cells })
    }
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    index: usize,
    cells: &'a [String],
}

impl<'a> Row<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Trimmed cell, or `None` when absent, blank or a spreadsheet `nan`.
    pub fn cell(&self, column: usize) -> Option<&'a str> {
        let value = self.cells.get(column)?.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("nan") {
            None
        } else {
            Some(value)
        }
    }

    pub fn raw(&self, column: usize) -> &'a str {
        self.cells.get(column).map_or("", |c| c.trim())
    }
}
