//! One append-only CSV stream.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::entry::JournalRow;
use crate::error::JournalError;

/// Append-only stream backed by a CSV file.
///
/// Every row is written and `fsync`ed before [`EventStream::append`]
/// returns. The rows of this session are also kept in memory for the final
/// rewrite, together with rows that were already in the file when it was
/// opened.
#[derive(Debug)]
pub struct EventStream<R: JournalRow> {
    path: PathBuf,
    file: File,
    carried: Vec<R>,
    rows: Vec<R>,
}

impl<R: JournalRow> EventStream<R> {
    /// Open (or create) the stream at `path`.
    ///
    /// Existing data rows are carried over; a header is written if the file
    /// is empty. A torn final line is terminated so the next row starts on a
    /// line of its own.
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        let carried = if path.exists() {
            read_rows::<R>(path)?
        } else {
            Vec::new()
        };

        let append_failed = |source| JournalError::AppendFailed {
            path: path.to_path_buf(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(append_failed)?;

        let is_empty = file.metadata().map_err(append_failed)?.len() == 0;
        if is_empty {
            let line = encode_record(path, R::HEADER.iter().copied())?;
            file.write_all(&line).map_err(append_failed)?;
            file.sync_data().map_err(append_failed)?;
        } else if !ends_with_newline(path).map_err(append_failed)? {
            tracing::warn!(path = %path.display(), "Terminating torn final line");
            file.write_all(b"\n").map_err(append_failed)?;
            file.sync_data().map_err(append_failed)?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            carried,
            rows: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rows appended during this session.
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Rows that were in the file before this session.
    pub fn carried(&self) -> &[R] {
        &self.carried
    }

    /// Durably append one row.
    pub fn append(&mut self, row: R) -> Result<(), JournalError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer
            .serialize(&row)
            .map_err(|e| JournalError::csv(&self.path, &e))?;
        let line = writer.into_inner().map_err(|e| JournalError::Csv {
            path: self.path.clone(),
            message: e.to_string(),
        })?;

        let append_failed = |source| JournalError::AppendFailed {
            path: self.path.clone(),
            source,
        };
        self.file.write_all(&line).map_err(append_failed)?;
        self.file.sync_data().map_err(append_failed)?;
        self.rows.push(row);
        Ok(())
    }

    /// Replace the file with `preamble` lines, the header, and every row.
    ///
    /// Written to a sibling temp file and renamed into place.
    pub fn rewrite(&self, preamble: &[String]) -> Result<(), JournalError> {
        let finalize_failed = |source| JournalError::FinalizeFailed {
            path: self.path.clone(),
            source,
        };
        let tmp = self.path.with_extension("csv.tmp");
        let file = File::create(&tmp).map_err(finalize_failed)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        for line in preamble {
            writer
                .write_record([line.as_str()])
                .map_err(|e| JournalError::csv(&self.path, &e))?;
        }
        writer
            .write_record(R::HEADER)
            .map_err(|e| JournalError::csv(&self.path, &e))?;
        for row in self.carried.iter().chain(self.rows.iter()) {
            writer
                .serialize(row)
                .map_err(|e| JournalError::csv(&self.path, &e))?;
        }

        let file = writer.into_inner().map_err(|e| JournalError::Csv {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        file.sync_all().map_err(finalize_failed)?;
        drop(file);

        fs::rename(&tmp, &self.path).map_err(finalize_failed)?;
        Ok(())
    }
}

fn ends_with_newline(path: &Path) -> io::Result<bool> {
    let mut file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

fn encode_record<'a>(
    path: &Path,
    fields: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<u8>, JournalError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(fields)
        .map_err(|e| JournalError::csv(path, &e))?;
    writer.into_inner().map_err(|e| JournalError::Csv {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Data rows after the header of an existing stream file.
///
/// Summary lines before the header are dropped. Undecodable records (for
/// example a torn final line) are skipped with a warning.
pub(crate) fn read_rows<R: JournalRow>(path: &Path) -> Result<Vec<R>, JournalError> {
    let records = read_records(path)?;
    let start = header_index(&records).map(|i| i + 1).unwrap_or(0);
    Ok(records[start..]
        .iter()
        .filter(|r| !is_header(r))
        .map(R::from_record)
        .collect())
}

pub(crate) fn read_records(path: &Path) -> Result<Vec<csv::StringRecord>, JournalError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| JournalError::csv(path, &e))?;

    let mut records = Vec::new();
    for (index, record) in reader.records().enumerate() {
        match record {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                path = %path.display(),
                row = index + 1,
                error = %e,
                "Skipping undecodable journal row"
            ),
        }
    }
    Ok(records)
}

pub(crate) fn header_index(records: &[csv::StringRecord]) -> Option<usize> {
    records.iter().position(is_header)
}

fn is_header(record: &csv::StringRecord) -> bool {
    record.iter().any(|field| field == "trial_num")
}
