// Dataset records for uploaded delimited files
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::dialect::{read_records, Dialect, LineTerminator, Sniffer};
use crate::error::{DatasetError, LionelError, Result};

/// Upper bound on the bytes `first_lines` reads, however long the lines are
pub const MAX_SAMPLE_BYTES: usize = 1024 * 1024;

/// Identity of whoever uploaded a dataset or authored a procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub username: String,
    pub email: String,
}

impl Owner {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
        }
    }
}

/// A named tag marking a semantically significant field, e.g. "date"
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub col_type: String,
    pub comment: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, col_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            col_type: col_type.into(),
            comment: None,
        }
    }
}

/// One uploaded delimited file and its format metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: Uuid,
    pub path: PathBuf,
    pub upload_date: DateTime<Utc>,
    pub owner: Owner,
    pub delimiter: char,
    pub terminator: LineTerminator,
    pub has_header: bool,
    /// Target database table, empty until the collaborator assigns one
    pub table: String,
    columns: Vec<String>,
    special_columns: Vec<Column>,
}

impl Dataset {
    pub fn new(path: impl Into<PathBuf>, owner: Owner) -> Self {
        Self {
            id: Uuid::new_v4(),
            path: path.into(),
            upload_date: Utc::now(),
            owner,
            delimiter: ',',
            terminator: LineTerminator::Lf,
            has_header: true,
            table: String::new(),
            columns: Vec::new(),
            special_columns: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_upload_date(mut self, upload_date: DateTime<Utc>) -> Self {
        self.upload_date = upload_date;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_columns(columns);
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn set_columns<I, S>(&mut self, columns: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
    }

    /// Serialized column list, the form the record store keeps
    pub fn column_document(&self) -> String {
        serde_json::to_string(&self.columns).unwrap_or_else(|_| "[]".to_string())
    }

    /// Restore the column list from its stored JSON form. An empty document means no columns.
    pub fn set_column_document(&mut self, document: &str) -> Result<()> {
        if document.trim().is_empty() {
            self.columns.clear();
            return Ok(());
        }
        self.columns = serde_json::from_str(document).map_err(|e| DatasetError::MalformedColumns {
            dataset_id: self.id.to_string(),
            error: e.to_string(),
        })?;
        Ok(())
    }

    pub fn special_columns(&self) -> &[Column] {
        &self.special_columns
    }

    /// Attach a tag; attaching the same tag twice is a no-op
    pub fn tag_column(&mut self, column: Column) {
        if !self.special_columns.iter().any(|c| c.name == column.name) {
            self.special_columns.push(column);
        }
    }

    pub fn untag_column(&mut self, name: &str) -> bool {
        let before = self.special_columns.len();
        self.special_columns.retain(|c| c.name != name);
        before != self.special_columns.len()
    }

    /// Base name of the stored file
    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn dialect(&self) -> Dialect {
        Dialect {
            delimiter: self.delimiter,
            terminator: self.terminator,
            has_header: self.has_header,
        }
    }

    pub fn apply_dialect(&mut self, dialect: Dialect) {
        self.delimiter = dialect.delimiter;
        self.terminator = dialect.terminator;
        self.has_header = dialect.has_header;
    }

    /// Read at most `num` raw lines, terminators included.
    ///
    /// Lines end at `\n`, `\r\n` or `\r`. A short file yields what it has,
    /// and reading stops after [`MAX_SAMPLE_BYTES`] so the last line may be
    /// cut short.
    pub fn first_lines(&self, num: usize) -> Result<Vec<String>> {
        let file = File::open(&self.path).map_err(|e| self.unreadable(e))?;
        let mut reader = BufReader::new(file);
        let mut lines = Vec::with_capacity(num);
        let mut budget = MAX_SAMPLE_BYTES;

        while lines.len() < num && budget > 0 {
            let mut buf = Vec::new();
            read_line(&mut reader, &mut buf, budget).map_err(|e| self.unreadable(e))?;
            if buf.is_empty() {
                break;
            }
            budget -= buf.len();
            lines.push(String::from_utf8_lossy(&buf).into_owned());
        }

        Ok(lines)
    }

    /// Parse up to `num` records with the stored dialect, header row included.
    /// Quoted fields may span lines. Reads at most [`MAX_SAMPLE_BYTES`].
    pub fn first_records(&self, num: usize) -> Result<Vec<Vec<String>>> {
        let file = File::open(&self.path).map_err(|e| self.unreadable(e))?;
        let mut reader = self.dialect().reader(file.take(MAX_SAMPLE_BYTES as u64))?;
        read_records(&mut reader, num).map_err(|e| {
            DatasetError::Unreadable {
                dataset_id: self.id.to_string(),
                path: self.path.clone(),
                error: e.to_string(),
            }
            .into()
        })
    }

    /// Sniff the dialect from the first `sample_lines` lines without mutating the record
    pub fn infer_format(&self, sniffer: &Sniffer, sample_lines: usize) -> Result<Dialect> {
        let _span = crate::logging::utils::sniff_span(&self.display_name(), sample_lines).entered();
        let sample = self.first_lines(sample_lines)?;
        sniffer.sniff(&self.display_name(), &sample)
    }

    fn unreadable(&self, error: std::io::Error) -> LionelError {
        DatasetError::Unreadable {
            dataset_id: self.id.to_string(),
            path: self.path.clone(),
            error: error.to_string(),
        }
        .into()
    }
}

/// Append one line to `line`, ending at `\n`, `\r\n` or `\r` (kept) or
/// after `limit` bytes
fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>, limit: usize) -> io::Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        if line.last() == Some(&b'\r') {
            if available[0] == b'\n' && line.len() < limit {
                line.push(b'\n');
                reader.consume(1);
            }
            return Ok(());
        }

        let room = limit - line.len();
        let window = &available[..available.len().min(room)];
        match window.iter().position(|b| *b == b'\n' || *b == b'\r') {
            Some(i) => {
                let ended_by_lf = window[i] == b'\n';
                line.extend_from_slice(&window[..=i]);
                reader.consume(i + 1);
                if ended_by_lf || line.len() >= limit {
                    return Ok(());
                }
            }
            None => {
                let taken = window.len();
                line.extend_from_slice(window);
                reader.consume(taken);
                if line.len() >= limit {
                    return Ok(());
                }
            }
        }
    }
}

/// Upload location for a dataset: `uploads/<feed>/<YYYY-MM-DD>/<filename>`
pub fn feed_upload_path(feed: &str, date: NaiveDate, filename: &str) -> PathBuf {
    Path::new("uploads")
        .join(feed)
        .join(date.format("%Y-%m-%d").to_string())
        .join(filename)
}

/// Upload location for a procedure script: `procedures/<language>/<filename>`
pub fn procedure_upload_path(language: &str, filename: &str) -> PathBuf {
    Path::new("procedures").join(language).join(filename)
}
