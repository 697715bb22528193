// Dialect inference for uploaded delimited files.
//
// Works on a bounded sample of raw lines (terminators included) and infers
// the delimiter, the line terminator and whether the first row is a header.

use csv::{ByteRecord, ReaderBuilder, Terminator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Read;

use crate::config::{SnifferSettings, DEFAULT_CANDIDATES};
use crate::error::{DialectError, Result};

/// Maximum number of data rows compared against the first row for header detection
const HEADER_SAMPLE_ROWS: usize = 20;

/// Line-ending sequence of a delimited file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LineTerminator {
    #[default]
    #[serde(rename = "\n")]
    Lf,
    #[serde(rename = "\r\n")]
    CrLf,
    #[serde(rename = "\r")]
    Cr,
}

impl LineTerminator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineTerminator::Lf => "\n",
            LineTerminator::CrLf => "\r\n",
            LineTerminator::Cr => "\r",
        }
    }

    fn csv_terminator(&self) -> Terminator {
        match self {
            LineTerminator::Lf => Terminator::Any(b'\n'),
            LineTerminator::CrLf => Terminator::CRLF,
            LineTerminator::Cr => Terminator::Any(b'\r'),
        }
    }

    /// Split text into records, dropping the empty tail after a final terminator
    pub fn records<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut records: Vec<&str> = text.split(self.as_str()).collect();
        if records.last().is_some_and(|r| r.is_empty()) {
            records.pop();
        }
        records
    }
}

impl fmt::Display for LineTerminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str().escape_default().to_string())
    }
}

/// Inferred shape of a delimited text file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialect {
    pub delimiter: char,
    pub terminator: LineTerminator,
    pub has_header: bool,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delimiter={} terminator={} header={}",
            self.delimiter.escape_default(),
            self.terminator,
            self.has_header
        )
    }
}

impl Dialect {
    /// A `csv` reader for this dialect. Quoted fields may span lines; the
    /// header row, when there is one, comes back as the first record.
    pub fn reader<R: Read>(&self, source: R) -> Result<csv::Reader<R>> {
        let delimiter = u8::try_from(self.delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or(DialectError::UnsupportedDelimiter {
                delimiter: self.delimiter,
            })?;

        Ok(ReaderBuilder::new()
            .delimiter(delimiter)
            .terminator(self.terminator.csv_terminator())
            .has_headers(false)
            .flexible(true)
            .from_reader(source))
    }
}

/// Read up to `limit` records, decoding fields lossily
pub fn read_records<R: Read>(
    reader: &mut csv::Reader<R>,
    limit: usize,
) -> std::result::Result<Vec<Vec<String>>, csv::Error> {
    let mut records = Vec::new();
    let mut record = ByteRecord::new();
    while records.len() < limit && reader.read_byte_record(&mut record)? {
        records.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect(),
        );
    }
    Ok(records)
}

/// Heuristic dialect detector
#[derive(Debug, Clone)]
pub struct Sniffer {
    candidates: Vec<char>,
}

impl Default for Sniffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sniffer {
    pub fn new() -> Self {
        Self {
            candidates: DEFAULT_CANDIDATES.to_vec(),
        }
    }

    pub fn from_settings(settings: &SnifferSettings) -> Self {
        Self {
            candidates: settings.candidates.clone(),
        }
    }

    pub fn candidates(&self) -> &[char] {
        &self.candidates
    }

    /// Infer the dialect of `sample`, a list of raw lines read from `source_name`.
    ///
    /// Fails with `EmptySample` when there is nothing to inspect and with
    /// `DialectUndetermined` when no single candidate separates every line
    /// into the same number of fields.
    pub fn sniff<S: AsRef<str>>(&self, source_name: &str, sample: &[S]) -> Result<Dialect> {
        let text: String = sample.iter().map(AsRef::as_ref).collect();
        if text.trim().is_empty() {
            return Err(DialectError::EmptySample {
                source_name: source_name.to_string(),
            }
            .into());
        }

        let terminator = detect_terminator(&text);
        let records: Vec<&str> = terminator
            .records(&text)
            .into_iter()
            .filter(|r| !r.trim().is_empty())
            .collect();

        let delimiter = self.detect_delimiter(source_name, &records)?;
        let has_header = detect_header(&text, delimiter, terminator);

        tracing::debug!(
            source = %source_name,
            records = records.len(),
            delimiter = %delimiter.escape_default(),
            terminator = %terminator,
            has_header = has_header,
            "Sniffed dialect"
        );

        Ok(Dialect {
            delimiter,
            terminator,
            has_header,
        })
    }

    fn detect_delimiter(&self, source_name: &str, records: &[&str]) -> Result<char> {
        let mut consistent: Vec<(char, usize)> = Vec::new();

        for &candidate in &self.candidates {
            let mut counts = records.iter().map(|r| count_unquoted(r, candidate));
            let Some(first) = counts.next() else {
                continue;
            };
            if first > 0 && counts.all(|c| c == first) {
                consistent.push((candidate, first));
            }
        }

        let undetermined = |reason: String| DialectError::DialectUndetermined {
            source_name: source_name.to_string(),
            reason,
        };

        let Some(best) = consistent.iter().map(|(_, count)| *count).max() else {
            return Err(undetermined(format!(
                "none of [{}] splits every line into the same number of fields",
                describe(&self.candidates)
            ))
            .into());
        };

        let winners: Vec<char> = consistent
            .iter()
            .filter(|(_, count)| *count == best)
            .map(|(c, _)| *c)
            .collect();

        match winners.as_slice() {
            [single] => Ok(*single),
            tied => Err(undetermined(format!(
                "ambiguous between [{}]",
                describe(tied)
            ))
            .into()),
        }
    }
}

fn describe(chars: &[char]) -> String {
    chars
        .iter()
        .map(|c| format!("'{}'", c.escape_default()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick the most frequent line ending; a single unterminated line defaults to LF
fn detect_terminator(text: &str) -> LineTerminator {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    let cr = text.matches('\r').count() - crlf;

    if crlf == 0 && lf == 0 && cr == 0 {
        return LineTerminator::Lf;
    }
    if crlf >= lf && crlf >= cr {
        LineTerminator::CrLf
    } else if lf >= cr {
        LineTerminator::Lf
    } else {
        LineTerminator::Cr
    }
}

/// Count occurrences of `delimiter` outside double-quoted sections
fn count_unquoted(record: &str, delimiter: char) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for c in record.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
        } else if c == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CellType {
    Integer,
    Float,
    Text(usize),
}

fn classify(value: &str) -> CellType {
    if value.parse::<i64>().is_ok() {
        CellType::Integer
    } else if value.parse::<f64>().is_ok() {
        CellType::Float
    } else {
        CellType::Text(value.chars().count())
    }
}

/// Vote column by column on whether the first record looks different from the rest.
///
/// A column whose data rows are all numeric votes "header" when the first
/// row's value is not numeric. A column of fixed-width text votes "header"
/// when the first row's value has a different width. Columns with mixed
/// types abstain.
fn detect_header(text: &str, delimiter: char, terminator: LineTerminator) -> bool {
    let dialect = Dialect {
        delimiter,
        terminator,
        has_header: false,
    };
    let Ok(mut reader) = dialect.reader(text.as_bytes()) else {
        return false;
    };
    let Ok(records) = read_records(&mut reader, HEADER_SAMPLE_ROWS + 1) else {
        return false;
    };
    let Some((header, rest)) = records.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }

    let width = header.len();
    let mut column_types: Vec<Option<Option<CellType>>> = vec![None; width];

    for fields in rest {
        if fields.len() != width {
            continue;
        }
        for (slot, value) in column_types.iter_mut().zip(fields) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let this = classify(value);
            *slot = match *slot {
                None => Some(Some(this)),
                Some(Some(known)) if known == this => Some(Some(known)),
                Some(Some(CellType::Integer | CellType::Float))
                    if matches!(this, CellType::Integer | CellType::Float) =>
                {
                    Some(Some(CellType::Float))
                }
                // Mixed column, abstains from the vote
                Some(_) => Some(None),
            };
        }
    }

    let mut votes: i64 = 0;
    for (column_type, value) in column_types.iter().zip(header) {
        let Some(Some(column_type)) = column_type else {
            continue;
        };
        let value = value.trim();
        let looks_like_data = match column_type {
            CellType::Text(width) => value.chars().count() == *width,
            CellType::Integer => value.parse::<i64>().is_ok(),
            CellType::Float => value.parse::<f64>().is_ok(),
        };
        votes += if looks_like_data { -1 } else { 1 };
    }

    votes > 0
}
