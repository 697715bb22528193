// Dataset preview and column profiling
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::dataset::Dataset;
use crate::error::Result;

pub const DEFAULT_PREVIEW_ROWS: usize = 10;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%b-%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
];

/// Header (when the dataset has one) and the first data rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl Preview {
    pub fn column_count(&self) -> usize {
        let widest = self.rows.iter().map(Vec::len).max().unwrap_or(0);
        self.header.as_ref().map_or(widest, |h| h.len().max(widest))
    }

    pub fn column_name(&self, index: usize) -> String {
        self.header
            .as_ref()
            .and_then(|h| h.get(index))
            .cloned()
            .unwrap_or_else(|| format!("column_{}", index + 1))
    }
}

/// Read the header and up to `rows` data rows using the dataset's stored dialect
pub fn preview(dataset: &Dataset, rows: usize) -> Result<Preview> {
    let wanted = rows + usize::from(dataset.has_header);
    let mut records = dataset.first_records(wanted)?.into_iter();

    let header = if dataset.has_header {
        records.next()
    } else {
        None
    };

    Ok(Preview {
        header,
        rows: records.collect(),
    })
}

/// SQL-friendly column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    Number,
    Date,
    Varchar2(usize),
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Number => f.write_str("number"),
            SqlType::Date => f.write_str("date"),
            SqlType::Varchar2(width) => write!(f, "varchar2({width})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub sql_type: SqlType,
    pub distinct: usize,
    pub empty: usize,
}

/// Infer a type per column from the preview rows.
///
/// Empty values are ignored for typing. A column with no values at all is
/// `varchar2(1)`.
pub fn profile_columns(preview: &Preview) -> Vec<ColumnProfile> {
    (0..preview.column_count())
        .map(|index| {
            let values: Vec<&str> = preview
                .rows
                .iter()
                .map(|row| row.get(index).map(|v| v.trim()).unwrap_or(""))
                .collect();
            let filled: Vec<&str> = values.iter().copied().filter(|v| !v.is_empty()).collect();

            let sql_type = if filled.is_empty() {
                SqlType::Varchar2(1)
            } else if filled.iter().all(|v| is_number(v)) {
                SqlType::Number
            } else if filled.iter().all(|v| is_date(v)) {
                SqlType::Date
            } else {
                let width = filled.iter().map(|v| v.chars().count()).max().unwrap_or(1);
                SqlType::Varchar2(width)
            };

            ColumnProfile {
                name: preview.column_name(index),
                sql_type,
                distinct: filled.iter().collect::<HashSet<_>>().len(),
                empty: values.len() - filled.len(),
            }
        })
        .collect()
}

fn is_number(value: &str) -> bool {
    value.parse::<f64>().is_ok_and(f64::is_finite)
}

fn is_date(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|f| NaiveDate::parse_from_str(value, f).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|f| NaiveDateTime::parse_from_str(value, f).is_ok())
        || DateTime::parse_from_rfc3339(value).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Owner;
    use crate::dialect::LineTerminator;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn dataset_with(contents: &str) -> (NamedTempFile, Dataset) {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let dataset = Dataset::new(file.path(), Owner::new("alice", "alice@example.com"));
        (file, dataset)
    }

    #[test]
    fn test_preview_with_header() {
        let (_file, dataset) = dataset_with("id,name\n1,\"Smith, J\"\n2,Ann\n3,Bob\n");
        let preview = preview(&dataset, 2).unwrap();
        assert_eq!(preview.header, Some(vec!["id".to_string(), "name".to_string()]));
        assert_eq!(preview.rows, vec![vec!["1", "Smith, J"], vec!["2", "Ann"]]);
    }

    #[test]
    fn test_preview_without_header_crlf() {
        let (_file, mut dataset) = dataset_with("1|a\r\n2|b\r\n");
        dataset.has_header = false;
        dataset.delimiter = '|';
        dataset.terminator = LineTerminator::CrLf;
        let preview = preview(&dataset, 10).unwrap();
        assert!(preview.header.is_none());
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.column_name(1), "column_2");
    }

    #[test]
    fn test_preview_keeps_quoted_newlines() {
        let (_file, dataset) = dataset_with("id,note\n1,\"first\nsecond\"\n2,plain\n3,skipped\n");
        let preview = preview(&dataset, 2).unwrap();
        assert_eq!(
            preview.rows,
            vec![vec!["1", "first\nsecond"], vec!["2", "plain"]]
        );
    }

    #[test]
    fn test_preview_carriage_return_dialect() {
        let (_file, mut dataset) = dataset_with("a;b\r1;2\r3;4\r");
        dataset.delimiter = ';';
        dataset.terminator = LineTerminator::Cr;
        let preview = preview(&dataset, 1).unwrap();
        assert_eq!(preview.header, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(preview.rows, vec![vec!["1", "2"]]);
    }

    #[test]
    fn test_profile_columns() {
        let preview = Preview {
            header: Some(vec!["id".into(), "when".into(), "who".into(), "blank".into()]),
            rows: vec![
                vec!["1".into(), "2024-01-01".into(), "ann".into(), "".into()],
                vec!["2.5".into(), "2024-01-02 10:00:00".into(), "robert".into(), "".into()],
                vec!["".into(), "02/01/2024".into(), "ann".into(), "".into()],
            ],
        };
        let profiles = profile_columns(&preview);
        assert_eq!(profiles[0].sql_type, SqlType::Number);
        assert_eq!(profiles[0].empty, 1);
        assert_eq!(profiles[1].sql_type, SqlType::Date);
        assert_eq!(profiles[2].sql_type.to_string(), "varchar2(6)");
        assert_eq!(profiles[2].distinct, 2);
        assert_eq!(profiles[3].sql_type, SqlType::Varchar2(1));
        assert_eq!(profiles[3].empty, 3);
    }

    #[test]
    fn test_nan_is_not_a_number() {
        assert!(!is_number("NaN"));
        assert!(!is_number("inf"));
        assert!(is_number("-3.25"));
    }
}
