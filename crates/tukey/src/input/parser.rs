//! CSV/TSV parser with delimiter detection and column typing.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::source::{DataTable, Row, SourceMetadata};
use crate::error::{Result, TukeyError};
use crate::inference::TypeInferrer;
use crate::schema::{ColumnSchema, ColumnType, TableSchema};

/// Candidate delimiters, in order of preference on a tie.
const CANDIDATES: [u8; 4] = [b'\t', b',', b';', b'|'];

/// Lines sampled when sniffing the delimiter.
const SNIFF_LINES: usize = 10;

/// How delimited text is read into a table.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Fixed delimiter; sniffed from the first lines when `None`.
    pub delimiter: Option<u8>,
    /// First record holds the column names.
    pub has_header: bool,
    /// Stop after this many data records.
    pub row_limit: Option<usize>,
    pub quote: u8,
    /// Explicit column types; other columns are inferred.
    pub column_types: IndexMap<String, ColumnType>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_header: true,
            row_limit: None,
            quote: b'"',
            column_types: IndexMap::new(),
        }
    }
}

impl ParserConfig {
    /// Force the type of a column instead of inferring it.
    pub fn with_column_type(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_types.insert(column.into(), column_type);
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_row_limit(mut self, rows: usize) -> Self {
        self.row_limit = Some(rows);
        self
    }
}

/// Reads delimited files into typed [`DataTable`]s.
#[derive(Default)]
pub struct Parser {
    config: ParserConfig,
    inferrer: TypeInferrer,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParserConfig) -> Self {
        Self {
            config,
            inferrer: TypeInferrer::new(),
        }
    }

    /// Read `path` into a table, together with a description of the file.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<(DataTable, SourceMetadata)> {
        let path = path.as_ref();
        let contents = fs::read(path).map_err(|source| TukeyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hash = format!("sha256:{:x}", Sha256::digest(&contents));

        let delimiter = self.delimiter_for(&contents)?;
        let table = self.parse_bytes(&contents, delimiter)?;
        let format = format_name(delimiter);
        debug!(
            path = %path.display(),
            rows = table.row_count(),
            columns = table.column_count(),
            format,
            "parsed input file"
        );

        let metadata = SourceMetadata::new(
            path.to_path_buf(),
            hash,
            contents.len() as u64,
            format.to_string(),
            table.row_count(),
            table.column_count(),
        );
        Ok((table, metadata))
    }

    /// Parse in-memory text, sniffing the delimiter unless configured.
    pub fn parse_str(&self, text: &str) -> Result<DataTable> {
        let delimiter = self.delimiter_for(text.as_bytes())?;
        self.parse_bytes(text.as_bytes(), delimiter)
    }

    fn delimiter_for(&self, bytes: &[u8]) -> Result<u8> {
        match self.config.delimiter {
            Some(delimiter) => Ok(delimiter),
            None => sniff_delimiter(bytes, self.config.quote),
        }
    }

    fn parse_bytes(&self, bytes: &[u8], delimiter: u8) -> Result<DataTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(self.config.has_header)
            .quote(self.config.quote)
            .flexible(true)
            .from_reader(bytes);

        let limit = self.config.row_limit.unwrap_or(usize::MAX);
        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        for record in reader.records().take(limit) {
            raw_rows.push(record?.iter().map(str::to_string).collect());
        }

        let headers: Vec<String> = if self.config.has_header {
            reader.headers()?.iter().map(|h| h.trim().to_string()).collect()
        } else {
            let width = raw_rows
                .first()
                .map(Vec::len)
                .ok_or_else(|| TukeyError::EmptyData("No data rows found".into()))?;
            (1..=width).map(|i| format!("column_{}", i)).collect()
        };
        if headers.iter().all(String::is_empty) {
            return Err(TukeyError::EmptyData("No columns found".into()));
        }

        // ragged records are padded with empty (missing) cells or cut
        for row in &mut raw_rows {
            row.resize(headers.len(), String::new());
        }

        let columns: Vec<ColumnSchema> = headers
            .into_iter()
            .enumerate()
            .map(|(position, name)| {
                let column_type = self.config.column_types.get(&name).copied().unwrap_or_else(|| {
                    self.inferrer
                        .infer_column(raw_rows.iter().map(|r| r[position].as_str()))
                        .column_type
                });
                ColumnSchema::new(name, position, column_type)
            })
            .collect();

        let rows = raw_rows
            .iter()
            .enumerate()
            .map(|(row_idx, raw)| {
                columns
                    .iter()
                    .zip(raw)
                    .map(|(column, value)| {
                        self.inferrer
                            .parse_cell(value, column.column_type, row_idx, column.position)
                    })
                    .collect::<Result<Row>>()
            })
            .collect::<Result<Vec<Row>>>()?;

        DataTable::new(TableSchema::with_columns(columns), rows)
    }
}

fn format_name(delimiter: u8) -> &'static str {
    match delimiter {
        b'\t' => "tsv",
        b',' => "csv",
        b';' => "csv-semicolon",
        b'|' => "psv",
        _ => "delimited",
    }
}

/// Pick the candidate that splits the sampled lines into the same number of
/// fields most often, preferring more fields, then candidate order.
///
/// Text without any candidate is read as comma separated.
fn sniff_delimiter(bytes: &[u8], quote: u8) -> Result<u8> {
    let sample: Vec<&[u8]> = bytes
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .take(SNIFF_LINES)
        .collect();
    if sample.is_empty() {
        return Err(TukeyError::EmptyData("No lines to analyze".into()));
    }

    let best = CANDIDATES
        .iter()
        .filter_map(|&delimiter| {
            let counts: Vec<usize> = sample
                .iter()
                .map(|line| unquoted_count(line, delimiter, quote))
                .collect();
            let fields = counts[0];
            if fields == 0 {
                return None;
            }
            let agreeing = counts.iter().filter(|&&c| c == fields).count();
            Some(((agreeing, fields), delimiter))
        })
        // max_by_key keeps the last maximum; reverse so earlier candidates win ties
        .rev()
        .max_by_key(|(score, _)| *score)
        .map(|(_, delimiter)| delimiter);

    Ok(best.unwrap_or(b','))
}

/// Occurrences of `delimiter` outside quoted sections.
fn unquoted_count(line: &[u8], delimiter: u8, quote: u8) -> usize {
    line.iter()
        .scan(false, |quoted, &b| {
            if b == quote {
                *quoted = !*quoted;
            }
            Some(!*quoted && b == delimiter)
        })
        .filter(|&hit| hit)
        .count()
}
