//! Table export to CSV, TSV, and JSON.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TukeyError};
use crate::input::DataTable;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Tsv,
    /// Array of objects keyed by column name; missing cells are `null`.
    Json,
}

impl OutputFormat {
    /// Guess the format from a file extension, defaulting to CSV.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("tsv") | Some("tab") => OutputFormat::Tsv,
            Some("json") => OutputFormat::Json,
            _ => OutputFormat::Csv,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

/// Writes whole tables in one format.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableWriter {
    format: OutputFormat,
}

impl TableWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write `table` to any writer.
    pub fn write<W: Write>(&self, table: &DataTable, writer: W) -> Result<()> {
        match self.format {
            OutputFormat::Csv => write_delimited(table, writer, b','),
            OutputFormat::Tsv => write_delimited(table, writer, b'\t'),
            OutputFormat::Json => write_json(table, writer),
        }
    }

    /// Write `table` to a file, creating parent directories as needed.
    pub fn write_to_path(&self, table: &DataTable, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let io_err = |e| TukeyError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let file = File::create(path).map_err(io_err)?;
        self.write(table, BufWriter::new(file))
    }

    /// Render `table` into a string.
    pub fn render(&self, table: &DataTable) -> Result<String> {
        let mut buf = Vec::new();
        self.write(table, &mut buf)?;
        String::from_utf8(buf).map_err(|e| TukeyError::Parse {
            row: 0,
            column: 0,
            message: format!("output is not valid UTF-8: {}", e),
        })
    }
}

fn write_delimited<W: Write>(table: &DataTable, writer: W, delimiter: u8) -> Result<()> {
    let mut out = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    out.write_record(table.headers())?;
    for row in &table.rows {
        out.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    out.flush().map_err(csv::Error::from)?;
    Ok(())
}

fn write_json<W: Write>(table: &DataTable, mut writer: W) -> Result<()> {
    let headers = table.headers();
    let records: Vec<serde_json::Map<String, serde_json::Value>> = table
        .rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .zip(row)
                .map(|(name, cell)| Ok((name.to_string(), serde_json::to_value(cell)?)))
                .collect::<std::result::Result<_, serde_json::Error>>()
        })
        .collect::<std::result::Result<_, _>>()?;
    serde_json::to_writer_pretty(&mut writer, &records)?;
    writer.write_all(b"\n").map_err(serde_json::Error::io)?;
    Ok(())
}
