//! Record batch input and output plumbing.
//!
//! - **Input**: JSON payloads (a bare array of objects, or an object with a
//!   `rows` array) and flat CSV files with a header row.
//! - **Format resolution**: extension-based (`.csv`/`.tsv` read as CSV,
//!   everything else as JSON) with manual override.
//! - **stdin/stdout**: the `-` path convention routes through standard streams.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::warn;
use serde_json::Value as JsonValue;

use crate::{cli::InputFormat, data::RawRecord};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

fn extension_of(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

pub fn resolve_input_format(path: &Path, provided: Option<InputFormat>) -> InputFormat {
    provided.unwrap_or_else(|| match extension_of(path) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("tsv") => {
            InputFormat::Csv
        }
        _ => InputFormat::Json,
    })
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match extension_of(path) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    Ok(Box::new(BufReader::new(file)))
}

pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if !is_dash(p) => Ok(Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        ))),
        _ => Ok(Box::new(io::stdout())),
    }
}

pub fn read_records(path: &Path, format: InputFormat, delimiter: u8) -> Result<Vec<RawRecord>> {
    let reader = open_input(path)?;
    match format {
        InputFormat::Json => read_json_records(reader)
            .with_context(|| format!("Reading JSON records from {path:?}")),
        InputFormat::Csv => read_csv_records(reader, delimiter)
            .with_context(|| format!("Reading CSV records from {path:?}")),
    }
}

pub fn read_json_records<R: Read>(reader: R) -> Result<Vec<RawRecord>> {
    let payload: JsonValue = serde_json::from_reader(reader).context("Parsing JSON payload")?;
    Ok(records_from_json(payload))
}

/// Extracts the record list from a response payload. Unknown shapes yield an
/// empty batch.
pub fn records_from_json(payload: JsonValue) -> Vec<RawRecord> {
    let items = match payload {
        JsonValue::Array(items) => items,
        JsonValue::Object(mut envelope) => match envelope.remove("rows") {
            Some(JsonValue::Array(items)) => items,
            _ => {
                warn!("JSON object payload has no 'rows' array; treating it as empty");
                return Vec::new();
            }
        },
        _ => {
            warn!("JSON payload is neither an array nor an object; treating it as empty");
            return Vec::new();
        }
    };
    let total = items.len();
    let records = items
        .into_iter()
        .filter_map(|item| match item {
            JsonValue::Object(record) => Some(record),
            _ => None,
        })
        .collect::<Vec<_>>();
    if records.len() < total {
        warn!(
            "Skipped {} non-object entr(ies) in JSON payload",
            total - records.len()
        );
    }
    records
}

pub fn read_csv_records<R: Read>(reader: R, delimiter: u8) -> Result<Vec<RawRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader);
    let headers = csv_reader
        .headers()
        .context("Reading CSV header row")?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut records = Vec::new();
    for (row_idx, result) in csv_reader.records().enumerate() {
        let row = result.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, cell)| (header.clone(), JsonValue::String(cell.to_string())))
            .collect::<RawRecord>();
        records.push(record);
    }
    Ok(records)
}
