//! Rendering of canonical rows, rollups and batch metadata.
//!
//! Rows are written as pretty JSON (an array of objects in column order),
//! CSV keyed by canonical field names, or an ASCII table headed by column
//! labels with numeric columns right-aligned.

use std::io::Write;

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::Serialize;

use crate::{
    cli::OutputFormat,
    data::Value,
    normalize::{CanonicalRow, ColumnDescriptor},
    registry::{Registry, ValueKind},
    resolve::FieldResolution,
    rollup::{ROW_COUNT_FIELD, RollupRow},
    table::{self, Align},
};

/// Anything that exposes canonical cells by field name.
pub trait CellSource: Serialize {
    fn cell(&self, field: &str) -> Option<&Value>;
}

impl CellSource for CanonicalRow {
    fn cell(&self, field: &str) -> Option<&Value> {
        self.get(field)
    }
}

impl CellSource for RollupRow {
    fn cell(&self, field: &str) -> Option<&Value> {
        self.get(field)
    }
}

struct Layout {
    fields: Vec<String>,
    labels: Vec<String>,
    align: Vec<Align>,
}

impl Layout {
    fn from_columns(columns: &[ColumnDescriptor]) -> Self {
        Layout {
            fields: columns.iter().map(|c| c.field.clone()).collect(),
            labels: columns.iter().map(|c| c.label.clone()).collect(),
            align: columns
                .iter()
                .map(|c| match c.kind {
                    ValueKind::Number | ValueKind::Boolean => Align::Right,
                    _ => Align::Left,
                })
                .collect(),
        }
    }

    fn display_cells<T: CellSource>(&self, row: &T) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| row.cell(field).map(Value::as_display).unwrap_or_default())
            .collect()
    }
}

fn write_layout<W: Write, T: CellSource>(
    mut writer: W,
    layout: &Layout,
    rows: &[T],
    format: OutputFormat,
    row_counts: Option<&[usize]>,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, rows).context("Writing JSON output")?;
            writeln!(writer)?;
        }
        OutputFormat::Csv => {
            let mut csv_writer = csv::WriterBuilder::new().from_writer(&mut writer);
            let mut header = layout.fields.clone();
            if row_counts.is_some() {
                header.push(ROW_COUNT_FIELD.to_string());
            }
            csv_writer.write_record(&header).context("Writing CSV header")?;
            for (idx, row) in rows.iter().enumerate() {
                let mut record = layout.display_cells(row);
                if let Some(counts) = row_counts {
                    record.push(counts[idx].to_string());
                }
                csv_writer
                    .write_record(&record)
                    .with_context(|| format!("Writing CSV row {}", idx + 1))?;
            }
            csv_writer.flush().context("Flushing CSV output")?;
        }
        OutputFormat::Table => {
            let mut headers = layout.labels.clone();
            let mut align = layout.align.clone();
            if row_counts.is_some() {
                headers.push("Rows".to_string());
                align.push(Align::Right);
            }
            let cells = rows
                .iter()
                .enumerate()
                .map(|(idx, row)| {
                    let mut cells = layout.display_cells(row);
                    if let Some(counts) = row_counts {
                        cells.push(counts[idx].to_string());
                    }
                    cells
                })
                .collect::<Vec<_>>();
            write!(writer, "{}", table::render_table(&headers, &cells, &align))?;
        }
    }
    writer.flush().context("Flushing output")?;
    Ok(())
}

pub fn write_rows<W: Write>(
    writer: W,
    rows: &[CanonicalRow],
    columns: &[ColumnDescriptor],
    format: OutputFormat,
) -> Result<()> {
    write_layout(writer, &Layout::from_columns(columns), rows, format, None)
}

pub fn write_rollup<W: Write>(
    writer: W,
    rows: &[RollupRow],
    columns: &[ColumnDescriptor],
    format: OutputFormat,
) -> Result<()> {
    let counts = rows.iter().map(|row| row.rows).collect::<Vec<_>>();
    write_layout(
        writer,
        &Layout::from_columns(columns),
        rows,
        format,
        Some(&counts),
    )
}

pub fn render_columns(columns: &[ColumnDescriptor]) -> String {
    let headers = ["#", "field", "label", "kind", "role", "source"]
        .map(str::to_string)
        .to_vec();
    let rows = columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let source = match (&column.source_key, column.extra) {
                (Some(key), true) => format!("{key} (extra)"),
                (Some(key), false) => key.clone(),
                (None, _) => String::new(),
            };
            vec![
                (idx + 1).to_string(),
                column.field.clone(),
                column.label.clone(),
                column.kind.to_string(),
                column.role.as_str().to_string(),
                source,
            ]
        })
        .collect::<Vec<_>>();
    table::render_table(&headers, &rows, &[Align::Right])
}

pub fn render_resolution(resolution: &FieldResolution, registry: &Registry) -> String {
    let headers = ["field", "label", "key", "records", "alternates"]
        .map(str::to_string)
        .to_vec();
    let rows = resolution
        .iter()
        .map(|resolved| {
            let label = registry
                .field(&resolved.field)
                .map(|field| field.label().to_string())
                .unwrap_or_default();
            let alternates = resolved
                .alternates()
                .map(|entry| format!("{} ({})", entry.key, entry.records))
                .join(", ");
            vec![
                resolved.field.clone(),
                label,
                resolved.key.clone().unwrap_or_default(),
                resolved.matched_records().to_string(),
                alternates,
            ]
        })
        .collect::<Vec<_>>();
    let align = [Align::Left, Align::Left, Align::Left, Align::Right];
    table::render_table(&headers, &rows, &align)
}
