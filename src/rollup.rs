//! Grouped view of canonical rows.
//!
//! Buckets rows by the values of their `group-by` columns (in column order)
//! and reduces every other column according to its [`AggregateRole`]. Buckets
//! keep the order in which their first row appeared.

use std::collections::HashMap;

use serde::{Serialize, Serializer, ser::SerializeMap};

use crate::{
    data::Value,
    normalize::{AggregateRole, CanonicalRow, ColumnDescriptor},
};

/// Name of the row-count cell appended to every rolled-up row.
pub const ROW_COUNT_FIELD: &str = "row_count";

#[derive(Debug, Clone, PartialEq)]
pub struct RollupRow {
    pub cells: Vec<(String, Value)>,
    pub rows: usize,
}

impl RollupRow {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }
}

impl Serialize for RollupRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len() + 1))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry(ROW_COUNT_FIELD, &self.rows)?;
        map.end()
    }
}

enum Accumulator {
    Group,
    Sum(f64),
    Average { total: f64, count: usize },
    First(Option<Value>),
}

impl Accumulator {
    fn for_role(role: AggregateRole) -> Self {
        match role {
            AggregateRole::GroupBy => Accumulator::Group,
            AggregateRole::Sum => Accumulator::Sum(0.0),
            AggregateRole::Average => Accumulator::Average {
                total: 0.0,
                count: 0,
            },
            AggregateRole::None => Accumulator::First(None),
        }
    }

    fn ingest(&mut self, value: Option<&Value>) {
        match self {
            Accumulator::Group => {}
            Accumulator::Sum(total) => {
                if let Some(n) = value.and_then(Value::as_number) {
                    *total += n;
                }
            }
            Accumulator::Average { total, count } => {
                if let Some(n) = value.and_then(Value::as_number) {
                    *total += n;
                    *count += 1;
                }
            }
            Accumulator::First(first) => {
                if first.is_none()
                    && let Some(value) = value
                    && !value.is_blank()
                {
                    *first = Some(value.clone());
                }
            }
        }
    }

    fn finish(self, group_value: Option<&String>) -> Value {
        match self {
            Accumulator::Group => group_value
                .map(|text| Value::Text(text.clone()))
                .unwrap_or(Value::Null),
            Accumulator::Sum(total) => Value::Number(total),
            Accumulator::Average { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    Value::Number(total / count as f64)
                }
            }
            Accumulator::First(first) => first.unwrap_or(Value::Null),
        }
    }
}

struct Bucket {
    key: Vec<String>,
    rows: usize,
    accumulators: Vec<Accumulator>,
}

impl Bucket {
    fn new(key: Vec<String>, columns: &[ColumnDescriptor]) -> Self {
        Bucket {
            key,
            rows: 0,
            accumulators: columns
                .iter()
                .map(|column| Accumulator::for_role(column.role))
                .collect(),
        }
    }

    fn ingest(&mut self, row: &CanonicalRow, columns: &[ColumnDescriptor]) {
        self.rows += 1;
        for (accumulator, column) in self.accumulators.iter_mut().zip(columns) {
            accumulator.ingest(row.get(&column.field));
        }
    }

    fn finish(self, columns: &[ColumnDescriptor]) -> RollupRow {
        let mut group_values = self.key.iter();
        let cells = self
            .accumulators
            .into_iter()
            .zip(columns)
            .map(|(accumulator, column)| {
                let group_value = match accumulator {
                    Accumulator::Group => group_values.next(),
                    _ => None,
                };
                (column.field.clone(), accumulator.finish(group_value))
            })
            .collect();
        RollupRow {
            cells,
            rows: self.rows,
        }
    }
}

pub fn rollup(rows: &[CanonicalRow], columns: &[ColumnDescriptor]) -> Vec<RollupRow> {
    let group_fields = columns
        .iter()
        .filter(|column| column.role == AggregateRole::GroupBy)
        .map(|column| column.field.as_str())
        .collect::<Vec<_>>();

    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut buckets: Vec<Bucket> = Vec::new();
    for row in rows {
        let key = group_fields
            .iter()
            .map(|field| row.get(field).map(Value::as_display).unwrap_or_default())
            .collect::<Vec<_>>();
        let slot = match index.get(&key) {
            Some(slot) => *slot,
            None => {
                buckets.push(Bucket::new(key.clone(), columns));
                index.insert(key, buckets.len() - 1);
                buckets.len() - 1
            }
        };
        buckets[slot].ingest(row, columns);
    }

    buckets
        .into_iter()
        .map(|bucket| bucket.finish(columns))
        .collect()
}
