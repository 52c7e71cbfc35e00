//! Row normalization: raw records to uniform, typed canonical rows.
//!
//! Every [`CanonicalRow`] carries the registry's logical fields in registry
//! order followed by the batch's pass-through columns, so all rows of a
//! batch share one layout. The column list is derived from the registry and
//! the batch, never from the first record alone.
//!
//! ## Per-kind rules
//!
//! | Kind      | Source value                              | Canonical value                      |
//! |-----------|-------------------------------------------|--------------------------------------|
//! | `number`  | parseable number                          | number                               |
//! | `number`  | missing / empty / unparseable             | `0` (summable) or null (descriptive) |
//! | `boolean` | anything                                  | `0` or `1`                           |
//! | `date`    | empty                                     | fallback field's value, then parsed  |
//! | `date`    | ISO / compact / slash date                | `YYYY-MM-DD`                         |
//! | `text`    | anything                                  | text, null when missing              |
//!
//! Fields are read from their resolved key. A record that lacks that key is
//! read through its own best-matching candidate, so a minority spelling such
//! as `Y2024` still lands in the `2024` column. Grouping fields are matched
//! per record and default to an empty string.

use std::collections::HashSet;

use heck::ToTitleCase;
use log::debug;
use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::Value as JsonValue;

use crate::{
    data::{RawRecord, Value, coerce_flag, coerce_number, coerce_text, is_nil_or_empty},
    dates::canonical_date,
    matching::CandidateSet,
    registry::{LogicalField, NumericPolicy, Registry, ValueKind},
    resolve::{FieldResolution, resolve},
};

/// How a column behaves when rows are rolled up into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregateRole {
    /// First non-blank value of the group.
    None,
    GroupBy,
    Sum,
    Average,
}

impl AggregateRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateRole::None => "none",
            AggregateRole::GroupBy => "group-by",
            AggregateRole::Sum => "sum",
            AggregateRole::Average => "average",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescriptor {
    /// Canonical field name; the key of this column in every row.
    pub field: String,
    pub label: String,
    pub kind: ValueKind,
    pub role: AggregateRole,
    /// Physical key the column was read from, if any.
    pub source_key: Option<String>,
    /// Pass-through column not declared in the registry.
    pub extra: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CanonicalRow {
    cells: Vec<(String, Value)>,
}

impl CanonicalRow {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn cells(&self) -> &[(String, Value)] {
        &self.cells
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.cells.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for CanonicalRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Resolution, rows and columns for one record batch.
#[derive(Debug, Clone)]
pub struct NormalizedBatch {
    pub resolution: FieldResolution,
    pub rows: Vec<CanonicalRow>,
    pub columns: Vec<ColumnDescriptor>,
}

/// Resolves and normalizes a batch in one step.
pub fn normalize_batch(records: &[RawRecord], registry: &Registry) -> NormalizedBatch {
    let resolution = resolve(records, registry);
    let (rows, columns) = normalize(records, &resolution, registry);
    NormalizedBatch {
        resolution,
        rows,
        columns,
    }
}

/// Per-record read of a key, falling back to the record's best candidate
/// when the key is absent.
fn read_key<'r>(
    record: &'r RawRecord,
    key: &str,
    candidates: &CandidateSet,
) -> Option<&'r JsonValue> {
    record
        .get(key)
        .or_else(|| candidates.pick(record).and_then(|alternate| record.get(alternate)))
}

enum FallbackSource<'a> {
    Field {
        key: &'a str,
        candidates: &'a CandidateSet,
    },
    Matched(CandidateSet),
}

impl FallbackSource<'_> {
    fn lookup<'r>(&self, record: &'r RawRecord) -> Option<&'r JsonValue> {
        match self {
            FallbackSource::Field { key, candidates } => read_key(record, key, candidates),
            FallbackSource::Matched(matcher) => matcher.pick(record).and_then(|k| record.get(k)),
        }
    }
}

struct FieldPlan<'a> {
    field: &'a LogicalField,
    key: Option<&'a str>,
    fallback: Option<FallbackSource<'a>>,
}

impl<'a> FieldPlan<'a> {
    fn new(
        field: &'a LogicalField,
        resolution: &'a FieldResolution,
        registry: &'a Registry,
    ) -> Self {
        let fallback = field.fallback().and_then(|name| match registry.field(name) {
            Some(declared) => resolution
                .key_for(declared.name())
                .map(|key| FallbackSource::Field {
                    key,
                    candidates: declared.candidates(),
                }),
            None => Some(FallbackSource::Matched(CandidateSet::new([name]))),
        });
        FieldPlan {
            field,
            key: resolution.key_for(field.name()),
            fallback,
        }
    }

    fn value(&self, record: &RawRecord) -> Value {
        let field = self.field;
        if field.is_group_by() {
            let text = field
                .candidates()
                .pick(record)
                .and_then(|key| coerce_text(record.get(key)))
                .unwrap_or_default();
            return Value::Text(text);
        }
        let raw = self.source(record);
        match field.kind() {
            // An unresolved date still takes its fallback.
            ValueKind::Date => {
                let source = if is_nil_or_empty(raw) {
                    self.fallback
                        .as_ref()
                        .and_then(|fallback| fallback.lookup(record))
                } else {
                    raw
                };
                canonical_date(source)
            }
            ValueKind::Boolean if self.key.is_none() => Value::Null,
            ValueKind::Text => coerce_text(raw).map(Value::Text).unwrap_or(Value::Null),
            ValueKind::Number => coerce_number(raw)
                .map(Value::Number)
                .unwrap_or_else(|| field.missing_number()),
            ValueKind::Boolean => Value::flag(coerce_flag(raw)),
        }
    }

    /// The resolved key's value. A record that lacks the resolved key is read
    /// through its own best candidate instead.
    fn source<'r>(&self, record: &'r RawRecord) -> Option<&'r JsonValue> {
        read_key(record, self.key?, self.field.candidates())
    }

    fn descriptor(&self) -> ColumnDescriptor {
        let field = self.field;
        let role = if field.is_group_by() {
            AggregateRole::GroupBy
        } else if field.kind() == ValueKind::Number {
            match field.numeric_policy() {
                NumericPolicy::Summable => AggregateRole::Sum,
                NumericPolicy::Descriptive => AggregateRole::Average,
            }
        } else {
            AggregateRole::None
        };
        ColumnDescriptor {
            field: field.name().to_string(),
            label: field.label().to_string(),
            kind: field.kind(),
            role,
            source_key: self.key.map(str::to_string),
            extra: false,
        }
    }
}

struct ExtraColumn {
    key: String,
    kind: ValueKind,
}

fn is_year_key(key: &str) -> bool {
    key.len() == 4 && key.bytes().all(|b| b.is_ascii_digit())
}

fn extra_label(key: &str) -> String {
    if is_year_key(key) {
        return key.to_string();
    }
    let titled = key.to_title_case();
    if titled.is_empty() {
        key.to_string()
    } else {
        titled
    }
}

/// Pass-through keys in first-appearance order. Keys any logical field
/// picked in some record, keys that collide with a logical field's name, and
/// keys matching an exclusion pattern are left out.
fn discover_extras(
    records: &[RawRecord],
    resolution: &FieldResolution,
    registry: &Registry,
) -> Vec<ExtraColumn> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut keys: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            let key = key.as_str();
            if !seen.insert(key) {
                continue;
            }
            if resolution.is_candidate_key(key) {
                continue;
            }
            if registry.is_excluded(key) {
                debug!("Dropping excluded key '{key}'");
                continue;
            }
            if registry.field(key).is_some() {
                debug!("Dropping key '{key}' that shadows a logical field");
                continue;
            }
            keys.push(key);
        }
    }

    keys.into_iter()
        .map(|key| ExtraColumn {
            key: key.to_string(),
            kind: infer_extra_kind(records, key),
        })
        .collect()
}

fn infer_extra_kind(records: &[RawRecord], key: &str) -> ValueKind {
    if is_year_key(key) {
        return ValueKind::Number;
    }
    let mut observed = records
        .iter()
        .filter_map(|record| record.get(key))
        .filter(|value| !value.is_null())
        .peekable();
    if observed.peek().is_none() {
        return ValueKind::Text;
    }
    if observed.all(JsonValue::is_number) {
        ValueKind::Number
    } else {
        ValueKind::Text
    }
}

pub fn normalize(
    records: &[RawRecord],
    resolution: &FieldResolution,
    registry: &Registry,
) -> (Vec<CanonicalRow>, Vec<ColumnDescriptor>) {
    let plans = registry
        .fields()
        .iter()
        .map(|field| FieldPlan::new(field, resolution, registry))
        .collect::<Vec<_>>();
    let extras = discover_extras(records, resolution, registry);

    let rows = records
        .iter()
        .map(|record| {
            let mut cells = Vec::with_capacity(plans.len() + extras.len());
            for plan in &plans {
                cells.push((plan.field.name().to_string(), plan.value(record)));
            }
            for extra in &extras {
                let value = record.get(&extra.key).map(Value::from_json).unwrap_or(Value::Null);
                cells.push((extra.key.clone(), value));
            }
            CanonicalRow { cells }
        })
        .collect::<Vec<_>>();

    let mut columns = plans.iter().map(FieldPlan::descriptor).collect::<Vec<_>>();
    columns.extend(extras.iter().map(|extra| ColumnDescriptor {
        field: extra.key.clone(),
        label: extra_label(&extra.key),
        kind: extra.kind,
        role: AggregateRole::None,
        source_key: Some(extra.key.clone()),
        extra: true,
    }));

    debug!(
        "Normalized {} row(s) into {} column(s) ({} pass-through)",
        rows.len(),
        columns.len(),
        extras.len()
    );
    (rows, columns)
}
