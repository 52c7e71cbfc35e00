//! Schema resolution: which physical key carries each logical field.
//!
//! Every record votes for the key it would use for a field (see
//! [`CandidateSet::pick`]); the key with the most votes wins and ties go to
//! the key seen first. Resolution never fails: a field that no record
//! matches resolves to `None`.

use log::debug;
use serde::Serialize;

use crate::{data::RawRecord, matching::CandidateSet, registry::Registry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyTally {
    pub key: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedField {
    pub field: String,
    pub key: Option<String>,
    /// Every key that won at least one record, in first-seen order.
    pub tally: Vec<KeyTally>,
}

impl ResolvedField {
    /// Records whose vote went to the resolved key.
    pub fn matched_records(&self) -> usize {
        self.tally
            .iter()
            .find(|entry| Some(entry.key.as_str()) == self.key.as_deref())
            .map(|entry| entry.records)
            .unwrap_or(0)
    }

    pub fn alternates(&self) -> impl Iterator<Item = &KeyTally> {
        let resolved = self.key.as_deref();
        self.tally
            .iter()
            .filter(move |entry| Some(entry.key.as_str()) != resolved)
    }
}

/// Highest tally; the strict comparison keeps the first-seen key on ties.
fn winner(tally: &[KeyTally]) -> Option<&KeyTally> {
    let mut best: Option<&KeyTally> = None;
    for entry in tally {
        if best.is_none_or(|current| entry.records > current.records) {
            best = Some(entry);
        }
    }
    best
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldResolution {
    fields: Vec<ResolvedField>,
}

impl FieldResolution {
    pub fn key_for(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|resolved| resolved.key.as_deref())
    }

    pub fn get(&self, field: &str) -> Option<&ResolvedField> {
        self.fields.iter().find(|resolved| resolved.field == field)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when `key` is the resolved key of any field.
    pub fn is_resolved_key(&self, key: &str) -> bool {
        self.fields
            .iter()
            .any(|resolved| resolved.key.as_deref() == Some(key))
    }

    /// True when `key` won at least one record's vote for any field, whether
    /// or not it became the resolved key.
    pub fn is_candidate_key(&self, key: &str) -> bool {
        self.fields
            .iter()
            .any(|resolved| resolved.tally.iter().any(|entry| entry.key == key))
    }
}

/// Tallies the per-record pick of `matcher` over all records.
pub fn tally_keys(records: &[RawRecord], matcher: &CandidateSet) -> Vec<KeyTally> {
    let mut tally: Vec<KeyTally> = Vec::new();
    for record in records {
        let Some(key) = matcher.pick(record) else {
            continue;
        };
        match tally.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => entry.records += 1,
            None => tally.push(KeyTally {
                key: key.to_string(),
                records: 1,
            }),
        }
    }
    tally
}

pub fn resolve(records: &[RawRecord], registry: &Registry) -> FieldResolution {
    let fields = registry
        .fields()
        .iter()
        .map(|field| {
            let tally = tally_keys(records, field.candidates());
            let key = winner(&tally).map(|winner| winner.key.clone());
            match &key {
                Some(key) => debug!(
                    "Resolved field '{}' to key '{}' ({} candidate key(s))",
                    field.name(),
                    key,
                    tally.len()
                ),
                None => debug!("Field '{}' did not match any key", field.name()),
            }
            ResolvedField {
                field: field.name().to_string(),
                key,
                tally,
            }
        })
        .collect();
    FieldResolution { fields }
}
