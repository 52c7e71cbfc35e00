//! Physical-key matching against a field's candidate names.
//!
//! Keys and candidates are compared in normalized form: lowercase ASCII
//! alphanumerics with any leading version/sequence prefix (`"1.2 "`)
//! removed. A key matches a candidate exactly, or by suffix so that
//! prefixed spellings such as `"1.2 std_value"` still resolve. Exact matches
//! always outrank suffix matches; within the same strength the longest
//! candidate wins, so a short generic candidate like `"std"` cannot shadow
//! `"std_value"`.

use std::{cmp::Ordering, sync::LazyLock};

use regex::Regex;

use crate::data::RawRecord;

static VERSION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\d.]+\s*").expect("version prefix pattern"));

/// Normalizes a key or candidate for comparison.
///
/// A name that consists solely of a numeric prefix (a year such as `"2021"`)
/// keeps its digits instead of collapsing to an empty string.
pub fn normalize_key(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = alphanumeric_only(&VERSION_PREFIX.replace(&lowered, ""));
    if stripped.is_empty() {
        alphanumeric_only(&lowered)
    } else {
        stripped
    }
}

fn alphanumeric_only(value: &str) -> String {
    value.chars().filter(|ch| ch.is_ascii_alphanumeric()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchStrength {
    Suffix,
    Exact,
}

/// How well a single physical key matched a candidate set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMatch {
    pub strength: MatchStrength,
    /// Length of the normalized candidate that matched.
    pub specificity: usize,
}

impl Ord for KeyMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.strength
            .cmp(&other.strength)
            .then_with(|| self.specificity.cmp(&other.specificity))
    }
}

impl PartialOrd for KeyMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub struct CandidateSet {
    names: Vec<String>,
    normalized: Vec<String>,
}

impl CandidateSet {
    /// Builds a set from raw candidate names. Candidates that normalize to an
    /// empty string are dropped since they would match every key.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = CandidateSet {
            names: Vec::new(),
            normalized: Vec::new(),
        };
        for name in names {
            let name = name.into();
            let normalized = normalize_key(&name);
            if normalized.is_empty() || set.normalized.contains(&normalized) {
                continue;
            }
            set.names.push(name);
            set.normalized.push(normalized);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn match_key(&self, key: &str) -> Option<KeyMatch> {
        let normalized = normalize_key(key);
        if normalized.is_empty() {
            return None;
        }
        let mut exact: Option<usize> = None;
        let mut suffix: Option<usize> = None;
        for candidate in &self.normalized {
            let len = Some(candidate.len());
            if *candidate == normalized {
                exact = exact.max(len);
            } else if normalized.ends_with(candidate.as_str()) {
                suffix = suffix.max(len);
            }
        }
        if let Some(specificity) = exact {
            return Some(KeyMatch {
                strength: MatchStrength::Exact,
                specificity,
            });
        }
        suffix.map(|specificity| KeyMatch {
            strength: MatchStrength::Suffix,
            specificity,
        })
    }

    /// Picks the best matching key of a single record. Ties keep the key that
    /// appears first in the record.
    pub fn pick<'r>(&self, record: &'r RawRecord) -> Option<&'r str> {
        let mut best: Option<(&'r str, KeyMatch)> = None;
        for key in record.keys() {
            let Some(found) = self.match_key(key) else {
                continue;
            };
            if best.is_none_or(|(_, current)| found > current) {
                best = Some((key.as_str(), found));
            }
        }
        best.map(|(key, _)| key)
    }
}
