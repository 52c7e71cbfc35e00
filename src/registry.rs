//! Logical field registry: the contract a report view is built against.
//!
//! A [`Registry`] is an ordered list of [`LogicalField`]s plus exclusion
//! patterns for pass-through keys. Registries are usually loaded from YAML
//! (see `registries/dq_reports.yml` for the built-in one) but can also be
//! assembled in code with the [`LogicalField`] builder methods.
//!
//! ## YAML shape
//!
//! ```yaml
//! name: dq_reports
//! exclude: ['(?i)^Y\d{4}$']
//! fields:
//!   - { name: book, kind: text, group_by: true, candidates: [book, book_nm] }
//!   - years: { from: 2021, to: 2025, prefixes: [Y] }
//!   - { name: z_score, kind: number, numeric: descriptive, candidates: [zscore] }
//! ```

use std::{collections::HashSet, fmt, path::Path};

use anyhow::{Context, Result};
use heck::ToTitleCase;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{data::Value, matching::CandidateSet};

const BUILTIN_REGISTRY: &str = include_str!("../registries/dq_reports.yml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Text,
    Number,
    Boolean,
    Date,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::Date => "date",
        };
        f.write_str(label)
    }
}

/// What a missing or unparseable numeric value becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NumericPolicy {
    /// Totals that must stay sum-safe; missing values become `0`.
    Summable,
    /// Statistics that may legitimately be absent; missing values stay null.
    #[default]
    Descriptive,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to parse registry YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Registry field name cannot be empty")]
    EmptyName,
    #[error("Duplicate registry field '{0}'")]
    DuplicateField(String),
    #[error("Field '{0}' has no usable candidate names")]
    NoCandidates(String),
    #[error("Field '{field}' declares a fallback but is of kind {kind}")]
    FallbackOnNonDate { field: String, kind: ValueKind },
    #[error("Field '{field}' declares a numeric policy but is of kind {kind}")]
    NumericOnNonNumber { field: String, kind: ValueKind },
    #[error("Field '{field}' is a grouping dimension but is of kind {kind}")]
    GroupByOnNonText { field: String, kind: ValueKind },
    #[error("Year range {from}..={to} is empty")]
    EmptyYearRange { from: i32, to: i32 },
    #[error("Invalid exclusion pattern '{pattern}': {source}")]
    InvalidExclusion {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Clone)]
pub struct LogicalField {
    name: String,
    label: String,
    kind: ValueKind,
    numeric: Option<NumericPolicy>,
    fallback: Option<String>,
    group_by: bool,
    candidates: CandidateSet,
}

impl LogicalField {
    /// A field whose only candidate is its own name and whose label is the
    /// title-cased name.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        let name = name.into();
        LogicalField {
            label: default_label(&name),
            candidates: CandidateSet::new([name.clone()]),
            name,
            kind,
            numeric: None,
            fallback: None,
            group_by: false,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_candidates<I, S>(mut self, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.candidates = CandidateSet::new(candidates);
        self
    }

    pub fn with_numeric(mut self, policy: NumericPolicy) -> Self {
        self.numeric = Some(policy);
        self
    }

    pub fn summable(self) -> Self {
        self.with_numeric(NumericPolicy::Summable)
    }

    pub fn descriptive(self) -> Self {
        self.with_numeric(NumericPolicy::Descriptive)
    }

    /// Date fields only: the field to copy from when this one is empty.
    pub fn with_fallback(mut self, field: impl Into<String>) -> Self {
        self.fallback = Some(field.into());
        self
    }

    pub fn grouping(mut self) -> Self {
        self.group_by = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn numeric_policy(&self) -> NumericPolicy {
        self.numeric.unwrap_or_default()
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }

    pub fn is_group_by(&self) -> bool {
        self.group_by
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    /// Value used for a numeric field with nothing parseable in the source.
    pub fn missing_number(&self) -> Value {
        match self.numeric_policy() {
            NumericPolicy::Summable => Value::Number(0.0),
            NumericPolicy::Descriptive => Value::Null,
        }
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.candidates.is_empty() {
            return Err(RegistryError::NoCandidates(self.name.clone()));
        }
        if self.fallback.is_some() && self.kind != ValueKind::Date {
            return Err(RegistryError::FallbackOnNonDate {
                field: self.name.clone(),
                kind: self.kind,
            });
        }
        if self.numeric.is_some() && self.kind != ValueKind::Number {
            return Err(RegistryError::NumericOnNonNumber {
                field: self.name.clone(),
                kind: self.kind,
            });
        }
        if self.group_by && self.kind != ValueKind::Text {
            return Err(RegistryError::GroupByOnNonText {
                field: self.name.clone(),
                kind: self.kind,
            });
        }
        Ok(())
    }
}

fn default_label(name: &str) -> String {
    let titled = name.to_title_case();
    if titled.is_empty() {
        name.to_string()
    } else {
        titled
    }
}

#[derive(Debug, Clone)]
pub struct Registry {
    name: String,
    fields: Vec<LogicalField>,
    exclude: Vec<Regex>,
}

impl Registry {
    pub fn new(name: impl Into<String>, fields: Vec<LogicalField>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for field in &fields {
            field.validate()?;
            if !seen.insert(field.name.clone()) {
                return Err(RegistryError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Registry {
            name: name.into(),
            fields,
            exclude: Vec::new(),
        })
    }

    /// Adds regex patterns for pass-through keys that must never surface as
    /// extra columns.
    pub fn with_exclusions<I, S>(mut self, patterns: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern).map_err(|source| RegistryError::InvalidExclusion {
                pattern: pattern.to_string(),
                source,
            })?;
            self.exclude.push(regex);
        }
        Ok(self)
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_yaml::from_str(input)?;
        file.into_registry()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Opening registry file {path:?}"))?;
        let registry = Registry::from_yaml_str(&raw)
            .with_context(|| format!("Loading registry from {path:?}"))?;
        debug!(
            "Loaded registry '{}' with {} field(s) from {:?}",
            registry.name,
            registry.fields.len(),
            path
        );
        Ok(registry)
    }

    /// The data-quality report registry compiled into the crate.
    pub fn builtin() -> Result<Self, RegistryError> {
        Registry::from_yaml_str(BUILTIN_REGISTRY)
    }

    pub fn builtin_yaml() -> &'static str {
        BUILTIN_REGISTRY
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[LogicalField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&LogicalField> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_excluded(&self, key: &str) -> bool {
        self.exclude.iter().any(|regex| regex.is_match(key))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    fields: Vec<FieldEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FieldEntry {
    Years { years: YearRange },
    Field(FieldSpec),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct YearRange {
    from: i32,
    to: i32,
    #[serde(default)]
    prefixes: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FieldSpec {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    kind: ValueKind,
    #[serde(default)]
    candidates: Vec<String>,
    #[serde(default)]
    numeric: Option<NumericPolicy>,
    #[serde(default)]
    fallback: Option<String>,
    #[serde(default)]
    group_by: bool,
}

impl FieldSpec {
    fn into_field(self) -> LogicalField {
        let mut field = LogicalField::new(self.name, self.kind);
        if let Some(label) = self.label {
            field = field.with_label(label);
        }
        if !self.candidates.is_empty() {
            field = field.with_candidates(self.candidates);
        }
        field.numeric = self.numeric;
        field.fallback = self.fallback;
        field.group_by = self.group_by;
        field
    }
}

impl YearRange {
    fn expand(self) -> Result<Vec<LogicalField>, RegistryError> {
        if self.from > self.to {
            return Err(RegistryError::EmptyYearRange {
                from: self.from,
                to: self.to,
            });
        }
        Ok((self.from..=self.to)
            .map(|year| {
                let year = year.to_string();
                let candidates = std::iter::once(year.clone())
                    .chain(self.prefixes.iter().map(|prefix| format!("{prefix}{year}")))
                    .collect::<Vec<_>>();
                LogicalField::new(year.clone(), ValueKind::Number)
                    .with_label(year)
                    .with_candidates(candidates)
                    .summable()
            })
            .collect())
    }
}

impl RegistryFile {
    fn into_registry(self) -> Result<Registry, RegistryError> {
        let mut fields = Vec::new();
        for entry in self.fields {
            match entry {
                FieldEntry::Years { years } => fields.extend(years.expand()?),
                FieldEntry::Field(spec) => fields.push(spec.into_field()),
            }
        }
        let name = self.name.unwrap_or_else(|| "registry".to_string());
        Registry::new(name, fields)?.with_exclusions(&self.exclude)
    }
}
