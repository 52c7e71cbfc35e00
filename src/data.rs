//! Raw record alias and the canonical cell [`Value`].
//!
//! Raw values arrive as JSON primitives with no contract on their types, so
//! every coercion helper here is total: a value that cannot be read as the
//! requested kind degrades to `None` and the caller applies its own default.

use std::fmt;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A flat record exactly as the data source produced it. Key order is the
/// source order.
pub type RawRecord = serde_json::Map<String, JsonValue>;

/// Largest magnitude at which an `f64` still represents every integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Number(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Null and empty text both count as "no value" when rolling up.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn flag(truthy: bool) -> Self {
        Value::Number(if truthy { 1.0 } else { 0.0 })
    }

    /// Verbatim conversion used for pass-through columns.
    pub fn from_json(raw: &JsonValue) -> Self {
        match raw {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            JsonValue::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Number(n) => {
                if let Some(int) = integral(*n) {
                    serializer.serialize_i64(int)
                } else {
                    serializer.serialize_f64(*n)
                }
            }
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
        }
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER).then_some(value as i64)
}

pub fn format_number(value: f64) -> String {
    match integral(value) {
        Some(int) => int.to_string(),
        None => value.to_string(),
    }
}

/// True for a missing key, JSON null and blank strings.
pub fn is_nil_or_empty(raw: Option<&JsonValue>) -> bool {
    match raw {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Reads a raw value as a finite number. Booleans count as 1/0; strings are
/// trimmed and must parse completely.
pub fn coerce_number(raw: Option<&JsonValue>) -> Option<f64> {
    let parsed = match raw? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        JsonValue::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|n| n.is_finite())
}

/// Collapses a raw value to a 0/1 flag. Numeric-looking values are non-zero
/// tested; anything else follows loose truthiness (any non-empty string, array
/// or object is truthy).
pub fn coerce_flag(raw: Option<&JsonValue>) -> bool {
    if let Some(n) = coerce_number(raw) {
        return n != 0.0;
    }
    match raw {
        None | Some(JsonValue::Null) => false,
        Some(JsonValue::Bool(b)) => *b,
        Some(JsonValue::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

/// Renders a raw value as text; null and missing values stay `None`.
pub fn coerce_text(raw: Option<&JsonValue>) -> Option<String> {
    match raw? {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        // Floats render like the canonical number cells, so `1.0` is "1".
        JsonValue::Number(n) => Some(match n.as_f64() {
            Some(float) if n.is_f64() => format_number(float),
            _ => n.to_string(),
        }),
        JsonValue::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerce_number_rejects_placeholders_and_non_finite() {
        assert_eq!(coerce_number(Some(&json!("0.41"))), Some(0.41));
        assert_eq!(coerce_number(Some(&json!(" 12 "))), Some(12.0));
        assert_eq!(coerce_number(Some(&json!(7))), Some(7.0));
        assert_eq!(coerce_number(Some(&json!(true))), Some(1.0));
        assert_eq!(coerce_number(Some(&json!("N/A"))), None);
        assert_eq!(coerce_number(Some(&json!("inf"))), None);
        assert_eq!(coerce_number(Some(&json!(""))), None);
        assert_eq!(coerce_number(Some(&JsonValue::Null)), None);
        assert_eq!(coerce_number(None), None);
    }

    #[test]
    fn coerce_flag_prefers_numeric_reading() {
        assert!(coerce_flag(Some(&json!("1"))));
        assert!(!coerce_flag(Some(&json!("0"))));
        assert!(coerce_flag(Some(&json!(2))));
        assert!(!coerce_flag(Some(&json!(0.0))));
        assert!(coerce_flag(Some(&json!("yes"))));
        assert!(!coerce_flag(Some(&json!(""))));
        assert!(!coerce_flag(Some(&JsonValue::Null)));
        assert!(!coerce_flag(None));
        assert!(!coerce_flag(Some(&json!(false))));
    }

    #[test]
    fn coerce_text_renders_primitives() {
        assert_eq!(coerce_text(Some(&json!("GL"))), Some("GL".to_string()));
        assert_eq!(coerce_text(Some(&json!(42))), Some("42".to_string()));
        assert_eq!(coerce_text(Some(&json!(false))), Some("false".to_string()));
        assert_eq!(coerce_text(Some(&JsonValue::Null)), None);
        assert_eq!(coerce_text(Some(&json!(1.0))), Some("1".to_string()));
        assert_eq!(coerce_text(Some(&json!(2.5))), Some("2.5".to_string()));
        assert_eq!(
            coerce_text(Some(&json!(u64::MAX))),
            Some(u64::MAX.to_string())
        );
    }

    #[test]
    fn whitespace_only_strings_count_as_empty() {
        assert!(is_nil_or_empty(Some(&json!("   "))));
        assert!(is_nil_or_empty(Some(&json!("\t"))));
        assert!(is_nil_or_empty(None));
        assert!(!is_nil_or_empty(Some(&json!(" x "))));
        assert!(!is_nil_or_empty(Some(&json!(0))));
    }

    #[test]
    fn integral_numbers_serialize_without_fraction() {
        let rendered = serde_json::to_string(&vec![
            Value::Number(3.0),
            Value::Number(0.25),
            Value::Null,
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        ])
        .unwrap();
        assert_eq!(rendered, r#"[3,0.25,null,"2024-03-01"]"#);
    }

    #[test]
    fn blank_values_cover_null_and_empty_text() {
        assert!(Value::Null.is_blank());
        assert!(Value::Text(String::new()).is_blank());
        assert!(!Value::Number(0.0).is_blank());
        assert_eq!(Value::Number(1.5).as_display(), "1.5");
        assert_eq!(Value::flag(true), Value::Number(1.0));
    }
}
