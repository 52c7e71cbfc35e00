mod common;

use chrono::NaiveDate;
use common::{dq_fixture, records};
use proptest::prelude::*;
use report_normalizer::{
    AggregateRole, LogicalField, Value, ValueKind,
    data::RawRecord,
    normalize::normalize_batch,
    registry::Registry,
    rollup::rollup,
};
use serde_json::json;

fn builtin() -> Registry {
    Registry::builtin().expect("built-in registry")
}

fn ymd(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

#[test]
fn fixture_rows_share_one_layout() {
    let registry = builtin();
    let batch = normalize_batch(&dq_fixture(), &registry);
    assert_eq!(batch.rows.len(), 4);
    assert_eq!(batch.columns.len(), registry.fields().len() + 2);
    for row in &batch.rows {
        let fields = row.cells().iter().map(|(name, _)| name.as_str());
        let expected = batch.columns.iter().map(|column| column.field.as_str());
        assert!(fields.eq(expected));
    }

    let extras = batch
        .columns
        .iter()
        .filter(|column| column.extra)
        .map(|column| column.field.as_str())
        .collect::<Vec<_>>();
    assert_eq!(extras, ["desk", "region"]);
}

#[test]
fn fixture_values_follow_field_kinds() {
    let batch = normalize_batch(&dq_fixture(), &builtin());
    let rows = &batch.rows;

    assert_eq!(rows[0].get("report_date"), Some(&ymd(2024, 3, 1)));
    assert_eq!(rows[0].get("2024"), Some(&Value::Number(12.0)));
    assert_eq!(rows[0].get("2021"), Some(&Value::Number(0.0)));
    assert_eq!(rows[0].get("std_value"), Some(&Value::Number(0.4)));
    assert_eq!(rows[0].get("is_outlier"), Some(&Value::Number(1.0)));
    assert_eq!(rows[0].get("rule_logic"), Some(&Value::Null));

    assert_eq!(rows[1].get("book"), Some(&text("RATES")));
    assert_eq!(rows[1].get("2024"), Some(&Value::Number(8.0)));
    assert_eq!(rows[1].get("z_score"), Some(&Value::Null));
    assert_eq!(rows[1].get("stale_date"), Some(&ymd(2024, 2, 29)));
    assert_eq!(rows[1].get("desk"), Some(&Value::Null));

    assert_eq!(rows[2].get("2024"), Some(&Value::Number(0.0)));
    assert_eq!(rows[2].get("2025"), Some(&Value::Number(3.0)));
    assert_eq!(rows[2].get("z_score"), Some(&Value::Number(2.5)));
    assert_eq!(rows[2].get("std_value"), Some(&Value::Null));
    assert_eq!(rows[2].get("mean_value"), Some(&Value::Null));
    assert_eq!(rows[2].get("is_outlier"), Some(&Value::Number(0.0)));
    assert_eq!(rows[2].get("region"), Some(&text("EU")));

    assert_eq!(rows[3].get("book"), Some(&text("")));
    assert_eq!(rows[3].get("is_outlier"), Some(&Value::Number(1.0)));
    assert_eq!(rows[3].get("unique_tag"), Some(&Value::Null));
}

#[test]
fn empty_stale_date_is_backfilled_from_report_date() {
    let batch = normalize_batch(&dq_fixture(), &builtin());
    assert_eq!(batch.rows[0].get("stale_date"), Some(&ymd(2024, 3, 1)));
    assert_eq!(batch.rows[2].get("stale_date"), Some(&ymd(2024, 3, 1)));
}

#[test]
fn placeholder_numbers_respect_numeric_policy() {
    let registry = Registry::new(
        "policy",
        vec![
            LogicalField::new("total", ValueKind::Number).summable(),
            LogicalField::new("z_score", ValueKind::Number).descriptive(),
        ],
    )
    .unwrap();
    let batch = normalize_batch(
        &records(vec![json!({ "total": "N/A", "z_score": "N/A" })]),
        &registry,
    );
    assert_eq!(batch.rows[0].get("total"), Some(&Value::Number(0.0)));
    assert_eq!(batch.rows[0].get("z_score"), Some(&Value::Null));
}

#[test]
fn prefixed_statistic_and_compact_date_normalize_end_to_end() {
    let registry = builtin();
    let batch = normalize_batch(
        &records(vec![
            json!({ "1.2 std_value": "0.41", "Report_Date": "20240301" }),
        ]),
        &registry,
    );
    let row = &batch.rows[0];
    assert_eq!(row.get("std_value"), Some(&Value::Number(0.41)));
    assert_eq!(row.get("report_date"), Some(&ymd(2024, 3, 1)));
    assert_eq!(row.get("stale_date"), Some(&ymd(2024, 3, 1)));
    assert_eq!(row.get("2023"), Some(&Value::Number(0.0)));
    assert_eq!(row.get("z_score"), Some(&Value::Null));
    assert_eq!(row.get("book"), Some(&text("")));
    assert_eq!(row.len(), registry.fields().len());
}

#[test]
fn stale_date_without_any_source_key_uses_report_date() {
    let registry = Registry::new(
        "stale",
        vec![
            LogicalField::new("std_value", ValueKind::Number).descriptive(),
            LogicalField::new("stale_date", ValueKind::Date).with_fallback("report_date"),
        ],
    )
    .unwrap();
    let batch = normalize_batch(
        &records(vec![
            json!({ "1.2 std_value": "0.41", "Report_Date": "20240301" }),
        ]),
        &registry,
    );
    let json = serde_json::to_value(&batch.rows[0]).unwrap();
    assert_eq!(json["std_value"], json!(0.41));
    assert_eq!(json["stale_date"], json!("2024-03-01"));
}

#[test]
fn empty_batch_still_describes_registry_columns() {
    let registry = builtin();
    let batch = normalize_batch(&[], &registry);
    assert!(batch.rows.is_empty());
    let fields = batch
        .columns
        .iter()
        .map(|column| column.field.as_str())
        .collect::<Vec<_>>();
    let expected = registry
        .fields()
        .iter()
        .map(LogicalField::name)
        .collect::<Vec<_>>();
    assert_eq!(fields, expected);
    assert!(batch.columns.iter().all(|column| column.source_key.is_none()));
}

#[test]
fn normalizing_twice_yields_identical_output() {
    let registry = builtin();
    let input = dq_fixture();
    let first = normalize_batch(&input, &registry);
    let second = normalize_batch(&input, &registry);
    assert_eq!(
        serde_json::to_string(&first.rows).unwrap(),
        serde_json::to_string(&second.rows).unwrap()
    );
    assert_eq!(first.columns, second.columns);
}

#[test]
fn canonical_json_uses_iso_dates_and_integral_numbers() {
    let batch = normalize_batch(&dq_fixture(), &builtin());
    let json = serde_json::to_value(&batch.rows[0]).unwrap();
    assert_eq!(json["report_date"], json!("2024-03-01"));
    assert_eq!(json["2024"], json!(12));
    assert_eq!(json["std_value"], json!(0.4));
    assert_eq!(json["z_score"], json!(1.25));
    assert_eq!(json["region"], json!(null));
}

#[test]
fn rollup_groups_by_grouping_fields_in_first_seen_order() {
    let batch = normalize_batch(&dq_fixture(), &builtin());
    let grouped = rollup(&batch.rows, &batch.columns);
    assert_eq!(grouped.len(), 3);

    let rates = &grouped[0];
    assert_eq!(rates.rows, 2);
    assert_eq!(rates.get("report_type"), Some(&text("summary")));
    assert_eq!(rates.get("book"), Some(&text("RATES")));
    assert_eq!(rates.get("2024"), Some(&Value::Number(20.0)));
    assert_eq!(rates.get("2023"), Some(&Value::Number(4.0)));
    assert_eq!(rates.get("z_score"), Some(&Value::Number(1.25)));
    assert_eq!(rates.get("mean_value"), Some(&Value::Number(9.5)));
    assert_eq!(rates.get("rule_type"), Some(&text("stale")));

    let fx = &grouped[1];
    assert_eq!(fx.get("book"), Some(&text("FX")));
    assert_eq!(fx.get("std_value"), Some(&Value::Null));

    assert_eq!(grouped[2].get("book"), Some(&text("")));
    assert_eq!(grouped[2].get("report_type"), Some(&text("detail")));

    let json = serde_json::to_value(rates).unwrap();
    assert_eq!(json["row_count"], json!(2));
}

#[test]
fn column_roles_follow_kind_and_policy() {
    let batch = normalize_batch(&[], &builtin());
    let role = |name: &str| {
        batch
            .columns
            .iter()
            .find(|column| column.field == name)
            .map(|column| column.role)
    };
    assert_eq!(role("book"), Some(AggregateRole::GroupBy));
    assert_eq!(role("2022"), Some(AggregateRole::Sum));
    assert_eq!(role("std_value"), Some(AggregateRole::Average));
    assert_eq!(role("is_outlier"), Some(AggregateRole::None));
    assert_eq!(role("report_date"), Some(AggregateRole::None));
}

fn raw_value() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(json!(null)),
        Just(json!("")),
        Just(json!("N/A")),
        Just(json!("20240301")),
        Just(json!("2024-03-01")),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z0-9 .]{0,8}".prop_map(|s| json!(s)),
    ]
}

fn raw_key() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("report_date".to_string()),
        Just("stale_date".to_string()),
        Just("zscore".to_string()),
        Just("2024".to_string()),
        Just("Y2023".to_string()),
        Just("book_nm".to_string()),
        Just("is_outlier".to_string()),
        "[a-z]{1,6}",
    ]
}

proptest! {
    #[test]
    fn every_row_matches_the_column_layout(
        batch in prop::collection::vec(
            prop::collection::btree_map(raw_key(), raw_value(), 0..6),
            0..6,
        )
    ) {
        let input = batch
            .into_iter()
            .map(|map| map.into_iter().collect())
            .collect::<Vec<RawRecord>>();
        let registry = builtin();
        let normalized = normalize_batch(&input, &registry);
        let again = normalize_batch(&input, &registry);
        prop_assert_eq!(
            serde_json::to_vec(&normalized.rows).unwrap(),
            serde_json::to_vec(&again.rows).unwrap()
        );
        prop_assert_eq!(normalized.rows.len(), input.len());
        for row in &normalized.rows {
            prop_assert_eq!(row.len(), normalized.columns.len());
            for column in &normalized.columns {
                let value = row.get(&column.field);
                prop_assert!(value.is_some());
                if column.role == AggregateRole::Sum {
                    prop_assert!(matches!(value, Some(Value::Number(_))));
                }
                if column.kind == ValueKind::Boolean && column.source_key.is_some() {
                    prop_assert!(matches!(value, Some(Value::Number(n)) if *n == 0.0 || *n == 1.0));
                }
            }
        }
    }
}
