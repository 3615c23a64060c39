//! Runtime type inference for fields nobody declared

use crate::core::{FieldType, FieldValue, Record};

/// Number of non-null values inspected per field
pub const SAMPLE_SIZE: usize = 10;

/// Share of the sample that must agree before a field is typed
pub const TYPE_THRESHOLD: f64 = 0.7;

/// Infer the type of `field` from the first non-null values in `records`
///
/// Dates win over numbers, and anything ambiguous is a string so that the
/// aggregator falls back to counting instead of summing garbage.
pub fn classify(records: &[Record], field: &str) -> FieldType {
    let sample: Vec<&FieldValue> = records
        .iter()
        .filter_map(|r| r.get(field))
        .filter(|v| !v.is_null())
        .take(SAMPLE_SIZE)
        .collect();

    classify_sample(&sample)
}

fn classify_sample(sample: &[&FieldValue]) -> FieldType {
    if sample.is_empty() {
        return FieldType::String;
    }
    let total = sample.len() as f64;
    let dates = sample.iter().filter(|v| v.is_date_like()).count() as f64;
    if dates / total >= TYPE_THRESHOLD {
        return FieldType::Date;
    }
    let numbers = sample.iter().filter(|v| v.is_numeric()).count() as f64;
    if numbers / total >= TYPE_THRESHOLD {
        return FieldType::Number;
    }
    FieldType::String
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(field: &str, values: &[serde_json::Value]) -> Vec<Record> {
        values
            .iter()
            .map(|v| [(field, FieldValue::from_json(v))].into_iter().collect())
            .collect()
    }

    #[test]
    fn test_empty_sample_is_string() {
        assert_eq!(classify(&[], "amount"), FieldType::String);
        let all_null = records("amount", &[json!(null), json!(null)]);
        assert_eq!(classify(&all_null, "amount"), FieldType::String);
        assert_eq!(classify(&all_null, "missing"), FieldType::String);
    }

    #[test]
    fn test_numeric_strings_are_numbers() {
        let data = records("amount", &[json!("10"), json!(20), json!("3.5")]);
        assert_eq!(classify(&data, "amount"), FieldType::Number);
    }

    #[test]
    fn test_dates_detected() {
        let data = records(
            "created_at",
            &[json!("2024-01-01"), json!("2024-03-01T10:00:00Z"), json!("2/1/2024")],
        );
        assert_eq!(classify(&data, "created_at"), FieldType::Date);
    }

    #[test]
    fn test_threshold_is_seventy_percent() {
        // 7 of 10 numeric -> number
        let mut values: Vec<_> = (0..7).map(|i| json!(i)).collect();
        values.extend((0..3).map(|_| json!("n/a")));
        assert_eq!(classify(&records("v", &values), "v"), FieldType::Number);

        // 6 of 10 numeric -> string
        let mut values: Vec<_> = (0..6).map(|i| json!(i)).collect();
        values.extend((0..4).map(|_| json!("n/a")));
        assert_eq!(classify(&records("v", &values), "v"), FieldType::String);
    }

    #[test]
    fn test_only_first_ten_values_sampled() {
        let mut values: Vec<_> = (0..10).map(|_| json!("new")).collect();
        values.extend((0..50).map(|i| json!(i)));
        assert_eq!(classify(&records("v", &values), "v"), FieldType::String);
    }

    #[test]
    fn test_nulls_skipped_when_sampling() {
        let mut values: Vec<_> = (0..20).map(|_| json!(null)).collect();
        values.extend([json!(1), json!(2)]);
        assert_eq!(classify(&records("v", &values), "v"), FieldType::Number);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let data = records("v", &[json!("a"), json!(1), json!("2024-01-01")]);
        let first = classify(&data, "v");
        for _ in 0..5 {
            assert_eq!(classify(&data, "v"), first);
        }
    }
}
