//! Grouping and aggregation of flat record sets into chart buckets
//!
//! Every row lands in exactly one bucket. A bucket's `value` is either the
//! sum of a numeric Y field or a row count, and its `count` is always the
//! number of rows folded into it.

use crate::core::{FieldType, Record};
use crate::services::classifier::classify;
use crate::services::formatter::orderable_text;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

/// Bucket name for rows whose X value is missing or null
pub const UNKNOWN_BUCKET: &str = "Unknown";

/// One group of rows sharing an X value
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub name: String,
    /// Sum of a numeric Y field, or a count otherwise. Sums can be negative.
    pub value: f64,
    pub count: usize,
    /// Distinct raw Y values seen while counting a non-numeric Y field
    pub distinct_y_values: BTreeSet<String>,
}

impl Bucket {
    fn new(name: String) -> Self {
        Self {
            name,
            value: 0.0,
            count: 0,
            distinct_y_values: BTreeSet::new(),
        }
    }

    /// The Y value shared by every counted row, when there is exactly one
    pub fn single_y_value(&self) -> Option<&str> {
        if self.distinct_y_values.len() == 1 {
            self.distinct_y_values.iter().next().map(String::as_str)
        } else {
            None
        }
    }
}

/// Result of aggregating a dataset for one widget
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub buckets: Vec<Bucket>,
    pub x_type: FieldType,
    /// `None` when the widget has no Y field (count mode)
    pub y_type: Option<FieldType>,
}

impl Aggregation {
    pub fn total_rows(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

/// Group `records` by `x_field`, folding `y_field` into each group
///
/// Buckets come back in ascending order of their names when the X field is
/// numeric or date-like, and in first-seen order otherwise.
pub fn aggregate(
    records: &[Record],
    x_field: &str,
    y_field: Option<&str>,
    y_type: FieldType,
) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = record
            .get(x_field)
            .filter(|v| !v.is_null())
            .map(|v| v.key())
            .unwrap_or_else(|| UNKNOWN_BUCKET.to_string());

        let slot = match index.get(&key) {
            Some(slot) => *slot,
            None => {
                buckets.push(Bucket::new(key.clone()));
                index.insert(key, buckets.len() - 1);
                buckets.len() - 1
            }
        };
        let bucket = &mut buckets[slot];

        match y_field {
            None => bucket.value += 1.0,
            Some(y) if y_type == FieldType::Number => {
                bucket.value += record.get(y).and_then(|v| v.as_number()).unwrap_or(0.0);
            }
            Some(y) => {
                bucket.value += 1.0;
                if let Some(raw) = record.get(y).filter(|v| !v.is_null()) {
                    bucket.distinct_y_values.insert(raw.key());
                }
            }
        }
        bucket.count += 1;
    }

    if classify(records, x_field).is_ordered() {
        buckets.sort_by(|a, b| orderable_text(&a.name).total_cmp(&orderable_text(&b.name)));
    }

    trace!(
        x_field,
        y_field = y_field.unwrap_or("-"),
        rows = records.len(),
        buckets = buckets.len(),
        "aggregated dataset"
    );
    buckets
}

/// Classify both fields and aggregate, the way chart widgets need it
pub fn aggregate_fields(records: &[Record], x_field: &str, y_field: Option<&str>) -> Aggregation {
    let x_type = classify(records, x_field);
    let y_type = y_field.map(|y| classify(records, y));
    let buckets = aggregate(
        records,
        x_field,
        y_field,
        y_type.unwrap_or(FieldType::String),
    );
    Aggregation {
        buckets,
        x_type,
        y_type,
    }
}

/// Keep the first `cap` buckets in their current order
pub fn cap_buckets(mut buckets: Vec<Bucket>, cap: usize) -> Vec<Bucket> {
    buckets.truncate(cap);
    buckets
}

/// The `n` largest buckets by value, largest first; ties keep their order
pub fn top_by_value(mut buckets: Vec<Bucket>, n: usize) -> Vec<Bucket> {
    buckets.sort_by(|a, b| b.value.total_cmp(&a.value));
    buckets.truncate(n);
    buckets
}
