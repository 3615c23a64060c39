use crate::core::{MetricType, Record, Widget};
use crate::render::Presentation;
use crate::services::formatter::format_number;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricView {
    pub metric_type: MetricType,
    pub field: Option<String>,
    pub value: f64,
    pub display: String,
    /// Numeric values that went into the metric
    pub sample_size: usize,
}

impl MetricView {
    /// Caption under the big number, e.g. "Average of amount"
    pub fn caption(&self) -> String {
        match (&self.metric_type, &self.field) {
            (MetricType::Count, _) | (_, None) => "Total Records".to_string(),
            (kind, Some(field)) => format!("{} of {}", kind.label(), field),
        }
    }
}

pub fn render_metric(widget: &Widget, records: &[Record]) -> Presentation {
    let metric_type = widget.display_options.metric_type;
    if metric_type == MetricType::Count {
        let value = records.len() as f64;
        return Presentation::Metric(MetricView {
            metric_type,
            field: None,
            value,
            display: format_number(value),
            sample_size: records.len(),
        });
    }

    let Some(field) = widget.display_options.metric_field() else {
        return Presentation::needs_config(format!(
            "Choose a field to compute the {}",
            metric_type.label().to_lowercase()
        ));
    };

    let numbers: Vec<f64> = records
        .iter()
        .filter_map(|r| r.get(field).and_then(|v| v.as_number()))
        .collect();
    let Some(value) = compute(metric_type, &numbers) else {
        return Presentation::NotNumeric {
            field: field.to_string(),
        };
    };

    Presentation::Metric(MetricView {
        metric_type,
        field: Some(field.to_string()),
        value,
        display: format_number(value),
        sample_size: numbers.len(),
    })
}

/// Fold numbers into the metric; `None` when there are no numbers
fn compute(metric_type: MetricType, numbers: &[f64]) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    let sum: f64 = numbers.iter().sum();
    Some(match metric_type {
        MetricType::Count => numbers.len() as f64,
        MetricType::Sum => sum,
        MetricType::Average => sum / numbers.len() as f64,
        MetricType::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
        MetricType::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}
