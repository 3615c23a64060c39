//! Plain-text rendering of a widget card, for non-interactive output

use std::fmt::Write;

use crate::render::{Presentation, RenderedWidget};

/// A widget card as a block of text: a header line, then its body
pub fn plain_text(rendered: &RenderedWidget) -> String {
    let mut out = format!("== {} ({}) ==\n", rendered.title, rendered.widget_type.label());

    // Writes into a String cannot fail
    let _ = match &rendered.body {
        Presentation::Error { message, retryable } => {
            let retry = if *retryable { " (retry available)" } else { "" };
            writeln!(out, "error: {message}{retry}")
        }
        Presentation::Loading => writeln!(out, "loading..."),
        Presentation::Empty => writeln!(out, "No data available"),
        Presentation::NeedsConfig { message } => writeln!(out, "needs configuration: {message}"),
        Presentation::NotNumeric { field } => writeln!(out, "field \"{field}\" has no numeric values"),
        Presentation::Table(view) => {
            let _ = writeln!(out, "{}", view.columns.join(" | "));
            for row in &view.rows {
                let _ = writeln!(out, "{}", row.join(" | "));
            }
            if view.is_truncated() {
                writeln!(out, "({} of {} rows)", view.rows.len(), view.total_rows)
            } else {
                Ok(())
            }
        }
        Presentation::List(view) => {
            for item in &view.items {
                let _ = writeln!(out, "- {}", item.title);
                for (field, value) in &item.details {
                    let _ = writeln!(out, "    {field}: {value}");
                }
            }
            Ok(())
        }
        Presentation::Metric(view) => writeln!(out, "{}  {}", view.display, view.caption()),
        Presentation::BarChart(view) | Presentation::LineChart(view) => {
            let _ = writeln!(out, "{} by {}", view.series_label, view.x_field);
            for point in &view.points {
                let _ = writeln!(out, "{}: {}", point.display_name, point.display_value);
            }
            if view.total_buckets > view.points.len() {
                writeln!(out, "(top {} of {} groups)", view.points.len(), view.total_buckets)
            } else {
                Ok(())
            }
        }
        Presentation::PieChart(view) => {
            let _ = writeln!(out, "{} by {}", view.series_label, view.x_field);
            for slice in &view.slices {
                let _ = writeln!(out, "{} ({:.1}%)", slice.tooltip, slice.percentage);
            }
            Ok(())
        }
        Presentation::Text(view) => writeln!(out, "{}", view.text),
    };
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WidgetType;
    use crate::render::{MetricView, TableView};
    use crate::core::MetricType;
    use pretty_assertions::assert_eq;

    fn rendered(widget_type: WidgetType, body: Presentation) -> RenderedWidget {
        RenderedWidget {
            title: "Deals".to_string(),
            widget_type,
            loading: false,
            body,
        }
    }

    #[test]
    fn test_metric_line() {
        let view = MetricView {
            metric_type: MetricType::Sum,
            field: Some("amount".to_string()),
            value: 1500.0,
            display: "1.5K".to_string(),
            sample_size: 3,
        };
        let text = plain_text(&rendered(WidgetType::MetricCard, Presentation::Metric(view)));
        assert_eq!(text, "== Deals (Metric) ==\n1.5K  Sum of amount\n");
    }

    #[test]
    fn test_truncated_table() {
        let view = TableView {
            columns: vec!["name".to_string(), "stage".to_string()],
            rows: vec![vec!["Acme".to_string(), "won".to_string()]],
            total_rows: 3,
        };
        let text = plain_text(&rendered(WidgetType::Table, Presentation::Table(view)));
        assert_eq!(
            text,
            "== Deals (Table) ==\nname | stage\nAcme | won\n(1 of 3 rows)\n"
        );
    }

    #[test]
    fn test_error_mentions_retry() {
        let body = Presentation::Error {
            message: "Request failed: offline".to_string(),
            retryable: true,
        };
        let text = plain_text(&rendered(WidgetType::PieChart, body));
        assert!(text.ends_with("error: Request failed: offline (retry available)\n"));
    }
}
