//! Pure mapping from a widget and its runtime state to what a card shows
//!
//! `render` is the single dispatcher over [`WidgetType`]. Each kind has its
//! own function; all of them share the same precedence of failure states:
//! a fetch error beats an empty dataset, which beats missing configuration.

pub mod chart;
pub mod metric;
pub mod plain;
pub mod table;
pub mod text;

pub use chart::{ChartPoint, ChartView, PieSlice, PieView};
pub use metric::MetricView;
pub use plain::plain_text;
pub use table::{ListItem, ListView, TableView};
pub use text::TextView;

use crate::core::{Widget, WidgetRuntimeState, WidgetType};

/// Body of a widget card
#[derive(Debug, Clone, PartialEq)]
pub enum Presentation {
    /// The last fetch failed; the host offers a retry
    Error { message: String, retryable: bool },
    /// First fetch still in flight, nothing to show yet
    Loading,
    /// The fetch succeeded but returned no rows
    Empty,
    /// A required field mapping is missing
    NeedsConfig { message: String },
    /// The configured field holds no numbers at all
    NotNumeric { field: String },
    Table(TableView),
    List(ListView),
    Metric(MetricView),
    BarChart(ChartView),
    LineChart(ChartView),
    PieChart(PieView),
    Text(TextView),
}

impl Presentation {
    pub fn needs_config(message: impl Into<String>) -> Self {
        Self::NeedsConfig {
            message: message.into(),
        }
    }
}

/// A widget card ready for the host to draw
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedWidget {
    pub title: String,
    pub widget_type: WidgetType,
    /// A visible (non-silent) refresh is in flight
    pub loading: bool,
    pub body: Presentation,
}

/// Render one widget from a snapshot of its runtime state
pub fn render(widget: &Widget, state: &WidgetRuntimeState) -> RenderedWidget {
    RenderedWidget {
        title: widget.display_title().to_string(),
        widget_type: widget.widget_type,
        loading: state.loading,
        body: render_body(widget, state),
    }
}

fn render_body(widget: &Widget, state: &WidgetRuntimeState) -> Presentation {
    if let Some(message) = &state.error {
        return Presentation::Error {
            message: message.clone(),
            retryable: true,
        };
    }
    if state.dataset.is_empty() {
        return if state.loading && state.last_updated.is_none() {
            Presentation::Loading
        } else {
            Presentation::Empty
        };
    }

    let records = &state.dataset;
    match widget.widget_type {
        WidgetType::Table => table::render_table(widget, records),
        WidgetType::List => table::render_list(widget, records),
        WidgetType::MetricCard => metric::render_metric(widget, records),
        WidgetType::BarChart => chart::render_bar(widget, records),
        WidgetType::LineChart => chart::render_line(widget, records),
        WidgetType::PieChart => chart::render_pie(widget, records),
        WidgetType::TextField => text::render_text(widget, records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldValue, Record};
    use chrono::Utc;

    fn one_row() -> Vec<Record> {
        vec![[("status", FieldValue::Text("new".into()))].into_iter().collect()]
    }

    #[test]
    fn test_error_beats_everything() {
        for kind in WidgetType::ALL {
            let widget = Widget::new("w", kind, "leads");
            let mut state = WidgetRuntimeState::with_dataset(one_row());
            state.error = Some("HTTP 500".to_string());

            let rendered = render(&widget, &state);
            assert_eq!(
                rendered.body,
                Presentation::Error {
                    message: "HTTP 500".to_string(),
                    retryable: true
                }
            );
        }
    }

    #[test]
    fn test_empty_beats_missing_config() {
        for kind in WidgetType::ALL {
            let widget = Widget::new("w", kind, "leads");
            let mut state = WidgetRuntimeState::new();
            state.last_updated = Some(Utc::now());

            assert_eq!(render(&widget, &state).body, Presentation::Empty, "{kind}");
        }
    }

    #[test]
    fn test_missing_config_when_data_present() {
        for kind in WidgetType::ALL {
            if kind == WidgetType::MetricCard {
                // count needs no field
                continue;
            }
            let widget = Widget::new("w", kind, "leads");
            let state = WidgetRuntimeState::with_dataset(one_row());

            assert!(
                matches!(render(&widget, &state).body, Presentation::NeedsConfig { .. }),
                "{kind}"
            );
        }
    }

    #[test]
    fn test_first_load_shows_loading() {
        let widget = Widget::new("w", WidgetType::Table, "leads");
        let state = WidgetRuntimeState {
            loading: true,
            ..Default::default()
        };
        let rendered = render(&widget, &state);

        assert!(rendered.loading);
        assert_eq!(rendered.body, Presentation::Loading);
    }
}
