use crate::core::{FieldValue, Record, Widget};
use crate::render::Presentation;
use crate::services::formatter::format_value;

/// Number of legacy `selected_fields` a list falls back to
const LEGACY_LIST_FIELDS: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows in the dataset before the row cap was applied
    pub total_rows: usize,
}

impl TableView {
    pub fn is_truncated(&self) -> bool {
        self.rows.len() < self.total_rows
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListItem {
    pub title: String,
    pub details: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListView {
    pub items: Vec<ListItem>,
    pub total_items: usize,
}

fn cell(record: &Record, field: &str) -> String {
    format_value(record.get(field).unwrap_or(&FieldValue::Null))
}

pub fn render_table(widget: &Widget, records: &[Record]) -> Presentation {
    let columns: Vec<String> = widget
        .selected_fields
        .iter()
        .filter(|f| !f.trim().is_empty())
        .cloned()
        .collect();
    if columns.is_empty() {
        return Presentation::needs_config("Select the fields this table should show");
    }

    let rows = records
        .iter()
        .take(widget.display_options.row_cap())
        .map(|r| columns.iter().map(|c| cell(r, c)).collect())
        .collect();

    Presentation::Table(TableView {
        columns,
        rows,
        total_rows: records.len(),
    })
}

/// Fields a list widget shows: `listFields`, else the first legacy selected fields
pub fn list_fields(widget: &Widget) -> Vec<String> {
    let explicit: Vec<String> = widget
        .display_options
        .list_fields
        .iter()
        .filter(|f| !f.trim().is_empty())
        .cloned()
        .collect();
    if !explicit.is_empty() {
        return explicit;
    }
    widget
        .selected_fields
        .iter()
        .filter(|f| !f.trim().is_empty())
        .take(LEGACY_LIST_FIELDS)
        .cloned()
        .collect()
}

pub fn render_list(widget: &Widget, records: &[Record]) -> Presentation {
    let fields = list_fields(widget);
    let Some((lead, rest)) = fields.split_first() else {
        return Presentation::needs_config("Select at least one field for this list");
    };

    let items = records
        .iter()
        .take(widget.display_options.item_cap())
        .map(|r| ListItem {
            title: cell(r, lead),
            details: rest.iter().map(|f| (f.clone(), cell(r, f))).collect(),
        })
        .collect();

    Presentation::List(ListView {
        items,
        total_items: records.len(),
    })
}
