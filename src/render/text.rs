use crate::core::{FieldValue, FontSize, Record, TextAlign, Widget};
use crate::render::Presentation;
use crate::services::formatter::format_value;

/// Characters shown before a text widget is cut off with an ellipsis
pub const TEXT_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct TextView {
    pub field: String,
    /// What the card shows, possibly truncated
    pub text: String,
    /// The untruncated value, for hover titles
    pub full_text: String,
    pub font_size: FontSize,
    pub align: TextAlign,
    pub color: Option<String>,
}

impl TextView {
    pub fn is_truncated(&self) -> bool {
        self.text != self.full_text
    }
}

/// Show one field of the first record; this widget never aggregates
pub fn render_text(widget: &Widget, records: &[Record]) -> Presentation {
    let options = &widget.display_options;
    let Some(field) = options.text_field() else {
        return Presentation::needs_config("Choose the field this text widget shows");
    };

    let full_text = records
        .first()
        .and_then(|r| r.get(field))
        .map(format_value)
        .unwrap_or_else(|| format_value(&FieldValue::Null));

    Presentation::Text(TextView {
        field: field.to_string(),
        text: truncate(&full_text, TEXT_LIMIT),
        full_text,
        font_size: options.font_size,
        align: options.text_align,
        color: options.text_color.clone(),
    })
}

fn truncate(s: &str, limit: usize) -> String {
    if s.chars().count() <= limit {
        return s.to_string();
    }
    let mut out: String = s.chars().take(limit).collect();
    out.push_str("...");
    out
}
