//! Compact display strings and sort keys for field values

use crate::core::FieldValue;

const DATE_FORMAT: &str = "%-m/%-d/%Y";
const DATETIME_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Render a value as a short human string
pub fn format_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "N/A".to_string(),
        FieldValue::Date(date) => match date.parsed {
            Some(dt) if date.has_time => dt.format(DATETIME_FORMAT).to_string(),
            Some(dt) => dt.format(DATE_FORMAT).to_string(),
            // Date-shaped but not a real date: show what the source sent
            None => date.raw.clone(),
        },
        FieldValue::Number { value, .. } => format_number(*value),
        FieldValue::Text(s) => s.clone(),
    }
}

/// Render a raw string (e.g. a bucket name) the way the source value would render
pub fn format_text(raw: &str) -> String {
    format_value(&FieldValue::from_text(raw))
}

/// K/M-suffixed numbers, two decimals for fractions, grouped integers otherwise
pub fn format_number(n: f64) -> String {
    let magnitude = n.abs();
    if magnitude >= 1_000_000.0 {
        format!("{:.1}M", n / 1_000_000.0)
    } else if magnitude >= 1_000.0 {
        format!("{:.1}K", n / 1_000.0)
    } else if n.fract() != 0.0 {
        format!("{:.2}", n)
    } else {
        group_thousands(n as i64)
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        out.insert(0, '-');
    }
    out
}

/// Numeric projection of a value for sort comparisons
///
/// Strings project to their length. That is only a tie-break ordering; code
/// that needs a lexical order must compare the strings itself.
pub fn to_orderable(value: &FieldValue) -> f64 {
    match value {
        FieldValue::Null => 0.0,
        FieldValue::Date(date) => date.epoch_millis().map(|ms| ms as f64).unwrap_or(0.0),
        FieldValue::Number { value, .. } => *value,
        FieldValue::Text(s) => s.chars().count() as f64,
    }
}

/// Sort key for a raw string such as a bucket name
pub fn orderable_text(raw: &str) -> f64 {
    to_orderable(&FieldValue::from_text(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DateText;

    #[test]
    fn test_null_is_na() {
        assert_eq!(format_value(&FieldValue::Null), "N/A");
    }

    #[test]
    fn test_number_suffixes() {
        assert_eq!(format_number(2_500_000.0), "2.5M");
        assert_eq!(format_number(1_000_000.0), "1.0M");
        assert_eq!(format_number(1_500.0), "1.5K");
        assert_eq!(format_number(-1_500.0), "-1.5K");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(3.14159), "3.14");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(-42.0), "-42");
    }

    #[test]
    fn test_grouping() {
        assert_eq!(group_thousands(1234567), "1,234,567");
        assert_eq!(group_thousands(-1000), "-1,000");
        assert_eq!(group_thousands(12), "12");
    }

    #[test]
    fn test_dates_render_locale_style() {
        assert_eq!(format_text("2024-03-05"), "3/5/2024");
        assert_eq!(format_text("2024-03-05T14:07:09"), "3/5/2024, 2:07:09 PM");
    }

    #[test]
    fn test_unparsable_dates_fall_through() {
        assert_eq!(format_text("2024-13-45"), "2024-13-45");
    }

    #[test]
    fn test_text_passes_through() {
        assert_eq!(format_text("Acme Corp"), "Acme Corp");
        assert_eq!(format_text("12"), "12");
    }

    #[test]
    fn test_format_is_stable() {
        let v = FieldValue::Date(DateText::parse("2024-01-01T00:00:00Z"));
        assert_eq!(format_value(&v), format_value(&v));
    }

    #[test]
    fn test_orderable_projection() {
        assert_eq!(orderable_text("2024-01-01"), 1_704_067_200_000.0);
        assert_eq!(orderable_text("2024-13-45"), 0.0);
        assert_eq!(orderable_text("12.5"), 12.5);
        assert_eq!(orderable_text("won"), 3.0);
        assert_eq!(to_orderable(&FieldValue::Null), 0.0);
    }
}
