use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for dashboard widgets
///
/// The persistence API hands out either integer or string ids, so both are
/// accepted on the way in and the id is kept in its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(String);

impl WidgetId {
    /// Create a new unique widget ID for a widget not yet known to the API
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WidgetId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WidgetId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Widget id cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<i64> for WidgetId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for WidgetId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for WidgetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Ids that came in as integers go back out as integers
        match self.0.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for WidgetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Int(n) => Ok(Self::from(n)),
            RawId::Text(s) => Self::from_str(&s).map_err(serde::de::Error::custom),
        }
    }
}

/// Runtime type of a field, inferred from a sample of its values
///
/// Never stored: it must be recomputed whenever the dataset changes because
/// the same field name can hold different types across report sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Date,
    Number,
    String,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Number => "number",
            Self::String => "string",
        }
    }

    /// Whether values of this type have a natural ascending order
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Date | Self::Number)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of dashboard widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetType {
    Table,
    List,
    MetricCard,
    BarChart,
    LineChart,
    PieChart,
    TextField,
}

impl WidgetType {
    pub const ALL: [WidgetType; 7] = [
        Self::Table,
        Self::List,
        Self::MetricCard,
        Self::BarChart,
        Self::LineChart,
        Self::PieChart,
        Self::TextField,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::List => "list",
            Self::MetricCard => "metric_card",
            Self::BarChart => "bar_chart",
            Self::LineChart => "line_chart",
            Self::PieChart => "pie_chart",
            Self::TextField => "text_field",
        }
    }

    /// Human readable name used in card titles
    pub fn label(&self) -> &'static str {
        match self {
            Self::Table => "Table",
            Self::List => "List",
            Self::MetricCard => "Metric",
            Self::BarChart => "Bar Chart",
            Self::LineChart => "Line Chart",
            Self::PieChart => "Pie Chart",
            Self::TextField => "Text",
        }
    }

    /// Chart and metric widgets go through the aggregator, the rest render rows directly
    pub fn is_aggregated(&self) -> bool {
        matches!(
            self,
            Self::BarChart | Self::LineChart | Self::PieChart | Self::MetricCard
        )
    }
}

impl fmt::Display for WidgetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WidgetType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| format!("Unknown widget type: {}", s))
    }
}
