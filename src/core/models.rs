use crate::core::types::{WidgetId, WidgetType};
use crate::core::value::Record;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Refresh interval used when a widget enables auto refresh without one
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

/// Row cap for tables and lists when the widget does not set one
pub const DEFAULT_MAX_ROWS: usize = 10;

/// Donut hole sizes the chart editor offers, as a percentage of the radius
pub const INNER_RADIUS_PRESETS: [u8; 4] = [0, 40, 60, 80];

/// How chart legends and tooltips label a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMode {
    /// Describe the measure ("Sum of amount", "Record Count")
    #[default]
    Field,
    /// Show the bucket's single distinct Y value when it has one
    Value,
}

/// Inner radius of a pie chart, snapped to one of [`INNER_RADIUS_PRESETS`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct InnerRadius(u8);

impl InnerRadius {
    pub fn snap(requested: f64) -> Self {
        let nearest = INNER_RADIUS_PRESETS
            .iter()
            .copied()
            .min_by(|a, b| {
                let da = (f64::from(*a) - requested).abs();
                let db = (f64::from(*b) - requested).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(0);
        Self(nearest)
    }

    pub fn percent(&self) -> u8 {
        self.0
    }

    pub fn is_donut(&self) -> bool {
        self.0 > 0
    }
}

impl<'de> Deserialize<'de> for InnerRadius {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.map(Self::snap).unwrap_or_default())
    }
}

/// Field mappings and toggles for chart widgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChartConfig {
    pub x_axis_field: Option<String>,
    pub y_axis_field: Option<String>,
    pub y_axis_label_mode: LabelMode,
    pub primary_color: String,
    pub show_legend: bool,
    pub show_grid: bool,
    pub show_labels: bool,
    pub show_percentage: bool,
    pub inner_radius: InnerRadius,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            x_axis_field: None,
            y_axis_field: None,
            y_axis_label_mode: LabelMode::Field,
            primary_color: "#3b82f6".to_string(),
            show_legend: true,
            show_grid: true,
            show_labels: true,
            show_percentage: false,
            inner_radius: InnerRadius::default(),
        }
    }
}

impl ChartConfig {
    /// X field with blank strings treated as unset
    pub fn x_field(&self) -> Option<&str> {
        non_blank(self.x_axis_field.as_deref())
    }

    /// Y field with blank strings treated as unset
    pub fn y_field(&self) -> Option<&str> {
        non_blank(self.y_axis_field.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    #[default]
    Count,
    Sum,
    Average,
    Min,
    Max,
}

impl MetricType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Count => "Count",
            Self::Sum => "Sum",
            Self::Average => "Average",
            Self::Min => "Min",
            Self::Max => "Max",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
    #[serde(alias = "xl")]
    XLarge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Type-specific presentation options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayOptions {
    #[serde(deserialize_with = "de_loose_usize")]
    pub max_rows: Option<usize>,
    #[serde(deserialize_with = "de_loose_usize")]
    pub max_items: Option<usize>,
    pub list_fields: Vec<String>,
    pub metric_type: MetricType,
    pub metric_field: Option<String>,
    pub text_field: Option<String>,
    pub font_size: FontSize,
    pub text_align: TextAlign,
    pub text_color: Option<String>,
    pub auto_refresh: bool,
    #[serde(deserialize_with = "de_loose_u64")]
    pub refresh_interval: Option<u64>,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            max_rows: None,
            max_items: None,
            list_fields: Vec::new(),
            metric_type: MetricType::Count,
            metric_field: None,
            text_field: None,
            font_size: FontSize::Medium,
            text_align: TextAlign::Left,
            text_color: None,
            auto_refresh: false,
            refresh_interval: None,
        }
    }
}

impl DisplayOptions {
    pub fn row_cap(&self) -> usize {
        self.max_rows.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_ROWS)
    }

    pub fn item_cap(&self) -> usize {
        self.max_items.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_ROWS)
    }

    pub fn metric_field(&self) -> Option<&str> {
        non_blank(self.metric_field.as_deref())
    }

    pub fn text_field(&self) -> Option<&str> {
        non_blank(self.text_field.as_deref())
    }
}

/// Grid position and size of a widget, in grid units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

/// Body of a layout persistence request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryPatch {
    pub position_x: u16,
    pub position_y: u16,
    pub width: u16,
    pub height: u16,
}

impl From<Geometry> for GeometryPatch {
    fn from(g: Geometry) -> Self {
        Self {
            position_x: g.x,
            position_y: g.y,
            width: g.w,
            height: g.h,
        }
    }
}

/// What a widget asks the report API for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportQuery {
    pub report_type: String,
    pub filters: Value,
}

/// A widget definition as stored by the persistence API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: WidgetId,
    #[serde(default)]
    pub title: String,
    pub widget_type: WidgetType,
    #[serde(default)]
    pub report_type: String,
    #[serde(default = "empty_filters", deserialize_with = "de_filters")]
    pub filters: Value,
    #[serde(default)]
    pub selected_fields: Vec<String>,
    #[serde(default, deserialize_with = "de_or_default")]
    pub chart_config: ChartConfig,
    #[serde(default, deserialize_with = "de_or_default")]
    pub display_options: DisplayOptions,
    #[serde(default)]
    pub position_x: u16,
    #[serde(default)]
    pub position_y: u16,
    #[serde(default = "default_width")]
    pub width: u16,
    #[serde(default = "default_height")]
    pub height: u16,
}

impl Widget {
    /// Create a widget with default configuration
    pub fn new(title: impl Into<String>, widget_type: WidgetType, report_type: impl Into<String>) -> Self {
        Self {
            id: WidgetId::new(),
            title: title.into(),
            widget_type,
            report_type: report_type.into(),
            filters: empty_filters(),
            selected_fields: Vec::new(),
            chart_config: ChartConfig::default(),
            display_options: DisplayOptions::default(),
            position_x: 0,
            position_y: 0,
            width: default_width(),
            height: default_height(),
        }
    }

    pub fn geometry(&self) -> Geometry {
        Geometry {
            x: self.position_x,
            y: self.position_y,
            w: self.width,
            h: self.height,
        }
    }

    pub fn set_geometry(&mut self, g: Geometry) {
        self.position_x = g.x;
        self.position_y = g.y;
        self.width = g.w;
        self.height = g.h;
    }

    pub fn query(&self) -> ReportQuery {
        ReportQuery {
            report_type: self.report_type.clone(),
            filters: self.filters.clone(),
        }
    }

    pub fn auto_refresh(&self) -> bool {
        self.display_options.auto_refresh
    }

    /// Card title, falling back to the widget kind when untitled
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            self.widget_type.label()
        } else {
            &self.title
        }
    }
}

/// A dashboard and its widgets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub id: WidgetId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub widgets: Vec<Widget>,
}

/// Transient per-widget data, owned by the refresh scheduler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetRuntimeState {
    pub dataset: Vec<Record>,
    pub loading: bool,
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl WidgetRuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(dataset: Vec<Record>) -> Self {
        Self {
            dataset,
            ..Self::default()
        }
    }

    pub fn with_error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn default_width() -> u16 {
    4
}

fn default_height() -> u16 {
    3
}

fn empty_filters() -> Value {
    Value::Object(Default::default())
}

fn de_filters<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
    // Some API versions store filters as a JSON-encoded string
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        None | Some(Value::Null) => empty_filters(),
        Some(Value::String(s)) if s.trim().is_empty() => empty_filters(),
        Some(Value::String(s)) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
        Some(v) => v,
    })
}

fn de_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn de_loose_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    })
}

fn de_loose_usize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    Ok(de_loose_u64(deserializer)?.map(|n| n as usize))
}
