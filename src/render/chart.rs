use crate::core::{ChartConfig, FieldType, InnerRadius, LabelMode, Record, Widget};
use crate::render::Presentation;
use crate::services::aggregation::{Aggregation, Bucket, aggregate_fields, cap_buckets, top_by_value};
use crate::services::formatter::{format_number, format_text};

/// Most bars a bar chart draws
pub const BAR_CAP: usize = 25;

/// Most slices a pie chart draws
pub const PIE_CAP: usize = 8;

/// Points visible at once in a line chart; the host pans over the rest
pub const LINE_WINDOW: usize = 50;

/// One bar or line point
#[derive(Debug, Clone, PartialEq)]
pub struct ChartPoint {
    /// Raw bucket name, used as the category key
    pub name: String,
    /// Bucket name as shown on the axis
    pub display_name: String,
    pub value: f64,
    pub display_value: String,
    pub count: usize,
    /// Tooltip label for this point
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub x_field: String,
    pub x_type: FieldType,
    /// Legend text for the series
    pub series_label: String,
    pub points: Vec<ChartPoint>,
    /// Buckets produced before any cap was applied
    pub total_buckets: usize,
    pub color: String,
    pub show_legend: bool,
    pub show_grid: bool,
    pub show_labels: bool,
}

impl ChartView {
    /// Lowest and highest value in the window at `offset`, always spanning zero
    pub fn value_range(&self, offset: usize) -> (f64, f64) {
        let window = self.window(offset);
        let low = window.iter().map(|p| p.value).fold(0.0, f64::min);
        let high = window.iter().map(|p| p.value).fold(0.0, f64::max);
        (low, high)
    }

    /// Points of a line chart visible from `offset`
    pub fn window(&self, offset: usize) -> &[ChartPoint] {
        let start = offset.min(self.points.len().saturating_sub(LINE_WINDOW));
        let end = (start + LINE_WINDOW).min(self.points.len());
        &self.points[start..end]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieSlice {
    pub name: String,
    pub value: f64,
    /// Share of the drawn slices, 0..=100
    pub percentage: f64,
    /// Text drawn on the slice, if labels are on
    pub slice_label: Option<String>,
    pub tooltip: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PieView {
    pub x_field: String,
    pub series_label: String,
    pub slices: Vec<PieSlice>,
    pub total_buckets: usize,
    pub inner_radius: InnerRadius,
    pub show_legend: bool,
}

/// Legend text for a measure: no Y field counts records, numeric Y sums
pub fn measure_label(y_field: Option<&str>, y_type: Option<FieldType>) -> String {
    match (y_field, y_type) {
        (None, _) => "Record Count".to_string(),
        (Some(field), Some(FieldType::Number)) => format!("Sum of {}", field),
        (Some(field), _) => format!("Count of {}", field),
    }
}

/// Tooltip label for a bucket, preferring its single distinct Y value in value mode
pub fn bucket_label(bucket: &Bucket, config: &ChartConfig, y_type: Option<FieldType>) -> String {
    if config.y_axis_label_mode == LabelMode::Value {
        if let Some(single) = bucket.single_y_value() {
            return single.to_string();
        }
    }
    measure_label(config.y_field(), y_type)
}

fn aggregate_for(widget: &Widget, records: &[Record]) -> Result<(String, Aggregation), Presentation> {
    let config = &widget.chart_config;
    let Some(x_field) = config.x_field() else {
        return Err(Presentation::needs_config("Choose an X axis field for this chart"));
    };
    Ok((x_field.to_string(), aggregate_fields(records, x_field, config.y_field())))
}

fn chart_view(widget: &Widget, x_field: String, agg: Aggregation, buckets: Vec<Bucket>) -> ChartView {
    let config = &widget.chart_config;
    let points = buckets
        .iter()
        .map(|b| ChartPoint {
            name: b.name.clone(),
            display_name: if agg.x_type.is_ordered() {
                format_text(&b.name)
            } else {
                b.name.clone()
            },
            value: b.value,
            display_value: format_number(b.value),
            count: b.count,
            label: bucket_label(b, config, agg.y_type),
        })
        .collect();

    ChartView {
        x_field,
        x_type: agg.x_type,
        series_label: measure_label(config.y_field(), agg.y_type),
        points,
        total_buckets: agg.buckets.len(),
        color: config.primary_color.clone(),
        show_legend: config.show_legend,
        show_grid: config.show_grid,
        show_labels: config.show_labels,
    }
}

pub fn render_bar(widget: &Widget, records: &[Record]) -> Presentation {
    let (x_field, agg) = match aggregate_for(widget, records) {
        Ok(v) => v,
        Err(p) => return p,
    };
    let buckets = cap_buckets(agg.buckets.clone(), BAR_CAP);
    Presentation::BarChart(chart_view(widget, x_field, agg, buckets))
}

/// Line charts keep every bucket; dates and numbers are already in ascending order
pub fn render_line(widget: &Widget, records: &[Record]) -> Presentation {
    let (x_field, agg) = match aggregate_for(widget, records) {
        Ok(v) => v,
        Err(p) => return p,
    };
    let buckets = agg.buckets.clone();
    Presentation::LineChart(chart_view(widget, x_field, agg, buckets))
}

pub fn render_pie(widget: &Widget, records: &[Record]) -> Presentation {
    let (x_field, agg) = match aggregate_for(widget, records) {
        Ok(v) => v,
        Err(p) => return p,
    };
    let config = &widget.chart_config;
    let top = top_by_value(agg.buckets.clone(), PIE_CAP);
    let total: f64 = top.iter().map(|b| b.value).sum();

    let slices = top
        .iter()
        .map(|b| {
            let percentage = if total != 0.0 { b.value / total * 100.0 } else { 0.0 };
            let slice_label = match (config.show_labels, config.show_percentage) {
                (false, _) => None,
                (true, true) => Some(format!("{:.1}%", percentage)),
                (true, false) => Some(format_text(&b.name)),
            };
            PieSlice {
                name: b.name.clone(),
                value: b.value,
                percentage,
                slice_label,
                tooltip: format!("{}: {}", bucket_label(b, config, agg.y_type), format_number(b.value)),
            }
        })
        .collect();

    Presentation::PieChart(PieView {
        x_field,
        series_label: measure_label(config.y_field(), agg.y_type),
        slices,
        total_buckets: agg.buckets.len(),
        inner_radius: config.inner_radius,
        show_legend: config.show_legend,
    })
}
