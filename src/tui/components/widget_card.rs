use crate::core::{FontSize, TextAlign, WidgetId};
use crate::render::chart::LINE_WINDOW;
use crate::render::{ChartView, ListView, MetricView, PieView, Presentation, RenderedWidget, TableView, TextView};
use crate::services::formatter::format_number;
use crate::tui::{Action, Component, Focusable, Theme};
use color_eyre::Result;
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{
        Axis, Bar, BarChart, BarGroup, Block, Borders, Cell, Chart, Dataset, GraphType, LegendPosition, Paragraph,
        Row, Table, Wrap,
    },
    Frame,
};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Points a line chart window moves per pan step
pub const PAN_STEP: usize = 10;

/// One dashboard widget drawn inside a bordered card
pub struct WidgetCard {
    id: WidgetId,
    rendered: RenderedWidget,
    focused: bool,
    editing: bool,
    unsaved: bool,
    pan_offset: usize,
    spinner: usize,
    theme: Theme,
    supported_actions: Vec<Action>,
}

impl WidgetCard {
    pub fn new(id: WidgetId, rendered: RenderedWidget) -> Self {
        Self {
            id,
            rendered,
            focused: false,
            editing: false,
            unsaved: false,
            pan_offset: 0,
            spinner: 0,
            theme: Theme::default(),
            supported_actions: vec![Action::PanLeft, Action::PanRight],
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn id(&self) -> &WidgetId {
        &self.id
    }

    pub fn rendered(&self) -> &RenderedWidget {
        &self.rendered
    }

    /// Swap in a fresh rendering, keeping the pan position where it still fits
    pub fn set_rendered(&mut self, rendered: RenderedWidget) {
        self.rendered = rendered;
        self.pan_offset = self.pan_offset.min(self.max_pan());
    }

    pub fn set_editing(&mut self, editing: bool) {
        self.editing = editing;
    }

    pub fn set_unsaved(&mut self, unsaved: bool) {
        self.unsaved = unsaved;
    }

    pub fn pan_offset(&self) -> usize {
        self.pan_offset
    }

    fn max_pan(&self) -> usize {
        match &self.rendered.body {
            Presentation::LineChart(view) => view.points.len().saturating_sub(LINE_WINDOW),
            _ => 0,
        }
    }

    pub fn title_text(&self) -> String {
        let mut title = format!(" {} ", self.rendered.title);
        if self.rendered.loading {
            title.push_str(SPINNER[self.spinner % SPINNER.len()]);
            title.push(' ');
        }
        if self.unsaved {
            title.push_str("[unsaved] ");
        }
        title
    }

    /// Bottom border note when the card shows only part of its data
    pub fn footer_text(&self) -> Option<String> {
        match &self.rendered.body {
            Presentation::Table(view) if view.is_truncated() => {
                Some(format!(" {} of {} rows ", view.rows.len(), view.total_rows))
            }
            Presentation::List(view) if view.items.len() < view.total_items => {
                Some(format!(" {} of {} items ", view.items.len(), view.total_items))
            }
            Presentation::BarChart(view) if view.total_buckets > view.points.len() => {
                Some(format!(" top {} of {} groups ", view.points.len(), view.total_buckets))
            }
            Presentation::PieChart(view) if view.total_buckets > view.slices.len() => {
                Some(format!(" top {} of {} groups ", view.slices.len(), view.total_buckets))
            }
            Presentation::LineChart(view) if view.points.len() > LINE_WINDOW => {
                let shown = view.window(self.pan_offset).len();
                Some(format!(
                    " points {}-{} of {} ",
                    self.pan_offset + 1,
                    self.pan_offset + shown,
                    view.points.len()
                ))
            }
            _ => None,
        }
    }

    fn border_style(&self) -> Style {
        if self.editing && self.focused {
            self.theme.editing_border_style()
        } else if self.focused {
            self.theme.focused_border_style()
        } else {
            self.theme.border_style()
        }
    }

    fn draw_table(&self, frame: &mut Frame, area: Rect, view: &TableView) {
        let header = Row::new(view.columns.iter().map(|c| Cell::from(c.as_str()))).style(self.theme.header_style());
        let rows = view
            .rows
            .iter()
            .map(|r| Row::new(r.iter().map(|c| Cell::from(c.as_str()))));

        let num_cols = view.columns.len().max(1) as u32;
        let widths = vec![Constraint::Ratio(1, num_cols); num_cols as usize];
        let table = Table::new(rows, widths)
            .header(header)
            .style(self.theme.normal_style());
        frame.render_widget(table, area);
    }

    fn draw_list(&self, frame: &mut Frame, area: Rect, view: &ListView) {
        let mut lines = Vec::new();
        for item in &view.items {
            lines.push(Line::from(Span::styled(
                item.title.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for (field, value) in &item.details {
                lines.push(Line::from(vec![
                    Span::styled(format!("  {field}: "), self.theme.muted_style()),
                    Span::raw(value.as_str()),
                ]));
            }
        }
        let paragraph = Paragraph::new(lines)
            .style(self.theme.normal_style())
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn draw_metric(&self, frame: &mut Frame, area: Rect, view: &MetricView) {
        let top = area.height.saturating_sub(2) / 2;
        let mut lines: Vec<Line> = (0..top).map(|_| Line::default()).collect();
        lines.push(Line::from(Span::styled(
            view.display.as_str(),
            Style::default()
                .fg(self.theme.info)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(view.caption(), self.theme.muted_style())));

        let paragraph = Paragraph::new(lines).alignment(Alignment::Center);
        frame.render_widget(paragraph, area);
    }

    fn draw_bar(&self, frame: &mut Frame, area: Rect, view: &ChartView) {
        let area = self.with_legend(frame, area, &view.series_label, view.show_legend);
        let color = self
            .theme
            .widget_color(Some(view.color.as_str()), self.theme.series_color(0));

        let count = view.points.len().max(1) as u16;
        let bar_width = (area.width.saturating_sub(count) / count).max(1);
        let label_width = bar_width as usize;

        // Bars are integer heights; scale so fractions still show
        let bars: Vec<Bar> = view
            .points
            .iter()
            .map(|p| {
                let label: String = p.display_name.chars().take(label_width).collect();
                let text = if view.show_labels { p.display_value.clone() } else { String::new() };
                Bar::default()
                    .value((p.value.max(0.0) * 100.0).round() as u64)
                    .text_value(text)
                    .label(Line::from(label))
                    .style(Style::default().fg(color))
            })
            .collect();

        let chart = BarChart::default()
            .data(BarGroup::default().bars(&bars))
            .bar_width(bar_width)
            .bar_gap(1)
            .value_style(Style::default().fg(self.theme.background).bg(color))
            .label_style(self.theme.muted_style());
        frame.render_widget(chart, area);
    }

    fn draw_line(&self, frame: &mut Frame, area: Rect, view: &ChartView) {
        let window = view.window(self.pan_offset);
        let color = self
            .theme
            .widget_color(Some(view.color.as_str()), self.theme.series_color(0));
        let points: Vec<(f64, f64)> = window
            .iter()
            .enumerate()
            .map(|(i, p)| (i as f64, p.value))
            .collect();

        let mut datasets = vec![Dataset::default()
            .name(view.series_label.as_str())
            .marker(Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(&points)];
        if view.show_labels {
            datasets.push(
                Dataset::default()
                    .marker(Marker::Dot)
                    .graph_type(GraphType::Scatter)
                    .style(Style::default().fg(self.theme.foreground))
                    .data(&points),
            );
        }

        let (low, high) = view.value_range(self.pan_offset);
        let high = if high == low { low + 1.0 } else { high };
        let x_max = (window.len().saturating_sub(1) as f64).max(1.0);

        let x_labels: Vec<Line> = match (window.first(), window.last()) {
            (Some(first), Some(last)) if window.len() > 1 => {
                vec![Line::from(first.display_name.clone()), Line::from(last.display_name.clone())]
            }
            (Some(first), _) => vec![Line::from(first.display_name.clone())],
            _ => Vec::new(),
        };
        let axis_style = if view.show_grid {
            self.theme.border_style()
        } else {
            self.theme.muted_style()
        };

        let chart = Chart::new(datasets)
            .x_axis(
                Axis::default()
                    .title(view.x_field.as_str())
                    .style(axis_style)
                    .bounds([0.0, x_max])
                    .labels(x_labels),
            )
            .y_axis(
                Axis::default()
                    .style(axis_style)
                    .bounds([low, high])
                    .labels(vec![Line::from(format_number(low)), Line::from(format_number(high))]),
            )
            .legend_position(if view.show_legend { Some(LegendPosition::TopRight) } else { None });
        frame.render_widget(chart, area);
    }

    fn draw_pie(&self, frame: &mut Frame, area: Rect, view: &PieView) {
        let mut lines = Vec::new();
        if view.inner_radius.is_donut() {
            lines.push(Line::from(Span::styled(
                format!("donut, inner radius {}%", view.inner_radius.percent()),
                self.theme.muted_style(),
            )));
        }

        let name_width = if view.show_legend {
            view.slices
                .iter()
                .map(|s| s.name.chars().count())
                .max()
                .unwrap_or(0)
                .min(area.width as usize / 3)
        } else {
            0
        };
        let gauge_width = (area.width as usize).saturating_sub(name_width + 12).max(1);

        for (i, slice) in view.slices.iter().enumerate() {
            let color = self.theme.series_color(i);
            let filled = ((slice.percentage / 100.0) * gauge_width as f64).round() as usize;
            let label = slice
                .slice_label
                .clone()
                .unwrap_or_else(|| format_number(slice.value));

            let mut spans = Vec::new();
            if view.show_legend {
                let name: String = slice.name.chars().take(name_width).collect();
                spans.push(Span::styled("■ ", Style::default().fg(color)));
                spans.push(Span::raw(format!("{name:<name_width$} ")));
            }
            spans.push(Span::styled("█".repeat(filled.min(gauge_width)), Style::default().fg(color)));
            spans.push(Span::styled(
                "░".repeat(gauge_width.saturating_sub(filled)),
                self.theme.muted_style(),
            ));
            spans.push(Span::raw(format!(" {label}")));
            lines.push(Line::from(spans));
        }

        frame.render_widget(Paragraph::new(lines), area);
    }

    fn draw_text(&self, frame: &mut Frame, area: Rect, view: &TextView) {
        let color = self
            .theme
            .widget_color(view.color.as_deref(), self.theme.foreground);
        let modifier = match view.font_size {
            FontSize::Small => Modifier::DIM,
            FontSize::Medium => Modifier::empty(),
            FontSize::Large => Modifier::BOLD,
            FontSize::XLarge => Modifier::BOLD | Modifier::UNDERLINED,
        };
        let alignment = match view.align {
            TextAlign::Left => Alignment::Left,
            TextAlign::Center => Alignment::Center,
            TextAlign::Right => Alignment::Right,
        };
        let paragraph = Paragraph::new(view.text.as_str())
            .style(Style::default().fg(color).add_modifier(modifier))
            .alignment(alignment)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
    }

    fn draw_notice(&self, frame: &mut Frame, area: Rect, message: &str, style: Style, hint: Option<&str>) {
        let wrap_width = area.width.max(1) as usize;
        let mut lines: Vec<Line> = textwrap::wrap(message, wrap_width)
            .into_iter()
            .map(|l| Line::from(Span::styled(l.into_owned(), style)))
            .collect();
        if let Some(hint) = hint {
            lines.push(Line::from(Span::styled(hint.to_string(), self.theme.muted_style())));
        }
        let top = area.height.saturating_sub(lines.len() as u16) / 2;
        let mut padded: Vec<Line> = (0..top).map(|_| Line::default()).collect();
        padded.extend(lines);
        frame.render_widget(Paragraph::new(padded).alignment(Alignment::Center), area);
    }

    /// Reserve a line for the series name when the legend is on
    fn with_legend(&self, frame: &mut Frame, area: Rect, label: &str, show: bool) -> Rect {
        if !show || area.height < 3 {
            return area;
        }
        let [legend, rest] = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).areas(area);
        let line = Line::from(vec![
            Span::styled("■ ", Style::default().fg(self.theme.series_color(0))),
            Span::styled(label.to_string(), self.theme.muted_style()),
        ]);
        frame.render_widget(Paragraph::new(line).alignment(Alignment::Right), legend);
        rest
    }
}

impl Component for WidgetCard {
    fn handle_action(&mut self, action: Action) -> Result<bool> {
        match action {
            Action::PanLeft if self.max_pan() > 0 => {
                self.pan_offset = self.pan_offset.saturating_sub(PAN_STEP);
                Ok(true)
            }
            Action::PanRight if self.max_pan() > 0 => {
                self.pan_offset = (self.pan_offset + PAN_STEP).min(self.max_pan());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let mut block = Block::default()
            .borders(Borders::ALL)
            .title(self.title_text())
            .border_style(self.border_style());
        if let Some(footer) = self.footer_text() {
            block = block.title_bottom(Line::from(Span::styled(footer, self.theme.muted_style())).right_aligned());
        }
        let inner = block.inner(area);
        frame.render_widget(block, area);
        if inner.width == 0 || inner.height == 0 {
            return;
        }

        match &self.rendered.body {
            Presentation::Error { message, retryable } => {
                let hint = retryable.then_some("press r to retry");
                self.draw_notice(frame, inner, message, self.theme.error_style(), hint);
            }
            Presentation::Loading => {
                self.draw_notice(frame, inner, "Loading...", self.theme.muted_style(), None);
            }
            Presentation::Empty => {
                self.draw_notice(frame, inner, "No data available", self.theme.muted_style(), None);
            }
            Presentation::NeedsConfig { message } => {
                self.draw_notice(frame, inner, message, self.theme.warning_style(), Some("configuration needed"));
            }
            Presentation::NotNumeric { field } => {
                let message = format!("Field \"{field}\" has no numeric values");
                self.draw_notice(frame, inner, &message, self.theme.warning_style(), None);
            }
            Presentation::Table(view) => self.draw_table(frame, inner, view),
            Presentation::List(view) => self.draw_list(frame, inner, view),
            Presentation::Metric(view) => self.draw_metric(frame, inner, view),
            Presentation::BarChart(view) => self.draw_bar(frame, inner, view),
            Presentation::LineChart(view) => self.draw_line(frame, inner, view),
            Presentation::PieChart(view) => self.draw_pie(frame, inner, view),
            Presentation::Text(view) => self.draw_text(frame, inner, view),
        }
    }

    fn supported_actions(&self) -> &[Action] {
        &self.supported_actions
    }

    fn name(&self) -> &str {
        "WidgetCard"
    }

    fn update(&mut self) -> Result<()> {
        if self.rendered.loading {
            self.spinner = self.spinner.wrapping_add(1);
        }
        Ok(())
    }
}

impl Focusable for WidgetCard {
    fn is_focused(&self) -> bool {
        self.focused
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldType, MetricType, WidgetType};
    use crate::render::ChartPoint;
    use ratatui::{backend::TestBackend, Terminal};

    fn make_card(widget_type: WidgetType, body: Presentation) -> WidgetCard {
        WidgetCard::new(
            WidgetId::from("1"),
            RenderedWidget {
                title: "Pipeline".to_string(),
                widget_type,
                loading: false,
                body,
            },
        )
    }

    fn line_view(points: usize) -> ChartView {
        ChartView {
            x_field: "month".to_string(),
            x_type: FieldType::Number,
            series_label: "Record Count".to_string(),
            points: (0..points)
                .map(|i| ChartPoint {
                    name: i.to_string(),
                    display_name: i.to_string(),
                    value: i as f64,
                    display_value: i.to_string(),
                    count: 1,
                    label: i.to_string(),
                })
                .collect(),
            total_buckets: points,
            color: "#3b82f6".to_string(),
            show_legend: true,
            show_grid: true,
            show_labels: false,
        }
    }

    fn draw(card: &mut WidgetCard, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                card.render(f, area);
            })
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_pan_moves_window_within_bounds() {
        let mut card = make_card(WidgetType::LineChart, Presentation::LineChart(line_view(65)));

        assert!(card.handle_action(Action::PanRight).unwrap());
        assert_eq!(card.pan_offset(), 10);
        card.handle_action(Action::PanRight).unwrap();
        assert_eq!(card.pan_offset(), 15);
        assert_eq!(card.footer_text().as_deref(), Some(" points 16-65 of 65 "));

        card.handle_action(Action::PanLeft).unwrap();
        card.handle_action(Action::PanLeft).unwrap();
        assert_eq!(card.pan_offset(), 0);
    }

    #[test]
    fn test_pan_ignored_when_everything_fits() {
        let mut card = make_card(WidgetType::LineChart, Presentation::LineChart(line_view(20)));
        assert!(!card.handle_action(Action::PanRight).unwrap());
        assert_eq!(card.pan_offset(), 0);

        let mut table = card_for_empty();
        assert!(!table.handle_action(Action::PanLeft).unwrap());
    }

    fn card_for_empty() -> WidgetCard {
        make_card(WidgetType::Table, Presentation::Empty)
    }

    #[test]
    fn test_fresh_data_clamps_pan() {
        let mut card = make_card(WidgetType::LineChart, Presentation::LineChart(line_view(80)));
        card.handle_action(Action::PanRight).unwrap();
        card.handle_action(Action::PanRight).unwrap();
        assert_eq!(card.pan_offset(), 20);

        let mut fresh = card.rendered().clone();
        fresh.body = Presentation::LineChart(line_view(55));
        card.set_rendered(fresh);
        assert_eq!(card.pan_offset(), 5);
    }

    #[test]
    fn test_title_marks_loading_and_unsaved() {
        let mut card = card_for_empty();
        assert_eq!(card.title_text(), " Pipeline ");

        card.set_unsaved(true);
        assert_eq!(card.title_text(), " Pipeline [unsaved] ");

        let mut loading = card.rendered().clone();
        loading.loading = true;
        card.set_rendered(loading);
        assert!(card.title_text().starts_with(" Pipeline | "));
        card.update().unwrap();
        assert!(card.title_text().starts_with(" Pipeline / "));
    }

    #[test]
    fn test_table_footer_counts_rows() {
        let view = TableView {
            columns: vec!["name".to_string()],
            rows: vec![vec!["Acme".to_string()]],
            total_rows: 4,
        };
        let card = make_card(WidgetType::Table, Presentation::Table(view));
        assert_eq!(card.footer_text().as_deref(), Some(" 1 of 4 rows "));
    }

    #[test]
    fn test_draws_metric_caption() {
        let view = MetricView {
            metric_type: MetricType::Count,
            field: None,
            value: 42.0,
            display: "42".to_string(),
            sample_size: 42,
        };
        let mut card = make_card(WidgetType::MetricCard, Presentation::Metric(view));
        let screen = draw(&mut card, 30, 8);

        assert!(screen.contains("Pipeline"));
        assert!(screen.contains("42"));
        assert!(screen.contains("Total Records"));
    }

    #[test]
    fn test_draws_error_with_retry_hint() {
        let mut card = make_card(
            WidgetType::BarChart,
            Presentation::Error {
                message: "HTTP 503".to_string(),
                retryable: true,
            },
        );
        let screen = draw(&mut card, 40, 8);

        assert!(screen.contains("HTTP 503"));
        assert!(screen.contains("press r to retry"));
    }

    #[test]
    fn test_draws_not_numeric_message() {
        let mut card = make_card(
            WidgetType::MetricCard,
            Presentation::NotNumeric {
                field: "status".to_string(),
            },
        );
        let screen = draw(&mut card, 60, 6);
        assert!(screen.contains("has no numeric values"));
    }

    #[test]
    fn test_focus() {
        let mut card = card_for_empty();
        assert!(!card.is_focused());
        card.set_focused(true);
        assert!(card.is_focused());
    }
}
