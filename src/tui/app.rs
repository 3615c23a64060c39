use crate::config::Config;
use crate::core::{Geometry, WidgetId};
use crate::services::{DashboardEvent, DashboardView, RefreshEvent};
use crate::tui::components::WidgetCard;
use crate::tui::{Action, ActionCategory, Component, Focusable, KeyBindings, Theme};
use color_eyre::Result;
use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use ratatui::{
    backend::Backend,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// How often loading spinners advance
const TICK_RATE: Duration = Duration::from_millis(250);

/// Application state
///
/// Owns the dashboard view and one card per widget, routes key actions and
/// draws everything on the grid.
pub struct App {
    dashboard: DashboardView,

    /// Cards in grid reading order
    cards: Vec<WidgetCard>,

    focused: Option<WidgetId>,

    /// Widget waiting for a second delete press
    pending_delete: Option<WidgetId>,

    /// Grid rows scrolled off the top
    scroll: u16,

    /// Terminal rows per grid row
    row_height: u16,

    status: Option<String>,
    show_help: bool,
    keybindings: KeyBindings,
    theme: Theme,
    should_quit: bool,
}

impl App {
    pub fn new(dashboard: DashboardView, config: &Config) -> Self {
        let mut app = Self {
            dashboard,
            cards: Vec::new(),
            focused: None,
            pending_delete: None,
            scroll: 0,
            row_height: config.layout.row_height.max(1),
            status: None,
            show_help: false,
            keybindings: KeyBindings::default(),
            theme: Theme::default(),
            should_quit: false,
        };
        app.sync();
        app
    }

    pub fn dashboard(&self) -> &DashboardView {
        &self.dashboard
    }

    pub fn focused(&self) -> Option<&WidgetId> {
        self.focused.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        self.cards.clear();
        self.sync();
    }

    pub fn keybindings(&self) -> &KeyBindings {
        &self.keybindings
    }

    pub fn set_keybindings(&mut self, keybindings: KeyBindings) {
        self.keybindings = keybindings;
    }

    /// Rebuild the cards from the dashboard, keeping pan positions
    pub fn sync(&mut self) {
        let mut previous: HashMap<WidgetId, WidgetCard> =
            self.cards.drain(..).map(|c| (c.id().clone(), c)).collect();

        let rendered = self.dashboard.render_all();
        if !rendered.iter().any(|(id, _)| Some(id) == self.focused.as_ref()) {
            self.focused = rendered.first().map(|(id, _)| id.clone());
        }

        let editing = self.dashboard.edit_mode();
        for (id, rendered) in rendered {
            let mut card = match previous.remove(&id) {
                Some(mut card) => {
                    card.set_rendered(rendered);
                    card
                }
                None => WidgetCard::new(id.clone(), rendered).with_theme(self.theme.clone()),
            };
            card.set_focused(self.focused.as_ref() == Some(&id));
            card.set_editing(editing);
            card.set_unsaved(self.dashboard.layout().is_unsaved(&id));
            self.cards.push(card);
        }
    }

    /// Handle a key event
    pub async fn handle_key_event(&mut self, key: KeyEvent) -> Result<()> {
        // Only handle key press events, ignore release/repeat
        if key.kind != KeyEventKind::Press {
            return Ok(());
        }

        if let Some(action) = self.keybindings.get_action(&key) {
            debug!("Action: {action}");
            self.handle_action(action).await?;
        }
        Ok(())
    }

    /// Handle an action
    pub async fn handle_action(&mut self, action: Action) -> Result<()> {
        if action != Action::DeleteWidget && self.pending_delete.take().is_some() {
            self.status = None;
        }

        let editing = self.dashboard.edit_mode();
        match action {
            Action::Quit => self.should_quit = true,
            Action::Cancel => {
                if self.show_help {
                    self.show_help = false;
                } else if editing {
                    self.dashboard.toggle_edit_mode();
                }
            }
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::ToggleEditMode => {
                let on = self.dashboard.toggle_edit_mode();
                self.status = Some(if on { "Edit mode" } else { "Edit mode off" }.to_string());
            }

            Action::MoveUp if editing => self.nudge(0, -1, 0, 0),
            Action::MoveDown if editing => self.nudge(0, 1, 0, 0),
            Action::MoveLeft if editing => self.nudge(-1, 0, 0, 0),
            Action::MoveRight if editing => self.nudge(1, 0, 0, 0),
            Action::MoveUp => self.focus_toward(0, -1),
            Action::MoveDown => self.focus_toward(0, 1),
            Action::MoveLeft => self.focus_toward(-1, 0),
            Action::MoveRight => self.focus_toward(1, 0),
            Action::FocusNext => self.focus_cycle(1),
            Action::FocusPrevious => self.focus_cycle(-1),

            Action::GrowWidth => self.nudge(0, 0, 1, 0),
            Action::ShrinkWidth => self.nudge(0, 0, -1, 0),
            Action::GrowHeight => self.nudge(0, 0, 0, 1),
            Action::ShrinkHeight => self.nudge(0, 0, 0, -1),

            Action::Refresh => {
                if let Some(id) = self.focused.clone() {
                    self.dashboard.refresh(&id);
                }
            }
            Action::RefreshAll => {
                self.dashboard.refresh_all();
            }
            Action::DeleteWidget => self.delete_focused().await,
            Action::PanLeft | Action::PanRight => {
                if let Some(card) = self.focused_card_mut() {
                    card.handle_action(action)?;
                }
            }
        }

        self.sync();
        Ok(())
    }

    /// Apply a refresh or layout outcome from the dashboard
    pub fn on_dashboard_event(&mut self, event: DashboardEvent) {
        match &event {
            DashboardEvent::LayoutFailed { message, .. } => {
                self.status = Some(format!("Layout not saved: {message}"));
            }
            DashboardEvent::Refresh(RefreshEvent::Discarded { id }) => {
                debug!(widget = %id, "Ignoring stale refresh");
            }
            _ => {}
        }
        self.sync();
    }

    /// Advance spinners
    pub fn tick(&mut self) -> Result<()> {
        for card in &mut self.cards {
            card.update()?;
        }
        Ok(())
    }

    fn nudge(&mut self, dx: i32, dy: i32, dw: i32, dh: i32) {
        if !self.dashboard.edit_mode() {
            return;
        }
        if let Some(id) = self.focused.clone() {
            self.dashboard.nudge(&id, dx, dy, dw, dh);
        }
    }

    async fn delete_focused(&mut self) {
        let Some(id) = self.focused.clone() else {
            return;
        };
        let title = self
            .dashboard
            .widget(&id)
            .map(|w| w.display_title().to_string())
            .unwrap_or_default();

        if self.pending_delete.as_ref() != Some(&id) {
            self.status = Some(format!("Press d again to delete \"{title}\""));
            self.pending_delete = Some(id);
            return;
        }

        self.pending_delete = None;
        match self.dashboard.delete_widget(&id).await {
            Ok(()) => self.status = Some(format!("Deleted \"{title}\"")),
            Err(err) => {
                warn!(widget = %id, error = %err, "Delete failed");
                self.status = Some(format!("Delete failed: {err}"));
            }
        }
    }

    fn focused_card_mut(&mut self) -> Option<&mut WidgetCard> {
        let id = self.focused.as_ref()?;
        self.cards.iter_mut().find(|c| c.id() == id)
    }

    fn focus_cycle(&mut self, step: isize) {
        let ids = self.dashboard.ordered_ids();
        if ids.is_empty() {
            return;
        }
        let current = self
            .focused
            .as_ref()
            .and_then(|f| ids.iter().position(|id| id == f))
            .unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(ids.len() as isize) as usize;
        self.focused = Some(ids[next].clone());
    }

    /// Focus the closest widget in the direction of (`dx`, `dy`)
    fn focus_toward(&mut self, dx: i32, dy: i32) {
        let Some(current) = self.focused.as_ref() else {
            return;
        };
        let Some(from) = self.dashboard.layout().geometry(current) else {
            return;
        };
        let (cx, cy) = center(from);

        let best = self
            .dashboard
            .layout()
            .items()
            .filter(|(id, _)| *id != current)
            .filter_map(|(id, g)| {
                let (x, y) = center(g);
                let (along, across) = if dx != 0 {
                    ((x - cx) * dx, y - cy)
                } else {
                    ((y - cy) * dy, x - cx)
                };
                (along > 0).then(|| (along + 2 * across.abs(), id.clone()))
            })
            .min_by_key(|(score, _)| *score)
            .map(|(_, id)| id);

        if let Some(id) = best {
            self.focused = Some(id);
        }
    }

    /// Screen area of a widget, before scrolling and clipping
    fn grid_rect(&self, area: Rect, g: Geometry) -> Rect {
        let col_width = area.width / self.dashboard.layout().columns().max(1);
        Rect {
            x: area.x + g.x * col_width,
            y: area.y.saturating_add(g.y.saturating_mul(self.row_height)),
            width: g.w * col_width,
            height: g.h.saturating_mul(self.row_height),
        }
    }

    /// Scroll so the focused widget is on screen
    fn ensure_focus_visible(&mut self, visible_rows: u16) {
        let Some(g) = self.focused.as_ref().and_then(|id| self.dashboard.layout().geometry(id)) else {
            return;
        };
        if g.y < self.scroll {
            self.scroll = g.y;
        } else if g.y.saturating_add(g.h) > self.scroll.saturating_add(visible_rows) {
            self.scroll = g.y.saturating_add(g.h).saturating_sub(visible_rows).min(g.y);
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let [grid_area, status_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(1)]).areas(frame.area());

        let visible_rows = grid_area.height / self.row_height;
        self.ensure_focus_visible(visible_rows);
        let offset = self.scroll.saturating_mul(self.row_height);

        if self.cards.is_empty() {
            let empty = Paragraph::new("This dashboard has no widgets")
                .style(self.theme.muted_style())
                .block(Block::default().borders(Borders::ALL).title(format!(" {} ", self.dashboard.name())));
            frame.render_widget(empty, grid_area);
        }

        let mut placed = Vec::new();
        for card in &self.cards {
            if let Some(g) = self.dashboard.layout().geometry(card.id()) {
                placed.push(self.grid_rect(grid_area, g));
            } else {
                placed.push(Rect::default());
            }
        }
        for (card, rect) in self.cards.iter_mut().zip(placed) {
            if rect.y < grid_area.y.saturating_add(offset) {
                continue;
            }
            let shifted = Rect { y: rect.y - offset, ..rect };
            let clipped = shifted.intersection(grid_area);
            if clipped.width >= 2 && clipped.height >= 2 {
                card.render(frame, clipped);
            }
        }

        frame.render_widget(Paragraph::new(self.status_line(visible_rows)), status_area);

        if self.show_help {
            self.render_help(frame, grid_area);
        }
    }

    fn status_line(&self, visible_rows: u16) -> Line<'static> {
        let mut spans = Vec::new();
        if self.dashboard.edit_mode() {
            spans.push(Span::styled(
                " EDIT ",
                Style::default()
                    .fg(self.theme.background)
                    .bg(self.theme.border_editing)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" "));
        }

        spans.push(Span::styled(self.dashboard.name().to_string(), self.theme.header_style()));

        let unsaved = self.dashboard.layout().unsaved_count();
        if unsaved > 0 {
            spans.push(Span::styled(
                format!("  layout not saved ({unsaved})"),
                self.theme.warning_style(),
            ));
        }

        let refreshed = match self.dashboard.last_refresh() {
            Some(at) => format!("  updated {}", at.format("%H:%M:%S UTC")),
            None => "  not refreshed yet".to_string(),
        };
        spans.push(Span::styled(refreshed, self.theme.muted_style()));

        let total_rows = self.dashboard.layout().grid_rows();
        if total_rows > visible_rows {
            let last = self.scroll.saturating_add(visible_rows).min(total_rows);
            spans.push(Span::styled(
                format!("  rows {}-{} of {}", self.scroll.saturating_add(1), last, total_rows),
                self.theme.muted_style(),
            ));
        }

        if let Some(status) = &self.status {
            spans.push(Span::styled(format!("  {status}"), self.theme.info_style()));
        }
        spans.push(Span::styled("  ? help", self.theme.muted_style()));
        Line::from(spans)
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let mut lines = Vec::new();
        let categories = [
            ActionCategory::Navigation,
            ActionCategory::Layout,
            ActionCategory::Widgets,
            ActionCategory::View,
            ActionCategory::Application,
        ];
        for category in categories {
            lines.push(Line::from(Span::styled(category.to_string(), self.theme.header_style())));
            for action in Action::all().into_iter().filter(|a| a.category() == category) {
                let keys = self.keybindings.get_keys_for_action(action).join(", ");
                lines.push(Line::from(vec![
                    Span::styled(format!("  {keys:<16}"), self.theme.info_style()),
                    Span::raw(action.description()),
                ]));
            }
        }

        let height = (lines.len() as u16 + 2).min(area.height);
        let width = 64.min(area.width);
        let popup = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + (area.height - height) / 2,
            width,
            height,
        };
        frame.render_widget(Clear, popup);
        frame.render_widget(
            Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Keys ")
                    .border_style(self.theme.focused_border_style()),
            ),
            popup,
        );
    }

    /// Draw, then wait on keys, dashboard outcomes and the spinner tick
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let mut events = EventStream::new();
        let mut ticker = tokio::time::interval(TICK_RATE);

        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;

            tokio::select! {
                maybe_event = events.next() => match maybe_event {
                    Some(Ok(Event::Key(key))) => self.handle_key_event(key).await?,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                },
                event = self.dashboard.next_event() => self.on_dashboard_event(event),
                _ = ticker.tick() => self.tick()?,
            }
        }
        Ok(())
    }
}

fn center(g: Geometry) -> (i32, i32) {
    (2 * g.x as i32 + g.w as i32, 2 * g.y as i32 + g.h as i32)
}
