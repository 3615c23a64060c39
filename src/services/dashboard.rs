//! The dashboard a host shows: widgets plus the scheduler and layout
//! controller that keep them fresh and in place.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{info, warn};

use crate::config::Config;
use crate::core::{Dashboard, GeometryPatch, Widget, WidgetId, WidgetRuntimeState};
use crate::error::ApiError;
use crate::render::{render, RenderedWidget};
use crate::services::data_api::{DataSource, WidgetStore};
use crate::services::layout::{LayoutController, LayoutItem};
use crate::services::scheduler::{RefreshEvent, RefreshScheduler};

/// Something the host may want to redraw for
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    Refresh(RefreshEvent),
    LayoutSaved { id: WidgetId },
    LayoutFailed { id: WidgetId, message: String },
}

/// Outcome of one geometry write, tagged with the write's sequence
struct GeometryResult {
    id: WidgetId,
    seq: u64,
    result: Result<(), ApiError>,
}

pub struct DashboardView {
    id: String,
    name: String,
    widgets: Vec<Widget>,
    scheduler: RefreshScheduler,
    layout: LayoutController,
    store: Arc<dyn WidgetStore>,
    saves_tx: UnboundedSender<GeometryResult>,
    saves_rx: UnboundedReceiver<GeometryResult>,
}

impl DashboardView {
    pub fn new(source: Arc<dyn DataSource>, store: Arc<dyn WidgetStore>, config: &Config) -> Self {
        let (saves_tx, saves_rx) = mpsc::unbounded_channel();
        Self {
            id: String::new(),
            name: String::new(),
            widgets: Vec::new(),
            scheduler: RefreshScheduler::new(source, config.refresh),
            layout: LayoutController::new(config.layout.columns),
            store,
            saves_tx,
            saves_rx,
        }
    }

    /// Fetch a dashboard definition from the store and show it
    pub async fn open(&mut self, dashboard_id: &str) -> Result<(), ApiError> {
        let dashboard = self.store.load_dashboard(dashboard_id).await?;
        self.load(dashboard);
        Ok(())
    }

    /// Show `dashboard`, replacing whatever was shown before
    pub fn load(&mut self, dashboard: Dashboard) {
        info!(dashboard = %dashboard.id, widgets = dashboard.widgets.len(), "Loading dashboard");
        self.id = dashboard.id.to_string();
        self.name = dashboard.name;
        self.widgets = dashboard.widgets;
        self.scheduler.load_dashboard(&self.widgets);
        self.layout.load(&self.widgets);
        self.scheduler.refresh_all();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn widget(&self, id: &WidgetId) -> Option<&Widget> {
        self.widgets.iter().find(|w| &w.id == id)
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn layout(&self) -> &LayoutController {
        &self.layout
    }

    pub fn refresh(&mut self, id: &WidgetId) -> bool {
        self.scheduler.refresh_widget(id)
    }

    pub fn refresh_all(&mut self) -> usize {
        self.scheduler.refresh_all()
    }

    /// Delete a widget through the store.
    ///
    /// The timer is cancelled before the request goes out. If the store
    /// refuses, the widget stays and its timer is restored.
    pub async fn delete_widget(&mut self, id: &WidgetId) -> Result<(), ApiError> {
        self.scheduler.cancel_auto_refresh(id);
        if let Err(err) = self.store.delete_widget(id).await {
            warn!(widget = %id, error = %err, "Widget delete failed");
            if let Some(widget) = self.widget(id).cloned() {
                self.scheduler.schedule_auto_refresh(&widget);
            }
            return Err(err);
        }

        self.scheduler.remove_widget(id);
        self.layout.remove(id);
        self.widgets.retain(|w| &w.id != id);
        info!(widget = %id, "Widget deleted");
        Ok(())
    }

    /// Swap in an edited widget definition, restart its timer and refetch
    pub fn update_widget(&mut self, widget: Widget) -> bool {
        let Some(slot) = self.widgets.iter_mut().find(|w| w.id == widget.id) else {
            return false;
        };
        *slot = widget.clone();
        self.scheduler.schedule_auto_refresh(&widget);
        self.scheduler.refresh_widget(&widget.id);
        true
    }

    pub fn toggle_edit_mode(&mut self) -> bool {
        self.layout.toggle_edit_mode()
    }

    pub fn edit_mode(&self) -> bool {
        self.layout.edit_mode()
    }

    /// Apply a grid layout and persist what changed. Returns the number of
    /// writes sent; their outcomes arrive through [`Self::next_event`].
    pub fn on_layout_change(&mut self, layout: &[LayoutItem]) -> usize {
        let changes = self.layout.on_layout_change(layout);
        for change in &changes {
            if let Some(widget) = self.widgets.iter_mut().find(|w| w.id == change.id) {
                widget.set_geometry(change.geometry);
            }

            let store = Arc::clone(&self.store);
            let tx = self.saves_tx.clone();
            let id = change.id.clone();
            let seq = change.seq;
            let patch = GeometryPatch::from(change.geometry);
            tokio::spawn(async move {
                let result = store.save_geometry(&id, &patch).await;
                let _ = tx.send(GeometryResult { id, seq, result });
            });
        }
        changes.len()
    }

    /// Keyboard move/resize of one widget in edit mode
    pub fn nudge(&mut self, id: &WidgetId, dx: i32, dy: i32, dw: i32, dh: i32) -> usize {
        if !self.layout.edit_mode() {
            return 0;
        }
        let proposed = self.layout.nudged(id, dx, dy, dw, dh);
        self.on_layout_change(&proposed)
    }

    /// Wait for the next refresh or layout outcome and apply it.
    ///
    /// Outcomes of superseded geometry writes are applied silently.
    pub async fn next_event(&mut self) -> DashboardEvent {
        loop {
            tokio::select! {
                event = self.scheduler.process_next() => return DashboardEvent::Refresh(event),
                Some(save) = self.saves_rx.recv() => {
                    if let Some(event) = self.apply_save(save) {
                        return event;
                    }
                }
            }
        }
    }

    /// Apply everything already waiting, without blocking
    pub fn drain_pending(&mut self) -> Vec<DashboardEvent> {
        let mut events: Vec<DashboardEvent> = self
            .scheduler
            .drain_pending()
            .into_iter()
            .map(DashboardEvent::Refresh)
            .collect();
        while let Ok(save) = self.saves_rx.try_recv() {
            events.extend(self.apply_save(save));
        }
        events
    }

    fn apply_save(&mut self, save: GeometryResult) -> Option<DashboardEvent> {
        let GeometryResult { id, seq, result } = save;
        match result {
            Ok(()) => self
                .layout
                .record_saved(&id, seq)
                .then_some(DashboardEvent::LayoutSaved { id }),
            Err(err) => {
                let message = err.to_string();
                self.layout
                    .record_failed(&id, seq, &message)
                    .then_some(DashboardEvent::LayoutFailed { id, message })
            }
        }
    }

    pub fn render_widget(&self, id: &WidgetId) -> Option<RenderedWidget> {
        let widget = self.widget(id)?;
        let fallback = WidgetRuntimeState::default();
        let state = self.scheduler.state(id).unwrap_or(&fallback);
        Some(render(widget, state))
    }

    /// Every widget rendered, in reading order of the grid (top to bottom, then left to right)
    pub fn render_all(&self) -> Vec<(WidgetId, RenderedWidget)> {
        self.ordered_ids()
            .into_iter()
            .filter_map(|id| self.render_widget(&id).map(|r| (id, r)))
            .collect()
    }

    /// Widget ids sorted by grid row, then column
    pub fn ordered_ids(&self) -> Vec<WidgetId> {
        let mut items: Vec<_> = self.layout.items().map(|(id, g)| (g.y, g.x, id.clone())).collect();
        items.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        items.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Most recent successful fetch across all widgets
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.widgets
            .iter()
            .filter_map(|w| self.scheduler.state(&w.id).and_then(|s| s.last_updated))
            .max()
    }
}
