//! Per-widget auto refresh.
//!
//! The scheduler is the only writer of [`WidgetRuntimeState`]. Timer tasks and
//! fetch tasks never touch state themselves: they post messages back to the
//! scheduler's channel and the owning task applies them in
//! [`RefreshScheduler::process_next`]. Every fetch is tagged with a sequence
//! number and only the latest one issued for a widget may land, so a slow
//! manual refresh cannot overwrite a newer timer refresh (or the reverse),
//! and a response for a widget that was removed meanwhile is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RefreshSettings;
use crate::core::{Record, ReportQuery, Widget, WidgetId, WidgetRuntimeState};
use crate::error::ApiError;
use crate::services::data_api::DataSource;

/// What happened when the scheduler applied one message
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshEvent {
    /// A timer fired and a silent fetch went out
    Started { id: WidgetId },
    /// A fetch landed and replaced the widget's dataset
    Updated { id: WidgetId, rows: usize },
    /// A fetch failed; only this widget's error state changed
    Failed { id: WidgetId, message: String },
    /// A stale tick or response, or one for a removed widget
    Discarded { id: WidgetId },
}

impl RefreshEvent {
    pub fn widget_id(&self) -> &WidgetId {
        match self {
            Self::Started { id }
            | Self::Updated { id, .. }
            | Self::Failed { id, .. }
            | Self::Discarded { id } => id,
        }
    }
}

#[derive(Debug)]
enum Message {
    Tick {
        id: WidgetId,
        generation: u64,
    },
    Fetched {
        id: WidgetId,
        seq: u64,
        result: Result<Vec<Record>, ApiError>,
    },
}

struct TimerEntry {
    token: CancellationToken,
    generation: u64,
    period: Duration,
}

pub struct RefreshScheduler {
    source: Arc<dyn DataSource>,
    settings: RefreshSettings,
    queries: HashMap<WidgetId, ReportQuery>,
    states: HashMap<WidgetId, WidgetRuntimeState>,
    timers: HashMap<WidgetId, TimerEntry>,
    /// Latest fetch sequence issued per widget
    issued: HashMap<WidgetId, u64>,
    next_seq: u64,
    next_generation: u64,
    tx: UnboundedSender<Message>,
    rx: UnboundedReceiver<Message>,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn DataSource>, settings: RefreshSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            settings,
            queries: HashMap::new(),
            states: HashMap::new(),
            timers: HashMap::new(),
            issued: HashMap::new(),
            next_seq: 0,
            next_generation: 0,
            tx,
            rx,
        }
    }

    /// Track a widget without starting its timer. Keeps existing state.
    pub fn register(&mut self, widget: &Widget) {
        self.queries.insert(widget.id.clone(), widget.query());
        self.states.entry(widget.id.clone()).or_default();
    }

    /// Replace the tracked widget set with `widgets`.
    ///
    /// Every existing timer is cancelled before any new one is created, and
    /// state for widgets that are no longer on the dashboard is dropped.
    pub fn load_dashboard(&mut self, widgets: &[Widget]) {
        let cancelled = self.timers.len();
        for (_, entry) in self.timers.drain() {
            entry.token.cancel();
        }
        debug!(cancelled, "Cleared refresh timers for dashboard load");

        self.queries.retain(|id, _| widgets.iter().any(|w| &w.id == id));
        self.states.retain(|id, _| widgets.iter().any(|w| &w.id == id));
        self.issued.retain(|id, _| widgets.iter().any(|w| &w.id == id));

        for widget in widgets {
            self.schedule_auto_refresh(widget);
        }
    }

    /// Start (or restart) the widget's timer if it has auto refresh enabled.
    ///
    /// Returns whether a timer is now running. Any previous timer for the
    /// widget is cancelled first, so calling this on every edit is safe.
    pub fn schedule_auto_refresh(&mut self, widget: &Widget) -> bool {
        self.register(widget);
        self.cancel_auto_refresh(&widget.id);
        if !widget.auto_refresh() {
            return false;
        }

        let period = self.settings.period_for(widget.display_options.refresh_interval);
        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();

        let child = token.clone();
        let tx = self.tx.clone();
        let id = widget.id.clone();
        let first_tick = Instant::now() + period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        if tx.send(Message::Tick { id: id.clone(), generation }).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        info!(widget = %widget.id, secs = period.as_secs(), "Auto refresh scheduled");
        self.timers.insert(
            widget.id.clone(),
            TimerEntry {
                token,
                generation,
                period,
            },
        );
        true
    }

    /// Stop a widget's timer. Returns whether one was running.
    pub fn cancel_auto_refresh(&mut self, id: &WidgetId) -> bool {
        match self.timers.remove(id) {
            Some(entry) => {
                entry.token.cancel();
                debug!(widget = %id, "Auto refresh cancelled");
                true
            }
            None => false,
        }
    }

    /// Forget a widget entirely. Its timer stops now and any fetch still in
    /// flight is discarded when it lands.
    pub fn remove_widget(&mut self, id: &WidgetId) {
        self.cancel_auto_refresh(id);
        self.queries.remove(id);
        self.states.remove(id);
        self.issued.remove(id);
    }

    /// Manual refresh: shows the loading indicator until the fetch lands.
    /// Returns false for widgets the scheduler does not know.
    pub fn refresh_widget(&mut self, id: &WidgetId) -> bool {
        self.issue_fetch(id, false)
    }

    pub fn refresh_all(&mut self) -> usize {
        let ids: Vec<WidgetId> = self.queries.keys().cloned().collect();
        ids.iter().filter(|id| self.issue_fetch(id, false)).count()
    }

    fn issue_fetch(&mut self, id: &WidgetId, silent: bool) -> bool {
        let Some(query) = self.queries.get(id).cloned() else {
            return false;
        };
        let Some(state) = self.states.get_mut(id) else {
            return false;
        };
        if !silent {
            state.loading = true;
        }

        self.next_seq += 1;
        let seq = self.next_seq;
        self.issued.insert(id.clone(), seq);

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let id = id.clone();
        debug!(widget = %id, seq, silent, "Fetching widget data");
        tokio::spawn(async move {
            let result = source.fetch_records(&query).await;
            // The scheduler may be gone by now
            let _ = tx.send(Message::Fetched { id, seq, result });
        });
        true
    }

    /// Wait for the next timer tick or fetch result and apply it
    pub async fn process_next(&mut self) -> RefreshEvent {
        match self.rx.recv().await {
            Some(message) => self.apply(message),
            // The scheduler holds a sender, so the channel never closes
            None => std::future::pending().await,
        }
    }

    /// Apply every message that is already waiting, without blocking
    pub fn drain_pending(&mut self) -> Vec<RefreshEvent> {
        let mut events = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            events.push(self.apply(message));
        }
        events
    }

    fn apply(&mut self, message: Message) -> RefreshEvent {
        match message {
            Message::Tick { id, generation } => {
                let live = self
                    .timers
                    .get(&id)
                    .is_some_and(|entry| entry.generation == generation);
                if live && self.issue_fetch(&id, true) {
                    RefreshEvent::Started { id }
                } else {
                    debug!(widget = %id, generation, "Dropped tick from a cancelled timer");
                    RefreshEvent::Discarded { id }
                }
            }
            Message::Fetched { id, seq, result } => {
                if self.issued.get(&id) != Some(&seq) {
                    debug!(widget = %id, seq, "Discarded stale or orphaned response");
                    return RefreshEvent::Discarded { id };
                }
                let Some(state) = self.states.get_mut(&id) else {
                    return RefreshEvent::Discarded { id };
                };
                state.loading = false;
                match result {
                    Ok(records) => {
                        let rows = records.len();
                        state.dataset = records;
                        state.error = None;
                        state.last_updated = Some(Utc::now());
                        RefreshEvent::Updated { id, rows }
                    }
                    Err(err) => {
                        let message = err.to_string();
                        warn!(widget = %id, error = %message, "Widget refresh failed");
                        state.error = Some(message.clone());
                        RefreshEvent::Failed { id, message }
                    }
                }
            }
        }
    }

    pub fn state(&self, id: &WidgetId) -> Option<&WidgetRuntimeState> {
        self.states.get(id)
    }

    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    pub fn has_timer(&self, id: &WidgetId) -> bool {
        self.timers.contains_key(id)
    }

    /// Period of a widget's running timer
    pub fn timer_period(&self, id: &WidgetId) -> Option<Duration> {
        self.timers.get(id).map(|entry| entry.period)
    }

    /// Whether any manual refresh is still waiting on its response
    pub fn is_loading(&self) -> bool {
        self.states.values().any(|s| s.loading)
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        for entry in self.timers.values() {
            entry.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldValue, WidgetType};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies from a queue of (delay, rows-or-error) scripts
    struct ScriptedSource {
        script: Mutex<VecDeque<(Duration, Result<usize, String>)>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: Vec<(u64, Result<usize, &str>)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(
                    script
                        .into_iter()
                        .map(|(ms, r)| (Duration::from_millis(ms), r.map_err(String::from)))
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DataSource for ScriptedSource {
        async fn fetch_records(&self, _query: &ReportQuery) -> Result<Vec<Record>, ApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            let (delay, outcome) = next.unwrap_or((Duration::ZERO, Ok(1)));
            tokio::time::sleep(delay).await;
            match outcome {
                Ok(n) => Ok((0..n)
                    .map(|i| [("n", FieldValue::number(i as f64))].into_iter().collect())
                    .collect()),
                Err(message) => Err(ApiError::Transport(message)),
            }
        }
    }

    fn settings() -> RefreshSettings {
        RefreshSettings {
            default_interval_secs: 300,
            min_interval_secs: 5,
        }
    }

    fn auto_widget(id: i64, secs: u64) -> Widget {
        let mut widget = Widget::new("Leads", WidgetType::Table, "leads");
        widget.id = WidgetId::from(id);
        widget.display_options.auto_refresh = true;
        widget.display_options.refresh_interval = Some(secs);
        widget
    }

    /// Let spawned tasks run and apply whatever they posted
    async fn settle(scheduler: &mut RefreshScheduler) -> Vec<RefreshEvent> {
        let mut events = Vec::new();
        for _ in 0..20 {
            tokio::task::yield_now().await;
            events.extend(scheduler.drain_pending());
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_leaves_one_timer_per_widget() {
        let source = ScriptedSource::new(vec![]);
        let mut scheduler = RefreshScheduler::new(source.clone(), settings());
        let widget = auto_widget(1, 60);

        scheduler.load_dashboard(std::slice::from_ref(&widget));
        scheduler.load_dashboard(std::slice::from_ref(&widget));
        scheduler.schedule_auto_refresh(&widget);
        assert_eq!(scheduler.timer_count(), 1);
        assert_eq!(scheduler.timer_period(&widget.id), Some(Duration::from_secs(60)));

        tokio::time::advance(Duration::from_secs(61)).await;
        let events = settle(&mut scheduler).await;
        let started = events
            .iter()
            .filter(|e| matches!(e, RefreshEvent::Started { .. }))
            .count();
        assert_eq!(started, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_refresh_keeps_spinner_off() {
        let source = ScriptedSource::new(vec![(0, Ok(3))]);
        let mut scheduler = RefreshScheduler::new(source, settings());
        let widget = auto_widget(1, 10);
        scheduler.load_dashboard(std::slice::from_ref(&widget));

        tokio::time::advance(Duration::from_secs(10)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        let first = scheduler.drain_pending();
        assert!(first.contains(&RefreshEvent::Started { id: widget.id.clone() }));
        assert!(!scheduler.state(&widget.id).unwrap().loading);

        settle(&mut scheduler).await;
        let state = scheduler.state(&widget.id).unwrap();
        assert_eq!(state.dataset.len(), 3);
        assert!(state.last_updated.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_refresh_shows_loading_until_landed() {
        let source = ScriptedSource::new(vec![(500, Ok(2))]);
        let mut scheduler = RefreshScheduler::new(source, settings());
        let widget = auto_widget(1, 60);
        scheduler.register(&widget);

        assert!(scheduler.refresh_widget(&widget.id));
        assert!(scheduler.state(&widget.id).unwrap().loading);

        let event = scheduler.process_next().await;
        assert_eq!(
            event,
            RefreshEvent::Updated {
                id: widget.id.clone(),
                rows: 2
            }
        );
        assert!(!scheduler.state(&widget.id).unwrap().loading);
        assert!(!scheduler.refresh_widget(&WidgetId::from("99")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_manual_response_cannot_overwrite_newer_one() {
        // First fetch is slow and would land last without sequencing
        let source = ScriptedSource::new(vec![(5_000, Ok(1)), (10, Ok(7))]);
        let mut scheduler = RefreshScheduler::new(source, settings());
        let widget = auto_widget(1, 60);
        scheduler.register(&widget);

        scheduler.refresh_widget(&widget.id);
        scheduler.refresh_widget(&widget.id);

        let first = scheduler.process_next().await;
        assert_eq!(first, RefreshEvent::Updated { id: widget.id.clone(), rows: 7 });
        let second = scheduler.process_next().await;
        assert_eq!(second, RefreshEvent::Discarded { id: widget.id.clone() });
        assert_eq!(scheduler.state(&widget.id).unwrap().dataset.len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_for_removed_widget_is_dropped() {
        let source = ScriptedSource::new(vec![(100, Ok(4))]);
        let mut scheduler = RefreshScheduler::new(source, settings());
        let widget = auto_widget(1, 60);
        scheduler.load_dashboard(std::slice::from_ref(&widget));

        scheduler.refresh_widget(&widget.id);
        scheduler.remove_widget(&widget.id);
        assert!(!scheduler.has_timer(&widget.id));

        let event = scheduler.process_next().await;
        assert_eq!(event, RefreshEvent::Discarded { id: widget.id.clone() });
        assert!(scheduler.state(&widget.id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_dataset() {
        let source = ScriptedSource::new(vec![(0, Ok(2)), (0, Err("connection reset"))]);
        let mut scheduler = RefreshScheduler::new(source, settings());
        let widget = auto_widget(1, 60);
        scheduler.register(&widget);

        scheduler.refresh_widget(&widget.id);
        scheduler.process_next().await;
        scheduler.refresh_widget(&widget.id);
        let event = scheduler.process_next().await;

        assert!(matches!(event, RefreshEvent::Failed { .. }));
        let state = scheduler.state(&widget.id).unwrap();
        assert_eq!(state.error.as_deref(), Some("Request failed: connection reset"));
        assert_eq!(state.dataset.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_auto_refresh_has_no_timer() {
        let source = ScriptedSource::new(vec![]);
        let mut scheduler = RefreshScheduler::new(source, settings());
        let mut widget = auto_widget(1, 60);
        assert!(scheduler.schedule_auto_refresh(&widget));

        widget.display_options.auto_refresh = false;
        assert!(!scheduler.schedule_auto_refresh(&widget));
        assert_eq!(scheduler.timer_count(), 0);
        // Still tracked for manual refresh
        assert!(scheduler.state(&widget.id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_floor_applies() {
        let source = ScriptedSource::new(vec![]);
        let mut scheduler = RefreshScheduler::new(source, settings());
        let widget = auto_widget(1, 1);
        scheduler.schedule_auto_refresh(&widget);
        assert_eq!(scheduler.timer_period(&widget.id), Some(Duration::from_secs(5)));
    }
}
