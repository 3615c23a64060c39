use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::core::{Geometry, Widget, WidgetId};

/// One widget's slot in the grid, as the grid reports it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutItem {
    pub id: WidgetId,
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

/// A geometry write the caller should send to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutChange {
    pub id: WidgetId,
    pub geometry: Geometry,
    /// Hand back with the outcome; only the latest write per widget counts
    pub seq: u64,
}

/// Tracks widget geometry and decides which drags and resizes need persisting.
///
/// Changes are applied locally right away. A failed write leaves the new
/// geometry on screen and marks the widget unsaved; unsaved widgets are sent
/// again with the next layout change.
#[derive(Debug, Clone)]
pub struct LayoutController {
    columns: u16,
    edit_mode: bool,
    /// Current grid geometry in widget order
    order: Vec<WidgetId>,
    current: HashMap<WidgetId, Geometry>,
    /// Last geometry sent to the store per widget
    persisted: HashMap<WidgetId, Geometry>,
    unsaved: HashSet<WidgetId>,
    next_seq: u64,
    /// Sequence of the newest write issued per widget
    latest_write: HashMap<WidgetId, u64>,
}

impl LayoutController {
    pub fn new(columns: u16) -> Self {
        Self {
            columns: columns.max(1),
            edit_mode: false,
            order: Vec::new(),
            current: HashMap::new(),
            persisted: HashMap::new(),
            unsaved: HashSet::new(),
            next_seq: 0,
            latest_write: HashMap::new(),
        }
    }

    /// Take geometry from a freshly loaded widget list
    pub fn load(&mut self, widgets: &[Widget]) {
        self.order = widgets.iter().map(|w| w.id.clone()).collect();
        self.current = widgets
            .iter()
            .map(|w| (w.id.clone(), self.clamp(w.geometry())))
            .collect();
        self.persisted = widgets.iter().map(|w| (w.id.clone(), w.geometry())).collect();
        self.unsaved.clear();
        self.latest_write.clear();
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn set_edit_mode(&mut self, on: bool) {
        self.edit_mode = on;
    }

    pub fn toggle_edit_mode(&mut self) -> bool {
        self.edit_mode = !self.edit_mode;
        self.edit_mode
    }

    pub fn geometry(&self, id: &WidgetId) -> Option<Geometry> {
        self.current.get(id).copied()
    }

    /// Widgets with their geometry, in load order
    pub fn items(&self) -> impl Iterator<Item = (&WidgetId, Geometry)> {
        self.order
            .iter()
            .filter_map(|id| self.current.get(id).map(|g| (id, *g)))
    }

    /// Rows the grid needs to show every widget
    pub fn grid_rows(&self) -> u16 {
        self.current.values().map(|g| g.y.saturating_add(g.h)).max().unwrap_or(0)
    }

    /// Apply a layout reported by the grid and return the writes to send.
    ///
    /// Ignored outside edit mode. Only entries whose geometry differs from
    /// what was last persisted, plus widgets still marked unsaved, come back.
    pub fn on_layout_change(&mut self, layout: &[LayoutItem]) -> Vec<LayoutChange> {
        if !self.edit_mode {
            debug!("Layout change ignored outside edit mode");
            return Vec::new();
        }

        let mut changes = Vec::new();
        for item in layout {
            let id = item.id.clone();
            let Some(persisted) = self.persisted.get(&id).copied() else {
                debug!(widget = %item.id, "Layout change for unknown widget");
                continue;
            };
            let geometry = self.clamp(Geometry {
                x: item.x,
                y: item.y,
                w: item.w,
                h: item.h,
            });
            self.current.insert(id.clone(), geometry);
            if geometry != persisted || self.unsaved.contains(&id) {
                self.next_seq += 1;
                let seq = self.next_seq;
                self.persisted.insert(id.clone(), geometry);
                self.latest_write.insert(id.clone(), seq);
                changes.push(LayoutChange { id, geometry, seq });
            }
        }
        changes
    }

    /// Current layout with one widget shifted or resized, for keyboard edits
    pub fn nudged(&self, id: &WidgetId, dx: i32, dy: i32, dw: i32, dh: i32) -> Vec<LayoutItem> {
        self.items()
            .map(|(wid, g)| {
                let g = if wid == id {
                    Geometry {
                        x: offset(g.x, dx),
                        y: offset(g.y, dy),
                        w: offset(g.w, dw).max(1),
                        h: offset(g.h, dh).max(1),
                    }
                } else {
                    g
                };
                LayoutItem {
                    id: wid.clone(),
                    x: g.x,
                    y: g.y,
                    w: g.w,
                    h: g.h,
                }
            })
            .collect()
    }

    /// Whether `seq` is the newest write issued for `id`
    fn is_latest(&self, id: &WidgetId, seq: u64) -> bool {
        self.latest_write.get(id) == Some(&seq)
    }

    /// Apply a successful write. Returns false when a newer write superseded it.
    pub fn record_saved(&mut self, id: &WidgetId, seq: u64) -> bool {
        if !self.is_latest(id, seq) {
            debug!(widget = %id, seq, "Ignoring result of superseded layout write");
            return false;
        }
        self.unsaved.remove(id);
        true
    }

    /// Apply a failed write. Returns false when a newer write superseded it.
    pub fn record_failed(&mut self, id: &WidgetId, seq: u64, error: &str) -> bool {
        if !self.is_latest(id, seq) {
            debug!(widget = %id, seq, error, "Ignoring failure of superseded layout write");
            return false;
        }
        warn!(widget = %id, error, "Layout not saved");
        self.unsaved.insert(id.clone());
        true
    }

    pub fn is_unsaved(&self, id: &WidgetId) -> bool {
        self.unsaved.contains(id)
    }

    pub fn unsaved_count(&self) -> usize {
        self.unsaved.len()
    }

    pub fn remove(&mut self, id: &WidgetId) {
        self.order.retain(|w| w != id);
        self.current.remove(id);
        self.persisted.remove(id);
        self.unsaved.remove(id);
        self.latest_write.remove(id);
    }

    /// Keep a widget inside the grid's columns
    fn clamp(&self, g: Geometry) -> Geometry {
        let w = g.w.clamp(1, self.columns);
        Geometry {
            x: g.x.min(self.columns - w),
            y: g.y,
            w,
            h: g.h.max(1),
        }
    }
}

fn offset(value: u16, delta: i32) -> u16 {
    (i32::from(value) + delta).clamp(0, i32::from(u16::MAX)) as u16
}
