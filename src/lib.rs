#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_match)]
#![allow(clippy::collapsible_else_if)]

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod render;
pub mod services;
pub mod tui;

// Re-export commonly used types
pub use config::Config;
pub use core::{Dashboard, FieldType, FieldValue, Record, Widget, WidgetId, WidgetRuntimeState, WidgetType};
pub use error::ApiError;
pub use render::{render, Presentation, RenderedWidget};
pub use services::{DashboardEvent, DashboardView, FileDataApi, HttpDataApi, RefreshScheduler};
pub use tui::{Action, ActionCategory};
