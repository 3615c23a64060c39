pub mod aggregation;
pub mod classifier;
pub mod dashboard;
pub mod data_api;
pub mod formatter;
pub mod layout;
pub mod scheduler;

pub use aggregation::{aggregate, Aggregation, Bucket};
pub use classifier::classify;
pub use dashboard::{DashboardEvent, DashboardView};
pub use data_api::{normalize_payload, DataSource, FileDataApi, HttpDataApi, WidgetStore};
pub use formatter::{format_value, to_orderable};
pub use layout::{LayoutChange, LayoutController, LayoutItem};
pub use scheduler::{RefreshEvent, RefreshScheduler};
