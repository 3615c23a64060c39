//! A dashboard driven by the offline file store

use std::sync::Arc;

use crmdash::render::{plain_text, Presentation};
use crmdash::services::{DashboardEvent, DashboardView, FileDataApi};
use crmdash::{Config, WidgetId};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, value: Value) {
    std::fs::write(dir.path().join(name), serde_json::to_vec_pretty(&value).unwrap()).unwrap();
}

fn read(dir: &TempDir, name: &str) -> Value {
    serde_json::from_slice(&std::fs::read(dir.path().join(name)).unwrap()).unwrap()
}

fn create_store() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        &dir,
        "dashboard.json",
        json!({
            "id": 4,
            "name": "Sales",
            "widgets": [
                {
                    "id": 10,
                    "title": "Open deals",
                    "widget_type": "table",
                    "report_type": "deals",
                    "filters": {"stage": "open"},
                    "selected_fields": ["name", "amount"],
                    "position_x": 0, "position_y": 0, "width": 6, "height": 3
                },
                {
                    "id": 11,
                    "title": "Pipeline value",
                    "widget_type": "metric_card",
                    "report_type": "deals",
                    "display_options": {"metricType": "sum", "metricField": "amount"},
                    "position_x": 6, "position_y": 0, "width": 6, "height": 3
                },
                {
                    "id": 12,
                    "title": "Tickets",
                    "widget_type": "list",
                    "report_type": "tickets",
                    "selected_fields": ["subject"],
                    "position_x": 0, "position_y": 3, "width": 12, "height": 2
                }
            ]
        }),
    );
    write(
        &dir,
        "deals.json",
        json!({"data": [
            {"name": "Acme", "stage": "open", "amount": 1200},
            {"name": "Globex", "stage": "won", "amount": 800},
            {"name": "Initech", "stage": "open", "amount": "300"}
        ]}),
    );
    dir
}

async fn open(dir: &TempDir) -> DashboardView {
    let api = Arc::new(FileDataApi::new(dir.path()));
    let mut view = DashboardView::new(api.clone(), api, &Config::default());
    view.open("4").await.unwrap();
    while view.scheduler().is_loading() {
        view.next_event().await;
    }
    view
}

#[tokio::test]
async fn test_widgets_render_from_files() {
    let dir = create_store();
    let view = open(&dir).await;
    assert_eq!(view.name(), "Sales");

    let rendered = view.render_all();
    let titles: Vec<&str> = rendered.iter().map(|(_, r)| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Open deals", "Pipeline value", "Tickets"]);

    // Filters apply to the table only
    let Presentation::Table(table) = &rendered[0].1.body else {
        panic!("expected a table, got {:?}", rendered[0].1.body);
    };
    assert_eq!(
        table.rows,
        vec![
            vec!["Acme".to_string(), "1.2K".to_string()],
            vec!["Initech".to_string(), "300".to_string()],
        ]
    );

    let Presentation::Metric(metric) = &rendered[1].1.body else {
        panic!("expected a metric, got {:?}", rendered[1].1.body);
    };
    assert_eq!(metric.value, 2300.0);

    // No tickets.json: the error stays on that card
    assert!(matches!(rendered[2].1.body, Presentation::Error { .. }));
    assert!(plain_text(&rendered[2].1).contains("(retry available)"));
}

#[tokio::test]
async fn test_layout_change_is_written_back() {
    let dir = create_store();
    let mut view = open(&dir).await;
    let id = WidgetId::from("12");

    view.toggle_edit_mode();
    assert_eq!(view.nudge(&id, 0, 1, -4, 0), 1);
    let event = loop {
        match view.next_event().await {
            DashboardEvent::Refresh(_) => continue,
            other => break other,
        }
    };
    assert_eq!(event, DashboardEvent::LayoutSaved { id });

    let stored = read(&dir, "dashboard.json");
    let widget = &stored["widgets"][2];
    assert_eq!(widget["position_y"], json!(4));
    assert_eq!(widget["width"], json!(8));
    // Untouched fields survive the rewrite
    assert_eq!(widget["title"], json!("Tickets"));
}

#[tokio::test]
async fn test_delete_removes_widget_from_file() {
    let dir = create_store();
    let mut view = open(&dir).await;

    view.delete_widget(&WidgetId::from("11")).await.unwrap();
    assert_eq!(view.widgets().len(), 2);

    let stored = read(&dir, "dashboard.json");
    let ids: Vec<i64> = stored["widgets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|w| w["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![10, 12]);
}

#[tokio::test]
async fn test_missing_dashboard_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let api = Arc::new(FileDataApi::new(dir.path()));
    let mut view = DashboardView::new(api.clone(), api, &Config::default());

    let err = view.open("4").await.unwrap_err();
    assert!(err.to_string().starts_with("Not found"));
}
