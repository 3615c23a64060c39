//! Collaborators the dashboard talks to: where records come from and where
//! widget definitions are persisted.
//!
//! Two implementations ship with the crate. [`HttpDataApi`] talks to the CRM
//! REST API; [`FileDataApi`] reads JSON files from a directory for offline use
//! and tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ApiSettings;
use crate::core::{Dashboard, FieldValue, GeometryPatch, Record, ReportQuery, Widget, WidgetId};
use crate::error::ApiError;

/// Longest server error body kept in a widget's error message
const MAX_ERROR_BODY: usize = 200;

/// Source of report records for widgets
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch_records(&self, query: &ReportQuery) -> Result<Vec<Record>, ApiError>;
}

/// Persistence of dashboards and widget definitions
#[async_trait]
pub trait WidgetStore: Send + Sync {
    async fn load_dashboard(&self, id: &str) -> Result<Dashboard, ApiError>;

    /// Write a widget's grid position and size
    async fn save_geometry(&self, id: &WidgetId, patch: &GeometryPatch) -> Result<(), ApiError>;

    async fn delete_widget(&self, id: &WidgetId) -> Result<(), ApiError>;
}

/// Turn a report response into records.
///
/// The API returns either a bare array or an object wrapping the array under
/// `data` or under the report type's own name. Rows that are not objects are
/// skipped.
pub fn normalize_payload(payload: Value, report_type: &str) -> Result<Vec<Record>, ApiError> {
    let rows = match payload {
        Value::Array(rows) => rows,
        Value::Object(mut object) => match object
            .remove("data")
            .filter(Value::is_array)
            .or_else(|| object.remove(report_type).filter(Value::is_array))
        {
            Some(Value::Array(rows)) => rows,
            _ => {
                let keys: Vec<&String> = object.keys().collect();
                return Err(ApiError::Shape(format!(
                    "expected an array under 'data' or '{report_type}', found keys {keys:?}"
                )));
            }
        },
        other => {
            return Err(ApiError::Shape(format!(
                "expected an array of records, found {}",
                json_kind(&other)
            )));
        }
    };

    let total = rows.len();
    let records: Vec<Record> = rows
        .iter()
        .filter_map(|row| row.as_object().map(Record::from_json_object))
        .collect();
    if records.len() < total {
        warn!(
            report_type,
            skipped = total - records.len(),
            "Skipped report rows that are not objects"
        );
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Client for the CRM REST API
pub struct HttpDataApi {
    client: Client,
    settings: ApiSettings,
}

impl HttpDataApi {
    pub fn new(settings: ApiSettings) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.settings.base_url.trim_end_matches('/').to_string();
        for segment in segments {
            url.push('/');
            url.push_str(segment.trim_matches('/'));
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.settings.token.as_deref() {
            Some(token) if !token.is_empty() => request.bearer_auth(token),
            _ => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, ApiError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(what.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("error").to_string()
        } else {
            body.trim().chars().take(MAX_ERROR_BODY).collect()
        };
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl DataSource for HttpDataApi {
    async fn fetch_records(&self, query: &ReportQuery) -> Result<Vec<Record>, ApiError> {
        let url = self.url(&[self.settings.report_path(&query.report_type)]);
        debug!(%url, report_type = %query.report_type, "Fetching report");
        let request = self
            .client
            .get(&url)
            .query(&[("filters", query.filters.to_string())]);
        let payload: Value = self.send(request, &url).await?.json().await?;
        normalize_payload(payload, &query.report_type)
    }
}

#[async_trait]
impl WidgetStore for HttpDataApi {
    async fn load_dashboard(&self, id: &str) -> Result<Dashboard, ApiError> {
        let url = self.url(&[self.settings.dashboard_endpoint.as_str(), id]);
        let payload: Value = self.send(self.client.get(&url), &url).await?.json().await?;
        Ok(serde_json::from_value(payload)?)
    }

    async fn save_geometry(&self, id: &WidgetId, patch: &GeometryPatch) -> Result<(), ApiError> {
        let url = self.url(&[self.settings.widget_endpoint.as_str(), id.as_str()]);
        self.send(self.client.put(&url).json(patch), &url).await?;
        Ok(())
    }

    async fn delete_widget(&self, id: &WidgetId) -> Result<(), ApiError> {
        let url = self.url(&[self.settings.widget_endpoint.as_str(), id.as_str()]);
        self.send(self.client.delete(&url), &url).await?;
        Ok(())
    }
}

/// Offline store backed by a directory of JSON files.
///
/// `<dir>/<report_type>.json` holds each report's payload in any shape
/// [`normalize_payload`] accepts. `<dir>/dashboard.json` holds a dashboard
/// object or a bare array of widgets; geometry changes and deletions are
/// written back to it.
pub struct FileDataApi {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileDataApi {
    pub const DASHBOARD_FILE: &'static str = "dashboard.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn dashboard_path(&self) -> PathBuf {
        self.dir.join(Self::DASHBOARD_FILE)
    }

    async fn read_json(&self, path: &Path) -> Result<Value, ApiError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ApiError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    async fn write_json(&self, path: &Path, value: &Value) -> Result<(), ApiError> {
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(value)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Apply `edit` to the stored widget list and write the file back
    async fn edit_widgets<F>(&self, edit: F) -> Result<(), ApiError>
    where
        F: FnOnce(&mut Vec<Value>) -> Result<(), ApiError> + Send,
    {
        let _guard = self.write_lock.lock().await;
        let path = self.dashboard_path();
        let mut document = self.read_json(&path).await?;
        let widgets = match &mut document {
            Value::Array(widgets) => widgets,
            Value::Object(object) => match object.get_mut("widgets") {
                Some(Value::Array(widgets)) => widgets,
                _ => return Err(ApiError::Shape("dashboard file has no widgets array".to_string())),
            },
            other => {
                return Err(ApiError::Shape(format!(
                    "dashboard file holds {}",
                    json_kind(other)
                )));
            }
        };
        edit(widgets)?;
        self.write_json(&path, &document).await
    }
}

fn widget_position(widgets: &[Value], id: &WidgetId) -> Option<usize> {
    widgets.iter().position(|w| {
        w.get("id")
            .cloned()
            .and_then(|raw| serde_json::from_value::<WidgetId>(raw).ok())
            .is_some_and(|wid| &wid == id)
    })
}

/// Keep rows whose fields equal every scalar filter value
fn matches_filters(record: &Record, filters: &Map<String, Value>) -> bool {
    filters.iter().all(|(field, wanted)| match wanted {
        Value::Null => true,
        Value::String(s) if s.is_empty() => true,
        Value::Array(_) | Value::Object(_) => true,
        wanted => {
            let wanted = FieldValue::from_json(wanted).key();
            record.get(field).is_some_and(|v| v.key() == wanted)
        }
    })
}

#[async_trait]
impl DataSource for FileDataApi {
    async fn fetch_records(&self, query: &ReportQuery) -> Result<Vec<Record>, ApiError> {
        let path = self.dir.join(format!("{}.json", query.report_type));
        let payload = self.read_json(&path).await?;
        let records = normalize_payload(payload, &query.report_type)?;
        Ok(match query.filters.as_object() {
            Some(filters) if !filters.is_empty() => records
                .into_iter()
                .filter(|r| matches_filters(r, filters))
                .collect(),
            _ => records,
        })
    }
}

#[async_trait]
impl WidgetStore for FileDataApi {
    async fn load_dashboard(&self, id: &str) -> Result<Dashboard, ApiError> {
        let document = self.read_json(&self.dashboard_path()).await?;
        match document {
            Value::Array(_) => {
                let widgets: Vec<Widget> = serde_json::from_value(document)?;
                Ok(Dashboard {
                    id: WidgetId::from(id),
                    name: "Offline dashboard".to_string(),
                    widgets,
                })
            }
            Value::Object(_) => {
                let dashboard: Dashboard = serde_json::from_value(document)?;
                if dashboard.id.as_str() != id {
                    debug!(requested = id, found = %dashboard.id, "Offline store holds a single dashboard");
                }
                Ok(dashboard)
            }
            other => Err(ApiError::Shape(format!(
                "dashboard file holds {}",
                json_kind(&other)
            ))),
        }
    }

    async fn save_geometry(&self, id: &WidgetId, patch: &GeometryPatch) -> Result<(), ApiError> {
        let patch_value = serde_json::to_value(patch)?;
        self.edit_widgets(|widgets| {
            let index = widget_position(widgets, id)
                .ok_or_else(|| ApiError::NotFound(format!("widget {id}")))?;
            if let (Some(widget), Value::Object(fields)) = (widgets[index].as_object_mut(), patch_value) {
                widget.extend(fields);
            }
            Ok(())
        })
        .await
    }

    async fn delete_widget(&self, id: &WidgetId) -> Result<(), ApiError> {
        self.edit_widgets(|widgets| {
            let index = widget_position(widgets, id)
                .ok_or_else(|| ApiError::NotFound(format!("widget {id}")))?;
            widgets.remove(index);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_normalize_accepts_all_shapes() {
        let bare = normalize_payload(json!([{"a": 1}, {"a": 2}]), "leads").unwrap();
        assert_eq!(bare.len(), 2);

        let wrapped = normalize_payload(json!({"data": [{"a": 1}], "total": 1}), "leads").unwrap();
        assert_eq!(wrapped.len(), 1);

        let keyed = normalize_payload(json!({"leads": [{"a": 1}, {"a": 2}, {"a": 3}]}), "leads").unwrap();
        assert_eq!(keyed.len(), 3);
        assert_eq!(keyed[2].get("a"), Some(&FieldValue::number(3.0)));
    }

    #[test]
    fn test_normalize_rejects_other_shapes() {
        assert!(matches!(
            normalize_payload(json!({"accounts": []}), "leads"),
            Err(ApiError::Shape(_))
        ));
        assert!(matches!(normalize_payload(json!("nope"), "leads"), Err(ApiError::Shape(_))));
        // `data` that is not an array does not count
        assert!(matches!(
            normalize_payload(json!({"data": {"a": 1}}), "leads"),
            Err(ApiError::Shape(_))
        ));
    }

    #[test]
    fn test_normalize_skips_non_object_rows() {
        let records = normalize_payload(json!([{"a": 1}, 7, null, {"a": 2}]), "leads").unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_url_joining() {
        let api = HttpDataApi::new(ApiSettings {
            base_url: "http://crm.local/api/".to_string(),
            ..ApiSettings::default()
        })
        .unwrap();
        assert_eq!(
            api.url(&["/dashboard-widgets/", "12"]),
            "http://crm.local/api/dashboard-widgets/12"
        );
    }

    /// Serve one canned HTTP response and hand back the raw request
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).to_string()
        });
        (format!("http://{addr}/api"), handle)
    }

    #[tokio::test]
    async fn test_http_fetch_sends_filters_and_token() {
        let (base_url, server) = serve_once("200 OK", r#"{"data": [{"status": "new"}]}"#).await;
        let mut settings = ApiSettings {
            base_url,
            token: Some("secret".to_string()),
            ..ApiSettings::default()
        };
        settings.report_sources.insert("calls".into(), "call-logs".into());
        let api = HttpDataApi::new(settings).unwrap();

        let records = api
            .fetch_records(&ReportQuery {
                report_type: "calls".to_string(),
                filters: json!({"owner": 3}),
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 1);

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/call-logs?filters="));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_reported() {
        let (base_url, server) = serve_once("503 Service Unavailable", "").await;
        let api = HttpDataApi::new(ApiSettings {
            base_url,
            ..ApiSettings::default()
        })
        .unwrap();

        let err = api
            .fetch_records(&ReportQuery {
                report_type: "leads".to_string(),
                filters: json!({}),
            })
            .await
            .unwrap_err();
        server.await.unwrap();
        assert_eq!(err.to_string(), "Server returned 503: Service Unavailable");
    }

    #[tokio::test]
    async fn test_file_store_filters_and_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("leads.json"),
            json!({"leads": [{"status": "new", "owner": 1}, {"status": "won", "owner": 2}]}).to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join(FileDataApi::DASHBOARD_FILE),
            json!({"id": 1, "name": "Sales", "widgets": [
                {"id": 10, "widget_type": "table", "report_type": "leads"},
                {"id": 11, "widget_type": "list", "report_type": "leads"}
            ]})
            .to_string(),
        )
        .unwrap();
        let store = FileDataApi::new(dir.path());

        let filtered = store
            .fetch_records(&ReportQuery {
                report_type: "leads".to_string(),
                filters: json!({"owner": 2, "region": ""}),
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].get("status"), Some(&FieldValue::Text("won".into())));

        let id = WidgetId::from("10");
        store
            .save_geometry(
                &id,
                &GeometryPatch {
                    position_x: 4,
                    position_y: 2,
                    width: 6,
                    height: 5,
                },
            )
            .await
            .unwrap();
        store.delete_widget(&WidgetId::from("11")).await.unwrap();

        let dashboard = store.load_dashboard("1").await.unwrap();
        assert_eq!(dashboard.name, "Sales");
        assert_eq!(dashboard.widgets.len(), 1);
        assert_eq!(dashboard.widgets[0].position_x, 4);
        assert_eq!(dashboard.widgets[0].width, 6);

        assert!(matches!(
            store.delete_widget(&WidgetId::from("11")).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_file_store_missing_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileDataApi::new(dir.path());
        let err = store
            .fetch_records(&ReportQuery {
                report_type: "accounts".to_string(),
                filters: json!({}),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
