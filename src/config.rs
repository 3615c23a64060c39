use std::{collections::HashMap, env, path::PathBuf, time::Duration};

use directories::BaseDirs;
use lazy_static::lazy_static;
use serde::Deserialize;

const CONFIG: &str = include_str!("../.config/config.json5");

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub config_dir: PathBuf,
}

/// Where report data and widget definitions live
#[derive(Clone, Debug, Deserialize)]
pub struct ApiSettings {
    pub base_url: String,
    /// Bearer token sent with every request when set
    #[serde(default)]
    pub token: Option<String>,
    pub widget_endpoint: String,
    pub dashboard_endpoint: String,
    pub timeout_secs: u64,
    /// report_type -> path segment, for sources whose path differs from the type name
    #[serde(default)]
    pub report_sources: HashMap<String, String>,
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Path segment for a report type, falling back to the type itself
    pub fn report_path<'a>(&'a self, report_type: &'a str) -> &'a str {
        self.report_sources
            .get(report_type)
            .map(String::as_str)
            .unwrap_or(report_type)
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            token: None,
            widget_endpoint: "dashboard-widgets".to_string(),
            dashboard_endpoint: "dashboards".to_string(),
            timeout_secs: 30,
            report_sources: HashMap::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct RefreshSettings {
    /// Interval for widgets that enable auto refresh without choosing one
    pub default_interval_secs: u64,
    /// Shortest interval a timer will run at
    pub min_interval_secs: u64,
}

impl RefreshSettings {
    /// Effective timer period for a widget's configured interval
    pub fn period_for(&self, configured: Option<u64>) -> Duration {
        let secs = configured
            .filter(|secs| *secs > 0)
            .unwrap_or(self.default_interval_secs)
            .max(self.min_interval_secs)
            .max(1);
        Duration::from_secs(secs)
    }
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            default_interval_secs: crate::core::DEFAULT_REFRESH_INTERVAL_SECS,
            min_interval_secs: 5,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct LayoutSettings {
    pub columns: u16,
    /// Terminal rows per grid row
    pub row_height: u16,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            columns: 12,
            row_height: 4,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default, flatten)]
    pub config: AppConfig,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
    #[serde(default)]
    pub layout: LayoutSettings,
}

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref DATA_FOLDER: Option<PathBuf> =
        env::var(format!("{}_DATA", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
    pub static ref CONFIG_FOLDER: Option<PathBuf> =
        env::var(format!("{}_CONFIG", PROJECT_NAME.clone()))
            .ok()
            .map(PathBuf::from);
}

impl Config {
    /// Layer the embedded defaults, then the user file, then `CRMDASH__*` environment variables.
    ///
    /// An explicit `config_path` must exist; the home file (`~/.crmdash-config.json5`)
    /// is read only when present.
    pub fn from_path(config_path: Option<&PathBuf>) -> Result<Self, config::ConfigError> {
        let data_dir = get_data_dir();
        let config_dir = get_config_dir();
        let mut builder = config::Config::builder()
            .set_default("data_dir", data_dir.to_string_lossy().to_string())?
            .set_default("config_dir", config_dir.to_string_lossy().to_string())?
            .add_source(config::File::from_str(CONFIG, config::FileFormat::Json5));

        builder = match config_path {
            Some(p) => builder.add_source(
                config::File::from(expand_tilde(p))
                    .format(config::FileFormat::Json5)
                    .required(true),
            ),
            None => builder.add_source(
                config::File::from(default_home_config_path())
                    .format(config::FileFormat::Json5)
                    .required(false),
            ),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(&PROJECT_NAME)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

fn expand_tilde(path: &PathBuf) -> PathBuf {
    if let Some(s) = path.to_str() {
        if s.starts_with('~') {
            if let Some(base) = BaseDirs::new() {
                return PathBuf::from(s.replacen('~', base.home_dir().to_str().unwrap_or(""), 1));
            }
        }
    }
    path.clone()
}

fn default_home_config_path() -> PathBuf {
    if let Some(base) = BaseDirs::new() {
        return base.home_dir().join(".crmdash-config.json5");
    }
    PathBuf::from(".crmdash-config.json5")
}

pub fn get_data_dir() -> PathBuf {
    if let Some(s) = DATA_FOLDER.clone() {
        s
    } else {
        PathBuf::from(".").join(".data")
    }
}

pub fn get_config_dir() -> PathBuf {
    if let Some(s) = CONFIG_FOLDER.clone() {
        s
    } else {
        PathBuf::from(".").join(".config")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let cfg: Config = json5::from_str(CONFIG).unwrap();
        assert_eq!(cfg.api.widget_endpoint, "dashboard-widgets");
        assert_eq!(cfg.refresh.default_interval_secs, 300);
        assert_eq!(cfg.layout.columns, 12);
    }

    #[test]
    fn test_user_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crmdash.json5");
        std::fs::write(
            &path,
            r#"{ api: { base_url: "https://crm.example.com/api", token: "abc" }, refresh: { min_interval_secs: 30 } }"#,
        )
        .unwrap();

        let cfg = Config::from_path(Some(&path)).unwrap();
        assert_eq!(cfg.api.base_url, "https://crm.example.com/api");
        assert_eq!(cfg.api.token.as_deref(), Some("abc"));
        // Untouched keys keep their embedded values
        assert_eq!(cfg.api.dashboard_endpoint, "dashboards");
        assert_eq!(cfg.refresh.default_interval_secs, 300);
        assert_eq!(cfg.refresh.min_interval_secs, 30);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.json5");
        assert!(Config::from_path(Some(&path)).is_err());
    }

    #[test]
    fn test_report_path_falls_back_to_type() {
        let mut api = ApiSettings::default();
        api.report_sources.insert("calls".into(), "call-logs".into());
        assert_eq!(api.report_path("calls"), "call-logs");
        assert_eq!(api.report_path("leads"), "leads");

        // Unmapped types borrow from the caller's string
        let report_type = String::from("tickets");
        let path = api.report_path(&report_type);
        assert_eq!(path, "tickets");
    }

    #[test]
    fn test_refresh_period() {
        let refresh = RefreshSettings {
            default_interval_secs: 300,
            min_interval_secs: 5,
        };
        assert_eq!(refresh.period_for(None), Duration::from_secs(300));
        assert_eq!(refresh.period_for(Some(0)), Duration::from_secs(300));
        assert_eq!(refresh.period_for(Some(2)), Duration::from_secs(5));
        assert_eq!(refresh.period_for(Some(60)), Duration::from_secs(60));
    }
}
