use clap::{Parser, ValueEnum};
use color_eyre::Result;
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crmdash::config::Config;
use crmdash::render::plain_text;
use crmdash::services::{DashboardView, DataSource, FileDataApi, HttpDataApi, WidgetStore};
use crmdash::tui::{App, KeyBindings};

/// Terminal dashboard for CRM report widgets
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable file logging at the given level (overrides RUST_LOG)
    #[arg(long = "logging", value_enum)]
    logging: Option<LogLevel>,
    /// Path to a config file (overrides default config discovery)
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Dashboard to open
    #[arg(long = "dashboard", value_name = "ID", default_value = "1")]
    dashboard: String,
    /// Read reports and the dashboard from JSON files in DIR instead of the API.
    /// Expects DIR/dashboard.json and one DIR/<report_type>.json per report
    #[arg(long = "offline", value_name = "DIR")]
    offline: Option<PathBuf>,
    /// Fetch every widget once, print it as text and exit
    #[arg(long)]
    once: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum LogLevel { Error, Warn, Info, Debug, Trace }

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    let level = match args.logging {
        Some(LogLevel::Error) => Some(tracing::Level::ERROR),
        Some(LogLevel::Warn)  => Some(tracing::Level::WARN),
        Some(LogLevel::Info)  => Some(tracing::Level::INFO),
        Some(LogLevel::Debug) => Some(tracing::Level::DEBUG),
        Some(LogLevel::Trace) => Some(tracing::Level::TRACE),
        None => None,
    };
    // Log file in the current working directory
    crmdash::logging::init_with(None, level)?;

    let config = Config::from_path(args.config.as_ref())?;

    // One thread: timers, fetches and the UI take turns on the same loop
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args, config))
}

async fn run(args: Args, config: Config) -> Result<()> {
    let (source, store): (Arc<dyn DataSource>, Arc<dyn WidgetStore>) = match &args.offline {
        Some(dir) => {
            info!("Using offline data from {}", dir.display());
            let api = Arc::new(FileDataApi::new(dir));
            (api.clone(), api)
        }
        None => {
            let api = Arc::new(HttpDataApi::new(config.api.clone())?);
            (api.clone(), api)
        }
    };

    let mut dashboard = DashboardView::new(source, store, &config);
    dashboard.open(&args.dashboard).await?;
    info!(
        "Opened dashboard {} with {} widgets",
        dashboard.id(),
        dashboard.widgets().len()
    );

    if args.once {
        return print_once(dashboard, config.api.timeout() + Duration::from_secs(1)).await;
    }

    let mut app = App::new(dashboard, &config);
    let bindings_path = config.config.config_dir.join("keybindings.json");
    if bindings_path.exists() {
        match KeyBindings::load_from_file(&bindings_path) {
            Ok(bindings) => {
                for warning in bindings.validate() {
                    warn!("{warning}");
                }
                app.set_keybindings(bindings);
            }
            Err(e) => warn!("Ignoring {}: {e}", bindings_path.display()),
        }
    }

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    if let Err(e) = &res {
        error!("Error: {e}");
    }
    res
}

/// Wait for the first fetch of every widget, then print each card as text
async fn print_once(mut dashboard: DashboardView, wait: Duration) -> Result<()> {
    while dashboard.scheduler().is_loading() {
        if tokio::time::timeout(wait, dashboard.next_event()).await.is_err() {
            warn!("Gave up waiting for widget data after {wait:?}");
            break;
        }
    }

    for (_, rendered) in dashboard.render_all() {
        println!("{}", plain_text(&rendered));
    }
    Ok(())
}
