use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use study_core::{Config, HttpStudyApi, StudyApi};
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "bible-study", version)]
#[command(about = "Study KJV scripture with Adam Clarke's commentary, AI questions and notes")]
struct Cli {
    /// Base URL of the study API (overrides config and BIBLE_STUDY_API_URL)
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Book to open at startup
    #[arg(short, long)]
    book: Option<String>,

    /// Chapter to open at startup
    #[arg(short, long)]
    chapter: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, load_error) = Config::load();
    if let Some(url) = &cli.api_url {
        config.set_api_base_url(url);
    }
    if let Some(book) = cli.book {
        config.default_book = book;
    }
    if let Some(chapter) = cli.chapter {
        config.default_chapter = chapter;
    }

    // File logging; stderr belongs to the terminal UI
    let log_dir = config.log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::never(&log_dir, "bible-study.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "study_tui=debug,study_core=debug,warn".into()
        }))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    if let Some(e) = &load_error {
        warn!(error = %e, "config file unreadable, using defaults");
        eprintln!("bible-study: config file unreadable, using defaults: {}", e);
    }

    info!(
        api = %config.api_base_url,
        "starting bible-study, logging to {}/bible-study.log",
        log_dir.display()
    );

    let api: Arc<dyn StudyApi> = Arc::new(HttpStudyApi::new(&config.api_base_url));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, api, &config).await;
    tui::restore()?;

    if let Err(e) = &result {
        tracing::error!(error = %e, "exited with error");
    }
    result
}

async fn run(terminal: &mut tui::Tui, api: Arc<dyn StudyApi>, config: &Config) -> Result<()> {
    let mut events = EventHandler::new();
    let mut app = App::new(api, events.sender(), config);
    app.start();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(&mut app, event),
            None => break,
        }
    }

    Ok(())
}
