//! donutlog - a donut tasting journal for the terminal
//!
//! Built with Ratatui and crossterm.

mod app;
mod config;
mod form;
mod handlers;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use donutlog_core::{MemoryBackend, Services, SessionStore, SupabaseClient};
use ratatui::prelude::*;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use app::{App, Screen};
use config::Config;

/// donutlog - rate donut tastings and share them with your family
#[derive(Parser, Debug)]
#[command(name = "donutlog")]
#[command(about = "A donut tasting journal shared with family groups")]
struct Args {
    /// Path to a config file (defaults to ~/.config/donutlog/donutlog.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run against an in-memory demo backend instead of Supabase
    #[arg(long)]
    demo: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_logging()?;

    let args = Args::parse();
    let config = Config::load(args.config)?;
    let services = build_services(&config, args.demo)?;
    tracing::info!("Starting donutlog (demo: {})", args.demo);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app
    let mut app = App::new(services, config);
    app.start();

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {e}");
    }

    Ok(())
}

/// Logs go to a file so they don't draw over the TUI; stderr if the file can't be opened.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("donutlog=info".parse()?)
        .add_directive("donutlog_core=info".parse()?);

    match open_log_file() {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}

fn open_log_file() -> Option<File> {
    let dir = dirs::data_dir()?.join("donutlog");
    std::fs::create_dir_all(&dir).ok()?;
    File::options()
        .create(true)
        .append(true)
        .open(dir.join("donutlog.log"))
        .ok()
}

fn build_services(config: &Config, demo: bool) -> Result<Services> {
    if demo {
        return Ok(Services::new(Arc::new(MemoryBackend::with_demo_data()), None));
    }

    let hint = "set SUPABASE_URL and SUPABASE_ANON_KEY (or add them to the config file), or run with --demo";
    let url = config
        .supabase_url()
        .with_context(|| format!("Supabase URL is missing: {hint}"))?;
    let key = config
        .supabase_anon_key()
        .with_context(|| format!("Supabase anon key is missing: {hint}"))?;

    let client = SupabaseClient::new(&url, &key, Duration::from_secs(config.request_timeout_secs))?;
    let store = match SessionStore::default_location() {
        Ok(store) => Some(store),
        Err(e) => {
            tracing::warn!("Sessions will not be remembered: {e}");
            None
        }
    };

    Ok(Services::new(Arc::new(client), store))
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        // Requests run after a frame so the busy state is visible
        if let Some(action) = app.take_pending() {
            app.perform(action);
            continue;
        }

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handlers::handle_key(app, key) {
                    break;
                }
            }
        }

        if app.screen == Screen::Quit {
            break;
        }
    }

    Ok(())
}
