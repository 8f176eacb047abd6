use std::fs::File;
use std::time::Duration;

use anyhow::{anyhow, Result};

mod api;
mod app;
mod assistant;
mod autosave;
mod config;
mod documents;
mod editor;
mod handler;
mod preview;
mod tui;
mod ui;

use app::App;
use config::Config;

const TICK_INTERVAL: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::load().unwrap_or_else(|err| {
        log::warn!("could not read config, using defaults: {}", err);
        Config::new()
    });

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut app = App::new(&config);
    app.startup().await;

    let mut events = tui::EventHandler::new(TICK_INTERVAL);
    while !app.should_quit {
        terminal.draw(|frame| ui::draw(frame, &mut app))?;
        if let Some(event) = events.next().await {
            handler::handle_event(&mut app, event).await;
        } else {
            break;
        }
    }

    tui::restore()?;
    Ok(())
}

/// Log to a file; the terminal itself belongs to the UI.
fn init_logging() -> Result<()> {
    let log_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("markpad");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = File::create(log_dir.join("markpad.log"))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();
    Ok(())
}
