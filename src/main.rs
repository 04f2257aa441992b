//! txtop
//!
//! Live mempool dashboard for a Cardano node. Samples the node's mempool on a timer
//! in the background and draws the ranked, classified result in the terminal.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use txtop::app::App;
use txtop::cardano::{NodeDialer, PallasDecoder};
use txtop::refresh::forward_async_errors;
use txtop::{ui, Config, ConnectionManager, FlushOnExit, LogBuffer, RefreshState, Sampler, UiEvent};

/// Upper bound on how long a key poll blocks before pending frames are drawn
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let logs = LogBuffer::default();
    let _flush = FlushOnExit::new(logs.clone());

    let filter = EnvFilter::try_from_env("TXTOP_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(logs.clone())
        .with_ansi(false)
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load config: {}", e);
            logs.flush_to_stdout();
            std::process::exit(1);
        }
    };
    logs.set_capacity(config.app.log_lines);
    info!(
        "txtop {} starting on network magic {}",
        txtop::app::version_string(),
        config.node.network_magic
    );

    let state = Arc::new(RefreshState::new(config.app.sort));
    let (errors_tx, errors_rx) = unbounded_channel();
    let (events_tx, events_rx) = unbounded_channel::<UiEvent>();

    let manager = ConnectionManager::new(config.connection(), NodeDialer, errors_tx);
    let mut sampler = Sampler::new(
        manager,
        PallasDecoder,
        state.clone(),
        config.refresh_interval(),
        config.app.max_displayed,
    );

    // populate the dashboard before the first tick
    let initial = sampler.sample().await;
    state.should_render(&initial);
    let mut app = App::new(state.clone(), initial);

    let errors_task = tokio::spawn(forward_async_errors(errors_rx, events_tx.clone()));
    let sampler_task = tokio::spawn(sampler.run(events_tx));

    // terminal
    let mut terminal = match setup_terminal() {
        Ok(terminal) => terminal,
        Err(e) => {
            sampler_task.abort();
            errors_task.abort();
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen);
            error!("failed to set up terminal: {:#}", e);
            return Err(e);
        }
    };

    let result = run_loop(&mut app, &mut terminal, events_rx);

    // cleanup
    sampler_task.abort();
    errors_task.abort();
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(e) = &result {
        error!("display loop failed: {:#}", e);
    }
    info!("exiting");
    result
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout)).context("failed to create terminal")?;
    terminal.clear()?;
    Ok(terminal)
}

fn run_loop(
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut events: UnboundedReceiver<UiEvent>,
) -> Result<()> {
    terminal.draw(|f| ui::draw(f, app))?;
    loop {
        let mut dirty = false;

        if event::poll(POLL_INTERVAL)? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(&key);
                dirty = true;
            }
        }
        while let Ok(event) = events.try_recv() {
            app.on_event(event);
            dirty = true;
        }

        if app.should_quit() {
            return Ok(());
        }
        if dirty {
            terminal.draw(|f| ui::draw(f, app))?;
        }
    }
}
