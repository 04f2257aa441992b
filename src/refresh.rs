//! Refresh Loop
//!
//! Owns the shared pause/sort/last-rendered state and the background sampler that
//! turns one connection plus one mempool drain into one rendered frame per tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::config::SortMode;
use crate::connection::ConnectionManager;
use crate::snapshot::{assemble, connect_failure_line, error_line, render_result};
use crate::source::{Dialer, SourceError, TxDecoder};

/// Process-wide refresh state shared by the sampler and the input handler
#[derive(Debug, Default)]
pub struct RefreshState {
    paused: AtomicBool,
    sort_mode: RwLock<SortMode>,
    last_rendered: RwLock<String>,
}

impl RefreshState {
    pub fn new(sort_mode: SortMode) -> Self {
        Self {
            sort_mode: RwLock::new(sort_mode),
            ..Default::default()
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Flip the pause flag, returning the new value
    pub fn toggle_paused(&self) -> bool {
        !self.paused.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn sort_mode(&self) -> SortMode {
        *self.sort_mode.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch between size and arrival order, returning the new mode
    pub fn toggle_sort_mode(&self) -> SortMode {
        let mut mode = self.sort_mode.write().unwrap_or_else(PoisonError::into_inner);
        *mode = mode.toggled();
        *mode
    }

    /// Render Diff Gate.
    ///
    /// Returns true iff `text` is non-empty and differs from the last accepted text,
    /// in which case it becomes the last accepted text.
    pub fn should_render(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let mut last = self.last_rendered.write().unwrap_or_else(PoisonError::into_inner);
        if *last == text {
            return false;
        }
        *last = text.to_string();
        true
    }
}

/// Messages from the background tasks to the foreground loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A new frame for the data area
    Frame(String),
    /// An error reported outside the refresh cycle; replaces the data area
    AsyncError(String),
}

/// Background sampler: connects, drains and renders once per tick
pub struct Sampler<D: Dialer, X: TxDecoder> {
    manager: ConnectionManager<D>,
    decoder: X,
    state: Arc<RefreshState>,
    interval: Duration,
    max_displayed: usize,
}

impl<D: Dialer, X: TxDecoder> Sampler<D, X> {
    pub fn new(
        manager: ConnectionManager<D>,
        decoder: X,
        state: Arc<RefreshState>,
        interval: Duration,
        max_displayed: usize,
    ) -> Self {
        Self {
            manager,
            decoder,
            state,
            interval,
            max_displayed,
        }
    }

    pub fn state(&self) -> &Arc<RefreshState> {
        &self.state
    }

    /// Run one full cycle and return its rendered text.
    ///
    /// Every cycle acquires a fresh session; it is dropped before returning.
    pub async fn sample(&mut self) -> String {
        let sort = self.state.sort_mode();
        let mut client = match self.manager.acquire().await {
            Ok(client) => client,
            Err(e) => {
                error!("failed to connect to node: {}", e);
                return connect_failure_line(e);
            }
        };

        let result = assemble(&mut client, &self.decoder, sort, self.max_displayed).await;
        match &result {
            Ok(snapshot) => debug!(
                "snapshot: {} of {} transactions shown, sorted by {}",
                snapshot.entries.len(),
                snapshot.tx_count,
                sort
            ),
            Err(e) => error!("failed to assemble snapshot: {}", e),
        }
        render_result(&result)
    }

    /// Sample once and pass the text through the diff gate
    pub async fn cycle(&mut self) -> Option<String> {
        let text = self.sample().await;
        if self.state.should_render(&text) {
            Some(text)
        } else {
            debug!("snapshot unchanged, skipping redraw");
            None
        }
    }

    /// Timer-driven loop; returns once the receiving side is gone
    pub async fn run(mut self, events: UnboundedSender<UiEvent>) {
        info!("refreshing every {:?}", self.interval);
        loop {
            sleep(self.interval).await;
            if self.state.is_paused() {
                continue;
            }
            if let Some(text) = self.cycle().await {
                if events.send(UiEvent::Frame(text)).is_err() {
                    debug!("display closed, stopping sampler");
                    return;
                }
            }
        }
    }
}

/// Forward session errors reported in the background to the display.
///
/// Each error replaces the data area. The diff gate is left alone, so the error
/// stays on screen until a frame that actually differs arrives.
pub async fn forward_async_errors(
    mut errors: UnboundedReceiver<SourceError>,
    events: UnboundedSender<UiEvent>,
) {
    while let Some(e) = errors.recv().await {
        error!("async: {}", e);
        if events.send(UiEvent::AsyncError(error_line(format_args!("async: {}", e)))).is_err() {
            return;
        }
    }
}
