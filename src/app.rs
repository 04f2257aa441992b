//! Dashboard model and key handling
//!
//! Holds everything the foreground loop draws and maps key presses onto the
//! shared refresh state.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use tracing::{debug, info};

use crate::classify::Category;
use crate::config::SortMode;
use crate::refresh::{RefreshState, UiEvent};

/// Number of legend entries per line
const LEGEND_PER_LINE: usize = 7;

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePause,
    ToggleSort,
    Quit,
    Ignore,
}

/// Map a key event to an action; releases and unbound keys are ignored
pub fn key_action(key: &KeyEvent) -> KeyAction {
    if key.kind == KeyEventKind::Release {
        return KeyAction::Ignore;
    }
    match key.code {
        KeyCode::Char('p') => KeyAction::TogglePause,
        KeyCode::Char('s') => KeyAction::ToggleSort,
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        _ => KeyAction::Ignore,
    }
}

/// `<version> (commit <hash>)`, or `devel (commit <hash>)` for untagged builds
pub fn version_string() -> String {
    format_version(option_env!("TXTOP_VERSION"), option_env!("TXTOP_COMMIT"))
}

fn format_version(version: Option<&str>, commit: Option<&str>) -> String {
    let commit = commit.unwrap_or_default();
    match version {
        Some(version) if !version.is_empty() => format!("{} (commit {})", version, commit),
        _ => format!("devel (commit {})", commit),
    }
}

pub fn header_text() -> String {
    format!(" > txtop - {}", version_string())
}

/// Status line listing the keys, the pause marker and the sort mode
pub fn footer_text(paused: bool, sort: SortMode) -> String {
    let marker = if paused { " [yellow](paused)" } else { "" };
    format!(
        " [yellow](esc/q)[white] Quit | [yellow](p)[white] Pause{} | [yellow](s)[white] Sort: {}",
        marker,
        sort.label()
    )
}

/// Two-line legend of every glyph
pub fn legend_text() -> String {
    let entries: Vec<String> = Category::ALL
        .iter()
        .map(|c| format!("{} {}", c.glyph(), c.name()))
        .collect();
    let (first, second) = entries.split_at(LEGEND_PER_LINE.min(entries.len()));
    format!(" Legend: [white]{}\n {}", first.join("  "), second.join("  "))
}

/// Foreground view model
pub struct App {
    state: Arc<RefreshState>,
    content: String,
    footer: String,
    quit: bool,
}

impl App {
    pub fn new(state: Arc<RefreshState>, content: String) -> Self {
        let footer = footer_text(state.is_paused(), state.sort_mode());
        Self {
            state,
            content,
            footer,
            quit: false,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn footer(&self) -> &str {
        &self.footer
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Apply a message from the sampler or the error forwarder
    pub fn on_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Frame(text) | UiEvent::AsyncError(text) => self.content = text,
        }
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> KeyAction {
        let action = key_action(key);
        match action {
            KeyAction::TogglePause => {
                let paused = self.state.toggle_paused();
                info!("refresh {}", if paused { "paused" } else { "resumed" });
            }
            KeyAction::ToggleSort => {
                let sort = self.state.toggle_sort_mode();
                info!("sorting by {}", sort);
            }
            KeyAction::Quit => {
                debug!("quit requested");
                self.quit = true;
            }
            KeyAction::Ignore => return action,
        }
        self.footer = footer_text(self.state.is_paused(), self.state.sort_mode());
        action
    }
}
