//! Snapshot Assembler
//!
//! Drains one full mempool snapshot from a node session, classifies every entry,
//! orders and truncates the result, and renders it as color-tagged text.

use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{classify, Category};
use crate::config::SortMode;
use crate::source::{DecodeError, MempoolClient, MempoolSizes, SourceError, TxDecoder};

/// Errors that end a cycle's assembly early
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("GetSizes: {0}")]
    Sizes(#[source] SourceError),

    #[error("NextTx: {0}")]
    NextTx(#[source] SourceError),

    #[error("TxType: {0}")]
    TxType(#[source] DecodeError),

    #[error("Tx: {0}")]
    Decode(#[source] DecodeError),
}

/// One classified mempool transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEntry {
    pub size_bytes: u64,
    pub category: Option<Category>,
    pub hash: String,
}

/// One drained mempool snapshot, ordered and truncated for display
#[derive(Debug)]
pub struct MempoolSnapshot {
    pub capacity_bytes: u64,
    pub size_bytes: u64,
    pub tx_count: u64,
    pub entries: Vec<TxEntry>,
    /// Set when the drain stopped early; `entries` then holds what was decoded before it
    pub error: Option<FetchError>,
}

/// Order entries for display; size order is descending and stable
pub fn order_entries(entries: &mut [TxEntry], sort: SortMode) {
    if sort == SortMode::BySize {
        entries.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    }
}

/// Order `entries` and keep the first `max_displayed`
pub fn select_entries(mut entries: Vec<TxEntry>, sort: SortMode, max_displayed: usize) -> Vec<TxEntry> {
    order_entries(&mut entries, sort);
    entries.truncate(max_displayed);
    entries
}

/// Drain every transaction of the current snapshot.
///
/// Stops at the first transport or decode failure and returns what was decoded so far.
async fn drain<C, D>(client: &mut C, decoder: &D) -> (Vec<TxEntry>, Option<FetchError>)
where
    C: MempoolClient + ?Sized,
    D: TxDecoder + ?Sized,
{
    let mut entries = Vec::new();
    loop {
        let raw = match client.next_tx().await {
            Ok(Some(raw)) => raw,
            Ok(None) => return (entries, None),
            Err(e) => return (entries, Some(FetchError::NextTx(e))),
        };

        let tx_type = match decoder.detect_type(&raw) {
            Ok(tx_type) => tx_type,
            Err(e) => return (entries, Some(FetchError::TxType(e))),
        };
        let tx = match decoder.decode(tx_type, &raw) {
            Ok(tx) => tx,
            Err(e) => return (entries, Some(FetchError::Decode(e))),
        };

        entries.push(TxEntry {
            size_bytes: raw.len() as u64,
            category: classify(&tx),
            hash: tx.hash,
        });
    }
}

/// Assemble one snapshot from a live session
///
/// # Arguments
/// * `client` - Session to drain
/// * `decoder` - Decoder for raw transactions
/// * `sort` - Active sort mode
/// * `max_displayed` - Maximum number of entries kept
///
/// # Returns
/// The snapshot, or an error if the aggregate sizes could not be read
pub async fn assemble<C, D>(
    client: &mut C,
    decoder: &D,
    sort: SortMode,
    max_displayed: usize,
) -> Result<MempoolSnapshot, FetchError>
where
    C: MempoolClient + ?Sized,
    D: TxDecoder + ?Sized,
{
    let MempoolSizes {
        capacity_bytes,
        size_bytes,
        tx_count,
    } = client.get_sizes().await.map_err(FetchError::Sizes)?;

    let (entries, error) = drain(client, decoder).await;
    if let Some(e) = &error {
        warn!("mempool drain stopped after {} transactions: {}", entries.len(), e);
    }
    debug!("drained {} transactions (node reports {})", entries.len(), tx_count);

    Ok(MempoolSnapshot {
        capacity_bytes,
        size_bytes,
        tx_count,
        entries: select_entries(entries, sort, max_displayed),
        error,
    })
}

/// Error line in the data area
pub fn error_line(message: impl std::fmt::Display) -> String {
    format!(" [red]ERROR: {}\n", message)
}

/// Line shown when no session could be acquired
pub fn connect_failure_line(err: impl std::fmt::Display) -> String {
    format!(" [red]failed to connect to node: {}", err)
}

/// Format the aggregate mempool figures
pub fn format_sizes(capacity_bytes: u64, size_bytes: u64, tx_count: u64) -> String {
    format!(
        " [white]Mempool size (bytes): [blue]{:<10}[white] Mempool capacity (bytes): [blue]{:<10}[white] Transactions: [blue]{:<10}[white]\n",
        size_bytes, capacity_bytes, tx_count
    )
}

/// Format the table header
pub fn format_header() -> String {
    format!(" [white]{:<10} {:<10} {}\n", "Size:", "Icon:", "TxHash:")
}

/// Format one table row; glyphs are two columns wide, so their column is one narrower
pub fn format_entry(entry: &TxEntry) -> String {
    match entry.category {
        Some(category) => format!(
            " [white]{:<10} {:<9} [blue]{}[white]\n",
            entry.size_bytes,
            category.glyph(),
            entry.hash
        ),
        None => format!(" [white]{:<10} {:<10} [blue]{}[white]\n", entry.size_bytes, "", entry.hash),
    }
}

impl MempoolSnapshot {
    /// Render the snapshot as color-tagged text
    pub fn render(&self) -> String {
        let mut out = format_sizes(self.capacity_bytes, self.size_bytes, self.tx_count);
        out.push('\n');
        out.push_str(&format_header());
        for entry in &self.entries {
            out.push_str(&format_entry(entry));
        }
        if let Some(e) = &self.error {
            out.push_str(&error_line(e));
        }
        out
    }
}

/// Render the outcome of an assembly, successful or not
pub fn render_result(result: &Result<MempoolSnapshot, FetchError>) -> String {
    match result {
        Ok(snapshot) => snapshot.render(),
        Err(e) => error_line(e),
    }
}
