//! Search controller: turns a burst of raw keystroke values into at most one committed query
//! per quiet period.
//!
//! Every raw value is queued in arrival order to a background task that keeps a single pending
//! value and one deadline. A new value replaces the pending one and pushes the deadline out by
//! the debounce window; when the deadline passes the pending value is handed to the
//! [`CommitSink`] exactly once. Tearing the controller down aborts the task, so nothing pending
//! is ever committed afterwards.

use std::{
    pin::pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use catalogue::CatalogueStore;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Deserializer};
use shared::protocol::{ItemFilter, SearchResults};
use tokio::{
    sync::{broadcast, mpsc},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::debug;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

const RESULTS_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    #[serde(
        rename = "debounce_ms",
        alias = "debounceMs",
        deserialize_with = "duration_from_millis"
    )]
    pub debounce: Duration,
}

impl SearchConfig {
    pub fn from_millis(debounce_ms: u64) -> Self {
        Self {
            debounce: Duration::from_millis(debounce_ms),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}

/// Receives committed queries. Failures are the sink's own business: the controller never
/// reports them back to the input side.
#[async_trait]
pub trait CommitSink: Send + Sync + 'static {
    async fn commit(&self, query: String);
}

#[async_trait]
impl<F> CommitSink for F
where
    F: Fn(String) + Send + Sync + 'static,
{
    async fn commit(&self, query: String) {
        (self)(query)
    }
}

enum Command {
    Input(String),
    Flush,
    Finish,
}

pub struct SearchController {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for SearchController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchController")
            .field("running", &!self.task.is_finished())
            .finish()
    }
}

impl SearchController {
    /// Starts the debounce task on the current tokio runtime.
    pub fn spawn<S: CommitSink>(config: SearchConfig, sink: S) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(debounce_loop(config.debounce, rx, sink));
        Self { commands, task }
    }

    /// Records one raw input value.
    pub fn submit(&self, raw: impl Into<String>) {
        let _ = self.commands.send(Command::Input(raw.into()));
    }

    /// Commits the pending value now instead of waiting out the window. No-op when nothing is
    /// pending.
    pub fn flush(&self) {
        let _ = self.commands.send(Command::Flush);
    }

    /// Forwards every value of `input` to [`submit`](Self::submit) until the stream ends.
    pub async fn run_stream<St>(&self, input: St)
    where
        St: Stream<Item = String>,
    {
        let mut input = pin!(input);
        while let Some(raw) = input.next().await {
            self.submit(raw);
        }
    }

    /// Commits whatever is still pending, then waits for the task to stop. Used when the input
    /// side ends normally, as opposed to [`shutdown`](Self::shutdown).
    pub async fn finish(mut self) {
        let _ = self.commands.send(Command::Finish);
        let _ = (&mut self.task).await;
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Tears the controller down. A pending value is dropped without being committed.
    pub fn shutdown(self) {
        self.task.abort();
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn debounce_loop<S: CommitSink>(
    window: Duration,
    mut commands: mpsc::UnboundedReceiver<Command>,
    sink: S,
) {
    let mut pending: Option<String> = None;
    let mut deadline = Instant::now();

    loop {
        let command = if pending.is_some() {
            tokio::select! {
                biased;
                command = commands.recv() => command,
                () = sleep_until(deadline) => {
                    if let Some(query) = pending.take() {
                        debug!(%query, "search window elapsed");
                        sink.commit(query).await;
                    }
                    continue;
                }
            }
        } else {
            commands.recv().await
        };

        match command {
            Some(Command::Input(raw)) => {
                debug!(query = %raw, coalesced = pending.is_some(), "search input");
                pending = Some(raw);
                deadline = Instant::now() + window;
            }
            Some(Command::Flush) => {
                if let Some(query) = pending.take() {
                    debug!(%query, "search flushed");
                    sink.commit(query).await;
                }
            }
            Some(Command::Finish) => {
                if let Some(query) = pending.take() {
                    sink.commit(query).await;
                }
                break;
            }
            None => break,
        }
    }
}

/// Commit sink that runs each committed query against a [`CatalogueStore`] and broadcasts the
/// hits to whoever renders them.
pub struct StoreQuerySink {
    store: Arc<CatalogueStore>,
    base: ItemFilter,
    results: broadcast::Sender<SearchResults>,
    seq: AtomicU64,
}

impl StoreQuerySink {
    pub fn new(store: Arc<CatalogueStore>) -> Self {
        Self::with_filter(store, ItemFilter::default())
    }

    /// `base` supplies the status/category/branch predicates; its text is replaced by each
    /// committed query.
    pub fn with_filter(store: Arc<CatalogueStore>, base: ItemFilter) -> Self {
        let (results, _) = broadcast::channel(RESULTS_CHANNEL_CAPACITY);
        Self {
            store,
            base,
            results,
            seq: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SearchResults> {
        self.results.subscribe()
    }
}

#[async_trait]
impl CommitSink for StoreQuerySink {
    async fn commit(&self, query: String) {
        let filter = ItemFilter {
            text: Some(query.clone()),
            ..self.base.clone()
        };
        let items = self.store.query(&filter);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(seq, %query, hits = items.len(), "search committed");
        let _ = self.results.send(SearchResults { seq, query, items });
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
