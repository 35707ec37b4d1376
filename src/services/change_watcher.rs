//! Change watcher: observes document mutation records, throttles and
//! debounces them, and emits at most one "content changed" notification per
//! debounce window.
//!
//! Backpressure: batches are counted per one-second window; once the ceiling
//! is exceeded the remaining batches in that window are dropped outright,
//! with no queueing and no partial processing.

use std::sync::{Arc, Mutex};

use tokio::select;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};

use crate::dom::{Document, MutationRecord, NodeData, NodeId};
use crate::services::dom_painter::HIGHLIGHT_MARK_CLASS;

/// Watcher tuning knobs.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Quiet period after the last accepted batch before notifying.
    pub debounce: Duration,
    /// Accepted mutation batches per one-second window; the rest are dropped.
    pub max_batches_per_window: u32,
    /// Added text nodes with trimmed length at or below this are ignored.
    pub min_text_len: usize,
    /// Added elements with trimmed aggregate text at or below this are ignored.
    pub min_element_text_len: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            max_batches_per_window: 20,
            min_text_len: 2,
            min_element_text_len: 5,
        }
    }
}

const WINDOW: Duration = Duration::from_secs(1);

/// Subscribes to a document's mutation records and forwards a debounced
/// re-evaluate signal. `stop` cancels any pending debounce and detaches the
/// subscription; it is safe to call repeatedly.
pub struct ChangeWatcher {
    config: WatcherConfig,
    task: Option<JoinHandle<()>>,
}

impl ChangeWatcher {
    pub fn new() -> Self {
        Self::with_config(WatcherConfig::default())
    }

    pub fn with_config(config: WatcherConfig) -> Self {
        Self { config, task: None }
    }

    /// Starts watching. A previous watch, if any, is stopped first.
    pub fn start(
        &mut self,
        doc: Arc<Mutex<Document>>,
        mut records: mpsc::UnboundedReceiver<MutationRecord>,
        changed: mpsc::UnboundedSender<()>,
    ) {
        self.stop();
        let config = self.config.clone();
        self.task = Some(tokio::spawn(async move {
            let mut window_start = Instant::now();
            let mut batches_in_window: u32 = 0;
            let mut deadline: Option<Instant> = None;

            loop {
                select! {
                    record = records.recv() => {
                        let Some(record) = record else { break };
                        let now = Instant::now();
                        if now.duration_since(window_start) >= WINDOW {
                            window_start = now;
                            batches_in_window = 0;
                        }
                        batches_in_window += 1;
                        if batches_in_window > config.max_batches_per_window {
                            continue;
                        }
                        let significant = {
                            let doc = doc.lock().unwrap();
                            record
                                .added
                                .iter()
                                .any(|&id| is_significant(&doc, id, &config))
                        };
                        if significant {
                            deadline = Some(now + config.debounce);
                        }
                    }
                    _ = wait_until(deadline), if deadline.is_some() => {
                        deadline = None;
                        if changed.send(()).is_err() {
                            break;
                        }
                    }
                }
            }
        }));
    }

    /// Cancels the pending debounce and detaches from the document.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Default for ChangeWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn wait_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        sleep_until(deadline).await;
    }
}

/// An added node qualifies when it carries non-trivial text and is not one
/// of the painter's own wrappers (nor inside one).
fn is_significant(doc: &Document, id: NodeId, config: &WatcherConfig) -> bool {
    let mut current = Some(id);
    while let Some(node) = current {
        if doc.has_class(node, HIGHLIGHT_MARK_CLASS) {
            return false;
        }
        current = doc.parent(node);
    }

    match &doc.node(id).data {
        NodeData::Text(text) => text.trim().len() > config.min_text_len,
        NodeData::Element(_) => doc.text_content(id).trim().len() > config.min_element_text_len,
    }
}
