//! Highlight session: the one-per-page orchestrator tying the settings
//! store, site policy, painter, and change watcher together behind the
//! command/query surface the rest of the extension talks to.
//!
//! Lifecycle: `Uninitialized → Active → Destroyed`, with an orthogonal
//! context-invalid flag that can be raised from any state. Once the hosting
//! context is gone the session tears everything down and every public
//! operation becomes an inert default-returning no-op; nothing from here
//! ever propagates an error into the host page.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::{debug, warn};

use crate::dom::{Document, NodeId};
use crate::services::change_watcher::ChangeWatcher;
use crate::services::dom_painter::DomPainter;
use crate::services::match_engine::{build_pattern, MatchOptions};
use crate::services::settings_store::SettingsStoreTrait;
use crate::services::site_rules;
use crate::types::errors::{StoreError, TransportError};
use crate::types::settings::SettingsSnapshot;

/// How long a fetched settings snapshot may be reused.
pub const SETTINGS_CACHE_TTL: Duration = Duration::from_secs(1);

/// Bound on the word-count and page-word-count query round-trips.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(8);

/// How long the transient on-page notice stays visible.
pub const NOTICE_DURATION: Duration = Duration::from_secs(2);

/// Class carried by the transient notice element.
pub const NOTICE_CLASS: &str = "wordlight-notice";

const NOTICE_STYLE: &str = "position: fixed; top: 20px; right: 20px; \
    background: #4caf50; color: white; padding: 12px 20px; border-radius: 6px; \
    z-index: 10000; font-size: 14px; font-weight: 500; pointer-events: none;";

/// Probe into the hosting environment: context reachability and the page's
/// hostname.
pub trait HostContext: Send + Sync {
    fn is_valid(&self) -> bool;
    fn hostname(&self) -> Option<String>;
}

/// Host descriptor with a fixed hostname and a flippable validity flag.
/// Embedders flip it when the extension context dies under them.
pub struct PageHost {
    hostname: Option<String>,
    valid: AtomicBool,
}

impl PageHost {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: Some(hostname.into()),
            valid: AtomicBool::new(true),
        }
    }

    /// A host whose hostname cannot be determined.
    pub fn unknown() -> Self {
        Self {
            hostname: None,
            valid: AtomicBool::new(true),
        }
    }

    /// Marks the hosting extension context as gone.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl HostContext for PageHost {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn hostname(&self) -> Option<String> {
        self.hostname.clone()
    }
}

/// A keyboard event forwarded by the embedder.
#[derive(Debug, Clone)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    /// The event target, used to suppress shortcuts while typing.
    pub target: Option<NodeId>,
}

impl KeyEvent {
    pub fn ctrl_shift(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: true,
            shift: true,
            target: None,
        }
    }
}

/// Answer to the diagnostic `getSettings` query.
#[derive(Debug, Clone)]
pub struct SessionDiagnostics {
    pub settings: SettingsSnapshot,
    pub highlighted_elements: usize,
    pub context_invalid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Active,
    Destroyed,
}

/// The per-page highlighting session. Collaborators are injected; tests run
/// fresh sessions against an in-memory store and a constructed document.
pub struct HighlightSession {
    core: Arc<SessionCore>,
}

struct SessionCore {
    doc: Arc<Mutex<Document>>,
    store: Arc<dyn SettingsStoreTrait>,
    host: Arc<dyn HostContext>,
    lifecycle: Mutex<Lifecycle>,
    context_invalid: AtomicBool,
    painter: Mutex<DomPainter>,
    cached: Mutex<Option<(SettingsSnapshot, Instant)>>,
    watcher: Mutex<ChangeWatcher>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl HighlightSession {
    pub fn new(
        doc: Arc<Mutex<Document>>,
        store: Arc<dyn SettingsStoreTrait>,
        host: Arc<dyn HostContext>,
    ) -> Self {
        Self {
            core: Arc::new(SessionCore {
                doc,
                store,
                host,
                lifecycle: Mutex::new(Lifecycle::Uninitialized),
                context_invalid: AtomicBool::new(false),
                painter: Mutex::new(DomPainter::new()),
                cached: Mutex::new(None),
                watcher: Mutex::new(ChangeWatcher::new()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Validates the hosting context, runs the initial highlight pass, and
    /// wires the change watcher and store subscription. Never fails: an
    /// unreachable context flags the session invalid and returns.
    pub async fn init(&self) {
        {
            let mut lifecycle = self.core.lifecycle.lock().unwrap();
            if *lifecycle != Lifecycle::Uninitialized {
                return;
            }
            if !self.core.host.is_valid() {
                drop(lifecycle);
                self.core.context_invalid.store(true, Ordering::SeqCst);
                return;
            }
            *lifecycle = Lifecycle::Active;
        }

        self.core.load_and_highlight().await;
        if self.core.context_invalid.load(Ordering::SeqCst) {
            // The initial settings read already found the context gone;
            // leave nothing running.
            return;
        }

        // Watcher: document mutations -> debounced re-highlight.
        let records = self.core.doc.lock().unwrap().subscribe();
        let (changed_tx, mut changed_rx) = mpsc::unbounded_channel();
        self.core
            .watcher
            .lock()
            .unwrap()
            .start(Arc::clone(&self.core.doc), records, changed_tx);

        let core = Arc::clone(&self.core);
        let watch_task = tokio::spawn(async move {
            while changed_rx.recv().await.is_some() {
                core.load_and_highlight().await;
            }
        });

        // Store subscription: settings changes invalidate the cache at once
        // and repaint with the fresh snapshot.
        let mut store_rx = self.core.store.subscribe();
        let core = Arc::clone(&self.core);
        let store_task = tokio::spawn(async move {
            loop {
                match store_rx.recv().await {
                    Ok(()) => {
                        core.invalidate_cache();
                        core.clear_highlights();
                        core.load_and_highlight().await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut tasks = self.core.tasks.lock().unwrap();
        tasks.push(watch_task);
        tasks.push(store_task);
    }

    /// The `updateHighlighting` command: drop the cached snapshot, clear,
    /// and repaint, so callers never observe a mix of old and new word lists.
    pub async fn refresh(&self) {
        if self.core.inert() {
            return;
        }
        self.core.invalidate_cache();
        self.core.clear_highlights();
        self.core.load_and_highlight().await;
    }

    /// The `clearHighlights` command.
    pub fn clear(&self) {
        if self.core.inert() {
            return;
        }
        self.core.clear_highlights();
    }

    /// Occurrences of each requested word in the page's visible text, under
    /// the active matching rules. Absent or invalid entries resolve to 0;
    /// the query is bounded by [`QUERY_TIMEOUT`] and resolves to zeros
    /// rather than hanging.
    pub async fn word_counts(&self, words: &[String]) -> HashMap<String, usize> {
        let mut counts: HashMap<String, usize> =
            words.iter().map(|w| (w.clone(), 0)).collect();
        if self.core.inert() {
            return counts;
        }
        match timeout(QUERY_TIMEOUT, self.core.count_words(words)).await {
            Ok(computed) => {
                counts.extend(computed);
            }
            Err(_) => {
                let err = TransportError::Timeout(QUERY_TIMEOUT.as_millis() as u64);
                warn!(%err, "word count query resolved to zero counts");
            }
        }
        counts
    }

    /// Whitespace-tokenized count of the page's visible text.
    pub async fn page_word_count(&self) -> usize {
        if self.core.inert() {
            return 0;
        }
        let doc = self.core.doc.lock().unwrap();
        doc.visible_text(doc.root())
            .split_whitespace()
            .count()
    }

    /// Flips the persisted enable flag, repaints or clears to match, and
    /// surfaces a transient on-page notice. Returns the new state, or `None`
    /// when the session is inert or the write failed.
    pub async fn toggle_highlighting(&self) -> Option<bool> {
        if self.core.inert() {
            return None;
        }
        let settings = self.core.settings(true).await;
        let new_state = !settings.enable_highlighting;

        match self.core.store.write_enable_highlighting(new_state).await {
            Ok(()) => {}
            Err(StoreError::ContextInvalidated) => {
                self.core.mark_context_invalid();
                return None;
            }
            Err(err) => {
                warn!(%err, "failed to persist highlighting toggle");
                return None;
            }
        }

        self.core.invalidate_cache();
        if new_state {
            self.core.load_and_highlight().await;
            self.core.show_notice("Highlighting enabled");
        } else {
            self.core.clear_highlights();
            self.core.show_notice("Highlighting disabled");
        }
        Some(new_state)
    }

    /// Keyboard shortcut entry point: `Ctrl+Shift+H` toggles highlighting.
    /// Suppressed while the event target sits in an editable context, and
    /// when shortcuts are disabled in settings. Returns whether the event
    /// was consumed.
    pub async fn handle_key_event(&self, event: &KeyEvent) -> bool {
        if self.core.inert() {
            return false;
        }
        if !(event.ctrl && event.shift && event.key.eq_ignore_ascii_case("h")) {
            return false;
        }
        if let Some(target) = event.target {
            if self.core.doc.lock().unwrap().is_editable_context(target) {
                return false;
            }
        }
        let settings = self.core.settings(true).await;
        if !settings.enable_keyboard_shortcuts {
            return false;
        }
        self.toggle_highlighting().await.is_some()
    }

    /// Answer to the diagnostic `getSettings` query.
    pub async fn diagnostics(&self) -> SessionDiagnostics {
        SessionDiagnostics {
            settings: self.core.settings(true).await,
            highlighted_elements: self.core.painter.lock().unwrap().highlighted_count(),
            context_invalid: self.context_invalid(),
        }
    }

    /// Stops the watcher, cancels every pending task, and reverses any
    /// outstanding highlights. Safe to call more than once.
    pub async fn destroy(&self) {
        {
            let mut lifecycle = self.core.lifecycle.lock().unwrap();
            if *lifecycle == Lifecycle::Destroyed {
                return;
            }
            *lifecycle = Lifecycle::Destroyed;
        }
        self.core.teardown();
    }

    pub fn context_invalid(&self) -> bool {
        self.core.context_invalid.load(Ordering::SeqCst)
    }

    /// Number of wrapper elements currently tracked by the painter.
    pub fn highlighted_count(&self) -> usize {
        self.core.painter.lock().unwrap().highlighted_count()
    }
}

impl SessionCore {
    fn inert(&self) -> bool {
        if self.context_invalid.load(Ordering::SeqCst) {
            return true;
        }
        if !self.host.is_valid() {
            self.mark_context_invalid();
            return true;
        }
        *self.lifecycle.lock().unwrap() == Lifecycle::Destroyed
    }

    /// Raised when any operation discovers the hosting context is gone:
    /// stop timers and observers, reverse highlights, go inert.
    fn mark_context_invalid(&self) {
        if self.context_invalid.swap(true, Ordering::SeqCst) {
            return;
        }
        self.teardown();
    }

    fn teardown(&self) {
        self.watcher.lock().unwrap().stop();
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        let mut painter = self.painter.lock().unwrap();
        let mut doc = self.doc.lock().unwrap();
        painter.clear(&mut doc);
    }

    fn invalidate_cache(&self) {
        *self.cached.lock().unwrap() = None;
    }

    /// Fetches a snapshot, reusing one read within the last second when
    /// `use_cache` holds. Store failures degrade to the safe defaults; a
    /// context invalidation flips the session inert.
    async fn settings(&self, use_cache: bool) -> SettingsSnapshot {
        if self.context_invalid.load(Ordering::SeqCst) {
            return SettingsSnapshot::default();
        }
        if use_cache {
            let cached = self.cached.lock().unwrap();
            if let Some((snapshot, fetched_at)) = cached.as_ref() {
                if fetched_at.elapsed() < SETTINGS_CACHE_TTL {
                    return snapshot.clone();
                }
            }
        }

        match self.store.read().await {
            Ok(snapshot) => {
                *self.cached.lock().unwrap() = Some((snapshot.clone(), Instant::now()));
                snapshot
            }
            Err(StoreError::ContextInvalidated) => {
                self.mark_context_invalid();
                SettingsSnapshot::default()
            }
            Err(err) => {
                warn!(%err, "settings read failed, using safe defaults");
                SettingsSnapshot::default()
            }
        }
    }

    async fn load_and_highlight(&self) {
        if self.inert() {
            return;
        }
        let settings = self.settings(true).await;
        if !settings.enable_highlighting {
            return;
        }
        if !site_rules::should_highlight_on(&settings, self.host.hostname().as_deref()) {
            debug!("site not eligible for highlighting");
            return;
        }
        let words = settings.highlight_words();
        if words.is_empty() {
            return;
        }
        let options = MatchOptions {
            case_sensitive: settings.case_sensitive,
            whole_words_only: settings.whole_words_only,
        };
        let mut painter = self.painter.lock().unwrap();
        let mut doc = self.doc.lock().unwrap();
        painter.highlight(&mut doc, &words, &options);
    }

    fn clear_highlights(&self) {
        let mut painter = self.painter.lock().unwrap();
        let mut doc = self.doc.lock().unwrap();
        painter.clear(&mut doc);
    }

    async fn count_words(&self, words: &[String]) -> HashMap<String, usize> {
        let settings = self.settings(true).await;
        let options = MatchOptions {
            case_sensitive: settings.case_sensitive,
            whole_words_only: settings.whole_words_only,
        };
        let text = {
            let doc = self.doc.lock().unwrap();
            doc.visible_text(doc.root())
        };

        let mut counts = HashMap::new();
        for word in words {
            let trimmed = word.trim();
            if trimmed.is_empty() {
                counts.insert(word.clone(), 0);
                continue;
            }
            let count = match build_pattern(trimmed, &options) {
                Ok(pattern) => pattern.find_iter(&text).count(),
                Err(_) => 0,
            };
            counts.insert(word.clone(), count);
        }
        counts
    }

    /// Inserts the transient shortcut-feedback notice and schedules its
    /// removal. The insertion is muted: it must not wake the watcher.
    fn show_notice(&self, message: &str) {
        let notice = {
            let mut doc = self.doc.lock().unwrap();
            doc.muted(|doc| {
                let notice = doc.create_element("div");
                doc.set_attr(notice, "class", NOTICE_CLASS);
                doc.set_attr(notice, "style", NOTICE_STYLE);
                let text = doc.create_text(message);
                let root = doc.root();
                doc.append_child(notice, text).ok()?;
                doc.append_child(root, notice).ok()?;
                Some(notice)
            })
        };
        let Some(notice) = notice else {
            return;
        };

        let doc = Arc::clone(&self.doc);
        let removal = tokio::spawn(async move {
            sleep(NOTICE_DURATION).await;
            let mut doc = doc.lock().unwrap();
            if let Some(parent) = doc.parent(notice) {
                doc.muted(|doc| {
                    let _ = doc.remove_child(parent, notice);
                });
            }
        });
        self.tasks.lock().unwrap().push(removal);
    }
}
