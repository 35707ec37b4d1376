//! Unit tests for the ChangeWatcher throttle/debounce behavior.
//!
//! All tests run on a paused tokio clock, so debounce windows and the
//! per-second batch ceiling are exercised deterministically.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{advance, Duration};

use wordlight::dom::{Document, NodeId};
use wordlight::services::change_watcher::ChangeWatcher;
use wordlight::services::dom_painter::HIGHLIGHT_MARK_CLASS;

fn setup() -> (
    Arc<Mutex<Document>>,
    ChangeWatcher,
    mpsc::UnboundedReceiver<()>,
) {
    let doc = Arc::new(Mutex::new(Document::new()));
    let records = doc.lock().unwrap().subscribe();
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = ChangeWatcher::new();
    watcher.start(Arc::clone(&doc), records, tx);
    (doc, watcher, rx)
}

fn add_text(doc: &Arc<Mutex<Document>>, content: &str) -> NodeId {
    let mut doc = doc.lock().unwrap();
    let root = doc.root();
    let node = doc.create_text(content);
    doc.append_child(root, node).unwrap();
    node
}

/// Let the watcher task drain whatever is queued for it.
async fn drain() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_callback_fires_once_after_debounce() {
    let (doc, _watcher, mut rx) = setup();

    add_text(&doc, "hello world");
    drain().await;

    advance(Duration::from_millis(499)).await;
    drain().await;
    assert!(rx.try_recv().is_err(), "must not fire before the debounce elapses");

    advance(Duration::from_millis(2)).await;
    drain().await;
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err(), "exactly one callback per quiet period");
}

#[tokio::test(start_paused = true)]
async fn test_trivial_insertions_are_ignored() {
    let (doc, _watcher, mut rx) = setup();

    add_text(&doc, "ab");
    add_text(&doc, "   ");
    drain().await;

    advance(Duration::from_secs(2)).await;
    drain().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_element_text_threshold() {
    let (doc, _watcher, mut rx) = setup();

    // Short subtree: below the element threshold.
    {
        let mut doc = doc.lock().unwrap();
        let div = doc.create_element("div");
        let text = doc.create_text("abcde");
        doc.append_child(div, text).unwrap();
        let root = doc.root();
        doc.append_child(root, div).unwrap();
    }
    drain().await;
    advance(Duration::from_secs(2)).await;
    drain().await;
    assert!(rx.try_recv().is_err());

    // Longer subtree qualifies.
    {
        let mut doc = doc.lock().unwrap();
        let div = doc.create_element("div");
        let text = doc.create_text("abcdef");
        doc.append_child(div, text).unwrap();
        let root = doc.root();
        doc.append_child(root, div).unwrap();
    }
    drain().await;
    advance(Duration::from_millis(600)).await;
    drain().await;
    assert!(rx.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_insertions_inside_wrappers_are_ignored() {
    let (doc, _watcher, mut rx) = setup();

    let wrapper = {
        let mut doc = doc.lock().unwrap();
        let span = doc.create_element("span");
        doc.set_attr(span, "class", HIGHLIGHT_MARK_CLASS);
        let root = doc.root();
        doc.append_child(root, span).unwrap();
        span
    };
    drain().await;

    {
        let mut doc = doc.lock().unwrap();
        let text = doc.create_text("hello world inside a wrapper");
        doc.append_child(wrapper, text).unwrap();
    }
    drain().await;

    advance(Duration::from_secs(2)).await;
    drain().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_debounce_rearms_on_new_batches() {
    let (doc, _watcher, mut rx) = setup();

    add_text(&doc, "first insertion");
    drain().await;
    advance(Duration::from_millis(300)).await;
    add_text(&doc, "second insertion");
    drain().await;

    // 450ms after the second batch the original 500ms deadline has passed,
    // but the re-armed one has not.
    advance(Duration::from_millis(450)).await;
    drain().await;
    assert!(rx.try_recv().is_err());

    advance(Duration::from_millis(100)).await;
    drain().await;
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_burst_beyond_ceiling_fires_at_most_once() {
    let (doc, _watcher, mut rx) = setup();

    // Fill the one-second window to its ceiling in a single instant.
    for _ in 0..20 {
        add_text(&doc, "ticker ticker ticker");
    }
    drain().await;

    // A 21st batch in the same window is dropped wholesale: if it were
    // accepted it would push the deadline out past the assertion below.
    advance(Duration::from_millis(400)).await;
    add_text(&doc, "dropped batch");
    drain().await;

    advance(Duration::from_millis(150)).await;
    drain().await;
    assert!(
        rx.try_recv().is_ok(),
        "debounce from the accepted batches must fire on schedule"
    );
    assert!(rx.try_recv().is_err(), "the burst collapses to one callback");
}

#[tokio::test(start_paused = true)]
async fn test_window_counter_resets_each_second() {
    let (doc, _watcher, mut rx) = setup();

    for _ in 0..25 {
        add_text(&doc, "ticker ticker ticker");
    }
    drain().await;
    advance(Duration::from_millis(600)).await;
    drain().await;
    assert!(rx.try_recv().is_ok());

    // A fresh window accepts batches again.
    advance(Duration::from_millis(600)).await;
    add_text(&doc, "new window content");
    drain().await;
    advance(Duration::from_millis(600)).await;
    drain().await;
    assert!(rx.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_debounce() {
    let (doc, mut watcher, mut rx) = setup();

    add_text(&doc, "about to be cancelled");
    drain().await;

    watcher.stop();
    watcher.stop();

    advance(Duration::from_secs(2)).await;
    drain().await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_removals_alone_do_not_fire() {
    let (doc, _watcher, mut rx) = setup();

    let node = add_text(&doc, "soon to be removed");
    drain().await;
    advance(Duration::from_millis(600)).await;
    drain().await;
    assert!(rx.try_recv().is_ok());

    {
        let mut doc = doc.lock().unwrap();
        let root = doc.root();
        doc.remove_child(root, node).unwrap();
    }
    drain().await;
    advance(Duration::from_secs(2)).await;
    drain().await;
    assert!(rx.try_recv().is_err());
}
