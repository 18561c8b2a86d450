//! Integration tests for notification dedup

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use common::RecordingSender;
use flow_engine::memory::InMemoryDedupStore;
use flow_engine::prelude::*;

fn alert(text: &str) -> OutboundMessage {
    OutboundMessage {
        chat_id: "-100200".to_string(),
        text: text.to_string(),
        parse_mode: ParseMode::Html,
        buttons: vec![MessageButton {
            text: "Open".to_string(),
            url: "https://example.com".to_string(),
        }],
        formatted: true,
        reply_to: None,
    }
}

fn dispatcher(window: DedupWindow) -> (Arc<NotificationDispatcher>, Arc<InMemoryDedupStore>, Arc<RecordingSender>) {
    let store = Arc::new(InMemoryDedupStore::new());
    let sender = Arc::new(RecordingSender::default());
    let dispatcher = Arc::new(NotificationDispatcher::new(
        store.clone(),
        sender.clone(),
        window,
        Duration::from_secs(5),
    ));
    (dispatcher, store, sender)
}

#[tokio::test]
async fn test_same_alert_twice_sends_one_full_and_one_reminder() {
    let (dispatcher, store, sender) = dispatcher(DedupWindow::Ttl(Duration::from_secs(3600)));

    let first = dispatcher.dispatch(alert("BUY BTC")).await.unwrap();
    let second = dispatcher.dispatch(alert("BUY BTC")).await.unwrap();

    assert_eq!(first.delivery, Delivery::Full);
    assert_eq!(second.delivery, Delivery::Reminder);
    assert_eq!(second.send_count, 2);
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(store.len().await, 1);

    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].buttons.len(), 1);
    assert!(sent[1].buttons.is_empty());
    assert!(!sent[1].formatted);
    assert_eq!(sent[1].reply_to, Some(first.message_id));
    assert_eq!(sent[1].text, "BUY BTC");

    let record = store.get(&first.fingerprint).await.unwrap().unwrap();
    assert_eq!(record.message_id, second.message_id);
    assert_eq!(record.send_count, 2);
}

#[tokio::test]
async fn test_different_alerts_are_not_deduplicated() {
    let (dispatcher, store, _sender) = dispatcher(DedupWindow::default());

    let buy = dispatcher.dispatch(alert("BUY BTC")).await.unwrap();
    let sell = dispatcher.dispatch(alert("SELL BTC")).await.unwrap();

    assert_eq!(buy.delivery, Delivery::Full);
    assert_eq!(sell.delivery, Delivery::Full);
    assert_eq!(store.len().await, 2);
}

#[tokio::test]
async fn test_expired_window_sends_full_alert_again() {
    let (dispatcher, store, sender) = dispatcher(DedupWindow::Ttl(Duration::from_secs(3600)));

    let first = dispatcher.dispatch(alert("BUY BTC")).await.unwrap();
    let mut record = store.get(&first.fingerprint).await.unwrap().unwrap();
    record.first_sent_at = Utc::now() - chrono::Duration::hours(2);
    store.insert(record).await;

    let again = dispatcher.dispatch(alert("BUY BTC")).await.unwrap();

    assert_eq!(again.delivery, Delivery::Full);
    assert_eq!(again.send_count, 1);
    assert!(sender.sent()[1].formatted);
    assert_eq!(sender.sent()[1].reply_to, None);
}

#[tokio::test]
async fn test_concurrent_dispatches_send_a_single_full_alert() {
    let (dispatcher, store, sender) = dispatcher(DedupWindow::Ttl(Duration::from_secs(3600)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let dispatcher = dispatcher.clone();
        handles.push(tokio::spawn(async move {
            dispatcher.dispatch(alert("BUY BTC")).await.unwrap()
        }));
    }
    let mut full = 0;
    for handle in handles {
        if handle.await.unwrap().delivery == Delivery::Full {
            full += 1;
        }
    }

    assert_eq!(full, 1);
    assert_eq!(sender.sent().len(), 8);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_failed_send_leaves_no_record() {
    let (dispatcher, store, sender) = dispatcher(DedupWindow::default());
    sender.set_failing(true);

    assert!(dispatcher.dispatch(alert("BUY BTC")).await.is_err());
    assert!(store.is_empty().await);

    sender.set_failing(false);
    let retry = dispatcher.dispatch(alert("BUY BTC")).await.unwrap();
    assert_eq!(retry.delivery, Delivery::Full);
}
