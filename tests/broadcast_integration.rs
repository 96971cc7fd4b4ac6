//! Fan-out and backpressure behavior seen through running units

mod common;

use common::mock_helpers::{RecordingPublisher, SlowPublisher};
use common::{recv_n, wait_until};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamblocks::unit::{Broadcaster, OverflowPolicy, UnitBuilder, UnitKind};

fn toggle_with(broadcaster: &Broadcaster) -> streamblocks::UnitHandle {
    UnitBuilder::new(UnitKind::Toggle)
        .name("blink")
        .broadcaster(broadcaster.clone())
        .spawn()
        .unwrap()
}

#[test]
fn test_slow_subscriber_drops_newest() {
    let broadcaster = Broadcaster::new(OverflowPolicy::DropNewest, Some(2));
    let unit = toggle_with(&broadcaster);
    let idle = broadcaster.subscribe();

    for _ in 0..10 {
        unit.send(json!({})).unwrap();
    }
    assert!(wait_until(|| broadcaster.published() == 10));

    // The first two are kept, the rest never made it into the buffer
    assert_eq!(
        idle.drain(),
        vec![json!({"state": true}), json!({"state": false})]
    );
    assert_eq!(broadcaster.dropped(), 8);
    assert_eq!(broadcaster.dropped_for(idle.id()), Some(8));
    unit.stop().unwrap();
}

#[test]
fn test_slow_subscriber_drops_oldest() {
    let broadcaster = Broadcaster::new(OverflowPolicy::DropOldest, Some(2));
    let unit = toggle_with(&broadcaster);
    let idle = broadcaster.subscribe();

    for _ in 0..5 {
        unit.send(json!({})).unwrap();
    }
    assert!(wait_until(|| broadcaster.published() == 5));

    // States 1..5 are t f t f t; the last two survive
    assert_eq!(
        idle.drain(),
        vec![json!({"state": false}), json!({"state": true})]
    );
    assert_eq!(broadcaster.dropped(), 3);
    unit.stop().unwrap();
}

#[test]
fn test_lagging_subscriber_does_not_hold_back_others() {
    let broadcaster = Broadcaster::new(OverflowPolicy::DropNewest, Some(1));
    let unit = toggle_with(&broadcaster);
    let _idle = broadcaster.subscribe();
    let live = broadcaster.subscribe();

    for i in 0..4 {
        unit.send(json!({})).unwrap();
        assert_eq!(recv_n(&live, 1), vec![json!({"state": i % 2 == 0})]);
    }
    assert_eq!(broadcaster.dropped(), 3);
    unit.stop().unwrap();
}

#[test]
fn test_blocked_broadcast_does_not_starve_shutdown() {
    let broadcaster = Broadcaster::new(OverflowPolicy::Block { timeout_ms: 20 }, Some(1));
    let unit = toggle_with(&broadcaster);
    let _idle = broadcaster.subscribe();

    for _ in 0..20 {
        unit.send(json!({})).unwrap();
    }
    assert!(wait_until(|| broadcaster.published() >= 2));

    let started = Instant::now();
    unit.stop().unwrap();
    // Quit competes with queued input; each publish waits at most 20ms
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(broadcaster.published() < 20);
}

#[test]
fn test_dropped_subscription_is_removed() {
    let broadcaster = Broadcaster::default();
    let unit = toggle_with(&broadcaster);

    let a = broadcaster.subscribe();
    let b = broadcaster.subscribe();
    assert_eq!(broadcaster.subscriber_count(), 2);
    drop(a);
    assert_eq!(broadcaster.subscriber_count(), 1);

    unit.send(json!({})).unwrap();
    assert_eq!(recv_n(&b, 1), vec![json!({"state": true})]);
    assert!(broadcaster.unsubscribe(b.id()));
    assert!(!broadcaster.unsubscribe(b.id()));
    unit.stop().unwrap();
}

#[test]
fn test_late_subscriber_sees_only_later_records() {
    let broadcaster = Broadcaster::default();
    let unit = toggle_with(&broadcaster);
    let early = broadcaster.subscribe();

    unit.send(json!({})).unwrap();
    recv_n(&early, 1);

    let late = broadcaster.subscribe();
    unit.send(json!({})).unwrap();
    assert_eq!(recv_n(&late, 1), vec![json!({"state": false})]);
    assert!(late.try_recv().is_none());
    unit.stop().unwrap();
}

#[test]
fn test_host_publisher_receives_records() {
    let publisher = RecordingPublisher::default();
    let unit = UnitBuilder::new(UnitKind::Toggle)
        .publisher(Arc::new(publisher.clone()))
        .spawn()
        .unwrap();

    unit.send(json!({})).unwrap();
    unit.send(json!({})).unwrap();
    assert!(wait_until(|| publisher.records().len() == 2));
    assert_eq!(
        publisher.records(),
        vec![json!({"state": true}), json!({"state": false})]
    );
    unit.stop().unwrap();
}

#[test]
fn test_slow_publisher_still_stops() {
    let (slow, records) = SlowPublisher::new(Duration::from_millis(10));
    let unit = UnitBuilder::new(UnitKind::Toggle)
        .publisher(Arc::new(slow))
        .spawn()
        .unwrap();

    for _ in 0..50 {
        unit.send(json!({})).unwrap();
    }
    assert!(wait_until(|| !records.records().is_empty()));
    let stats = unit.stop().unwrap();
    assert!(stats.outputs < 50);
}
