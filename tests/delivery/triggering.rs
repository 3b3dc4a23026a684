//! Threshold triggering
//!
//! Every message plays once the runner's cumulative distance reaches its
//! threshold, in threshold order, and never more than once.

use crate::*;

// ============================================================================
// Single message
// ============================================================================

#[tokio::test]
async fn message_plays_once_when_threshold_crossed() {
    let mut h = Harness::new();
    let alex = h.add_message(2.5, "Alex", "Halfway, keep it up!");
    h.start().await;

    let before = h.run_to(2.4).await;
    assert_eq!(before.played, 0);
    assert_eq!(before.upcoming.len(), 1);

    h.run_to(2.6).await;
    let settled = h.settle().await;

    assert_eq!(settled.played, 1);
    assert!(settled.upcoming.is_empty());
    assert_eq!(h.output.spoken(), vec!["Halfway, keep it up!"]);
    assert_eq!(h.client.report_calls(), vec![alex]);
    assert!(h.remote(alex).played);
}

#[tokio::test]
async fn upcoming_counts_down_remaining_distance() {
    let mut h = Harness::new();
    h.add_message(1.0, "Sam", "One km!");
    h.start().await;

    let snapshot = h.run_to(0.4).await;
    let upcoming = &snapshot.upcoming[0];
    assert_eq!(upcoming.sender, "Sam");
    assert_eq!(upcoming.threshold_km, 1.0);
    assert!((upcoming.remaining_km - (1.0 - snapshot.distance_km)).abs() < 1e-9);
    assert!(snapshot.now_playing.is_none());
}

// ============================================================================
// Ordering
// ============================================================================

#[tokio::test]
async fn tied_thresholds_play_in_arrival_order() {
    let mut h = Harness::new();
    let a = h.add_message(1.0, "A", "from A");
    let b = h.add_message(1.0, "B", "from B");
    h.start().await;

    h.run_to(1.05).await;
    h.settle().await;

    assert_eq!(h.output.spoken(), vec!["from A", "from B"]);
    assert_eq!(h.client.report_calls(), vec![a, b]);
}

#[tokio::test]
async fn thresholds_crossed_between_ticks_play_in_threshold_order() {
    let mut h = Harness::new();
    h.add_message(0.3, "Third", "three");
    h.add_message(0.1, "First", "one");
    h.add_message(0.2, "Second", "two");
    h.start().await;

    // A long gap in evaluation: all three become due at once
    for _ in 0..35 {
        h.step_quiet(10.0, 5.0);
    }
    let snapshot = h.tick_now().await;
    assert_eq!(snapshot.played, 3);

    h.settle().await;
    assert_eq!(h.output.spoken(), vec!["one", "two", "three"]);
}

// ============================================================================
// At most once
// ============================================================================

#[tokio::test]
async fn played_message_never_retriggers() {
    let mut h = Harness::new();
    h.add_message(0.2, "Kim", "Nice start");
    h.start().await;

    h.run_to(1.0).await;
    h.settle().await;
    for _ in 0..10 {
        h.tick_now().await;
    }
    h.refresh.tick();
    h.run_to(1.2).await;
    h.settle().await;

    assert_eq!(h.output.spoken(), vec!["Nice start"]);
    assert_eq!(h.client.report_calls().len(), 1);
}

#[tokio::test]
async fn nothing_triggers_without_movement() {
    let mut h = Harness::new();
    h.add_message(0.01, "Lee", "Go!");
    h.start().await;

    for _ in 0..5 {
        h.tick_now().await;
    }
    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.distance_km, 0.0);
    assert_eq!(snapshot.played, 0);
    assert!(h.output.calls().is_empty());
}
