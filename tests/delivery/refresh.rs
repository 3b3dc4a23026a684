//! Picking up messages added while the run is in progress

use crate::*;

#[tokio::test]
async fn message_added_mid_run_is_picked_up_on_refresh() {
    let mut h = Harness::new();
    h.start().await;
    h.run_to(0.3).await;

    // Supporter sends a message for a distance already covered
    let late = h.add_message(0.2, "Priya", "Sorry I'm late!");
    let snapshot = h.tick_now().await;
    assert!(snapshot.upcoming.is_empty());

    h.refresh.tick();
    let snapshot = h
        .engine
        .wait_for(|s| s.upcoming.iter().any(|u| u.id == late))
        .await
        .unwrap();
    assert_eq!(snapshot.upcoming[0].remaining_km, 0.0);

    // Already due: plays on the next evaluation
    h.tick_now().await;
    h.settle().await;
    assert_eq!(h.output.spoken(), vec!["Sorry I'm late!"]);
    assert!(h.remote(late).played);
}

#[tokio::test]
async fn refresh_keeps_local_order_and_state() {
    let mut h = Harness::new();
    h.add_message(0.05, "A", "first");
    h.start().await;
    h.run_to(0.1).await;
    h.settle().await;

    h.add_message(0.5, "C", "third");
    h.add_message(0.3, "B", "second");
    h.refresh.tick();
    let snapshot = h
        .engine
        .wait_for(|s| s.upcoming.len() == 2)
        .await
        .unwrap();
    let senders: Vec<_> = snapshot.upcoming.iter().map(|u| u.sender.as_str()).collect();
    assert_eq!(senders, vec!["B", "C"]);

    h.run_to(0.6).await;
    h.settle().await;
    assert_eq!(h.output.spoken(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn failed_refresh_is_reported_and_recovers() {
    let mut h = Harness::with_config(fast_config());
    h.start().await;
    h.client.fail_refreshes([Error::Validation("bad request".into())]);

    h.refresh.tick();
    let snapshot = h
        .engine
        .wait_for(|s| s.last_sync_error.is_some())
        .await
        .unwrap();
    assert!(snapshot.last_sync_error.unwrap().contains("bad request"));

    let id = h.add_message(0.01, "Max", "You got this");
    h.refresh.tick();
    let snapshot = h
        .engine
        .wait_for(|s| s.last_sync_error.is_none())
        .await
        .unwrap();
    assert_eq!(snapshot.upcoming[0].id, id);
}

#[tokio::test]
async fn transient_refresh_failures_are_retried() {
    let mut h = Harness::with_config(fast_config());
    h.start().await;
    let id = h.add_message(0.01, "Max", "You got this");
    h.client.fail_refreshes([
        Error::TransientNetwork("timeout".into()),
        Error::TransientNetwork("timeout".into()),
    ]);

    h.refresh.tick();
    let snapshot = h
        .engine
        .wait_for(|s| !s.upcoming.is_empty())
        .await
        .unwrap();
    assert_eq!(snapshot.upcoming[0].id, id);
    assert!(snapshot.last_sync_error.is_none());
}
