//! Played reports and the report-failure policies

use crate::*;
use cheerline::engine::ReportFailurePolicy;

fn transient() -> Error {
    Error::TransientNetwork("connection reset".into())
}

fn rejected() -> Error {
    Error::Validation("rejected by authority".into())
}

// ============================================================================
// Retry without replay (default)
// ============================================================================

#[tokio::test]
async fn transient_report_failures_are_retried_without_replay() {
    let mut h = Harness::with_config(fast_config());
    let id = h.add_message(0.05, "Jo", "Go Jo");
    h.client.fail_reports([transient(), transient()]);
    h.start().await;

    h.run_to(0.1).await;
    h.settle().await;

    assert_eq!(h.output.spoken(), vec!["Go Jo"]);
    assert_eq!(h.client.report_calls(), vec![id, id, id]);
    assert!(h.remote(id).played);
}

#[tokio::test]
async fn refresh_reissues_reports_after_attempts_run_out() {
    let config = EngineConfig {
        max_report_attempts: 2,
        ..fast_config()
    };
    let mut h = Harness::with_config(config);
    let id = h.add_message(0.05, "Jo", "Go Jo");
    h.client.fail_reports([transient(), transient()]);
    h.start().await;

    h.run_to(0.1).await;
    let client = h.client.clone();
    eventually(|| client.report_calls().len() == 2).await;
    let snapshot = h.engine.wait_for(|s| s.queued == 0).await.unwrap();
    assert_eq!(snapshot.unconfirmed_reports, 1);
    assert!(!h.remote(id).played);

    h.refresh.tick();
    h.settle().await;

    assert_eq!(h.client.report_calls().len(), 3);
    assert!(h.remote(id).played);
    assert_eq!(h.output.spoken(), vec!["Go Jo"]);
}

#[tokio::test]
async fn stop_lists_reports_the_authority_never_accepted() {
    let mut h = Harness::with_config(fast_config());
    let id = h.add_message(0.05, "Jo", "Go Jo");
    h.client.fail_reports(std::iter::repeat_with(rejected).take(10));
    h.start().await;

    h.run_to(0.1).await;
    h.engine.wait_for(|s| s.queued == 0).await.unwrap();
    let client = h.client.clone();
    eventually(|| !client.report_calls().is_empty()).await;

    let summary = h.engine.stop().await.unwrap();
    assert!(summary.run.status.is_completed());
    assert_eq!(summary.unconfirmed_reports, vec![id]);
    // Rejections are not retried
    assert_eq!(h.client.report_calls(), vec![id]);
    assert_eq!(h.output.spoken(), vec!["Go Jo"]);
}

#[tokio::test]
async fn rejected_report_is_not_reissued_on_refresh() {
    let mut h = Harness::with_config(fast_config());
    let id = h.add_message(0.05, "Jo", "Go Jo");
    h.client.fail_reports(std::iter::repeat_with(rejected).take(10));
    h.start().await;

    h.run_to(0.1).await;
    h.engine.wait_for(|s| s.queued == 0).await.unwrap();
    let client = h.client.clone();
    eventually(|| !client.report_calls().is_empty()).await;

    // A fresh message per refresh shows each one has been merged
    for i in 1..=3 {
        h.add_message(4.0 + i as f64 * 0.1, "Sam", "Keep going");
        h.refresh.tick();
        h.engine
            .wait_for(|s| s.upcoming.len() == i)
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.client.report_calls(), vec![id]);
    assert_eq!(h.engine.snapshot().unconfirmed_reports, 1);
    assert!(!h.remote(id).played);
}

// ============================================================================
// Replay
// ============================================================================

#[tokio::test]
async fn replay_policy_plays_again_after_failed_report() {
    let config = fast_config().with_report_failure_policy(ReportFailurePolicy::Replay);
    let mut h = Harness::with_config(config);
    let id = h.add_message(0.05, "Jo", "Go Jo");
    h.client.fail_reports([transient()]);
    h.start().await;

    h.run_to(0.1).await;
    // The failed report makes the message due again on a later tick
    for _ in 0..100 {
        if h.client.report_calls().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        h.tick_now().await;
    }
    h.settle().await;

    assert_eq!(h.client.report_calls(), vec![id, id]);
    assert_eq!(h.output.spoken(), vec!["Go Jo", "Go Jo"]);
    assert!(h.remote(id).played);
}

#[tokio::test]
async fn replay_policy_does_not_retry_in_background() {
    let config = fast_config().with_report_failure_policy(ReportFailurePolicy::Replay);
    let mut h = Harness::with_config(config);
    let id = h.add_message(0.05, "Jo", "Go Jo");
    h.client.fail_reports([transient()]);
    h.start().await;

    // Cross the threshold with a single tick, then stop ticking
    for _ in 0..10 {
        h.step_quiet(10.0, 5.0);
    }
    h.tick_now().await;
    h.engine.wait_for(|s| s.queued == 0).await.unwrap();
    let snapshot = h
        .engine
        .wait_for(|s| s.upcoming.iter().any(|u| u.id == id))
        .await
        .unwrap();
    assert_eq!(snapshot.unconfirmed_reports, 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.client.report_calls(), vec![id]);
}
