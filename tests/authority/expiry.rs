//! Fixed expiry and reaping

use std::time::Duration;

use crate::*;
use cheerline::authority::spawn_reaper;

#[test]
fn runs_expire_seven_days_after_creation() {
    let (auth, clock) = authority();
    let id = run(&auth, 5.0);
    let created = auth.get_run(&id).unwrap();
    assert_eq!(created.expires_at - created.created_at, chrono::Duration::days(7));

    // Activity does not extend the deadline
    clock.advance(chrono::Duration::days(6));
    auth.start_run(&id).unwrap();
    auth.add_message(&id, cheer(1.0, "Alex")).unwrap();
    assert_eq!(auth.get_run(&id).unwrap().expires_at, created.expires_at);

    clock.advance(chrono::Duration::days(1));
    assert!(auth.get_run(&id).unwrap_err().is_not_found());
    assert!(auth.list_messages(&id).unwrap_err().is_not_found());
    assert!(auth.add_message(&id, cheer(2.0, "Sam")).unwrap_err().is_not_found());
}

#[test]
fn reaping_removes_runs_and_their_audio() {
    let (auth, clock) = authority();
    let old = run(&auth, 5.0);
    let clip = auth.upload_audio(vec![9; 128]).unwrap();
    auth.add_message(&old, cheer(1.0, "Alex").with_audio(clip.clone()))
        .unwrap();

    clock.advance(chrono::Duration::days(3));
    let fresh = run(&auth, 5.0);

    clock.advance(chrono::Duration::days(4));
    let report = auth.reap_expired();
    assert_eq!(report.runs_removed, 1);
    assert_eq!(report.blobs_removed, 1);
    assert!(auth.fetch_audio(&clip).unwrap_err().is_not_found());
    assert!(auth.get_run(&fresh).is_ok());

    assert_eq!(auth.reap_expired().runs_removed, 0);
}

#[tokio::test(start_paused = true)]
async fn background_reaper_sweeps_periodically() {
    let (auth, clock) = authority();
    let id = run(&auth, 5.0);
    let clip = auth.upload_audio(vec![1; 8]).unwrap();
    auth.add_message(&id, cheer(1.0, "Alex").with_audio(clip.clone()))
        .unwrap();
    clock.advance(chrono::Duration::days(8));

    let reaper = spawn_reaper(Arc::clone(&auth), Duration::from_secs(60));
    tokio::time::sleep(Duration::from_secs(61)).await;
    reaper.shutdown().await;

    assert!(auth.fetch_audio(&clip).unwrap_err().is_not_found());
    assert_eq!(auth.reap_expired().runs_removed, 0);
}
