//! Position quality and sensor faults

use crate::*;
use cheerline::types::SensorFault;

#[tokio::test]
async fn inaccurate_fixes_do_not_add_distance() {
    let mut h = Harness::new();
    h.start().await;

    for _ in 0..10 {
        h.step_quiet(10.0, 50.0);
    }
    let snapshot = h.tick_now().await;
    assert_eq!(snapshot.distance_km, 0.0);
    assert_eq!(snapshot.samples.rejected_accuracy, 10);

    // Back under the ceiling: the whole gap counts from the last good fix
    let snapshot = h.step(10.0).await;
    assert!((snapshot.distance_km - 0.11).abs() < 1e-6);
}

#[tokio::test]
async fn jitter_is_not_movement() {
    let mut h = Harness::new();
    h.start().await;

    h.step_quiet(3.0, 5.0);
    let snapshot = h.tick_now().await;
    assert_eq!(snapshot.distance_km, 0.0);
    assert_eq!(snapshot.samples.rejected_jitter, 1);

    // 6 m from the anchor now
    let snapshot = h.step(3.0).await;
    assert!((snapshot.distance_km - 0.006).abs() < 1e-6);
}

#[tokio::test]
async fn signal_loss_freezes_distance_until_samples_resume() {
    let mut h = Harness::new();
    h.add_message(0.5, "Ana", "Half a km");
    h.start().await;
    h.run_to(0.2).await;

    h.engine.sensor_fault(SensorFault::SignalLost).unwrap();
    let frozen = h
        .engine
        .wait_for(|s| s.sensor_fault.is_some())
        .await
        .unwrap();
    assert_eq!(frozen.sensor_fault, Some(SensorFault::SignalLost));

    for _ in 0..5 {
        let snapshot = h.tick_now().await;
        assert_eq!(snapshot.distance_km, frozen.distance_km);
        assert_eq!(snapshot.played, 0);
    }

    let resumed = h.step(10.0).await;
    assert_eq!(resumed.sensor_fault, None);
    assert!(resumed.distance_km > frozen.distance_km);

    h.run_to(0.55).await;
    h.settle().await;
    assert_eq!(h.output.spoken(), vec!["Half a km"]);
}

#[tokio::test]
async fn permission_denied_is_surfaced() {
    let mut h = Harness::new();
    h.start().await;

    h.engine.sensor_fault(SensorFault::PermissionDenied).unwrap();
    let snapshot = h
        .engine
        .wait_for(|s| s.sensor_fault.is_some())
        .await
        .unwrap();
    assert_eq!(snapshot.sensor_fault, Some(SensorFault::PermissionDenied));
    assert!(SensorFault::PermissionDenied.needs_user_action());
}
