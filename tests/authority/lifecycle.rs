//! Run lifecycle and message bookkeeping

use crate::*;
use cheerline::types::RunStatus;

// ============================================================================
// State machine
// ============================================================================

#[test]
fn run_moves_created_active_completed() {
    let (auth, _) = authority();
    let id = run(&auth, 10.0);
    assert_eq!(auth.get_run(&id).unwrap().status, RunStatus::Created);

    auth.start_run(&id).unwrap();
    assert_eq!(auth.get_run(&id).unwrap().status, RunStatus::Active);

    let done = auth.complete_run(&id, 10.2, 3600).unwrap();
    assert_eq!(done.status, RunStatus::Completed);
    assert_eq!(done.distance_km, 10.2);
    assert_eq!(done.duration_secs, 3600);
    assert!(done.completed_at.is_some());
}

#[test]
fn illegal_transitions_are_rejected_without_side_effects() {
    let (auth, _) = authority();
    let id = run(&auth, 10.0);

    assert!(auth.complete_run(&id, 1.0, 60).unwrap_err().is_validation());
    auth.start_run(&id).unwrap();
    assert!(auth.start_run(&id).unwrap_err().is_validation());
    auth.complete_run(&id, 4.0, 900).unwrap();
    assert!(auth.complete_run(&id, 8.0, 1800).unwrap_err().is_validation());
    assert!(auth.start_run(&id).unwrap_err().is_validation());

    let run = auth.get_run(&id).unwrap();
    assert_eq!(run.distance_km, 4.0);
    assert_eq!(run.duration_secs, 900);
}

#[test]
fn negative_completion_distance_is_rejected() {
    let (auth, _) = authority();
    let id = run(&auth, 10.0);
    auth.start_run(&id).unwrap();
    assert!(auth.complete_run(&id, -0.1, 60).unwrap_err().is_validation());
    assert!(auth.get_run(&id).unwrap().status.is_active());
}

#[test]
fn create_validates_title_and_target() {
    let (auth, _) = authority();
    assert!(auth.create_run(NewRun::new("  ", 5.0)).unwrap_err().is_validation());
    assert!(auth.create_run(NewRun::new("Run", 0.0)).unwrap_err().is_validation());
    assert!(auth.create_run(NewRun::new("Run", 100.5)).unwrap_err().is_validation());
    assert!(auth.create_run(NewRun::new("Run", 100.0)).is_ok());
}

// ============================================================================
// Messages
// ============================================================================

#[test]
fn messages_list_in_threshold_order_with_ties_in_append_order() {
    let (auth, _) = authority();
    let id = run(&auth, 10.0);
    auth.add_message(&id, cheer(5.0, "Late")).unwrap();
    auth.add_message(&id, cheer(2.0, "First")).unwrap();
    auth.add_message(&id, cheer(2.0, "Second")).unwrap();
    auth.add_message(&id, cheer(10.0, "Finish")).unwrap();

    let senders: Vec<_> = auth
        .list_messages(&id)
        .unwrap()
        .into_iter()
        .map(|m| m.sender)
        .collect();
    assert_eq!(senders, vec!["First", "Second", "Late", "Finish"]);
}

#[test]
fn message_fields_round_trip() {
    let (auth, _) = authority();
    let id = run(&auth, 10.0);
    let audio = auth.upload_audio(vec![1, 2, 3]).unwrap();
    let added = auth
        .add_message(
            &id,
            NewMessage::text(3.5, "  Alex ", " You got this ").with_audio(audio.clone()),
        )
        .unwrap();

    let listed = auth.list_messages(&id).unwrap();
    assert_eq!(listed, vec![added.clone()]);
    assert_eq!(added.sender, "Alex");
    assert_eq!(added.text.as_deref(), Some("You got this"));
    assert_eq!(added.audio, Some(audio.clone()));
    assert!(!added.played);
    assert_eq!(*auth.fetch_audio(&audio).unwrap(), vec![1, 2, 3]);
}

#[test]
fn message_submissions_are_validated() {
    let (auth, _) = authority();
    let id = run(&auth, 5.0);
    assert!(auth.add_message(&id, cheer(0.0, "Zero")).unwrap_err().is_validation());
    assert!(auth.add_message(&id, cheer(5.01, "Far")).unwrap_err().is_validation());
    assert!(auth.add_message(&id, cheer(1.0, " ")).unwrap_err().is_validation());
    assert!(auth
        .add_message(&id, NewMessage::text(1.0, "Blank", "   "))
        .unwrap_err()
        .is_validation());
    assert!(auth.add_message(&id, cheer(5.0, "AtTarget")).is_ok());
    assert!(auth.add_message(&RunId::new(), cheer(1.0, "Nobody")).unwrap_err().is_not_found());
}

#[test]
fn completed_run_accepts_no_messages() {
    let (auth, _) = authority();
    let id = run(&auth, 5.0);
    auth.add_message(&id, cheer(1.0, "Before")).unwrap();
    auth.start_run(&id).unwrap();
    auth.add_message(&id, cheer(2.0, "During")).unwrap();
    auth.complete_run(&id, 5.0, 1500).unwrap();

    assert!(auth.add_message(&id, cheer(3.0, "After")).unwrap_err().is_validation());
    assert_eq!(auth.list_messages(&id).unwrap().len(), 2);
}

#[test]
fn mark_played_is_idempotent() {
    let (auth, _) = authority();
    let id = run(&auth, 5.0);
    let message = auth.add_message(&id, cheer(1.0, "Alex")).unwrap();
    auth.start_run(&id).unwrap();

    let first = auth.mark_message_played(&id, &message.id).unwrap();
    let second = auth.mark_message_played(&id, &message.id).unwrap();
    assert!(first.played);
    assert_eq!(first, second);
    assert!(auth.list_messages(&id).unwrap()[0].played);
}

#[test]
fn mark_played_on_unknown_message_is_not_found() {
    let (auth, _) = authority();
    let id = run(&auth, 5.0);
    let other = run(&auth, 5.0);
    let message = auth.add_message(&other, cheer(1.0, "Elsewhere")).unwrap();
    assert!(auth
        .mark_message_played(&id, &message.id)
        .unwrap_err()
        .is_not_found());
}
