//! Concurrent writers on one run
//!
//! A runner's mark-played races supporters' add-message calls. Versioned
//! writes must never lose an update.

use std::thread;

use crate::*;
use cheerline::authority::{InMemoryBlobStore, InMemoryDocumentStore, SystemClock};

#[test]
fn concurrent_adds_are_all_kept() {
    let (auth, _) = authority();
    let id = run(&auth, 42.2);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let auth = Arc::clone(&auth);
            thread::spawn(move || {
                for i in 0..25 {
                    let km = 1.0 + (t * 25 + i) as f64 * 0.1;
                    auth.add_message(&id, cheer(km, &format!("s{}-{}", t, i)))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let messages = auth.list_messages(&id).unwrap();
    assert_eq!(messages.len(), 200);
    assert!(messages
        .windows(2)
        .all(|w| w[0].threshold_km <= w[1].threshold_km));
}

#[test]
fn mark_played_races_add_message_without_lost_updates() {
    let (auth, _) = authority();
    let id = run(&auth, 21.1);
    let seeded: Vec<_> = (1..=20)
        .map(|i| auth.add_message(&id, cheer(i as f64 * 0.5, "Seed")).unwrap().id)
        .collect();
    auth.start_run(&id).unwrap();

    let runner = {
        let auth = Arc::clone(&auth);
        let seeded = seeded.clone();
        thread::spawn(move || {
            for message_id in &seeded {
                auth.mark_message_played(&id, message_id).unwrap();
            }
        })
    };
    let supporters: Vec<_> = (0..4)
        .map(|t| {
            let auth = Arc::clone(&auth);
            thread::spawn(move || {
                for i in 0..20 {
                    auth.add_message(&id, cheer(1.0 + (t + i) as f64 * 0.25, "Late"))
                        .unwrap();
                }
            })
        })
        .collect();
    runner.join().unwrap();
    for s in supporters {
        s.join().unwrap();
    }

    let messages = auth.list_messages(&id).unwrap();
    assert_eq!(messages.len(), 100);
    for message in &messages {
        assert_eq!(message.played, seeded.contains(&message.id));
    }
}

#[test]
fn writers_give_up_after_bounded_retries() {
    // Zero retries: a single lost race surfaces as a conflict
    let auth = Arc::new(RunAuthority::new(
        AuthorityConfig::default().with_max_write_retries(0),
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryBlobStore::new()),
        Arc::new(SystemClock),
    ));
    let id = run(&auth, 42.0);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let auth = Arc::clone(&auth);
            thread::spawn(move || {
                (0..50)
                    .map(|i| auth.add_message(&id, cheer(1.0 + (t + i) as f64 * 0.1, "W")))
                    .filter(|r| r.is_ok())
                    .count()
            })
        })
        .collect();
    let written: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    // Whatever succeeded is exactly what is stored
    assert_eq!(auth.list_messages(&id).unwrap().len(), written);
}
