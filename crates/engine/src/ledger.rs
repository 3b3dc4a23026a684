//! Local message ledger
//!
//! Holds every known message for the active run together with its local
//! play state:
//!
//! ```text
//! Unplayed --select--> PendingReport --confirm--> Confirmed
//!                            |                        ^
//!                            +--report failed--> ReportFailed
//! ```
//!
//! Once a message leaves `Unplayed`, local state is authoritative: a remote
//! list that still shows it unplayed never resets it. A remote list that
//! shows it played moves it to `Confirmed`.
//!
//! Whether `ReportFailed` is selectable again is decided by the
//! [`ReportFailurePolicy`] the ledger was built with.
//!
//! Entries are kept sorted by threshold, ties in insertion order. The order
//! is fixed at insertion and never changes afterwards.

use cheerline_core::{Message, MessageId};
use serde::{Deserialize, Serialize};

use crate::config::ReportFailurePolicy;

/// Local play state of one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    /// Not yet selected
    Unplayed,
    /// Selected for playback; the played report goes out once it has had
    /// its turn and is not yet acknowledged
    PendingReport,
    /// The authority has acknowledged the played flag
    Confirmed,
    /// The played report failed
    ReportFailed,
}

impl PlayState {
    /// Whether the runner has (locally) been given this message
    pub fn is_played(&self) -> bool {
        !matches!(self, PlayState::Unplayed)
    }
}

/// One message with its local state
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// The message as last received from the authority
    pub message: Message,
    /// Local play state
    pub state: PlayState,
    seq: u64,
}

impl LedgerEntry {
    /// Arrival sequence number; breaks ties between equal thresholds
    pub fn sequence(&self) -> u64 {
        self.seq
    }
}

/// Outcome of folding a remote list into the ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Messages seen for the first time
    pub inserted: usize,
    /// Known messages moved to `Confirmed` by the remote played flag
    pub confirmed: usize,
}

/// Ordered message set with per-message play state
#[derive(Debug, Clone)]
pub struct MessageLedger {
    policy: ReportFailurePolicy,
    entries: Vec<LedgerEntry>,
    next_seq: u64,
}

impl MessageLedger {
    /// Empty ledger using `policy` for failed reports
    pub fn new(policy: ReportFailurePolicy) -> Self {
        Self {
            policy,
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// The failed-report policy
    pub fn policy(&self) -> ReportFailurePolicy {
        self.policy
    }

    /// Fold an authoritative message list into local state.
    ///
    /// Messages the ledger knows but the remote omits are kept.
    pub fn merge(&mut self, remote: Vec<Message>) -> MergeSummary {
        let mut summary = MergeSummary::default();
        for message in remote {
            match self.position(&message.id) {
                Some(idx) => {
                    let entry = &mut self.entries[idx];
                    if message.played && entry.state != PlayState::Confirmed {
                        entry.state = PlayState::Confirmed;
                        summary.confirmed += 1;
                    }
                    entry.message.played |= message.played;
                }
                None => {
                    let state = if message.played {
                        PlayState::Confirmed
                    } else {
                        PlayState::Unplayed
                    };
                    self.insert(message, state);
                    summary.inserted += 1;
                }
            }
        }
        summary
    }

    fn insert(&mut self, message: Message, state: PlayState) {
        let threshold = message.threshold_km;
        // After every entry at or below this threshold: ties keep arrival order
        let at = self
            .entries
            .partition_point(|e| e.message.threshold_km.total_cmp(&threshold).is_le());
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            at,
            LedgerEntry {
                message,
                state,
                seq,
            },
        );
    }

    fn position(&self, id: &MessageId) -> Option<usize> {
        self.entries.iter().position(|e| e.message.id == *id)
    }

    fn is_triggerable(&self, state: PlayState) -> bool {
        match state {
            PlayState::Unplayed => true,
            PlayState::ReportFailed => self.policy == ReportFailurePolicy::Replay,
            PlayState::PendingReport | PlayState::Confirmed => false,
        }
    }

    /// Triggerable messages with threshold at or below `distance_km`, in
    /// threshold order with ties in insertion order
    pub fn upcoming(&self, distance_km: f64) -> Vec<Message> {
        self.entries
            .iter()
            .take_while(|e| e.message.threshold_km <= distance_km)
            .filter(|e| self.is_triggerable(e.state))
            .map(|e| e.message.clone())
            .collect()
    }

    /// Every triggerable message regardless of distance, in play order
    pub fn remaining(&self) -> impl Iterator<Item = &Message> {
        self.entries
            .iter()
            .filter(|e| self.is_triggerable(e.state))
            .map(|e| &e.message)
    }

    /// Lock a message against reselection. Returns `false` if it was not
    /// triggerable.
    pub fn mark_selected(&mut self, id: &MessageId) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        if !self.is_triggerable(self.entries[idx].state) {
            return false;
        }
        self.entries[idx].state = PlayState::PendingReport;
        true
    }

    /// Give back a selected message that never reached the runner. Only a
    /// message whose report has not gone out can be withdrawn.
    pub fn withdraw(&mut self, id: &MessageId) -> bool {
        match self.position(id) {
            Some(idx) if self.entries[idx].state == PlayState::PendingReport => {
                self.entries[idx].state = PlayState::Unplayed;
                true
            }
            _ => false,
        }
    }

    /// Record an acknowledged played report
    pub fn confirm(&mut self, id: &MessageId) -> bool {
        match self.position(id) {
            Some(idx) if self.entries[idx].state.is_played() => {
                let entry = &mut self.entries[idx];
                let changed = entry.state != PlayState::Confirmed;
                entry.state = PlayState::Confirmed;
                entry.message.played = true;
                changed
            }
            _ => false,
        }
    }

    /// Record a failed played report. Only a pending report can fail.
    pub fn report_failed(&mut self, id: &MessageId) -> bool {
        match self.position(id) {
            Some(idx) if self.entries[idx].state == PlayState::PendingReport => {
                self.entries[idx].state = PlayState::ReportFailed;
                true
            }
            _ => false,
        }
    }

    /// Move a failed report back to pending before re-issuing it
    pub fn retry_report(&mut self, id: &MessageId) -> bool {
        match self.position(id) {
            Some(idx) if self.entries[idx].state == PlayState::ReportFailed => {
                self.entries[idx].state = PlayState::PendingReport;
                true
            }
            _ => false,
        }
    }

    /// Local state of a message
    pub fn state(&self, id: &MessageId) -> Option<PlayState> {
        self.get(id).map(|e| e.state)
    }

    /// Entry for a message
    pub fn get(&self, id: &MessageId) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.message.id == *id)
    }

    /// Entries in play order
    pub fn iter(&self) -> impl Iterator<Item = &LedgerEntry> {
        self.entries.iter()
    }

    /// Ids whose played report is in flight
    pub fn pending_reports(&self) -> Vec<MessageId> {
        self.ids_in(PlayState::PendingReport)
    }

    /// Ids whose played report failed and has not been confirmed since
    pub fn failed_reports(&self) -> Vec<MessageId> {
        self.ids_in(PlayState::ReportFailed)
    }

    fn ids_in(&self, state: PlayState) -> Vec<MessageId> {
        self.entries
            .iter()
            .filter(|e| e.state == state)
            .map(|e| e.message.id)
            .collect()
    }

    /// Messages selected at least once
    pub fn played_count(&self) -> usize {
        self.entries.iter().filter(|e| e.state.is_played()).count()
    }

    /// Number of known messages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no messages are known
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
