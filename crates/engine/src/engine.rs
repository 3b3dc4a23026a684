//! The delivery engine
//!
//! One [`Engine`] exclusively owns the accumulator, ledger, trigger engine,
//! playback sequencer and sync client of a run. It lives inside a single
//! tokio task, the control loop, which serializes every input:
//!
//! - intents and position samples from the [`EngineHandle`]
//! - trigger ticks and refresh ticks from the injected [`TickSource`]s
//! - playback events from the sequencer worker
//! - results of background sync calls
//!
//! Nothing else mutates engine state, so no locks are involved. After each
//! change the loop publishes an [`EngineSnapshot`] on a watch channel.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --start--> Running --stop--> Stopping --run completed--> Stopped
//! ```
//!
//! `start` moves the remote run from `Created` to `Active`, or resumes a run
//! that is already active. `stop` lets the playing message finish, discards
//! the rest of the queue, waits (bounded) for outstanding played reports and
//! completes the run with the frozen distance and duration. If completion
//! fails the engine stays in `Stopping` and `stop` may be called again.

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use cheerline_core::{Error, MessageId, Result, Run, RunId, RunStatus, SensorFault};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::accumulator::{DistanceAccumulator, PositionSample, SampleVerdict};
use crate::client::AuthorityClient;
use crate::config::{EngineConfig, ReportFailurePolicy};
use crate::ledger::MessageLedger;
use crate::scheduler::{next_tick, IntervalTicks, TickSource};
use crate::sequencer::{
    AssetSource, AudioOutput, ClientAssets, PlaybackEvent, PlaybackOutcome, PlaybackReport,
    PlaybackSequencer,
};
use crate::snapshot::{EnginePhase, EngineSnapshot, NowPlaying, UpcomingMessage};
use crate::sync::{SyncClient, SyncEvent};
use crate::trigger::TriggerEngine;

/// What a completed delivery looked like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSummary {
    /// The run as the authority recorded it at completion
    pub run: Run,
    /// Every message that left the playback queue, in order
    pub playback: Vec<PlaybackReport>,
    /// Messages played locally whose report was never acknowledged
    pub unconfirmed_reports: Vec<MessageId>,
}

enum Command {
    Start(oneshot::Sender<Result<EngineSnapshot>>),
    Stop(oneshot::Sender<Result<EngineSummary>>),
    Sample(PositionSample),
    Fault(SensorFault),
}

/// Configures and spawns an engine for one run
pub struct EngineBuilder {
    run_id: RunId,
    client: Arc<dyn AuthorityClient>,
    output: Arc<dyn AudioOutput>,
    assets: Option<Arc<dyn AssetSource>>,
    config: EngineConfig,
    ticks: Option<Box<dyn TickSource>>,
    refresh: Option<Box<dyn TickSource>>,
}

impl EngineBuilder {
    /// Engine for `run_id` talking to `client` and playing through `output`
    pub fn new(
        run_id: RunId,
        client: Arc<dyn AuthorityClient>,
        output: Arc<dyn AudioOutput>,
    ) -> Self {
        Self {
            run_id,
            client,
            output,
            assets: None,
            config: EngineConfig::default(),
            ticks: None,
            refresh: None,
        }
    }

    /// Replace the default configuration
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve clips somewhere other than the authority client
    pub fn assets(mut self, assets: Arc<dyn AssetSource>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Drive trigger evaluation from `source` instead of the configured period
    pub fn tick_source(mut self, source: impl TickSource + 'static) -> Self {
        self.ticks = Some(Box::new(source));
        self
    }

    /// Drive remote refresh from `source` instead of the configured period
    pub fn refresh_source(mut self, source: impl TickSource + 'static) -> Self {
        self.refresh = Some(Box::new(source));
        self
    }

    /// Spawn the control loop. Must be called inside a tokio runtime.
    pub fn spawn(self) -> Result<EngineHandle> {
        self.config.validate()?;
        let config = self.config;

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (playback_tx, playback) = mpsc::unbounded_channel();
        let (sync_tx, sync) = mpsc::unbounded_channel();
        let (interruptions, interruption_rx) = watch::channel(false);
        let (snapshots, snapshot_rx) = watch::channel(EngineSnapshot::idle(self.run_id));

        let assets = self
            .assets
            .unwrap_or_else(|| Arc::new(ClientAssets::new(Arc::clone(&self.client))));
        let sequencer = PlaybackSequencer::spawn(
            self.output,
            assets,
            config.audio_cache_entries,
            config.request_timeout(),
            interruption_rx,
            playback_tx,
        );

        let inbox = Inbox {
            commands,
            playback,
            sync,
            ticks: self
                .ticks
                .unwrap_or_else(|| Box::new(IntervalTicks::new(config.tick_interval()))),
            refresh: self
                .refresh
                .unwrap_or_else(|| Box::new(IntervalTicks::new(config.refresh_interval()))),
            ticks_open: true,
            refresh_open: true,
        };

        let engine = Engine {
            run_id: self.run_id,
            accumulator: DistanceAccumulator::new(config.accuracy_ceiling_m, config.min_movement_m),
            ledger: MessageLedger::new(config.report_failure_policy),
            trigger: TriggerEngine::new(),
            sequencer,
            sync: SyncClient::new(self.client, self.run_id, &config, sync_tx),
            config,
            phase: EnginePhase::Idle,
            started_at: None,
            completion: None,
            now_playing: None,
            queued: 0,
            playback: Vec::new(),
            reports_in_flight: HashSet::new(),
            rejected_reports: HashSet::new(),
            refresh_in_flight: false,
            last_sync_error: None,
            snapshots,
        };
        debug!(run_id = %self.run_id, "engine spawned");
        tokio::spawn(engine.run(inbox));

        Ok(EngineHandle {
            run_id: self.run_id,
            commands: command_tx,
            snapshots: snapshot_rx,
            interruptions,
        })
    }
}

/// Presentation-side handle: intents in, snapshots out
pub struct EngineHandle {
    run_id: RunId,
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<EngineSnapshot>,
    interruptions: watch::Sender<bool>,
}

fn loop_gone() -> Error {
    Error::Internal("engine control loop has exited".into())
}

impl EngineHandle {
    /// The run being delivered
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Start intent: activate the run and begin accumulating and triggering
    pub async fn start(&self) -> Result<EngineSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Start(reply))?;
        rx.await.map_err(|_| loop_gone())?
    }

    /// Stop intent: finish playback and complete the run
    pub async fn stop(&self) -> Result<EngineSummary> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stop(reply))?;
        rx.await.map_err(|_| loop_gone())?
    }

    /// Feed a position sample
    pub fn push_sample(&self, sample: PositionSample) -> Result<()> {
        self.send(Command::Sample(sample))
    }

    /// Report that position samples have stopped
    pub fn sensor_fault(&self, fault: SensorFault) -> Result<()> {
        self.send(Command::Fault(fault))
    }

    /// Signal a system audio interruption starting or ending
    pub fn set_audio_interrupted(&self, interrupted: bool) {
        self.interruptions.send_replace(interrupted);
    }

    /// Subscribe to snapshots
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshots.clone()
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> EngineSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait until a snapshot satisfies `predicate`
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&EngineSnapshot) -> bool,
    ) -> Result<EngineSnapshot> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| loop_gone())?
            .clone();
        Ok(snapshot)
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| loop_gone())
    }
}

struct Inbox {
    commands: mpsc::UnboundedReceiver<Command>,
    playback: mpsc::UnboundedReceiver<PlaybackEvent>,
    sync: mpsc::UnboundedReceiver<SyncEvent>,
    ticks: Box<dyn TickSource>,
    refresh: Box<dyn TickSource>,
    ticks_open: bool,
    refresh_open: bool,
}

/// Owner of all per-run delivery state
pub struct Engine {
    run_id: RunId,
    config: EngineConfig,
    accumulator: DistanceAccumulator,
    ledger: MessageLedger,
    trigger: TriggerEngine,
    sequencer: PlaybackSequencer,
    sync: SyncClient,
    phase: EnginePhase,
    started_at: Option<Instant>,
    completion: Option<(f64, u64)>,
    now_playing: Option<NowPlaying>,
    queued: usize,
    playback: Vec<PlaybackReport>,
    reports_in_flight: HashSet<MessageId>,
    rejected_reports: HashSet<MessageId>,
    refresh_in_flight: bool,
    last_sync_error: Option<String>,
    snapshots: watch::Sender<EngineSnapshot>,
}

impl Engine {
    /// Start building an engine
    pub fn builder(
        run_id: RunId,
        client: Arc<dyn AuthorityClient>,
        output: Arc<dyn AudioOutput>,
    ) -> EngineBuilder {
        EngineBuilder::new(run_id, client, output)
    }

    async fn run(mut self, mut inbox: Inbox) {
        loop {
            let running = self.phase.is_running();
            tokio::select! {
                biased;

                command = inbox.commands.recv() => {
                    let Some(command) = command else {
                        self.abandon();
                        break;
                    };
                    if self.handle(command, &mut inbox).await.is_break() {
                        break;
                    }
                }
                Some(event) = inbox.playback.recv() => self.on_playback(event),
                Some(event) = inbox.sync.recv() => self.on_sync(event),
                tick = next_tick(inbox.ticks.as_mut()), if running && inbox.ticks_open => {
                    match tick {
                        Some(()) => self.on_tick(),
                        None => inbox.ticks_open = false,
                    }
                }
                tick = next_tick(inbox.refresh.as_mut()), if running && inbox.refresh_open => {
                    match tick {
                        Some(()) => self.on_refresh_tick(),
                        None => inbox.refresh_open = false,
                    }
                }
            }
        }
        debug!(run_id = %self.run_id, "control loop exited");
    }

    async fn handle(&mut self, command: Command, inbox: &mut Inbox) -> ControlFlow<()> {
        match command {
            Command::Start(reply) => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                let result = self.stop(inbox).await;
                let done = result.is_ok();
                let _ = reply.send(result);
                if done {
                    return ControlFlow::Break(());
                }
            }
            Command::Sample(sample) => self.on_sample(sample),
            Command::Fault(fault) => self.on_fault(fault),
        }
        ControlFlow::Continue(())
    }

    // =========================================================================
    // Intents
    // =========================================================================

    async fn start(&mut self) -> Result<EngineSnapshot> {
        if self.phase != EnginePhase::Idle {
            return Err(Error::Validation(format!(
                "engine for run {} has already started",
                self.run_id
            )));
        }
        let run = self.sync.get_run().await?;
        let run = match run.status {
            RunStatus::Created => self.sync.start_run().await?,
            RunStatus::Active => {
                info!(run_id = %self.run_id, "resuming active run");
                run
            }
            RunStatus::Completed => {
                return Err(Error::Validation(format!(
                    "run {} is already completed",
                    self.run_id
                )))
            }
        };

        self.ledger.merge(run.messages_by_threshold());
        self.phase = EnginePhase::Running;
        self.started_at = Some(Instant::now());
        info!(
            run_id = %self.run_id,
            target_km = run.target_km,
            messages = self.ledger.len(),
            policy = ?self.ledger.policy(),
            "delivery started"
        );
        Ok(self.publish())
    }

    async fn stop(&mut self, inbox: &mut Inbox) -> Result<EngineSummary> {
        match self.phase {
            EnginePhase::Idle => {
                return Err(Error::Validation(format!(
                    "engine for run {} was never started",
                    self.run_id
                )))
            }
            EnginePhase::Stopped => {
                return Err(Error::Validation(format!(
                    "engine for run {} has already stopped",
                    self.run_id
                )))
            }
            EnginePhase::Running => {
                let duration_secs = self
                    .started_at
                    .map(|t| t.elapsed().as_secs())
                    .unwrap_or_default();
                self.completion = Some((self.accumulator.total_km(), duration_secs));
                self.phase = EnginePhase::Stopping;
                self.publish();
                info!(run_id = %self.run_id, "stopping delivery");

                self.sequencer.finish();
                while let Some(event) = inbox.playback.recv().await {
                    self.on_playback(event);
                }
                self.settle_reports(&mut inbox.sync).await;
            }
            // Completion failed last time; only retry that
            EnginePhase::Stopping => {}
        }

        let (distance_km, duration_secs) = self.completion.unwrap_or_default();
        let run = match self.sync.complete_run(distance_km, duration_secs).await {
            Ok(run) => run,
            Err(e) => match self.already_completed(&e).await {
                Some(run) => run,
                None => {
                    warn!(run_id = %self.run_id, error = %e, "run completion failed");
                    self.last_sync_error = Some(e.to_string());
                    self.publish();
                    return Err(e);
                }
            },
        };

        self.phase = EnginePhase::Stopped;
        self.now_playing = None;
        self.publish();
        info!(
            run_id = %self.run_id,
            distance_km = run.distance_km,
            duration_secs = run.duration_secs,
            played = self.ledger.played_count(),
            "run completed"
        );

        let mut unconfirmed = self.ledger.pending_reports();
        unconfirmed.extend(self.ledger.failed_reports());
        Ok(EngineSummary {
            run,
            playback: std::mem::take(&mut self.playback),
            unconfirmed_reports: unconfirmed,
        })
    }

    /// A completion whose response was lost may still have landed
    async fn already_completed(&self, error: &Error) -> Option<Run> {
        if !error.is_validation() && !error.is_retryable() {
            return None;
        }
        match self.sync.get_run().await {
            Ok(run) if run.status.is_completed() => Some(run),
            _ => None,
        }
    }

    /// Wait, bounded by the request timeout, for played reports in flight
    async fn settle_reports(&mut self, sync: &mut mpsc::UnboundedReceiver<SyncEvent>) {
        let deadline = Instant::now() + self.config.request_timeout();
        while !self.reports_in_flight.is_empty() {
            match tokio::time::timeout_at(deadline, sync.recv()).await {
                Ok(Some(event)) => self.on_sync(event),
                Ok(None) | Err(_) => break,
            }
        }
        if !self.reports_in_flight.is_empty() {
            warn!(
                run_id = %self.run_id,
                pending = self.reports_in_flight.len(),
                "abandoning unacknowledged played reports"
            );
        }
    }

    /// The handle is gone: nobody can stop us, so wind down without
    /// completing the run
    fn abandon(&mut self) {
        if self.phase.is_running() {
            warn!(run_id = %self.run_id, "engine handle dropped while running; run left active");
        }
        self.sequencer.finish();
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    fn on_sample(&mut self, sample: PositionSample) {
        if !self.phase.is_running() {
            debug!(run_id = %self.run_id, "sample ignored; engine not running");
            return;
        }
        let had_fault = self.accumulator.fault().is_some();
        let verdict = self.accumulator.evaluate(&sample);
        debug!(
            ?verdict,
            accuracy_m = sample.horizontal_accuracy_m,
            distance_km = self.accumulator.total_km(),
            "sample"
        );
        if had_fault || matches!(verdict, SampleVerdict::Accepted { .. }) {
            self.publish();
        }
    }

    fn on_fault(&mut self, fault: SensorFault) {
        if fault.needs_user_action() {
            warn!(run_id = %self.run_id, %fault, "distance frozen until permission is restored");
        } else {
            info!(run_id = %self.run_id, %fault, "distance frozen until samples resume");
        }
        self.accumulator.suspend(fault);
        self.publish();
    }

    fn on_tick(&mut self) {
        let distance_km = self.accumulator.total_km();
        let batch = self.trigger.tick(distance_km, &mut self.ledger);
        if !batch.is_empty() {
            // Locked as pending; reported once playback is done with them
            self.queued += batch.len();
            self.sequencer.enqueue(batch);
        }
        self.publish();
    }

    fn on_refresh_tick(&mut self) {
        if self.refresh_in_flight {
            debug!(run_id = %self.run_id, "refresh still in flight; skipping");
            return;
        }
        self.refresh_in_flight = true;
        self.sync.refresh();
    }

    fn on_playback(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::Started(id) => {
                self.now_playing = self.ledger.get(&id).map(|entry| NowPlaying {
                    id,
                    sender: entry.message.sender.clone(),
                });
            }
            PlaybackEvent::Finished(report) => {
                if self
                    .now_playing
                    .as_ref()
                    .is_some_and(|playing| playing.id == report.message_id)
                {
                    self.now_playing = None;
                }
                self.queued = self.queued.saturating_sub(1);
                if report.outcome == PlaybackOutcome::Discarded {
                    // Never reached the runner: nothing to report
                    self.ledger.withdraw(&report.message_id);
                } else {
                    self.issue_report(report.message_id, 1, Duration::ZERO);
                }
                self.playback.push(report);
            }
        }
        self.publish();
    }

    fn on_sync(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Reported {
                message_id,
                attempt,
                result,
            } => {
                self.reports_in_flight.remove(&message_id);
                match result {
                    Ok(()) => {
                        self.rejected_reports.remove(&message_id);
                        self.ledger.confirm(&message_id);
                        debug!(run_id = %self.run_id, message_id = %message_id, "played report confirmed");
                    }
                    Err(e) => self.on_report_failed(message_id, attempt, e),
                }
            }
            SyncEvent::Refreshed(Ok(messages)) => {
                self.refresh_in_flight = false;
                self.last_sync_error = None;
                let merged = self.ledger.merge(messages);
                if merged.inserted > 0 {
                    info!(run_id = %self.run_id, new_messages = merged.inserted, "picked up new messages");
                }
                self.reissue_failed_reports();
            }
            SyncEvent::Refreshed(Err(e)) => {
                self.refresh_in_flight = false;
                warn!(run_id = %self.run_id, error = %e, "message refresh failed");
                self.last_sync_error = Some(e.to_string());
            }
        }
        self.publish();
    }

    fn on_report_failed(&mut self, message_id: MessageId, attempt: u32, error: Error) {
        warn!(
            run_id = %self.run_id,
            message_id = %message_id,
            attempt,
            error = %error,
            "played report failed"
        );
        self.last_sync_error = Some(error.to_string());
        if !self.ledger.report_failed(&message_id) {
            // Confirmed by a refresh while this report was in flight
            return;
        }
        if !error.is_retryable() {
            self.rejected_reports.insert(message_id);
            return;
        }
        let retry = self.ledger.policy() == ReportFailurePolicy::RetryWithoutReplay
            && self.phase.is_running()
            && attempt < self.config.max_report_attempts;
        if retry && self.ledger.retry_report(&message_id) {
            let delay = self.sync.retry_policy().delay_for(attempt);
            self.issue_report(message_id, attempt + 1, delay);
        }
    }

    /// Retry-without-replay: every refresh gives failed reports another go,
    /// except those the authority rejected outright
    fn reissue_failed_reports(&mut self) {
        if self.ledger.policy() != ReportFailurePolicy::RetryWithoutReplay
            || !self.phase.is_running()
        {
            return;
        }
        for id in self.ledger.failed_reports() {
            if self.reports_in_flight.contains(&id) || self.rejected_reports.contains(&id) {
                continue;
            }
            if self.ledger.retry_report(&id) {
                self.issue_report(id, 1, Duration::ZERO);
            }
        }
    }

    fn issue_report(&mut self, message_id: MessageId, attempt: u32, delay: Duration) {
        self.reports_in_flight.insert(message_id);
        self.sync.report_played(message_id, attempt, delay);
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    fn snapshot(&self) -> EngineSnapshot {
        let distance_km = self.accumulator.total_km();
        EngineSnapshot {
            run_id: self.run_id,
            phase: self.phase,
            distance_km,
            ticks: self.trigger.ticks(),
            upcoming: self
                .ledger
                .remaining()
                .map(|m| UpcomingMessage::new(m, distance_km))
                .collect(),
            now_playing: self.now_playing.clone(),
            queued: self.queued,
            played: self.ledger.played_count(),
            unconfirmed_reports: self.ledger.pending_reports().len()
                + self.ledger.failed_reports().len(),
            sensor_fault: self.accumulator.fault(),
            samples: self.accumulator.stats(),
            last_sync_error: self.last_sync_error.clone(),
        }
    }

    fn publish(&self) -> EngineSnapshot {
        let snapshot = self.snapshot();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }
}
