//! Delivery Integration Tests
//!
//! Drives a real engine against an in-process authority. Trigger and refresh
//! ticks are manual, so every test decides exactly when evaluation happens.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test delivery
//! cargo test --test delivery reporting::
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use cheerline::authority::{AuthorityConfig, RunAuthority};
use cheerline::engine::{
    AuthorityClient, BoxFuture, Engine, EngineConfig, EngineHandle, EngineSnapshot,
    LocalAuthorityClient, ManualTickTrigger, ManualTicks, PositionSample, RecordingOutput,
};
use cheerline::types::{
    AudioRef, Error, Message, MessageId, NewMessage, NewRun, Result, Run, RunId,
};
use parking_lot::Mutex;

pub mod refresh;
pub mod reporting;
pub mod sensor;
pub mod triggering;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Short backoff so retry paths finish in milliseconds
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 50,
        ..EngineConfig::default()
    }
}

/// Poll `condition` until it holds, failing after five seconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

#[derive(Default)]
struct Faults {
    reports: VecDeque<Error>,
    refreshes: VecDeque<Error>,
}

/// Local client that fails queued calls with injected errors
pub struct FlakyClient {
    inner: LocalAuthorityClient,
    faults: Mutex<Faults>,
    report_calls: Mutex<Vec<MessageId>>,
}

impl FlakyClient {
    pub fn new(authority: Arc<RunAuthority>) -> Self {
        Self {
            inner: LocalAuthorityClient::new(authority),
            faults: Mutex::new(Faults::default()),
            report_calls: Mutex::new(Vec::new()),
        }
    }

    /// The next mark-played calls fail with these errors, in order
    pub fn fail_reports(&self, errors: impl IntoIterator<Item = Error>) {
        self.faults.lock().reports.extend(errors);
    }

    /// The next list calls fail with these errors, in order
    pub fn fail_refreshes(&self, errors: impl IntoIterator<Item = Error>) {
        self.faults.lock().refreshes.extend(errors);
    }

    /// Every mark-played call, including failed ones
    pub fn report_calls(&self) -> Vec<MessageId> {
        self.report_calls.lock().clone()
    }
}

impl AuthorityClient for FlakyClient {
    fn create_run(&self, new: NewRun) -> BoxFuture<'_, Result<Run>> {
        self.inner.create_run(new)
    }

    fn get_run(&self, run_id: RunId) -> BoxFuture<'_, Result<Run>> {
        self.inner.get_run(run_id)
    }

    fn start_run(&self, run_id: RunId) -> BoxFuture<'_, Result<Run>> {
        self.inner.start_run(run_id)
    }

    fn complete_run(
        &self,
        run_id: RunId,
        distance_km: f64,
        duration_secs: u64,
    ) -> BoxFuture<'_, Result<Run>> {
        self.inner.complete_run(run_id, distance_km, duration_secs)
    }

    fn add_message(&self, run_id: RunId, new: NewMessage) -> BoxFuture<'_, Result<Message>> {
        self.inner.add_message(run_id, new)
    }

    fn list_messages(&self, run_id: RunId) -> BoxFuture<'_, Result<Vec<Message>>> {
        let injected = self.faults.lock().refreshes.pop_front();
        match injected {
            Some(e) => Box::pin(std::future::ready(Err(e))),
            None => self.inner.list_messages(run_id),
        }
    }

    fn mark_message_played(
        &self,
        run_id: RunId,
        message_id: MessageId,
    ) -> BoxFuture<'_, Result<Message>> {
        self.report_calls.lock().push(message_id);
        let injected = self.faults.lock().reports.pop_front();
        match injected {
            Some(e) => Box::pin(std::future::ready(Err(e))),
            None => self.inner.mark_message_played(run_id, message_id),
        }
    }

    fn upload_audio(&self, bytes: Vec<u8>) -> BoxFuture<'_, Result<AudioRef>> {
        self.inner.upload_audio(bytes)
    }

    fn fetch_audio(&self, locator: AudioRef) -> BoxFuture<'_, Result<Arc<Vec<u8>>>> {
        self.inner.fetch_audio(locator)
    }
}

/// A run, an engine over it, and manual control of its inputs
pub struct Harness {
    pub authority: Arc<RunAuthority>,
    pub client: Arc<FlakyClient>,
    pub output: Arc<RecordingOutput>,
    pub engine: EngineHandle,
    pub refresh: ManualTickTrigger,
    pub run_id: RunId,
    tick: ManualTickTrigger,
    ticks: u64,
    position: PositionSample,
}

impl Harness {
    /// Run with a 5 km target and default engine settings
    pub fn new() -> Self {
        Self::with(EngineConfig::default(), RecordingOutput::new())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with(config, RecordingOutput::new())
    }

    pub fn with(config: EngineConfig, output: RecordingOutput) -> Self {
        let authority = Arc::new(RunAuthority::in_memory(AuthorityConfig::default()));
        let run = authority
            .create_run(NewRun::new("Harness run", 5.0))
            .expect("create run");
        let client = Arc::new(FlakyClient::new(Arc::clone(&authority)));
        let output = Arc::new(output);
        let (ticks, tick) = ManualTicks::channel();
        let (refreshes, refresh) = ManualTicks::channel();
        let engine = Engine::builder(run.id, client.clone(), output.clone())
            .config(config)
            .tick_source(ticks)
            .refresh_source(refreshes)
            .spawn()
            .expect("spawn engine");
        Self {
            authority,
            client,
            output,
            engine,
            refresh,
            run_id: run.id,
            tick,
            ticks: 0,
            position: PositionSample::new(51.5074, -0.1278, 5.0),
        }
    }

    /// Supporter leaves a text message
    pub fn add_message(&self, threshold_km: f64, sender: &str, text: &str) -> MessageId {
        self.authority
            .add_message(&self.run_id, NewMessage::text(threshold_km, sender, text))
            .expect("add message")
            .id
    }

    /// Start the engine and anchor the track
    pub async fn start(&mut self) -> EngineSnapshot {
        let snapshot = self.engine.start().await.expect("start");
        self.engine.push_sample(self.position).expect("push anchor");
        self.tick_now().await;
        snapshot
    }

    /// Evaluate triggers once and wait until the engine has done so
    pub async fn tick_now(&mut self) -> EngineSnapshot {
        self.ticks += 1;
        let n = self.ticks;
        self.tick.tick();
        self.engine.wait_for(|s| s.ticks >= n).await.expect("tick")
    }

    /// Move north without evaluating triggers
    pub fn step_quiet(&mut self, meters: f64, accuracy_m: f64) {
        let mut next = self.position.step_north(meters);
        next.horizontal_accuracy_m = accuracy_m;
        self.position = next;
        self.engine.push_sample(next).expect("push sample");
    }

    /// Move north and evaluate triggers
    pub async fn step(&mut self, meters: f64) -> EngineSnapshot {
        self.step_quiet(meters, 5.0);
        self.tick_now().await
    }

    /// Walk in 10 m steps, ticking after each, until `km` is covered
    pub async fn run_to(&mut self, km: f64) -> EngineSnapshot {
        let mut snapshot = self.engine.snapshot();
        while snapshot.distance_km < km {
            snapshot = self.step(10.0).await;
        }
        snapshot
    }

    /// Wait for playback to drain and every report to be acknowledged
    pub async fn settle(&self) -> EngineSnapshot {
        self.engine
            .wait_for(|s| s.queued == 0 && s.unconfirmed_reports == 0)
            .await
            .expect("settle")
    }

    /// The authority's view of one message
    pub fn remote(&self, id: MessageId) -> Message {
        self.authority
            .list_messages(&self.run_id)
            .expect("list")
            .into_iter()
            .find(|m| m.id == id)
            .expect("message exists")
    }
}
