//! Main entry point for Cheerline.
//!
//! [`Cheerline`] wires an in-process [`RunAuthority`] to the delivery
//! engine through a [`LocalAuthorityClient`], so a whole system (supporters
//! leaving messages, a runner hearing them) can be driven from one process.

use std::sync::Arc;
use std::time::Duration;

use cheerline_authority::{
    spawn_reaper, AuthorityConfig, Clock, ReaperHandle, RunAuthority, SystemClock,
};
use cheerline_core::RunId;
use cheerline_engine::{AudioOutput, AuthorityClient, EngineBuilder, EngineConfig, LocalAuthorityClient};

/// An authority and the client the engine uses to reach it.
///
/// # Example
///
/// ```ignore
/// use cheerline::prelude::*;
///
/// let cheerline = Cheerline::in_memory();
/// let run = cheerline.authority().create_run(NewRun::new("Sunday long run", 21.1))?;
/// cheerline
///     .authority()
///     .add_message(&run.id, NewMessage::text(10.0, "Alex", "Halfway!"))?;
///
/// let engine = cheerline.engine(run.id, Arc::new(RecordingOutput::new())).spawn()?;
/// engine.start().await?;
/// ```
pub struct Cheerline {
    authority: Arc<RunAuthority>,
    client: Arc<dyn AuthorityClient>,
    engine_config: EngineConfig,
}

impl Cheerline {
    /// Default configuration, in-memory stores and the wall clock
    pub fn in_memory() -> Self {
        Self::builder().build()
    }

    /// Create a builder
    pub fn builder() -> CheerlineBuilder {
        CheerlineBuilder::new()
    }

    /// The authority, for supporter-side calls
    pub fn authority(&self) -> &Arc<RunAuthority> {
        &self.authority
    }

    /// The client engines use
    pub fn client(&self) -> Arc<dyn AuthorityClient> {
        Arc::clone(&self.client)
    }

    /// Engine builder for `run_id`, preconfigured with this instance's
    /// client and engine configuration
    pub fn engine(&self, run_id: RunId, output: Arc<dyn AudioOutput>) -> EngineBuilder {
        EngineBuilder::new(run_id, self.client(), output).config(self.engine_config.clone())
    }

    /// Start sweeping expired runs every `interval`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_reaper(&self, interval: Duration) -> ReaperHandle {
        spawn_reaper(Arc::clone(&self.authority), interval)
    }
}

/// Builder for [`Cheerline`]
///
/// ```ignore
/// let cheerline = Cheerline::builder()
///     .authority_config(AuthorityConfig::default().with_run_ttl_secs(3600))
///     .latency(Duration::from_millis(20))
///     .build();
/// ```
pub struct CheerlineBuilder {
    authority_config: AuthorityConfig,
    engine_config: EngineConfig,
    clock: Arc<dyn Clock>,
    latency: Option<Duration>,
}

impl CheerlineBuilder {
    /// Defaults everywhere
    pub fn new() -> Self {
        Self {
            authority_config: AuthorityConfig::default(),
            engine_config: EngineConfig::default(),
            clock: Arc::new(SystemClock),
            latency: None,
        }
    }

    /// Authority configuration
    pub fn authority_config(mut self, config: AuthorityConfig) -> Self {
        self.authority_config = config;
        self
    }

    /// Configuration handed to every engine built via [`Cheerline::engine`]
    pub fn engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Clock used for creation timestamps and expiry
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Simulated network latency on every client call
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Build the instance
    pub fn build(self) -> Cheerline {
        let authority = Arc::new(RunAuthority::in_memory_with_clock(
            self.authority_config,
            self.clock,
        ));
        let mut client = LocalAuthorityClient::new(Arc::clone(&authority));
        if let Some(latency) = self.latency {
            client = client.with_latency(latency);
        }
        Cheerline {
            authority,
            client: Arc::new(client),
            engine_config: self.engine_config,
        }
    }
}

impl Default for CheerlineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
