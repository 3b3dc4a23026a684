//! `cheerline simulate`: replay a track against an in-process authority
//!
//! Ticks and refreshes are driven by the track rather than the clock, so a
//! multi-kilometre run replays in well under a second and always triggers at
//! the same samples.

use std::sync::Arc;

use cheerline_authority::RunAuthority;
use cheerline_core::{NewRun, Result};
use cheerline_engine::{
    AudioOutput, BoxFuture, Engine, EngineSummary, LocalAuthorityClient, ManualTicks,
    PositionSample,
};
use tracing::info;

use crate::parse::{load_track, CliConfig, SimulateArgs};

/// Prints what would be heard instead of playing it
struct ConsoleOutput;

impl AudioOutput for ConsoleOutput {
    fn play_clip(&self, clip: Arc<Vec<u8>>) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            eprintln!("[audio] clip of {} bytes", clip.len());
            Ok(())
        })
    }

    fn speak<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            eprintln!("[speech] {}", text);
            Ok(())
        })
    }

    fn pause(&self) {
        eprintln!("[audio] paused");
    }

    fn resume(&self) {
        eprintln!("[audio] resumed");
    }
}

/// Run the simulation and return the completed run as pretty JSON
pub fn run(args: SimulateArgs, config: CliConfig) -> std::result::Result<String, String> {
    let track = load_track(&args.track)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("cannot start runtime: {}", e))?;
    let summary = runtime
        .block_on(replay(args, config, track))
        .map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())
}

async fn replay(
    args: SimulateArgs,
    config: CliConfig,
    track: Vec<PositionSample>,
) -> Result<EngineSummary> {
    let authority = Arc::new(RunAuthority::in_memory(config.authority));
    let run = authority.create_run(NewRun::new(args.title, args.target_km))?;
    let message_count = args.messages.len();
    for message in args.messages {
        authority.add_message(&run.id, message)?;
    }
    info!(
        run_id = %run.id,
        target_km = run.target_km,
        messages = message_count,
        samples = track.len(),
        "simulating run"
    );

    let mut engine_config = config.engine;
    if let Some(policy) = args.policy {
        engine_config.report_failure_policy = policy;
    }
    let client = Arc::new(LocalAuthorityClient::new(Arc::clone(&authority)));
    let (ticks, tick) = ManualTicks::channel();
    let (refreshes, refresh) = ManualTicks::channel();
    let handle = Engine::builder(run.id, client, Arc::new(ConsoleOutput))
        .config(engine_config)
        .tick_source(ticks)
        .refresh_source(refreshes)
        .spawn()?;
    handle.start().await?;

    let refresh_every = args.refresh_every.max(1) as u64;
    for (n, sample) in (1u64..).zip(track) {
        handle.push_sample(sample)?;
        tick.tick();
        // The sample is always handled before the tick that follows it
        handle.wait_for(|s| s.ticks >= n).await?;
        if n % refresh_every == 0 {
            refresh.tick();
        }
    }

    handle.wait_for(|s| s.queued == 0).await?;
    let summary = handle.stop().await?;
    info!(
        run_id = %run.id,
        distance_km = summary.run.distance_km,
        played = summary.playback.len(),
        "simulation finished"
    );
    Ok(summary)
}
