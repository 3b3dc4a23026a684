//! ArgMatches → simulation settings.
//!
//! Everything the simulation needs is resolved here, before the runtime
//! starts: the config file, the messages and the track.

use std::path::Path;

use clap::ArgMatches;
use cheerline_authority::AuthorityConfig;
use cheerline_core::NewMessage;
use cheerline_engine::{EngineConfig, PositionSample, ReportFailurePolicy};
use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;

/// Contents of `--config`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub log_level: Option<String>,
    /// Delivery engine settings
    pub engine: EngineConfig,
    /// In-process authority settings
    pub authority: AuthorityConfig,
}

impl CliConfig {
    /// Parse and validate a config document
    pub fn from_toml_str(s: &str) -> Result<Self, String> {
        let config: CliConfig = toml::from_str(s).map_err(|e| format!("invalid config: {}", e))?;
        config.engine.validate().map_err(|e| e.to_string())?;
        config.authority.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }

    /// Read `--config` if given, defaults otherwise
    pub fn load(path: Option<&String>) -> Result<Self, String> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read config {}: {}", path, e))?;
                Self::from_toml_str(&text)
            }
            None => Ok(Self::default()),
        }
    }

    /// Log level: `--verbose` wins, then the config, then warnings only
    pub fn level(&self, verbose: bool) -> Result<LevelFilter, String> {
        if verbose {
            return Ok(LevelFilter::DEBUG);
        }
        match &self.log_level {
            Some(level) => level
                .parse()
                .map_err(|_| format!("unknown log_level {:?}", level)),
            None => Ok(LevelFilter::WARN),
        }
    }
}

/// Where samples come from
#[derive(Debug, Clone, PartialEq)]
pub enum TrackSource {
    /// Samples read from a JSON file
    File(String),
    /// Straight line due north
    Synthetic {
        /// Length in km
        km: f64,
        /// Sample spacing in meters
        step_m: f64,
    },
}

/// Parsed `simulate` arguments
#[derive(Debug, Clone)]
pub struct SimulateArgs {
    pub title: String,
    pub target_km: f64,
    pub messages: Vec<NewMessage>,
    pub track: TrackSource,
    pub policy: Option<ReportFailurePolicy>,
    pub refresh_every: usize,
}

/// Convert the `simulate` subcommand matches
pub fn parse_simulate(matches: &ArgMatches) -> Result<SimulateArgs, String> {
    let title = matches
        .get_one::<String>("title")
        .cloned()
        .unwrap_or_default();
    let target_km = parse_number("--target", required(matches, "target")?)?;

    let messages = matches
        .get_many::<String>("message")
        .map(|values| values.map(|v| parse_message(v)).collect::<Result<Vec<_>, _>>())
        .transpose()?
        .unwrap_or_default();

    let step_m = parse_number("--step-m", required(matches, "step-m")?)?;
    if step_m <= 0.0 {
        return Err("--step-m must be positive".into());
    }
    let track = match (
        matches.get_one::<String>("track"),
        matches.get_one::<String>("synthetic-km"),
    ) {
        (Some(path), _) => TrackSource::File(path.clone()),
        (None, Some(km)) => TrackSource::Synthetic {
            km: parse_number("--synthetic-km", km)?,
            step_m,
        },
        (None, None) => TrackSource::Synthetic {
            km: target_km,
            step_m,
        },
    };

    let policy = match matches.get_one::<String>("policy").map(String::as_str) {
        Some("replay") => Some(ReportFailurePolicy::Replay),
        Some("retry") => Some(ReportFailurePolicy::RetryWithoutReplay),
        Some(other) => return Err(format!("unknown policy {:?}", other)),
        None => None,
    };

    let refresh_every = required(matches, "refresh-every")?
        .parse::<usize>()
        .map_err(|_| "--refresh-every must be a whole number".to_string())?
        .max(1);

    Ok(SimulateArgs {
        title,
        target_km,
        messages,
        track,
        policy,
        refresh_every,
    })
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a String, String> {
    matches
        .get_one::<String>(id)
        .ok_or_else(|| format!("missing --{}", id))
}

fn parse_number(flag: &str, value: &str) -> Result<f64, String> {
    let n: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("{} expects a number, got {:?}", flag, value))?;
    if !n.is_finite() || n < 0.0 {
        return Err(format!("{} must be a non-negative number", flag));
    }
    Ok(n)
}

/// `KM:SENDER[:TEXT]`. Without text, a default cheer is used.
pub fn parse_message(arg: &str) -> Result<NewMessage, String> {
    let mut parts = arg.splitn(3, ':');
    let km = parts.next().unwrap_or_default();
    let sender = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("message {:?} needs KM:SENDER[:TEXT]", arg))?;
    let threshold_km = parse_number("--message", km)?;
    let text = match parts.next().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("{} is cheering for you!", sender),
    };
    Ok(NewMessage::text(threshold_km, sender, text))
}

/// Materialize the samples for a track
pub fn load_track(source: &TrackSource) -> Result<Vec<PositionSample>, String> {
    match source {
        TrackSource::File(path) => read_track_file(Path::new(path)),
        TrackSource::Synthetic { km, step_m } => Ok(synthetic_track(*km, *step_m)),
    }
}

fn read_track_file(path: &Path) -> Result<Vec<PositionSample>, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read track {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("invalid track {}: {}", path.display(), e))
}

/// Straight track due north from a fixed origin, `step_m` apart
pub fn synthetic_track(km: f64, step_m: f64) -> Vec<PositionSample> {
    let steps = ((km * 1000.0) / step_m).ceil() as usize;
    let mut sample = PositionSample::new(52.3676, 4.9041, 5.0);
    let mut track = Vec::with_capacity(steps + 1);
    track.push(sample);
    for _ in 0..steps {
        sample = sample.step_north(step_m);
        track.push(sample);
    }
    track
}
