//! Tick sources
//!
//! The control loop never sleeps on its own; it waits on a [`TickSource`].
//! Production uses [`IntervalTicks`]; tests drive [`ManualTicks`] by hand so
//! trigger evaluation happens exactly when the test says so.

use std::future::poll_fn;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// A stream of ticks
pub trait TickSource: Send {
    /// Poll for the next tick. `Ready(None)` means the source is exhausted
    /// and will never tick again.
    fn poll_tick(&mut self, cx: &mut Context<'_>) -> Poll<Option<()>>;
}

/// Wait for the next tick
pub async fn next_tick(source: &mut (dyn TickSource + '_)) -> Option<()> {
    poll_fn(|cx| source.poll_tick(cx)).await
}

/// Fixed-period ticks on the tokio timer
#[derive(Debug)]
pub struct IntervalTicks {
    interval: Interval,
}

impl IntervalTicks {
    /// First tick one full period from now. Missed ticks are skipped rather
    /// than bursted.
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }
}

impl TickSource for IntervalTicks {
    fn poll_tick(&mut self, cx: &mut Context<'_>) -> Poll<Option<()>> {
        self.interval.poll_tick(cx).map(|_| Some(()))
    }
}

/// Ticks fired through a [`ManualTickTrigger`]
#[derive(Debug)]
pub struct ManualTicks {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Fires ticks into a [`ManualTicks`]
#[derive(Debug, Clone)]
pub struct ManualTickTrigger {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualTicks {
    /// Create a source and its trigger. Dropping every trigger exhausts the
    /// source.
    pub fn channel() -> (ManualTicks, ManualTickTrigger) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ManualTicks { rx }, ManualTickTrigger { tx })
    }
}

impl TickSource for ManualTicks {
    fn poll_tick(&mut self, cx: &mut Context<'_>) -> Poll<Option<()>> {
        self.rx.poll_recv(cx)
    }
}

impl ManualTickTrigger {
    /// Fire one tick. Returns `false` if the source is gone.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}
