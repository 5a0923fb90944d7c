//! One-second tick source.
//!
//! Each [`Ticker::start`] aborts the previous tick task and begins a new
//! generation. Ticks carry their generation so the receiver can drop ticks
//! that were already queued when the stream was replaced.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::trace;

pub const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Owns the single active tick stream.
#[derive(Debug)]
pub struct Ticker {
    tx: mpsc::UnboundedSender<u64>,
    period: Duration,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl Ticker {
    pub fn new(tx: mpsc::UnboundedSender<u64>) -> Self {
        Self::with_period(tx, TICK_PERIOD)
    }

    pub fn with_period(tx: mpsc::UnboundedSender<u64>, period: Duration) -> Self {
        Self {
            tx,
            period,
            generation: 0,
            task: None,
        }
    }

    /// Generation of the most recently started stream.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Replaces any running stream with a fresh one; the first tick arrives
    /// one period from now. Must be called within a tokio runtime.
    pub fn start(&mut self) -> u64 {
        self.stop();
        self.generation += 1;

        let generation = self.generation;
        let tx = self.tx.clone();
        let period = self.period;
        self.task = Some(tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                trace!(generation, "tick");
                if tx.send(generation).is_err() {
                    break;
                }
            }
        }));
        generation
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop();
    }
}
