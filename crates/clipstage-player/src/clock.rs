//! Tick sources and the loop that drives a [`Player`] from one.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clipstage_core::{ClipstageError, ClipstageResult, Timestamp};

use crate::scheduler::{Player, TickReport};

/// Produces the target timestamp of each tick.
pub trait TickClock: Send {
    /// Block until the next tick is due. `None` ends playback.
    fn next_tick(&mut self) -> Option<Timestamp>;
}

/// Wall-clock ticks at a fixed rate, measured from the first call.
#[derive(Debug)]
pub struct FixedRateClock {
    interval: f64,
    start: Option<Instant>,
    next: u64,
}

impl FixedRateClock {
    pub fn new(fps: f64) -> ClipstageResult<Self> {
        if !(fps.is_finite() && fps > 0.0) {
            return Err(ClipstageError::InvalidArgument(format!("fps must be positive, got {}", fps)));
        }
        Ok(Self {
            interval: 1.0 / fps,
            start: None,
            next: 0,
        })
    }
}

impl TickClock for FixedRateClock {
    fn next_tick(&mut self) -> Option<Timestamp> {
        let start = *self.start.get_or_insert_with(Instant::now);
        let due = self.next as f64 * self.interval;
        let elapsed = start.elapsed().as_secs_f64();
        let target = if elapsed < due {
            std::thread::sleep(std::time::Duration::from_secs_f64(due - elapsed));
            due
        } else if elapsed - due < self.interval {
            due
        } else {
            elapsed
        };
        // a tick more than one slot late skips the slots it missed
        self.next = if target == due {
            self.next + 1
        } else {
            (target / self.interval).floor() as u64 + 1
        };
        Some(Timestamp::from_seconds(target))
    }
}

/// Scripted timestamps, returned without waiting.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    pending: VecDeque<Timestamp>,
}

impl ManualClock {
    pub fn new(ticks: impl IntoIterator<Item = Timestamp>) -> Self {
        Self {
            pending: ticks.into_iter().collect(),
        }
    }

    /// `count` ticks spaced `1/fps` apart, starting at `start`.
    pub fn at_rate(start: Timestamp, fps: f64, count: usize) -> Self {
        Self::new((0..count).map(|i| Timestamp::from_seconds(start.as_seconds() + i as f64 / fps)))
    }

    pub fn push(&mut self, at: Timestamp) {
        self.pending.push_back(at);
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl TickClock for ManualClock {
    fn next_tick(&mut self) -> Option<Timestamp> {
        self.pending.pop_front()
    }
}

/// Totals over a [`Driver::run`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    pub rendered: u64,
    pub stalls: u64,
    pub failed_submissions: u64,
    pub last: Option<TickReport>,
}

impl RunSummary {
    fn record(&mut self, report: TickReport) {
        self.ticks += 1;
        self.rendered += report.rendered as u64;
        self.stalls += report.stalled as u64;
        self.failed_submissions += report.failed as u64;
        self.last = Some(report);
    }
}

/// Issues ticks one after another until the clock runs out, a tick limit
/// is reached or the stop flag is raised.
#[derive(Debug, Clone, Default)]
pub struct Driver {
    max_ticks: Option<u64>,
    stop: Arc<AtomicBool>,
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Flag that ends the run before the next tick when set.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn run(&self, player: &mut Player, clock: &mut dyn TickClock) -> ClipstageResult<RunSummary> {
        let mut summary = RunSummary::default();
        while self.max_ticks.map_or(true, |max| summary.ticks < max) {
            if self.stop.load(Ordering::Relaxed) {
                tracing::info!("Stop requested after {} ticks", summary.ticks);
                break;
            }
            let Some(target) = clock.next_tick() else {
                break;
            };
            summary.record(player.tick(target)?);
        }
        tracing::info!(
            "Played {} ticks ({} rendered, {} stalls, {} failed submissions)",
            summary.ticks,
            summary.rendered,
            summary.stalls,
            summary.failed_submissions
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_at_rate() {
        let mut clock = ManualClock::at_rate(Timestamp::from_seconds(2.0), 4.0, 3);
        assert_eq!(clock.remaining(), 3);
        assert_eq!(clock.next_tick(), Some(Timestamp::from_seconds(2.0)));
        assert_eq!(clock.next_tick(), Some(Timestamp::from_seconds(2.25)));
        assert_eq!(clock.next_tick(), Some(Timestamp::from_seconds(2.5)));
        assert_eq!(clock.next_tick(), None);
    }

    #[test]
    fn test_fixed_rate_clock_is_monotonic() {
        let mut clock = FixedRateClock::new(500.0).unwrap();
        let a = clock.next_tick().unwrap();
        let b = clock.next_tick().unwrap();
        let c = clock.next_tick().unwrap();
        assert_eq!(a, Timestamp::zero());
        assert!(b.as_seconds() >= 0.002 - 1e-9);
        assert!(c > b);
    }

    #[test]
    fn test_fixed_rate_rejects_zero_fps() {
        assert!(FixedRateClock::new(0.0).is_err());
    }
}
