//! Stage timing and frame rate logging.
//!
//! Each pipeline stage owns a [`Timer`]. The main loop hands all of them to an [`FpsCounter`],
//! which logs the frame rate and the smoothed stage timings about once per second.

use std::{
    fmt, mem,
    sync::Mutex,
    time::{Duration, Instant},
};

use itertools::Itertools;

/// Weight of the newest measurement in the exponential moving average.
const EMA_ALPHA: f32 = 0.3;

const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Measures how long an operation takes, smoothed over repeated runs.
///
/// Formatting a timer with `{}` prints and resets the collected statistics.
pub struct Timer {
    name: &'static str,
    stats: Mutex<Stats>,
}

#[derive(Default)]
struct Stats {
    /// Smoothed duration in seconds, [`None`] until the first measurement.
    avg: Option<f32>,
    runs: usize,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stats: Mutex::new(Stats::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Runs `f` and records its duration.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        f()
    }

    /// Starts a measurement that ends when the returned guard is dropped.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn record(&self, elapsed: Duration) {
        let secs = elapsed.as_secs_f32();
        let mut stats = self.stats.lock().unwrap_or_else(|poison| poison.into_inner());
        stats.avg = Some(match stats.avg {
            Some(avg) => avg + EMA_ALPHA * (secs - avg),
            None => secs,
        });
        stats.runs += 1;
    }
}

impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Stats { avg, runs } = {
            let mut stats = self.stats.lock().unwrap_or_else(|poison| poison.into_inner());
            mem::take(&mut *stats)
        };
        let ms = avg.unwrap_or(0.0) * 1000.0;
        write!(f, "{}: {runs}x{ms:.1}ms", self.name)
    }
}

/// Ends a [`Timer`] measurement when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Counts frames and periodically logs the frame rate at *debug* level.
pub struct FpsCounter {
    name: String,
    frames: u32,
    since: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            since: Instant::now(),
        }
    }

    /// Counts a frame, and appends `stats` to the log line when one is due.
    ///
    /// `stats` is only formatted when a line is logged, so passing [`Timer`]s resets them once per
    /// report.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, stats: I) {
        self.frames += 1;
        if self.since.elapsed() < REPORT_INTERVAL {
            return;
        }

        let stats = stats.into_iter().join(", ");
        if stats.is_empty() {
            log::debug!("{}: {} FPS", self.name, self.frames);
        } else {
            log::debug!("{}: {} FPS ({})", self.name, self.frames, stats);
        }

        self.frames = 0;
        self.since = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resets_stats() {
        let timer = Timer::new("classify");
        timer.time(|| ());
        {
            let _guard = timer.start();
        }
        let first = timer.to_string();
        assert!(first.starts_with("classify: 2x"), "{first}");
        assert_eq!(timer.to_string(), "classify: 0x0.0ms");
    }

    #[test]
    fn stats_only_consumed_when_reporting() {
        let timer = Timer::new("detect");
        timer.time(|| ());

        let mut fps = FpsCounter::new("test");
        fps.tick_with([&timer]);
        assert!(timer.to_string().starts_with("detect: 1x"));
    }
}
