//! Progress reporting for the temporal phase (feature `progress`).
//!
//! [`GroupProgress`] drives an [indicatif](https://docs.rs/indicatif) bar whose length is the
//! number of spatial fragments to merge. Bin groups are cheap, so the message is refreshed only
//! every [`REFRESH_GROUPS`] groups with the smoothed time per refresh window measured by
//! [`IterTimer`].
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

/// Groups between two message refreshes.
pub const REFRESH_GROUPS: u64 = 4096;

/// Exponential moving average of the time between two [`tick`](IterTimer::tick)s:
/// `ema ← α·dt + (1 − α)·ema`, initialized with the first sample.
#[derive(Debug, Clone)]
pub struct IterTimer {
    last: Instant,
    ema_ns: f64,
    alpha: f64,
    count: u64,
}

impl IterTimer {
    pub fn new(alpha: f64) -> Self {
        IterTimer {
            last: Instant::now(),
            ema_ns: 0.0,
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            count: 0,
        }
    }

    /// Record an iteration boundary and return the time since the previous one.
    #[inline]
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let dt = now.duration_since(self.last);
        self.last = now;
        self.count += 1;

        let dt_ns = dt.as_nanos() as f64;
        self.ema_ns = if self.count == 1 {
            dt_ns
        } else {
            self.alpha * dt_ns + (1.0 - self.alpha) * self.ema_ns
        };
        dt
    }

    #[inline]
    pub fn avg(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.ema_ns as u64)
        }
    }
}

/// `253µs`, `42ms` or `3.14s` depending on the scale.
pub fn fmt_dur(d: Duration) -> String {
    let us = d.as_micros();
    if us < 1_000 {
        format!("{us}µs")
    } else if us < 1_000_000 {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.2}s", d.as_secs_f32())
    }
}

/// Bar over the fragments merged by the temporal phase. Cleared on drop.
pub(crate) struct GroupProgress {
    bar: ProgressBar,
    timer: IterTimer,
    groups: u64,
}

impl GroupProgress {
    pub(crate) fn new(total_fragments: u64) -> Self {
        let bar = ProgressBar::new(total_fragments.max(1));
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} fragments ({percent:>3}%) | ETA {eta_precise} | {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(200));
        GroupProgress {
            bar,
            timer: IterTimer::new(0.2),
            groups: 0,
        }
    }

    pub(crate) fn advance(&mut self, fragments: usize) {
        self.groups += 1;
        self.bar.inc(fragments as u64);
        if self.groups % REFRESH_GROUPS == 0 {
            let last = self.timer.tick();
            self.bar.set_message(format!(
                "{} bins | last {REFRESH_GROUPS}: {}, avg: {}",
                self.groups,
                fmt_dur(last),
                fmt_dur(self.timer.avg())
            ));
        }
    }
}

impl Drop for GroupProgress {
    fn drop(&mut self) {
        self.bar.disable_steady_tick();
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod progress_bar_test {
    use super::*;

    #[test]
    fn test_fmt_dur() {
        assert_eq!(fmt_dur(Duration::from_micros(253)), "253µs");
        assert_eq!(fmt_dur(Duration::from_millis(42)), "42ms");
        assert_eq!(fmt_dur(Duration::from_millis(3140)), "3.14s");
    }

    #[test]
    fn test_iter_timer() {
        let mut timer = IterTimer::new(0.5);
        assert_eq!(timer.avg(), Duration::ZERO);
        let first = timer.tick();
        assert_eq!(timer.avg(), Duration::from_nanos(first.as_nanos() as u64));
        std::thread::sleep(Duration::from_millis(2));
        let second = timer.tick();
        assert!(second >= Duration::from_millis(2));
        assert!(timer.avg() >= second / 2);
    }
}
