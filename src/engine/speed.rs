//! Throughput and ETA estimation for in-flight runs.
//!
//! Speed is a simple moving average of completions over a trailing window.
//! Young runs (elapsed shorter than the window) report the overall average
//! since start so early polls see a usable number.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Speedometer {
    window: Duration,
    started: Instant,
    samples: VecDeque<Instant>,
    total: usize,
}

impl Speedometer {
    pub fn new(window: Duration, started: Instant) -> Self {
        Self {
            window,
            started,
            samples: VecDeque::new(),
            total: 0,
        }
    }

    /// Record one completed stock at `at`. Samples older than the trailing
    /// window are dropped here; `total` keeps the lifetime count.
    pub fn record(&mut self, at: Instant) {
        self.total += 1;
        self.samples.push_back(at);
        while let Some(&front) = self.samples.front() {
            if at.duration_since(front) > self.window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Stocks per second as observed at `now`. Zero until the first
    /// completion; zero again if the run stalls past the whole window.
    pub fn speed(&self, now: Instant) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let elapsed = now.duration_since(self.started).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }

        let window_secs = self.window.as_secs_f64();
        if elapsed < window_secs {
            return self.total as f64 / elapsed;
        }

        let in_window = self
            .samples
            .iter()
            .filter(|&&at| now.duration_since(at) <= self.window)
            .count();
        in_window as f64 / window_secs
    }

    /// Seconds until `remaining` stocks finish at the current speed.
    /// `None` while the speed is zero or unmeasurable.
    pub fn eta_seconds(&self, now: Instant, remaining: usize) -> Option<u64> {
        if remaining == 0 {
            return Some(0);
        }
        let speed = self.speed(now);
        if speed <= 0.0 {
            return None;
        }
        Some((remaining as f64 / speed).round() as u64)
    }

    /// Lifetime average in stocks per second over `elapsed`.
    pub fn overall_average(&self, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.started).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.total as f64 / elapsed
    }
}
