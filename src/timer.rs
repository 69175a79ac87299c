//! Performance measurement tools.

use std::{
    fmt, mem,
    sync::Mutex,
    time::{Duration, Instant},
};

use itertools::Itertools;

/// Weight of the newest measurement in the moving average.
const EMA_ALPHA: f32 = 0.3;

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// The current exponential moving average, `None` until the first measurement.
    avg: Option<f32>,
    /// The number of time measurements that contributed to the current `avg`.
    count: usize,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::default()),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is measured and recorded.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn stop(&self, start: Instant) {
        let secs = start.elapsed().as_secs_f32();
        let mut state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        state.avg = Some(match state.avg {
            Some(avg) => EMA_ALPHA * secs + (1.0 - EMA_ALPHA) * avg,
            None => secs,
        });
        state.count += 1;
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        let State { avg, count } = mem::take(&mut *state);
        let avg_ms = avg.unwrap_or(0.0) * 1000.0;

        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Logs frames per second with optional extra data.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1 and logs FPS and `extra` data if one second has passed.
    ///
    /// `extra` is only formatted when a log line is actually emitted.
    pub fn tick_with<D: fmt::Display, I: IntoIterator<Item = D>>(&mut self, extra: I) {
        self.frames += 1;
        if self.start.elapsed() > Duration::from_secs(1) {
            let mut extra = extra.into_iter().peekable();
            if extra.peek().is_some() {
                log::debug!(
                    "{}: {} FPS ({})",
                    self.name,
                    self.frames,
                    extra.format(", ")
                );
            } else {
                log::debug!("{}: {} FPS", self.name, self.frames);
            }

            self.frames = 0;
            self.start = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resets_measurements() {
        let timer = Timer::new("work");
        timer.time(|| ());
        timer.time(|| ());

        let first = timer.to_string();
        assert!(first.starts_with("work: 2x"), "{first}");
        assert_eq!(timer.to_string(), "work: 0x0.0ms");
    }

    #[test]
    fn guard_records_on_drop() {
        let timer = Timer::new("guard");
        {
            let _guard = timer.start();
        }
        assert!(timer.to_string().starts_with("guard: 1x"));
    }
}
