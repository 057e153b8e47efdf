//! Episode clocks and tick pacing.

use std::time::{Duration, Instant};

/// Two clocks of an episode. `time` always runs, `planner_time` stands still while the
/// episode is within its start pause (the first `start_pause` seconds after a goal was set).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpisodeClock {
    pub time: f64,
    pub planner_time: f64,
    pub goal_set_time: f64,
    pub reset_time: f64,
    pub start_pause: f64,
}

impl EpisodeClock {
    pub fn reset(&mut self, now: f64) {
        self.time = now;
        self.reset_time = now;
    }

    /// Start timing a new goal. Advances the clock once (as setting the goal takes time),
    /// then restarts the planner clock from zero.
    pub fn start_goal(&mut self, start_pause: f64, dt: f64) {
        self.start_pause = start_pause;
        self.goal_set_time = self.time;
        let paused = self.in_start_pause();
        self.advance(dt, paused);
        self.planner_time = 0.0;
    }

    pub fn in_start_pause(&self) -> bool {
        (self.time - self.goal_set_time) < self.start_pause
    }

    /// Advance by `dt`. The planner clock does not move if `paused`.
    pub fn advance(&mut self, dt: f64, paused: bool) -> f64 {
        self.time += dt;
        if !paused {
            self.planner_time += dt;
        }
        dt
    }

    /// Seconds since the episode was reset.
    pub fn episode_time(&self) -> f64 {
        self.time - self.reset_time
    }
}

/// Keeps a loop at a fixed frequency: [`Rate::sleep`] blocks until one period has passed
/// since the end of the previous sleep.
#[derive(Debug, Clone)]
pub struct Rate {
    period: Duration,
    last: Instant,
}

impl Rate {
    pub fn new(hz: f64) -> Self {
        Rate {
            period: Duration::from_secs_f64(1.0 / hz),
            last: Instant::now(),
        }
    }

    /// Expected duration of one cycle, seconds.
    pub fn cycle_time(&self) -> f64 {
        self.period.as_secs_f64()
    }

    pub fn sleep(&mut self) {
        let target = self.last + self.period;
        let now = Instant::now();
        if target > now {
            std::thread::sleep(target - now);
            self.last = target;
        } else {
            // Behind schedule: do not try to catch up.
            self.last = now;
        }
    }
}

/// Number of control ticks that fit into one execution period, at least one.
pub fn action_repeat(execution_period: f64, tick_period: f64) -> usize {
    if tick_period <= 0.0 {
        return 1;
    }
    ((execution_period / tick_period).round() as usize).max(1)
}
