//! Countdown timer for timed attempts.
//!
//! The timer is a pure state machine: something external (the session flow's
//! one-second interval) calls [`CountdownTimer::tick`] and reacts to the
//! returned event. Keeping the clocking outside makes the threshold and
//! expiry behavior fully deterministic in tests.

use std::fmt;

/// Remaining-time boundaries that trigger one-time UI events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerThresholds {
    pub warning_secs: u32,
    pub danger_secs: u32,
}

impl Default for TimerThresholds {
    fn default() -> Self {
        Self {
            warning_secs: 300,
            danger_secs: 60,
        }
    }
}

/// Events emitted by [`CountdownTimer::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    /// Remaining time crossed the warning threshold. Fires at most once.
    Warning,
    /// Remaining time crossed the danger threshold. Fires at most once and
    /// takes precedence over `Warning` when both apply on the same tick.
    Danger,
    /// Remaining time reached zero. Fires exactly once; the timer stops
    /// itself afterwards.
    TimeUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Paused,
    Finished,
}

/// Single countdown ticking once per second, independent of the session it
/// times. Remaining time never goes negative.
#[derive(Debug, Clone)]
pub struct CountdownTimer {
    total_secs: u32,
    remaining_secs: u32,
    phase: Phase,
    thresholds: TimerThresholds,
    warning_fired: bool,
    danger_fired: bool,
}

impl CountdownTimer {
    #[must_use]
    pub fn new(total_secs: u32) -> Self {
        Self::with_thresholds(total_secs, TimerThresholds::default())
    }

    #[must_use]
    pub fn with_thresholds(total_secs: u32, thresholds: TimerThresholds) -> Self {
        Self {
            total_secs,
            remaining_secs: total_secs,
            phase: Phase::Running,
            thresholds,
            warning_fired: false,
            danger_fired: false,
        }
    }

    /// Resume a countdown with part of the time already spent, as after a
    /// page reload restores a persisted attempt.
    #[must_use]
    pub fn resumed(total_secs: u32, elapsed_secs: u32) -> Self {
        let mut timer = Self::new(total_secs);
        timer.remaining_secs = total_secs.saturating_sub(elapsed_secs);
        // Thresholds already crossed before the reload must not re-fire.
        timer.warning_fired = timer.remaining_secs <= timer.thresholds.warning_secs;
        timer.danger_fired = timer.remaining_secs <= timer.thresholds.danger_secs;
        timer
    }

    #[must_use]
    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> u32 {
        self.total_secs - self.remaining_secs
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Advance the countdown by one second.
    ///
    /// Returns the event crossed by this tick, if any. Ticks are ignored
    /// while paused or after the countdown has finished.
    pub fn tick(&mut self) -> Option<TimerEvent> {
        if self.phase != Phase::Running {
            return None;
        }

        self.remaining_secs = self.remaining_secs.saturating_sub(1);

        if self.remaining_secs == 0 {
            self.phase = Phase::Finished;
            return Some(TimerEvent::TimeUp);
        }

        if self.remaining_secs <= self.thresholds.danger_secs && !self.danger_fired {
            self.danger_fired = true;
            // Danger supersedes warning; never emit the milder event later.
            self.warning_fired = true;
            return Some(TimerEvent::Danger);
        }

        if self.remaining_secs <= self.thresholds.warning_secs && !self.warning_fired {
            self.warning_fired = true;
            return Some(TimerEvent::Warning);
        }

        None
    }

    /// Suspend ticking without resetting elapsed accounting.
    pub fn pause(&mut self) {
        if self.phase == Phase::Running {
            self.phase = Phase::Paused;
        }
    }

    /// Resume a paused countdown.
    pub fn resume(&mut self) {
        if self.phase == Phase::Paused {
            self.phase = Phase::Running;
        }
    }

    /// Return to the initial duration and re-arm thresholds so they can fire
    /// again.
    pub fn reset(&mut self) {
        self.remaining_secs = self.total_secs;
        self.phase = Phase::Running;
        self.warning_fired = false;
        self.danger_fired = false;
    }

    /// Remaining time as `H:MM:SS` when hours are present, else `M:SS`.
    #[must_use]
    pub fn format_remaining(&self) -> String {
        let hours = self.remaining_secs / 3600;
        let minutes = (self.remaining_secs % 3600) / 60;
        let seconds = self.remaining_secs % 60;

        if hours > 0 {
            format!("{hours}:{minutes:02}:{seconds:02}")
        } else {
            format!("{minutes}:{seconds:02}")
        }
    }
}

impl fmt::Display for CountdownTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_remaining())
    }
}
