//! Fade timing
//!
//! A fade cycle walks `FadeIn → Full → FadeOut → Hidden`. Phases are timed
//! against the instant their predecessor ended, so a late wake-up shortens
//! the following tick instead of stretching the whole cycle. Opacity is a
//! linear interpolation in whole milliseconds, rounded to nearest.

use std::time::{Duration, Instant};

/// Default animation tick
pub const DEFAULT_TICK: Duration = Duration::from_millis(25);

/// Opacity of a fully shown window
pub const MAX_ALPHA: u8 = 255;

/// Durations of one fade cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeTiming {
    pub fade_in: Duration,
    pub full: Duration,
    pub fade_out: Duration,
    /// Interval between opacity updates
    pub tick: Duration,
}

impl FadeTiming {
    pub fn from_millis(fade_in: u64, full: u64, fade_out: u64) -> Self {
        Self {
            fade_in: Duration::from_millis(fade_in),
            full: Duration::from_millis(full),
            fade_out: Duration::from_millis(fade_out),
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn total(&self) -> Duration {
        self.fade_in + self.full + self.fade_out
    }

    /// All phases empty: show at full opacity until replaced or hidden
    pub fn holds(&self) -> bool {
        self.total().is_zero()
    }
}

impl Default for FadeTiming {
    fn default() -> Self {
        Self::from_millis(100, 1000, 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadePhase {
    Idle,
    FadeIn,
    Full,
    FadeOut,
    Hidden,
}

impl FadePhase {
    fn next(self) -> Self {
        match self {
            Self::Idle => Self::FadeIn,
            Self::FadeIn => Self::Full,
            Self::Full => Self::FadeOut,
            Self::FadeOut | Self::Hidden => Self::Hidden,
        }
    }
}

/// Opacity state machine for one overlay
#[derive(Debug, Clone)]
pub struct FadeAnimator {
    timing: FadeTiming,
    phase: FadePhase,
    phase_start: Instant,
    max_alpha: u8,
}

impl FadeAnimator {
    pub fn new(now: Instant) -> Self {
        Self {
            timing: FadeTiming::from_millis(0, 0, 0),
            phase: FadePhase::Idle,
            phase_start: now,
            max_alpha: MAX_ALPHA,
        }
    }

    pub fn phase(&self) -> FadePhase {
        self.phase
    }

    /// A cycle is in progress (window should be mapped)
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            FadePhase::FadeIn | FadePhase::Full | FadePhase::FadeOut
        )
    }

    /// Begin a new cycle at `now`, replacing whatever was running
    pub fn start(&mut self, mut timing: FadeTiming, now: Instant) {
        if timing.tick.is_zero() {
            timing.tick = DEFAULT_TICK;
        }
        self.timing = timing;
        self.phase_start = now;

        if timing.holds() {
            self.phase = FadePhase::Full;
            return;
        }

        self.phase = FadePhase::FadeIn;
        self.skip_empty_phases();
    }

    /// Cut the cycle short
    pub fn cancel(&mut self) {
        if self.phase != FadePhase::Idle {
            self.phase = FadePhase::Hidden;
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.phase = FadePhase::Idle;
        self.phase_start = now;
    }

    /// Length of the current phase, `None` while holding indefinitely
    fn phase_duration(&self) -> Option<Duration> {
        match self.phase {
            FadePhase::FadeIn => Some(self.timing.fade_in),
            FadePhase::Full if self.timing.holds() => None,
            FadePhase::Full => Some(self.timing.full),
            FadePhase::FadeOut => Some(self.timing.fade_out),
            FadePhase::Idle | FadePhase::Hidden => None,
        }
    }

    fn skip_empty_phases(&mut self) {
        while self.is_active() && self.phase_duration() == Some(Duration::ZERO) {
            self.phase = self.phase.next();
        }
    }

    /// Move through every phase whose end lies at or before `now`
    pub fn advance(&mut self, now: Instant) -> FadePhase {
        while self.is_active() {
            let Some(duration) = self.phase_duration() else {
                break;
            };
            let end = self.phase_start + duration;
            if now < end {
                break;
            }
            self.phase = self.phase.next();
            self.phase_start = end;
        }
        self.phase
    }

    /// Opacity for the current phase at `now`
    pub fn opacity(&self, now: Instant) -> u8 {
        let elapsed = now.saturating_duration_since(self.phase_start);
        match self.phase {
            FadePhase::FadeIn => interpolate(self.max_alpha, elapsed, self.timing.fade_in),
            FadePhase::Full => self.max_alpha,
            FadePhase::FadeOut => {
                self.max_alpha - interpolate(self.max_alpha, elapsed, self.timing.fade_out)
            }
            FadePhase::Idle | FadePhase::Hidden => 0,
        }
    }

    /// When the update thread must wake next.
    ///
    /// During fades that is the next tick or the phase end, whichever comes
    /// first. While at full opacity ticks only matter when something is
    /// polled on each of them.
    pub fn next_deadline(&self, now: Instant, polling: bool) -> Option<Instant> {
        if !self.is_active() {
            return None;
        }

        let phase_end = self.phase_duration().map(|d| self.phase_start + d);
        let ticking = polling || matches!(self.phase, FadePhase::FadeIn | FadePhase::FadeOut);
        if !ticking {
            return phase_end;
        }

        let tick = self.timing.tick.as_nanos().max(1);
        let elapsed = now.saturating_duration_since(self.phase_start).as_nanos();
        let next = (elapsed / tick).saturating_add(1).saturating_mul(tick);
        let next_tick = u64::try_from(next)
            .ok()
            .and_then(|nanos| self.phase_start.checked_add(Duration::from_nanos(nanos)))
            .unwrap_or(now + self.timing.tick);

        Some(match phase_end {
            Some(end) if end < next_tick => end,
            _ => next_tick,
        })
    }
}

/// `round(max * elapsed / duration)` in whole milliseconds, clamped to `max`
fn interpolate(max: u8, elapsed: Duration, duration: Duration) -> u8 {
    let total = duration.as_millis() as u64;
    if total == 0 {
        return max;
    }
    let elapsed = (elapsed.as_millis() as u64).min(total);
    ((max as u64 * elapsed + total / 2) / total) as u8
}
