//! Fade in/out transitions

use std::time::{Duration, Instant};

/// Default show/hide transition length
pub const DEFAULT_FADE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeMode {
    #[default]
    Idle,
    FadingIn,
    FadingOut,
}

/// Linear alpha interpolation over a fixed duration.
///
/// Only one direction runs at a time; starting a fade replaces the current one.
#[derive(Debug, Clone)]
pub struct FadeController {
    duration: Duration,
    start: Option<Instant>,
    mode: FadeMode,
}

impl Default for FadeController {
    fn default() -> Self {
        Self::new(DEFAULT_FADE)
    }
}

impl FadeController {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            start: None,
            mode: FadeMode::Idle,
        }
    }

    pub fn mode(&self) -> FadeMode {
        self.mode
    }

    pub fn start_fade_in(&mut self) {
        self.start_fade_in_at(Instant::now());
    }

    pub fn start_fade_out(&mut self) {
        self.start_fade_out_at(Instant::now());
    }

    pub fn start_fade_in_at(&mut self, now: Instant) {
        self.start = Some(now);
        self.mode = FadeMode::FadingIn;
    }

    pub fn start_fade_out_at(&mut self, now: Instant) {
        self.start = Some(now);
        self.mode = FadeMode::FadingOut;
    }

    /// Alpha for this instant, or `None` when no fade is running
    pub fn current_alpha(&mut self) -> Option<f64> {
        self.current_alpha_at(Instant::now())
    }

    /// Alpha at `now`. The call that reaches full progress returns the final
    /// value (1.0 or 0.0) and moves the controller back to idle.
    pub fn current_alpha_at(&mut self, now: Instant) -> Option<f64> {
        let start = match (self.mode, self.start) {
            (FadeMode::Idle, _) | (_, None) => return None,
            (_, Some(start)) => start,
        };

        let elapsed = now.saturating_duration_since(start);
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
        };

        let alpha = match self.mode {
            FadeMode::FadingIn => progress,
            FadeMode::FadingOut => 1.0 - progress,
            FadeMode::Idle => return None,
        };

        if progress >= 1.0 {
            self.mode = FadeMode::Idle;
            self.start = None;
        }

        Some(alpha)
    }

    pub fn is_complete(&self) -> bool {
        self.mode == FadeMode::Idle
    }
}
