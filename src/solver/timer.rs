//! Countdown lifecycle for a challenge.
//!
//! Phase is a pure function of (now - created_at) against the fixed
//! duration; ticking the timer never mutates anything, so repeated ticks in
//! the same phase re-render the same state. The driver owns scheduling and
//! stops rescheduling once Expired.

/// Fixed challenge lifetime.
pub const CHALLENGE_DURATION_SECS: f64 = 120.0;
/// Remaining-time threshold below which the UI switches to warning.
pub const WARNING_THRESHOLD_SECS: u64 = 30;

/// Presentation phase of the countdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerPhase {
  Normal,
  Warning,
  Expired,
}

/// Computes remaining time and phase from a fixed start and duration.
#[derive(Clone, Copy, Debug)]
pub struct ExpiryTimer {
  created_at: f64,
  duration_secs: f64,
}

impl ExpiryTimer {
  pub fn new(created_at: f64, duration_secs: f64) -> Self {
    Self { created_at, duration_secs }
  }

  pub fn standard(created_at: f64) -> Self {
    Self::new(created_at, CHALLENGE_DURATION_SECS)
  }

  /// Whole seconds left: `max(0, duration - floor(elapsed))`.
  pub fn remaining_secs(&self, now: f64) -> u64 {
    let elapsed = (now - self.created_at).floor();
    let remaining = self.duration_secs - elapsed;
    if remaining <= 0.0 { 0 } else { remaining as u64 }
  }

  pub fn phase(&self, now: f64) -> TimerPhase {
    let remaining = self.remaining_secs(now);
    if remaining == 0 {
      TimerPhase::Expired
    } else if remaining <= WARNING_THRESHOLD_SECS {
      TimerPhase::Warning
    } else {
      TimerPhase::Normal
    }
  }

  /// Countdown display, `m:ss`.
  pub fn display(&self, now: f64) -> String {
    let remaining = self.remaining_secs(now);
    format!("{}:{:02}", remaining / 60, remaining % 60)
  }
}
