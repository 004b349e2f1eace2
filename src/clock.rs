//! Wall-clock collaborator.
//!
//! Every time comparison in the relay (task expiry, countdown phases,
//! spent-time accounting) goes through `Clock`, so tests and simulations can
//! substitute a manual clock instead of sleeping.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of "now" as unix seconds (fractional).
pub trait Clock: Send + Sync {
  fn now_unix(&self) -> f64;
}

/// The real wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_unix(&self) -> f64 {
    SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_secs_f64())
      .unwrap_or(0.0)
  }
}

/// Hand-driven clock for tests and headless simulation.
#[derive(Clone, Default)]
pub struct ManualClock {
  now: Arc<Mutex<f64>>,
}

impl ManualClock {
  pub fn at(now: f64) -> Self {
    Self { now: Arc::new(Mutex::new(now)) }
  }

  pub fn set(&self, now: f64) {
    *self.now.lock().expect("clock poisoned") = now;
  }

  pub fn advance(&self, secs: f64) {
    *self.now.lock().expect("clock poisoned") += secs;
  }
}

impl Clock for ManualClock {
  fn now_unix(&self) -> f64 {
    *self.now.lock().expect("clock poisoned")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn manual_clock_advances() {
    let c = ManualClock::at(100.0);
    assert_eq!(c.now_unix(), 100.0);
    c.advance(2.5);
    assert_eq!(c.now_unix(), 102.5);
    c.set(50.0);
    assert_eq!(c.now_unix(), 50.0);
  }

  #[test]
  fn system_clock_is_past_2020() {
    assert!(SystemClock.now_unix() > 1_577_836_800.0);
  }
}
