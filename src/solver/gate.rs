//! At-most-once submission, and the endpoint collaborator it talks to.
//!
//! The gate is the only mutual-exclusion mechanism around the submit call:
//! while Pending, further submit attempts and edits are refused, and exactly
//! one request is in flight. Acceptance is terminal; rejection (application
//! error or transport fault) returns the gate to Idle so the answer can be
//! edited and resubmitted manually. No retry happens here.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use crate::solver::answer::Answer;

/// Why a submission did not land.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
  /// The endpoint answered non-2xx with a structured reason; surfaced to
  /// the solver verbatim.
  #[error("{0}")]
  Rejected(String),
  /// Transport-level fault (connect, timeout, malformed response).
  #[error("network error: {0}")]
  Transport(String),
}

pub type SubmitResult = Result<(), SubmitError>;

/// Boxed future so the engine can hold the endpoint behind a trait object
/// and spawn the call off the event loop.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// External submit collaborator. One call per submit() invocation.
pub trait SubmitEndpoint: Send + Sync {
  fn submit<'a>(&'a self, task_id: &'a str, answer: &'a Answer) -> BoxFuture<'a, SubmitResult>;
}

/// Submission lifecycle. Rejected is not a resting state: the gate reverts
/// to Idle when the failure is resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateState {
  Idle,
  Pending,
  Accepted,
}

#[derive(Clone, Copy, Debug)]
pub struct SubmissionGate {
  state: GateState,
}

impl Default for SubmissionGate {
  fn default() -> Self {
    Self::new()
  }
}

impl SubmissionGate {
  pub fn new() -> Self {
    Self { state: GateState::Idle }
  }

  pub fn state(&self) -> GateState {
    self.state
  }

  /// Edits are allowed only while Idle.
  pub fn editable(&self) -> bool {
    self.state() == GateState::Idle
  }

  /// Try to start a submission. Returns false while Pending or after
  /// Accepted; concurrent invocations therefore collapse to one attempt.
  pub fn begin(&mut self) -> bool {
    if self.state != GateState::Idle {
      return false;
    }
    self.state = GateState::Pending;
    true
  }

  /// Resolve the in-flight attempt. Success is terminal; failure re-opens
  /// the gate for editing and a fresh manual retry.
  pub fn resolve(&mut self, result: &SubmitResult) {
    if self.state != GateState::Pending {
      return;
    }
    self.state = match result {
      Ok(()) => GateState::Accepted,
      Err(_) => GateState::Idle,
    };
  }
}

/// Body posted to `/solve/{task_id}/submit`.
#[derive(Serialize)]
struct SubmitBody<'a> {
  answers: &'a Answer,
}

/// Real submit collaborator: POSTs the answer snapshot to the relay.
#[derive(Clone)]
pub struct HttpSubmitEndpoint {
  client: reqwest::Client,
  base_url: String,
}

impl HttpSubmitEndpoint {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self { client: reqwest::Client::new(), base_url: base_url.into() }
  }

  pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
    Self { client, base_url: base_url.into() }
  }

  #[instrument(level = "info", skip(self, answer), fields(%task_id, answer_len = answer.len()))]
  async fn post(&self, task_id: &str, answer: &Answer) -> SubmitResult {
    let url = format!("{}/solve/{}/submit", self.base_url, task_id);
    let resp = self
      .client
      .post(&url)
      .json(&SubmitBody { answers: answer })
      .send()
      .await
      .map_err(|e| SubmitError::Transport(e.to_string()))?;

    if resp.status().is_success() {
      info!(target: "solver", %task_id, "Submission accepted");
      return Ok(());
    }

    let reason = resp
      .json::<serde_json::Value>()
      .await
      .ok()
      .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
      .unwrap_or_else(|| "Unknown error".to_string());
    Err(SubmitError::Rejected(reason))
  }
}

impl SubmitEndpoint for HttpSubmitEndpoint {
  fn submit<'a>(&'a self, task_id: &'a str, answer: &'a Answer) -> BoxFuture<'a, SubmitResult> {
    Box::pin(self.post(task_id, answer))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn begin_is_single_flight() {
    let mut gate = SubmissionGate::new();
    assert!(gate.begin());
    assert_eq!(gate.state(), GateState::Pending);
    assert!(!gate.begin()); // second attempt while pending is refused
    assert!(!gate.editable());
  }

  #[test]
  fn acceptance_is_terminal() {
    let mut gate = SubmissionGate::new();
    gate.begin();
    gate.resolve(&Ok(()));
    assert_eq!(gate.state(), GateState::Accepted);
    assert!(!gate.begin());
    assert!(!gate.editable());
    // A stray late resolution changes nothing.
    gate.resolve(&Err(SubmitError::Transport("late".into())));
    assert_eq!(gate.state(), GateState::Accepted);
  }

  #[test]
  fn rejection_reopens_the_gate() {
    let mut gate = SubmissionGate::new();
    gate.begin();
    gate.resolve(&Err(SubmitError::Rejected("expired".into())));
    assert_eq!(gate.state(), GateState::Idle);
    assert!(gate.editable());
    assert!(gate.begin()); // manual retry allowed
  }

  #[test]
  fn resolve_without_begin_is_ignored() {
    let mut gate = SubmissionGate::new();
    gate.resolve(&Ok(()));
    assert_eq!(gate.state(), GateState::Idle);
  }

  #[test]
  fn submit_errors_render_for_the_user() {
    assert_eq!(SubmitError::Rejected("expired".into()).to_string(), "expired");
    assert_eq!(
      SubmitError::Transport("connection refused".into()).to_string(),
      "network error: connection refused"
    );
  }
}
