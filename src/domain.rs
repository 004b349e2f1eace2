//! Domain models: request types, task lifecycle status, and the task itself.

use serde::{Deserialize, Serialize};

use crate::solver::answer::Answer;

/// How the challenge is presented to the human solver.
///
/// - `Grid`: a 3x3 tile overlay; the answer is the set of selected indices.
/// - `Canvas`: free clicks on the image; the answer is the ordered points.
/// - `Drag`: directed start/end pairs; the answer is the flat point list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
  Grid,
  Canvas,
  Drag,
}

impl Default for RequestType {
  fn default() -> Self { RequestType::Grid }
}

impl std::fmt::Display for RequestType {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      RequestType::Grid => write!(f, "Grid"),
      RequestType::Canvas => write!(f, "Canvas"),
      RequestType::Drag => write!(f, "Drag"),
    }
  }
}

/// Task lifecycle. A task leaves `Processing` exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
  Processing,
  Ready,
  Expired,
}

impl std::fmt::Display for TaskStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let s = match self {
      TaskStatus::Processing => "processing",
      TaskStatus::Ready => "ready",
      TaskStatus::Expired => "expired",
    };
    write!(f, "{s}")
  }
}

/// A challenge task held in memory for the duration of its lifetime.
#[derive(Clone, Debug)]
pub struct Task {
  pub task_id: String,
  pub client_key: String,
  pub request_type: RequestType,
  pub question: String,
  /// Base64-encoded challenge image.
  pub body: String,
  pub examples: Vec<String>,
  pub status: TaskStatus,
  pub answer: Option<Answer>,
  /// Unix seconds.
  pub created_at: f64,
  pub solved_at: Option<f64>,
}
