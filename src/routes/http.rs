//! HTTP endpoint handlers. Thin wrappers that forward to the store and
//! state; each handler is instrumented and logs basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument, warn};

use crate::domain::TaskStatus;
use crate::imagemeta;
use crate::protocol::*;
use crate::solver::answer::Answer;
use crate::solver::timer::ExpiryTimer;
use crate::state::AppState;
use crate::util::{ct_eq, round1, short_id, trunc_for_log};

/// Key check; an empty configured key rejects everything.
fn key_ok(state: &AppState, client_key: &str) -> bool {
  let expected = &state.config.api_key;
  !expected.is_empty() && ct_eq(client_key, expected)
}

#[instrument(level = "info", skip(state, body), fields(kind = %body.kind))]
pub async fn create_task(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CreateTaskIn>,
) -> impl IntoResponse {
  if !key_ok(&state, &body.client_key) {
    return Json(ApiError::wrong_user_key()).into_response();
  }

  let payload = body.task;
  let task_id = state
    .store
    .create_task(
      body.client_key,
      payload.request_type,
      payload.question.clone(),
      payload.body,
      payload.examples,
    )
    .await;

  let solve_url = state.solve_url(&task_id);
  info!(
    target: "task",
    task = short_id(&task_id),
    request_type = %payload.request_type,
    question = %trunc_for_log(&payload.question, 60),
    "Task created"
  );

  let receivers = state.publish_notice(SolverNotice::NewTask {
    task_id: task_id.clone(),
    request_type: payload.request_type,
    question: payload.question.clone(),
    solve_url: solve_url.clone(),
  });
  info!(target: "task", task = short_id(&task_id), receivers, "Solvers notified");

  if let Some(notifier) = state.notifier.clone() {
    let request_type = payload.request_type.to_string();
    let question = payload.question;
    let id = task_id.clone();
    tokio::spawn(async move {
      notifier.notify_new_task(&id, &request_type, &question, &solve_url).await;
    });
  }

  Json(CreateTaskOut { error_id: 0, task_id }).into_response()
}

#[instrument(level = "info", skip(state, body), fields(task = short_id(&body.task_id)))]
pub async fn get_task_result(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GetTaskResultIn>,
) -> impl IntoResponse {
  if !key_ok(&state, &body.client_key) {
    return Json(ApiError::wrong_user_key()).into_response();
  }

  let Some(task) = state.store.get_task(&body.task_id).await else {
    return Json(ApiError::wrong_captcha_id()).into_response();
  };

  match task.status {
    TaskStatus::Expired => Json(ApiError::unsolvable()).into_response(),
    TaskStatus::Processing => Json(TaskResultOut::processing()).into_response(),
    TaskStatus::Ready => {
      let spent = task
        .solved_at
        .map(|solved| round1(solved - task.created_at))
        .unwrap_or(0.0);
      let answers = task.answer.unwrap_or(Answer::Tiles(Vec::new()));
      info!(target: "task", task = short_id(&body.task_id), answers = answers.len(), spent, "Result delivered");
      Json(TaskResultOut::ready(answers, spent)).into_response()
    }
  }
}

/// Presentation data for the solve surface. 410 once the task has left
/// `processing`, mirroring the original page behavior.
#[instrument(level = "info", skip(state), fields(task = short_id(&task_id)))]
pub async fn solve_view(
  State(state): State<Arc<AppState>>,
  Path(task_id): Path<String>,
) -> impl IntoResponse {
  let Some(task) = state.store.get_task(&task_id).await else {
    return (
      StatusCode::NOT_FOUND,
      Json(serde_json::json!({ "error": "Task not found" })),
    )
      .into_response();
  };

  if task.status != TaskStatus::Processing {
    return (
      StatusCode::GONE,
      Json(serde_json::json!({ "error": format!("Task already {}", task.status) })),
    )
      .into_response();
  }

  let native = imagemeta::native_extent(&task.body);
  let timer = ExpiryTimer::new(task.created_at, state.store.timeout_secs());
  let remaining = timer.remaining_secs(state.clock.now_unix());
  Json(crate::protocol::solve_view(&task, remaining, native)).into_response()
}

/// The capture engine's submit collaborator. 2xx means accepted; anything
/// else carries `{ "error": reason }`.
#[instrument(level = "info", skip(state, body), fields(task = short_id(&task_id)))]
pub async fn solve_submit(
  State(state): State<Arc<AppState>>,
  Path(task_id): Path<String>,
  Json(body): Json<SubmitIn>,
) -> impl IntoResponse {
  let raw = &body.answers;
  let empty = raw.is_null() || raw.as_array().map(Vec::is_empty).unwrap_or(false);
  if empty {
    return (
      StatusCode::BAD_REQUEST,
      Json(serde_json::json!({ "error": "No answers provided" })),
    )
      .into_response();
  }

  // Shape validation needs the task's mode; missing tasks fall through to
  // the store refusal below with the same message either way.
  let answer = match state.store.get_task(&task_id).await {
    Some(task) => match Answer::parse_for(task.request_type, raw) {
      Ok(answer) => answer,
      Err(reason) => {
        warn!(target: "task", task = short_id(&task_id), %reason, "Malformed submission");
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": reason })))
          .into_response();
      }
    },
    None => {
      return (
        StatusCode::GONE,
        Json(serde_json::json!({ "error": "Task not found or already resolved" })),
      )
        .into_response()
    }
  };

  if !state.store.submit_answer(&task_id, answer.clone()).await {
    return (
      StatusCode::GONE,
      Json(serde_json::json!({ "error": "Task not found or already resolved" })),
    )
      .into_response();
  }

  info!(target: "task", task = short_id(&task_id), answers = answer.len(), "Task solved");
  Json(SubmitOut { ok: true }).into_response()
}
