//! End-to-end: a headless capture session drives a real relay server over
//! HTTP, exactly the way a solve surface would.

use std::net::SocketAddr;
use std::sync::Arc;

use base64::Engine;
use serde_json::json;
use tokio::sync::mpsc;

use captcha_relay::config::Config;
use captcha_relay::domain::RequestType;
use captcha_relay::routes::build_router;
use captcha_relay::solver::geometry::{Extent, SurfaceSize};
use captcha_relay::solver::session::{
  run_solver, ImageHandle, RenderOp, RenderSurface, SolverEvent, SolverSession,
};
use captcha_relay::solver::{GateState, HttpSubmitEndpoint};
use captcha_relay::state::AppState;

const KEY: &str = "test-key";

/// Surface double: fixed measure, records every applied op.
struct RecordingSurface {
  size: SurfaceSize,
  ops: Vec<RenderOp>,
}

impl RenderSurface for RecordingSurface {
  fn measure(&self) -> SurfaceSize {
    self.size
  }

  fn apply(&mut self, ops: &[RenderOp]) {
    self.ops.extend_from_slice(ops);
  }
}

/// Image collaborator whose resource is already loaded.
struct LoadedImage(Extent);

impl ImageHandle for LoadedImage {
  fn native_extent(&self) -> Option<Extent> {
    Some(self.0)
  }
}

fn png_body(width: u32, height: u32) -> String {
  let mut data = vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
  data.extend_from_slice(&13u32.to_be_bytes());
  data.extend_from_slice(b"IHDR");
  data.extend_from_slice(&width.to_be_bytes());
  data.extend_from_slice(&height.to_be_bytes());
  data.extend_from_slice(&[8, 2, 0, 0, 0]);
  base64::engine::general_purpose::STANDARD.encode(data)
}

/// Serve the relay on an ephemeral port and return its base URL.
async fn spawn_relay() -> (Arc<AppState>, String) {
  let config = Config { api_key: KEY.into(), ..Config::default() };
  let state = Arc::new(AppState::new(config));
  let app = build_router(state.clone());

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
  let addr: SocketAddr = listener.local_addr().expect("addr");
  tokio::spawn(async move {
    axum::serve(listener, app).await.expect("serve");
  });
  (state, format!("http://{addr}"))
}

async fn create_canvas_task(base: &str) -> (String, f64) {
  let client = reqwest::Client::new();
  let resp: serde_json::Value = client
    .post(format!("{base}/createTask"))
    .json(&json!({
      "clientKey": KEY,
      "task": {
        "request_type": "Canvas",
        "question": "mark both anomalies",
        "body": png_body(800, 400),
      }
    }))
    .send()
    .await
    .expect("createTask")
    .json()
    .await
    .expect("json");
  assert_eq!(resp["errorId"], 0);
  let task_id = resp["taskId"].as_str().expect("taskId").to_string();

  // The solve view feeds the session: native extent and countdown anchor.
  let view: serde_json::Value = client
    .get(format!("{base}/solve/{task_id}"))
    .send()
    .await
    .expect("solve view")
    .json()
    .await
    .expect("json");
  assert_eq!(view["native"]["width"], 800);
  assert_eq!(view["native"]["height"], 400);
  let created_at = view["createdAt"].as_f64().expect("createdAt");
  (task_id, created_at)
}

#[tokio::test]
async fn headless_session_solves_a_canvas_task() {
  let (_state, base) = spawn_relay().await;
  let (task_id, created_at) = create_canvas_task(&base).await;

  let session = SolverSession::new(
    task_id.clone(),
    RequestType::Canvas,
    created_at,
    Arc::new(captcha_relay::clock::SystemClock),
    SurfaceSize::new(200.0, 100.0),
  );
  let mut surface = RecordingSurface { size: SurfaceSize::new(200.0, 100.0), ops: Vec::new() };
  let image = LoadedImage(Extent::new(800, 400));
  let endpoint = Arc::new(HttpSubmitEndpoint::new(base.clone()));

  let (tx, rx) = mpsc::channel(16);
  for ev in [
    SolverEvent::Pointer { x: 50.0, y: 50.0 },
    SolverEvent::Pointer { x: 150.0, y: 75.0 },
    SolverEvent::SubmitRequested,
  ] {
    tx.send(ev).await.expect("send");
  }
  drop(tx); // driver drains the queue, resolves the submit, then returns

  let session = run_solver(session, rx, &mut surface, &image, endpoint).await;

  assert_eq!(session.gate_state(), GateState::Accepted);
  assert!(surface.ops.contains(&RenderOp::SubmitAccepted));
  assert!(surface
    .ops
    .iter()
    .any(|op| matches!(op, RenderOp::PlaceMarker { ordinal: 2, .. })));

  // The relay recorded exactly the clicked native points.
  let client = reqwest::Client::new();
  let result: serde_json::Value = client
    .post(format!("{base}/getTaskResult"))
    .json(&json!({ "clientKey": KEY, "taskId": task_id }))
    .send()
    .await
    .expect("getTaskResult")
    .json()
    .await
    .expect("json");
  assert_eq!(result["status"], "ready");
  assert_eq!(result["answers"], json!([[200, 200], [600, 300]]));
}

#[tokio::test]
async fn rejected_submission_reopens_the_session() {
  let (state, base) = spawn_relay().await;
  let (task_id, created_at) = create_canvas_task(&base).await;

  // Someone else resolves the task first.
  assert!(
    state
      .store
      .submit_answer(
        &task_id,
        captcha_relay::solver::Answer::Points(vec![captcha_relay::solver::Point::new(1, 1)]),
      )
      .await
  );

  let session = SolverSession::new(
    task_id.clone(),
    RequestType::Canvas,
    created_at,
    Arc::new(captcha_relay::clock::SystemClock),
    SurfaceSize::new(200.0, 100.0),
  );
  let mut surface = RecordingSurface { size: SurfaceSize::new(200.0, 100.0), ops: Vec::new() };
  let image = LoadedImage(Extent::new(800, 400));
  let endpoint = Arc::new(HttpSubmitEndpoint::new(base.clone()));

  let (tx, rx) = mpsc::channel(16);
  for ev in [
    SolverEvent::Pointer { x: 10.0, y: 10.0 },
    SolverEvent::SubmitRequested,
  ] {
    tx.send(ev).await.expect("send");
  }
  drop(tx);

  let session = run_solver(session, rx, &mut surface, &image, endpoint).await;

  // The rejection reason reaches the surface verbatim and the gate reopens.
  assert_eq!(session.gate_state(), GateState::Idle);
  assert!(surface.ops.contains(&RenderOp::SubmitFailed(
    "Task not found or already resolved".into()
  )));
  assert!(!session.answer().is_empty());
}
