//! The capture session: one per presented challenge.
//!
//! `SolverSession` is the single-threaded state machine behind the solve
//! surface. It translates discrete input events (pointer clicks, tile
//! clicks, resize notifications, clear, submit) into accumulator mutations
//! plus `RenderOp` instructions for an injected `RenderSurface`. Nothing in
//! here blocks: the submit call is spawned by the driver and its completion
//! comes back as an event, with the gate's Pending state as the only
//! mutual-exclusion mechanism.
//!
//! `run_solver` is the cooperative driver: a `select!` loop over the event
//! channel, the internal submit-resolution channel, and a frame interval
//! that stops rescheduling once the countdown expires.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::domain::RequestType;
use crate::solver::answer::{Answer, AnswerAccumulator, DragPhase};
use crate::solver::gate::{GateState, SubmissionGate, SubmitEndpoint, SubmitResult};
use crate::solver::geometry::{
  CoordinateMapper, Extent, LineLayout, PctLine, PctPoint, SurfaceSize,
};
use crate::solver::timer::{ExpiryTimer, TimerPhase};

pub const GRID_ROWS: usize = 3;
pub const GRID_COLS: usize = 3;

const DRAG_START_PROMPT: &str = "Click START point (green) for drag #1";
const DRAG_END_PROMPT: &str = "Now click the END point (red)";

/// Discrete external events driving the session.
#[derive(Clone, Debug)]
pub enum SolverEvent {
  /// The image resource finished loading (or was already loaded).
  ImageLoaded { native: Extent },
  /// Click on the image, offsets in surface pixels.
  Pointer { x: f64, y: f64 },
  /// Click on one cell of the 3x3 grid overlay.
  TileClick { index: usize },
  /// The container's rendered size changed; the driver re-measures.
  Resized,
  Clear,
  SubmitRequested,
  /// Completion of the spawned submit call.
  SubmitResolved(SubmitResult),
}

/// Start/end role of a directed-pair endpoint marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragRole {
  Start,
  End,
}

/// Overlay-rendering instruction. The engine never touches a real surface;
/// it emits these and the embedder applies them.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderOp {
  /// Mount the fixed grid of clickable regions over the image.
  MountGrid { rows: usize, cols: usize },
  SetCellSelected { index: usize, selected: bool },
  /// Numbered click marker at a percentage position (1-based ordinal).
  PlaceMarker { pct: PctPoint, ordinal: usize },
  PlaceDragPoint { pct: PctPoint, role: DragRole },
  /// Position line `index` for the current surface size. Re-emitted for
  /// every stored line when the container resizes.
  LayoutLine { index: usize, layout: LineLayout },
  /// Remove markers, drag points and lines; deselect all grid cells.
  ClearOverlays,
  CrosshairCursor,
  Preview(String),
  SubmitEnabled(bool),
  Timer { display: String, phase: TimerPhase },
  SubmitPending,
  SubmitAccepted,
  SubmitFailed(String),
}

/// Injected rendering collaborator.
pub trait RenderSurface {
  /// Current rendered size of the challenge container.
  fn measure(&self) -> SurfaceSize;
  fn apply(&mut self, ops: &[RenderOp]);
}

/// Injected image-resource collaborator. `native_extent` returns Some once
/// the resource has loaded, so a session constructed against an
/// already-loaded image misses no notification.
pub trait ImageHandle {
  fn native_extent(&self) -> Option<Extent>;
}

/// Per-challenge capture state machine.
pub struct SolverSession {
  task_id: String,
  mode: RequestType,
  acc: AnswerAccumulator,
  mapper: Option<CoordinateMapper>,
  surface: SurfaceSize,
  lines: Vec<PctLine>,
  pending_start_pct: Option<PctPoint>,
  timer: ExpiryTimer,
  gate: SubmissionGate,
  clock: Arc<dyn Clock>,
  expired: bool,
}

impl SolverSession {
  pub fn new(
    task_id: impl Into<String>,
    mode: RequestType,
    created_at: f64,
    clock: Arc<dyn Clock>,
    surface: SurfaceSize,
  ) -> Self {
    Self {
      task_id: task_id.into(),
      mode,
      acc: AnswerAccumulator::for_mode(mode),
      mapper: None,
      surface,
      lines: Vec::new(),
      pending_start_pct: None,
      timer: ExpiryTimer::standard(created_at),
      gate: SubmissionGate::new(),
      clock,
      expired: false,
    }
  }

  pub fn task_id(&self) -> &str {
    &self.task_id
  }

  pub fn mode(&self) -> RequestType {
    self.mode
  }

  pub fn gate_state(&self) -> GateState {
    self.gate.state()
  }

  pub fn is_expired(&self) -> bool {
    self.expired
  }

  pub fn answer(&self) -> Answer {
    self.acc.snapshot()
  }

  /// Mode-specific setup, deferred until the native extent is known.
  /// Idempotent: a second load notification changes nothing.
  #[instrument(level = "debug", skip(self), fields(task = %self.task_id))]
  pub fn on_image_loaded(&mut self, native: Extent) -> Vec<RenderOp> {
    if self.mapper.is_some() {
      return Vec::new();
    }
    self.mapper = Some(CoordinateMapper::new(native, self.surface));
    debug!(target: "solver", task = %self.task_id, width = native.width, height = native.height, "Image loaded");

    let mut ops = vec![RenderOp::SubmitEnabled(false)];
    match self.mode {
      RequestType::Grid => ops.push(RenderOp::MountGrid { rows: GRID_ROWS, cols: GRID_COLS }),
      RequestType::Canvas => ops.push(RenderOp::CrosshairCursor),
      RequestType::Drag => {
        ops.push(RenderOp::CrosshairCursor);
        ops.push(RenderOp::Preview(DRAG_START_PROMPT.into()));
      }
    }
    ops
  }

  /// Click on the image. Grid challenges don't map pointer positions; they
  /// only listen to tile clicks.
  pub fn on_pointer(&mut self, x: f64, y: f64) -> Vec<RenderOp> {
    if self.input_locked() {
      return Vec::new();
    }
    let Some(mapper) = self.mapper else { return Vec::new() };
    match self.mode {
      RequestType::Grid => Vec::new(),
      RequestType::Canvas => {
        let point = mapper.to_native(x, y);
        let Some(ordinal) = self.acc.append_point(point) else { return Vec::new() };
        let pct = mapper.to_percent(point);
        let mut ops = vec![RenderOp::PlaceMarker { pct, ordinal }];
        ops.extend(self.preview_ops());
        ops
      }
      RequestType::Drag => {
        let point = mapper.to_native(x, y);
        let pct = mapper.to_percent(point);
        let Some(phase_after) = self.acc.append_pair_point(point) else { return Vec::new() };
        match phase_after {
          // This click opened a pair: it was the start point.
          DragPhase::ExpectingEnd => {
            self.pending_start_pct = Some(pct);
            vec![
              RenderOp::PlaceDragPoint { pct, role: DragRole::Start },
              RenderOp::Preview(DRAG_END_PROMPT.into()),
              RenderOp::SubmitEnabled(false),
            ]
          }
          // This click closed the pair: draw the connecting line.
          DragPhase::ExpectingStart => {
            let mut ops = vec![RenderOp::PlaceDragPoint { pct, role: DragRole::End }];
            if let Some(start) = self.pending_start_pct.take() {
              let line = PctLine::new(start, pct);
              self.lines.push(line);
              ops.push(RenderOp::LayoutLine {
                index: self.lines.len() - 1,
                layout: line.layout(self.surface),
              });
            }
            ops.extend(self.preview_ops());
            ops
          }
        }
      }
    }
  }

  /// Toggle one grid cell's membership.
  pub fn on_tile_click(&mut self, index: usize) -> Vec<RenderOp> {
    if self.input_locked() || self.mapper.is_none() || index >= GRID_ROWS * GRID_COLS {
      return Vec::new();
    }
    let Some(selected) = self.acc.toggle(index) else { return Vec::new() };
    let mut ops = vec![RenderOp::SetCellSelected { index, selected }];
    ops.extend(self.preview_ops());
    ops
  }

  /// The container was re-measured. Every stored line is re-laid-out from
  /// its percentage endpoints; the answer is never touched.
  pub fn on_resized(&mut self, surface: SurfaceSize) -> Vec<RenderOp> {
    self.surface = surface;
    if let Some(mapper) = self.mapper.as_mut() {
      mapper.set_surface(surface);
    }
    self
      .lines
      .iter()
      .enumerate()
      .map(|(index, line)| RenderOp::LayoutLine { index, layout: line.layout(surface) })
      .collect()
  }

  /// Clear-all: the only correction mechanism. Refused once a submission is
  /// pending or accepted.
  pub fn on_clear(&mut self) -> Vec<RenderOp> {
    if !self.gate.editable() {
      return Vec::new();
    }
    self.acc.clear();
    self.lines.clear();
    self.pending_start_pct = None;

    let reset_text = match self.mode {
      RequestType::Drag => DRAG_START_PROMPT.to_string(),
      _ => String::new(),
    };
    vec![
      RenderOp::ClearOverlays,
      RenderOp::Preview(reset_text),
      RenderOp::SubmitEnabled(false),
    ]
  }

  /// Try to start a submission. Returns the answer snapshot to send iff the
  /// gate opened; concurrent requests while Pending collapse to one call.
  #[instrument(level = "debug", skip(self), fields(task = %self.task_id))]
  pub fn on_submit_requested(&mut self) -> (Vec<RenderOp>, Option<Answer>) {
    if self.expired || !self.acc.is_ready() || !self.gate.begin() {
      return (Vec::new(), None);
    }
    info!(target: "solver", task = %self.task_id, answers = self.acc.len(), "Submitting answer");
    (
      vec![RenderOp::SubmitPending, RenderOp::SubmitEnabled(false)],
      Some(self.acc.snapshot()),
    )
  }

  /// The spawned submit call finished.
  pub fn on_submit_resolved(&mut self, result: SubmitResult) -> Vec<RenderOp> {
    if self.gate.state() != GateState::Pending {
      return Vec::new();
    }
    self.gate.resolve(&result);
    match result {
      Ok(()) => vec![RenderOp::SubmitAccepted],
      Err(e) => {
        warn!(target: "solver", task = %self.task_id, error = %e, "Submission failed");
        vec![
          RenderOp::SubmitFailed(e.to_string()),
          RenderOp::SubmitEnabled(self.submit_allowed()),
        ]
      }
    }
  }

  /// Per-frame countdown refresh. Crossing into Expired permanently locks
  /// submission; repeated ticks re-render the same state.
  pub fn tick(&mut self) -> Vec<RenderOp> {
    let now = self.clock.now_unix();
    let phase = self.timer.phase(now);
    let mut ops = vec![RenderOp::Timer { display: self.timer.display(now), phase }];
    if phase == TimerPhase::Expired && !self.expired {
      self.expired = true;
      info!(target: "solver", task = %self.task_id, "Challenge expired; submission disabled");
      ops.push(RenderOp::SubmitEnabled(false));
    }
    ops
  }

  fn input_locked(&self) -> bool {
    self.expired || !self.gate.editable()
  }

  fn submit_allowed(&self) -> bool {
    !self.expired && self.gate.editable() && self.acc.is_ready()
  }

  /// Preview text + submit enablement, recomputed after a mutation.
  fn preview_ops(&self) -> Vec<RenderOp> {
    vec![
      RenderOp::Preview(self.preview_text()),
      RenderOp::SubmitEnabled(self.submit_allowed()),
    ]
  }

  fn preview_text(&self) -> String {
    match &self.acc {
      AnswerAccumulator::Tiles(tiles) => {
        if tiles.is_empty() {
          String::new()
        } else {
          let sorted: Vec<String> =
            self.acc.sorted_tiles().iter().map(|t| t.to_string()).collect();
          format!("Selected tiles: {}", sorted.join(", "))
        }
      }
      AnswerAccumulator::Points(points) => {
        if points.is_empty() {
          String::new()
        } else {
          format!("{} point(s) marked", points.len())
        }
      }
      AnswerAccumulator::Pairs(points) => {
        let pairs = points.len() / 2;
        if pairs == 0 {
          return String::new();
        }
        let parts: Vec<String> = points
          .chunks_exact(2)
          .map(|pair| format!("({},{})->({},{})", pair[0].x, pair[0].y, pair[1].x, pair[1].y))
          .collect();
        let mut text = format!("{} drag(s): {}", pairs, parts.join(" | "));
        if points.len() % 2 == 1 {
          text.push_str(" | waiting for end point...");
        }
        text
      }
    }
  }
}

/// Cooperative driver: apply events to the session and its surface until
/// the event channel closes, spawning submit calls so the loop stays
/// responsive. Returns the session for inspection.
pub async fn run_solver<S, E>(
  mut session: SolverSession,
  mut events: mpsc::Receiver<SolverEvent>,
  surface: &mut S,
  image: &dyn ImageHandle,
  endpoint: Arc<E>,
) -> SolverSession
where
  S: RenderSurface,
  E: SubmitEndpoint + ?Sized + 'static,
{
  // Already-loaded image: no load notification will ever arrive.
  if let Some(native) = image.native_extent() {
    let ops = session.on_image_loaded(native);
    surface.apply(&ops);
  }

  let (resolve_tx, mut resolve_rx) = mpsc::channel::<SubmitResult>(4);
  let mut frames = tokio::time::interval(Duration::from_millis(16));
  frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

  let mut events_open = true;
  let mut in_flight = 0usize;

  while events_open || in_flight > 0 {
    tokio::select! {
      maybe_ev = events.recv(), if events_open => {
        let Some(ev) = maybe_ev else {
          events_open = false;
          continue;
        };
        match ev {
          SolverEvent::ImageLoaded { native } => {
            let ops = session.on_image_loaded(native);
            surface.apply(&ops);
          }
          SolverEvent::Pointer { x, y } => {
            let ops = session.on_pointer(x, y);
            surface.apply(&ops);
          }
          SolverEvent::TileClick { index } => {
            let ops = session.on_tile_click(index);
            surface.apply(&ops);
          }
          SolverEvent::Resized => {
            let ops = session.on_resized(surface.measure());
            surface.apply(&ops);
          }
          SolverEvent::Clear => {
            let ops = session.on_clear();
            surface.apply(&ops);
          }
          SolverEvent::SubmitRequested => {
            let (ops, answer) = session.on_submit_requested();
            surface.apply(&ops);
            if let Some(answer) = answer {
              in_flight += 1;
              let endpoint = endpoint.clone();
              let tx = resolve_tx.clone();
              let task_id = session.task_id().to_string();
              tokio::spawn(async move {
                let result = endpoint.submit(&task_id, &answer).await;
                let _ = tx.send(result).await;
              });
            }
          }
          SolverEvent::SubmitResolved(result) => {
            let ops = session.on_submit_resolved(result);
            surface.apply(&ops);
          }
        }
      }
      Some(result) = resolve_rx.recv(), if in_flight > 0 => {
        in_flight -= 1;
        let ops = session.on_submit_resolved(result);
        surface.apply(&ops);
      }
      _ = frames.tick(), if !session.is_expired() => {
        let ops = session.tick();
        surface.apply(&ops);
      }
    }
  }

  session
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::solver::answer::Answer;
  use crate::solver::geometry::Point;

  const T: f64 = 1_700_000_000.0;

  fn canvas_session(clock: ManualClock) -> SolverSession {
    let mut s = SolverSession::new(
      "task-1",
      RequestType::Canvas,
      T,
      Arc::new(clock),
      SurfaceSize::new(200.0, 100.0),
    );
    s.on_image_loaded(Extent::new(800, 400));
    s
  }

  fn drag_session() -> SolverSession {
    let mut s = SolverSession::new(
      "task-2",
      RequestType::Drag,
      T,
      Arc::new(ManualClock::at(T)),
      SurfaceSize::new(400.0, 400.0),
    );
    s.on_image_loaded(Extent::new(400, 400));
    s
  }

  #[test]
  fn point_mark_maps_clicks_to_native_points() {
    let mut s = canvas_session(ManualClock::at(T));

    let ops = s.on_pointer(50.0, 50.0);
    assert!(ops.contains(&RenderOp::PlaceMarker {
      pct: crate::solver::geometry::PctPoint { x: 25.0, y: 50.0 },
      ordinal: 1,
    }));
    s.on_pointer(150.0, 75.0);

    assert_eq!(
      s.answer(),
      Answer::Points(vec![Point::new(200, 200), Point::new(600, 300)])
    );
    let payload = serde_json::json!({ "answers": s.answer() });
    assert_eq!(payload.to_string(), r#"{"answers":[[200,200],[600,300]]}"#);
  }

  #[test]
  fn pointer_before_image_load_is_dropped() {
    let mut s = SolverSession::new(
      "task-0",
      RequestType::Canvas,
      T,
      Arc::new(ManualClock::at(T)),
      SurfaceSize::new(100.0, 100.0),
    );
    assert!(s.on_pointer(10.0, 10.0).is_empty());
    assert!(s.answer().is_empty());
  }

  #[test]
  fn image_load_is_idempotent() {
    let mut s = canvas_session(ManualClock::at(T));
    assert!(s.on_image_loaded(Extent::new(800, 400)).is_empty());
  }

  #[test]
  fn grid_toggles_cells_and_preview() {
    let mut s = SolverSession::new(
      "task-3",
      RequestType::Grid,
      T,
      Arc::new(ManualClock::at(T)),
      SurfaceSize::new(300.0, 300.0),
    );
    let init = s.on_image_loaded(Extent::new(300, 300));
    assert!(init.contains(&RenderOp::MountGrid { rows: 3, cols: 3 }));

    let ops = s.on_tile_click(7);
    assert!(ops.contains(&RenderOp::SetCellSelected { index: 7, selected: true }));
    s.on_tile_click(2);
    let ops = s.on_tile_click(7);
    assert!(ops.contains(&RenderOp::SetCellSelected { index: 7, selected: false }));
    assert!(ops.contains(&RenderOp::Preview("Selected tiles: 2".into())));

    assert_eq!(s.answer(), Answer::Tiles(vec![2]));
    assert!(s.on_tile_click(9).is_empty()); // out of the 3x3 range
  }

  #[test]
  fn drag_pairs_draw_lines_and_resize_relayouts_them() {
    let mut s = drag_session();

    let ops = s.on_pointer(40.0, 40.0);
    assert!(ops.contains(&RenderOp::Preview(DRAG_END_PROMPT.into())));
    assert!(matches!(ops[0], RenderOp::PlaceDragPoint { role: DragRole::Start, .. }));

    let ops = s.on_pointer(160.0, 200.0);
    let line = ops.iter().find_map(|op| match op {
      RenderOp::LayoutLine { index, layout } => Some((*index, *layout)),
      _ => None,
    });
    let (index, layout) = line.expect("completed pair draws a line");
    assert_eq!(index, 0);
    // Endpoints 10%/10% -> 40%/50% on a 400x400 surface: dx=120, dy=160.
    assert!((layout.length_px - 200.0).abs() < 1e-9);

    // Resize: same percentages, new pixels; the answer is untouched.
    let before = s.answer();
    let ops = s.on_resized(SurfaceSize::new(800.0, 800.0));
    assert_eq!(ops.len(), 1);
    let RenderOp::LayoutLine { layout, .. } = &ops[0] else { panic!("expected layout") };
    assert!((layout.length_px - 400.0).abs() < 1e-9);
    assert_eq!(s.answer(), before);
  }

  #[test]
  fn drag_clear_mid_pair_resets_expectation() {
    let mut s = drag_session();
    s.on_pointer(40.0, 40.0); // dangling start
    assert_eq!(s.answer().len(), 1);

    let ops = s.on_clear();
    assert!(ops.contains(&RenderOp::ClearOverlays));
    assert!(ops.contains(&RenderOp::Preview(DRAG_START_PROMPT.into())));
    assert!(s.answer().is_empty());

    // Next click opens a fresh pair again.
    let ops = s.on_pointer(10.0, 10.0);
    assert!(matches!(ops[0], RenderOp::PlaceDragPoint { role: DragRole::Start, .. }));
  }

  #[test]
  fn submit_is_single_flight_and_failure_reopens() {
    let mut s = canvas_session(ManualClock::at(T));
    s.on_pointer(10.0, 10.0);

    let (ops, answer) = s.on_submit_requested();
    assert!(answer.is_some());
    assert!(ops.contains(&RenderOp::SubmitPending));

    // Rapid second request while pending: no second snapshot.
    let (_, answer2) = s.on_submit_requested();
    assert!(answer2.is_none());

    // Editing and clearing are refused while pending.
    assert!(s.on_pointer(20.0, 20.0).is_empty());
    assert!(s.on_clear().is_empty());

    let before = s.answer();
    let ops = s.on_submit_resolved(Err(crate::solver::gate::SubmitError::Rejected(
      "expired".into(),
    )));
    assert!(ops.contains(&RenderOp::SubmitFailed("expired".into())));
    assert!(ops.contains(&RenderOp::SubmitEnabled(true)));
    assert_eq!(s.answer(), before); // answer unchanged
    assert_eq!(s.gate_state(), GateState::Idle);

    // Manual retry, this time accepted: terminal.
    let (_, answer3) = s.on_submit_requested();
    assert!(answer3.is_some());
    let ops = s.on_submit_resolved(Ok(()));
    assert!(ops.contains(&RenderOp::SubmitAccepted));
    assert!(s.on_pointer(30.0, 30.0).is_empty());
    assert!(s.on_clear().is_empty());
  }

  #[test]
  fn empty_or_dangling_answers_never_submit() {
    let mut s = canvas_session(ManualClock::at(T));
    let (_, answer) = s.on_submit_requested();
    assert!(answer.is_none()); // empty

    let mut s = drag_session();
    s.on_pointer(40.0, 40.0); // dangling start
    let (_, answer) = s.on_submit_requested();
    assert!(answer.is_none());
  }

  #[test]
  fn expiry_locks_input_and_submission_permanently() {
    let clock = ManualClock::at(T);
    let mut s = canvas_session(clock.clone());
    s.on_pointer(10.0, 10.0);

    clock.set(T + 121.0);
    let ops = s.tick();
    assert!(ops.contains(&RenderOp::SubmitEnabled(false)));
    assert!(matches!(ops[0], RenderOp::Timer { phase: TimerPhase::Expired, .. }));
    assert!(s.is_expired());

    // Input and submission are gone; the accumulated answer is not.
    assert!(s.on_pointer(20.0, 20.0).is_empty());
    let (_, answer) = s.on_submit_requested();
    assert!(answer.is_none());
    assert_eq!(s.answer().len(), 1);

    // Ticking again re-renders the same expired state without side effects.
    let ops = s.tick();
    assert_eq!(ops.len(), 1);
    assert!(matches!(ops[0], RenderOp::Timer { phase: TimerPhase::Expired, .. }));
  }

  #[test]
  fn timer_phases_render_through_ticks() {
    let clock = ManualClock::at(T + 10.0);
    let mut s = canvas_session(clock.clone());
    assert!(matches!(
      s.tick()[0],
      RenderOp::Timer { phase: TimerPhase::Normal, .. }
    ));
    clock.set(T + 95.0);
    assert!(matches!(
      s.tick()[0],
      RenderOp::Timer { phase: TimerPhase::Warning, .. }
    ));
  }
}
