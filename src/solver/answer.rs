//! Answer shapes and the per-mode accumulator.
//!
//! The accumulator is the only holder of capture state: every accepted user
//! action mutates it synchronously and atomically, and the submit payload is
//! always a snapshot of it. Rendering previews and overlays derive from it,
//! never the other way around.

use serde::{Deserialize, Serialize};

use crate::domain::RequestType;
use crate::solver::geometry::Point;

/// Grid answers address a fixed 3x3 overlay.
pub const GRID_CELLS: usize = 9;

/// The structured answer as it goes over the wire.
///
/// - Grid: flat array of tile indices, e.g. `[0, 3, 7]`
/// - Canvas: array of `[x, y]` pairs in click order
/// - Drag: array of `[x, y]` pairs, even length, consecutive pairs are
///   (start, end)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
  Tiles(Vec<usize>),
  Points(Vec<Point>),
}

impl Answer {
  pub fn len(&self) -> usize {
    match self {
      Answer::Tiles(v) => v.len(),
      Answer::Points(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Parse and validate a submitted payload against the task's mode.
  ///
  /// Shape violations come back as the human-readable reason the submit
  /// endpoint returns verbatim.
  pub fn parse_for(mode: RequestType, raw: &serde_json::Value) -> Result<Answer, String> {
    match mode {
      RequestType::Grid => {
        let tiles: Vec<usize> = serde_json::from_value(raw.clone())
          .map_err(|_| "Grid answers must be an array of tile indices".to_string())?;
        if tiles.iter().any(|&t| t >= GRID_CELLS) {
          return Err(format!("Grid tile indices must be below {GRID_CELLS}"));
        }
        let mut seen = [false; GRID_CELLS];
        for &t in &tiles {
          if seen[t] {
            return Err("Grid answers must not repeat a tile".to_string());
          }
          seen[t] = true;
        }
        Ok(Answer::Tiles(tiles))
      }
      RequestType::Canvas => {
        let points: Vec<Point> = serde_json::from_value(raw.clone())
          .map_err(|_| "Canvas answers must be an array of [x, y] pairs".to_string())?;
        Ok(Answer::Points(points))
      }
      RequestType::Drag => {
        let points: Vec<Point> = serde_json::from_value(raw.clone())
          .map_err(|_| "Drag answers must be an array of [x, y] pairs".to_string())?;
        if points.len() % 2 != 0 {
          return Err("Drag answers must pair every start with an end".to_string());
        }
        Ok(Answer::Points(points))
      }
    }
  }
}

/// Directed-pair capture alternates between these two expectations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
  ExpectingStart,
  ExpectingEnd,
}

/// Type-specific state holder behind the three challenge modes.
#[derive(Clone, Debug)]
pub enum AnswerAccumulator {
  /// Tile membership with toggle semantics; insertion order kept.
  Tiles(Vec<usize>),
  /// Ordered clicks; append-only (clear-all is the only correction).
  Points(Vec<Point>),
  /// Flat start/end sequence; may carry a trailing unpaired start.
  Pairs(Vec<Point>),
}

impl AnswerAccumulator {
  pub fn for_mode(mode: RequestType) -> Self {
    match mode {
      RequestType::Grid => AnswerAccumulator::Tiles(Vec::new()),
      RequestType::Canvas => AnswerAccumulator::Points(Vec::new()),
      RequestType::Drag => AnswerAccumulator::Pairs(Vec::new()),
    }
  }

  /// Toggle a tile in or out. Returns the new membership, or None when the
  /// accumulator isn't tile-based.
  pub fn toggle(&mut self, index: usize) -> Option<bool> {
    let AnswerAccumulator::Tiles(tiles) = self else { return None };
    if let Some(pos) = tiles.iter().position(|&t| t == index) {
      tiles.remove(pos);
      Some(false)
    } else {
      tiles.push(index);
      Some(true)
    }
  }

  /// Append a click. Returns the 1-based ordinal for the marker label, or
  /// None when the accumulator isn't point-based.
  pub fn append_point(&mut self, p: Point) -> Option<usize> {
    let AnswerAccumulator::Points(points) = self else { return None };
    points.push(p);
    Some(points.len())
  }

  /// Append to the open pair. Returns the expectation AFTER the append, or
  /// None when the accumulator isn't pair-based.
  pub fn append_pair_point(&mut self, p: Point) -> Option<DragPhase> {
    let AnswerAccumulator::Pairs(points) = self else { return None };
    points.push(p);
    Some(parity_phase(points.len()))
  }

  /// Current directed-pair expectation (pair-based accumulators only).
  pub fn expecting(&self) -> Option<DragPhase> {
    match self {
      AnswerAccumulator::Pairs(points) => Some(parity_phase(points.len())),
      _ => None,
    }
  }

  pub fn len(&self) -> usize {
    match self {
      AnswerAccumulator::Tiles(v) => v.len(),
      AnswerAccumulator::Points(v) => v.len(),
      AnswerAccumulator::Pairs(v) => v.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Ready iff submitting now would be well-formed: non-empty, and for
  /// directed pairs also even (no dangling unpaired start).
  pub fn is_ready(&self) -> bool {
    match self {
      AnswerAccumulator::Tiles(v) => !v.is_empty(),
      AnswerAccumulator::Points(v) => !v.is_empty(),
      AnswerAccumulator::Pairs(v) => !v.is_empty() && v.len() % 2 == 0,
    }
  }

  /// Reset to empty; for pairs this also resets the expectation to "start"
  /// (parity-derived, so it falls out of the empty sequence).
  pub fn clear(&mut self) {
    match self {
      AnswerAccumulator::Tiles(v) => v.clear(),
      AnswerAccumulator::Points(v) => v.clear(),
      AnswerAccumulator::Pairs(v) => v.clear(),
    }
  }

  /// Tile indices sorted ascending, for display only. Submission keeps
  /// insertion order.
  pub fn sorted_tiles(&self) -> Vec<usize> {
    match self {
      AnswerAccumulator::Tiles(v) => {
        let mut sorted = v.clone();
        sorted.sort_unstable();
        sorted
      }
      _ => Vec::new(),
    }
  }

  /// Snapshot for submission.
  pub fn snapshot(&self) -> Answer {
    match self {
      AnswerAccumulator::Tiles(v) => Answer::Tiles(v.clone()),
      AnswerAccumulator::Points(v) => Answer::Points(v.clone()),
      AnswerAccumulator::Pairs(v) => Answer::Points(v.clone()),
    }
  }
}

fn parity_phase(len: usize) -> DragPhase {
  if len % 2 == 0 {
    DragPhase::ExpectingStart
  } else {
    DragPhase::ExpectingEnd
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tile_toggle_tracks_odd_parity() {
    let mut acc = AnswerAccumulator::for_mode(RequestType::Grid);
    // 4 toggled twice, 0 and 7 once: the set is {0, 7}.
    for i in [4, 0, 7, 4] {
      acc.toggle(i);
    }
    assert_eq!(acc.snapshot(), Answer::Tiles(vec![0, 7]));
    assert!(acc.is_ready());
    acc.toggle(0);
    acc.toggle(7);
    assert!(!acc.is_ready());
  }

  #[test]
  fn tile_display_order_is_sorted_but_submission_order_is_not() {
    let mut acc = AnswerAccumulator::for_mode(RequestType::Grid);
    for i in [8, 2, 5] {
      acc.toggle(i);
    }
    assert_eq!(acc.sorted_tiles(), vec![2, 5, 8]);
    assert_eq!(acc.snapshot(), Answer::Tiles(vec![8, 2, 5]));
  }

  #[test]
  fn points_append_in_click_order_with_duplicates() {
    let mut acc = AnswerAccumulator::for_mode(RequestType::Canvas);
    assert_eq!(acc.append_point(Point::new(1, 2)), Some(1));
    assert_eq!(acc.append_point(Point::new(1, 2)), Some(2));
    assert_eq!(
      acc.snapshot(),
      Answer::Points(vec![Point::new(1, 2), Point::new(1, 2)])
    );
    assert!(acc.is_ready());
  }

  #[test]
  fn pairs_alternate_expectation_and_gate_on_evenness() {
    let mut acc = AnswerAccumulator::for_mode(RequestType::Drag);
    assert_eq!(acc.expecting(), Some(DragPhase::ExpectingStart));
    assert!(!acc.is_ready());

    assert_eq!(acc.append_pair_point(Point::new(0, 0)), Some(DragPhase::ExpectingEnd));
    assert!(!acc.is_ready()); // dangling start

    assert_eq!(acc.append_pair_point(Point::new(9, 9)), Some(DragPhase::ExpectingStart));
    assert!(acc.is_ready());

    acc.append_pair_point(Point::new(3, 3));
    assert_eq!(acc.len(), 3);
    assert!(!acc.is_ready());
  }

  #[test]
  fn clear_resets_every_mode_including_mid_pair() {
    for mode in [RequestType::Grid, RequestType::Canvas, RequestType::Drag] {
      let mut acc = AnswerAccumulator::for_mode(mode);
      match mode {
        RequestType::Grid => {
          acc.toggle(3);
        }
        RequestType::Canvas => {
          acc.append_point(Point::new(5, 5));
        }
        RequestType::Drag => {
          acc.append_pair_point(Point::new(5, 5)); // mid-pair
          assert_eq!(acc.expecting(), Some(DragPhase::ExpectingEnd));
        }
      }
      acc.clear();
      assert!(acc.is_empty());
      assert!(!acc.is_ready());
      if mode == RequestType::Drag {
        assert_eq!(acc.expecting(), Some(DragPhase::ExpectingStart));
      }
    }
  }

  #[test]
  fn wrong_mode_operations_are_refused() {
    let mut acc = AnswerAccumulator::for_mode(RequestType::Canvas);
    assert_eq!(acc.toggle(1), None);
    assert_eq!(acc.append_pair_point(Point::new(1, 1)), None);
    assert_eq!(acc.expecting(), None);
  }

  #[test]
  fn answers_serialize_per_mode() {
    let tiles = Answer::Tiles(vec![0, 3, 7]);
    assert_eq!(serde_json::to_string(&tiles).expect("ser"), "[0,3,7]");

    let points = Answer::Points(vec![Point::new(200, 200), Point::new(600, 300)]);
    assert_eq!(
      serde_json::to_string(&points).expect("ser"),
      "[[200,200],[600,300]]"
    );
  }

  #[test]
  fn parse_validates_grid_shape() {
    let ok = Answer::parse_for(RequestType::Grid, &serde_json::json!([2, 0, 8])).expect("ok");
    assert_eq!(ok, Answer::Tiles(vec![2, 0, 8]));

    assert!(Answer::parse_for(RequestType::Grid, &serde_json::json!([9])).is_err());
    assert!(Answer::parse_for(RequestType::Grid, &serde_json::json!([1, 1])).is_err());
    assert!(Answer::parse_for(RequestType::Grid, &serde_json::json!([[1, 2]])).is_err());
  }

  #[test]
  fn parse_validates_drag_evenness() {
    let raw = serde_json::json!([[1, 2], [3, 4], [5, 6]]);
    assert!(Answer::parse_for(RequestType::Drag, &raw).is_err());

    let raw = serde_json::json!([[1, 2], [3, 4]]);
    let parsed = Answer::parse_for(RequestType::Drag, &raw).expect("ok");
    assert_eq!(parsed.len(), 2);
  }
}
