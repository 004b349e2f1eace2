//! Coordinate spaces for the capture engine.
//!
//! Three spaces are in play:
//! - native: the image's true pixel grid (integers, what gets submitted)
//! - surface: the rendered size of the image/container in CSS pixels
//! - percent: position relative to the image, used for overlay placement so
//!   overlays survive container resizes without re-deriving from native
//!
//! `CoordinateMapper` owns the native/surface scale. Lines are stored as
//! percentage endpoints (`PctLine`) and laid out against the current surface
//! size (`LineLayout`), which is what makes resize a pure re-layout.

use serde::{Deserialize, Serialize};

/// Native image dimensions, fixed once the image resource has loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extent {
  pub width: u32,
  pub height: u32,
}

impl Extent {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

/// Rendered size of the challenge surface. May change on container resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSize {
  pub width: f64,
  pub height: f64,
}

impl SurfaceSize {
  pub fn new(width: f64, height: f64) -> Self {
    Self { width, height }
  }
}

/// A point on the native pixel grid, clamped to [0, extent-1] per axis.
/// Serialized as a `[x, y]` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "[u32; 2]", from = "[u32; 2]")]
pub struct Point {
  pub x: u32,
  pub y: u32,
}

impl Point {
  pub fn new(x: u32, y: u32) -> Self {
    Self { x, y }
  }
}

impl From<Point> for [u32; 2] {
  fn from(p: Point) -> Self {
    [p.x, p.y]
  }
}

impl From<[u32; 2]> for Point {
  fn from(v: [u32; 2]) -> Self {
    Point { x: v[0], y: v[1] }
  }
}

/// Percentage-of-surface position for overlay placement. Never submitted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PctPoint {
  pub x: f64,
  pub y: f64,
}

/// Maps pointer offsets on the rendered surface into native pixels, and
/// native pixels into percentage positions.
#[derive(Clone, Copy, Debug)]
pub struct CoordinateMapper {
  native: Extent,
  surface: SurfaceSize,
}

impl CoordinateMapper {
  pub fn new(native: Extent, surface: SurfaceSize) -> Self {
    Self { native, surface }
  }

  pub fn native(&self) -> Extent {
    self.native
  }

  /// The surface was re-measured; the native extent never changes.
  pub fn set_surface(&mut self, surface: SurfaceSize) {
    self.surface = surface;
  }

  /// Pointer offset (surface px) -> native pixel, rounded and clamped.
  /// Clamping guarantees in-bounds points even when the pointer position is
  /// reported slightly outside the surface.
  pub fn to_native(&self, x: f64, y: f64) -> Point {
    let sx = self.native.width as f64 / self.surface.width;
    let sy = self.native.height as f64 / self.surface.height;
    let nx = (x * sx).clamp(0.0, (self.native.width - 1) as f64);
    let ny = (y * sy).clamp(0.0, (self.native.height - 1) as f64);
    Point::new(nx.round() as u32, ny.round() as u32)
  }

  /// Native pixel -> percentage of the image, for overlay placement.
  pub fn to_percent(&self, p: Point) -> PctPoint {
    PctPoint {
      x: p.x as f64 / self.native.width as f64 * 100.0,
      y: p.y as f64 / self.native.height as f64 * 100.0,
    }
  }
}

/// A drawn drag line, stored as percentage endpoints so any later resize can
/// reproduce the visual losslessly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PctLine {
  pub x1: f64,
  pub y1: f64,
  pub x2: f64,
  pub y2: f64,
}

impl PctLine {
  pub fn new(start: PctPoint, end: PctPoint) -> Self {
    Self { x1: start.x, y1: start.y, x2: end.x, y2: end.y }
  }

  /// Resolve the line against the current surface size: a unit element
  /// anchored at the start point, scaled to `length_px` and rotated by
  /// `angle_deg` (atan2 of the pixel deltas).
  pub fn layout(&self, surface: SurfaceSize) -> LineLayout {
    let x1 = self.x1 / 100.0 * surface.width;
    let y1 = self.y1 / 100.0 * surface.height;
    let x2 = self.x2 / 100.0 * surface.width;
    let y2 = self.y2 / 100.0 * surface.height;
    let dx = x2 - x1;
    let dy = y2 - y1;
    LineLayout {
      left_pct: self.x1,
      top_pct: self.y1,
      length_px: dx.hypot(dy),
      angle_deg: dy.atan2(dx).to_degrees(),
    }
  }
}

/// Concrete placement of one line for the current surface size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineLayout {
  pub left_pct: f64,
  pub top_pct: f64,
  pub length_px: f64,
  pub angle_deg: f64,
}
