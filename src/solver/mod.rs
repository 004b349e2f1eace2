//! The answer-capture engine.
//!
//! Everything a solve surface needs to turn raw pointer input into a
//! well-formed answer payload: coordinate mapping (`geometry`), per-mode
//! answer state (`answer`), the countdown lifecycle (`timer`), at-most-once
//! submission (`gate`), and the per-challenge session wiring it all to an
//! injected surface, image handle, submit endpoint and clock (`session`).
//!
//! The engine renders nothing itself; it emits `RenderOp` instructions and
//! can therefore run headless, which is how the integration tests drive it.

pub mod answer;
pub mod gate;
pub mod geometry;
pub mod session;
pub mod timer;

pub use answer::{Answer, AnswerAccumulator, DragPhase};
pub use gate::{GateState, HttpSubmitEndpoint, SubmissionGate, SubmitEndpoint, SubmitError};
pub use geometry::{CoordinateMapper, Extent, Point, SurfaceSize};
pub use session::{run_solver, RenderOp, RenderSurface, SolverEvent, SolverSession};
pub use timer::{ExpiryTimer, TimerPhase};
