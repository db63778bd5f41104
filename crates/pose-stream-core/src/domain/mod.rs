//! Domain entities for pose-stream.
//!
//! Pure flow-control logic with no infrastructure dependencies.  Nothing in
//! this module reads a clock on its own: every time-dependent operation takes
//! the current [`std::time::Instant`] as a parameter, so the caller decides
//! what "now" is (a tokio interval tick in production, a fixed instant in
//! tests).

/// Frames, dimensions, and capture errors.
pub mod frame;

/// The single-slot backpressure gate.
pub mod gate;

/// Minimum-interval send throttling.
pub mod rate_limit;

/// Session context (the selected exercise).
pub mod session;
