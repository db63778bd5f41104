//! Single-slot backpressure gate.
//!
//! # Why a gate? (for beginners)
//!
//! The capture loop can produce frames far faster than the pose backend can
//! evaluate them.  If every captured frame were sent, frames would pile up in
//! socket buffers and on the server, and each result would describe a pose
//! from further and further in the past.
//!
//! The gate is windowed flow control with a window size of one:
//!
//! ```text
//! open ──send──► closed ──pose_result──► open
//!                  │
//!                  └──send failed──► open
//! ```
//!
//! The gate is closed *at the moment a send is issued*, not after it
//! completes, so two consecutive ticks can never both observe it open.
//! Because at most one frame is outstanding, an inbound result needs no frame
//! identifier: it can only belong to that frame.
//!
//! # Forced reopening
//!
//! An acknowledgment timeout may give up on the in-flight frame and
//! [`force_open`](BackpressureGate::force_open) the gate.  The abandoned
//! frame is still owed a result, so the gate remembers one *stale* result per
//! forced reopen.  [`acknowledge`](BackpressureGate::acknowledge) consumes a
//! stale result without opening, which keeps the late answer to an abandoned
//! frame from releasing the frame sent after it.

/// Permission flag: `true` while no frame is awaiting acknowledgment.
///
/// # Examples
///
/// ```rust
/// use pose_stream_core::BackpressureGate;
///
/// let mut gate = BackpressureGate::new();
/// assert!(gate.is_open());
/// gate.close();
/// assert!(!gate.is_open());
/// gate.open();
/// assert!(gate.is_open());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackpressureGate {
    can_send: bool,
    stale_results: u32,
}

impl BackpressureGate {
    /// Creates an open gate (no frame in flight).
    pub fn new() -> Self {
        Self {
            can_send: true,
            stale_results: 0,
        }
    }

    /// Returns `true` if a frame may be sent now.
    pub fn is_open(&self) -> bool {
        self.can_send
    }

    /// Marks a frame as in flight.
    pub fn close(&mut self) {
        self.can_send = false;
    }

    /// Releases the slot after a send that never reached the wire.
    pub fn open(&mut self) {
        self.can_send = true;
    }

    /// Applies an inbound result.
    ///
    /// Returns `true` if the result released the gate, or `false` if it was
    /// the late answer to a frame abandoned by [`force_open`](Self::force_open).
    pub fn acknowledge(&mut self) -> bool {
        if self.stale_results > 0 {
            self.stale_results -= 1;
            return false;
        }
        self.can_send = true;
        true
    }

    /// Gives up on the in-flight frame and releases the slot.  Its result,
    /// if it ever arrives, will be treated as stale.
    pub fn force_open(&mut self) {
        if !self.can_send {
            self.stale_results += 1;
        }
        self.can_send = true;
    }

    /// Starts over for a fresh connection: open, nothing in flight, and no
    /// results owed by the previous one.
    pub fn reset(&mut self) {
        self.can_send = true;
        self.stale_results = 0;
    }

    /// Results still expected for abandoned frames.
    pub fn stale_results(&self) -> u32 {
        self.stale_results
    }
}

impl Default for BackpressureGate {
    fn default() -> Self {
        Self::new()
    }
}
