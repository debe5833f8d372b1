//! Recompute coalescing.
//!
//! At most one recomputation runs per engine. Requests that arrive while a
//! pass is in flight are folded into a single follow-up pass: the running
//! pass sees that a newer token was requested when it finishes and runs
//! again, so the final commit always reflects the latest visibility.
//!
//! ```text
//!            request()                 begin_commit()           finish(t)
//!   Idle ──────────────► Resolving ──────────────────► Committing ────────► Idle
//!                            ▲                                     │
//!                            └──────────── Again(newer token) ◄────┘
//! ```

use parking_lot::Mutex;

use crate::aggregator::AggregationStats;

/// Phase of the recompute state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputePhase {
    Idle,
    Resolving,
    Committing,
}

/// Result of asking the gate for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The caller owns the pass for this token
    Admitted(u64),
    /// A pass is already running; it will pick this request up
    Coalesced,
}

/// Result of finishing a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Newer requests landed during the pass; run again for this token
    Again(u64),
    /// Back to idle
    Done,
}

#[derive(Debug)]
struct GateState {
    phase: RecomputePhase,
    requested: u64,
    /// A coalesced request outlived the pass it was folded into
    pending: bool,
}

/// Single in-flight token guarding recomputation.
///
/// Token and phase live under one lock, so a request can never slip in
/// between a pass deciding it is current and the gate returning to idle.
#[derive(Debug)]
pub struct RecomputeGate {
    state: Mutex<GateState>,
}

impl Default for RecomputeGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RecomputeGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                phase: RecomputePhase::Idle,
                requested: 0,
                pending: false,
            }),
        }
    }

    /// Record a recompute request
    pub fn request(&self) -> Admission {
        let mut state = self.state.lock();
        state.requested += 1;
        if state.phase == RecomputePhase::Idle {
            state.phase = RecomputePhase::Resolving;
            state.pending = false;
            Admission::Admitted(state.requested)
        } else {
            Admission::Coalesced
        }
    }

    /// Move an admitted pass into its commit phase
    pub fn begin_commit(&self) {
        self.state.lock().phase = RecomputePhase::Committing;
    }

    /// Finish the pass that ran for `observed`
    pub fn finish(&self, observed: u64) -> Completion {
        let mut state = self.state.lock();
        if state.requested > observed {
            state.phase = RecomputePhase::Resolving;
            Completion::Again(state.requested)
        } else {
            state.phase = RecomputePhase::Idle;
            Completion::Done
        }
    }

    /// Return to idle without finishing the pass that ran for `observed`.
    ///
    /// Requests coalesced into that pass stay pending until the next
    /// admitted pass.
    pub fn abandon(&self, observed: u64) {
        let mut state = self.state.lock();
        state.phase = RecomputePhase::Idle;
        if state.requested > observed {
            state.pending = true;
        }
    }

    /// Whether coalesced requests were dropped with an abandoned pass
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    pub fn phase(&self) -> RecomputePhase {
        self.state.lock().phase
    }

    /// Latest requested token
    pub fn latest_token(&self) -> u64 {
        self.state.lock().requested
    }
}

/// Resets the gate if an admitted pass is dropped before finishing.
pub(crate) struct PassGuard<'a> {
    gate: &'a RecomputeGate,
    token: u64,
    armed: bool,
}

impl<'a> PassGuard<'a> {
    pub(crate) fn new(gate: &'a RecomputeGate, token: u64) -> Self {
        Self {
            gate,
            token,
            armed: true,
        }
    }

    /// Track the token of the pass now running
    pub(crate) fn advance(&mut self, token: u64) {
        self.token = token;
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.abandon(self.token);
        }
    }
}

/// What a committed recomputation produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Token of the final pass
    pub token: u64,
    /// Passes run, including re-runs for coalesced requests
    pub passes: u32,
    /// Visible nodes at commit
    pub nodes: usize,
    /// Aggregated edges committed
    pub edges: usize,
    /// Counters from the final aggregation
    pub stats: AggregationStats,
}

/// Outcome of [`GraphEngine::recompute`](crate::engine::GraphEngine::recompute)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeOutcome {
    Committed(CommitSummary),
    /// Folded into a pass already in flight
    Coalesced,
}

impl RecomputeOutcome {
    pub fn summary(&self) -> Option<&CommitSummary> {
        match self {
            Self::Committed(summary) => Some(summary),
            Self::Coalesced => None,
        }
    }

    pub fn is_coalesced(&self) -> bool {
        matches!(self, Self::Coalesced)
    }
}
