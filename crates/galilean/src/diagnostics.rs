//! Trial bookkeeping and move observation.

use serde::{Deserialize, Serialize};

use crate::DVec;

/// Outcome counts accumulated by an engine over all its calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialCounters {
    /// Trials whose candidate met the likelihood floor.
    pub success: usize,
    /// First rejection after an accepted (or initial) position.
    pub reject: usize,
    /// Rejections after the mirror or reverse step also failed.
    pub failed: usize,
}

impl TrialCounters {
    pub fn total(&self) -> usize {
        self.success + self.reject + self.failed
    }

    pub fn acceptance_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            self.success as f64 / total as f64
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Which branch of the trial state machine produced a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// Full step along the current velocity.
    Free,
    /// Partial step onto the interpolated likelihood edge.
    ToEdge,
    /// Remainder of the step after mirroring on the edge.
    Mirrored,
    /// Full step after reversing the velocity.
    Reversed,
}

/// Hook notified of engine progress, for visualization.
///
/// Observers only see copies of the engine's points and cannot steer it.
pub trait DiffusionObserver {
    fn start(&mut self) {}

    /// A proposed move from `from` to `to`, both full domain parameter vectors.
    fn moved(&mut self, _from: &DVec, _to: &DVec, _kind: MoveKind) {}

    fn stop(&mut self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl DiffusionObserver for NoopObserver {}

/// One recorded move segment.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMove {
    pub from: DVec,
    pub to: DVec,
    pub kind: MoveKind,
}

/// Observer that keeps every move segment, e.g. for plotting trajectories.
#[derive(Debug, Clone, Default)]
pub struct MoveRecorder {
    pub moves: Vec<RecordedMove>,
    /// Completed calls.
    pub calls: usize,
    running: bool,
}

impl MoveRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded moves of the given kind.
    pub fn count(&self, kind: MoveKind) -> usize {
        self.moves.iter().filter(|m| m.kind == kind).count()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn clear(&mut self) {
        self.moves.clear();
        self.calls = 0;
        self.running = false;
    }
}

impl DiffusionObserver for MoveRecorder {
    fn start(&mut self) {
        self.running = true;
    }

    fn moved(&mut self, from: &DVec, to: &DVec, kind: MoveKind) {
        self.moves.push(RecordedMove {
            from: from.clone(),
            to: to.clone(),
            kind,
        });
    }

    fn stop(&mut self) {
        self.running = false;
        self.calls += 1;
    }
}
