//! Galilean diffusion for likelihood-constrained sampling.
//!
//! Provides:
//! - Unit-cube walker state with reflecting faces and mirror steps
//! - Ensemble-based and isotropic velocity draws
//! - A self-tuning engine that moves one walker above a likelihood floor
//! - Trial counters and move observers for diagnostics
//!
//! The likelihood, its gradient and the domain/unit transform are supplied
//! by the caller through [`LikelihoodModel`].

pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod model;
pub mod params;
pub mod state;
pub mod walker;

pub use diagnostics::{
    DiffusionObserver, MoveKind, MoveRecorder, NoopObserver, RecordedMove, TrialCounters,
};
pub use engine::{GalileanEngine, SHRINK_FACTOR, SHRINK_FLOOR, edge_fraction};
pub use error::{GalileanError, Result};
pub use model::{Dimensionality, LikelihoodModel};
pub use params::{CountMode, EngineParams};
pub use state::{DiffusionState, mirror_velocity, reflect_component};
pub use walker::{Ensemble, Walker};

/// Dynamic vector.
pub type DVec = nalgebra::DVector<f64>;
