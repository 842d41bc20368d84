//! Galilean diffusion engine.
//!
//! Moves a walker in straight lines through the unit cube. When a step leaves
//! the region above the likelihood floor, the velocity is mirrored on the
//! iso-likelihood surface at the interpolated edge; when that fails too, the
//! velocity is reversed with a random perturbation.

use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::{
    CountMode, DVec, DiffusionObserver, DiffusionState, EngineParams, Ensemble, GalileanError,
    LikelihoodModel, MoveKind, NoopObserver, Result, TrialCounters, Walker,
};

/// Step size multiplier applied when a call exhausts its trial budget.
pub const SHRINK_FACTOR: f64 = 0.9;

/// Added after shrinking so the step size never collapses to zero.
pub const SHRINK_FLOOR: f64 = 1e-5;

/// Velocity scale used when reversing after a failed mirror.
const REVERSE_SIZE: f64 = 1.0;

/// Fraction of a rejected step that lies above the likelihood floor,
/// by linear interpolation between the current and the trial likelihood.
pub fn edge_fraction(current: f64, floor: f64, trial: f64) -> f64 {
    let f = (current - floor) / (current - trial);
    if f.is_finite() {
        f.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Write `values` into the `fit_index` entries of `target`.
fn scatter(target: &mut DVec, fit_index: &[usize], values: &DVec) {
    for (&k, &v) in fit_index.iter().zip(values.iter()) {
        target[k] = v;
    }
}

/// Long-lived diffusion engine, one per sampling run (or per walker thread).
///
/// The step size and the random generator are the only state carried from
/// one call to the next; the step size changes only when a call runs out of
/// trials, see [`SHRINK_FACTOR`].
#[derive(Debug, Clone)]
pub struct GalileanEngine<R = StdRng> {
    params: EngineParams,
    step_size: f64,
    rng: R,
    counters: TrialCounters,
}

impl GalileanEngine<StdRng> {
    /// Create an engine seeded from `params.seed`.
    pub fn new(params: EngineParams) -> Result<Self> {
        let rng = StdRng::seed_from_u64(params.seed);
        Self::with_rng(params, rng)
    }

    /// Copy of this engine's tuning with a fresh generator and zeroed counters.
    pub fn fork(&self, seed: u64) -> Self {
        Self {
            params: EngineParams {
                seed,
                ..self.params.clone()
            },
            step_size: self.step_size,
            rng: StdRng::seed_from_u64(seed),
            counters: TrialCounters::default(),
        }
    }
}

impl Default for GalileanEngine<StdRng> {
    fn default() -> Self {
        let params = EngineParams::default();
        Self {
            step_size: params.step_size,
            rng: StdRng::seed_from_u64(params.seed),
            params,
            counters: TrialCounters::default(),
        }
    }
}

impl<R: Rng> GalileanEngine<R> {
    /// Create an engine drawing from `rng`; `params.seed` is not used.
    pub fn with_rng(params: EngineParams, rng: R) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            step_size: params.step_size,
            params,
            rng,
            counters: TrialCounters::default(),
        })
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// Current mean step length in unit space.
    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn set_step_size(&mut self, step_size: f64) -> Result<()> {
        if !(step_size.is_finite() && step_size > 0.0) {
            return Err(GalileanError::InvalidParameter(format!(
                "step_size must be positive and finite, got {}",
                step_size
            )));
        }
        self.step_size = step_size;
        Ok(())
    }

    pub fn counters(&self) -> &TrialCounters {
        &self.counters
    }

    pub fn reset_counters(&mut self) {
        self.counters.reset();
    }

    /// Diffuse `walker` while keeping its log-likelihood at or above `low_lhood`.
    ///
    /// See [`GalileanEngine::execute_observed`].
    pub fn execute<M, E>(
        &mut self,
        walker: &mut Walker,
        ensemble: &E,
        model: &M,
        low_lhood: f64,
    ) -> Result<usize>
    where
        M: LikelihoodModel + ?Sized,
        E: Ensemble + ?Sized,
    {
        self.execute_observed(walker, ensemble, model, low_lhood, &mut NoopObserver)
    }

    /// Diffuse `walker`, reporting every proposed move to `observer`.
    ///
    /// The walker ends at its last accepted position, which is its starting
    /// position when no trial was accepted. Returns the number of moves as
    /// selected by [`CountMode`]. On error the walker is left untouched.
    /// The observer's `stop` is called whether or not the call succeeds.
    pub fn execute_observed<M, E, O>(
        &mut self,
        walker: &mut Walker,
        ensemble: &E,
        model: &M,
        low_lhood: f64,
        observer: &mut O,
    ) -> Result<usize>
    where
        M: LikelihoodModel + ?Sized,
        E: Ensemble + ?Sized,
        O: DiffusionObserver + ?Sized,
    {
        observer.start();
        let result = self.diffuse(walker, ensemble, model, low_lhood, observer);
        observer.stop();
        result
    }

    fn diffuse<M, E, O>(
        &mut self,
        walker: &mut Walker,
        ensemble: &E,
        model: &M,
        low_lhood: f64,
        observer: &mut O,
    ) -> Result<usize>
    where
        M: LikelihoodModel + ?Sized,
        E: Ensemble + ?Sized,
        O: DiffusionObserver + ?Sized,
    {
        walker.validate_fit_index()?;
        let fit_index = walker.fit_index.clone();
        let mut current = walker.parameters.clone();
        let mut lhood = walker.log_likelihood;

        let mut state = DiffusionState::new(
            model,
            ensemble,
            &fit_index,
            &current,
            self.step_size,
            &mut self.rng,
        )?;

        let target = self.draw_target_steps();
        let max_trials = self.params.max_trials_factor.saturating_mul(target);

        let mut ptry = current.clone();
        let mut ltry = lhood;
        let mut inside = 0usize;
        let mut steps = 0usize;
        let mut trials = 0usize;

        loop {
            trials += 1;
            state.refresh_position(&current)?;

            match inside {
                0 => {
                    scatter(&mut ptry, &fit_index, &state.step(1.0)?);
                    observer.moved(&current, &ptry, MoveKind::Free);
                }
                1 => {
                    let f = edge_fraction(lhood, low_lhood, ltry);
                    let mut pedge = current.clone();
                    scatter(&mut pedge, &fit_index, &state.step(f)?);
                    let gradient = model.partial_log_likelihood(&pedge, &fit_index)?;
                    observer.moved(&current, &pedge, MoveKind::ToEdge);

                    state.mirror(&gradient)?;
                    scatter(&mut ptry, &fit_index, &state.step(1.0 - f)?);
                    observer.moved(&pedge, &ptry, MoveKind::Mirrored);
                }
                _ => {
                    state.reverse_velocity(REVERSE_SIZE, &mut self.rng)?;
                    scatter(&mut ptry, &fit_index, &state.step(1.0)?);
                    observer.moved(&current, &ptry, MoveKind::Reversed);
                }
            }

            ltry = model.log_likelihood(&ptry)?;
            let accepted = ltry >= low_lhood;
            trace!(trial = trials, inside, ltry, accepted, "galilean trial");

            if accepted {
                current.copy_from(&ptry);
                lhood = ltry;
                self.counters.success += 1;
                inside = 0;
                steps += 1;
            } else {
                inside += 1;
                if inside == 1 {
                    self.counters.reject += 1;
                } else {
                    self.counters.failed += 1;
                }
            }

            if steps >= target || trials >= max_trials {
                break;
            }
        }

        let npar = current.len();
        walker.parameters = current;
        walker.log_likelihood = lhood;

        if steps < target {
            self.shrink_step_size();
        }
        debug!(
            target,
            trials,
            steps,
            step_size = self.step_size,
            "galilean call finished"
        );

        Ok(match self.params.count_mode {
            CountMode::Accepted => steps,
            CountMode::MoveSize if steps > 0 => npar,
            CountMode::MoveSize => 0,
        })
    }

    /// Target number of accepted steps for one call, between
    /// `target_steps` and `2 * target_steps - 1`.
    fn draw_target_steps(&mut self) -> usize {
        let u: f64 = self.rng.gen_range(0.0..1.0);
        ((self.params.target_steps as f64 * (1.0 + u)) as usize).max(1)
    }

    fn shrink_step_size(&mut self) {
        let old = self.step_size;
        self.step_size = old * SHRINK_FACTOR + SHRINK_FLOOR;
        debug!(old, new = self.step_size, "trial budget exhausted, shrinking step size");
    }
}

impl<R> fmt::Display for GalileanEngine<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GalileanEngine")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Identity transform on [0,1]^d, log-likelihood `offset + sum(x)`.
    struct Slope {
        offset: f64,
    }

    impl LikelihoodModel for Slope {
        fn log_likelihood(&self, parameters: &DVec) -> Result<f64> {
            Ok(self.offset + parameters.sum())
        }

        fn partial_log_likelihood(&self, _parameters: &DVec, fit_index: &[usize]) -> Result<DVec> {
            Ok(DVec::from_element(fit_index.len(), 1.0))
        }

        fn domain_to_unit(&self, parameters: &DVec, fit_index: &[usize]) -> Result<DVec> {
            Ok(DVec::from_fn(fit_index.len(), |i, _| parameters[fit_index[i]]))
        }

        fn unit_to_domain(&self, unit: &DVec, _fit_index: &[usize]) -> Result<DVec> {
            Ok(unit.clone())
        }
    }

    fn ensemble() -> Vec<Walker> {
        [0.2, 0.8, 0.4, 0.6]
            .iter()
            .map(|&x| Walker::new(DVec::from_vec(vec![x, 1.0 - x]), x))
            .collect()
    }

    #[test]
    fn test_edge_fraction() {
        assert_relative_eq!(edge_fraction(0.0, -1.0, -4.0), 0.25);
        assert_eq!(edge_fraction(-2.0, -1.0, -4.0), 0.0);
        assert_eq!(edge_fraction(0.0, -1.0, f64::NEG_INFINITY), 0.0);
        assert_eq!(edge_fraction(0.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn test_display_and_defaults() {
        let engine = GalileanEngine::default();
        assert_eq!(engine.to_string(), "GalileanEngine");
        assert_eq!(engine.step_size(), 0.5);
        assert_eq!(engine.params().target_steps, 3);
        assert_eq!(engine.counters().total(), 0);
    }

    #[test]
    fn test_new_rejects_invalid_params() {
        let params = EngineParams {
            max_trials_factor: 0,
            ..Default::default()
        };
        assert!(matches!(
            GalileanEngine::new(params),
            Err(GalileanError::InvalidParameter(_))
        ));

        let mut engine = GalileanEngine::default();
        assert!(engine.set_step_size(-1.0).is_err());
        assert!(engine.set_step_size(0.1).is_ok());
        assert_eq!(engine.step_size(), 0.1);
    }

    #[test]
    fn test_draw_target_steps_range() {
        let mut engine = GalileanEngine::default();
        for _ in 0..500 {
            let n = engine.draw_target_steps();
            assert!((3..=5).contains(&n));
        }
    }

    #[test]
    fn test_partial_fit_index_keeps_other_parameters() {
        let walkers = ensemble();
        let model = Slope { offset: 0.0 };
        let mut walker = Walker::evaluated(&model, DVec::from_vec(vec![0.5, 0.3]))
            .unwrap()
            .with_fit_index(vec![0]);
        let mut engine = GalileanEngine::default();

        engine.execute(&mut walker, &walkers, &model, -10.0).unwrap();
        assert_eq!(walker.parameters[1], 0.3);
        assert_relative_eq!(walker.log_likelihood, walker.parameters.sum());
    }

    #[test]
    fn test_move_size_count_mode() {
        let walkers = ensemble();
        let model = Slope { offset: 0.0 };
        let params = EngineParams {
            count_mode: CountMode::MoveSize,
            ..Default::default()
        };
        let mut engine = GalileanEngine::new(params).unwrap();
        let mut walker = Walker::evaluated(&model, DVec::from_vec(vec![0.5, 0.5])).unwrap();

        let moves = engine.execute(&mut walker, &walkers, &model, -10.0).unwrap();
        assert_eq!(moves, 2);

        // Unreachable floor: nothing accepted.
        let moves = engine.execute(&mut walker, &walkers, &model, 10.0).unwrap();
        assert_eq!(moves, 0);
    }

    #[test]
    fn test_invalid_fit_index_is_rejected() {
        let walkers = ensemble();
        let model = Slope { offset: 0.0 };
        let mut walker = Walker::new(DVec::from_vec(vec![0.5, 0.5]), 1.0).with_fit_index(vec![3]);
        let mut engine = GalileanEngine::default();
        assert!(matches!(
            engine.execute(&mut walker, &walkers, &model, 0.0),
            Err(GalileanError::InvalidFitIndex(_))
        ));
    }

    #[test]
    fn test_fork_keeps_tuning() {
        let mut engine = GalileanEngine::default();
        engine.set_step_size(0.2).unwrap();
        engine.counters.success = 4;

        let forked = engine.fork(11);
        assert_eq!(forked.step_size(), 0.2);
        assert_eq!(forked.params().seed, 11);
        assert_eq!(forked.counters().total(), 0);
    }

    #[test]
    fn test_huge_trial_factor_saturates() {
        let walkers = ensemble();
        let model = Slope { offset: 0.0 };
        let params = EngineParams {
            target_steps: 1,
            max_trials_factor: usize::MAX,
            ..Default::default()
        };
        let mut engine = GalileanEngine::new(params).unwrap();
        let mut walker = Walker::evaluated(&model, DVec::from_vec(vec![0.5, 0.5])).unwrap();

        let moves = engine.execute(&mut walker, &walkers, &model, -10.0).unwrap();
        assert_eq!(moves, 1);
        assert_eq!(engine.step_size(), 0.5);
    }

    #[test]
    fn test_counters_accumulate_over_calls() {
        let walkers = ensemble();
        let model = Slope { offset: 0.0 };
        let mut engine = GalileanEngine::default();
        let mut walker = Walker::evaluated(&model, DVec::from_vec(vec![0.5, 0.5])).unwrap();

        let first = engine.execute(&mut walker, &walkers, &model, -10.0).unwrap();
        let second = engine.execute(&mut walker, &walkers, &model, -10.0).unwrap();
        assert_eq!(engine.counters().success, first + second);
        assert_eq!(engine.counters().reject, 0);

        engine.reset_counters();
        assert_eq!(engine.counters().total(), 0);
    }
}
