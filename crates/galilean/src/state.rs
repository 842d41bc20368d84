//! Per-call walker state in the unit cube.
//!
//! Positions live in `[0,1]^d` over the walker's fit parameters. A step moves
//! along the current velocity and bounces off the cube faces; a mirror
//! reflects the velocity off the iso-likelihood surface.

use rand::Rng;

use crate::error::check_len;
use crate::{DVec, Dimensionality, Ensemble, GalileanError, LikelihoodModel, Result};

/// Reflect `velocity` across the hyperplane orthogonal to `gradient`.
///
/// v' = v - 2 g (g·v) / (g·g)
pub fn mirror_velocity(velocity: &DVec, gradient: &DVec) -> Result<DVec> {
    check_len("gradient", velocity.len(), gradient.len())?;
    let sumsq = gradient.dot(gradient);
    if sumsq == 0.0 || !sumsq.is_finite() {
        return Err(GalileanError::NumericalDegeneracy(format!(
            "cannot mirror on gradient with squared norm {}",
            sumsq
        )));
    }
    let inprod = gradient.dot(velocity);
    Ok(velocity - gradient * (2.0 * inprod / sumsq))
}

/// Bounce one coordinate off the faces of `[0,1]`.
///
/// Faces at 0 are handled before faces at 1, the second test seeing the
/// result of the first. An overshoot of more than one cube width is folded
/// with the period-2 billiard map.
pub fn reflect_component(p: f64, v: f64) -> Result<(f64, f64)> {
    if !p.is_finite() {
        return Err(GalileanError::NumericalDegeneracy(format!(
            "non-finite unit position {}",
            p
        )));
    }

    let (mut q, mut w) = (p, v);
    if q <= 0.0 {
        q = -q;
        w = -w;
    }
    if q >= 1.0 {
        q = 2.0 - q;
        w = -w;
    }
    if (0.0..=1.0).contains(&q) {
        return Ok((q, w));
    }

    let folded = p.rem_euclid(2.0);
    if folded <= 1.0 {
        Ok((folded, v))
    } else {
        Ok((2.0 - folded, -v))
    }
}

/// Position and velocity of one walker over its fit parameters.
pub struct DiffusionState<'a, M: ?Sized, E: ?Sized> {
    model: &'a M,
    ensemble: &'a E,
    fit_index: &'a [usize],
    dimensionality: Dimensionality,
    range: DVec,
    position: DVec,
    velocity: DVec,
}

impl<'a, M, E> DiffusionState<'a, M, E>
where
    M: LikelihoodModel + ?Sized,
    E: Ensemble + ?Sized,
{
    /// Place the walker at `parameters` and draw an initial velocity of scale `size`.
    pub fn new<R: Rng + ?Sized>(
        model: &'a M,
        ensemble: &'a E,
        fit_index: &'a [usize],
        parameters: &DVec,
        size: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let ndim = fit_index.len();
        let range = model.unit_range(fit_index);
        check_len("unit range", ndim, range.len())?;

        let mut state = Self {
            model,
            ensemble,
            fit_index,
            dimensionality: model.dimensionality(),
            range,
            position: DVec::zeros(ndim),
            velocity: DVec::zeros(ndim),
        };
        state.refresh_position(parameters)?;
        state.init_velocity(size, rng)?;
        Ok(state)
    }

    pub fn ndim(&self) -> usize {
        self.fit_index.len()
    }

    pub fn position(&self) -> &DVec {
        &self.position
    }

    pub fn velocity(&self) -> &DVec {
        &self.velocity
    }

    pub fn set_velocity(&mut self, velocity: DVec) -> Result<()> {
        check_len("velocity", self.ndim(), velocity.len())?;
        self.velocity = velocity;
        Ok(())
    }

    /// Recompute the unit position from domain parameters.
    pub fn refresh_position(&mut self, parameters: &DVec) -> Result<()> {
        self.position = self.unit_of(parameters)?;
        Ok(())
    }

    fn unit_of(&self, parameters: &DVec) -> Result<DVec> {
        let unit = self.model.domain_to_unit(parameters, self.fit_index)?;
        check_len("unit position", self.ndim(), unit.len())?;
        Ok(unit)
    }

    /// Draw a fresh velocity of scale `size`, replacing the current one.
    pub fn init_velocity<R: Rng + ?Sized>(&mut self, size: f64, rng: &mut R) -> Result<()> {
        self.velocity = match self.dimensionality {
            Dimensionality::Fixed => self.ensemble_velocity(size, rng)?,
            Dimensionality::Variable => self.isotropic(rng) * size,
        };
        Ok(())
    }

    /// Difference of two distinct ensemble members, blended with an isotropic
    /// component that weighs less as the ensemble grows.
    fn ensemble_velocity<R: Rng + ?Sized>(&self, size: f64, rng: &mut R) -> Result<DVec> {
        let nwalkers = self.ensemble.len();
        if nwalkers < 2 {
            return Err(GalileanError::InsufficientEnsemble { size: nwalkers });
        }

        let k0 = rng.gen_range(0..nwalkers);
        let k1 = loop {
            let k = rng.gen_range(0..nwalkers);
            if k != k0 {
                break k;
            }
        };

        let u0 = self.unit_of(self.ensemble.parameters(k0))?;
        let u1 = self.unit_of(self.ensemble.parameters(k1))?;
        let diff = (u0 - u1) * size;
        let random = self.isotropic(rng) * size;

        let nm = nwalkers as f64;
        let np = self.ndim() as f64;
        Ok((diff * nm + random * np) / (nm + np))
    }

    /// Uniform draw in `[-0.5, 0.5)` per dimension, scaled by `range`.
    fn isotropic<R: Rng + ?Sized>(&self, rng: &mut R) -> DVec {
        let uniform = DVec::from_fn(self.ndim(), |_, _| rng.gen_range(0.0..1.0) - 0.5);
        uniform.component_mul(&self.range)
    }

    /// Reflect the velocity off the surface with normal `gradient`.
    pub fn mirror(&mut self, gradient: &DVec) -> Result<()> {
        self.velocity = mirror_velocity(&self.velocity, gradient)?;
        Ok(())
    }

    /// Replace the velocity by a fresh draw of scale `0.9 * size` minus the old one.
    pub fn reverse_velocity<R: Rng + ?Sized>(&mut self, size: f64, rng: &mut R) -> Result<()> {
        let previous = self.velocity.clone();
        self.init_velocity(0.9 * size, rng)?;
        self.velocity -= previous;
        Ok(())
    }

    /// Advance `fraction` of the velocity, bouncing off the cube faces.
    ///
    /// Position and velocity both keep the reflected values. Returns the
    /// domain values of the fit parameters at the new position.
    pub fn step(&mut self, fraction: f64) -> Result<DVec> {
        for i in 0..self.ndim() {
            let p = self.position[i] + self.velocity[i] * fraction;
            let (p, v) = reflect_component(p, self.velocity[i])?;
            self.position[i] = p;
            self.velocity[i] = v;
        }
        let domain = self.model.unit_to_domain(&self.position, self.fit_index)?;
        check_len("domain position", self.ndim(), domain.len())?;
        Ok(domain)
    }
}
