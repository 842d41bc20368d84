//! Collaborator contracts the diffusion engine evaluates against.

use crate::{DVec, Result};

/// Whether the model has a fixed number of parameters.
///
/// Selects how a fresh velocity is drawn: fixed-dimension models borrow a
/// direction from two ensemble members, variable-dimension models use a
/// purely isotropic draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimensionality {
    #[default]
    Fixed,
    Variable,
}

/// Likelihood, gradient and parameter transform of the problem being sampled.
///
/// All vectors exchanged through `fit_index` have length `fit_index.len()`,
/// except `parameters`, which is always the full parameter vector.
pub trait LikelihoodModel {
    /// Log-likelihood at the full parameter vector.
    fn log_likelihood(&self, parameters: &DVec) -> Result<f64>;

    /// Gradient of the log-likelihood with respect to the `fit_index` parameters.
    fn partial_log_likelihood(&self, parameters: &DVec, fit_index: &[usize]) -> Result<DVec>;

    /// Map the `fit_index` parameters into the unit cube.
    fn domain_to_unit(&self, parameters: &DVec, fit_index: &[usize]) -> Result<DVec>;

    /// Map unit-cube values back to domain values of the `fit_index` parameters.
    fn unit_to_domain(&self, unit: &DVec, fit_index: &[usize]) -> Result<DVec>;

    fn dimensionality(&self) -> Dimensionality {
        Dimensionality::Fixed
    }

    /// Per-dimension scale of random velocity contributions in unit space.
    fn unit_range(&self, fit_index: &[usize]) -> DVec {
        DVec::from_element(fit_index.len(), 1.0)
    }
}

impl<M: LikelihoodModel + ?Sized> LikelihoodModel for &M {
    fn log_likelihood(&self, parameters: &DVec) -> Result<f64> {
        (**self).log_likelihood(parameters)
    }

    fn partial_log_likelihood(&self, parameters: &DVec, fit_index: &[usize]) -> Result<DVec> {
        (**self).partial_log_likelihood(parameters, fit_index)
    }

    fn domain_to_unit(&self, parameters: &DVec, fit_index: &[usize]) -> Result<DVec> {
        (**self).domain_to_unit(parameters, fit_index)
    }

    fn unit_to_domain(&self, unit: &DVec, fit_index: &[usize]) -> Result<DVec> {
        (**self).unit_to_domain(unit, fit_index)
    }

    fn dimensionality(&self) -> Dimensionality {
        (**self).dimensionality()
    }

    fn unit_range(&self, fit_index: &[usize]) -> DVec {
        (**self).unit_range(fit_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flat;

    impl LikelihoodModel for Flat {
        fn log_likelihood(&self, _parameters: &DVec) -> Result<f64> {
            Ok(0.0)
        }

        fn partial_log_likelihood(&self, _parameters: &DVec, fit_index: &[usize]) -> Result<DVec> {
            Ok(DVec::zeros(fit_index.len()))
        }

        fn domain_to_unit(&self, parameters: &DVec, fit_index: &[usize]) -> Result<DVec> {
            Ok(DVec::from_fn(fit_index.len(), |i, _| parameters[fit_index[i]]))
        }

        fn unit_to_domain(&self, unit: &DVec, _fit_index: &[usize]) -> Result<DVec> {
            Ok(unit.clone())
        }
    }

    #[test]
    fn test_defaults() {
        let model = Flat;
        assert_eq!(model.dimensionality(), Dimensionality::Fixed);
        assert_eq!(model.unit_range(&[0, 2]), DVec::from_element(2, 1.0));
    }

    #[test]
    fn test_reference_forwards() {
        let model = Flat;
        let by_ref = &model;
        let params = DVec::from_vec(vec![0.1, 0.2, 0.3]);
        let unit = by_ref.domain_to_unit(&params, &[2, 0]).unwrap();
        assert_eq!(unit, DVec::from_vec(vec![0.3, 0.1]));
    }
}
