//! Walkers and the ensemble they belong to.

use crate::{DVec, GalileanError, LikelihoodModel, Result};

/// One live point of the sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct Walker {
    /// Full parameter vector in domain space.
    pub parameters: DVec,
    /// Log-likelihood at `parameters`.
    pub log_likelihood: f64,
    /// Indices into `parameters` that a diffusion call may vary.
    pub fit_index: Vec<usize>,
}

impl Walker {
    /// Create a walker that varies every parameter.
    pub fn new(parameters: DVec, log_likelihood: f64) -> Self {
        let fit_index = (0..parameters.len()).collect();
        Self {
            parameters,
            log_likelihood,
            fit_index,
        }
    }

    /// Create a walker whose log-likelihood is evaluated by `model`.
    pub fn evaluated<M: LikelihoodModel + ?Sized>(model: &M, parameters: DVec) -> Result<Self> {
        let log_likelihood = model.log_likelihood(&parameters)?;
        Ok(Self::new(parameters, log_likelihood))
    }

    /// Restrict diffusion to a subset of the parameters.
    pub fn with_fit_index(mut self, fit_index: Vec<usize>) -> Self {
        self.fit_index = fit_index;
        self
    }

    /// Number of parameters a diffusion call moves.
    pub fn ndim(&self) -> usize {
        self.fit_index.len()
    }

    /// Check that `fit_index` is non-empty and addresses existing parameters.
    pub fn validate_fit_index(&self) -> Result<()> {
        if self.fit_index.is_empty() {
            return Err(GalileanError::InvalidFitIndex(
                "no parameters selected for diffusion".to_string(),
            ));
        }
        let npar = self.parameters.len();
        if let Some(&k) = self.fit_index.iter().find(|&&k| k >= npar) {
            return Err(GalileanError::InvalidFitIndex(format!(
                "index {} out of range for {} parameters",
                k, npar
            )));
        }
        Ok(())
    }
}

/// Read-only view of the walker population used to borrow velocity directions.
pub trait Ensemble {
    fn len(&self) -> usize;

    /// Domain parameters of walker `k`, with `k < len()`.
    fn parameters(&self, k: usize) -> &DVec;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Ensemble for [Walker] {
    fn len(&self) -> usize {
        <[Walker]>::len(self)
    }

    fn parameters(&self, k: usize) -> &DVec {
        &self[k].parameters
    }
}

impl Ensemble for Vec<Walker> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn parameters(&self, k: usize) -> &DVec {
        &self[k].parameters
    }
}
