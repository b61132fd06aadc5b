//! Protocol parameters.
//!
//! The ratios α, β and γ split each round's view between pushed ids,
//! pulled ids and ids drawn from the sampler. `l1` is the per-round fan-out
//! that α and β are applied to, `l2` the sampler capacity that γ is
//! applied to. The derived counts are fixed at construction.

use crate::error::{Error, Result};

/// Slack allowed on α+β+γ before the triple is rejected.
const RATIO_SUM_EPSILON: f64 = 1e-9;

/// Validated Brahms parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    alpha: f64,
    beta: f64,
    gamma: f64,
    l1: usize,
    l2: usize,
    l1_alpha: usize,
    l1_beta: usize,
    l1_gamma: usize,
}

impl Params {
    /// Validate the ratios and sizes and derive the per-round counts.
    ///
    /// # Examples
    ///
    /// ```
    /// use brahms_core::Params;
    ///
    /// let p = Params::new(0.45, 0.45, 0.1, 100, 10).unwrap();
    /// assert_eq!(p.l1_alpha(), 45);
    /// assert_eq!(p.l1_beta(), 45);
    /// assert_eq!(p.l1_gamma(), 1);
    /// ```
    pub fn new(alpha: f64, beta: f64, gamma: f64, l1: usize, l2: usize) -> Result<Self> {
        check_ratio("alpha", alpha)?;
        check_ratio("beta", beta)?;
        check_ratio("gamma", gamma)?;

        let sum = alpha + beta + gamma;
        if sum > 1.0 + RATIO_SUM_EPSILON {
            return Err(invalid("alpha+beta+gamma", sum, "ratios must not sum above 1"));
        }
        if l1 == 0 {
            return Err(invalid("l1", 0.0, "fan-out size must be positive"));
        }
        if l2 == 0 {
            return Err(invalid("l2", 0.0, "sample size must be positive"));
        }

        let l1_alpha = derive_count("alpha*l1", alpha, l1)?;
        let l1_beta = derive_count("beta*l1", beta, l1)?;
        let l1_gamma = derive_count("gamma*l2", gamma, l2)?;

        Ok(Self {
            alpha,
            beta,
            gamma,
            l1,
            l2,
            l1_alpha,
            l1_beta,
            l1_gamma,
        })
    }

    /// Number of peers to push our id to each round.
    pub fn l1_alpha(&self) -> usize {
        self.l1_alpha
    }

    /// Number of peers to pull views from each round.
    pub fn l1_beta(&self) -> usize {
        self.l1_beta
    }

    /// Number of sampler entries mixed into each new view.
    pub fn l1_gamma(&self) -> usize {
        self.l1_gamma
    }

    /// Capacity of the sampler.
    pub fn sample_size(&self) -> usize {
        self.l2
    }

    /// Fan-out size the push and pull ratios apply to.
    pub fn fanout(&self) -> usize {
        self.l1
    }

    /// Share of the view filled from pushes.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Share of the view filled from pulls.
    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Share of the sample mixed into each view.
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

fn invalid(name: &'static str, value: f64, reason: &'static str) -> Error {
    Error::InvalidParams { name, value, reason }
}

fn check_ratio(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 || value >= 1.0 {
        return Err(invalid(name, value, "ratio must lie strictly between 0 and 1"));
    }
    Ok(())
}

fn derive_count(name: &'static str, ratio: f64, size: usize) -> Result<usize> {
    let count = (ratio * size as f64).round();
    if count < 1.0 {
        return Err(invalid(name, count, "derived count rounds to zero"));
    }
    Ok(count as usize)
}
