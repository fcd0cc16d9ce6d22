//! Gamma-Gamma spend model
//!
//! Individual transaction values are Gamma(p, nu) around a customer-specific
//! rate nu, which is itself Gamma(q, v) across the population. The model
//! ignores purchase timing; it is only meaningful when frequency and monetary
//! value are close to uncorrelated, which callers must check.

use crate::bgnbd::{validate_penalizer, MIN_CUSTOMERS};
use crate::error::{CltvError, CltvResult};
use crate::optimize::{minimize, Budget, OptimizeError};
use crate::special::ln_gamma;
use crate::summary::LifetimeData;
use ndarray::{Array1, Zip};
use tracing::{info, warn};

/// A fitted `q - 1` below this has collapsed onto the `q > 1` boundary.
const MIN_Q_EXCESS: f64 = 1e-6;

/// Fitted Gamma-Gamma parameters. All positive, with `q > 1` so that the
/// population mean spend exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaGammaParams {
    pub p: f64,
    pub q: f64,
    pub v: f64,
}

impl GammaGammaParams {
    /// `q` lives on `(1, inf)` through `q = 1 + exp(theta)`.
    fn from_unconstrained(theta: &Array1<f64>) -> Self {
        Self {
            p: theta[0].exp(),
            q: 1.0 + theta[1].exp(),
            v: theta[2].exp(),
        }
    }

    /// Log-likelihood of one customer's average spend over `frequency` purchases.
    pub fn log_likelihood(&self, frequency: f64, monetary: f64) -> f64 {
        let Self { p, q, v } = *self;
        let x = frequency;
        let px = p * x;

        ln_gamma(px + q) - ln_gamma(px) - ln_gamma(q) + q * v.ln() + (px - 1.0) * monetary.ln()
            + px * x.ln()
            - (px + q) * (x * monetary + v).ln()
    }

    pub fn total_log_likelihood(&self, data: &LifetimeData) -> f64 {
        Zip::from(&data.frequency)
            .and(&data.monetary)
            .map_collect(|&x, &m| self.log_likelihood(x, m))
            .sum()
    }

    /// Prior mean transaction value, `p v / (q - 1)`.
    pub fn population_mean(&self) -> f64 {
        self.p * self.v / (self.q - 1.0)
    }

    /// Shrinkage estimate of a customer's true average transaction value.
    ///
    /// A weighted average of the population mean and the observed mean, with
    /// weight `p x / (p x + q - 1)` on the observation. With no purchases to
    /// learn from the prior mean is returned unchanged.
    pub fn conditional_expected_average_value(&self, frequency: f64, monetary: f64) -> f64 {
        if frequency <= 0.0 {
            return self.population_mean();
        }
        let Self { p, q, v } = *self;
        let value = p * (v + frequency * monetary) / (p * frequency + q - 1.0);
        value.max(0.0)
    }
}

/// A fitted Gamma-Gamma model with fit diagnostics.
#[derive(Debug, Clone)]
pub struct GammaGammaModel {
    pub params: GammaGammaParams,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub n_customers: usize,
}

/// Fit the Gamma-Gamma model by penalized maximum likelihood.
///
/// Every customer must have `frequency > 0` and `monetary > 0`. The L2
/// penalty acts on the unconstrained parameters `(ln p, ln(q - 1), ln v)`,
/// shrinking toward `p = v = 1, q = 2`. A fit whose `q` collapses onto 1 has
/// no finite population mean and fails with [`CltvError::DegenerateInput`];
/// a larger `penalizer_coef` usually keeps it interior.
pub fn fit_gamma_gamma(
    data: &LifetimeData,
    penalizer_coef: f64,
    budget: &Budget,
) -> CltvResult<GammaGammaModel> {
    validate_penalizer(penalizer_coef)?;
    validate_spend(data)?;

    let n = data.len() as f64;
    let objective = |theta: &Array1<f64>| {
        let params = GammaGammaParams::from_unconstrained(theta);
        -params.total_log_likelihood(data) / n + penalizer_coef * theta.dot(theta)
    };

    let minimum = minimize(objective, &Array1::zeros(3), budget).map_err(|err| match err {
        OptimizeError::NonFiniteStart => {
            CltvError::DegenerateInput("Gamma-Gamma likelihood is not finite".to_string())
        }
        OptimizeError::Exhausted { iterations } => CltvError::Convergence {
            model: "Gamma-Gamma",
            iterations,
        },
    })?;

    let params = GammaGammaParams::from_unconstrained(&minimum.point);
    if params.q - 1.0 < MIN_Q_EXCESS {
        warn!(q = params.q, penalizer_coef, "Gamma-Gamma q collapsed onto its lower bound");
        return Err(CltvError::DegenerateInput(format!(
            "Gamma-Gamma q = {} leaves the population mean undefined; increase the penalizer",
            params.q
        )));
    }
    info!(
        p = params.p,
        q = params.q,
        v = params.v,
        iterations = minimum.iterations,
        "Gamma-Gamma fitted"
    );

    Ok(GammaGammaModel {
        params,
        log_likelihood: params.total_log_likelihood(data),
        iterations: minimum.iterations,
        n_customers: data.len(),
    })
}

fn validate_spend(data: &LifetimeData) -> CltvResult<()> {
    if data.len() < MIN_CUSTOMERS {
        return Err(CltvError::DegenerateInput(format!(
            "Gamma-Gamma needs at least {MIN_CUSTOMERS} customers, got {}",
            data.len()
        )));
    }

    let malformed = data
        .frequency
        .iter()
        .zip(data.monetary.iter())
        .any(|(&x, &m)| !(x > 0.0 && m > 0.0 && x.is_finite() && m.is_finite()));
    if malformed {
        return Err(CltvError::DegenerateInput(
            "Gamma-Gamma requires positive frequency and monetary value".to_string(),
        ));
    }

    let identical = (1..data.len())
        .all(|i| data.frequency[i] == data.frequency[0] && data.monetary[i] == data.monetary[0]);
    if identical {
        return Err(CltvError::DegenerateInput(
            "all customers share the same spend history".to_string(),
        ));
    }

    Ok(())
}
