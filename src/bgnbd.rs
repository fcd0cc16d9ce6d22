//! BG-NBD repeat-purchase model
//!
//! Purchases follow a Poisson process with a Gamma(r, alpha) distributed rate
//! while the customer is alive; after every purchase the customer drops out
//! with a Beta(a, b) distributed probability.

use crate::error::{CltvError, CltvResult};
use crate::optimize::{minimize, Budget, OptimizeError};
use crate::special::{ln_gamma, ln_hyp2f1, log_sum_exp};
use crate::summary::LifetimeData;
use ndarray::{Array1, Zip};
use tracing::info;

/// Fewest customers a fit will accept.
pub const MIN_CUSTOMERS: usize = 2;

/// Largest age is mapped to this value while optimizing.
const TIME_SCALE_TARGET: f64 = 10.0;

/// Fitted BG-NBD parameters. All four are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BgNbdParams {
    pub r: f64,
    pub alpha: f64,
    pub a: f64,
    pub b: f64,
}

impl BgNbdParams {
    fn from_log(theta: &Array1<f64>) -> Self {
        Self {
            r: theta[0].exp(),
            alpha: theta[1].exp(),
            a: theta[2].exp(),
            b: theta[3].exp(),
        }
    }

    fn squared_norm(&self) -> f64 {
        self.r * self.r + self.alpha * self.alpha + self.a * self.a + self.b * self.b
    }

    /// Log-likelihood of one customer's history.
    pub fn log_likelihood(&self, frequency: f64, recency: f64, age: f64) -> f64 {
        let Self { r, alpha, a, b } = *self;
        let x = frequency;

        let a1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln();
        let a2 = ln_gamma(a + b) + ln_gamma(b + x) - ln_gamma(b) - ln_gamma(a + b + x);
        let a3 = -(r + x) * (alpha + age).ln();
        let a4 = if x > 0.0 {
            a.ln() - (b + x - 1.0).ln() - (r + x) * (alpha + recency).ln()
        } else {
            f64::NEG_INFINITY
        };

        a1 + a2 + log_sum_exp(a3, a4)
    }

    /// Total log-likelihood of a customer table.
    pub fn total_log_likelihood(&self, data: &LifetimeData) -> f64 {
        Zip::from(&data.frequency)
            .and(&data.recency)
            .and(&data.age)
            .map_collect(|&x, &t_x, &t| self.log_likelihood(x, t_x, t))
            .sum()
    }

    /// Log of the odds term `a / (b + x - 1) * ((alpha + T) / (alpha + t_x))^(r + x)`
    /// that separates "alive" from "dropped out" after the last purchase.
    fn ln_dropout_odds(&self, frequency: f64, recency: f64, age: f64) -> f64 {
        if frequency <= 0.0 {
            return f64::NEG_INFINITY;
        }
        self.a.ln() - (self.b + frequency - 1.0).ln()
            + (self.r + frequency) * ((self.alpha + age).ln() - (self.alpha + recency).ln())
    }

    /// Probability that a customer with this history is still active at `age`.
    pub fn probability_alive(&self, frequency: f64, recency: f64, age: f64) -> f64 {
        let odds = self.ln_dropout_odds(frequency, recency, age).exp();
        1.0 / (1.0 + odds)
    }

    /// Expected purchases in `(age, age + horizon]` given the observed history.
    ///
    /// Non-negative and non-decreasing in `horizon`; zero for a non-positive
    /// horizon.
    pub fn conditional_expected_transactions(
        &self,
        frequency: f64,
        recency: f64,
        age: f64,
        horizon: f64,
    ) -> f64 {
        if horizon <= 0.0 {
            return 0.0;
        }
        let Self { r, alpha, a, b } = *self;
        let x = frequency;

        let z = horizon / (alpha + age + horizon);
        let ln_hyp = ln_hyp2f1(r + x, b + x, a + b + x - 1.0, z);
        let ln_survivor = ln_hyp + (r + x) * ((alpha + age).ln() - (alpha + age + horizon).ln());

        let numerator = (a + b + x - 1.0) / (a - 1.0) * -ln_survivor.exp_m1();
        let denominator = 1.0 + self.ln_dropout_odds(x, recency, age).exp();

        non_negative(numerator / denominator)
    }

    /// Expected purchases by time `age` for a randomly chosen new customer.
    pub fn expected_transactions(&self, age: f64) -> f64 {
        if age <= 0.0 {
            return 0.0;
        }
        let Self { r, alpha, a, b } = *self;

        let z = age / (alpha + age);
        let ln_hyp = ln_hyp2f1(r, b, a + b - 1.0, z);
        let ln_survivor = ln_hyp + r * (alpha.ln() - (alpha + age).ln());

        non_negative((a + b - 1.0) / (a - 1.0) * -ln_survivor.exp_m1())
    }
}

/// Clamp rounding noise below zero; a failed series evaluation maps to zero.
fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// A fitted BG-NBD model with fit diagnostics.
#[derive(Debug, Clone)]
pub struct BgNbdModel {
    pub params: BgNbdParams,
    /// Unpenalized log-likelihood of the training table.
    pub log_likelihood: f64,
    pub iterations: usize,
    pub n_customers: usize,
}

/// Fit the BG-NBD model by penalized maximum likelihood.
///
/// # Arguments
/// * `data` - Retained customers; recency and age share one time unit
/// * `penalizer_coef` - L2 strength on `(r, alpha, a, b)`
/// * `budget` - Optimizer iteration and time limits
pub fn fit_bgnbd(data: &LifetimeData, penalizer_coef: f64, budget: &Budget) -> CltvResult<BgNbdModel> {
    validate_penalizer(penalizer_coef)?;
    validate_timing(data)?;

    let max_age = data.age.fold(0.0_f64, |acc, &t| acc.max(t));
    let scale = TIME_SCALE_TARGET / max_age;
    let scaled = data.scale_time(scale);
    let n = scaled.len() as f64;

    let objective = |theta: &Array1<f64>| {
        let params = BgNbdParams::from_log(theta);
        -params.total_log_likelihood(&scaled) / n + penalizer_coef * params.squared_norm()
    };

    let minimum = minimize(objective, &Array1::zeros(4), budget).map_err(|err| match err {
        OptimizeError::NonFiniteStart => {
            CltvError::DegenerateInput("BG-NBD likelihood is not finite".to_string())
        }
        OptimizeError::Exhausted { iterations } => CltvError::Convergence {
            model: "BG-NBD",
            iterations,
        },
    })?;

    let fitted = BgNbdParams::from_log(&minimum.point);
    let params = BgNbdParams {
        alpha: fitted.alpha / scale,
        ..fitted
    };

    info!(
        r = params.r,
        alpha = params.alpha,
        a = params.a,
        b = params.b,
        iterations = minimum.iterations,
        "BG-NBD fitted"
    );

    Ok(BgNbdModel {
        params,
        log_likelihood: params.total_log_likelihood(data),
        iterations: minimum.iterations,
        n_customers: data.len(),
    })
}

pub(crate) fn validate_penalizer(penalizer_coef: f64) -> CltvResult<()> {
    if penalizer_coef.is_finite() && penalizer_coef >= 0.0 {
        Ok(())
    } else {
        Err(CltvError::InvalidPenalizer(penalizer_coef))
    }
}

fn validate_timing(data: &LifetimeData) -> CltvResult<()> {
    if data.len() < MIN_CUSTOMERS {
        return Err(CltvError::DegenerateInput(format!(
            "BG-NBD needs at least {MIN_CUSTOMERS} customers, got {}",
            data.len()
        )));
    }

    let malformed = data
        .frequency
        .iter()
        .zip(data.recency.iter())
        .zip(data.age.iter())
        .any(|((&x, &t_x), &t)| !(x >= 0.0 && t_x >= 0.0 && t >= t_x && t.is_finite()));
    if malformed {
        return Err(CltvError::DegenerateInput(
            "frequency, recency and age must satisfy 0 <= recency <= age".to_string(),
        ));
    }

    if data.age.iter().all(|&t| t <= 0.0) {
        return Err(CltvError::DegenerateInput(
            "every customer has zero age".to_string(),
        ));
    }

    let identical = (1..data.len()).all(|i| {
        data.frequency[i] == data.frequency[0]
            && data.recency[i] == data.recency[0]
            && data.age[i] == data.age[0]
    });
    if identical {
        return Err(CltvError::DegenerateInput(
            "all customers share the same history".to_string(),
        ));
    }

    Ok(())
}
