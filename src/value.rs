//! Discounted customer lifetime value from the two fitted models

use crate::bgnbd::BgNbdParams;
use crate::error::{CltvError, CltvResult};
use crate::gamma_gamma::GammaGammaParams;
use crate::summary::CustomerSummary;

/// Prediction window: `periods` discounting periods of `period_days` each,
/// measured against summaries expressed in `time_unit_days`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizon {
    pub periods: usize,
    pub period_days: f64,
    pub time_unit_days: u32,
}

impl Horizon {
    /// `periods` average months on weekly summaries.
    pub fn months(periods: usize) -> Self {
        Self {
            periods,
            period_days: 30.415,
            time_unit_days: 7,
        }
    }

    /// Length of one discounting period in summary time units.
    pub fn period_length(&self) -> f64 {
        self.period_days / f64::from(self.time_unit_days)
    }

    /// Total window length in summary time units.
    pub fn length(&self) -> f64 {
        self.periods as f64 * self.period_length()
    }

    fn validate(&self) -> CltvResult<()> {
        let length = self.length();
        if self.periods == 0 || self.time_unit_days == 0 || !(length > 0.0 && length.is_finite()) {
            return Err(CltvError::InvalidHorizon(length));
        }
        Ok(())
    }
}

/// Per-customer output of the value predictor.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePrediction {
    pub customer_id: i64,
    /// Undiscounted expected purchases over the whole horizon.
    pub expected_transactions: f64,
    pub expected_average_profit: f64,
    pub probability_alive: f64,
    pub predicted_clv: f64,
}

fn validate_discount_rate(discount_rate: f64) -> CltvResult<()> {
    if discount_rate.is_finite() && discount_rate >= 0.0 {
        Ok(())
    } else {
        Err(CltvError::InvalidDiscountRate(discount_rate))
    }
}

/// Discounted expected value of one customer over the horizon.
///
/// Each period contributes the increment in expected purchases over that
/// period times the expected average value, discounted by `(1 + d)^i`.
pub fn customer_lifetime_value(
    bgnbd: &BgNbdParams,
    gamma_gamma: &GammaGammaParams,
    summary: &CustomerSummary,
    horizon: &Horizon,
    discount_rate: f64,
) -> CltvResult<f64> {
    horizon.validate()?;
    validate_discount_rate(discount_rate)?;

    let value = gamma_gamma.conditional_expected_average_value(summary.frequency, summary.monetary);
    Ok(discounted_value(bgnbd, summary, horizon, discount_rate, value))
}

fn discounted_value(
    bgnbd: &BgNbdParams,
    summary: &CustomerSummary,
    horizon: &Horizon,
    discount_rate: f64,
    value: f64,
) -> f64 {
    let step = horizon.period_length();
    let cumulative = |t: f64| {
        bgnbd.conditional_expected_transactions(summary.frequency, summary.recency, summary.age, t)
    };

    let mut clv = 0.0;
    let mut previous = 0.0;
    for i in 1..=horizon.periods {
        let current = cumulative(i as f64 * step);
        let increment = (current - previous).max(0.0);
        clv += value * increment / (1.0 + discount_rate).powi(i as i32);
        previous = current;
    }
    clv
}

/// Score every customer in the table.
pub fn predict_values(
    bgnbd: &BgNbdParams,
    gamma_gamma: &GammaGammaParams,
    summaries: &[CustomerSummary],
    horizon: &Horizon,
    discount_rate: f64,
) -> CltvResult<Vec<ValuePrediction>> {
    horizon.validate()?;
    validate_discount_rate(discount_rate)?;

    let predictions = summaries
        .iter()
        .map(|s| {
            let expected_average_profit =
                gamma_gamma.conditional_expected_average_value(s.frequency, s.monetary);
            ValuePrediction {
                customer_id: s.customer_id,
                expected_transactions: bgnbd.conditional_expected_transactions(
                    s.frequency,
                    s.recency,
                    s.age,
                    horizon.length(),
                ),
                expected_average_profit,
                probability_alive: bgnbd.probability_alive(s.frequency, s.recency, s.age),
                predicted_clv: discounted_value(
                    bgnbd,
                    s,
                    horizon,
                    discount_rate,
                    expected_average_profit,
                ),
            }
        })
        .collect();

    Ok(predictions)
}
