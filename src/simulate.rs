//! Synthetic customer populations drawn from known model parameters.
//!
//! Useful for checking that a fit recovers the parameters it was generated
//! from, and for demos without a transaction log.

use crate::bgnbd::BgNbdParams;
use crate::error::{CltvError, CltvResult};
use crate::gamma_gamma::GammaGammaParams;
use crate::summary::CustomerSummary;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::{Beta, Exp, Gamma};
use statrs::StatsError;

/// Draw `n` customers observed for `observation_length` time units each.
///
/// Each customer gets a purchase rate from Gamma(r, alpha), a dropout
/// probability from Beta(a, b) and a spend rate from Gamma(q, v). Purchases
/// arrive as a Poisson process; after each one the customer may drop out.
/// `monetary` averages the repeat purchases (one draw for customers without
/// repeats). The same seed always yields the same population.
pub fn simulate_population(
    bgnbd: &BgNbdParams,
    gamma_gamma: &GammaGammaParams,
    n: usize,
    observation_length: f64,
    seed: u64,
) -> CltvResult<Vec<CustomerSummary>> {
    let purchase_rate = Gamma::new(bgnbd.r, bgnbd.alpha).map_err(invalid_parameters)?;
    let dropout = Beta::new(bgnbd.a, bgnbd.b).map_err(invalid_parameters)?;
    let spend_rate = Gamma::new(gamma_gamma.q, gamma_gamma.v).map_err(invalid_parameters)?;
    let mut rng = StdRng::seed_from_u64(seed);

    (0..n)
        .map(|i| -> CltvResult<CustomerSummary> {
            let rate = purchase_rate.sample(&mut rng);
            let p_dropout = dropout.sample(&mut rng);
            let nu = spend_rate.sample(&mut rng);

            let mut clock = 0.0;
            let mut purchases = 0usize;
            // a rate that underflowed to zero never purchases
            if let Ok(waits) = Exp::new(rate) {
                loop {
                    let wait = waits.sample(&mut rng);
                    if clock + wait > observation_length {
                        break;
                    }
                    clock += wait;
                    purchases += 1;
                    if rng.gen::<f64>() < p_dropout {
                        break;
                    }
                }
            }

            let spend = Gamma::new(gamma_gamma.p, nu).map_err(invalid_parameters)?;
            let draws = purchases.max(1);
            let total: f64 = (0..draws).map(|_| spend.sample(&mut rng)).sum();

            Ok(CustomerSummary {
                customer_id: i as i64,
                frequency: purchases as f64,
                recency: clock,
                age: observation_length,
                monetary: total / draws as f64,
            })
        })
        .collect()
}

fn invalid_parameters(err: StatsError) -> CltvError {
    CltvError::DegenerateInput(format!("cannot simulate from these parameters: {err}"))
}
