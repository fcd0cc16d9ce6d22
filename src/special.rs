//! Special functions used by the likelihoods and the expectation queries.
//!
//! Everything is evaluated in log space. Gamma-function products are never
//! formed directly, since `frequency + r` can be large enough to overflow.

pub use statrs::function::gamma::ln_gamma;

/// Maximum number of series terms before giving up on 2F1.
const MAX_TERMS: usize = 200_000;

/// Relative tolerance for the 2F1 series tail.
const SERIES_EPS: f64 = 1e-15;

/// Rescale the running series once it grows past this magnitude.
const RESCALE_AT: f64 = 1e250;

/// Log of the beta function, B(a, b) = Γ(a)Γ(b) / Γ(a + b).
pub fn ln_beta(a: f64, b: f64) -> f64 {
    ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b)
}

/// Numerically stable `ln(exp(x) + exp(y))`.
pub fn log_sum_exp(x: f64, y: f64) -> f64 {
    let max = x.max(y);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + ((x - max).exp() + (y - max).exp()).ln()
}

/// Log of the Gauss hypergeometric function 2F1(a, b; c; z) for `0 <= z < 1`.
///
/// Sums the power series through the term-ratio recurrence, rescaling as it
/// goes so that large first arguments do not overflow. If the direct series
/// is not usable the Euler transformation
/// `2F1(a, b; c; z) = (1 - z)^(c - a - b) 2F1(c - a, c - b; c; z)` is tried.
/// Returns NaN when neither form yields a positive finite sum.
pub fn ln_hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    if !(0.0..1.0).contains(&z) {
        return f64::NAN;
    }
    if z == 0.0 {
        return 0.0;
    }

    if let Some(value) = ln_hyp2f1_series(a, b, c, z) {
        return value;
    }

    match ln_hyp2f1_series(c - a, c - b, c, z) {
        Some(value) => value + (c - a - b) * (1.0 - z).ln(),
        None => f64::NAN,
    }
}

fn ln_hyp2f1_series(a: f64, b: f64, c: f64, z: f64) -> Option<f64> {
    let settle_after = a.abs().max(b.abs()).max(c.abs());
    let mut log_scale = 0.0;
    let mut term = 1.0_f64;
    let mut sum = 1.0_f64;

    for n in 0..MAX_TERMS {
        let k = n as f64;
        let ratio = (a + k) * (b + k) / ((c + k) * (k + 1.0)) * z;
        term *= ratio;
        sum += term;

        if !term.is_finite() || !sum.is_finite() {
            return None;
        }
        if term == 0.0 {
            break;
        }
        if sum.abs() > RESCALE_AT {
            let magnitude = sum.abs();
            log_scale += magnitude.ln();
            term /= magnitude;
            sum /= magnitude;
        }
        // Past the largest parameter the term ratio decreases toward z, so a
        // small term bounds the remaining tail.
        if k > settle_after && ratio.abs() < 1.0 && term.abs() <= SERIES_EPS * sum.abs() {
            break;
        }
        if n + 1 == MAX_TERMS {
            return None;
        }
    }

    if sum > 0.0 {
        Some(log_scale + sum.ln())
    } else {
        None
    }
}
