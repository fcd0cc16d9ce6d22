//! Derivative-free minimization of the penalized negative log-likelihoods.
//!
//! Both estimators optimize over log-transformed parameters, so the search
//! space is unconstrained and a plain Nelder-Mead simplex is enough. The
//! start point is fixed by the caller, which makes every fit deterministic.

use ndarray::Array1;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Reflection, expansion, contraction and shrink coefficients.
const ALPHA: f64 = 1.0;
const GAMMA: f64 = 2.0;
const RHO: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Offset of the initial simplex vertices from the start point.
const INITIAL_STEP: f64 = 0.5;

/// Relative spread of objective values at which a simplex counts as collapsed.
const FTOL: f64 = 1e-12;

/// Fresh simplexes built around the incumbent after the first collapse.
const MAX_RESTARTS: usize = 3;

/// Iteration and wall-clock limits for one fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Budget {
    pub max_iterations: usize,
    pub time_budget: Option<Duration>,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            max_iterations: 20_000,
            time_budget: None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("objective is not finite at the start point")]
    NonFiniteStart,

    #[error("budget exhausted after {iterations} iterations")]
    Exhausted { iterations: usize },
}

/// Result of a successful minimization.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub point: Array1<f64>,
    pub value: f64,
    pub iterations: usize,
}

/// Minimize `objective` starting from `start`.
///
/// Non-finite objective values are treated as +inf, which keeps the simplex
/// away from regions where the likelihood is undefined.
pub fn minimize<F>(objective: F, start: &Array1<f64>, budget: &Budget) -> Result<Minimum, OptimizeError>
where
    F: Fn(&Array1<f64>) -> f64,
{
    let started = Instant::now();
    let eval = |x: &Array1<f64>| {
        let value = objective(x);
        if value.is_finite() {
            value
        } else {
            f64::INFINITY
        }
    };

    let start_value = eval(start);
    if !start_value.is_finite() {
        return Err(OptimizeError::NonFiniteStart);
    }

    let mut iterations = 0;
    let mut best = start.clone();
    let mut best_value = start_value;

    for restart in 0..=MAX_RESTARTS {
        let (point, value) = nelder_mead(&eval, &best, budget, started, &mut iterations)?;
        let improvement = best_value - value;
        best = point;
        best_value = value;

        if restart > 0 && improvement <= FTOL * (1.0 + value.abs()) {
            break;
        }
        debug!(restart, iterations, value, "simplex collapsed, restarting");
    }

    Ok(Minimum {
        point: best,
        value: best_value,
        iterations,
    })
}

fn nelder_mead<F>(
    eval: &F,
    start: &Array1<f64>,
    budget: &Budget,
    started: Instant,
    iterations: &mut usize,
) -> Result<(Array1<f64>, f64), OptimizeError>
where
    F: Fn(&Array1<f64>) -> f64,
{
    let n = start.len();
    let mut simplex: Vec<(Array1<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.clone(), eval(start)));
    for i in 0..n {
        let mut vertex = start.clone();
        vertex[i] += INITIAL_STEP;
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    loop {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        let best_value = simplex[0].1;
        let worst_value = simplex[n].1;

        if worst_value - best_value <= FTOL * (1.0 + best_value.abs()) {
            return Ok((simplex[0].0.clone(), best_value));
        }

        let out_of_time = budget
            .time_budget
            .is_some_and(|limit| started.elapsed() >= limit);
        if *iterations >= budget.max_iterations || out_of_time {
            return Err(OptimizeError::Exhausted {
                iterations: *iterations,
            });
        }
        *iterations += 1;

        let mut centroid = Array1::<f64>::zeros(n);
        for (vertex, _) in &simplex[..n] {
            centroid += vertex;
        }
        centroid /= n as f64;

        let worst = simplex[n].0.clone();
        let reflected = &centroid + &((&centroid - &worst) * ALPHA);
        let reflected_value = eval(&reflected);

        if reflected_value < best_value {
            let expanded = &centroid + &((&reflected - &centroid) * GAMMA);
            let expanded_value = eval(&expanded);
            simplex[n] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < simplex[n - 1].1 {
            simplex[n] = (reflected, reflected_value);
            continue;
        }

        let contracted = if reflected_value < worst_value {
            &centroid + &((&reflected - &centroid) * RHO)
        } else {
            &centroid + &((&worst - &centroid) * RHO)
        };
        let contracted_value = eval(&contracted);
        if contracted_value < reflected_value.min(worst_value) {
            simplex[n] = (contracted, contracted_value);
            continue;
        }

        let anchor = simplex[0].0.clone();
        for (vertex, value) in simplex.iter_mut().skip(1) {
            *vertex = &anchor + &((&*vertex - &anchor) * SIGMA);
            *value = eval(vertex);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_minimize_quadratic() {
        let target = array![1.5, -2.0, 0.25];
        let objective = |x: &Array1<f64>| (x - &target).mapv(|d| d * d).sum();

        let minimum = minimize(objective, &Array1::zeros(3), &Budget::default()).unwrap();
        for (found, expected) in minimum.point.iter().zip(target.iter()) {
            assert!((found - expected).abs() < 1e-4);
        }
        assert!(minimum.value < 1e-8);
    }

    #[test]
    fn test_minimize_rosenbrock() {
        let objective = |x: &Array1<f64>| {
            let (a, b) = (x[0], x[1]);
            (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2)
        };

        let minimum = minimize(objective, &array![-1.2, 1.0], &Budget::default()).unwrap();
        assert!((minimum.point[0] - 1.0).abs() < 1e-3);
        assert!((minimum.point[1] - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_minimize_is_deterministic() {
        let objective = |x: &Array1<f64>| (x[0] - 3.0).powi(4) + (x[1] + 1.0).powi(2);
        let start = array![0.0, 0.0];

        let first = minimize(objective, &start, &Budget::default()).unwrap();
        let second = minimize(objective, &start, &Budget::default()).unwrap();
        assert_eq!(first.point, second.point);
        assert_eq!(first.iterations, second.iterations);
    }

    #[test]
    fn test_exhausted_budget() {
        let objective = |x: &Array1<f64>| (x[0] - 100.0).powi(2) + (x[1] - 50.0).powi(2);
        let budget = Budget {
            max_iterations: 3,
            time_budget: None,
        };

        let result = minimize(objective, &array![0.0, 0.0], &budget);
        assert_eq!(result.unwrap_err(), OptimizeError::Exhausted { iterations: 3 });
    }

    #[test]
    fn test_time_budget() {
        let objective = |x: &Array1<f64>| (x[0] - 4.0).powi(2) + (x[1] + 2.0).powi(2);
        let budget = Budget {
            max_iterations: 20_000,
            time_budget: Some(Duration::ZERO),
        };

        let result = minimize(objective, &array![0.0, 0.0], &budget);
        assert_eq!(result.unwrap_err(), OptimizeError::Exhausted { iterations: 0 });
    }

    #[test]
    fn test_non_finite_start() {
        let objective = |_: &Array1<f64>| f64::NAN;
        let result = minimize(objective, &array![0.0], &Budget::default());
        assert_eq!(result.unwrap_err(), OptimizeError::NonFiniteStart);
    }
}
