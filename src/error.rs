//! Error taxonomy for the estimation core

use thiserror::Error;

/// Errors raised by the summarize, fit, predict and segment stages.
///
/// Each error aborts only the stage that produced it. Nothing is retried
/// internally; callers may refit with a larger penalizer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CltvError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("{model} optimizer did not converge after {iterations} iterations")]
    Convergence {
        model: &'static str,
        iterations: usize,
    },

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("horizon must be positive (got {0})")]
    InvalidHorizon(f64),

    #[error("discount rate must be a non-negative finite number (got {0})")]
    InvalidDiscountRate(f64),

    #[error("time unit must be at least one day")]
    InvalidTimeUnit,

    #[error("transaction for customer {customer_id} is after the observation cutoff")]
    CutoffBeforeTransactions { customer_id: i64 },

    #[error("penalizer coefficient must be a non-negative finite number (got {0})")]
    InvalidPenalizer(f64),

    #[error("segment count must be between 2 and 26 (got {0})")]
    InvalidSegmentCount(usize),
}

pub type CltvResult<T> = std::result::Result<T, CltvError>;
