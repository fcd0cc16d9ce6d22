//! End-to-end CLTV run: summarize, fit, predict, segment

use crate::bgnbd::{fit_bgnbd, BgNbdModel};
use crate::config::CltvConfig;
use crate::error::{CltvError, CltvResult};
use crate::gamma_gamma::{fit_gamma_gamma, GammaGammaModel};
use crate::segment::{assign_segments, segment_label, summarize_segments, SegmentSummary};
use crate::summary::{
    frequency_monetary_correlation, retain_repeat_customers, summarize, CustomerSummary,
    LifetimeData, Transaction,
};
use crate::value::predict_values;
use chrono::{Duration, NaiveDateTime};
use tracing::{info, warn};

/// Above this absolute correlation the Gamma-Gamma independence assumption
/// is considered violated.
const CORRELATION_WARNING: f64 = 0.3;

/// Final per-customer output row.
#[derive(Debug, Clone, PartialEq)]
pub struct CltvRecord {
    pub customer_id: i64,
    pub frequency: f64,
    pub recency: f64,
    pub age: f64,
    pub monetary: f64,
    pub expected_transactions: f64,
    pub probability_alive: f64,
    pub expected_average_profit: f64,
    pub predicted_clv: f64,
    pub segment: String,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct CltvReport {
    /// Sorted by `predicted_clv`, highest first.
    pub records: Vec<CltvRecord>,
    pub segments: Vec<SegmentSummary>,
    pub bgnbd: BgNbdModel,
    pub gamma_gamma: GammaGammaModel,
    pub observation_cutoff: NaiveDateTime,
    pub customers_summarized: usize,
    pub customers_retained: usize,
    pub frequency_monetary_correlation: Option<f64>,
}

/// Default cutoff: the day after the last transaction.
pub fn default_cutoff(transactions: &[Transaction]) -> Option<NaiveDateTime> {
    transactions
        .iter()
        .map(|t| t.timestamp)
        .max()
        .and_then(|last| last.date().and_hms_opt(0, 0, 0))
        .map(|midnight| midnight + Duration::days(1))
}

/// Run the whole analysis over a cleaned transaction log.
pub fn run_pipeline(transactions: &[Transaction], config: &CltvConfig) -> CltvResult<CltvReport> {
    let observation_cutoff = match config.observation_cutoff {
        Some(cutoff) => cutoff,
        None => default_cutoff(transactions).ok_or_else(|| {
            CltvError::InsufficientData("no transactions to summarize".to_string())
        })?,
    };

    let summaries = summarize(transactions, observation_cutoff, config.time_unit_days)?;
    let customers_summarized = summaries.len();
    let retained = retain_repeat_customers(summaries, config.min_frequency);
    info!(
        summarized = customers_summarized,
        retained = retained.len(),
        "Customer summaries built"
    );

    let data = LifetimeData::from_summaries(&retained);
    let correlation = frequency_monetary_correlation(&data);
    if let Some(rho) = correlation.filter(|rho| rho.abs() > CORRELATION_WARNING) {
        warn!(
            correlation = rho,
            "frequency and monetary value are correlated; Gamma-Gamma values may be biased"
        );
    }

    let (bgnbd, gamma_gamma) = fit_models(&data, config)?;

    let records = score(&retained, &bgnbd, &gamma_gamma, config)?;
    let values: Vec<f64> = records.iter().map(|r| r.predicted_clv).collect();
    let tiers = assign_segments(&values, config.segment_count)?;
    let segments = summarize_segments(&values, &tiers, config.segment_count);

    let mut records: Vec<CltvRecord> = records
        .into_iter()
        .zip(tiers)
        .map(|(record, tier)| CltvRecord {
            segment: segment_label(tier, config.segment_count),
            ..record
        })
        .collect();
    records.sort_by(|a, b| b.predicted_clv.total_cmp(&a.predicted_clv));
    info!(customers = records.len(), "CLTV scored and segmented");

    Ok(CltvReport {
        records,
        segments,
        bgnbd,
        gamma_gamma,
        observation_cutoff,
        customers_summarized,
        customers_retained: retained.len(),
        frequency_monetary_correlation: correlation,
    })
}

/// Fit both models in parallel. Either failure aborts the run; no partial
/// parameter set is ever returned.
pub fn fit_models(
    data: &LifetimeData,
    config: &CltvConfig,
) -> CltvResult<(BgNbdModel, GammaGammaModel)> {
    if data.len() < crate::bgnbd::MIN_CUSTOMERS {
        return Err(CltvError::InsufficientData(format!(
            "{} customers qualify for fitting",
            data.len()
        )));
    }

    let budget = config.budget();
    let (bgnbd, gamma_gamma) = rayon::join(
        || fit_bgnbd(data, config.penalizer_coef_bgnbd, &budget),
        || fit_gamma_gamma(data, config.penalizer_coef_gg, &budget),
    );
    Ok((bgnbd?, gamma_gamma?))
}

fn score(
    summaries: &[CustomerSummary],
    bgnbd: &BgNbdModel,
    gamma_gamma: &GammaGammaModel,
    config: &CltvConfig,
) -> CltvResult<Vec<CltvRecord>> {
    let predictions = predict_values(
        &bgnbd.params,
        &gamma_gamma.params,
        summaries,
        &config.horizon(),
        config.discount_rate,
    )?;

    Ok(summaries
        .iter()
        .zip(predictions)
        .map(|(s, p)| CltvRecord {
            customer_id: s.customer_id,
            frequency: s.frequency,
            recency: s.recency,
            age: s.age,
            monetary: s.monetary,
            expected_transactions: p.expected_transactions,
            probability_alive: p.probability_alive,
            expected_average_profit: p.expected_average_profit,
            predicted_clv: p.predicted_clv,
            segment: String::new(),
        })
        .collect())
}
