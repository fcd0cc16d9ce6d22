//! Per-customer behavioral summaries (frequency, recency, age, monetary)

use crate::error::{CltvError, CltvResult};
use chrono::NaiveDateTime;
use ndarray::Array1;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashSet};

/// A single cleaned line item of the transaction log.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub customer_id: i64,
    pub invoice_id: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub timestamp: NaiveDateTime,
}

impl Transaction {
    pub fn revenue(&self) -> f64 {
        self.quantity * self.unit_price
    }
}

/// Lifetime statistics for one customer, in the configured time unit.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerSummary {
    pub customer_id: i64,
    /// Repeat purchase occasions: distinct invoices minus one.
    pub frequency: f64,
    /// Time between the first and the last purchase.
    pub recency: f64,
    /// Time between the first purchase and the observation cutoff (T).
    pub age: f64,
    /// Average revenue per purchase occasion.
    pub monetary: f64,
}

impl CustomerSummary {
    /// Number of distinct purchase occasions behind this summary.
    pub fn occasions(&self) -> usize {
        self.frequency as usize + 1
    }
}

#[derive(Default)]
struct Accumulator {
    invoices: HashSet<String>,
    first: Option<NaiveDateTime>,
    last: Option<NaiveDateTime>,
    revenue: f64,
}

/// Group transactions into one summary per customer.
///
/// Durations are measured in whole days, as the retail log is reported, then
/// divided by `time_unit_days`. Output is ordered by customer id.
pub fn summarize(
    transactions: &[Transaction],
    observation_cutoff: NaiveDateTime,
    time_unit_days: u32,
) -> CltvResult<Vec<CustomerSummary>> {
    if time_unit_days == 0 {
        return Err(CltvError::InvalidTimeUnit);
    }
    if transactions.is_empty() {
        return Err(CltvError::InsufficientData(
            "no transactions to summarize".to_string(),
        ));
    }

    let mut customers: BTreeMap<i64, Accumulator> = BTreeMap::new();
    for txn in transactions {
        if txn.timestamp > observation_cutoff {
            return Err(CltvError::CutoffBeforeTransactions {
                customer_id: txn.customer_id,
            });
        }

        let acc = customers.entry(txn.customer_id).or_default();
        acc.invoices.insert(txn.invoice_id.clone());
        acc.revenue += txn.revenue();
        acc.first = Some(acc.first.map_or(txn.timestamp, |t| t.min(txn.timestamp)));
        acc.last = Some(acc.last.map_or(txn.timestamp, |t| t.max(txn.timestamp)));
    }

    let unit = f64::from(time_unit_days);
    customers
        .into_iter()
        .map(|(customer_id, acc)| {
            let (Some(first), Some(last)) = (acc.first, acc.last) else {
                return Err(CltvError::InsufficientData(format!(
                    "customer {customer_id} has no transactions"
                )));
            };
            let occasions = acc.invoices.len() as f64;

            Ok(CustomerSummary {
                customer_id,
                frequency: occasions - 1.0,
                recency: (last - first).num_days() as f64 / unit,
                age: (observation_cutoff - first).num_days() as f64 / unit,
                monetary: acc.revenue / occasions,
            })
        })
        .collect()
}

/// Keep customers with more than `min_frequency` purchase occasions.
///
/// Everyone else has no repeat-purchase signal and is dropped from fitting,
/// scoring and segmentation alike.
pub fn retain_repeat_customers(
    summaries: Vec<CustomerSummary>,
    min_frequency: usize,
) -> Vec<CustomerSummary> {
    summaries
        .into_iter()
        .filter(|s| s.occasions() > min_frequency && s.monetary > 0.0)
        .collect()
}

/// Column-oriented view of the summaries consumed by the likelihoods.
#[derive(Debug, Clone)]
pub struct LifetimeData {
    pub customer_ids: Vec<i64>,
    pub frequency: Array1<f64>,
    pub recency: Array1<f64>,
    pub age: Array1<f64>,
    pub monetary: Array1<f64>,
}

impl LifetimeData {
    pub fn from_summaries(summaries: &[CustomerSummary]) -> Self {
        Self {
            customer_ids: summaries.iter().map(|s| s.customer_id).collect(),
            frequency: summaries.iter().map(|s| s.frequency).collect(),
            recency: summaries.iter().map(|s| s.recency).collect(),
            age: summaries.iter().map(|s| s.age).collect(),
            monetary: summaries.iter().map(|s| s.monetary).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.customer_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customer_ids.is_empty()
    }

    /// Rescale recency and age together, e.g. days to weeks with `1.0 / 7.0`.
    pub fn scale_time(&self, factor: f64) -> Self {
        Self {
            customer_ids: self.customer_ids.clone(),
            frequency: self.frequency.clone(),
            recency: &self.recency * factor,
            age: &self.age * factor,
            monetary: self.monetary.clone(),
        }
    }
}

/// Pearson correlation between frequency and monetary value.
///
/// The Gamma-Gamma model assumes the two are independent; a value far from
/// zero means the combined prediction should not be trusted. Returns `None`
/// when either column is constant.
pub fn frequency_monetary_correlation(data: &LifetimeData) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let sd_frequency = data.frequency.iter().std_dev();
    let sd_monetary = data.monetary.iter().std_dev();
    if sd_frequency == 0.0 || sd_monetary == 0.0 {
        return None;
    }

    let covariance = data.frequency.iter().covariance(data.monetary.iter());
    Some(covariance / (sd_frequency * sd_monetary))
}
