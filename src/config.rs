//! Analysis configuration
//!
//! Defaults target the Online Retail log: weekly summaries,
//! a three-month horizon and four value tiers. Any field can be set from a
//! TOML file and then overridden on the command line.

use crate::optimize::Budget;
use crate::value::Horizon;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CltvConfig {
    /// End of the observation window; defaults to the day after the last
    /// transaction when unset.
    pub observation_cutoff: Option<NaiveDateTime>,
    pub time_unit_days: u32,
    /// Customers need more than this many purchase occasions to be modeled.
    pub min_frequency: usize,
    pub penalizer_coef_bgnbd: f64,
    pub penalizer_coef_gg: f64,
    pub horizon_periods: usize,
    /// Length of one discounting period (an average month).
    pub period_days: f64,
    pub discount_rate: f64,
    pub segment_count: usize,
    pub max_iterations: usize,
    pub time_budget_secs: Option<f64>,
    pub columns: ColumnNames,
}

impl Default for CltvConfig {
    fn default() -> Self {
        Self {
            observation_cutoff: None,
            time_unit_days: 7,
            min_frequency: 1,
            penalizer_coef_bgnbd: 0.001,
            penalizer_coef_gg: 0.01,
            horizon_periods: 3,
            period_days: 30.415,
            discount_rate: 0.01,
            segment_count: 4,
            max_iterations: 20_000,
            time_budget_secs: None,
            columns: ColumnNames::default(),
        }
    }
}

impl CltvConfig {
    /// Read a TOML file; missing keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn horizon(&self) -> Horizon {
        Horizon {
            periods: self.horizon_periods,
            period_days: self.period_days,
            time_unit_days: self.time_unit_days,
        }
    }

    pub fn budget(&self) -> Budget {
        Budget {
            max_iterations: self.max_iterations,
            time_budget: self
                .time_budget_secs
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
        }
    }
}

/// Column names of the transaction CSV.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ColumnNames {
    pub customer_id: String,
    pub invoice: String,
    pub quantity: String,
    pub price: String,
    pub timestamp: String,
}

impl Default for ColumnNames {
    /// Online Retail II headers.
    fn default() -> Self {
        Self {
            customer_id: "Customer ID".to_string(),
            invoice: "Invoice".to_string(),
            quantity: "Quantity".to_string(),
            price: "Price".to_string(),
            timestamp: "InvoiceDate".to_string(),
        }
    }
}
