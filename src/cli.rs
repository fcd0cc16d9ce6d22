//! Command-line interface definitions and argument parsing

use crate::config::CltvConfig;
use crate::data::parse_timestamp;
use clap::Parser;
use std::path::PathBuf;

/// Customer lifetime value prediction with BG-NBD and Gamma-Gamma models
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input transaction CSV file
    #[arg(short, long, default_value = "data.csv")]
    pub input: String,

    /// Output path for the scored customer table
    #[arg(short, long, default_value = "cltv.csv")]
    pub output: String,

    /// TOML configuration file; command-line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// End of the observation window, e.g. "2011-12-11 00:00:00"
    #[arg(long)]
    pub cutoff: Option<String>,

    /// Days per summary time unit
    #[arg(long)]
    pub time_unit_days: Option<u32>,

    /// Customers need more than this many purchase occasions to be modeled
    #[arg(long)]
    pub min_frequency: Option<usize>,

    /// L2 penalizer for the BG-NBD fit
    #[arg(long)]
    pub penalizer_bgnbd: Option<f64>,

    /// L2 penalizer for the Gamma-Gamma fit
    #[arg(long)]
    pub penalizer_gg: Option<f64>,

    /// Number of monthly periods to predict
    #[arg(long)]
    pub horizon: Option<usize>,

    /// Discount rate per period
    #[arg(long, allow_hyphen_values = true)]
    pub discount_rate: Option<f64>,

    /// Number of value segments
    #[arg(short = 'k', long)]
    pub segments: Option<usize>,

    /// Maximum optimizer iterations per fit
    #[arg(long)]
    pub max_iters: Option<usize>,

    /// Number of top customers to print
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build the run configuration: defaults, then the config file, then flags.
    pub fn resolve_config(&self) -> crate::Result<CltvConfig> {
        let mut config = match &self.config {
            Some(path) => CltvConfig::from_toml_file(path)?,
            None => CltvConfig::default(),
        };

        if let Some(ref cutoff) = self.cutoff {
            config.observation_cutoff = Some(parse_timestamp(cutoff)?);
        }
        if let Some(days) = self.time_unit_days {
            config.time_unit_days = days;
        }
        if let Some(min) = self.min_frequency {
            config.min_frequency = min;
        }
        if let Some(coef) = self.penalizer_bgnbd {
            config.penalizer_coef_bgnbd = coef;
        }
        if let Some(coef) = self.penalizer_gg {
            config.penalizer_coef_gg = coef;
        }
        if let Some(periods) = self.horizon {
            config.horizon_periods = periods;
        }
        if let Some(rate) = self.discount_rate {
            config.discount_rate = rate;
        }
        if let Some(k) = self.segments {
            config.segment_count = k;
        }
        if let Some(iters) = self.max_iters {
            config.max_iterations = iters;
        }

        Ok(config)
    }
}
