//! CLTV Forge: customer lifetime value prediction from transaction logs
//!
//! Transactions are summarized into per-customer frequency, recency, age and
//! monetary value, then two models are fitted by penalized maximum
//! likelihood: BG-NBD for purchase counts and Gamma-Gamma for spend. Their
//! combination gives a discounted value over a horizon, which is cut into
//! quantile segments.

pub mod bgnbd;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod gamma_gamma;
pub mod optimize;
pub mod pipeline;
pub mod segment;
pub mod simulate;
pub mod special;
pub mod summary;
pub mod value;

// Re-export public items for easier access
pub use bgnbd::{fit_bgnbd, BgNbdModel, BgNbdParams};
pub use cli::Args;
pub use config::{CltvConfig, ColumnNames};
pub use data::{load_transactions, write_records};
pub use error::{CltvError, CltvResult};
pub use gamma_gamma::{fit_gamma_gamma, GammaGammaModel, GammaGammaParams};
pub use optimize::Budget;
pub use pipeline::{run_pipeline, CltvRecord, CltvReport};
pub use segment::{assign_segments, summarize_segments, SegmentSummary};
pub use simulate::simulate_population;
pub use summary::{summarize, CustomerSummary, LifetimeData, Transaction};
pub use value::{customer_lifetime_value, predict_values, Horizon, ValuePrediction};

/// Result type for the I/O and CLI layers
pub type Result<T> = anyhow::Result<T>;
