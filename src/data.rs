//! Transaction loading, cleaning and result export using Polars

use crate::config::ColumnNames;
use crate::pipeline::CltvRecord;
use crate::summary::Transaction;
use anyhow::Context;
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use std::fs::File;

/// Timestamp layouts seen in retail exports, tried after RFC 3339.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Load a transaction CSV and clean it for summarization.
///
/// Rows with a missing customer, a cancelled invoice (any invoice number
/// containing `C`), or a non-positive quantity or price are dropped. Quantity
/// and price are then capped at their upper outlier thresholds (see
/// [`capped_at_upper_threshold`]).
///
/// # Arguments
/// * `file_path` - Path to the CSV file
/// * `columns` - Header names of the required columns
pub fn load_transactions(file_path: &str, columns: &ColumnNames) -> crate::Result<Vec<Transaction>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.into()))?
        .finish()
        .with_context(|| format!("Failed to read {file_path}"))?;

    let df = df
        .lazy()
        .filter(
            col(&columns.quantity)
                .gt(lit(0))
                .and(col(&columns.price).gt(lit(0.0)))
                .and(col(&columns.customer_id).is_not_null())
                .and(col(&columns.invoice).is_not_null())
                .and(col(&columns.timestamp).is_not_null()),
        )
        .with_columns([
            col(&columns.invoice).cast(DataType::String),
            col(&columns.quantity).cast(DataType::Float64),
            col(&columns.price).cast(DataType::Float64),
        ])
        .filter(col(&columns.invoice).str().contains_literal(lit("C")).not())
        .with_columns([
            capped_at_upper_threshold(&columns.quantity),
            capped_at_upper_threshold(&columns.price),
        ])
        .collect()?;

    if df.height() == 0 {
        anyhow::bail!("No valid transactions found after filtering");
    }

    let customers = df.column(&columns.customer_id)?.cast(&DataType::Float64)?;
    let invoices = df.column(&columns.invoice)?;
    let quantities = df.column(&columns.quantity)?;
    let prices = df.column(&columns.price)?;
    let timestamps = df.column(&columns.timestamp)?.cast(&DataType::String)?;

    let mut transactions = Vec::with_capacity(df.height());
    for ((((customer, invoice), quantity), price), timestamp) in customers
        .f64()?
        .into_iter()
        .zip(invoices.str()?.into_iter())
        .zip(quantities.f64()?.into_iter())
        .zip(prices.f64()?.into_iter())
        .zip(timestamps.str()?.into_iter())
    {
        let (Some(customer), Some(invoice), Some(quantity), Some(price), Some(timestamp)) =
            (customer, invoice, quantity, price, timestamp)
        else {
            continue;
        };

        transactions.push(Transaction {
            customer_id: customer as i64,
            invoice_id: invoice.trim().to_string(),
            quantity,
            unit_price: price,
            timestamp: parse_timestamp(timestamp)?,
        });
    }

    Ok(transactions)
}

/// Cap a numeric column at `q99 + 1.5 * (q99 - q01)`, computed over the
/// rows that survived filtering. The lower tail is left alone.
pub fn capped_at_upper_threshold(name: &str) -> Expr {
    let q01 = col(name).quantile(lit(0.01), QuantileInterpolOptions::Linear);
    let q99 = col(name).quantile(lit(0.99), QuantileInterpolOptions::Linear);
    col(name).clip_max(q99.clone() + (q99 - q01) * lit(1.5))
}

/// Parse an invoice timestamp in any of the supported layouts.
pub fn parse_timestamp(raw: &str) -> crate::Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| anyhow::anyhow!("Unrecognized timestamp: {raw}"))
}

/// Write the scored customer table as CSV.
pub fn write_records(file_path: &str, records: &[CltvRecord]) -> crate::Result<()> {
    let column = |name: &str, f: fn(&CltvRecord) -> f64| {
        Series::new(name, records.iter().map(f).collect::<Vec<f64>>())
    };

    let mut df = DataFrame::new(vec![
        Series::new(
            "customer_id",
            records.iter().map(|r| r.customer_id).collect::<Vec<i64>>(),
        ),
        column("recency", |r| r.recency),
        column("T", |r| r.age),
        column("frequency", |r| r.frequency),
        column("monetary", |r| r.monetary),
        column("expected_transactions", |r| r.expected_transactions),
        column("probability_alive", |r| r.probability_alive),
        column("expected_average_profit", |r| r.expected_average_profit),
        column("clv", |r| r.predicted_clv),
        Series::new(
            "segment",
            records.iter().map(|r| r.segment.clone()).collect::<Vec<String>>(),
        ),
    ])?;

    let mut file = File::create(file_path).with_context(|| format!("Failed to create {file_path}"))?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    Ok(())
}
