//! CLTV Forge: lifetime value prediction CLI
//!
//! Loads a transaction log, fits the BG-NBD and Gamma-Gamma models, scores
//! and segments every repeat customer, and writes the resulting table.

use anyhow::Result;
use clap::Parser;
use cltvforge::{load_transactions, run_pipeline, write_records, Args, CltvReport};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = args.resolve_config()?;
    let start_time = Instant::now();

    let transactions = load_transactions(&args.input, &config.columns)?;
    println!("✓ Data loaded: {} transactions", transactions.len());

    let report = run_pipeline(&transactions, &config)?;
    print_report(&report, args.top);

    write_records(&args.output, &report.records)?;

    println!("\n=== Pipeline Complete ===");
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    println!("Customer table saved to: {}", args.output);

    Ok(())
}

fn print_report(report: &CltvReport, top: usize) {
    println!(
        "✓ Customers: {} summarized, {} with repeat purchases (cutoff {})",
        report.customers_summarized, report.customers_retained, report.observation_cutoff
    );

    let bg = &report.bgnbd.params;
    println!("\n=== BG-NBD ===");
    println!(
        "r={:.4} alpha={:.4} a={:.4} b={:.4} (log-likelihood {:.2}, {} iterations)",
        bg.r, bg.alpha, bg.a, bg.b, report.bgnbd.log_likelihood, report.bgnbd.iterations
    );

    let gg = &report.gamma_gamma.params;
    println!("\n=== Gamma-Gamma ===");
    println!(
        "p={:.4} q={:.4} v={:.4} (log-likelihood {:.2}, {} iterations)",
        gg.p, gg.q, gg.v, report.gamma_gamma.log_likelihood, report.gamma_gamma.iterations
    );
    if let Some(rho) = report.frequency_monetary_correlation {
        println!("Frequency/monetary correlation: {rho:.3}");
    }

    println!("\n=== Top {} Customers ===", top.min(report.records.len()));
    println!(
        "{:>12} {:>9} {:>9} {:>9} {:>11} {:>10} {:>12} {:>7}",
        "customer", "frequency", "recency", "T", "monetary", "avg_profit", "clv", "segment"
    );
    for r in report.records.iter().take(top) {
        println!(
            "{:>12} {:>9.0} {:>9.2} {:>9.2} {:>11.2} {:>10.2} {:>12.2} {:>7}",
            r.customer_id,
            r.frequency,
            r.recency,
            r.age,
            r.monetary,
            r.expected_average_profit,
            r.predicted_clv,
            r.segment
        );
    }

    println!("\n=== Segments ===");
    for s in &report.segments {
        println!(
            "{}: {} customers, mean CLV {:.2}, total CLV {:.2}",
            s.segment, s.count, s.mean_clv, s.sum_clv
        );
    }
}
