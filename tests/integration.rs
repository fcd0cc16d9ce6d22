//! Integration tests for CLTV Forge

use chrono::NaiveDate;
use cltvforge::{
    assign_segments, fit_bgnbd, fit_gamma_gamma, load_transactions, predict_values, run_pipeline,
    simulate_population, summarize_segments, write_records, BgNbdParams, Budget, CltvConfig,
    CltvError, ColumnNames, CustomerSummary, GammaGammaParams, Horizon, LifetimeData,
};
use std::io::Write;
use tempfile::NamedTempFile;

/// Create a test CSV with twelve customers, three of whom bought only once
fn create_test_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "Invoice,StockCode,Description,Quantity,InvoiceDate,Price,Customer ID,Country"
    )
    .unwrap();

    let base = NaiveDate::from_ymd_opt(2011, 1, 3).unwrap();
    for c in 0..12i64 {
        let invoices = 1 + c % 5;
        let start = c * 3;
        let spacing = 7 + 2 * c;
        for k in 0..invoices {
            let date = base + chrono::Duration::days(start + k * spacing);
            writeln!(
                file,
                "{}{:02}{},22633,HAND WARMER UNION JACK,{},{} 10:15:00,{:.2},{},United Kingdom",
                5000 + c,
                k,
                c,
                1 + c % 4,
                date.format("%Y-%m-%d"),
                2.5 + c as f64,
                20000 + c
            )
            .unwrap();
        }
    }

    // cancellation, never counted
    writeln!(
        file,
        "C999999,22633,HAND WARMER UNION JACK,-3,2011-06-01 10:00:00,2.50,20001,United Kingdom"
    )
    .unwrap();

    file
}

fn scenario() -> Vec<CustomerSummary> {
    [(5.0, 20.0, 30.0, 50.0), (2.0, 5.0, 40.0, 10.0), (10.0, 35.0, 36.0, 200.0)]
        .iter()
        .enumerate()
        .map(|(i, &(frequency, recency, age, monetary))| CustomerSummary {
            customer_id: i as i64 + 1,
            frequency,
            recency,
            age,
            monetary,
        })
        .collect()
}

#[test]
fn test_end_to_end_pipeline() {
    let test_file = create_test_csv();
    let file_path = test_file.path().to_str().unwrap();

    let transactions = load_transactions(file_path, &ColumnNames::default()).unwrap();
    assert_eq!(transactions.len(), 33);

    let config = CltvConfig {
        observation_cutoff: NaiveDate::from_ymd_opt(2011, 12, 11)
            .unwrap()
            .and_hms_opt(0, 0, 0),
        ..CltvConfig::default()
    };
    let report = run_pipeline(&transactions, &config).unwrap();

    assert_eq!(report.customers_summarized, 12);
    assert_eq!(report.customers_retained, 9);
    assert_eq!(report.records.len(), 9);

    for record in &report.records {
        assert!(record.frequency >= 1.0);
        assert!(record.predicted_clv >= 0.0);
        assert!(record.expected_average_profit >= 0.0);
        assert!(record.age >= record.recency);
    }

    let total: usize = report.segments.iter().map(|s| s.count).sum();
    assert_eq!(total, 9);
    assert!(report
        .segments
        .windows(2)
        .all(|w| w[0].mean_clv >= w[1].mean_clv));

    let output = NamedTempFile::new().unwrap();
    let output_path = output.path().to_str().unwrap();
    write_records(output_path, &report.records).unwrap();
    let written = std::fs::read_to_string(output_path).unwrap();
    assert_eq!(written.lines().count(), 10);
}

#[test]
fn test_three_customer_scenario() {
    let data = LifetimeData::from_summaries(&scenario());

    let bgnbd = fit_bgnbd(&data, 0.001, &Budget::default()).unwrap();
    let gamma_gamma = fit_gamma_gamma(&data, 0.01, &Budget::default()).unwrap();

    let BgNbdParams { r, alpha, a, b } = bgnbd.params;
    assert!(r > 0.0 && alpha > 0.0 && a > 0.0 && b > 0.0);
    let GammaGammaParams { p, q, v } = gamma_gamma.params;
    assert!(p > 0.0 && q > 0.0 && v > 0.0);

    let predictions = predict_values(
        &bgnbd.params,
        &gamma_gamma.params,
        &scenario(),
        &Horizon::months(3),
        0.01,
    )
    .unwrap();

    let clv: Vec<f64> = predictions.iter().map(|p| p.predicted_clv).collect();
    assert!(clv[2] >= clv[0], "{clv:?}");
    assert!(clv[0] >= clv[1], "{clv:?}");
    assert!(clv.iter().all(|&c| c >= 0.0 && c.is_finite()));
}

#[test]
fn test_refit_is_reproducible() {
    let data = LifetimeData::from_summaries(&scenario());

    let first = fit_bgnbd(&data, 0.001, &Budget::default()).unwrap();
    let second = fit_bgnbd(&data, 0.001, &Budget::default()).unwrap();
    assert!((first.params.r - second.params.r).abs() < 1e-9);
    assert!((first.params.alpha - second.params.alpha).abs() < 1e-9);
    assert!((first.params.a - second.params.a).abs() < 1e-9);
    assert!((first.params.b - second.params.b).abs() < 1e-9);

    let first = fit_gamma_gamma(&data, 0.01, &Budget::default()).unwrap();
    let second = fit_gamma_gamma(&data, 0.01, &Budget::default()).unwrap();
    assert_eq!(first.params, second.params);
}

#[test]
fn test_zero_frequency_prior_fallback_for_fitted_model() {
    let data = LifetimeData::from_summaries(&scenario());
    let gamma_gamma = fit_gamma_gamma(&data, 0.01, &Budget::default()).unwrap().params;

    let baseline = gamma_gamma.conditional_expected_average_value(0.0, 1.0);
    for &monetary in &[10.0, 50.0, 5000.0] {
        assert_eq!(
            gamma_gamma.conditional_expected_average_value(0.0, monetary),
            baseline
        );
    }

    let bgnbd = fit_bgnbd(&data, 0.001, &Budget::default()).unwrap().params;
    for &age in &[1.0, 30.0] {
        for &horizon in &[1.0, 13.0] {
            let expected = bgnbd.conditional_expected_transactions(0.0, 0.0, age, horizon);
            assert!(expected.is_finite() && expected >= 0.0);
        }
    }
}

#[test]
fn test_invalid_horizon_and_discount_rate() {
    let bgnbd = BgNbdParams {
        r: 0.243,
        alpha: 4.414,
        a: 0.793,
        b: 2.426,
    };
    let gamma_gamma = GammaGammaParams {
        p: 6.25,
        q: 3.74,
        v: 15.44,
    };

    let result = predict_values(&bgnbd, &gamma_gamma, &scenario(), &Horizon::months(0), 0.01);
    assert!(matches!(result, Err(CltvError::InvalidHorizon(_))));

    let result = predict_values(&bgnbd, &gamma_gamma, &scenario(), &Horizon::months(3), -0.1);
    assert_eq!(result.unwrap_err(), CltvError::InvalidDiscountRate(-0.1));
}

#[test]
fn test_segments_on_simulated_population() {
    let bgnbd = BgNbdParams {
        r: 0.243,
        alpha: 4.414,
        a: 0.793,
        b: 2.426,
    };
    let gamma_gamma = GammaGammaParams {
        p: 6.25,
        q: 3.74,
        v: 15.44,
    };

    let customers: Vec<CustomerSummary> = simulate_population(&bgnbd, &gamma_gamma, 3_000, 52.0, 3)
        .unwrap()
        .into_iter()
        .filter(|c| c.frequency > 0.0)
        .collect();
    let predictions =
        predict_values(&bgnbd, &gamma_gamma, &customers, &Horizon::months(3), 0.01).unwrap();
    let values: Vec<f64> = predictions.iter().map(|p| p.predicted_clv).collect();

    let tiers = assign_segments(&values, 4).unwrap();
    let summary = summarize_segments(&values, &tiers, 4);

    let quarter = values.len() as f64 / 4.0;
    for segment in &summary {
        assert!((segment.count as f64 - quarter).abs() <= 1.0, "{segment:?}");
    }
    let labels: Vec<&str> = summary.iter().map(|s| s.segment.as_str()).collect();
    assert_eq!(labels, vec!["A", "B", "C", "D"]);
    assert!(summary.windows(2).all(|w| w[0].mean_clv >= w[1].mean_clv));
}

#[test]
fn test_too_few_customers_for_fitting() {
    let test_file = create_test_csv();
    let transactions =
        load_transactions(test_file.path().to_str().unwrap(), &ColumnNames::default()).unwrap();

    let config = CltvConfig {
        min_frequency: 5,
        ..CltvConfig::default()
    };
    assert!(matches!(
        run_pipeline(&transactions, &config),
        Err(CltvError::InsufficientData(_))
    ));
}
