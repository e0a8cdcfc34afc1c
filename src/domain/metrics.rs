//! Performance summaries over account snapshots and simulated equity curves.

use super::account::AccountSnapshot;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceSummary {
    pub start_value: f64,
    pub end_value: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub pnl_sum: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub total_value: f64,
    pub total_pnl: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceReport {
    pub summary: PerformanceSummary,
    pub series: Vec<SeriesPoint>,
}

/// Summarizes an ordered snapshot set. Empty input yields an all-zero report.
pub fn summarize_performance(snapshots: &[AccountSnapshot]) -> PerformanceReport {
    let values: Vec<f64> = snapshots.iter().map(|s| s.total_value).collect();
    let mut summary = summarize_values(&values);
    summary.pnl_sum = snapshots.iter().map(|s| s.total_pnl).sum();

    let series = snapshots
        .iter()
        .map(|s| SeriesPoint {
            timestamp: s.timestamp,
            total_value: s.total_value,
            total_pnl: s.total_pnl,
        })
        .collect();

    PerformanceReport { summary, series }
}

/// Summary of a simulated equity curve; `pnl_sum` is the net equity change.
pub fn summarize_equity(equity: &[f64]) -> PerformanceSummary {
    let mut summary = summarize_values(equity);
    summary.pnl_sum = summary.end_value - summary.start_value;
    summary
}

fn summarize_values(values: &[f64]) -> PerformanceSummary {
    let (Some(&start_value), Some(&end_value)) = (values.first(), values.last()) else {
        return PerformanceSummary::default();
    };

    let total_return_pct = if start_value != 0.0 {
        (end_value - start_value) / start_value * 100.0
    } else {
        0.0
    };

    PerformanceSummary {
        start_value,
        end_value,
        total_return_pct,
        max_drawdown_pct: max_drawdown(values) * 100.0,
        pnl_sum: 0.0,
    }
}

/// Largest peak-to-trough decline as a fraction of the running peak.
pub fn max_drawdown(values: &[f64]) -> f64 {
    let Some(&first) = values.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in values {
        if value > peak {
            peak = value;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn snapshots(values: &[f64]) -> Vec<AccountSnapshot> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| AccountSnapshot {
                timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(9, 0, 0)
                    .unwrap()
                    + chrono::Duration::days(i as i64),
                total_value: v,
                cash: 0.0,
                total_buy_amount: 0.0,
                total_eval_amount: v,
                total_pnl: 1.5,
            })
            .collect()
    }

    #[test]
    fn return_and_drawdown_over_snapshots() {
        let report = summarize_performance(&snapshots(&[100.0, 120.0, 90.0, 130.0]));
        let s = &report.summary;
        assert_eq!(s.start_value, 100.0);
        assert_eq!(s.end_value, 130.0);
        assert_relative_eq!(s.total_return_pct, 30.0, epsilon = 1e-9);
        assert_relative_eq!(s.max_drawdown_pct, 25.0, epsilon = 1e-9);
        assert_relative_eq!(s.pnl_sum, 6.0);
        assert_eq!(report.series.len(), 4);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let report = summarize_performance(&[]);
        assert_eq!(report.summary, PerformanceSummary::default());
        assert!(report.series.is_empty());
    }

    #[test]
    fn zero_start_value_gives_zero_return() {
        let report = summarize_performance(&snapshots(&[0.0, 50.0]));
        assert_eq!(report.summary.total_return_pct, 0.0);
    }

    #[test]
    fn drawdown_uses_running_peak() {
        let dd = max_drawdown(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        assert_relative_eq!(dd, (110.0 - 80.0) / 110.0, epsilon = 1e-12);
    }

    #[test]
    fn monotonic_curve_has_no_drawdown() {
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn equity_summary_reports_net_change() {
        let s = summarize_equity(&[1000.0, 1100.0, 1050.0]);
        assert_relative_eq!(s.pnl_sum, 50.0);
        assert_relative_eq!(s.total_return_pct, 5.0, epsilon = 1e-9);
    }
}
