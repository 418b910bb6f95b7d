use std::fmt::Write;

use crate::models::{Analysis, AnalysisKind};

pub fn build_report(username: &str, source: &str, view: AnalysisKind, analysis: &Analysis) -> String {
    let aggregation = &analysis.aggregation;
    let mut output = String::new();

    let _ = writeln!(output, "# Sales Report");
    let _ = writeln!(output, "Prepared for {} from {}", username, source);
    let _ = writeln!(
        output,
        "{} rows read, {} dropped during cleaning",
        analysis.rows_read, analysis.rows_dropped
    );
    let _ = writeln!(output);

    if aggregation.is_empty() {
        let _ = writeln!(
            output,
            "No valid sales rows found. Check the column mapping and the price and date values."
        );
        return output;
    }

    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Total sales: {}", aggregation.grand_total.normalize());
    let _ = writeln!(output, "- Products: {}", aggregation.distinct_products);
    if let Some(earliest) = aggregation.earliest_date {
        let _ = writeln!(output, "- First sale: {}", earliest);
    }
    let _ = writeln!(output);

    match view {
        AnalysisKind::SumPerProduct => {
            let _ = writeln!(output, "## Sales per Product");
            for group in &aggregation.by_product {
                let _ = writeln!(output, "- {}: {}", group.product, group.total.normalize());
            }
        }
        AnalysisKind::TopProduct => {
            let _ = writeln!(output, "## Top Product");
            if let Some(top) = &aggregation.top_product {
                let _ = writeln!(output, "{} with sales of {}", top.product, top.total.normalize());
            }
        }
        AnalysisKind::DailyTrend => {
            let _ = writeln!(output, "## Daily Trend");
            for day in &analysis.daily {
                let _ = writeln!(output, "- {}: {}", day.date, day.total.normalize());
            }
        }
        AnalysisKind::MonthlyTrend => {
            let _ = writeln!(output, "## Monthly Trend");
            for month in &analysis.monthly {
                let _ = writeln!(output, "- {}: {}", month, month.total.normalize());
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::analyze;
    use crate::models::{AggregationResult, RawSale};

    fn analysis(rows: &[RawSale]) -> Analysis {
        analyze(rows).1
    }

    fn sample() -> Analysis {
        analysis(&[
            RawSale::new("Book", "50", "2025-01-01"),
            RawSale::new("Pen", "20", "2025-01-02"),
            RawSale::new("Pen", "30", "2025-02-02"),
            RawSale::new("Pen", "abc", "2025-02-02"),
        ])
    }

    #[test]
    fn per_product_view_lists_groups() {
        let report = build_report("alice", "sales.csv", AnalysisKind::SumPerProduct, &sample());

        assert!(report.contains("Prepared for alice from sales.csv"));
        assert!(report.contains("4 rows read, 1 dropped during cleaning"));
        assert!(report.contains("- Total sales: 100"));
        assert!(report.contains("- Book: 50\n- Pen: 50"));
    }

    #[test]
    fn totals_print_without_trailing_zeros() {
        let report = build_report(
            "alice",
            "sales.csv",
            AnalysisKind::SumPerProduct,
            &analysis(&[
                RawSale::new("Pen", "20.50", "2025-01-02"),
                RawSale::new("Pen", "29.50", "2025-01-03"),
            ]),
        );

        assert!(report.contains("- Total sales: 50\n"));
        assert!(report.contains("- Pen: 50\n"));
    }

    #[test]
    fn top_product_view_names_the_winner() {
        let report = build_report("alice", "sales.csv", AnalysisKind::TopProduct, &sample());
        assert!(report.contains("Book with sales of 50"));
    }

    #[test]
    fn trend_views_are_chronological() {
        let daily = build_report("alice", "sales.csv", AnalysisKind::DailyTrend, &sample());
        assert!(daily.contains("- 2025-01-01: 50\n- 2025-01-02: 20\n- 2025-02-02: 30"));

        let monthly = build_report("alice", "sales.csv", AnalysisKind::MonthlyTrend, &sample());
        assert!(monthly.contains("- 2025-01: 70\n- 2025-02: 30"));
    }

    #[test]
    fn empty_result_is_called_out() {
        let empty = analysis(&[RawSale::new("Pen", "abc", "2025-01-01")]);
        assert_eq!(empty.aggregation, AggregationResult::empty());

        let report = build_report("alice", "sales.csv", AnalysisKind::SumPerProduct, &empty);
        assert!(report.contains("No valid sales rows found"));
        assert!(!report.contains("## Summary"));
    }
}
