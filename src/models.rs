use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

pub type Money = Decimal;

pub const DEFAULT_ANALYSIS_KIND: &str = "sum-per-product";
pub const DEFAULT_REPORT_SCHEDULE: &str = "weekly";

/// A row after column mapping, before any coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSale {
    pub product: String,
    pub price: String,
    pub date: String,
}

impl RawSale {
    pub fn new(product: impl Into<String>, price: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            price: price.into(),
            date: date.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesRecord {
    pub product: String,
    pub price: Money,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedTable {
    pub records: Vec<SalesRecord>,
    pub dropped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductTotal {
    pub product: String,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopProduct {
    pub product: String,
    pub total: Money,
}

// Groups keep first-appearance order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationResult {
    pub by_product: Vec<ProductTotal>,
    pub grand_total: Money,
    pub distinct_products: usize,
    pub earliest_date: Option<NaiveDate>,
    pub top_product: Option<TopProduct>,
}

impl AggregationResult {
    pub fn empty() -> Self {
        Self {
            by_product: Vec::new(),
            grand_total: Money::ZERO,
            distinct_products: 0,
            earliest_date: None,
            top_product: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_product.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTotal {
    pub year: i32,
    pub month: u32,
    pub total: Money,
}

impl fmt::Display for MonthlyTotal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPreference {
    pub username: String,
    pub analysis_kind: String,
    pub report_schedule: String,
}

impl UserPreference {
    pub fn default_for(username: &str) -> Self {
        Self {
            username: username.to_string(),
            analysis_kind: DEFAULT_ANALYSIS_KIND.to_string(),
            report_schedule: DEFAULT_REPORT_SCHEDULE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRecord {
    pub id: i64,
    pub username: String,
    pub report_time: NaiveDateTime,
    pub report_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    pub aggregation: AggregationResult,
    pub daily: Vec<DailyTotal>,
    pub monthly: Vec<MonthlyTotal>,
    pub rows_read: usize,
    pub rows_dropped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AnalysisKind {
    #[default]
    SumPerProduct,
    TopProduct,
    DailyTrend,
    MonthlyTrend,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::SumPerProduct => "sum-per-product",
            AnalysisKind::TopProduct => "top-product",
            AnalysisKind::DailyTrend => "daily-trend",
            AnalysisKind::MonthlyTrend => "monthly-trend",
        }
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "sum-per-product" => Ok(AnalysisKind::SumPerProduct),
            "top-product" => Ok(AnalysisKind::TopProduct),
            "daily-trend" => Ok(AnalysisKind::DailyTrend),
            "monthly-trend" => Ok(AnalysisKind::MonthlyTrend),
            other => Err(format!("unknown analysis kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSchedule {
    Daily,
    Weekly,
    Monthly,
}

impl ReportSchedule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportSchedule::Daily => "daily",
            ReportSchedule::Weekly => "weekly",
            ReportSchedule::Monthly => "monthly",
        }
    }
}

impl FromStr for ReportSchedule {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "daily" => Ok(ReportSchedule::Daily),
            "weekly" => Ok(ReportSchedule::Weekly),
            "monthly" => Ok(ReportSchedule::Monthly),
            other => Err(format!("unknown report schedule: {other}")),
        }
    }
}
