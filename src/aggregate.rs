use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::models::{
    AggregationResult, CleanedTable, DailyTotal, Money, MonthlyTotal, ProductTotal, RawSale,
    SalesRecord, TopProduct,
};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

// Largest accepted price magnitude. Keeps any in-memory table's sums far
// below the Decimal overflow point (~7.9e28).
const MAX_PRICE: i64 = 1_000_000_000_000_000;

pub fn aggregate(rows: &[RawSale]) -> AggregationResult {
    summarize(&clean(rows).records)
}

/// Coerce every row, dropping any whose price, date or product is unusable.
pub fn clean(rows: &[RawSale]) -> CleanedTable {
    let mut table = CleanedTable::default();

    for row in rows {
        match coerce(row) {
            Some(record) => table.records.push(record),
            None => table.dropped += 1,
        }
    }

    table
}

fn coerce(row: &RawSale) -> Option<SalesRecord> {
    let product = row.product.trim();
    if product.is_empty() {
        return None;
    }

    Some(SalesRecord {
        product: product.to_string(),
        price: parse_price(&row.price)?,
        date: parse_date(&row.date)?,
    })
}

pub fn parse_price(value: &str) -> Option<Money> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    Money::from_str(value)
        .or_else(|_| Money::from_scientific(value))
        .ok()
        .filter(|price| price.abs() <= Money::from(MAX_PRICE))
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
                .map(|datetime| datetime.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|datetime| datetime.date_naive())
        })
}

// Ties go to the first group, in first-appearance order.
pub fn summarize(records: &[SalesRecord]) -> AggregationResult {
    if records.is_empty() {
        return AggregationResult::empty();
    }

    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut by_product: Vec<ProductTotal> = Vec::new();
    let mut grand_total = Money::ZERO;
    let mut earliest_date: Option<NaiveDate> = None;

    for record in records {
        let index = *positions.entry(record.product.as_str()).or_insert_with(|| {
            by_product.push(ProductTotal {
                product: record.product.clone(),
                total: Money::ZERO,
            });
            by_product.len() - 1
        });
        by_product[index].total += record.price;
        grand_total += record.price;
        earliest_date = Some(earliest_date.map_or(record.date, |date| date.min(record.date)));
    }

    let mut top: Option<&ProductTotal> = None;
    for group in &by_product {
        if top.map_or(true, |current| group.total > current.total) {
            top = Some(group);
        }
    }
    let top_product = top.map(|group| TopProduct {
        product: group.product.clone(),
        total: group.total,
    });

    AggregationResult {
        distinct_products: by_product.len(),
        by_product,
        grand_total,
        earliest_date,
        top_product,
    }
}

pub fn daily_totals(records: &[SalesRecord]) -> Vec<DailyTotal> {
    let mut totals: BTreeMap<NaiveDate, Money> = BTreeMap::new();
    for record in records {
        *totals.entry(record.date).or_insert(Money::ZERO) += record.price;
    }

    totals
        .into_iter()
        .map(|(date, total)| DailyTotal { date, total })
        .collect()
}

pub fn monthly_totals(records: &[SalesRecord]) -> Vec<MonthlyTotal> {
    let mut totals: BTreeMap<(i32, u32), Money> = BTreeMap::new();
    for record in records {
        *totals
            .entry((record.date.year(), record.date.month()))
            .or_insert(Money::ZERO) += record.price;
    }

    totals
        .into_iter()
        .map(|((year, month), total)| MonthlyTotal { year, month, total })
        .collect()
}
