use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, XlsxError};
use thiserror::Error;

use crate::models::{AggregationResult, SalesRecord};

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const SHEET_NAME: &str = "Sales";

const NO_DATA_LABEL: &str = "No data";
const NO_DATA_TEXT: &str = "no valid sales rows after cleaning";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("price {0} cannot be written as a spreadsheet number")]
    UnrepresentablePrice(String),

    #[error("timestamp {0} is outside the spreadsheet date range")]
    InvalidTimestamp(NaiveDateTime),
}

pub fn annotation(aggregation: &AggregationResult) -> (&'static str, String) {
    match &aggregation.top_product {
        Some(top) => (
            "Top product",
            format!("{} (Sales: {})", top.product, top.total.normalize()),
        ),
        None => (NO_DATA_LABEL, NO_DATA_TEXT.to_string()),
    }
}

/// `generated_at` becomes the document creation time, so equal inputs give
/// equal bytes.
pub fn to_xlsx(
    records: &[SalesRecord],
    aggregation: &AggregationResult,
    generated_at: NaiveDateTime,
) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let properties = DocProperties::new().set_creation_datetime(&excel_datetime(generated_at)?);
    workbook.set_properties(&properties);

    let bold = Format::new().set_bold();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, header) in ["product", "price", "date"].into_iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header, &bold)?;
    }

    let mut row: u32 = 1;
    for record in records {
        let price = record
            .price
            .to_f64()
            .ok_or_else(|| ExportError::UnrepresentablePrice(record.price.to_string()))?;
        worksheet.write_string(row, 0, &record.product)?;
        worksheet.write_number(row, 1, price)?;
        worksheet.write_string(row, 2, record.date.format("%Y-%m-%d").to_string())?;
        row += 1;
    }

    let (label, text) = annotation(aggregation);
    worksheet.write_string_with_format(row, 0, label, &bold)?;
    worksheet.write_string(row, 1, text)?;

    Ok(workbook.save_to_buffer()?)
}

pub fn totals_to_csv(aggregation: &AggregationResult) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["product", "total"])?;
    for group in &aggregation.by_product {
        writer.write_record([
            group.product.as_str(),
            group.total.normalize().to_string().as_str(),
        ])?;
    }

    writer.into_inner().map_err(|err| ExportError::Io(err.into_error()))
}

fn excel_datetime(timestamp: NaiveDateTime) -> Result<ExcelDateTime, ExportError> {
    let invalid = |_| ExportError::InvalidTimestamp(timestamp);
    let year = u16::try_from(timestamp.year()).map_err(invalid)?;

    Ok(ExcelDateTime::from_ymd(year, timestamp.month() as u8, timestamp.day() as u8)?
        .and_hms(
            timestamp.hour() as u16,
            timestamp.minute() as u8,
            timestamp.second(),
        )?)
}
