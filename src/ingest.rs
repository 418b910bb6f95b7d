use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::models::RawSale;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to open CSV: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("column `{column}` (mapped to {field}) not found; available columns: {available}")]
    MissingColumn {
        field: &'static str,
        column: String,
        available: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub product: String,
    pub price: String,
    pub date: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            product: "product".to_string(),
            price: "price".to_string(),
            date: "date".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn map_columns(&self, mapping: &ColumnMapping) -> Result<Vec<RawSale>, IngestError> {
        let product = self.column_index("product", &mapping.product)?;
        let price = self.column_index("price", &mapping.price)?;
        let date = self.column_index("date", &mapping.date)?;

        let cell = |row: &[String], index: usize| row.get(index).cloned().unwrap_or_default();

        Ok(self
            .rows
            .iter()
            .map(|row| {
                RawSale::new(
                    cell(row.as_slice(), product),
                    cell(row.as_slice(), price),
                    cell(row.as_slice(), date),
                )
            })
            .collect())
    }

    fn column_index(&self, field: &'static str, column: &str) -> Result<usize, IngestError> {
        let wanted = column.trim();
        self.headers
            .iter()
            .position(|header| header == column)
            .or_else(|| {
                self.headers
                    .iter()
                    .position(|header| header.trim().eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| IngestError::MissingColumn {
                field,
                column: column.to_string(),
                available: self.headers.join(", "),
            })
    }
}

pub fn read_csv(path: &Path) -> Result<RawTable, IngestError> {
    let table = read_csv_from(File::open(path)?)?;
    debug!(path = %path.display(), rows = table.rows.len(), "read sales CSV");
    Ok(table)
}

/// Decode CSV with a header row. Rows may be shorter or longer than the
/// header, and bytes that are not UTF-8 become U+FFFD so a bad cell can
/// only spoil its own row.
pub fn read_csv_from<R: Read>(input: R) -> Result<RawTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);
    let headers = decode(reader.byte_headers()?);
    let mut rows = Vec::new();

    for result in reader.byte_records() {
        rows.push(decode(&result?));
    }

    Ok(RawTable { headers, rows })
}

fn decode(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Item,Amount,Sold On,Region
Book,50,2025-01-01,north
Pen,20,2025-01-02,south
Pen,abc,2025-01-02
";

    fn mapping() -> ColumnMapping {
        ColumnMapping {
            product: "Item".to_string(),
            price: "Amount".to_string(),
            date: "Sold On".to_string(),
        }
    }

    #[test]
    fn maps_arbitrary_headers_and_ignores_extra_columns() {
        let table = read_csv_from(SAMPLE.as_bytes()).unwrap();
        let rows = table.map_columns(&mapping()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], RawSale::new("Book", "50", "2025-01-01"));
        assert_eq!(rows[2], RawSale::new("Pen", "abc", "2025-01-02"));
    }

    #[test]
    fn header_match_falls_back_to_case_insensitive() {
        let table = read_csv_from(SAMPLE.as_bytes()).unwrap();
        let loose = ColumnMapping {
            product: "item".to_string(),
            price: " AMOUNT".to_string(),
            date: "sold on".to_string(),
        };

        assert_eq!(table.map_columns(&loose).unwrap().len(), 3);
    }

    #[test]
    fn missing_column_is_an_error() {
        let table = read_csv_from(SAMPLE.as_bytes()).unwrap();
        let err = table.map_columns(&ColumnMapping::default()).unwrap_err();

        match err {
            IngestError::MissingColumn { field, column, .. } => {
                assert_eq!(field, "product");
                assert_eq!(column, "product");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_rows_read_as_blank_cells() {
        let table = read_csv_from("product,price,date\nBook,12\n".as_bytes()).unwrap();
        let rows = table.map_columns(&ColumnMapping::default()).unwrap();

        assert_eq!(rows, vec![RawSale::new("Book", "12", "")]);
    }

    #[test]
    fn invalid_utf8_stays_inside_its_row() {
        let input: &[u8] = b"product,price,date\nBook,50,2025-01-01\nCaf\xe9,20,2025-01-02\nPen,\xff,2025-01-03\n";
        let rows = read_csv_from(input)
            .unwrap()
            .map_columns(&ColumnMapping::default())
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], RawSale::new("Book", "50", "2025-01-01"));
        assert_eq!(rows[1].product, "Caf\u{FFFD}");
        assert_eq!(rows[2].price, "\u{FFFD}");

        let cleaned = crate::aggregate::clean(&rows);
        assert_eq!(cleaned.records.len(), 2);
        assert_eq!(cleaned.dropped, 1);
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, SAMPLE).unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.headers, vec!["Item", "Amount", "Sold On", "Region"]);
        assert_eq!(table.rows.len(), 3);
    }
}
