//! # Report Model
//!
//! A sheet as data: title, period, headers, typed rows, footer.

use chrono::NaiveDate;
use depot_core::attendance::format_hours;
use depot_core::Money;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReportError;

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Integer(i64),
    Money(Money),
    /// Minutes, shown as decimal hours.
    Hours(i64),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn opt_text(value: Option<&str>) -> Self {
        value.map(Cell::text).unwrap_or(Cell::Empty)
    }

    /// Plain-text rendering, as shown in logs and CSV-like previews.
    pub fn display(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Integer(n) => n.to_string(),
            Cell::Money(m) => m.to_string(),
            Cell::Hours(minutes) => format_hours(*minutes),
            Cell::Date(d) => d.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub sheet_name: String,
    pub title: String,
    pub period: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub footer: Vec<Cell>,
}

impl Report {
    pub fn new(sheet_name: &str, title: &str, period: String, headers: &[&str]) -> Self {
        Report {
            sheet_name: sheet_name.to_string(),
            title: title.to_string(),
            period,
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
            footer: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }

    /// Sum of an integer, money or hours column; text cells count as zero.
    pub fn column_total(&self, column: usize) -> i64 {
        self.rows
            .iter()
            .filter_map(|row| match row.get(column) {
                Some(Cell::Integer(n)) | Some(Cell::Hours(n)) => Some(*n),
                Some(Cell::Money(m)) => Some(m.cents()),
                _ => None,
            })
            .sum()
    }
}

/// `From 2024-05-01 to 2024-05-31`
pub fn period_label(from: NaiveDate, to: NaiveDate) -> String {
    format!("From {from} to {to}")
}

/// The exports the HTTP API and CLI offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportKind {
    Sales,
    Stock,
    Movements,
    Attendance,
}

impl ExportKind {
    pub const ALL: [ExportKind; 4] = [
        ExportKind::Sales,
        ExportKind::Stock,
        ExportKind::Movements,
        ExportKind::Attendance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Sales => "sales",
            ExportKind::Stock => "stock",
            ExportKind::Movements => "movements",
            ExportKind::Attendance => "attendance",
        }
    }

    /// e.g. `sales_2024-05-01_2024-05-31.xlsx`
    pub fn file_name(&self, from: NaiveDate, to: NaiveDate) -> String {
        format!("{}_{}_{}.xlsx", self.as_str(), from, to)
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ExportKind::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| ReportError::UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_total_skips_text() {
        let mut report = Report::new("S", "T", String::new(), &["a", "b"]);
        report.push_row(vec![Cell::text("x"), Cell::Money(Money::from_cents(150))]);
        report.push_row(vec![Cell::text("y"), Cell::Money(Money::from_cents(250))]);
        report.push_row(vec![Cell::text("z"), Cell::Empty]);
        assert_eq!(report.column_total(1), 400);
        assert_eq!(report.column_total(0), 0);
    }

    #[test]
    fn test_export_kind_parsing() {
        assert_eq!("Movements".parse::<ExportKind>().unwrap(), ExportKind::Movements);
        assert!("invoices".parse::<ExportKind>().is_err());

        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(ExportKind::Stock.file_name(d, d), "stock_2024-05-01_2024-05-01.xlsx");
    }

    #[test]
    fn test_cell_display() {
        assert_eq!(Cell::Hours(450).display(), "7.50");
        assert_eq!(Cell::opt_text(None), Cell::Empty);
    }
}
