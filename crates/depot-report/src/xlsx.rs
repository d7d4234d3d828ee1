//! # Workbook Writer
//!
//! Writes a [`Report`] as a single-sheet .xlsx.
//!
//! ```text
//!   row 1   title            (bold)
//!   row 2   period
//!   row 3   blank
//!   row 4   headers          (bold)
//!   row 5+  data
//!   next    footer           (bold)
//! ```
//!
//! Money and hours are numbers with two decimals; dates are written as
//! `YYYY-MM-DD` text.

use std::path::Path;

use depot_core::attendance::minutes_to_hours;
use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::debug;

use crate::error::ReportResult;
use crate::model::{Cell, Report};

pub const TITLE_ROW: u32 = 0;
pub const PERIOD_ROW: u32 = 1;
pub const HEADER_ROW: u32 = 3;
pub const FIRST_DATA_ROW: u32 = 4;

const MIN_COLUMN_WIDTH: usize = 10;
const MAX_COLUMN_WIDTH: usize = 48;

/// Row the footer lands on for a report with `data_rows` rows.
pub fn footer_row(data_rows: usize) -> u32 {
    FIRST_DATA_ROW + data_rows as u32
}

struct Formats {
    bold: Format,
    money: Format,
    hours: Format,
    bold_money: Format,
    bold_hours: Format,
}

impl Formats {
    fn new() -> Self {
        Formats {
            bold: Format::new().set_bold(),
            money: Format::new().set_num_format("#,##0.00"),
            hours: Format::new().set_num_format("0.00"),
            bold_money: Format::new().set_bold().set_num_format("#,##0.00"),
            bold_hours: Format::new().set_bold().set_num_format("0.00"),
        }
    }
}

/// Renders the report into an in-memory workbook.
pub fn write_xlsx(report: &Report) -> ReportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        fill_sheet(sheet, report)?;
    }
    let bytes = workbook.save_to_buffer()?;
    debug!(
        sheet = %report.sheet_name,
        rows = report.rows.len(),
        bytes = bytes.len(),
        "Report rendered"
    );
    Ok(bytes)
}

pub fn save_xlsx(report: &Report, path: impl AsRef<Path>) -> ReportResult<()> {
    let bytes = write_xlsx(report)?;
    std::fs::write(path.as_ref(), bytes)?;
    Ok(())
}

fn fill_sheet(sheet: &mut Worksheet, report: &Report) -> ReportResult<()> {
    let formats = Formats::new();

    sheet.set_name(&report.sheet_name)?;
    sheet.write_string_with_format(TITLE_ROW, 0, &report.title, &formats.bold)?;
    sheet.write_string(PERIOD_ROW, 0, &report.period)?;

    for (col, header) in report.headers.iter().enumerate() {
        sheet.write_string_with_format(HEADER_ROW, col as u16, header, &formats.bold)?;
    }

    for (i, row) in report.rows.iter().enumerate() {
        let r = FIRST_DATA_ROW + i as u32;
        for (col, cell) in row.iter().enumerate() {
            write_cell(sheet, r, col as u16, cell, &formats, false)?;
        }
    }

    if !report.footer.is_empty() {
        let r = footer_row(report.rows.len());
        for (col, cell) in report.footer.iter().enumerate() {
            write_cell(sheet, r, col as u16, cell, &formats, true)?;
        }
    }

    for (col, width) in column_widths(report).into_iter().enumerate() {
        sheet.set_column_width(col as u16, width as f64)?;
    }
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    formats: &Formats,
    bold: bool,
) -> ReportResult<()> {
    match cell {
        Cell::Empty => {}
        Cell::Text(s) if bold => {
            sheet.write_string_with_format(row, col, s, &formats.bold)?;
        }
        Cell::Text(s) => {
            sheet.write_string(row, col, s)?;
        }
        Cell::Integer(n) if bold => {
            sheet.write_number_with_format(row, col, *n as f64, &formats.bold)?;
        }
        Cell::Integer(n) => {
            sheet.write_number(row, col, *n as f64)?;
        }
        Cell::Money(m) => {
            let format = if bold { &formats.bold_money } else { &formats.money };
            sheet.write_number_with_format(row, col, m.to_major_f64(), format)?;
        }
        Cell::Hours(minutes) => {
            let format = if bold { &formats.bold_hours } else { &formats.hours };
            sheet.write_number_with_format(row, col, minutes_to_hours(*minutes), format)?;
        }
        Cell::Date(d) => {
            sheet.write_string(row, col, d.format("%Y-%m-%d").to_string())?;
        }
    }
    Ok(())
}

/// Widest rendered value per column, clamped.
fn column_widths(report: &Report) -> Vec<usize> {
    let mut widths: Vec<usize> = report.headers.iter().map(|h| h.chars().count()).collect();
    for row in report.rows.iter().chain(std::iter::once(&report.footer)) {
        for (col, cell) in row.iter().enumerate() {
            let len = cell.display().chars().count();
            match widths.get_mut(col) {
                Some(w) => *w = (*w).max(len),
                None => widths.push(len),
            }
        }
    }
    widths
        .into_iter()
        .map(|w| (w + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use depot_core::Money;

    fn sample() -> Report {
        let mut report = Report::new("Sales", "Sales report", "From 2024-05-01 to 2024-05-31".into(), &["Invoice", "Date", "Net"]);
        report.push_row(vec![
            Cell::text("INV-20240501-0001"),
            Cell::Date(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()),
            Cell::Money(Money::from_cents(52_200)),
        ]);
        report.push_row(vec![Cell::text("INV-20240502-0001"), Cell::Empty, Cell::Hours(90)]);
        report.footer = vec![Cell::text("Total"), Cell::Empty, Cell::Money(Money::from_cents(52_200))];
        report
    }

    #[test]
    fn test_layout_rows() {
        assert_eq!(footer_row(0), 4);
        assert_eq!(footer_row(2), 6);
        assert!(TITLE_ROW < PERIOD_ROW && PERIOD_ROW < HEADER_ROW && HEADER_ROW < FIRST_DATA_ROW);
    }

    #[test]
    fn test_write_produces_zip_container() {
        let bytes = write_xlsx(&sample()).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_empty_report_still_renders() {
        let report = Report::new("Stock", "Stock levels", "As of 2024-05-01".into(), &["SKU"]);
        let bytes = write_xlsx(&report).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn test_column_widths_are_clamped() {
        let mut report = Report::new("S", "T", String::new(), &["A"]);
        report.push_row(vec![Cell::text("x".repeat(200)), Cell::text("y")]);
        let widths = column_widths(&report);
        assert_eq!(widths, vec![MAX_COLUMN_WIDTH, MIN_COLUMN_WIDTH]);
    }

    #[test]
    fn test_save_writes_file() {
        let path = std::env::temp_dir().join(format!("depot-report-test-{}.xlsx", std::process::id()));
        save_xlsx(&sample(), &path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(&bytes[..2], b"PK");
    }
}
