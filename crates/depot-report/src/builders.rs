//! # Report Builders
//!
//! One function per export; each fills rows and a totals footer.
//!
//! ```text
//!   sales_report       Invoice │ Date │ Customer │ Status │ Total │ Discount │ Tax │ Net
//!   stock_report       SKU │ Product │ Warehouse │ Quantity │ Threshold │ Low
//!   movement_report    Date │ SKU │ Product │ Warehouse │ Type │ Qty │ Balance │ Ref │ Note
//!   attendance_report  Date │ Name │ Email │ In │ Out │ Late │ Work hours │ Overtime
//! ```

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use depot_core::attendance::local_time;
use depot_core::{AttendanceLine, Money, MovementLine, Sale, SaleStatus, StockLevel};

use crate::model::{period_label, Cell, Report};

pub fn sales_report(sales: &[Sale], from: NaiveDate, to: NaiveDate) -> Report {
    let mut report = Report::new(
        "Sales",
        "Sales report",
        period_label(from, to),
        &[
            "Invoice",
            "Date",
            "Customer",
            "Phone",
            "Status",
            "Total",
            "Discount",
            "Tax",
            "Net total",
        ],
    );

    for sale in sales {
        report.push_row(vec![
            Cell::text(&sale.invoice_number),
            Cell::Date(sale.created_at.date_naive()),
            Cell::text(&sale.customer_name),
            Cell::opt_text(sale.customer_phone.as_deref()),
            Cell::text(sale.status.as_str()),
            Cell::Money(Money::from_cents(sale.total_amount_cents)),
            Cell::Money(Money::from_cents(sale.discount_cents)),
            Cell::Money(Money::from_cents(sale.tax_cents)),
            Cell::Money(Money::from_cents(sale.net_total_cents)),
        ]);
    }

    // cancelled sales are listed but never counted as revenue
    let counted: Vec<&Sale> = sales.iter().filter(|s| s.status != SaleStatus::Cancelled).collect();
    let sum = |cents: fn(&Sale) -> i64| Cell::Money(Money::from_cents(counted.iter().map(|s| cents(s)).sum()));
    let cancelled = sales.len() - counted.len();
    let label = if cancelled == 0 {
        format!("{} sales", counted.len())
    } else {
        format!("{} sales ({} cancelled, not totalled)", counted.len(), cancelled)
    };

    report.footer = vec![
        Cell::text("Total"),
        Cell::Empty,
        Cell::text(label),
        Cell::Empty,
        Cell::Empty,
        sum(|s| s.total_amount_cents),
        sum(|s| s.discount_cents),
        sum(|s| s.tax_cents),
        sum(|s| s.net_total_cents),
    ];
    report
}

pub fn stock_report(levels: &[StockLevel], as_of: NaiveDate) -> Report {
    let mut report = Report::new(
        "Stock",
        "Stock levels",
        format!("As of {as_of}"),
        &["SKU", "Product", "Warehouse", "Quantity", "Threshold", "Low"],
    );

    for level in levels {
        report.push_row(vec![
            Cell::text(&level.sku),
            Cell::text(&level.product_name),
            Cell::text(&level.warehouse_code),
            Cell::Integer(level.quantity),
            Cell::Integer(level.low_stock_threshold),
            Cell::text(if level.is_low() { "Yes" } else { "" }),
        ]);
    }

    let low = levels.iter().filter(|l| l.is_low()).count();
    report.footer = vec![
        Cell::text("Total"),
        Cell::text(format!("{} rows", levels.len())),
        Cell::Empty,
        Cell::Integer(report.column_total(3)),
        Cell::Empty,
        Cell::Integer(low as i64),
    ];
    report
}

pub fn movement_report(lines: &[MovementLine], from: NaiveDate, to: NaiveDate) -> Report {
    let mut report = Report::new(
        "Movements",
        "Stock movements",
        period_label(from, to),
        &[
            "Date",
            "SKU",
            "Product",
            "Warehouse",
            "Type",
            "Quantity",
            "Balance after",
            "Reference",
            "Note",
        ],
    );

    for line in lines {
        let m = &line.movement;
        let reference = match (&m.reference_type, &m.reference_id) {
            (Some(kind), Some(id)) => Cell::text(format!("{kind}:{id}")),
            (Some(kind), None) => Cell::text(kind),
            _ => Cell::Empty,
        };
        report.push_row(vec![
            Cell::Date(m.created_at.date_naive()),
            Cell::text(&line.sku),
            Cell::text(&line.product_name),
            Cell::text(&line.warehouse_code),
            Cell::text(m.movement_type.as_str()),
            Cell::Integer(m.quantity),
            Cell::Integer(m.balance_after),
            reference,
            Cell::opt_text(m.note.as_deref()),
        ]);
    }

    let inbound: i64 = lines.iter().map(|l| l.movement.quantity).filter(|q| *q > 0).sum();
    let outbound: i64 = lines.iter().map(|l| l.movement.quantity).filter(|q| *q < 0).sum();
    report.footer = vec![
        Cell::text("Net change"),
        Cell::text(format!("in {inbound}")),
        Cell::text(format!("out {}", -outbound)),
        Cell::Empty,
        Cell::Empty,
        Cell::Integer(report.column_total(5)),
    ];
    report
}

/// Check-in and check-out times are shown at `offset`.
pub fn attendance_report(lines: &[AttendanceLine], from: NaiveDate, to: NaiveDate, offset: FixedOffset) -> Report {
    let mut report = Report::new(
        "Attendance",
        "Attendance report",
        period_label(from, to),
        &[
            "Date",
            "Name",
            "Email",
            "Check in",
            "Check out",
            "Late",
            "Work hours",
            "Overtime",
        ],
    );

    let clock = |at: DateTime<Utc>| Cell::text(local_time(at, offset).format("%H:%M").to_string());

    for line in lines {
        let a = &line.attendance;
        report.push_row(vec![
            Cell::Date(a.work_date),
            Cell::text(&line.user_name),
            Cell::text(&line.user_email),
            clock(a.check_in_at),
            a.check_out_at.map(clock).unwrap_or(Cell::Empty),
            Cell::text(if a.is_late { "Yes" } else { "" }),
            a.work_minutes.map(Cell::Hours).unwrap_or(Cell::Empty),
            a.overtime_minutes.map(Cell::Hours).unwrap_or(Cell::Empty),
        ]);
    }

    let late = lines.iter().filter(|l| l.attendance.is_late).count();
    report.footer = vec![
        Cell::text("Total"),
        Cell::text(format!("{} days", lines.len())),
        Cell::Empty,
        Cell::Empty,
        Cell::Empty,
        Cell::Integer(late as i64),
        Cell::Hours(report.column_total(6)),
        Cell::Hours(report.column_total(7)),
    ];
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use depot_core::Attendance;

    fn sale(invoice: &str, total: i64, discount: i64, tax: i64) -> Sale {
        let now = Utc::now();
        Sale {
            id: invoice.to_lowercase(),
            invoice_number: invoice.into(),
            customer_name: "Customer".into(),
            customer_phone: None,
            customer_address: None,
            warehouse_id: "w".into(),
            status: SaleStatus::Completed,
            total_amount_cents: total,
            discount_cents: discount,
            tax_cents: tax,
            net_total_cents: total - discount + tax,
            sold_by: None,
            notes: None,
            created_at: now,
            updated_at: now,
            completed_at: Some(now),
        }
    }

    #[test]
    fn test_sales_footer_sums_money() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let report = sales_report(&[sale("INV-1", 10_000, 1_000, 1_440), sale("INV-2", 5_000, 0, 800)], day, day);

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.footer[5], Cell::Money(Money::from_cents(15_000)));
        assert_eq!(report.footer[8], Cell::Money(Money::from_cents(16_240)));
        assert_eq!(report.period, "From 2024-05-01 to 2024-05-01");
        assert_eq!(report.footer.len(), report.headers.len());
    }

    #[test]
    fn test_cancelled_sales_listed_but_not_totalled() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut void = sale("INV-3", 90_000, 0, 0);
        void.status = SaleStatus::Cancelled;
        let report = sales_report(&[sale("INV-1", 10_000, 1_000, 1_440), void], day, day);

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[1][4], Cell::text("cancelled"));
        assert_eq!(report.footer[2], Cell::text("1 sales (1 cancelled, not totalled)"));
        assert_eq!(report.footer[5], Cell::Money(Money::from_cents(10_000)));
        assert_eq!(report.footer[8], Cell::Money(Money::from_cents(10_440)));
    }

    #[test]
    fn test_attendance_hours_and_local_times() {
        let offset = FixedOffset::east_opt(3 * 3600).unwrap();
        let check_in = Utc.with_ymd_and_hms(2024, 5, 6, 6, 0, 0).unwrap();
        let line = |worked: Option<i64>, overtime: Option<i64>, late: bool| AttendanceLine {
            attendance: Attendance {
                id: "a".into(),
                user_id: "u".into(),
                work_date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
                check_in_at: check_in,
                check_out_at: worked.map(|_| check_in + chrono::Duration::hours(10)),
                work_minutes: worked,
                overtime_minutes: overtime,
                is_late: late,
                created_at: check_in,
                updated_at: check_in,
            },
            user_name: "Grace".into(),
            user_email: "grace@example.com".into(),
        };

        let day = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let report = attendance_report(
            &[line(Some(540), Some(60), false), line(Some(450), Some(0), true), line(None, None, false)],
            day,
            day,
            offset,
        );

        assert_eq!(report.rows[0][3], Cell::text("09:00"));
        assert_eq!(report.rows[0][4], Cell::text("19:00"));
        assert_eq!(report.rows[2][4], Cell::Empty);
        assert_eq!(report.footer[5], Cell::Integer(1));
        assert_eq!(report.footer[6], Cell::Hours(990));
        assert_eq!(report.footer[7], Cell::Hours(60));
    }

    #[test]
    fn test_stock_report_flags_low_rows() {
        let level = |q: i64, t: i64| StockLevel {
            product_id: "p".into(),
            sku: "FLT-SED".into(),
            product_name: "Sediment".into(),
            warehouse_id: "w".into(),
            warehouse_code: "MAIN".into(),
            warehouse_name: "Main".into(),
            quantity: q,
            low_stock_threshold: t,
        };
        let report = stock_report(&[level(3, 5), level(10, 5), level(0, 0)], NaiveDate::from_ymd_opt(2024, 5, 6).unwrap());
        assert_eq!(report.rows[0][5], Cell::text("Yes"));
        assert_eq!(report.rows[2][5], Cell::text(""));
        assert_eq!(report.footer[3], Cell::Integer(13));
        assert_eq!(report.footer[5], Cell::Integer(1));
    }
}
