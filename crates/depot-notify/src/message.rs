//! # Message Builders
//!
//! HTML texts for the Bot API (`parse_mode = "HTML"`). Every value that
//! comes from the database goes through [`escape_html`].

use chrono::{DateTime, NaiveDate, Utc};
use depot_core::{DueFilter, Machine, Money, Sale, SaleStatus, StockLevel};
use std::fmt::Write;

/// Lines listed before a message is cut short; Telegram caps messages at
/// 4096 characters.
pub const MAX_LIST_LINES: usize = 40;

/// Escapes the three characters Telegram's HTML mode reserves.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_overflow(out: &mut String, total: usize) {
    if total > MAX_LIST_LINES {
        let _ = write!(out, "\n…and {} more", total - MAX_LIST_LINES);
    }
}

/// Products at or below their threshold.
pub fn low_stock(levels: &[StockLevel]) -> String {
    let mut out = format!("⚠️ <b>Low stock</b> ({} item{})\n", levels.len(), plural(levels.len()));
    for level in levels.iter().take(MAX_LIST_LINES) {
        let _ = write!(
            out,
            "\n• <b>{}</b> {} @ {}: {} left (threshold {})",
            escape_html(&level.sku),
            escape_html(&level.product_name),
            escape_html(&level.warehouse_code),
            level.quantity,
            level.low_stock_threshold
        );
    }
    push_overflow(&mut out, levels.len());
    out
}

/// A sale moved from `previous` to its current status.
pub fn sale_status_changed(sale: &Sale, previous: SaleStatus) -> String {
    format!(
        "🧾 <b>{}</b>: {} → <b>{}</b>\nCustomer: {}\nNet total: {}",
        escape_html(&sale.invoice_number),
        previous,
        sale.status,
        escape_html(&sale.customer_name),
        Money::from_cents(sale.net_total_cents)
    )
}

/// A completed sale and the machines it provisioned.
pub fn sale_completed(sale: &Sale, machines: &[Machine]) -> String {
    let mut out = format!(
        "✅ <b>Sale completed</b> {}\nCustomer: {}",
        escape_html(&sale.invoice_number),
        escape_html(&sale.customer_name)
    );
    if let Some(phone) = &sale.customer_phone {
        let _ = write!(out, " ({})", escape_html(phone));
    }
    let _ = write!(out, "\nNet total: {}", Money::from_cents(sale.net_total_cents));

    if !machines.is_empty() {
        let _ = write!(out, "\n\nMachines installed ({}):", machines.len());
        for machine in machines.iter().take(MAX_LIST_LINES) {
            let _ = write!(
                out,
                "\n• <code>{}</code> on {}",
                escape_html(&machine.serial_number),
                machine.installed_on
            );
        }
        push_overflow(&mut out, machines.len());
    }
    out
}

/// Filters due for replacement as of `today`.
pub fn filters_due(due: &[DueFilter], today: NaiveDate) -> String {
    let mut out = format!("🔧 <b>Filters due</b> as of {} ({})\n", today, due.len());
    for filter in due.iter().take(MAX_LIST_LINES) {
        let overdue = (today - filter.due_on).num_days();
        let when = if overdue > 0 {
            format!("{} day{} overdue", overdue, plural(overdue as usize))
        } else if overdue == 0 {
            "due today".to_string()
        } else {
            format!("due {}", filter.due_on)
        };
        let _ = write!(
            out,
            "\n• <code>{}</code> {}: {} {}",
            escape_html(&filter.serial_number),
            escape_html(&filter.customer_name),
            escape_html(&filter.filter_sku),
            when
        );
        if let Some(phone) = &filter.customer_phone {
            let _ = write!(out, " ☎ {}", escape_html(phone));
        }
    }
    push_overflow(&mut out, due.len());
    out
}

/// Connectivity check from the CLI.
pub fn test_message(text: Option<&str>, at: DateTime<Utc>) -> String {
    format!(
        "🔔 <b>Depot test message</b>\n{}\n<i>{}</i>",
        escape_html(text.unwrap_or("Telegram notifications are working.")),
        at.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(sku: &str, quantity: i64) -> StockLevel {
        StockLevel {
            product_id: "p".into(),
            sku: sku.into(),
            product_name: "Filter <5µm> & co".into(),
            warehouse_id: "w".into(),
            warehouse_code: "MAIN".into(),
            warehouse_name: "Main".into(),
            quantity,
            low_stock_threshold: 5,
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_low_stock_escapes_names() {
        let text = low_stock(&[level("FLT-SED", 2)]);
        assert!(text.contains("Filter &lt;5µm&gt; &amp; co"));
        assert!(text.contains("2 left (threshold 5)"));
        assert!(text.starts_with("⚠️ <b>Low stock</b> (1 item)"));
    }

    #[test]
    fn test_long_lists_are_cut() {
        let levels: Vec<StockLevel> = (0..MAX_LIST_LINES + 5).map(|i| level(&format!("S-{i}"), 0)).collect();
        let text = low_stock(&levels);
        assert!(text.ends_with("…and 5 more"));
        assert!(!text.contains(&format!("S-{}", MAX_LIST_LINES)));
    }

    #[test]
    fn test_filters_due_wording() {
        let today = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let due = DueFilter {
            filter_id: "f".into(),
            machine_id: "m".into(),
            serial_number: "M-20231101-ABCDEF".into(),
            customer_name: "Otieno & Sons".into(),
            customer_phone: None,
            customer_address: None,
            filter_sku: "FLT-SED".into(),
            filter_name: "Sediment".into(),
            installed_on: NaiveDate::from_ymd_opt(2023, 11, 1).unwrap(),
            lifespan_days: 180,
            due_on: NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
        };
        let text = filters_due(&[due], today);
        assert!(text.contains("Otieno &amp; Sons"));
        assert!(text.contains("3 days overdue"));
    }

    #[test]
    fn test_message_default_text() {
        let text = test_message(None, Utc::now());
        assert!(text.contains("Telegram notifications are working."));
    }
}
