//! Follow-up notifications.
//!
//! The `spawn_*` / `notify_*` helpers run after a handler's workflow has
//! committed and never delay its response. The `check_*` functions back the
//! console commands and return what they found.

use chrono::NaiveDate;
use depot_core::{DueFilter, StockLevel};
use depot_db::{Database, SaleTransition};
use depot_notify::{message, Notifier};
use tracing::{debug, info, warn};

/// Spawns a low-stock check limited to `product_ids`.
pub fn spawn_low_stock_check(db: &Database, notifier: &Notifier, product_ids: Vec<String>) {
    if product_ids.is_empty() {
        return;
    }
    let db = db.clone();
    let notifier = notifier.clone();
    tokio::spawn(async move {
        match db.stock().low_stock_for(&product_ids).await {
            Ok(levels) if levels.is_empty() => debug!(products = product_ids.len(), "No low stock"),
            Ok(levels) => {
                info!(rows = levels.len(), "Low stock after workflow");
                if let Err(err) = notifier.send(&message::low_stock(&levels)).await {
                    warn!(error = %err, "Low-stock notification failed");
                }
            }
            Err(err) => warn!(error = %err, "Low-stock check failed"),
        }
    });
}

/// Status-change message, plus provisioned machines on completion.
pub fn notify_sale_transition(notifier: &Notifier, transition: &SaleTransition) {
    let sale = &transition.detail.sale;
    notifier.spawn_send(message::sale_status_changed(sale, transition.previous));
    if !transition.machines.is_empty() {
        let machines: Vec<_> = transition.machines.iter().map(|m| m.machine.clone()).collect();
        notifier.spawn_send(message::sale_completed(sale, &machines));
    }
}

/// Full low-stock scan; sends only when asked and something is low.
pub async fn check_low_stock(db: &Database, notifier: &Notifier, notify: bool) -> anyhow::Result<Vec<StockLevel>> {
    let levels = db.stock().low_stock().await?;
    if notify && !levels.is_empty() {
        notifier.send(&message::low_stock(&levels)).await?;
    }
    Ok(levels)
}

pub async fn check_filters_due(
    db: &Database,
    notifier: &Notifier,
    within_days: i64,
    today: NaiveDate,
    notify: bool,
) -> anyhow::Result<Vec<DueFilter>> {
    let due = db.machines().filters_due(within_days, today).await?;
    if notify && !due.is_empty() {
        notifier.send(&message::filters_due(&due, today)).await?;
    }
    Ok(due)
}
