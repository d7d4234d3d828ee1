//! # Machines and Filters
//!
//! Serial numbers, filter usage and the provisioning plan for completed
//! sales.
//!
//! ## Provisioning
//! ```text
//!  Sale (completed)
//!   ├── item: RO-500 (machine) × 2  ──► Machine M-20240301-1A2B3C
//!   │                                     ├── filter SED-10 (180 days)
//!   │                                     └── filter CTO-10 (365 days)
//!   │                               ──► Machine M-20240301-9F8E7D
//!   │                                     └── ... same filter set
//!   └── item: SED-10 (filter) × 4   ──► (nothing, plain stock)
//! ```

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::types::{ProductFilter, ProductKind};

/// Upper bound for a filter lifespan (100 years).
pub const MAX_LIFESPAN_DAYS: i64 = 36_500;

// =============================================================================
// Statuses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum FilterStatus {
    Active,
    Replaced,
}

impl fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MachineStatus::Active => "active",
            MachineStatus::Inactive => "inactive",
        })
    }
}

impl fmt::Display for FilterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FilterStatus::Active => "active",
            FilterStatus::Replaced => "replaced",
        })
    }
}

// =============================================================================
// Serial Numbers
// =============================================================================

/// Builds `M-YYYYMMDD-XXXXXX` from the install date and an id.
///
/// ```rust
/// use chrono::NaiveDate;
/// use depot_core::machine::serial_number;
/// use uuid::Uuid;
///
/// let id = Uuid::parse_str("1a2b3c4d-0000-4000-8000-000000000000").unwrap();
/// let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
/// assert_eq!(serial_number(date, &id), "M-20240301-1A2B3C");
/// ```
pub fn serial_number(installed_on: NaiveDate, id: &Uuid) -> String {
    let hex = id.simple().to_string().to_uppercase();
    format!("M-{}-{}", installed_on.format("%Y%m%d"), &hex[..6])
}

// =============================================================================
// Filter Usage
// =============================================================================

/// Date a filter installed on `installed_on` must be replaced.
pub fn due_date(installed_on: NaiveDate, lifespan_days: i64) -> NaiveDate {
    let days = lifespan_days.clamp(0, MAX_LIFESPAN_DAYS);
    installed_on
        .checked_add_signed(Duration::days(days))
        .unwrap_or(NaiveDate::MAX)
}

/// How far through its life a filter is on a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterUsage {
    pub installed_on: NaiveDate,
    pub due_on: NaiveDate,
    pub elapsed_days: i64,
    /// Days until due; 0 once due.
    pub remaining_days: i64,
    /// 0..=100
    pub percent_used: u8,
    pub is_due: bool,
}

impl FilterUsage {
    pub fn evaluate(installed_on: NaiveDate, lifespan_days: i64, today: NaiveDate) -> Self {
        let lifespan = lifespan_days.clamp(0, MAX_LIFESPAN_DAYS);
        let due_on = due_date(installed_on, lifespan);
        let elapsed_days = (today - installed_on).num_days().max(0);
        let remaining_days = (due_on - today).num_days().max(0);

        let percent_used = if lifespan == 0 {
            100
        } else {
            (elapsed_days * 100 / lifespan).min(100) as u8
        };

        FilterUsage {
            installed_on,
            due_on,
            elapsed_days,
            remaining_days,
            percent_used,
            is_due: today >= due_on,
        }
    }
}

// =============================================================================
// Provisioning Plan
// =============================================================================

/// A sale line considered for provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionItem {
    pub sale_item_id: String,
    pub product_id: String,
    pub kind: ProductKind,
    pub quantity: i64,
    /// Machines that already exist for this line.
    pub already_provisioned: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedFilter {
    pub filter_product_id: String,
    pub lifespan_days: i64,
    pub due_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedMachine {
    pub sale_item_id: String,
    pub product_id: String,
    pub filters: Vec<PlannedFilter>,
}

/// Plans one machine per missing unit of every machine-kind line.
///
/// Lines that already have their machines plan nothing, so running the plan
/// twice for the same sale creates no duplicates.
pub fn provision_plan(
    items: &[ProvisionItem],
    filter_sets: &HashMap<String, Vec<ProductFilter>>,
    installed_on: NaiveDate,
) -> Vec<PlannedMachine> {
    let mut plan = Vec::new();

    for item in items.iter().filter(|i| i.kind == ProductKind::Machine) {
        let missing = (item.quantity - item.already_provisioned).max(0);
        if missing == 0 {
            continue;
        }

        let filters: Vec<PlannedFilter> = filter_sets
            .get(&item.product_id)
            .map(|set| {
                set.iter()
                    .flat_map(|pf| {
                        (0..pf.quantity.max(0)).map(move |_| PlannedFilter {
                            filter_product_id: pf.filter_product_id.clone(),
                            lifespan_days: pf.lifespan_days,
                            due_on: due_date(installed_on, pf.lifespan_days),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        for _ in 0..missing {
            plan.push(PlannedMachine {
                sale_item_id: item.sale_item_id.clone(),
                product_id: item.product_id.clone(),
                filters: filters.clone(),
            });
        }
    }

    plan
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_serial_number_format() {
        let serial = serial_number(date(2024, 12, 31), &Uuid::new_v4());
        assert!(serial.starts_with("M-20241231-"));
        assert_eq!(serial.len(), "M-20241231-".len() + 6);
        assert!(serial[11..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_filter_usage_midlife() {
        let usage = FilterUsage::evaluate(date(2024, 1, 1), 100, date(2024, 2, 20));
        assert_eq!(usage.elapsed_days, 50);
        assert_eq!(usage.remaining_days, 50);
        assert_eq!(usage.percent_used, 50);
        assert_eq!(usage.due_on, date(2024, 4, 10));
        assert!(!usage.is_due);
    }

    #[test]
    fn test_filter_usage_overdue_is_capped() {
        let usage = FilterUsage::evaluate(date(2024, 1, 1), 30, date(2024, 6, 1));
        assert_eq!(usage.percent_used, 100);
        assert_eq!(usage.remaining_days, 0);
        assert!(usage.is_due);
    }

    #[test]
    fn test_filter_usage_due_on_exact_day() {
        let usage = FilterUsage::evaluate(date(2024, 1, 1), 10, date(2024, 1, 11));
        assert!(usage.is_due);
        assert_eq!(usage.percent_used, 100);
    }

    #[test]
    fn test_filter_usage_before_install() {
        let usage = FilterUsage::evaluate(date(2024, 1, 10), 10, date(2024, 1, 1));
        assert_eq!(usage.elapsed_days, 0);
        assert_eq!(usage.percent_used, 0);
    }

    #[test]
    fn test_provision_plan() {
        let items = vec![
            ProvisionItem {
                sale_item_id: "si-1".into(),
                product_id: "ro-500".into(),
                kind: ProductKind::Machine,
                quantity: 2,
                already_provisioned: 0,
            },
            ProvisionItem {
                sale_item_id: "si-2".into(),
                product_id: "sed-10".into(),
                kind: ProductKind::Filter,
                quantity: 4,
                already_provisioned: 0,
            },
        ];
        let mut sets = HashMap::new();
        sets.insert(
            "ro-500".to_string(),
            vec![
                ProductFilter {
                    machine_product_id: "ro-500".into(),
                    filter_product_id: "sed-10".into(),
                    quantity: 2,
                    lifespan_days: 180,
                },
                ProductFilter {
                    machine_product_id: "ro-500".into(),
                    filter_product_id: "cto-10".into(),
                    quantity: 1,
                    lifespan_days: 365,
                },
            ],
        );

        let plan = provision_plan(&items, &sets, date(2024, 3, 1));
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|m| m.sale_item_id == "si-1"));
        assert_eq!(plan[0].filters.len(), 3);
        assert_eq!(plan[0].filters[2].due_on, date(2025, 3, 1));
    }

    #[test]
    fn test_provision_plan_skips_provisioned_units() {
        let items = vec![ProvisionItem {
            sale_item_id: "si-1".into(),
            product_id: "ro-500".into(),
            kind: ProductKind::Machine,
            quantity: 3,
            already_provisioned: 2,
        }];
        let plan = provision_plan(&items, &HashMap::new(), date(2024, 3, 1));
        assert_eq!(plan.len(), 1);
        assert!(plan[0].filters.is_empty());

        let done = ProvisionItem {
            already_provisioned: 3,
            ..items[0].clone()
        };
        assert!(provision_plan(&[done], &HashMap::new(), date(2024, 3, 1)).is_empty());
    }
}
