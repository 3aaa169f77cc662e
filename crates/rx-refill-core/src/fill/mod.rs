//! Fill quantity calculator.
//!
//! Turns a pharmacist's dosing schedule into dispensed quantities:
//!
//! ```text
//! FillItemInput ──► eligible? ──► times_per_day × days ──► join stock ──► FilledMedicine
//!                      │                                       │
//!                      └─ dropped                              └─ low-stock warning
//! ```
//!
//! Planning never writes. Stock levels in the plan are what the caller
//! should persist once the fill commits.

use std::collections::HashMap;

use thiserror::Error;

use crate::db::{Database, DbError, DbResult};
use crate::models::{FillItemInput, FilledMedicine, InventoryItem};

/// Calculator errors.
#[derive(Error, Debug)]
pub enum FillError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Unknown medicine: {0}")]
    UnknownMedicine(String),

    #[error("No eligible medicines to fill")]
    NothingToFill,
}

pub type FillResult<T> = Result<T, FillError>;

/// Source of current stock levels.
pub trait StockLookup {
    fn lookup(&self, medicine_id: &str) -> DbResult<Option<InventoryItem>>;
}

impl StockLookup for Database {
    fn lookup(&self, medicine_id: &str) -> DbResult<Option<InventoryItem>> {
        self.get_inventory_item(medicine_id)
    }
}

impl StockLookup for HashMap<String, InventoryItem> {
    fn lookup(&self, medicine_id: &str) -> DbResult<Option<InventoryItem>> {
        Ok(self.get(medicine_id).cloned())
    }
}

/// Computed fill, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct FillPlan {
    /// Dispensed lines in input order
    pub lines: Vec<FilledMedicine>,
    /// Names of medicines whose need exceeded stock
    pub low_stock_alerts: Vec<String>,
}

impl FillPlan {
    /// Longest supply in the plan.
    pub fn max_days(&self) -> u32 {
        self.lines.iter().map(|l| l.days).max().unwrap_or(0)
    }

    /// Final stock level per medicine after the fill.
    pub fn stock_updates(&self) -> Vec<(&str, i64)> {
        let mut updates: Vec<(&str, i64)> = Vec::new();
        for line in &self.lines {
            match updates.iter_mut().find(|(id, _)| *id == line.medicine_id) {
                Some(existing) => existing.1 = line.stock_after,
                None => updates.push((&line.medicine_id, line.stock_after)),
            }
        }
        updates
    }
}

/// Units needed for one item, or `None` if the item is not dispensed.
pub fn total_needed(item: &FillItemInput) -> Option<u32> {
    if !item.is_eligible() {
        return None;
    }
    let days = u32::try_from(item.days).ok()?;
    Some(item.times_per_day().saturating_mul(days))
}

/// Plan a fill against current stock.
///
/// Ineligible items are dropped. A medicine listed more than once draws
/// down the same stock, so later lines see what earlier lines left.
pub fn plan_fill<S: StockLookup + ?Sized>(stock: &S, items: &[FillItemInput]) -> FillResult<FillPlan> {
    let mut remaining: HashMap<String, InventoryItem> = HashMap::new();
    let mut lines = Vec::new();
    let mut low_stock_alerts = Vec::new();

    for item in items {
        let Some(needed) = total_needed(item) else {
            continue;
        };

        if !remaining.contains_key(&item.medicine_id) {
            let found = stock
                .lookup(&item.medicine_id)?
                .ok_or_else(|| FillError::UnknownMedicine(item.medicine_id.clone()))?;
            remaining.insert(item.medicine_id.clone(), found);
        }
        let Some(inventory) = remaining.get_mut(&item.medicine_id) else {
            continue;
        };

        let stock_before = inventory.stock_quantity;
        let low_stock = !inventory.can_supply(needed);
        let stock_after = (stock_before - i64::from(needed)).max(0);
        inventory.stock_quantity = stock_after;

        if low_stock {
            low_stock_alerts.push(inventory.name.clone());
        }

        lines.push(FilledMedicine {
            medicine_id: item.medicine_id.clone(),
            medicine_name: inventory.name.clone(),
            times_per_day: item.times_per_day(),
            days: u32::try_from(item.days).unwrap_or_default(),
            total_needed: needed,
            low_stock,
            stock_before,
            stock_after,
        });
    }

    if lines.is_empty() {
        return Err(FillError::NothingToFill);
    }

    Ok(FillPlan {
        lines,
        low_stock_alerts,
    })
}
