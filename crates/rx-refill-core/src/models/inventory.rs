//! Medicine inventory models.

use serde::{Deserialize, Serialize};

use super::FieldError;

/// Stock level for one medicine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Catalog medicine ID
    pub medicine_id: String,
    /// Display name
    pub name: String,
    /// Units currently on hand
    pub stock_quantity: i64,
    /// Level at or below which the item is reported as running low
    pub low_stock_threshold: i64,
}

impl InventoryItem {
    /// Create an item with a default threshold of 10 units.
    pub fn new(medicine_id: String, name: String, stock_quantity: i64) -> Self {
        Self {
            medicine_id,
            name,
            stock_quantity,
            low_stock_threshold: 10,
        }
    }

    /// Check every field, reporting all failures at once.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.medicine_id.trim().is_empty() {
            errors.push(FieldError::new("medicineId", "Medicine ID is required"));
        }
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }
        if self.stock_quantity < 0 {
            errors.push(FieldError::new("stockQuantity", "Stock cannot be negative"));
        }
        if self.low_stock_threshold < 0 {
            errors.push(FieldError::new("lowStockThreshold", "Threshold cannot be negative"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn is_below_threshold(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }

    /// Whether `quantity` units can be dispensed without running out.
    pub fn can_supply(&self, quantity: u32) -> bool {
        i64::from(quantity) <= self.stock_quantity
    }
}
