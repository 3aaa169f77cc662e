//! Inventory database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::InventoryItem;

impl Database {
    /// Insert or update an inventory item.
    pub fn upsert_inventory_item(&self, item: &InventoryItem) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO inventory (
                medicine_id, name, stock_quantity, low_stock_threshold, updated_at
            ) VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(medicine_id) DO UPDATE SET
                name = excluded.name,
                stock_quantity = excluded.stock_quantity,
                low_stock_threshold = excluded.low_stock_threshold,
                updated_at = datetime('now')
            "#,
            params![
                item.medicine_id,
                item.name,
                item.stock_quantity,
                item.low_stock_threshold,
            ],
        )?;
        Ok(())
    }

    /// Get an inventory item by medicine ID.
    pub fn get_inventory_item(&self, medicine_id: &str) -> DbResult<Option<InventoryItem>> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT medicine_id, name, stock_quantity, low_stock_threshold
                FROM inventory
                WHERE medicine_id = ?
                "#,
                [medicine_id],
                map_inventory_row,
            )
            .optional()?)
    }

    /// List all inventory items by name.
    pub fn list_inventory(&self) -> DbResult<Vec<InventoryItem>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT medicine_id, name, stock_quantity, low_stock_threshold
            FROM inventory
            ORDER BY name
            "#,
        )?;
        let rows = stmt.query_map([], map_inventory_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Overwrite the stock level for a medicine.
    pub fn set_stock_quantity(&self, medicine_id: &str, quantity: i64) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE inventory SET stock_quantity = ?2, updated_at = datetime('now') WHERE medicine_id = ?1",
            params![medicine_id, quantity],
        )?;
        Ok(rows_affected > 0)
    }
}

fn map_inventory_row(row: &Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        medicine_id: row.get(0)?,
        name: row.get(1)?,
        stock_quantity: row.get(2)?,
        low_stock_threshold: row.get(3)?,
    })
}
