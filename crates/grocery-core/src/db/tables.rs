//! Row mapping for the entity tables

use crate::models::{Category, GroceryItem, GroceryList, ListCategory, Record};
use rusqlite::{params, Connection, Row};

/// A record type stored in its own table, keyed by a text `id`
pub trait Table: Record + Sized {
    const TABLE: &'static str;

    /// Column list in `from_row` order
    const COLUMNS: &'static str;

    /// Parse a record from a row selected with [`Table::COLUMNS`]
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Insert, or fully replace the row with the same id
    ///
    /// Uses `ON CONFLICT DO UPDATE` so replacing a row never deletes it first.
    fn upsert(&self, conn: &Connection) -> rusqlite::Result<usize>;
}

impl Table for GroceryList {
    const TABLE: &'static str = "grocery_lists";
    const COLUMNS: &'static str = "id, name, user_id, category, created_at, updated_at, is_deleted";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: String = row.get(0)?;
        let category: String = row.get(3)?;
        Ok(Self {
            id: id.into(),
            name: row.get(1)?,
            user_id: row.get(2)?,
            category: ListCategory::from_tag(&category),
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
            is_deleted: row.get::<_, i32>(6)? != 0,
        })
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO grocery_lists (id, name, user_id, category, created_at, updated_at, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                user_id = excluded.user_id,
                category = excluded.category,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                is_deleted = excluded.is_deleted",
            params![
                self.id.as_str(),
                self.name,
                self.user_id,
                self.category.as_str(),
                self.created_at,
                self.updated_at,
                i32::from(self.is_deleted),
            ],
        )
    }
}

impl Table for GroceryItem {
    const TABLE: &'static str = "grocery_items";
    const COLUMNS: &'static str = "id, list_id, name, quantity, unit, notes, category, is_completed, \
         priority, created_at, updated_at, is_deleted, on_offer, price";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let id: String = row.get(0)?;
        let list_id: String = row.get(1)?;
        let category: String = row.get(6)?;
        Ok(Self {
            id: id.into(),
            list_id: list_id.into(),
            name: row.get(2)?,
            quantity: row.get(3)?,
            unit: row.get(4)?,
            notes: row.get(5)?,
            category: Category::from_tag(&category),
            is_completed: row.get::<_, i32>(7)? != 0,
            priority: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            is_deleted: row.get::<_, i32>(11)? != 0,
            on_offer: row.get::<_, i32>(12)? != 0,
            price: row.get(13)?,
        })
    }

    fn upsert(&self, conn: &Connection) -> rusqlite::Result<usize> {
        conn.execute(
            "INSERT INTO grocery_items (id, list_id, name, quantity, unit, notes, category,
                is_completed, priority, created_at, updated_at, is_deleted, on_offer, price)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(id) DO UPDATE SET
                list_id = excluded.list_id,
                name = excluded.name,
                quantity = excluded.quantity,
                unit = excluded.unit,
                notes = excluded.notes,
                category = excluded.category,
                is_completed = excluded.is_completed,
                priority = excluded.priority,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                is_deleted = excluded.is_deleted,
                on_offer = excluded.on_offer,
                price = excluded.price",
            params![
                self.id.as_str(),
                self.list_id.as_str(),
                self.name,
                self.quantity,
                self.unit,
                self.notes,
                self.category.as_str(),
                i32::from(self.is_completed),
                self.priority,
                self.created_at,
                self.updated_at,
                i32::from(self.is_deleted),
                i32::from(self.on_offer),
                self.price,
            ],
        )
    }
}
