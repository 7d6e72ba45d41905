//! Item storage.
//!
//! Every mutation here also fires the `items` notify trigger installed by the
//! migrations, which is what feeds the change relay. The repository itself
//! has no knowledge of the relay.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, instrument};

/// A stored item row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: i32,
    pub name: String,
    pub value: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Request body for creating or replacing an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    pub value: i32,
}

/// Repository for item database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: PgPool,
}

impl ItemRepository {
    /// Create a new item repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List all items, newest first.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, value, created_at, updated_at
            FROM items
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("listing items")?;

        Ok(items)
    }

    /// Get an item by id.
    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            r#"
            SELECT id, name, value, created_at, updated_at
            FROM items
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("fetching item")?;

        Ok(item)
    }

    /// Create a new item.
    #[instrument(skip(self, item))]
    pub async fn create(&self, item: &NewItem) -> Result<Item> {
        debug!("Creating item: {}", item.name);

        let created = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (name, value)
            VALUES ($1, $2)
            RETURNING id, name, value, created_at, updated_at
            "#,
        )
        .bind(&item.name)
        .bind(item.value)
        .fetch_one(&self.pool)
        .await
        .context("inserting item")?;

        Ok(created)
    }

    /// Replace an existing item. Returns `None` when the id does not exist.
    #[instrument(skip(self, item))]
    pub async fn update(&self, id: i32, item: &NewItem) -> Result<Option<Item>> {
        let updated = sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET name = $1, value = $2
            WHERE id = $3
            RETURNING id, name, value, created_at, updated_at
            "#,
        )
        .bind(&item.name)
        .bind(item.value)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("updating item")?;

        Ok(updated)
    }

    /// Delete an item. Returns whether a row was actually removed.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("deleting item")?;

        Ok(result.rows_affected() > 0)
    }
}
