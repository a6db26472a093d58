/// Inventory items, the sample tenant-owned resource

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;

/// Item row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: Uuid,
    pub name: String,

    /// Unit price, strictly positive
    pub price: f64,

    /// Stock on hand, never negative
    pub quantity: i32,

    pub image_path: Option<String>,
    pub tenant_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

/// Input for creating an item
#[derive(Debug, Clone)]
pub struct CreateItem {
    pub name: String,
    pub price: f64,
    pub quantity: i32,
    pub image_path: Option<String>,
    pub tenant_id: Uuid,
    pub created_by: Uuid,
}

/// Input for updating an item
#[derive(Debug, Clone, Default)]
pub struct UpdateItem {
    pub name: Option<String>,
    pub price: Option<f64>,
    pub quantity: Option<i32>,
    pub image_path: Option<String>,
}

impl Item {
    /// Creates an item
    pub async fn create(conn: &mut PgConnection, data: CreateItem) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (name, price, quantity, image_path, tenant_id, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *
            "#,
        )
        .bind(data.name)
        .bind(data.price)
        .bind(data.quantity)
        .bind(data.image_path)
        .bind(data.tenant_id)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
    }

    /// Finds an item by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lists items visible to the session, newest first
    pub async fn list(conn: &mut PgConnection, skip: i64, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Item>("SELECT * FROM items ORDER BY created_at DESC OFFSET $1 LIMIT $2")
            .bind(skip)
            .bind(limit)
            .fetch_all(conn)
            .await
    }

    /// Updates the provided fields
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateItem,
        updated_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Item>(
            r#"
            UPDATE items
            SET name = COALESCE($2, name),
                price = COALESCE($3, price),
                quantity = COALESCE($4, quantity),
                image_path = COALESCE($5, image_path),
                updated_by = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.price)
        .bind(data.quantity)
        .bind(data.image_path)
        .bind(updated_by)
        .fetch_optional(conn)
        .await
    }

    /// Deletes an item
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM items WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
