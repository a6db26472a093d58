/// Tenant customers (CRM contacts)
///
/// Email addresses are unique per tenant (`uq_customers_tenant_email`);
/// several customers may omit an email.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgConnection;
use uuid::Uuid;

/// Customer row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub customer_data: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

/// Input for creating a customer
#[derive(Debug, Clone)]
pub struct CreateCustomer {
    pub tenant_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub customer_data: Option<JsonValue>,
    pub created_by: Uuid,
}

/// Input for updating a customer
#[derive(Debug, Clone, Default)]
pub struct UpdateCustomer {
    pub name: Option<String>,
    pub email: Option<String>,
    pub customer_data: Option<JsonValue>,
}

impl Customer {
    /// Creates a customer
    ///
    /// # Errors
    ///
    /// Returns a database error when the email is already used in the tenant.
    pub async fn create(conn: &mut PgConnection, data: CreateCustomer) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"
            INSERT INTO customers (tenant_id, name, email, customer_data, created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(data.tenant_id)
        .bind(data.name)
        .bind(data.email)
        .bind(data.customer_data)
        .bind(data.created_by)
        .fetch_one(conn)
        .await
    }

    /// Finds a customer by ID
    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>("SELECT * FROM customers WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Lists customers visible to the session, newest first
    pub async fn list(conn: &mut PgConnection, skip: i64, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers ORDER BY created_at DESC OFFSET $1 LIMIT $2",
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(conn)
        .await
    }

    /// Updates the provided fields
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateCustomer,
        updated_by: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Customer>(
            r#"
            UPDATE customers
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                customer_data = COALESCE($4, customer_data),
                updated_by = $5,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.email)
        .bind(data.customer_data)
        .bind(updated_by)
        .fetch_optional(conn)
        .await
    }

    /// Deletes a customer
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
