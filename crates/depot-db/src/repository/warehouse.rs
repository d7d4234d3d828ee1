//! # Warehouse Repository

use chrono::Utc;
use depot_core::validation::{validate_code, validate_name};
use depot_core::Warehouse;
use sqlx::SqlitePool;
use tracing::debug;

use super::new_id;
use crate::error::{DbError, DbResult};

/// Repository for warehouse database operations.
#[derive(Debug, Clone)]
pub struct WarehouseRepository {
    pool: SqlitePool,
}

impl WarehouseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WarehouseRepository { pool }
    }

    /// Creates a warehouse. Codes are stored upper-case.
    pub async fn create(&self, code: &str, name: &str) -> DbResult<Warehouse> {
        validate_code("code", code, 20)?;
        validate_name("name", name, 200)?;

        let warehouse = Warehouse {
            id: new_id(),
            code: code.trim().to_uppercase(),
            name: name.trim().to_string(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %warehouse.id, code = %warehouse.code, "Creating warehouse");

        sqlx::query(
            "INSERT INTO warehouses (id, code, name, is_active, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&warehouse.id)
        .bind(&warehouse.code)
        .bind(&warehouse.name)
        .bind(warehouse.is_active)
        .bind(warehouse.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &warehouse.code),
            other => other,
        })?;

        Ok(warehouse)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, code, name, is_active, created_at FROM warehouses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(warehouse)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Warehouse>> {
        let warehouse = sqlx::query_as::<_, Warehouse>(
            "SELECT id, code, name, is_active, created_at FROM warehouses WHERE code = ?1",
        )
        .bind(code.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(warehouse)
    }

    pub async fn list(&self) -> DbResult<Vec<Warehouse>> {
        let warehouses = sqlx::query_as::<_, Warehouse>(
            "SELECT id, code, name, is_active, created_at FROM warehouses ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(warehouses)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_create_and_find_by_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let created = db.warehouses().create("main", "Main warehouse").await.unwrap();
        assert_eq!(created.code, "MAIN");

        let found = db.warehouses().get_by_code("Main").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(db.warehouses().create("MAIN", "Again").await.is_err());
        assert_eq!(db.warehouses().list().await.unwrap().len(), 1);
    }
}
