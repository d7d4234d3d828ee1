//! # User Repository
//!
//! Users and their roles. Authentication is out of scope; users exist so
//! attendance, sales and stock documents can name who did what.

use chrono::Utc;
use depot_core::validation::{validate_email, validate_name};
use depot_core::{Role, User, ROLE_SUPER_ADMIN};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::new_id;
use crate::error::{DbError, DbResult};

const USER_COLUMNS: &str = "id, name, email, is_active, created_at, updated_at";

/// Result of a super-admin promotion.
#[derive(Debug, Clone, Serialize)]
pub struct Promotion {
    pub user: User,
    /// The user held the role before this call.
    pub already_super_admin: bool,
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    pub async fn create(&self, name: &str, email: &str) -> DbResult<User> {
        validate_name("name", name, 200)?;
        validate_email(email)?;

        let now = Utc::now();
        let user = User {
            id: new_id(),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %user.id, email = %user.email, "Creating user");

        sqlx::query(
            "INSERT INTO users (id, name, email, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &user.email),
            other => other,
        })?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Looks a user up by email, case-insensitively.
    pub async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn list(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Grants a role by name, creating the role if needed.
    ///
    /// Returns `false` when the user already held it.
    pub async fn assign_role(&self, user_id: &str, role_name: &str) -> DbResult<bool> {
        let mut tx = self.pool.begin().await?;
        let granted = grant_role(&mut tx, user_id, role_name).await?;
        tx.commit().await?;
        Ok(granted)
    }

    /// Role names of a user, sorted.
    pub async fn roles_of(&self, user_id: &str) -> DbResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT r.name FROM roles r \
             JOIN user_roles ur ON ur.role_id = r.id \
             WHERE ur.user_id = ?1 ORDER BY r.name",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(names)
    }

    pub async fn roles(&self) -> DbResult<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name, created_at FROM roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(roles)
    }

    /// Gives the user with `email` the super-admin role. Idempotent.
    pub async fn promote_super_admin(&self, email: &str) -> DbResult<Promotion> {
        let user = self
            .get_by_email(email)
            .await?
            .ok_or_else(|| DbError::not_found("User", email))?;

        let mut tx = self.pool.begin().await?;
        let granted = grant_role(&mut tx, &user.id, ROLE_SUPER_ADMIN).await?;
        tx.commit().await?;

        if granted {
            info!(user_id = %user.id, email = %user.email, "Promoted to super admin");
        } else {
            info!(user_id = %user.id, email = %user.email, "Already a super admin");
        }

        Ok(Promotion {
            user,
            already_super_admin: !granted,
        })
    }
}

async fn grant_role(conn: &mut SqliteConnection, user_id: &str, role_name: &str) -> DbResult<bool> {
    sqlx::query("INSERT INTO roles (id, name, created_at) VALUES (?1, ?2, ?3) ON CONFLICT(name) DO NOTHING")
        .bind(new_id())
        .bind(role_name)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

    let role_id: String = sqlx::query_scalar("SELECT id FROM roles WHERE name = ?1")
        .bind(role_name)
        .fetch_one(&mut *conn)
        .await?;

    let result = sqlx::query(
        "INSERT INTO user_roles (user_id, role_id) VALUES (?1, ?2) \
         ON CONFLICT(user_id, role_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(&role_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
