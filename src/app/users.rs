use anyhow::{anyhow, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use time::OffsetDateTime;

use crate::app::auth::hash_password;
use crate::domain::new_id;
use crate::domain::user::{Role, User};
use crate::infra::db::{from_millis, to_millis, Db};

#[derive(Clone)]
pub struct UserService {
    db: Db,
}

impl UserService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_user(
        &self,
        email: &str,
        full_name: &str,
        role: Role,
        password: &str,
    ) -> Result<User> {
        let user = User {
            id: new_id("usr"),
            email: email.trim().to_lowercase(),
            full_name: full_name.trim().to_string(),
            role,
            created_at: OffsetDateTime::now_utc(),
        };
        let password_hash = hash_password(password)?;

        sqlx::query(
            "INSERT INTO users (id, email, full_name, role, password_hash, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(user.role.as_str())
        .bind(password_hash)
        .bind(to_millis(user.created_at))
        .execute(self.db.pool())
        .await?;

        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, full_name, role, created_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    /// Looks a user up and only returns it when it holds `role`.
    pub async fn find_with_role(&self, user_id: &str, role: Role) -> Result<Option<User>> {
        Ok(self
            .get_user(user_id)
            .await?
            .filter(|user| user.role == role))
    }

    pub async fn list_by_role(&self, role: Role, limit: i64, offset: i64) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, email, full_name, role, created_at \
             FROM users WHERE role = ? \
             ORDER BY full_name, id \
             LIMIT ? OFFSET ?",
        )
        .bind(role.as_str())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(user_from_row).collect()
    }
}

pub(crate) fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        role: role.parse().map_err(|err: String| anyhow!(err))?,
        created_at: from_millis(row.get("created_at"))?,
    })
}
