use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row};
use tracing::instrument;
use uuid::Uuid;

use tribal_auth::{Role, User};
use tribal_core::{Address, Page, PageRequest, UserId};

use super::{conflict_on_unique, parse_column, to_u64, PostgresStore};
use crate::repository::{Mutation, UserRepository};
use crate::{RepoResult, RepositoryError};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, role, phone, address, is_active, created_at, updated_at";

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: String,
    role: String,
    phone: Option<String>,
    address: Option<Json<Address>>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for UserRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            role: row.try_get("role")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            is_active: row.try_get("is_active")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            role: parse_column::<Role>(&row.role, "role")?,
            phone: row.phone,
            address: row.address.map(|Json(a)| a),
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode(row: &PgRow) -> RepoResult<User> {
    UserRow::from_row(row)?.try_into()
}

#[async_trait]
impl UserRepository for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, phone, address, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(user.address.as_ref().map(Json))
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "email is already registered"))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self, email), err)]
    async fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode).transpose()
    }

    #[instrument(skip(self, change), err)]
    async fn modify_user(&self, id: UserId, change: Mutation<'_, User>) -> RepoResult<User> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let mut user = row.as_ref().map(decode).transpose()?.ok_or(RepositoryError::NotFound("user"))?;
        change(&mut user)?;

        sqlx::query(
            r#"
            UPDATE users
            SET name = $2, email = $3, password_hash = $4, role = $5, phone = $6,
                address = $7, is_active = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.phone)
        .bind(user.address.as_ref().map(Json))
        .bind(user.is_active)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "email is already registered"))?;

        tx.commit().await?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn list_users(&self, role: Option<Role>, page: PageRequest) -> RepoResult<Page<User>> {
        let role = role.map(|r| r.as_str());
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE $1::TEXT IS NULL OR role = $1")
            .bind(role)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE $1::TEXT IS NULL OR role = $1 \
             ORDER BY created_at ASC, id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(role)
        .bind(i64::from(page.limit()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(decode).collect::<RepoResult<Vec<_>>>()?;
        Ok(Page {
            items,
            total: to_u64(total, "user count")?,
            page: page.page(),
            limit: page.limit(),
        })
    }

    #[instrument(skip(self), err)]
    async fn all_users(&self) -> RepoResult<Vec<User>> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(decode).collect()
    }
}
