use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{NewUser, User};
use crate::error::ModelError;

const USER_COLUMNS: &str =
    "id, email, name, password_hash, is_active, is_staff, is_superuser, last_login, created_at";

/// Persistence seam for user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn insert(&self, new: NewUser) -> Result<User, ModelError>;

    /// Writes every mutable column of `user` back to storage.
    async fn save(&self, user: &User) -> Result<User, ModelError>;

    /// Stamps `last_login` without touching any other column.
    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> Result<User, ModelError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ModelError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ModelError>;
}

pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_write_error(e: sqlx::Error) -> ModelError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return ModelError::EmailTaken;
        }
    }
    ModelError::Database(e)
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn insert(&self, new: NewUser) -> Result<User, ModelError> {
        let sql = format!(
            r#"
            INSERT INTO users (email, name, password_hash, is_active, is_staff, is_superuser)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&new.email)
            .bind(&new.name)
            .bind(&new.password_hash)
            .bind(new.is_active)
            .bind(new.is_staff)
            .bind(new.is_superuser)
            .fetch_one(&self.db)
            .await
            .map_err(map_write_error)
    }

    async fn save(&self, user: &User) -> Result<User, ModelError> {
        let sql = format!(
            r#"
            UPDATE users
               SET email = $2, name = $3, password_hash = $4, is_active = $5,
                   is_staff = $6, is_superuser = $7, last_login = $8
             WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.name)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(user.is_staff)
            .bind(user.is_superuser)
            .bind(user.last_login)
            .fetch_one(&self.db)
            .await
            .map_err(map_write_error)
    }

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> Result<User, ModelError> {
        let sql = format!("UPDATE users SET last_login = $2 WHERE id = $1 RETURNING {USER_COLUMNS}");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(at)
            .fetch_one(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ModelError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ModelError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }
}
