use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::{NewUser, User};
use super::repo::UserRepository;
use crate::error::ModelError;

/// Map-backed repository with the same email uniqueness as the `users` table.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, new: NewUser) -> Result<User, ModelError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(ModelError::EmailTaken);
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            password_hash: new.password_hash,
            is_active: new.is_active,
            is_staff: new.is_staff,
            is_superuser: new.is_superuser,
            last_login: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<User, ModelError> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(ModelError::EmailTaken);
        }
        let slot = users.get_mut(&user.id).ok_or(sqlx::Error::RowNotFound)?;
        *slot = user.clone();
        Ok(slot.clone())
    }

    async fn touch_last_login(&self, id: Uuid, at: OffsetDateTime) -> Result<User, ModelError> {
        let mut users = self.users.write().await;
        let slot = users.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
        slot.last_login = Some(at);
        Ok(slot.clone())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ModelError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, ModelError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}
