use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{ExtraFields, NewUser, User};
use super::repo::UserRepository;
use crate::auth::password::{hash_password, make_unusable_password};
use crate::error::ModelError;

/// Factory and lookup helpers for [`User`] accounts.
#[derive(Clone)]
pub struct UserManager {
    repo: Arc<dyn UserRepository>,
}

impl UserManager {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    /// Trims the address and lowercases the part after the last `@`.
    /// The local part keeps its case.
    pub fn normalize_email(email: &str) -> String {
        let email = email.trim();
        match email.rsplit_once('@') {
            Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
            None => email.to_string(),
        }
    }

    /// Creates and saves a new user. Without a password the account gets an
    /// unusable one and cannot log in until `set_password` is called.
    pub async fn create_user(
        &self,
        email: Option<&str>,
        password: Option<&str>,
        extra: ExtraFields,
    ) -> Result<User, ModelError> {
        let email = match email.map(str::trim) {
            Some(e) if !e.is_empty() => Self::normalize_email(e),
            _ => return Err(ModelError::MissingEmail),
        };
        let password_hash = match password {
            Some(p) => hash_password(p)?,
            None => make_unusable_password(),
        };

        let user = self
            .repo
            .insert(NewUser {
                email,
                name: extra.name,
                password_hash,
                is_active: extra.is_active,
                is_staff: extra.is_staff,
                is_superuser: extra.is_superuser,
            })
            .await?;
        info!(user_id = %user.id, email = %user.email, "user created");
        Ok(user)
    }

    /// Creates and saves a new user with staff and superuser rights.
    pub async fn create_superuser(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, ModelError> {
        let mut user = self
            .create_user(email, password, ExtraFields::default())
            .await?;
        user.is_staff = true;
        user.is_superuser = true;
        let user = self.repo.save(&user).await?;
        info!(user_id = %user.id, "superuser promoted");
        Ok(user)
    }

    /// Returns the active user whose password matches, stamping `last_login`.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, ModelError> {
        let email = Self::normalize_email(email);
        let Some(user) = self.repo.find_by_email(&email).await? else {
            debug!(email = %email, "authenticate: unknown email");
            return Ok(None);
        };
        if !user.is_active {
            debug!(user_id = %user.id, "authenticate: inactive user");
            return Ok(None);
        }
        if !user.check_password(password) {
            debug!(user_id = %user.id, "authenticate: password mismatch");
            return Ok(None);
        }
        let user = self
            .repo
            .touch_last_login(user.id, OffsetDateTime::now_utc())
            .await?;
        Ok(Some(user))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<User>, ModelError> {
        self.repo.find_by_id(id).await
    }
}
