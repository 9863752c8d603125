use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest},
        jwt::{AuthUser, JwtKeys, StaffUser},
    },
    error::ModelError,
    state::AppState,
    users::{ExtraFields, User, UserManager},
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/users/:id", get(get_user_as_staff))
}

fn issue_tokens(state: &AppState, user: User) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(state);
    let access_token = keys.sign_access(&user).map_err(|e| {
        error!(error = %e, "jwt sign access failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let refresh_token = keys.sign_refresh(user.id).map_err(|e| {
        error!(error = %e, "jwt sign refresh failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: user.into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let email = UserManager::normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err((StatusCode::BAD_REQUEST, "Password too short".into()));
    }

    let extra = ExtraFields {
        name: payload.name.trim().to_string(),
        ..ExtraFields::default()
    };
    let user = state
        .users
        .create_user(Some(&email), Some(&payload.password), extra)
        .await
        .map_err(|e| {
            match &e {
                ModelError::EmailTaken => warn!(email = %email, "email already registered"),
                _ => error!(error = %e, "create user failed"),
            }
            <(StatusCode, String)>::from(e)
        })?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    issue_tokens(&state, user)
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let email = UserManager::normalize_email(&payload.email);

    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err((StatusCode::BAD_REQUEST, "Invalid email".into()));
    }

    let user = match state.users.authenticate(&email, &payload.password).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %email, "login rejected");
            return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".into()));
        }
        Err(e) => {
            error!(error = %e, "authenticate failed");
            return Err(e.into());
        }
    };

    info!(user_id = %user.id, "user logged in");
    issue_tokens(&state, user)
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, (StatusCode, String)> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| (StatusCode::UNAUTHORIZED, e.to_string()))?;

    let user = state
        .users
        .get(claims.sub)
        .await
        .map_err(<(StatusCode, String)>::from)?
        .filter(|u| u.is_active)
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".to_string()))?;

    issue_tokens(&state, user)
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state
        .users
        .get(user_id)
        .await
        .map_err(<(StatusCode, String)>::from)?
        .ok_or_else(|| {
            error!(user_id = %user_id, "user not found");
            (StatusCode::UNAUTHORIZED, "User not found".to_string())
        })?;

    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn get_user_as_staff(
    State(state): State<AppState>,
    StaffUser(staff_id): StaffUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<PublicUser>, (StatusCode, String)> {
    let user = state
        .users
        .get(user_id)
        .await
        .map_err(<(StatusCode, String)>::from)?
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))?;

    info!(%staff_id, %user_id, "staff looked up user");
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_body(email: &str, password: &str) -> Json<RegisterRequest> {
        Json(RegisterRequest {
            email: email.into(),
            password: password.into(),
            name: " Chef ".into(),
        })
    }

    #[test]
    fn email_format_check() {
        assert!(is_valid_email("test@mwibutsa.com"));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("two words@host.com"));
        assert!(!is_valid_email("user@localhost"));
    }

    #[tokio::test]
    async fn register_normalizes_email_and_returns_tokens() {
        let state = AppState::fake();
        let Json(resp) = register(
            State(state.clone()),
            register_body("Chef@KITCHEN.io", "long-enough"),
        )
        .await
        .expect("register ok");

        assert_eq!(resp.user.email, "Chef@kitchen.io");
        assert_eq!(resp.user.name, "Chef");
        assert!(!resp.user.is_staff);

        let keys = JwtKeys::from_ref(&state);
        assert_eq!(keys.verify(&resp.access_token).unwrap().sub, resp.user.id);
        assert!(keys.verify_refresh(&resp.refresh_token).is_ok());
    }

    #[tokio::test]
    async fn register_rejects_bad_input_and_duplicates() {
        let state = AppState::fake();

        let (status, _) = register(State(state.clone()), register_body("nope", "long-enough"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = register(State(state.clone()), register_body("a@b.io", "short"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // 8 bytes but only 4 characters.
        let (status, _) = register(State(state.clone()), register_body("a@b.io", "ééää"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        register(State(state.clone()), register_body("u@b.io", "ééääééää"))
            .await
            .expect("eight characters are enough");

        register(State(state.clone()), register_body("a@b.io", "long-enough"))
            .await
            .unwrap();
        let (status, _) = register(State(state.clone()), register_body("a@B.IO", "long-enough"))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn login_and_refresh_flow() {
        let state = AppState::fake();
        register(State(state.clone()), register_body("cook@host.com", "long-enough"))
            .await
            .unwrap();

        let (status, _) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "cook@host.com".into(),
                password: "wrong-password".into(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let Json(session) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "cook@HOST.com".into(),
                password: "long-enough".into(),
            }),
        )
        .await
        .expect("login ok");

        let Json(renewed) = refresh(
            State(state.clone()),
            Json(RefreshRequest {
                refresh_token: session.refresh_token.clone(),
            }),
        )
        .await
        .expect("refresh ok");
        assert_eq!(renewed.user.id, session.user.id);

        let (status, _) = refresh(
            State(state.clone()),
            Json(RefreshRequest {
                refresh_token: session.access_token,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_returns_public_user() {
        let state = AppState::fake();
        let Json(resp) = register(State(state.clone()), register_body("me@host.com", "long-enough"))
            .await
            .unwrap();

        let Json(me) = get_me(State(state.clone()), AuthUser(resp.user.id))
            .await
            .unwrap();
        assert_eq!(me.email, "me@host.com");

        let json = serde_json::to_string(&me).unwrap();
        assert!(json.contains("me@host.com"));
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn staff_can_look_up_any_user() {
        let state = AppState::fake();
        let Json(cook) = register(State(state.clone()), register_body("cook@host.com", "long-enough"))
            .await
            .unwrap();
        let admin = state
            .users
            .create_superuser(Some("admin@host.com"), Some("long-enough"))
            .await
            .unwrap();

        let Json(found) = get_user_as_staff(
            State(state.clone()),
            StaffUser(admin.id),
            Path(cook.user.id),
        )
        .await
        .expect("staff lookup");
        assert_eq!(found.email, "cook@host.com");

        let (status, _) = get_user_as_staff(State(state), StaffUser(admin.id), Path(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn superuser_login_issues_staff_token() {
        let state = AppState::fake();
        state
            .users
            .create_superuser(Some("admin@host.com"), Some("long-enough"))
            .await
            .unwrap();

        let Json(session) = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "admin@host.com".into(),
                password: "long-enough".into(),
            }),
        )
        .await
        .expect("login ok");

        let keys = JwtKeys::from_ref(&state);
        assert!(keys.verify(&session.access_token).unwrap().staff);
        assert!(session.user.is_staff);
    }
}
