use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{
    CreateNamedRequest, CreateRecipeRequest, NamedItem, Pagination, RecipeDetailsResponse,
    RecipeListItem,
};
use super::images::{self, ImageUpload};
use super::model::RecipeDetails;
use super::repo;
use crate::{auth::jwt::AuthUser, state::AppState};

const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
const MAX_PAGE: i64 = 100;

pub fn tag_routes() -> Router<AppState> {
    Router::new()
        .route("/tags", get(list_tags).post(create_tag))
        .route("/tags/:id", delete(delete_tag))
}

pub fn ingredient_routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients).post(create_ingredient))
        .route("/ingredients/:id", delete(delete_ingredient))
}

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/:id", get(get_recipe))
        .route(
            "/recipes/:id/image",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn required_name(raw: &str) -> Result<String, (StatusCode, String)> {
    let name = raw.trim();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "name is required".into()));
    }
    Ok(name.to_string())
}

// --- tags ---

#[instrument(skip(state))]
pub async fn list_tags(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<NamedItem>>, (StatusCode, String)> {
    let tags = repo::list_tags(&state.db, user_id).await.map_err(internal)?;
    Ok(Json(tags.into_iter().map(NamedItem::from).collect()))
}

#[instrument(skip(state, body))]
pub async fn create_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateNamedRequest>,
) -> Result<(StatusCode, Json<NamedItem>), (StatusCode, String)> {
    let name = required_name(&body.name)?;
    let tag = repo::create_tag(&state.db, user_id, &name)
        .await
        .map_err(internal)?;
    info!(tag_id = %tag.id, %user_id, "tag created");
    Ok((StatusCode::CREATED, Json(tag.into())))
}

#[instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if repo::delete_tag(&state.db, user_id, id)
        .await
        .map_err(internal)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Tag not found".into()))
    }
}

// --- ingredients ---

#[instrument(skip(state))]
pub async fn list_ingredients(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<NamedItem>>, (StatusCode, String)> {
    let rows = repo::list_ingredients(&state.db, user_id)
        .await
        .map_err(internal)?;
    Ok(Json(rows.into_iter().map(NamedItem::from).collect()))
}

#[instrument(skip(state, body))]
pub async fn create_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateNamedRequest>,
) -> Result<(StatusCode, Json<NamedItem>), (StatusCode, String)> {
    let name = required_name(&body.name)?;
    let ingredient = repo::create_ingredient(&state.db, user_id, &name)
        .await
        .map_err(internal)?;
    info!(ingredient_id = %ingredient.id, %user_id, "ingredient created");
    Ok((StatusCode::CREATED, Json(ingredient.into())))
}

#[instrument(skip(state))]
pub async fn delete_ingredient(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if repo::delete_ingredient(&state.db, user_id, id)
        .await
        .map_err(internal)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, "Ingredient not found".into()))
    }
}

// --- recipes ---

async fn details_response(
    state: &AppState,
    details: RecipeDetails,
) -> Result<RecipeDetailsResponse, (StatusCode, String)> {
    let image_url = match details.recipe.image.as_deref() {
        Some(key) => Some(images::presign_image(state, key).await.map_err(internal)?),
        None => None,
    };
    Ok(RecipeDetailsResponse {
        recipe: details.recipe.into(),
        tags: details.tags.into_iter().map(NamedItem::from).collect(),
        ingredients: details.ingredients.into_iter().map(NamedItem::from).collect(),
        image_url,
    })
}

#[instrument(skip(state))]
pub async fn list_recipes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(p): Query<Pagination>,
) -> Result<Json<Vec<RecipeListItem>>, (StatusCode, String)> {
    let limit = p.limit.clamp(1, MAX_PAGE);
    let offset = p.offset.max(0);
    let recipes = repo::list_recipes(&state.db, user_id, limit, offset)
        .await
        .map_err(internal)?;
    Ok(Json(recipes.into_iter().map(RecipeListItem::from).collect()))
}

#[instrument(skip(state, body))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeDetailsResponse>), (StatusCode, String)> {
    let new = body.into_new_recipe().map_err(|msg| {
        warn!(%msg, "invalid recipe");
        (StatusCode::BAD_REQUEST, msg)
    })?;
    let details = repo::create_recipe(&state.db, user_id, &new)
        .await
        .map_err(internal)?;
    info!(recipe_id = %details.recipe.id, %user_id, recipe = %details.recipe, "recipe created");
    let resp = details_response(&state, details).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[instrument(skip(state))]
pub async fn get_recipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RecipeDetailsResponse>, (StatusCode, String)> {
    let details = repo::get_recipe_details(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Recipe not found".to_string()))?;
    Ok(Json(details_response(&state, details).await?))
}

/// POST /recipes/:id/image, multipart field `image`.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    mut mp: Multipart,
) -> Result<Json<RecipeDetailsResponse>, (StatusCode, String)> {
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        upload = Some(ImageUpload {
            filename,
            body,
            content_type,
        });
        break;
    }
    let upload = upload.ok_or((StatusCode::BAD_REQUEST, "image is required".to_string()))?;
    if upload.body.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "image is empty".into()));
    }

    images::upload_recipe_image(&state, user_id, id, upload)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Recipe not found".to_string()))?;

    let details = repo::get_recipe_details(&state.db, user_id, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Recipe not found".to_string()))?;
    Ok(Json(details_response(&state, details).await?))
}
