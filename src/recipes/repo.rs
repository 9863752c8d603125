use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::model::{Ingredient, NewRecipe, Recipe, RecipeDetails, Tag};
use crate::error::ModelError;

const RECIPE_COLUMNS: &str = "id, user_id, title, time_minutes, price, link, image, created_at";

// ---- Tags ----

pub async fn create_tag(db: &PgPool, user_id: Uuid, name: &str) -> Result<Tag, ModelError> {
    let tag = sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (user_id, name)
        VALUES ($1, $2)
        RETURNING id, user_id, name
        "#,
    )
    .bind(user_id)
    .bind(name)
    .fetch_one(db)
    .await?;
    Ok(tag)
}

pub async fn list_tags(db: &PgPool, user_id: Uuid) -> Result<Vec<Tag>, ModelError> {
    let rows = sqlx::query_as::<_, Tag>(
        r#"
        SELECT id, user_id, name
          FROM tags
         WHERE user_id = $1
         ORDER BY name DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Returns false when the tag does not exist or belongs to someone else.
pub async fn delete_tag(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, ModelError> {
    let res = sqlx::query("DELETE FROM tags WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

// ---- Ingredients ----

pub async fn create_ingredient(
    db: &PgPool,
    user_id: Uuid,
    name: &str,
) -> Result<Ingredient, ModelError> {
    let ingredient = sqlx::query_as::<_, Ingredient>(
        r#"
        INSERT INTO ingredients (user_id, name)
        VALUES ($1, $2)
        RETURNING id, user_id, name
        "#,
    )
    .bind(user_id)
    .bind(name)
    .fetch_one(db)
    .await?;
    Ok(ingredient)
}

pub async fn list_ingredients(db: &PgPool, user_id: Uuid) -> Result<Vec<Ingredient>, ModelError> {
    let rows = sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT id, user_id, name
          FROM ingredients
         WHERE user_id = $1
         ORDER BY name DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn delete_ingredient(db: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool, ModelError> {
    let res = sqlx::query("DELETE FROM ingredients WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

// ---- Recipes ----

/// Inserts the recipe and links the listed tags and ingredients in one transaction.
/// Ids that are unknown or owned by another user are skipped.
pub async fn create_recipe(
    db: &PgPool,
    user_id: Uuid,
    new: &NewRecipe,
) -> Result<RecipeDetails, ModelError> {
    let mut tx = db.begin().await?;

    let sql = format!(
        r#"
        INSERT INTO recipes (user_id, title, time_minutes, price, link)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {RECIPE_COLUMNS}
        "#
    );
    let recipe = sqlx::query_as::<_, Recipe>(&sql)
        .bind(user_id)
        .bind(&new.title)
        .bind(new.time_minutes)
        .bind(new.price)
        .bind(&new.link)
        .fetch_one(&mut *tx)
        .await?;

    if !new.tag_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO recipe_tags (recipe_id, tag_id)
            SELECT $1, t.id FROM tags t
             WHERE t.id = ANY($2) AND t.user_id = $3
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(recipe.id)
        .bind(&new.tag_ids[..])
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    if !new.ingredient_ids.is_empty() {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id)
            SELECT $1, i.id FROM ingredients i
             WHERE i.id = ANY($2) AND i.user_id = $3
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(recipe.id)
        .bind(&new.ingredient_ids[..])
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    }

    let tags = tags_for_recipe(&mut tx, recipe.id).await?;
    let ingredients = ingredients_for_recipe(&mut tx, recipe.id).await?;
    tx.commit().await?;

    Ok(RecipeDetails {
        recipe,
        tags,
        ingredients,
    })
}

pub async fn list_recipes(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<Recipe>, ModelError> {
    let sql = format!(
        r#"
        SELECT {RECIPE_COLUMNS}
          FROM recipes
         WHERE user_id = $1
         ORDER BY created_at DESC
         LIMIT $2 OFFSET $3
        "#
    );
    let rows = sqlx::query_as::<_, Recipe>(&sql)
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn get_recipe(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<Recipe>, ModelError> {
    let sql = format!("SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND user_id = $2");
    let recipe = sqlx::query_as::<_, Recipe>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(recipe)
}

pub async fn get_recipe_details(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<RecipeDetails>, ModelError> {
    let Some(recipe) = get_recipe(db, user_id, id).await? else {
        return Ok(None);
    };
    let mut conn = db.acquire().await?;
    let tags = tags_for_recipe(&mut conn, recipe.id).await?;
    let ingredients = ingredients_for_recipe(&mut conn, recipe.id).await?;
    Ok(Some(RecipeDetails {
        recipe,
        tags,
        ingredients,
    }))
}

pub async fn set_recipe_image(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    image: &str,
) -> Result<Option<Recipe>, ModelError> {
    let sql = format!(
        r#"
        UPDATE recipes SET image = $3
         WHERE id = $1 AND user_id = $2
        RETURNING {RECIPE_COLUMNS}
        "#
    );
    let recipe = sqlx::query_as::<_, Recipe>(&sql)
        .bind(id)
        .bind(user_id)
        .bind(image)
        .fetch_optional(db)
        .await?;
    Ok(recipe)
}

async fn tags_for_recipe(conn: &mut PgConnection, recipe_id: Uuid) -> Result<Vec<Tag>, ModelError> {
    let rows = sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.id, t.user_id, t.name
          FROM tags t
          JOIN recipe_tags rt ON rt.tag_id = t.id
         WHERE rt.recipe_id = $1
         ORDER BY t.name
        "#,
    )
    .bind(recipe_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

async fn ingredients_for_recipe(
    conn: &mut PgConnection,
    recipe_id: Uuid,
) -> Result<Vec<Ingredient>, ModelError> {
    let rows = sqlx::query_as::<_, Ingredient>(
        r#"
        SELECT i.id, i.user_id, i.name
          FROM ingredients i
          JOIN recipe_ingredients ri ON ri.ingredient_id = i.id
         WHERE ri.recipe_id = $1
         ORDER BY i.name
        "#,
    )
    .bind(recipe_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}
