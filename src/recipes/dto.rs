use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Ingredient, NewRecipe, Recipe, Tag};

/// Largest price a `NUMERIC(5, 2)` column holds.
const MAX_PRICE_CENTS: i64 = 999_99;

#[derive(Debug, Deserialize)]
pub struct CreateNamedRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct NamedItem {
    pub id: Uuid,
    pub name: String,
}

impl From<Tag> for NamedItem {
    fn from(t: Tag) -> Self {
        Self {
            id: t.id,
            name: t.name,
        }
    }
}

impl From<Ingredient> for NamedItem {
    fn from(i: Ingredient) -> Self {
        Self {
            id: i.id,
            name: i.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub tags: Vec<Uuid>,
    #[serde(default)]
    pub ingredients: Vec<Uuid>,
}

impl CreateRecipeRequest {
    pub fn into_new_recipe(self) -> Result<NewRecipe, String> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err("title is required".into());
        }
        if self.time_minutes < 0 {
            return Err("time_minutes must not be negative".into());
        }
        if self.price.is_sign_negative()
            || self.price.scale() > 2
            || self.price > Decimal::new(MAX_PRICE_CENTS, 2)
        {
            return Err("price must be between 0 and 999.99 with at most 2 decimals".into());
        }
        Ok(NewRecipe {
            title,
            time_minutes: self.time_minutes,
            price: self.price,
            link: self.link.trim().to_string(),
            tag_ids: self.tags,
            ingredient_ids: self.ingredients,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeListItem {
    pub id: Uuid,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub created_at: OffsetDateTime,
}

impl From<Recipe> for RecipeListItem {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            title: r.title,
            time_minutes: r.time_minutes,
            price: r.price,
            link: r.link,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeDetailsResponse {
    #[serde(flatten)]
    pub recipe: RecipeListItem,
    pub tags: Vec<NamedItem>,
    pub ingredients: Vec<NamedItem>,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}
