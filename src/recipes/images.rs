use std::future::Future;
use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::Recipe;
use super::repo;
use crate::error::ModelError;
use crate::state::AppState;
use crate::storage::StorageClient;

pub const RECIPE_UPLOAD_DIR: &str = "uploads/recipe";
const FALLBACK_EXT: &str = "bin";
const PRESIGN_TTL_SECS: u64 = 30 * 60;

/// Storage path for a new recipe image: `uploads/recipe/{uuid}.{ext}`.
pub fn recipe_image_file_path(filename: &str) -> String {
    recipe_image_file_path_with(filename, Uuid::new_v4)
}

/// Same as [`recipe_image_file_path`] with the identifier source supplied by the caller.
pub fn recipe_image_file_path_with(filename: &str, new_id: impl FnOnce() -> Uuid) -> String {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .unwrap_or(FALLBACK_EXT);
    format!("{}/{}.{}", RECIPE_UPLOAD_DIR, new_id(), ext)
}

pub struct ImageUpload {
    pub filename: String,
    pub body: Bytes,
    pub content_type: String,
}

/// Stores the image and points the recipe at it. `None` when the caller
/// does not own a recipe with this id.
pub async fn upload_recipe_image(
    st: &AppState,
    user_id: Uuid,
    recipe_id: Uuid,
    upload: ImageUpload,
) -> anyhow::Result<Option<Recipe>> {
    let Some(existing) = repo::get_recipe(&st.db, user_id, recipe_id).await? else {
        return Ok(None);
    };

    let key = recipe_image_file_path(&upload.filename);
    let updated = store_and_link(st.storage.as_ref(), &key, upload, |key| {
        repo::set_recipe_image(&st.db, user_id, recipe_id, key)
    })
    .await?;
    let Some(updated) = updated else {
        return Ok(None);
    };

    if let Some(old) = existing.image.filter(|old| old != &key) {
        if let Err(e) = st.storage.delete_object(&old).await {
            warn!(error = %e, key = %old, "failed to delete replaced recipe image");
        }
    }

    info!(%recipe_id, key = %key, "recipe image uploaded");
    Ok(Some(updated))
}

/// Puts the object under `key`, then runs `link` to record it on the recipe.
/// The object is removed again when `link` fails or finds no recipe, so the
/// bucket holds no image that no row points at.
async fn store_and_link<'a, F, Fut>(
    storage: &dyn StorageClient,
    key: &'a str,
    upload: ImageUpload,
    link: F,
) -> anyhow::Result<Option<Recipe>>
where
    F: FnOnce(&'a str) -> Fut,
    Fut: Future<Output = Result<Option<Recipe>, ModelError>>,
{
    storage
        .put_object(key, upload.body, &upload.content_type)
        .await?;

    let linked = link(key).await;
    if !matches!(linked, Ok(Some(_))) {
        if let Err(e) = storage.delete_object(key).await {
            warn!(error = %e, key = %key, "failed to delete unlinked recipe image");
        }
    }
    linked.with_context(|| format!("store image path {key}"))
}

pub async fn presign_image(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::Mutex;
    use time::OffsetDateTime;

    #[test]
    fn recipe_file_name_uuid() {
        let uuid = Uuid::parse_str("6f1c1d3e-8a6b-4f0e-9d2a-1b2c3d4e5f60").unwrap();
        let file_path = recipe_image_file_path_with("myimage.jpg", || uuid);
        assert_eq!(file_path, format!("uploads/recipe/{uuid}.jpg"));
    }

    #[test]
    fn keeps_last_extension_verbatim() {
        let uuid = Uuid::nil();
        assert_eq!(
            recipe_image_file_path_with("dinner.final.PNG", || uuid),
            format!("uploads/recipe/{uuid}.PNG")
        );
    }

    #[test]
    fn missing_extension_falls_back_to_bin() {
        let uuid = Uuid::nil();
        assert_eq!(
            recipe_image_file_path_with("snapshot", || uuid),
            format!("uploads/recipe/{uuid}.bin")
        );
        assert_eq!(
            recipe_image_file_path_with("trailing.", || uuid),
            format!("uploads/recipe/{uuid}.bin")
        );
    }

    #[test]
    fn generated_paths_are_unique() {
        let a = recipe_image_file_path("a.jpg");
        let b = recipe_image_file_path("a.jpg");
        assert!(a.starts_with("uploads/recipe/"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
    }

    #[derive(Default)]
    struct RecordingStorage {
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StorageClient for RecordingStorage {
        async fn put_object(&self, key: &str, _b: Bytes, _ct: &str) -> anyhow::Result<()> {
            self.puts.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.deletes.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn presign_get(&self, key: &str, _s: u64) -> anyhow::Result<String> {
            Ok(key.to_string())
        }
    }

    fn upload() -> ImageUpload {
        ImageUpload {
            filename: "dish.jpg".into(),
            body: Bytes::from_static(b"jpeg"),
            content_type: "image/jpeg".into(),
        }
    }

    fn recipe(image: &str) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Omelette".into(),
            time_minutes: 10,
            price: Decimal::new(250, 2),
            link: String::new(),
            image: Some(image.to_string()),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn linked_image_is_kept() {
        let storage = RecordingStorage::default();
        let key = "uploads/recipe/kept.jpg";

        let linked = store_and_link(&storage, key, upload(), |k| async move {
            Ok::<_, ModelError>(Some(recipe(k)))
        })
            .await
            .unwrap()
            .expect("recipe updated");

        assert_eq!(linked.image.as_deref(), Some(key));
        assert_eq!(*storage.puts.lock().unwrap(), vec![key.to_string()]);
        assert!(storage.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn image_is_removed_when_recipe_vanished() {
        let storage = RecordingStorage::default();
        let key = "uploads/recipe/orphan.jpg";

        let linked = store_and_link(&storage, key, upload(), |_| async { Ok::<_, ModelError>(None) })
            .await
            .unwrap();

        assert!(linked.is_none());
        assert_eq!(*storage.deletes.lock().unwrap(), vec![key.to_string()]);
    }

    #[tokio::test]
    async fn image_is_removed_when_update_fails() {
        let storage = RecordingStorage::default();
        let key = "uploads/recipe/failed.jpg";

        let err = store_and_link(&storage, key, upload(), |_| async {
            Err::<Option<Recipe>, _>(ModelError::Database(sqlx::Error::PoolTimedOut))
        })
        .await
        .unwrap_err();

        assert!(err.to_string().contains(key));
        assert_eq!(*storage.deletes.lock().unwrap(), vec![key.to_string()]);
    }

    #[tokio::test]
    async fn presign_uses_storage_client() {
        let state = AppState::fake();
        let url = presign_image(&state, "uploads/recipe/x.jpg").await.unwrap();
        assert!(url.contains("uploads/recipe/x.jpg"));
    }
}
