use bytes::Bytes;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

/// Key prefix for place images; also the static path on local storage.
pub const IMAGE_PREFIX: &str = "uploads/images";

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Stores an uploaded image and returns its storage key.
pub async fn store_image(st: &AppState, img: UploadItem) -> Result<String, AppError> {
    let ext = ext_from_mime(&img.content_type)
        .ok_or_else(|| AppError::Upload("Invalid mime type!".into()))?;
    let key = format!("{}/{}.{}", IMAGE_PREFIX, Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, img.body, &img.content_type)
        .await
        .map_err(|e| {
            error!(error = %e, %key, "put_object failed");
            AppError::Upload("Could not store the uploaded image.".into())
        })?;
    info!(%key, "image stored");
    Ok(key)
}

/// Best-effort delete; failures are logged and swallowed.
pub async fn discard_image(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        warn!(error = %e, %key, "could not delete image");
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}
