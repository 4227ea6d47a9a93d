use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Place;
use crate::error::AppError;
use crate::storage::StorageClient;

/// Text fields of the create form; the image travels separately.
#[derive(Debug, Default, Clone)]
pub struct CreatePlaceInput {
    pub title: String,
    pub description: String,
    pub address: String,
}

impl CreatePlaceInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if [&self.title, &self.description, &self.address]
            .iter()
            .any(|f| f.trim().is_empty())
        {
            return Err(AppError::invalid_inputs());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePlaceRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl UpdatePlaceRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(AppError::invalid_inputs());
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub address: String,
    pub image: String,
    pub image_url: String,
    pub creator: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PlaceResponse {
    pub fn new(place: Place, storage: &dyn StorageClient) -> Self {
        Self {
            image_url: storage.public_url(&place.image),
            id: place.id,
            title: place.title,
            description: place.description,
            address: place.address,
            image: place.image,
            creator: place.creator,
            created_at: place.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlaceEnvelope {
    pub place: PlaceResponse,
}

#[derive(Debug, Serialize)]
pub struct PlacesEnvelope {
    pub places: Vec<PlaceResponse>,
}

#[derive(Debug, Serialize)]
pub struct CreatedPlaceResponse {
    pub message: &'static str,
    pub place: PlaceResponse,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
