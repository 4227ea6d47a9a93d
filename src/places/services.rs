//! Place operations. Every store call is wrapped so that raw storage errors
//! are logged here and only fixed messages reach the client.

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{CreatePlaceInput, UpdatePlaceRequest};
use super::repo_types::Place;
use crate::error::AppError;
use crate::images::services::discard_image;
use crate::state::AppState;

#[instrument(skip(st))]
pub async fn get_place_by_id(st: &AppState, place_id: Uuid) -> Result<Place, AppError> {
    st.store
        .find_place(place_id)
        .await
        .map_err(|e| {
            error!(error = %e, %place_id, "find_place failed");
            AppError::Storage("Something went wrong, could not find a place.".into())
        })?
        .ok_or_else(|| AppError::NotFound("Could not find a place for the provided id.".into()))
}

#[instrument(skip(st))]
pub async fn get_places_by_user(st: &AppState, user_id: Uuid) -> Result<Vec<Place>, AppError> {
    let places = st.store.find_places_by_creator(user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "find_places_by_creator failed");
        AppError::Storage("Fetching places failed, please try again later.".into())
    })?;
    if places.is_empty() {
        return Err(AppError::NotFound(
            "Could not find places for the provided user id.".into(),
        ));
    }
    Ok(places)
}

/// Creates a place owned by `user_id`. The caller owns `image_key` and must
/// discard it if this fails.
#[instrument(skip(st, input))]
pub async fn create_place(
    st: &AppState,
    input: CreatePlaceInput,
    user_id: Uuid,
    image_key: String,
) -> Result<Place, AppError> {
    input.validate()?;

    let user = match st.store.find_user(user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(%user_id, "create_place for unknown user");
            return Err(AppError::Authorization(
                "Could not find user for provided id.".into(),
            ));
        }
        Err(e) => {
            error!(error = %e, %user_id, "find_user failed");
            return Err(AppError::Authorization(
                "Could not find user for provided id.".into(),
            ));
        }
    };

    let place = Place::new(
        input.title,
        input.description,
        input.address,
        image_key,
        user.id,
    );

    st.store.create_place(&place).await.map_err(|e| {
        error!(error = %e, place_id = %place.id, %user_id, "create_place tx failed");
        AppError::Storage("Creating place failed, please try again.".into())
    })?;

    info!(place_id = %place.id, %user_id, "place created");
    Ok(place)
}

#[instrument(skip(st, input))]
pub async fn update_place(
    st: &AppState,
    place_id: Uuid,
    input: UpdatePlaceRequest,
    user_id: Uuid,
) -> Result<Place, AppError> {
    input.validate()?;

    let mut place = st
        .store
        .find_place(place_id)
        .await
        .map_err(|e| {
            error!(error = %e, %place_id, "find_place failed");
            AppError::Storage("Something went wrong, could not update place.".into())
        })?
        .ok_or_else(|| AppError::NotFound("Could not find place for this id.".into()))?;

    if place.creator != user_id {
        warn!(%place_id, %user_id, creator = %place.creator, "update by non-owner");
        return Err(AppError::Authorization(
            "You are not allowed to edit this place.".into(),
        ));
    }

    place.title = input.title;
    place.description = input.description;

    let updated = st.store.update_place(&place).await.map_err(|e| {
        error!(error = %e, %place_id, "update_place failed");
        AppError::Storage("Something went wrong, could not update place.".into())
    })?;

    info!(%place_id, "place updated");
    Ok(updated)
}

#[instrument(skip(st))]
pub async fn delete_place(st: &AppState, place_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let storage_err = || AppError::Storage("Something went wrong, could not delete place.".into());

    let place = st
        .store
        .find_place(place_id)
        .await
        .map_err(|e| {
            error!(error = %e, %place_id, "find_place failed");
            storage_err()
        })?
        .ok_or_else(|| AppError::NotFound("Could not find place for this id.".into()))?;

    let creator = st
        .store
        .find_user(place.creator)
        .await
        .map_err(|e| {
            error!(error = %e, %place_id, "find_user for creator failed");
            storage_err()
        })?
        .ok_or_else(|| {
            error!(%place_id, creator = %place.creator, "place creator does not exist");
            storage_err()
        })?;

    if creator.id != user_id {
        warn!(%place_id, %user_id, creator = %creator.id, "delete by non-owner");
        return Err(AppError::Authorization(
            "You are not allowed to delete this place.".into(),
        ));
    }

    st.store.delete_place(&place).await.map_err(|e| {
        error!(error = %e, %place_id, "delete_place tx failed");
        storage_err()
    })?;

    discard_image(st, &place.image).await;

    info!(%place_id, %user_id, "place deleted");
    Ok(())
}
