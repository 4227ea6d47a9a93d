use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        Path, State,
    },
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::dto::{
    CreatePlaceInput, CreatedPlaceResponse, MessageResponse, PlaceEnvelope, PlaceResponse,
    PlacesEnvelope, UpdatePlaceRequest,
};
use super::services;
use crate::{
    auth::AuthUser,
    error::AppError,
    images::services::{discard_image, store_image, UploadItem},
    state::AppState,
};

// --- public routers ---

pub fn read_router() -> Router<AppState> {
    Router::new()
        .route("/places/:pid", get(get_place))
        .route("/places/user/:uid", get(get_places_by_user))
}

pub fn write_router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/places", post(create_place))
        .route("/places/:pid", patch(update_place).delete(delete_place))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

// --- handlers ---

#[instrument(skip(state))]
pub async fn get_place(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> Result<Json<PlaceEnvelope>, AppError> {
    let place_id = parse_id(&pid, "Could not find a place for the provided id.")?;
    let place = services::get_place_by_id(&state, place_id).await?;
    Ok(Json(PlaceEnvelope {
        place: PlaceResponse::new(place, state.storage.as_ref()),
    }))
}

#[instrument(skip(state))]
pub async fn get_places_by_user(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<PlacesEnvelope>, AppError> {
    let user_id = parse_id(&uid, "Could not find places for the provided user id.")?;
    let places = services::get_places_by_user(&state, user_id).await?;
    Ok(Json(PlacesEnvelope {
        places: places
            .into_iter()
            .map(|p| PlaceResponse::new(p, state.storage.as_ref()))
            .collect(),
    }))
}

/// POST /places (multipart): title, description, address, image.
#[instrument(skip(state, mp))]
pub async fn create_place(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<CreatedPlaceResponse>), AppError> {
    let mut mp = mp.map_err(|e| {
        warn!(error = %e, "not a multipart request");
        AppError::Upload("Invalid upload.".into())
    })?;
    let (input, image) = read_place_form(&mut mp).await?;
    let image = image.ok_or_else(|| AppError::Upload("No image provided.".into()))?;
    let key = store_image(&state, image).await?;

    match services::create_place(&state, input, user_id, key.clone()).await {
        Ok(place) => Ok((
            StatusCode::CREATED,
            Json(CreatedPlaceResponse {
                message: "Successfully added!",
                place: PlaceResponse::new(place, state.storage.as_ref()),
            }),
        )),
        Err(e) => {
            discard_image(&state, &key).await;
            Err(e)
        }
    }
}

#[instrument(skip(state, body))]
pub async fn update_place(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(pid): Path<String>,
    body: Result<Json<UpdatePlaceRequest>, JsonRejection>,
) -> Result<Json<PlaceEnvelope>, AppError> {
    let Json(body) = body.map_err(|_| AppError::invalid_inputs())?;
    // bad input wins over an unknown id
    body.validate()?;
    let place_id = parse_id(&pid, "Could not find place for this id.")?;
    let place = services::update_place(&state, place_id, body, user_id).await?;
    Ok(Json(PlaceEnvelope {
        place: PlaceResponse::new(place, state.storage.as_ref()),
    }))
}

#[instrument(skip(state))]
pub async fn delete_place(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(pid): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let place_id = parse_id(&pid, "Could not find place for this id.")?;
    services::delete_place(&state, place_id, user_id).await?;
    Ok(Json(MessageResponse {
        message: "Deleted place.",
    }))
}

// --- helpers ---

/// Ids that are not UUIDs cannot name a record.
fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(not_found.into()))
}

async fn read_place_form(
    mp: &mut Multipart,
) -> Result<(CreatePlaceInput, Option<UploadItem>), AppError> {
    let mut input = CreatePlaceInput::default();
    let mut image = None;

    loop {
        let field = match mp.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "multipart read failed");
                return Err(AppError::Upload("Invalid upload.".into()));
            }
        };
        let invalid = |e: axum::extract::multipart::MultipartError| {
            warn!(error = %e, "multipart field read failed");
            AppError::Upload("Invalid upload.".into())
        };
        let name = field.name().map(|s| s.to_string());
        match name.as_deref() {
            Some("title") => input.title = field.text().await.map_err(invalid)?,
            Some("description") => input.description = field.text().await.map_err(invalid)?,
            Some("address") => input.address = field.text().await.map_err(invalid)?,
            Some("image") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field.bytes().await.map_err(invalid)?;
                image = Some(UploadItem { body, content_type });
            }
            _ => {}
        }
    }

    Ok((input, image))
}
