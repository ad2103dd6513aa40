use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::error::{ApiError, Result};
use crate::state::SharedState;
use crate::store::UserRecord;

/// Body accepted by create and update.
#[derive(Debug, Deserialize, Validate)]
pub struct UserInput {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct RouteIndex {
    pub auth_header: &'static str,
    pub routes: Vec<&'static str>,
}

fn parse_input(payload: std::result::Result<Json<UserInput>, JsonRejection>) -> Result<UserInput> {
    let Json(input) = payload.map_err(|rejection| {
        debug!(error = %rejection, "Rejected user payload");
        ApiError::invalid_user_data()
    })?;
    input.validate().map_err(|_| ApiError::invalid_user_data())?;
    Ok(input)
}

fn parse_id(id: std::result::Result<Path<u64>, PathRejection>) -> Result<u64> {
    let Path(id) = id.map_err(|_| ApiError::InvalidInput("Invalid user id.".to_string()))?;
    Ok(id)
}

/// Create a user from `{"name": ...}`
pub async fn create_user(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<UserInput>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let input = parse_input(payload)?;
    let user = state.store.create(input.name)?;
    info!(user_id = user.id, "User created");

    let location = format!("/api/user/{}", user.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(user)))
}

pub async fn get_user(
    State(state): State<SharedState>,
    id: std::result::Result<Path<u64>, PathRejection>,
) -> Result<Json<UserRecord>> {
    let id = parse_id(id)?;
    let user = state.store.get(id).map_err(|err| {
        warn!(user_id = id, "User not found");
        err
    })?;
    Ok(Json(user))
}

/// Rename a user; a bad payload wins over an unknown id
pub async fn update_user(
    State(state): State<SharedState>,
    id: std::result::Result<Path<u64>, PathRejection>,
    payload: std::result::Result<Json<UserInput>, JsonRejection>,
) -> Result<StatusCode> {
    let id = parse_id(id)?;
    let input = parse_input(payload)?;

    state.store.update(id, input.name).map_err(|err| {
        warn!(user_id = id, "User not found");
        err
    })?;
    info!(user_id = id, "User updated");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user(
    State(state): State<SharedState>,
    id: std::result::Result<Path<u64>, PathRejection>,
) -> Result<StatusCode> {
    let id = parse_id(id)?;
    state.store.delete(id).map_err(|err| {
        warn!(user_id = id, "User not found");
        err
    })?;
    info!(user_id = id, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(State(state): State<SharedState>) -> Result<Json<Vec<UserRecord>>> {
    Ok(Json(state.store.get_all()?))
}

pub async fn call_counts(State(state): State<SharedState>) -> Json<BTreeMap<String, u64>> {
    Json(state.tracker.get_counts())
}

/// Plain listing of the API surface, reachable without a key.
pub async fn route_index() -> Json<RouteIndex> {
    Json(RouteIndex {
        auth_header: "X-Api-Key",
        routes: vec![
            "POST /api/user/create",
            "GET /api/user/{id}",
            "PUT /api/user/{id}",
            "DELETE /api/user/{id}",
            "GET /api/user",
            "GET /api/user/apicallcounts",
        ],
    })
}
