use super::error::*;
use super::state::SandboxState;
use crate::domain_model::{LoginRequestBody, RefreshRequestBody};
use crate::logger::*;
use serde_json::Value;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{self, reject};

pub async fn login(
    body: LoginRequestBody,
    state: Arc<SandboxState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    if !state.check_password(&body.username, &body.password) {
        info!(username = %body.username, "login rejected");
        return Err(reject::custom(SandboxErrorCode::InvalidCredentials));
    }

    let credential = state.issue(&body.username).map_err(reject::custom)?;
    info!(username = %body.username, "login accepted");
    Ok(warp::reply::json(&credential))
}

pub async fn refresh(
    body: RefreshRequestBody,
    state: Arc<SandboxState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let credential = state
        .rotate(body.refresh_token.as_str())
        .map_err(reject::custom)?;
    debug!("refresh token rotated");
    Ok(warp::reply::json(&credential))
}

pub async fn logout(
    body: RefreshRequestBody,
    username: String,
    state: Arc<SandboxState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let revoked = state.revoke(body.refresh_token.as_str());
    info!(%username, revoked, "logout");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_collection(
    collection: String,
    username: String,
    state: Arc<SandboxState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let items = state
        .list(&collection)
        .ok_or_else(|| reject::custom(SandboxErrorCode::NotFound))?;
    debug!(%username, %collection, count = items.len(), "list");

    let mut body = serde_json::Map::new();
    body.insert(collection, Value::Array(items));
    Ok(warp::reply::json(&body))
}

pub async fn append_to_collection(
    collection: String,
    username: String,
    item: Value,
    state: Arc<SandboxState>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let item = state
        .append(&collection, item)
        .ok_or_else(|| reject::custom(SandboxErrorCode::NotFound))?;
    debug!(%username, %collection, "append");

    Ok(warp::reply::with_status(
        warp::reply::json(&item),
        StatusCode::CREATED,
    ))
}
