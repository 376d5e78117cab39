use super::error::*;
use super::handler;
use super::state::SandboxState;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    state: Arc<SandboxState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let login = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("auth"))
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::logout);

    let list = warp::get()
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(with_verification(state.clone()))
        .and(with(state.clone()))
        .and_then(handler::list_collection);

    let append = warp::post()
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(with_verification(state.clone()))
        .and(warp::body::json())
        .and(with(state.clone()))
        .and_then(handler::append_to_collection);

    login.or(refresh).or(logout).or(list).or(append)
}

fn with<T>(value: Arc<T>) -> impl Filter<Extract = (Arc<T>,), Error = Infallible> + Clone
where
    T: Send + Sync + ?Sized,
{
    warp::any().map(move || value.clone())
}

/// Extract the username behind the request's bearer token.
fn with_verification(
    state: Arc<SandboxState>,
) -> impl Filter<Extract = (String,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_ref()).and_then(
        move |header: Option<String>| {
            let state = state.clone();
            async move {
                let token = header
                    .as_deref()
                    .and_then(|value| value.strip_prefix("Bearer "))
                    .ok_or_else(|| reject::custom(SandboxErrorCode::InvalidToken))?;
                state.verify_access(token).map_err(reject::custom)
            }
        },
    )
}
