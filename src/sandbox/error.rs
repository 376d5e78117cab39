use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::warn;
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let code = if let Some(code) = err.find::<SandboxErrorCode>() {
        code.clone()
    } else if err.is_not_found() {
        SandboxErrorCode::NotFound
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        SandboxErrorCode::BadRequest
    } else if err.find::<reject::MethodNotAllowed>().is_some() {
        SandboxErrorCode::MethodNotAllowed
    } else {
        warn!("Unhandled rejection: {:?}", err);
        SandboxErrorCode::InternalError
    };

    let json = warp::reply::json(&ErrorBody {
        error: ErrorDetail {
            message: code.to_string(),
            code: code.clone(),
        },
    });
    Ok(warp::reply::with_status(json, code.status()))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: SandboxErrorCode,
    message: String,
}

#[derive(Debug, Clone, Error, Serialize)]
pub enum SandboxErrorCode {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Malformed request")]
    BadRequest,
    #[error("Internal error")]
    InternalError,
}

impl SandboxErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> SandboxErrorCode {
        warn!("Internal error: {}", error);
        SandboxErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SandboxErrorCode::InvalidCredentials | SandboxErrorCode::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            SandboxErrorCode::NotFound => StatusCode::NOT_FOUND,
            SandboxErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            SandboxErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            SandboxErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for SandboxErrorCode {}
