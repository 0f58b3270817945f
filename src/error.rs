use std::convert::Infallible;
use std::fmt::{self, Display};

use serde_json::json;
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::{reply, Reply};

/// Error carried through warp rejections and surfaced to the client
/// as a `{"detail": …}` JSON body.
#[derive(Debug, Clone)]
pub struct Error {
    pub code: u16,
    pub info: Option<String>,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn reject(self) -> Rejection {
        warp::reject::custom(self)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.info {
            Some(info) => write!(f, "{} ({})", self.code, info),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for Error {}
impl warp::reject::Reject for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    InvalidRequest,
    InvalidSession,
    Unauthorized,
    NotFound,
    InternalServerError,
}

impl HttpError {
    fn code(self) -> u16 {
        match self {
            HttpError::InvalidRequest => 400,
            HttpError::InvalidSession => 401,
            HttpError::Unauthorized => 403,
            HttpError::NotFound => 404,
            HttpError::InternalServerError => 500,
        }
    }

    pub fn new(self, info: &str) -> Error {
        Error {
            code: self.code(),
            info: Some(info.to_string()),
        }
    }

    pub fn default(self) -> Error {
        let info = match self {
            HttpError::InvalidRequest => "Invalid request",
            HttpError::InvalidSession => "Authentication credentials were not provided",
            HttpError::Unauthorized => "You don't have permission to perform this action",
            HttpError::NotFound => "Not found",
            HttpError::InternalServerError => "Internal server error",
        };

        self.new(info)
    }
}

/// Terminal rejection handler: every rejection becomes a JSON reply.
/// Internal errors are logged server-side and never leak their detail.
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, String::from("Not found"))
    } else if let Some(error) = err.find::<Error>() {
        let status = error.status();
        if status.is_server_error() {
            log::error!("internal error: {error}");
            (status, String::from("Internal server error"))
        } else {
            let detail = error
                .info
                .clone()
                .unwrap_or_else(|| String::from("Invalid request"));
            (status, detail)
        }
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, String::from("Method not allowed"))
    } else {
        log::error!("unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            String::from("Internal server error"),
        )
    };

    let body = reply::json(&json!({ "detail": detail }));
    Ok(reply::with_status(body, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_http() {
        assert_eq!(HttpError::InvalidRequest.default().code, 400);
        assert_eq!(HttpError::InvalidSession.default().code, 401);
        assert_eq!(HttpError::Unauthorized.default().code, 403);
        assert_eq!(HttpError::NotFound.default().code, 404);
        assert_eq!(HttpError::InternalServerError.default().code, 500);
    }

    #[test]
    fn new_carries_detail() {
        let error = HttpError::InvalidRequest.new("Recipe is already in favorites");
        assert_eq!(error.info.as_deref(), Some("Recipe is already in favorites"));
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }
}
