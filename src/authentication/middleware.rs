use warp::{reject::Rejection, Filter};

use crate::error::HttpError;

use super::jwt::{verify_jwt_session, SessionData};

/// Extracts the token from an `Authorization` header. Both the
/// `Bearer` and `Token` schemes are accepted.
fn bearer_token(header: &str) -> Option<&str> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))?
        .trim();

    (!token.is_empty()).then_some(token)
}

pub fn with_session() -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(|header: Option<String>| async move {
        match header.as_deref().and_then(bearer_token) {
            Some(token) => match verify_jwt_session(token) {
                Ok(data) => Ok(data.into()),
                Err(e) => Err(e.reject()),
            },
            None => Err(HttpError::InvalidSession.default().reject()),
        }
    })
}

pub fn with_possible_session(
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").map(|header: Option<String>| {
        header
            .as_deref()
            .and_then(bearer_token)
            .and_then(|token| verify_jwt_session(token).ok())
            .map(SessionData::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_bearer_and_token_schemes() {
        assert_eq!(bearer_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(bearer_token("Token abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("abc.def.ghi"), None);
    }
}
