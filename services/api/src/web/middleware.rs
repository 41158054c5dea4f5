//! services/api/src/web/middleware.rs
//!
//! Caller identification for owner-scoped routes.

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller's id, inserted into request extensions by [`require_user`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

/// Reads the caller's id from the `x-user-id` header.
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                format!("{} header is required", USER_ID_HEADER),
            )
        })?;
    Uuid::parse_str(raw.trim()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            format!("Invalid {} format", USER_ID_HEADER),
        )
    })
}

/// Middleware that requires a valid `x-user-id` header.
///
/// If valid, inserts the [`UserId`] into request extensions for handlers to use.
/// If invalid or missing, returns 400 Bad Request.
pub async fn require_user(mut req: Request, next: Next) -> Result<Response, (StatusCode, String)> {
    let user_id = user_id_from_headers(req.headers())?;
    req.extensions_mut().insert(UserId(user_id));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_id_header_is_parsed() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        assert_eq!(user_id_from_headers(&headers).unwrap(), id);
    }

    #[test]
    fn test_missing_or_malformed_header_is_bad_request() {
        let (status, _) = user_id_from_headers(&HeaderMap::new()).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        let (status, message) = user_id_from_headers(&headers).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(message.contains("Invalid"));
    }
}
