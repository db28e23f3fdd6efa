use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use ulid::Ulid;

use crate::http::ApiError;
use crate::service::Requester;

/// ULID of the calling user, set by the gateway in front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";
/// `admin`, or the listing platform's numeric admin role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

const ADMIN_ROLE_ID: &str = "3";

fn is_admin_role(raw: &str) -> bool {
    let raw = raw.trim();
    raw.eq_ignore_ascii_case("admin") || raw == ADMIN_ROLE_ID
}

pub fn requester_from_headers(headers: &HeaderMap) -> Result<Requester, ApiError> {
    let raw_id = headers
        .get(USER_ID_HEADER)
        .ok_or(ApiError::Unauthorized("missing x-user-id header"))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("malformed x-user-id header"))?;
    let user_id = raw_id
        .trim()
        .parse::<Ulid>()
        .map_err(|_| ApiError::Unauthorized("malformed x-user-id header"))?;
    let is_admin = headers
        .get(USER_ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(is_admin_role);
    Ok(Requester { user_id, is_admin })
}

impl<S> FromRequestParts<S> for Requester
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        requester_from_headers(&parts.headers)
    }
}
