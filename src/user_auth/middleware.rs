use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::error::IdentityError;
use crate::gateway::state::AppState;

/// Why a request carried no usable bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MissingHeader,
    NotBearer,
    EmptyToken,
}

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, GateRejection> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(GateRejection::MissingHeader)?
        .to_str()
        .map_err(|_| GateRejection::NotBearer)?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or(GateRejection::NotBearer)?
        .trim();
    if token.is_empty() {
        return Err(GateRejection::EmptyToken);
    }
    Ok(token)
}

/// Access gate for protected routes.
///
/// Any failure answers 401 before the handler runs. On success the
/// [`AuthenticatedIdentity`](super::models::AuthenticatedIdentity) is
/// injected into request extensions.
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, IdentityError> {
    // 1. Extract bearer token
    let identity = {
        let token = bearer_token(request.headers()).map_err(|reason| {
            tracing::debug!(?reason, path = %request.uri().path(), "request rejected by access gate");
            IdentityError::Unauthorized
        })?;

        // 2. Verify token
        state.identity.authenticate(token)?
    };

    // 3. Inject identity
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(GateRejection::MissingHeader)
        );
    }

    #[test]
    fn test_wrong_scheme() {
        assert_eq!(
            bearer_token(&headers("Basic dXNlcjpwdw==")),
            Err(GateRejection::NotBearer)
        );
        assert_eq!(
            bearer_token(&headers("bearer abc")),
            Err(GateRejection::NotBearer)
        );
        assert_eq!(bearer_token(&headers("abc")), Err(GateRejection::NotBearer));
    }

    #[test]
    fn test_empty_token() {
        assert_eq!(bearer_token(&headers("Bearer ")), Err(GateRejection::EmptyToken));
        assert_eq!(
            bearer_token(&headers("Bearer    ")),
            Err(GateRejection::EmptyToken)
        );
    }
}
