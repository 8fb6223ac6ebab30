//! Request stages guarding protected routes.
//!
//! `require_auth` turns a bearer token into an [`AuthUser`]; `with_user`
//! turns that into a [`CurrentUser`]. Each stage hands its result to the
//! next through a typed request extension, and handlers take `CurrentUser`
//! as an extractor. Every client-facing rejection is the same 401.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use super::jwt::{JwtKeys, TokenError};
use crate::{
    error::ApiError,
    state::AppState,
    users::{StoreError, User},
};

const BEARER: &str = "Bearer ";

/// Subject of a verified token. Not yet checked against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser(pub Uuid);

/// The stored user behind the verified token.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingCarrier,
    #[error("malformed Authorization header")]
    MalformedCarrier,
    #[error("invalid token: {0}")]
    Token(#[from] TokenError),
    #[error("token subject no longer exists")]
    UserNotFound,
    #[error("authenticated identity missing from request")]
    MissingIdentity,
    #[error("user lookup failed: {0}")]
    Store(#[source] StoreError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingIdentity | AuthError::Store(_) => {
                error!(error = %self, "auth stage failed");
                ApiError::Internal.into_response()
            }
            _ => {
                warn!(reason = %self, "request rejected");
                ApiError::Unauthorized.into_response()
            }
        }
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingCarrier)?
        .to_str()
        .map_err(|_| AuthError::MalformedCarrier)?;
    let token = value
        .strip_prefix(BEARER)
        .ok_or(AuthError::MalformedCarrier)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MalformedCarrier);
    }
    Ok(token)
}

/// Extracts and verifies the bearer token.
pub fn authenticate(headers: &HeaderMap, keys: &JwtKeys) -> Result<AuthUser, AuthError> {
    let token = bearer_token(headers)?;
    let user_id = keys.verify(token)?;
    Ok(AuthUser(user_id))
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth = authenticate(request.headers(), &state.keys)?;
    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Must be layered inside `require_auth`.
pub async fn with_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let AuthUser(user_id) = request
        .extensions()
        .get::<AuthUser>()
        .copied()
        .ok_or(AuthError::MissingIdentity)?;

    let user = match state.users.find_one_by_id(user_id).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            warn!(user_id = %user_id, "token subject not found");
            return Err(AuthError::UserNotFound);
        }
        Err(e) => return Err(AuthError::Store(e)),
    };

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingIdentity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{HeaderValue, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use std::time::Duration;
    use tower::ServiceExt;

    use crate::test_utils::{body_json, test_state};

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    fn keys() -> JwtKeys {
        JwtKeys::new(b"secret-key", Duration::from_secs(60))
    }

    #[test]
    fn bearer_token_requires_scheme() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingCarrier)
        ));
        assert!(matches!(
            bearer_token(&headers("Basic abc")),
            Err(AuthError::MalformedCarrier)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer ")),
            Err(AuthError::MalformedCarrier)
        ));
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn authenticate_reports_token_errors() {
        let err = authenticate(&headers("Bearer junk"), &keys()).unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Malformed)), "{err:?}");

        let foreign = JwtKeys::new(b"other", Duration::from_secs(60))
            .issue(Uuid::new_v4())
            .unwrap();
        let err = authenticate(&headers(&format!("Bearer {foreign}")), &keys()).unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::BadSignature)), "{err:?}");
    }

    #[test]
    fn authenticate_yields_subject() {
        let id = Uuid::new_v4();
        let token = keys().issue(id).unwrap();
        let auth = authenticate(&headers(&format!("Bearer {token}")), &keys()).unwrap();
        assert_eq!(auth, AuthUser(id));
    }

    #[test]
    fn client_facing_rejections_are_identical() {
        for err in [
            AuthError::MissingCarrier,
            AuthError::MalformedCarrier,
            AuthError::Token(TokenError::Malformed),
            AuthError::Token(TokenError::BadSignature),
            AuthError::Token(TokenError::Expired),
            AuthError::UserNotFound,
        ] {
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }
        assert_eq!(
            AuthError::MissingIdentity.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::Store(StoreError::Cancelled).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn with_user_without_require_auth_is_internal_error() {
        let state = test_state().await;
        let app: Router = Router::new()
            .route("/", get(|| async { "unreachable" }))
            .route_layer(middleware::from_fn_with_state(state.clone(), with_user))
            .with_state(state);

        let res = app
            .oneshot(axum::http::Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res).await["error"], "internal server error");
    }

    async fn must_not_run() -> &'static str {
        panic!("handler must not run")
    }

    #[tokio::test]
    async fn rejected_request_never_reaches_handler() {
        let state = test_state().await;
        let app: Router = Router::new()
            .route("/", get(must_not_run))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state);

        let res = app
            .oneshot(
                axum::http::Request::get("/")
                    .header(header::AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn store_failure_in_with_user_is_internal_error() {
        let state = test_state().await;
        let token = state.keys.issue(Uuid::new_v4()).unwrap();
        state.users.pool().close().await;
        let app: Router = crate::users::router(state.clone()).with_state(state);

        let res = app
            .oneshot(
                axum::http::Request::get("/user")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(res).await;
        assert_eq!(body, serde_json::json!({ "error": "internal server error" }));
    }
}
