use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{normalize_email, LoginRequest, RegisterRequest, TokenResponse},
        password::{verify_dummy, verify_password_blocking},
    },
    error::{ApiError, JsonBody},
    state::AppState,
    users::StoreError,
};

pub fn login_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

pub fn register_routes() -> Router<AppState> {
    Router::new().route("/register", post(register))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody<RegisterRequest>,
) -> Result<StatusCode, ApiError> {
    payload.email = normalize_email(&payload.email);

    if let Err(errors) = payload.validate() {
        let fields: Vec<&str> = errors.fields().collect();
        warn!(?fields, "invalid registration");
        return Err(errors.into());
    }

    match state
        .users
        .create_one(
            &payload.first_name,
            &payload.last_name,
            &payload.email,
            &payload.password,
        )
        .await
    {
        Ok(()) => {
            info!(email = %payload.email, "user registered");
            Ok(StatusCode::NO_CONTENT)
        }
        Err(StoreError::Conflict) => {
            warn!(email = %payload.email, "email already registered");
            Err(ApiError::Conflict)
        }
        Err(e) => {
            error!(error = %e, "create user failed");
            Err(ApiError::Internal)
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(mut payload): JsonBody<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.validate()?;
    payload.email = normalize_email(&payload.email);

    let user = match state.users.find_one_by_email(&payload.email).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            let password = std::mem::take(&mut payload.password);
            let _ = tokio::task::spawn_blocking(move || verify_dummy(&password)).await;
            warn!(email = %payload.email, "login unknown email");
            return Err(ApiError::Unauthorized);
        }
        Err(e) => {
            error!(error = %e, "find_one_by_email failed");
            return Err(ApiError::Internal);
        }
    };

    let ok = match verify_password_blocking(payload.password, user.password_hash.clone()).await {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, user_id = %user.id, "verify_password failed");
            return Err(ApiError::Internal);
        }
    };

    if !ok {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized);
    }

    let token = match state.keys.issue(user.id) {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "jwt sign failed");
            return Err(ApiError::Internal);
        }
    };

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse { token }))
}
