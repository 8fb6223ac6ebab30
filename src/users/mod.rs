use axum::{middleware, routing::get, Router};

use crate::{
    auth::middleware::{require_auth, with_user},
    state::AppState,
};

pub mod handlers;
pub mod model;
pub mod repo;

pub use model::User;
pub use repo::{StoreError, UserRepo};

/// Routes that need an authenticated, resolved user.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/user", get(handlers::get_user_info))
        // last layer added runs first: require_auth, then with_user
        .route_layer(middleware::from_fn_with_state(state.clone(), with_user))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}
