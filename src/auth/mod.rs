use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::JwtKeys;

/// `/login` always; `/register` only when enabled.
pub fn router(enable_register: bool) -> Router<AppState> {
    let router = Router::new().merge(handlers::login_routes());
    if enable_register {
        router.merge(handlers::register_routes())
    } else {
        router
    }
}
