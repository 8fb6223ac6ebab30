use axum::Json;
use tracing::instrument;

use super::User;
use crate::auth::middleware::CurrentUser;

/// Returns the caller's own record.
#[instrument(skip_all)]
pub async fn get_user_info(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
