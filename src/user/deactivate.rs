//! Deactivating users. Users are never deleted so that their transactions and
//! audit history stay intact.

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use serde_json::json;

use crate::{
    Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    endpoints,
    role::Permission,
    user::{UserID, deactivate_user, list::UserState},
};

/// Deactivate the user with `user_id` so that they can no longer log in.
pub async fn deactivate_user_endpoint(
    State(state): State<UserState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(user_id): Path<i64>,
) -> Response {
    if let Err(error) = current_user.require(Permission::ManageUsers) {
        return error.into_alert_response();
    }

    let user_id = UserID::new(user_id);

    if user_id == current_user.id {
        return Error::CannotDeactivateSelf.into_alert_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    if let Err(error) = deactivate_user(user_id, &connection) {
        tracing::error!("Could not deactivate user {user_id}: {error}");
        return error.into_alert_response();
    }

    log_audit_action(
        AuditEntry::new(AuditAction::DeactivateUser)
            .user(current_user.id)
            .target("user", user_id.as_i64())
            .values(
                Some(json!({"is_active": true})),
                Some(json!({"is_active": false})),
            )
            .client(&client),
        &connection,
    );

    tracing::info!("User \"{}\" deactivated user {user_id}", current_user.username);

    (
        HxRedirect(endpoints::USERS_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}
