//! Category deletion endpoint.

use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    Error,
    alert::Alert,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    category::{CategoryState, delete_category},
    database_id::CategoryId,
    role::Permission,
};

/// Handle category deletion. Returns a success alert or an error alert.
pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(category_id): Path<CategoryId>,
) -> Response {
    if let Err(error) = user.require(Permission::Delete) {
        return error.into_alert_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    match delete_category(category_id, &connection) {
        Ok(category) => {
            log_audit_action(
                AuditEntry::new(AuditAction::DeleteCategory)
                    .user(user.id)
                    .target("category", category_id)
                    .values(Some(json!({"name": category.name})), None)
                    .client(&client),
                &connection,
            );

            Alert::SuccessSimple {
                message: "Category deleted successfully".to_owned(),
            }
            .into_response()
        }
        Err(
            error @ (Error::DeleteMissingCategory | Error::SystemCategory | Error::CategoryInUse),
        ) => error.into_alert_response(),
        Err(error) => {
            tracing::error!(
                "An unexpected error occurred while deleting category {category_id}: {error}"
            );
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod delete_category_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };
    use rusqlite::Connection;

    use crate::{
        audit::ClientInfo,
        auth::CurrentUser,
        category::{CategoryState, NewCategory, create_category, get_all_categories},
        test_utils::{insert_test_user, seeded_connection},
        user::User,
    };

    use super::delete_category_endpoint;

    fn setup(role: &str) -> (CategoryState, User) {
        let connection: Connection = seeded_connection();
        let user = insert_test_user("alice", role, &connection);

        (
            CategoryState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            user,
        )
    }

    #[tokio::test]
    async fn deletes_user_category() {
        let (state, user) = setup("Manager");
        let category = create_category(
            NewCategory {
                name: "Pets".to_owned(),
                description: None,
                color: "#000000".to_owned(),
                is_system: false,
            },
            &state.db_connection.lock().unwrap(),
        )
        .unwrap();

        let response = delete_category_endpoint(
            State(state.clone()),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Path(category.id),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let categories = get_all_categories(&state.db_connection.lock().unwrap()).unwrap();
        assert!(categories.iter().all(|c| c.id != category.id));
    }

    #[tokio::test]
    async fn rejects_system_category() {
        let (state, user) = setup("Admin");
        let system_category = get_all_categories(&state.db_connection.lock().unwrap())
            .unwrap()
            .into_iter()
            .find(|category| category.is_system)
            .unwrap();

        let response = delete_category_endpoint(
            State(state),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Path(system_category.id),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn viewer_cannot_delete() {
        let (state, user) = setup("Viewer");

        let response = delete_category_endpoint(
            State(state),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Path(1),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
