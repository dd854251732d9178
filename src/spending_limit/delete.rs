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
    database_id::SpendingLimitId,
    role::Permission,
    spending_limit::{SpendingLimitState, delete_spending_limit, get_spending_limit},
};

/// Delete one of the current user's spending limits.
pub async fn delete_spending_limit_endpoint(
    State(state): State<SpendingLimitState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(limit_id): Path<SpendingLimitId>,
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

    match get_spending_limit(limit_id, &connection) {
        Ok(limit) if !user.can_access(limit.user_id) => {
            return Error::Forbidden.into_alert_response();
        }
        Ok(_) => {}
        Err(Error::NotFound) => return Error::DeleteMissingSpendingLimit.into_alert_response(),
        Err(error) => return error.into_alert_response(),
    }

    match delete_spending_limit(limit_id, &connection) {
        Ok(limit) => {
            log_audit_action(
                AuditEntry::new(AuditAction::DeleteSpendingLimit)
                    .user(user.id)
                    .target("spending_limit", limit_id)
                    .values(
                        Some(json!({
                            "period": limit.period,
                            "amount": format!("{:.2}", limit.amount),
                            "category_id": limit.category_id,
                        })),
                        None,
                    )
                    .client(&client),
                &connection,
            );

            Alert::SuccessSimple {
                message: "Spending limit deleted successfully".to_owned(),
            }
            .into_response()
        }
        Err(error) => {
            tracing::error!("Could not delete spending limit {limit_id}: {error}");
            error.into_alert_response()
        }
    }
}

#[cfg(test)]
mod delete_spending_limit_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };

    use crate::{
        audit::ClientInfo,
        auth::CurrentUser,
        spending_limit::{
            LimitPeriod, NewSpendingLimit, SpendingLimitState, create_spending_limit,
            get_spending_limit,
        },
        test_utils::{insert_test_user, seeded_connection},
    };

    use super::delete_spending_limit_endpoint;

    #[tokio::test]
    async fn owner_deletes_limit_and_others_cannot() {
        let connection = seeded_connection();
        let owner = insert_test_user("alice", "Manager", &connection);
        let other = insert_test_user("bob", "Manager", &connection);
        let limit = create_spending_limit(
            NewSpendingLimit {
                period: LimitPeriod::Daily,
                amount: 25.0,
                category_id: None,
                is_active: true,
                user_id: owner.id,
            },
            &connection,
        )
        .unwrap();
        let state = SpendingLimitState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = delete_spending_limit_endpoint(
            State(state.clone()),
            Extension(CurrentUser::from(&other)),
            ClientInfo::default(),
            Path(limit.id),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = delete_spending_limit_endpoint(
            State(state.clone()),
            Extension(CurrentUser::from(&owner)),
            ClientInfo::default(),
            Path(limit.id),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(get_spending_limit(limit.id, &state.db_connection.lock().unwrap()).is_err());

        let response = delete_spending_limit_endpoint(
            State(state),
            Extension(CurrentUser::from(&owner)),
            ClientInfo::default(),
            Path(limit.id),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
