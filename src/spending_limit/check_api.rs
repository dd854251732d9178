//! The JSON endpoint that warns when spending approaches a limit.

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::{
    Error,
    auth::CurrentUser,
    database_id::CategoryId,
    role::Permission,
    spending_limit::{
        LimitPeriod, SpendingLimitState, evaluate_limit, get_active_limits_for_category,
    },
    timezone::local_today,
};

/// A limit whose spending is above the warning threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingAlert {
    #[serde(rename = "type")]
    pub period: LimitPeriod,
    pub limit: f64,
    pub spent: f64,
    pub percentage: f64,
    pub exceeded: bool,
}

/// The body returned by the spending check endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingCheck {
    pub alerts: Vec<SpendingAlert>,
}

/// Check the current user's active limits for `category_id`.
///
/// A category ID of zero checks the limits that cover every category.
pub async fn get_spending_check(
    State(state): State<SpendingLimitState>,
    Extension(user): Extension<CurrentUser>,
    Path(category_id): Path<CategoryId>,
) -> Response {
    if let Err(error) = user.require(Permission::Read) {
        return error.into_json_response();
    }

    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => return error.into_json_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_json_response();
        }
    };

    let category_id = (category_id != 0).then_some(category_id);

    let alerts = get_active_limits_for_category(user.id, category_id, &connection).and_then(
        |limits| {
            let mut alerts = Vec::new();

            for limit in limits {
                let status = evaluate_limit(&limit, today, &connection)?;

                if status.is_warning {
                    alerts.push(SpendingAlert {
                        period: limit.period,
                        limit: limit.amount,
                        spent: status.spent,
                        percentage: status.percentage,
                        exceeded: status.is_exceeded,
                    });
                }
            }

            Ok(alerts)
        },
    );

    match alerts {
        Ok(alerts) => Json(SpendingCheck { alerts }).into_response(),
        Err(error) => {
            tracing::error!("Could not check spending limits: {error}");
            error.into_json_response()
        }
    }
}

#[cfg(test)]
mod spending_check_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        body::to_bytes,
        extract::{Path, State},
        http::StatusCode,
    };
    use serde_json::{Value, json};

    use crate::{
        auth::CurrentUser,
        category::get_all_categories,
        spending_limit::{
            LimitPeriod, NewSpendingLimit, SpendingLimitState, create_spending_limit,
        },
        test_utils::{insert_test_user, seeded_connection},
        timezone::local_today,
        transaction::{NewTransaction, TransactionType, create_transaction},
    };

    use super::get_spending_check;

    #[tokio::test]
    async fn reports_limits_over_the_warning_threshold() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let category_id = get_all_categories(&connection).unwrap()[0].id;
        let today = local_today("Etc/UTC").unwrap();
        create_transaction(
            NewTransaction {
                transaction_type: TransactionType::Expense,
                amount: 90.0,
                description: "Dinner".to_owned(),
                notes: None,
                party: None,
                date: today,
                user_id: user.id,
                category_id,
            },
            &connection,
        )
        .unwrap();
        for (amount, category_id) in [(100.0, None), (500.0, None), (100.0, Some(category_id))] {
            create_spending_limit(
                NewSpendingLimit {
                    period: LimitPeriod::Daily,
                    amount,
                    category_id,
                    is_active: true,
                    user_id: user.id,
                },
                &connection,
            )
            .unwrap();
        }
        let state = SpendingLimitState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response =
            get_spending_check(State(state), Extension(CurrentUser::from(&user)), Path(0)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            body,
            json!({
                "alerts": [{
                    "type": "daily",
                    "limit": 100.0,
                    "spent": 90.0,
                    "percentage": 90.0,
                    "exceeded": false,
                }]
            })
        );
    }

    #[tokio::test]
    async fn errors_are_returned_as_json() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let state = SpendingLimitState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Not/A_Timezone".to_owned(),
        };

        let response =
            get_spending_check(State(state), Extension(CurrentUser::from(&user)), Path(0)).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/json"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"], "Invalid Timezone Settings");
    }
}
