//! Exports the whole ledger as a JSON download.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use time::{OffsetDateTime, UtcOffset, macros::format_description};

use crate::{
    AppState, Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    category::{Category, get_all_categories},
    database_id::{CategoryId, TransactionId},
    role::Permission,
    spending_limit::{SpendingLimit, get_all_spending_limits},
    tag::{Tag, get_all_tags},
    timezone::get_local_offset,
    transaction::{TransactionFilter, TransactionRow, TransactionScope, query_all_transactions},
    user::{User, UserID, get_all_users},
};

/// The state needed for exporting a backup.
#[derive(Debug, Clone)]
pub struct BackupState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for BackupState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// A user as written to a backup. Password hashes are never exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupUser {
    pub id: UserID,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub role: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for BackupUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            role: user.role_name,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupTransaction {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub transaction_type: &'static str,
    /// Formatted with two decimal places so the backup does not depend on float printing.
    pub amount: String,
    pub description: String,
    pub notes: Option<String>,
    pub party: Option<String>,
    pub date: String,
    pub user_id: UserID,
    pub username: String,
    pub category_id: CategoryId,
    pub category: String,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<TransactionRow> for BackupTransaction {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            transaction_type: row.transaction_type.as_str(),
            amount: format!("{:.2}", row.amount),
            description: row.description,
            notes: row.notes,
            party: row.party,
            date: row.date.to_string(),
            user_id: row.user_id,
            username: row.username,
            category_id: row.category_id,
            category: row.category_name,
            tags: row.tags,
            created_at: row.created_at,
        }
    }
}

/// A snapshot of every table a user would want to keep.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Backup {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub users: Vec<BackupUser>,
    pub transactions: Vec<BackupTransaction>,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
    pub spending_limits: Vec<SpendingLimit>,
}

/// Read every user, transaction, category, tag and spending limit.
pub fn create_backup(timestamp: OffsetDateTime, connection: &Connection) -> Result<Backup, Error> {
    let transactions =
        query_all_transactions(&TransactionFilter::default(), TransactionScope::AllUsers, connection)?;

    Ok(Backup {
        timestamp,
        users: get_all_users(connection)?
            .into_iter()
            .map(BackupUser::from)
            .collect(),
        transactions: transactions
            .into_iter()
            .map(BackupTransaction::from)
            .collect(),
        categories: get_all_categories(connection)?,
        tags: get_all_tags(connection)?,
        spending_limits: get_all_spending_limits(connection)?,
    })
}

/// The download name for a backup taken at `now`, e.g. "cashbook_backup_20250131_093000.json".
fn backup_filename(now: OffsetDateTime) -> String {
    let timestamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "latest".to_owned());

    format!("cashbook_backup_{timestamp}.json")
}

/// Download a JSON backup of the database.
pub async fn get_backup(
    State(state): State<BackupState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
) -> Response {
    if let Err(error) = user.require(Permission::Backup) {
        return error.into_response();
    }

    let offset = get_local_offset(&state.local_timezone).unwrap_or(UtcOffset::UTC);
    let now = OffsetDateTime::now_utc().to_offset(offset);

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let backup = match create_backup(now, &connection) {
        Ok(backup) => backup,
        Err(error) => {
            tracing::error!("Could not read the database for a backup: {error}");
            return error.into_response();
        }
    };

    let body = match serde_json::to_vec_pretty(&backup) {
        Ok(body) => body,
        Err(error) => {
            tracing::error!("Could not serialize backup: {error}");
            return Error::JSONSerializationError(error.to_string()).into_response();
        }
    };

    log_audit_action(
        AuditEntry::new(AuditAction::Backup)
            .user(user.id)
            .values(
                None,
                Some(json!({
                    "users": backup.users.len(),
                    "transactions": backup.transactions.len(),
                })),
            )
            .client(&client),
        &connection,
    );

    let filename = backup_filename(now);
    tracing::info!("User \"{}\" downloaded {filename}", user.username);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod backup_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        body::to_bytes,
        extract::State,
        http::{StatusCode, header},
    };
    use serde_json::Value;
    use time::macros::{date, datetime};

    use crate::{
        audit::ClientInfo,
        auth::CurrentUser,
        category::get_all_categories,
        tag::{TagName, set_transaction_tags},
        test_utils::{insert_test_user, seeded_connection},
        transaction::{NewTransaction, TransactionType, create_transaction},
    };

    use super::{BackupState, backup_filename, get_backup};

    #[test]
    fn filename_uses_timestamp() {
        assert_eq!(
            backup_filename(datetime!(2025-01-31 09:30:05 UTC)),
            "cashbook_backup_20250131_093005.json"
        );
    }

    #[tokio::test]
    async fn backup_has_no_password_hashes() {
        let connection = seeded_connection();
        let admin = insert_test_user("root", "Admin", &connection);
        let manager = insert_test_user("alice", "Manager", &connection);
        let transaction = create_transaction(
            NewTransaction {
                transaction_type: TransactionType::Expense,
                amount: 12.5,
                description: "Lunch".to_owned(),
                notes: None,
                party: Some("Cafe".to_owned()),
                date: date!(2025 - 03 - 14),
                user_id: manager.id,
                category_id: get_all_categories(&connection).unwrap()[0].id,
            },
            &connection,
        )
        .unwrap();
        set_transaction_tags(
            transaction.id,
            &[TagName::new_unchecked("work")],
            &connection,
        )
        .unwrap();
        let state = BackupState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = get_backup(
            State(state),
            Extension(CurrentUser::from(&admin)),
            ClientInfo::default(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        assert!(disposition.starts_with("attachment; filename=\"cashbook_backup_"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("password"), "backup leaked a password field");
        assert!(!text.contains("$2b$"), "backup leaked a bcrypt hash");

        let backup: Value = serde_json::from_str(&text).unwrap();
        for key in [
            "timestamp",
            "users",
            "transactions",
            "categories",
            "tags",
            "spending_limits",
        ] {
            assert!(backup.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(backup["users"].as_array().unwrap().len(), 2);
        assert_eq!(backup["transactions"][0]["amount"], "12.50");
        assert_eq!(backup["transactions"][0]["tags"][0], "work");
        assert_eq!(backup["categories"].as_array().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn manager_cannot_download_backup() {
        let connection = seeded_connection();
        let manager = insert_test_user("alice", "Manager", &connection);
        let state = BackupState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        };

        let response = get_backup(
            State(state),
            Extension(CurrentUser::from(&manager)),
            ClientInfo::default(),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
