use axum::{
    Extension,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use crate::{
    Error,
    alert::Alert,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    database_id::TransactionId,
    receipt::remove_receipt_files,
    role::Permission,
    tag::get_transaction_tags,
    transaction::{
        TransactionState, create::audit_values, delete_transaction_cascade,
        edit::get_accessible_transaction,
    },
};

/// Delete a transaction along with its tag links, receipt records and receipt files.
pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    if let Err(error) = user.require(Permission::Delete) {
        return error.into_alert_response();
    }

    let deleted = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_alert_response();
            }
        };

        match get_accessible_transaction(transaction_id, &user, &connection) {
            Ok(_) => {}
            Err(Error::NotFound) => return Error::DeleteMissingTransaction.into_alert_response(),
            Err(error) => return error.into_alert_response(),
        }

        let tags = match get_transaction_tags(transaction_id, &connection) {
            Ok(tags) => tags.into_iter().map(|tag| tag.name).collect::<Vec<_>>(),
            Err(error) => return error.into_alert_response(),
        };

        let deleted = match delete_transaction_cascade(transaction_id, &connection) {
            Ok(deleted) => deleted,
            Err(error) => {
                tracing::error!("Could not delete transaction {transaction_id}: {error}");
                return error.into_alert_response();
            }
        };

        log_audit_action(
            AuditEntry::new(AuditAction::DeleteTransaction)
                .user(user.id)
                .target("transaction", deleted.transaction.id)
                .values(Some(audit_values(&deleted.transaction, &tags)), None)
                .client(&client),
            &connection,
        );

        deleted
    };

    remove_receipt_files(&state.upload_dir, &deleted.receipts).await;

    tracing::info!(
        "User \"{}\" deleted transaction {transaction_id}",
        user.username
    );

    Alert::SuccessSimple {
        message: format!("Deleted transaction \"{}\"", deleted.transaction.description),
    }
    .into_response()
}
