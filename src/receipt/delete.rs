//! Receipt deletion endpoint.

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
    database_id::ReceiptId,
    receipt::{ReceiptState, delete_receipt, download::get_accessible_receipt, remove_receipt_files},
    role::Permission,
};

/// Delete a receipt and its file. Returns a success alert or an error alert.
pub async fn delete_receipt_endpoint(
    State(state): State<ReceiptState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(receipt_id): Path<ReceiptId>,
) -> Response {
    if let Err(error) = user.require(Permission::Update) {
        return error.into_alert_response();
    }

    let receipt = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_alert_response();
            }
        };

        match get_accessible_receipt(receipt_id, &user, &connection) {
            Ok(_) => {}
            Err(Error::NotFound) => return Error::DeleteMissingReceipt.into_alert_response(),
            Err(error) => return error.into_alert_response(),
        }

        let receipt = match delete_receipt(receipt_id, &connection) {
            Ok(receipt) => receipt,
            Err(error) => {
                tracing::error!("Could not delete receipt {receipt_id}: {error}");
                return error.into_alert_response();
            }
        };

        log_audit_action(
            AuditEntry::new(AuditAction::DeleteReceipt)
                .user(user.id)
                .target("receipt", receipt_id)
                .values(
                    Some(json!({
                        "transaction_id": receipt.transaction_id,
                        "original_filename": receipt.original_filename,
                    })),
                    None,
                )
                .client(&client),
            &connection,
        );

        receipt
    };

    remove_receipt_files(&state.upload_dir, &[receipt]).await;

    Alert::SuccessSimple {
        message: "Receipt deleted successfully".to_owned(),
    }
    .into_response()
}
