//! Serves receipt files to users that may see the receipt's transaction.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, Path, State},
    http::{
        HeaderValue,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    database_id::ReceiptId,
    receipt::{Receipt, get_receipt},
    role::Permission,
    transaction::get_transaction,
};

/// The state needed to download and delete receipts.
#[derive(Debug, Clone)]
pub struct ReceiptState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub upload_dir: PathBuf,
}

impl FromRef<AppState> for ReceiptState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            upload_dir: state.upload_dir.clone(),
        }
    }
}

/// Get `receipt_id` if `user` may access the transaction it belongs to.
///
/// # Errors
/// Returns [Error::Forbidden] when the transaction belongs to someone else.
pub(crate) fn get_accessible_receipt(
    receipt_id: ReceiptId,
    user: &CurrentUser,
    connection: &Connection,
) -> Result<Receipt, Error> {
    let receipt = get_receipt(receipt_id, connection)?;
    let transaction = get_transaction(receipt.transaction_id, connection)?;

    if !user.can_access(transaction.user_id) {
        tracing::warn!(
            "User {} tried to access receipt {receipt_id} of another user",
            user.username
        );
        return Err(Error::Forbidden);
    }

    Ok(receipt)
}

/// The value of the Content-Disposition header for downloading `original_filename`.
fn attachment_header(original_filename: &str) -> HeaderValue {
    let safe_name: String = original_filename
        .chars()
        .filter(|character| character.is_ascii_graphic() || *character == ' ')
        .filter(|character| !matches!(character, '"' | '\\'))
        .collect();

    HeaderValue::from_str(&format!("attachment; filename=\"{safe_name}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Send the receipt file with its original name.
pub async fn get_receipt_file(
    State(state): State<ReceiptState>,
    Extension(user): Extension<CurrentUser>,
    Path(receipt_id): Path<ReceiptId>,
) -> Response {
    if let Err(error) = user.require(Permission::Read) {
        return error.into_response();
    }

    let receipt = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(error) => {
                tracing::error!("could not acquire database lock: {error}");
                return Error::DatabaseLockError.into_response();
            }
        };

        match get_accessible_receipt(receipt_id, &user, &connection) {
            Ok(receipt) => receipt,
            Err(error) => return error.into_response(),
        }
    };

    let data = match tokio::fs::read(state.upload_dir.join(&receipt.filename)).await {
        Ok(data) => data,
        Err(error) => {
            tracing::error!("Could not read receipt file {}: {error}", receipt.filename);
            return Error::NotFound.into_response();
        }
    };

    let content_type = HeaderValue::from_str(&receipt.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    (
        [
            (CONTENT_TYPE, content_type),
            (CONTENT_DISPOSITION, attachment_header(&receipt.original_filename)),
        ],
        data,
    )
        .into_response()
}
