//! Receipt records and their database queries.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{ReceiptId, TransactionId},
    receipt::StoredFile,
};

/// A file attached to a transaction as proof of payment.
#[derive(Debug, Clone, PartialEq)]
pub struct Receipt {
    pub id: ReceiptId,
    pub transaction_id: TransactionId,
    /// The generated name of the file in the upload directory.
    pub filename: String,
    /// The name of the file on the uploader's computer.
    pub original_filename: String,
    pub file_size: u64,
    pub mime_type: String,
    pub uploaded_at: OffsetDateTime,
}

pub fn create_receipt_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS receipt (
            id INTEGER PRIMARY KEY,
            transaction_id INTEGER NOT NULL,
            filename TEXT NOT NULL UNIQUE,
            original_filename TEXT NOT NULL,
            file_size INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            uploaded_at TEXT NOT NULL,
            FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id)
                ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

/// Record `stored_file` as a receipt of the transaction `transaction_id`.
pub fn create_receipt(
    transaction_id: TransactionId,
    stored_file: &StoredFile,
    connection: &Connection,
) -> Result<Receipt, Error> {
    let uploaded_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO receipt (transaction_id, filename, original_filename, file_size, mime_type,
            uploaded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            transaction_id,
            &stored_file.filename,
            &stored_file.original_filename,
            stored_file.file_size as i64,
            stored_file.mime_type,
            uploaded_at,
        ),
    )?;

    Ok(Receipt {
        id: connection.last_insert_rowid(),
        transaction_id,
        filename: stored_file.filename.clone(),
        original_filename: stored_file.original_filename.clone(),
        file_size: stored_file.file_size,
        mime_type: stored_file.mime_type.to_owned(),
        uploaded_at,
    })
}

const SELECT_RECEIPT: &str = "SELECT id, transaction_id, filename, original_filename, file_size,
    mime_type, uploaded_at FROM receipt";

pub fn get_receipt(receipt_id: ReceiptId, connection: &Connection) -> Result<Receipt, Error> {
    connection
        .prepare(&format!("{SELECT_RECEIPT} WHERE id = ?1"))?
        .query_row([receipt_id], map_row)
        .map_err(Error::from)
}

/// The receipts of a transaction, oldest first.
pub fn get_receipts_for_transaction(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Vec<Receipt>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_RECEIPT} WHERE transaction_id = ?1 ORDER BY uploaded_at ASC, id ASC"
        ))?
        .query_map([transaction_id], map_row)?
        .map(|maybe_receipt| maybe_receipt.map_err(Error::from))
        .collect()
}

/// Delete a receipt's record, returning it so the caller can remove its file
/// with [remove_receipt_files](crate::receipt::remove_receipt_files).
///
/// # Errors
/// Returns [Error::DeleteMissingReceipt] if there is no receipt with `receipt_id`.
pub fn delete_receipt(receipt_id: ReceiptId, connection: &Connection) -> Result<Receipt, Error> {
    let receipt = match get_receipt(receipt_id, connection) {
        Ok(receipt) => receipt,
        Err(Error::NotFound) => return Err(Error::DeleteMissingReceipt),
        Err(error) => return Err(error),
    };

    connection.execute("DELETE FROM receipt WHERE id = ?1", [receipt_id])?;

    Ok(receipt)
}

fn map_row(row: &Row) -> Result<Receipt, rusqlite::Error> {
    Ok(Receipt {
        id: row.get(0)?,
        transaction_id: row.get(1)?,
        filename: row.get(2)?,
        original_filename: row.get(3)?,
        file_size: row.get::<_, i64>(4)? as u64,
        mime_type: row.get(5)?,
        uploaded_at: row.get(6)?,
    })
}
