//! Deleting a transaction together with the rows and files that belong to it.

use rusqlite::Connection;

use crate::{
    Error,
    database_id::TransactionId,
    receipt::{Receipt, get_receipts_for_transaction},
    transaction::{Transaction, get_transaction},
};

/// A transaction whose rows have been deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedTransaction {
    pub transaction: Transaction,
    /// The receipts whose files still need to be removed from the upload directory.
    pub receipts: Vec<Receipt>,
}

/// Delete the transaction `transaction_id`, its tag links and its receipt records.
///
/// The rows are deleted in one SQL transaction so either all of them are gone
/// or none are. The receipt files are left for the caller to remove with
/// [remove_receipt_files](crate::receipt::remove_receipt_files) once the
/// database lock is released.
///
/// # Errors
/// Returns [Error::DeleteMissingTransaction] if there is no transaction with
/// `transaction_id`, or [Error::SqlError] if the rows could not be deleted.
pub fn delete_transaction_cascade(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<DeletedTransaction, Error> {
    let transaction = match get_transaction(transaction_id, connection) {
        Ok(transaction) => transaction,
        Err(Error::NotFound) => return Err(Error::DeleteMissingTransaction),
        Err(error) => return Err(error),
    };
    let receipts = get_receipts_for_transaction(transaction_id, connection)?;

    let sql_transaction = connection.unchecked_transaction()?;
    sql_transaction.execute(
        "DELETE FROM transaction_tag WHERE transaction_id = ?1",
        [transaction_id],
    )?;
    sql_transaction.execute(
        "DELETE FROM receipt WHERE transaction_id = ?1",
        [transaction_id],
    )?;
    sql_transaction.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1",
        [transaction_id],
    )?;
    sql_transaction.commit()?;

    Ok(DeletedTransaction {
        transaction,
        receipts,
    })
}
