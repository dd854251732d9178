//! Income and expense transactions.
//!
//! This module contains everything related to transactions:
//! - The `Transaction` model and the database functions for storing it
//! - The filtered, paged query used by the transactions page and reports
//! - The cascading delete that also removes tags links and receipts
//! - The page and endpoint handlers for creating, editing and deleting transactions

mod cascade;
mod core;
mod create;
mod delete;
mod edit;
mod form;
mod query;
mod transactions_page;

use rusqlite::Connection;

pub use cascade::delete_transaction_cascade;
pub use core::{
    NewTransaction, Transaction, TransactionType, create_transaction, create_transaction_table,
    get_transaction, map_transaction_row, update_transaction,
};
pub use create::{create_transaction_endpoint, get_new_transaction_page};
pub use delete::delete_transaction_endpoint;
pub use edit::{get_edit_transaction_page, update_transaction_endpoint};
pub use form::{TransactionForm, TransactionFormErrors};
pub(crate) use form::parse_amount;
pub use query::{
    TransactionFilter, TransactionPage, TransactionRow, query_all_transactions,
    query_transactions,
};
pub use transactions_page::{TransactionState, TransactionsQuery, get_transactions_page};

use crate::user::UserID;

/// Which users' transactions a query may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionScope {
    /// Every user's transactions, for users that can manage users.
    AllUsers,
    /// Only the transactions recorded by this user.
    OwnedBy(UserID),
}

/// Create the transaction table and the join table linking transactions to tags.
///
/// The tag table must already exist.
pub fn create_transaction_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    create_transaction_table(connection)?;

    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS transaction_tag (
            transaction_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY(transaction_id, tag_id),
            FOREIGN KEY(transaction_id) REFERENCES \"transaction\"(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(tag_id) REFERENCES tag(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_tag_tag_id ON transaction_tag(tag_id);",
    )?;

    Ok(())
}
