//! Defines the core data models and database queries for transactions.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{CategoryId, TransactionId},
    user::UserID,
};

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// The capitalised label shown in pages and reports.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Income => "Income",
            TransactionType::Expense => "Expense",
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("\"{other}\" is not a transaction type")),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub transaction_type: TransactionType,
    /// The amount of money spent or earned, always greater than zero.
    pub amount: f64,
    pub description: String,
    pub notes: Option<String>,
    /// Who the money was paid to or received from.
    pub party: Option<String>,
    /// When the transaction happened.
    pub date: Date,
    /// The user that recorded the transaction.
    pub user_id: UserID,
    pub category_id: CategoryId,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The data for inserting or replacing a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub description: String,
    pub notes: Option<String>,
    pub party: Option<String>,
    pub date: Date,
    pub user_id: UserID,
    pub category_id: CategoryId,
}

pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            transaction_type TEXT NOT NULL CHECK (transaction_type IN ('income', 'expense')),
            amount REAL NOT NULL CHECK (amount > 0),
            description TEXT NOT NULL,
            notes TEXT,
            party TEXT,
            date TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE RESTRICT
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_date ON \"transaction\"(date);
        CREATE INDEX IF NOT EXISTS idx_transaction_user_id ON \"transaction\"(user_id);",
    )?;

    Ok(())
}

/// Map a foreign key violation to [Error::InvalidCategory].
///
/// The owning user comes from the logged in user so it is always valid.
fn map_foreign_key_error(error: rusqlite::Error, category_id: CategoryId) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            _,
        ) => Error::InvalidCategory(category_id),
        error => error.into(),
    }
}

/// Insert a transaction and return it with its generated ID.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not greater than zero,
/// - [Error::InvalidCategory] if the category ID does not refer to a category,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_transaction(
    new_transaction: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    if new_transaction.amount.is_nan() || new_transaction.amount <= 0.0 {
        return Err(Error::InvalidAmount(new_transaction.amount));
    }

    let now = OffsetDateTime::now_utc();

    connection
        .prepare(
            "INSERT INTO \"transaction\" (transaction_type, amount, description, notes, party,
                date, user_id, category_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
             RETURNING id, transaction_type, amount, description, notes, party, date, user_id,
                category_id, created_at, updated_at",
        )?
        .query_row(
            (
                new_transaction.transaction_type,
                new_transaction.amount,
                &new_transaction.description,
                &new_transaction.notes,
                &new_transaction.party,
                new_transaction.date,
                new_transaction.user_id.as_i64(),
                new_transaction.category_id,
                now,
            ),
            map_transaction_row,
        )
        .map_err(|error| map_foreign_key_error(error, new_transaction.category_id))
}

/// Retrieve a transaction by its ID.
///
/// # Errors
/// Returns [Error::NotFound] if there is no transaction with `id`.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(
            "SELECT id, transaction_type, amount, description, notes, party, date, user_id,
                category_id, created_at, updated_at
             FROM \"transaction\" WHERE id = ?1",
        )?
        .query_row([id], map_transaction_row)
        .map_err(Error::from)
}

/// Replace the fields of the transaction `id` with `update`.
///
/// # Errors
/// This function will return a:
/// - [Error::UpdateMissingTransaction] if there is no transaction with `id`,
/// - [Error::InvalidAmount] if the amount is not greater than zero,
/// - [Error::InvalidCategory] if the category ID does not refer to a category,
/// - [Error::SqlError] if there is some other SQL error.
pub fn update_transaction(
    id: TransactionId,
    update: &NewTransaction,
    connection: &Connection,
) -> Result<(), Error> {
    if update.amount.is_nan() || update.amount <= 0.0 {
        return Err(Error::InvalidAmount(update.amount));
    }

    let rows_affected = connection
        .execute(
            "UPDATE \"transaction\"
             SET transaction_type = ?1, amount = ?2, description = ?3, notes = ?4, party = ?5,
                date = ?6, user_id = ?7, category_id = ?8, updated_at = ?9
             WHERE id = ?10",
            (
                update.transaction_type,
                update.amount,
                &update.description,
                &update.notes,
                &update.party,
                update.date,
                update.user_id.as_i64(),
                update.category_id,
                OffsetDateTime::now_utc(),
                id,
            ),
        )
        .map_err(|error| map_foreign_key_error(error, update.category_id))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingTransaction);
    }

    Ok(())
}

/// Map a database row to a Transaction.
///
/// Expects the columns in the order used by [get_transaction].
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        transaction_type: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        notes: row.get(4)?,
        party: row.get(5)?,
        date: row.get(6)?,
        user_id: UserID::new(row.get(7)?),
        category_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}
