//! Database initialization.

use rusqlite::{
    Connection, Transaction as SqlTransaction, TransactionBehavior, functions::FunctionFlags,
};

use crate::{
    Error, audit::create_audit_log_table, category::create_category_table,
    receipt::create_receipt_table, role::create_role_table, settings::create_system_setting_table,
    spending_limit::create_spending_limit_table, tag::create_tag_table,
    transaction::create_transaction_tables, user::create_user_table,
};

/// The SQL function that lowercases text with Unicode case folding.
///
/// SQLite's own `lower` and `LIKE` only fold ASCII letters.
pub const UNICODE_LOWER: &str = "unicode_lower";

/// Register the application's SQL functions on `connection`.
///
/// Functions are not stored in the database file, so every connection needs this.
pub fn register_functions(connection: &Connection) -> Result<(), Error> {
    connection.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |context| {
            let text = context.get::<Option<String>>(0)?;
            Ok(text.map(|text| text.to_lowercase()))
        },
    )?;

    Ok(())
}

/// Register the SQL functions, turn on foreign key enforcement and create the
/// application's tables if they do not exist yet.
///
/// # Errors
/// Returns an [Error::SqlError] if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    register_functions(connection)?;

    // Has no effect inside a transaction, so it must be set first.
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_role_table(&transaction)?;
    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_tag_table(&transaction)?;
    create_transaction_tables(&transaction)?;
    create_receipt_table(&transaction)?;
    create_spending_limit_table(&transaction)?;
    create_audit_log_table(&transaction)?;
    create_system_setting_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}
