//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// The ID of a transaction (an income or expense record).
pub type TransactionId = DatabaseId;
/// The ID of a transaction category.
pub type CategoryId = DatabaseId;
/// The ID of a receipt attached to a transaction.
pub type ReceiptId = DatabaseId;
/// The ID of a spending limit.
pub type SpendingLimitId = DatabaseId;
/// The ID of a role in the role table.
pub type RoleId = DatabaseId;
