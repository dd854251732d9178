//! The spending limit model and its database queries.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{CategoryId, SpendingLimitId},
    user::UserID,
};

/// How often a spending limit resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitPeriod {
    Daily,
    Monthly,
}

impl LimitPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitPeriod::Daily => "daily",
            LimitPeriod::Monthly => "monthly",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LimitPeriod::Daily => "Daily",
            LimitPeriod::Monthly => "Monthly",
        }
    }
}

impl Display for LimitPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(LimitPeriod::Daily),
            "monthly" => Ok(LimitPeriod::Monthly),
            other => Err(format!("\"{other}\" is not a spending limit period")),
        }
    }
}

impl ToSql for LimitPeriod {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LimitPeriod {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: String| FromSqlError::Other(error.into()))
    }
}

/// A cap on how much a user wants to spend per day or month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpendingLimit {
    pub id: SpendingLimitId,
    pub period: LimitPeriod,
    /// The threshold, always greater than zero.
    pub amount: f64,
    /// Only expenses in this category count towards the limit. `None` counts every category.
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    pub user_id: UserID,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// The data needed to create a spending limit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSpendingLimit {
    pub period: LimitPeriod,
    pub amount: f64,
    pub category_id: Option<CategoryId>,
    pub is_active: bool,
    pub user_id: UserID,
}

pub fn create_spending_limit_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS spending_limit (
            id INTEGER PRIMARY KEY,
            period TEXT NOT NULL CHECK (period IN ('daily', 'monthly')),
            amount REAL NOT NULL CHECK (amount > 0),
            category_id INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

const SELECT_SPENDING_LIMIT: &str = "SELECT id, period, amount, category_id, is_active, user_id,
    created_at, updated_at FROM spending_limit";

/// Create a spending limit.
///
/// # Errors
/// This function will return a:
/// - [Error::InvalidAmount] if the amount is not greater than zero,
/// - [Error::InvalidCategory] if the category ID does not refer to a category,
/// - [Error::SqlError] if there is some other SQL error.
pub fn create_spending_limit(
    new_limit: NewSpendingLimit,
    connection: &Connection,
) -> Result<SpendingLimit, Error> {
    if new_limit.amount.is_nan() || new_limit.amount <= 0.0 {
        return Err(Error::InvalidAmount(new_limit.amount));
    }

    let now = OffsetDateTime::now_utc();

    connection
        .execute(
            "INSERT INTO spending_limit (period, amount, category_id, is_active, user_id,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            (
                new_limit.period,
                new_limit.amount,
                new_limit.category_id,
                new_limit.is_active,
                new_limit.user_id.as_i64(),
                now,
            ),
        )
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::InvalidCategory(new_limit.category_id.unwrap_or_default()),
            error => error.into(),
        })?;

    Ok(SpendingLimit {
        id: connection.last_insert_rowid(),
        period: new_limit.period,
        amount: new_limit.amount,
        category_id: new_limit.category_id,
        is_active: new_limit.is_active,
        user_id: new_limit.user_id,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_spending_limit(
    limit_id: SpendingLimitId,
    connection: &Connection,
) -> Result<SpendingLimit, Error> {
    connection
        .prepare(&format!("{SELECT_SPENDING_LIMIT} WHERE id = ?1"))?
        .query_row([limit_id], map_row)
        .map_err(Error::from)
}

/// All of a user's spending limits, oldest first.
pub fn get_spending_limits_for_user(
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<SpendingLimit>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_SPENDING_LIMIT} WHERE user_id = ?1 ORDER BY id ASC"
        ))?
        .query_map([user_id.as_i64()], map_row)?
        .map(|maybe_limit| maybe_limit.map_err(Error::from))
        .collect()
}

/// The user's active limits that apply to exactly `category_id`.
///
/// A `category_id` of `None` selects the limits that cover every category.
pub fn get_active_limits_for_category(
    user_id: UserID,
    category_id: Option<CategoryId>,
    connection: &Connection,
) -> Result<Vec<SpendingLimit>, Error> {
    connection
        .prepare(&format!(
            "{SELECT_SPENDING_LIMIT}
             WHERE user_id = ?1 AND category_id IS ?2 AND is_active = 1
             ORDER BY id ASC"
        ))?
        .query_map((user_id.as_i64(), category_id), map_row)?
        .map(|maybe_limit| maybe_limit.map_err(Error::from))
        .collect()
}

/// Every spending limit, for the backup.
pub fn get_all_spending_limits(connection: &Connection) -> Result<Vec<SpendingLimit>, Error> {
    connection
        .prepare(&format!("{SELECT_SPENDING_LIMIT} ORDER BY id ASC"))?
        .query_map([], map_row)?
        .map(|maybe_limit| maybe_limit.map_err(Error::from))
        .collect()
}

/// Delete a spending limit and return it.
///
/// # Errors
/// Returns [Error::DeleteMissingSpendingLimit] if there is no limit with `limit_id`.
pub fn delete_spending_limit(
    limit_id: SpendingLimitId,
    connection: &Connection,
) -> Result<SpendingLimit, Error> {
    let limit = match get_spending_limit(limit_id, connection) {
        Ok(limit) => limit,
        Err(Error::NotFound) => return Err(Error::DeleteMissingSpendingLimit),
        Err(error) => return Err(error),
    };

    connection.execute("DELETE FROM spending_limit WHERE id = ?1", [limit_id])?;

    Ok(limit)
}

fn map_row(row: &Row) -> Result<SpendingLimit, rusqlite::Error> {
    Ok(SpendingLimit {
        id: row.get(0)?,
        period: row.get(1)?,
        amount: row.get(2)?,
        category_id: row.get(3)?,
        is_active: row.get(4)?,
        user_id: UserID::new(row.get(5)?),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
