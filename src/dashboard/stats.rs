//! The figures shown on the dashboard and returned by the stats API.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use time::{Date, Month};

use crate::{
    Error,
    database_id::TransactionId,
    spending_limit::{LimitStatus, SpendingLimit, evaluate_limit, get_spending_limits_for_user},
    transaction::{TransactionScope, TransactionType},
    user::{UserID, count_active_users},
};

/// How many of the latest transactions the dashboard lists.
pub const RECENT_TRANSACTION_COUNT: u64 = 5;

/// A short form of a transaction for the recent transactions list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentTransaction {
    pub id: TransactionId,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub description: String,
    pub date: String,
    pub category: String,
}

/// Totals for the current month and the ledger as a whole.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub month_income: f64,
    pub month_expenses: f64,
    /// Income minus expenses for the current month.
    pub month_net: f64,
    pub total_transactions: u64,
    pub total_users: u64,
    pub recent_transactions: Vec<RecentTransaction>,
}

/// The first day of the month containing `date` and the first day of the following month.
pub fn month_bounds(date: Date) -> (Date, Date) {
    let start = date.replace_day(1).unwrap_or(date);
    let (year, month) = match date.month() {
        Month::December => (date.year() + 1, Month::January),
        month => (date.year(), month.next()),
    };
    let end = Date::from_calendar_date(year, month, 1).unwrap_or(Date::MAX);

    (start, end)
}

fn scope_owner(scope: TransactionScope) -> Option<i64> {
    match scope {
        TransactionScope::AllUsers => None,
        TransactionScope::OwnedBy(user_id) => Some(user_id.as_i64()),
    }
}

/// Gather the dashboard figures for the transactions visible in `scope`.
///
/// `today` decides which month is the current month.
pub fn get_dashboard_stats(
    scope: TransactionScope,
    today: Date,
    connection: &Connection,
) -> Result<DashboardStats, Error> {
    let owner = scope_owner(scope);
    let (month_start, next_month_start) = month_bounds(today);

    let (month_income, month_expenses): (f64, f64) = connection.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN transaction_type = 'income' THEN amount END), 0),
            COALESCE(SUM(CASE WHEN transaction_type = 'expense' THEN amount END), 0)
         FROM \"transaction\"
         WHERE (?1 IS NULL OR user_id = ?1) AND date >= ?2 AND date < ?3",
        (owner, month_start, next_month_start),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let total_transactions: i64 = connection.query_row(
        "SELECT COUNT(id) FROM \"transaction\" WHERE (?1 IS NULL OR user_id = ?1)",
        [owner],
        |row| row.get(0),
    )?;

    let recent_transactions = connection
        .prepare(
            "SELECT t.id, t.transaction_type, t.amount, t.description, t.date, category.name
             FROM \"transaction\" t
             INNER JOIN category ON category.id = t.category_id
             WHERE (?1 IS NULL OR t.user_id = ?1)
             ORDER BY t.created_at DESC, t.id DESC
             LIMIT ?2",
        )?
        .query_map((owner, RECENT_TRANSACTION_COUNT as i64), |row| {
            let date: Date = row.get(4)?;

            Ok(RecentTransaction {
                id: row.get(0)?,
                transaction_type: row.get(1)?,
                amount: row.get(2)?,
                description: row.get(3)?,
                date: date.to_string(),
                category: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DashboardStats {
        month_income,
        month_expenses,
        month_net: month_income - month_expenses,
        total_transactions: total_transactions as u64,
        total_users: count_active_users(connection)?,
        recent_transactions,
    })
}

/// An active limit that has been exceeded in the current period.
#[derive(Debug, Clone, PartialEq)]
pub struct SpendingLimitAlert {
    pub limit: SpendingLimit,
    /// `None` for limits that cover every category.
    pub category_name: Option<String>,
    pub status: LimitStatus,
}

/// The user's active limits that are exceeded as of `today`.
pub fn get_exceeded_limits(
    user_id: UserID,
    today: Date,
    connection: &Connection,
) -> Result<Vec<SpendingLimitAlert>, Error> {
    let mut alerts = Vec::new();

    for limit in get_spending_limits_for_user(user_id, connection)? {
        if !limit.is_active {
            continue;
        }

        let status = evaluate_limit(&limit, today, connection)?;
        if !status.is_exceeded {
            continue;
        }

        let category_name = match limit.category_id {
            Some(category_id) => connection
                .query_row(
                    "SELECT name FROM category WHERE id = ?1",
                    [category_id],
                    |row| row.get(0),
                )
                .optional()?,
            None => None,
        };

        alerts.push(SpendingLimitAlert {
            limit,
            category_name,
            status,
        });
    }

    Ok(alerts)
}
