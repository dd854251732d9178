//! Compares what a user has spent in the current period against their limits.

use rusqlite::Connection;
use serde::Serialize;
use time::Date;

use crate::{
    Error,
    spending_limit::{LimitPeriod, SpendingLimit},
};

/// The fraction of a limit above which a warning is raised.
pub const WARNING_RATIO: f64 = 0.8;

/// The first day of the period containing `today`.
pub fn period_start(period: LimitPeriod, today: Date) -> Date {
    match period {
        LimitPeriod::Daily => today,
        LimitPeriod::Monthly => today.replace_day(1).unwrap_or(today),
    }
}

/// The total of the limit owner's expenses from the start of the current
/// period, restricted to the limit's category if it has one.
pub fn get_spent_amount(
    limit: &SpendingLimit,
    today: Date,
    connection: &Connection,
) -> Result<f64, Error> {
    let since = period_start(limit.period, today);

    connection
        .query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM \"transaction\"
             WHERE user_id = ?1
                AND transaction_type = 'expense'
                AND date >= ?2
                AND (?3 IS NULL OR category_id = ?3)",
            (limit.user_id.as_i64(), since, limit.category_id),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// How much of a limit has been used in the current period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitStatus {
    pub spent: f64,
    /// `spent` as a percentage of the limit's amount.
    pub percentage: f64,
    /// Spending is over the limit.
    pub is_exceeded: bool,
    /// Spending is over [WARNING_RATIO] of the limit.
    pub is_warning: bool,
}

impl LimitStatus {
    pub fn new(limit: &SpendingLimit, spent: f64) -> Self {
        Self {
            spent,
            percentage: spent / limit.amount * 100.0,
            is_exceeded: spent > limit.amount,
            is_warning: spent > limit.amount * WARNING_RATIO,
        }
    }
}

/// Sum the spending for `limit` and compare it to the threshold.
pub fn evaluate_limit(
    limit: &SpendingLimit,
    today: Date,
    connection: &Connection,
) -> Result<LimitStatus, Error> {
    let spent = get_spent_amount(limit, today, connection)?;

    Ok(LimitStatus::new(limit, spent))
}

#[cfg(test)]
mod evaluator_tests {
    use rusqlite::Connection;
    use time::{Date, macros::date};

    use crate::{
        category::get_all_categories,
        database_id::CategoryId,
        spending_limit::{LimitPeriod, NewSpendingLimit, SpendingLimit, create_spending_limit},
        test_utils::{insert_test_user, seeded_connection},
        transaction::{NewTransaction, TransactionType, create_transaction},
        user::UserID,
    };

    use super::{evaluate_limit, get_spent_amount, period_start};

    const TODAY: Date = date!(2025 - 03 - 20);

    fn record(
        user_id: UserID,
        transaction_type: TransactionType,
        amount: f64,
        date: Date,
        category_id: CategoryId,
        connection: &Connection,
    ) {
        create_transaction(
            NewTransaction {
                transaction_type,
                amount,
                description: "test".to_owned(),
                notes: None,
                party: None,
                date,
                user_id,
                category_id,
            },
            connection,
        )
        .unwrap();
    }

    fn limit(
        user_id: UserID,
        period: LimitPeriod,
        category_id: Option<CategoryId>,
        connection: &Connection,
    ) -> SpendingLimit {
        create_spending_limit(
            NewSpendingLimit {
                period,
                amount: 100.0,
                category_id,
                is_active: true,
                user_id,
            },
            connection,
        )
        .unwrap()
    }

    #[test]
    fn period_starts() {
        assert_eq!(period_start(LimitPeriod::Daily, TODAY), TODAY);
        assert_eq!(
            period_start(LimitPeriod::Monthly, TODAY),
            date!(2025 - 03 - 01)
        );
    }

    #[test]
    fn monthly_limit_is_exceeded() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let category_id = get_all_categories(&connection).unwrap()[0].id;
        let expense = TransactionType::Expense;
        record(user.id, expense, 70.0, date!(2025 - 03 - 01), category_id, &connection);
        record(user.id, expense, 50.0, date!(2025 - 03 - 19), category_id, &connection);
        // Outside the period, or not an expense, so these are not counted.
        record(user.id, expense, 999.0, date!(2025 - 02 - 28), category_id, &connection);
        record(user.id, TransactionType::Income, 500.0, TODAY, category_id, &connection);
        let limit = limit(user.id, LimitPeriod::Monthly, None, &connection);

        let status = evaluate_limit(&limit, TODAY, &connection).unwrap();

        assert_eq!(status.spent, 120.0);
        assert_eq!(status.percentage, 120.0);
        assert!(status.is_exceeded);
        assert!(status.is_warning);
    }

    #[test]
    fn no_spending_is_not_exceeded() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let limit = limit(user.id, LimitPeriod::Monthly, None, &connection);

        let status = evaluate_limit(&limit, TODAY, &connection).unwrap();

        assert_eq!(status.spent, 0.0);
        assert!(!status.is_exceeded);
        assert!(!status.is_warning);
    }

    #[test]
    fn counts_only_the_owners_spending_in_the_limits_category() {
        let connection = seeded_connection();
        let alice = insert_test_user("alice", "Manager", &connection);
        let bob = insert_test_user("bob", "Manager", &connection);
        let categories = get_all_categories(&connection).unwrap();
        let (food, travel) = (categories[0].id, categories[1].id);
        let expense = TransactionType::Expense;
        record(alice.id, expense, 85.0, TODAY, food, &connection);
        record(alice.id, expense, 40.0, TODAY, travel, &connection);
        record(bob.id, expense, 40.0, TODAY, food, &connection);
        let limit = limit(alice.id, LimitPeriod::Daily, Some(food), &connection);

        let status = evaluate_limit(&limit, TODAY, &connection).unwrap();

        assert_eq!(status.spent, 85.0);
        assert!(!status.is_exceeded);
        assert!(status.is_warning);
    }

    #[test]
    fn daily_limit_ignores_earlier_days() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let category_id = get_all_categories(&connection).unwrap()[0].id;
        record(
            user.id,
            TransactionType::Expense,
            150.0,
            date!(2025 - 03 - 19),
            category_id,
            &connection,
        );
        let limit = limit(user.id, LimitPeriod::Daily, None, &connection);

        assert_eq!(get_spent_amount(&limit, TODAY, &connection).unwrap(), 0.0);
    }
}
