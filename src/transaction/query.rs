//! The filtered and paged view over transactions used by the transactions
//! page, the reports and the backup.

use rusqlite::{Connection, Row, types::Value};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{CategoryId, TransactionId},
    db::UNICODE_LOWER,
    pagination::page_offset,
    transaction::{TransactionScope, TransactionType},
    user::UserID,
};

/// Optional search parameters for transactions. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Matched case-insensitively against the description, notes and party.
    pub search: Option<String>,
    pub category_id: Option<CategoryId>,
    pub transaction_type: Option<TransactionType>,
    /// Inclusive.
    pub start_date: Option<Date>,
    /// Inclusive.
    pub end_date: Option<Date>,
    /// Only honoured when the scope already allows every user's transactions.
    pub user_id: Option<UserID>,
}

/// A transaction with the names of the rows it refers to.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub id: TransactionId,
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub description: String,
    pub notes: Option<String>,
    pub party: Option<String>,
    pub date: Date,
    pub created_at: OffsetDateTime,
    pub user_id: UserID,
    pub username: String,
    pub category_id: CategoryId,
    pub category_name: String,
    pub category_color: String,
    /// Sorted by name.
    pub tags: Vec<String>,
    pub receipt_count: u64,
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionPage {
    pub rows: Vec<TransactionRow>,
    /// The number of transactions that match the filter across all pages.
    pub total: u64,
}

const SELECT_ROWS: &str = "SELECT t.id, t.transaction_type, t.amount, t.description, t.notes,
        t.party, t.date, t.created_at, t.user_id, user.username, t.category_id, category.name,
        category.color,
        (SELECT group_concat(tag.name, ',') FROM transaction_tag
            INNER JOIN tag ON tag.id = transaction_tag.tag_id
            WHERE transaction_tag.transaction_id = t.id),
        (SELECT COUNT(receipt.id) FROM receipt WHERE receipt.transaction_id = t.id)
    FROM \"transaction\" t
    INNER JOIN user ON user.id = t.user_id
    INNER JOIN category ON category.id = t.category_id";

const ORDER_BY: &str = "ORDER BY t.date DESC, t.created_at DESC, t.id DESC";

/// Escape the LIKE wildcards in `term` so they match literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());

    for character in term.chars() {
        if matches!(character, '\\' | '%' | '_') {
            escaped.push('\\');
        }

        escaped.push(character);
    }

    escaped
}

/// Build the WHERE clause and its parameters for `filter` within `scope`.
///
/// The ownership condition comes from `scope` alone, so no filter value can
/// widen the result to other users' transactions.
fn where_clause(filter: &TransactionFilter, scope: TransactionScope) -> (String, Vec<Value>) {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    match scope {
        TransactionScope::OwnedBy(user_id) => {
            params.push(Value::Integer(user_id.as_i64()));
            conditions.push(format!("t.user_id = ?{}", params.len()));
        }
        TransactionScope::AllUsers => {
            if let Some(user_id) = filter.user_id {
                params.push(Value::Integer(user_id.as_i64()));
                conditions.push(format!("t.user_id = ?{}", params.len()));
            }
        }
    }

    if let Some(search) = filter.search.as_deref().map(str::trim)
        && !search.is_empty()
    {
        params.push(Value::Text(format!(
            "%{}%",
            escape_like(&search.to_lowercase())
        )));
        let index = params.len();
        conditions.push(format!(
            "({UNICODE_LOWER}(t.description) LIKE ?{index} ESCAPE '\\' \
            OR {UNICODE_LOWER}(t.notes) LIKE ?{index} ESCAPE '\\' \
            OR {UNICODE_LOWER}(t.party) LIKE ?{index} ESCAPE '\\')"
        ));
    }

    if let Some(category_id) = filter.category_id {
        params.push(Value::Integer(category_id));
        conditions.push(format!("t.category_id = ?{}", params.len()));
    }

    if let Some(transaction_type) = filter.transaction_type {
        params.push(Value::Text(transaction_type.as_str().to_owned()));
        conditions.push(format!("t.transaction_type = ?{}", params.len()));
    }

    if let Some(start_date) = filter.start_date {
        params.push(Value::Text(start_date.to_string()));
        conditions.push(format!("t.date >= ?{}", params.len()));
    }

    if let Some(end_date) = filter.end_date {
        params.push(Value::Text(end_date.to_string()));
        conditions.push(format!("t.date <= ?{}", params.len()));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!("WHERE {}", conditions.join(" AND ")), params)
    }
}

/// Get the page `page` (1-based) of transactions matching `filter` that are visible in `scope`.
///
/// Pages past the end are empty rather than an error.
pub fn query_transactions(
    filter: &TransactionFilter,
    scope: TransactionScope,
    page: u64,
    page_size: u64,
    connection: &Connection,
) -> Result<TransactionPage, Error> {
    let (where_clause, mut params) = where_clause(filter, scope);

    let total: i64 = connection.query_row(
        &format!("SELECT COUNT(t.id) FROM \"transaction\" t {where_clause}"),
        rusqlite::params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    params.push(Value::Integer(page_size as i64));
    let limit_index = params.len();
    params.push(Value::Integer(page_offset(page, page_size) as i64));
    let offset_index = params.len();

    let rows = connection
        .prepare(&format!(
            "{SELECT_ROWS} {where_clause} {ORDER_BY} LIMIT ?{limit_index} OFFSET ?{offset_index}"
        ))?
        .query_map(rusqlite::params_from_iter(params.iter()), map_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TransactionPage {
        rows,
        total: total as u64,
    })
}

/// Get every transaction matching `filter` that is visible in `scope`, newest first.
pub fn query_all_transactions(
    filter: &TransactionFilter,
    scope: TransactionScope,
    connection: &Connection,
) -> Result<Vec<TransactionRow>, Error> {
    let (where_clause, params) = where_clause(filter, scope);

    connection
        .prepare(&format!("{SELECT_ROWS} {where_clause} {ORDER_BY}"))?
        .query_map(rusqlite::params_from_iter(params.iter()), map_row)?
        .map(|maybe_row| maybe_row.map_err(Error::from))
        .collect()
}

fn map_row(row: &Row) -> Result<TransactionRow, rusqlite::Error> {
    let mut tags: Vec<String> = row
        .get::<_, Option<String>>(13)?
        .map(|tags| tags.split(',').map(str::to_owned).collect())
        .unwrap_or_default();
    tags.sort();

    Ok(TransactionRow {
        id: row.get(0)?,
        transaction_type: row.get(1)?,
        amount: row.get(2)?,
        description: row.get(3)?,
        notes: row.get(4)?,
        party: row.get(5)?,
        date: row.get(6)?,
        created_at: row.get(7)?,
        user_id: UserID::new(row.get(8)?),
        username: row.get(9)?,
        category_id: row.get(10)?,
        category_name: row.get(11)?,
        category_color: row.get(12)?,
        tags,
        receipt_count: row.get::<_, i64>(14)? as u64,
    })
}

#[cfg(test)]
mod query_tests {
    use rusqlite::Connection;
    use time::{Date, macros::date};

    use crate::{
        category::get_all_categories,
        tag::{TagName, set_transaction_tags},
        test_utils::{insert_test_user, seeded_connection},
        transaction::{
            NewTransaction, Transaction, TransactionScope, TransactionType, create_transaction,
        },
        user::User,
    };

    use super::{TransactionFilter, escape_like, query_all_transactions, query_transactions};

    fn insert(
        user: &User,
        description: &str,
        transaction_type: TransactionType,
        date: Date,
        connection: &Connection,
    ) -> Transaction {
        create_transaction(
            NewTransaction {
                transaction_type,
                amount: 10.0,
                description: description.to_owned(),
                notes: None,
                party: None,
                date,
                user_id: user.id,
                category_id: get_all_categories(connection).unwrap()[0].id,
            },
            connection,
        )
        .unwrap()
    }

    fn descriptions(rows: &[super::TransactionRow]) -> Vec<&str> {
        rows.iter().map(|row| row.description.as_str()).collect()
    }

    #[test]
    fn owners_only_see_their_own_transactions() {
        let connection = seeded_connection();
        let alice = insert_test_user("alice", "Manager", &connection);
        let bob = insert_test_user("bob", "Manager", &connection);
        insert(&alice, "alice lunch", TransactionType::Expense, date!(2025 - 01 - 01), &connection);
        insert(&bob, "bob lunch", TransactionType::Expense, date!(2025 - 01 - 01), &connection);

        let filters = [
            TransactionFilter::default(),
            TransactionFilter {
                search: Some("bob".to_owned()),
                ..Default::default()
            },
            TransactionFilter {
                user_id: Some(bob.id),
                ..Default::default()
            },
            TransactionFilter {
                transaction_type: Some(TransactionType::Expense),
                start_date: Some(date!(2024 - 01 - 01)),
                ..Default::default()
            },
        ];

        for filter in filters {
            let rows =
                query_all_transactions(&filter, TransactionScope::OwnedBy(alice.id), &connection)
                    .unwrap();

            assert!(
                rows.iter().all(|row| row.user_id == alice.id),
                "filter {filter:?} returned another user's transaction"
            );
        }
    }

    #[test]
    fn admins_can_filter_by_user() {
        let connection = seeded_connection();
        let alice = insert_test_user("alice", "Admin", &connection);
        let bob = insert_test_user("bob", "Manager", &connection);
        insert(&alice, "alice lunch", TransactionType::Expense, date!(2025 - 01 - 01), &connection);
        insert(&bob, "bob lunch", TransactionType::Expense, date!(2025 - 01 - 01), &connection);

        let everyone = query_all_transactions(
            &TransactionFilter::default(),
            TransactionScope::AllUsers,
            &connection,
        )
        .unwrap();
        let only_bob = query_all_transactions(
            &TransactionFilter {
                user_id: Some(bob.id),
                ..Default::default()
            },
            TransactionScope::AllUsers,
            &connection,
        )
        .unwrap();

        assert_eq!(everyone.len(), 2);
        assert_eq!(descriptions(&only_bob), ["bob lunch"]);
        assert_eq!(only_bob[0].username, "bob");
    }

    #[test]
    fn search_ignores_case_of_non_ascii_letters() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        insert(&user, "Café Über", TransactionType::Expense, date!(2025 - 01 - 01), &connection);
        insert(&user, "Cafe", TransactionType::Expense, date!(2025 - 01 - 01), &connection);

        for term in ["CAFÉ", "über", "ÜBER"] {
            let rows = query_all_transactions(
                &TransactionFilter {
                    search: Some(term.to_owned()),
                    ..Default::default()
                },
                TransactionScope::OwnedBy(user.id),
                &connection,
            )
            .unwrap();

            assert_eq!(descriptions(&rows), ["Café Über"], "searched for {term:?}");
        }
    }

    #[test]
    fn search_matches_description_notes_and_party() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let category_id = get_all_categories(&connection).unwrap()[0].id;
        for (description, notes, party) in [
            ("Coffee", None, None),
            ("Lunch", Some("with COFFEE"), None),
            ("Beans", None, Some("Coffee Roasters")),
            ("Rent", None, None),
        ] {
            create_transaction(
                NewTransaction {
                    transaction_type: TransactionType::Expense,
                    amount: 1.0,
                    description: description.to_owned(),
                    notes: notes.map(str::to_owned),
                    party: party.map(str::to_owned),
                    date: date!(2025 - 01 - 01),
                    user_id: user.id,
                    category_id,
                },
                &connection,
            )
            .unwrap();
        }

        let rows = query_all_transactions(
            &TransactionFilter {
                search: Some("coffee".to_owned()),
                ..Default::default()
            },
            TransactionScope::OwnedBy(user.id),
            &connection,
        )
        .unwrap();

        let mut got = descriptions(&rows);
        got.sort();
        assert_eq!(got, ["Beans", "Coffee", "Lunch"]);
    }

    #[test]
    fn wildcards_in_search_match_literally() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        insert(&user, "100% juice", TransactionType::Expense, date!(2025 - 01 - 01), &connection);
        insert(&user, "100 apples", TransactionType::Expense, date!(2025 - 01 - 01), &connection);
        insert(&user, "snake_case", TransactionType::Expense, date!(2025 - 01 - 01), &connection);
        insert(&user, "snakeXcase", TransactionType::Expense, date!(2025 - 01 - 01), &connection);

        let search = |term: &str| {
            query_all_transactions(
                &TransactionFilter {
                    search: Some(term.to_owned()),
                    ..Default::default()
                },
                TransactionScope::OwnedBy(user.id),
                &connection,
            )
            .unwrap()
        };

        assert_eq!(descriptions(&search("100%")), ["100% juice"]);
        assert_eq!(descriptions(&search("e_c")), ["snake_case"]);
        assert_eq!(escape_like(r"50%_\"), r"50\%\_\\");
    }

    #[test]
    fn filters_by_type_category_and_inclusive_dates() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        insert(&user, "before", TransactionType::Expense, date!(2025 - 01 - 31), &connection);
        insert(&user, "first", TransactionType::Expense, date!(2025 - 02 - 01), &connection);
        insert(&user, "income", TransactionType::Income, date!(2025 - 02 - 10), &connection);
        insert(&user, "last", TransactionType::Expense, date!(2025 - 02 - 28), &connection);
        insert(&user, "after", TransactionType::Expense, date!(2025 - 03 - 01), &connection);

        let rows = query_all_transactions(
            &TransactionFilter {
                transaction_type: Some(TransactionType::Expense),
                start_date: Some(date!(2025 - 02 - 01)),
                end_date: Some(date!(2025 - 02 - 28)),
                category_id: Some(get_all_categories(&connection).unwrap()[0].id),
                ..Default::default()
            },
            TransactionScope::OwnedBy(user.id),
            &connection,
        )
        .unwrap();

        assert_eq!(descriptions(&rows), ["last", "first"]);
    }

    #[test]
    fn orders_by_date_then_newest_first() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        insert(&user, "old", TransactionType::Expense, date!(2025 - 01 - 01), &connection);
        insert(&user, "new a", TransactionType::Expense, date!(2025 - 02 - 01), &connection);
        insert(&user, "new b", TransactionType::Expense, date!(2025 - 02 - 01), &connection);

        let rows = query_all_transactions(
            &TransactionFilter::default(),
            TransactionScope::OwnedBy(user.id),
            &connection,
        )
        .unwrap();

        assert_eq!(descriptions(&rows), ["new b", "new a", "old"]);
    }

    #[test]
    fn pages_and_counts_results() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        for day in 1..=5 {
            insert(
                &user,
                &format!("day {day}"),
                TransactionType::Expense,
                Date::from_calendar_date(2025, time::Month::January, day).unwrap(),
                &connection,
            );
        }
        let scope = TransactionScope::OwnedBy(user.id);
        let filter = TransactionFilter::default();

        let second_page = query_transactions(&filter, scope, 2, 2, &connection).unwrap();
        let past_the_end = query_transactions(&filter, scope, 10, 2, &connection).unwrap();

        assert_eq!(second_page.total, 5);
        assert_eq!(descriptions(&second_page.rows), ["day 3", "day 2"]);
        assert!(past_the_end.rows.is_empty());
        assert_eq!(past_the_end.total, 5);
    }

    #[test]
    fn rows_include_tags_and_category() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let transaction = insert(
            &user,
            "groceries",
            TransactionType::Expense,
            date!(2025 - 01 - 01),
            &connection,
        );
        set_transaction_tags(
            transaction.id,
            &[TagName::new("weekly").unwrap(), TagName::new("food").unwrap()],
            &connection,
        )
        .unwrap();

        let rows = query_all_transactions(
            &TransactionFilter::default(),
            TransactionScope::OwnedBy(user.id),
            &connection,
        )
        .unwrap();

        let category = &get_all_categories(&connection).unwrap()[0];
        assert_eq!(rows[0].tags, ["food", "weekly"]);
        assert_eq!(rows[0].category_name, category.name);
        assert_eq!(rows[0].category_color, category.color);
        assert_eq!(rows[0].receipt_count, 0);
    }
}
