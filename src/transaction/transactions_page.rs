//! The page listing transactions with search filters and pagination.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::{Date, macros::format_description};
use unicode_segmentation::UnicodeSegmentation;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    category::{Category, get_all_categories},
    endpoints::{self, format_endpoint},
    html::{
        FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE,
        TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TAG_BADGE_STYLE, base,
        delete_button, format_currency,
    },
    navigation::NavBar,
    pagination::{PaginationConfig, page_count, pagination_nav},
    role::Permission,
    transaction::{
        TransactionFilter, TransactionPage, TransactionRow, TransactionType, query_transactions,
    },
};

/// The max number of graphemes to display in the transaction table rows before
/// truncating and displaying ellipses.
const MAX_DESCRIPTION_GRAPHEMES: usize = 40;

/// The state needed by the transaction pages and endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The directory receipts are saved in.
    pub upload_dir: PathBuf,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            upload_dir: state.upload_dir.clone(),
            local_timezone: state.local_timezone.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The search parameters in the transactions page's query string.
///
/// Values are kept as text so that a blank or malformed input is ignored
/// instead of rejecting the whole request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
}

fn parse_date(raw_date: Option<&str>) -> Option<Date> {
    raw_date.and_then(|raw_date| {
        Date::parse(raw_date.trim(), format_description!("[year]-[month]-[day]")).ok()
    })
}

impl TransactionsQuery {
    /// The filter described by the query, ignoring values that cannot be parsed.
    ///
    /// A category ID of zero means all categories.
    pub fn to_filter(&self) -> TransactionFilter {
        TransactionFilter {
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|search| !search.is_empty())
                .map(str::to_owned),
            category_id: self
                .category_id
                .as_deref()
                .and_then(|id| id.trim().parse().ok())
                .filter(|id| *id != 0),
            transaction_type: self
                .transaction_type
                .as_deref()
                .and_then(|transaction_type| transaction_type.parse().ok()),
            start_date: parse_date(self.start_date.as_deref()),
            end_date: parse_date(self.end_date.as_deref()),
            user_id: None,
        }
    }

    /// The URL of `page` with the same search parameters.
    fn page_url(&self, page: u64) -> String {
        let query = TransactionsQuery {
            page: Some(page),
            ..self.clone()
        };

        match serde_urlencoded::to_string(&query) {
            Ok(query_string) => format!("{}?{query_string}", endpoints::TRANSACTIONS_VIEW),
            Err(error) => {
                tracing::error!("Could not encode transactions query {query:?}: {error}");
                endpoints::TRANSACTIONS_VIEW.to_owned()
            }
        }
    }
}

fn filter_form(query: &TransactionsQuery, categories: &[Category]) -> Markup {
    let selected_category = query.category_id.as_deref().unwrap_or_default();
    let selected_type = query.transaction_type.as_deref().unwrap_or_default();

    html! {
        form
            method="get"
            action=(endpoints::TRANSACTIONS_VIEW)
            class="grid grid-cols-1 gap-4 w-full md:grid-cols-3 lg:grid-cols-6 items-end"
        {
            div class="lg:col-span-2"
            {
                label for="search" class=(FORM_LABEL_STYLE) { "Search" }
                input
                    type="search"
                    name="search"
                    id="search"
                    placeholder="Description, notes or payee"
                    value=(query.search.as_deref().unwrap_or_default())
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="category_id" class=(FORM_LABEL_STYLE) { "Category" }
                select name="category_id" id="category_id" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" { "All" }
                    @for category in categories {
                        option
                            value=(category.id)
                            selected[selected_category == category.id.to_string()]
                        {
                            (category.name)
                        }
                    }
                }
            }

            div
            {
                label for="transaction_type" class=(FORM_LABEL_STYLE) { "Type" }
                select name="transaction_type" id="transaction_type" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" { "All" }
                    @for transaction_type in [TransactionType::Income, TransactionType::Expense] {
                        option
                            value=(transaction_type.as_str())
                            selected[selected_type == transaction_type.as_str()]
                        {
                            (transaction_type.label())
                        }
                    }
                }
            }

            div
            {
                label for="start_date" class=(FORM_LABEL_STYLE) { "From" }
                input
                    type="date"
                    name="start_date"
                    id="start_date"
                    value=(query.start_date.as_deref().unwrap_or_default())
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div
            {
                label for="end_date" class=(FORM_LABEL_STYLE) { "To" }
                input
                    type="date"
                    name="end_date"
                    id="end_date"
                    value=(query.end_date.as_deref().unwrap_or_default())
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            div class="flex gap-4 items-center"
            {
                button
                    type="submit"
                    class="px-4 py-2 bg-blue-500 text-white rounded hover:bg-blue-600"
                {
                    "Filter"
                }
                a href=(endpoints::TRANSACTIONS_VIEW) class=(LINK_STYLE) { "Clear" }
            }
        }
    }
}

/// Truncate long descriptions, returning the full text as the title when truncated.
fn truncate_description(description: &str) -> (String, Option<&str>) {
    if description.graphemes(true).count() <= MAX_DESCRIPTION_GRAPHEMES {
        return (description.to_owned(), None);
    }

    let truncated: String = description
        .graphemes(true)
        .take(MAX_DESCRIPTION_GRAPHEMES - 3)
        .collect();

    (truncated + "...", Some(description))
}

fn transaction_row_view(row: &TransactionRow, user: &CurrentUser, show_owner: bool) -> Markup {
    let can_edit = user.can(Permission::Update) && user.can_access(row.user_id);
    let can_delete = user.can(Permission::Delete) && user.can_access(row.user_id);
    let (amount_style, sign) = match row.transaction_type {
        TransactionType::Income => ("text-green-600 dark:text-green-400", "+"),
        TransactionType::Expense => ("text-red-600 dark:text-red-400", "-"),
    };
    let (description, full_description) = truncate_description(&row.description);

    html! {
        tr class=(TABLE_ROW_STYLE)
        {
            td class=(TABLE_CELL_STYLE) { (row.date) }
            td class=(TABLE_CELL_STYLE)
            {
                div class="font-medium text-gray-900 dark:text-white" title=[full_description] { (description) }
                @if let Some(party) = &row.party {
                    div class="text-xs" { (party) }
                }
                @if !row.tags.is_empty() {
                    div class="flex flex-wrap gap-1 mt-1"
                    {
                        @for tag in &row.tags {
                            span class=(TAG_BADGE_STYLE) { (tag) }
                        }
                    }
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                span
                    class="inline-block w-3 h-3 rounded-full me-2 align-middle"
                    style={ "background-color: " (row.category_color) }
                {}
                (row.category_name)
            }
            td class={ (TABLE_CELL_STYLE) " text-right " (amount_style) }
            {
                (sign) (format_currency(row.amount))
            }
            @if show_owner {
                td class=(TABLE_CELL_STYLE) { (row.username) }
            }
            td class=(TABLE_CELL_STYLE)
            {
                @if row.receipt_count > 0 {
                    (row.receipt_count)
                }
            }
            td class=(TABLE_CELL_STYLE)
            {
                div class="flex gap-4"
                {
                    @if can_edit {
                        a
                            href=(format_endpoint(endpoints::EDIT_TRANSACTION_VIEW, row.id))
                            class=(LINK_STYLE)
                        {
                            "Edit"
                        }
                    }
                    @if can_delete {
                        (delete_button(
                            &format_endpoint(endpoints::TRANSACTION, row.id),
                            &format!(
                                "Are you sure you want to delete '{}'? Its receipts will be deleted too.",
                                row.description
                            ),
                            "closest tr",
                        ))
                    }
                }
            }
        }
    }
}

fn transactions_view(
    user: &CurrentUser,
    query: &TransactionsQuery,
    categories: &[Category],
    transaction_page: &TransactionPage,
    curr_page: u64,
    pagination_config: &PaginationConfig,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW, user).into_html();
    let show_owner = user.can(Permission::ManageUsers);
    let mut headings = vec!["Date", "Description", "Category", "Amount"];
    if show_owner {
        headings.push("User");
    }
    headings.extend(["Receipts", "Actions"]);

    let page_count = page_count(transaction_page.total, pagination_config.page_size);

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-6xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Transactions" }

                    @if user.can(Permission::Create) {
                        a href=(endpoints::NEW_TRANSACTION_VIEW) class=(LINK_STYLE) { "Add Transaction" }
                    }
                }

                (filter_form(query, categories))

                p class="text-sm text-gray-500 dark:text-gray-400"
                {
                    (transaction_page.total) " transactions found"
                }

                div class="w-full overflow-x-auto"
                {
                    table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                @for heading in &headings {
                                    th scope="col" class=(TABLE_CELL_STYLE) { (heading) }
                                }
                            }
                        }

                        tbody
                        {
                            @for row in &transaction_page.rows {
                                (transaction_row_view(row, user, show_owner))
                            }

                            @if transaction_page.rows.is_empty() {
                                tr class=(TABLE_ROW_STYLE)
                                {
                                    td colspan=(headings.len()) class={ (TABLE_CELL_STYLE) " text-center" }
                                    {
                                        "No transactions found."
                                    }
                                }
                            }
                        }
                    }
                }

                (pagination_nav(curr_page, page_count, pagination_config.max_pages, |page| {
                    query.page_url(page)
                }))
            }
        }
    };

    base("Transactions", &content)
}

/// Display a page of the transactions the user may see that match the search filters.
pub async fn get_transactions_page(
    State(state): State<TransactionState>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<TransactionsQuery>,
) -> Response {
    if let Err(error) = user.require(Permission::Read) {
        return error.into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let curr_page = query
        .page
        .unwrap_or(state.pagination_config.default_page)
        .max(1);
    let filter = query.to_filter();

    let transaction_page = match query_transactions(
        &filter,
        user.transaction_scope(),
        curr_page,
        state.pagination_config.page_size,
        &connection,
    ) {
        Ok(transaction_page) => transaction_page,
        Err(error) => {
            tracing::error!("Could not query transactions with {filter:?}: {error}");
            return error.into_response();
        }
    };

    let categories = match get_all_categories(&connection) {
        Ok(categories) => categories,
        Err(error) => {
            tracing::error!("Could not get categories: {error}");
            return error.into_response();
        }
    };

    transactions_view(
        &user,
        &query,
        &categories,
        &transaction_page,
        curr_page,
        &state.pagination_config,
    )
    .into_response()
}

#[cfg(test)]
mod transactions_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Query, State},
    };
    use rusqlite::Connection;
    use scraper::Selector;
    use time::macros::date;
    use unicode_segmentation::UnicodeSegmentation;

    use crate::{
        auth::CurrentUser,
        category::get_all_categories,
        pagination::PaginationConfig,
        test_utils::{
            assert_status_ok, assert_valid_html, insert_test_user, parse_html_document,
            seeded_connection,
        },
        transaction::{NewTransaction, TransactionType, create_transaction},
        user::User,
    };

    use super::{
        MAX_DESCRIPTION_GRAPHEMES, TransactionState, TransactionsQuery, get_transactions_page,
    };

    fn insert(user: &User, description: &str, connection: &Connection) {
        create_transaction(
            NewTransaction {
                transaction_type: TransactionType::Expense,
                amount: 5.0,
                description: description.to_owned(),
                notes: None,
                party: None,
                date: date!(2025 - 01 - 01),
                user_id: user.id,
                category_id: get_all_categories(connection).unwrap()[0].id,
            },
            connection,
        )
        .unwrap();
    }

    fn state(connection: Connection, page_size: u64) -> TransactionState {
        TransactionState {
            db_connection: Arc::new(Mutex::new(connection)),
            upload_dir: std::env::temp_dir(),
            local_timezone: "Etc/UTC".to_owned(),
            pagination_config: PaginationConfig {
                page_size,
                ..Default::default()
            },
        }
    }

    fn row_count(html: &scraper::Html) -> usize {
        html.select(&Selector::parse("tbody tr").unwrap()).count()
    }

    #[tokio::test]
    async fn shows_only_own_transactions() {
        let connection = seeded_connection();
        let alice = insert_test_user("alice", "Manager", &connection);
        let bob = insert_test_user("bob", "Manager", &connection);
        insert(&alice, "alice's", &connection);
        insert(&bob, "bob's", &connection);

        let response = get_transactions_page(
            State(state(connection, 20)),
            Extension(CurrentUser::from(&alice)),
            Query(TransactionsQuery::default()),
        )
        .await;

        assert_status_ok(&response);
        let html = parse_html_document(response).await;
        assert_valid_html(&html);
        assert_eq!(row_count(&html), 1);
        let text = html.root_element().text().collect::<String>();
        assert!(text.contains("alice's"));
        assert!(!text.contains("bob's"));
    }

    #[tokio::test]
    async fn viewer_sees_no_edit_or_delete_controls() {
        let connection = seeded_connection();
        let viewer = insert_test_user("vera", "Viewer", &connection);
        insert(&viewer, "imported", &connection);

        let response = get_transactions_page(
            State(state(connection, 20)),
            Extension(CurrentUser::from(&viewer)),
            Query(TransactionsQuery::default()),
        )
        .await;

        let html = parse_html_document(response).await;
        assert_eq!(row_count(&html), 1);
        assert_eq!(
            html.select(&Selector::parse("button[hx-delete]").unwrap()).count(),
            0
        );
        assert_eq!(
            html.select(&Selector::parse("a[href$='/edit']").unwrap()).count(),
            0
        );
    }

    #[tokio::test]
    async fn paginates_results() {
        let connection = seeded_connection();
        let alice = insert_test_user("alice", "Manager", &connection);
        for i in 0..5 {
            insert(&alice, &format!("item {i}"), &connection);
        }

        let response = get_transactions_page(
            State(state(connection, 2)),
            Extension(CurrentUser::from(&alice)),
            Query(TransactionsQuery {
                search: Some("item".to_owned()),
                page: Some(3),
                ..Default::default()
            }),
        )
        .await;

        let html = parse_html_document(response).await;
        assert_eq!(row_count(&html), 1);
        let current_page = html
            .select(&Selector::parse("nav.pagination span[aria-current='page']").unwrap())
            .next()
            .unwrap();
        assert_eq!(current_page.text().collect::<String>(), "3");
        let back_link = html
            .select(&Selector::parse("nav.pagination a").unwrap())
            .next()
            .unwrap();
        assert_eq!(
            back_link.value().attr("href"),
            Some("/transactions?search=item&page=2")
        );
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "🥑".repeat(MAX_DESCRIPTION_GRAPHEMES + 5);

        let (truncated, title) = super::truncate_description(&long);

        assert_eq!(truncated.graphemes(true).count(), MAX_DESCRIPTION_GRAPHEMES);
        assert!(truncated.ends_with("..."));
        assert_eq!(title, Some(long.as_str()));
        assert_eq!(super::truncate_description("Lunch"), ("Lunch".to_owned(), None));
    }

    #[test]
    fn blank_and_malformed_values_are_ignored() {
        let query = TransactionsQuery {
            search: Some("  ".to_owned()),
            category_id: Some("0".to_owned()),
            transaction_type: Some("refund".to_owned()),
            start_date: Some("not a date".to_owned()),
            end_date: Some("2025-02-30".to_owned()),
            page: None,
        };

        assert_eq!(query.to_filter(), Default::default());
    }
}
