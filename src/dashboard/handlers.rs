//! The dashboard page and the JSON statistics endpoint.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Json,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    dashboard::stats::{
        DashboardStats, SpendingLimitAlert, get_dashboard_stats, get_exceeded_limits,
    },
    endpoints,
    html::{
        CARD_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE,
        TABLE_ROW_STYLE, base, format_currency,
    },
    navigation::NavBar,
    role::Permission,
    timezone::local_today,
    transaction::TransactionType,
};

/// The state needed for displaying the dashboard.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

fn stat_card(label: &str, value: &str) -> Markup {
    html! {
        div class=(CARD_STYLE)
        {
            p class="text-sm text-gray-500 dark:text-gray-400" { (label) }
            p class="text-2xl font-semibold" { (value) }
        }
    }
}

fn alerts_view(alerts: &[SpendingLimitAlert]) -> Markup {
    html! {
        @if !alerts.is_empty() {
            section class="w-full space-y-2"
            {
                @for alert in alerts {
                    div
                        role="alert"
                        class="p-4 text-red-800 rounded-lg bg-red-50 dark:bg-gray-800 \
                            dark:text-red-400 border border-red-300 dark:border-red-800"
                    {
                        span class="font-semibold"
                        {
                            (alert.limit.period.label()) " limit exceeded"
                            @if let Some(category_name) = &alert.category_name {
                                " for " (category_name)
                            }
                        }
                        ": spent "
                        (format_currency(alert.status.spent))
                        " of "
                        (format_currency(alert.limit.amount))
                        " (" (format!("{:.0}", alert.status.percentage)) "%)"
                    }
                }
            }
        }
    }
}

fn recent_transactions_view(stats: &DashboardStats) -> Markup {
    html! {
        section class="w-full space-y-2"
        {
            div class="flex justify-between items-baseline"
            {
                h2 class="text-lg font-semibold" { "Recent Transactions" }
                a href=(endpoints::TRANSACTIONS_VIEW) class=(LINK_STYLE) { "View all" }
            }

            @if stats.recent_transactions.is_empty() {
                p class="text-gray-500 dark:text-gray-400"
                {
                    "Nothing here yet. "
                    a href=(endpoints::NEW_TRANSACTION_VIEW) class=(LINK_STYLE) { "Add a transaction" }
                    " to get started."
                }
            } @else {
                table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Date" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Description" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Amount" }
                        }
                    }

                    tbody
                    {
                        @for transaction in &stats.recent_transactions {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td class=(TABLE_CELL_STYLE) { (transaction.date) }
                                td class=(TABLE_CELL_STYLE) { (transaction.description) }
                                td class=(TABLE_CELL_STYLE) { (transaction.category) }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    @if transaction.transaction_type == TransactionType::Expense {
                                        "-"
                                    }
                                    (format_currency(transaction.amount))
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn dashboard_view(
    user: &CurrentUser,
    stats: &DashboardStats,
    alerts: &[SpendingLimitAlert],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::DASHBOARD_VIEW, user).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full lg:max-w-5xl space-y-6"
            {
                h1 class="text-xl font-bold" { "Dashboard" }

                (alerts_view(alerts))

                section class="grid grid-cols-1 sm:grid-cols-2 lg:grid-cols-3 gap-4"
                {
                    (stat_card("Income this month", &format_currency(stats.month_income)))
                    (stat_card("Expenses this month", &format_currency(stats.month_expenses)))
                    (stat_card("Net this month", &format_currency(stats.month_net)))
                    (stat_card("Transactions", &stats.total_transactions.to_string()))
                    @if user.can(Permission::ManageUsers) {
                        (stat_card("Active users", &stats.total_users.to_string()))
                    }
                }

                (recent_transactions_view(stats))
            }
        }
    };

    base("Dashboard", &content)
}

/// Display the current month's totals, recent transactions and exceeded spending limits.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    user.require(Permission::Read)?;
    let today = local_today(&state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let stats = get_dashboard_stats(user.transaction_scope(), today, &connection)
        .inspect_err(|error| tracing::error!("could not get dashboard stats: {error}"))?;
    let alerts = get_exceeded_limits(user.id, today, &connection)
        .inspect_err(|error| tracing::error!("could not check spending limits: {error}"))?;

    Ok(dashboard_view(&user, &stats, &alerts).into_response())
}

/// The dashboard statistics as JSON.
pub async fn get_dashboard_stats_api(
    State(state): State<DashboardState>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    if let Err(error) = user.require(Permission::Read) {
        return error.into_json_response();
    }

    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => return error.into_json_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_json_response();
        }
    };

    match get_dashboard_stats(user.transaction_scope(), today, &connection) {
        Ok(stats) => Json(stats).into_response(),
        Err(error) => {
            tracing::error!("could not get dashboard stats: {error}");
            error.into_json_response()
        }
    }
}
