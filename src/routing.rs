//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    response::Redirect,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use crate::{
    AppState,
    auth::{auth_guard, auth_guard_hx, get_log_in_page, get_log_out, post_log_in},
    backup::get_backup,
    category::{create_category_endpoint, delete_category_endpoint},
    dashboard::{get_dashboard_page, get_dashboard_stats_api},
    endpoints,
    internal_server_error::get_internal_server_error_page,
    not_found::get_404_not_found,
    receipt::{delete_receipt_endpoint, get_receipt_file},
    report::{generate_report_endpoint, get_reports_page},
    settings::{get_settings_page, update_setting_endpoint},
    spending_limit::{
        create_spending_limit_endpoint, delete_spending_limit_endpoint, get_spending_check,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_edit_transaction_page,
        get_new_transaction_page, get_transactions_page, update_transaction_endpoint,
    },
    user::{
        change_password_endpoint, create_user_endpoint, deactivate_user_endpoint,
        get_edit_user_page, get_new_user_page, get_profile_page, get_users_page,
        update_profile_endpoint, update_user_endpoint,
    },
};

/// The largest request body the server accepts, which bounds receipt uploads.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN_VIEW, get(get_log_in_page))
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(
            endpoints::INTERNAL_ERROR_VIEW,
            get(get_internal_server_error_page),
        );

    let protected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::DASHBOARD_VIEW, get(get_dashboard_page))
        .route(endpoints::TRANSACTIONS_VIEW, get(get_transactions_page))
        .route(endpoints::NEW_TRANSACTION_VIEW, get(get_new_transaction_page))
        .route(
            endpoints::EDIT_TRANSACTION_VIEW,
            get(get_edit_transaction_page),
        )
        .route(
            endpoints::REPORTS_VIEW,
            get(get_reports_page).post(generate_report_endpoint),
        )
        .route(endpoints::USERS_VIEW, get(get_users_page))
        .route(endpoints::NEW_USER_VIEW, get(get_new_user_page))
        .route(endpoints::EDIT_USER_VIEW, get(get_edit_user_page))
        .route(endpoints::PROFILE_VIEW, get(get_profile_page))
        .route(endpoints::SETTINGS_VIEW, get(get_settings_page))
        .route(endpoints::BACKUP, get(get_backup))
        .route(endpoints::RECEIPT, get(get_receipt_file))
        .route(endpoints::DASHBOARD_STATS_API, get(get_dashboard_stats_api))
        .route(endpoints::SPENDING_CHECK_API, get(get_spending_check))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    // These POST/PUT/DELETE routes need to use the HX-REDIRECT header for auth redirects to work properly for HTMX requests.
    let protected_routes = protected_routes.merge(
        Router::new()
            .route(
                endpoints::TRANSACTIONS_API,
                post(create_transaction_endpoint),
            )
            .route(
                endpoints::TRANSACTION,
                put(update_transaction_endpoint).delete(delete_transaction_endpoint),
            )
            .route(endpoints::DELETE_RECEIPT, delete(delete_receipt_endpoint))
            .route(endpoints::CATEGORIES_API, post(create_category_endpoint))
            .route(endpoints::CATEGORY, delete(delete_category_endpoint))
            .route(
                endpoints::SPENDING_LIMITS_API,
                post(create_spending_limit_endpoint),
            )
            .route(
                endpoints::SPENDING_LIMIT,
                delete(delete_spending_limit_endpoint),
            )
            .route(endpoints::SETTINGS_API, post(update_setting_endpoint))
            .route(endpoints::USERS_API, post(create_user_endpoint))
            .route(endpoints::USER, put(update_user_endpoint))
            .route(endpoints::DEACTIVATE_USER, post(deactivate_user_endpoint))
            .route(endpoints::PROFILE_API, put(update_profile_endpoint))
            .route(endpoints::CHANGE_PASSWORD_API, put(change_password_endpoint))
            .layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
    );

    protected_routes
        .merge(unprotected_routes)
        .nest_service(endpoints::STATIC, ServeDir::new("static/"))
        .fallback(get_404_not_found)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// The root path '/' redirects to the dashboard page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::DASHBOARD_VIEW)
}
