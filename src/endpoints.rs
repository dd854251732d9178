//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/users/{user_id}/edit', use [format_endpoint].

/// The root route which redirects to the dashboard or log in page.
pub const ROOT: &str = "/";
/// The landing page for logged in users.
pub const DASHBOARD_VIEW: &str = "/dashboard";
/// The page listing transactions with search filters.
pub const TRANSACTIONS_VIEW: &str = "/transactions";
/// The page for recording a new transaction.
pub const NEW_TRANSACTION_VIEW: &str = "/transactions/new";
/// The page for editing an existing transaction.
pub const EDIT_TRANSACTION_VIEW: &str = "/transactions/{transaction_id}/edit";
/// The report form page, also accepts the form submission that returns the document.
pub const REPORTS_VIEW: &str = "/reports";
/// The page listing all users.
pub const USERS_VIEW: &str = "/users";
/// The page for registering a new user.
pub const NEW_USER_VIEW: &str = "/users/new";
/// The page for editing a user.
pub const EDIT_USER_VIEW: &str = "/users/{user_id}/edit";
/// The page for editing the current user's profile and password.
pub const PROFILE_VIEW: &str = "/profile";
/// The page for managing categories, spending limits and system settings.
pub const SETTINGS_VIEW: &str = "/settings";
/// The route for downloading a JSON backup of the ledger.
pub const BACKUP: &str = "/backup";
/// The route for downloading a receipt file.
pub const RECEIPT: &str = "/receipts/{receipt_id}";
/// The route for getting the log in page.
pub const LOG_IN_VIEW: &str = "/log_in";
/// The page to display when an internal server error occurs.
pub const INTERNAL_ERROR_VIEW: &str = "/error";
/// The route for static files.
pub const STATIC: &str = "/static";

/// The route for logging in a user.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to create transactions.
pub const TRANSACTIONS_API: &str = "/api/transactions";
/// The route to update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";
/// The route to delete a receipt.
pub const DELETE_RECEIPT: &str = "/api/receipts/{receipt_id}";
/// The route to create users.
pub const USERS_API: &str = "/api/users";
/// The route to update a user.
pub const USER: &str = "/api/users/{user_id}";
/// The route to deactivate a user.
pub const DEACTIVATE_USER: &str = "/api/users/{user_id}/deactivate";
/// The route to update the current user's profile.
pub const PROFILE_API: &str = "/api/profile";
/// The route to change the current user's password.
pub const CHANGE_PASSWORD_API: &str = "/api/profile/password";
/// The route to create categories.
pub const CATEGORIES_API: &str = "/api/categories";
/// The route to delete a category.
pub const CATEGORY: &str = "/api/categories/{category_id}";
/// The route to create spending limits.
pub const SPENDING_LIMITS_API: &str = "/api/spending-limits";
/// The route to delete a spending limit.
pub const SPENDING_LIMIT: &str = "/api/spending-limits/{limit_id}";
/// The route to create or update a system setting.
pub const SETTINGS_API: &str = "/api/settings";
/// The JSON endpoint with the dashboard statistics.
pub const DASHBOARD_STATS_API: &str = "/api/dashboard-stats";
/// The JSON endpoint that checks spending limits for a category.
pub const SPENDING_CHECK_API: &str = "/api/spending-check/{category_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|offset| param_start + offset + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
