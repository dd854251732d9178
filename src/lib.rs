//! Cashbook is a web app for recording expenses and income.
//!
//! Users log in, record transactions against categories and tags, attach
//! receipts, set spending limits and export reports. Access is controlled by
//! three roles: Admin, Manager and Viewer.
//!
//! This library provides a REST API that directly serves HTML pages.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod alert;
mod app_state;
mod audit;
mod auth;
mod backup;
mod category;
mod dashboard;
mod database_id;
mod db;
mod endpoints;
mod forbidden;
mod html;
mod internal_server_error;
mod logging;
mod navigation;
mod not_found;
mod pagination;
mod receipt;
mod report;
mod role;
mod routing;
mod seed;
mod settings;
mod spending_limit;
mod tag;
mod timezone;
mod transaction;
mod user;

#[cfg(test)]
mod test_utils;

pub use app_state::AppState;
pub use category::get_all_categories;
pub use db::initialize as initialize_db;
pub use logging::logging_middleware;
pub use pagination::PaginationConfig;
pub use role::{Permission, Role, get_role_by_name};
pub use routing::{MAX_UPLOAD_BYTES, build_router};
pub use seed::seed_defaults;
pub use transaction::{NewTransaction, TransactionType, create_transaction};
pub use user::{
    NewUser, PasswordHash, User, UserID, ValidatedPassword, create_user, get_user_by_username,
    update_password,
};

use crate::{
    alert::Alert, forbidden::get_403_forbidden_response, internal_server_error::InternalServerError,
    not_found::get_404_not_found_response,
};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The username or password did not match a registered user.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// The user's account has been deactivated by an administrator.
    #[error("the account has been deactivated")]
    AccountDeactivated,

    /// The auth token cookie is missing from the cookie jar in the request.
    #[error("no cookies in the cookie jar :(")]
    CookieMissing,

    /// The auth token cookie could not be parsed or has expired.
    #[error("invalid auth token: {0}")]
    InvalidToken(String),

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The user does not have the permission needed for the requested action.
    #[error("you do not have permission to perform this action")]
    Forbidden,

    /// An empty string was used to create a tag name.
    #[error("Tag name cannot be empty")]
    EmptyTagName,

    /// A transaction or spending limit amount was zero or negative.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(f64),

    /// The category ID did not refer to a valid category.
    #[error("the category ID {0} does not refer to a valid category")]
    InvalidCategory(i64),

    /// The role ID did not refer to a valid role.
    #[error("the role ID {0} does not refer to a valid role")]
    InvalidRole(i64),

    /// The username is already taken by another user.
    #[error("the username \"{0}\" is already taken")]
    DuplicateUsername(String),

    /// The email address is already registered to another user.
    #[error("the email \"{0}\" is already registered")]
    DuplicateEmail(String),

    /// Tried to delete one of the built-in categories.
    #[error("system categories cannot be deleted")]
    SystemCategory,

    /// Tried to delete a category that transactions still refer to.
    #[error("the category is used by one or more transactions")]
    CategoryInUse,

    /// An administrator tried to deactivate their own account.
    #[error("you cannot deactivate your own account")]
    CannotDeactivateSelf,

    /// The multipart form could not be parsed.
    #[error("Could not parse multipart form: {0}")]
    MultipartError(String),

    /// A receipt file could not be read from or written to the upload directory.
    #[error("receipt file error: {0}")]
    FileError(String),

    /// The report document could not be rendered.
    #[error("could not render report: {0}")]
    ReportError(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Tried to update a transaction that does not exist
    #[error("tried to update a transaction that is not in the database")]
    UpdateMissingTransaction,

    /// Tried to delete a transaction that does not exist
    #[error("tried to delete a transaction that is not in the database")]
    DeleteMissingTransaction,

    /// Tried to delete a receipt that does not exist
    #[error("tried to delete a receipt that is not in the database")]
    DeleteMissingReceipt,

    /// Tried to update a user that does not exist
    #[error("tried to update a user that is not in the database")]
    UpdateMissingUser,

    /// Tried to delete a category that does not exist
    #[error("tried to delete a category that is not in the database")]
    DeleteMissingCategory,

    /// Tried to delete a spending limit that does not exist
    #[error("tried to delete a spending limit that is not in the database")]
    DeleteMissingSpendingLimit,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => get_404_not_found_response(),
            Error::Forbidden => get_403_forbidden_response(),
            Error::InvalidTimezoneError(timezone) => InternalServerError {
                description: "Invalid Timezone Settings",
                fix: &format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            }
            .into_response(),
            Error::DatabaseLockError => InternalServerError::default().into_response(),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                InternalServerError::default().into_response()
            }
        }
    }
}

impl Error {
    /// The status code, headline and explanation shown to the client for this error.
    fn client_message(&self) -> (StatusCode, &'static str, String) {
        match self {
            Error::Forbidden => (
                StatusCode::FORBIDDEN,
                "Permission denied",
                "Your role does not allow this action. Ask an administrator if you need access."
                    .to_owned(),
            ),
            Error::NotFound => (
                StatusCode::NOT_FOUND,
                "Not found",
                "The requested item could not be found. It may have been deleted.".to_owned(),
            ),
            Error::InvalidTimezoneError(timezone) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Invalid Timezone Settings",
                format!(
                    "Could not get local timezone \"{timezone}\". Check your server settings and \
                    ensure the timezone has been set to valid, canonical timezone string"
                ),
            ),
            Error::InvalidCategory(category_id) => (
                StatusCode::BAD_REQUEST,
                "Invalid category",
                format!("Could not find a category with the ID {category_id}"),
            ),
            Error::InvalidAmount(amount) => (
                StatusCode::BAD_REQUEST,
                "Invalid amount",
                format!("{amount} is not a valid amount. Enter an amount greater than zero."),
            ),
            Error::MultipartError(error) => (
                StatusCode::BAD_REQUEST,
                "Invalid form",
                format!("The form could not be read: {error}"),
            ),
            Error::UpdateMissingTransaction => (
                StatusCode::NOT_FOUND,
                "Could not update transaction",
                "The transaction could not be found.".to_owned(),
            ),
            Error::DeleteMissingTransaction => (
                StatusCode::NOT_FOUND,
                "Could not delete transaction",
                "The transaction could not be found. \
                Try refreshing the page to see if the transaction has already been deleted."
                    .to_owned(),
            ),
            Error::DeleteMissingReceipt => (
                StatusCode::NOT_FOUND,
                "Could not delete receipt",
                "The receipt could not be found. \
                Try refreshing the page to see if the receipt has already been deleted."
                    .to_owned(),
            ),
            Error::UpdateMissingUser => (
                StatusCode::NOT_FOUND,
                "Could not update user",
                "The user could not be found.".to_owned(),
            ),
            Error::DeleteMissingCategory => (
                StatusCode::NOT_FOUND,
                "Could not delete category",
                "The category could not be found. \
                Try refreshing the page to see if the category has already been deleted."
                    .to_owned(),
            ),
            Error::DeleteMissingSpendingLimit => (
                StatusCode::NOT_FOUND,
                "Could not delete spending limit",
                "The spending limit could not be found. \
                Try refreshing the page to see if the limit has already been deleted."
                    .to_owned(),
            ),
            Error::SystemCategory => (
                StatusCode::BAD_REQUEST,
                "Could not delete category",
                "System categories are built in and cannot be deleted.".to_owned(),
            ),
            Error::CategoryInUse => (
                StatusCode::BAD_REQUEST,
                "Could not delete category",
                "The category is still used by one or more transactions. \
                Move those transactions to another category first."
                    .to_owned(),
            ),
            Error::CannotDeactivateSelf => (
                StatusCode::BAD_REQUEST,
                "Could not deactivate user",
                "You cannot deactivate your own account.".to_owned(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong",
                "An unexpected error occurred, check the server logs for more details.".to_owned(),
            ),
        }
    }

    /// Render the error as an alert fragment for HTMX requests.
    fn into_alert_response(self) -> Response {
        let (status, message, details) = self.client_message();

        (
            status,
            Alert::Error {
                message: message.to_owned(),
                details,
            }
            .into_html(),
        )
            .into_response()
    }

    /// Render the error as a JSON body for API clients.
    fn into_json_response(self) -> Response {
        let (status, message, details) = self.client_message();

        (
            status,
            Json(json!({
                "error": message,
                "details": details,
            })),
        )
            .into_response()
    }
}
