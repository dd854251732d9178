//! The page to display when a user's role does not allow an action.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::html::error_view;

pub fn get_403_forbidden_response() -> Response {
    (
        StatusCode::FORBIDDEN,
        error_view(
            "Forbidden",
            "403",
            "You don't have access to this page.",
            "Your role does not allow this action. Ask an administrator if you need access.",
        ),
    )
        .into_response()
}
