//! Alert messages that HTMX swaps into the page's alert container.

use axum::response::{IntoResponse, Response};
use maud::{Markup, html};

/// A dismissable success or error message.
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    Success { message: String, details: String },
    SuccessSimple { message: String },
    Error { message: String, details: String },
    ErrorSimple { message: String },
}

impl Alert {
    pub fn into_html(self) -> Markup {
        let (is_error, message, details) = match self {
            Alert::Success { message, details } => (false, message, details),
            Alert::SuccessSimple { message } => (false, message, String::new()),
            Alert::Error { message, details } => (true, message, details),
            Alert::ErrorSimple { message } => (true, message, String::new()),
        };

        let style = if is_error {
            "flex items-start p-4 mb-4 text-red-800 rounded-lg bg-red-50 \
            dark:bg-gray-800 dark:text-red-400 border border-red-300 dark:border-red-800"
        } else {
            "flex items-start p-4 mb-4 text-green-800 rounded-lg bg-green-50 \
            dark:bg-gray-800 dark:text-green-400 border border-green-300 dark:border-green-800"
        };

        html! {
            div
                id="alert"
                role="alert"
                class=(style)
            {
                div class="ms-3 text-sm font-medium"
                {
                    p class="font-semibold" { (message) }

                    @if !details.is_empty() {
                        p { (details) }
                    }
                }

                button
                    type="button"
                    class="ms-auto -mx-1.5 -my-1.5 rounded-lg p-1.5 inline-flex items-center justify-center h-8 w-8"
                    aria-label="Dismiss"
                    onclick="this.parentElement.remove()"
                {
                    "×"
                }
            }
        }
    }
}

impl IntoResponse for Alert {
    fn into_response(self) -> Response {
        self.into_html().into_response()
    }
}

#[cfg(test)]
mod alert_tests {
    use axum::response::IntoResponse;
    use scraper::Selector;

    use crate::test_utils::{assert_valid_html, parse_html_fragment};

    use super::Alert;

    #[tokio::test]
    async fn error_alert_shows_message_and_details() {
        let response = Alert::Error {
            message: "Could not delete".to_owned(),
            details: "Try again".to_owned(),
        }
        .into_response();

        let fragment = parse_html_fragment(response).await;
        assert_valid_html(&fragment);
        let paragraphs: Vec<String> = fragment
            .select(&Selector::parse("p").unwrap())
            .map(|p| p.text().collect())
            .collect();

        assert_eq!(paragraphs, vec!["Could not delete", "Try again"]);
    }

    #[tokio::test]
    async fn simple_alert_omits_details() {
        let response = Alert::SuccessSimple {
            message: "Saved".to_owned(),
        }
        .into_response();

        let fragment = parse_html_fragment(response).await;
        let count = fragment.select(&Selector::parse("p").unwrap()).count();

        assert_eq!(count, 1);
    }
}
