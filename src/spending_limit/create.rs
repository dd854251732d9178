//! The form and endpoint for adding spending limits.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    category::{Category, get_all_categories},
    database_id::CategoryId,
    endpoints,
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, field_error, submit_button},
    role::Permission,
    spending_limit::{LimitPeriod, NewSpendingLimit, create_spending_limit},
    transaction::parse_amount,
    user::UserID,
};

/// The state needed by the spending limit endpoints.
#[derive(Debug, Clone)]
pub struct SpendingLimitState {
    pub db_connection: Arc<Mutex<Connection>>,
    /// The canonical timezone used to decide which day it is.
    pub local_timezone: String,
}

impl FromRef<AppState> for SpendingLimitState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The raw data entered into the spending limit form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpendingLimitForm {
    pub period: String,
    pub amount: String,
    /// "0" or blank applies the limit to every category.
    #[serde(default)]
    pub category_id: String,
    /// Set when the checkbox is ticked.
    pub is_active: Option<String>,
}

/// Error messages for the fields of the spending limit form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpendingLimitFormErrors {
    pub period: Option<String>,
    pub amount: Option<String>,
    pub category: Option<String>,
}

impl SpendingLimitForm {
    /// Validate the form, producing a limit owned by `user_id`.
    pub fn validate(
        &self,
        user_id: UserID,
        categories: &[Category],
    ) -> Result<NewSpendingLimit, SpendingLimitFormErrors> {
        let mut errors = SpendingLimitFormErrors::default();

        let period = self
            .period
            .parse::<LimitPeriod>()
            .map_err(|_| errors.period = Some("Choose daily or monthly.".to_owned()))
            .ok();

        let amount = parse_amount(&self.amount)
            .map_err(|error| errors.amount = Some(error))
            .ok();

        let category_id = match self.category_id.trim() {
            "" | "0" => None,
            raw_id => match raw_id.parse::<CategoryId>() {
                Ok(id) if categories.iter().any(|category| category.id == id) => Some(id),
                _ => {
                    errors.category = Some("Choose a category.".to_owned());
                    None
                }
            },
        };

        match (period, amount) {
            (Some(period), Some(amount)) if errors == SpendingLimitFormErrors::default() => {
                Ok(NewSpendingLimit {
                    period,
                    amount,
                    category_id,
                    is_active: self.is_active.is_some(),
                    user_id,
                })
            }
            _ => Err(errors),
        }
    }
}

/// The form for adding a spending limit, shown on the settings page.
pub fn spending_limit_form(
    form: &SpendingLimitForm,
    errors: &SpendingLimitFormErrors,
    categories: &[Category],
) -> Markup {
    html! {
        form
            hx-post=(endpoints::SPENDING_LIMITS_API)
            hx-target="this"
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            class="w-full space-y-4"
        {
            div
            {
                label for="period" class=(FORM_LABEL_STYLE) { "Period" }

                select name="period" id="period" required class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for period in [LimitPeriod::Daily, LimitPeriod::Monthly] {
                        option value=(period.as_str()) selected[form.period == period.as_str()]
                        {
                            (period.label())
                        }
                    }
                }

                (field_error(errors.period.as_deref()))
            }

            div
            {
                label for="limit_amount" class=(FORM_LABEL_STYLE) { "Limit Amount" }

                input
                    name="amount"
                    id="limit_amount"
                    type="number"
                    step="0.01"
                    min="0.01"
                    value=(form.amount)
                    required
                    class=(FORM_TEXT_INPUT_STYLE);

                (field_error(errors.amount.as_deref()))
            }

            div
            {
                label for="limit_category_id" class=(FORM_LABEL_STYLE) { "Category (optional)" }

                select name="category_id" id="limit_category_id" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="0" { "All Categories" }

                    @for category in categories {
                        option
                            value=(category.id)
                            selected[form.category_id == category.id.to_string()]
                        {
                            (category.name)
                        }
                    }
                }

                (field_error(errors.category.as_deref()))
            }

            div class="flex items-center gap-2"
            {
                input type="checkbox" name="is_active" id="is_active" value="true" checked;
                label for="is_active" class="text-sm" { "Active" }
            }

            (submit_button("Save Limit"))
        }
    }
}

/// Create a spending limit for the current user.
pub async fn create_spending_limit_endpoint(
    State(state): State<SpendingLimitState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Form(form): Form<SpendingLimitForm>,
) -> Response {
    if let Err(error) = user.require(Permission::Create) {
        return error.into_alert_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let categories = match get_all_categories(&connection) {
        Ok(categories) => categories,
        Err(error) => {
            tracing::error!("Could not get categories: {error}");
            return error.into_alert_response();
        }
    };

    let new_limit = match form.validate(user.id, &categories) {
        Ok(new_limit) => new_limit,
        Err(errors) => return spending_limit_form(&form, &errors, &categories).into_response(),
    };

    let limit = match create_spending_limit(new_limit, &connection) {
        Ok(limit) => limit,
        Err(error) => {
            tracing::error!("Could not create spending limit: {error}");
            return error.into_alert_response();
        }
    };

    log_audit_action(
        AuditEntry::new(AuditAction::CreateSpendingLimit)
            .user(user.id)
            .target("spending_limit", limit.id)
            .values(
                None,
                Some(json!({
                    "period": limit.period,
                    "amount": format!("{:.2}", limit.amount),
                    "category_id": limit.category_id,
                    "is_active": limit.is_active,
                })),
            )
            .client(&client),
        &connection,
    );

    (
        HxRedirect(endpoints::SETTINGS_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}
