//! The settings page and the endpoint for changing system settings.

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
    category::{Category, CategoryForm, CategoryFormErrors, category_form, get_all_categories},
    endpoints::{self, format_endpoint},
    html::{
        CARD_STYLE, InputField, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE,
        TABLE_ROW_STYLE, base, delete_button, format_currency, submit_button,
    },
    navigation::NavBar,
    role::Permission,
    settings::{
        SETTING_KEY_MAX_LENGTH, SystemSetting, get_all_settings, get_setting, upsert_setting,
    },
    spending_limit::{
        LimitStatus, SpendingLimit, SpendingLimitForm, SpendingLimitFormErrors, evaluate_limit,
        get_spending_limits_for_user, spending_limit_form,
    },
    timezone::local_today,
};

/// The state needed for the settings page.
#[derive(Debug, Clone)]
pub struct SettingsState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for SettingsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The form data for creating or changing a system setting.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingForm {
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingFormErrors {
    pub key: Option<String>,
}

impl SettingForm {
    fn validate(&self) -> Result<(&str, &str, Option<&str>), SettingFormErrors> {
        let key = self.key.trim();

        if key.is_empty() {
            return Err(SettingFormErrors {
                key: Some("Enter a key.".to_owned()),
            });
        }

        if key.chars().count() > SETTING_KEY_MAX_LENGTH {
            return Err(SettingFormErrors {
                key: Some(format!(
                    "Keys must be at most {SETTING_KEY_MAX_LENGTH} characters."
                )),
            });
        }

        let description = Some(self.description.trim()).filter(|text| !text.is_empty());

        Ok((key, self.value.trim(), description))
    }
}

/// The form for adding or changing a system setting.
pub fn setting_form(form: &SettingForm, errors: &SettingFormErrors) -> Markup {
    html! {
        form
            hx-post=(endpoints::SETTINGS_API)
            hx-target="this"
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            class="w-full space-y-4"
        {
            (InputField::text("key", "Key")
                .value(&form.key)
                .error(errors.key.as_deref())
                .into_html())
            (InputField::text("value", "Value")
                .value(&form.value)
                .optional()
                .into_html())
            (InputField::text("description", "Description")
                .value(&form.description)
                .optional()
                .into_html())

            (submit_button("Save Setting"))
        }
    }
}

fn categories_section(user: &CurrentUser, categories: &[Category]) -> Markup {
    html! {
        section class=(CARD_STYLE)
        {
            h2 class="text-lg font-semibold mb-4" { "Categories" }

            ul class="space-y-2 mb-6"
            {
                @for category in categories {
                    li class="flex items-center justify-between gap-4"
                    {
                        span class="flex items-center gap-2"
                        {
                            span
                                class="inline-block w-3 h-3 rounded-full"
                                style=(format!("background-color: {}", category.color))
                            {}
                            (category.name)
                            @if category.is_system {
                                span class="text-xs text-gray-500 dark:text-gray-400" { "(system)" }
                            }
                        }

                        @if !category.is_system && user.can(Permission::Delete) {
                            (delete_button(
                                &format_endpoint(endpoints::CATEGORY, category.id),
                                &format!("Delete the category \"{}\"?", category.name),
                                "closest li",
                            ))
                        }
                    }
                }
            }

            @if user.can(Permission::Create) {
                h3 class="font-semibold mb-2" { "Add a category" }
                (category_form(&CategoryForm::default(), &CategoryFormErrors::default()))
            }
        }
    }
}

fn spending_limits_section(
    user: &CurrentUser,
    limits: &[(SpendingLimit, LimitStatus)],
    categories: &[Category],
) -> Markup {
    let category_name = |limit: &SpendingLimit| match limit.category_id {
        Some(category_id) => categories
            .iter()
            .find(|category| category.id == category_id)
            .map(|category| category.name.clone())
            .unwrap_or_else(|| "Unknown".to_owned()),
        None => "All categories".to_owned(),
    };

    html! {
        section class=(CARD_STYLE)
        {
            h2 class="text-lg font-semibold mb-4" { "Spending Limits" }

            @if limits.is_empty() {
                p class="mb-6 text-gray-500 dark:text-gray-400" { "You have not set any spending limits." }
            } @else {
                table class="w-full mb-6 text-sm text-left text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "Period" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Spent" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Status" }
                            th scope="col" class=(TABLE_CELL_STYLE) { span class="sr-only" { "Actions" } }
                        }
                    }

                    tbody
                    {
                        @for (limit, status) in limits {
                            tr class=(TABLE_ROW_STYLE) data-limit-id=(limit.id)
                            {
                                td class=(TABLE_CELL_STYLE) { (limit.period.label()) }
                                td class=(TABLE_CELL_STYLE) { (category_name(limit)) }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    (format_currency(status.spent))
                                    " of "
                                    (format_currency(limit.amount))
                                }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    @if !limit.is_active {
                                        "Inactive"
                                    } @else if status.is_exceeded {
                                        span class="text-red-600 font-semibold" { "Exceeded" }
                                    } @else if status.is_warning {
                                        span class="text-yellow-600 font-semibold" { "Warning" }
                                    } @else {
                                        "OK"
                                    }
                                }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    @if user.can(Permission::Delete) {
                                        (delete_button(
                                            &format_endpoint(endpoints::SPENDING_LIMIT, limit.id),
                                            "Delete this spending limit?",
                                            "closest tr",
                                        ))
                                    }
                                }
                            }
                        }
                    }
                }
            }

            @if user.can(Permission::Create) {
                h3 class="font-semibold mb-2" { "Add a spending limit" }
                (spending_limit_form(
                    &SpendingLimitForm::default(),
                    &SpendingLimitFormErrors::default(),
                    categories,
                ))
            }
        }
    }
}

fn system_settings_section(settings: &[SystemSetting]) -> Markup {
    html! {
        section class=(CARD_STYLE)
        {
            h2 class="text-lg font-semibold mb-4" { "System Settings" }

            @if settings.is_empty() {
                p class="mb-6 text-gray-500 dark:text-gray-400" { "No system settings have been saved." }
            } @else {
                dl class="mb-6 space-y-2"
                {
                    @for setting in settings {
                        div
                        {
                            dt class="font-mono text-sm" { (setting.key) }
                            dd
                            {
                                (setting.value)
                                @if let Some(description) = &setting.description {
                                    span class="block text-xs text-gray-500 dark:text-gray-400" { (description) }
                                }
                            }
                        }
                    }
                }
            }

            h3 class="font-semibold mb-2" { "Add or change a setting" }
            (setting_form(&SettingForm::default(), &SettingFormErrors::default()))
        }
    }
}

fn settings_view(
    user: &CurrentUser,
    categories: &[Category],
    limits: &[(SpendingLimit, LimitStatus)],
    settings: Option<&[SystemSetting]>,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::SETTINGS_VIEW, user).into_html();

    let content = html! {
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full lg:max-w-3xl space-y-6"
            {
                h1 class="text-xl font-bold" { "Settings" }

                (categories_section(user, categories))
                (spending_limits_section(user, limits, categories))

                @if let Some(settings) = settings {
                    (system_settings_section(settings))
                }
            }
        }
    };

    base("Settings", &content)
}

/// Display the categories, the user's spending limits and, for admins, the system settings.
pub async fn get_settings_page(
    State(state): State<SettingsState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, Error> {
    user.require(Permission::Read)?;
    let today = local_today(&state.local_timezone)?;

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let categories = get_all_categories(&connection)
        .inspect_err(|error| tracing::error!("could not get categories: {error}"))?;

    let limits = get_spending_limits_for_user(user.id, &connection)?
        .into_iter()
        .map(|limit| {
            let status = evaluate_limit(&limit, today, &connection)?;
            Ok::<_, Error>((limit, status))
        })
        .collect::<Result<Vec<_>, Error>>()
        .inspect_err(|error| tracing::error!("could not evaluate spending limits: {error}"))?;

    let settings = if user.can(Permission::ManageUsers) {
        Some(get_all_settings(&connection)?)
    } else {
        None
    };

    Ok(settings_view(&user, &categories, &limits, settings.as_deref()).into_response())
}

/// Create or overwrite a system setting. Only administrators may change settings.
pub async fn update_setting_endpoint(
    State(state): State<SettingsState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Form(form): Form<SettingForm>,
) -> Response {
    if let Err(error) = user.require(Permission::ManageUsers) {
        return error.into_alert_response();
    }

    let (key, value, description) = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => return setting_form(&form, &errors).into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let updated = upsert_setting(key, value, description, &connection)
        .and_then(|previous| Ok((previous, get_setting(key, &connection)?)));

    let (previous, setting) = match updated {
        Ok((previous, Some(setting))) => (previous, setting),
        Ok((_, None)) => return Error::NotFound.into_alert_response(),
        Err(error) => {
            tracing::error!("An unexpected error occurred while saving setting \"{key}\": {error}");
            return error.into_alert_response();
        }
    };

    log_audit_action(
        AuditEntry::new(AuditAction::UpdateSetting)
            .user(user.id)
            .target("system_setting", setting.id)
            .values(
                previous.map(|previous| json!({"key": previous.key, "value": previous.value})),
                Some(json!({"key": setting.key, "value": setting.value})),
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
