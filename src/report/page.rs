//! The report form page and the endpoint that returns the generated document.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;
use time::{Date, OffsetDateTime, macros::format_description};

use crate::{
    AppState, Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    category::{Category, get_all_categories},
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        base, field_error,
    },
    navigation::NavBar,
    report::{ReportFormat, render_pdf, render_xlsx, summarize},
    role::Permission,
    timezone::{get_local_offset, local_today},
    transaction::{TransactionFilter, TransactionRow, TransactionType, query_all_transactions},
    user::{User, UserID, get_all_users},
};

/// The state needed to build reports.
#[derive(Debug, Clone)]
pub struct ReportState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub local_timezone: String,
}

impl FromRef<AppState> for ReportState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            local_timezone: state.local_timezone.clone(),
        }
    }
}

/// The raw values entered into the report form.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReportForm {
    pub start_date: String,
    pub end_date: String,
    /// "0" or blank includes every user.
    #[serde(default)]
    pub user_id: String,
    /// "0" or blank includes every category.
    #[serde(default)]
    pub category_id: String,
    /// Blank includes both income and expenses.
    #[serde(default)]
    pub transaction_type: String,
    pub format: String,
}

/// Error messages for the fields of the report form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFormErrors {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub format: Option<String>,
}

/// A checked report request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRequest {
    pub start_date: Date,
    pub end_date: Date,
    pub filter: TransactionFilter,
    pub format: ReportFormat,
}

impl ReportRequest {
    pub fn title(&self) -> String {
        format!(
            "Financial Report - {} to {}",
            self.start_date, self.end_date
        )
    }
}

fn parse_date(raw_date: &str) -> Option<Date> {
    Date::parse(raw_date.trim(), format_description!("[year]-[month]-[day]")).ok()
}

fn parse_optional_id(raw_id: &str) -> Option<i64> {
    raw_id.trim().parse().ok().filter(|id| *id != 0)
}

impl ReportForm {
    /// The form for the current month up to `today`.
    pub fn new(today: Date) -> Self {
        Self {
            start_date: today.replace_day(1).unwrap_or(today).to_string(),
            end_date: today.to_string(),
            format: ReportFormat::Pdf.as_str().to_owned(),
            ..Default::default()
        }
    }

    /// Check the form.
    ///
    /// The user filter is dropped unless `user` may see every user's transactions.
    pub fn validate(&self, user: &CurrentUser) -> Result<ReportRequest, ReportFormErrors> {
        let mut errors = ReportFormErrors::default();

        let start_date = parse_date(&self.start_date);
        if start_date.is_none() {
            errors.start_date = Some("Enter a valid start date.".to_owned());
        }

        let end_date = parse_date(&self.end_date);
        match (start_date, end_date) {
            (_, None) => errors.end_date = Some("Enter a valid end date.".to_owned()),
            (Some(start), Some(end)) if end < start => {
                errors.end_date = Some("End date must be on or after the start date.".to_owned())
            }
            _ => {}
        }

        let format = self
            .format
            .parse::<ReportFormat>()
            .map_err(|_| errors.format = Some("Choose PDF or Excel.".to_owned()))
            .ok();

        let user_id = if user.can(Permission::ManageUsers) {
            parse_optional_id(&self.user_id).map(UserID::new)
        } else {
            None
        };

        match (start_date, end_date, format) {
            (Some(start_date), Some(end_date), Some(format))
                if errors == ReportFormErrors::default() =>
            {
                Ok(ReportRequest {
                    start_date,
                    end_date,
                    filter: TransactionFilter {
                        search: None,
                        category_id: parse_optional_id(&self.category_id),
                        transaction_type: self.transaction_type.parse::<TransactionType>().ok(),
                        start_date: Some(start_date),
                        end_date: Some(end_date),
                        user_id,
                    },
                    format,
                })
            }
            _ => Err(errors),
        }
    }
}

fn report_view(
    user: &CurrentUser,
    form: &ReportForm,
    errors: &ReportFormErrors,
    categories: &[Category],
    users: &[User],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::REPORTS_VIEW, user).into_html();

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-4"
            {
                h1 class="text-xl font-bold" { "Reports" }

                form method="post" action=(endpoints::REPORTS_VIEW) class="w-full space-y-4"
                {
                    div
                    {
                        label for="start_date" class=(FORM_LABEL_STYLE) { "Start Date" }
                        input
                            type="date"
                            name="start_date"
                            id="start_date"
                            value=(form.start_date)
                            required
                            class=(FORM_TEXT_INPUT_STYLE);
                        (field_error(errors.start_date.as_deref()))
                    }

                    div
                    {
                        label for="end_date" class=(FORM_LABEL_STYLE) { "End Date" }
                        input
                            type="date"
                            name="end_date"
                            id="end_date"
                            value=(form.end_date)
                            required
                            class=(FORM_TEXT_INPUT_STYLE);
                        (field_error(errors.end_date.as_deref()))
                    }

                    @if user.can(Permission::ManageUsers) {
                        div
                        {
                            label for="user_id" class=(FORM_LABEL_STYLE) { "User" }
                            select name="user_id" id="user_id" class=(FORM_TEXT_INPUT_STYLE)
                            {
                                option value="0" { "All Users" }
                                @for report_user in users {
                                    option
                                        value=(report_user.id.as_i64())
                                        selected[form.user_id == report_user.id.as_i64().to_string()]
                                    {
                                        (report_user.username)
                                    }
                                }
                            }
                        }
                    }

                    div
                    {
                        label for="category_id" class=(FORM_LABEL_STYLE) { "Category" }
                        select name="category_id" id="category_id" class=(FORM_TEXT_INPUT_STYLE)
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
                    }

                    div
                    {
                        label for="transaction_type" class=(FORM_LABEL_STYLE) { "Type" }
                        select name="transaction_type" id="transaction_type" class=(FORM_TEXT_INPUT_STYLE)
                        {
                            option value="" { "All Types" }
                            @for transaction_type in [TransactionType::Income, TransactionType::Expense] {
                                option
                                    value=(transaction_type.as_str())
                                    selected[form.transaction_type == transaction_type.as_str()]
                                {
                                    (transaction_type.label())
                                }
                            }
                        }
                    }

                    div
                    {
                        label for="format" class=(FORM_LABEL_STYLE) { "Format" }
                        select name="format" id="format" required class=(FORM_TEXT_INPUT_STYLE)
                        {
                            @for format in [ReportFormat::Pdf, ReportFormat::Xlsx] {
                                option value=(format.as_str()) selected[form.format == format.as_str()]
                                {
                                    (format.label())
                                }
                            }
                        }
                        (field_error(errors.format.as_deref()))
                    }

                    button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Generate Report" }
                }
            }
        }
    };

    base("Reports", &content)
}

fn load_form_options(
    user: &CurrentUser,
    connection: &Connection,
) -> Result<(Vec<Category>, Vec<User>), Error> {
    let categories = get_all_categories(connection)?;
    let users = if user.can(Permission::ManageUsers) {
        get_all_users(connection)?
    } else {
        Vec::new()
    };

    Ok((categories, users))
}

/// Display the report form, defaulting to the current month.
pub async fn get_reports_page(
    State(state): State<ReportState>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    if let Err(error) = user.require(Permission::Reports) {
        return error.into_response();
    }

    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match load_form_options(&user, &connection) {
        Ok((categories, users)) => report_view(
            &user,
            &ReportForm::new(today),
            &ReportFormErrors::default(),
            &categories,
            &users,
        )
        .into_response(),
        Err(error) => {
            tracing::error!("Could not load the report form: {error}");
            error.into_response()
        }
    }
}

/// The download name for a report generated at `now`, e.g. "report_20250131_093000.pdf".
fn report_filename(now: OffsetDateTime, format: ReportFormat) -> String {
    let timestamp = now
        .format(format_description!(
            "[year][month][day]_[hour][minute][second]"
        ))
        .unwrap_or_else(|_| "report".to_owned());

    format!("report_{timestamp}.{}", format.extension())
}

fn render(
    request: &ReportRequest,
    rows: &[TransactionRow],
) -> Result<Vec<u8>, Error> {
    let summary = summarize(rows);

    match request.format {
        ReportFormat::Pdf => render_pdf(&request.title(), rows, &summary),
        ReportFormat::Xlsx => render_xlsx(&request.title(), rows, &summary),
    }
}

/// Build the report described by the form and return it as a download.
///
/// Users without the manage users permission only get their own transactions.
pub async fn generate_report_endpoint(
    State(state): State<ReportState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Form(form): Form<ReportForm>,
) -> Response {
    if let Err(error) = user.require(Permission::Reports) {
        return error.into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let request = match form.validate(&user) {
        Ok(request) => request,
        Err(errors) => {
            return match load_form_options(&user, &connection) {
                Ok((categories, users)) => {
                    report_view(&user, &form, &errors, &categories, &users).into_response()
                }
                Err(error) => error.into_response(),
            };
        }
    };

    let rows = match query_all_transactions(&request.filter, user.transaction_scope(), &connection)
    {
        Ok(rows) => rows,
        Err(error) => {
            tracing::error!("Could not query transactions for report: {error}");
            return error.into_response();
        }
    };

    let document = match render(&request, &rows) {
        Ok(document) => document,
        Err(error) => return error.into_response(),
    };

    log_audit_action(
        AuditEntry::new(AuditAction::GenerateReport)
            .user(user.id)
            .values(
                None,
                Some(json!({
                    "format": request.format.as_str(),
                    "start_date": request.start_date.to_string(),
                    "end_date": request.end_date.to_string(),
                    "transactions": rows.len(),
                })),
            )
            .client(&client),
        &connection,
    );

    let offset = get_local_offset(&state.local_timezone).unwrap_or(time::UtcOffset::UTC);
    let filename = report_filename(OffsetDateTime::now_utc().to_offset(offset), request.format);
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    tracing::info!(
        "User \"{}\" generated {filename} with {} transactions",
        user.username,
        rows.len()
    );

    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(request.format.content_type()),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document,
    )
        .into_response()
}

#[cfg(test)]
mod report_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Form,
        body::to_bytes,
        extract::State,
        http::{StatusCode, header},
    };
    use rusqlite::Connection;
    use time::macros::{date, datetime};

    use crate::{
        audit::{ClientInfo, get_audit_log_for_user},
        auth::CurrentUser,
        category::get_all_categories,
        report::ReportFormat,
        test_utils::{
            assert_form_error_message, assert_valid_html, insert_test_user, must_get_form,
            parse_html_document, seeded_connection,
        },
        transaction::{NewTransaction, TransactionType, create_transaction},
        user::User,
    };

    use super::{
        ReportForm, ReportState, generate_report_endpoint, get_reports_page, report_filename,
    };

    fn record(user: &User, transaction_type: TransactionType, amount: f64, connection: &Connection) {
        create_transaction(
            NewTransaction {
                transaction_type,
                amount,
                description: "Report row".to_owned(),
                notes: None,
                party: None,
                date: date!(2025 - 01 - 10),
                user_id: user.id,
                category_id: get_all_categories(connection).unwrap()[0].id,
            },
            connection,
        )
        .unwrap();
    }

    fn form(format: &str) -> ReportForm {
        ReportForm {
            start_date: "2025-01-01".to_owned(),
            end_date: "2025-01-31".to_owned(),
            user_id: String::new(),
            category_id: "0".to_owned(),
            transaction_type: String::new(),
            format: format.to_owned(),
        }
    }

    fn state(connection: Connection) -> ReportState {
        ReportState {
            db_connection: Arc::new(Mutex::new(connection)),
            local_timezone: "Etc/UTC".to_owned(),
        }
    }

    #[test]
    fn filename_has_timestamp_and_extension() {
        let now = datetime!(2025-01-31 09:30:05 UTC);

        assert_eq!(
            report_filename(now, ReportFormat::Pdf),
            "report_20250131_093005.pdf"
        );
        assert_eq!(
            report_filename(now, ReportFormat::Xlsx),
            "report_20250131_093005.xlsx"
        );
    }

    #[test]
    fn user_filter_requires_manage_users() {
        let connection = seeded_connection();
        let manager = insert_test_user("manager", "Manager", &connection);
        let admin = insert_test_user("root", "Admin", &connection);
        let form = ReportForm {
            user_id: "7".to_owned(),
            ..form("pdf")
        };

        let manager_request = form.validate(&CurrentUser::from(&manager)).unwrap();
        let admin_request = form.validate(&CurrentUser::from(&admin)).unwrap();

        assert_eq!(manager_request.filter.user_id, None);
        assert_eq!(admin_request.filter.user_id.map(|id| id.as_i64()), Some(7));
        assert_eq!(
            admin_request.title(),
            "Financial Report - 2025-01-01 to 2025-01-31"
        );
    }

    #[tokio::test]
    async fn reports_page_displays_form() {
        let connection = seeded_connection();
        let viewer = insert_test_user("vera", "Viewer", &connection);

        let response =
            get_reports_page(State(state(connection)), Extension(CurrentUser::from(&viewer)))
                .await;

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        let form = must_get_form(&document);
        assert_eq!(form.value().attr("method"), Some("post"));
    }

    #[tokio::test]
    async fn generates_pdf_download() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        record(&user, TransactionType::Income, 500.0, &connection);
        record(&user, TransactionType::Income, 300.0, &connection);
        record(&user, TransactionType::Expense, 200.0, &connection);
        let state = state(connection);

        let response = generate_report_endpoint(
            State(state.clone()),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(form("pdf")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/pdf"
        );
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        assert!(disposition.starts_with("attachment; filename=\"report_"));
        assert!(disposition.ends_with(".pdf\""));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"%PDF"));

        let connection = state.db_connection.lock().unwrap();
        let audit_log = get_audit_log_for_user(user.id, 10, &connection).unwrap();
        assert!(audit_log.iter().any(|entry| entry.action == "generate_report"));
    }

    #[tokio::test]
    async fn generates_xlsx_download() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        record(&user, TransactionType::Expense, 20.0, &connection);

        let response = generate_report_endpoint(
            State(state(connection)),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(form("xlsx")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(b"PK"));
    }

    #[tokio::test]
    async fn end_before_start_is_a_field_error() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let form = ReportForm {
            start_date: "2025-02-01".to_owned(),
            ..form("pdf")
        };

        let response = generate_report_endpoint(
            State(state(connection)),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(form),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_form_error_message(
            &must_get_form(&document),
            "End date must be on or after the start date.",
        );
    }
}
