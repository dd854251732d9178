//! Registering new users.

use axum::{
    Extension, Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde_json::json;

use crate::{
    Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    endpoints,
    html::{FORM_CONTAINER_STYLE, base},
    navigation::NavBar,
    role::{Permission, RoleRecord, get_all_roles},
    user::{
        NewUser, PasswordHash, UserFormErrors, create_user,
        form::{UserForm, UserFormMode, set_field_error, user_form, validate_user_form},
        list::UserState,
    },
};

fn new_user_view(current_user: &CurrentUser, roles: &[RoleRecord]) -> Markup {
    let nav_bar = NavBar::new(endpoints::USERS_VIEW, current_user).into_html();
    let empty_form = UserForm {
        username: String::new(),
        email: String::new(),
        first_name: String::new(),
        last_name: String::new(),
        phone: String::new(),
        password: String::new(),
        confirm_password: String::new(),
        // Default to the least privileged role.
        role_id: roles.last().map(|role| role.id).unwrap_or_default(),
        is_active: None,
    };
    let form = user_form(
        UserFormMode::Create,
        &empty_form,
        roles,
        &UserFormErrors::default(),
    );

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-4"
            {
                h1 class="text-xl font-bold" { "Add User" }
                (form)
            }
        }
    };

    base("Add User", &content)
}

/// Display the form for registering a new user.
pub async fn get_new_user_page(
    State(state): State<UserState>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    if let Err(error) = user.require(Permission::ManageUsers) {
        return error.into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_all_roles(&connection) {
        Ok(roles) => new_user_view(&user, &roles).into_response(),
        Err(error) => {
            tracing::error!("Could not get roles: {error}");
            error.into_response()
        }
    }
}

/// Register a new user from the form data.
///
/// Invalid fields, duplicate usernames and duplicate emails are reported by
/// returning the form with error messages.
pub async fn create_user_endpoint(
    State(state): State<UserState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Form(form): Form<UserForm>,
) -> Response {
    if let Err(error) = user.require(Permission::ManageUsers) {
        return error.into_alert_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let roles = match get_all_roles(&connection) {
        Ok(roles) => roles,
        Err(error) => {
            tracing::error!("Could not get roles: {error}");
            return error.into_alert_response();
        }
    };

    let validated = match validate_user_form(&form, &roles, true) {
        Ok(validated) => validated,
        Err(errors) => {
            return user_form(UserFormMode::Create, &form, &roles, &errors).into_response();
        }
    };

    let Some(password) = validated.password else {
        return Error::HashingError("password missing after validation".to_owned())
            .into_alert_response();
    };

    let password_hash = match PasswordHash::new(password, PasswordHash::DEFAULT_COST) {
        Ok(password_hash) => password_hash,
        Err(error) => {
            tracing::error!("Could not hash password: {error}");
            return error.into_alert_response();
        }
    };

    let new_user = NewUser {
        username: validated.username,
        email: validated.profile.email,
        password_hash,
        first_name: validated.profile.first_name,
        last_name: validated.profile.last_name,
        phone: validated.profile.phone,
        role_id: validated.role_id,
    };

    let created_user = match create_user(new_user, &connection) {
        Ok(created_user) => created_user,
        Err(error) => {
            let mut errors = UserFormErrors::default();

            if set_field_error(&error, &mut errors) {
                return user_form(UserFormMode::Create, &form, &roles, &errors).into_response();
            }

            tracing::error!("Could not create user: {error}");
            return error.into_alert_response();
        }
    };

    log_audit_action(
        AuditEntry::new(AuditAction::CreateUser)
            .user(user.id)
            .target("user", created_user.id.as_i64())
            .values(
                None,
                Some(json!({
                    "username": created_user.username,
                    "email": created_user.email,
                    "role_id": created_user.role_id,
                })),
            )
            .client(&client),
        &connection,
    );

    tracing::info!(
        "User \"{}\" registered \"{}\" as {}",
        user.username,
        created_user.username,
        created_user.role_name
    );

    (
        HxRedirect(endpoints::USERS_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}
