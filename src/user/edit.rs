//! Editing users and showing their recent activity.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde_json::json;

use crate::{
    Error,
    audit::{AuditAction, AuditEntry, AuditLogRecord, ClientInfo, get_audit_log_for_user, log_audit_action},
    auth::CurrentUser,
    endpoints,
    html::{
        FORM_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
    },
    navigation::NavBar,
    role::{Permission, RoleRecord, get_all_roles},
    user::{
        PasswordHash, User, UserFormErrors, UserID, UserUpdate,
        form::{UserForm, UserFormMode, set_field_error, user_form, validate_user_form},
        get_user_by_id,
        list::UserState,
        update_password, update_user,
    },
};

/// How many audit log entries to show on the edit page.
const RECENT_ACTIVITY_LIMIT: u64 = 10;

fn form_from_user(user: &User) -> UserForm {
    UserForm {
        username: user.username.clone(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        phone: user.phone.clone(),
        password: String::new(),
        confirm_password: String::new(),
        role_id: user.role_id,
        is_active: user.is_active.then(|| "on".to_owned()),
    }
}

fn recent_activity_view(activity: &[AuditLogRecord]) -> Markup {
    html! {
        section class="w-full space-y-2"
        {
            h2 class="text-lg font-semibold" { "Recent Activity" }

            @if activity.is_empty() {
                p class="text-sm text-gray-500 dark:text-gray-400" { "No recorded activity." }
            } @else {
                table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
                {
                    thead class=(TABLE_HEADER_STYLE)
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_CELL_STYLE) { "When" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Action" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "Target" }
                            th scope="col" class=(TABLE_CELL_STYLE) { "IP Address" }
                        }
                    }

                    tbody
                    {
                        @for entry in activity {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                td class=(TABLE_CELL_STYLE)
                                {
                                    (entry.created_at.date()) " "
                                    (format!("{:02}:{:02}", entry.created_at.hour(), entry.created_at.minute()))
                                }
                                td class=(TABLE_CELL_STYLE) { (entry.action) }
                                td class=(TABLE_CELL_STYLE)
                                {
                                    @if let (Some(table_name), Some(record_id)) = (&entry.table_name, entry.record_id) {
                                        (table_name) " #" (record_id)
                                    }
                                }
                                td class=(TABLE_CELL_STYLE) { (entry.ip_address.as_deref().unwrap_or("")) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn edit_user_view(
    current_user: &CurrentUser,
    user: &User,
    roles: &[RoleRecord],
    activity: &[AuditLogRecord],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::USERS_VIEW, current_user).into_html();
    let form = user_form(
        UserFormMode::Edit(user.id),
        &form_from_user(user),
        roles,
        &UserFormErrors::default(),
    );

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-8"
            {
                h1 class="text-xl font-bold" { "Edit User" }
                (form)
                (recent_activity_view(activity))
            }
        }
    };

    base("Edit User", &content)
}

/// Display the form for editing the user with `user_id`.
pub async fn get_edit_user_page(
    State(state): State<UserState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(user_id): Path<i64>,
) -> Response {
    if let Err(error) = current_user.require(Permission::ManageUsers) {
        return error.into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let user_id = UserID::new(user_id);
    let page_data = get_user_by_id(user_id, &connection).and_then(|user| {
        let roles = get_all_roles(&connection)?;
        let activity = get_audit_log_for_user(user_id, RECENT_ACTIVITY_LIMIT, &connection)?;
        Ok((user, roles, activity))
    });

    match page_data {
        Ok((user, roles, activity)) => {
            edit_user_view(&current_user, &user, &roles, &activity).into_response()
        }
        Err(error) => {
            tracing::error!("Could not load the edit page for user {user_id}: {error}");
            error.into_response()
        }
    }
}

/// Save the changes to the user with `user_id`.
///
/// A blank password keeps the current password.
pub async fn update_user_endpoint(
    State(state): State<UserState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(user_id): Path<i64>,
    Form(form): Form<UserForm>,
) -> Response {
    if let Err(error) = current_user.require(Permission::ManageUsers) {
        return error.into_alert_response();
    }

    let user_id = UserID::new(user_id);
    let edit_mode = UserFormMode::Edit(user_id);
    let is_active = form.is_active.is_some();

    if user_id == current_user.id && !is_active {
        return Error::CannotDeactivateSelf.into_alert_response();
    }

    let mut connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let (old_user, roles) = match get_user_by_id(user_id, &connection)
        .and_then(|user| Ok((user, get_all_roles(&connection)?)))
    {
        Ok(data) => data,
        Err(Error::NotFound) => return Error::UpdateMissingUser.into_alert_response(),
        Err(error) => {
            tracing::error!("Could not load user {user_id}: {error}");
            return error.into_alert_response();
        }
    };

    let validated = match validate_user_form(&form, &roles, false) {
        Ok(validated) => validated,
        Err(errors) => return user_form(edit_mode, &form, &roles, &errors).into_response(),
    };

    let password_hash = match validated.password {
        Some(password) => match PasswordHash::new(password, PasswordHash::DEFAULT_COST) {
            Ok(password_hash) => Some(password_hash),
            Err(error) => {
                tracing::error!("Could not hash password: {error}");
                return error.into_alert_response();
            }
        },
        None => None,
    };

    let update = UserUpdate {
        username: validated.username,
        profile: validated.profile,
        role_id: validated.role_id,
        is_active,
    };

    let result = connection
        .transaction()
        .map_err(Error::from)
        .and_then(|transaction| {
            update_user(user_id, &update, &transaction)?;

            if let Some(password_hash) = &password_hash {
                update_password(user_id, password_hash, &transaction)?;
            }

            transaction.commit()?;
            Ok(())
        });

    if let Err(error) = result {
        let mut errors = UserFormErrors::default();

        if set_field_error(&error, &mut errors) {
            return user_form(edit_mode, &form, &roles, &errors).into_response();
        }

        tracing::error!("Could not update user {user_id}: {error}");
        return error.into_alert_response();
    }

    log_audit_action(
        AuditEntry::new(AuditAction::UpdateUser)
            .user(current_user.id)
            .target("user", user_id.as_i64())
            .values(
                Some(json!({
                    "username": old_user.username,
                    "email": old_user.email,
                    "role_id": old_user.role_id,
                    "is_active": old_user.is_active,
                })),
                Some(json!({
                    "username": update.username,
                    "email": update.profile.email,
                    "role_id": update.role_id,
                    "is_active": update.is_active,
                })),
            )
            .client(&client),
        &connection,
    );

    (
        HxRedirect(endpoints::USERS_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}
