//! The current user's profile: their contact details and password.

use axum::{
    Extension, Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use serde::Deserialize;
use serde_json::json;

use crate::{
    Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    endpoints,
    html::{FORM_CONTAINER_STYLE, InputField, base, submit_button},
    navigation::NavBar,
    user::{
        PasswordHash, User, UserFormErrors, ValidatedPassword, get_user_by_id, list::UserState,
        update_password, update_profile, validate_profile_fields,
    },
};

/// The raw data entered into the profile form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileForm {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
}

/// The raw data entered into the change password form.
#[derive(Clone, Deserialize)]
pub struct ChangePasswordForm {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Default, PartialEq)]
struct PasswordFormErrors {
    current_password: Option<String>,
    new_password: Option<String>,
    confirm_password: Option<String>,
}

fn profile_form(form: &ProfileForm, errors: &UserFormErrors) -> Markup {
    html! {
        form
            hx-put=(endpoints::PROFILE_API)
            hx-target="this"
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            class="w-full space-y-4"
        {
            (InputField::text("email", "Email")
                .input_type("email")
                .value(&form.email)
                .error(errors.email.as_deref())
                .into_html())
            (InputField::text("first_name", "First name")
                .value(&form.first_name)
                .optional()
                .error(errors.first_name.as_deref())
                .into_html())
            (InputField::text("last_name", "Last name")
                .value(&form.last_name)
                .optional()
                .error(errors.last_name.as_deref())
                .into_html())
            (InputField::text("phone", "Phone")
                .input_type("tel")
                .value(&form.phone)
                .optional()
                .error(errors.phone.as_deref())
                .into_html())

            (submit_button("Save Profile"))
        }
    }
}

fn change_password_form(errors: &PasswordFormErrors) -> Markup {
    html! {
        form
            hx-put=(endpoints::CHANGE_PASSWORD_API)
            hx-target="this"
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            class="w-full space-y-4"
        {
            (InputField::text("current_password", "Current password")
                .input_type("password")
                .error(errors.current_password.as_deref())
                .into_html())
            (InputField::text("new_password", "New password")
                .input_type("password")
                .error(errors.new_password.as_deref())
                .into_html())
            (InputField::text("confirm_password", "Confirm new password")
                .input_type("password")
                .error(errors.confirm_password.as_deref())
                .into_html())

            (submit_button("Change Password"))
        }
    }
}

fn profile_view(current_user: &CurrentUser, user: &User) -> Markup {
    let nav_bar = NavBar::new(endpoints::PROFILE_VIEW, current_user).into_html();
    let form = ProfileForm {
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        phone: user.phone.clone(),
    };

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-8"
            {
                section class="space-y-4"
                {
                    h1 class="text-xl font-bold" { "Profile" }
                    p class="text-sm text-gray-500 dark:text-gray-400"
                    {
                        (user.username) " (" (user.role_name) ")"
                    }
                    (profile_form(&form, &UserFormErrors::default()))
                }

                section class="space-y-4"
                {
                    h2 class="text-lg font-semibold" { "Change Password" }
                    (change_password_form(&PasswordFormErrors::default()))
                }
            }
        }
    };

    base("Profile", &content)
}

/// Display the current user's profile.
pub async fn get_profile_page(
    State(state): State<UserState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_user_by_id(current_user.id, &connection) {
        Ok(user) => profile_view(&current_user, &user).into_response(),
        Err(error) => {
            tracing::error!("Could not load profile for user {}: {error}", current_user.id);
            error.into_response()
        }
    }
}

/// Update the current user's email, name and phone number.
pub async fn update_profile_endpoint(
    State(state): State<UserState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Form(form): Form<ProfileForm>,
) -> Response {
    let mut errors = UserFormErrors::default();
    let profile = validate_profile_fields(
        &form.email,
        &form.first_name,
        &form.last_name,
        &form.phone,
        &mut errors,
    );

    if !errors.is_empty() {
        return profile_form(&form, &errors).into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let old_user = match get_user_by_id(current_user.id, &connection) {
        Ok(user) => user,
        Err(error) => {
            tracing::error!("Could not load user {}: {error}", current_user.id);
            return error.into_alert_response();
        }
    };

    match update_profile(current_user.id, &profile, &connection) {
        Ok(()) => {}
        Err(Error::DuplicateEmail(_)) => {
            errors.email = Some("That email is already registered.".to_owned());
            return profile_form(&form, &errors).into_response();
        }
        Err(error) => {
            tracing::error!("Could not update profile for user {}: {error}", current_user.id);
            return error.into_alert_response();
        }
    }

    log_audit_action(
        AuditEntry::new(AuditAction::UpdateProfile)
            .user(current_user.id)
            .target("user", current_user.id.as_i64())
            .values(
                Some(json!({
                    "email": old_user.email,
                    "first_name": old_user.first_name,
                    "last_name": old_user.last_name,
                    "phone": old_user.phone,
                })),
                Some(json!({
                    "email": profile.email,
                    "first_name": profile.first_name,
                    "last_name": profile.last_name,
                    "phone": profile.phone,
                })),
            )
            .client(&client),
        &connection,
    );

    (
        HxRedirect(endpoints::PROFILE_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

/// Change the current user's password after checking their current password.
pub async fn change_password_endpoint(
    State(state): State<UserState>,
    Extension(current_user): Extension<CurrentUser>,
    client: ClientInfo,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let user = match get_user_by_id(current_user.id, &connection) {
        Ok(user) => user,
        Err(error) => {
            tracing::error!("Could not load user {}: {error}", current_user.id);
            return error.into_alert_response();
        }
    };

    let mut errors = PasswordFormErrors::default();

    match user.password_hash.verify(&form.current_password) {
        Ok(true) => {}
        Ok(false) => {
            errors.current_password = Some("Current password is incorrect.".to_owned());
            return change_password_form(&errors).into_response();
        }
        Err(error) => {
            tracing::error!("Could not verify password: {error}");
            return error.into_alert_response();
        }
    }

    if form.new_password != form.confirm_password {
        errors.confirm_password = Some("Passwords do not match.".to_owned());
        return change_password_form(&errors).into_response();
    }

    let new_password =
        match ValidatedPassword::new(&form.new_password, &[&user.username, &user.email]) {
            Ok(password) => password,
            Err(error) => {
                errors.new_password = Some(error.to_string());
                return change_password_form(&errors).into_response();
            }
        };

    let result = PasswordHash::new(new_password, PasswordHash::DEFAULT_COST)
        .and_then(|password_hash| update_password(user.id, &password_hash, &connection));

    if let Err(error) = result {
        tracing::error!("Could not change password for user {}: {error}", user.id);
        return error.into_alert_response();
    }

    log_audit_action(
        AuditEntry::new(AuditAction::ChangePassword)
            .user(user.id)
            .target("user", user.id.as_i64())
            .client(&client),
        &connection,
    );

    tracing::info!("User \"{}\" changed their password", user.username);

    (
        HxRedirect(endpoints::PROFILE_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

#[cfg(test)]
mod profile_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Form, extract::State, http::StatusCode};

    use crate::{
        audit::{ClientInfo, get_audit_log_for_user},
        auth::CurrentUser,
        endpoints,
        test_utils::{
            TEST_PASSWORD, assert_form_error_message, assert_form_input_with_value,
            assert_hx_endpoint, assert_hx_redirect, assert_valid_html, insert_test_user,
            must_get_form, parse_html_document, parse_html_fragment, seeded_connection,
        },
        user::{User, get_user_by_id, list::UserState},
    };

    use super::{
        ChangePasswordForm, ProfileForm, change_password_endpoint, get_profile_page,
        update_profile_endpoint,
    };

    fn get_state() -> (UserState, User) {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Viewer", &connection);

        (
            UserState {
                db_connection: Arc::new(Mutex::new(connection)),
            },
            user,
        )
    }

    #[tokio::test]
    async fn profile_page_shows_current_details() {
        let (state, user) = get_state();

        let response = get_profile_page(State(state), Extension(CurrentUser::from(&user))).await;

        assert_eq!(response.status(), StatusCode::OK);
        let document = parse_html_document(response).await;
        assert_valid_html(&document);
        let form = must_get_form(&document);
        assert_hx_endpoint(&form, endpoints::PROFILE_API, "hx-put");
        assert_form_input_with_value(&form, "email", "email", "alice@example.com");
    }

    #[tokio::test]
    async fn updates_profile() {
        let (state, user) = get_state();

        let response = update_profile_endpoint(
            State(state.clone()),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(ProfileForm {
                email: "alice@cashbook.com".to_owned(),
                first_name: "Alice".to_owned(),
                last_name: "Smith".to_owned(),
                phone: "555 1234".to_owned(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::PROFILE_VIEW);
        let connection = state.db_connection.lock().unwrap();
        let updated = get_user_by_id(user.id, &connection).unwrap();
        assert_eq!(updated.email, "alice@cashbook.com");
        assert_eq!(updated.display_name(), "Alice Smith");
        let audit = get_audit_log_for_user(user.id, 1, &connection).unwrap();
        assert_eq!(audit[0].action, "update_profile");
    }

    #[tokio::test]
    async fn invalid_email_is_a_field_error() {
        let (state, user) = get_state();

        let response = update_profile_endpoint(
            State(state),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(ProfileForm {
                email: "not an email".to_owned(),
                ..Default::default()
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        assert_form_error_message(&must_get_form(&html), "Enter a valid email address.");
    }

    #[tokio::test]
    async fn changes_password() {
        let (state, user) = get_state();
        let new_password = "correct horse battery staple orbit";

        let response = change_password_endpoint(
            State(state.clone()),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(ChangePasswordForm {
                current_password: TEST_PASSWORD.to_owned(),
                new_password: new_password.to_owned(),
                confirm_password: new_password.to_owned(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let connection = state.db_connection.lock().unwrap();
        let updated = get_user_by_id(user.id, &connection).unwrap();
        assert!(updated.password_hash.verify(new_password).unwrap());
    }

    #[tokio::test]
    async fn wrong_current_password_is_rejected() {
        let (state, user) = get_state();

        let response = change_password_endpoint(
            State(state.clone()),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(ChangePasswordForm {
                current_password: "wrong".to_owned(),
                new_password: "correct horse battery staple orbit".to_owned(),
                confirm_password: "correct horse battery staple orbit".to_owned(),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        assert_form_error_message(&must_get_form(&html), "Current password is incorrect.");
        let connection = state.db_connection.lock().unwrap();
        let unchanged = get_user_by_id(user.id, &connection).unwrap();
        assert!(unchanged.password_hash.verify(TEST_PASSWORD).unwrap());
    }

    #[tokio::test]
    async fn mismatched_new_password_is_rejected() {
        let (state, user) = get_state();

        let response = change_password_endpoint(
            State(state),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(ChangePasswordForm {
                current_password: TEST_PASSWORD.to_owned(),
                new_password: "correct horse battery staple orbit".to_owned(),
                confirm_password: "correct horse battery staple".to_owned(),
            }),
        )
        .await;

        let html = parse_html_fragment(response).await;
        assert_form_error_message(&must_get_form(&html), "Passwords do not match.");
    }
}
