//! The form shared by the pages for registering and editing users.

use maud::{Markup, html};
use serde::Deserialize;

use crate::{
    Error,
    database_id::RoleId,
    endpoints::{self, format_endpoint},
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, InputField, field_error, submit_button},
    role::RoleRecord,
    user::{
        ProfileFields, UserFormErrors, UserID, ValidatedPassword, validate_profile_fields,
        validate_username,
    },
};

/// The raw data entered into the user form.
#[derive(Debug, Clone, Deserialize)]
pub struct UserForm {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    pub role_id: RoleId,
    /// Set by a checkbox on the edit form, `Some` means active.
    pub is_active: Option<String>,
}

/// A user form that passed validation.
#[derive(Debug)]
pub(super) struct ValidatedUserForm {
    pub username: String,
    pub profile: ProfileFields,
    /// `None` if the password was left blank on the edit form.
    pub password: Option<ValidatedPassword>,
    pub role_id: RoleId,
}

/// Check every field of `form`, collecting one message per invalid field.
///
/// A blank password is only accepted when `password_required` is false.
pub(super) fn validate_user_form(
    form: &UserForm,
    roles: &[RoleRecord],
    password_required: bool,
) -> Result<ValidatedUserForm, UserFormErrors> {
    let mut errors = UserFormErrors::default();

    let username = validate_username(&form.username).unwrap_or_else(|message| {
        errors.username = Some(message);
        String::new()
    });

    let profile = validate_profile_fields(
        &form.email,
        &form.first_name,
        &form.last_name,
        &form.phone,
        &mut errors,
    );

    let password = if form.password.is_empty() && !password_required {
        None
    } else if form.password.is_empty() {
        errors.password = Some("Enter a password.".to_owned());
        None
    } else if form.password != form.confirm_password {
        errors.confirm_password = Some("Passwords do not match.".to_owned());
        None
    } else {
        match ValidatedPassword::new(&form.password, &[&form.username, &form.email]) {
            Ok(password) => Some(password),
            Err(error) => {
                errors.password = Some(error.to_string());
                None
            }
        }
    };

    if !roles.iter().any(|role| role.id == form.role_id) {
        errors.role = Some("Choose a valid role.".to_owned());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidatedUserForm {
        username,
        profile,
        password,
        role_id: form.role_id,
    })
}

/// Turn a uniqueness or role error from the database into a field error.
///
/// Returns `false` if `error` does not belong to a form field.
pub(super) fn set_field_error(error: &Error, errors: &mut UserFormErrors) -> bool {
    match error {
        Error::DuplicateUsername(_) => {
            errors.username = Some("That username is already taken.".to_owned());
        }
        Error::DuplicateEmail(_) => {
            errors.email = Some("That email is already registered.".to_owned());
        }
        Error::InvalidRole(_) => errors.role = Some("Choose a valid role.".to_owned()),
        _ => return false,
    }

    true
}

/// Whether the form registers a new user or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum UserFormMode {
    Create,
    Edit(UserID),
}

pub(super) fn user_form(
    mode: UserFormMode,
    form: &UserForm,
    roles: &[RoleRecord],
    errors: &UserFormErrors,
) -> Markup {
    let password_field = InputField::text("password", "Password")
        .input_type("password")
        .error(errors.password.as_deref());
    let confirm_password_field = InputField::text("confirm_password", "Confirm password")
        .input_type("password")
        .error(errors.confirm_password.as_deref());

    let (password_field, confirm_password_field, submit_text) = match mode {
        UserFormMode::Create => (password_field, confirm_password_field, "Create User"),
        UserFormMode::Edit(_) => (
            password_field.optional(),
            confirm_password_field.optional(),
            "Save Changes",
        ),
    };

    let form_body = html! {
        (InputField::text("username", "Username")
            .value(&form.username)
            .error(errors.username.as_deref())
            .into_html())
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

        div
        {
            label for="role_id" class=(FORM_LABEL_STYLE) { "Role" }

            select name="role_id" id="role_id" required class=(FORM_TEXT_INPUT_STYLE)
            {
                @for role in roles {
                    option value=(role.id) selected[role.id == form.role_id]
                    {
                        (role.name) " - " (role.description)
                    }
                }
            }

            (field_error(errors.role.as_deref()))
        }

        @if let UserFormMode::Edit(_) = mode {
            p class="text-sm text-gray-500 dark:text-gray-400"
            {
                "Leave the password blank to keep the current password."
            }
        }

        (password_field.into_html())
        (confirm_password_field.into_html())

        @if let UserFormMode::Edit(_) = mode {
            div class="flex items-center gap-x-3"
            {
                input
                    type="checkbox"
                    name="is_active"
                    id="is_active"
                    checked[form.is_active.is_some()]
                    class="rounded-xs";

                label for="is_active" class=(FORM_LABEL_STYLE) { "Active" }
            }
        }

        (submit_button(submit_text))
    };

    match mode {
        UserFormMode::Create => html! {
            form
                hx-post=(endpoints::USERS_API)
                hx-target="this"
                hx-swap="outerHTML"
                hx-target-error="#alert-container"
                class="w-full space-y-4 md:space-y-6"
            {
                (form_body)
            }
        },
        UserFormMode::Edit(user_id) => html! {
            form
                hx-put=(format_endpoint(endpoints::USER, user_id.as_i64()))
                hx-target="this"
                hx-swap="outerHTML"
                hx-target-error="#alert-container"
                class="w-full space-y-4 md:space-y-6"
            {
                (form_body)
            }
        },
    }
}
