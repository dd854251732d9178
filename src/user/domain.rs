//! User types and validation of the user forms.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{database_id::RoleId, user::PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The unique name the user logs in with.
    pub username: String,
    /// The user's unique email address.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// The user's phone number.
    pub phone: String,
    /// The ID of the user's role.
    pub role_id: RoleId,
    /// The name of the user's role, e.g. "Manager".
    pub role_name: String,
    /// Deactivated users cannot log in.
    pub is_active: bool,
    /// When the user was registered.
    pub created_at: OffsetDateTime,
    /// When the user was last changed.
    pub updated_at: OffsetDateTime,
}

impl User {
    /// The user's full name, or their username if they have not set a name.
    pub fn display_name(&self) -> String {
        let full_name = format!("{} {}", self.first_name, self.last_name);
        let full_name = full_name.trim();

        if full_name.is_empty() {
            self.username.clone()
        } else {
            full_name.to_owned()
        }
    }
}

/// The data needed to register a new user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// The unique name the user logs in with.
    pub username: String,
    /// The user's unique email address.
    pub email: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's given name.
    pub first_name: String,
    /// The user's family name.
    pub last_name: String,
    /// The user's phone number.
    pub phone: String,
    /// The ID of the user's role.
    pub role_id: RoleId,
}

/// The validated profile fields shared by the user forms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProfileFields {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Error messages for the fields of a user form.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UserFormErrors {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
    pub role: Option<String>,
}

impl UserFormErrors {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

const USERNAME_MIN_LENGTH: usize = 3;
const USERNAME_MAX_LENGTH: usize = 80;
const NAME_MAX_LENGTH: usize = 50;
const PHONE_MAX_LENGTH: usize = 20;
const EMAIL_MAX_LENGTH: usize = 120;

/// Check the length of a username.
pub fn validate_username(username: &str) -> Result<String, String> {
    let username = username.trim();
    let length = username.chars().count();

    if !(USERNAME_MIN_LENGTH..=USERNAME_MAX_LENGTH).contains(&length) {
        return Err(format!(
            "Username must be between {USERNAME_MIN_LENGTH} and {USERNAME_MAX_LENGTH} characters."
        ));
    }

    Ok(username.to_owned())
}

/// Check that `email` has the shape local@domain.tld.
pub fn validate_email(email: &str) -> Result<String, String> {
    let email = email.trim();
    let invalid = || Err("Enter a valid email address.".to_owned());

    if email.is_empty() || email.len() > EMAIL_MAX_LENGTH || email.contains(char::is_whitespace) {
        return invalid();
    }

    let Some((local, domain)) = email.split_once('@') else {
        return invalid();
    };

    let domain_is_valid = domain
        .split_once('.')
        .is_some_and(|(name, tld)| !name.is_empty() && !tld.is_empty() && !tld.ends_with('.'));

    if local.is_empty() || domain.contains('@') || !domain_is_valid {
        return invalid();
    }

    Ok(email.to_owned())
}

fn validate_max_length(value: &str, max_length: usize, field: &str) -> Result<String, String> {
    let value = value.trim();

    if value.chars().count() > max_length {
        return Err(format!("{field} must be at most {max_length} characters."));
    }

    Ok(value.to_owned())
}

/// Validate the email, name and phone fields, recording any problems in `errors`.
pub fn validate_profile_fields(
    email: &str,
    first_name: &str,
    last_name: &str,
    phone: &str,
    errors: &mut UserFormErrors,
) -> ProfileFields {
    let take = |result: Result<String, String>, slot: &mut Option<String>| match result {
        Ok(value) => value,
        Err(message) => {
            *slot = Some(message);
            String::new()
        }
    };

    ProfileFields {
        email: take(validate_email(email), &mut errors.email),
        first_name: take(
            validate_max_length(first_name, NAME_MAX_LENGTH, "First name"),
            &mut errors.first_name,
        ),
        last_name: take(
            validate_max_length(last_name, NAME_MAX_LENGTH, "Last name"),
            &mut errors.last_name,
        ),
        phone: take(
            validate_max_length(phone, PHONE_MAX_LENGTH, "Phone"),
            &mut errors.phone,
        ),
    }
}

#[cfg(test)]
mod validation_tests {
    use super::{UserFormErrors, validate_email, validate_profile_fields, validate_username};

    #[test]
    fn username_length_is_checked() {
        assert!(validate_username("ab").is_err());
        assert_eq!(validate_username("  abc "), Ok("abc".to_owned()));
        assert!(validate_username(&"a".repeat(81)).is_err());
    }

    #[test]
    fn email_shape_is_checked() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("alice@@example.com").is_err());
        assert!(validate_email("al ice@example.com").is_err());
    }

    #[test]
    fn profile_errors_are_collected() {
        let mut errors = UserFormErrors::default();

        validate_profile_fields(
            "not-an-email",
            &"x".repeat(51),
            "Smith",
            "021 123 4567",
            &mut errors,
        );

        assert!(errors.email.is_some());
        assert!(errors.first_name.is_some());
        assert!(errors.last_name.is_none());
        assert!(errors.phone.is_none());
        assert!(!errors.is_empty());
    }
}
