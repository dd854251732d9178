//! Creates the default roles, admin account and categories on start up.
//!
//! Every step checks whether its rows already exist, so seeding an existing
//! database is a no-op.

use rusqlite::Connection;

use crate::{
    Error,
    category::{NewCategory, create_category, system_category_exists},
    role::{Role, get_role_by_name, insert_role_if_missing},
    user::{NewUser, PasswordHash, ValidatedPassword, create_user, get_user_by_username},
};

const ADMIN_USERNAME: &str = "admin";
const ADMIN_EMAIL: &str = "admin@cashbook.com";
const ADMIN_PASSWORD: &str = "admin123";

/// The built-in categories and their colours.
const SYSTEM_CATEGORIES: [(&str, &str); 9] = [
    ("Food & Dining", "#FF6B6B"),
    ("Transportation", "#4ECDC4"),
    ("Shopping", "#45B7D1"),
    ("Entertainment", "#96CEB4"),
    ("Bills & Utilities", "#FECA57"),
    ("Healthcare", "#FF9FF3"),
    ("Salary", "#54A0FF"),
    ("Investment", "#5F27CD"),
    ("Other", "#999999"),
];

/// Add the default roles, admin account and system categories if they are missing.
///
/// # Errors
///
/// Returns an [Error::SqlError] if a row could not be inserted, in which case
/// nothing is seeded.
pub fn seed_defaults(connection: &Connection) -> Result<(), Error> {
    seed_defaults_with_cost(connection, PasswordHash::DEFAULT_COST)
}

fn seed_defaults_with_cost(connection: &Connection, password_cost: u32) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    seed_roles(&transaction)?;
    seed_admin_user(&transaction, password_cost)?;
    seed_categories(&transaction)?;

    transaction.commit()?;

    Ok(())
}

pub fn seed_roles(connection: &Connection) -> Result<(), Error> {
    for role in Role::ALL {
        if insert_role_if_missing(role, connection)? {
            tracing::info!("Created role {role}");
        }
    }

    Ok(())
}

/// Create the default admin account unless a user called "admin" exists.
fn seed_admin_user(connection: &Connection, password_cost: u32) -> Result<(), Error> {
    match get_user_by_username(ADMIN_USERNAME, connection) {
        Ok(_) => return Ok(()),
        Err(Error::NotFound) => {}
        Err(error) => return Err(error),
    }

    let role = get_role_by_name(Role::Admin.as_str(), connection)?;
    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked(ADMIN_PASSWORD),
        password_cost,
    )?;

    create_user(
        NewUser {
            username: ADMIN_USERNAME.to_owned(),
            email: ADMIN_EMAIL.to_owned(),
            password_hash,
            first_name: "System".to_owned(),
            last_name: "Administrator".to_owned(),
            phone: String::new(),
            role_id: role.id,
        },
        connection,
    )?;

    tracing::warn!(
        "Created the default admin user \"{ADMIN_USERNAME}\" with the password \
        \"{ADMIN_PASSWORD}\". Change this password after logging in."
    );

    Ok(())
}

/// Create each built-in category that does not exist yet.
pub fn seed_categories(connection: &Connection) -> Result<(), Error> {
    for (name, color) in SYSTEM_CATEGORIES {
        if system_category_exists(name, connection)? {
            continue;
        }

        create_category(
            NewCategory {
                name: name.to_owned(),
                description: None,
                color: color.to_owned(),
                is_system: true,
            },
            connection,
        )?;
    }

    Ok(())
}
