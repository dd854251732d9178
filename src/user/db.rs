//! Creating the user table and reading and writing users.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::RoleId,
    user::{NewUser, PasswordHash, ProfileFields, User, UserID},
};

/// The editable fields of a user, as changed by an administrator.
#[derive(Debug, Clone, PartialEq)]
pub struct UserUpdate {
    pub username: String,
    pub profile: ProfileFields,
    pub role_id: RoleId,
    pub is_active: bool,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
            id INTEGER PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            role_id INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(role_id) REFERENCES role(id) ON UPDATE CASCADE ON DELETE RESTRICT
        )",
        (),
    )?;

    Ok(())
}

const SELECT_USER: &str = "SELECT user.id, username, email, password, first_name, last_name, phone,
    role_id, role.name, is_active, created_at, updated_at
    FROM user INNER JOIN role ON role.id = user.role_id";

/// Map unique and foreign key violations on the user table to domain errors.
fn map_constraint_error(
    error: rusqlite::Error,
    username: &str,
    email: &str,
    role_id: RoleId,
) -> Error {
    match error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            Some(ref message),
        ) if message.contains("user.username") => Error::DuplicateUsername(username.to_owned()),
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
            },
            Some(ref message),
        ) if message.contains("user.email") => Error::DuplicateEmail(email.to_owned()),
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: _,
                extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
            },
            _,
        ) => Error::InvalidRole(role_id),
        error => error.into(),
    }
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a:
/// - [Error::DuplicateUsername] or [Error::DuplicateEmail] if another user has the same username or email,
/// - [Error::InvalidRole] if the role ID does not refer to a role,
/// - [Error::SqlError] if some other SQL error occurred.
pub fn create_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .execute(
            "INSERT INTO user (username, email, password, first_name, last_name, phone, role_id,
                is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?8)",
            (
                &new_user.username,
                &new_user.email,
                &new_user.password_hash,
                &new_user.first_name,
                &new_user.last_name,
                &new_user.phone,
                new_user.role_id,
                now,
            ),
        )
        .map_err(|error| {
            map_constraint_error(error, &new_user.username, &new_user.email, new_user.role_id)
        })?;

    get_user_by_id(UserID::new(connection.last_insert_rowid()), connection)
}

/// Get the user from the database with an ID equal to `user_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `user_id` does not belong to a registered user.
/// - there was an error trying to access the store.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("{SELECT_USER} WHERE user.id = ?1"))?
        .query_row([user_id.as_i64()], map_row)
        .map_err(Error::from)
}

/// Get the user with the username `username`.
///
/// # Errors
///
/// Returns [Error::NotFound] if no user has that username.
pub fn get_user_by_username(username: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .prepare(&format!("{SELECT_USER} WHERE user.username = ?1"))?
        .query_row([username], map_row)
        .map_err(Error::from)
}

/// Get all users ordered by username.
pub fn get_all_users(connection: &Connection) -> Result<Vec<User>, Error> {
    connection
        .prepare(&format!("{SELECT_USER} ORDER BY username"))?
        .query_map([], map_row)?
        .map(|maybe_user| maybe_user.map_err(Error::from))
        .collect()
}

/// Get the number of users that can log in.
pub fn count_active_users(connection: &Connection) -> Result<u64, Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(id) FROM user WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;

    Ok(count as u64)
}

/// Overwrite the administrator editable fields of the user with `user_id`.
///
/// # Errors
///
/// Returns [Error::UpdateMissingUser] if there is no such user, or the same
/// errors as [create_user] for duplicate or invalid values.
pub fn update_user(user_id: UserID, update: &UserUpdate, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection
        .execute(
            "UPDATE user
             SET username = ?1, email = ?2, first_name = ?3, last_name = ?4, phone = ?5,
                role_id = ?6, is_active = ?7, updated_at = ?8
             WHERE id = ?9",
            (
                &update.username,
                &update.profile.email,
                &update.profile.first_name,
                &update.profile.last_name,
                &update.profile.phone,
                update.role_id,
                update.is_active,
                OffsetDateTime::now_utc(),
                user_id.as_i64(),
            ),
        )
        .map_err(|error| {
            map_constraint_error(error, &update.username, &update.profile.email, update.role_id)
        })?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}

/// Update the fields a user may change on their own profile.
///
/// # Errors
///
/// Returns [Error::UpdateMissingUser] if there is no such user or
/// [Error::DuplicateEmail] if another user has the email.
pub fn update_profile(
    user_id: UserID,
    profile: &ProfileFields,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection
        .execute(
            "UPDATE user
             SET email = ?1, first_name = ?2, last_name = ?3, phone = ?4, updated_at = ?5
             WHERE id = ?6",
            (
                &profile.email,
                &profile.first_name,
                &profile.last_name,
                &profile.phone,
                OffsetDateTime::now_utc(),
                user_id.as_i64(),
            ),
        )
        .map_err(|error| map_constraint_error(error, "", &profile.email, 0))?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}

/// Replace the password hash of the user with `user_id`.
///
/// # Errors
///
/// Returns [Error::UpdateMissingUser] if there is no such user.
pub fn update_password(
    user_id: UserID,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET password = ?1, updated_at = ?2 WHERE id = ?3",
        (password_hash, OffsetDateTime::now_utc(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}

/// Mark the user with `user_id` as inactive.
///
/// The user's row and everything that refers to it are kept.
///
/// # Errors
///
/// Returns [Error::UpdateMissingUser] if there is no such user.
pub fn deactivate_user(user_id: UserID, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET is_active = 0, updated_at = ?1 WHERE id = ?2",
        (OffsetDateTime::now_utc(), user_id.as_i64()),
    )?;

    if rows_affected == 0 {
        return Err(Error::UpdateMissingUser);
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<User, rusqlite::Error> {
    Ok(User {
        id: UserID::new(row.get(0)?),
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        phone: row.get(6)?,
        role_id: row.get(7)?,
        role_name: row.get(8)?,
        is_active: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}
