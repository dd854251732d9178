//! Database operations for categories.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{Category, NewCategory},
    database_id::CategoryId,
};

pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            color TEXT NOT NULL DEFAULT '#007bff',
            is_system INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Insert a category and return it with its generated ID.
pub fn create_category(category: NewCategory, connection: &Connection) -> Result<Category, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO category (name, description, color, is_system, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            &category.name,
            &category.description,
            &category.color,
            category.is_system,
            created_at,
        ),
    )?;

    Ok(Category {
        id: connection.last_insert_rowid(),
        name: category.name,
        description: category.description,
        color: category.color,
        is_system: category.is_system,
        created_at,
    })
}

pub fn get_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare(
            "SELECT id, name, description, color, is_system, created_at
             FROM category WHERE id = ?1",
        )?
        .query_row([category_id], map_row)
        .map_err(Error::from)
}

/// Retrieve all categories ordered by name.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare(
            "SELECT id, name, description, color, is_system, created_at
             FROM category ORDER BY name ASC, id ASC",
        )?
        .query_map([], map_row)?
        .map(|maybe_category| maybe_category.map_err(Error::from))
        .collect()
}

/// Whether a system category called `name` exists.
pub fn system_category_exists(name: &str, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM category WHERE name = ?1 AND is_system = 1)",
            [name],
            |row| row.get(0),
        )
        .map_err(Error::from)
}

/// Delete a user created category that no transaction refers to.
///
/// # Errors
///
/// Returns a:
/// - [Error::DeleteMissingCategory] if there is no category with `category_id`,
/// - [Error::SystemCategory] if the category is built in,
/// - [Error::CategoryInUse] if a transaction still has the category.
pub fn delete_category(category_id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    let category = match get_category(category_id, connection) {
        Ok(category) => category,
        Err(Error::NotFound) => return Err(Error::DeleteMissingCategory),
        Err(error) => return Err(error),
    };

    if category.is_system {
        return Err(Error::SystemCategory);
    }

    let is_in_use: bool = connection.query_row(
        "SELECT EXISTS(SELECT 1 FROM \"transaction\" WHERE category_id = ?1)",
        [category_id],
        |row| row.get(0),
    )?;

    if is_in_use {
        return Err(Error::CategoryInUse);
    }

    connection
        .execute("DELETE FROM category WHERE id = ?1", [category_id])
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code: rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY,
                },
                _,
            ) => Error::CategoryInUse,
            error => error.into(),
        })?;

    Ok(category)
}

fn map_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        is_system: row.get(4)?,
        created_at: row.get(5)?,
    })
}
