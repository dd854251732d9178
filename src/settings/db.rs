//! Key-value system settings stored in the database.

use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use time::OffsetDateTime;

use crate::{Error, database_id::DatabaseId};

/// The longest setting key that will be accepted.
pub const SETTING_KEY_MAX_LENGTH: usize = 100;

/// A named value that administrators can change at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSetting {
    pub id: DatabaseId,
    pub key: String,
    pub value: String,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub fn create_system_setting_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS system_setting (
            id INTEGER PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            value TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Set the setting `key` to `value`, creating it if it does not exist.
///
/// The description is only replaced when one is given. Returns the setting as
/// it was before the change, if there was one.
pub fn upsert_setting(
    key: &str,
    value: &str,
    description: Option<&str>,
    connection: &Connection,
) -> Result<Option<SystemSetting>, Error> {
    let previous = get_setting(key, connection)?;
    let now = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO system_setting (key, value, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            description = COALESCE(excluded.description, system_setting.description),
            updated_at = excluded.updated_at",
        (key, value, description, now),
    )?;

    Ok(previous)
}

pub fn get_setting(key: &str, connection: &Connection) -> Result<Option<SystemSetting>, Error> {
    connection
        .prepare(
            "SELECT id, key, value, description, created_at, updated_at
             FROM system_setting WHERE key = ?1",
        )?
        .query_row([key], map_row)
        .optional()
        .map_err(Error::from)
}

pub fn get_all_settings(connection: &Connection) -> Result<Vec<SystemSetting>, Error> {
    connection
        .prepare(
            "SELECT id, key, value, description, created_at, updated_at
             FROM system_setting ORDER BY key ASC",
        )?
        .query_map([], map_row)?
        .map(|maybe_setting| maybe_setting.map_err(Error::from))
        .collect()
}

fn map_row(row: &Row) -> Result<SystemSetting, rusqlite::Error> {
    Ok(SystemSetting {
        id: row.get(0)?,
        key: row.get(1)?,
        value: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod system_setting_tests {
    use rusqlite::Connection;

    use crate::db::initialize;

    use super::{get_all_settings, get_setting, upsert_setting};

    fn get_test_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn upsert_creates_then_updates() {
        let connection = get_test_connection();

        let previous =
            upsert_setting("currency", "NZD", Some("Display currency"), &connection).unwrap();
        assert_eq!(previous, None);

        let previous = upsert_setting("currency", "AUD", None, &connection).unwrap();
        assert_eq!(previous.unwrap().value, "NZD");

        let setting = get_setting("currency", &connection).unwrap().unwrap();
        assert_eq!(setting.value, "AUD");
        assert_eq!(setting.description.as_deref(), Some("Display currency"));
        assert_eq!(get_all_settings(&connection).unwrap().len(), 1);
    }

    #[test]
    fn missing_setting_is_none() {
        let connection = get_test_connection();

        assert_eq!(get_setting("nope", &connection).unwrap(), None);
    }

    #[test]
    fn settings_are_sorted_by_key() {
        let connection = get_test_connection();
        upsert_setting("b", "2", None, &connection).unwrap();
        upsert_setting("a", "1", None, &connection).unwrap();

        let keys: Vec<_> = get_all_settings(&connection)
            .unwrap()
            .into_iter()
            .map(|setting| setting.key)
            .collect();

        assert_eq!(keys, ["a", "b"]);
    }
}
