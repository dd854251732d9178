//! Database operations for tags and the transaction/tag join table.

use rusqlite::{Connection, Row};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::TransactionId,
    tag::{Tag, TagName},
};

/// Initialize the tag table.
pub fn create_tag_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS tag (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Get the tag called `name`, creating it if it does not exist yet.
pub fn get_or_create_tag(name: &TagName, connection: &Connection) -> Result<Tag, Error> {
    connection.execute(
        "INSERT INTO tag (name, created_at) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
        (name.as_ref(), OffsetDateTime::now_utc()),
    )?;

    connection
        .prepare("SELECT id, name, created_at FROM tag WHERE name = ?1")?
        .query_row([name.as_ref()], map_row)
        .map_err(Error::from)
}

/// Retrieve all tags ordered alphabetically by name.
pub fn get_all_tags(connection: &Connection) -> Result<Vec<Tag>, Error> {
    connection
        .prepare("SELECT id, name, created_at FROM tag ORDER BY name ASC")?
        .query_map([], map_row)?
        .map(|maybe_tag| maybe_tag.map_err(Error::from))
        .collect()
}

/// Retrieve the tags attached to a transaction, ordered by name.
pub fn get_transaction_tags(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Vec<Tag>, Error> {
    connection
        .prepare(
            "SELECT tag.id, tag.name, tag.created_at
             FROM tag INNER JOIN transaction_tag ON transaction_tag.tag_id = tag.id
             WHERE transaction_tag.transaction_id = ?1
             ORDER BY tag.name ASC",
        )?
        .query_map([transaction_id], map_row)?
        .map(|maybe_tag| maybe_tag.map_err(Error::from))
        .collect()
}

/// Replace the tags on a transaction with `tag_names`, creating any tags that do not exist.
///
/// Tags that are no longer used by any transaction are kept.
pub fn set_transaction_tags(
    transaction_id: TransactionId,
    tag_names: &[TagName],
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM transaction_tag WHERE transaction_id = ?1",
        [transaction_id],
    )?;

    let mut insert_statement = connection
        .prepare("INSERT INTO transaction_tag (transaction_id, tag_id) VALUES (?1, ?2)")?;

    for tag_name in tag_names {
        let tag = get_or_create_tag(tag_name, connection)?;
        insert_statement.execute((transaction_id, tag.id))?;
    }

    Ok(())
}

fn map_row(row: &Row) -> Result<Tag, rusqlite::Error> {
    let raw_name: String = row.get(1)?;

    Ok(Tag {
        id: row.get(0)?,
        name: TagName::new_unchecked(&raw_name),
        created_at: row.get(2)?,
    })
}
