//! Roles and the fixed table of permissions that each role grants.

use std::{fmt::Display, str::FromStr};

use rusqlite::{Connection, Row};
use serde::Serialize;

use crate::{Error, database_id::RoleId};

/// An action that a role may be allowed to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Create transactions, categories and spending limits.
    Create,
    /// View transactions and the dashboard.
    Read,
    /// Edit transactions and receipts.
    Update,
    /// Delete transactions, receipts, categories and spending limits.
    Delete,
    /// Register, edit and deactivate users, and see every user's transactions.
    ManageUsers,
    /// Generate reports.
    Reports,
    /// Download a backup of the ledger.
    Backup,
}

impl Permission {
    /// The permission's label, e.g. "manage_users".
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Create => "create",
            Permission::Read => "read",
            Permission::Update => "update",
            Permission::Delete => "delete",
            Permission::ManageUsers => "manage_users",
            Permission::Reports => "reports",
            Permission::Backup => "backup",
        }
    }
}

/// The roles a user can be assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Full system access.
    Admin,
    /// Can manage the ledger but not users or backups.
    Manager,
    /// Read-only access to data and reports.
    Viewer,
}

impl Role {
    /// All roles, from most to least privileged.
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::Viewer];

    /// The role's name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::Viewer => "Viewer",
        }
    }

    /// A short summary of what the role can do.
    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Full system access",
            Role::Manager => "Add/view transactions, manage expenses, generate reports",
            Role::Viewer => "Read-only access to data and reports",
        }
    }

    /// The permissions granted to the role.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => &[
                Permission::Create,
                Permission::Read,
                Permission::Update,
                Permission::Delete,
                Permission::ManageUsers,
                Permission::Reports,
                Permission::Backup,
            ],
            Role::Manager => &[
                Permission::Create,
                Permission::Read,
                Permission::Update,
                Permission::Delete,
                Permission::Reports,
            ],
            Role::Viewer => &[Permission::Read, Permission::Reports],
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or(Error::NotFound)
    }
}

/// The permissions granted to the role named `role_name`.
///
/// An unknown role name grants nothing.
pub fn permissions_for_role(role_name: &str) -> &'static [Permission] {
    role_name
        .parse::<Role>()
        .map(|role| role.permissions())
        .unwrap_or(&[])
}

/// Whether the role named `role_name` grants `permission`.
pub fn has_permission(role_name: &str, permission: Permission) -> bool {
    permissions_for_role(role_name).contains(&permission)
}

/// A role as stored in the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleRecord {
    pub id: RoleId,
    pub name: String,
    pub description: String,
}

pub fn create_role_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS role (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT ''
        )",
        (),
    )?;

    Ok(())
}

/// Insert `role` if a role with the same name does not exist yet.
///
/// Returns whether the role was inserted.
pub fn insert_role_if_missing(role: Role, connection: &Connection) -> Result<bool, Error> {
    let rows_affected = connection.execute(
        "INSERT INTO role (name, description) VALUES (?1, ?2)
         ON CONFLICT(name) DO NOTHING",
        (role.as_str(), role.description()),
    )?;

    Ok(rows_affected > 0)
}

/// Get all roles ordered by ID.
pub fn get_all_roles(connection: &Connection) -> Result<Vec<RoleRecord>, Error> {
    connection
        .prepare("SELECT id, name, description FROM role ORDER BY id")?
        .query_map([], map_row)?
        .map(|maybe_role| maybe_role.map_err(Error::from))
        .collect()
}

/// Get the role with the name `name`.
///
/// # Errors
/// Returns [Error::NotFound] if there is no role with that name.
pub fn get_role_by_name(name: &str, connection: &Connection) -> Result<RoleRecord, Error> {
    connection
        .prepare("SELECT id, name, description FROM role WHERE name = ?1")?
        .query_row([name], map_row)
        .map_err(Error::from)
}

fn map_row(row: &Row) -> Result<RoleRecord, rusqlite::Error> {
    Ok(RoleRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}


#[cfg(test)]
mod role_table_tests {
    use rusqlite::Connection;

    use crate::{Error, db::initialize};

    use super::{Role, get_all_roles, get_role_by_name, insert_role_if_missing};

    fn get_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        connection
    }

    #[test]
    fn insert_role_only_once() {
        let connection = get_connection();

        assert!(insert_role_if_missing(Role::Admin, &connection).unwrap());
        assert!(!insert_role_if_missing(Role::Admin, &connection).unwrap());

        assert_eq!(get_all_roles(&connection).unwrap().len(), 1);
    }

    #[test]
    fn get_role_by_name_returns_description() {
        let connection = get_connection();
        insert_role_if_missing(Role::Viewer, &connection).unwrap();

        let role = get_role_by_name("Viewer", &connection).unwrap();

        assert_eq!(role.description, "Read-only access to data and reports");
    }

    #[test]
    fn get_missing_role_is_not_found() {
        let connection = get_connection();

        assert_eq!(
            get_role_by_name("Viewer", &connection),
            Err(Error::NotFound)
        );
    }
}
