use rusqlite::Connection;

use crate::{
    db::initialize,
    role::{Role, get_role_by_name, insert_role_if_missing},
    seed::seed_categories,
    user::{NewUser, PasswordHash, User, create_user},
};

/// The password of every user created by [insert_test_user].
pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// An in-memory database with the tables, roles and default categories.
pub(crate) fn seeded_connection() -> Connection {
    let connection = Connection::open_in_memory().unwrap();
    initialize(&connection).unwrap();

    for role in Role::ALL {
        insert_role_if_missing(role, &connection).unwrap();
    }
    seed_categories(&connection).unwrap();

    connection
}

/// Create an active user with the role `role_name` and the password [TEST_PASSWORD].
///
/// The role is added to the database if it is missing.
pub(crate) fn insert_test_user(username: &str, role_name: &str, connection: &Connection) -> User {
    let role: Role = role_name.parse().unwrap();
    insert_role_if_missing(role, connection).unwrap();
    let role = get_role_by_name(role_name, connection).unwrap();

    create_user(
        NewUser {
            username: username.to_owned(),
            email: format!("{username}@example.com"),
            password_hash: PasswordHash::from_raw_password(TEST_PASSWORD, 4).unwrap(),
            first_name: String::new(),
            last_name: String::new(),
            phone: String::new(),
            role_id: role.id,
        },
        connection,
    )
    .unwrap()
}
