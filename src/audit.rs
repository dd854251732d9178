//! The append-only audit log of user actions.
//!
//! Writing an audit entry never fails the operation that is being audited:
//! [log_audit_action] reports its own errors through `tracing` and returns nothing.

use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use rusqlite::{Connection, Row};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{Error, database_id::DatabaseId, user::UserID};

/// The actions that are recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    LogIn,
    LogOut,
    CreateTransaction,
    UpdateTransaction,
    DeleteTransaction,
    DeleteReceipt,
    CreateUser,
    UpdateUser,
    DeactivateUser,
    UpdateProfile,
    ChangePassword,
    CreateCategory,
    DeleteCategory,
    CreateSpendingLimit,
    DeleteSpendingLimit,
    UpdateSetting,
    GenerateReport,
    Backup,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::LogIn => "login",
            AuditAction::LogOut => "logout",
            AuditAction::CreateTransaction => "create_transaction",
            AuditAction::UpdateTransaction => "update_transaction",
            AuditAction::DeleteTransaction => "delete_transaction",
            AuditAction::DeleteReceipt => "delete_receipt",
            AuditAction::CreateUser => "create_user",
            AuditAction::UpdateUser => "update_user",
            AuditAction::DeactivateUser => "deactivate_user",
            AuditAction::UpdateProfile => "update_profile",
            AuditAction::ChangePassword => "change_password",
            AuditAction::CreateCategory => "create_category",
            AuditAction::DeleteCategory => "delete_category",
            AuditAction::CreateSpendingLimit => "create_spending_limit",
            AuditAction::DeleteSpendingLimit => "delete_spending_limit",
            AuditAction::UpdateSetting => "update_setting",
            AuditAction::GenerateReport => "generate_report",
            AuditAction::Backup => "backup",
        }
    }
}

/// The IP address and user agent of the client that sent a request.
///
/// Behind a proxy the first address in `X-Forwarded-For` is used, then
/// `X-Real-IP`, and finally the address of the connected socket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    fn from_parts(parts: &Parts) -> Self {
        let socket_address = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(address)| address.ip().to_string());

        Self {
            ip_address: forwarded_ip_address(&parts.headers).or(socket_address),
            user_agent: header_value(&parts.headers, "user-agent"),
        }
    }
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn forwarded_ip_address(headers: &HeaderMap) -> Option<String> {
    header_value(headers, "x-forwarded-for")
        .and_then(|forwarded_for| {
            forwarded_for
                .split(',')
                .next()
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .map(str::to_owned)
        })
        .or_else(|| header_value(headers, "x-real-ip"))
}

/// A record of an action to be written to the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub user_id: Option<UserID>,
    pub table_name: Option<&'static str>,
    pub record_id: Option<DatabaseId>,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub client: ClientInfo,
}

impl AuditEntry {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            user_id: None,
            table_name: None,
            record_id: None,
            old_values: None,
            new_values: None,
            client: ClientInfo::default(),
        }
    }

    pub fn user(mut self, user_id: UserID) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Set the table and the ID of the row that the action affected.
    pub fn target(mut self, table_name: &'static str, record_id: DatabaseId) -> Self {
        self.table_name = Some(table_name);
        self.record_id = Some(record_id);
        self
    }

    /// Set the snapshots of the affected values before and after the action.
    pub fn values(mut self, old_values: Option<Value>, new_values: Option<Value>) -> Self {
        self.old_values = old_values;
        self.new_values = new_values;
        self
    }

    pub fn client(mut self, client: &ClientInfo) -> Self {
        self.client = client.clone();
        self
    }
}

/// A row of the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogRecord {
    pub id: DatabaseId,
    pub user_id: Option<UserID>,
    pub action: String,
    pub table_name: Option<String>,
    pub record_id: Option<DatabaseId>,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: OffsetDateTime,
}

pub fn create_audit_log_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY,
            user_id INTEGER,
            action TEXT NOT NULL,
            table_name TEXT,
            record_id INTEGER,
            old_values TEXT,
            new_values TEXT,
            ip_address TEXT,
            user_agent TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_user_id ON audit_log(user_id);",
    )?;

    Ok(())
}

/// Append `entry` to the audit log.
///
/// Errors are logged and otherwise ignored so that a failure to audit an action
/// never undoes or blocks the action itself.
pub fn log_audit_action(entry: AuditEntry, connection: &Connection) {
    let action = entry.action.as_str();

    if let Err(error) = insert_audit_entry(&entry, connection) {
        tracing::error!("Could not write audit log entry for action \"{action}\": {error}");
    }
}

fn insert_audit_entry(entry: &AuditEntry, connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "INSERT INTO audit_log (user_id, action, table_name, record_id, old_values, new_values,
            ip_address, user_agent, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        (
            entry.user_id.map(|id| id.as_i64()),
            entry.action.as_str(),
            entry.table_name,
            entry.record_id,
            entry.old_values.as_ref().map(Value::to_string),
            entry.new_values.as_ref().map(Value::to_string),
            &entry.client.ip_address,
            &entry.client.user_agent,
            OffsetDateTime::now_utc(),
        ),
    )?;

    Ok(())
}

/// Get the most recent `limit` audit log entries for the user with `user_id`,
/// newest first.
pub fn get_audit_log_for_user(
    user_id: UserID,
    limit: u64,
    connection: &Connection,
) -> Result<Vec<AuditLogRecord>, Error> {
    connection
        .prepare(
            "SELECT id, user_id, action, table_name, record_id, old_values, new_values,
                ip_address, user_agent, created_at
             FROM audit_log
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?
        .query_map((user_id.as_i64(), limit as i64), map_row)?
        .map(|maybe_record| maybe_record.map_err(Error::from))
        .collect()
}

fn map_row(row: &Row) -> Result<AuditLogRecord, rusqlite::Error> {
    Ok(AuditLogRecord {
        id: row.get(0)?,
        user_id: row.get::<_, Option<i64>>(1)?.map(UserID::new),
        action: row.get(2)?,
        table_name: row.get(3)?,
        record_id: row.get(4)?,
        old_values: row.get(5)?,
        new_values: row.get(6)?,
        ip_address: row.get(7)?,
        user_agent: row.get(8)?,
        created_at: row.get(9)?,
    })
}
