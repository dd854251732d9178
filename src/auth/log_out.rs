//! Log-out route handler that invalidates authentication cookies and redirects users.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use rusqlite::Connection;

use crate::{
    AppState,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::{CurrentUser, invalidate_auth_cookie},
    endpoints,
};

#[derive(Debug, Clone)]
pub struct LogOutState {
    pub cookie_key: Key,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogOutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

impl FromRef<LogOutState> for Key {
    fn from_ref(state: &LogOutState) -> Self {
        state.cookie_key.clone()
    }
}

/// Invalidate the auth cookie and redirect the client to the log-in page.
pub async fn get_log_out(
    State(state): State<LogOutState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    jar: PrivateCookieJar,
) -> Response {
    match state.db_connection.lock() {
        Ok(connection) => log_audit_action(
            AuditEntry::new(AuditAction::LogOut)
                .user(user.id)
                .client(&client),
            &connection,
        ),
        Err(error) => tracing::error!("could not acquire database lock: {error}"),
    }

    tracing::info!("User \"{}\" logged out", user.username);
    let jar = invalidate_auth_cookie(jar);

    (jar, Redirect::to(endpoints::LOG_IN_VIEW)).into_response()
}

#[cfg(test)]
mod log_out_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::State,
        http::{StatusCode, header::SET_COOKIE},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key},
    };
    use sha2::{Digest, Sha512};
    use time::OffsetDateTime;

    use crate::{
        audit::{ClientInfo, get_audit_log_for_user},
        auth::{COOKIE_TOKEN, CurrentUser, DEFAULT_COOKIE_DURATION, set_auth_cookie},
        endpoints,
        test_utils::{insert_test_user, seeded_connection},
    };

    use super::{LogOutState, get_log_out};

    #[tokio::test]
    async fn log_out_invalidates_auth_cookie_and_redirects() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Viewer", &connection);
        let state = LogOutState {
            cookie_key: Key::from(&Sha512::digest("42")),
            db_connection: Arc::new(Mutex::new(connection)),
        };
        let jar = set_auth_cookie(
            PrivateCookieJar::new(state.cookie_key.clone()),
            user.id,
            DEFAULT_COOKIE_DURATION,
        )
        .unwrap();

        let response = get_log_out(
            State(state.clone()),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            jar,
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get("location").unwrap(),
            endpoints::LOG_IN_VIEW
        );

        let cookie = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|header| Cookie::parse(header.to_str().unwrap().to_owned()).unwrap())
            .find(|cookie| cookie.name() == COOKIE_TOKEN)
            .expect("auth cookie was not replaced");
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));

        let connection = state.db_connection.lock().unwrap();
        let entries = get_audit_log_for_user(user.id, 10, &connection).unwrap();
        assert_eq!(entries[0].action, "logout");
    }
}
