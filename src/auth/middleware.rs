//! Authentication middleware that validates cookies, loads the current user, extends sessions, and handles redirects.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use axum_htmx::HxRedirect;
use rusqlite::Connection;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{
        CurrentUser,
        cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
        invalidate_auth_cookie,
        redirect::build_log_in_redirect_url,
    },
    user::{UserID, get_user_by_id},
};

/// The state needed for the auth middleware
#[derive(Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Load the user with `user_id` and check that they may still log in.
fn load_active_user(
    user_id: UserID,
    db_connection: &Mutex<Connection>,
) -> Result<CurrentUser, Error> {
    let connection = db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let user = get_user_by_id(user_id, &connection)?;

    if !user.is_active {
        return Err(Error::AccountDeactivated);
    }

    Ok(CurrentUser::from(&user))
}

#[inline]
async fn auth_guard_internal(
    state: AuthState,
    request: Request,
    next: Next,
    get_redirect: impl Fn(&str) -> Response,
) -> Response {
    let log_in_redirect_url = build_log_in_redirect_url(&request);

    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(error) => {
            tracing::error!("Error getting cookie jar: {error:?}. Redirecting to log in page.");
            return get_redirect(&log_in_redirect_url);
        }
    };

    let token = match get_token_from_cookies(&jar) {
        Ok(token) => token,
        Err(_) => return get_redirect(&log_in_redirect_url),
    };

    let current_user = match load_active_user(token.user_id, &state.db_connection) {
        Ok(current_user) => current_user,
        Err(error) => {
            tracing::warn!(
                "Rejecting auth cookie for user {}: {error}. Redirecting to log in page.",
                token.user_id
            );
            return (
                invalidate_auth_cookie(jar),
                get_redirect(&log_in_redirect_url),
            )
                .into_response();
        }
    };

    parts.extensions.insert(current_user);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(jar.clone(), state.cookie_duration) {
        Ok(updated_jar) => updated_jar,
        Err(error) => {
            tracing::error!("Error extending cookie duration: {error}. Rolling back cookie jar.");
            jar
        }
    };

    for (key, value) in jar.into_response().headers().iter() {
        if key == SET_COOKIE {
            parts.headers.append(key, value.to_owned());
        }
    }

    Response::from_parts(parts, body)
}

/// Middleware function that checks for a valid authorization cookie.
/// The [CurrentUser] is placed into the request and the request executed normally if the cookie is
/// valid and the user is active, otherwise a redirect to the log-in page is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user): Extension<CurrentUser>` to receive the user.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    auth_guard_internal(state, request, next, |redirect_url| {
        Redirect::to(redirect_url).into_response()
    })
    .await
}

/// Same as [auth_guard], but responds with a HTMX redirect for requests made by HTMX.
pub async fn auth_guard_hx(
    State(state): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    auth_guard_internal(state, request, next, |redirect_url| {
        (HxRedirect(redirect_url.to_owned()), StatusCode::OK).into_response()
    })
    .await
}

#[cfg(test)]
mod auth_guard_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension, Router,
        extract::{Path, State},
        middleware,
        routing::{get, post},
    };
    use axum_extra::extract::{
        PrivateCookieJar,
        cookie::{Cookie, Key},
    };
    use axum_test::TestServer;
    use rusqlite::Connection;
    use sha2::{Digest, Sha512};
    use time::{Duration, OffsetDateTime};

    use crate::{
        Error,
        auth::{COOKIE_TOKEN, CurrentUser, DEFAULT_COOKIE_DURATION, set_auth_cookie},
        endpoints::format_endpoint,
        test_utils::{insert_test_user, seeded_connection},
        user::{UserID, deactivate_user},
    };

    use super::{AuthState, auth_guard, auth_guard_hx};

    async fn whoami(Extension(user): Extension<CurrentUser>) -> String {
        format!("{} {}", user.username, user.role)
    }

    async fn stub_log_in_route(
        State(state): State<AuthState>,
        Path(user_id): Path<i64>,
        jar: PrivateCookieJar,
    ) -> Result<PrivateCookieJar, Error> {
        set_auth_cookie(jar, UserID::new(user_id), state.cookie_duration)
    }

    const TEST_LOG_IN_ROUTE_PATH: &str = "/log_in/{user_id}";
    const TEST_PROTECTED_ROUTE: &str = "/protected";
    const TEST_API_ROUTE: &str = "/api/protected";

    fn get_test_server(connection: Connection, cookie_duration: Duration) -> TestServer {
        let state = AuthState {
            cookie_key: Key::from(&Sha512::digest("nafstenoas")),
            cookie_duration,
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let app = Router::new()
            .route(TEST_PROTECTED_ROUTE, get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard))
            .merge(
                Router::new()
                    .route(TEST_API_ROUTE, get(whoami))
                    .route_layer(middleware::from_fn_with_state(state.clone(), auth_guard_hx)),
            )
            .route(TEST_LOG_IN_ROUTE_PATH, post(stub_log_in_route))
            .with_state(state);

        TestServer::new(app)
    }

    #[tokio::test]
    async fn valid_cookie_provides_current_user() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let server = get_test_server(connection, DEFAULT_COOKIE_DURATION);

        let response = server
            .post(&format_endpoint(TEST_LOG_IN_ROUTE_PATH, user.id.as_i64()))
            .await;
        let token_cookie = response.cookie(COOKIE_TOKEN);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(token_cookie)
            .await;

        response.assert_status_ok();
        response.assert_text("alice Manager");
    }

    #[tokio::test]
    async fn extends_cookie_on_activity() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let server = get_test_server(connection, Duration::minutes(5));

        let response = server
            .post(&format_endpoint(TEST_LOG_IN_ROUTE_PATH, user.id.as_i64()))
            .await;
        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookies(response.cookies())
            .await;

        let expires_at = response.cookie(COOKIE_TOKEN).expires_datetime().unwrap();
        assert!(
            (expires_at - (OffsetDateTime::now_utc() + Duration::minutes(5))).abs()
                < Duration::seconds(2)
        );
    }

    #[tokio::test]
    async fn missing_cookie_redirects_to_log_in() {
        let server = get_test_server(seeded_connection(), DEFAULT_COOKIE_DURATION);

        let response = server.get(TEST_PROTECTED_ROUTE).await;

        response.assert_status_see_other();
        assert_eq!(
            response.header("location"),
            "/log_in?redirect_url=%2Fprotected"
        );
    }

    #[tokio::test]
    async fn invalid_cookie_redirects_to_log_in() {
        let server = get_test_server(seeded_connection(), DEFAULT_COOKIE_DURATION);

        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookie(Cookie::new(COOKIE_TOKEN, "FOOBAR"))
            .await;

        response.assert_status_see_other();
    }

    #[tokio::test]
    async fn deactivated_user_is_logged_out() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        deactivate_user(user.id, &connection).unwrap();
        let server = get_test_server(connection, DEFAULT_COOKIE_DURATION);

        let response = server
            .post(&format_endpoint(TEST_LOG_IN_ROUTE_PATH, user.id.as_i64()))
            .await;
        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookies(response.cookies())
            .await;

        response.assert_status_see_other();
        let cookie = response.cookie(COOKIE_TOKEN);
        assert_eq!(cookie.expires_datetime(), Some(OffsetDateTime::UNIX_EPOCH));
        assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn unknown_user_is_logged_out() {
        let server = get_test_server(seeded_connection(), DEFAULT_COOKIE_DURATION);

        let response = server
            .post(&format_endpoint(TEST_LOG_IN_ROUTE_PATH, 999))
            .await;
        let response = server
            .get(TEST_PROTECTED_ROUTE)
            .add_cookies(response.cookies())
            .await;

        response.assert_status_see_other();
    }

    #[tokio::test]
    async fn api_route_responds_with_hx_redirect() {
        let server = get_test_server(seeded_connection(), DEFAULT_COOKIE_DURATION);

        let response = server
            .get(TEST_API_ROUTE)
            .add_header("HX-Request", "true")
            .add_header("HX-Current-URL", "http://localhost/transactions?page=2")
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header("hx-redirect"),
            "/log_in?redirect_url=%2Ftransactions%3Fpage%3D2"
        );
    }
}
