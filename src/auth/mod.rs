//! Cookie based authentication: logging in and out, and the middleware that
//! protects routes and provides the [CurrentUser].

mod cookie;
mod current_user;
mod log_in;
mod log_out;
mod middleware;
mod redirect;

pub use cookie::{
    DEFAULT_COOKIE_DURATION, REMEMBER_ME_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie,
};
pub use current_user::CurrentUser;
pub use log_in::{get_log_in_page, post_log_in};
pub use log_out::get_log_out;
pub use middleware::{auth_guard, auth_guard_hx};

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
