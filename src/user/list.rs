//! The page listing every user.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    auth::CurrentUser,
    endpoints::{self, format_endpoint},
    html::{
        BUTTON_DELETE_STYLE, LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE,
        TABLE_HEADER_STYLE, TABLE_ROW_STYLE, base,
    },
    navigation::NavBar,
    role::Permission,
    user::{User, get_all_users},
};

/// The state needed by the user administration and profile handlers.
#[derive(Debug, Clone)]
pub struct UserState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for UserState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn users_view(users: &[User], current_user: &CurrentUser) -> Markup {
    let nav_bar = NavBar::new(endpoints::USERS_VIEW, current_user).into_html();

    let table_row = |user: &User| {
        let edit_url = format_endpoint(endpoints::EDIT_USER_VIEW, user.id.as_i64());
        let deactivate_url = format_endpoint(endpoints::DEACTIVATE_USER, user.id.as_i64());
        let can_deactivate = user.is_active && user.id != current_user.id;

        html!(
            tr class=(TABLE_ROW_STYLE)
            {
                th
                    scope="row"
                    class="px-6 py-4 font-medium text-gray-900 whitespace-nowrap dark:text-white"
                {
                    (user.username)
                }
                td class=(TABLE_CELL_STYLE) { (user.display_name()) }
                td class=(TABLE_CELL_STYLE) { (user.email) }
                td class=(TABLE_CELL_STYLE) { (user.role_name) }
                td class=(TABLE_CELL_STYLE)
                {
                    @if user.is_active { "Active" } @else { "Deactivated" }
                }
                td class=(TABLE_CELL_STYLE) { (user.created_at.date()) }
                td class=(TABLE_CELL_STYLE)
                {
                    div class="flex gap-4"
                    {
                        a href=(edit_url) class=(LINK_STYLE) { "Edit" }

                        @if can_deactivate {
                            button
                                type="button"
                                hx-post=(deactivate_url)
                                hx-confirm={
                                    "Are you sure you want to deactivate '" (user.username)
                                    "'? They will no longer be able to log in."
                                }
                                hx-target-error="#alert-container"
                                class=(BUTTON_DELETE_STYLE)
                            {
                                "Deactivate"
                            }
                        }
                    }
                }
            }
        )
    };

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            section class="space-y-4 w-full lg:max-w-5xl"
            {
                header class="flex justify-between flex-wrap items-end"
                {
                    h1 class="text-xl font-bold" { "Users" }

                    a href=(endpoints::NEW_USER_VIEW) class=(LINK_STYLE) { "Add User" }
                }

                div class="w-full overflow-x-auto"
                {
                    table class="w-full text-sm text-left rtl:text-right text-gray-500 dark:text-gray-400"
                    {
                        thead class=(TABLE_HEADER_STYLE)
                        {
                            tr
                            {
                                @for heading in ["Username", "Name", "Email", "Role", "Status", "Joined", "Actions"] {
                                    th scope="col" class=(TABLE_CELL_STYLE) { (heading) }
                                }
                            }
                        }

                        tbody
                        {
                            @for user in users {
                                (table_row(user))
                            }
                        }
                    }
                }
            }
        }
    );

    base("Users", &content)
}

/// Display every user, ordered by username.
pub async fn get_users_page(
    State(state): State<UserState>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    if let Err(error) = user.require(Permission::ManageUsers) {
        return error.into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_all_users(&connection) {
        Ok(users) => users_view(&users, &user).into_response(),
        Err(error) => {
            tracing::error!("Could not get users: {error}");
            error.into_response()
        }
    }
}
