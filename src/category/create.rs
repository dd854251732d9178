//! The form and endpoint for adding categories.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppState, Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    category::{CategoryForm, CategoryFormErrors, DEFAULT_CATEGORY_COLOR, create_category},
    endpoints,
    html::{FORM_LABEL_STYLE, InputField, field_error, submit_button},
    role::Permission,
};

/// The state needed for creating and deleting categories.
#[derive(Debug, Clone)]
pub struct CategoryState {
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form for adding a category, shown on the settings page.
pub fn category_form(form: &CategoryForm, errors: &CategoryFormErrors) -> Markup {
    let color = if form.color.is_empty() {
        DEFAULT_CATEGORY_COLOR
    } else {
        &form.color
    };

    html! {
        form
            hx-post=(endpoints::CATEGORIES_API)
            hx-target="this"
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            class="w-full space-y-4"
        {
            (InputField::text("name", "Name")
                .value(&form.name)
                .error(errors.name.as_deref())
                .into_html())
            (InputField::text("description", "Description")
                .value(&form.description)
                .optional()
                .error(errors.description.as_deref())
                .into_html())

            div
            {
                label for="color" class=(FORM_LABEL_STYLE) { "Colour" }
                input type="color" name="color" id="color" value=(color) class="h-10 w-20 rounded";
                (field_error(errors.color.as_deref()))
            }

            (submit_button("Add Category"))
        }
    }
}

/// Create a category from the form data.
pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Form(form): Form<CategoryForm>,
) -> Response {
    if let Err(error) = user.require(Permission::Create) {
        return error.into_alert_response();
    }

    let new_category = match form.validate() {
        Ok(new_category) => new_category,
        Err(errors) => return category_form(&form, &errors).into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_alert_response();
        }
    };

    let category = match create_category(new_category, &connection) {
        Ok(category) => category,
        Err(error) => {
            tracing::error!("An unexpected error occurred while creating a category: {error}");
            return error.into_alert_response();
        }
    };

    log_audit_action(
        AuditEntry::new(AuditAction::CreateCategory)
            .user(user.id)
            .target("category", category.id)
            .values(
                None,
                Some(json!({"name": category.name, "color": category.color})),
            )
            .client(&client),
        &connection,
    );

    (
        HxRedirect(endpoints::SETTINGS_VIEW.to_owned()),
        StatusCode::SEE_OTHER,
    )
        .into_response()
}

#[cfg(test)]
mod create_category_tests {
    use std::sync::{Arc, Mutex};

    use axum::{Extension, Form, extract::State, http::StatusCode};

    use crate::{
        audit::ClientInfo,
        auth::CurrentUser,
        category::{CategoryForm, get_all_categories},
        endpoints,
        test_utils::{
            assert_form_error_message, assert_hx_redirect, insert_test_user, must_get_form,
            parse_html_fragment, seeded_connection,
        },
    };

    use super::{CategoryState, create_category_endpoint};

    fn form(name: &str) -> CategoryForm {
        CategoryForm {
            name: name.to_owned(),
            description: "Vet bills and food".to_owned(),
            color: "#abcdef".to_owned(),
        }
    }

    #[tokio::test]
    async fn creates_category() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let state = CategoryState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = create_category_endpoint(
            State(state.clone()),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(form("Pets")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_hx_redirect(&response, endpoints::SETTINGS_VIEW);
        let categories = get_all_categories(&state.db_connection.lock().unwrap()).unwrap();
        let pets = categories
            .iter()
            .find(|category| category.name == "Pets")
            .unwrap();
        assert_eq!(pets.color, "#abcdef");
        assert!(!pets.is_system);
    }

    #[tokio::test]
    async fn blank_name_is_a_field_error() {
        let connection = seeded_connection();
        let user = insert_test_user("alice", "Manager", &connection);
        let state = CategoryState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = create_category_endpoint(
            State(state),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(form("")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html_fragment(response).await;
        assert_form_error_message(&must_get_form(&html), "Enter a category name.");
    }

    #[tokio::test]
    async fn viewer_cannot_create_category() {
        let connection = seeded_connection();
        let user = insert_test_user("vera", "Viewer", &connection);
        let state = CategoryState {
            db_connection: Arc::new(Mutex::new(connection)),
        };

        let response = create_category_endpoint(
            State(state),
            Extension(CurrentUser::from(&user)),
            ClientInfo::default(),
            Form(form("Pets")),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
