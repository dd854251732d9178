//! Recording new transactions with their tags and receipts.

use axum::{
    Extension,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;
use serde_json::json;

use crate::{
    Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    category::{Category, get_all_categories},
    endpoints,
    html::{FORM_CONTAINER_STYLE, base},
    navigation::NavBar,
    receipt::{StoredFile, create_receipt, remove_stored_files, store_uploads},
    role::Permission,
    tag::{TagName, set_transaction_tags},
    timezone::local_today,
    transaction::{
        NewTransaction, Transaction, TransactionState, create_transaction,
        form::{
            TransactionForm, TransactionFormErrors, TransactionFormMode,
            parse_transaction_multipart, transaction_form,
        },
    },
};

fn new_transaction_view(
    user: &CurrentUser,
    form: &TransactionForm,
    categories: &[Category],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::NEW_TRANSACTION_VIEW, user).into_html();
    let form = transaction_form(
        TransactionFormMode::Create,
        form,
        &TransactionFormErrors::default(),
        categories,
    );

    let content = html! {
        (nav_bar)

        div class=(FORM_CONTAINER_STYLE)
        {
            div class="w-full max-w-md space-y-4"
            {
                h1 class="text-xl font-bold" { "Add Transaction" }
                (form)
            }
        }
    };

    base("Add Transaction", &content)
}

/// Display the form for recording a transaction, dated today in the local timezone.
pub async fn get_new_transaction_page(
    State(state): State<TransactionState>,
    Extension(user): Extension<CurrentUser>,
) -> Response {
    if let Err(error) = user.require(Permission::Create) {
        return error.into_response();
    }

    let today = match local_today(&state.local_timezone) {
        Ok(today) => today,
        Err(error) => return error.into_response(),
    };

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    match get_all_categories(&connection) {
        Ok(categories) => {
            new_transaction_view(&user, &TransactionForm::new(today), &categories).into_response()
        }
        Err(error) => {
            tracing::error!("Could not get categories: {error}");
            error.into_response()
        }
    }
}

/// Load the categories while holding the lock only for the query.
pub(crate) fn load_categories(state: &TransactionState) -> Result<Vec<Category>, Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    get_all_categories(&connection).inspect_err(|error| {
        tracing::error!("Could not get categories: {error}");
    })
}

/// Insert the transaction, its tags and the receipt records in one SQL transaction.
fn insert_transaction_with_receipts(
    new_transaction: NewTransaction,
    tags: &[TagName],
    stored_files: &[StoredFile],
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    let transaction = create_transaction(new_transaction, &sql_transaction)?;
    set_transaction_tags(transaction.id, tags, &sql_transaction)?;
    for stored_file in stored_files {
        create_receipt(transaction.id, stored_file, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    Ok(transaction)
}

fn save_new_transaction(
    state: &TransactionState,
    user: &CurrentUser,
    client: &ClientInfo,
    new_transaction: NewTransaction,
    tags: &[TagName],
    stored_files: &[StoredFile],
) -> Result<Transaction, Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let transaction =
        insert_transaction_with_receipts(new_transaction, tags, stored_files, &connection)?;

    log_audit_action(
        AuditEntry::new(AuditAction::CreateTransaction)
            .user(user.id)
            .target("transaction", transaction.id)
            .values(None, Some(audit_values(&transaction, tags)))
            .client(client),
        &connection,
    );

    Ok(transaction)
}

/// The transaction fields recorded in the audit log.
pub(crate) fn audit_values(transaction: &Transaction, tags: &[TagName]) -> serde_json::Value {
    json!({
        "type": transaction.transaction_type,
        "amount": format!("{:.2}", transaction.amount),
        "description": transaction.description,
        "notes": transaction.notes,
        "party": transaction.party,
        "date": transaction.date.to_string(),
        "category_id": transaction.category_id,
        "tags": tags.iter().map(AsRef::as_ref).collect::<Vec<&str>>(),
    })
}

/// Record a transaction from the multipart form, saving any attached receipts.
///
/// Invalid fields are reported by returning the form with error messages.
/// Receipts with a disallowed file type are skipped. If the records cannot be
/// saved, the receipt files that were written are removed again.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    multipart: Multipart,
) -> Response {
    if let Err(error) = user.require(Permission::Create) {
        return error.into_alert_response();
    }

    let (form, uploads) = match parse_transaction_multipart(multipart).await {
        Ok(parsed) => parsed,
        Err(error) => return error.into_alert_response(),
    };

    let categories = match load_categories(&state) {
        Ok(categories) => categories,
        Err(error) => return error.into_alert_response(),
    };

    let validated = match form.validate(&categories) {
        Ok(validated) => validated,
        Err(errors) => {
            return transaction_form(TransactionFormMode::Create, &form, &errors, &categories)
                .into_response();
        }
    };
    let (new_transaction, tags) = validated.into_parts(user.id);

    let stored_files = match store_uploads(&state.upload_dir, uploads).await {
        Ok(stored_files) => stored_files,
        Err(error) => return error.into_alert_response(),
    };

    match save_new_transaction(
        &state,
        &user,
        &client,
        new_transaction,
        &tags,
        &stored_files,
    ) {
        Ok(transaction) => {
            tracing::info!(
                "User \"{}\" recorded transaction {} with {} receipts",
                user.username,
                transaction.id,
                stored_files.len()
            );

            (
                HxRedirect(endpoints::TRANSACTIONS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("Could not save transaction: {error}");
            remove_stored_files(&state.upload_dir, &stored_files).await;
            error.into_alert_response()
        }
    }
}
