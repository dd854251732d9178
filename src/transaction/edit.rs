//! Editing transactions and adding receipts to them.

use axum::{
    Extension,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_htmx::HxRedirect;
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    Error,
    audit::{AuditAction, AuditEntry, ClientInfo, log_audit_action},
    auth::CurrentUser,
    category::{Category, get_all_categories},
    database_id::TransactionId,
    endpoints::{self, format_endpoint},
    html::{FORM_CONTAINER_STYLE, LINK_STYLE, base, delete_button},
    navigation::NavBar,
    receipt::{
        Receipt, StoredFile, create_receipt, get_receipts_for_transaction, remove_stored_files,
        store_uploads,
    },
    role::Permission,
    tag::{TagName, get_transaction_tags, set_transaction_tags},
    transaction::{
        NewTransaction, Transaction, TransactionState,
        create::{audit_values, load_categories},
        form::{
            TransactionForm, TransactionFormErrors, TransactionFormMode,
            parse_transaction_multipart, transaction_form,
        },
        get_transaction, update_transaction,
    },
};

/// Get the transaction `transaction_id` if `user` may change it.
///
/// # Errors
/// Returns [Error::NotFound] if the transaction does not exist, or
/// [Error::Forbidden] if it belongs to another user and `user` cannot manage users.
pub(crate) fn get_accessible_transaction(
    transaction_id: TransactionId,
    user: &CurrentUser,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = get_transaction(transaction_id, connection)?;

    if !user.can_access(transaction.user_id) {
        tracing::warn!(
            "User \"{}\" tried to access transaction {transaction_id} owned by another user",
            user.username
        );
        return Err(Error::Forbidden);
    }

    Ok(transaction)
}

fn receipt_list(receipts: &[Receipt]) -> Markup {
    html! {
        section class="space-y-2"
        {
            h2 class="font-semibold" { "Receipts" }

            @if receipts.is_empty() {
                p class="text-sm text-gray-500 dark:text-gray-400" { "No receipts attached." }
            } @else {
                ul #receipts class="space-y-2"
                {
                    @for receipt in receipts {
                        li class="flex justify-between items-center gap-4"
                        {
                            a
                                href=(format_endpoint(endpoints::RECEIPT, receipt.id))
                                class=(LINK_STYLE)
                            {
                                (receipt.original_filename)
                            }
                            span class="text-xs text-gray-500" { (receipt.file_size / 1024) " KiB" }
                            (delete_button(
                                &format_endpoint(endpoints::DELETE_RECEIPT, receipt.id),
                                &format!(
                                    "Are you sure you want to delete the receipt '{}'?",
                                    receipt.original_filename
                                ),
                                "closest li",
                            ))
                        }
                    }
                }
            }
        }
    }
}

fn edit_transaction_view(
    user: &CurrentUser,
    transaction_id: TransactionId,
    form: &TransactionForm,
    categories: &[Category],
    receipts: &[Receipt],
) -> Markup {
    let nav_bar = NavBar::new(endpoints::TRANSACTIONS_VIEW, user).into_html();
    let form = transaction_form(
        TransactionFormMode::Edit(transaction_id),
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
                h1 class="text-xl font-bold" { "Edit Transaction" }
                (form)
                (receipt_list(receipts))
            }
        }
    };

    base("Edit Transaction", &content)
}

/// Display the edit form for a transaction along with its receipts.
pub async fn get_edit_transaction_page(
    State(state): State<TransactionState>,
    Extension(user): Extension<CurrentUser>,
    Path(transaction_id): Path<TransactionId>,
) -> Response {
    if let Err(error) = user.require(Permission::Update) {
        return error.into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return Error::DatabaseLockError.into_response();
        }
    };

    let page = get_accessible_transaction(transaction_id, &user, &connection).and_then(
        |transaction| {
            let tags = get_transaction_tags(transaction_id, &connection)?;
            let categories = get_all_categories(&connection)?;
            let receipts = get_receipts_for_transaction(transaction_id, &connection)?;

            Ok(edit_transaction_view(
                &user,
                transaction_id,
                &TransactionForm::from_transaction(&transaction, &tags),
                &categories,
                &receipts,
            ))
        },
    );

    match page {
        Ok(page) => page.into_response(),
        Err(error) => {
            tracing::error!("Could not display transaction {transaction_id}: {error}");
            error.into_response()
        }
    }
}

fn load_accessible_transaction(
    state: &TransactionState,
    transaction_id: TransactionId,
    user: &CurrentUser,
) -> Result<(Transaction, Vec<TagName>), Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let transaction = match get_accessible_transaction(transaction_id, user, &connection) {
        Err(Error::NotFound) => return Err(Error::UpdateMissingTransaction),
        result => result?,
    };
    let tags = get_transaction_tags(transaction_id, &connection)?
        .into_iter()
        .map(|tag| tag.name)
        .collect();

    Ok((transaction, tags))
}

/// Replace the transaction's fields and tags and add the new receipts in one SQL transaction.
fn apply_update(
    transaction_id: TransactionId,
    update: &NewTransaction,
    tags: &[TagName],
    stored_files: &[StoredFile],
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = connection.unchecked_transaction()?;

    update_transaction(transaction_id, update, &sql_transaction)?;
    set_transaction_tags(transaction_id, tags, &sql_transaction)?;
    for stored_file in stored_files {
        create_receipt(transaction_id, stored_file, &sql_transaction)?;
    }
    let updated = get_transaction(transaction_id, &sql_transaction)?;

    sql_transaction.commit()?;

    Ok(updated)
}

struct UpdateRequest<'a> {
    old: &'a Transaction,
    old_tags: &'a [TagName],
    update: &'a NewTransaction,
    tags: &'a [TagName],
    stored_files: &'a [StoredFile],
}

fn save_update(
    state: &TransactionState,
    user: &CurrentUser,
    client: &ClientInfo,
    request: UpdateRequest,
) -> Result<Transaction, Error> {
    let connection = state.db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })?;

    let updated = apply_update(
        request.old.id,
        request.update,
        request.tags,
        request.stored_files,
        &connection,
    )?;

    log_audit_action(
        AuditEntry::new(AuditAction::UpdateTransaction)
            .user(user.id)
            .target("transaction", updated.id)
            .values(
                Some(audit_values(request.old, request.old_tags)),
                Some(audit_values(&updated, request.tags)),
            )
            .client(client),
        &connection,
    );

    Ok(updated)
}

/// Update a transaction from the multipart form and attach any new receipts.
///
/// The transaction keeps its original owner when edited by an admin.
pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Extension(user): Extension<CurrentUser>,
    client: ClientInfo,
    Path(transaction_id): Path<TransactionId>,
    multipart: Multipart,
) -> Response {
    if let Err(error) = user.require(Permission::Update) {
        return error.into_alert_response();
    }

    let (old, old_tags) = match load_accessible_transaction(&state, transaction_id, &user) {
        Ok(loaded) => loaded,
        Err(error) => return error.into_alert_response(),
    };

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
            return transaction_form(
                TransactionFormMode::Edit(transaction_id),
                &form,
                &errors,
                &categories,
            )
            .into_response();
        }
    };
    let (update, tags) = validated.into_parts(old.user_id);

    let stored_files = match store_uploads(&state.upload_dir, uploads).await {
        Ok(stored_files) => stored_files,
        Err(error) => return error.into_alert_response(),
    };

    let request = UpdateRequest {
        old: &old,
        old_tags: &old_tags,
        update: &update,
        tags: &tags,
        stored_files: &stored_files,
    };

    match save_update(&state, &user, &client, request) {
        Ok(updated) => {
            tracing::info!(
                "User \"{}\" updated transaction {}",
                user.username,
                updated.id
            );

            (
                HxRedirect(endpoints::TRANSACTIONS_VIEW.to_owned()),
                StatusCode::SEE_OTHER,
            )
                .into_response()
        }
        Err(error) => {
            tracing::error!("Could not update transaction {transaction_id}: {error}");
            remove_stored_files(&state.upload_dir, &stored_files).await;
            error.into_alert_response()
        }
    }
}
