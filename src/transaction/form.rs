//! The transaction form shared by the new and edit pages.

use axum::extract::Multipart;
use maud::{Markup, html};
use time::{Date, macros::format_description};

use crate::{
    Error,
    category::Category,
    database_id::{CategoryId, TransactionId},
    endpoints::{self, format_endpoint},
    html::{FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, InputField, field_error, submit_button},
    receipt::{ALLOWED_EXTENSIONS, UploadedFile},
    tag::{Tag, TagName, parse_tag_list},
    transaction::{NewTransaction, Transaction, TransactionType},
    user::UserID,
};

const DESCRIPTION_MAX_LENGTH: usize = 500;
const NOTES_MAX_LENGTH: usize = 1000;
const PARTY_MAX_LENGTH: usize = 200;

/// The name of the file input for receipts.
const RECEIPTS_FIELD: &str = "receipts";

/// The raw values entered into the transaction form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionForm {
    pub transaction_type: String,
    pub amount: String,
    pub description: String,
    pub notes: String,
    pub party: String,
    pub date: String,
    pub category_id: String,
    /// Comma separated tag names.
    pub tags: String,
}

impl TransactionForm {
    /// An empty expense dated `today`.
    pub fn new(today: Date) -> Self {
        Self {
            transaction_type: TransactionType::Expense.as_str().to_owned(),
            date: today.to_string(),
            ..Default::default()
        }
    }

    /// The form filled in with the values of an existing transaction.
    pub fn from_transaction(transaction: &Transaction, tags: &[Tag]) -> Self {
        Self {
            transaction_type: transaction.transaction_type.as_str().to_owned(),
            amount: format!("{:.2}", transaction.amount),
            description: transaction.description.clone(),
            notes: transaction.notes.clone().unwrap_or_default(),
            party: transaction.party.clone().unwrap_or_default(),
            date: transaction.date.to_string(),
            category_id: transaction.category_id.to_string(),
            tags: tags
                .iter()
                .map(|tag| tag.name.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Check the form and convert its values.
    ///
    /// `categories` are the categories that may be chosen.
    pub fn validate(
        &self,
        categories: &[Category],
    ) -> Result<ValidatedTransaction, TransactionFormErrors> {
        let mut errors = TransactionFormErrors::default();

        let transaction_type = self
            .transaction_type
            .parse::<TransactionType>()
            .map_err(|_| errors.transaction_type = Some("Choose income or expense.".to_owned()))
            .ok();

        let amount = parse_amount(&self.amount)
            .map_err(|error| errors.amount = Some(error))
            .ok();

        let description = self.description.trim();
        if description.is_empty() {
            errors.description = Some("Enter a description.".to_owned());
        } else if description.chars().count() > DESCRIPTION_MAX_LENGTH {
            errors.description = Some(format!(
                "Description must be at most {DESCRIPTION_MAX_LENGTH} characters."
            ));
        }

        let notes = optional_text(&self.notes);
        if notes
            .as_ref()
            .is_some_and(|notes| notes.chars().count() > NOTES_MAX_LENGTH)
        {
            errors.notes = Some(format!(
                "Notes must be at most {NOTES_MAX_LENGTH} characters."
            ));
        }

        let party = optional_text(&self.party);
        if party
            .as_ref()
            .is_some_and(|party| party.chars().count() > PARTY_MAX_LENGTH)
        {
            errors.party = Some(format!(
                "Payee or payer must be at most {PARTY_MAX_LENGTH} characters."
            ));
        }

        let date = Date::parse(self.date.trim(), format_description!("[year]-[month]-[day]"))
            .map_err(|_| errors.date = Some("Enter a valid date.".to_owned()))
            .ok();

        let category_id = self
            .category_id
            .trim()
            .parse::<CategoryId>()
            .ok()
            .filter(|id| categories.iter().any(|category| category.id == *id));
        if category_id.is_none() {
            errors.category = Some("Choose a category.".to_owned());
        }

        match (transaction_type, amount, date, category_id) {
            (Some(transaction_type), Some(amount), Some(date), Some(category_id))
                if errors.is_empty() =>
            {
                Ok(ValidatedTransaction {
                    transaction_type,
                    amount,
                    description: description.to_owned(),
                    notes,
                    party,
                    date,
                    category_id,
                    tags: parse_tag_list(&self.tags),
                })
            }
            _ => Err(errors),
        }
    }
}

fn optional_text(text: &str) -> Option<String> {
    let text = text.trim();

    (!text.is_empty()).then(|| text.to_owned())
}

/// Parse a dollar amount, rounded to cents.
pub(crate) fn parse_amount(raw_amount: &str) -> Result<f64, String> {
    let amount = raw_amount
        .trim()
        .trim_start_matches('$')
        .replace(',', "")
        .parse::<f64>()
        .map_err(|_| "Enter a valid amount.".to_owned())?;
    let amount = (amount * 100.0).round() / 100.0;

    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err("Enter an amount greater than zero.".to_owned())
    }
}

/// Error messages for the fields of the transaction form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFormErrors {
    pub transaction_type: Option<String>,
    pub amount: Option<String>,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub party: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
}

impl TransactionFormErrors {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// A checked transaction form.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTransaction {
    pub transaction_type: TransactionType,
    pub amount: f64,
    pub description: String,
    pub notes: Option<String>,
    pub party: Option<String>,
    pub date: Date,
    pub category_id: CategoryId,
    pub tags: Vec<TagName>,
}

impl ValidatedTransaction {
    /// The transaction owned by `user_id` and its tags.
    pub fn into_parts(self, user_id: UserID) -> (NewTransaction, Vec<TagName>) {
        (
            NewTransaction {
                transaction_type: self.transaction_type,
                amount: self.amount,
                description: self.description,
                notes: self.notes,
                party: self.party,
                date: self.date,
                user_id,
                category_id: self.category_id,
            },
            self.tags,
        )
    }
}

fn multipart_error(error: impl std::fmt::Display) -> Error {
    tracing::error!("Could not read multipart form: {error}");
    Error::MultipartError(error.to_string())
}

/// Read the transaction fields and receipt files from a multipart form.
///
/// File inputs that were left empty are ignored.
pub async fn parse_transaction_multipart(
    mut multipart: Multipart,
) -> Result<(TransactionForm, Vec<UploadedFile>), Error> {
    let mut form = TransactionForm::default();
    let mut uploads = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_owned();

        if name == RECEIPTS_FIELD {
            let original_filename = field.file_name().unwrap_or_default().to_owned();
            let data = field.bytes().await.map_err(multipart_error)?;

            if !original_filename.is_empty() && !data.is_empty() {
                tracing::debug!(
                    "Received receipt '{original_filename}' that is {} bytes",
                    data.len()
                );
                uploads.push(UploadedFile {
                    original_filename,
                    data,
                });
            }

            continue;
        }

        let value = field.text().await.map_err(multipart_error)?;

        match name.as_str() {
            "transaction_type" => form.transaction_type = value,
            "amount" => form.amount = value,
            "description" => form.description = value,
            "notes" => form.notes = value,
            "party" => form.party = value,
            "date" => form.date = value,
            "category_id" => form.category_id = value,
            "tags" => form.tags = value,
            other => tracing::debug!("Ignoring unexpected form field \"{other}\""),
        }
    }

    Ok((form, uploads))
}

/// Whether the form creates a transaction or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransactionFormMode {
    Create,
    Edit(TransactionId),
}

pub fn transaction_form(
    mode: TransactionFormMode,
    form: &TransactionForm,
    errors: &TransactionFormErrors,
    categories: &[Category],
) -> Markup {
    let (hx_post, hx_put, button_text) = match mode {
        TransactionFormMode::Create => (
            Some(endpoints::TRANSACTIONS_API.to_owned()),
            None,
            "Save Transaction",
        ),
        TransactionFormMode::Edit(transaction_id) => (
            None,
            Some(format_endpoint(endpoints::TRANSACTION, transaction_id)),
            "Update Transaction",
        ),
    };
    let accept = ALLOWED_EXTENSIONS
        .iter()
        .map(|extension| format!(".{extension}"))
        .collect::<Vec<_>>()
        .join(",");

    html! {
        form
            hx-post=[hx_post]
            hx-put=[hx_put]
            hx-encoding="multipart/form-data"
            hx-target="this"
            hx-swap="outerHTML"
            hx-target-error="#alert-container"
            class="w-full space-y-4"
        {
            div
            {
                label for="transaction_type" class=(FORM_LABEL_STYLE) { "Type" }

                select name="transaction_type" id="transaction_type" required class=(FORM_TEXT_INPUT_STYLE)
                {
                    @for transaction_type in [TransactionType::Expense, TransactionType::Income] {
                        option
                            value=(transaction_type.as_str())
                            selected[form.transaction_type == transaction_type.as_str()]
                        {
                            (transaction_type.label())
                        }
                    }
                }

                (field_error(errors.transaction_type.as_deref()))
            }

            div
            {
                label for="amount" class=(FORM_LABEL_STYLE) { "Amount" }

                input
                    name="amount"
                    id="amount"
                    type="number"
                    step="0.01"
                    min="0.01"
                    placeholder="0.00"
                    value=(form.amount)
                    required
                    class=(FORM_TEXT_INPUT_STYLE);

                (field_error(errors.amount.as_deref()))
            }

            (InputField::text("description", "Description")
                .value(&form.description)
                .error(errors.description.as_deref())
                .into_html())

            (InputField::text("party", "Payee or payer")
                .value(&form.party)
                .optional()
                .error(errors.party.as_deref())
                .into_html())

            (InputField::text("date", "Date")
                .input_type("date")
                .value(&form.date)
                .error(errors.date.as_deref())
                .into_html())

            div
            {
                label for="category_id" class=(FORM_LABEL_STYLE) { "Category" }

                select name="category_id" id="category_id" required class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="" { "Select a category" }

                    @for category in categories {
                        option
                            value=(category.id)
                            selected[form.category_id == category.id.to_string()]
                        {
                            (category.name)
                        }
                    }
                }

                (field_error(errors.category.as_deref()))
            }

            (InputField::text("tags", "Tags")
                .value(&form.tags)
                .optional()
                .into_html())

            div
            {
                label for="notes" class=(FORM_LABEL_STYLE) { "Notes" }

                textarea name="notes" id="notes" rows="3" class=(FORM_TEXT_INPUT_STYLE)
                {
                    (form.notes)
                }

                (field_error(errors.notes.as_deref()))
            }

            div
            {
                label for=(RECEIPTS_FIELD) class=(FORM_LABEL_STYLE) { "Receipts" }

                input
                    name=(RECEIPTS_FIELD)
                    id=(RECEIPTS_FIELD)
                    type="file"
                    multiple
                    accept=(accept)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            (submit_button(button_text))
        }
    }
}

#[cfg(test)]
mod transaction_form_tests {
    use time::macros::date;

    use crate::{
        category::Category,
        tag::TagName,
        test_utils::{
            assert_form_error_message, assert_form_input, assert_hx_endpoint, must_get_form,
            multipart_request,
        },
        transaction::TransactionType,
    };

    use super::{
        TransactionForm, TransactionFormErrors, TransactionFormMode, parse_transaction_multipart,
        transaction_form,
    };

    fn categories() -> Vec<Category> {
        vec![Category {
            id: 3,
            name: "Shopping".to_owned(),
            description: None,
            color: "#45B7D1".to_owned(),
            is_system: true,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        }]
    }

    fn valid_form() -> TransactionForm {
        TransactionForm {
            transaction_type: "expense".to_owned(),
            amount: "12.346".to_owned(),
            description: "  Socks ".to_owned(),
            notes: String::new(),
            party: "Shop".to_owned(),
            date: "2025-02-03".to_owned(),
            category_id: "3".to_owned(),
            tags: "clothes, gifts, clothes".to_owned(),
        }
    }

    #[test]
    fn validates_and_converts_fields() {
        let validated = valid_form().validate(&categories()).unwrap();

        assert_eq!(validated.transaction_type, TransactionType::Expense);
        assert_eq!(validated.amount, 12.35);
        assert_eq!(validated.description, "Socks");
        assert_eq!(validated.notes, None);
        assert_eq!(validated.party.as_deref(), Some("Shop"));
        assert_eq!(validated.date, date!(2025 - 02 - 03));
        assert_eq!(validated.category_id, 3);
        assert_eq!(
            validated.tags,
            [TagName::new("clothes").unwrap(), TagName::new("gifts").unwrap()]
        );
    }

    #[test]
    fn reports_each_invalid_field() {
        let form = TransactionForm {
            transaction_type: "refund".to_owned(),
            amount: "-4".to_owned(),
            description: " ".to_owned(),
            notes: "n".repeat(1001),
            party: "p".repeat(201),
            date: "yesterday".to_owned(),
            category_id: "99".to_owned(),
            tags: String::new(),
        };

        let errors = form.validate(&categories()).unwrap_err();

        assert_eq!(
            errors,
            TransactionFormErrors {
                transaction_type: Some("Choose income or expense.".to_owned()),
                amount: Some("Enter an amount greater than zero.".to_owned()),
                description: Some("Enter a description.".to_owned()),
                notes: Some("Notes must be at most 1000 characters.".to_owned()),
                party: Some("Payee or payer must be at most 200 characters.".to_owned()),
                date: Some("Enter a valid date.".to_owned()),
                category: Some("Choose a category.".to_owned()),
            }
        );
    }

    #[test]
    fn amounts_that_round_to_zero_are_invalid() {
        let form = TransactionForm {
            amount: "0.001".to_owned(),
            ..valid_form()
        };

        let errors = form.validate(&categories()).unwrap_err();

        assert_eq!(
            errors.amount.as_deref(),
            Some("Enter an amount greater than zero.")
        );
    }

    #[test]
    fn create_form_posts_to_transactions_api() {
        let markup = transaction_form(
            TransactionFormMode::Create,
            &TransactionForm::new(date!(2025 - 01 - 01)),
            &TransactionFormErrors::default(),
            &categories(),
        );
        let html = scraper::Html::parse_fragment(&markup.into_string());
        let form = must_get_form(&html);

        assert_hx_endpoint(&form, "/api/transactions", "hx-post");
        assert_form_input(&form, "amount", "number");
        assert_form_input(&form, "description", "text");
        assert_form_input(&form, "date", "date");
    }

    #[test]
    fn edit_form_puts_to_transaction() {
        let errors = TransactionFormErrors {
            amount: Some("Enter a valid amount.".to_owned()),
            ..Default::default()
        };
        let markup = transaction_form(
            TransactionFormMode::Edit(8),
            &valid_form(),
            &errors,
            &categories(),
        );
        let html = scraper::Html::parse_fragment(&markup.into_string());
        let form = must_get_form(&html);

        assert_hx_endpoint(&form, "/api/transactions/8", "hx-put");
        assert_form_error_message(&form, "Enter a valid amount.");
    }

    #[tokio::test]
    async fn parses_fields_and_files() {
        let multipart = multipart_request(
            &[
                ("transaction_type", "income"),
                ("amount", "100"),
                ("description", "Pay"),
            ],
            &[
                ("receipts", "payslip.pdf", b"%PDF".as_slice()),
                ("receipts", "", b"".as_slice()),
            ],
        )
        .await;

        let (form, uploads) = parse_transaction_multipart(multipart).await.unwrap();

        assert_eq!(form.transaction_type, "income");
        assert_eq!(form.amount, "100");
        assert_eq!(form.description, "Pay");
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].original_filename, "payslip.pdf");
        assert_eq!(&uploads[0].data[..], b"%PDF");
    }
}
