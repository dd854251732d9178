//! Core category domain types and validation.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::database_id::CategoryId;

/// The colour given to categories created without one.
pub const DEFAULT_CATEGORY_COLOR: &str = "#007bff";

const NAME_MAX_LENGTH: usize = 100;
const DESCRIPTION_MAX_LENGTH: usize = 500;

/// A category for transactions, e.g. "Food & Dining".
///
/// Every transaction has exactly one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    /// A hex colour code, e.g. "#FF6B6B".
    pub color: String,
    /// Built-in categories cannot be deleted.
    pub is_system: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The data needed to create a category.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub is_system: bool,
}

/// The raw data entered into the category form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
}

/// Error messages for the fields of the category form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryFormErrors {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
}

/// Whether `color` is a hex colour code such as "#a1b2c3".
fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl CategoryForm {
    /// Validate the form, producing a user created (non-system) category.
    ///
    /// A blank colour falls back to [DEFAULT_CATEGORY_COLOR].
    pub fn validate(&self) -> Result<NewCategory, CategoryFormErrors> {
        let mut errors = CategoryFormErrors::default();

        let name = self.name.trim();
        if name.is_empty() {
            errors.name = Some("Enter a category name.".to_owned());
        } else if name.chars().count() > NAME_MAX_LENGTH {
            errors.name = Some(format!(
                "Category name must be at most {NAME_MAX_LENGTH} characters."
            ));
        }

        let description = self.description.trim();
        if description.chars().count() > DESCRIPTION_MAX_LENGTH {
            errors.description = Some(format!(
                "Description must be at most {DESCRIPTION_MAX_LENGTH} characters."
            ));
        }

        let color = match self.color.trim() {
            "" => DEFAULT_CATEGORY_COLOR,
            color => color,
        };
        if !is_hex_color(color) {
            errors.color = Some("Enter a colour like #007bff.".to_owned());
        }

        if errors != CategoryFormErrors::default() {
            return Err(errors);
        }

        Ok(NewCategory {
            name: name.to_owned(),
            description: (!description.is_empty()).then(|| description.to_owned()),
            color: color.to_owned(),
            is_system: false,
        })
    }
}

#[cfg(test)]
mod category_form_tests {
    use super::{CategoryForm, DEFAULT_CATEGORY_COLOR};

    fn form(name: &str, color: &str) -> CategoryForm {
        CategoryForm {
            name: name.to_owned(),
            description: String::new(),
            color: color.to_owned(),
        }
    }

    #[test]
    fn blank_colour_uses_default() {
        let category = form("Pets", "").validate().unwrap();

        assert_eq!(category.color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(category.description, None);
        assert!(!category.is_system);
    }

    #[test]
    fn rejects_blank_name() {
        let errors = form("  ", "#123456").validate().unwrap_err();

        assert!(errors.name.is_some());
    }

    #[test]
    fn rejects_long_name() {
        let errors = form(&"a".repeat(101), "").validate().unwrap_err();

        assert!(errors.name.is_some());
    }

    #[test]
    fn rejects_invalid_colour() {
        for color in ["red", "#12345", "#12345g", "123456#"] {
            let errors = form("Pets", color).validate().unwrap_err();
            assert!(errors.color.is_some(), "{color} should be rejected");
        }
    }
}
