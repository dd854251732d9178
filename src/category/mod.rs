//! Transaction categories. Built-in categories are seeded at start up and
//! cannot be deleted, users may add and delete their own.

mod create;
mod db;
mod delete;
mod domain;

pub use create::{CategoryState, category_form, create_category_endpoint};
pub use db::{
    create_category, create_category_table, delete_category, get_all_categories, get_category,
    system_category_exists,
};
pub use delete::delete_category_endpoint;
pub use domain::{Category, CategoryForm, CategoryFormErrors, DEFAULT_CATEGORY_COLOR, NewCategory};
