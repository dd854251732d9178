//! Free-form tags for labelling transactions.

mod db;
mod domain;

pub use db::{
    create_tag_table, get_all_tags, get_or_create_tag, get_transaction_tags, set_transaction_tags,
};
pub use domain::{Tag, TagId, TagName, parse_tag_list};
