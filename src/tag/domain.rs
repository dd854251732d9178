//! Core tag domain types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Error;

/// The longest tag name that will be accepted.
const TAG_NAME_MAX_LENGTH: usize = 50;

/// A validated, non-empty tag name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct TagName(String);

impl TagName {
    /// Create a tag name, trimming surrounding whitespace.
    ///
    /// Names longer than fifty characters are truncated.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::EmptyTagName] if `name` is an empty string.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();

        if name.is_empty() {
            Err(Error::EmptyTagName)
        } else {
            Ok(Self(name.chars().take(TAG_NAME_MAX_LENGTH).collect()))
        }
    }

    /// Create a tag name without validation.
    ///
    /// The caller should ensure that the string is not empty.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for TagName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for TagName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TagName::new(s)
    }
}

impl Display for TagName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Database identifier for a tag.
pub type TagId = i64;

/// A free-form label that can be attached to any number of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: TagId,
    pub name: TagName,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Split a comma separated list of tag names, e.g. "groceries, weekly".
///
/// Blank entries are skipped and repeated names are only kept once,
/// in the order they first appear.
pub fn parse_tag_list(raw_tags: &str) -> Vec<TagName> {
    let mut tag_names: Vec<TagName> = Vec::new();

    for tag_name in raw_tags.split(',').filter_map(|name| TagName::new(name).ok()) {
        if !tag_names.contains(&tag_name) {
            tag_names.push(tag_name);
        }
    }

    tag_names
}
