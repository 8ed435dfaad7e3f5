use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use libris_common::{date_time::UtcDateTime, id::Id};
use serde::{Deserialize, Serialize};

use crate::{author::model::AuthorId, error::AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub Id);

impl BookId {
    pub const NAME_PREFIX: &'static str = "books/";

    pub fn new(id: Id) -> Self {
        Self(id)
    }

    /// Resource name, `books/{id}`.
    pub fn to_name(&self) -> String {
        format!("{}{}", Self::NAME_PREFIX, self.0)
    }

    pub fn parse_name(name: &str) -> Result<Self, AppError> {
        name.strip_prefix(Self::NAME_PREFIX)
            .and_then(|id| Id::from_str(id).ok())
            .map(Self)
            .ok_or_else(|| AppError::invalid("book", format!("`{name}` is not a book name")))
    }
}

impl Display for BookId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: BookId,
    pub create_time: UtcDateTime,
    pub update_time: Option<UtcDateTime>,
    pub title: String,
    /// Unique across the catalog.
    pub isbn: String,
    pub price_cents: i64,
    pub author_id: AuthorId,
}
