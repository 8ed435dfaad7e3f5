use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use libris_common::{date_time::UtcDateTime, id::Id};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthorId(pub Id);

impl AuthorId {
    pub const NAME_PREFIX: &'static str = "authors/";

    pub fn new(id: Id) -> Self {
        Self(id)
    }

    /// Resource name, `authors/{id}`.
    pub fn to_name(&self) -> String {
        format!("{}{}", Self::NAME_PREFIX, self.0)
    }

    pub fn parse_name(name: &str) -> Result<Self, AppError> {
        name.strip_prefix(Self::NAME_PREFIX)
            .and_then(|id| Id::from_str(id).ok())
            .map(Self)
            .ok_or_else(|| AppError::invalid("author", format!("`{name}` is not an author name")))
    }
}

impl Display for AuthorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: AuthorId,
    pub create_time: UtcDateTime,
    pub update_time: Option<UtcDateTime>,
    pub display_name: String,
    pub email: Option<String>,
    pub bio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names() {
        let id = AuthorId::new(Id::new(42));
        let name = id.to_name();
        assert!(name.starts_with("authors/"));
        assert_eq!(AuthorId::parse_name(&name).unwrap(), id);
        assert!(AuthorId::parse_name("books/01ARZ3NDEKTSV4RRFFQ69G5FAV").is_err());
        assert!(AuthorId::parse_name("authors/x").is_err());
    }
}
