use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use libris_common::date_time::UtcDateTime;

use crate::{
    author::model::{Author, AuthorId},
    error::AppResult,
};

pub mod memory;

/// Partial update of a stored author. `None` fields stay unchanged.
#[derive(Debug, Clone)]
pub struct AuthorRecordUpdate<'a> {
    pub id: AuthorId,
    pub update_time: UtcDateTime,
    pub display_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub bio: Option<&'a str>,
}

/// How a display name query is compared against stored names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameMatch {
    Exact,
    IgnoreCase,
    /// Substring match, ignoring case.
    #[default]
    Containing,
}

impl NameMatch {
    pub fn matches(self, candidate: &str, query: &str) -> bool {
        match self {
            Self::Exact => candidate == query,
            Self::IgnoreCase => candidate.to_lowercase() == query.to_lowercase(),
            Self::Containing => candidate.to_lowercase().contains(&query.to_lowercase()),
        }
    }
}

#[async_trait]
pub trait AuthorRepository: Debug {
    async fn insert(&self, author: Author) -> AppResult<()>;

    /// Applies `update` and returns the updated author, or `None` if absent.
    async fn update(&self, update: AuthorRecordUpdate<'_>) -> AppResult<Option<Author>>;

    /// Returns `true` if an author was removed.
    async fn delete(&self, id: &AuthorId) -> AppResult<bool>;

    async fn select(&self, id: &AuthorId) -> AppResult<Option<Author>>;

    async fn select_multiple(&self, ids: &[AuthorId]) -> AppResult<Vec<Author>>;

    /// All authors, oldest first.
    async fn select_all(&self) -> AppResult<Vec<Author>>;

    /// Authors whose display name matches `name`, oldest first.
    async fn select_by_name(&self, name: &str, matching: NameMatch) -> AppResult<Vec<Author>>;

    async fn select_by_email(&self, email: &str) -> AppResult<Option<Author>>;

    async fn exists(&self, id: &AuthorId) -> AppResult<bool>;
}

pub type AuthorRepositoryArc = Arc<dyn AuthorRepository + Send + Sync>;
