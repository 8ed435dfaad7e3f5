use std::{collections::HashMap, fmt::Debug, sync::Arc};

use async_trait::async_trait;
use libris_common::date_time::UtcDateTime;

use crate::{
    author::model::AuthorId,
    book::model::{Book, BookId},
    error::AppResult,
};

pub mod memory;

/// Partial update of a stored book. `None` fields stay unchanged.
#[derive(Debug, Clone)]
pub struct BookRecordUpdate<'a> {
    pub id: BookId,
    pub update_time: UtcDateTime,
    pub title: Option<&'a str>,
    pub isbn: Option<&'a str>,
    pub price_cents: Option<i64>,
    pub author_id: Option<AuthorId>,
}

#[async_trait]
pub trait BookRepository: Debug {
    /// Inserts a book.
    ///
    /// # Errors
    ///
    /// [`AppError::DuplicateKey`](crate::error::AppError::DuplicateKey) if the
    /// ISBN is already taken; the check and the write are atomic.
    async fn insert(&self, book: Book) -> AppResult<()>;

    /// Applies `update` and returns the updated book, or `None` if absent.
    ///
    /// # Errors
    ///
    /// [`AppError::DuplicateKey`](crate::error::AppError::DuplicateKey) if the
    /// new ISBN belongs to another book.
    async fn update(&self, update: BookRecordUpdate<'_>) -> AppResult<Option<Book>>;

    async fn delete(&self, id: &BookId) -> AppResult<bool>;

    async fn select(&self, id: &BookId) -> AppResult<Option<Book>>;

    async fn select_all(&self) -> AppResult<Vec<Book>>;

    /// Books of every author in `author_ids`, grouped by author. Authors
    /// without books are absent from the map. Each group is oldest first.
    async fn select_by_author_ids(
        &self,
        author_ids: &[AuthorId],
    ) -> AppResult<HashMap<AuthorId, Vec<Book>>>;

    async fn exists_by_isbn(&self, isbn: &str) -> AppResult<bool>;

    /// Removes every book of `author_id` and returns their ids.
    async fn delete_by_author(&self, author_id: &AuthorId) -> AppResult<Vec<BookId>>;
}

pub type BookRepositoryArc = Arc<dyn BookRepository + Send + Sync>;
