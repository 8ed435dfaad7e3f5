use std::sync::Arc;

use libris_common::{date_time::UtcDateTime, id::worker::WorkerIdGenerator};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    author::{model::AuthorId, repository::AuthorRepositoryArc},
    book::{
        model::{Book, BookId},
        repository::BookRepositoryArc,
    },
    error::{AppError, AppResult},
    event::{CatalogBroadcaster, CatalogEvent},
};

#[derive(Debug, Clone)]
pub struct CreateBookCommand {
    id_generator: Arc<Mutex<WorkerIdGenerator>>,
    author_repository: AuthorRepositoryArc,
    book_repository: BookRepositoryArc,
    events: CatalogBroadcaster,
}

#[derive(Debug, Clone)]
pub struct CreateBookCommandInput<'a> {
    pub title: &'a str,
    pub author_id: AuthorId,
    pub isbn: &'a str,
    pub price_cents: i64,
}

#[derive(Debug, Clone)]
pub struct CreateBookCommandOutput {
    pub book: Book,
}

pub(crate) fn validate_book_fields(
    title: Option<&str>,
    isbn: Option<&str>,
    price_cents: Option<i64>,
) -> AppResult<()> {
    if title.is_some_and(|title| title.trim().is_empty()) {
        return Err(AppError::invalid("title", "must not be blank"));
    }
    if isbn.is_some_and(|isbn| isbn.trim().is_empty()) {
        return Err(AppError::invalid("isbn", "must not be blank"));
    }
    if price_cents.is_some_and(|price| price < 0) {
        return Err(AppError::invalid("price_cents", "must not be negative"));
    }
    Ok(())
}

impl CreateBookCommand {
    pub fn new(
        id_generator: Arc<Mutex<WorkerIdGenerator>>,
        author_repository: AuthorRepositoryArc,
        book_repository: BookRepositoryArc,
        events: CatalogBroadcaster,
    ) -> Self {
        Self {
            id_generator,
            author_repository,
            book_repository,
            events,
        }
    }

    /// # Errors
    ///
    /// [`AppError::ReferenceNotFound`] for an unknown author,
    /// [`AppError::DuplicateKey`] for a taken ISBN.
    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        input: CreateBookCommandInput<'_>,
    ) -> AppResult<CreateBookCommandOutput> {
        validate_book_fields(Some(input.title), Some(input.isbn), Some(input.price_cents))?;
        let isbn = input.isbn.trim();

        if !self.author_repository.exists(&input.author_id).await? {
            return Err(AppError::ReferenceNotFound(input.author_id.to_name()));
        }
        if self.book_repository.exists_by_isbn(isbn).await? {
            return Err(AppError::DuplicateKey {
                field: "isbn",
                value: isbn.to_string(),
            });
        }

        let book = self
            .insert(input.title, input.author_id, isbn, input.price_cents)
            .await?;
        info!(book_id = %book.id, author_id = %book.author_id, "created book");
        self.events.publish(CatalogEvent::book_created(book.clone()));

        Ok(CreateBookCommandOutput { book })
    }

    /// Stores a book without the reference and uniqueness pre-checks. Title
    /// and ISBN are stored trimmed; the repository still rejects a taken ISBN.
    pub(crate) async fn insert(
        &self,
        title: &str,
        author_id: AuthorId,
        isbn: &str,
        price_cents: i64,
    ) -> AppResult<Book> {
        let id = BookId::new(self.id_generator.lock().await.generate_async().await);
        let book = Book {
            id,
            create_time: UtcDateTime::now(),
            update_time: None,
            title: title.trim().to_string(),
            isbn: isbn.trim().to_string(),
            price_cents,
            author_id,
        };
        self.book_repository.insert(book.clone()).await?;
        Ok(book)
    }

    pub(crate) fn author_repository(&self) -> &AuthorRepositoryArc {
        &self.author_repository
    }

    pub(crate) fn book_repository(&self) -> &BookRepositoryArc {
        &self.book_repository
    }
}
