use libris_common::date_time::UtcDateTime;
use tracing::info;

use crate::{
    author::{model::AuthorId, repository::AuthorRepositoryArc},
    book::{
        create_book_command::validate_book_fields,
        model::{Book, BookId},
        repository::{BookRecordUpdate, BookRepositoryArc},
    },
    error::{AppError, AppResult},
    event::{CatalogBroadcaster, CatalogEvent},
};

#[derive(Debug, Clone)]
pub struct UpdateBookCommand {
    author_repository: AuthorRepositoryArc,
    book_repository: BookRepositoryArc,
    events: CatalogBroadcaster,
}

#[derive(Debug, Clone)]
pub struct UpdateBookCommandInput<'a> {
    pub id: BookId,
    pub title: Option<&'a str>,
    pub isbn: Option<&'a str>,
    pub price_cents: Option<i64>,
    pub author_id: Option<AuthorId>,
}

#[derive(Debug, Clone)]
pub struct UpdateBookCommandOutput {
    pub book: Book,
}

impl UpdateBookCommand {
    pub fn new(
        author_repository: AuthorRepositoryArc,
        book_repository: BookRepositoryArc,
        events: CatalogBroadcaster,
    ) -> Self {
        Self {
            author_repository,
            book_repository,
            events,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        input: UpdateBookCommandInput<'_>,
    ) -> AppResult<UpdateBookCommandOutput> {
        validate_book_fields(input.title, input.isbn, input.price_cents)?;

        if let Some(author_id) = input.author_id {
            if !self.author_repository.exists(&author_id).await? {
                return Err(AppError::ReferenceNotFound(author_id.to_name()));
            }
        }

        let book = self
            .book_repository
            .update(BookRecordUpdate {
                id: input.id,
                update_time: UtcDateTime::now(),
                title: input.title.map(str::trim),
                isbn: input.isbn.map(str::trim),
                price_cents: input.price_cents,
                author_id: input.author_id,
            })
            .await?
            .ok_or_else(|| AppError::NotFound(input.id.to_name()))?;

        info!(book_id = %book.id, "updated book");
        self.events.publish(CatalogEvent::book_updated(book.clone()));

        Ok(UpdateBookCommandOutput { book })
    }
}
