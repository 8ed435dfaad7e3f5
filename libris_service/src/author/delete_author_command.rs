use tracing::info;

use crate::{
    author::{model::AuthorId, repository::AuthorRepositoryArc},
    book::{model::BookId, repository::BookRepositoryArc},
    error::{AppError, AppResult},
    event::{CatalogBroadcaster, CatalogEvent},
};

/// Deletes an author together with all of their books.
#[derive(Debug, Clone)]
pub struct DeleteAuthorCommand {
    author_repository: AuthorRepositoryArc,
    book_repository: BookRepositoryArc,
    events: CatalogBroadcaster,
}

#[derive(Debug, Clone)]
pub struct DeleteAuthorCommandOutput {
    pub deleted_books: Vec<BookId>,
}

impl DeleteAuthorCommand {
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

    /// Emits one [`EventKind::BookDeleted`](crate::event::EventKind) per
    /// removed book, then [`EventKind::AuthorDeleted`](crate::event::EventKind).
    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, id: AuthorId) -> AppResult<DeleteAuthorCommandOutput> {
        if !self.author_repository.exists(&id).await? {
            return Err(AppError::NotFound(id.to_name()));
        }

        let deleted_books = self.book_repository.delete_by_author(&id).await?;
        for book_id in &deleted_books {
            self.events.publish(CatalogEvent::book_deleted(*book_id, id));
        }

        if !self.author_repository.delete(&id).await? {
            return Err(AppError::NotFound(id.to_name()));
        }
        info!(author_id = %id, books = deleted_books.len(), "deleted author");
        self.events.publish(CatalogEvent::author_deleted(id));

        Ok(DeleteAuthorCommandOutput { deleted_books })
    }
}
