use tracing::info;

use crate::{
    book::{model::BookId, repository::BookRepositoryArc},
    error::{AppError, AppResult},
    event::{CatalogBroadcaster, CatalogEvent},
};

#[derive(Debug, Clone)]
pub struct DeleteBookCommand {
    book_repository: BookRepositoryArc,
    events: CatalogBroadcaster,
}

impl DeleteBookCommand {
    pub fn new(book_repository: BookRepositoryArc, events: CatalogBroadcaster) -> Self {
        Self {
            book_repository,
            events,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(&self, id: BookId) -> AppResult<()> {
        let book = self
            .book_repository
            .select(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_name()))?;

        if !self.book_repository.delete(&id).await? {
            return Err(AppError::NotFound(id.to_name()));
        }

        info!(book_id = %id, "deleted book");
        self.events
            .publish(CatalogEvent::book_deleted(id, book.author_id));

        Ok(())
    }
}
