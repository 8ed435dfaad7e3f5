use std::sync::Arc;

use async_trait::async_trait;
use libris_ingest::{
    IngestInput, IngestItem, IngestOutputStream, IngestSession, IngestStore, IngestSummary,
    ItemResult, StoreError, spawn_session,
};
use tracing::info;

use crate::{
    author::model::AuthorId,
    book::{create_book_command::CreateBookCommand, model::Book},
    error::{AppError, AppResult},
    event::{CatalogBroadcaster, CatalogEvent},
};

/// Lets an ingest session create books through the catalog repositories.
#[derive(Debug, Clone)]
pub struct CatalogIngestStore {
    create_book_command: CreateBookCommand,
}

fn store_error(err: AppError) -> StoreError {
    match err {
        AppError::DuplicateKey { value, .. } => StoreError::Duplicate(value),
        AppError::ReferenceNotFound(name) => StoreError::MissingReference(name),
        err => StoreError::Other(Box::new(err)),
    }
}

#[async_trait]
impl IngestStore for CatalogIngestStore {
    type ParentKey = AuthorId;
    type Record = Book;

    async fn parent_exists(&self, key: &AuthorId) -> Result<bool, StoreError> {
        self.create_book_command
            .author_repository()
            .exists(key)
            .await
            .map_err(store_error)
    }

    async fn natural_key_exists(&self, natural_key: &str) -> Result<bool, StoreError> {
        self.create_book_command
            .book_repository()
            .exists_by_isbn(natural_key.trim())
            .await
            .map_err(store_error)
    }

    async fn save(&self, item: &IngestItem<AuthorId>) -> Result<Book, StoreError> {
        self.create_book_command
            .insert(
                &item.title,
                item.parent_key,
                &item.natural_key,
                item.price_cents,
            )
            .await
            .map_err(store_error)
    }
}

/// Creates many books in one streaming exchange, one result per item.
#[derive(Debug, Clone)]
pub struct BulkCreateBooksCommand {
    store: Arc<CatalogIngestStore>,
    events: CatalogBroadcaster,
    channel_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct BulkCreateBooksCommandOutput {
    pub results: Vec<ItemResult<Book>>,
    pub summary: IngestSummary,
}

impl BulkCreateBooksCommand {
    pub fn new(
        create_book_command: CreateBookCommand,
        events: CatalogBroadcaster,
        channel_capacity: usize,
    ) -> Self {
        Self {
            store: Arc::new(CatalogIngestStore {
                create_book_command,
            }),
            events,
            channel_capacity,
        }
    }

    /// Opens a session whose created books are announced as
    /// [`EventKind::BookCreated`](crate::event::EventKind).
    pub fn open_session(&self) -> IngestSession<CatalogIngestStore> {
        let events = self.events.clone();
        IngestSession::new(Arc::clone(&self.store)).with_hook(move |book: &Book| {
            events.publish(CatalogEvent::book_created(book.clone()));
        })
    }

    /// Runs a session on the current runtime behind a channel pair, for
    /// streaming transports.
    pub fn spawn(&self) -> (IngestInput<AuthorId>, IngestOutputStream<Book>) {
        spawn_session(self.open_session(), self.channel_capacity)
    }

    /// Ingests an already materialized batch.
    #[tracing::instrument(skip(self, items))]
    pub async fn execute<I>(&self, items: I) -> AppResult<BulkCreateBooksCommandOutput>
    where
        I: IntoIterator<Item = IngestItem<AuthorId>>,
    {
        let mut session = self.open_session();
        let mut results = Vec::new();
        for item in items {
            results.push(session.submit(item).await?);
        }
        let summary = session.end_of_input()?;
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "bulk created books"
        );

        Ok(BulkCreateBooksCommandOutput { results, summary })
    }
}
