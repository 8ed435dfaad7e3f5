//! Libris catalog service
//!
//! Authors and their books, kept in memory, with three shared mechanisms on
//! top: per-request batched loading of books by author, a broadcaster of
//! catalog change events for live subscriptions, and streaming bulk creation
//! of books with per-item results.

use std::sync::Arc;

use libris_broadcast::Subscription;
use libris_common::id::worker::WorkerIdGenerator;
use tokio::sync::Mutex;

pub mod author;
pub mod book;
pub mod config;
pub mod error;
pub mod event;
pub mod tracing;

use author::{
    create_author_command::CreateAuthorCommand,
    delete_author_command::DeleteAuthorCommand,
    query_manager::AuthorQueryManager,
    repository::{AuthorRepositoryArc, memory::MemoryAuthorRepository},
    update_author_command::UpdateAuthorCommand,
};
use book::{
    bulk_create_books_command::BulkCreateBooksCommand,
    create_book_command::CreateBookCommand,
    delete_book_command::DeleteBookCommand,
    query_manager::BookQueryManager,
    repository::{BookRepositoryArc, memory::MemoryBookRepository},
    update_book_command::UpdateBookCommand,
};
use config::AppConfig;
use event::{CatalogBroadcaster, CatalogEvent, EventFilter};

/// The wired catalog: every command and query over shared repositories and
/// one event broadcaster.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub events: CatalogBroadcaster,
    pub author_queries: AuthorQueryManager,
    pub book_queries: BookQueryManager,
    pub create_author: CreateAuthorCommand,
    pub update_author: UpdateAuthorCommand,
    pub delete_author: DeleteAuthorCommand,
    pub create_book: CreateBookCommand,
    pub update_book: UpdateBookCommand,
    pub delete_book: DeleteBookCommand,
    pub bulk_create_books: BulkCreateBooksCommand,
}

impl Catalog {
    /// Builds a catalog over empty in-memory repositories.
    pub fn new(config: &AppConfig) -> Self {
        Self::with_repositories(
            config,
            Arc::new(MemoryAuthorRepository::new()),
            Arc::new(MemoryBookRepository::new()),
        )
    }

    pub fn with_repositories(
        config: &AppConfig,
        author_repository: AuthorRepositoryArc,
        book_repository: BookRepositoryArc,
    ) -> Self {
        let id_generator = Arc::new(Mutex::new(WorkerIdGenerator::new(
            config.node.worker_number,
        )));
        let events = CatalogBroadcaster::new(config.broadcast);

        let create_book = CreateBookCommand::new(
            Arc::clone(&id_generator),
            Arc::clone(&author_repository),
            Arc::clone(&book_repository),
            events.clone(),
        );

        Self {
            author_queries: AuthorQueryManager::new(Arc::clone(&author_repository)),
            book_queries: BookQueryManager::new(
                Arc::clone(&book_repository),
                Arc::clone(&author_repository),
                config.loader.dispatch.into(),
            ),
            create_author: CreateAuthorCommand::new(
                id_generator,
                Arc::clone(&author_repository),
                events.clone(),
            ),
            update_author: UpdateAuthorCommand::new(
                Arc::clone(&author_repository),
                events.clone(),
            ),
            delete_author: DeleteAuthorCommand::new(
                Arc::clone(&author_repository),
                Arc::clone(&book_repository),
                events.clone(),
            ),
            update_book: UpdateBookCommand::new(
                author_repository,
                Arc::clone(&book_repository),
                events.clone(),
            ),
            delete_book: DeleteBookCommand::new(book_repository, events.clone()),
            bulk_create_books: BulkCreateBooksCommand::new(
                create_book.clone(),
                events.clone(),
                config.ingest.channel_capacity,
            ),
            create_book,
            events,
        }
    }

    /// Live catalog events accepted by `filter`, from now on.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription<CatalogEvent> {
        self.events.subscribe_with(Some(filter.into_predicate()))
    }

    /// Releases every live subscription. Writes after this publish nothing.
    pub fn shutdown(&self) {
        ::tracing::info!(
            subscribers = self.events.subscriber_count(),
            "shutting down catalog"
        );
        self.events.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use futures::StreamExt;
    use libris_broadcast::RecvError;
    use libris_ingest::{FailureKind, IngestItem, IngestOutput, IngestSummary};

    use super::*;
    use crate::{
        author::{
            create_author_command::CreateAuthorCommandInput,
            model::{Author, AuthorId},
        },
        book::{
            create_book_command::CreateBookCommandInput, model::Book,
            update_book_command::UpdateBookCommandInput,
        },
        error::{AppError, ErrorKind},
        event::EventKind,
    };

    pub fn test_config() -> AppConfig {
        AppConfig::from_toml(
            r#"
            [distribution]
            name = "libris-test"

            [node]
            worker_number = 7

            [tracing]
            kind = "Memory"
            "#,
        )
        .unwrap()
    }

    pub async fn author(catalog: &Catalog, name: &str) -> Author {
        catalog
            .create_author
            .execute(CreateAuthorCommandInput {
                display_name: name,
                email: None,
                bio: None,
            })
            .await
            .unwrap()
            .author
    }

    pub async fn book(catalog: &Catalog, author: &Author, isbn: &str) -> Book {
        catalog
            .create_book
            .execute(CreateBookCommandInput {
                title: "Untitled",
                author_id: author.id,
                isbn,
                price_cents: 1_500,
            })
            .await
            .unwrap()
            .book
    }

    fn ingest_item(author: AuthorId, isbn: &str) -> IngestItem<AuthorId> {
        IngestItem {
            title: format!("Book {isbn}"),
            parent_key: author,
            natural_key: isbn.to_string(),
            price_cents: 2_000,
        }
    }

    #[tokio::test]
    async fn create_book_checks_references() {
        let catalog = Catalog::new(&test_config());
        let herbert = author(&catalog, "Frank Herbert").await;
        book(&catalog, &herbert, "978-0441013593").await;

        let duplicate = catalog
            .create_book
            .execute(CreateBookCommandInput {
                title: "Dune again",
                author_id: herbert.id,
                isbn: "978-0441013593",
                price_cents: 100,
            })
            .await
            .unwrap_err();
        assert_eq!(duplicate.kind(), ErrorKind::DuplicateKey);

        catalog.delete_author.execute(herbert.id).await.unwrap();
        let orphan = catalog
            .create_book
            .execute(CreateBookCommandInput {
                title: "Orphan",
                author_id: herbert.id,
                isbn: "1",
                price_cents: 100,
            })
            .await
            .unwrap_err();
        assert!(matches!(orphan, AppError::ReferenceNotFound(_)));
    }

    #[tokio::test]
    async fn update_book_keeps_isbn_unique() {
        let catalog = Catalog::new(&test_config());
        let herbert = author(&catalog, "Frank Herbert").await;
        book(&catalog, &herbert, "a").await;
        let second = book(&catalog, &herbert, "b").await;

        let err = catalog
            .update_book
            .execute(UpdateBookCommandInput {
                id: second.id,
                title: None,
                isbn: Some("a"),
                price_cents: None,
                author_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateKey);

        let updated = catalog
            .update_book
            .execute(UpdateBookCommandInput {
                id: second.id,
                title: Some("Children of Dune"),
                isbn: None,
                price_cents: Some(1_999),
                author_id: None,
            })
            .await
            .unwrap()
            .book;
        assert_eq!(updated.title, "Children of Dune");
        assert_eq!(updated.isbn, "b");
        assert!(updated.update_time.is_some());
    }

    #[tokio::test]
    async fn mutations_publish_events() {
        let catalog = Catalog::new(&test_config());
        let mut all = catalog.subscribe(EventFilter::all());
        let herbert = author(&catalog, "Frank Herbert").await;
        let mut books_of_herbert = catalog.subscribe(EventFilter::books_of(herbert.id));

        let dune = book(&catalog, &herbert, "a").await;
        catalog.delete_book.execute(dune.id).await.unwrap();

        let kinds: Vec<_> = std::iter::from_fn(|| all.try_recv().ok())
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::AuthorCreated,
                EventKind::BookCreated,
                EventKind::BookDeleted,
            ]
        );
        assert_eq!(books_of_herbert.backlog(), 2);
        assert_eq!(
            books_of_herbert.recv().await.unwrap().kind,
            EventKind::BookCreated
        );
    }

    #[tokio::test]
    async fn delete_author_cascades() {
        let catalog = Catalog::new(&test_config());
        let herbert = author(&catalog, "Frank Herbert").await;
        let asimov = author(&catalog, "Isaac Asimov").await;
        book(&catalog, &herbert, "a").await;
        book(&catalog, &herbert, "b").await;
        let foundation = book(&catalog, &asimov, "c").await;
        let mut events = catalog.subscribe(EventFilter::kinds([
            EventKind::BookDeleted,
            EventKind::AuthorDeleted,
        ]));

        let output = catalog.delete_author.execute(herbert.id).await.unwrap();
        assert_eq!(output.deleted_books.len(), 2);

        let kinds: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::BookDeleted,
                EventKind::BookDeleted,
                EventKind::AuthorDeleted,
            ]
        );
        assert_eq!(
            catalog.book_queries.query_all().await.unwrap(),
            vec![foundation]
        );
        assert_eq!(
            catalog
                .author_queries
                .query_single(herbert.id)
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            catalog.delete_author.execute(herbert.id).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn bulk_create_reports_partial_failure() {
        let catalog = Catalog::new(&test_config());
        let herbert = author(&catalog, "Frank Herbert").await;
        let ghost = author(&catalog, "Nobody").await;
        catalog.delete_author.execute(ghost.id).await.unwrap();
        book(&catalog, &herbert, "taken").await;
        let mut created = catalog.subscribe(EventFilter::kinds([EventKind::BookCreated]));

        let output = catalog
            .bulk_create_books
            .execute([
                ingest_item(herbert.id, "a"),
                ingest_item(ghost.id, "b"),
                ingest_item(herbert.id, "taken"),
                ingest_item(herbert.id, "d"),
            ])
            .await
            .unwrap();

        let kinds: Vec<_> = output
            .results
            .iter()
            .map(|result| result.outcome.failure().map(|failure| failure.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                None,
                Some(FailureKind::ReferenceNotFound),
                Some(FailureKind::DuplicateKey),
                None,
            ]
        );
        assert_eq!(
            output.summary,
            IngestSummary {
                succeeded: 2,
                failed: 2
            }
        );
        assert_eq!(created.backlog(), 2);
        assert_eq!(
            catalog.book_queries.query_by_author(herbert.id).await.unwrap().len(),
            3
        );
    }

    #[tokio::test]
    async fn isbn_is_trimmed_on_every_create_path() {
        let catalog = Catalog::new(&test_config());
        let herbert = author(&catalog, "Frank Herbert").await;

        let output = catalog
            .bulk_create_books
            .execute([ingest_item(herbert.id, "978-a ")])
            .await
            .unwrap();
        let created = output.results[0].outcome.record().unwrap();
        assert_eq!(created.isbn, "978-a");
        assert_eq!(created.title, "Book 978-a");

        let duplicate = catalog
            .create_book
            .execute(CreateBookCommandInput {
                title: "Dune",
                author_id: herbert.id,
                isbn: "978-a",
                price_cents: 1_500,
            })
            .await
            .unwrap_err();
        assert_eq!(duplicate.kind(), ErrorKind::DuplicateKey);

        book(&catalog, &herbert, " 978-b").await;
        let output = catalog
            .bulk_create_books
            .execute([ingest_item(herbert.id, "978-b ")])
            .await
            .unwrap();
        assert_eq!(
            output.results[0].outcome.failure().map(|failure| failure.kind),
            Some(FailureKind::DuplicateKey)
        );
    }

    #[tokio::test]
    async fn bulk_create_over_channels() {
        let catalog = Catalog::new(&test_config());
        let herbert = author(&catalog, "Frank Herbert").await;
        let (input, output) = catalog.bulk_create_books.spawn();

        input
            .send(ingest_item(herbert.id, "a"))
            .await
            .unwrap();
        input
            .send(ingest_item(herbert.id, "a"))
            .await
            .unwrap();
        input.finish().await.unwrap();

        let outputs: Vec<_> = output.collect().await;
        assert_eq!(outputs.len(), 3);
        assert_eq!(
            outputs.last(),
            Some(&IngestOutput::Summary(IngestSummary {
                succeeded: 1,
                failed: 1
            }))
        );
        let wire = serde_json::to_value(&outputs[1]).unwrap();
        assert_eq!(wire["errorKind"], "DUPLICATE_KEY");
    }

    #[tokio::test]
    async fn shutdown_closes_subscriptions() {
        let catalog = Catalog::new(&test_config());
        let mut events = catalog.subscribe(EventFilter::all());
        author(&catalog, "Frank Herbert").await;

        catalog.shutdown();
        assert_eq!(
            events.recv().await.unwrap().kind,
            EventKind::AuthorCreated
        );
        assert!(matches!(events.recv().await, Err(RecvError::Closed)));

        author(&catalog, "Isaac Asimov").await;
        assert_eq!(catalog.events.subscriber_count(), 0);
    }
}
