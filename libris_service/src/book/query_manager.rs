use std::sync::Arc;

use libris_loader::{DispatchMode, FetchError, KeyBatcher, fetch_fn};

use crate::{
    author::{
        model::AuthorId,
        repository::{AuthorRepositoryArc, NameMatch},
    },
    book::{
        model::{Book, BookId},
        repository::BookRepositoryArc,
    },
    error::{AppError, AppResult},
};

pub type BooksByAuthorLoader = KeyBatcher<AuthorId, Book>;

#[derive(Debug, Clone)]
pub struct BookQueryManager {
    book_repository: BookRepositoryArc,
    author_repository: AuthorRepositoryArc,
    dispatch_mode: DispatchMode,
}

impl BookQueryManager {
    pub fn new(
        book_repository: BookRepositoryArc,
        author_repository: AuthorRepositoryArc,
        dispatch_mode: DispatchMode,
    ) -> Self {
        Self {
            book_repository,
            author_repository,
            dispatch_mode,
        }
    }

    pub async fn query_single(&self, id: BookId) -> AppResult<Book> {
        self.book_repository
            .select(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_name()))
    }

    pub async fn query_all(&self) -> AppResult<Vec<Book>> {
        self.book_repository.select_all().await
    }

    /// Books of one author, fetched directly.
    pub async fn query_by_author(&self, author_id: AuthorId) -> AppResult<Vec<Book>> {
        Ok(self
            .book_repository
            .select_by_author_ids(&[author_id])
            .await?
            .remove(&author_id)
            .unwrap_or_default())
    }

    /// Books of every author whose display name matches `name`, grouped by
    /// author, oldest author first.
    pub async fn query_by_author_name(
        &self,
        name: &str,
        matching: NameMatch,
    ) -> AppResult<Vec<Book>> {
        let author_ids: Vec<_> = self
            .author_repository
            .select_by_name(name.trim(), matching)
            .await?
            .into_iter()
            .map(|author| author.id)
            .collect();
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut grouped = self.book_repository.select_by_author_ids(&author_ids).await?;
        Ok(author_ids
            .iter()
            .filter_map(|id| grouped.remove(id))
            .flatten()
            .collect())
    }

    /// A fresh loader for one resolution scope, e.g. one inbound request.
    ///
    /// Loads issued through it share one grouped fetch. Never reuse a loader
    /// across requests.
    pub fn books_by_author_loader(&self) -> BooksByAuthorLoader {
        let repository = Arc::clone(&self.book_repository);
        KeyBatcher::with_mode(
            fetch_fn(move |author_ids: Vec<AuthorId>| {
                let repository = Arc::clone(&repository);
                async move {
                    repository
                        .select_by_author_ids(&author_ids)
                        .await
                        .map_err(FetchError::new)
                }
            }),
            self.dispatch_mode,
        )
    }

    /// Books for each of `author_ids`, in the same order, resolved in one
    /// scope with a single grouped fetch.
    pub async fn query_books_for_authors(
        &self,
        author_ids: &[AuthorId],
    ) -> AppResult<Vec<Arc<[Book]>>> {
        let loader = self.books_by_author_loader();
        let loads = author_ids.iter().map(|id| loader.load(*id)).collect::<Vec<_>>();
        if self.dispatch_mode == DispatchMode::Manual {
            loader.flush().await;
        }
        let mut books = Vec::with_capacity(loads.len());
        for load in loads {
            books.push(load.await?);
        }
        Ok(books)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use libris_common::{date_time::UtcDateTime, id::Id};

    use super::*;
    use crate::{
        author::{model::Author, repository::memory::MemoryAuthorRepository},
        book::repository::{BookRecordUpdate, BookRepository, memory::MemoryBookRepository},
    };

    /// Counts grouped fetches made against an in-memory repository.
    #[derive(Debug)]
    struct CountingRepository {
        inner: MemoryBookRepository,
        grouped_fetches: AtomicUsize,
    }

    #[async_trait]
    impl BookRepository for CountingRepository {
        async fn insert(&self, book: Book) -> AppResult<()> {
            self.inner.insert(book).await
        }

        async fn update(&self, update: BookRecordUpdate<'_>) -> AppResult<Option<Book>> {
            self.inner.update(update).await
        }

        async fn delete(&self, id: &BookId) -> AppResult<bool> {
            self.inner.delete(id).await
        }

        async fn select(&self, id: &BookId) -> AppResult<Option<Book>> {
            self.inner.select(id).await
        }

        async fn select_all(&self) -> AppResult<Vec<Book>> {
            self.inner.select_all().await
        }

        async fn select_by_author_ids(
            &self,
            author_ids: &[AuthorId],
        ) -> AppResult<HashMap<AuthorId, Vec<Book>>> {
            self.grouped_fetches.fetch_add(1, Ordering::SeqCst);
            self.inner.select_by_author_ids(author_ids).await
        }

        async fn exists_by_isbn(&self, isbn: &str) -> AppResult<bool> {
            self.inner.exists_by_isbn(isbn).await
        }

        async fn delete_by_author(&self, author_id: &AuthorId) -> AppResult<Vec<BookId>> {
            self.inner.delete_by_author(author_id).await
        }
    }

    fn author(id: u128) -> AuthorId {
        AuthorId::new(Id::new(id))
    }

    fn authors() -> AuthorRepositoryArc {
        let stored = |id: u128, display_name: &str| Author {
            id: author(id),
            create_time: UtcDateTime::UNIX_EPOCH,
            update_time: None,
            display_name: display_name.to_string(),
            email: None,
            bio: None,
        };
        Arc::new(MemoryAuthorRepository::with_data(vec![
            stored(1, "Frank Herbert"),
            stored(2, "Brian Herbert"),
            stored(3, "Ursula K. Le Guin"),
        ]))
    }

    fn repository() -> Arc<CountingRepository> {
        let book = |id: u128, author_id: u128| Book {
            id: BookId::new(Id::new(id)),
            create_time: UtcDateTime::UNIX_EPOCH,
            update_time: None,
            title: format!("Book {id}"),
            isbn: id.to_string(),
            price_cents: 100,
            author_id: author(author_id),
        };
        Arc::new(CountingRepository {
            inner: MemoryBookRepository::with_data(vec![book(1, 1), book(2, 1), book(3, 3)]),
            grouped_fetches: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn one_fetch_per_scope() {
        for mode in [DispatchMode::Auto, DispatchMode::Manual] {
            let repository = repository();
            let queries = BookQueryManager::new(repository.clone(), authors(), mode);

            let books = queries
                .query_books_for_authors(&[author(1), author(2), author(3), author(1)])
                .await
                .unwrap();

            assert_eq!(repository.grouped_fetches.load(Ordering::SeqCst), 1);
            assert_eq!(
                books.iter().map(|books| books.len()).collect::<Vec<_>>(),
                vec![2, 0, 1, 2]
            );
            assert!(Arc::ptr_eq(&books[0], &books[3]));
        }
    }

    #[tokio::test]
    async fn scopes_fetch_independently() {
        let repository = repository();
        let queries = BookQueryManager::new(repository.clone(), authors(), DispatchMode::Auto);

        let first = queries.books_by_author_loader();
        let second = queries.books_by_author_loader();
        let (a, b) = tokio::join!(first.load(author(1)), second.load(author(1)));

        assert_eq!(a.unwrap().len(), 2);
        assert_eq!(b.unwrap().len(), 2);
        assert_eq!(repository.grouped_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn direct_query_by_author() {
        let queries = BookQueryManager::new(repository(), authors(), DispatchMode::Auto);
        assert_eq!(queries.query_by_author(author(1)).await.unwrap().len(), 2);
        assert!(queries.query_by_author(author(2)).await.unwrap().is_empty());
        assert_eq!(
            queries
                .query_single(BookId::new(Id::new(9)))
                .await
                .unwrap_err()
                .kind(),
            crate::error::ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn by_author_name() {
        let queries = BookQueryManager::new(repository(), authors(), DispatchMode::Auto);
        let titles = |books: AppResult<Vec<Book>>| {
            books
                .unwrap()
                .into_iter()
                .map(|book| book.title)
                .collect::<Vec<_>>()
        };

        let herberts = queries
            .query_by_author_name("herbert", NameMatch::Containing)
            .await;
        assert_eq!(titles(herberts), vec!["Book 1", "Book 2"]);

        let le_guin = queries
            .query_by_author_name("ursula k. le guin", NameMatch::IgnoreCase)
            .await;
        assert_eq!(titles(le_guin), vec!["Book 3"]);

        let exact = queries
            .query_by_author_name("ursula k. le guin", NameMatch::Exact)
            .await;
        assert!(titles(exact).is_empty());

        let without_books = queries
            .query_by_author_name("Brian Herbert", NameMatch::Exact)
            .await;
        assert!(titles(without_books).is_empty());
    }
}
