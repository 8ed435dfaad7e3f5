use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use async_trait::async_trait;
use itertools::Itertools;
use tokio::sync::RwLock;

use crate::{
    author::model::AuthorId,
    book::{
        model::{Book, BookId},
        repository::{BookRecordUpdate, BookRepository},
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Default)]
pub struct MemoryBookRepository {
    books: Arc<RwLock<HashMap<BookId, Book>>>,
}

impl MemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(books: Vec<Book>) -> Self {
        Self {
            books: Arc::new(RwLock::new(
                books.into_iter().map(|book| (book.id, book)).collect(),
            )),
        }
    }
}

fn isbn_taken(books: &HashMap<BookId, Book>, isbn: &str, except: Option<BookId>) -> bool {
    books
        .values()
        .any(|book| book.isbn == isbn && Some(book.id) != except)
}

fn duplicate_isbn(isbn: &str) -> AppError {
    AppError::DuplicateKey {
        field: "isbn",
        value: isbn.to_string(),
    }
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    async fn insert(&self, book: Book) -> AppResult<()> {
        let mut books = self.books.write().await;
        if isbn_taken(&books, &book.isbn, None) {
            return Err(duplicate_isbn(&book.isbn));
        }
        books.insert(book.id, book);
        Ok(())
    }

    async fn update(&self, update: BookRecordUpdate<'_>) -> AppResult<Option<Book>> {
        let mut books = self.books.write().await;
        if let Some(isbn) = update.isbn {
            if isbn_taken(&books, isbn, Some(update.id)) {
                return Err(duplicate_isbn(isbn));
            }
        }
        let Some(book) = books.get_mut(&update.id) else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            book.title = title.to_string();
        }
        if let Some(isbn) = update.isbn {
            book.isbn = isbn.to_string();
        }
        if let Some(price_cents) = update.price_cents {
            book.price_cents = price_cents;
        }
        if let Some(author_id) = update.author_id {
            book.author_id = author_id;
        }
        book.update_time = Some(update.update_time);
        Ok(Some(book.clone()))
    }

    async fn delete(&self, id: &BookId) -> AppResult<bool> {
        Ok(self.books.write().await.remove(id).is_some())
    }

    async fn select(&self, id: &BookId) -> AppResult<Option<Book>> {
        Ok(self.books.read().await.get(id).cloned())
    }

    async fn select_all(&self) -> AppResult<Vec<Book>> {
        let books = self.books.read().await;
        Ok(books
            .values()
            .sorted_unstable_by_key(|book| book.id)
            .cloned()
            .collect())
    }

    async fn select_by_author_ids(
        &self,
        author_ids: &[AuthorId],
    ) -> AppResult<HashMap<AuthorId, Vec<Book>>> {
        let wanted: HashSet<&AuthorId> = author_ids.iter().collect();
        let books = self.books.read().await;
        Ok(books
            .values()
            .filter(|book| wanted.contains(&book.author_id))
            .sorted_unstable_by_key(|book| book.id)
            .cloned()
            .into_group_map_by(|book| book.author_id))
    }

    async fn exists_by_isbn(&self, isbn: &str) -> AppResult<bool> {
        Ok(isbn_taken(&*self.books.read().await, isbn, None))
    }

    async fn delete_by_author(&self, author_id: &AuthorId) -> AppResult<Vec<BookId>> {
        let mut books = self.books.write().await;
        let removed: Vec<BookId> = books
            .values()
            .filter(|book| book.author_id == *author_id)
            .map(|book| book.id)
            .sorted_unstable()
            .collect();
        for id in &removed {
            books.remove(id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use libris_common::{date_time::UtcDateTime, id::Id};

    use super::*;

    fn book(id: u128, author: u128, isbn: &str) -> Book {
        Book {
            id: BookId::new(Id::new(id)),
            create_time: UtcDateTime::UNIX_EPOCH,
            update_time: None,
            title: format!("Book {id}"),
            isbn: isbn.to_string(),
            price_cents: 100,
            author_id: AuthorId::new(Id::new(author)),
        }
    }

    #[tokio::test]
    async fn groups_by_author() {
        let repository = MemoryBookRepository::with_data(vec![
            book(3, 1, "c"),
            book(1, 1, "a"),
            book(2, 2, "b"),
            book(4, 9, "d"),
        ]);
        let author = |id| AuthorId::new(Id::new(id));

        let grouped = repository
            .select_by_author_ids(&[author(1), author(2), author(5)])
            .await
            .unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(
            grouped[&author(1)]
                .iter()
                .map(|book| book.isbn.as_str())
                .collect::<Vec<_>>(),
            vec!["a", "c"]
        );
        assert_eq!(grouped[&author(2)].len(), 1);
        assert!(!grouped.contains_key(&author(5)));
    }

    #[tokio::test]
    async fn isbn_stays_unique() {
        let repository = MemoryBookRepository::with_data(vec![book(1, 1, "a"), book(2, 1, "b")]);

        assert!(matches!(
            repository.insert(book(3, 1, "a")).await,
            Err(AppError::DuplicateKey { field: "isbn", .. })
        ));
        let update = BookRecordUpdate {
            id: BookId::new(Id::new(2)),
            update_time: UtcDateTime::now(),
            title: None,
            isbn: Some("a"),
            price_cents: None,
            author_id: None,
        };
        assert!(repository.update(update.clone()).await.is_err());
        // Keeping its own ISBN is not a conflict.
        let own = BookRecordUpdate {
            isbn: Some("b"),
            ..update
        };
        assert!(repository.update(own).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deletes_by_author() {
        let repository = MemoryBookRepository::with_data(vec![
            book(1, 1, "a"),
            book(2, 2, "b"),
            book(3, 1, "c"),
        ]);
        let removed = repository
            .delete_by_author(&AuthorId::new(Id::new(1)))
            .await
            .unwrap();
        assert_eq!(
            removed,
            vec![BookId::new(Id::new(1)), BookId::new(Id::new(3))]
        );
        assert_eq!(repository.select_all().await.unwrap().len(), 1);
        assert!(!repository.exists_by_isbn("a").await.unwrap());
        assert!(repository.exists_by_isbn("b").await.unwrap());
    }
}
