//! Catalog change events and subscription filters.

use std::{collections::HashSet, sync::Arc};

use libris_broadcast::{EventBroadcaster, EventPredicate};
use libris_common::date_time::UtcDateTime;
use serde::Serialize;

use crate::{
    author::model::{Author, AuthorId},
    book::model::{Book, BookId},
};

pub type CatalogBroadcaster = EventBroadcaster<CatalogEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AuthorCreated,
    AuthorUpdated,
    AuthorDeleted,
    BookCreated,
    BookUpdated,
    BookDeleted,
}

impl EventKind {
    pub fn is_book(self) -> bool {
        matches!(self, Self::BookCreated | Self::BookUpdated | Self::BookDeleted)
    }
}

/// Snapshot carried by an event. Deletions carry ids only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Author(Author),
    Book(Book),
    #[serde(rename_all = "camelCase")]
    DeletedAuthor { id: AuthorId },
    #[serde(rename_all = "camelCase")]
    DeletedBook { id: BookId, author_id: AuthorId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEvent {
    pub kind: EventKind,
    pub payload: EventPayload,
    pub time: UtcDateTime,
}

impl CatalogEvent {
    fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            kind,
            payload,
            time: UtcDateTime::now(),
        }
    }

    pub fn author_created(author: Author) -> Self {
        Self::new(EventKind::AuthorCreated, EventPayload::Author(author))
    }

    pub fn author_updated(author: Author) -> Self {
        Self::new(EventKind::AuthorUpdated, EventPayload::Author(author))
    }

    pub fn author_deleted(id: AuthorId) -> Self {
        Self::new(EventKind::AuthorDeleted, EventPayload::DeletedAuthor { id })
    }

    pub fn book_created(book: Book) -> Self {
        Self::new(EventKind::BookCreated, EventPayload::Book(book))
    }

    pub fn book_updated(book: Book) -> Self {
        Self::new(EventKind::BookUpdated, EventPayload::Book(book))
    }

    pub fn book_deleted(id: BookId, author_id: AuthorId) -> Self {
        Self::new(
            EventKind::BookDeleted,
            EventPayload::DeletedBook { id, author_id },
        )
    }

    /// The author a book event belongs to.
    pub fn book_author(&self) -> Option<AuthorId> {
        match &self.payload {
            EventPayload::Book(book) => Some(book.author_id),
            EventPayload::DeletedBook { author_id, .. } => Some(*author_id),
            EventPayload::Author(_) | EventPayload::DeletedAuthor { .. } => None,
        }
    }
}

/// Subscription filter over catalog events. The default accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    kinds: Option<HashSet<EventKind>>,
    author: Option<AuthorId>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kinds<I: IntoIterator<Item = EventKind>>(kinds: I) -> Self {
        Self::default().with_kinds(kinds)
    }

    /// Book events of one author.
    pub fn books_of(author: AuthorId) -> Self {
        Self {
            kinds: None,
            author: Some(author),
        }
    }

    #[must_use]
    pub fn with_kinds<I: IntoIterator<Item = EventKind>>(mut self, kinds: I) -> Self {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn matches(&self, event: &CatalogEvent) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        match self.author {
            Some(author) => event.kind.is_book() && event.book_author() == Some(author),
            None => true,
        }
    }

    pub fn into_predicate(self) -> EventPredicate<CatalogEvent> {
        Arc::new(move |event: &CatalogEvent| self.matches(event))
    }
}
