use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use itertools::Itertools;
use tokio::sync::RwLock;

use crate::{
    author::{
        model::{Author, AuthorId},
        repository::{AuthorRecordUpdate, AuthorRepository, NameMatch},
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Default)]
pub struct MemoryAuthorRepository {
    authors: Arc<RwLock<HashMap<AuthorId, Author>>>,
}

impl MemoryAuthorRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(authors: Vec<Author>) -> Self {
        Self {
            authors: Arc::new(RwLock::new(
                authors
                    .into_iter()
                    .map(|author| (author.id, author))
                    .collect(),
            )),
        }
    }
}

#[async_trait]
impl AuthorRepository for MemoryAuthorRepository {
    async fn insert(&self, author: Author) -> AppResult<()> {
        let mut authors = self.authors.write().await;
        if authors.contains_key(&author.id) {
            return Err(AppError::DuplicateKey {
                field: "id",
                value: author.id.to_string(),
            });
        }
        authors.insert(author.id, author);
        Ok(())
    }

    async fn update(&self, update: AuthorRecordUpdate<'_>) -> AppResult<Option<Author>> {
        let mut authors = self.authors.write().await;
        let Some(author) = authors.get_mut(&update.id) else {
            return Ok(None);
        };
        if let Some(display_name) = update.display_name {
            author.display_name = display_name.to_string();
        }
        if let Some(email) = update.email {
            author.email = Some(email.to_string());
        }
        if let Some(bio) = update.bio {
            author.bio = Some(bio.to_string());
        }
        author.update_time = Some(update.update_time);
        Ok(Some(author.clone()))
    }

    async fn delete(&self, id: &AuthorId) -> AppResult<bool> {
        Ok(self.authors.write().await.remove(id).is_some())
    }

    async fn select(&self, id: &AuthorId) -> AppResult<Option<Author>> {
        Ok(self.authors.read().await.get(id).cloned())
    }

    async fn select_multiple(&self, ids: &[AuthorId]) -> AppResult<Vec<Author>> {
        let authors = self.authors.read().await;
        Ok(ids
            .iter()
            .unique()
            .filter_map(|id| authors.get(id).cloned())
            .collect())
    }

    async fn select_all(&self) -> AppResult<Vec<Author>> {
        let authors = self.authors.read().await;
        Ok(authors
            .values()
            .sorted_unstable_by_key(|author| author.id)
            .cloned()
            .collect())
    }

    async fn select_by_name(&self, name: &str, matching: NameMatch) -> AppResult<Vec<Author>> {
        let authors = self.authors.read().await;
        Ok(authors
            .values()
            .filter(|author| matching.matches(&author.display_name, name))
            .sorted_unstable_by_key(|author| author.id)
            .cloned()
            .collect())
    }

    async fn select_by_email(&self, email: &str) -> AppResult<Option<Author>> {
        let authors = self.authors.read().await;
        Ok(authors
            .values()
            .find(|author| author.email.as_deref() == Some(email))
            .cloned())
    }

    async fn exists(&self, id: &AuthorId) -> AppResult<bool> {
        Ok(self.authors.read().await.contains_key(id))
    }
}
