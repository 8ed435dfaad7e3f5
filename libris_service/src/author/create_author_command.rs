use std::sync::Arc;

use libris_common::{date_time::UtcDateTime, id::worker::WorkerIdGenerator};
use tokio::sync::Mutex;
use tracing::info;

use crate::{
    author::{
        model::{Author, AuthorId},
        repository::AuthorRepositoryArc,
    },
    error::{AppError, AppResult},
    event::{CatalogBroadcaster, CatalogEvent},
};

/// Creates authors and announces them as [`EventKind::AuthorCreated`](crate::event::EventKind).
#[derive(Debug, Clone)]
pub struct CreateAuthorCommand {
    id_generator: Arc<Mutex<WorkerIdGenerator>>,
    author_repository: AuthorRepositoryArc,
    events: CatalogBroadcaster,
}

#[derive(Debug, Clone)]
pub struct CreateAuthorCommandInput<'a> {
    pub display_name: &'a str,
    pub email: Option<&'a str>,
    pub bio: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct CreateAuthorCommandOutput {
    pub author: Author,
}

impl CreateAuthorCommand {
    pub fn new(
        id_generator: Arc<Mutex<WorkerIdGenerator>>,
        author_repository: AuthorRepositoryArc,
        events: CatalogBroadcaster,
    ) -> Self {
        Self {
            id_generator,
            author_repository,
            events,
        }
    }

    /// # Errors
    ///
    /// [`AppError::InvalidArgument`] for a blank display name.
    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        input: CreateAuthorCommandInput<'_>,
    ) -> AppResult<CreateAuthorCommandOutput> {
        let display_name = input.display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::invalid("display_name", "must not be blank"));
        }

        let id = AuthorId::new(self.id_generator.lock().await.generate_async().await);
        let author = Author {
            id,
            create_time: UtcDateTime::now(),
            update_time: None,
            display_name: display_name.to_string(),
            email: input.email.map(|email| email.trim().to_string()),
            bio: input.bio.map(str::to_string),
        };
        self.author_repository.insert(author.clone()).await?;

        info!(author_id = %id, "created author");
        self.events.publish(CatalogEvent::author_created(author.clone()));

        Ok(CreateAuthorCommandOutput { author })
    }
}
