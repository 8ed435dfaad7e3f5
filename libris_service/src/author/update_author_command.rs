use libris_common::date_time::UtcDateTime;
use tracing::info;

use crate::{
    author::{
        model::{Author, AuthorId},
        repository::{AuthorRecordUpdate, AuthorRepositoryArc},
    },
    error::{AppError, AppResult},
    event::{CatalogBroadcaster, CatalogEvent},
};

#[derive(Debug, Clone)]
pub struct UpdateAuthorCommand {
    author_repository: AuthorRepositoryArc,
    events: CatalogBroadcaster,
}

#[derive(Debug, Clone)]
pub struct UpdateAuthorCommandInput<'a> {
    pub id: AuthorId,
    pub display_name: Option<&'a str>,
    pub email: Option<&'a str>,
    pub bio: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct UpdateAuthorCommandOutput {
    pub author: Author,
}

impl UpdateAuthorCommand {
    pub fn new(author_repository: AuthorRepositoryArc, events: CatalogBroadcaster) -> Self {
        Self {
            author_repository,
            events,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        input: UpdateAuthorCommandInput<'_>,
    ) -> AppResult<UpdateAuthorCommandOutput> {
        let display_name = match input.display_name.map(str::trim) {
            Some("") => return Err(AppError::invalid("display_name", "must not be blank")),
            display_name => display_name,
        };

        let author = self
            .author_repository
            .update(AuthorRecordUpdate {
                id: input.id,
                update_time: UtcDateTime::now(),
                display_name,
                email: input.email.map(str::trim),
                bio: input.bio,
            })
            .await?
            .ok_or_else(|| AppError::NotFound(input.id.to_name()))?;

        info!(author_id = %input.id, "updated author");
        self.events.publish(CatalogEvent::author_updated(author.clone()));

        Ok(UpdateAuthorCommandOutput { author })
    }
}
