use crate::{
    author::{
        model::{Author, AuthorId},
        repository::{AuthorRepositoryArc, NameMatch},
    },
    error::{AppError, AppResult},
};

#[derive(Debug, Clone)]
pub struct AuthorQueryManager {
    author_repository: AuthorRepositoryArc,
}

impl AuthorQueryManager {
    pub fn new(author_repository: AuthorRepositoryArc) -> Self {
        Self { author_repository }
    }

    pub async fn query_single(&self, id: AuthorId) -> AppResult<Author> {
        self.author_repository
            .select(&id)
            .await?
            .ok_or_else(|| AppError::NotFound(id.to_name()))
    }

    pub async fn query_multiple(&self, ids: &[AuthorId]) -> AppResult<Vec<Author>> {
        self.author_repository.select_multiple(ids).await
    }

    pub async fn query_all(&self) -> AppResult<Vec<Author>> {
        self.author_repository.select_all().await
    }

    pub async fn query_by_name(&self, name: &str, matching: NameMatch) -> AppResult<Vec<Author>> {
        self.author_repository.select_by_name(name, matching).await
    }

    pub async fn query_by_email(&self, email: &str) -> AppResult<Author> {
        let email = email.trim();
        self.author_repository
            .select_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("author with email `{email}`")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use libris_common::{date_time::UtcDateTime, id::Id};

    use super::*;
    use crate::{author::repository::memory::MemoryAuthorRepository, error::ErrorKind};

    fn author(id: u128, display_name: &str, email: &str) -> Author {
        Author {
            id: AuthorId::new(Id::new(id)),
            create_time: UtcDateTime::UNIX_EPOCH,
            update_time: None,
            display_name: display_name.to_string(),
            email: Some(email.to_string()),
            bio: None,
        }
    }

    fn queries() -> AuthorQueryManager {
        AuthorQueryManager::new(Arc::new(MemoryAuthorRepository::with_data(vec![
            author(1, "Frank Herbert", "frank@dune.org"),
            author(2, "Brian Herbert", "brian@dune.org"),
            author(3, "Ursula K. Le Guin", "ursula@earthsea.org"),
        ])))
    }

    fn names(authors: AppResult<Vec<Author>>) -> Vec<String> {
        authors
            .unwrap()
            .into_iter()
            .map(|author| author.display_name)
            .collect()
    }

    #[tokio::test]
    async fn name_matching() {
        let queries = queries();

        let containing = queries.query_by_name("herbert", NameMatch::Containing).await;
        assert_eq!(names(containing), vec!["Frank Herbert", "Brian Herbert"]);

        let ignore_case = queries
            .query_by_name("frank herbert", NameMatch::IgnoreCase)
            .await;
        assert_eq!(names(ignore_case), vec!["Frank Herbert"]);

        let exact = queries.query_by_name("frank herbert", NameMatch::Exact).await;
        assert!(names(exact).is_empty());
    }

    #[tokio::test]
    async fn by_email() {
        let queries = queries();
        let author = queries.query_by_email(" ursula@earthsea.org ").await.unwrap();
        assert_eq!(author.id, AuthorId::new(Id::new(3)));
        assert_eq!(
            queries
                .query_by_email("nobody@example.org")
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }
}
