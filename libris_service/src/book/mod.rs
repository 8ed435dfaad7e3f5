//! Book management: commands, queries, bulk ingestion and storage.

pub mod bulk_create_books_command;
pub mod create_book_command;
pub mod delete_book_command;
pub mod model;
pub mod query_manager;
pub mod repository;
pub mod update_book_command;
