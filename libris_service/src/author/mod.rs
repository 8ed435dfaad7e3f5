//! Author management: commands, queries and storage.

pub mod create_author_command;
pub mod delete_author_command;
pub mod model;
pub mod query_manager;
pub mod repository;
pub mod update_author_command;
