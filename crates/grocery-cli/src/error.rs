use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] grocery_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("List name cannot be empty")]
    EmptyListName,
    #[error("Item name cannot be empty")]
    EmptyItemName,
    #[error("ID or name cannot be empty")]
    EmptyIdentifier,
    #[error("List not found for id/prefix/name: {0}")]
    ListNotFound(String),
    #[error("Item not found for id/prefix: {0}")]
    ItemNotFound(String),
    #[error("{0}")]
    AmbiguousId(String),
    #[error("Nothing to change; pass at least one field to edit")]
    NothingToEdit,
    #[error("Refusing to delete all data without --yes")]
    ConfirmationRequired,
    #[error("Configuration error: {0}")]
    Config(String),
}
