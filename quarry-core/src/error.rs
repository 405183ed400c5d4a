//! Error types for quarry

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Serialisation error: {0}")]
    Serialisation(String),

    #[error("Database corruption: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Document not found: {0}")]
    DocumentNotFound(u32),

    #[error("Query cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
