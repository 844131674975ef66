use thiserror::Error;

use puddle_core::errors::ApplicationError;

pub mod catalog;
pub mod inquiry;

pub use catalog::{decode_embedding, encode_embedding, SqlCatalogRepository};
pub use inquiry::SqlInquiryRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

fn decode_err(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}
