use cw_types::{ResourceType, TypeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("no decoder for {0:?} resources")]
    UnsupportedResource(ResourceType),

    #[error("serializer error: {0}")]
    Serializer(#[from] cw_serializer::SerializerError),

    #[error("archive error: {0}")]
    Archive(#[from] cw_archive::ArchiveError),

    #[error("store error: {0}")]
    Store(#[from] cw_store::StoreError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
