use thiserror::Error;

use crate::group::Rank;

#[derive(Error, Debug)]
pub enum CollectiveError {
    #[error("Invalid rank group: {0}")]
    InvalidGroup(String),
    #[error("Invalid rank {rank}: group size is {size}")]
    InvalidRank { rank: Rank, size: usize },
    #[error("Communication error: {0}")]
    CommunicationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Payload mismatch: expected {expected} parts, got {actual}")]
    PayloadMismatch { expected: usize, actual: usize },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Shared memory error: {0}")]
    SharedMemoryError(String),
    #[error("Process error: {0}")]
    ProcessError(String),
}

pub type Result<T> = std::result::Result<T, CollectiveError>;
