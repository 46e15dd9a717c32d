use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::{ItemId, PatronId, Status},
    lifecycle::TransitionKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    InvalidTransition,
    Conflict,
    Validation,
}

/// Wire-friendly rendering of a [`CatalogueError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogueError {
    #[error("item {0} not found")]
    NotFound(ItemId),
    #[error("cannot apply {kind} to item {item} while it is {from}")]
    InvalidTransition {
        item: ItemId,
        from: Status,
        kind: TransitionKind,
    },
    #[error("item {item} is on hold for {held_by}, not {requested_by}")]
    Conflict {
        item: ItemId,
        held_by: PatronId,
        requested_by: PatronId,
    },
    #[error("{0}")]
    Validation(String),
}

impl CatalogueError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::Validation(_) => ErrorCode::Validation,
        }
    }
}

impl From<&CatalogueError> for ErrorReport {
    fn from(value: &CatalogueError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

impl From<CatalogueError> for ErrorReport {
    fn from(value: CatalogueError) -> Self {
        Self::from(&value)
    }
}
