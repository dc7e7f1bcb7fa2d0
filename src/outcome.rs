//! Explicit result of a repository operation.
//!
//! Every repository call hands back its status and message together with its payload, so
//! callers never read outcome metadata from shared state.

use axum::http::StatusCode;
use serde::{Serialize, Serializer};

use crate::pagination::Page;

/// Message used whenever an operation did not succeed.
pub const FAILURE_MESSAGE: &str = "Check the data for error details";

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub status: StatusCode,
    pub message: String,
    pub data: T,
}

impl<T> Outcome<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: T) -> Self {
        Self {
            status,
            message: message.into(),
            data,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::OK, message, data)
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self::new(StatusCode::CREATED, message, data)
    }

    /// Only 200 and 201 count as success; every other status is a failure.
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self.status, StatusCode::OK | StatusCode::CREATED)
    }
}

/// A saved row, or `false` when there was nothing to save.
#[derive(Debug, Clone, PartialEq)]
pub enum Record<T> {
    Found(T),
    Missing,
}

impl<T> Record<T> {
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing => None,
        }
    }
}

impl<T: Serialize> Serialize for Record<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Found(value) => value.serialize(serializer),
            Self::Missing => serializer.serialize_bool(false),
        }
    }
}

/// Rows returned by a listing call: either everything that matched, or one page of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Items(Vec<T>),
    Page(Page<T>),
}

impl<T> Listing<T> {
    #[must_use]
    pub fn items(&self) -> &[T] {
        match self {
            Self::Items(items) => items,
            Self::Page(page) => &page.data,
        }
    }
}
