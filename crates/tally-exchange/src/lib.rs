//! Crash-safe file handoff between a producer and a downstream consumer.
//!
//! Files live in one directory and move through two states, told apart by
//! their suffix:
//!
//! - `<stem>.pending`: fully written by the producer, not yet read.
//! - `<stem>.consumed`: read by the consumer, not yet committed downstream.
//!
//! A consumed file that survives a restart is unconfirmed and must be reset to
//! pending with [`ExchangeDir::reset_consumed_on_startup`] before the first
//! [`ExchangeDir::consume_all`].

mod dir;

pub use dir::{ConsumedFile, ExchangeDir};

use std::{io, path::PathBuf};

pub const PENDING_SUFFIX: &str = ".pending";
pub const CONSUMED_SUFFIX: &str = ".consumed";

pub type ExchangeResult<T> = Result<T, ExchangeError>;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid name pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("invalid name prefix '{0}'")]
    Prefix(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Consumed,
}

impl FileState {
    pub fn suffix(self) -> &'static str {
        match self {
            FileState::Pending => PENDING_SUFFIX,
            FileState::Consumed => CONSUMED_SUFFIX,
        }
    }

    /// Split a file name into its stem and lifecycle state.
    pub fn split(file_name: &str) -> Option<(&str, FileState)> {
        if let Some(stem) = file_name.strip_suffix(PENDING_SUFFIX) {
            return Some((stem, FileState::Pending));
        }
        file_name
            .strip_suffix(CONSUMED_SUFFIX)
            .map(|stem| (stem, FileState::Consumed))
    }
}

pub(crate) fn io_error(path: impl Into<PathBuf>, err: io::Error) -> ExchangeError {
    ExchangeError::Io {
        path: path.into(),
        source: err,
    }
}
