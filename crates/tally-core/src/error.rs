use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("no package prefixes configured")]
    EmptyScope,
    #[error("no code base roots configured")]
    NoRoots,
    #[error("code base root {path:?} is not readable: {source}")]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid include pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("type '{0}' is referenced but has no descriptor")]
    MissingType(String),
}

#[derive(Debug, Error)]
pub enum FlushError {
    #[error("cannot encode publication: {0}")]
    Encode(#[from] serde_cbor::Error),
    #[error("cannot publish: {0}")]
    Exchange(#[from] tally_exchange::ExchangeError),
}
