use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{config::ConfigError, trace::TraceError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("bad arguments: {0}")]
    Args(#[from] pico_args::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Trace(#[from] TraceError),
    #[error("missing trace, pass one with -t <path>")]
    NoTrace,
    #[error("unexpected arguments: {0:?}")]
    Unused(Vec<std::ffi::OsString>),
    #[error("could not write stats to {}: {source}", .path.display())]
    Stats { path: PathBuf, source: io::Error },
    #[error("could not serialize stats: {0}")]
    Json(#[from] serde_json::Error),
}
