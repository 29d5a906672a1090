//! Facade error type

use blox_fetch::{ErrorKind, ErrorRecord};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A classified upstream or transport failure
    #[error(transparent)]
    Request(#[from] ErrorRecord),

    /// The operation needs a primary credential and none is installed
    #[error("an authenticated session is required for this operation")]
    NotLoggedIn,

    /// A lookup succeeded but matched nothing
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Config(#[from] common::Error),
}

impl Error {
    /// The request error kind, if this is a request failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Request(record) => Some(record.kind),
            _ => None,
        }
    }
}

impl From<blox_session::Error> for Error {
    fn from(err: blox_session::Error) -> Self {
        Error::Request(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
