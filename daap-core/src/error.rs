use thiserror::Error;

/// The error taxonomy shared by the store, model and provider layers.
///
/// Each variant is named for where in the HTTP surface it is meant to
/// land (see `daap-server::http::error::AppError`); this crate never
/// maps itself to a status code, it only classifies.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] daap_codec::Error),

    #[error("malformed Range header: {0}")]
    BadRange(String),

    #[error("missing or malformed query argument '{0}'")]
    BadQueryArg(&'static str),

    #[error("no entry for {0}")]
    NotFound(String),

    #[error("revision {0} is read-only; mutate the current revision instead")]
    ReadOnlyRevision(u64),

    #[error("parent '{0}' is deleted")]
    DeletedParent(String),

    #[error("revision {requested} has been reclaimed (earliest retained is {earliest})")]
    RevisionGone { requested: u64, earliest: u64 },

    #[error("revision {requested} is in the future (current is {current})")]
    RevisionInFuture { requested: u64, current: u64 },

    #[error("invalid credentials")]
    Unauthorized,

    #[error("unknown session {0}")]
    UnknownSession(u64),

    #[error("{0} is not supported")]
    NotSupported(&'static str),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
