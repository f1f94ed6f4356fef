use thiserror::Error;

/// Errors produced while encoding or decoding DMAP tagged data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("cannot encode code '{code}' ({name}): {cause}")]
    Encode {
        code: String,
        name: &'static str,
        cause: String,
    },

    #[error("cannot decode code '{code}': {cause}")]
    Decode { code: String, cause: String },

    #[error("unknown code '{0}'")]
    UnknownCode(String),

    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    #[error("container '{code}' declared length {declared} but contained {actual} bytes of children")]
    ContainerLengthMismatch {
        code: String,
        declared: u32,
        actual: u32,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
