use thiserror::Error;

/// Errors raised while reading a packet log.
///
/// Only [`Error::NotText`] aborts a whole parse. The others describe a single
/// packet, which is skipped while the rest of the log keeps being processed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("packet log is not UTF-8 text")]
    NotText(#[from] std::str::Utf8Error),
    #[error("malformed packet header {0:?}")]
    MalformedHeader(String),
    #[error("invalid packet timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("bytes {offset:#04x}..+{count} lie beyond the {lines} lines of the packet")]
    Truncated {
        offset: usize,
        count: usize,
        lines: usize,
    },
    #[error("failed to decode field: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub type IResult<I, O> = nom::IResult<I, O, nom::error::Error<I>>;

impl<I: std::fmt::Debug> From<nom::Err<nom::error::Error<I>>> for Error {
    fn from(err: nom::Err<nom::error::Error<I>>) -> Self {
        Error::Decode(format!("{err:?}"))
    }
}
