use std::io;

//===========================================================================//

/// The class of an [`Error`], for callers that only need to tell "broken"
/// from "not yet handled".
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// The input is not a structurally valid container or entry.
    Format,
    /// The input is plausible but uses a variant this codec doesn't implement.
    Unsupported,
    /// The underlying source or sink failed.
    Io,
}

/// An error from decoding or encoding an ICO/CUR container.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input is not a valid ICO/CUR container, or an image can't be
    /// stored in one.
    #[error("invalid format: {0}")]
    Format(String),
    /// A fixed-size structure ended early.
    #[error("invalid format: unexpected end of data")]
    Truncated,
    /// The input uses a valid but unimplemented feature.
    #[error("unsupported feature: {0}")]
    Unsupported(String),
    /// An error from the underlying reader or writer, passed through as-is.
    #[error(transparent)]
    Io(io::Error),
}

impl Error {
    /// Returns the class of this error.  Truncation counts as a format
    /// error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Format(_) | Error::Truncated => ErrorKind::Format,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Error {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Io(error)
        }
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> io::Error {
        match error {
            Error::Io(error) => error,
            Error::Truncated => {
                io::Error::new(io::ErrorKind::UnexpectedEof, error)
            }
            Error::Format(_) => {
                io::Error::new(io::ErrorKind::InvalidData, error)
            }
            Error::Unsupported(_) => {
                io::Error::new(io::ErrorKind::Unsupported, error)
            }
        }
    }
}

/// A specialized `Result` type for ICO/CUR operations.
pub type Result<T> = std::result::Result<T, Error>;

//===========================================================================//


//===========================================================================//
