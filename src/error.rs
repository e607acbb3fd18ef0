//! The crate-wide error type.
//!
//! Every fallible operation in the core -- decoding, framing, parsing --
//! returns a [`Result`] rather than panicking. The evaluator is the one
//! exception: per its design, it never fails (see `dsl::eval`).

use std::fmt;
use std::error;

use backtrace::Backtrace;

/// The result type used throughout this crate.
pub type Result<T> = ::std::result::Result<T, Error>;

/// The kind of failure that occurred, independent of the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The codec or framer ran out of bytes before a declared length was satisfied.
    InsufficientInput,
    /// A declared size disagreed with a delimiter, or a terminator was missing/wrong.
    MalformedStructure,
    /// An unrecognised tag, opcode, section kind, or operator name.
    Unknown,
    /// An operator argument had the wrong shape (e.g. non-array for `$and`).
    ShapeError,
    /// Two requirements conflict (e.g. more than one body section).
    SemanticConflict,
    /// The behaviour is a recognised but intentionally unimplemented stub.
    Unimplemented,
}

/// A crate-wide error, carrying a [`Backtrace`] captured at the point of construction.
pub struct Error {
    kind: ErrorKind,
    message: String,
    backtrace: Backtrace,
}

impl Error {
    /// Constructs a new `Error` of the given kind with the given message.
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Error {
            kind,
            message: message.into(),
            backtrace: Backtrace::new_unresolved(),
        }
    }

    /// Convenience constructor for [`ErrorKind::InsufficientInput`].
    pub fn insufficient_input<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::InsufficientInput, message)
    }

    /// Convenience constructor for [`ErrorKind::MalformedStructure`].
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::MalformedStructure, message)
    }

    /// Convenience constructor for [`ErrorKind::Unknown`].
    pub fn unknown<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Convenience constructor for [`ErrorKind::ShapeError`].
    pub fn shape<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::ShapeError, message)
    }

    /// Convenience constructor for [`ErrorKind::SemanticConflict`].
    pub fn conflict<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::SemanticConflict, message)
    }

    /// Convenience constructor for [`ErrorKind::Unimplemented`].
    pub fn unimplemented<S: Into<String>>(message: S) -> Self {
        Self::new(ErrorKind::Unimplemented, message)
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message, without the kind or backtrace.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The backtrace captured when this error was constructed.
    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish()
    }
}

impl error::Error for Error {
    fn description(&self) -> &str {
        &self.message
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roundtrips_through_display() {
        let err = Error::unknown("unknown top level operator: $xyz");
        assert_eq!(err.to_string(), "unknown top level operator: $xyz");
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[test]
    fn equality_ignores_backtrace() {
        let a = Error::shape("bad shape");
        let b = Error::shape("bad shape");
        assert_eq!(a, b);
    }
}
