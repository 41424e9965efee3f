use thiserror::Error;

use crate::token::{ParseState, TokenType};

/// Every failure a reader or writer can report.
///
/// The offset is the byte position in the buffer (reader) or the number of
/// bytes emitted so far (writer) at which the problem was detected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source} at offset {offset}")]
pub struct Error {
    pub(crate) source: ErrorSource,
    pub(crate) offset: usize,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: unexpected byte, premature end, duplicate key.
    Grammar,
    /// Well-formed input outside what this implementation can represent.
    Unsupported,
    /// An operation that the current parse state does not permit.
    Usage,
    /// The destination ran out of room.
    Capacity,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorSource {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("unsupported value: {0}")]
    Unsupported(#[from] UnsupportedError),
    #[error("usage error: {0}")]
    Usage(#[from] UsageError),
    #[error("capacity exhausted")]
    Capacity,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("expected value start")]
    ExpectedValueStart,
    #[error("expected key or dictionary end")]
    ExpectedKeyOrDictionaryEnd,
    #[error("expected value or list end")]
    ExpectedValueOrListEnd,
    #[error("expected {0}")]
    ExpectedToken(TokenType),
    #[error("expected digit")]
    ExpectedDigit,
    #[error("expected ':' after string length")]
    ExpectedColon,
    #[error("expected 'e' after integer")]
    ExpectedIntegerEnd,
    #[error("leading zero in number")]
    LeadingZero,
    #[error("negative zero")]
    NegativeZero,
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    #[error("duplicate dictionary key")]
    DuplicateKey,
    #[error("trailing data after value")]
    TrailingData,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedError {
    #[error("integer does not fit in 64 bits")]
    IntegerOutOfRange,
    #[error("string length exceeds {max}")]
    StringTooLong { max: usize },
    #[error("nesting deeper than {max}")]
    NestingTooDeep { max: usize },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    #[error("cannot {operation} in state {state:?}")]
    InvalidOperation {
        operation: &'static str,
        state: ParseState,
    },
    #[error("expected a value but the next token is {0}")]
    NotAValue(TokenType),
    #[error("keys must be ordered and unique")]
    UnorderedKeys,
    #[error("value is incomplete")]
    Incomplete,
    #[error("cursor was poisoned by an earlier failure")]
    Poisoned,
    #[error("cursor is lent out to a child view")]
    LentOut,
    #[error("view has been disposed")]
    Disposed,
}

impl Error {
    pub(crate) fn new(source: impl Into<ErrorSource>, offset: usize) -> Self {
        Self {
            source: source.into(),
            offset,
        }
    }

    pub(crate) fn capacity(offset: usize) -> Self {
        Self {
            source: ErrorSource::Capacity,
            offset,
        }
    }

    /// The coarse category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self.source {
            ErrorSource::Syntax(_) => ErrorKind::Grammar,
            ErrorSource::Unsupported(_) => ErrorKind::Unsupported,
            ErrorSource::Usage(_) => ErrorKind::Usage,
            ErrorSource::Capacity => ErrorKind::Capacity,
        }
    }

    /// Byte offset at which the failure was detected.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The detailed cause.
    #[must_use]
    pub fn cause(&self) -> &ErrorSource {
        &self.source
    }
}
