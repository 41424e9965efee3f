//! Byte-level lexing and formatting of integers and length-prefixed strings.
//!
//! Everything here is a stateless function over a byte slice and an offset.
//! The reader layers the grammar state machine on top; the writer uses the
//! formatting half.
//!
//! Grammar
//! - integer: `i` `-`? (`0` | `1`-`9` digit*) `e`, with no `-0`.
//! - string: (`0` | `1`-`9` digit*) `:` followed by exactly that many bytes.
//!
//! A lexeme that is syntactically valid but does not fit (an integer outside
//! `i64`, a length beyond [`MAX_STRING_LENGTH`]) is reported as unsupported,
//! never as a syntax error. Running out of input reports the buffer length as
//! the offset.

use crate::error::{Error, SyntaxError, UnsupportedError};

/// Largest string length accepted by the lexer.
pub const MAX_STRING_LENGTH: usize = i32::MAX as usize;

/// Longest integer token: `i`, sign, 19 digits, `e`.
pub(crate) const MAX_INTEGER_TOKEN: usize = 22;

/// Longest string header: 10 digits (for `i32::MAX`) and `:`.
pub(crate) const MAX_STRING_HEADER: usize = 11;

/// A parsed string header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringHeader {
    /// Number of body bytes.
    pub length: usize,
    /// Number of bytes taken by the decimal length and the colon.
    pub header_len: usize,
}

impl StringHeader {
    /// Total size of the token, header and body.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.header_len + self.length
    }
}

#[inline]
fn eof(buffer: &[u8]) -> Error {
    Error::new(SyntaxError::UnexpectedEndOfInput, buffer.len())
}

/// Lex an integer token starting at `start`.
///
/// Returns the value and the offset just past the closing `e`.
///
/// # Errors
///
/// Syntax errors for malformed tokens, [`UnsupportedError::IntegerOutOfRange`]
/// for well-formed integers that do not fit in an `i64`.
pub fn read_integer(buffer: &[u8], start: usize) -> Result<(i64, usize), Error> {
    match buffer.get(start) {
        Some(b'i') => {}
        Some(_) => {
            return Err(Error::new(
                SyntaxError::ExpectedToken(crate::TokenType::Integer),
                start,
            ));
        }
        None => return Err(eof(buffer)),
    }

    let mut pos = start + 1;
    let negative = buffer.get(pos) == Some(&b'-');
    if negative {
        pos += 1;
    }

    match buffer.get(pos) {
        Some(b'0') => {
            if negative {
                return Err(Error::new(SyntaxError::NegativeZero, pos));
            }
            return match buffer.get(pos + 1) {
                Some(b'e') => Ok((0, pos + 2)),
                Some(b'0'..=b'9') => Err(Error::new(SyntaxError::LeadingZero, pos)),
                Some(_) => Err(Error::new(SyntaxError::ExpectedIntegerEnd, pos + 1)),
                None => Err(eof(buffer)),
            };
        }
        Some(b'1'..=b'9') => {}
        Some(_) => return Err(Error::new(SyntaxError::ExpectedDigit, pos)),
        None => return Err(eof(buffer)),
    }

    // Accumulate on the negative side so that `i64::MIN` is representable.
    let mut value: i64 = 0;
    let mut overflow = false;
    loop {
        match buffer.get(pos) {
            Some(&b @ b'0'..=b'9') => {
                let digit = i64::from(b - b'0');
                match value.checked_mul(10).and_then(|v| v.checked_sub(digit)) {
                    Some(v) => value = v,
                    None => overflow = true,
                }
                pos += 1;
            }
            Some(b'e') => break,
            Some(_) => return Err(Error::new(SyntaxError::ExpectedIntegerEnd, pos)),
            None => return Err(eof(buffer)),
        }
    }

    if overflow {
        return Err(Error::new(UnsupportedError::IntegerOutOfRange, start));
    }
    let value = if negative {
        value
    } else {
        value
            .checked_neg()
            .ok_or_else(|| Error::new(UnsupportedError::IntegerOutOfRange, start))?
    };
    Ok((value, pos + 1))
}

/// Lex the decimal length and colon of a string starting at `start`.
///
/// The body is not inspected; see [`read_string_body`].
///
/// # Errors
///
/// Syntax errors for malformed headers,
/// [`UnsupportedError::StringTooLong`] for lengths beyond
/// [`MAX_STRING_LENGTH`].
pub fn read_length(buffer: &[u8], start: usize) -> Result<StringHeader, Error> {
    let mut pos = start;
    match buffer.get(pos) {
        Some(b'0') => match buffer.get(pos + 1) {
            Some(b':') => {
                return Ok(StringHeader {
                    length: 0,
                    header_len: 2,
                });
            }
            Some(b'0'..=b'9') => return Err(Error::new(SyntaxError::LeadingZero, pos)),
            Some(_) => return Err(Error::new(SyntaxError::ExpectedColon, pos + 1)),
            None => return Err(eof(buffer)),
        },
        Some(b'1'..=b'9') => {}
        Some(_) => return Err(Error::new(SyntaxError::ExpectedDigit, pos)),
        None => return Err(eof(buffer)),
    }

    let mut length: u64 = 0;
    let mut too_long = false;
    loop {
        match buffer.get(pos) {
            Some(&b @ b'0'..=b'9') => {
                if !too_long {
                    length = length * 10 + u64::from(b - b'0');
                    too_long = length > MAX_STRING_LENGTH as u64;
                }
                pos += 1;
            }
            Some(b':') => break,
            Some(_) => return Err(Error::new(SyntaxError::ExpectedColon, pos)),
            None => return Err(eof(buffer)),
        }
    }

    if too_long {
        return Err(Error::new(
            UnsupportedError::StringTooLong {
                max: MAX_STRING_LENGTH,
            },
            start,
        ));
    }
    Ok(StringHeader {
        // Bounded by `MAX_STRING_LENGTH` above.
        length: usize::try_from(length).unwrap_or(MAX_STRING_LENGTH),
        header_len: pos + 1 - start,
    })
}

/// Slice out the body described by `header` for the string at `start`.
///
/// # Errors
///
/// [`SyntaxError::UnexpectedEndOfInput`] when the buffer ends before the body
/// does.
pub fn read_string_body(
    buffer: &[u8],
    start: usize,
    header: StringHeader,
) -> Result<&[u8], Error> {
    let body_start = start + header.header_len;
    let body_end = body_start + header.length;
    buffer.get(body_start..body_end).ok_or_else(|| eof(buffer))
}

/// Lex a complete string (header and body) starting at `start`.
///
/// Returns the body and the offset just past it.
///
/// # Errors
///
/// See [`read_length`] and [`read_string_body`].
pub fn read_string(buffer: &[u8], start: usize) -> Result<(&[u8], usize), Error> {
    let header = read_length(buffer, start)?;
    let body = read_string_body(buffer, start, header)?;
    Ok((body, start + header.total_len()))
}

/// Format `value` as a complete integer token into `out`.
///
/// Returns the number of bytes written.
pub(crate) fn format_integer(value: i64, out: &mut [u8; MAX_INTEGER_TOKEN]) -> usize {
    let mut scratch = itoa::Buffer::new();
    let digits = scratch.format(value).as_bytes();
    out[0] = b'i';
    out[1..=digits.len()].copy_from_slice(digits);
    out[digits.len() + 1] = b'e';
    digits.len() + 2
}

/// Format a string header (`<length>:`) into `out`.
///
/// Returns the number of bytes written.
pub(crate) fn format_length(length: usize, out: &mut [u8; MAX_STRING_HEADER]) -> usize {
    let mut scratch = itoa::Buffer::new();
    let digits = scratch.format(length).as_bytes();
    out[..digits.len()].copy_from_slice(digits);
    out[digits.len()] = b':';
    digits.len() + 1
}
