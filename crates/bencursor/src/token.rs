//! Token vocabulary and the grammar state machine shared by readers and
//! writers.
//!
//! Classification peeks a single byte and never advances. The transition
//! helpers are pure functions of the current state and the scope stack; the
//! reader consults both, the writer only the transitions.

use core::fmt;

use bstr::BStr;

use crate::{
    error::{Error, SyntaxError, UsageError},
    scope::ScopeStack,
};

/// Kind of the next grammatical unit.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    /// No further tokens: the top-level value is complete, or the cursor is
    /// poisoned.
    None,
    Integer,
    String,
    Key,
    ListHead,
    ListTail,
    DictionaryHead,
    DictionaryTail,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenType::None => "end of value",
            TokenType::Integer => "integer",
            TokenType::String => "string",
            TokenType::Key => "key",
            TokenType::ListHead => "list head",
            TokenType::ListTail => "list end",
            TokenType::DictionaryHead => "dictionary head",
            TokenType::DictionaryTail => "dictionary end",
        })
    }
}

/// One token together with its payload.
///
/// Strings and keys borrow from the buffer they were read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Integer(i64),
    String(&'a BStr),
    Key(&'a BStr),
    ListHead,
    ListTail,
    DictionaryHead,
    DictionaryTail,
}

impl Token<'_> {
    /// The payload-free kind of this token.
    #[must_use]
    pub fn token_type(&self) -> TokenType {
        match self {
            Token::Integer(_) => TokenType::Integer,
            Token::String(_) => TokenType::String,
            Token::Key(_) => TokenType::Key,
            Token::ListHead => TokenType::ListHead,
            Token::ListTail => TokenType::ListTail,
            Token::DictionaryHead => TokenType::DictionaryHead,
            Token::DictionaryTail => TokenType::DictionaryTail,
        }
    }
}

/// Where a cursor is in the grammar.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParseState {
    /// Nothing consumed yet; exactly one top-level value is expected.
    #[default]
    Initial,
    /// Inside a dictionary, expecting a key or the dictionary end.
    DictionaryKey,
    /// Inside a dictionary, expecting the value for the key just consumed.
    DictionaryValue,
    /// Inside a list, expecting an element or the list end.
    ListItem,
    /// The top-level value is complete.
    Final,
    /// A failure poisoned the cursor.
    Error,
    /// A child view that has handed its cursor back.
    Disposed,
}

impl ParseState {
    /// Whether a value (as opposed to a key or a container end) may come
    /// next.
    #[must_use]
    pub fn expects_value(self) -> bool {
        matches!(
            self,
            ParseState::Initial | ParseState::DictionaryValue | ParseState::ListItem
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Container {
    List,
    Dictionary,
}

#[inline]
fn value_token(byte: Option<u8>) -> Option<TokenType> {
    match byte? {
        b'd' => Some(TokenType::DictionaryHead),
        b'i' => Some(TokenType::Integer),
        b'l' => Some(TokenType::ListHead),
        b'0'..=b'9' => Some(TokenType::String),
        _ => None,
    }
}

/// Decide which token starts at `index`.
///
/// # Errors
///
/// Returns a syntax error when the byte at `index` (or the end of the
/// buffer) cannot start any token permitted in `state`.
pub fn classify(buffer: &[u8], index: usize, state: ParseState) -> Result<TokenType, Error> {
    let next = buffer.get(index).copied();
    match state {
        ParseState::Initial | ParseState::DictionaryValue => {
            value_token(next).ok_or_else(|| Error::new(SyntaxError::ExpectedValueStart, index))
        }
        ParseState::DictionaryKey => match next {
            Some(b'e') => Ok(TokenType::DictionaryTail),
            Some(b'0'..=b'9') => Ok(TokenType::Key),
            _ => Err(Error::new(SyntaxError::ExpectedKeyOrDictionaryEnd, index)),
        },
        ParseState::ListItem => match next {
            Some(b'e') => Ok(TokenType::ListTail),
            _ => value_token(next)
                .ok_or_else(|| Error::new(SyntaxError::ExpectedValueOrListEnd, index)),
        },
        ParseState::Final | ParseState::Error => Ok(TokenType::None),
        ParseState::Disposed => Err(Error::new(UsageError::Disposed, index)),
    }
}

fn invalid(operation: &'static str, state: ParseState) -> UsageError {
    UsageError::InvalidOperation { operation, state }
}

/// State after a complete value (scalar or closed container) was consumed.
pub(crate) fn after_value(state: ParseState) -> Result<ParseState, UsageError> {
    match state {
        ParseState::Initial => Ok(ParseState::Final),
        ParseState::ListItem => Ok(ParseState::ListItem),
        ParseState::DictionaryValue => Ok(ParseState::DictionaryKey),
        other => Err(invalid("consume a value", other)),
    }
}

/// State after a dictionary key was consumed.
pub(crate) fn after_key(state: ParseState) -> Result<ParseState, UsageError> {
    match state {
        ParseState::DictionaryKey => Ok(ParseState::DictionaryValue),
        other => Err(invalid("consume a key", other)),
    }
}

/// Enter a list or dictionary, recording the enclosing container.
pub(crate) fn enter(
    state: ParseState,
    scopes: &mut ScopeStack,
    container: Container,
) -> Result<ParseState, UsageError> {
    match state {
        ParseState::Initial => {}
        ParseState::DictionaryValue => scopes.push(true),
        ParseState::ListItem => scopes.push(false),
        other => {
            return Err(invalid(
                match container {
                    Container::List => "open a list",
                    Container::Dictionary => "open a dictionary",
                },
                other,
            ));
        }
    }
    Ok(match container {
        Container::List => ParseState::ListItem,
        Container::Dictionary => ParseState::DictionaryKey,
    })
}

/// Leave the innermost container and return to the enclosing one.
pub(crate) fn exit(
    state: ParseState,
    scopes: &mut ScopeStack,
    container: Container,
) -> Result<ParseState, UsageError> {
    match (container, state) {
        (Container::List, ParseState::ListItem)
        | (Container::Dictionary, ParseState::DictionaryKey) => Ok(match scopes.pop() {
            None => ParseState::Final,
            Some(true) => ParseState::DictionaryKey,
            Some(false) => ParseState::ListItem,
        }),
        (Container::List, other) => Err(invalid("close a list", other)),
        (Container::Dictionary, other) => Err(invalid("close a dictionary", other)),
    }
}

/// Number of containers open once a container is entered from `state`.
pub(crate) fn depth_after_enter(state: ParseState, scopes: &ScopeStack) -> usize {
    if state == ParseState::Initial {
        1
    } else {
        scopes.len() + 2
    }
}
