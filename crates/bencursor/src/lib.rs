//! Zero-copy, grammar-enforcing bencode token reader and writer.
//!
//! [`Reader`] pulls tokens out of a borrowed buffer and can index lists and
//! dictionaries by value position; [`Writer`] pushes tokens into a
//! [`Sink`] and only ever emits canonical bencode (sorted unique keys,
//! minimal integers). Both refuse any token the grammar does not permit in
//! their current state, and stay unusable after their first failure.
//!
//! ```
//! use bencursor::{Reader, Token, VecSink, Writer};
//!
//! let input = b"d3:cow3:moo4:spaml1:a1:bee";
//! let mut reader = Reader::new(input);
//! let mut writer = Writer::new(VecSink::new());
//! reader.read_value_into(&mut writer).unwrap();
//! reader.finish().unwrap();
//! assert_eq!(writer.into_vec().unwrap(), input);
//!
//! let mut reader = Reader::new(b"li7ee");
//! assert_eq!(reader.next_token().unwrap(), Some(Token::ListHead));
//! assert_eq!(reader.next_token().unwrap(), Some(Token::Integer(7)));
//! ```

#![no_std]
#![allow(missing_docs)]
extern crate alloc;

#[cfg(test)]
extern crate std;

#[macro_use]
mod trace;

mod error;
mod index;
pub mod lex;
mod options;
mod reader;
mod scope;
mod sink;
mod token;
mod writer;

#[cfg(test)]
mod tests;

pub use error::{Error, ErrorKind, ErrorSource, SyntaxError, UnsupportedError, UsageError};
pub use index::{DictionaryIndex, DictionaryIter, ListIndex, Position};
pub use lex::MAX_STRING_LENGTH;
pub use options::{DEFAULT_COMMIT_THRESHOLD, ReaderOptions, WriterOptions};
pub use reader::{Reader, ReaderView};
pub use sink::{Sink, SliceSink, VecSink};
pub use token::{ParseState, Token, TokenType, classify};
pub use writer::{Writer, WriterView};
