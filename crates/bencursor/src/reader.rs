//! Grammar-enforcing pull reader over a bencoded buffer.
//!
//! The reader never builds a tree. It walks the buffer token by token,
//! hands out string and key views that borrow from the buffer, and can
//! record the start offsets of values ([`Position`]) so callers can
//! [`seek`](Reader::seek) back later.
//!
//! Failure discipline
//! - Every operation checks the parse state before touching bytes.
//! - The first failure of any kind poisons the reader: later operations fail
//!   with [`UsageError::Poisoned`], except [`Reader::peek_token_type`], which
//!   reports [`TokenType::None`]. Only [`Reader::seek`] revives it.
//!
//! Child views
//! - [`Reader::create_child_view`] lends the cursor to a [`ReaderView`]. The
//!   parent is unusable until the view is disposed (explicitly or on drop),
//!   at which point the view's cursor is copied back. [`ReaderView::abandon`]
//!   keeps the cursor, leaving the parent permanently unusable.

use alloc::vec::Vec;
use core::{
    mem,
    ops::{Deref, DerefMut},
};

use bstr::BStr;

use crate::{
    error::{Error, SyntaxError, UnsupportedError, UsageError},
    index::{DictionaryIndex, ListIndex, Position},
    lex::{self, StringHeader},
    options::ReaderOptions,
    scope::ScopeStack,
    sink::Sink,
    token::{self, Container, ParseState, Token, TokenType},
    writer::Writer,
};

/// Mutable state of a reader: where it is and what it expects next.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReadCursor {
    index: usize,
    state: ParseState,
    scopes: ScopeStack,
    /// Header of the string starting at the given offset, cached so that
    /// repeated length queries do not re-lex it.
    header: Option<(usize, StringHeader)>,
    lent_out: bool,
}

impl ReadCursor {
    fn at(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    fn lent_out() -> Self {
        Self {
            state: ParseState::Error,
            lent_out: true,
            ..Self::default()
        }
    }

    fn disposed() -> Self {
        Self {
            state: ParseState::Disposed,
            ..Self::default()
        }
    }

    fn usable(&self) -> Result<(), Error> {
        if self.lent_out {
            return Err(Error::new(UsageError::LentOut, self.index));
        }
        match self.state {
            ParseState::Error => Err(Error::new(UsageError::Poisoned, self.index)),
            ParseState::Disposed => Err(Error::new(UsageError::Disposed, self.index)),
            _ => Ok(()),
        }
    }

    fn usage(&self, err: UsageError) -> Error {
        Error::new(err, self.index)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn poison(&mut self, err: &Error) {
        debug_event!(offset = err.offset(), error = %err, "reader poisoned");
        self.state = ParseState::Error;
        self.header = None;
    }

    fn depth(&self) -> usize {
        match self.state {
            ParseState::ListItem | ParseState::DictionaryKey | ParseState::DictionaryValue => {
                self.scopes.len() + 1
            }
            _ => 0,
        }
    }

    fn advance(&mut self, index: usize, state: ParseState) {
        self.index = index;
        self.state = state;
        self.header = None;
    }

    fn peek(&self, buffer: &[u8]) -> Result<TokenType, Error> {
        token::classify(buffer, self.index, self.state)
    }

    fn string_header(&mut self, buffer: &[u8], expected: TokenType) -> Result<StringHeader, Error> {
        if let Some((at, header)) = self.header {
            if at == self.index {
                return Ok(header);
            }
        }
        match buffer.get(self.index) {
            Some(b'0'..=b'9') => {}
            Some(_) => return Err(Error::new(SyntaxError::ExpectedToken(expected), self.index)),
            None => {
                return Err(Error::new(
                    SyntaxError::UnexpectedEndOfInput,
                    buffer.len(),
                ));
            }
        }
        let header = lex::read_length(buffer, self.index)?;
        self.header = Some((self.index, header));
        Ok(header)
    }

    fn read_string_length(&mut self, buffer: &[u8]) -> Result<usize, Error> {
        token::after_value(self.state).map_err(|e| self.usage(e))?;
        Ok(self.string_header(buffer, TokenType::String)?.length)
    }

    fn read_key_length(&mut self, buffer: &[u8]) -> Result<usize, Error> {
        token::after_key(self.state).map_err(|e| self.usage(e))?;
        Ok(self.string_header(buffer, TokenType::Key)?.length)
    }

    fn read_body<'a>(
        &mut self,
        buffer: &'a [u8],
        expected: TokenType,
        next: ParseState,
    ) -> Result<&'a [u8], Error> {
        let start = self.index;
        let header = self.string_header(buffer, expected)?;
        let body = lex::read_string_body(buffer, start, header)?;
        self.advance(start + header.total_len(), next);
        Ok(body)
    }

    fn read_string<'a>(&mut self, buffer: &'a [u8]) -> Result<&'a [u8], Error> {
        let next = token::after_value(self.state).map_err(|e| self.usage(e))?;
        self.read_body(buffer, TokenType::String, next)
    }

    fn read_key<'a>(&mut self, buffer: &'a [u8]) -> Result<&'a [u8], Error> {
        let next = token::after_key(self.state).map_err(|e| self.usage(e))?;
        self.read_body(buffer, TokenType::Key, next)
    }

    fn read_string_into(&mut self, buffer: &[u8], out: &mut [u8]) -> Result<usize, Error> {
        let next = token::after_value(self.state).map_err(|e| self.usage(e))?;
        let header = self.string_header(buffer, TokenType::String)?;
        if out.len() < header.length {
            return Err(Error::capacity(self.index));
        }
        let body = self.read_body(buffer, TokenType::String, next)?;
        out[..body.len()].copy_from_slice(body);
        Ok(body.len())
    }

    fn read_integer(&mut self, buffer: &[u8]) -> Result<i64, Error> {
        let next = token::after_value(self.state).map_err(|e| self.usage(e))?;
        let (value, end) = lex::read_integer(buffer, self.index)?;
        self.advance(end, next);
        Ok(value)
    }

    fn open(
        &mut self,
        buffer: &[u8],
        options: &ReaderOptions,
        container: Container,
    ) -> Result<(), Error> {
        let at = self.index;
        let depth = token::depth_after_enter(self.state, &self.scopes);
        let next = token::enter(self.state, &mut self.scopes, container)
            .map_err(|e| Error::new(e, at))?;
        let (byte, expected) = match container {
            Container::List => (b'l', TokenType::ListHead),
            Container::Dictionary => (b'd', TokenType::DictionaryHead),
        };
        match buffer.get(at) {
            Some(&b) if b == byte => {}
            Some(_) => return Err(Error::new(SyntaxError::ExpectedToken(expected), at)),
            None => {
                return Err(Error::new(
                    SyntaxError::UnexpectedEndOfInput,
                    buffer.len(),
                ));
            }
        }
        if let Some(max) = options.max_depth {
            if depth > max {
                return Err(Error::new(UnsupportedError::NestingTooDeep { max }, at));
            }
        }
        self.advance(at + 1, next);
        Ok(())
    }

    fn close(&mut self, buffer: &[u8], container: Container) -> Result<(), Error> {
        let at = self.index;
        let next =
            token::exit(self.state, &mut self.scopes, container).map_err(|e| Error::new(e, at))?;
        match buffer.get(at) {
            Some(b'e') => {}
            Some(_) => {
                let expected = match container {
                    Container::List => TokenType::ListTail,
                    Container::Dictionary => TokenType::DictionaryTail,
                };
                return Err(Error::new(SyntaxError::ExpectedToken(expected), at));
            }
            None => {
                return Err(Error::new(
                    SyntaxError::UnexpectedEndOfInput,
                    buffer.len(),
                ));
            }
        }
        self.advance(at + 1, next);
        Ok(())
    }

    fn next_token<'a>(
        &mut self,
        buffer: &'a [u8],
        options: &ReaderOptions,
    ) -> Result<Option<Token<'a>>, Error> {
        Ok(Some(match self.peek(buffer)? {
            TokenType::None => return Ok(None),
            TokenType::Integer => Token::Integer(self.read_integer(buffer)?),
            TokenType::String => Token::String(BStr::new(self.read_string(buffer)?)),
            TokenType::Key => Token::Key(BStr::new(self.read_key(buffer)?)),
            TokenType::ListHead => {
                self.open(buffer, options, Container::List)?;
                Token::ListHead
            }
            TokenType::DictionaryHead => {
                self.open(buffer, options, Container::Dictionary)?;
                Token::DictionaryHead
            }
            TokenType::ListTail => {
                self.close(buffer, Container::List)?;
                Token::ListTail
            }
            TokenType::DictionaryTail => {
                self.close(buffer, Container::Dictionary)?;
                Token::DictionaryTail
            }
        }))
    }

    /// Consume exactly one value, scalar or container, handing every token
    /// to `visit`.
    fn walk_value<'a>(
        &mut self,
        buffer: &'a [u8],
        options: &ReaderOptions,
        visit: &mut dyn FnMut(Token<'a>) -> Result<(), Error>,
    ) -> Result<(), Error> {
        if !self.state.expects_value() {
            return Err(self.usage(UsageError::InvalidOperation {
                operation: "read a value",
                state: self.state,
            }));
        }
        let first = self.peek(buffer)?;
        if matches!(
            first,
            TokenType::None | TokenType::Key | TokenType::ListTail | TokenType::DictionaryTail
        ) {
            return Err(self.usage(UsageError::NotAValue(first)));
        }

        let mut depth = 0usize;
        loop {
            let Some(token) = self.next_token(buffer, options)? else {
                return Err(self.usage(UsageError::NotAValue(TokenType::None)));
            };
            match token {
                Token::ListHead | Token::DictionaryHead => depth += 1,
                Token::ListTail | Token::DictionaryTail => depth -= 1,
                _ => {}
            }
            visit(token)?;
            if depth == 0 {
                return Ok(());
            }
        }
    }

    fn read_list(&mut self, buffer: &[u8], options: &ReaderOptions) -> Result<ListIndex, Error> {
        self.open(buffer, options, Container::List)?;
        let mut index = ListIndex::new();
        while self.peek(buffer)? != TokenType::ListTail {
            index.push(Position::new(self.index));
            self.walk_value(buffer, options, &mut |_| Ok(()))?;
        }
        self.close(buffer, Container::List)?;
        Ok(index)
    }

    fn read_dictionary<'a>(
        &mut self,
        buffer: &'a [u8],
        options: &ReaderOptions,
        skip_duplicate_keys: bool,
    ) -> Result<DictionaryIndex<'a>, Error> {
        self.open(buffer, options, Container::Dictionary)?;
        let mut index = DictionaryIndex::new();
        // The whole dictionary is consumed before a duplicate is reported.
        let mut first_duplicate = None;
        while self.peek(buffer)? != TokenType::DictionaryTail {
            let key_start = self.index;
            let key = self.read_key(buffer)?;
            if !index.try_insert(key, Position::new(self.index))
                && !skip_duplicate_keys
                && first_duplicate.is_none()
            {
                first_duplicate = Some(key_start);
            }
            self.walk_value(buffer, options, &mut |_| Ok(()))?;
        }
        self.close(buffer, Container::Dictionary)?;
        match first_duplicate {
            Some(at) => Err(Error::new(SyntaxError::DuplicateKey, at)),
            None => Ok(index),
        }
    }
}

/// A pull reader over one bencoded value in `buffer`.
///
/// # Examples
///
/// ```
/// use bencursor::{Reader, TokenType};
///
/// let mut reader = Reader::new(b"d1:ai1e2:bbli2ei3eee");
/// let dict = reader.read_dictionary(false).unwrap();
/// let at = dict.try_get_position("bb").unwrap();
///
/// reader.seek(at).unwrap();
/// let list = reader.read_list().unwrap();
/// assert_eq!(list.len(), 2);
///
/// reader.seek(list.get(1).unwrap()).unwrap();
/// assert_eq!(reader.peek_token_type().unwrap(), TokenType::Integer);
/// assert_eq!(reader.read_integer().unwrap(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buffer: &'a [u8],
    cursor: ReadCursor,
    options: ReaderOptions,
}

impl<'a> Reader<'a> {
    #[must_use]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self::with_options(buffer, ReaderOptions::default())
    }

    #[must_use]
    pub fn with_options(buffer: &'a [u8], options: ReaderOptions) -> Self {
        Self {
            buffer,
            cursor: ReadCursor::default(),
            options,
        }
    }

    /// Run `op` on a usable cursor, poisoning it if `op` fails.
    fn guard<T>(
        &mut self,
        op: impl FnOnce(&mut ReadCursor, &'a [u8], &ReaderOptions) -> Result<T, Error>,
    ) -> Result<T, Error> {
        self.cursor.usable()?;
        let result = op(&mut self.cursor, self.buffer, &self.options);
        if let Err(err) = &result {
            self.cursor.poison(err);
        }
        result
    }

    /// The buffer being read.
    #[must_use]
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    #[must_use]
    pub fn state(&self) -> ParseState {
        self.cursor.state
    }

    /// Number of currently open containers.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.cursor.depth()
    }

    /// Offset of the next unread byte.
    #[must_use]
    pub fn position(&self) -> Position {
        Position::new(self.cursor.index)
    }

    /// Whether the top-level value has been fully consumed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cursor.lent_out && self.cursor.state == ParseState::Final
    }

    /// Reposition at `position`, expecting a fresh top-level value there.
    ///
    /// Clears any poisoning. The caller is responsible for `position` being
    /// the start of a value, such as one recorded by
    /// [`read_list`](Self::read_list) or [`read_dictionary`](Self::read_dictionary).
    ///
    /// # Errors
    ///
    /// Fails only if the cursor is lent out or disposed.
    pub fn seek(&mut self, position: Position) -> Result<(), Error> {
        if self.cursor.lent_out || self.cursor.state == ParseState::Disposed {
            return self.cursor.usable();
        }
        self.cursor = ReadCursor::at(position.offset());
        Ok(())
    }

    /// Classify the next token without consuming it.
    ///
    /// A poisoned (or lent-out) reader reports [`TokenType::None`].
    ///
    /// # Errors
    ///
    /// A syntax error if the next byte cannot start any permitted token.
    pub fn peek_token_type(&mut self) -> Result<TokenType, Error> {
        if self.cursor.lent_out || self.cursor.state == ParseState::Error {
            return Ok(TokenType::None);
        }
        self.guard(|cursor, buffer, _| cursor.peek(buffer))
    }

    /// Consume and return the next token, or `None` once the top-level
    /// value is complete.
    ///
    /// # Errors
    ///
    /// Any syntax, unsupported, or usage error of the underlying read.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, Error> {
        self.guard(|cursor, buffer, options| cursor.next_token(buffer, options))
    }

    /// Consume one whole value without producing anything.
    ///
    /// # Errors
    ///
    /// Fails if no value may start here or the value is malformed.
    pub fn skip_value(&mut self) -> Result<(), Error> {
        self.guard(|cursor, buffer, options| cursor.walk_value(buffer, options, &mut |_| Ok(())))
    }

    /// Consume one whole value, forwarding every token into `writer`.
    ///
    /// # Errors
    ///
    /// Fails, poisoning this reader, if reading fails or `writer` rejects a
    /// token.
    pub fn read_value_into<S: Sink>(&mut self, writer: &mut Writer<S>) -> Result<(), Error> {
        self.guard(|cursor, buffer, options| {
            cursor.walk_value(buffer, options, &mut |token| writer.write_token(token))
        })
    }

    /// # Errors
    ///
    /// Fails if the next token is not a well-formed integer that fits in an
    /// `i64`, or no value is expected.
    pub fn read_integer(&mut self) -> Result<i64, Error> {
        self.guard(|cursor, buffer, _| cursor.read_integer(buffer))
    }

    /// Length of the string about to be read, without consuming it.
    ///
    /// Repeated calls return the same length until the string is consumed.
    ///
    /// # Errors
    ///
    /// Fails if no value is expected or the header is malformed.
    pub fn read_string_length(&mut self) -> Result<usize, Error> {
        self.guard(|cursor, buffer, _| cursor.read_string_length(buffer))
    }

    /// Consume a string value, returning a view into the buffer.
    ///
    /// # Errors
    ///
    /// Fails if no value is expected, the next token is not a string, or the
    /// buffer ends inside it.
    pub fn read_string(&mut self) -> Result<&'a BStr, Error> {
        self.guard(|cursor, buffer, _| cursor.read_string(buffer).map(BStr::new))
    }

    /// Like [`read_string`](Self::read_string), copying into a new vector.
    ///
    /// # Errors
    ///
    /// See [`read_string`](Self::read_string).
    pub fn read_string_owned(&mut self) -> Result<Vec<u8>, Error> {
        self.read_string().map(|s| s.to_vec())
    }

    /// Consume a string value by copying its body into `out`.
    ///
    /// Returns the number of bytes copied. Pair with
    /// [`read_string_length`](Self::read_string_length) to size `out`.
    ///
    /// # Errors
    ///
    /// Capacity exhaustion when `out` is too small, otherwise as
    /// [`read_string`](Self::read_string).
    pub fn read_string_into(&mut self, out: &mut [u8]) -> Result<usize, Error> {
        self.guard(|cursor, buffer, _| cursor.read_string_into(buffer, out))
    }

    /// Length of the key about to be read, without consuming it.
    ///
    /// # Errors
    ///
    /// Fails unless a key is expected and its header is well-formed.
    pub fn read_key_length(&mut self) -> Result<usize, Error> {
        self.guard(|cursor, buffer, _| cursor.read_key_length(buffer))
    }

    /// Consume a dictionary key, returning a view into the buffer.
    ///
    /// # Errors
    ///
    /// Fails unless a key is expected and well-formed.
    pub fn read_key(&mut self) -> Result<&'a BStr, Error> {
        self.guard(|cursor, buffer, _| cursor.read_key(buffer).map(BStr::new))
    }

    /// Like [`read_key`](Self::read_key), copying into a new vector.
    ///
    /// # Errors
    ///
    /// See [`read_key`](Self::read_key).
    pub fn read_key_owned(&mut self) -> Result<Vec<u8>, Error> {
        self.read_key().map(|k| k.to_vec())
    }

    /// # Errors
    ///
    /// Fails if no value is expected or the next byte is not `l`.
    pub fn read_list_head(&mut self) -> Result<(), Error> {
        self.guard(|cursor, buffer, options| cursor.open(buffer, options, Container::List))
    }

    /// # Errors
    ///
    /// Fails unless the innermost container is a list whose elements have
    /// all been consumed.
    pub fn read_list_tail(&mut self) -> Result<(), Error> {
        self.guard(|cursor, buffer, _| cursor.close(buffer, Container::List))
    }

    /// # Errors
    ///
    /// Fails if no value is expected or the next byte is not `d`.
    pub fn read_dictionary_head(&mut self) -> Result<(), Error> {
        self.guard(|cursor, buffer, options| cursor.open(buffer, options, Container::Dictionary))
    }

    /// # Errors
    ///
    /// Fails unless the innermost container is a dictionary and no key is
    /// awaiting its value.
    pub fn read_dictionary_tail(&mut self) -> Result<(), Error> {
        self.guard(|cursor, buffer, _| cursor.close(buffer, Container::Dictionary))
    }

    /// Consume a list, recording where each element starts.
    ///
    /// # Errors
    ///
    /// Fails if no list starts here or any element is malformed.
    pub fn read_list(&mut self) -> Result<ListIndex, Error> {
        self.guard(|cursor, buffer, options| cursor.read_list(buffer, options))
    }

    /// Consume a dictionary, indexing each key to the position of its value.
    ///
    /// Duplicate keys keep the first occurrence when `skip_duplicate_keys`
    /// is set. Otherwise the whole dictionary is still consumed and the
    /// call then fails with a syntax error at the first duplicate key.
    ///
    /// # Errors
    ///
    /// Fails if no dictionary starts here, an entry is malformed, or a
    /// duplicate key is found and not skipped.
    pub fn read_dictionary(
        &mut self,
        skip_duplicate_keys: bool,
    ) -> Result<DictionaryIndex<'a>, Error> {
        self.guard(|cursor, buffer, options| {
            cursor.read_dictionary(buffer, options, skip_duplicate_keys)
        })
    }

    /// Check that the top-level value is complete and nothing follows it.
    ///
    /// # Errors
    ///
    /// [`UsageError::Incomplete`] before the value is complete,
    /// [`SyntaxError::TrailingData`] if bytes remain.
    pub fn finish(&mut self) -> Result<(), Error> {
        self.guard(|cursor, buffer, _| {
            if cursor.state != ParseState::Final {
                return Err(cursor.usage(UsageError::Incomplete));
            }
            if cursor.index != buffer.len() {
                return Err(Error::new(SyntaxError::TrailingData, cursor.index));
            }
            Ok(())
        })
    }

    /// Lend the cursor to a child view.
    ///
    /// This reader is unusable until the view is disposed, which copies the
    /// view's cursor back.
    ///
    /// # Errors
    ///
    /// Fails if this reader is poisoned, disposed, or already lent out.
    pub fn create_child_view(&mut self) -> Result<ReaderView<'_, 'a>, Error> {
        self.cursor.usable()?;
        trace_event!(offset = self.cursor.index, "reader lent to child view");
        let cursor = mem::replace(&mut self.cursor, ReadCursor::lent_out());
        let reader = Reader {
            buffer: self.buffer,
            cursor,
            options: self.options,
        };
        Ok(ReaderView {
            home: Some(&mut self.cursor),
            reader,
        })
    }
}

/// A reader temporarily operating on its parent's cursor.
///
/// Dereferences to [`Reader`], so the full reader API is available.
#[derive(Debug)]
pub struct ReaderView<'p, 'a> {
    home: Option<&'p mut ReadCursor>,
    reader: Reader<'a>,
}

impl ReaderView<'_, '_> {
    /// Hand the cursor back to the parent. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(home) = self.home.take() {
            trace_event!(offset = self.reader.cursor.index, "child view returned cursor");
            *home = mem::replace(&mut self.reader.cursor, ReadCursor::disposed());
        }
    }

    /// Release the view without returning the cursor; the parent stays
    /// unusable for good.
    pub fn abandon(mut self) {
        if self.home.take().is_some() {
            self.reader.cursor = ReadCursor::disposed();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.home.is_none()
    }
}

impl<'a> Deref for ReaderView<'_, 'a> {
    type Target = Reader<'a>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl DerefMut for ReaderView<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}

impl Drop for ReaderView<'_, '_> {
    fn drop(&mut self) {
        self.dispose();
    }
}
