//! Grammar-enforcing push writer emitting canonical bencode into a [`Sink`].
//!
//! Tokens are staged in the writer and handed to the sink in batches once
//! [`WriterOptions::commit_threshold`] bytes are pending. A string body that
//! would push the batch past the threshold is streamed into the sink instead,
//! one region at a time. Every region is committed before the next is
//! requested. Nothing pending reaches the output until it is committed,
//! which [`Writer::flush`] forces.
//!
//! Like the reader, the writer is poisoned by its first failure and lends
//! its cursor to a [`WriterView`] via [`Writer::create_child_view`].

use alloc::vec::Vec;
use core::{
    mem,
    ops::{Deref, DerefMut},
};

use crate::{
    error::{Error, UnsupportedError, UsageError},
    lex::{self, MAX_INTEGER_TOKEN, MAX_STRING_HEADER, MAX_STRING_LENGTH},
    options::WriterOptions,
    scope::ScopeStack,
    sink::{Sink, VecSink},
    token::{self, Container, ParseState, Token},
};

#[derive(Debug, Clone, Default)]
pub(crate) struct WriteCursor {
    state: ParseState,
    scopes: ScopeStack,
    /// Last key written in the innermost dictionary.
    previous_key: Option<Vec<u8>>,
    /// `previous_key` of each enclosing dictionary.
    saved_keys: Vec<Option<Vec<u8>>>,
    /// Bytes emitted but not yet handed to the sink.
    staged: Vec<u8>,
    /// Total bytes emitted, committed or not.
    written: usize,
    lent_out: bool,
}

impl WriteCursor {
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
            return Err(Error::new(UsageError::LentOut, self.written));
        }
        match self.state {
            ParseState::Error => Err(Error::new(UsageError::Poisoned, self.written)),
            ParseState::Disposed => Err(Error::new(UsageError::Disposed, self.written)),
            _ => Ok(()),
        }
    }

    fn usage(&self, err: UsageError) -> Error {
        Error::new(err, self.written)
    }

    #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
    fn poison(&mut self, err: &Error) {
        debug_event!(offset = err.offset(), error = %err, "writer poisoned");
        self.state = ParseState::Error;
    }

    fn depth(&self) -> usize {
        match self.state {
            ParseState::ListItem | ParseState::DictionaryKey | ParseState::DictionaryValue => {
                self.scopes.len() + 1
            }
            _ => 0,
        }
    }

    /// Stage `bytes` as one unit.
    fn emit(&mut self, bytes: &[u8]) {
        self.staged.extend_from_slice(bytes);
        self.written += bytes.len();
    }

    /// Copy `bytes` straight into the sink, one region at a time: copy what
    /// fits, commit, ask for whatever is available next.
    fn emit_streaming<S: Sink + ?Sized>(
        &mut self,
        sink: &mut S,
        mut bytes: &[u8],
    ) -> Result<(), Error> {
        self.commit(sink)?;
        while !bytes.is_empty() {
            let region = sink.request_capacity(0);
            let n = region.len().min(bytes.len());
            if n == 0 {
                return Err(Error::capacity(self.written));
            }
            region[..n].copy_from_slice(&bytes[..n]);
            sink.commit(n);
            self.written += n;
            bytes = &bytes[n..];
        }
        Ok(())
    }

    /// Move every staged byte into the sink. Each region is committed before
    /// the next one is requested.
    fn commit<S: Sink + ?Sized>(&mut self, sink: &mut S) -> Result<(), Error> {
        if self.staged.is_empty() {
            return Ok(());
        }
        trace_event!(bytes = self.staged.len(), "writer commit");
        let mut done = 0;
        while done < self.staged.len() {
            let rest = &self.staged[done..];
            let region = sink.request_capacity(rest.len());
            let n = region.len().min(rest.len());
            if n == 0 {
                self.staged.drain(..done);
                return Err(Error::capacity(self.written));
            }
            region[..n].copy_from_slice(&rest[..n]);
            sink.commit(n);
            done += n;
        }
        self.staged.clear();
        Ok(())
    }

    fn commit_if_due<S: Sink + ?Sized>(
        &mut self,
        sink: &mut S,
        options: &WriterOptions,
    ) -> Result<(), Error> {
        if self.staged.len() >= options.commit_threshold {
            self.commit(sink)?;
        }
        Ok(())
    }

    fn write_integer(&mut self, value: i64) -> Result<(), Error> {
        let next = token::after_value(self.state).map_err(|e| self.usage(e))?;
        let mut scratch = [0u8; MAX_INTEGER_TOKEN];
        let n = lex::format_integer(value, &mut scratch);
        self.emit(&scratch[..n]);
        self.state = next;
        Ok(())
    }

    fn write_string_body<S: Sink + ?Sized>(
        &mut self,
        sink: &mut S,
        options: &WriterOptions,
        bytes: &[u8],
    ) -> Result<(), Error> {
        if bytes.len() > MAX_STRING_LENGTH {
            return Err(Error::new(
                UnsupportedError::StringTooLong {
                    max: MAX_STRING_LENGTH,
                },
                self.written,
            ));
        }
        let mut header = [0u8; MAX_STRING_HEADER];
        let n = lex::format_length(bytes.len(), &mut header);
        self.emit(&header[..n]);
        if self.staged.len() + bytes.len() <= options.commit_threshold {
            self.emit(bytes);
            Ok(())
        } else {
            self.emit_streaming(sink, bytes)
        }
    }

    fn write_string<S: Sink + ?Sized>(
        &mut self,
        sink: &mut S,
        options: &WriterOptions,
        bytes: &[u8],
    ) -> Result<(), Error> {
        let next = token::after_value(self.state).map_err(|e| self.usage(e))?;
        self.write_string_body(sink, options, bytes)?;
        self.state = next;
        Ok(())
    }

    fn write_key<S: Sink + ?Sized>(
        &mut self,
        sink: &mut S,
        options: &WriterOptions,
        key: &[u8],
    ) -> Result<(), Error> {
        let next = token::after_key(self.state).map_err(|e| self.usage(e))?;
        if options.validate_key_order {
            if let Some(previous) = &self.previous_key {
                if key <= previous.as_slice() {
                    return Err(self.usage(UsageError::UnorderedKeys));
                }
            }
        }
        self.write_string_body(sink, options, key)?;
        if options.validate_key_order {
            let slot = self.previous_key.get_or_insert_with(Vec::new);
            slot.clear();
            slot.extend_from_slice(key);
        }
        self.state = next;
        Ok(())
    }

    fn open(&mut self, container: Container) -> Result<(), Error> {
        let at = self.written;
        let next =
            token::enter(self.state, &mut self.scopes, container).map_err(|e| Error::new(e, at))?;
        match container {
            Container::List => self.emit(b"l"),
            Container::Dictionary => {
                self.emit(b"d");
                self.saved_keys.push(self.previous_key.take());
            }
        }
        self.state = next;
        Ok(())
    }

    fn close(&mut self, container: Container) -> Result<(), Error> {
        let at = self.written;
        let next =
            token::exit(self.state, &mut self.scopes, container).map_err(|e| Error::new(e, at))?;
        self.emit(b"e");
        if container == Container::Dictionary {
            self.previous_key = self.saved_keys.pop().flatten();
        }
        self.state = next;
        Ok(())
    }

    fn write_token<S: Sink + ?Sized>(
        &mut self,
        sink: &mut S,
        options: &WriterOptions,
        token: Token<'_>,
    ) -> Result<(), Error> {
        match token {
            Token::Integer(value) => self.write_integer(value),
            Token::String(bytes) => self.write_string(sink, options, bytes),
            Token::Key(bytes) => self.write_key(sink, options, bytes),
            Token::ListHead => self.open(Container::List),
            Token::ListTail => self.close(Container::List),
            Token::DictionaryHead => self.open(Container::Dictionary),
            Token::DictionaryTail => self.close(Container::Dictionary),
        }
    }

    fn flush<S: Sink + ?Sized>(&mut self, sink: &mut S, is_final: bool) -> Result<(), Error> {
        if is_final && self.state != ParseState::Final {
            return Err(self.usage(UsageError::Incomplete));
        }
        self.commit(sink)
    }
}

/// A push writer producing one bencoded value.
///
/// # Examples
///
/// ```
/// use bencursor::{VecSink, Writer};
///
/// let mut writer = Writer::new(VecSink::new());
/// writer.write_dictionary_head().unwrap();
/// writer.write_key(b"a").unwrap();
/// writer.write_integer(1).unwrap();
/// writer.write_key(b"bb").unwrap();
/// writer.write_list_head().unwrap();
/// writer.write_string(b"spam").unwrap();
/// writer.write_list_tail().unwrap();
/// writer.write_dictionary_tail().unwrap();
///
/// assert_eq!(writer.into_vec().unwrap(), b"d1:ai1e2:bbl4:spamee");
/// ```
#[derive(Debug)]
pub struct Writer<S: Sink> {
    sink: S,
    cursor: WriteCursor,
    options: WriterOptions,
}

impl<S: Sink> Writer<S> {
    pub fn new(sink: S) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    pub fn with_options(sink: S, options: WriterOptions) -> Self {
        Self {
            sink,
            cursor: WriteCursor::default(),
            options,
        }
    }

    /// Run `op` on a usable cursor, poisoning it if `op` fails. Commits
    /// afterwards once enough bytes are pending.
    fn guard(
        &mut self,
        op: impl FnOnce(&mut WriteCursor, &mut S, &WriterOptions) -> Result<(), Error>,
    ) -> Result<(), Error> {
        self.cursor.usable()?;
        let result = op(&mut self.cursor, &mut self.sink, &self.options)
            .and_then(|()| self.cursor.commit_if_due(&mut self.sink, &self.options));
        if let Err(err) = &result {
            self.cursor.poison(err);
        }
        result
    }

    #[must_use]
    pub fn options(&self) -> &WriterOptions {
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

    /// Total bytes emitted so far, including those not yet committed.
    #[must_use]
    pub fn bytes_written(&self) -> usize {
        self.cursor.written
    }

    /// Bytes emitted but not yet committed to the sink.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.cursor.staged.len()
    }

    /// Whether a complete top-level value has been written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.cursor.lent_out && self.cursor.state == ParseState::Final
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Give back the sink. Pending bytes are not committed; call
    /// [`flush`](Self::flush) first.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// # Errors
    ///
    /// Fails if no value is expected here or the sink is full.
    pub fn write_integer(&mut self, value: i64) -> Result<(), Error> {
        self.guard(|cursor, _, _| cursor.write_integer(value))
    }

    /// # Errors
    ///
    /// Fails if no value is expected here, `bytes` is longer than
    /// [`MAX_STRING_LENGTH`], or the sink is full.
    pub fn write_string(&mut self, bytes: impl AsRef<[u8]>) -> Result<(), Error> {
        self.guard(|cursor, sink, options| cursor.write_string(sink, options, bytes.as_ref()))
    }

    /// Write a dictionary key.
    ///
    /// Unless key order validation is disabled, `key` must compare strictly
    /// greater, byte by byte, than the previous key in this dictionary.
    ///
    /// # Errors
    ///
    /// Fails if no key is expected here, the key is out of order, or the
    /// sink is full.
    pub fn write_key(&mut self, key: impl AsRef<[u8]>) -> Result<(), Error> {
        self.guard(|cursor, sink, options| cursor.write_key(sink, options, key.as_ref()))
    }

    /// # Errors
    ///
    /// Fails if no value is expected here or the sink is full.
    pub fn write_list_head(&mut self) -> Result<(), Error> {
        self.guard(|cursor, _, _| cursor.open(Container::List))
    }

    /// # Errors
    ///
    /// Fails unless the innermost open container is a list.
    pub fn write_list_tail(&mut self) -> Result<(), Error> {
        self.guard(|cursor, _, _| cursor.close(Container::List))
    }

    /// # Errors
    ///
    /// Fails if no value is expected here or the sink is full.
    pub fn write_dictionary_head(&mut self) -> Result<(), Error> {
        self.guard(|cursor, _, _| cursor.open(Container::Dictionary))
    }

    /// # Errors
    ///
    /// Fails unless the innermost open container is a dictionary with no
    /// key awaiting its value.
    pub fn write_dictionary_tail(&mut self) -> Result<(), Error> {
        self.guard(|cursor, _, _| cursor.close(Container::Dictionary))
    }

    /// Write any token, as produced by [`Reader::next_token`](crate::Reader::next_token).
    ///
    /// # Errors
    ///
    /// As the corresponding `write_*` method.
    pub fn write_token(&mut self, token: Token<'_>) -> Result<(), Error> {
        self.guard(|cursor, sink, options| cursor.write_token(sink, options, token))
    }

    /// Commit pending bytes to the sink.
    ///
    /// With `is_final` the top-level value must be complete.
    ///
    /// # Errors
    ///
    /// [`UsageError::Incomplete`] for a final flush of an unfinished value.
    pub fn flush(&mut self, is_final: bool) -> Result<(), Error> {
        self.guard(|cursor, sink, _| cursor.flush(sink, is_final))
    }

    /// Lend the cursor to a child view writing into the same sink.
    ///
    /// This writer is unusable until the view is disposed.
    ///
    /// # Errors
    ///
    /// Fails if this writer is poisoned, disposed, or already lent out.
    pub fn create_child_view(&mut self) -> Result<WriterView<'_, S>, Error> {
        self.cursor.usable()?;
        trace_event!(offset = self.cursor.written, "writer lent to child view");
        let cursor = mem::replace(&mut self.cursor, WriteCursor::lent_out());
        let writer = Writer {
            sink: &mut self.sink,
            cursor,
            options: self.options,
        };
        Ok(WriterView {
            home: Some(&mut self.cursor),
            writer,
        })
    }
}

impl Writer<VecSink> {
    /// Final flush, then the encoded bytes.
    ///
    /// # Errors
    ///
    /// Fails if the top-level value is incomplete or the writer is unusable.
    pub fn into_vec(mut self) -> Result<Vec<u8>, Error> {
        self.flush(true)?;
        Ok(self.sink.into_inner())
    }
}

/// A writer temporarily operating on its parent's cursor and sink.
#[derive(Debug)]
pub struct WriterView<'p, S: Sink> {
    home: Option<&'p mut WriteCursor>,
    writer: Writer<&'p mut S>,
}

impl<S: Sink> WriterView<'_, S> {
    /// Hand the cursor back to the parent. Idempotent.
    ///
    /// Pending bytes stay pending; the parent commits them.
    pub fn dispose(&mut self) {
        if let Some(home) = self.home.take() {
            trace_event!(offset = self.writer.cursor.written, "child view returned cursor");
            *home = mem::replace(&mut self.writer.cursor, WriteCursor::disposed());
        }
    }

    /// Release the view without returning the cursor; the parent stays
    /// unusable for good.
    pub fn abandon(mut self) {
        if self.home.take().is_some() {
            self.writer.cursor = WriteCursor::disposed();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.home.is_none()
    }
}

impl<'p, S: Sink> Deref for WriterView<'p, S> {
    type Target = Writer<&'p mut S>;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl<S: Sink> DerefMut for WriterView<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

impl<S: Sink> Drop for WriterView<'_, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}
