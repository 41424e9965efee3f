//! Destinations a [`Writer`](crate::Writer) pulls capacity from.
//!
//! Contract
//! - `request_capacity(min_hint)` returns the writable region that begins
//!   right after the last committed byte. It is at least `min_hint` bytes
//!   long, except that a sink with no room left may return a shorter (even
//!   empty) region; the writer treats that as capacity exhaustion.
//!   `min_hint == 0` means "whatever is available".
//! - `commit(n)` makes the first `n` bytes of the most recently returned
//!   region part of the output. The writer commits every region it writes
//!   into before requesting another, so a sink is free to hand out fresh
//!   memory on each request.

use alloc::vec::Vec;

/// A byte destination that hands out writable regions.
pub trait Sink {
    /// Borrow the region following the committed output.
    fn request_capacity(&mut self, min_hint: usize) -> &mut [u8];

    /// Advance the committed output by `n` bytes of the most recently
    /// returned region.
    fn commit(&mut self, n: usize);
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn request_capacity(&mut self, min_hint: usize) -> &mut [u8] {
        (**self).request_capacity(min_hint)
    }

    fn commit(&mut self, n: usize) {
        (**self).commit(n);
    }
}

/// Smallest region a [`VecSink`] hands out.
const VEC_SINK_CHUNK: usize = 256;

/// A growable sink backed by a `Vec<u8>`.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    bytes: Vec<u8>,
    committed: usize,
}

impl VecSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            committed: 0,
        }
    }

    /// The committed output.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.committed]
    }

    /// The committed output, dropping any uncommitted scratch.
    #[must_use]
    pub fn into_inner(mut self) -> Vec<u8> {
        self.bytes.truncate(self.committed);
        self.bytes
    }
}

impl Sink for VecSink {
    fn request_capacity(&mut self, min_hint: usize) -> &mut [u8] {
        let want = self.committed + min_hint.max(VEC_SINK_CHUNK);
        if self.bytes.len() < want {
            self.bytes.resize(want, 0);
        }
        &mut self.bytes[self.committed..]
    }

    fn commit(&mut self, n: usize) {
        debug_assert!(self.committed + n <= self.bytes.len());
        self.committed = (self.committed + n).min(self.bytes.len());
    }
}

/// A sink over a caller-provided, fixed-size region.
#[derive(Debug)]
pub struct SliceSink<'b> {
    buffer: &'b mut [u8],
    committed: usize,
}

impl<'b> SliceSink<'b> {
    pub fn new(buffer: &'b mut [u8]) -> Self {
        Self {
            buffer,
            committed: 0,
        }
    }

    /// Number of committed bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.committed
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    /// The committed output.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.committed]
    }

    /// The committed prefix of the underlying buffer.
    #[must_use]
    pub fn into_written(self) -> &'b mut [u8] {
        &mut self.buffer[..self.committed]
    }
}

impl Sink for SliceSink<'_> {
    fn request_capacity(&mut self, _min_hint: usize) -> &mut [u8] {
        &mut self.buffer[self.committed..]
    }

    fn commit(&mut self, n: usize) {
        debug_assert!(self.committed + n <= self.buffer.len());
        self.committed = (self.committed + n).min(self.buffer.len());
    }
}
