//! Position indexes over one level of a list or dictionary.
//!
//! Both are built by the reader while it walks a container and store byte
//! offsets instead of decoded values, so callers can seek back later and
//! decode only what they need. Dictionary keys are views into the reader's
//! buffer; an index cannot outlive that buffer.

use alloc::vec::Vec;
use core::{cmp::Ordering, fmt, slice};

use bstr::BStr;

/// A byte offset at which a value starts.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(usize);

impl Position {
    #[must_use]
    pub const fn new(offset: usize) -> Self {
        Self(offset)
    }

    /// The byte offset.
    #[must_use]
    pub const fn offset(self) -> usize {
        self.0
    }
}

impl From<usize> for Position {
    fn from(offset: usize) -> Self {
        Self(offset)
    }
}

impl From<Position> for usize {
    fn from(position: Position) -> Self {
        position.0
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Dictionary keys mapped to the positions of their values, sorted by key.
///
/// Lookup is a binary search. Iteration yields keys in strictly increasing
/// byte order, whatever order they had in the source.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct DictionaryIndex<'a> {
    entries: Vec<(&'a [u8], Position)>,
}

impl<'a> DictionaryIndex<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key`, keeping the entries sorted.
    ///
    /// Returns `false`, leaving the index unchanged, if `key` is already
    /// present. Appending in ascending key order is O(1) amortized; any
    /// other insertion costs a binary search plus a shift.
    pub fn try_insert(&mut self, key: &'a [u8], position: Position) -> bool {
        let Some((last, _)) = self.entries.last() else {
            self.entries.push((key, position));
            return true;
        };
        match key.cmp(last) {
            Ordering::Greater => {
                self.entries.push((key, position));
                true
            }
            Ordering::Equal => false,
            Ordering::Less => {
                let head = &self.entries[..self.entries.len() - 1];
                match head.binary_search_by(|(k, _)| (*k).cmp(key)) {
                    Ok(_) => false,
                    Err(at) => {
                        self.entries.insert(at, (key, position));
                        true
                    }
                }
            }
        }
    }

    /// Position of the value stored under `key`.
    pub fn try_get_position(&self, key: impl AsRef<[u8]>) -> Option<Position> {
        let key = key.as_ref();
        self.entries
            .binary_search_by(|(k, _)| (*k).cmp(key))
            .ok()
            .map(|at| self.entries[at].1)
    }

    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.try_get_position(key).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `i`-th entry in key order.
    #[must_use]
    pub fn get(&self, i: usize) -> Option<(&'a BStr, Position)> {
        self.entries.get(i).map(|&(k, p)| (BStr::new(k), p))
    }

    pub fn iter(&self) -> DictionaryIter<'_, 'a> {
        DictionaryIter {
            inner: self.entries.iter(),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a BStr> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        self.iter().map(|(_, p)| p)
    }
}

impl fmt::Debug for DictionaryIndex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Iterator over a [`DictionaryIndex`] in key order.
#[derive(Debug, Clone)]
pub struct DictionaryIter<'i, 'a> {
    inner: slice::Iter<'i, (&'a [u8], Position)>,
}

impl<'a> Iterator for DictionaryIter<'_, 'a> {
    type Item = (&'a BStr, Position);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|&(k, p)| (BStr::new(k), p))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for DictionaryIter<'_, '_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|&(k, p)| (BStr::new(k), p))
    }
}

impl ExactSizeIterator for DictionaryIter<'_, '_> {}

impl<'i, 'a> IntoIterator for &'i DictionaryIndex<'a> {
    type Item = (&'a BStr, Position);
    type IntoIter = DictionaryIter<'i, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Positions of list elements in encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListIndex {
    positions: Vec<Position>,
}

impl ListIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, position: Position) {
        self.positions.push(position);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[must_use]
    pub fn get(&self, i: usize) -> Option<Position> {
        self.positions.get(i).copied()
    }

    pub fn iter(&self) -> core::iter::Copied<slice::Iter<'_, Position>> {
        self.positions.iter().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Position] {
        &self.positions
    }
}

impl<'i> IntoIterator for &'i ListIndex {
    type Item = Position;
    type IntoIter = core::iter::Copied<slice::Iter<'i, Position>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
