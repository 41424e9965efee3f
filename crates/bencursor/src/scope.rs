//! Compact record of which container encloses each open scope.
//!
//! One bit per open list or dictionary, packed into 64-bit words. A set bit
//! means the enclosing container is a dictionary; a clear bit means it is a
//! list (or the top level). The bit is only consulted when the scope closes,
//! to decide which parse state to return to.

use alloc::vec::Vec;

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScopeStack {
    words: Vec<u64>,
    len: usize,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    pub(crate) const fn new() -> Self {
        Self {
            words: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn push(&mut self, in_dictionary: bool) {
        let word = self.len / WORD_BITS;
        let bit = self.len % WORD_BITS;
        if word == self.words.len() {
            self.words.push(0);
        }
        if in_dictionary {
            self.words[word] |= 1 << bit;
        } else {
            self.words[word] &= !(1 << bit);
        }
        self.len += 1;
    }

    pub(crate) fn pop(&mut self) -> Option<bool> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let word = self.len / WORD_BITS;
        let bit = self.len % WORD_BITS;
        Some((self.words[word] & (1 << bit)) != 0)
    }
}
