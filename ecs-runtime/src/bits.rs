// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Growable bitset
//!
//! Component kinds and families are both identified by dense indices, so an
//! entity's component set and family membership are stored as bitsets.
//! `Bits` grows on demand when a bit past the current width is set; reading
//! or clearing a bit past the width is a cheap no-op.

use std::fmt;
use std::hash::{Hash, Hasher};

const WORD_BITS: usize = 64;

/// A growable set of non-negative indices backed by 64-bit words
#[derive(Clone, Default)]
pub struct Bits {
    words: Vec<u64>,
}

impl Bits {
    /// Create an empty bitset
    pub fn new() -> Self {
        Bits { words: Vec::new() }
    }

    /// Create an empty bitset with room for `bits` indices before growing
    pub fn with_capacity(bits: usize) -> Self {
        Bits {
            words: Vec::with_capacity((bits + WORD_BITS - 1) / WORD_BITS),
        }
    }

    /// Whether the bit at `index` is set
    pub fn get(&self, index: usize) -> bool {
        match self.words.get(index / WORD_BITS) {
            Some(word) => word & (1 << (index % WORD_BITS)) != 0,
            None => false,
        }
    }

    /// Set the bit at `index`, growing the set if necessary
    pub fn set(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (index % WORD_BITS);
    }

    /// Clear the bit at `index`
    pub fn clear(&mut self, index: usize) {
        if let Some(word) = self.words.get_mut(index / WORD_BITS) {
            *word &= !(1 << (index % WORD_BITS));
        }
    }

    /// Clear every bit, keeping the allocated words
    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    /// Whether no bit is set
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Number of set bits
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Index of the highest set bit plus one, or zero when empty
    pub fn length(&self) -> usize {
        for (i, &word) in self.words.iter().enumerate().rev() {
            if word != 0 {
                return i * WORD_BITS + (WORD_BITS - word.leading_zeros() as usize);
            }
        }
        0
    }

    /// First set bit at or after `from`
    pub fn next_set_bit(&self, from: usize) -> Option<usize> {
        let mut word_index = from / WORD_BITS;
        if word_index >= self.words.len() {
            return None;
        }
        let mut word = self.words[word_index] & (u64::MAX << (from % WORD_BITS));
        loop {
            if word != 0 {
                return Some(word_index * WORD_BITS + word.trailing_zeros() as usize);
            }
            word_index += 1;
            word = *self.words.get(word_index)?;
        }
    }

    /// Iterate over set indices in ascending order
    pub fn iter(&self) -> Ones<'_> {
        Ones { bits: self, next: 0 }
    }

    /// Whether every bit set in `other` is also set in `self`
    pub fn contains_all(&self, other: &Bits) -> bool {
        other.words.iter().enumerate().all(|(i, &theirs)| {
            let ours = self.words.get(i).copied().unwrap_or(0);
            ours & theirs == theirs
        })
    }

    /// Whether `self` and `other` share at least one set bit
    pub fn intersects(&self, other: &Bits) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Keep only bits also set in `other`
    pub fn and(&mut self, other: &Bits) {
        for (i, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(i).copied().unwrap_or(0);
        }
    }

    /// Add every bit set in `other`
    pub fn or(&mut self, other: &Bits) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (word, theirs) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= theirs;
        }
    }

    /// Clear every bit set in `other`
    pub fn and_not(&mut self, other: &Bits) {
        for (word, theirs) in self.words.iter_mut().zip(other.words.iter()) {
            *word &= !theirs;
        }
    }

    // Words up to the last non-zero one; equality and hashing ignore width.
    fn significant_words(&self) -> &[u64] {
        let len = self
            .words
            .iter()
            .rposition(|&w| w != 0)
            .map_or(0, |i| i + 1);
        &self.words[..len]
    }
}

impl PartialEq for Bits {
    fn eq(&self, other: &Self) -> bool {
        self.significant_words() == other.significant_words()
    }
}

impl Eq for Bits {}

impl Hash for Bits {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_words().hash(state);
    }
}

impl fmt::Debug for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<usize> for Bits {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bits = Bits::new();
        for index in iter {
            bits.set(index);
        }
        bits
    }
}

/// Iterator over the set indices of a [`Bits`]
pub struct Ones<'a> {
    bits: &'a Bits,
    next: usize,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let index = self.bits.next_set_bit(self.next)?;
        self.next = index + 1;
        Some(index)
    }
}
