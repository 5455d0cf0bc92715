//! Sequence Number Handling
//!
//! The protocol uses 7-bit sequence numbers (bit 7 of the wire byte is the
//! last-fragment flag). This module provides a wrapped sequence number type
//! and the cyclic-interval membership test used for all window and
//! reassembly bookkeeping.
//!
//! A 7-bit space is far too small for the half-space distance heuristics
//! that larger sequence spaces get away with, so ordering is never decided
//! by direct comparison. The only legal primitives are [`SeqNumber::next`],
//! [`SeqNumber::increment`] and [`SeqNumber::between`].

use std::fmt;

/// Number of distinct sequence numbers (the space wraps at this modulus)
pub const SEQ_MODULUS: u8 = 128;

/// Maximum sequence number value (7-bit: 0x7F)
pub const MAX_SEQ_NUMBER: u8 = SEQ_MODULUS - 1;

/// Sequence number with 7-bit wraparound semantics
///
/// Deliberately does not implement `Ord`/`PartialOrd`: any ordering
/// question in a wrapping space must go through [`SeqNumber::between`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct SeqNumber(u8);

impl SeqNumber {
    /// Create a new sequence number
    ///
    /// # Panics
    /// Panics if value exceeds MAX_SEQ_NUMBER
    pub fn new(value: u8) -> Self {
        assert!(
            value <= MAX_SEQ_NUMBER,
            "Sequence number {} exceeds maximum {}",
            value,
            MAX_SEQ_NUMBER
        );
        SeqNumber(value)
    }

    /// Create a sequence number, masking the value to 7 bits
    #[inline]
    pub fn new_unchecked(value: u8) -> Self {
        SeqNumber(value & MAX_SEQ_NUMBER)
    }

    /// Get the raw sequence number value
    #[inline]
    pub fn as_raw(self) -> u8 {
        self.0
    }

    /// Advance this sequence number by 1 (wrapping)
    #[inline]
    pub fn increment(&mut self) {
        self.0 = (self.0 + 1) % SEQ_MODULUS;
    }

    /// Get the next sequence number
    #[inline]
    pub fn next(self) -> Self {
        SeqNumber((self.0 + 1) % SEQ_MODULUS)
    }

    /// Get the previous sequence number
    #[inline]
    pub fn prev(self) -> Self {
        SeqNumber((self.0 + SEQ_MODULUS - 1) % SEQ_MODULUS)
    }

    /// Return the current value and advance `self` by one
    #[inline]
    pub fn fetch_increment(&mut self) -> Self {
        let cur = *self;
        self.increment();
        cur
    }

    /// Cyclic-interval membership test: is `b` reachable from `a` without
    /// passing `c` going forward through the wrapping space?
    ///
    /// True iff `a <= b < c` under modular semantics, i.e. exactly one of:
    /// `a <= b < c`, `c < a <= b`, or `b < c < a` on the raw values.
    pub fn between(a: SeqNumber, b: SeqNumber, c: SeqNumber) -> bool {
        let (a, b, c) = (a.0, b.0, c.0);
        (a <= b && b < c) || (c < a && a <= b) || (b < c && c < a)
    }

    /// Offset this sequence number forward by `n` (wrapping)
    #[inline]
    pub fn offset(self, n: u8) -> Self {
        SeqNumber((self.0 as u16 + n as u16).rem_euclid(SEQ_MODULUS as u16) as u8)
    }
}

impl fmt::Debug for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SeqNumber({})", self.0)
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for SeqNumber {
    fn from(value: u8) -> Self {
        SeqNumber::new_unchecked(value)
    }
}

impl From<SeqNumber> for u8 {
    fn from(seq: SeqNumber) -> u8 {
        seq.0
    }
}
