//! Packed bit storage, one bit per document id
//!
//! `BitVector` is a fixed-capacity array of `AtomicU64` words. Every bit
//! write is a single atomic read-modify-write on its word, so a reader never
//! observes a torn word regardless of platform:
//!
//! - `set_bit` / `clear_bit`: `fetch_or` / `fetch_and` with `Release`
//! - `test_bit`: `load` with `Acquire`
//!
//! Bits at or beyond `size()` are always zero. Growing within capacity only
//! moves `size`; growing past capacity allocates a new vector, copies the
//! words, and publishes it through `GrowableBitVector`. The superseded
//! vector is returned to the caller for generation-based retirement.
//!
//! Packed byte layout (used by persistence): bit `i` lives in byte `i / 8`
//! at bit position `i % 8`.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, Guard};

use super::config::{round_up_to_word, GrowStrategy, WORD_BITS};
use super::generation::GenerationHeld;

/// Sentinel for an invalidated set-bit count
const INVALID_COUNT: u32 = u32::MAX;

/// Count cache layout: invalidation epoch in the high half, count (or
/// `INVALID_COUNT`) in the low half.
#[inline]
fn pack_count(epoch: u32, count: u32) -> u64 {
    ((epoch as u64) << 32) | count as u64
}

#[inline]
fn unpack_count(state: u64) -> (u32, u32) {
    ((state >> 32) as u32, state as u32)
}

#[inline]
fn word_index(idx: u32) -> usize {
    (idx / WORD_BITS) as usize
}

#[inline]
fn bit_mask(idx: u32) -> u64 {
    1u64 << (idx % WORD_BITS)
}

#[inline]
fn words_for(bits: u32) -> usize {
    ((bits as u64 + WORD_BITS as u64 - 1) / WORD_BITS as u64) as usize
}

/// Fixed-capacity packed bit array with atomic per-word access.
#[derive(Debug)]
pub struct BitVector {
    words: Box<[AtomicU64]>,
    size: AtomicU32,
    true_bits: AtomicU64,
}

impl BitVector {
    /// Creates a zeroed vector of `size` bits with room for at least
    /// `capacity` bits.
    pub fn new(size: u32, capacity: u32) -> Self {
        let capacity = round_up_to_word(capacity.max(size));
        let words = (0..words_for(capacity))
            .map(|_| AtomicU64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            words,
            size: AtomicU32::new(size),
            true_bits: AtomicU64::new(pack_count(0, INVALID_COUNT)),
        }
    }

    /// Builds a vector from the packed byte layout.
    ///
    /// `bytes` must hold exactly `ceil(size / 8)` bytes. Bits past `size` in
    /// the final byte are ignored.
    pub fn from_packed_bytes(size: u32, bytes: &[u8], capacity: u32) -> Self {
        debug_assert_eq!(bytes.len(), Self::packed_len(size));
        let bv = Self::new(size, capacity);

        for (word, chunk) in bv.words.iter().zip(bytes.chunks(8)) {
            let mut buf = [0u8; 8];
            buf[..chunk.len()].copy_from_slice(chunk);
            word.store(u64::from_le_bytes(buf), Ordering::Relaxed);
        }
        bv.clear_tail(size);
        bv
    }

    /// Number of packed bytes needed for `size` bits
    pub fn packed_len(size: u32) -> usize {
        ((size as u64 + 7) / 8) as usize
    }

    /// Logical size in bits
    #[inline]
    pub fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    /// Allocated size in bits
    #[inline]
    pub fn capacity(&self) -> u32 {
        (self.words.len() as u64 * WORD_BITS as u64).min(u32::MAX as u64) as u32
    }

    /// Packed payload size of the logical bits
    pub fn size_bytes(&self) -> usize {
        Self::packed_len(self.size())
    }

    /// Bytes allocated for the word array
    pub fn allocated_bytes(&self) -> usize {
        self.words.len() * std::mem::size_of::<AtomicU64>()
    }

    /// Reads a bit. Indices beyond capacity read as zero.
    #[inline]
    pub fn test_bit(&self, idx: u32) -> bool {
        match self.words.get(word_index(idx)) {
            Some(word) => word.load(Ordering::Acquire) & bit_mask(idx) != 0,
            None => false,
        }
    }

    #[inline]
    pub(crate) fn set_bit(&self, idx: u32) {
        assert!(idx < self.size(), "set_bit({}) beyond size {}", idx, self.size());
        self.words[word_index(idx)].fetch_or(bit_mask(idx), Ordering::Release);
    }

    #[inline]
    pub(crate) fn clear_bit(&self, idx: u32) {
        assert!(idx < self.size(), "clear_bit({}) beyond size {}", idx, self.size());
        self.words[word_index(idx)].fetch_and(!bit_mask(idx), Ordering::Release);
    }

    /// Number of set bits, cached until the next invalidation.
    ///
    /// A scan only publishes its count if no invalidation happened while it
    /// ran, so a count computed before a commit never outlives that commit.
    pub fn count_true_bits(&self) -> u32 {
        let observed = self.true_bits.load(Ordering::Acquire);
        let (_, cached) = unpack_count(observed);
        if cached != INVALID_COUNT {
            return cached;
        }

        let count = self.scan_true_bits();
        self.publish_count(observed, count);
        count
    }

    fn scan_true_bits(&self) -> u32 {
        let used_words = words_for(self.size()).min(self.words.len());
        self.words[..used_words]
            .iter()
            .map(|w| w.load(Ordering::Acquire).count_ones())
            .sum::<u32>()
    }

    /// Cache `count` if the cache still holds the invalidated state the scan
    /// started from.
    fn publish_count(&self, observed: u64, count: u32) -> bool {
        let (epoch, _) = unpack_count(observed);
        self.true_bits
            .compare_exchange(
                observed,
                pack_count(epoch, count),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Drops the cached set-bit count so the next query recomputes it.
    pub fn invalidate_cached_count(&self) {
        let mut state = self.true_bits.load(Ordering::Acquire);
        loop {
            let (epoch, _) = unpack_count(state);
            let next = pack_count(epoch.wrapping_add(1), INVALID_COUNT);
            match self.true_bits.compare_exchange_weak(
                state,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(current) => state = current,
            }
        }
    }

    /// First set bit in `[from, limit)`
    pub fn next_true_bit(&self, from: u32, limit: u32) -> Option<u32> {
        self.next_bit_where(from, limit, false)
    }

    /// First cleared bit in `[from, limit)`
    pub fn next_false_bit(&self, from: u32, limit: u32) -> Option<u32> {
        self.next_bit_where(from, limit, true)
    }

    fn next_bit_where(&self, from: u32, limit: u32, invert: bool) -> Option<u32> {
        let mut idx = from;
        while idx < limit {
            let wi = word_index(idx);
            let raw = self
                .words
                .get(wi)
                .map(|w| w.load(Ordering::Acquire))
                .unwrap_or(0);
            let word = if invert { !raw } else { raw };
            let masked = word & (!0u64 << (idx % WORD_BITS));
            if masked != 0 {
                let found = wi as u32 * WORD_BITS + masked.trailing_zeros();
                return (found < limit).then_some(found);
            }
            idx = (wi as u32 + 1).saturating_mul(WORD_BITS);
            if idx == u32::MAX {
                break;
            }
        }
        None
    }

    /// Copies the first `limit` bits into the packed byte layout.
    pub fn to_packed_bytes(&self, limit: u32) -> Vec<u8> {
        let len = Self::packed_len(limit);
        let mut out = Vec::with_capacity(len + 8);
        for word in self.words.iter().take(words_for(limit)) {
            out.extend_from_slice(&word.load(Ordering::Acquire).to_le_bytes());
        }
        out.resize(len, 0);

        let tail = limit % 8;
        if tail != 0 {
            if let Some(last) = out.last_mut() {
                *last &= (1u8 << tail) - 1;
            }
        }
        out
    }

    /// Grows the logical size within the current capacity.
    pub(crate) fn set_size(&self, size: u32) {
        assert!(
            size <= self.capacity(),
            "size {} exceeds capacity {}",
            size,
            self.capacity()
        );
        self.size.store(size, Ordering::Release);
    }

    /// Shrinks the logical size, zeroing every bit at or beyond `size`.
    pub(crate) fn truncate(&self, size: u32) {
        assert!(size <= self.size(), "truncate({}) beyond size {}", size, self.size());
        self.clear_tail(size);
        self.size.store(size, Ordering::Release);
        self.invalidate_cached_count();
    }

    fn clear_tail(&self, from: u32) {
        let first = word_index(from);
        if first >= self.words.len() {
            return;
        }
        let keep = bit_mask(from) - 1;
        self.words[first].fetch_and(keep, Ordering::Release);
        for word in &self.words[first + 1..] {
            word.store(0, Ordering::Release);
        }
    }

    /// Copies this vector into a larger allocation.
    fn copy_with_capacity(&self, capacity: u32) -> BitVector {
        let copy = BitVector::new(self.size(), capacity);
        for (dst, src) in copy.words.iter().zip(self.words.iter()) {
            dst.store(src.load(Ordering::Acquire), Ordering::Relaxed);
        }
        copy.true_bits
            .store(self.true_bits.load(Ordering::Acquire), Ordering::Relaxed);
        copy
    }
}

impl GenerationHeld for Arc<BitVector> {
    fn byte_size(&self) -> usize {
        self.allocated_bytes()
    }
}

/// Bit storage that can be replaced while readers hold older vectors.
///
/// Only the attribute writer mutates it. Readers call `load` and keep the
/// returned `Arc` for as long as they need a stable vector.
pub(crate) struct GrowableBitVector {
    current: ArcSwap<BitVector>,
    grow_strategy: GrowStrategy,
}

impl GrowableBitVector {
    pub(crate) fn new(grow_strategy: GrowStrategy) -> Self {
        let initial = BitVector::new(0, grow_strategy.initial_docs);
        Self {
            current: ArcSwap::from_pointee(initial),
            grow_strategy,
        }
    }

    /// Snapshot of the current vector
    pub(crate) fn load(&self) -> Arc<BitVector> {
        self.current.load_full()
    }

    /// Borrow the current vector without bumping its reference count
    #[inline]
    pub(crate) fn peek(&self) -> Guard<Arc<BitVector>> {
        self.current.load()
    }

    /// Ensures `new_size` bits are addressable.
    ///
    /// Returns the superseded vector when storage had to be reallocated.
    pub(crate) fn extend(&self, new_size: u32) -> Option<Arc<BitVector>> {
        let current = self.peek();
        if new_size <= current.capacity() {
            if new_size > current.size() {
                current.set_size(new_size);
            }
            return None;
        }

        let capacity = self
            .grow_strategy
            .calc_new_capacity(current.capacity(), new_size);
        let grown = current.copy_with_capacity(capacity);
        grown.set_size(new_size);
        drop(current);
        Some(self.current.swap(Arc::new(grown)))
    }

    /// Ensures capacity for `capacity` bits without changing the size.
    pub(crate) fn reserve(&self, capacity: u32) -> Option<Arc<BitVector>> {
        let current = self.peek();
        if capacity <= current.capacity() {
            return None;
        }

        let grown = current.copy_with_capacity(capacity);
        drop(current);
        Some(self.current.swap(Arc::new(grown)))
    }

    /// Shrinks the logical size in place.
    pub(crate) fn shrink(&self, new_size: u32) {
        self.peek().truncate(new_size);
    }

    /// Installs a fresh vector, returning the one it replaces.
    pub(crate) fn replace(&self, bv: BitVector) -> Arc<BitVector> {
        self.current.swap(Arc::new(bv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(size: u32) -> BitVector {
        BitVector::new(size, size)
    }

    #[test]
    fn test_new_is_zeroed_and_word_aligned() {
        let bv = BitVector::new(10, 10);
        assert_eq!(bv.size(), 10);
        assert_eq!(bv.capacity(), 64);
        assert_eq!(bv.count_true_bits(), 0);
        assert!((0..64).all(|i| !bv.test_bit(i)));
    }

    #[test]
    fn test_set_and_clear() {
        let bv = sized(130);
        bv.set_bit(0);
        bv.set_bit(64);
        bv.set_bit(129);
        assert!(bv.test_bit(0));
        assert!(bv.test_bit(64));
        assert!(bv.test_bit(129));
        assert!(!bv.test_bit(1));

        bv.clear_bit(64);
        assert!(!bv.test_bit(64));
    }

    #[test]
    #[should_panic(expected = "beyond size")]
    fn test_set_beyond_size_panics() {
        let bv = sized(8);
        bv.set_bit(8);
    }

    #[test]
    fn test_count_is_cached_until_invalidated() {
        let bv = sized(100);
        bv.set_bit(3);
        assert_eq!(bv.count_true_bits(), 1);

        bv.set_bit(4);
        // Stale until invalidated
        assert_eq!(bv.count_true_bits(), 1);

        bv.invalidate_cached_count();
        assert_eq!(bv.count_true_bits(), 2);
    }

    #[test]
    fn test_count_from_before_invalidation_is_not_cached() {
        let bv = sized(100);
        bv.set_bit(3);

        // A reader starts counting, then a commit lands before it publishes
        let observed = bv.true_bits.load(Ordering::Acquire);
        let stale = bv.scan_true_bits();
        bv.set_bit(4);
        bv.invalidate_cached_count();

        assert!(!bv.publish_count(observed, stale));
        assert_eq!(bv.count_true_bits(), 2);
    }

    #[test]
    fn test_invalidation_advances_epoch() {
        let bv = sized(64);
        let (before, _) = unpack_count(bv.true_bits.load(Ordering::Acquire));
        bv.count_true_bits();
        bv.invalidate_cached_count();
        bv.invalidate_cached_count();

        let (after, count) = unpack_count(bv.true_bits.load(Ordering::Acquire));
        assert_eq!(after, before.wrapping_add(2));
        assert_eq!(count, INVALID_COUNT);
    }

    #[test]
    fn test_test_bit_beyond_capacity_is_false() {
        let bv = sized(10);
        assert!(!bv.test_bit(10_000));
    }

    #[test]
    fn test_next_true_and_false_bit() {
        let bv = sized(200);
        bv.set_bit(5);
        bv.set_bit(70);
        bv.set_bit(199);

        assert_eq!(bv.next_true_bit(0, 200), Some(5));
        assert_eq!(bv.next_true_bit(6, 200), Some(70));
        assert_eq!(bv.next_true_bit(71, 200), Some(199));
        assert_eq!(bv.next_true_bit(71, 199), None);

        assert_eq!(bv.next_false_bit(5, 200), Some(6));
        assert_eq!(bv.next_false_bit(199, 200), None);
    }

    #[test]
    fn test_packed_bytes_layout() {
        let bv = sized(10);
        bv.set_bit(3);
        bv.set_bit(7);
        bv.set_bit(9);

        let packed = bv.to_packed_bytes(10);
        assert_eq!(packed, vec![0b1000_1000, 0b0000_0010]);
    }

    #[test]
    fn test_packed_bytes_respects_limit() {
        let bv = sized(16);
        bv.set_bit(2);
        bv.set_bit(12);

        // Bits at or beyond the limit are masked off
        assert_eq!(bv.to_packed_bytes(10), vec![0b0000_0100, 0]);
    }

    #[test]
    fn test_from_packed_bytes_ignores_trailing_bits() {
        let bv = BitVector::from_packed_bytes(10, &[0xFF, 0xFF], 10);
        assert_eq!(bv.size(), 10);
        assert_eq!(bv.count_true_bits(), 10);
        assert!(!bv.test_bit(10));
    }

    #[test]
    fn test_truncate_clears_tail() {
        let bv = sized(128);
        bv.set_bit(1);
        bv.set_bit(60);
        bv.set_bit(100);
        bv.truncate(50);

        assert_eq!(bv.size(), 50);
        assert_eq!(bv.count_true_bits(), 1);

        // Regrowing exposes zeroes, not the old bits
        bv.set_size(128);
        assert!(!bv.test_bit(60));
        assert!(!bv.test_bit(100));
    }

    #[test]
    fn test_extend_within_capacity_keeps_buffer() {
        let growable = GrowableBitVector::new(GrowStrategy::new(64, 0.5, 0));
        let before = growable.load();

        assert!(growable.extend(10).is_none());
        assert!(Arc::ptr_eq(&before, &growable.load()));
        assert_eq!(growable.load().size(), 10);
    }

    #[test]
    fn test_extend_past_capacity_reallocates_and_copies() {
        let growable = GrowableBitVector::new(GrowStrategy::new(64, 0.5, 0));
        growable.extend(64);
        growable.load().set_bit(63);

        let retired = growable.extend(65).expect("should reallocate");
        assert_eq!(retired.capacity(), 64);

        let current = growable.load();
        assert_eq!(current.size(), 65);
        assert_eq!(current.capacity(), 128);
        assert!(current.test_bit(63));

        // Old readers still see their vector
        assert!(retired.test_bit(63));
    }

    #[test]
    fn test_reserve_grows_capacity_only() {
        let growable = GrowableBitVector::new(GrowStrategy::new(64, 0.5, 0));
        growable.extend(3);
        assert!(growable.reserve(32).is_none());

        let retired = growable.reserve(1000);
        assert!(retired.is_some());
        assert_eq!(growable.load().size(), 3);
        assert!(growable.load().capacity() >= 1000);
    }
}
