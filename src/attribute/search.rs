//! Boolean term search over the bit column
//!
//! A query term arrives as raw text from the query layer and resolves, once,
//! to a `Predicate`:
//!
//! | term                                  | predicate          |
//! |---------------------------------------|--------------------|
//! | `"1"`, or `"true"` in any letter case  | `MatchSetBits`     |
//! | `"0"`, or `"false"` in any letter case | `MatchClearedBits` |
//! | anything else, or an invalid term     | `Invalid`          |
//!
//! The digit forms are matched exactly. An `Invalid` predicate is not an
//! error: it yields an iterator that matches nothing and zero estimated hits.
//!
//! The column itself is the posting source, so `fetch_postings` does no work
//! and the posting iterator is the filter iterator.

use std::fmt;
use std::sync::Arc;

use super::bitvector::BitVector;
use super::generation::{Generation, GenerationGuard};
use super::single_bool::BoolAttributeReader;
use super::DocId;
use crate::observability::{log_event_with_fields, Event};

/// Raw term text plus the validity flag assigned by the query term parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTermSimple {
    term: String,
    valid: bool,
}

impl QueryTermSimple {
    pub fn new(term: impl Into<String>, valid: bool) -> Self {
        Self {
            term: term.into(),
            valid,
        }
    }

    /// A term the parser accepted
    pub fn from_text(term: impl Into<String>) -> Self {
        Self::new(term, true)
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Resolved boolean-match intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Predicate {
    MatchSetBits,
    MatchClearedBits,
    Invalid,
}

impl Predicate {
    /// Resolve raw term text
    pub fn parse(term: &str) -> Self {
        if term == "1" || term.eq_ignore_ascii_case("true") {
            Predicate::MatchSetBits
        } else if term == "0" || term.eq_ignore_ascii_case("false") {
            Predicate::MatchClearedBits
        } else {
            Predicate::Invalid
        }
    }

    /// Resolve a parsed query term. Terms the parser rejected stay invalid.
    pub fn from_query_term(term: &QueryTermSimple) -> Self {
        if !term.is_valid() {
            return Predicate::Invalid;
        }
        Self::parse(term.term())
    }

    pub fn is_valid(&self) -> bool {
        *self != Predicate::Invalid
    }

    /// Whether matching documents are the cleared bits
    pub fn is_inverted(&self) -> bool {
        *self == Predicate::MatchClearedBits
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Predicate::MatchSetBits => "MATCH_SET_BITS",
            Predicate::MatchClearedBits => "MATCH_CLEARED_BITS",
            Predicate::Invalid => "INVALID",
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-term match data sink. Iterators record the unpacked document here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermFieldMatchData {
    doc_id: Option<DocId>,
    unpack_count: u64,
}

impl TermFieldMatchData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last document unpacked into this sink
    pub fn doc_id(&self) -> Option<DocId> {
        self.doc_id
    }

    /// Number of unpacks recorded
    pub fn unpack_count(&self) -> u64 {
        self.unpack_count
    }

    pub fn reset_on_match(&mut self, doc_id: DocId) {
        self.doc_id = Some(doc_id);
        self.unpack_count += 1;
    }
}

/// Document-at-a-time search iterator consumed by query execution.
///
/// A strict iterator moves forward to the next hit on a failed `seek`; a
/// non-strict one only answers whether the requested document is a hit.
/// `doc_id()` returns the current position, or `end_id()` once exhausted.
pub trait SearchIterator: Send {
    /// Restrict the iterator to `[begin, end)`
    fn init_range(&mut self, begin: DocId, end: DocId);

    /// Whether `doc` is a hit. Strict iterators reposition to the next hit.
    fn seek(&mut self, doc: DocId) -> bool;

    /// Current position
    fn doc_id(&self) -> DocId;

    /// Exclusive end of the current range
    fn end_id(&self) -> DocId;

    /// Record match data for a hit
    fn unpack(&mut self, doc: DocId);

    fn is_strict(&self) -> bool;

    /// Drains every hit in the current range, unpacking each.
    fn hits(&mut self) -> Vec<DocId> {
        let mut out = Vec::new();
        let mut doc = self.doc_id();
        while doc < self.end_id() {
            if self.seek(doc) {
                self.unpack(doc);
                out.push(doc);
                doc += 1;
            } else if self.is_strict() {
                doc = self.doc_id().max(doc + 1);
            } else {
                doc += 1;
            }
        }
        out
    }
}

/// Iterator that never matches.
#[derive(Debug, Clone, Default)]
pub struct EmptySearch {
    end: DocId,
}

impl EmptySearch {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchIterator for EmptySearch {
    fn init_range(&mut self, _begin: DocId, end: DocId) {
        self.end = end;
    }

    fn seek(&mut self, _doc: DocId) -> bool {
        false
    }

    fn doc_id(&self) -> DocId {
        self.end
    }

    fn end_id(&self) -> DocId {
        self.end
    }

    fn unpack(&mut self, _doc: DocId) {}

    fn is_strict(&self) -> bool {
        true
    }
}

/// Scans a bit vector below a fixed document id limit.
pub struct BitVectorIterator<'a> {
    bits: Arc<BitVector>,
    invert: bool,
    strict: bool,
    limit: DocId,
    begin: DocId,
    end: DocId,
    doc_id: DocId,
    match_data: &'a mut TermFieldMatchData,
}

impl<'a> BitVectorIterator<'a> {
    /// Creates an iterator over `[0, doc_id_limit)`.
    ///
    /// The limit is clamped to the vector size so a limit captured before a
    /// shrink never exposes truncated bits as cleared.
    pub fn new(
        bits: Arc<BitVector>,
        doc_id_limit: DocId,
        match_data: &'a mut TermFieldMatchData,
        strict: bool,
        invert: bool,
    ) -> Self {
        let limit = doc_id_limit.min(bits.size());
        let mut iterator = Self {
            bits,
            invert,
            strict,
            limit,
            begin: 0,
            end: limit,
            doc_id: 0,
            match_data,
        };
        iterator.init_range(0, limit);
        iterator
    }

    #[inline]
    fn is_hit(&self, doc: DocId) -> bool {
        self.bits.test_bit(doc) != self.invert
    }

    fn next_hit(&self, from: DocId) -> Option<DocId> {
        if self.invert {
            self.bits.next_false_bit(from, self.end)
        } else {
            self.bits.next_true_bit(from, self.end)
        }
    }
}

impl SearchIterator for BitVectorIterator<'_> {
    fn init_range(&mut self, begin: DocId, end: DocId) {
        self.end = end.min(self.limit);
        self.begin = begin.min(self.end);
        self.doc_id = self.begin;
        if self.strict {
            self.doc_id = self.next_hit(self.begin).unwrap_or(self.end);
        }
    }

    fn seek(&mut self, doc: DocId) -> bool {
        if doc >= self.end {
            self.doc_id = self.end;
            return false;
        }
        if self.strict {
            self.doc_id = self.next_hit(doc).unwrap_or(self.end);
            self.doc_id == doc
        } else if self.is_hit(doc) {
            self.doc_id = doc;
            true
        } else {
            false
        }
    }

    fn doc_id(&self) -> DocId {
        self.doc_id
    }

    fn end_id(&self) -> DocId {
        self.end
    }

    fn unpack(&mut self, doc: DocId) {
        self.match_data.reset_on_match(doc);
    }

    fn is_strict(&self) -> bool {
        self.strict
    }
}

/// Builds the scan iterator for a bit column.
pub trait IteratorFactory: Send + Sync {
    fn create<'a>(
        &self,
        bits: Arc<BitVector>,
        doc_id_limit: DocId,
        match_data: &'a mut TermFieldMatchData,
        strict: bool,
        invert: bool,
    ) -> Box<dyn SearchIterator + 'a>;
}

/// Default factory producing `BitVectorIterator`s.
#[derive(Debug, Clone, Copy, Default)]
pub struct BitVectorIteratorFactory;

impl IteratorFactory for BitVectorIteratorFactory {
    fn create<'a>(
        &self,
        bits: Arc<BitVector>,
        doc_id_limit: DocId,
        match_data: &'a mut TermFieldMatchData,
        strict: bool,
        invert: bool,
    ) -> Box<dyn SearchIterator + 'a> {
        Box::new(BitVectorIterator::new(
            bits,
            doc_id_limit,
            match_data,
            strict,
            invert,
        ))
    }
}

/// Per-query search state. Immutable after construction; pins the reader
/// generation current at construction until dropped.
pub struct BoolSearchContext {
    predicate: Predicate,
    reader: BoolAttributeReader,
    guard: GenerationGuard,
}

impl BoolSearchContext {
    pub fn new(term: &QueryTermSimple, reader: BoolAttributeReader) -> Self {
        let predicate = Predicate::from_query_term(term);
        if !predicate.is_valid() {
            log_event_with_fields(
                Event::InvalidSearchTerm,
                &[("attribute", reader.name()), ("term", term.term())],
            );
        }
        let guard = reader.take_guard();
        reader.metrics().increment_searches_created();

        Self {
            predicate,
            reader,
            guard,
        }
    }

    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    pub fn is_valid(&self) -> bool {
        self.predicate.is_valid()
    }

    /// Generation pinned by this context
    pub fn generation(&self) -> Generation {
        self.guard.generation()
    }

    /// Postings are the column itself; nothing to prefetch.
    pub fn fetch_postings(&mut self, _strict: bool) {}

    /// Iterator over documents matching the predicate.
    ///
    /// The committed doc id limit is read once here and bounds the scan.
    pub fn create_filter_iterator<'a>(
        &self,
        match_data: &'a mut TermFieldMatchData,
        strict: bool,
    ) -> Box<dyn SearchIterator + 'a> {
        if !self.is_valid() {
            return Box::new(EmptySearch::new());
        }
        // Limit first: the vector loaded afterwards holds every bit the
        // limit covers.
        let limit = self.reader.committed_doc_id_limit();
        let bits = self.reader.bit_vector();
        self.reader.iterator_factory().create(
            bits,
            limit,
            match_data,
            strict,
            self.predicate.is_inverted(),
        )
    }

    pub fn create_posting_iterator<'a>(
        &self,
        match_data: &'a mut TermFieldMatchData,
        strict: bool,
    ) -> Box<dyn SearchIterator + 'a> {
        self.create_filter_iterator(match_data, strict)
    }

    /// Planner estimate of the hit count. Cheap; may lag recent commits.
    pub fn approximate_hits(&self) -> u32 {
        let bits = self.reader.bit_vector();
        match self.predicate {
            Predicate::Invalid => 0,
            Predicate::MatchSetBits => bits.count_true_bits(),
            Predicate::MatchClearedBits => bits.size().saturating_sub(bits.count_true_bits()),
        }
    }
}

impl fmt::Debug for BoolSearchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoolSearchContext")
            .field("attribute", &self.reader.name())
            .field("predicate", &self.predicate)
            .field("generation", &self.guard.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector_with(size: u32, set: &[u32]) -> Arc<BitVector> {
        let bv = BitVector::new(size, size);
        for &doc in set {
            bv.set_bit(doc);
        }
        Arc::new(bv)
    }

    // === Predicate Tests ===

    #[test]
    fn test_term_matrix() {
        assert_eq!(Predicate::parse("true"), Predicate::MatchSetBits);
        assert_eq!(Predicate::parse("True"), Predicate::MatchSetBits);
        assert_eq!(Predicate::parse("TRUE"), Predicate::MatchSetBits);
        assert_eq!(Predicate::parse("1"), Predicate::MatchSetBits);

        assert_eq!(Predicate::parse("false"), Predicate::MatchClearedBits);
        assert_eq!(Predicate::parse("FALSE"), Predicate::MatchClearedBits);
        assert_eq!(Predicate::parse("fAlSe"), Predicate::MatchClearedBits);
        assert_eq!(Predicate::parse("0"), Predicate::MatchClearedBits);

        assert_eq!(Predicate::parse("banana"), Predicate::Invalid);
        assert_eq!(Predicate::parse(""), Predicate::Invalid);
        assert_eq!(Predicate::parse("2"), Predicate::Invalid);
        assert_eq!(Predicate::parse(" 1"), Predicate::Invalid);
        assert_eq!(Predicate::parse("01"), Predicate::Invalid);
        assert_eq!(Predicate::parse("truee"), Predicate::Invalid);
    }

    #[test]
    fn test_parser_rejected_term_is_invalid() {
        let term = QueryTermSimple::new("true", false);
        assert_eq!(Predicate::from_query_term(&term), Predicate::Invalid);
    }

    #[test]
    fn test_inversion_flag() {
        assert!(!Predicate::MatchSetBits.is_inverted());
        assert!(Predicate::MatchClearedBits.is_inverted());
        assert!(!Predicate::Invalid.is_inverted());
    }

    // === Iterator Tests ===

    #[test]
    fn test_strict_iterator_yields_set_bits() {
        let bits = vector_with(100, &[3, 7, 64, 99]);
        let mut md = TermFieldMatchData::new();
        let mut it = BitVectorIterator::new(bits, 100, &mut md, true, false);

        assert_eq!(it.doc_id(), 3);
        assert_eq!(it.hits(), vec![3, 7, 64, 99]);
        drop(it);
        assert_eq!(md.doc_id(), Some(99));
        assert_eq!(md.unpack_count(), 4);
    }

    #[test]
    fn test_inverted_iterator_yields_cleared_bits() {
        let bits = vector_with(6, &[0, 2, 3]);
        let mut md = TermFieldMatchData::new();
        let mut it = BitVectorIterator::new(bits, 6, &mut md, true, true);
        assert_eq!(it.hits(), vec![1, 4, 5]);
    }

    #[test]
    fn test_non_strict_seek_does_not_advance() {
        let bits = vector_with(10, &[5]);
        let mut md = TermFieldMatchData::new();
        let mut it = BitVectorIterator::new(bits, 10, &mut md, false, false);

        assert!(!it.seek(2));
        assert_eq!(it.doc_id(), 0);
        assert!(it.seek(5));
        assert_eq!(it.doc_id(), 5);
    }

    #[test]
    fn test_strict_seek_positions_on_next_hit() {
        let bits = vector_with(10, &[5, 8]);
        let mut md = TermFieldMatchData::new();
        let mut it = BitVectorIterator::new(bits, 10, &mut md, true, false);

        assert!(!it.seek(6));
        assert_eq!(it.doc_id(), 8);
        assert!(!it.seek(9));
        assert_eq!(it.doc_id(), it.end_id());
    }

    #[test]
    fn test_limit_hides_uncommitted_docs() {
        let bits = vector_with(10, &[2, 8]);
        let mut md = TermFieldMatchData::new();
        let mut it = BitVectorIterator::new(Arc::clone(&bits), 5, &mut md, true, false);
        assert_eq!(it.hits(), vec![2]);

        let mut md = TermFieldMatchData::new();
        let mut inverted = BitVectorIterator::new(bits, 5, &mut md, true, true);
        assert_eq!(inverted.hits(), vec![0, 1, 3, 4]);
    }

    #[test]
    fn test_limit_clamped_to_vector_size() {
        let bits = vector_with(4, &[]);
        let mut md = TermFieldMatchData::new();
        let mut it = BitVectorIterator::new(bits, 100, &mut md, true, true);
        assert_eq!(it.hits(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_init_range_restricts_scan() {
        let bits = vector_with(20, &[1, 5, 10, 15]);
        let mut md = TermFieldMatchData::new();
        let mut it = BitVectorIterator::new(bits, 20, &mut md, true, false);
        it.init_range(4, 12);
        assert_eq!(it.hits(), vec![5, 10]);
    }

    #[test]
    fn test_empty_search_matches_nothing() {
        let mut empty = EmptySearch::new();
        empty.init_range(0, 100);
        assert!(!empty.seek(0));
        assert!(empty.hits().is_empty());
    }

    #[test]
    fn test_factory_passes_inversion() {
        let bits = vector_with(3, &[1]);
        let mut md = TermFieldMatchData::new();
        let mut it = BitVectorIteratorFactory.create(bits, 3, &mut md, true, true);
        assert_eq!(it.hits(), vec![0, 2]);
    }
}
