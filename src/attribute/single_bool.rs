//! Single-value boolean attribute
//!
//! `SingleBoolAttribute` is the writer. Every mutating operation takes
//! `&mut self`, so at most one thread drives document adds, commits and
//! shrinks. Readers use `BoolAttributeReader`, a cloneable handle that
//! never blocks.
//!
//! Doc id space:
//!
//! ```text
//! committed_doc_id_limit <= uncommitted_doc_id_limit <= num_docs
//! ```
//!
//! Publication: bit writes are per-word atomic with `Release`; the committed
//! limit is then stored with `Release`. Readers load the limit with `Acquire`
//! before touching bits below it, so every bit a commit wrote is visible to
//! a reader that observes the new limit.
//!
//! Reclamation: a reallocating grow swaps in a new vector and retires the
//! old one into the writer's `GenerationHolder` at the current generation.
//! The generation then advances; the retired vector is released once no
//! guard pins a generation at or below its tag.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::bitvector::{BitVector, GrowableBitVector};
use super::changes::{ArithmeticOp, Change, ChangeVector};
use super::config::AttributeConfig;
use super::errors::AttributeResult;
use super::generation::{Generation, GenerationGuard, GenerationHandler, GenerationHolder};
use super::search::{BitVectorIteratorFactory, BoolSearchContext, IteratorFactory, QueryTermSimple};
use super::DocId;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// State shared between the writer and its readers
pub(crate) struct AttributeShared {
    name: String,
    bits: GrowableBitVector,
    committed_doc_id_limit: AtomicU32,
    generation_handler: Arc<GenerationHandler>,
    metrics: Arc<MetricsRegistry>,
    iterator_factory: Arc<dyn IteratorFactory>,
}

/// Memory and progress summary returned by `update_stat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeStatus {
    pub num_docs: u32,
    pub committed_doc_id_limit: u32,
    pub set_bits: u32,
    pub allocated_bytes: usize,
    pub used_bytes: usize,
    pub on_hold_bytes: usize,
    pub pending_changes: usize,
    pub generation: Generation,
}

/// Writer for a single-value boolean column.
pub struct SingleBoolAttribute {
    config: AttributeConfig,
    shared: Arc<AttributeShared>,
    num_docs: u32,
    uncommitted_doc_id_limit: u32,
    holder: GenerationHolder,
    changes: ChangeVector,
}

impl SingleBoolAttribute {
    /// Create an empty attribute with its own generation handler and metrics.
    pub fn new(config: AttributeConfig) -> AttributeResult<Self> {
        Self::with_components(
            config,
            Arc::new(GenerationHandler::new()),
            Arc::new(MetricsRegistry::new()),
            Arc::new(BitVectorIteratorFactory),
        )
    }

    /// Create an empty attribute wired to externally owned collaborators.
    pub fn with_components(
        config: AttributeConfig,
        generation_handler: Arc<GenerationHandler>,
        metrics: Arc<MetricsRegistry>,
        iterator_factory: Arc<dyn IteratorFactory>,
    ) -> AttributeResult<Self> {
        config.validate()?;

        let shared = Arc::new(AttributeShared {
            name: config.name.clone(),
            bits: GrowableBitVector::new(config.grow_strategy.clone()),
            committed_doc_id_limit: AtomicU32::new(0),
            generation_handler: Arc::clone(&generation_handler),
            metrics,
            iterator_factory,
        });
        let holder = GenerationHolder::new(generation_handler);

        log_event_with_fields(
            Event::AttributeCreated,
            &[
                ("attribute", &config.name),
                ("initial_docs", &config.grow_strategy.initial_docs.to_string()),
            ],
        );

        Ok(Self {
            config,
            shared,
            num_docs: 0,
            uncommitted_doc_id_limit: 0,
            holder,
            changes: ChangeVector::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AttributeConfig {
        &self.config
    }

    /// Read handle for query threads
    pub fn reader(&self) -> BoolAttributeReader {
        BoolAttributeReader {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn generation_handler(&self) -> &Arc<GenerationHandler> {
        &self.shared.generation_handler
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.shared.metrics
    }

    pub fn current_generation(&self) -> Generation {
        self.holder.current_generation()
    }

    /// Allocated document slots
    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }

    /// Logical size of the bit storage
    pub fn size_in_docs(&self) -> u32 {
        self.shared.bits.peek().size()
    }

    pub fn committed_doc_id_limit(&self) -> u32 {
        self.shared.committed_doc_id_limit.load(Ordering::Acquire)
    }

    pub fn uncommitted_doc_id_limit(&self) -> u32 {
        self.uncommitted_doc_id_limit
    }

    /// Changes queued since the last commit
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    pub fn count_set_bits(&self) -> u32 {
        self.shared.bits.peek().count_true_bits()
    }

    /// Reserve the next doc id. Its value starts out false.
    pub fn add_doc(&mut self) -> DocId {
        let doc = self.num_docs;
        assert!(doc < u32::MAX, "doc id space exhausted");

        let retired = self.shared.bits.extend(doc + 1);
        self.num_docs += 1;
        self.uncommitted_doc_id_limit = self.num_docs;
        self.shared.metrics.increment_docs_added();

        match retired {
            Some(old) => {
                self.retire_buffer(old);
                self.inc_generation();
            }
            None => {
                self.remove_old_generations();
            }
        }
        doc
    }

    /// Add docs until `num_docs() == wanted_limit`, reserving capacity once.
    ///
    /// Returns the last doc id added, if any.
    pub fn add_docs(&mut self, wanted_limit: u32) -> Option<DocId> {
        if wanted_limit <= self.num_docs {
            return None;
        }
        if let Some(old) = self.shared.bits.reserve(wanted_limit) {
            self.retire_buffer(old);
            self.inc_generation();
        }
        let mut last = None;
        while self.num_docs < wanted_limit {
            last = Some(self.add_doc());
        }
        last
    }

    /// Queue an overwrite of `doc`
    pub fn update(&mut self, doc: DocId, value: bool) {
        self.check_doc(doc);
        self.changes.push(Change::set_value(doc, value));
    }

    /// Queue an arithmetic update of `doc`
    pub fn apply_arithmetic(&mut self, doc: DocId, op: ArithmeticOp, operand: i64) {
        self.check_doc(doc);
        self.changes.push(Change::arithmetic(doc, op, operand));
    }

    /// Queue a reset of `doc` to false
    pub fn clear_doc(&mut self, doc: DocId) {
        self.check_doc(doc);
        self.changes.push(Change::clear_doc(doc));
    }

    /// Current bit of `doc` as the writer sees it, regardless of the
    /// committed limit.
    pub fn get(&self, doc: DocId) -> bool {
        self.check_doc(doc);
        self.shared.bits.peek().test_bit(doc)
    }

    /// Write `doc` immediately, bypassing the change queue.
    ///
    /// Readers see the write once the doc is below a committed limit they
    /// have loaded.
    pub fn set(&mut self, doc: DocId, value: bool) {
        self.check_doc(doc);
        let bits = self.shared.bits.peek();
        if value {
            bits.set_bit(doc);
        } else {
            bits.clear_bit(doc);
        }
        bits.invalidate_cached_count();
    }

    /// Queue a clear of every set doc in `[low, high)`.
    ///
    /// Docs already false are left alone. Takes effect at the next commit.
    pub fn clear_docs(&mut self, low: DocId, high: DocId) {
        assert!(
            low <= high && high <= self.num_docs,
            "clear_docs([{}, {})) outside doc id space of {}",
            low,
            high,
            self.num_docs
        );

        let bits = self.shared.bits.peek();
        let mut from = low;
        while let Some(doc) = bits.next_true_bit(from, high) {
            self.changes.push(Change::clear_doc(doc));
            from = doc + 1;
        }
    }

    /// Apply pending changes in order and publish the uncommitted limit.
    pub fn commit(&mut self) {
        let applied = self.apply_changes();
        self.shared
            .committed_doc_id_limit
            .store(self.uncommitted_doc_id_limit, Ordering::Release);
        let generation = self.inc_generation();

        self.shared.metrics.increment_commits();
        self.shared.metrics.add_changes_applied(applied as u64);
        log_event_with_fields(
            Event::Commit,
            &[
                ("attribute", &self.config.name),
                ("changes", &applied.to_string()),
                (
                    "committed_doc_id_limit",
                    &self.uncommitted_doc_id_limit.to_string(),
                ),
                ("generation", &generation.to_string()),
            ],
        );
    }

    fn apply_changes(&mut self) -> usize {
        let bits = self.shared.bits.peek();
        for change in self.changes.iter() {
            let value = change.resolve(bits.test_bit(change.doc));
            if value {
                bits.set_bit(change.doc);
            } else {
                bits.clear_bit(change.doc);
            }
        }
        bits.invalidate_cached_count();

        let applied = self.changes.len();
        self.changes.clear();
        applied
    }

    /// Lower the committed and uncommitted limits to `wanted_limit`, clearing
    /// every doc at or above it. Storage is kept until `shrink_lid_space`.
    pub fn compact_lid_space(&mut self, wanted_limit: u32) {
        self.commit();
        let committed = self.committed_doc_id_limit();
        assert!(
            wanted_limit <= committed,
            "compact_lid_space({}) above committed doc id limit {}",
            wanted_limit,
            committed
        );

        if wanted_limit < committed {
            self.clear_docs(wanted_limit, self.num_docs);
            self.commit();
        }
        self.uncommitted_doc_id_limit = wanted_limit;
        self.shared
            .committed_doc_id_limit
            .store(wanted_limit, Ordering::Release);
        self.inc_generation();

        log_event_with_fields(
            Event::LidSpaceCompacted,
            &[
                ("attribute", &self.config.name),
                ("committed_doc_id_limit", &wanted_limit.to_string()),
                ("num_docs", &self.num_docs.to_string()),
            ],
        );
    }

    /// Whether `shrink_lid_space` may be called
    pub fn can_shrink_lid_space(&self) -> bool {
        self.committed_doc_id_limit() < self.num_docs
    }

    /// Truncate storage to the committed limit.
    ///
    /// # Panics
    ///
    /// When the committed limit is not below `num_docs()`.
    pub fn shrink_lid_space(&mut self) {
        let committed = self.committed_doc_id_limit();
        assert!(
            committed < self.num_docs,
            "shrink_lid_space: committed doc id limit {} is not below num docs {}",
            committed,
            self.num_docs
        );

        let previous = self.num_docs;
        self.changes.retain(|change| change.doc < committed);
        self.shared.bits.shrink(committed);
        self.num_docs = committed;
        self.uncommitted_doc_id_limit = committed;

        log_event_with_fields(
            Event::LidSpaceShrunk,
            &[
                ("attribute", &self.config.name),
                ("from", &previous.to_string()),
                ("to", &committed.to_string()),
            ],
        );
    }

    /// Compact to `new_limit`, then shrink storage to it.
    ///
    /// # Panics
    ///
    /// When `new_limit` is above the committed limit, or when nothing is
    /// left to shrink.
    pub fn shrink_to(&mut self, new_limit: u32) {
        self.compact_lid_space(new_limit);
        self.shrink_lid_space();
    }

    /// Reclaim what can be reclaimed and report memory usage.
    pub fn update_stat(&mut self) -> AttributeStatus {
        self.remove_old_generations();

        let bits = self.shared.bits.peek();
        AttributeStatus {
            num_docs: self.num_docs,
            committed_doc_id_limit: self.committed_doc_id_limit(),
            set_bits: bits.count_true_bits(),
            allocated_bytes: bits.allocated_bytes() + self.changes.allocated_bytes(),
            used_bytes: bits.size_bytes(),
            on_hold_bytes: self.holder.held_bytes(),
            pending_changes: self.changes.len(),
            generation: self.holder.current_generation(),
        }
    }

    /// Bytes retired but not yet reclaimed
    pub fn held_bytes(&self) -> usize {
        self.holder.held_bytes()
    }

    /// Retired buffers not yet reclaimed
    pub fn held_buffers(&self) -> usize {
        self.holder.held_count()
    }

    /// Release retired buffers no reader can reach. Returns how many.
    pub fn remove_old_generations(&mut self) -> usize {
        let released = self
            .holder
            .remove_old_generations(&*self.shared.generation_handler);
        if released > 0 {
            self.shared.metrics.add_buffers_reclaimed(released as u64);
            log_event_with_fields(
                Event::BuffersReclaimed,
                &[
                    ("attribute", &self.config.name),
                    ("released", &released.to_string()),
                    ("on_hold_bytes", &self.holder.held_bytes().to_string()),
                ],
            );
        }
        released
    }

    /// Snapshot of the current storage
    pub(crate) fn bit_vector(&self) -> Arc<BitVector> {
        self.shared.bits.load()
    }

    /// Replace all contents with `bits`, committed up to `doc_count`.
    pub(crate) fn install_loaded(&mut self, doc_count: u32, bits: BitVector) {
        let old = self.shared.bits.replace(bits);
        self.holder.retire(Box::new(old));
        self.shared.metrics.increment_buffers_retired();

        self.changes.clear();
        self.num_docs = doc_count;
        self.uncommitted_doc_id_limit = doc_count;
        self.shared
            .committed_doc_id_limit
            .store(doc_count, Ordering::Release);
        self.inc_generation();
    }

    fn retire_buffer(&mut self, old: Arc<BitVector>) {
        let retired_bytes = old.allocated_bytes();
        self.holder.retire(Box::new(old));
        self.shared.metrics.increment_buffers_retired();

        log_event_with_fields(
            Event::StorageGrown,
            &[
                ("attribute", &self.config.name),
                ("capacity", &self.shared.bits.peek().capacity().to_string()),
                ("retired_bytes", &retired_bytes.to_string()),
            ],
        );
    }

    fn inc_generation(&mut self) -> Generation {
        let generation = self.holder.advance_generation();
        self.remove_old_generations();
        generation
    }

    #[inline]
    fn check_doc(&self, doc: DocId) {
        assert!(
            doc < self.num_docs,
            "doc id {} outside doc id space of {}",
            doc,
            self.num_docs
        );
    }
}

impl Drop for SingleBoolAttribute {
    fn drop(&mut self) {
        // Readers own their vectors; nothing on hold is reachable through us.
        self.holder.clear();
        log_event_with_fields(
            Event::AttributeDestroyed,
            &[("attribute", &self.config.name)],
        );
    }
}

impl fmt::Debug for SingleBoolAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleBoolAttribute")
            .field("name", &self.config.name)
            .field("num_docs", &self.num_docs)
            .field("committed_doc_id_limit", &self.committed_doc_id_limit())
            .field("uncommitted_doc_id_limit", &self.uncommitted_doc_id_limit)
            .field("pending_changes", &self.changes.len())
            .field("holder", &self.holder)
            .finish()
    }
}

/// Lock-free read handle onto a boolean attribute.
#[derive(Clone)]
pub struct BoolAttributeReader {
    shared: Arc<AttributeShared>,
}

impl BoolAttributeReader {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Committed value of `doc`. Docs at or above the committed limit read
    /// as false.
    pub fn get(&self, doc: DocId) -> bool {
        if doc >= self.committed_doc_id_limit() {
            return false;
        }
        self.shared.bits.peek().test_bit(doc)
    }

    pub fn committed_doc_id_limit(&self) -> u32 {
        self.shared.committed_doc_id_limit.load(Ordering::Acquire)
    }

    /// Current storage. Load the committed limit first when both are needed.
    pub fn bit_vector(&self) -> Arc<BitVector> {
        self.shared.bits.load()
    }

    /// Cached set-bit count; may lag the latest commit
    pub fn count_set_bits(&self) -> u32 {
        self.shared.bits.peek().count_true_bits()
    }

    /// Pin the current generation
    pub fn take_guard(&self) -> GenerationGuard {
        self.shared.generation_handler.take_guard()
    }

    pub fn create_search_context(&self, term: &QueryTermSimple) -> BoolSearchContext {
        BoolSearchContext::new(term, self.clone())
    }

    pub(crate) fn metrics(&self) -> &MetricsRegistry {
        &self.shared.metrics
    }

    pub(crate) fn iterator_factory(&self) -> &dyn IteratorFactory {
        self.shared.iterator_factory.as_ref()
    }
}

impl fmt::Debug for BoolAttributeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoolAttributeReader")
            .field("name", &self.shared.name)
            .field("committed_doc_id_limit", &self.committed_doc_id_limit())
            .finish()
    }
}
