//! Boolean attribute storage
//!
//! A single-value boolean column: one bit per document id, written by one
//! writer and read concurrently by any number of query threads.
//!
//! # Parts
//!
//! - `bitvector`: packed bit storage with per-word atomic access
//! - `generation`: generation counter, reader guards and the hold list that
//!   defers freeing of retired storage
//! - `changes`: pending per-document mutations applied at commit
//! - `single_bool`: the column itself (`SingleBoolAttribute` writer and
//!   `BoolAttributeReader` handle)
//! - `search`: term predicate, search context and iterators
//! - `persistence`: binary save/load
//!
//! # Read path
//!
//! Readers never lock. They load the committed doc id limit (`Acquire`),
//! then the current storage, and only look at bits below the limit. A search
//! context pins the generation it was created at, which keeps storage
//! retired after that point on the writer's hold list until the context is
//! dropped.
//!
//! # Failure policy
//!
//! Recoverable failures (I/O, configuration) are `AttributeError`s. A
//! persisted payload that disagrees with its header is a FATAL corruption
//! error. Writer contract violations panic.

mod bitvector;
mod changes;
mod config;
mod errors;
mod generation;
mod persistence;
mod search;
mod single_bool;

/// Dense document id
pub type DocId = u32;

pub use bitvector::BitVector;
pub use changes::{ArithmeticOp, Change, ChangeKind, ChangeVector};
pub use config::{round_up_to_word, AttributeConfig, GrowStrategy, WORD_BITS};
pub use errors::{AttributeError, AttributeErrorCode, AttributeResult, Severity};
pub use generation::{
    Generation, GenerationGuard, GenerationHandler, GenerationHeld, GenerationHolder,
    GenerationTracker,
};
pub use persistence::{
    dat_path, estimated_save_byte_size, FileSaveTarget, MemorySaveTarget, SaveTarget, DAT_SUFFIX,
    HEADER_RESERVE_BYTES,
};
pub use search::{
    BitVectorIterator, BitVectorIteratorFactory, BoolSearchContext, EmptySearch,
    IteratorFactory, Predicate, QueryTermSimple, SearchIterator, TermFieldMatchData,
};
pub use single_bool::{AttributeStatus, BoolAttributeReader, SingleBoolAttribute};
