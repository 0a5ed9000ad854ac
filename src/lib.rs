//! aerodb-attribute - boolean attribute storage for the AeroDB search layer
//!
//! A single-value boolean column with one writer and lock-free readers,
//! generation-based reclamation of retired storage, a compact binary
//! persistence format, and a term search surface for query execution.

pub mod attribute;
pub mod cli;
pub mod observability;
