//! Quarry - a probabilistic full-text retrieval core
//!
//! The engine behind a ranked boolean search library:
//! - Posting-list iterator algebra: N-way AND / OR / AND_NOT / phrase / near
//!   combinators with composed maxweight bounds
//! - Weighted top-k matcher driven by the heap floor, pruning via
//!   recalculated upper bounds
//! - Pluggable weighting schemes (BM25, DFR and language-model families)
//!   declaring their statistics needs, with sound score upper bounds
//! - Prefix-compressed ordered key/value tables with three seek-index layouts
//! - Writable database layer with session/transaction contract
//! - Registry for user-extensible schemes, sources, spies, metrics and
//!   key makers

pub mod db;
pub mod document;
pub mod error;
pub mod matcher;
pub mod postlist;
pub mod query;
pub mod registry;
pub mod stats;
pub mod table;
pub mod tokenizer;
pub mod weight;

#[cfg(test)]
mod tests;

// Re-exports from db
pub use db::{Database, Shard, WritableDatabase};

// Re-exports from document
pub use document::{Document, TermEntry};

// Re-exports from error
pub use error::{Error, Result};

// Re-exports from matcher
pub use matcher::{CancelToken, Hit, MatchSpy, Matcher, ValueCountSpy};

// Re-exports from postlist
pub use postlist::{
    AndNotPostList, FixedWeightSource, MultiAndPostList, MultiOrPostList, NearPostList,
    PhrasePostList, PostList, PostingSource, TermPostList,
};

// Re-exports from query
pub use query::{Query, Searcher};

// Re-exports from registry
pub use registry::{
    GreatCircleMetric, KeyMaker, LatLongCoord, LatLongMetric, MultiValueKeyMaker, Registry,
};

// Re-exports from stats
pub use stats::{CollectionStats, StatFlags, TermFreqs, WeightContext};

// Re-exports from table
pub use table::{TableCursor, TableIndexKind, TableWriter};

// Re-exports from tokenizer
pub use tokenizer::{
    Language, LowercaseTokenizer, SimpleTokenizer, StemmerTokenizer, Token, Tokenizer,
    TokenizerRegistry, index_text,
};

// Re-exports from weight
pub use weight::{
    BB2Weight, Bm25PlusWeight, Bm25Weight, BoolWeight, CoordWeight, DLHWeight, DPHWeight,
    IfB2Weight, IneB2Weight, InL2Weight, LM2StageWeight, LMAbsDiscountWeight, LMDirichletWeight,
    LMJMWeight, PL2PlusWeight, PL2Weight, TfIdfWeight, Weight,
};

/// Shard-local document id. 0 is reserved for "no document / at end".
pub type DocId = u32;
/// A term occurrence count (wdf, doclen, positions).
pub type TermCount = u32;
/// A document weight. Schemes compute in double precision.
pub type Score = f64;
