//! Corpus statistics feeding the weighting schemes.
//!
//! A scheme declares the statistics it needs with [`StatFlags`]; the search
//! layer gathers exactly those from the shards and hands the scheme a
//! [`WeightContext`] before the first score request. Statistics the scheme
//! did not ask for read as 0.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};

/// Bitmask of statistics a weighting scheme requires at `init` time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatFlags(u32);

impl StatFlags {
    pub const COLLECTION_SIZE: StatFlags = StatFlags(1);
    pub const AVERAGE_LENGTH: StatFlags = StatFlags(1 << 1);
    pub const TOTAL_LENGTH: StatFlags = StatFlags(1 << 2);
    pub const DOC_LENGTH: StatFlags = StatFlags(1 << 3);
    pub const DOC_LENGTH_MIN: StatFlags = StatFlags(1 << 4);
    pub const DOC_LENGTH_MAX: StatFlags = StatFlags(1 << 5);
    pub const TERM_FREQ: StatFlags = StatFlags(1 << 6);
    pub const COLLECTION_FREQ: StatFlags = StatFlags(1 << 7);
    pub const REL_FREQ: StatFlags = StatFlags(1 << 8);
    pub const WDF: StatFlags = StatFlags(1 << 9);
    pub const WDF_MAX: StatFlags = StatFlags(1 << 10);
    pub const WQF: StatFlags = StatFlags(1 << 11);
    pub const UNIQUE_TERMS: StatFlags = StatFlags(1 << 12);
    pub const QUERY_LENGTH: StatFlags = StatFlags(1 << 13);

    pub const fn empty() -> StatFlags {
        StatFlags(0)
    }

    pub const fn contains(self, other: StatFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: StatFlags) -> StatFlags {
        StatFlags(self.0 | other.0)
    }
}

impl BitOr for StatFlags {
    type Output = StatFlags;

    fn bitor(self, rhs: StatFlags) -> StatFlags {
        self.union(rhs)
    }
}

/// Frequencies of one term (or composed subquery) over the corpus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermFreqs {
    /// Number of documents the term occurs in.
    pub termfreq: u32,
    /// Number of relevant documents the term occurs in.
    pub reltermfreq: u32,
    /// Total occurrences of the term across the collection.
    pub collfreq: u64,
}

impl TermFreqs {
    pub fn new(termfreq: u32, reltermfreq: u32, collfreq: u64) -> Self {
        Self {
            termfreq,
            reltermfreq,
            collfreq,
        }
    }

    /// Accumulate frequencies from another shard.
    pub fn merge(&mut self, other: &TermFreqs) {
        self.termfreq += other.termfreq;
        self.reltermfreq += other.reltermfreq;
        self.collfreq += other.collfreq;
    }
}

/// Corpus-wide statistics, possibly merged over several shards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Number of documents.
    pub collection_size: u32,
    /// Sum of document lengths.
    pub total_length: u64,
    /// Smallest document length.
    pub doclength_lower_bound: u32,
    /// Largest document length.
    pub doclength_upper_bound: u32,
    /// Largest wdf of any posting in the collection.
    pub wdf_upper_bound: u32,
    /// Smallest unique-term count of any document.
    pub unique_terms_lower_bound: u32,
    /// Largest unique-term count of any document.
    pub unique_terms_upper_bound: u32,
    /// Size of the relevance set.
    pub rset_size: u32,
    /// Number of term instances in the query (sum of wqf).
    pub query_length: u32,
}

impl CollectionStats {
    pub fn average_length(&self) -> f64 {
        if self.collection_size == 0 {
            0.0
        } else {
            self.total_length as f64 / self.collection_size as f64
        }
    }

    /// Merge statistics from another shard: sizes and frequencies sum,
    /// bounds widen.
    pub fn merge(&mut self, other: &CollectionStats) {
        if other.collection_size == 0 {
            return;
        }
        if self.collection_size == 0 {
            let (rset, qlen) = (self.rset_size, self.query_length);
            *self = *other;
            self.rset_size += rset;
            self.query_length = qlen.max(other.query_length);
            return;
        }
        self.collection_size += other.collection_size;
        self.total_length += other.total_length;
        self.doclength_lower_bound = self.doclength_lower_bound.min(other.doclength_lower_bound);
        self.doclength_upper_bound = self.doclength_upper_bound.max(other.doclength_upper_bound);
        self.wdf_upper_bound = self.wdf_upper_bound.max(other.wdf_upper_bound);
        self.unique_terms_lower_bound = self
            .unique_terms_lower_bound
            .min(other.unique_terms_lower_bound);
        self.unique_terms_upper_bound = self
            .unique_terms_upper_bound
            .max(other.unique_terms_upper_bound);
        self.rset_size += other.rset_size;
        self.query_length = self.query_length.max(other.query_length);
    }
}

/// Everything a scheme may consult in `init`: corpus statistics plus the
/// per-term frequencies, wqf and wdf bound for the term it scores.
#[derive(Debug, Clone, Default)]
pub struct WeightContext {
    pub stats: CollectionStats,
    pub freqs: TermFreqs,
    /// Within-query frequency of the term.
    pub wqf: u32,
    /// Upper bound on the wdf of any posting of this term.
    pub wdf_upper_bound: u32,
}

impl WeightContext {
    /// Zero out any statistic the scheme did not declare in `needs()`.
    ///
    /// Consulting an undeclared statistic is contractually
    /// undefined-but-safe: it reads as 0.
    pub fn restricted_to(&self, needs: StatFlags) -> WeightContext {
        let mut ctx = self.clone();
        if !needs.contains(StatFlags::COLLECTION_SIZE) {
            ctx.stats.collection_size = 0;
        }
        if !needs.contains(StatFlags::AVERAGE_LENGTH)
            && !needs.contains(StatFlags::TOTAL_LENGTH)
        {
            ctx.stats.total_length = 0;
        }
        if !needs.contains(StatFlags::DOC_LENGTH_MIN) {
            ctx.stats.doclength_lower_bound = 0;
        }
        if !needs.contains(StatFlags::DOC_LENGTH_MAX) {
            ctx.stats.doclength_upper_bound = 0;
        }
        if !needs.contains(StatFlags::WDF_MAX) {
            ctx.stats.wdf_upper_bound = 0;
            ctx.wdf_upper_bound = 0;
        }
        if !needs.contains(StatFlags::UNIQUE_TERMS) {
            ctx.stats.unique_terms_lower_bound = 0;
            ctx.stats.unique_terms_upper_bound = 0;
        }
        if !needs.contains(StatFlags::QUERY_LENGTH) {
            ctx.stats.query_length = 0;
        }
        if !needs.contains(StatFlags::TERM_FREQ) {
            ctx.freqs.termfreq = 0;
        }
        if !needs.contains(StatFlags::COLLECTION_FREQ) {
            ctx.freqs.collfreq = 0;
        }
        if !needs.contains(StatFlags::REL_FREQ) {
            ctx.freqs.reltermfreq = 0;
            ctx.stats.rset_size = 0;
        }
        if !needs.contains(StatFlags::WQF) {
            ctx.wqf = 0;
        }
        ctx
    }
}
