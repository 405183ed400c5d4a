//! Query trees and the multi-shard searcher.
//!
//! A [`Query`] is the caller-facing tree; the searcher gathers the corpus
//! statistics the scheme asked for, clones and initialises the scheme per
//! query term, compiles the tree into a postlist tree per shard, runs one
//! matcher per shard and merges the results.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;

use crate::db::{Database, Shard};
use crate::error::Result;
use crate::matcher::{CancelToken, Hit, Matcher};
use crate::postlist::{
    AndNotPostList, EmptyPostList, MultiAndPostList, MultiOrPostList, NearPostList,
    PhrasePostList, PostList, TermPostList,
};
use crate::TermCount;
use crate::stats::{CollectionStats, TermFreqs, WeightContext};
use crate::weight::{Bm25Weight, Weight};

/// A boolean/ranked query over terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// One term.
    Term(Vec<u8>),
    /// All subqueries must match.
    And(Vec<Query>),
    /// Any subquery may match; weights accumulate.
    Or(Vec<Query>),
    /// Left matches, right must not.
    AndNot(Box<Query>, Box<Query>),
    /// Terms adjacent in order within the window.
    Phrase(Vec<Vec<u8>>, u32),
    /// Terms in any order within the window.
    Near(Vec<Vec<u8>>, u32),
}

impl Query {
    pub fn term(term: impl Into<Vec<u8>>) -> Query {
        Query::Term(term.into())
    }

    pub fn phrase<T: Into<Vec<u8>>>(terms: impl IntoIterator<Item = T>) -> Query {
        let terms: Vec<Vec<u8>> = terms.into_iter().map(Into::into).collect();
        let window = terms.len() as u32;
        Query::Phrase(terms, window)
    }

    pub fn near<T: Into<Vec<u8>>>(terms: impl IntoIterator<Item = T>, window: u32) -> Query {
        Query::Near(terms.into_iter().map(Into::into).collect(), window)
    }

    /// Count each term's within-query frequency.
    fn collect_wqf(&self, wqf: &mut BTreeMap<Vec<u8>, u32>) {
        match self {
            Query::Term(t) => *wqf.entry(t.clone()).or_insert(0) += 1,
            Query::And(subs) | Query::Or(subs) => {
                for sub in subs {
                    sub.collect_wqf(wqf);
                }
            }
            Query::AndNot(left, _right) => {
                // The right side only filters; it contributes no weight and
                // so no wqf.
                left.collect_wqf(wqf);
            }
            Query::Phrase(terms, _) | Query::Near(terms, _) => {
                for t in terms {
                    *wqf.entry(t.clone()).or_insert(0) += 1;
                }
            }
        }
    }
}

/// Merged per-term statistics plus the scheme prototypes, shared by every
/// shard's tree build.
struct QueryContext {
    stats: CollectionStats,
    freqs: BTreeMap<Vec<u8>, TermFreqs>,
    wdf_bounds: BTreeMap<Vec<u8>, TermCount>,
    wqf: BTreeMap<Vec<u8>, u32>,
}

fn init_scheme(proto: &dyn Weight, ctx: &WeightContext, factor: f64) -> Box<dyn Weight> {
    let mut scheme = proto.clone_boxed();
    scheme.init(&ctx.restricted_to(scheme.needs()), factor);
    scheme
}

/// Clone `proto` for `term` and initialise it against one shard's
/// statistics.
pub(crate) fn init_scheme_for_term(
    proto: &dyn Weight,
    shard: &Arc<Shard>,
    stats: &CollectionStats,
    term: &[u8],
    wqf: u32,
    factor: f64,
) -> Box<dyn Weight> {
    let ctx = WeightContext {
        stats: *stats,
        freqs: shard.term_freqs(term),
        wqf,
        wdf_upper_bound: shard.wdf_upper_bound(term),
    };
    init_scheme(proto, &ctx, factor)
}

/// Runs queries against a database with a chosen weighting scheme.
pub struct Searcher {
    db: Database,
    scheme: Box<dyn Weight>,
    cancel: Option<CancelToken>,
}

impl Searcher {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            scheme: Box::new(Bm25Weight::default()),
            cancel: None,
        }
    }

    /// Replace the default BM25 scheme.
    pub fn set_scheme(&mut self, scheme: Box<dyn Weight>) {
        self.scheme = scheme;
    }

    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }

    /// Top-k search. Hits carry global docids and are ordered weight
    /// descending, docid ascending.
    pub fn search(&self, query: &Query, k: usize) -> Result<Vec<Hit>> {
        let shards = self.db.shards();
        let ctx = self.gather_statistics(query, &shards);
        debug!(
            "search: {} shards, {} distinct terms, collection_size={}",
            shards.len(),
            ctx.wqf.len(),
            ctx.stats.collection_size
        );

        let mut merged: Vec<Hit> = Vec::new();
        for (shard_idx, shard) in shards.iter().enumerate() {
            let root = self.build_tree(query, shard, &ctx)?;
            let extra = init_scheme(
                self.scheme.as_ref(),
                &WeightContext {
                    stats: ctx.stats,
                    freqs: TermFreqs::default(),
                    wqf: 0,
                    wdf_upper_bound: 0,
                },
                0.0,
            );
            let mut matcher = Matcher::new(root, extra, shard.clone(), k);
            if let Some(token) = &self.cancel {
                matcher = matcher.with_cancel_token(token.clone());
            }
            for hit in matcher.run()? {
                merged.push(Hit {
                    docid: self.db.global_docid(shard_idx, hit.docid),
                    weight: hit.weight,
                });
            }
        }

        merged.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.docid.cmp(&b.docid))
        });
        merged.truncate(k);
        Ok(merged)
    }

    /// Merge collection statistics and the queried terms' frequencies over
    /// every shard.
    fn gather_statistics(&self, query: &Query, shards: &[Arc<Shard>]) -> QueryContext {
        let mut wqf = BTreeMap::new();
        query.collect_wqf(&mut wqf);

        let mut stats = CollectionStats::default();
        for shard in shards {
            stats.merge(&shard.collection_stats());
        }
        stats.query_length = wqf.values().sum();

        let mut freqs: BTreeMap<Vec<u8>, TermFreqs> = BTreeMap::new();
        let mut wdf_bounds: BTreeMap<Vec<u8>, TermCount> = BTreeMap::new();
        for term in wqf.keys() {
            let mut merged = TermFreqs::default();
            let mut bound = 0;
            for shard in shards {
                merged.merge(&shard.term_freqs(term));
                bound = bound.max(shard.wdf_upper_bound(term));
            }
            freqs.insert(term.clone(), merged);
            wdf_bounds.insert(term.clone(), bound);
        }

        QueryContext {
            stats,
            freqs,
            wdf_bounds,
            wqf,
        }
    }

    fn term_leaf(
        &self,
        term: &[u8],
        shard: &Arc<Shard>,
        ctx: &QueryContext,
        weighted: bool,
    ) -> Option<Box<dyn PostList>> {
        let postings = shard.term_postings(term)?;
        let wctx = WeightContext {
            stats: ctx.stats,
            freqs: ctx.freqs.get(term).copied().unwrap_or_default(),
            wqf: ctx.wqf.get(term).copied().unwrap_or(1),
            wdf_upper_bound: ctx.wdf_bounds.get(term).copied().unwrap_or(0),
        };
        let factor = if weighted { 1.0 } else { 0.0 };
        let scheme = init_scheme(self.scheme.as_ref(), &wctx, factor);
        Some(Box::new(TermPostList::new(
            term.to_vec(),
            postings,
            shard.clone(),
            scheme,
        )))
    }

    /// Compile the query into this shard's postlist tree. A missing term
    /// makes conjunctive nodes empty and disappears from disjunctive ones.
    fn build_tree(
        &self,
        query: &Query,
        shard: &Arc<Shard>,
        ctx: &QueryContext,
    ) -> Result<Box<dyn PostList>> {
        let tree = self.build_node(query, shard, ctx, true)?;
        Ok(tree.unwrap_or_else(|| Box::new(EmptyPostList)))
    }

    fn build_node(
        &self,
        query: &Query,
        shard: &Arc<Shard>,
        ctx: &QueryContext,
        weighted: bool,
    ) -> Result<Option<Box<dyn PostList>>> {
        let db_size = ctx.stats.collection_size;
        let node = match query {
            Query::Term(term) => self.term_leaf(term, shard, ctx, weighted),
            Query::And(subs) => {
                let mut children = Vec::with_capacity(subs.len());
                for sub in subs {
                    match self.build_node(sub, shard, ctx, weighted)? {
                        Some(child) => children.push(child),
                        None => return Ok(None),
                    }
                }
                combine(children, |c| Box::new(MultiAndPostList::new(c, db_size)))
            }
            Query::Or(subs) => {
                let mut children = Vec::with_capacity(subs.len());
                for sub in subs {
                    if let Some(child) = self.build_node(sub, shard, ctx, weighted)? {
                        children.push(child);
                    }
                }
                combine(children, |c| Box::new(MultiOrPostList::new(c)))
            }
            Query::AndNot(left, right) => {
                let left = match self.build_node(left, shard, ctx, weighted)? {
                    Some(l) => l,
                    None => return Ok(None),
                };
                match self.build_node(right, shard, ctx, false)? {
                    Some(right) => Some(Box::new(AndNotPostList::new(left, right)) as Box<dyn PostList>),
                    None => Some(left),
                }
            }
            Query::Phrase(terms, window) => {
                self.positional_node(terms, shard, ctx, weighted, |children| {
                    Box::new(PhrasePostList::new(children, *window, db_size))
                })
            }
            Query::Near(terms, window) => {
                self.positional_node(terms, shard, ctx, weighted, |children| {
                    Box::new(NearPostList::new(children, *window, db_size))
                })
            }
        };
        Ok(node)
    }

    fn positional_node(
        &self,
        terms: &[Vec<u8>],
        shard: &Arc<Shard>,
        ctx: &QueryContext,
        weighted: bool,
        build: impl FnOnce(Vec<Box<dyn PostList>>) -> Box<dyn PostList>,
    ) -> Option<Box<dyn PostList>> {
        let mut children = Vec::with_capacity(terms.len());
        for term in terms {
            match self.term_leaf(term, shard, ctx, weighted) {
                Some(child) => children.push(child),
                None => return None,
            }
        }
        combine(children, build)
    }
}

/// Collapse a child list: none -> absent, one -> itself, many -> combined.
fn combine(
    children: Vec<Box<dyn PostList>>,
    build: impl FnOnce(Vec<Box<dyn PostList>>) -> Box<dyn PostList>,
) -> Option<Box<dyn PostList>> {
    match children.len() {
        0 => None,
        1 => children.into_iter().next(),
        _ => Some(build(children)),
    }
}
