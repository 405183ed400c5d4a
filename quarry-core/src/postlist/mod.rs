//! Posting-list iterators: the leaves and combinators the matcher drives.
//!
//! Every node exposes the same interface as a leaf, so combinators nest
//! arbitrarily. Iterators only ever move forward; docids within one
//! iterator are strictly increasing, and docid 0 doubles as the
//! "unpositioned / at end" state as in the rest of the crate.

mod and;
mod and_not;
mod leaf;
mod or;
mod phrase;
mod source;

pub use and::MultiAndPostList;
pub use and_not::AndNotPostList;
pub use leaf::TermPostList;
pub use or::MultiOrPostList;
pub use phrase::{NearPostList, PhrasePostList};
pub use source::{FixedWeightSource, PostingSource};

use crate::error::Result;
use crate::stats::{CollectionStats, TermFreqs};
use crate::{DocId, TermCount};

/// One posting: document, within-document frequency, and the term's
/// positions in that document (strictly increasing, possibly empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub docid: DocId,
    pub wdf: TermCount,
    pub positions: Vec<u32>,
}

/// A term's complete posting stream in one shard, docid-ascending.
#[derive(Debug, Clone, Default)]
pub struct TermPostings {
    pub postings: Vec<Posting>,
    pub collfreq: u64,
    pub wdf_max: TermCount,
}

impl TermPostings {
    pub fn termfreq(&self) -> u32 {
        self.postings.len() as u32
    }
}

/// Union of position lists gathered across an iterator tree.
#[derive(Debug, Default)]
pub struct PositionCollector {
    positions: Vec<u32>,
}

impl PositionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, positions: &[u32]) {
        self.positions.extend_from_slice(positions);
    }

    /// Sorted, deduplicated union of everything gathered.
    pub fn into_sorted(mut self) -> Vec<u32> {
        self.positions.sort_unstable();
        self.positions.dedup();
        self.positions
    }
}

/// A posting-list iterator.
///
/// `at_end` and `docid` are meaningful only once `next` or `skip_to` has
/// been called. `w_min` is advisory: a node may skip documents whose
/// contribution cannot reach the threshold after combination; conservative
/// nodes ignore it.
pub trait PostList: Send {
    fn at_end(&self) -> bool;

    /// Current docid; 0 when unpositioned or at end.
    fn docid(&self) -> DocId;

    /// wdf at the current document (combinators sum their children's).
    fn wdf(&self) -> TermCount;

    /// Length of the current document.
    fn doclength(&self) -> TermCount;

    /// Unique-term count of the current document.
    fn unique_terms(&self) -> TermCount;

    /// Largest wdf of any term in the current document.
    fn wdf_doc_max(&self) -> TermCount;

    /// Document-count estimate for this subquery.
    fn termfreq(&self) -> u32;

    /// Composed frequency estimates against the given corpus statistics.
    fn estimate_termfreqs(&self, stats: &CollectionStats) -> TermFreqs;

    fn next(&mut self, w_min: f64) -> Result<()>;

    /// Advance to the first docid >= `did`; stays put if already there.
    fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<()>;

    /// Non-positioning probe for `did`. Returns whether the node could
    /// answer without a real advance; `false` means the caller must replay
    /// as `skip_to`. When valid, the node is positioned at some docid >=
    /// `did` (or at end), and matched exactly when `docid() == did`.
    fn check(&mut self, did: DocId, w_min: f64) -> Result<bool> {
        self.skip_to(did, w_min)?;
        Ok(true)
    }

    /// Weight contribution at the current document.
    fn get_weight(&self, doclen: TermCount, unique_terms: TermCount, wdf_doc_max: TermCount)
    -> f64;

    /// Recompute and return an upper bound on `get_weight`. Never increases
    /// over the lifetime of a tree, so a once-valid pruning threshold stays
    /// valid.
    fn recalc_maxweight(&mut self) -> f64;

    /// Number of leaf subqueries matching at the current document.
    fn count_matching_subqs(&self) -> u32;

    /// The current document's position list for this node, if it has one.
    fn position_list(&self) -> Option<&[u32]> {
        None
    }

    /// Union all leaves' position lists at the current document into the
    /// collector.
    fn gather_position_lists(&mut self, collector: &mut PositionCollector);

    fn describe(&self) -> String;
}

impl PostList for Box<dyn PostList> {
    fn at_end(&self) -> bool {
        (**self).at_end()
    }
    fn docid(&self) -> DocId {
        (**self).docid()
    }
    fn wdf(&self) -> TermCount {
        (**self).wdf()
    }
    fn doclength(&self) -> TermCount {
        (**self).doclength()
    }
    fn unique_terms(&self) -> TermCount {
        (**self).unique_terms()
    }
    fn wdf_doc_max(&self) -> TermCount {
        (**self).wdf_doc_max()
    }
    fn termfreq(&self) -> u32 {
        (**self).termfreq()
    }
    fn estimate_termfreqs(&self, stats: &CollectionStats) -> TermFreqs {
        (**self).estimate_termfreqs(stats)
    }
    fn next(&mut self, w_min: f64) -> Result<()> {
        (**self).next(w_min)
    }
    fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<()> {
        (**self).skip_to(did, w_min)
    }
    fn check(&mut self, did: DocId, w_min: f64) -> Result<bool> {
        (**self).check(did, w_min)
    }
    fn get_weight(
        &self,
        doclen: TermCount,
        unique_terms: TermCount,
        wdf_doc_max: TermCount,
    ) -> f64 {
        (**self).get_weight(doclen, unique_terms, wdf_doc_max)
    }
    fn recalc_maxweight(&mut self) -> f64 {
        (**self).recalc_maxweight()
    }
    fn count_matching_subqs(&self) -> u32 {
        (**self).count_matching_subqs()
    }
    fn position_list(&self) -> Option<&[u32]> {
        (**self).position_list()
    }
    fn gather_position_lists(&mut self, collector: &mut PositionCollector) {
        (**self).gather_position_lists(collector)
    }
    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use std::sync::Arc;

    use crate::DocId;
    use crate::db::Shard;
    use crate::document::Document;
    use crate::weight::BoolWeight;

    use super::{PostList, TermPostList};

    /// Build a shard whose documents carry the given terms at the given
    /// positions (plus a filler term so every doc has a length).
    pub fn shard_with(sets: &[(&str, Vec<(DocId, Vec<u32>)>)]) -> Arc<Shard> {
        let shard = Arc::new(Shard::new());
        let max = sets
            .iter()
            .flat_map(|(_, v)| v.iter().map(|(d, _)| *d))
            .max()
            .unwrap_or(0);
        for did in 1..=max {
            let mut doc = Document::new();
            doc.add_term("filler", 1);
            for (term, postings) in sets {
                for (d, positions) in postings {
                    if *d != did {
                        continue;
                    }
                    if positions.is_empty() {
                        doc.add_term(term.as_bytes().to_vec(), 1);
                    } else {
                        for &p in positions {
                            doc.add_posting(term.as_bytes().to_vec(), p, 1);
                        }
                    }
                }
            }
            shard.add_document(&doc).unwrap();
        }
        shard
    }

    fn leaf_from(shard: &Arc<Shard>, name: &str) -> TermPostList {
        let postings = shard
            .term_postings(name.as_bytes())
            .expect("term must have postings");
        TermPostList::new(
            name.as_bytes().to_vec(),
            postings,
            shard.clone(),
            Box::new(BoolWeight),
        )
    }

    /// One unweighted leaf over the given docids.
    pub fn leaf(docids: &[DocId], name: &str) -> TermPostList {
        let sets = vec![(name, docids.iter().map(|&d| (d, Vec::new())).collect())];
        let shard = shard_with(&sets);
        leaf_from(&shard, name)
    }

    /// Leaves t0, t1, ... over the given docid sets, sharing one shard.
    pub fn leaves(sets: &[&[DocId]]) -> Vec<Box<dyn PostList>> {
        let names: Vec<String> = (0..sets.len()).map(|i| format!("t{}", i)).collect();
        let described: Vec<(&str, Vec<(DocId, Vec<u32>)>)> = names
            .iter()
            .zip(sets.iter())
            .map(|(name, docids)| {
                (
                    name.as_str(),
                    docids.iter().map(|&d| (d, Vec::new())).collect(),
                )
            })
            .collect();
        let shard = shard_with(&described);
        names
            .iter()
            .map(|name| Box::new(leaf_from(&shard, name)) as Box<dyn PostList>)
            .collect()
    }

    /// Leaves over terms with explicit positions, sharing one shard.
    pub fn positional_leaves(
        sets: &[(&'static str, Vec<(DocId, Vec<u32>)>)],
    ) -> Vec<Box<dyn PostList>> {
        let shard = shard_with(sets);
        sets.iter()
            .map(|(name, _)| Box::new(leaf_from(&shard, name)) as Box<dyn PostList>)
            .collect()
    }

    /// Drain an iterator, returning its emitted docids.
    pub fn collect_docids(pl: &mut impl PostList) -> Vec<DocId> {
        let mut out = Vec::new();
        loop {
            pl.next(0.0).unwrap();
            if pl.at_end() {
                break;
            }
            out.push(pl.docid());
        }
        out
    }
}

/// The iterator over no documents.
#[derive(Debug, Default)]
pub struct EmptyPostList;

impl PostList for EmptyPostList {
    fn at_end(&self) -> bool {
        true
    }
    fn docid(&self) -> DocId {
        0
    }
    fn wdf(&self) -> TermCount {
        0
    }
    fn doclength(&self) -> TermCount {
        0
    }
    fn unique_terms(&self) -> TermCount {
        0
    }
    fn wdf_doc_max(&self) -> TermCount {
        0
    }
    fn termfreq(&self) -> u32 {
        0
    }
    fn estimate_termfreqs(&self, _stats: &CollectionStats) -> TermFreqs {
        TermFreqs::default()
    }
    fn next(&mut self, _w_min: f64) -> Result<()> {
        Ok(())
    }
    fn skip_to(&mut self, _did: DocId, _w_min: f64) -> Result<()> {
        Ok(())
    }
    fn get_weight(&self, _: TermCount, _: TermCount, _: TermCount) -> f64 {
        0.0
    }
    fn recalc_maxweight(&mut self) -> f64 {
        0.0
    }
    fn count_matching_subqs(&self) -> u32 {
        0
    }
    fn gather_position_lists(&mut self, _collector: &mut PositionCollector) {}
    fn describe(&self) -> String {
        "EMPTY".into()
    }
}
