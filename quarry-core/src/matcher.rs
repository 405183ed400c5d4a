//! Weighted matching core: drives a postlist tree document by document,
//! keeping a bounded min-heap of the best candidates and feeding the heap
//! floor back into the tree as the pruning threshold.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use log::debug;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::db::Shard;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::postlist::PostList;
use crate::weight::Weight;
use crate::{DocId, Score};

/// Recompute the tree's maxweight every this many candidates.
const RECALC_INTERVAL: u32 = 16;

/// One scored document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub docid: DocId,
    pub weight: Score,
}

/// Heap entry ordered so the worst candidate (lowest weight, then highest
/// docid) surfaces first for eviction.
#[derive(Debug, Clone, Copy)]
struct HeapEntry {
    docid: DocId,
    weight: Score,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.weight == other.weight && self.docid == other.docid
    }
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .weight
            .partial_cmp(&self.weight)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.docid.cmp(&other.docid))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Cooperative cancellation flag shared with a running matcher.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(AtomicOrdering::Relaxed)
    }
}

/// Observer of every candidate the matcher weighs.
pub trait MatchSpy: Send {
    /// Stable spy name, the registry key.
    fn name(&self) -> &'static str;

    fn clone_boxed(&self) -> Box<dyn MatchSpy>;

    fn observe(&mut self, doc: &Document, weight: Score);
}

impl std::fmt::Debug for dyn MatchSpy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatchSpy({})", self.name())
    }
}

/// Counts the distinct values seen in one slot across weighed candidates.
#[derive(Debug, Clone, Default)]
pub struct ValueCountSpy {
    slot: u32,
    counts: std::collections::BTreeMap<Vec<u8>, u32>,
}

impl ValueCountSpy {
    pub fn new(slot: u32) -> Self {
        Self {
            slot,
            counts: Default::default(),
        }
    }

    pub fn counts(&self) -> impl Iterator<Item = (&[u8], u32)> {
        self.counts.iter().map(|(v, &c)| (v.as_slice(), c))
    }
}

impl MatchSpy for ValueCountSpy {
    fn name(&self) -> &'static str {
        "valuecount"
    }

    fn clone_boxed(&self) -> Box<dyn MatchSpy> {
        Box::new(self.clone())
    }

    fn observe(&mut self, doc: &Document, _weight: Score) {
        if let Some(value) = doc.value(self.slot) {
            *self.counts.entry(value.to_vec()).or_insert(0) += 1;
        }
    }
}

/// Single-shard top-k matcher.
///
/// Owns its iterator tree exclusively. The heap floor becomes `w_min`; the
/// tree's maxweight is recomputed periodically and the match stops early
/// once it cannot beat the floor.
pub struct Matcher {
    root: Box<dyn PostList>,
    extra: Box<dyn Weight>,
    shard: Arc<Shard>,
    k: usize,
    cancel: Option<CancelToken>,
    spies: Vec<Arc<Mutex<dyn MatchSpy>>>,
}

impl Matcher {
    /// `extra` must be a scheme clone initialised with factor 0 for the
    /// query-independent part.
    pub fn new(root: Box<dyn PostList>, extra: Box<dyn Weight>, shard: Arc<Shard>, k: usize) -> Self {
        Self {
            root,
            extra,
            shard,
            k,
            cancel: None,
            spies: Vec::new(),
        }
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Observe every weighed candidate with `spy`. The caller keeps its
    /// own handle to inspect what the spy collected after the run.
    pub fn add_spy(&mut self, spy: Arc<Mutex<dyn MatchSpy>>) {
        self.spies.push(spy);
    }

    /// Run the match to completion, returning hits sorted by weight
    /// descending, docid ascending. Consumes the matcher and releases the
    /// tree.
    pub fn run(mut self) -> Result<Vec<Hit>> {
        let capacity = self.k.saturating_add(1).min(1_000_000);
        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(capacity);
        let mut w_min = 0.0f64;
        let mut max_weight = self.root.recalc_maxweight();
        let mut candidates = 0u32;
        let mut considered = 0u64;
        let mut pruned_stop = false;

        loop {
            if candidates == RECALC_INTERVAL {
                candidates = 0;
                max_weight = self.root.recalc_maxweight();
            }
            candidates += 1;

            if heap.len() == self.k && max_weight <= w_min {
                pruned_stop = true;
                break;
            }
            if let Some(token) = &self.cancel {
                if token.is_cancelled() {
                    return Err(Error::Cancelled);
                }
            }

            self.root.next(w_min)?;
            if self.root.at_end() {
                break;
            }
            considered += 1;

            let did = self.root.docid();
            let (doclen, unique_terms, wdf_doc_max) = self.shard.doc_data(did)?;
            let weight = self.root.get_weight(doclen, unique_terms, wdf_doc_max)
                + self.extra.sum_extra(doclen, unique_terms);

            if !self.spies.is_empty() {
                let doc = self.shard.get_document(did)?;
                for spy in &self.spies {
                    spy.lock().observe(&doc, weight);
                }
            }

            if heap.len() < self.k {
                heap.push(HeapEntry { docid: did, weight });
            } else if let Some(floor) = heap.peek() {
                // Ties go to the lower docid.
                if weight > floor.weight || (weight == floor.weight && did < floor.docid) {
                    heap.pop();
                    heap.push(HeapEntry { docid: did, weight });
                }
            }
            if heap.len() == self.k {
                w_min = heap.peek().map(|e| e.weight).unwrap_or(0.0);
            }
        }

        let mut hits: Vec<Hit> = heap
            .into_iter()
            .map(|e| Hit {
                docid: e.docid,
                weight: e.weight,
            })
            .collect();
        hits.sort_by(|a, b| {
            b.weight
                .partial_cmp(&a.weight)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.docid.cmp(&b.docid))
        });

        debug!(
            "matcher finished: considered={}, returned={}, early_stop={}, top={:.4}",
            considered,
            hits.len(),
            pruned_stop,
            hits.first().map(|h| h.weight).unwrap_or(0.0)
        );

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postlist::tests_support::shard_with;
    use crate::postlist::{MultiOrPostList, PostList, TermPostList};
    use crate::query::init_scheme_for_term;
    use crate::stats::CollectionStats;
    use crate::weight::{Bm25Weight, BoolWeight, Weight};

    fn fixture() -> (Arc<Shard>, CollectionStats) {
        let shard = shard_with(&[
            ("apple", vec![(1, vec![]), (2, vec![]), (4, vec![])]),
            ("pear", vec![(2, vec![]), (3, vec![]), (4, vec![])]),
        ]);
        let stats = shard.collection_stats();
        (shard, stats)
    }

    fn or_tree(shard: &Arc<Shard>, stats: &CollectionStats) -> Box<dyn PostList> {
        let scheme = Bm25Weight::default();
        let children: Vec<Box<dyn PostList>> = ["apple", "pear"]
            .iter()
            .map(|t| {
                let postings = shard.term_postings(t.as_bytes()).unwrap();
                let w = init_scheme_for_term(&scheme, shard, stats, t.as_bytes(), 1, 1.0);
                Box::new(TermPostList::new(
                    t.as_bytes().to_vec(),
                    postings,
                    shard.clone(),
                    w,
                )) as Box<dyn PostList>
            })
            .collect();
        Box::new(MultiOrPostList::new(children))
    }

    #[test]
    fn test_topk_order_and_tiebreak() {
        let (shard, stats) = fixture();
        let root = or_tree(&shard, &stats);
        let mut extra: Box<dyn Weight> = Box::new(Bm25Weight::default());
        extra.init(&Default::default(), 0.0);
        let hits = Matcher::new(root, extra, shard, 10).run().unwrap();

        assert_eq!(hits.len(), 4);
        // Docs 2 and 4 match both terms and outrank single-term docs.
        assert_eq!(hits[0].docid, 2);
        assert_eq!(hits[1].docid, 4);
        assert!(hits[0].weight >= hits[1].weight);
        // Single-term docs 1 and 3 tie; lower docid first.
        assert_eq!((hits[2].docid, hits[3].docid), (1, 3));
    }

    #[test]
    fn test_k_limits_results() {
        let (shard, stats) = fixture();
        let root = or_tree(&shard, &stats);
        let mut extra: Box<dyn Weight> = Box::new(Bm25Weight::default());
        extra.init(&Default::default(), 0.0);
        let hits = Matcher::new(root, extra, shard, 2).run().unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].docid, 2);
        assert_eq!(hits[1].docid, 4);
    }

    #[test]
    fn test_hit_serialization() {
        let hit = Hit {
            docid: 7,
            weight: 1.25,
        };
        let json = serde_json::to_string(&hit).unwrap();
        let restored: Hit = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, hit);
    }

    #[test]
    fn test_cancellation() {
        let (shard, stats) = fixture();
        let root = or_tree(&shard, &stats);
        let mut extra: Box<dyn Weight> = Box::new(Bm25Weight::default());
        extra.init(&Default::default(), 0.0);
        let token = CancelToken::new();
        token.cancel();
        let result = Matcher::new(root, extra, shard, 10)
            .with_cancel_token(token)
            .run();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_value_count_spy() {
        let shard = Arc::new(Shard::new());
        for colour in ["red", "blue", "red"] {
            let mut doc = Document::new();
            doc.add_term("item", 1);
            doc.set_value(0, colour.as_bytes().to_vec());
            shard.add_document(&doc).unwrap();
        }
        let postings = shard.term_postings(b"item").unwrap();
        let root = Box::new(TermPostList::new(
            b"item".to_vec(),
            postings,
            shard.clone(),
            Box::new(BoolWeight),
        ));
        let mut matcher = Matcher::new(root, Box::new(BoolWeight), shard, 10);
        let spy = Arc::new(Mutex::new(ValueCountSpy::new(0)));
        matcher.add_spy(spy.clone());
        let hits = matcher.run().unwrap();
        assert_eq!(hits.len(), 3);

        let spy = spy.lock();
        let counts: Vec<(Vec<u8>, u32)> =
            spy.counts().map(|(v, c)| (v.to_vec(), c)).collect();
        assert_eq!(
            counts,
            vec![(b"blue".to_vec(), 1), (b"red".to_vec(), 2)]
        );
    }
}
