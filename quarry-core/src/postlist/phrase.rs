//! Positional combinators: phrase and near.
//!
//! Both AND their children to synchronise docids, then admit only documents
//! whose position lists satisfy the positional predicate. Weights come from
//! the underlying AND, not the predicate.

use crate::error::Result;
use crate::stats::{CollectionStats, TermFreqs};
use crate::{DocId, TermCount};

use super::{MultiAndPostList, PositionCollector, PostList};

/// Ordered window match: one position per child, strictly increasing in
/// child order, all inside `window`.
fn ordered_within_window(lists: &[&[u32]], window: u32) -> bool {
    fn descend(lists: &[&[u32]], prev: u32, first: u32, window: u32) -> bool {
        if lists.is_empty() {
            return true;
        }
        for &p in lists[0] {
            if p <= prev {
                continue;
            }
            if p - first >= window {
                break;
            }
            if descend(&lists[1..], p, first, window) {
                return true;
            }
        }
        false
    }
    if lists.is_empty() {
        return false;
    }
    for &start in lists[0] {
        if descend(&lists[1..], start, start, window) {
            return true;
        }
    }
    false
}

/// Unordered window match: one position per child, any order, distinct, all
/// inside `window`.
fn near_within_window(lists: &[&[u32]], window: u32) -> bool {
    fn descend(lists: &[&[u32]], chosen: &mut Vec<u32>, window: u32) -> bool {
        if lists.is_empty() {
            let lo = chosen.iter().min().copied().unwrap_or(0);
            let hi = chosen.iter().max().copied().unwrap_or(0);
            return hi - lo < window;
        }
        for &p in lists[0] {
            if chosen.contains(&p) {
                continue;
            }
            // Prune: the span so far must already fit the window.
            let lo = chosen.iter().min().copied().unwrap_or(p).min(p);
            let hi = chosen.iter().max().copied().unwrap_or(p).max(p);
            if hi - lo >= window {
                continue;
            }
            chosen.push(p);
            if descend(&lists[1..], chosen, window) {
                chosen.pop();
                return true;
            }
            chosen.pop();
        }
        false
    }
    descend(lists, &mut Vec::with_capacity(lists.len()), window)
}

enum PositionalOp {
    Phrase,
    Near,
}

/// Shared skeleton of the two positional combinators.
struct PositionalPostList {
    and: MultiAndPostList,
    window: u32,
    op: PositionalOp,
}

impl PositionalPostList {
    fn positions_match(&self) -> bool {
        let mut lists: Vec<&[u32]> = Vec::with_capacity(self.and.children().len());
        for child in self.and.children() {
            match child.position_list() {
                Some(p) if !p.is_empty() => lists.push(p),
                // A child without positional data can never phrase-match.
                _ => return false,
            }
        }
        match self.op {
            PositionalOp::Phrase => ordered_within_window(&lists, self.window),
            PositionalOp::Near => near_within_window(&lists, self.window),
        }
    }

    fn settle(&mut self, w_min: f64) -> Result<()> {
        while !self.and.at_end() && !self.positions_match() {
            self.and.next(w_min)?;
        }
        Ok(())
    }
}

macro_rules! positional_postlist {
    ($type:ident, $op:expr, $describe:literal) => {
        impl $type {
            /// `window` is the maximum span of matching positions; it is
            /// clamped up to the child count, below which no match could
            /// exist.
            pub fn new(children: Vec<Box<dyn PostList>>, window: u32, db_size: u32) -> Self {
                let window = window.max(children.len() as u32);
                Self {
                    inner: PositionalPostList {
                        and: MultiAndPostList::new(children, db_size),
                        window,
                        op: $op,
                    },
                }
            }
        }

        impl PostList for $type {
            fn at_end(&self) -> bool {
                self.inner.and.at_end()
            }
            fn docid(&self) -> DocId {
                self.inner.and.docid()
            }
            fn wdf(&self) -> TermCount {
                self.inner.and.wdf()
            }
            fn doclength(&self) -> TermCount {
                self.inner.and.doclength()
            }
            fn unique_terms(&self) -> TermCount {
                self.inner.and.unique_terms()
            }
            fn wdf_doc_max(&self) -> TermCount {
                self.inner.and.wdf_doc_max()
            }
            fn termfreq(&self) -> u32 {
                // The positional predicate only narrows the AND.
                self.inner.and.termfreq()
            }
            fn estimate_termfreqs(&self, stats: &CollectionStats) -> TermFreqs {
                self.inner.and.estimate_termfreqs(stats)
            }
            fn next(&mut self, w_min: f64) -> Result<()> {
                self.inner.and.next(w_min)?;
                self.inner.settle(w_min)
            }
            fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<()> {
                self.inner.and.skip_to(did, w_min)?;
                self.inner.settle(w_min)
            }
            fn get_weight(
                &self,
                doclen: TermCount,
                unique_terms: TermCount,
                wdf_doc_max: TermCount,
            ) -> f64 {
                self.inner.and.get_weight(doclen, unique_terms, wdf_doc_max)
            }
            fn recalc_maxweight(&mut self) -> f64 {
                self.inner.and.recalc_maxweight()
            }
            fn count_matching_subqs(&self) -> u32 {
                self.inner.and.count_matching_subqs()
            }
            fn gather_position_lists(&mut self, collector: &mut PositionCollector) {
                self.inner.and.gather_position_lists(collector);
            }
            fn describe(&self) -> String {
                let parts: Vec<String> = self
                    .inner
                    .and
                    .children()
                    .iter()
                    .map(|c| c.describe())
                    .collect();
                format!(
                    concat!("(", $describe, " {} [{}])"),
                    parts.join(" "),
                    self.inner.window
                )
            }
        }
    };
}

/// Terms in order at consecutive-run distance: with the default window
/// (the term count) this is an exact phrase.
pub struct PhrasePostList {
    inner: PositionalPostList,
}

positional_postlist!(PhrasePostList, PositionalOp::Phrase, "PHRASE");

/// Terms in any order within a window.
pub struct NearPostList {
    inner: PositionalPostList,
}

positional_postlist!(NearPostList, PositionalOp::Near, "NEAR");

#[cfg(test)]
mod tests {
    use super::super::tests_support::{collect_docids, positional_leaves};
    use super::*;

    // Doc 1: "quick brown fox", doc 2: "brown quick fox",
    // doc 3: "quick slow brown fox".
    fn corpus() -> Vec<(&'static str, Vec<(DocId, Vec<u32>)>)> {
        vec![
            ("quick", vec![(1, vec![1]), (2, vec![2]), (3, vec![1])]),
            ("brown", vec![(1, vec![2]), (2, vec![1]), (3, vec![3])]),
        ]
    }

    #[test]
    fn test_exact_phrase() {
        let children = positional_leaves(&corpus());
        let mut phrase = PhrasePostList::new(children, 2, 10);
        phrase.recalc_maxweight();
        // Only doc 1 has "quick brown" adjacent in order.
        assert_eq!(collect_docids(&mut phrase), vec![1]);
    }

    #[test]
    fn test_phrase_with_wider_window() {
        let children = positional_leaves(&corpus());
        let mut phrase = PhrasePostList::new(children, 3, 10);
        phrase.recalc_maxweight();
        // Doc 3 has "quick .. brown" within a window of 3, in order.
        assert_eq!(collect_docids(&mut phrase), vec![1, 3]);
    }

    #[test]
    fn test_near_ignores_order() {
        let children = positional_leaves(&corpus());
        let mut near = NearPostList::new(children, 2, 10);
        near.recalc_maxweight();
        // Docs 1 and 2 have the terms adjacent in either order.
        assert_eq!(collect_docids(&mut near), vec![1, 2]);
    }

    #[test]
    fn test_gather_position_lists_unions_children() {
        use super::super::PositionCollector;

        let children = positional_leaves(&corpus());
        let mut phrase = PhrasePostList::new(children, 2, 10);
        phrase.recalc_maxweight();
        phrase.next(0.0).unwrap();
        assert_eq!(phrase.docid(), 1);

        let mut collector = PositionCollector::new();
        phrase.gather_position_lists(&mut collector);
        assert_eq!(collector.into_sorted(), vec![1, 2]);
    }

    #[test]
    fn test_ordered_window_predicate() {
        assert!(ordered_within_window(&[&[1], &[2]], 2));
        assert!(!ordered_within_window(&[&[2], &[1]], 2));
        assert!(ordered_within_window(&[&[1, 10], &[11]], 2));
        assert!(!ordered_within_window(&[&[1], &[4]], 3));
        assert!(ordered_within_window(&[&[1], &[2], &[3]], 3));
        assert!(!ordered_within_window(&[&[1], &[3], &[2]], 3));
    }

    #[test]
    fn test_near_window_predicate() {
        assert!(near_within_window(&[&[5], &[4]], 2));
        assert!(!near_within_window(&[&[5], &[8]], 2));
        assert!(near_within_window(&[&[1, 7], &[8], &[6]], 3));
        // Distinct positions required: both terms only at 3.
        assert!(!near_within_window(&[&[3], &[3]], 2));
    }
}
