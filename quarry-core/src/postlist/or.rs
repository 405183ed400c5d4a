//! N-way OR combinator.

use crate::error::Result;
use crate::stats::{CollectionStats, TermFreqs};
use crate::{DocId, TermCount};

use super::{PositionCollector, PostList};

/// N-way OR: emits the union of the children's docids, smallest first.
///
/// `w_min` is forwarded to child i reduced by what the other children
/// could still contribute, so a child only prunes documents it would have
/// to carry past the threshold alone.
pub struct MultiOrPostList {
    children: Vec<Box<dyn PostList>>,
    max_child: Vec<f64>,
    max_total: f64,
    did: DocId,
    started: bool,
}

impl MultiOrPostList {
    pub fn new(children: Vec<Box<dyn PostList>>) -> Self {
        let n = children.len();
        debug_assert!(n >= 2);
        Self {
            children,
            max_child: vec![0.0; n],
            max_total: 0.0,
            did: 0,
            started: false,
        }
    }

    fn child_w_min(&self, i: usize, w_min: f64) -> f64 {
        (w_min - (self.max_total - self.max_child[i])).max(0.0)
    }

    /// Reposition on the smallest docid any child sits on.
    fn settle(&mut self) {
        let mut min = DocId::MAX;
        for child in &self.children {
            if !child.at_end() {
                let did = child.docid();
                if did != 0 && did < min {
                    min = did;
                }
            }
        }
        self.did = if min == DocId::MAX { 0 } else { min };
    }

    /// True for children positioned on the current docid.
    fn matches(&self, i: usize) -> bool {
        !self.children[i].at_end() && self.children[i].docid() == self.did
    }
}

impl PostList for MultiOrPostList {
    fn at_end(&self) -> bool {
        self.started && self.did == 0
    }

    fn docid(&self) -> DocId {
        self.did
    }

    fn wdf(&self) -> TermCount {
        (0..self.children.len())
            .filter(|&i| self.matches(i))
            .map(|i| self.children[i].wdf())
            .sum()
    }

    fn doclength(&self) -> TermCount {
        (0..self.children.len())
            .find(|&i| self.matches(i))
            .map(|i| self.children[i].doclength())
            .unwrap_or(0)
    }

    fn unique_terms(&self) -> TermCount {
        (0..self.children.len())
            .find(|&i| self.matches(i))
            .map(|i| self.children[i].unique_terms())
            .unwrap_or(0)
    }

    fn wdf_doc_max(&self) -> TermCount {
        (0..self.children.len())
            .find(|&i| self.matches(i))
            .map(|i| self.children[i].wdf_doc_max())
            .unwrap_or(0)
    }

    fn termfreq(&self) -> u32 {
        // Union bound: can't exceed the sum of the children.
        self.children
            .iter()
            .map(|c| c.termfreq())
            .fold(0u32, u32::saturating_add)
    }

    fn estimate_termfreqs(&self, stats: &CollectionStats) -> TermFreqs {
        // Independence union: N·(1 − Π(1 − tf_i/N)). Collection frequencies
        // add exactly.
        let mut miss = 1.0f64;
        let mut rel_miss = 1.0f64;
        let mut collfreq = 0u64;
        for child in &self.children {
            let freqs = child.estimate_termfreqs(stats);
            if stats.collection_size != 0 {
                miss *= 1.0 - freqs.termfreq as f64 / stats.collection_size as f64;
            }
            if stats.rset_size != 0 {
                rel_miss *= 1.0 - freqs.reltermfreq as f64 / stats.rset_size as f64;
            }
            collfreq += freqs.collfreq;
        }
        let termfreq = (stats.collection_size as f64 * (1.0 - miss) + 0.5) as u32;
        let relfreq = (stats.rset_size as f64 * (1.0 - rel_miss) + 0.5) as u32;
        TermFreqs::new(termfreq, relfreq, collfreq)
    }

    fn next(&mut self, w_min: f64) -> Result<()> {
        if self.started && self.did == 0 {
            return Ok(());
        }
        if !self.started {
            self.started = true;
            for i in 0..self.children.len() {
                let cw = self.child_w_min(i, w_min);
                self.children[i].next(cw)?;
            }
        } else {
            // Advance every child sitting on the current docid.
            for i in 0..self.children.len() {
                if self.matches(i) {
                    let cw = self.child_w_min(i, w_min);
                    self.children[i].next(cw)?;
                }
            }
        }
        self.settle();
        Ok(())
    }

    fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<()> {
        if self.started && self.did == 0 {
            return Ok(());
        }
        if !self.started {
            self.started = true;
            for i in 0..self.children.len() {
                let cw = self.child_w_min(i, w_min);
                self.children[i].next(cw)?;
            }
        }
        for i in 0..self.children.len() {
            if !self.children[i].at_end() && self.children[i].docid() < did {
                let cw = self.child_w_min(i, w_min);
                self.children[i].skip_to(did, cw)?;
            }
        }
        self.settle();
        Ok(())
    }

    fn get_weight(
        &self,
        doclen: TermCount,
        unique_terms: TermCount,
        wdf_doc_max: TermCount,
    ) -> f64 {
        (0..self.children.len())
            .filter(|&i| self.matches(i))
            .map(|i| self.children[i].get_weight(doclen, unique_terms, wdf_doc_max))
            .sum()
    }

    fn recalc_maxweight(&mut self) -> f64 {
        self.max_total = 0.0;
        for (i, child) in self.children.iter_mut().enumerate() {
            let new_max = child.recalc_maxweight();
            self.max_child[i] = new_max;
            self.max_total += new_max;
        }
        self.max_total
    }

    fn count_matching_subqs(&self) -> u32 {
        (0..self.children.len())
            .filter(|&i| self.matches(i))
            .map(|i| self.children[i].count_matching_subqs())
            .sum()
    }

    fn gather_position_lists(&mut self, collector: &mut PositionCollector) {
        let did = self.did;
        for child in &mut self.children {
            if !child.at_end() && child.docid() == did {
                child.gather_position_lists(collector);
            }
        }
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.children.iter().map(|c| c.describe()).collect();
        format!("({})", parts.join(" OR "))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{collect_docids, leaves};
    use super::*;

    #[test]
    fn test_union_ascending() {
        let children = leaves(&[&[1, 4, 9], &[2, 4, 7]]);
        let mut or = MultiOrPostList::new(children);
        or.recalc_maxweight();
        assert_eq!(collect_docids(&mut or), vec![1, 2, 4, 7, 9]);
    }

    #[test]
    fn test_three_way_union() {
        let children = leaves(&[&[5], &[1, 5], &[3]]);
        let mut or = MultiOrPostList::new(children);
        or.recalc_maxweight();
        assert_eq!(collect_docids(&mut or), vec![1, 3, 5]);
    }

    #[test]
    fn test_skip_to() {
        let children = leaves(&[&[1, 4, 9], &[2, 4, 7]]);
        let mut or = MultiOrPostList::new(children);
        or.recalc_maxweight();
        or.skip_to(5, 0.0).unwrap();
        assert_eq!(or.docid(), 7);
        or.next(0.0).unwrap();
        assert_eq!(or.docid(), 9);
        or.next(0.0).unwrap();
        assert!(or.at_end());
    }

    #[test]
    fn test_count_matching_subqs() {
        let children = leaves(&[&[1, 2], &[2, 3]]);
        let mut or = MultiOrPostList::new(children);
        or.recalc_maxweight();
        or.next(0.0).unwrap();
        assert_eq!(or.docid(), 1);
        assert_eq!(or.count_matching_subqs(), 1);
        or.next(0.0).unwrap();
        assert_eq!(or.docid(), 2);
        assert_eq!(or.count_matching_subqs(), 2);
    }
}
