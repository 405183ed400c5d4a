//! N-way AND combinator.

use crate::error::Result;
use crate::stats::{CollectionStats, TermFreqs};
use crate::{DocId, TermCount};

use super::{PositionCollector, PostList};

/// N-way AND: emits exactly the docids present in every child.
///
/// Children are owned exclusively; child 0 drives and the others are
/// probed with `check`, replaying as `skip_to` when a child cannot answer
/// in place. Docid 0 marks "not yet positioned / at end".
pub struct MultiAndPostList {
    children: Vec<Box<dyn PostList>>,
    max_child: Vec<f64>,
    max_total: f64,
    did: DocId,
    db_size: u32,
}

impl MultiAndPostList {
    /// `db_size` is the collection size used by the frequency estimates.
    pub fn new(children: Vec<Box<dyn PostList>>, db_size: u32) -> Self {
        let n = children.len();
        debug_assert!(n >= 2);
        Self {
            children,
            max_child: vec![0.0; n],
            max_total: 0.0,
            did: 0,
            db_size,
        }
    }

    pub(crate) fn children(&self) -> &[Box<dyn PostList>] {
        &self.children
    }

    /// The w_min a child sees: the rest of the tree can contribute at most
    /// the other children's maxweights.
    fn child_w_min(&self, i: usize, w_min: f64) -> f64 {
        w_min - (self.max_total - self.max_child[i])
    }

    fn find_next_match(&mut self, w_min: f64) -> Result<()> {
        'restart: loop {
            if self.children[0].at_end() {
                self.did = 0;
                return Ok(());
            }
            self.did = self.children[0].docid();
            for i in 1..self.children.len() {
                let cw = self.child_w_min(i, w_min);
                let valid = self.children[i].check(self.did, cw)?;
                if !valid {
                    let cw0 = self.child_w_min(0, w_min);
                    self.children[0].next(cw0)?;
                    continue 'restart;
                }
                if self.children[i].at_end() {
                    self.did = 0;
                    return Ok(());
                }
                let new_did = self.children[i].docid();
                if new_did != self.did {
                    let cw0 = self.child_w_min(0, w_min);
                    self.children[0].skip_to(new_did, cw0)?;
                    continue 'restart;
                }
            }
            return Ok(());
        }
    }
}

impl PostList for MultiAndPostList {
    fn at_end(&self) -> bool {
        self.did == 0
    }

    fn docid(&self) -> DocId {
        self.did
    }

    fn wdf(&self) -> TermCount {
        self.children.iter().map(|c| c.wdf()).sum()
    }

    fn doclength(&self) -> TermCount {
        self.children[0].doclength()
    }

    fn unique_terms(&self) -> TermCount {
        self.children[0].unique_terms()
    }

    fn wdf_doc_max(&self) -> TermCount {
        self.children[0].wdf_doc_max()
    }

    fn termfreq(&self) -> u32 {
        // Estimate assuming independence: the product of the children's
        // estimates divided by db_size (n - 1) times.
        if self.db_size == 0 {
            return 0;
        }
        let mut result = self.children[0].termfreq() as f64;
        for child in &self.children[1..] {
            result = result * child.termfreq() as f64 / self.db_size as f64;
        }
        (result + 0.5) as u32
    }

    fn estimate_termfreqs(&self, stats: &CollectionStats) -> TermFreqs {
        let freqs = self.children[0].estimate_termfreqs(stats);
        let mut freqest = freqs.termfreq as f64;
        let mut relfreqest = freqs.reltermfreq as f64;
        let mut collfreqest = freqs.collfreq as f64;

        for child in &self.children[1..] {
            let freqs = child.estimate_termfreqs(stats);
            if stats.collection_size != 0 {
                freqest = freqest * freqs.termfreq as f64 / stats.collection_size as f64;
            }
            if stats.total_length != 0 {
                collfreqest = collfreqest * freqs.collfreq as f64 / stats.total_length as f64;
            }
            if stats.rset_size != 0 {
                relfreqest = relfreqest * freqs.reltermfreq as f64 / stats.rset_size as f64;
            }
        }
        TermFreqs::new(
            (freqest + 0.5) as u32,
            (relfreqest + 0.5) as u32,
            (collfreqest + 0.5) as u64,
        )
    }

    fn next(&mut self, w_min: f64) -> Result<()> {
        let cw0 = self.child_w_min(0, w_min);
        self.children[0].next(cw0)?;
        self.find_next_match(w_min)
    }

    fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<()> {
        let cw0 = self.child_w_min(0, w_min);
        self.children[0].skip_to(did, cw0)?;
        self.find_next_match(w_min)
    }

    fn get_weight(
        &self,
        doclen: TermCount,
        unique_terms: TermCount,
        wdf_doc_max: TermCount,
    ) -> f64 {
        debug_assert!(self.did != 0);
        self.children
            .iter()
            .map(|c| c.get_weight(doclen, unique_terms, wdf_doc_max))
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
        self.children.iter().map(|c| c.count_matching_subqs()).sum()
    }

    fn gather_position_lists(&mut self, collector: &mut PositionCollector) {
        for child in &mut self.children {
            child.gather_position_lists(collector);
        }
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.children.iter().map(|c| c.describe()).collect();
        format!("({})", parts.join(" AND "))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{collect_docids, leaves};
    use super::*;

    #[test]
    fn test_intersection() {
        let children = leaves(&[&[1, 3, 5, 7], &[3, 4, 5, 8]]);
        let mut and = MultiAndPostList::new(children, 10);
        and.recalc_maxweight();
        assert_eq!(collect_docids(&mut and), vec![3, 5]);
    }

    #[test]
    fn test_three_way() {
        let children = leaves(&[&[1, 2, 3, 4, 5, 6], &[2, 4, 6, 8], &[1, 4, 6, 9]]);
        let mut and = MultiAndPostList::new(children, 10);
        and.recalc_maxweight();
        assert_eq!(collect_docids(&mut and), vec![4, 6]);
    }

    #[test]
    fn test_empty_intersection() {
        let children = leaves(&[&[1, 3], &[2, 4]]);
        let mut and = MultiAndPostList::new(children, 10);
        and.recalc_maxweight();
        assert_eq!(collect_docids(&mut and), Vec::<DocId>::new());
    }

    #[test]
    fn test_skip_to() {
        let children = leaves(&[&[1, 3, 5, 7, 9], &[3, 5, 7, 9]]);
        let mut and = MultiAndPostList::new(children, 10);
        and.recalc_maxweight();
        and.skip_to(6, 0.0).unwrap();
        assert_eq!(and.docid(), 7);
        and.next(0.0).unwrap();
        assert_eq!(and.docid(), 9);
        and.next(0.0).unwrap();
        assert!(and.at_end());
    }

    #[test]
    fn test_termfreq_estimate_assumes_independence() {
        let children = leaves(&[&[1, 2, 3, 4, 5], &[2, 4, 6, 8]]);
        let and = MultiAndPostList::new(children, 10);
        // 5 * 4 / 10 = 2.
        assert_eq!(and.termfreq(), 2);
    }

    #[test]
    fn test_describe() {
        let children = leaves(&[&[1], &[1]]);
        let and = MultiAndPostList::new(children, 10);
        assert_eq!(and.describe(), "(t0 AND t1)");
    }
}
