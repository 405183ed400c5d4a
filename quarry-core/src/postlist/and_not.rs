//! AND_NOT combinator.

use crate::error::Result;
use crate::stats::{CollectionStats, TermFreqs};
use crate::{DocId, TermCount};

use super::{PositionCollector, PostList};

/// Left-dominant difference: emits the left child's docids that the right
/// child does not match. The right side is a filter advanced lazily and its
/// weight is ignored.
pub struct AndNotPostList {
    left: Box<dyn PostList>,
    right: Box<dyn PostList>,
    right_started: bool,
    did: DocId,
}

impl AndNotPostList {
    pub fn new(left: Box<dyn PostList>, right: Box<dyn PostList>) -> Self {
        Self {
            left,
            right,
            right_started: false,
            did: 0,
        }
    }

    /// After the left child moved, settle on its next unfiltered docid.
    fn find_next_unfiltered(&mut self, w_min: f64) -> Result<()> {
        loop {
            if self.left.at_end() {
                self.did = 0;
                return Ok(());
            }
            let did = self.left.docid();
            if !self.right_started {
                self.right_started = true;
                self.right.skip_to(did, 0.0)?;
            } else if !self.right.at_end() && self.right.docid() < did {
                self.right.skip_to(did, 0.0)?;
            }
            if !self.right.at_end() && self.right.docid() == did {
                self.left.next(w_min)?;
                continue;
            }
            self.did = did;
            return Ok(());
        }
    }
}

impl PostList for AndNotPostList {
    fn at_end(&self) -> bool {
        self.did == 0
    }

    fn docid(&self) -> DocId {
        self.did
    }

    fn wdf(&self) -> TermCount {
        self.left.wdf()
    }

    fn doclength(&self) -> TermCount {
        self.left.doclength()
    }

    fn unique_terms(&self) -> TermCount {
        self.left.unique_terms()
    }

    fn wdf_doc_max(&self) -> TermCount {
        self.left.wdf_doc_max()
    }

    fn termfreq(&self) -> u32 {
        self.left.termfreq()
    }

    fn estimate_termfreqs(&self, stats: &CollectionStats) -> TermFreqs {
        let left = self.left.estimate_termfreqs(stats);
        let right = self.right.estimate_termfreqs(stats);
        // Independence: scale the left down by the right's coverage.
        let mut freqs = left;
        if stats.collection_size != 0 {
            let keep = 1.0 - right.termfreq as f64 / stats.collection_size as f64;
            freqs.termfreq = (left.termfreq as f64 * keep.max(0.0) + 0.5) as u32;
        }
        if stats.rset_size != 0 {
            let keep = 1.0 - right.reltermfreq as f64 / stats.rset_size as f64;
            freqs.reltermfreq = (left.reltermfreq as f64 * keep.max(0.0) + 0.5) as u32;
        }
        freqs
    }

    fn next(&mut self, w_min: f64) -> Result<()> {
        self.left.next(w_min)?;
        self.find_next_unfiltered(w_min)
    }

    fn skip_to(&mut self, did: DocId, w_min: f64) -> Result<()> {
        self.left.skip_to(did, w_min)?;
        self.find_next_unfiltered(w_min)
    }

    fn get_weight(
        &self,
        doclen: TermCount,
        unique_terms: TermCount,
        wdf_doc_max: TermCount,
    ) -> f64 {
        self.left.get_weight(doclen, unique_terms, wdf_doc_max)
    }

    fn recalc_maxweight(&mut self) -> f64 {
        // The filter contributes no weight.
        self.right.recalc_maxweight();
        self.left.recalc_maxweight()
    }

    fn count_matching_subqs(&self) -> u32 {
        self.left.count_matching_subqs()
    }

    fn gather_position_lists(&mut self, collector: &mut PositionCollector) {
        self.left.gather_position_lists(collector);
    }

    fn describe(&self) -> String {
        format!("({} AND_NOT {})", self.left.describe(), self.right.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{collect_docids, leaf};
    use super::*;

    #[test]
    fn test_difference() {
        let left = Box::new(leaf(&[1, 2, 3, 4, 5], "l"));
        let right = Box::new(leaf(&[2, 4], "r"));
        let mut and_not = AndNotPostList::new(left, right);
        assert_eq!(collect_docids(&mut and_not), vec![1, 3, 5]);
    }

    #[test]
    fn test_filter_exhausted_early() {
        let left = Box::new(leaf(&[1, 5, 9], "l"));
        let right = Box::new(leaf(&[1, 2], "r"));
        let mut and_not = AndNotPostList::new(left, right);
        assert_eq!(collect_docids(&mut and_not), vec![5, 9]);
    }

    #[test]
    fn test_everything_filtered() {
        let left = Box::new(leaf(&[2, 4], "l"));
        let right = Box::new(leaf(&[1, 2, 3, 4], "r"));
        let mut and_not = AndNotPostList::new(left, right);
        assert_eq!(collect_docids(&mut and_not), Vec::<DocId>::new());
    }

    #[test]
    fn test_skip_to() {
        let left = Box::new(leaf(&[1, 2, 3, 4, 5, 6], "l"));
        let right = Box::new(leaf(&[4], "r"));
        let mut and_not = AndNotPostList::new(left, right);
        and_not.skip_to(4, 0.0).unwrap();
        assert_eq!(and_not.docid(), 5);
    }
}
