//! Leaf iterator over one term's posting stream.

use std::sync::Arc;

use crate::db::Shard;
use crate::error::Result;
use crate::stats::{CollectionStats, TermFreqs};
use crate::weight::Weight;
use crate::{DocId, TermCount};

use super::{PositionCollector, PostList, TermPostings};

/// Iterator over one term's postings in one shard, scored by an
/// initialised scheme clone. Conservative: `w_min` is ignored, every
/// posting is emitted.
pub struct TermPostList {
    term: Vec<u8>,
    postings: Arc<TermPostings>,
    shard: Arc<Shard>,
    scheme: Box<dyn Weight>,
    idx: usize,
    started: bool,
    at_end: bool,
}

impl TermPostList {
    pub fn new(
        term: impl Into<Vec<u8>>,
        postings: Arc<TermPostings>,
        shard: Arc<Shard>,
        scheme: Box<dyn Weight>,
    ) -> Self {
        Self {
            term: term.into(),
            postings,
            shard,
            scheme,
            idx: 0,
            started: false,
            at_end: false,
        }
    }

    pub fn term(&self) -> &[u8] {
        &self.term
    }

    /// Upper bound on the wdf of any posting this leaf can emit.
    pub fn wdf_upper_bound(&self) -> TermCount {
        self.postings.wdf_max
    }

    fn current(&self) -> Option<&super::Posting> {
        if self.started && !self.at_end {
            self.postings.postings.get(self.idx)
        } else {
            None
        }
    }
}

impl PostList for TermPostList {
    fn at_end(&self) -> bool {
        self.at_end
    }

    fn docid(&self) -> DocId {
        self.current().map(|p| p.docid).unwrap_or(0)
    }

    fn wdf(&self) -> TermCount {
        self.current().map(|p| p.wdf).unwrap_or(0)
    }

    fn doclength(&self) -> TermCount {
        self.current()
            .and_then(|p| self.shard.doc_data(p.docid).ok())
            .map(|(doclen, _, _)| doclen)
            .unwrap_or(0)
    }

    fn unique_terms(&self) -> TermCount {
        self.current()
            .and_then(|p| self.shard.doc_data(p.docid).ok())
            .map(|(_, unique, _)| unique)
            .unwrap_or(0)
    }

    fn wdf_doc_max(&self) -> TermCount {
        self.current()
            .and_then(|p| self.shard.doc_data(p.docid).ok())
            .map(|(_, _, wdfmax)| wdfmax)
            .unwrap_or(0)
    }

    fn termfreq(&self) -> u32 {
        self.postings.termfreq()
    }

    fn estimate_termfreqs(&self, _stats: &CollectionStats) -> TermFreqs {
        TermFreqs::new(self.postings.termfreq(), 0, self.postings.collfreq)
    }

    fn next(&mut self, _w_min: f64) -> Result<()> {
        if self.at_end {
            return Ok(());
        }
        if self.started {
            self.idx += 1;
        } else {
            self.started = true;
            self.idx = 0;
        }
        self.at_end = self.idx >= self.postings.postings.len();
        Ok(())
    }

    fn skip_to(&mut self, did: DocId, _w_min: f64) -> Result<()> {
        if self.at_end {
            return Ok(());
        }
        if !self.started {
            self.started = true;
            self.idx = 0;
        }
        if self.docid() >= did && self.current().is_some() {
            return Ok(());
        }
        let rest = &self.postings.postings[self.idx..];
        self.idx += rest.partition_point(|p| p.docid < did);
        self.at_end = self.idx >= self.postings.postings.len();
        Ok(())
    }

    fn get_weight(
        &self,
        doclen: TermCount,
        unique_terms: TermCount,
        wdf_doc_max: TermCount,
    ) -> f64 {
        self.scheme
            .sum_part(self.wdf(), doclen, unique_terms, wdf_doc_max)
    }

    fn recalc_maxweight(&mut self) -> f64 {
        self.scheme.max_part()
    }

    fn count_matching_subqs(&self) -> u32 {
        1
    }

    fn position_list(&self) -> Option<&[u32]> {
        self.current().map(|p| p.positions.as_slice())
    }

    fn gather_position_lists(&mut self, collector: &mut PositionCollector) {
        if let Some(p) = self.current() {
            collector.add(&p.positions);
        }
    }

    fn describe(&self) -> String {
        String::from_utf8_lossy(&self.term).into_owned()
    }
}
