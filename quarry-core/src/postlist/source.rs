//! External posting sources: user-pluggable document streams with weights.

use std::sync::Arc;

use crate::DocId;
use crate::db::Shard;

/// A user-pluggable stream of weighted documents, registered by name.
///
/// Sources follow the leaf iterator contract: docids strictly ascend,
/// `at_end`/`docid` are meaningful after the first `next` or `skip_to`,
/// and `max_weight` bounds anything `weight` can return.
pub trait PostingSource: Send + Sync {
    /// Stable source name, the registry key.
    fn name(&self) -> &'static str;

    fn clone_boxed(&self) -> Box<dyn PostingSource>;

    /// Bind to a shard and reset to before the first document.
    fn reset(&mut self, shard: &Arc<Shard>);

    fn at_end(&self) -> bool;

    fn docid(&self) -> DocId;

    /// Weight of the current document.
    fn weight(&self) -> f64;

    /// Upper bound on `weight` across the stream.
    fn max_weight(&self) -> f64;

    /// Advance; documents whose weight cannot reach `min_weight` may be
    /// skipped.
    fn next(&mut self, min_weight: f64);

    fn skip_to(&mut self, did: DocId, min_weight: f64);
}

impl std::fmt::Debug for dyn PostingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PostingSource({})", self.name())
    }
}

/// Emits every document in the shard with one fixed weight.
#[derive(Debug, Clone)]
pub struct FixedWeightSource {
    wt: f64,
    did: DocId,
    last_docid: DocId,
    started: bool,
}

impl FixedWeightSource {
    pub fn new(wt: f64) -> Self {
        Self {
            wt,
            did: 0,
            last_docid: 0,
            started: false,
        }
    }
}

impl PostingSource for FixedWeightSource {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn clone_boxed(&self) -> Box<dyn PostingSource> {
        Box::new(self.clone())
    }

    fn reset(&mut self, shard: &Arc<Shard>) {
        self.last_docid = shard.num_docs();
        self.did = 0;
        self.started = false;
    }

    fn at_end(&self) -> bool {
        self.started && self.did == 0
    }

    fn docid(&self) -> DocId {
        self.did
    }

    fn weight(&self) -> f64 {
        self.wt
    }

    fn max_weight(&self) -> f64 {
        self.wt
    }

    fn next(&mut self, _min_weight: f64) {
        self.started = true;
        self.did = if self.did < self.last_docid {
            self.did + 1
        } else {
            0
        };
    }

    fn skip_to(&mut self, did: DocId, _min_weight: f64) {
        self.started = true;
        self.did = if did <= self.last_docid { did.max(1) } else { 0 };
    }
}
