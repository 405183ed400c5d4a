//! In-memory shard: documents, per-term posting streams and the metadata
//! the matcher fetches per candidate.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::postlist::{Posting, TermPostings};
use crate::stats::{CollectionStats, TermFreqs};
use crate::table::{self, TableIndexKind, TableWriter};
use crate::{DocId, TermCount};

#[derive(Debug, Clone)]
struct DocEntry {
    doc: Document,
    doclen: TermCount,
    unique_terms: TermCount,
    wdf_doc_max: TermCount,
}

#[derive(Debug, Default, Clone)]
struct ShardState {
    docs: BTreeMap<DocId, DocEntry>,
    postings: BTreeMap<Vec<u8>, Arc<TermPostings>>,
    next_docid: DocId,
    total_length: u64,
}

#[derive(Debug, Default)]
struct ShardInner {
    state: ShardState,
    session_open: bool,
    /// State snapshot taken at begin_transaction, restored on cancel.
    transaction: Option<ShardState>,
    /// Bumped by flush.
    revision: u64,
}

/// One index partition. Readers snapshot `Arc`s out of the state; writers
/// mutate under the lock with copy-on-write posting streams, so a tree
/// built before a write keeps iterating its own snapshot.
#[derive(Debug, Default)]
pub struct Shard {
    inner: RwLock<ShardInner>,
}

impl Shard {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Read side ────────────────────────────────────────────────────────

    pub fn num_docs(&self) -> u32 {
        self.inner.read().state.docs.len() as u32
    }

    pub fn term_postings(&self, term: &[u8]) -> Option<Arc<TermPostings>> {
        self.inner.read().state.postings.get(term).cloned()
    }

    pub fn term_freqs(&self, term: &[u8]) -> TermFreqs {
        match self.inner.read().state.postings.get(term) {
            Some(tp) => TermFreqs::new(tp.termfreq(), 0, tp.collfreq),
            None => TermFreqs::default(),
        }
    }

    /// Upper bound on the wdf of any posting of `term` in this shard.
    pub fn wdf_upper_bound(&self, term: &[u8]) -> TermCount {
        self.inner
            .read()
            .state
            .postings
            .get(term)
            .map(|tp| tp.wdf_max)
            .unwrap_or(0)
    }

    /// doclen, unique-terms and max-wdf of one document.
    pub fn doc_data(&self, did: DocId) -> Result<(TermCount, TermCount, TermCount)> {
        let inner = self.inner.read();
        let entry = inner
            .state
            .docs
            .get(&did)
            .ok_or(Error::DocumentNotFound(did))?;
        Ok((entry.doclen, entry.unique_terms, entry.wdf_doc_max))
    }

    pub fn get_document(&self, did: DocId) -> Result<Document> {
        let inner = self.inner.read();
        inner
            .state
            .docs
            .get(&did)
            .map(|e| e.doc.clone())
            .ok_or(Error::DocumentNotFound(did))
    }

    /// Corpus statistics of this shard. The relevance-set and query fields
    /// are the caller's to fill.
    pub fn collection_stats(&self) -> CollectionStats {
        let inner = self.inner.read();
        let state = &inner.state;
        let mut stats = CollectionStats {
            collection_size: state.docs.len() as u32,
            total_length: state.total_length,
            ..Default::default()
        };
        let mut first = true;
        for entry in state.docs.values() {
            if first {
                stats.doclength_lower_bound = entry.doclen;
                stats.doclength_upper_bound = entry.doclen;
                stats.unique_terms_lower_bound = entry.unique_terms;
                stats.unique_terms_upper_bound = entry.unique_terms;
                first = false;
            } else {
                stats.doclength_lower_bound = stats.doclength_lower_bound.min(entry.doclen);
                stats.doclength_upper_bound = stats.doclength_upper_bound.max(entry.doclen);
                stats.unique_terms_lower_bound =
                    stats.unique_terms_lower_bound.min(entry.unique_terms);
                stats.unique_terms_upper_bound =
                    stats.unique_terms_upper_bound.max(entry.unique_terms);
            }
            stats.wdf_upper_bound = stats.wdf_upper_bound.max(entry.wdf_doc_max);
        }
        stats
    }

    /// All indexed terms in byte order.
    pub fn terms(&self) -> Vec<Vec<u8>> {
        self.inner.read().state.postings.keys().cloned().collect()
    }

    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    /// Serialise the term dictionary as an ordered key/value table mapping
    /// each term to varint(termfreq) + varint(collfreq).
    pub fn export_term_dictionary(&self, kind: TableIndexKind) -> Result<Vec<u8>> {
        let inner = self.inner.read();
        let mut writer = TableWriter::new(kind);
        for (term, tp) in &inner.state.postings {
            let mut tag = Vec::new();
            table::write_vint(&mut tag, tp.termfreq() as u64);
            table::write_vint(&mut tag, tp.collfreq);
            writer.insert(term, &tag)?;
        }
        writer.finish()
    }

    // ── Write side ───────────────────────────────────────────────────────

    pub fn add_document(&self, doc: &Document) -> Result<DocId> {
        let mut inner = self.inner.write();
        let did = inner.state.next_docid + 1;
        inner.state.next_docid = did;
        Self::insert_doc(&mut inner.state, did, doc);
        Ok(did)
    }

    pub fn replace_document(&self, did: DocId, doc: &Document) -> Result<()> {
        if did == 0 {
            return Err(Error::InvalidArgument("document id 0 is reserved".into()));
        }
        let mut inner = self.inner.write();
        if inner.state.docs.contains_key(&did) {
            Self::remove_doc(&mut inner.state, did);
        }
        inner.state.next_docid = inner.state.next_docid.max(did);
        Self::insert_doc(&mut inner.state, did, doc);
        Ok(())
    }

    pub fn delete_document(&self, did: DocId) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.state.docs.contains_key(&did) {
            return Err(Error::DocumentNotFound(did));
        }
        Self::remove_doc(&mut inner.state, did);
        Ok(())
    }

    fn insert_doc(state: &mut ShardState, did: DocId, doc: &Document) {
        let doclen = doc.length();
        let entry = DocEntry {
            doc: doc.clone(),
            doclen,
            unique_terms: doc.termlist_count(),
            wdf_doc_max: doc.wdf_max(),
        };
        state.total_length += doclen as u64;
        for (term, te) in doc.terms() {
            let tp = Arc::make_mut(state.postings.entry(term.to_vec()).or_default());
            let posting = Posting {
                docid: did,
                wdf: te.wdf,
                positions: te.positions.clone(),
            };
            match tp.postings.binary_search_by_key(&did, |p| p.docid) {
                Ok(_) => {}
                Err(at) => tp.postings.insert(at, posting),
            }
            tp.collfreq += te.wdf as u64;
            tp.wdf_max = tp.wdf_max.max(te.wdf);
        }
        state.docs.insert(did, entry);
    }

    fn remove_doc(state: &mut ShardState, did: DocId) {
        let entry = match state.docs.remove(&did) {
            Some(e) => e,
            None => return,
        };
        state.total_length -= entry.doclen as u64;
        for (term, te) in entry.doc.terms() {
            let drop_term = {
                let tp = match state.postings.get_mut(term) {
                    Some(tp) => Arc::make_mut(tp),
                    None => continue,
                };
                if let Ok(at) = tp.postings.binary_search_by_key(&did, |p| p.docid) {
                    tp.postings.remove(at);
                }
                tp.collfreq -= te.wdf as u64;
                tp.wdf_max = tp.postings.iter().map(|p| p.wdf).max().unwrap_or(0);
                tp.postings.is_empty()
            };
            if drop_term {
                state.postings.remove(term);
            }
        }
    }

    // ── Sessions, transactions, flush ────────────────────────────────────

    pub fn begin_session(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.session_open {
            return Err(Error::InvalidOperation("session already in progress".into()));
        }
        inner.session_open = true;
        Ok(())
    }

    pub fn end_session(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if !inner.session_open {
            return Err(Error::InvalidOperation("no session in progress".into()));
        }
        inner.session_open = false;
        inner.revision += 1;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.revision += 1;
        Ok(())
    }

    pub fn begin_transaction(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.transaction.is_some() {
            return Err(Error::InvalidOperation(
                "transaction already in progress".into(),
            ));
        }
        inner.transaction = Some(inner.state.clone());
        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.transaction.take().is_none() {
            return Err(Error::InvalidOperation("no transaction in progress".into()));
        }
        inner.revision += 1;
        Ok(())
    }

    pub fn cancel_transaction(&self) -> Result<()> {
        let mut inner = self.inner.write();
        match inner.transaction.take() {
            Some(saved) => {
                inner.state = saved;
                Ok(())
            }
            None => Err(Error::InvalidOperation("no transaction in progress".into())),
        }
    }
}
