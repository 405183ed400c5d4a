//! The BM25 probabilistic scheme and its lower-bounded BM25+ variant.

use crate::TermCount;
use crate::error::{Error, Result};
use crate::stats::{StatFlags, WeightContext};

use super::{ParamReader, Weight, parse_double_params, serialise_double};

fn bm25_needs() -> StatFlags {
    StatFlags::COLLECTION_SIZE
        | StatFlags::AVERAGE_LENGTH
        | StatFlags::DOC_LENGTH
        | StatFlags::DOC_LENGTH_MIN
        | StatFlags::TERM_FREQ
        | StatFlags::REL_FREQ
        | StatFlags::WDF
        | StatFlags::WDF_MAX
        | StatFlags::WQF
        | StatFlags::QUERY_LENGTH
}

/// Robertson–Sparck-Jones term weight, smoothed so frequent terms stay
/// positive. With an empty relevance set this is the familiar
/// `ln((N - n + 0.5) / (n + 0.5) + 1)`.
fn rsj_weight(termfreq: u32, reltermfreq: u32, collection_size: u32, rset_size: u32) -> f64 {
    let n = collection_size as f64;
    let tf = termfreq as f64;
    let r = reltermfreq as f64;
    let big_r = rset_size as f64;
    let num = (r + 0.5) * (n - big_r - tf + r + 0.5);
    let den = (tf - r + 0.5) * (big_r - r + 0.5);
    if num <= 0.0 || den <= 0.0 {
        return 0.0;
    }
    (num / den + 1.0).ln()
}

/// The Okapi BM25 scheme.
///
/// Parameters in declaration order: k1, k2, k3, b, min_normlen. k1/b shape
/// the saturating wdf part, k3 the wqf saturation, k2 scales the
/// query-independent length correction, and min_normlen floors the
/// normalised length.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Weight {
    k1: f64,
    k2: f64,
    k3: f64,
    b: f64,
    min_normlen: f64,

    factor: f64,
    termweight: f64,
    average_length: f64,
    query_length: f64,
    upper_bound: f64,
    extra_bound: f64,
}

impl Default for Bm25Weight {
    fn default() -> Self {
        Self {
            k1: 1.0,
            k2: 0.0,
            k3: 1.0,
            b: 0.5,
            min_normlen: 0.5,
            factor: 0.0,
            termweight: 0.0,
            average_length: 1.0,
            query_length: 0.0,
            upper_bound: 0.0,
            extra_bound: 0.0,
        }
    }
}

impl Bm25Weight {
    pub fn new(k1: f64, k2: f64, k3: f64, b: f64, min_normlen: f64) -> Result<Self> {
        if k1 < 0.0 {
            return Err(Error::InvalidArgument("bm25: parameter k1 is invalid".into()));
        }
        if k2 < 0.0 {
            return Err(Error::InvalidArgument("bm25: parameter k2 is invalid".into()));
        }
        if k3 < 0.0 {
            return Err(Error::InvalidArgument("bm25: parameter k3 is invalid".into()));
        }
        if !(0.0..=1.0).contains(&b) {
            return Err(Error::InvalidArgument("bm25: parameter b is invalid".into()));
        }
        if min_normlen < 0.0 {
            return Err(Error::InvalidArgument(
                "bm25: parameter min_normlen is invalid".into(),
            ));
        }
        Ok(Self {
            k1,
            k2,
            k3,
            b,
            min_normlen,
            factor: 0.0,
            termweight: 0.0,
            average_length: 1.0,
            query_length: 0.0,
            upper_bound: 0.0,
            extra_bound: 0.0,
        })
    }

    fn normlen(&self, doclen: TermCount) -> f64 {
        let avg = if self.average_length > 0.0 {
            self.average_length
        } else {
            1.0
        };
        (doclen as f64 / avg).max(self.min_normlen)
    }

    fn wdf_part(&self, wdf: f64, normlen: f64) -> f64 {
        if self.k1 == 0.0 {
            return 1.0;
        }
        let denom = self.k1 * ((1.0 - self.b) + self.b * normlen) + wdf;
        wdf * (self.k1 + 1.0) / denom
    }

    fn extra_at(&self, normlen: f64) -> f64 {
        let raw = self.k2 * self.query_length * (1.0 - normlen) / (1.0 + normlen);
        raw.max(0.0)
    }
}

impl Weight for Bm25Weight {
    fn name(&self) -> &'static str {
        "bm25"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        bm25_needs()
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        self.average_length = ctx.stats.average_length();
        self.query_length = ctx.stats.query_length as f64;

        // The k2 extra part is query-independent, so it is computed even for
        // the factor-0 copy.
        self.extra_bound = if self.k2 > 0.0 {
            self.extra_at(self.normlen(ctx.stats.doclength_lower_bound))
        } else {
            0.0
        };

        if factor == 0.0 {
            return;
        }

        let wqf = ctx.wqf as f64;
        let wqf_part = if self.k3 == 0.0 {
            1.0
        } else {
            (self.k3 + 1.0) * wqf / (self.k3 + wqf)
        };
        self.factor = factor * wqf_part;
        self.termweight = rsj_weight(
            ctx.freqs.termfreq,
            ctx.freqs.reltermfreq,
            ctx.stats.collection_size,
            ctx.stats.rset_size,
        );

        let wdf_upper = ctx.wdf_upper_bound as f64;
        if wdf_upper == 0.0 {
            self.upper_bound = 0.0;
            return;
        }
        // The wdf part grows with wdf and shrinks with normlen, so the bound
        // is at the wdf ceiling and the shortest document.
        let min_normlen = self.normlen(ctx.stats.doclength_lower_bound);
        self.upper_bound =
            (self.factor * self.termweight * self.wdf_part(wdf_upper, min_normlen)).max(0.0);
    }

    fn sum_part(&self, wdf: TermCount, doclen: TermCount, _: TermCount, _: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        let wt = self.factor * self.termweight * self.wdf_part(wdf as f64, self.normlen(doclen));
        wt.max(0.0)
    }

    fn max_part(&self) -> f64 {
        self.upper_bound
    }

    fn sum_extra(&self, doclen: TermCount, _: TermCount) -> f64 {
        if self.k2 == 0.0 {
            return 0.0;
        }
        self.extra_at(self.normlen(doclen))
    }

    fn max_extra(&self) -> f64 {
        self.extra_bound
    }

    fn serialise(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(40);
        serialise_double(&mut out, self.k1);
        serialise_double(&mut out, self.k2);
        serialise_double(&mut out, self.k3);
        serialise_double(&mut out, self.b);
        serialise_double(&mut out, self.min_normlen);
        out
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        let mut reader = ParamReader::new(data, "bm25");
        let k1 = reader.read_double()?;
        let k2 = reader.read_double()?;
        let k3 = reader.read_double()?;
        let b = reader.read_double()?;
        let min_normlen = reader.read_double()?;
        reader.finish()?;
        Ok(Box::new(Bm25Weight::new(k1, k2, k3, b, min_normlen)?))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        if params.is_empty() {
            return Ok(Box::new(Bm25Weight::default()));
        }
        let p = parse_double_params(params, "bm25", 5)?;
        Ok(Box::new(Bm25Weight::new(p[0], p[1], p[2], p[3], p[4])?))
    }
}

/// BM25+: BM25 with a per-occurrence lower bound delta, so long documents
/// containing the term keep a minimum advantage over those without it.
#[derive(Debug, Clone, Copy)]
pub struct Bm25PlusWeight {
    inner: Bm25Weight,
    delta: f64,
}

impl Default for Bm25PlusWeight {
    fn default() -> Self {
        Self {
            inner: Bm25Weight::default(),
            delta: 1.0,
        }
    }
}

impl Bm25PlusWeight {
    pub fn new(k1: f64, k2: f64, k3: f64, b: f64, min_normlen: f64, delta: f64) -> Result<Self> {
        if delta <= 0.0 {
            return Err(Error::InvalidArgument(
                "bm25+: parameter delta is invalid".into(),
            ));
        }
        Ok(Self {
            inner: Bm25Weight::new(k1, k2, k3, b, min_normlen)?,
            delta,
        })
    }
}

impl Weight for Bm25PlusWeight {
    fn name(&self) -> &'static str {
        "bm25+"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        bm25_needs()
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        self.inner.init(ctx, factor);
    }

    fn sum_part(
        &self,
        wdf: TermCount,
        doclen: TermCount,
        unique_terms: TermCount,
        wdf_doc_max: TermCount,
    ) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        let base = self.inner.sum_part(wdf, doclen, unique_terms, wdf_doc_max);
        base + self.inner.factor * self.inner.termweight * self.delta
    }

    fn max_part(&self) -> f64 {
        self.inner.max_part() + self.inner.factor * self.inner.termweight * self.delta
    }

    fn sum_extra(&self, doclen: TermCount, unique_terms: TermCount) -> f64 {
        self.inner.sum_extra(doclen, unique_terms)
    }

    fn max_extra(&self) -> f64 {
        self.inner.max_extra()
    }

    fn serialise(&self) -> Vec<u8> {
        let mut out = self.inner.serialise();
        serialise_double(&mut out, self.delta);
        out
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        let mut reader = ParamReader::new(data, "bm25+");
        let k1 = reader.read_double()?;
        let k2 = reader.read_double()?;
        let k3 = reader.read_double()?;
        let b = reader.read_double()?;
        let min_normlen = reader.read_double()?;
        let delta = reader.read_double()?;
        reader.finish()?;
        Ok(Box::new(Bm25PlusWeight::new(k1, k2, k3, b, min_normlen, delta)?))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        if params.is_empty() {
            return Ok(Box::new(Bm25PlusWeight::default()));
        }
        let p = parse_double_params(params, "bm25+", 6)?;
        Ok(Box::new(Bm25PlusWeight::new(
            p[0], p[1], p[2], p[3], p[4], p[5],
        )?))
    }
}
