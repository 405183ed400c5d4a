//! Weighting schemes.
//!
//! A scheme declares which corpus statistics it needs, is cloned per query
//! term, initialised with those statistics, and then asked for per-document
//! score contributions plus a sound upper bound on anything it can return.
//! The matcher's pruning is only correct if `max_part()` really dominates
//! every possible `sum_part()` and likewise for the extra parts.

mod bm25;
mod dfr;
mod lm;
mod simple;
mod tfidf;

pub use bm25::{Bm25PlusWeight, Bm25Weight};
pub use dfr::{
    BB2Weight, DLHWeight, DPHWeight, IfB2Weight, IneB2Weight, InL2Weight, PL2PlusWeight, PL2Weight,
};
pub use lm::{LM2StageWeight, LMAbsDiscountWeight, LMDirichletWeight, LMJMWeight};
pub use simple::{BoolWeight, CoordWeight};
pub use tfidf::TfIdfWeight;

use crate::TermCount;
use crate::error::{Error, Result};
use crate::stats::{StatFlags, WeightContext};

/// A pluggable weighting scheme.
///
/// One prototype instance lives in the registry; `clone_boxed` copies are
/// made per query term, then `init` is called exactly once with the gathered
/// statistics before the first score request. `init` with factor 0 marks the
/// copy used only for the query-independent extra part.
pub trait Weight: Send + Sync {
    /// Stable scheme name, the registry key.
    fn name(&self) -> &'static str;

    fn clone_boxed(&self) -> Box<dyn Weight>;

    /// The statistics this scheme consults. Anything else reads as 0.
    fn needs(&self) -> StatFlags;

    /// Precompute per-query constants. `factor` is the outer factor; the
    /// scheme folds in wqf itself.
    fn init(&mut self, ctx: &WeightContext, factor: f64);

    /// Query-dependent contribution for one posting.
    fn sum_part(
        &self,
        wdf: TermCount,
        doclen: TermCount,
        unique_terms: TermCount,
        wdf_doc_max: TermCount,
    ) -> f64;

    /// Upper bound on anything `sum_part` can return.
    fn max_part(&self) -> f64;

    /// Query-independent contribution for one document.
    fn sum_extra(&self, doclen: TermCount, unique_terms: TermCount) -> f64 {
        let _ = (doclen, unique_terms);
        0.0
    }

    /// Upper bound on anything `sum_extra` can return.
    fn max_extra(&self) -> f64 {
        0.0
    }

    /// Encode the scheme's parameters as portable doubles.
    fn serialise(&self) -> Vec<u8>;

    /// Decode a scheme of this kind from `serialise` output. Trailing bytes
    /// are a serialisation error.
    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>>;

    /// Build a scheme of this kind from user parameter text. Empty text
    /// yields the defaults.
    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>>;
}

impl Clone for Box<dyn Weight> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

impl std::fmt::Debug for dyn Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Weight({})", self.name())
    }
}

// ── Parameter serialisation helpers ──────────────────────────────────────

/// Append one double in the portable wire encoding.
pub(crate) fn serialise_double(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Reader over a serialised parameter block which rejects truncation and,
/// at `finish`, trailing bytes.
pub(crate) struct ParamReader<'a> {
    data: &'a [u8],
    scheme: &'static str,
}

impl<'a> ParamReader<'a> {
    pub fn new(data: &'a [u8], scheme: &'static str) -> Self {
        Self { data, scheme }
    }

    pub fn read_double(&mut self) -> Result<f64> {
        if self.data.len() < 8 {
            return Err(Error::Serialisation(format!(
                "truncated {} parameters",
                self.scheme
            )));
        }
        let (head, rest) = self.data.split_at(8);
        self.data = rest;
        Ok(f64::from_le_bytes(head.try_into().unwrap()))
    }

    pub fn finish(self) -> Result<()> {
        if !self.data.is_empty() {
            return Err(Error::Serialisation(format!(
                "extra data after {} parameters",
                self.scheme
            )));
        }
        Ok(())
    }
}

/// Parse user parameter text: a whitespace/comma-separated list of doubles,
/// one per declared parameter. Missing, extra or unparseable numbers are
/// invalid-argument errors naming the scheme and the offending position.
pub(crate) fn parse_double_params(
    text: &str,
    scheme: &'static str,
    count: usize,
) -> Result<Vec<f64>> {
    let mut values = Vec::with_capacity(count);
    for (i, token) in text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .enumerate()
    {
        if i >= count {
            return Err(Error::InvalidArgument(format!(
                "{}: extra data after parameter {}",
                scheme, count
            )));
        }
        let value: f64 = token.parse().map_err(|_| {
            Error::InvalidArgument(format!("{}: parameter {} is invalid", scheme, i + 1))
        })?;
        values.push(value);
    }
    if values.len() < count {
        return Err(Error::InvalidArgument(format!(
            "{}: parameter {} is missing",
            scheme,
            values.len() + 1
        )));
    }
    Ok(values)
}
