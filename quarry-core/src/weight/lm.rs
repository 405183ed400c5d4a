//! Query-likelihood language-model schemes: Jelinek-Mercer, Dirichlet,
//! absolute discounting and two-stage smoothing.
//!
//! Scores are the per-term log ratio of the smoothed document model against
//! the same model at wdf = 0, so contributions are non-negative and vanish
//! for documents not containing the term. Dirichlet keeps its document
//! length prior in the query-independent extra part.

use crate::TermCount;
use crate::error::{Error, Result};
use crate::stats::{StatFlags, WeightContext};

use super::{ParamReader, Weight, parse_double_params, serialise_double};

fn lm_needs() -> StatFlags {
    StatFlags::COLLECTION_SIZE
        | StatFlags::TOTAL_LENGTH
        | StatFlags::DOC_LENGTH
        | StatFlags::DOC_LENGTH_MIN
        | StatFlags::DOC_LENGTH_MAX
        | StatFlags::COLLECTION_FREQ
        | StatFlags::WDF
        | StatFlags::WDF_MAX
        | StatFlags::WQF
}

/// Background model probability of the term: collfreq over total collection
/// length. Zero when the term is unseen.
fn background_p(ctx: &WeightContext) -> f64 {
    if ctx.stats.total_length == 0 {
        return 0.0;
    }
    ctx.freqs.collfreq as f64 / ctx.stats.total_length as f64
}

/// Shortest document that can hold `wdf_upper` occurrences.
fn shortest_feasible(ctx: &WeightContext) -> f64 {
    (ctx.stats.doclength_lower_bound as f64)
        .max(ctx.wdf_upper_bound as f64)
        .max(1.0)
}

// ── Jelinek-Mercer ───────────────────────────────────────────────────────

/// Jelinek-Mercer smoothing: linear interpolation between the document and
/// collection models, weighted by lambda.
#[derive(Debug, Clone, Copy)]
pub struct LMJMWeight {
    lambda: f64,
    factor: f64,
    p_background: f64,
    upper_bound: f64,
}

impl Default for LMJMWeight {
    fn default() -> Self {
        Self {
            lambda: 0.5,
            factor: 0.0,
            p_background: 0.0,
            upper_bound: 0.0,
        }
    }
}

impl LMJMWeight {
    pub fn new(lambda: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&lambda) || lambda == 0.0 {
            return Err(Error::InvalidArgument(
                "lmjm: parameter lambda is invalid".into(),
            ));
        }
        Ok(Self {
            lambda,
            ..Self::default()
        })
    }

    fn weight_at(&self, wdf: f64, doclen: f64) -> f64 {
        // log(1 + (1-λ)·wdf / (λ·|D|·p_c))
        let denom = self.lambda * doclen * self.p_background;
        if denom <= 0.0 {
            return 0.0;
        }
        (1.0 + (1.0 - self.lambda) * wdf / denom).ln()
    }
}

impl Weight for LMJMWeight {
    fn name(&self) -> &'static str {
        "lmjm"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        lm_needs()
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        self.p_background = background_p(ctx);
        if ctx.wdf_upper_bound == 0 || self.p_background == 0.0 {
            self.upper_bound = 0.0;
            return;
        }
        // Rises with wdf, falls with doclen; a document is at least as long
        // as the wdf it holds.
        let bound = self.weight_at(ctx.wdf_upper_bound as f64, shortest_feasible(ctx));
        self.upper_bound = (self.factor * bound).max(0.0);
    }

    fn sum_part(&self, wdf: TermCount, doclen: TermCount, _: TermCount, _: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        (self.factor * self.weight_at(wdf as f64, doclen.max(1) as f64)).max(0.0)
    }

    fn max_part(&self) -> f64 {
        self.upper_bound
    }

    fn serialise(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        serialise_double(&mut out, self.lambda);
        out
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        let mut reader = ParamReader::new(data, "lmjm");
        let lambda = reader.read_double()?;
        reader.finish()?;
        Ok(Box::new(LMJMWeight::new(lambda)?))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        if params.is_empty() {
            return Ok(Box::new(LMJMWeight::default()));
        }
        let p = parse_double_params(params, "lmjm", 1)?;
        Ok(Box::new(LMJMWeight::new(p[0])?))
    }
}

// ── Dirichlet ────────────────────────────────────────────────────────────

/// Dirichlet smoothing with prior strength mu. The length-dependent prior
/// `|Q|·ln(μ / (μ + |D|))` travels in the query-independent extra part.
#[derive(Debug, Clone, Copy)]
pub struct LMDirichletWeight {
    mu: f64,
    factor: f64,
    p_background: f64,
    query_length: f64,
    upper_bound: f64,
    extra_bound: f64,
}

impl Default for LMDirichletWeight {
    fn default() -> Self {
        Self {
            mu: 2000.0,
            factor: 0.0,
            p_background: 0.0,
            query_length: 0.0,
            upper_bound: 0.0,
            extra_bound: 0.0,
        }
    }
}

impl LMDirichletWeight {
    pub fn new(mu: f64) -> Result<Self> {
        if mu <= 0.0 {
            return Err(Error::InvalidArgument(
                "lmdirichlet: parameter mu is invalid".into(),
            ));
        }
        Ok(Self {
            mu,
            ..Self::default()
        })
    }

    fn extra_at(&self, doclen: f64) -> f64 {
        self.query_length * (self.mu / (self.mu + doclen)).ln()
    }
}

impl Weight for LMDirichletWeight {
    fn name(&self) -> &'static str {
        "lmdirichlet"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        lm_needs() | StatFlags::QUERY_LENGTH | StatFlags::DOC_LENGTH_MIN
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        self.query_length = ctx.stats.query_length as f64;
        // The prior shrinks as documents grow, so the shortest document
        // bounds it from above.
        self.extra_bound = self.extra_at(ctx.stats.doclength_lower_bound.max(1) as f64);

        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        self.p_background = background_p(ctx);
        if ctx.wdf_upper_bound == 0 || self.p_background == 0.0 {
            self.upper_bound = 0.0;
            return;
        }
        let bound = (1.0 + ctx.wdf_upper_bound as f64 / (self.mu * self.p_background)).ln();
        self.upper_bound = (self.factor * bound).max(0.0);
    }

    fn sum_part(&self, wdf: TermCount, _: TermCount, _: TermCount, _: TermCount) -> f64 {
        if wdf == 0 || self.p_background == 0.0 {
            return 0.0;
        }
        let wt = (1.0 + wdf as f64 / (self.mu * self.p_background)).ln();
        (self.factor * wt).max(0.0)
    }

    fn max_part(&self) -> f64 {
        self.upper_bound
    }

    fn sum_extra(&self, doclen: TermCount, _: TermCount) -> f64 {
        self.extra_at(doclen.max(1) as f64)
    }

    fn max_extra(&self) -> f64 {
        self.extra_bound
    }

    fn serialise(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        serialise_double(&mut out, self.mu);
        out
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        let mut reader = ParamReader::new(data, "lmdirichlet");
        let mu = reader.read_double()?;
        reader.finish()?;
        Ok(Box::new(LMDirichletWeight::new(mu)?))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        if params.is_empty() {
            return Ok(Box::new(LMDirichletWeight::default()));
        }
        let p = parse_double_params(params, "lmdirichlet", 1)?;
        Ok(Box::new(LMDirichletWeight::new(p[0])?))
    }
}

// ── Absolute discounting ─────────────────────────────────────────────────

/// Absolute-discount smoothing: subtract delta from each seen count and
/// redistribute the mass over the background model scaled by the document's
/// unique-term count.
#[derive(Debug, Clone, Copy)]
pub struct LMAbsDiscountWeight {
    delta: f64,
    factor: f64,
    p_background: f64,
    unique_lower: f64,
    upper_bound: f64,
}

impl Default for LMAbsDiscountWeight {
    fn default() -> Self {
        Self {
            delta: 0.7,
            factor: 0.0,
            p_background: 0.0,
            unique_lower: 1.0,
            upper_bound: 0.0,
        }
    }
}

impl LMAbsDiscountWeight {
    pub fn new(delta: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&delta) || delta == 0.0 {
            return Err(Error::InvalidArgument(
                "lmabsdiscount: parameter delta is invalid".into(),
            ));
        }
        Ok(Self {
            delta,
            ..Self::default()
        })
    }

    fn weight_at(&self, wdf: f64, unique_terms: f64) -> f64 {
        let discounted = wdf - self.delta;
        if discounted <= 0.0 {
            return 0.0;
        }
        let denom = self.delta * unique_terms.max(1.0) * self.p_background;
        if denom <= 0.0 {
            return 0.0;
        }
        (1.0 + discounted / denom).ln()
    }
}

impl Weight for LMAbsDiscountWeight {
    fn name(&self) -> &'static str {
        "lmabsdiscount"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        lm_needs() | StatFlags::UNIQUE_TERMS
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        self.p_background = background_p(ctx);
        self.unique_lower = ctx.stats.unique_terms_lower_bound.max(1) as f64;
        if ctx.wdf_upper_bound == 0 || self.p_background == 0.0 {
            self.upper_bound = 0.0;
            return;
        }
        // Rises with wdf, falls with the unique-term count.
        let bound = self.weight_at(ctx.wdf_upper_bound as f64, self.unique_lower);
        self.upper_bound = (self.factor * bound).max(0.0);
    }

    fn sum_part(&self, wdf: TermCount, _: TermCount, unique_terms: TermCount, _: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        (self.factor * self.weight_at(wdf as f64, unique_terms.max(1) as f64)).max(0.0)
    }

    fn max_part(&self) -> f64 {
        self.upper_bound
    }

    fn serialise(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        serialise_double(&mut out, self.delta);
        out
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        let mut reader = ParamReader::new(data, "lmabsdiscount");
        let delta = reader.read_double()?;
        reader.finish()?;
        Ok(Box::new(LMAbsDiscountWeight::new(delta)?))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        if params.is_empty() {
            return Ok(Box::new(LMAbsDiscountWeight::default()));
        }
        let p = parse_double_params(params, "lmabsdiscount", 1)?;
        Ok(Box::new(LMAbsDiscountWeight::new(p[0])?))
    }
}

// ── Two-stage ────────────────────────────────────────────────────────────

/// Two-stage smoothing: a Dirichlet prior mu inside a Jelinek-Mercer
/// interpolation lambda.
#[derive(Debug, Clone, Copy)]
pub struct LM2StageWeight {
    lambda: f64,
    mu: f64,
    factor: f64,
    p_background: f64,
    upper_bound: f64,
}

impl Default for LM2StageWeight {
    fn default() -> Self {
        Self {
            lambda: 0.7,
            mu: 2000.0,
            factor: 0.0,
            p_background: 0.0,
            upper_bound: 0.0,
        }
    }
}

impl LM2StageWeight {
    pub fn new(lambda: f64, mu: f64) -> Result<Self> {
        if !(0.0..1.0).contains(&lambda) || lambda == 0.0 {
            return Err(Error::InvalidArgument(
                "lm2stage: parameter lambda is invalid".into(),
            ));
        }
        if mu <= 0.0 {
            return Err(Error::InvalidArgument(
                "lm2stage: parameter mu is invalid".into(),
            ));
        }
        Ok(Self {
            lambda,
            mu,
            ..Self::default()
        })
    }

    fn weight_at(&self, wdf: f64, doclen: f64) -> f64 {
        // Ratio against the wdf = 0 model:
        // p₀ = p_c·(λ + (1-λ)·μ/(|D|+μ)), so the per-term gain is
        // log(1 + (1-λ)·wdf / (p_c·(λ·(|D|+μ) + (1-λ)·μ))).
        let denom = self.p_background * (self.lambda * (doclen + self.mu) + (1.0 - self.lambda) * self.mu);
        if denom <= 0.0 {
            return 0.0;
        }
        (1.0 + (1.0 - self.lambda) * wdf / denom).ln()
    }
}

impl Weight for LM2StageWeight {
    fn name(&self) -> &'static str {
        "lm2stage"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        lm_needs()
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        self.p_background = background_p(ctx);
        if ctx.wdf_upper_bound == 0 || self.p_background == 0.0 {
            self.upper_bound = 0.0;
            return;
        }
        let bound = self.weight_at(ctx.wdf_upper_bound as f64, shortest_feasible(ctx));
        self.upper_bound = (self.factor * bound).max(0.0);
    }

    fn sum_part(&self, wdf: TermCount, doclen: TermCount, _: TermCount, _: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        (self.factor * self.weight_at(wdf as f64, doclen.max(1) as f64)).max(0.0)
    }

    fn max_part(&self) -> f64 {
        self.upper_bound
    }

    fn serialise(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        serialise_double(&mut out, self.lambda);
        serialise_double(&mut out, self.mu);
        out
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        let mut reader = ParamReader::new(data, "lm2stage");
        let lambda = reader.read_double()?;
        let mu = reader.read_double()?;
        reader.finish()?;
        Ok(Box::new(LM2StageWeight::new(lambda, mu)?))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        if params.is_empty() {
            return Ok(Box::new(LM2StageWeight::default()));
        }
        let p = parse_double_params(params, "lm2stage", 2)?;
        Ok(Box::new(LM2StageWeight::new(p[0], p[1])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{CollectionStats, TermFreqs};

    fn context() -> WeightContext {
        WeightContext {
            stats: CollectionStats {
                collection_size: 800,
                total_length: 64_000,
                doclength_lower_bound: 8,
                doclength_upper_bound: 300,
                wdf_upper_bound: 11,
                unique_terms_lower_bound: 4,
                unique_terms_upper_bound: 180,
                rset_size: 0,
                query_length: 3,
            },
            freqs: TermFreqs::new(90, 0, 260),
            wqf: 1,
            wdf_upper_bound: 11,
        }
    }

    fn schemes() -> Vec<Box<dyn Weight>> {
        vec![
            Box::new(LMJMWeight::default()),
            Box::new(LMDirichletWeight::default()),
            Box::new(LMAbsDiscountWeight::default()),
            Box::new(LM2StageWeight::default()),
        ]
    }

    #[test]
    fn test_zero_wdf_is_zero() {
        for proto in schemes() {
            let mut w = proto.clone_boxed();
            w.init(&context(), 1.0);
            assert_eq!(w.sum_part(0, 40, 10, 0), 0.0, "{}", proto.name());
        }
    }

    #[test]
    fn test_max_part_dominates() {
        let ctx = context();
        for proto in schemes() {
            let mut w = proto.clone_boxed();
            w.init(&ctx, 1.0);
            for wdf in 1..=ctx.wdf_upper_bound {
                for len in [8u32, 30, 100, 300] {
                    let len = len.max(wdf);
                    for unique in [4u32, 30, 180] {
                        let got = w.sum_part(wdf, len, unique.min(len), wdf);
                        assert!(
                            w.max_part() >= got - 1e-9,
                            "{}: bound {} < {} at wdf={} len={}",
                            proto.name(),
                            w.max_part(),
                            got,
                            wdf,
                            len
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_more_occurrences_score_higher() {
        for proto in schemes() {
            let mut w = proto.clone_boxed();
            w.init(&context(), 1.0);
            let one = w.sum_part(1, 50, 20, 1);
            let five = w.sum_part(5, 50, 20, 5);
            assert!(five > one, "{}: {} !> {}", proto.name(), five, one);
        }
    }

    #[test]
    fn test_dirichlet_extra_prefers_short_docs() {
        let mut w = LMDirichletWeight::default();
        w.init(&context(), 0.0);
        let short = w.sum_extra(8, 4);
        let long = w.sum_extra(300, 100);
        // Both are negative log priors; shorter documents lose less.
        assert!(short < 0.0);
        assert!(short > long);
        assert!(w.max_extra() >= short);
        assert!(w.max_extra() >= long);
    }

    #[test]
    fn test_absdiscount_uses_unique_terms() {
        let mut w = LMAbsDiscountWeight::default();
        w.init(&context(), 1.0);
        let few_unique = w.sum_part(3, 50, 5, 3);
        let many_unique = w.sum_part(3, 50, 50, 3);
        assert!(few_unique > many_unique);
    }

    #[test]
    fn test_parameter_validation() {
        assert!(LMJMWeight::new(0.0).is_err());
        assert!(LMJMWeight::new(1.0).is_err());
        assert!(LMDirichletWeight::new(0.0).is_err());
        assert!(LMAbsDiscountWeight::new(1.0).is_err());
        assert!(LM2StageWeight::new(0.5, 0.0).is_err());
    }

    #[test]
    fn test_serialise_roundtrip() {
        let w = LM2StageWeight::new(0.3, 750.0).unwrap();
        let restored = LM2StageWeight::default().unserialise(&w.serialise()).unwrap();
        assert_eq!(restored.serialise(), w.serialise());

        let mut bytes = LMDirichletWeight::default().serialise();
        bytes.pop();
        assert!(LMDirichletWeight::default().unserialise(&bytes).is_err());
    }
}
