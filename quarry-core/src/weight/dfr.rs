//! The Divergence-From-Randomness family: InL2, IfB2, IneB2, BB2, DLH, DPH,
//! PL2 and PL2+.
//!
//! The *2 schemes share the second normalisation
//! `wdfn = wdf · log2(1 + c·avg_len / len)`; each derives a closed-form
//! upper bound from the wdfn range implied by the wdf ceiling and the
//! document-length bounds.

use std::f64::consts::{LOG2_E, PI};

use crate::TermCount;
use crate::error::{Error, Result};
use crate::stats::{StatFlags, WeightContext};

use super::{ParamReader, Weight, parse_double_params, serialise_double};

fn log2(x: f64) -> f64 {
    x.log2()
}

fn norm2_needs() -> StatFlags {
    StatFlags::COLLECTION_SIZE
        | StatFlags::AVERAGE_LENGTH
        | StatFlags::DOC_LENGTH
        | StatFlags::DOC_LENGTH_MIN
        | StatFlags::DOC_LENGTH_MAX
        | StatFlags::TERM_FREQ
        | StatFlags::WDF
        | StatFlags::WDF_MAX
        | StatFlags::WQF
}

/// wdfn evaluated at the wdf ceiling with the shortest feasible document
/// (a document is at least as long as the term's wdf in it).
fn wdfn_upper(wdf_upper: f64, doclen_lower: f64, cl: f64) -> f64 {
    let divisor = wdf_upper.max(doclen_lower);
    wdf_upper * log2(1.0 + cl / divisor)
}

/// wdfn for a single occurrence in the longest document.
fn wdfn_lower(doclen_upper: f64, cl: f64) -> f64 {
    log2(1.0 + cl / doclen_upper.max(1.0))
}

macro_rules! one_param_c_weight {
    ($type:ident, $name:literal) => {
        impl $type {
            pub fn new(c: f64) -> Result<Self> {
                if c <= 0.0 {
                    return Err(Error::InvalidArgument(concat!(
                        $name,
                        ": parameter c is invalid"
                    )
                    .into()));
                }
                Ok(Self {
                    param_c: c,
                    ..Self::default()
                })
            }
        }

        impl Weight for $type {
            fn name(&self) -> &'static str {
                $name
            }

            fn clone_boxed(&self) -> Box<dyn Weight> {
                Box::new(*self)
            }

            fn needs(&self) -> StatFlags {
                self.needed_stats()
            }

            fn init(&mut self, ctx: &WeightContext, factor: f64) {
                self.init_impl(ctx, factor);
            }

            fn sum_part(
                &self,
                wdf: TermCount,
                doclen: TermCount,
                _unique_terms: TermCount,
                _wdf_doc_max: TermCount,
            ) -> f64 {
                self.sum_part_impl(wdf, doclen)
            }

            fn max_part(&self) -> f64 {
                self.upper_bound
            }

            fn serialise(&self) -> Vec<u8> {
                let mut out = Vec::with_capacity(8);
                serialise_double(&mut out, self.param_c);
                out
            }

            fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
                let mut reader = ParamReader::new(data, $name);
                let c = reader.read_double()?;
                reader.finish()?;
                Ok(Box::new($type::new(c)?))
            }

            fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
                if params.is_empty() {
                    return Ok(Box::new($type::default()));
                }
                let p = parse_double_params(params, $name, 1)?;
                Ok(Box::new($type::new(p[0])?))
            }
        }
    };
}

// ── InL2 ─────────────────────────────────────────────────────────────────

/// InL2: inverse document frequency model with Laplace after-effect and the
/// second wdf normalisation.
#[derive(Debug, Clone, Copy)]
pub struct InL2Weight {
    param_c: f64,
    factor: f64,
    cl: f64,
    idf: f64,
    upper_bound: f64,
}

impl Default for InL2Weight {
    fn default() -> Self {
        Self {
            param_c: 1.0,
            factor: 0.0,
            cl: 0.0,
            idf: 0.0,
            upper_bound: 0.0,
        }
    }
}

impl InL2Weight {
    fn needed_stats(&self) -> StatFlags {
        norm2_needs()
    }

    fn init_impl(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            // Term-independent contribution, always zero here.
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        let wdf_upper = ctx.wdf_upper_bound as f64;
        if wdf_upper == 0.0 || ctx.freqs.termfreq == 0 {
            self.upper_bound = 0.0;
            return;
        }
        self.cl = self.param_c * ctx.stats.average_length();
        let n = ctx.stats.collection_size as f64;
        self.idf = log2((n + 1.0) / (ctx.freqs.termfreq as f64 + 0.5));

        let wu = wdfn_upper(wdf_upper, ctx.stats.doclength_lower_bound as f64, self.cl);
        // wdfn/(wdfn+1) rises with wdfn, so the bound sits at wdfn_upper.
        self.upper_bound = (self.factor * wu / (wu + 1.0) * self.idf).max(0.0);
    }

    fn sum_part_impl(&self, wdf: TermCount, doclen: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        let wdfn = wdf as f64 * log2(1.0 + self.cl / doclen.max(1) as f64);
        let wt = wdfn / (wdfn + 1.0) * self.idf;
        (self.factor * wt).max(0.0)
    }
}

one_param_c_weight!(InL2Weight, "inl2");

// ── IfB2 ─────────────────────────────────────────────────────────────────

/// IfB2: inverse collection-frequency model with Bernoulli after-effect.
#[derive(Debug, Clone, Copy)]
pub struct IfB2Weight {
    param_c: f64,
    factor: f64,
    cl: f64,
    termfreq: f64,
    b_scale: f64,
    icf: f64,
    upper_bound: f64,
}

impl Default for IfB2Weight {
    fn default() -> Self {
        Self {
            param_c: 1.0,
            factor: 0.0,
            cl: 0.0,
            termfreq: 0.0,
            b_scale: 0.0,
            icf: 0.0,
            upper_bound: 0.0,
        }
    }
}

impl IfB2Weight {
    fn needed_stats(&self) -> StatFlags {
        norm2_needs() | StatFlags::COLLECTION_FREQ
    }

    fn init_impl(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        let wdf_upper = ctx.wdf_upper_bound as f64;
        if wdf_upper == 0.0 || ctx.freqs.termfreq == 0 {
            self.upper_bound = 0.0;
            return;
        }
        self.cl = self.param_c * ctx.stats.average_length();
        let n = ctx.stats.collection_size as f64;
        let f = ctx.freqs.collfreq as f64;
        self.termfreq = ctx.freqs.termfreq as f64;
        self.b_scale = (f + 1.0) / self.termfreq;
        self.icf = log2((n + 1.0) / (f + 1.0));

        let wu = wdfn_upper(wdf_upper, ctx.stats.doclength_lower_bound as f64, self.cl);
        self.upper_bound = (self.factor * self.b_scale * wu / (wu + 1.0) * self.icf).max(0.0);
    }

    fn sum_part_impl(&self, wdf: TermCount, doclen: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        let wdfn = wdf as f64 * log2(1.0 + self.cl / doclen.max(1) as f64);
        let wt = self.b_scale * wdfn / (wdfn + 1.0) * self.icf;
        (self.factor * wt).max(0.0)
    }
}

one_param_c_weight!(IfB2Weight, "ifb2");

// ── IneB2 ────────────────────────────────────────────────────────────────

/// IneB2: like IfB2 but the model uses the expected document frequency
/// `ne = N·(1 − ((N−1)/N)^F)` instead of the raw collection frequency.
#[derive(Debug, Clone, Copy)]
pub struct IneB2Weight {
    param_c: f64,
    factor: f64,
    cl: f64,
    b_scale: f64,
    ine: f64,
    upper_bound: f64,
}

impl Default for IneB2Weight {
    fn default() -> Self {
        Self {
            param_c: 1.0,
            factor: 0.0,
            cl: 0.0,
            b_scale: 0.0,
            ine: 0.0,
            upper_bound: 0.0,
        }
    }
}

impl IneB2Weight {
    fn needed_stats(&self) -> StatFlags {
        norm2_needs() | StatFlags::COLLECTION_FREQ
    }

    fn init_impl(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        let wdf_upper = ctx.wdf_upper_bound as f64;
        if wdf_upper == 0.0 || ctx.freqs.termfreq == 0 || ctx.stats.collection_size == 0 {
            self.upper_bound = 0.0;
            return;
        }
        self.cl = self.param_c * ctx.stats.average_length();
        let n = ctx.stats.collection_size as f64;
        let f = ctx.freqs.collfreq as f64;
        let ne = n * (1.0 - ((n - 1.0) / n).powf(f));
        self.b_scale = (f + 1.0) / ctx.freqs.termfreq as f64;
        self.ine = log2((n + 1.0) / (ne + 0.5));

        let wu = wdfn_upper(wdf_upper, ctx.stats.doclength_lower_bound as f64, self.cl);
        self.upper_bound = (self.factor * self.b_scale * wu / (wu + 1.0) * self.ine).max(0.0);
    }

    fn sum_part_impl(&self, wdf: TermCount, doclen: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        let wdfn = wdf as f64 * log2(1.0 + self.cl / doclen.max(1) as f64);
        let wt = self.b_scale * wdfn / (wdfn + 1.0) * self.ine;
        (self.factor * wt).max(0.0)
    }
}

one_param_c_weight!(IneB2Weight, "ineb2");

// ── BB2 ──────────────────────────────────────────────────────────────────

/// Log2 of a ratio of factorials via the Stirling split
/// `f(n, m) = (m + 0.5)·log2(n/m) + (n − m)·log2(n)`.
fn stirling_split(n: f64, m: f64) -> f64 {
    (m + 0.5) * log2(n / m) + (n - m) * log2(n)
}

/// BB2: Bose-Einstein model with Bernoulli after-effect.
#[derive(Debug, Clone, Copy)]
pub struct BB2Weight {
    param_c: f64,
    factor: f64,
    cl: f64,
    n: f64,
    f: f64,
    b_base: f64,
    upper_bound: f64,
}

impl Default for BB2Weight {
    fn default() -> Self {
        Self {
            param_c: 1.0,
            factor: 0.0,
            cl: 0.0,
            n: 0.0,
            f: 0.0,
            b_base: 0.0,
            upper_bound: 0.0,
        }
    }
}

impl BB2Weight {
    fn needed_stats(&self) -> StatFlags {
        norm2_needs() | StatFlags::COLLECTION_FREQ
    }

    /// Clamp wdfn so the factorial arguments stay positive.
    fn feasible_wdfn(&self, wdfn: f64) -> f64 {
        wdfn.min(self.f - 0.5).max(1e-9)
    }

    /// Bose-Einstein information content; rises with wdfn.
    fn info_at(&self, wdfn: f64) -> f64 {
        -log2(self.n - 1.0) - LOG2_E
            + stirling_split(self.n + self.f - 1.0, self.n + self.f - wdfn - 2.0)
            - stirling_split(self.f, self.f - wdfn)
    }

    fn weight_at(&self, wdfn: f64) -> f64 {
        let wdfn = self.feasible_wdfn(wdfn);
        self.b_base / (wdfn + 1.0) * self.info_at(wdfn)
    }

    fn init_impl(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        let wdf_upper = ctx.wdf_upper_bound as f64;
        if wdf_upper == 0.0 || ctx.freqs.termfreq == 0 || ctx.stats.collection_size < 2 {
            self.upper_bound = 0.0;
            return;
        }
        self.cl = self.param_c * ctx.stats.average_length();
        self.n = ctx.stats.collection_size as f64;
        self.f = ctx.freqs.collfreq as f64;
        self.b_base = (self.f + 1.0) / ctx.freqs.termfreq as f64;

        let wu = self.feasible_wdfn(wdfn_upper(
            wdf_upper,
            ctx.stats.doclength_lower_bound as f64,
            self.cl,
        ));
        let wl = self.feasible_wdfn(wdfn_lower(
            ctx.stats.doclength_upper_bound as f64,
            self.cl,
        ));
        // The product can peak inside the wdfn range, so bound the two
        // monotone factors separately: the Bernoulli factor at wdfn_lower,
        // the information content at wdfn_upper.
        let bound = self.b_base / (wl + 1.0) * self.info_at(wu).max(0.0);
        self.upper_bound = (self.factor * bound).max(0.0);
    }

    fn sum_part_impl(&self, wdf: TermCount, doclen: TermCount) -> f64 {
        if wdf == 0 || self.n < 2.0 {
            return 0.0;
        }
        let wdfn = wdf as f64 * log2(1.0 + self.cl / doclen.max(1) as f64);
        (self.factor * self.weight_at(wdfn)).max(0.0)
    }
}

one_param_c_weight!(BB2Weight, "bb2");

// ── PL2 ──────────────────────────────────────────────────────────────────

/// PL2: Poisson model with Laplace after-effect.
#[derive(Debug, Clone, Copy)]
pub struct PL2Weight {
    param_c: f64,
    factor: f64,
    cl: f64,
    p1: f64,
    p2: f64,
    upper_bound: f64,
}

impl Default for PL2Weight {
    fn default() -> Self {
        Self {
            param_c: 1.0,
            factor: 0.0,
            cl: 0.0,
            p1: 0.0,
            p2: 0.0,
            upper_bound: 0.0,
        }
    }
}

impl PL2Weight {
    fn needed_stats(&self) -> StatFlags {
        norm2_needs() | StatFlags::COLLECTION_FREQ
    }

    fn init_impl(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        let wdf_upper = ctx.wdf_upper_bound as f64;
        if wdf_upper == 0.0 || ctx.stats.collection_size == 0 {
            self.upper_bound = 0.0;
            return;
        }
        let mean = ctx.freqs.collfreq as f64 / ctx.stats.collection_size as f64;
        if mean <= 0.0 {
            self.upper_bound = 0.0;
            return;
        }
        let base_change = 1.0 / std::f64::consts::LN_2;
        self.p1 = mean * base_change + 0.5 * log2(2.0 * PI);
        self.p2 = log2(mean) + base_change;
        self.cl = self.param_c * ctx.stats.average_length();

        let wl = wdfn_lower(ctx.stats.doclength_upper_bound as f64, self.cl);
        let wu = wdfn_upper(wdf_upper, ctx.stats.doclength_lower_bound as f64, self.cl);

        // Split P/(wdfn+1) into (a) (wdfn+0.5)·log2(wdfn)/(wdfn+1), maximised
        // at wdfn_upper, and (b) (P1 − P2·wdfn)/(wdfn+1), whose gradient sign
        // is fixed by sign(P1 + P2).
        let p_max2a = (wu + 0.5) * log2(wu) / (wu + 1.0);
        let wdfn_optb = if self.p1 + self.p2 > 0.0 { wu } else { wl };
        let p_max2b = (self.p1 - self.p2 * wdfn_optb) / (wdfn_optb + 1.0);
        self.upper_bound = (self.factor * (p_max2a + p_max2b)).max(0.0);
    }

    fn sum_part_impl(&self, wdf: TermCount, doclen: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        let wdfn = wdf as f64 * log2(1.0 + self.cl / doclen.max(1) as f64);
        let p = self.p1 + (wdfn + 0.5) * log2(wdfn) - self.p2 * wdfn;
        let wt = p / (wdfn + 1.0);
        if wt <= 0.0 {
            return 0.0;
        }
        self.factor * wt
    }
}

one_param_c_weight!(PL2Weight, "pl2");

// ── PL2+ ─────────────────────────────────────────────────────────────────

/// PL2+: PL2 with a lower-bounding delta term, ignoring non-discriminative
/// terms (mean occurrence rate above one).
#[derive(Debug, Clone, Copy)]
pub struct PL2PlusWeight {
    param_c: f64,
    param_delta: f64,
    factor: f64,
    mean: f64,
    cl: f64,
    p1: f64,
    p2: f64,
    dw: f64,
    upper_bound: f64,
}

impl Default for PL2PlusWeight {
    fn default() -> Self {
        Self {
            param_c: 1.0,
            param_delta: 0.8,
            factor: 0.0,
            mean: 0.0,
            cl: 0.0,
            p1: 0.0,
            p2: 0.0,
            dw: 0.0,
            upper_bound: 0.0,
        }
    }
}

impl PL2PlusWeight {
    pub fn new(c: f64, delta: f64) -> Result<Self> {
        if c <= 0.0 {
            return Err(Error::InvalidArgument("pl2+: parameter c is invalid".into()));
        }
        if delta <= 0.0 {
            return Err(Error::InvalidArgument(
                "pl2+: parameter delta is invalid".into(),
            ));
        }
        Ok(Self {
            param_c: c,
            param_delta: delta,
            ..Self::default()
        })
    }
}

impl Weight for PL2PlusWeight {
    fn name(&self) -> &'static str {
        "pl2+"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        norm2_needs() | StatFlags::COLLECTION_FREQ
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            // This copy is for the term-independent contribution, and that's
            // always zero for this scheme.
            return;
        }

        self.factor = factor * ctx.wqf as f64;

        let wdf_upper = ctx.wdf_upper_bound as f64;
        if ctx.stats.collection_size == 0 {
            self.upper_bound = 0.0;
            return;
        }
        self.mean = ctx.freqs.collfreq as f64 / ctx.stats.collection_size as f64;
        if wdf_upper == 0.0 || self.mean > 1.0 {
            // PL2+ is based on a modified PL2 which essentially ignores
            // non-discriminative query terms.
            self.upper_bound = 0.0;
            return;
        }

        let base_change = 1.0 / std::f64::consts::LN_2;
        self.p1 = self.mean * base_change + 0.5 * log2(2.0 * PI);
        self.p2 = log2(self.mean) + base_change;

        self.cl = self.param_c * ctx.stats.average_length();

        let wl = wdfn_lower(ctx.stats.doclength_upper_bound as f64, self.cl);
        let wu = wdfn_upper(wdf_upper, ctx.stats.doclength_lower_bound as f64, self.cl);

        let p_delta = self.p1 + (self.param_delta + 0.5) * log2(self.param_delta)
            - self.p2 * self.param_delta;
        self.dw = p_delta / (self.param_delta + 1.0);

        // Bound P/(wdfn+1) as the sum of two individually maximised parts:
        // (a) (wdfn+0.5)·log2(wdfn)/(wdfn+1) is monotone in wdfn, so
        // evaluate it at wdfn_upper; (b) (P1 − P2·wdfn)/(wdfn+1) has no
        // interior extremum and its gradient sign follows sign(P1 + P2).
        let p_max2a = (wu + 0.5) * log2(wu) / (wu + 1.0);
        let wdfn_optb = if self.p1 + self.p2 > 0.0 { wu } else { wl };
        let p_max2b = (self.p1 - self.p2 * wdfn_optb) / (wdfn_optb + 1.0);
        self.upper_bound = self.factor * (p_max2a + p_max2b + self.dw);

        if self.upper_bound < 0.0 {
            self.upper_bound = 0.0;
        }
    }

    fn sum_part(&self, wdf: TermCount, doclen: TermCount, _: TermCount, _: TermCount) -> f64 {
        if wdf == 0 || self.mean > 1.0 {
            return 0.0;
        }

        let wdfn = wdf as f64 * log2(1.0 + self.cl / doclen.max(1) as f64);
        let p = self.p1 + (wdfn + 0.5) * log2(wdfn) - self.p2 * wdfn;
        let wt = p / (wdfn + 1.0) + self.dw;
        // The dw term and the mean <= 1 bail-out keep wt positive in
        // practice; the clamp is contractual regardless.
        if wt <= 0.0 {
            return 0.0;
        }
        self.factor * wt
    }

    fn max_part(&self) -> f64 {
        self.upper_bound
    }

    fn serialise(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16);
        serialise_double(&mut out, self.param_c);
        serialise_double(&mut out, self.param_delta);
        out
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        let mut reader = ParamReader::new(data, "pl2+");
        let c = reader.read_double()?;
        let delta = reader.read_double()?;
        reader.finish()?;
        Ok(Box::new(PL2PlusWeight::new(c, delta)?))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        if params.is_empty() {
            return Ok(Box::new(PL2PlusWeight::default()));
        }
        let p = parse_double_params(params, "pl2+", 2)?;
        Ok(Box::new(PL2PlusWeight::new(p[0], p[1])?))
    }
}

// ── DLH ──────────────────────────────────────────────────────────────────

/// DLH: parameter-free hypergeometric model with Laplace normalisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DLHWeight {
    factor: f64,
    avg_over_f: f64,
    wdf_upper: f64,
    upper_bound: f64,
}

impl Weight for DLHWeight {
    fn name(&self) -> &'static str {
        "dlh"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        StatFlags::COLLECTION_SIZE
            | StatFlags::AVERAGE_LENGTH
            | StatFlags::DOC_LENGTH
            | StatFlags::DOC_LENGTH_MIN
            | StatFlags::COLLECTION_FREQ
            | StatFlags::WDF
            | StatFlags::WDF_MAX
            | StatFlags::WQF
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        self.wdf_upper = ctx.wdf_upper_bound as f64;
        let f = ctx.freqs.collfreq as f64;
        if self.wdf_upper == 0.0 || f == 0.0 {
            self.upper_bound = 0.0;
            return;
        }
        self.avg_over_f =
            ctx.stats.average_length() * ctx.stats.collection_size as f64 / f;

        // Bound each additive part separately over its own worst wdf: the
        // middle (len−wdf)·log2(1−f) term is never positive, the first peaks
        // at the wdf ceiling in the shortest feasible document, and the
        // Stirling correction never exceeds its value before division.
        let u = self.wdf_upper;
        let shortest = (ctx.stats.doclength_lower_bound as f64).max(u).max(1.0);
        let t1 = (u * log2(u / shortest * self.avg_over_f) / (u + 0.5)).max(0.0);
        let t3 = (0.5 * log2(2.0 * PI * u)).max(0.0);
        self.upper_bound = (self.factor * (t1 + t3)).max(0.0);
    }

    fn sum_part(&self, wdf: TermCount, doclen: TermCount, _: TermCount, _: TermCount) -> f64 {
        if wdf == 0 || self.avg_over_f == 0.0 {
            return 0.0;
        }
        let wdf = wdf as f64;
        let len = doclen.max(1) as f64;
        let f_rate = (wdf / len).min(1.0);
        let one_minus = 1.0 - f_rate;
        let t1 = wdf * log2(f_rate * self.avg_over_f);
        let (t2, t3) = if one_minus > 0.0 {
            (
                (len - wdf) * log2(one_minus),
                0.5 * log2(2.0 * PI * wdf * one_minus),
            )
        } else {
            (0.0, 0.0)
        };
        let wt = (t1 + t2 + t3) / (wdf + 0.5);
        (self.factor * wt).max(0.0)
    }

    fn max_part(&self) -> f64 {
        self.upper_bound
    }

    fn serialise(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        ParamReader::new(data, "dlh").finish()?;
        Ok(Box::new(DLHWeight::default()))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        parse_double_params(params, "dlh", 0)?;
        Ok(Box::new(DLHWeight::default()))
    }
}

// ── DPH ──────────────────────────────────────────────────────────────────

/// DPH: parameter-free hypergeometric model with Popper normalisation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DPHWeight {
    factor: f64,
    avg_over_f: f64,
    wdf_upper: f64,
    upper_bound: f64,
}

impl Weight for DPHWeight {
    fn name(&self) -> &'static str {
        "dph"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        StatFlags::COLLECTION_SIZE
            | StatFlags::AVERAGE_LENGTH
            | StatFlags::DOC_LENGTH
            | StatFlags::COLLECTION_FREQ
            | StatFlags::WDF
            | StatFlags::WDF_MAX
            | StatFlags::WQF
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        self.wdf_upper = ctx.wdf_upper_bound as f64;
        let f = ctx.freqs.collfreq as f64;
        if self.wdf_upper == 0.0 || f == 0.0 {
            self.upper_bound = 0.0;
            return;
        }
        self.avg_over_f =
            ctx.stats.average_length() * ctx.stats.collection_size as f64 / f;

        // wdf·avg/len never exceeds avg (wdf <= len), and the Popper
        // normaliser never exceeds one.
        let u = self.wdf_upper;
        let t1 = log2(self.avg_over_f).max(0.0);
        let t3 = (0.5 * log2(2.0 * PI * u)).max(0.0);
        self.upper_bound = (self.factor * (t1 + t3)).max(0.0);
    }

    fn sum_part(&self, wdf: TermCount, doclen: TermCount, _: TermCount, _: TermCount) -> f64 {
        if wdf == 0 || self.avg_over_f == 0.0 {
            return 0.0;
        }
        let wdf = wdf as f64;
        let len = doclen.max(1) as f64;
        let f_rate = (wdf / len).min(1.0);
        let one_minus = 1.0 - f_rate;
        if one_minus <= 0.0 {
            return 0.0;
        }
        let norm = one_minus * one_minus / (wdf + 1.0);
        let wt = norm * (wdf * log2(f_rate * self.avg_over_f) + 0.5 * log2(2.0 * PI * wdf * one_minus));
        (self.factor * wt).max(0.0)
    }

    fn max_part(&self) -> f64 {
        self.upper_bound
    }

    fn serialise(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        ParamReader::new(data, "dph").finish()?;
        Ok(Box::new(DPHWeight::default()))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        parse_double_params(params, "dph", 0)?;
        Ok(Box::new(DPHWeight::default()))
    }
}
