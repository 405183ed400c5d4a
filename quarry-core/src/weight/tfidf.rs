//! TF-IDF with selectable wdf/idf/normalisation smoothings.
//!
//! The scheme's identity is its three-letter smoothing combination, e.g.
//! "ntn": one letter each for the wdf transform, the idf transform and the
//! weight normalisation. The letters are the scheme's parameters, so
//! `from_parameters` and `serialise` traffic in them rather than doubles.

use crate::TermCount;
use crate::error::{Error, Result};
use crate::stats::{StatFlags, WeightContext};

use super::Weight;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WdfNorm {
    /// "n": wdf itself.
    None,
    /// "b": 0/1 presence.
    Boolean,
    /// "s": wdf squared.
    Square,
    /// "l": 1 + ln(wdf).
    Log,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IdfNorm {
    /// "n": 1.
    None,
    /// "t": ln(N / termfreq).
    TfIdf,
    /// "p": max(0, ln((N − termfreq) / termfreq)).
    Prob,
    /// "s": ln(N / termfreq) squared.
    Squared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WtNorm {
    /// "n": none.
    None,
}

/// TF-IDF weighting. Default smoothing is "ntn".
#[derive(Debug, Clone, Copy)]
pub struct TfIdfWeight {
    wdf_norm: WdfNorm,
    idf_norm: IdfNorm,
    wt_norm: WtNorm,
    factor: f64,
    idf: f64,
    wdf_upper: f64,
}

impl Default for TfIdfWeight {
    fn default() -> Self {
        Self {
            wdf_norm: WdfNorm::None,
            idf_norm: IdfNorm::TfIdf,
            wt_norm: WtNorm::None,
            factor: 0.0,
            idf: 0.0,
            wdf_upper: 0.0,
        }
    }
}

impl TfIdfWeight {
    /// Build from a smoothing-letter triple such as "ntn".
    pub fn new(normalizations: &str) -> Result<Self> {
        let letters: Vec<char> = normalizations.chars().collect();
        if letters.len() != 3 {
            return Err(Error::InvalidArgument(format!(
                "tfidf: normalization string must be three letters, got {:?}",
                normalizations
            )));
        }
        let wdf_norm = match letters[0] {
            'n' => WdfNorm::None,
            'b' => WdfNorm::Boolean,
            's' => WdfNorm::Square,
            'l' => WdfNorm::Log,
            c => {
                return Err(Error::InvalidArgument(format!(
                    "tfidf: unknown wdf normalization {:?}",
                    c
                )));
            }
        };
        let idf_norm = match letters[1] {
            'n' => IdfNorm::None,
            't' => IdfNorm::TfIdf,
            'p' => IdfNorm::Prob,
            's' => IdfNorm::Squared,
            c => {
                return Err(Error::InvalidArgument(format!(
                    "tfidf: unknown idf normalization {:?}",
                    c
                )));
            }
        };
        let wt_norm = match letters[2] {
            'n' => WtNorm::None,
            c => {
                return Err(Error::InvalidArgument(format!(
                    "tfidf: unknown weight normalization {:?}",
                    c
                )));
            }
        };
        Ok(Self {
            wdf_norm,
            idf_norm,
            wt_norm,
            factor: 0.0,
            idf: 0.0,
            wdf_upper: 0.0,
        })
    }

    fn letters(&self) -> [u8; 3] {
        let w = match self.wdf_norm {
            WdfNorm::None => b'n',
            WdfNorm::Boolean => b'b',
            WdfNorm::Square => b's',
            WdfNorm::Log => b'l',
        };
        let i = match self.idf_norm {
            IdfNorm::None => b'n',
            IdfNorm::TfIdf => b't',
            IdfNorm::Prob => b'p',
            IdfNorm::Squared => b's',
        };
        let WtNorm::None = self.wt_norm;
        [w, i, b'n']
    }

    fn transformed_wdf(&self, wdf: f64) -> f64 {
        match self.wdf_norm {
            WdfNorm::None => wdf,
            WdfNorm::Boolean => {
                if wdf > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            WdfNorm::Square => wdf * wdf,
            WdfNorm::Log => {
                if wdf == 0.0 {
                    0.0
                } else {
                    1.0 + wdf.ln()
                }
            }
        }
    }

    fn compute_idf(&self, termfreq: u32, collection_size: u32) -> f64 {
        if termfreq == 0 || collection_size == 0 {
            return 0.0;
        }
        let n = collection_size as f64;
        let tf = termfreq as f64;
        match self.idf_norm {
            IdfNorm::None => 1.0,
            IdfNorm::TfIdf => (n / tf).ln(),
            IdfNorm::Prob => ((n - tf) / tf).ln().max(0.0),
            IdfNorm::Squared => {
                let v = (n / tf).ln();
                v * v
            }
        }
    }
}

impl Weight for TfIdfWeight {
    fn name(&self) -> &'static str {
        "tfidf"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        StatFlags::COLLECTION_SIZE
            | StatFlags::TERM_FREQ
            | StatFlags::WDF
            | StatFlags::WDF_MAX
            | StatFlags::WQF
    }

    fn init(&mut self, ctx: &WeightContext, factor: f64) {
        if factor == 0.0 {
            return;
        }
        self.factor = factor * ctx.wqf as f64;
        self.idf = self.compute_idf(ctx.freqs.termfreq, ctx.stats.collection_size);
        self.wdf_upper = ctx.wdf_upper_bound as f64;
    }

    fn sum_part(&self, wdf: TermCount, _: TermCount, _: TermCount, _: TermCount) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        (self.factor * self.transformed_wdf(wdf as f64) * self.idf).max(0.0)
    }

    fn max_part(&self) -> f64 {
        // Every wdf transform is monotone non-decreasing.
        (self.factor * self.transformed_wdf(self.wdf_upper) * self.idf).max(0.0)
    }

    fn serialise(&self) -> Vec<u8> {
        self.letters().to_vec()
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::Serialisation("tfidf: invalid normalization bytes".into()))?;
        if text.len() != 3 {
            return Err(Error::Serialisation(
                "tfidf: normalization string must be three letters".into(),
            ));
        }
        Ok(Box::new(
            TfIdfWeight::new(text).map_err(|e| Error::Serialisation(e.to_string()))?,
        ))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        if params.is_empty() {
            return Ok(Box::new(TfIdfWeight::default()));
        }
        Ok(Box::new(TfIdfWeight::new(params.trim())?))
    }
}
