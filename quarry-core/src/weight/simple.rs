//! The boolean and coordination schemes.

use crate::TermCount;
use crate::error::Result;
use crate::stats::{StatFlags, WeightContext};

use super::Weight;

/// Pure boolean matching: every contribution is zero, ranking is by docid.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolWeight;

impl Weight for BoolWeight {
    fn name(&self) -> &'static str {
        "bool"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        StatFlags::empty()
    }

    fn init(&mut self, _ctx: &WeightContext, _factor: f64) {}

    fn sum_part(&self, _: TermCount, _: TermCount, _: TermCount, _: TermCount) -> f64 {
        0.0
    }

    fn max_part(&self) -> f64 {
        0.0
    }

    fn serialise(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        super::ParamReader::new(data, "bool").finish()?;
        Ok(Box::new(BoolWeight))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        super::parse_double_params(params, "bool", 0)?;
        Ok(Box::new(BoolWeight))
    }
}

/// Coordination matching: each matching term contributes the factor, so the
/// score counts matching subqueries.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoordWeight {
    factor: f64,
}

impl Weight for CoordWeight {
    fn name(&self) -> &'static str {
        "coord"
    }

    fn clone_boxed(&self) -> Box<dyn Weight> {
        Box::new(*self)
    }

    fn needs(&self) -> StatFlags {
        StatFlags::empty()
    }

    fn init(&mut self, _ctx: &WeightContext, factor: f64) {
        self.factor = factor;
    }

    fn sum_part(&self, _: TermCount, _: TermCount, _: TermCount, _: TermCount) -> f64 {
        self.factor
    }

    fn max_part(&self) -> f64 {
        self.factor
    }

    fn serialise(&self) -> Vec<u8> {
        Vec::new()
    }

    fn unserialise(&self, data: &[u8]) -> Result<Box<dyn Weight>> {
        super::ParamReader::new(data, "coord").finish()?;
        Ok(Box::new(CoordWeight::default()))
    }

    fn from_parameters(&self, params: &str) -> Result<Box<dyn Weight>> {
        super::parse_double_params(params, "coord", 0)?;
        Ok(Box::new(CoordWeight::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_weight_is_zero() {
        let mut w = BoolWeight;
        w.init(&WeightContext::default(), 1.0);
        assert_eq!(w.sum_part(5, 10, 3, 5), 0.0);
        assert_eq!(w.max_part(), 0.0);
        assert_eq!(w.sum_extra(10, 3), 0.0);
    }

    #[test]
    fn test_coord_counts_matches() {
        let mut w = CoordWeight::default();
        w.init(&WeightContext::default(), 2.0);
        assert_eq!(w.sum_part(1, 10, 3, 1), 2.0);
        assert_eq!(w.max_part(), 2.0);
    }

    #[test]
    fn test_from_parameters_rejects_any() {
        assert!(BoolWeight.from_parameters("").is_ok());
        assert!(BoolWeight.from_parameters("1.0").is_err());
        assert!(CoordWeight::default().from_parameters("0.5").is_err());
    }
}
