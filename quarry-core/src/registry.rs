//! Name → prototype registry for user-pluggable subclasses: weighting
//! schemes, posting sources, match spies, lat-long metrics and key makers.

use std::sync::Arc;

use log::debug;
use rustc_hash::FxHashMap;

use crate::document::Document;
use crate::error::{Error, Result};
use crate::matcher::{MatchSpy, ValueCountSpy};
use crate::postlist::{FixedWeightSource, PostingSource};
use crate::weight::{
    BB2Weight, Bm25PlusWeight, Bm25Weight, BoolWeight, CoordWeight, DLHWeight, DPHWeight,
    IfB2Weight, IneB2Weight, InL2Weight, LM2StageWeight, LMAbsDiscountWeight, LMDirichletWeight,
    LMJMWeight, PL2PlusWeight, PL2Weight, TfIdfWeight, Weight,
};

// ── Lat-long metrics ─────────────────────────────────────────────────────

/// A coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLongCoord {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLongCoord {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Distance between two coordinates, in metres.
pub trait LatLongMetric: Send + Sync {
    /// Stable metric name, the registry key.
    fn name(&self) -> &'static str;

    fn clone_boxed(&self) -> Box<dyn LatLongMetric>;

    fn distance(&self, a: &LatLongCoord, b: &LatLongCoord) -> f64;
}

impl std::fmt::Debug for dyn LatLongMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LatLongMetric({})", self.name())
    }
}

/// Haversine great-circle distance on a spherical earth.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreatCircleMetric;

const EARTH_RADIUS_METRES: f64 = 6_372_797.6;

impl LatLongMetric for GreatCircleMetric {
    fn name(&self) -> &'static str {
        "greatcircle"
    }

    fn clone_boxed(&self) -> Box<dyn LatLongMetric> {
        Box::new(*self)
    }

    fn distance(&self, a: &LatLongCoord, b: &LatLongCoord) -> f64 {
        let lat_a = a.latitude.to_radians();
        let lat_b = b.latitude.to_radians();
        let dlat = (b.latitude - a.latitude).to_radians();
        let dlon = (b.longitude - a.longitude).to_radians();
        let h = (dlat / 2.0).sin().powi(2)
            + lat_a.cos() * lat_b.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_METRES * h.sqrt().asin()
    }
}

// ── Key makers ───────────────────────────────────────────────────────────

/// Builds a sort key for a document, e.g. for collapsing or value ordering.
pub trait KeyMaker: Send + Sync {
    /// Stable key-maker name, the registry key.
    fn name(&self) -> &'static str;

    fn make_key(&self, doc: &Document) -> Vec<u8>;
}

impl std::fmt::Debug for dyn KeyMaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaker({})", self.name())
    }
}

/// Concatenates values from a list of slots, with a separator that sorts
/// before any value byte.
#[derive(Debug, Clone, Default)]
pub struct MultiValueKeyMaker {
    slots: Vec<u32>,
}

impl MultiValueKeyMaker {
    pub fn new(slots: impl IntoIterator<Item = u32>) -> Self {
        Self {
            slots: slots.into_iter().collect(),
        }
    }
}

impl KeyMaker for MultiValueKeyMaker {
    fn name(&self) -> &'static str {
        "multivalue"
    }

    fn make_key(&self, doc: &Document) -> Vec<u8> {
        let mut key = Vec::new();
        for (i, &slot) in self.slots.iter().enumerate() {
            if i > 0 {
                key.push(0);
            }
            if let Some(value) = doc.value(slot) {
                // Escape NUL so the separator stays unambiguous.
                for &b in value {
                    if b == 0 {
                        key.extend_from_slice(&[0, 0xff]);
                    } else {
                        key.push(b);
                    }
                }
            }
        }
        key
    }
}

// ── The registry ─────────────────────────────────────────────────────────

/// Per-category name → prototype maps. Registering clones the caller's
/// object (or shares it, for the reference-counted key makers); a duplicate
/// name replaces and drops the prior entry; lookups return borrowed
/// references and `None` for unknown names.
pub struct Registry {
    wtschemes: FxHashMap<String, Box<dyn Weight>>,
    sources: FxHashMap<String, Box<dyn PostingSource>>,
    spies: FxHashMap<String, Box<dyn MatchSpy>>,
    metrics: FxHashMap<String, Box<dyn LatLongMetric>>,
    key_makers: FxHashMap<String, Arc<dyn KeyMaker>>,
}

fn checked_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(Error::InvalidOperation(
            "unable to register object - name() returned an empty string".into(),
        ));
    }
    Ok(name.to_string())
}

impl Registry {
    /// A registry pre-populated with every built-in scheme, source, spy,
    /// metric and key maker.
    pub fn new() -> Self {
        let mut registry = Self {
            wtschemes: FxHashMap::default(),
            sources: FxHashMap::default(),
            spies: FxHashMap::default(),
            metrics: FxHashMap::default(),
            key_makers: FxHashMap::default(),
        };
        registry.add_defaults();
        registry
    }

    fn add_defaults(&mut self) {
        let schemes: Vec<Box<dyn Weight>> = vec![
            Box::new(BB2Weight::default()),
            Box::new(Bm25Weight::default()),
            Box::new(Bm25PlusWeight::default()),
            Box::new(BoolWeight),
            Box::new(CoordWeight::default()),
            Box::new(DLHWeight::default()),
            Box::new(DPHWeight::default()),
            Box::new(IfB2Weight::default()),
            Box::new(IneB2Weight::default()),
            Box::new(InL2Weight::default()),
            Box::new(LM2StageWeight::default()),
            Box::new(LMAbsDiscountWeight::default()),
            Box::new(LMDirichletWeight::default()),
            Box::new(LMJMWeight::default()),
            Box::new(PL2Weight::default()),
            Box::new(PL2PlusWeight::default()),
            Box::new(TfIdfWeight::default()),
        ];
        for scheme in schemes {
            self.wtschemes.insert(scheme.name().to_string(), scheme);
        }

        let source = FixedWeightSource::new(0.0);
        self.sources.insert(source.name().to_string(), Box::new(source));

        let spy = ValueCountSpy::new(0);
        self.spies.insert(spy.name().to_string(), Box::new(spy));

        let metric = GreatCircleMetric;
        self.metrics.insert(metric.name().to_string(), Box::new(metric));

        let key_maker = MultiValueKeyMaker::default();
        self.key_makers
            .insert(key_maker.name().to_string(), Arc::new(key_maker));
    }

    pub fn register_weighting_scheme(&mut self, scheme: &dyn Weight) -> Result<()> {
        let name = checked_name(scheme.name())?;
        if self.wtschemes.insert(name.clone(), scheme.clone_boxed()).is_some() {
            debug!("registry: replaced weighting scheme {:?}", name);
        }
        Ok(())
    }

    pub fn get_weighting_scheme(&self, name: &str) -> Option<&dyn Weight> {
        self.wtschemes.get(name).map(|w| w.as_ref())
    }

    pub fn register_posting_source(&mut self, source: &dyn PostingSource) -> Result<()> {
        let name = checked_name(source.name())?;
        if self.sources.insert(name.clone(), source.clone_boxed()).is_some() {
            debug!("registry: replaced posting source {:?}", name);
        }
        Ok(())
    }

    pub fn get_posting_source(&self, name: &str) -> Option<&dyn PostingSource> {
        self.sources.get(name).map(|s| s.as_ref())
    }

    pub fn register_match_spy(&mut self, spy: &dyn MatchSpy) -> Result<()> {
        let name = checked_name(spy.name())?;
        if self.spies.insert(name.clone(), spy.clone_boxed()).is_some() {
            debug!("registry: replaced match spy {:?}", name);
        }
        Ok(())
    }

    pub fn get_match_spy(&self, name: &str) -> Option<&dyn MatchSpy> {
        self.spies.get(name).map(|s| s.as_ref())
    }

    pub fn register_lat_long_metric(&mut self, metric: &dyn LatLongMetric) -> Result<()> {
        let name = checked_name(metric.name())?;
        if self.metrics.insert(name.clone(), metric.clone_boxed()).is_some() {
            debug!("registry: replaced lat-long metric {:?}", name);
        }
        Ok(())
    }

    pub fn get_lat_long_metric(&self, name: &str) -> Option<&dyn LatLongMetric> {
        self.metrics.get(name).map(|m| m.as_ref())
    }

    /// Key makers are reference counted: the registry shares the caller's
    /// object instead of cloning it.
    pub fn register_key_maker(&mut self, key_maker: Arc<dyn KeyMaker>) -> Result<()> {
        let name = checked_name(key_maker.name())?;
        if self.key_makers.insert(name.clone(), key_maker).is_some() {
            debug!("registry: replaced key maker {:?}", name);
        }
        Ok(())
    }

    pub fn get_key_maker(&self, name: &str) -> Option<&Arc<dyn KeyMaker>> {
        self.key_makers.get(name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TermCount;
    use crate::stats::{StatFlags, WeightContext};

    #[test]
    fn test_defaults_present() {
        let registry = Registry::new();
        for name in [
            "bb2",
            "bm25",
            "bm25+",
            "bool",
            "coord",
            "dlh",
            "dph",
            "ifb2",
            "ineb2",
            "inl2",
            "lm2stage",
            "lmabsdiscount",
            "lmdirichlet",
            "lmjm",
            "pl2",
            "pl2+",
            "tfidf",
        ] {
            assert!(
                registry.get_weighting_scheme(name).is_some(),
                "missing scheme {}",
                name
            );
        }
        assert!(registry.get_posting_source("fixed").is_some());
        assert!(registry.get_match_spy("valuecount").is_some());
        assert!(registry.get_lat_long_metric("greatcircle").is_some());
        assert!(registry.get_key_maker("multivalue").is_some());
        assert!(registry.get_weighting_scheme("nope").is_none());
    }

    #[test]
    fn test_scheme_from_registry_builds_parameterised_copy() {
        let registry = Registry::new();
        let proto = registry.get_weighting_scheme("pl2+").unwrap();
        let built = proto.from_parameters("2.0 0.5").unwrap();
        assert_eq!(built.name(), "pl2+");
    }

    #[test]
    fn test_replace_by_name() {
        struct RenamedScheme;
        impl Weight for RenamedScheme {
            fn name(&self) -> &'static str {
                "bm25"
            }
            fn clone_boxed(&self) -> Box<dyn Weight> {
                Box::new(RenamedScheme)
            }
            fn needs(&self) -> StatFlags {
                StatFlags::empty()
            }
            fn init(&mut self, _: &WeightContext, _: f64) {}
            fn sum_part(&self, _: TermCount, _: TermCount, _: TermCount, _: TermCount) -> f64 {
                42.0
            }
            fn max_part(&self) -> f64 {
                42.0
            }
            fn serialise(&self) -> Vec<u8> {
                Vec::new()
            }
            fn unserialise(&self, _: &[u8]) -> crate::error::Result<Box<dyn Weight>> {
                Ok(Box::new(RenamedScheme))
            }
            fn from_parameters(&self, _: &str) -> crate::error::Result<Box<dyn Weight>> {
                Ok(Box::new(RenamedScheme))
            }
        }

        let mut registry = Registry::new();
        registry.register_weighting_scheme(&RenamedScheme).unwrap();
        let got = registry.get_weighting_scheme("bm25").unwrap();
        assert_eq!(got.sum_part(1, 1, 1, 1), 42.0);
    }

    #[test]
    fn test_empty_name_rejected() {
        struct NamelessKeyMaker;
        impl KeyMaker for NamelessKeyMaker {
            fn name(&self) -> &'static str {
                ""
            }
            fn make_key(&self, _doc: &Document) -> Vec<u8> {
                Vec::new()
            }
        }

        let mut registry = Registry::new();
        assert!(matches!(
            registry.register_key_maker(Arc::new(NamelessKeyMaker)),
            Err(Error::InvalidOperation(_))
        ));
    }

    #[test]
    fn test_key_maker_shared_not_cloned() {
        let mut registry = Registry::new();
        let maker: Arc<dyn KeyMaker> = Arc::new(MultiValueKeyMaker::new([3, 5]));
        registry.register_key_maker(maker.clone()).unwrap();
        let got = registry.get_key_maker("multivalue").unwrap();
        assert!(Arc::ptr_eq(got, &maker));
    }

    #[test]
    fn test_multi_value_key_maker() {
        let mut doc = Document::new();
        doc.set_value(3, b"abc".to_vec());
        doc.set_value(5, b"x\0y".to_vec());
        let maker = MultiValueKeyMaker::new([3, 5]);
        assert_eq!(maker.make_key(&doc), b"abc\0x\0\xffy".to_vec());
    }

    #[test]
    fn test_great_circle_distance() {
        let metric = GreatCircleMetric;
        let london = LatLongCoord::new(51.5074, -0.1278);
        let paris = LatLongCoord::new(48.8566, 2.3522);
        let d = metric.distance(&london, &paris);
        // Roughly 344 km.
        assert!((d - 344_000.0).abs() < 10_000.0, "distance {}", d);
        assert_eq!(metric.distance(&london, &london), 0.0);
    }
}
