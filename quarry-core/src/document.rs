//! Document model: opaque data, numbered value slots and an indexed term
//! list with per-term wdf and position lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::TermCount;

/// One term's entry in a document: its wdf and (optionally) the ordered
/// positions it occurs at. Positions are strictly increasing and start at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    pub wdf: TermCount,
    pub positions: Vec<u32>,
}

/// A document: data blob, value slots and terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    data: Vec<u8>,
    values: BTreeMap<u32, Vec<u8>>,
    terms: BTreeMap<Vec<u8>, TermEntry>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Set the value in a slot, replacing any previous value.
    pub fn set_value(&mut self, slot: u32, value: impl Into<Vec<u8>>) {
        self.values.insert(slot, value.into());
    }

    pub fn value(&self, slot: u32) -> Option<&[u8]> {
        self.values.get(&slot).map(|v| v.as_slice())
    }

    pub fn remove_value(&mut self, slot: u32) {
        self.values.remove(&slot);
    }

    pub fn values(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.values.iter().map(|(&slot, v)| (slot, v.as_slice()))
    }

    /// Add `wdf_inc` occurrences of a term without position information.
    pub fn add_term(&mut self, term: impl Into<Vec<u8>>, wdf_inc: TermCount) {
        let entry = self.terms.entry(term.into()).or_default();
        entry.wdf += wdf_inc;
    }

    /// Add an occurrence of a term at a position. The position list stays
    /// sorted and duplicate positions are ignored (wdf still increments).
    pub fn add_posting(&mut self, term: impl Into<Vec<u8>>, position: u32, wdf_inc: TermCount) {
        let entry = self.terms.entry(term.into()).or_default();
        entry.wdf += wdf_inc;
        match entry.positions.binary_search(&position) {
            Ok(_) => {}
            Err(at) => entry.positions.insert(at, position),
        }
    }

    pub fn term(&self, term: &[u8]) -> Option<&TermEntry> {
        self.terms.get(term)
    }

    pub fn terms(&self) -> impl Iterator<Item = (&[u8], &TermEntry)> {
        self.terms.iter().map(|(t, e)| (t.as_slice(), e))
    }

    /// Number of distinct terms.
    pub fn termlist_count(&self) -> u32 {
        self.terms.len() as u32
    }

    /// Sum of wdf over all terms.
    pub fn length(&self) -> TermCount {
        self.terms.values().map(|e| e.wdf).sum()
    }

    /// Largest wdf of any single term.
    pub fn wdf_max(&self) -> TermCount {
        self.terms.values().map(|e| e.wdf).max().unwrap_or(0)
    }

    /// True if any term carries an empty name.
    pub(crate) fn has_empty_term(&self) -> bool {
        self.terms.keys().any(|t| t.is_empty())
    }
}
