//! Cross-module scenario and property tests.

mod properties;
mod pruning;
mod tables;
