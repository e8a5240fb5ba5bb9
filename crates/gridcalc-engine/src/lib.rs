//! gridcalc_engine - Reference parsing, dependency graph and formula evaluation.

pub(crate) mod builtins;
pub mod engine;
