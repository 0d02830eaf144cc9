//! Media analysis.

pub mod probe;
