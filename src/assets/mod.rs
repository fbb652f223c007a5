//! Temporary capture assets: their stored shape and the builder that writes them.

pub mod builder;
pub mod model;
