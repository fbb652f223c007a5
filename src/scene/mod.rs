//! Read-side view of the host scene and durable node references.

pub mod model;
/// Node descriptors and the three-strategy resolver.
pub mod reference;
