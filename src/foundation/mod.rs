/// Value types shared by every subsystem.
pub mod core;
/// Crate error type and taxonomy.
pub mod error;
