//! Design/Runtime mode switching and the state carried across it.

pub mod record;
pub mod transition;
