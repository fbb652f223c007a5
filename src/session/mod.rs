//! One job's lifecycle, from asset preparation to cleanup.

pub mod recording_session;
pub mod report;
pub mod state;
