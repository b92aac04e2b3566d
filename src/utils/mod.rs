//! Small shared utilities

pub mod constants;
pub mod format;
