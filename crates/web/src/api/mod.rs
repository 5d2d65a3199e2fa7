//! REST API endpoint modules.

pub mod admin;
pub mod directory;
pub mod status;
