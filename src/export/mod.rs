//! Export functionality: resource extraction, main page extraction and archive merge.

pub mod extract;
pub mod filename;
pub mod merge;
