//! Reading and writing archive files.

pub mod file;

pub use file::{load_archive, save_archive};
