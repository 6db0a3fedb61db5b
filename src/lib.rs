//! `mhtml` — parse, inspect and edit MHTML web archives.
//!
//! This crate provides the core library for splitting an archive into its
//! resources, reading and decoding their content, and mutating the archive
//! (insert, remove, move, replace) while keeping every resource's byte
//! offsets consistent with the underlying buffer.

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod model;
pub mod parser;
pub mod store;

pub use error::{MhtmlError, Result};
pub use model::archive::{Archive, ResourceSelector};
pub use model::header::HeaderTable;
pub use model::resource::{DetachedResource, Resource, ResourceId, ResourceMut, ResourceSource, ResourceView};
pub use parser::mhtml::{parse_archive, parse_mhtml};
pub use store::file::{load_archive, save_archive};
