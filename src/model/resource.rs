//! Resources: byte-range handles into an archive buffer.
//!
//! A [`Resource`] owns nothing but its header and three offsets. Content is
//! always read through the [`Archive`] that stores the handle, either with a
//! borrowed [`ResourceView`] or, for writes, a [`ResourceMut`].

use std::borrow::Cow;
use std::path::PathBuf;

use tracing::warn;

use super::archive::Archive;
use super::header::HeaderTable;
use super::{hash_bytes, ContentHash};
use crate::error::{MhtmlError, Result};
use crate::export::filename::{make_filename, FilenameOptions};
use crate::parser::encoding::ContentEncoding;

/// Identity of a resource, unique within its archive.
///
/// Survives offset shifts and moves; resolves to nothing once removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u64);

/// Stored handle for one MIME part.
///
/// Offsets index into the owning archive's buffer:
/// `offset_start` is the first byte after the boundary marker line,
/// `offset_content` the first body byte and `offset_end` one past the last
/// body byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    id: ResourceId,
    header: HeaderTable,
    offset_start: usize,
    offset_content: usize,
    offset_end: usize,
}

impl Resource {
    pub(crate) fn new(
        id: ResourceId,
        header: HeaderTable,
        offset_start: usize,
        offset_content: usize,
        offset_end: usize,
    ) -> Self {
        Self {
            id,
            header,
            offset_start,
            offset_content,
            offset_end,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn header(&self) -> &HeaderTable {
        &self.header
    }

    pub fn offset_start(&self) -> usize {
        self.offset_start
    }

    pub fn offset_content(&self) -> usize {
        self.offset_content
    }

    pub fn offset_end(&self) -> usize {
        self.offset_end
    }

    /// Size of the part header block, blank line included.
    pub fn header_length(&self) -> usize {
        self.offset_content.saturating_sub(self.offset_start)
    }

    /// Byte range covered by the part including its marker line of
    /// `boundary_length` bytes.
    pub fn resource_range(&self, boundary_length: usize) -> (usize, usize) {
        (self.offset_start.saturating_sub(boundary_length), self.offset_end)
    }

    pub(crate) fn shift(&mut self, delta: isize) {
        debug_assert!(delta >= 0 || self.offset_start >= delta.unsigned_abs());
        self.offset_start = self.offset_start.saturating_add_signed(delta);
        self.offset_content = self.offset_content.saturating_add_signed(delta);
        self.offset_end = self.offset_end.saturating_add_signed(delta);
    }

    pub(crate) fn set_end(&mut self, offset_end: usize) {
        self.offset_end = offset_end;
    }

    pub(crate) fn set_id(&mut self, id: ResourceId) {
        self.id = id;
    }
}

/// Anything that can be spliced into an archive as a new part.
pub trait ResourceSource {
    /// Header copied onto the new resource.
    fn header(&self) -> &HeaderTable;

    /// Header block followed by the body, exactly as it goes on the wire.
    fn content_with_headers(&self) -> Option<&[u8]>;

    /// Length of the header block inside [`content_with_headers`](Self::content_with_headers).
    fn header_length(&self) -> usize;
}

/// Read-only view of a resource together with its archive.
#[derive(Debug, Clone, Copy)]
pub struct ResourceView<'a> {
    archive: &'a Archive,
    resource: &'a Resource,
}

impl<'a> ResourceView<'a> {
    pub(crate) fn new(archive: &'a Archive, resource: &'a Resource) -> Self {
        Self { archive, resource }
    }

    pub fn id(&self) -> ResourceId {
        self.resource.id
    }

    pub fn handle(&self) -> &'a Resource {
        self.resource
    }

    pub fn header(&self) -> &'a HeaderTable {
        &self.resource.header
    }

    pub fn content_type(&self) -> Option<&'a str> {
        self.resource.header.content_type()
    }

    pub fn location(&self) -> Option<&'a str> {
        self.resource.header.location()
    }

    pub fn encoding(&self) -> Option<&'a str> {
        self.resource.header.encoding()
    }

    /// Raw (still transfer-encoded) body bytes.
    ///
    /// `None` if the offsets no longer fit the archive buffer.
    pub fn content(&self) -> Option<&'a [u8]> {
        self.archive
            .content()
            .get(self.resource.offset_content..self.resource.offset_end)
    }

    /// Part header block plus body.
    pub fn content_with_headers(&self) -> Option<&'a [u8]> {
        self.archive
            .content()
            .get(self.resource.offset_start..self.resource.offset_end)
    }

    pub fn content_hash(&self) -> Option<ContentHash> {
        self.content().map(hash_bytes)
    }

    pub fn content_with_headers_hash(&self) -> Option<ContentHash> {
        self.content_with_headers().map(hash_bytes)
    }

    /// Body bytes, optionally decoded according to `Content-Transfer-Encoding`.
    ///
    /// Decoding failures and unknown encodings are logged and yield `None`.
    pub fn get_content(&self, decode: bool) -> Option<Cow<'a, [u8]>> {
        if !decode {
            return self.content().map(Cow::Borrowed);
        }
        match self.decoded_content() {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(error = %e, location = ?self.location(), "Cannot decode resource content");
                None
            }
        }
    }

    /// Body bytes decoded according to `Content-Transfer-Encoding`.
    pub fn decoded_content(&self) -> Result<Cow<'a, [u8]>> {
        let raw = self.content().ok_or_else(|| {
            MhtmlError::InvalidArchive("resource offsets lie outside the archive buffer".into())
        })?;
        let name = self.encoding().unwrap_or_default();
        match ContentEncoding::parse(name) {
            ContentEncoding::Unknown if name.trim().is_empty() => {
                Err(MhtmlError::UnsupportedEncoding("<missing>".into()))
            }
            ContentEncoding::Unknown => Err(MhtmlError::UnsupportedEncoding(name.to_string())),
            encoding => encoding.decode(raw),
        }
    }

    /// Part range including its marker line, for the archive's boundary.
    pub fn resource_range(&self) -> (usize, usize) {
        self.resource
            .resource_range(self.archive.boundary_marker_length().unwrap_or(0))
    }

    /// Short output filename derived from location and content type.
    pub fn short_filename(&self, default: &str) -> PathBuf {
        make_filename(
            Some(self.header()),
            None,
            &FilenameOptions::with_default(default),
        )
    }

    /// Owned copy that can be inserted into any archive.
    pub fn detach(&self) -> Option<DetachedResource> {
        let bytes = self.content_with_headers()?;
        Some(DetachedResource {
            header: self.header().clone(),
            bytes: bytes.to_vec(),
            header_length: self.resource.header_length().min(bytes.len()),
        })
    }
}

impl ResourceSource for ResourceView<'_> {
    fn header(&self) -> &HeaderTable {
        &self.resource.header
    }

    fn content_with_headers(&self) -> Option<&[u8]> {
        ResourceView::content_with_headers(self)
    }

    fn header_length(&self) -> usize {
        self.resource.header_length()
    }
}

/// Mutable access to one resource of an archive.
#[derive(Debug)]
pub struct ResourceMut<'a> {
    archive: &'a mut Archive,
    index: usize,
}

impl<'a> ResourceMut<'a> {
    pub(crate) fn new(archive: &'a mut Archive, index: usize) -> Self {
        Self { archive, index }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn view(&self) -> Option<ResourceView<'_>> {
        self.archive.get_resource(self.index)
    }

    /// Replace the body; see [`Archive::replace_content`].
    pub fn set_content(self, content: &[u8]) -> bool {
        self.archive.replace_content(self.index, content)
    }
}

/// A resource that is not (yet) part of any archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedResource {
    header: HeaderTable,
    bytes: Vec<u8>,
    header_length: usize,
}

impl DetachedResource {
    /// Build a part from a header and a body.
    pub fn new(header: HeaderTable, body: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(body.len() + 64);
        header.write_to(&mut bytes);
        bytes.extend_from_slice(b"\r\n");
        let header_length = bytes.len();
        bytes.extend_from_slice(body);
        Self {
            header,
            bytes,
            header_length,
        }
    }

    /// Wrap already serialized part bytes whose header block is
    /// `header_length` bytes long. The length is clamped to the data.
    pub fn from_raw(header: HeaderTable, bytes: Vec<u8>, header_length: usize) -> Self {
        let header_length = header_length.min(bytes.len());
        Self {
            header,
            bytes,
            header_length,
        }
    }

    pub fn header(&self) -> &HeaderTable {
        &self.header
    }

    pub fn body(&self) -> &[u8] {
        &self.bytes[self.header_length..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl ResourceSource for DetachedResource {
    fn header(&self) -> &HeaderTable {
        &self.header
    }

    fn content_with_headers(&self) -> Option<&[u8]> {
        Some(&self.bytes)
    }

    fn header_length(&self) -> usize {
        self.header_length
    }
}
