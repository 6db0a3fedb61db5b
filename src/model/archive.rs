//! The in-memory MHTML archive and its offset-tracking mutations.
//!
//! The archive buffer is the single source of truth. Resources are handles
//! holding byte offsets into it; every mutation that changes the buffer
//! length at some position shifts the offsets of all later resources by the
//! exact byte delta, so that each handle keeps addressing the same bytes.

use std::fmt;

use tracing::{debug, warn};

use super::header::HeaderTable;
use super::resource::{DetachedResource, Resource, ResourceId, ResourceMut, ResourceSource, ResourceView};
use super::{hash_bytes, ContentHash};
use crate::parser::part::PartDescriptor;
use crate::parser::tokenizer::{get_boundary, marker_length, part_marker};

/// Addresses a resource either by position or by identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceSelector {
    Index(usize),
    Id(ResourceId),
}

impl From<usize> for ResourceSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<ResourceId> for ResourceSelector {
    fn from(id: ResourceId) -> Self {
        Self::Id(id)
    }
}

impl From<&Resource> for ResourceSelector {
    fn from(resource: &Resource) -> Self {
        Self::Id(resource.id())
    }
}

impl From<ResourceView<'_>> for ResourceSelector {
    fn from(view: ResourceView<'_>) -> Self {
        Self::Id(view.id())
    }
}

impl From<&ResourceView<'_>> for ResourceSelector {
    fn from(view: &ResourceView<'_>) -> Self {
        Self::Id(view.id())
    }
}

/// A parsed MHTML archive.
#[derive(Clone)]
pub struct Archive {
    buffer: Vec<u8>,
    header: HeaderTable,
    header_length: usize,
    boundary: Option<String>,
    resources: Vec<Resource>,
    next_id: u64,
}

impl Archive {
    /// Wrap `content` with an already parsed top-level header.
    ///
    /// `header_length` is where the first boundary marker starts. When
    /// `boundary` is `None` it is derived from the header's `Content-Type`.
    /// The archive starts without resources; see [`adopt_parts`](Self::adopt_parts).
    pub fn new(
        content: Vec<u8>,
        header: HeaderTable,
        header_length: usize,
        boundary: Option<String>,
    ) -> Self {
        let boundary = boundary.or_else(|| get_boundary(&header));
        Self {
            buffer: content,
            header,
            header_length,
            boundary,
            resources: Vec::new(),
            next_id: 0,
        }
    }

    /// Create resource handles for parsed parts, in order.
    ///
    /// A part whose header ran to the end of its range gets an empty body.
    pub fn adopt_parts(&mut self, parts: Vec<PartDescriptor>) {
        self.resources.reserve(parts.len());
        for part in parts {
            let content = match part.content {
                Some(content) if content <= part.end => content,
                other => {
                    warn!(start = part.start, content = ?other, end = part.end, "Part header overlaps its end, empty body");
                    part.end
                }
            };
            self.push_handle(part.header, part.start, content, part.end);
        }
    }

    pub(crate) fn push_handle(
        &mut self,
        header: HeaderTable,
        start: usize,
        content: usize,
        end: usize,
    ) -> ResourceId {
        let id = self.allocate_id();
        self.resources.push(Resource::new(id, header, start, content, end));
        id
    }

    fn allocate_id(&mut self) -> ResourceId {
        let id = ResourceId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The whole serialized archive.
    pub fn content(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_content(self) -> Vec<u8> {
        self.buffer
    }

    pub fn content_hash(&self) -> ContentHash {
        hash_bytes(&self.buffer)
    }

    pub fn header(&self) -> &HeaderTable {
        &self.header
    }

    /// Offset where the top-level header block ends.
    pub fn header_length(&self) -> usize {
        self.header_length
    }

    /// Boundary token, without the leading `--`.
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    /// Length of a `--<boundary>\r\n` line, if the archive has a boundary.
    pub fn boundary_marker_length(&self) -> Option<usize> {
        self.boundary.as_deref().map(marker_length)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header.content_type()
    }

    /// Location of the main document.
    pub fn location(&self) -> Option<&str> {
        self.header.location()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Raw resource handles in archive order.
    pub fn handles(&self) -> &[Resource] {
        &self.resources
    }

    /// Views over all resources in archive order.
    pub fn resources(&self) -> impl ExactSizeIterator<Item = ResourceView<'_>> + '_ {
        self.resources.iter().map(move |r| ResourceView::new(self, r))
    }

    pub fn get_resource(&self, index: usize) -> Option<ResourceView<'_>> {
        self.resources.get(index).map(|r| ResourceView::new(self, r))
    }

    pub fn get_resource_mut(&mut self, index: usize) -> Option<ResourceMut<'_>> {
        if index >= self.resources.len() {
            return None;
        }
        Some(ResourceMut::new(self, index))
    }

    /// Current index of the selected resource.
    pub fn resolve(&self, selector: impl Into<ResourceSelector>) -> Option<usize> {
        match selector.into() {
            ResourceSelector::Index(index) => (index < self.resources.len()).then_some(index),
            ResourceSelector::Id(id) => self.resources.iter().position(|r| r.id() == id),
        }
    }

    /// Remove a resource together with its boundary marker line.
    ///
    /// Returns `false` if the selector does not resolve.
    pub fn remove_resource(&mut self, selector: impl Into<ResourceSelector>) -> bool {
        let Some(index) = self.resolve(selector) else {
            return false;
        };
        let marker_len = self.boundary_marker_length().unwrap_or(0);
        let (start, end) = self.resources[index].resource_range(marker_len);
        if start > end || end > self.buffer.len() {
            warn!(index, start, end, len = self.buffer.len(), "Resource range outside archive");
            return false;
        }

        self.buffer.drain(start..end);
        self.resources.remove(index);
        self.update_offsets(-to_delta(end - start), index);
        debug!(index, removed = end - start, "Removed resource");
        true
    }

    /// Splice a copy of `donor` in front of the resource at `index`.
    ///
    /// An `index` past the end appends. Fails without a boundary or when
    /// the donor has no content.
    ///
    /// The donor bytes are spliced verbatim. If they do not end in `\r\n`
    /// the following marker loses its line break, so a re-parse of the
    /// saved archive no longer sees it; a warning is logged.
    pub fn insert_resource<S: ResourceSource + ?Sized>(&mut self, index: usize, donor: &S) -> bool {
        let Some(bytes) = donor.content_with_headers() else {
            warn!(index, "Donor resource has no content");
            return false;
        };
        self.splice_resource(index, donor.header().clone(), bytes, donor.header_length())
            .is_some()
    }

    /// Insert `donor` after the last resource.
    pub fn append_resource<S: ResourceSource + ?Sized>(&mut self, donor: &S) -> bool {
        self.insert_resource(self.resources.len(), donor)
    }

    fn splice_resource(
        &mut self,
        index: usize,
        header: HeaderTable,
        bytes: &[u8],
        header_length: usize,
    ) -> Option<usize> {
        let Some(boundary) = self.boundary.as_deref() else {
            warn!("Archive has no boundary, cannot insert resource");
            return None;
        };
        let marker = part_marker(boundary);
        let index = index.min(self.resources.len());

        let offset = match self.resources.get(index) {
            Some(next) => next.offset_start().saturating_sub(marker.len()),
            None => self
                .resources
                .last()
                .map_or(self.header_length, Resource::offset_end),
        };
        if offset > self.buffer.len() {
            warn!(index, offset, len = self.buffer.len(), "Insert position outside archive");
            return None;
        }

        if !ends_with_line_break(bytes) {
            warn!(index, "Inserted resource does not end in CRLF, next marker will not re-parse");
        }

        let inserted = marker.len() + bytes.len();
        self.buffer.splice(
            offset..offset,
            marker.iter().chain(bytes.iter()).copied(),
        );

        let start = offset + marker.len();
        let content = start + header_length.min(bytes.len());
        let id = self.allocate_id();
        self.resources
            .insert(index, Resource::new(id, header, start, content, start + bytes.len()));
        self.update_offsets(to_delta(inserted), index + 1);
        debug!(index, inserted, "Inserted resource");
        Some(index)
    }

    /// Move a resource so that it ends up in front of the one currently at
    /// `to`. The resource keeps its [`ResourceId`].
    pub fn move_resource(&mut self, selector: impl Into<ResourceSelector>, to: usize) -> bool {
        let Some(from) = self.resolve(selector) else {
            return false;
        };
        if from == to {
            return true;
        }
        let Some(copy) = self.get_resource(from).and_then(|r| r.detach()) else {
            return false;
        };
        let id = self.resources[from].id();

        let Some(inserted) = self.insert_detached(to, &copy) else {
            return false;
        };
        let (original, moved) = if inserted <= from {
            (from + 1, inserted)
        } else {
            (from, inserted - 1)
        };
        if !self.remove_resource(original) {
            return false;
        }
        self.resources[moved].set_id(id);
        true
    }

    fn insert_detached(&mut self, index: usize, donor: &DetachedResource) -> Option<usize> {
        let header_length = donor.header_length();
        self.splice_resource(index, donor.header().clone(), donor.as_bytes(), header_length)
    }

    /// Replace the body of a resource, keeping its header.
    ///
    /// `content` is written verbatim. A body without a trailing `\r\n`
    /// hides the next marker from a re-parse; a warning is logged.
    pub fn replace_content(&mut self, selector: impl Into<ResourceSelector>, content: &[u8]) -> bool {
        let Some(index) = self.resolve(selector) else {
            return false;
        };
        let resource = &self.resources[index];
        let (start, end) = (resource.offset_content(), resource.offset_end());
        if start > end || end > self.buffer.len() {
            warn!(index, start, end, len = self.buffer.len(), "Resource content outside archive");
            return false;
        }

        if !ends_with_line_break(content) {
            warn!(index, "New content does not end in CRLF, next marker will not re-parse");
        }

        self.buffer.splice(start..end, content.iter().copied());
        self.resources[index].set_end(start + content.len());
        self.update_offsets(to_delta(content.len()) - to_delta(end - start), index + 1);
        true
    }

    fn update_offsets(&mut self, delta: isize, from: usize) {
        if delta == 0 {
            return;
        }
        if let Some(following) = self.resources.get_mut(from..) {
            for resource in following {
                resource.shift(delta);
            }
        }
    }
}

fn ends_with_line_break(bytes: &[u8]) -> bool {
    bytes.ends_with(b"\r\n")
}

fn to_delta(len: usize) -> isize {
    isize::try_from(len).unwrap_or(isize::MAX)
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("len", &self.buffer.len())
            .field("header", &self.header)
            .field("header_length", &self.header_length)
            .field("boundary", &self.boundary)
            .field("resources", &self.resources)
            .finish()
    }
}
