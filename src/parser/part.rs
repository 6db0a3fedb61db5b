//! Splitting the body of an archive into MIME parts.

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::header::HeaderTable;
use crate::parser::tokenizer::{find_next_boundary, parse_header};

/// Location of one MIME part inside the archive buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    /// Parsed part header.
    pub header: HeaderTable,
    /// First byte after the part's boundary marker line.
    pub start: usize,
    /// First body byte. `None` if the header block ran to the end of input.
    pub content: Option<usize>,
    /// One past the last body byte (start of the next marker).
    pub end: usize,
}

/// Parse the part starting at `from` (already past its marker line).
///
/// Returns the descriptor and where the following part starts, or `None`
/// when this was the last one.
pub fn parse_part(buf: &[u8], boundary: &str, from: usize) -> Result<(PartDescriptor, Option<usize>)> {
    let (end, next) = find_next_boundary(buf, boundary, from);
    let end = end.unwrap_or_else(|| {
        debug!(offset = from, "No closing boundary, part runs to end of input");
        buf.len()
    });

    let (header, content) = parse_header(buf, from)?;

    Ok((
        PartDescriptor {
            header,
            start: from,
            content,
            end,
        },
        next,
    ))
}

/// Parse every part, starting at the first boundary marker at `from`.
///
/// Always returns `None` as the final position once all parts are consumed.
pub fn parse_parts(buf: &[u8], boundary: &str, from: usize) -> Result<(Vec<PartDescriptor>, Option<usize>)> {
    let (first, mut next) = find_next_boundary(buf, boundary, from);
    let Some(first) = first else {
        warn!(offset = from, "No parts in file");
        return Ok((Vec::new(), None));
    };
    if first != from {
        warn!(expected = from, found = first, "First boundary not where the header ends");
    }

    let mut parts = Vec::new();
    while let Some(pos) = next {
        let (part, after) = parse_part(buf, boundary, pos)?;
        let end = part.end;
        debug!(start = part.start, end, "Parsed part");
        parts.push(part);

        // a closing marker followed by extra bytes reports its own start again
        if after == Some(end) {
            warn!(offset = end, "Content after closing boundary, stopping");
            break;
        }
        next = after;
    }

    Ok((parts, None))
}
