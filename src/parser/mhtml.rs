//! Whole-file parsing: top-level header followed by the MIME parts.

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::archive::Archive;
use crate::model::header::HeaderTable;
use crate::parser::part::{parse_parts, PartDescriptor};
use crate::parser::tokenizer::{get_boundary, next_line, parse_header};

/// Parse the top-level header and return it with the offset where the body
/// (first boundary marker) starts.
fn parse_main_header(buf: &[u8]) -> Result<(HeaderTable, usize)> {
    let (header, end) = parse_header(buf, 0)?;
    let Some(mut end) = end else {
        warn!(len = buf.len(), "Archive header runs to end of input");
        return Ok((header, buf.len()));
    };

    // browsers emit one more blank line before the first marker
    let (line, next) = next_line(buf, end);
    if line.len() == 2 {
        end = next.unwrap_or(buf.len());
    } else {
        debug!(offset = end, "No extra blank line after archive header");
    }
    debug!(header_end = end, fields = header.len(), "Parsed archive header");
    Ok((header, end))
}

/// Parse an archive into its header and raw part descriptors.
///
/// The part list is `None` when the header declares no boundary.
pub fn parse_mhtml(buf: &[u8]) -> Result<(HeaderTable, Option<Vec<PartDescriptor>>)> {
    let (header, header_end) = parse_main_header(buf)?;

    let Some(boundary) = get_boundary(&header) else {
        warn!("Found no boundary in archive header");
        return Ok((header, None));
    };
    debug!(boundary = %boundary, "Found boundary");

    let (parts, _) = parse_parts(buf, &boundary, header_end)?;
    debug!(count = parts.len(), "Parsed parts");
    Ok((header, Some(parts)))
}

/// Parse `content` into an [`Archive`] that takes ownership of the bytes.
///
/// With `only_header` the parts are not scanned and the archive has no
/// resources.
pub fn parse_archive(content: Vec<u8>, only_header: bool) -> Result<Archive> {
    let (header, header_end) = parse_main_header(&content)?;
    let mut archive = Archive::new(content, header, header_end, None);
    if archive.boundary().is_none() {
        warn!("Found no boundary in archive header");
    }
    if only_header {
        return Ok(archive);
    }

    let Some(boundary) = archive.boundary().map(str::to_owned) else {
        return Ok(archive);
    };
    let (parts, _) = parse_parts(archive.content(), &boundary, header_end)?;
    debug!(count = parts.len(), "Parsed parts");
    archive.adopt_parts(parts);
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MhtmlError;

    const SAMPLE: &[u8] = b"From: <Saved by Blink>\r\n\
Snapshot-Content-Location: https://example.com/\r\n\
Content-Type: multipart/related;\r\n\
\ttype=\"text/html\";\r\n\
\tboundary=\"----MultipartBoundary--abc----\"\r\n\
\r\n\
\r\n\
------MultipartBoundary--abc----\r\n\
Content-Type: text/html\r\n\
Content-Location: https://example.com/\r\n\
\r\n\
<html></html>\r\n\
------MultipartBoundary--abc----\r\n\
Content-Type: image/png\r\n\
Content-Location: https://example.com/a.png\r\n\
\r\n\
PNG\r\n\
------MultipartBoundary--abc------\r\n";

    #[test]
    fn test_parse_mhtml_parts() {
        let (header, parts) = parse_mhtml(SAMPLE).unwrap();
        assert_eq!(header.get("from"), Some("<Saved by Blink>"));
        let parts = parts.unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].header.get("Content-Type"), Some("text/html"));
        assert_eq!(
            &SAMPLE[parts[0].content.unwrap()..parts[0].end],
            b"<html></html>\r\n"
        );
        assert_eq!(&SAMPLE[parts[1].content.unwrap()..parts[1].end], b"PNG\r\n");
    }

    #[test]
    fn test_parse_archive_structure() {
        let archive = parse_archive(SAMPLE.to_vec(), false).unwrap();
        assert_eq!(archive.boundary(), Some("----MultipartBoundary--abc----"));
        assert_eq!(archive.resource_count(), 2);
        assert_eq!(archive.location(), Some("https://example.com/"));
        assert_eq!(archive.content_type(), Some("multipart/related"));
        assert_eq!(&SAMPLE[archive.header_length()..][..2], b"--");
        assert_eq!(archive.content(), SAMPLE);
    }

    #[test]
    fn test_parse_archive_only_header() {
        let archive = parse_archive(SAMPLE.to_vec(), true).unwrap();
        assert_eq!(archive.resource_count(), 0);
        assert_eq!(archive.boundary(), Some("----MultipartBoundary--abc----"));
    }

    #[test]
    fn test_without_extra_blank_line() {
        let buf = b"Content-Type: multipart/related; boundary=\"B\"\r\n\r\n--B\r\nA: 1\r\n\r\nx\r\n--B--\r\n";
        let archive = parse_archive(buf.to_vec(), false).unwrap();
        assert_eq!(archive.header_length(), 49);
        assert_eq!(archive.resource_count(), 1);
        assert_eq!(archive.get_resource(0).unwrap().content(), Some(&b"x\r\n"[..]));
    }

    #[test]
    fn test_no_boundary() {
        let buf = b"Content-Type: text/html\r\n\r\n<html/>";
        let (_, parts) = parse_mhtml(buf).unwrap();
        assert!(parts.is_none());
        let archive = parse_archive(buf.to_vec(), false).unwrap();
        assert_eq!(archive.resource_count(), 0);
        assert_eq!(archive.boundary(), None);
    }

    #[test]
    fn test_header_without_blank_line_is_malformed() {
        let err = parse_archive(b"A: b\r\nC: d".to_vec(), false).unwrap_err();
        assert!(matches!(err, MhtmlError::MalformedHeader { offset: 0, .. }));
    }
}
