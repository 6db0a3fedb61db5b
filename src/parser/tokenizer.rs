//! Low-level MIME tokenizing over a byte buffer.
//!
//! Every function here is stateless and works on `(buffer, position)` pairs.
//! Positions are byte offsets; `None` means "not found" or "no more input".

use memchr::memmem;
use tracing::{debug, warn};

use crate::error::{MhtmlError, Result};
use crate::model::header::HeaderTable;

/// MIME line terminator.
pub const CRLF: &[u8] = b"\r\n";

/// Byte length of a part marker line (`--` + boundary + CRLF).
pub fn marker_length(boundary: &str) -> usize {
    boundary.len() + 4
}

/// `--<boundary>\r\n`, the line that opens every part.
pub fn part_marker(boundary: &str) -> Vec<u8> {
    format!("--{boundary}\r\n").into_bytes()
}

/// `--<boundary>--\r\n`, the line that closes the last part.
pub fn closing_marker(boundary: &str) -> Vec<u8> {
    format!("--{boundary}--\r\n").into_bytes()
}

/// Index just past the next `\r\n` at or after `from`.
pub fn find_next_linebreak(buf: &[u8], from: usize) -> Option<usize> {
    let tail = buf.get(from..)?;
    memmem::find(tail, CRLF).map(|pos| from + pos + CRLF.len())
}

/// Read one logical line starting at `from`, terminator included.
///
/// A `\r\n` directly followed by a tab is a folded continuation and does
/// not end the line. Returns `None` as the next position when the line
/// runs to the end of the buffer, whether or not it ends with `\r\n`.
pub fn next_line(buf: &[u8], from: usize) -> (&[u8], Option<usize>) {
    let tail = buf.get(from..).unwrap_or_default();
    let Some(mut next) = find_next_linebreak(buf, from) else {
        return (tail, None);
    };

    loop {
        match buf.get(next) {
            None => return (tail, None),
            Some(b'\t') => match find_next_linebreak(buf, next) {
                Some(pos) => next = pos,
                None => return (tail, None),
            },
            Some(_) => break,
        }
    }

    (&buf[from..next], Some(next))
}

/// Parse a header block starting at `from`.
///
/// Stops after the first blank line (any line of at most two bytes) and
/// returns the position right after it, or `None` when the block reaches
/// the end of the buffer. Lines without a `": "` separator are skipped.
pub fn parse_header(buf: &[u8], from: usize) -> Result<(HeaderTable, Option<usize>)> {
    let mut header = HeaderTable::new();
    let mut next = Some(from);
    let mut blank_lines = 0usize;

    while let Some(pos) = next {
        let (line, after) = next_line(buf, pos);
        next = after;

        if line.len() <= 2 {
            blank_lines += 1;
            break;
        }

        let line = line.strip_suffix(CRLF).unwrap_or(line);
        let text = decode_header_bytes(line);
        match text.split_once(": ") {
            Some((name, value)) => header.set(name, value),
            None => warn!(offset = pos, line = %text, "No separator in header line"),
        }
    }

    if blank_lines == 0 {
        return Err(MhtmlError::MalformedHeader {
            offset: from,
            reason: "input ended before the blank line closing the header".into(),
        });
    }

    Ok((header, next))
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// MIME type of a `Content-Type` header, without parameters.
pub fn get_content_type(headers: &HeaderTable) -> Option<&str> {
    let Some(ctype) = headers.get("Content-Type") else {
        debug!("No Content-Type header");
        return None;
    };
    Some(ctype.split_once(';').map_or(ctype, |(mimetype, _)| mimetype))
}

/// Boundary token declared by a `multipart/related` `Content-Type`.
pub fn get_boundary(headers: &HeaderTable) -> Option<String> {
    const PARAM: &str = "boundary=\"";

    let Some(ctype) = headers.get("Content-Type") else {
        warn!("No Content-Type header, cannot find a boundary");
        return None;
    };
    let Some((mimetype, _)) = ctype.split_once(';') else {
        warn!(content_type = ctype, "Content-Type has no parameters");
        return None;
    };
    if mimetype != "multipart/related" {
        warn!(mimetype, "Wrong mimetype, not a multipart archive");
        return None;
    }
    let Some(pos) = ctype.find(PARAM) else {
        warn!(content_type = ctype, "Missing boundary declaration");
        return None;
    };

    let value = &ctype[pos + PARAM.len()..];
    let boundary = value.split('"').next().unwrap_or(value);
    Some(boundary.to_string())
}

/// Locate the next part marker at or after `from`.
///
/// Returns `(marker_start, next_part_start)`:
///
/// - `(Some(m), Some(m + marker_len))` for a part marker preceded by a line
///   break (or at the very start of the buffer),
/// - `(Some(m), None)` for a closing marker ending exactly at buffer end,
/// - `(Some(m), Some(m))` for a closing marker followed by more bytes,
/// - `(None, None)` when nothing is found.
pub fn find_next_boundary(buf: &[u8], boundary: &str, from: usize) -> (Option<usize>, Option<usize>) {
    let marker = part_marker(boundary);
    let mut search_from = from;

    while let Some(pos) = find_from(buf, &marker, search_from) {
        if pos == 0 || buf[..pos].ends_with(CRLF) {
            return (Some(pos), Some(pos + marker.len()));
        }
        debug!(offset = pos, "Boundary found inside content, searching further");
        search_from = pos + marker.len();
    }

    let closing = closing_marker(boundary);
    match find_from(buf, &closing, search_from) {
        Some(pos) if pos + closing.len() == buf.len() => (Some(pos), None),
        other => (other, other),
    }
}

fn find_from(buf: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    let tail = buf.get(from..)?;
    memmem::find(tail, needle).map(|pos| from + pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BND: &str = "---boundary---";

    #[test]
    fn test_find_next_linebreak() {
        assert_eq!(find_next_linebreak(b"", 0), None);
        assert_eq!(find_next_linebreak(b"abc\r\ndef", 0), Some(5));
        assert_eq!(find_next_linebreak(b"abc\r\ndef", 6), None);
        assert_eq!(find_next_linebreak(b"abc\rdef", 0), None);
        assert_eq!(find_next_linebreak(b"abc\ndef", 0), None);
        assert_eq!(find_next_linebreak(b"abc", 10), None);
    }

    #[test]
    fn test_next_line() {
        assert_eq!(next_line(b"", 0), (&b""[..], None));
        assert_eq!(next_line(b"abc\r\ndef", 0), (&b"abc\r\n"[..], Some(5)));
        assert_eq!(next_line(b"abc\r\ndef", 1), (&b"bc\r\n"[..], Some(5)));
        assert_eq!(next_line(b"abc\r\n", 0), (&b"abc\r\n"[..], None));
    }

    #[test]
    fn test_next_line_folding() {
        assert_eq!(
            next_line(b"abc;\r\n\tcba\r\ndef", 1),
            (&b"bc;\r\n\tcba\r\n"[..], Some(12))
        );
        // folded line running to the end of the buffer
        assert_eq!(next_line(b"a\r\n\tb\r\n", 0), (&b"a\r\n\tb\r\n"[..], None));
        assert_eq!(next_line(b"a\r\n\tb", 0), (&b"a\r\n\tb"[..], None));
    }

    #[test]
    fn test_parse_header_empty() {
        assert_eq!(parse_header(b"", 0).unwrap(), (HeaderTable::new(), None));
    }

    #[test]
    fn test_parse_header_requires_blank_line() {
        let err = parse_header(b"CH: CV\r\n", 0).unwrap_err();
        assert!(matches!(err, MhtmlError::MalformedHeader { offset: 0, .. }));
    }

    #[test]
    fn test_parse_header_fields() {
        assert_eq!(
            parse_header(b"CH: CV\r\n\r\n", 0).unwrap(),
            (HeaderTable::from_iter([("CH", "CV")]), None)
        );
        assert_eq!(
            parse_header(b"CH: CV\r\nCH2: CV2\r\nCH3: CV3\r\n\r\n", 0).unwrap(),
            (
                HeaderTable::from_iter([("CH", "CV"), ("CH2", "CV2"), ("CH3", "CV3")]),
                None
            )
        );
        assert_eq!(
            parse_header(b"CH: CV\r\n\r\n\r\n-----boundary---", 0).unwrap(),
            (HeaderTable::from_iter([("CH", "CV")]), Some(10))
        );
    }

    #[test]
    fn test_parse_header_separator_rules() {
        assert_eq!(
            parse_header(b"CH:     CV\r\n\r\n", 0).unwrap().0,
            HeaderTable::from_iter([("CH", "    CV")])
        );
        assert_eq!(parse_header(b"CH:CV\r\n\r\n", 0).unwrap().0, HeaderTable::new());
    }

    #[test]
    fn test_parse_header_folded_values() {
        assert_eq!(
            parse_header(b"CH: CV;\r\n\tCV2\r\n\r\n", 0).unwrap(),
            (HeaderTable::from_iter([("CH", "CV;\r\n\tCV2")]), None)
        );
        assert_eq!(
            parse_header(b"CH: CV;\r\n\tCV2\r\nCH2: CV3\r\n\r\n", 0).unwrap(),
            (
                HeaderTable::from_iter([("CH", "CV;\r\n\tCV2"), ("CH2", "CV3")]),
                None
            )
        );
    }

    #[test]
    fn test_parse_header_latin1_fallback() {
        let (header, _) = parse_header(b"Title: Caf\xe9\r\n\r\n", 0).unwrap();
        assert_eq!(header.get("title"), Some("Café"));
    }

    #[test]
    fn test_get_content_type() {
        let mut headers = HeaderTable::new();
        assert_eq!(get_content_type(&headers), None);
        headers.set("Content-Type", "text/html");
        assert_eq!(get_content_type(&headers), Some("text/html"));

        let headers = HeaderTable::from_iter([("conTent-TyPe", "multipart/related;\r\n\t...")]);
        assert_eq!(get_content_type(&headers), Some("multipart/related"));
    }

    #[test]
    fn test_get_boundary() {
        assert_eq!(get_boundary(&HeaderTable::new()), None);
        assert_eq!(
            get_boundary(&HeaderTable::from_iter([("conTent-TyPe", "text/html")])),
            None
        );
        assert_eq!(
            get_boundary(&HeaderTable::from_iter([(
                "Content-Type",
                "text/html;\r\n\tabc\r\n\tboundary=\"---test-boundary---\""
            )])),
            None
        );
        assert_eq!(
            get_boundary(&HeaderTable::from_iter([(
                "Content-Type",
                "multipart/related;\r\n\tabc\r\n\tnothing-here"
            )])),
            None
        );
        assert_eq!(
            get_boundary(&HeaderTable::from_iter([(
                "Content-Type",
                "multipart/related;\r\n\tabc\r\n\tboundary=\"---test-boundary---\""
            )])),
            Some("---test-boundary---".to_string())
        );
        assert_eq!(
            get_boundary(&HeaderTable::from_iter([(
                "Content-Type",
                "multipart/related; boundary=\"X\""
            )])),
            Some("X".to_string())
        );
    }

    #[test]
    fn test_find_next_boundary_none() {
        assert_eq!(find_next_boundary(b"", BND, 0), (None, None));
    }

    #[test]
    fn test_find_next_boundary_at_start() {
        let buf = b"-----boundary---\r\n";
        assert_eq!(find_next_boundary(buf, BND, 0), (Some(0), Some(18)));
    }

    #[test]
    fn test_find_next_boundary_needs_linebreak() {
        let buf = b"\r\n-----boundary---\r\n";
        assert_eq!(find_next_boundary(buf, BND, 0), (Some(2), Some(20)));

        // inside a line: skipped, the real marker further down is used
        let buf = b"\r\nx-----boundary---\r\nbody\r\n-----boundary---\r\n";
        assert_eq!(find_next_boundary(buf, BND, 0), (Some(27), Some(45)));
    }

    #[test]
    fn test_find_next_boundary_closing() {
        let buf = b"\r\n-----boundary-----\r\n";
        assert_eq!(find_next_boundary(buf, BND, 0), (Some(2), None));
    }

    #[test]
    fn test_find_next_boundary_closing_not_at_end() {
        // trailing bytes after the closing marker: both positions are the marker start
        let buf = b"\r\n-----boundary-----\r\ntrailing";
        assert_eq!(find_next_boundary(buf, BND, 0), (Some(2), Some(2)));
    }
}
