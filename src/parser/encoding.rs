//! Content-Transfer-Encoding handling for resource bodies.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::{MhtmlError, Result};

/// Base64 engine tolerant of missing padding and trailing bits, as found in
/// archives written by browsers.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Transfer encodings understood by [`decode`](ContentEncoding::decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Binary,
    SevenBit,
    EightBit,
    Base64,
    QuotedPrintable,
    Unknown,
}

impl ContentEncoding {
    /// Parse a `Content-Transfer-Encoding` value (case-insensitive, trimmed).
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "binary" => Self::Binary,
            "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Unknown => "unknown",
        }
    }

    /// Decode `raw` into the original bytes.
    ///
    /// Identity encodings borrow the input.
    pub fn decode<'a>(&self, raw: &'a [u8]) -> Result<Cow<'a, [u8]>> {
        match self {
            Self::Binary | Self::SevenBit | Self::EightBit => Ok(Cow::Borrowed(raw)),
            Self::Base64 => decode_base64(raw).map(Cow::Owned),
            Self::QuotedPrintable => Ok(Cow::Owned(decode_quoted_printable(raw))),
            Self::Unknown => Err(MhtmlError::UnsupportedEncoding(self.as_str().into())),
        }
    }
}

/// Decode a base64 body, ignoring line breaks and other ASCII whitespace.
pub fn decode_base64(raw: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64
        .decode(compact)
        .map_err(|e| MhtmlError::Decode {
            encoding: "base64".into(),
            reason: e.to_string(),
        })
}

/// Decode a quoted-printable body (RFC 2045 §6.7).
///
/// Soft line breaks (`=\r\n` or `=\n`) are removed. An `=` not followed by
/// two hex digits is kept literally.
pub fn decode_quoted_printable(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != b'=' {
            out.push(raw[i]);
            i += 1;
            continue;
        }
        match raw.get(i + 1..) {
            Some([b'\r', b'\n', ..]) => i += 3,
            Some([b'\n', ..]) => i += 2,
            Some([hi, lo, ..]) => match (hex_value(*hi), hex_value(*lo)) {
                (Some(h), Some(l)) => {
                    out.push((h << 4) | l);
                    i += 3;
                }
                _ => {
                    out.push(b'=');
                    i += 1;
                }
            },
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
    out
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}
