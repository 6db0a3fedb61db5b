//! Output filenames for extracted resources.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::model::header::HeaderTable;

/// Longest filename component produced by [`make_filename`].
const MAX_NAME_LEN: usize = 150;

/// How [`make_filename`] derives a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameOptions {
    /// Used when the resource has no usable location.
    pub default: String,
    /// Append an extension to names without one.
    pub guess_extension: bool,
    /// Take the guessed extension from `default` instead of the content type.
    pub ext_from_default: bool,
}

impl Default for FilenameOptions {
    fn default() -> Self {
        Self {
            default: "index.html".to_string(),
            guess_extension: true,
            ext_from_default: false,
        }
    }
}

impl FilenameOptions {
    pub fn with_default(default: &str) -> Self {
        Self {
            default: default.to_string(),
            ..Self::default()
        }
    }
}

/// Build an output filename from a resource's location header.
///
/// The location is reduced to its last path segment, without query,
/// fragment or anything after a `=`. The result is joined onto `folder`
/// when given.
pub fn make_filename(
    headers: Option<&HeaderTable>,
    folder: Option<&Path>,
    options: &FilenameOptions,
) -> PathBuf {
    let name = headers
        .and_then(|h| h.location())
        .map(short_name)
        .filter(|n| !n.trim_matches('.').is_empty());

    let name = match name {
        None => options.default.clone(),
        Some(name) => {
            let mut name = sanitize_filename_part(name, MAX_NAME_LEN);
            if options.guess_extension && !name.contains('.') {
                let ext = guess_extension(headers, options);
                name = format!("{name}.{ext}");
            }
            name
        }
    };

    match folder {
        Some(folder) => folder.join(name),
        None => PathBuf::from(name),
    }
}

fn short_name(location: &str) -> &str {
    let name = location.split('?').next().unwrap_or(location);
    let name = name.split('#').next().unwrap_or(name);
    let name = name.rsplit('/').next().unwrap_or(name);
    name.split('=').next().unwrap_or(name)
}

fn guess_extension(headers: Option<&HeaderTable>, options: &FilenameOptions) -> String {
    let from_type = if options.ext_from_default {
        None
    } else {
        headers
            .and_then(|h| h.content_type())
            .filter(|ct| !ct.is_empty())
    };

    match from_type {
        Some(ctype) => {
            let subtype = ctype.rsplit('/').next().unwrap_or(ctype).trim();
            sanitize_filename_part(subtype, 20)
        }
        None => match options.default.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_string(),
            _ => "bin".to_string(),
        },
    }
}

/// Pick a path that does not exist yet.
///
/// An existing `name.ext` becomes `name.<dup_prefix>1.ext`,
/// `name.<dup_prefix>2.ext` and so on.
pub fn make_uniq_filename(path: &Path, dup_prefix: &str) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (base, ext) = match file_name.rfind('.') {
        Some(pos) => file_name.split_at(pos),
        None => (file_name.as_str(), ""),
    };
    let parent = path.parent().unwrap_or(Path::new(""));

    let mut n = 1u32;
    loop {
        let candidate = parent.join(format!("{base}.{dup_prefix}{n}{ext}"));
        if !candidate.exists() {
            debug!(path = %candidate.display(), "Output name taken, renamed");
            return candidate;
        }
        n += 1;
    }
}

/// Replace characters that are unsafe in filenames and cap the length.
pub fn sanitize_filename_part(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}
