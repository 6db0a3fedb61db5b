//! Shell-style glob filter over resource content types.

use regex::Regex;

use crate::model::resource::ResourceView;

/// Matches content types against a glob such as `image/*` or `text/[!c]*`.
///
/// Supports `*`, `?` and bracket classes (`[abc]`, `[!abc]`). Matching is
/// anchored and case-sensitive.
#[derive(Debug, Clone)]
pub struct ContentTypeFilter {
    pattern: String,
    regex: Regex,
}

impl ContentTypeFilter {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&glob_to_regex(pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// A missing content type is matched as the empty string.
    pub fn matches(&self, content_type: Option<&str>) -> bool {
        self.regex.is_match(content_type.unwrap_or_default())
    }

    pub fn matches_resource(&self, resource: &ResourceView<'_>) -> bool {
        self.matches(resource.content_type())
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match bracket_class(&chars, i) {
                Some((class, close)) => {
                    out.push_str(&class);
                    i = close;
                }
                None => out.push_str("\\["),
            },
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
        i += 1;
    }

    out.push('$');
    out
}

/// Translate the bracket expression opening at `open`. Returns the regex
/// class and the index of the closing `]`, or `None` if it never closes.
fn bracket_class(chars: &[char], open: usize) -> Option<(String, usize)> {
    let mut j = open + 1;
    let mut class = String::from("[");
    if chars.get(j) == Some(&'!') {
        class.push('^');
        j += 1;
    }
    // a leading `]` is part of the set
    if chars.get(j) == Some(&']') {
        class.push_str("\\]");
        j += 1;
    }
    while let Some(&c) = chars.get(j) {
        match c {
            ']' => {
                class.push(']');
                return Some((class, j));
            }
            '\\' | '[' | '^' | '&' | '~' => {
                class.push('\\');
                class.push(c);
            }
            _ => class.push(c),
        }
        j += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_matches_everything() {
        let f = ContentTypeFilter::new("*").unwrap();
        assert!(f.matches(Some("text/html")));
        assert!(f.matches(Some("")));
        assert!(f.matches(None));
    }

    #[test]
    fn test_prefix_glob() {
        let f = ContentTypeFilter::new("image/*").unwrap();
        assert!(f.matches(Some("image/png")));
        assert!(f.matches(Some("image/svg+xml")));
        assert!(!f.matches(Some("text/html")));
        assert!(!f.matches(None));
    }

    #[test]
    fn test_question_mark_and_literals() {
        let f = ContentTypeFilter::new("text/?tml").unwrap();
        assert!(f.matches(Some("text/html")));
        assert!(!f.matches(Some("text/xhtml")));
        // `+` and `.` are literal
        let f = ContentTypeFilter::new("image/svg+xml").unwrap();
        assert!(f.matches(Some("image/svg+xml")));
        assert!(!f.matches(Some("image/svggxml")));
    }

    #[test]
    fn test_bracket_classes() {
        let f = ContentTypeFilter::new("text/[!c]*").unwrap();
        assert!(f.matches(Some("text/html")));
        assert!(!f.matches(Some("text/css")));

        let f = ContentTypeFilter::new("text/[ch]*").unwrap();
        assert!(f.matches(Some("text/css")));
        assert!(f.matches(Some("text/html")));
        assert!(!f.matches(Some("text/javascript")));
    }

    #[test]
    fn test_unclosed_bracket_is_literal() {
        let f = ContentTypeFilter::new("a[b").unwrap();
        assert!(f.matches(Some("a[b")));
        assert!(!f.matches(Some("ab")));
    }

    #[test]
    fn test_case_sensitive() {
        let f = ContentTypeFilter::new("text/*").unwrap();
        assert!(!f.matches(Some("TEXT/HTML")));
        assert_eq!(f.pattern(), "text/*");
    }
}
