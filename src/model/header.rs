//! Ordered, case-insensitive MIME header table.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

/// Ordered multimap of header fields.
///
/// Names are compared case-insensitively for lookup, membership and
/// deletion, but are stored exactly as given. Duplicate names are legal:
/// [`get`](Self::get) returns the first match while
/// [`as_map`](Self::as_map) keeps the last value per exact name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderTable {
    fields: Vec<(String, String)>,
}

impl HeaderTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Existing fields with the same name are kept.
    ///
    /// An empty name is ignored with a warning.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if name.is_empty() {
            warn!(value = %value, "Empty header name, field ignored");
            return;
        }
        self.fields.push((name, value));
    }

    /// First value whose name matches `name` case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get), falling back to `default`.
    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    /// All values for `name`, in insertion order. Empty if none match.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Remove every field matching `name`. Returns how many were removed.
    pub fn delete(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        before - self.fields.len()
    }

    /// Whether a field named `name` exists. The empty name never does.
    pub fn contains(&self, name: &str) -> bool {
        !name.is_empty() && self.fields.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Owned snapshot of all pairs.
    pub fn as_list(&self) -> Vec<(String, String)> {
        self.fields.clone()
    }

    /// Snapshot keyed by exact name; later duplicates overwrite earlier ones.
    pub fn as_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.clone());
        }
        map
    }

    /// MIME type from `Content-Type`, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        crate::parser::tokenizer::get_content_type(self)
    }

    /// Raw `Content-Transfer-Encoding` value.
    pub fn encoding(&self) -> Option<&str> {
        self.get("Content-Transfer-Encoding")
    }

    /// `Snapshot-Content-Location` when set and non-empty, else `Content-Location`.
    pub fn location(&self) -> Option<&str> {
        match self.get("Snapshot-Content-Location") {
            Some(loc) if !loc.is_empty() => Some(loc),
            _ => self.get("Content-Location"),
        }
    }

    /// Serialize as `Name: Value\r\n` lines (no terminating blank line).
    ///
    /// Values are written verbatim so folded values survive a round-trip.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for (name, value) in &self.fields {
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (name, value) in iter {
            table.set(name, value);
        }
        table
    }
}

impl fmt::Display for HeaderTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HeaderTable {
        HeaderTable::from_iter([("a", "b"), ("A", "c"), ("D", "e")])
    }

    #[test]
    fn test_set_appends() {
        let mut rh = HeaderTable::new();
        rh.set("C", "BbBb");
        rh.set("AAaA", "BbBb");
        rh.set("AAaA", "BbBb");
        rh.set("aaaa", "bbbb");
        assert_eq!(rh.len(), 4);
        assert_eq!(
            rh.as_list(),
            vec![
                ("C".to_string(), "BbBb".to_string()),
                ("AAaA".to_string(), "BbBb".to_string()),
                ("AAaA".to_string(), "BbBb".to_string()),
                ("aaaa".to_string(), "bbbb".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_name_ignored() {
        let mut rh = HeaderTable::new();
        rh.set("", "h");
        assert!(rh.is_empty());
        assert!(!rh.contains(""));
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let rh = HeaderTable::from_iter([("Content-Type", "text/html")]);
        assert_eq!(rh.get("Content-Type"), Some("text/html"));
        assert_eq!(rh.get("content-type"), Some("text/html"));
        assert_eq!(rh.get("CONTENT-TYPE"), Some("text/html"));
        assert!(rh.contains("cOnTeNt-TyPe"));
        assert!(!rh.contains("xxxxx"));
    }

    #[test]
    fn test_get_first_and_get_all() {
        let mut rh = HeaderTable::new();
        rh.set("a", "b");
        assert_eq!(rh.get_or("c", "x"), "x");
        assert_eq!(rh.get_all("a"), vec!["b"]);
        assert!(rh.get_all("c").is_empty());

        rh.set("A", "F");
        assert_eq!(rh.get_all("a"), vec!["b", "F"]);
        assert_eq!(rh.get("a"), Some("b"));
    }

    #[test]
    fn test_as_map_last_write_wins() {
        let mut rh = sample();
        rh.set("D", "z");
        let map = rh.as_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map["a"], "b");
        assert_eq!(map["A"], "c");
        assert_eq!(map["D"], "z");
        // get still sees the first duplicate
        assert_eq!(rh.get("d"), Some("e"));
    }

    #[test]
    fn test_as_list_is_a_snapshot() {
        let rh = sample();
        let mut list = rh.as_list();
        list.push(("t".into(), "t".into()));
        assert_ne!(rh.as_list(), list);
    }

    #[test]
    fn test_delete_removes_all_matches() {
        let mut rh = sample();
        assert_eq!(rh.delete("a"), 2);
        assert_eq!(rh.as_list(), vec![("D".to_string(), "e".to_string())]);
        assert_eq!(rh.delete("missing"), 0);
        assert_eq!(rh.len(), 1);
    }

    #[test]
    fn test_names_in_order() {
        assert_eq!(sample().names().collect::<Vec<_>>(), vec!["a", "A", "D"]);
    }

    #[test]
    fn test_equality_is_exact() {
        let rh1 = HeaderTable::from_iter([("a", "b")]);
        let rh2 = HeaderTable::from_iter([("A", "b")]);
        let rh3 = HeaderTable::from_iter([("A", "b")]);
        assert_ne!(rh1, rh2);
        assert_eq!(rh2, rh3);
    }

    #[test]
    fn test_location_prefers_snapshot() {
        let mut rh = HeaderTable::new();
        assert_eq!(rh.location(), None);
        rh.set("Content-Location", "http://a/b");
        assert_eq!(rh.location(), Some("http://a/b"));
        rh.set("Snapshot-Content-Location", "");
        assert_eq!(rh.location(), Some("http://a/b"));
        rh.delete("Snapshot-Content-Location");
        rh.set("Snapshot-Content-Location", "http://main/");
        assert_eq!(rh.location(), Some("http://main/"));
    }

    #[test]
    fn test_write_to_keeps_folding() {
        let rh = HeaderTable::from_iter([("CH", "CV;\r\n\tCV2"), ("X", "y")]);
        let mut out = Vec::new();
        rh.write_to(&mut out);
        assert_eq!(out, b"CH: CV;\r\n\tCV2\r\nX: y\r\n");
    }
}
