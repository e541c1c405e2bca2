use std::fmt;

/// A single caller-supplied option value.
#[derive(Clone, Debug, PartialEq)]
pub enum OptionValue {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl OptionValue {
    pub fn is_blank(&self) -> bool {
        match self {
            OptionValue::Null => true,
            OptionValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            OptionValue::Int(v) => Some(*v),
            OptionValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Accepts `true`, `1`, `"true"` and `"1"`.
    pub fn is_truthy(&self) -> bool {
        match self {
            OptionValue::Bool(b) => *b,
            OptionValue::Int(v) => *v == 1,
            OptionValue::Text(s) => matches!(s.trim(), "true" | "1"),
            OptionValue::Null => false,
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Null => write!(f, "null"),
            OptionValue::Bool(b) => write!(f, "{b}"),
            OptionValue::Int(v) => write!(f, "{v}"),
            OptionValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(b: bool) -> Self {
        OptionValue::Bool(b)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<u64> for OptionValue {
    fn from(v: u64) -> Self {
        i64::try_from(v)
            .map(OptionValue::Int)
            .unwrap_or_else(|_| OptionValue::Text(v.to_string()))
    }
}

impl From<&str> for OptionValue {
    fn from(s: &str) -> Self {
        OptionValue::Text(s.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(s: String) -> Self {
        OptionValue::Text(s)
    }
}

/// Insertion-ordered option mapping.
///
/// Order matters: repository filters are applied in the order their keys were
/// supplied. Replacing an existing key keeps its original position.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    entries: Vec<(String, OptionValue)>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn without(mut self, keys: &[&str]) -> Self {
        self.entries.retain(|(k, _)| !keys.contains(&k.as_str()));
        self
    }

    /// Returns `self` overlaid with `other`.
    pub fn merge(&self, other: &QueryOptions) -> QueryOptions {
        let mut merged = self.clone();
        for (k, v) in other.iter() {
            merged.insert(k, v.clone());
        }
        merged
    }

    /// Moves `key` (if present) to the end of the application order.
    pub fn with_last(mut self, key: &str) -> Self {
        if let Some(value) = self.remove(key) {
            self.entries.push((key.to_string(), value));
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OptionValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[cfg(test)]
    fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<K: Into<String>, V: Into<OptionValue>> FromIterator<(K, V)> for QueryOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = QueryOptions::new();
        for (k, v) in iter {
            options.insert(k, v);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_in_place() {
        let mut options = QueryOptions::new().with("a", 1i64).with("b", 2i64);
        options.insert("a", 3i64);
        let keys: Vec<_> = options.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(options.get("a"), Some(&OptionValue::Int(3)));
    }

    #[test]
    fn merge_appends_new_keys_after_existing_ones() {
        let base = QueryOptions::new()
            .with("sort_column", "id")
            .with("sort_direction", "desc");
        let merged = base.merge(&QueryOptions::new().with("q", "nick").with("sort_direction", "asc"));
        let keys: Vec<_> = merged.keys().collect();
        assert_eq!(keys, vec!["sort_column", "sort_direction", "q"]);
        assert_eq!(merged.get("sort_direction"), Some(&OptionValue::from("asc")));
        assert_eq!(base.get("sort_direction"), Some(&OptionValue::from("desc")));
    }

    #[test]
    fn with_last_relocates_key() {
        let options = QueryOptions::new()
            .with("prev_cursor", 5i64)
            .with("limit", 3i64)
            .with("q", "x")
            .with_last("prev_cursor");
        let keys: Vec<_> = options.keys().collect();
        assert_eq!(keys, vec!["limit", "q", "prev_cursor"]);
    }

    #[test]
    fn truthiness_and_blankness() {
        assert!(OptionValue::from("true").is_truthy());
        assert!(OptionValue::Int(1).is_truthy());
        assert!(!OptionValue::from("yes").is_truthy());
        assert!(OptionValue::from("   ").is_blank());
        assert!(!OptionValue::Int(0).is_blank());
        assert_eq!(OptionValue::from(" 42 ").as_i64(), Some(42));
    }

    #[test]
    fn from_iter_keeps_last_duplicate() {
        let options: QueryOptions = vec![("limit", "5"), ("q", "a"), ("limit", "7")]
            .into_iter()
            .collect();
        assert_eq!(options.len(), 2);
        assert_eq!(options.get("limit").and_then(OptionValue::as_i64), Some(7));
    }
}
