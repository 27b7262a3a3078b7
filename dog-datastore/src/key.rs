use bytes::Bytes;
use std::fmt;

/// Logical datastore key: an absolute, slash-delimited path such as `/a/b/c`.
///
/// Construction cleans the input the way interface-datastore keys are cleaned:
/// a leading `/` is added when missing, repeated separators collapse to one and
/// a trailing `/` is dropped. `.` segments are dropped too; `..` is an ordinary
/// segment name and never climbs. The root key is `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    pub fn new<S: AsRef<str>>(raw: S) -> Self {
        let segments: Vec<&str> = raw
            .as_ref()
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();
        Self(format!("/{}", segments.join("/")))
    }

    /// The root key `/`
    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Append a path segment (or several, slash separated)
    pub fn child<S: AsRef<str>>(&self, name: S) -> Self {
        Self::new(format!("{}/{}", self.0, name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A key with its value, as produced by queries.
///
/// `value` is `None` for keys-only queries; an empty `Bytes` is a stored empty value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Option<Bytes>,
}

impl Entry {
    pub fn new(key: Key, value: Bytes) -> Self {
        Self {
            key,
            value: Some(value),
        }
    }

    pub fn key_only(key: Key) -> Self {
        Self { key, value: None }
    }
}
