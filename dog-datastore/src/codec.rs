use crate::Key;

/// Maps logical keys to backing object identifiers under a root path, and back.
///
/// The root path is resolved like a relative path: separators collapse, `.`
/// segments vanish and `..` pops the previous segment. Key segments are appended
/// to it verbatim, so every key stays under the root. An empty result becomes `.`.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    root: String,
}

impl KeyCodec {
    pub fn new<S: AsRef<str>>(root_path: S) -> Self {
        Self {
            root: resolve_root(root_path.as_ref()),
        }
    }

    /// Normalized root path; empty when the store lives at the container root
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Backing identifier for a logical key
    pub fn full_key(&self, key: &Key) -> String {
        self.join(key.as_str())
    }

    /// Backing prefix for a raw query prefix, which need not be a clean key
    pub fn list_prefix(&self, prefix: &str) -> String {
        let joined = self.join(prefix);
        if joined == "." {
            String::new()
        } else {
            joined
        }
    }

    /// Whether a backing identifier belongs to this root
    pub fn contains(&self, backing_id: &str) -> bool {
        if self.root.is_empty() {
            return true;
        }
        match backing_id.strip_prefix(self.root.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Logical key for a backing identifier produced by [`KeyCodec::full_key`]
    pub fn to_logical_key(&self, backing_id: &str) -> Key {
        if backing_id == "." {
            return Key::root();
        }
        let relative = backing_id
            .strip_prefix(self.root.as_str())
            .unwrap_or(backing_id);
        Key::new(relative)
    }

    fn join(&self, path: &str) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if !self.root.is_empty() {
            parts.push(&self.root);
        }
        parts.extend(path.split('/').filter(|segment| !segment.is_empty()));
        if parts.is_empty() {
            ".".to_string()
        } else {
            parts.join("/")
        }
    }
}

fn resolve_root(root_path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in root_path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().map_or(true, |last| *last == "..") {
                    segments.push("..");
                } else {
                    segments.pop();
                }
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_full_key_includes_root() {
        let codec = KeyCodec::new(".ipfs/datastore");
        assert_eq!(codec.full_key(&Key::new("/z/key")), ".ipfs/datastore/z/key");
        assert_eq!(codec.full_key(&Key::root()), ".ipfs/datastore");
    }

    #[test]
    fn test_root_only_key_is_dot() {
        let codec = KeyCodec::new("");
        assert_eq!(codec.full_key(&Key::root()), ".");
        assert_eq!(codec.to_logical_key("."), Key::root());
        assert_eq!(KeyCodec::new("./").full_key(&Key::root()), ".");
    }

    #[test]
    fn test_leading_dot_and_separators() {
        let codec = KeyCodec::new("./data//store/");
        assert_eq!(codec.root(), "data/store");
        assert_eq!(codec.full_key(&Key::new("/a")), "data/store/a");
        assert_eq!(KeyCodec::new("data\\store").root(), "data/store");
    }

    #[test]
    fn test_dot_dot_keys_stay_under_root() {
        let codec = KeyCodec::new(".ipfs/datastore");
        assert_eq!(codec.full_key(&Key::new("/a/..")), ".ipfs/datastore/a/..");
        assert_ne!(codec.full_key(&Key::new("/a/..")), codec.full_key(&Key::root()));
        assert_ne!(codec.full_key(&Key::new("/a/../b")), codec.full_key(&Key::new("/b")));

        let outside = codec.full_key(&Key::new("/../../outside"));
        assert_eq!(outside, ".ipfs/datastore/../../outside");
        assert!(codec.contains(&outside));
        assert_eq!(codec.to_logical_key(&outside), Key::new("/../../outside"));
    }

    #[test]
    fn test_backslash_is_part_of_a_key_segment() {
        let codec = KeyCodec::new("root");
        assert_eq!(codec.full_key(&Key::new("/a\\b")), "root/a\\b");
        assert_ne!(codec.full_key(&Key::new("/a\\b")), codec.full_key(&Key::new("/a/b")));
    }

    #[test]
    fn test_list_prefix() {
        let codec = KeyCodec::new(".ipfs/datastore");
        assert_eq!(codec.list_prefix("/blocks"), ".ipfs/datastore/blocks");
        assert_eq!(codec.list_prefix(""), ".ipfs/datastore");
        assert_eq!(KeyCodec::new("").list_prefix(""), "");
    }

    #[test]
    fn test_contains_rejects_sibling_roots() {
        let codec = KeyCodec::new(".ipfs/datastore");
        assert!(codec.contains(".ipfs/datastore"));
        assert!(codec.contains(".ipfs/datastore/a"));
        assert!(!codec.contains(".ipfs/datastore2/a"));
        assert!(!codec.contains("other/a"));
    }

    #[test]
    fn test_to_logical_key() {
        let codec = KeyCodec::new(".ipfs/datastore");
        assert_eq!(codec.to_logical_key(".ipfs/datastore/z/key"), Key::new("/z/key"));
        assert_eq!(codec.to_logical_key(".ipfs/datastore"), Key::root());
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            root in "[a-z.]{0,3}(/[a-z]{1,4}){0,2}",
            segments in prop::collection::vec("[A-Za-z0-9_.-]{1,8}", 0..5),
        ) {
            let codec = KeyCodec::new(&root);
            let key = Key::new(segments.join("/"));
            let backing = codec.full_key(&key);
            prop_assert!(codec.contains(&backing));
            prop_assert_eq!(codec.to_logical_key(&backing), key);
        }

        #[test]
        fn prop_distinct_keys_do_not_collide(
            a in prop::collection::vec("[a-z0-9.]{1,6}", 0..4),
            b in prop::collection::vec("[a-z0-9.]{1,6}", 0..4),
        ) {
            let codec = KeyCodec::new(".ipfs/datastore");
            let (ka, kb) = (Key::new(a.join("/")), Key::new(b.join("/")));
            prop_assume!(ka != kb);
            prop_assert_ne!(codec.full_key(&ka), codec.full_key(&kb));
        }
    }
}
