use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backend-agnostic metadata for a file or object.
///
/// Descriptors are produced by `stat` and `read_dir` calls and adapted
/// field-by-field from each backend's native metadata. They are plain values:
/// nothing about them is persisted or kept in sync with the backend.
///
/// Object stores have no directories, so `is_dir` is always `false` for
/// descriptors that come from an object store and `mode` is `0`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Last path or key segment.
    pub name: String,
    /// Length in bytes, `0` if the backend did not report one.
    pub size: u64,
    /// Last modification time, if the backend reported one.
    pub modified: Option<DateTime<Utc>>,
    /// Whether this entry is a directory.
    pub is_dir: bool,
    /// Permission bits (`0` when the backend has none).
    pub mode: u32,
}

impl ObjectDescriptor {
    /// Descriptor for a regular file or object of `size` bytes.
    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            modified: None,
            is_dir: false,
            mode: 0,
        }
    }

    /// Descriptor for a directory.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            modified: None,
            is_dir: true,
            mode: 0,
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Returns `true` if the name ends with `ext` (e.g. `".md"`).
    pub fn has_extension(&self, ext: &str) -> bool {
        !self.is_dir && self.name.ends_with(ext)
    }
}

/// The last `/`-separated segment of a path or key, ignoring trailing slashes.
pub fn base_name(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    #[test]
    fn file_defaults() {
        let d = ObjectDescriptor::file("hello.txt", 15);
        assert_eq!(d.name, "hello.txt");
        assert_eq!(d.size, 15);
        assert!(d.modified.is_none());
        assert!(!d.is_dir);
        assert_eq!(d.mode, 0);
    }

    #[test]
    fn builder_sets_time_and_mode() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let d = ObjectDescriptor::file("a", 1).with_modified(ts).with_mode(0o644);
        assert_eq!(d.modified, Some(ts));
        assert_eq!(d.mode, 0o644);
    }

    #[test]
    fn directories_never_match_extensions() {
        assert!(ObjectDescriptor::file("README.md", 10).has_extension(".md"));
        assert!(!ObjectDescriptor::directory("notes.md").has_extension(".md"));
    }

    #[test]
    fn base_name_of_keys_and_paths() {
        assert_eq!(base_name("testdata/helloworld.txt"), "helloworld.txt");
        assert_eq!(base_name("/abs/path/dir/"), "dir");
        assert_eq!(base_name("plain"), "plain");
        assert_eq!(base_name(""), "");
    }

    proptest! {
        #[test]
        fn base_name_has_no_separator(path in "[a-z/._-]{0,32}") {
            prop_assert!(!base_name(&path).contains('/'));
        }
    }
}
