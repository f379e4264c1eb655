use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// The storage backend a store is bound to, or a path refers to.
///
/// A `BackendKind` is both the dispatch key of the store factory and the
/// result of inferring a backend from a path or URI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// No known backend. The factory rejects this tag.
    #[default]
    Unsupported,
    /// The local hierarchical filesystem.
    Filesystem,
    /// Amazon S3 and S3-compatible object stores (`s3://`, `s3a://`).
    S3,
    /// Google Cloud Storage (`gs://`, `gcs://`).
    Gcs,
}

impl BackendKind {
    /// All backends the factory can construct.
    pub const SUPPORTED: [BackendKind; 3] = [Self::Filesystem, Self::S3, Self::Gcs];

    /// Map a URI scheme to the remote backend registered for it.
    ///
    /// Matching is case-insensitive. Unknown schemes map to
    /// [`BackendKind::Unsupported`].
    pub fn from_scheme(scheme: &str) -> Self {
        if scheme.eq_ignore_ascii_case("s3") || scheme.eq_ignore_ascii_case("s3a") {
            Self::S3
        } else if scheme.eq_ignore_ascii_case("gs") || scheme.eq_ignore_ascii_case("gcs") {
            Self::Gcs
        } else {
            Self::Unsupported
        }
    }

    /// The canonical URI scheme of a remote backend.
    pub fn scheme(&self) -> Option<&'static str> {
        match self {
            Self::S3 => Some("s3"),
            Self::Gcs => Some("gs"),
            Self::Filesystem | Self::Unsupported => None,
        }
    }

    /// Returns `true` for object-store backends.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::S3 | Self::Gcs)
    }

    /// Short label used on the command line and in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::Filesystem => "fs",
            Self::S3 => "s3",
            Self::Gcs => "gs",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BackendKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fs" | "filesystem" | "local" => Ok(Self::Filesystem),
            "s3" => Ok(Self::S3),
            "gs" | "gcs" => Ok(Self::Gcs),
            "unsupported" => Ok(Self::Unsupported),
            _ => Err(TypeError::UnknownBackend(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schemes_are_case_insensitive() {
        assert_eq!(BackendKind::from_scheme("s3"), BackendKind::S3);
        assert_eq!(BackendKind::from_scheme("S3A"), BackendKind::S3);
        assert_eq!(BackendKind::from_scheme("GS"), BackendKind::Gcs);
        assert_eq!(BackendKind::from_scheme("gcs"), BackendKind::Gcs);
    }

    #[test]
    fn unknown_schemes_are_unsupported() {
        for scheme in ["https", "http", "gopher", "file", ""] {
            assert_eq!(BackendKind::from_scheme(scheme), BackendKind::Unsupported);
        }
    }

    #[test]
    fn label_roundtrips_through_from_str() {
        for kind in BackendKind::SUPPORTED {
            assert_eq!(kind.label().parse::<BackendKind>().unwrap(), kind);
        }
    }

    #[test]
    fn parse_aliases() {
        assert_eq!("filesystem".parse::<BackendKind>().unwrap(), BackendKind::Filesystem);
        assert_eq!("GCS".parse::<BackendKind>().unwrap(), BackendKind::Gcs);
        assert_eq!(
            "azure".parse::<BackendKind>(),
            Err(TypeError::UnknownBackend("azure".into()))
        );
    }

    #[test]
    fn only_object_stores_are_remote() {
        assert!(BackendKind::S3.is_remote());
        assert!(BackendKind::Gcs.is_remote());
        assert!(!BackendKind::Filesystem.is_remote());
        assert!(!BackendKind::Unsupported.is_remote());
        assert_eq!(BackendKind::Filesystem.scheme(), None);
        assert_eq!(BackendKind::Gcs.scheme(), Some("gs"));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&BackendKind::Gcs).unwrap();
        assert_eq!(json, "\"gcs\"");
        let back: BackendKind = serde_json::from_str("\"filesystem\"").unwrap();
        assert_eq!(back, BackendKind::Filesystem);
    }
}
