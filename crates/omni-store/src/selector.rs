//! Backend inference from paths and URIs.
//!
//! Nothing in this module touches the filesystem, the network or the process
//! environment.

use omni_types::BackendKind;
use url::Url;

use crate::error::{StoreError, StoreResult};

const SCHEME_SEPARATOR: &str = "://";

/// Infer the backend a path or URI refers to.
///
/// Strings with a `scheme://` prefix select the remote backend registered
/// for that scheme, or [`BackendKind::Unsupported`] if there is none. Any
/// other string, absolute or relative, is a filesystem path.
pub fn storage_type(path: &str) -> BackendKind {
    match path.split_once(SCHEME_SEPARATOR) {
        Some((scheme, _)) => BackendKind::from_scheme(scheme),
        None => BackendKind::Filesystem,
    }
}

/// An object-store URI split into its parts: `scheme://bucket/key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLocation {
    pub kind: BackendKind,
    pub bucket: String,
    /// Key within the bucket, without a leading `/`. Empty for the bucket root.
    pub key: String,
}

impl ObjectLocation {
    /// Parse `uri` if it names a supported object-store backend.
    ///
    /// Returns `Ok(None)` for plain paths and `Err` for URIs with an
    /// unsupported scheme or no bucket.
    pub fn parse(uri: &str) -> StoreResult<Option<Self>> {
        let Some((scheme, rest)) = uri.split_once(SCHEME_SEPARATOR) else {
            return Ok(None);
        };
        let kind = BackendKind::from_scheme(scheme);
        if !kind.is_remote() {
            return Err(StoreError::InvalidPath {
                path: uri.to_string(),
                reason: format!("unsupported scheme {scheme:?}"),
            });
        }
        let url = Url::parse(uri).map_err(|e| StoreError::InvalidPath {
            path: uri.to_string(),
            reason: e.to_string(),
        })?;
        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| StoreError::InvalidPath {
                path: uri.to_string(),
                reason: "missing bucket".to_string(),
            })?;

        // The key is taken from the raw string so it keeps its exact spelling;
        // `Url` would percent-encode it.
        let key = rest
            .split_once('/')
            .map(|(_, key)| key.trim_start_matches('/'))
            .unwrap_or_default();

        Ok(Some(Self {
            kind,
            bucket: bucket.to_string(),
            key: key.to_string(),
        }))
    }
}

/// The bucket named by the authority of an object-store URI, if any.
pub fn bucket_from_uri(uri: &str) -> Option<String> {
    ObjectLocation::parse(uri).ok().flatten().map(|loc| loc.bucket)
}
