use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::{ClientOptions, ObjectMeta, ObjectStore, PutPayload};
use omni_types::{BackendKind, ObjectDescriptor};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::options::{BackendConfig, GcsConfig, S3Config};
use crate::runtime::BlockingRuntime;
use crate::scratch::ScratchArea;
use crate::selector::ObjectLocation;
use crate::traits::{Store, WriteFilterFn};

/// Store over a flat bucket of keyed objects (S3 or GCS).
///
/// Paths are keys relative to the configured bucket. A full URI such as
/// `s3://bucket/key` is also accepted as long as it names this store's
/// scheme and bucket.
///
/// Directory operations have no object-store counterpart: `mkdir` and
/// `mkdir_all` succeed without creating anything, and descriptors never
/// report `is_dir`. `read_dir` lists the objects directly under a prefix.
pub struct ObjectStoreAdapter {
    config: BackendConfig,
    client: Arc<dyn ObjectStore>,
    runtime: BlockingRuntime,
    scratch: ScratchArea,
}

impl ObjectStoreAdapter {
    /// Build a client session for `config` and bind it to a new store.
    pub fn connect(config: BackendConfig) -> StoreResult<Self> {
        let client: Arc<dyn ObjectStore> = match &config {
            BackendConfig::S3(c) => Arc::new(build_s3(c)?),
            BackendConfig::Gcs(c) => Arc::new(build_gcs(c)?),
            BackendConfig::Filesystem(_) => return Err(StoreError::Unsupported(config.kind())),
        };
        info!(backend = %config.kind(), bucket = config.bucket().unwrap_or_default(), "object store session created");
        Self::with_client(config, client)
    }

    /// Bind an existing client to a new store.
    ///
    /// The client must already point at the bucket named in `config`.
    pub fn with_client(config: BackendConfig, client: Arc<dyn ObjectStore>) -> StoreResult<Self> {
        if !config.kind().is_remote() {
            return Err(StoreError::Unsupported(config.kind()));
        }
        let scratch = ScratchArea::new(config.scratch_dir());
        Ok(Self {
            config,
            client,
            runtime: BlockingRuntime::new()?,
            scratch,
        })
    }

    fn bucket(&self) -> &str {
        self.config.bucket().unwrap_or_default()
    }

    /// Translate a caller path into a key in this store's bucket.
    fn object_path(&self, path: &str) -> StoreResult<ObjectPath> {
        let key = match ObjectLocation::parse(path)? {
            Some(loc) if loc.kind == self.kind() && loc.bucket == self.bucket() => loc.key,
            Some(_) => {
                return Err(StoreError::InvalidPath {
                    path: path.to_string(),
                    reason: format!("outside {}://{}", self.kind().scheme().unwrap_or_default(), self.bucket()),
                })
            }
            None => path.to_string(),
        };
        ObjectPath::parse(&key).map_err(|e| StoreError::InvalidPath {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    fn backend_error(&self, path: &str, source: object_store::Error) -> StoreError {
        match source {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                path: path.to_string(),
            },
            source => StoreError::Backend {
                backend: self.kind(),
                path: path.to_string(),
                source,
            },
        }
    }

    fn put(&self, path: &str, data: Bytes) -> StoreResult<()> {
        let key = self.object_path(path)?;
        let size = data.len();
        let client = &self.client;
        self.runtime
            .block_on(async { client.put(&key, PutPayload::from(data)).await })
            .map_err(|e| self.backend_error(path, e))?;
        debug!(backend = %self.kind(), key = %key, size, "uploaded object");
        Ok(())
    }

    fn upload(&self, path: &str, reader: &mut dyn Read) -> StoreResult<()> {
        let mut data = Vec::new();
        reader
            .read_to_end(&mut data)
            .map_err(|e| StoreError::io(path, e))?;
        self.put(path, Bytes::from(data))
    }

    /// Delete every key strictly beneath `prefix`, one listing page at a
    /// time. Each page is fetched only after the previous one is deleted.
    ///
    /// A page made up only of keys that were deleted in the previous round
    /// means the deletes did not take effect, and the loop stops with
    /// [`StoreError::Undeletable`].
    fn delete_prefixed(&self, path: &str, prefix: &ObjectPath) -> StoreResult<usize> {
        let page_size = self.config.list_page_size();
        let client = &self.client;
        let mut deleted = 0;
        let mut previous: HashSet<ObjectPath> = HashSet::new();
        loop {
            let page: Vec<ObjectMeta> = self
                .runtime
                .block_on(async {
                    client
                        .list(Some(prefix))
                        .take(page_size)
                        .try_collect::<Vec<_>>()
                        .await
                })
                .map_err(|e| self.backend_error(path, e))?;
            if page.is_empty() {
                return Ok(deleted);
            }
            if page.iter().all(|meta| previous.contains(&meta.location)) {
                return Err(StoreError::Undeletable {
                    path: page[0].location.to_string(),
                });
            }
            previous.clear();
            for meta in page {
                let location = meta.location;
                self.runtime
                    .block_on(async { client.delete(&location).await })
                    .map_err(|e| self.backend_error(location.as_ref(), e))?;
                deleted += 1;
                previous.insert(location);
            }
            debug!(backend = %self.kind(), prefix = %prefix, deleted, "deleted listing page");
        }
    }
}

fn client_options(timeout: Option<std::time::Duration>) -> ClientOptions {
    let options = ClientOptions::new();
    match timeout {
        Some(timeout) => options.with_timeout(timeout),
        None => options,
    }
}

fn build_s3(c: &S3Config) -> StoreResult<object_store::aws::AmazonS3> {
    let mut builder = if c.use_ambient_config {
        AmazonS3Builder::from_env()
    } else {
        AmazonS3Builder::new()
    };
    // Client options replace any earlier allow_http setting; apply them first.
    builder = builder
        .with_client_options(client_options(c.request_timeout))
        .with_bucket_name(&c.bucket)
        .with_allow_http(c.allow_http);
    if let Some(region) = &c.region {
        builder = builder.with_region(region);
    }
    if let Some(endpoint) = &c.endpoint {
        builder = builder
            .with_endpoint(endpoint)
            .with_virtual_hosted_style_request(false);
    }
    if let Some(key_id) = &c.access_key_id {
        builder = builder.with_access_key_id(key_id);
    }
    if let Some(secret) = &c.secret_access_key {
        builder = builder.with_secret_access_key(secret);
    }
    if let Some(token) = &c.session_token {
        builder = builder.with_token(token);
    }
    builder.build().map_err(|source| StoreError::Session {
        backend: BackendKind::S3,
        source,
    })
}

fn build_gcs(c: &GcsConfig) -> StoreResult<object_store::gcp::GoogleCloudStorage> {
    let mut builder = if c.use_ambient_config {
        GoogleCloudStorageBuilder::from_env()
    } else {
        GoogleCloudStorageBuilder::new()
    };
    builder = builder
        .with_client_options(client_options(c.request_timeout))
        .with_bucket_name(&c.bucket);
    if let Some(path) = &c.credentials_file {
        builder = builder.with_service_account_path(path.to_string_lossy());
    }
    builder.build().map_err(|source| StoreError::Session {
        backend: BackendKind::Gcs,
        source,
    })
}

/// Adapt object metadata. Objects are never directories and carry no
/// permission bits.
fn descriptor_from_meta(meta: &ObjectMeta) -> ObjectDescriptor {
    let name = meta.location.filename().unwrap_or_default();
    ObjectDescriptor::file(name, meta.size as u64).with_modified(meta.last_modified)
}

impl Store for ObjectStoreAdapter {
    fn kind(&self) -> BackendKind {
        self.config.kind()
    }

    fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn create(&self, path: &str, reader: &mut dyn Read) -> StoreResult<()> {
        self.upload(path, reader)
    }

    fn read(&self, path: &str) -> StoreResult<Vec<u8>> {
        let key = self.object_path(path)?;
        let client = &self.client;
        let bytes = self
            .runtime
            .block_on(async { client.get(&key).await?.bytes().await })
            .map_err(|e| self.backend_error(path, e))?;
        Ok(bytes.to_vec())
    }

    // Uploading to an existing key replaces it, so update is create.
    fn update(&self, path: &str, reader: &mut dyn Read) -> StoreResult<()> {
        self.upload(path, reader)
    }

    fn delete(&self, path: &str) -> StoreResult<()> {
        let key = self.object_path(path)?;
        let client = &self.client;
        self.runtime
            .block_on(async { client.delete(&key).await })
            .map_err(|e| self.backend_error(path, e))?;
        debug!(backend = %self.kind(), key = %key, "deleted object");
        Ok(())
    }

    fn stat(&self, path: &str) -> StoreResult<ObjectDescriptor> {
        let key = self.object_path(path)?;
        let client = &self.client;
        let meta = self
            .runtime
            .block_on(async { client.head(&key).await })
            .map_err(|e| self.backend_error(path, e))?;
        if meta.location != key {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }
        Ok(descriptor_from_meta(&meta))
    }

    fn mkdir(&self, path: &str, _mode: u32) -> StoreResult<()> {
        debug!(backend = %self.kind(), path, "mkdir has no effect on object stores");
        Ok(())
    }

    fn mkdir_all(&self, path: &str, mode: u32) -> StoreResult<()> {
        self.mkdir(path, mode)
    }

    fn remove_all(&self, path: &str) -> StoreResult<()> {
        let prefix = self.object_path(path)?;
        let mut deleted = self.delete_prefixed(path, &prefix)?;

        // Listing only returns keys beneath the prefix; an object stored at
        // the prefix itself is removed separately.
        if !prefix.as_ref().is_empty() {
            match self.stat(path) {
                Ok(_) => {
                    self.delete(path)?;
                    deleted += 1;
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        debug!(backend = %self.kind(), prefix = %prefix, deleted, "removed prefix");
        Ok(())
    }

    fn write_file(&self, path: &str, data: &[u8], _mode: u32) -> StoreResult<()> {
        self.put(path, Bytes::copy_from_slice(data))
    }

    fn read_dir(&self, path: &str) -> StoreResult<Vec<ObjectDescriptor>> {
        let prefix = self.object_path(path)?;
        let client = &self.client;
        let prefix_ref = (!prefix.as_ref().is_empty()).then_some(&prefix);
        let listing = self
            .runtime
            .block_on(async { client.list_with_delimiter(prefix_ref).await })
            .map_err(|e| self.backend_error(path, e))?;
        Ok(listing.objects.iter().map(descriptor_from_meta).collect())
    }

    fn write_filter(&self, final_path: &str, processor: &mut WriteFilterFn<'_>) -> StoreResult<()> {
        let staged = self.scratch.stage(final_path, processor)?;
        let data = std::fs::read(staged.path())
            .map_err(|e| StoreError::io(staged.path().display().to_string(), e))?;
        self.put(final_path, Bytes::from(data))
    }
}

impl std::fmt::Debug for ObjectStoreAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreAdapter")
            .field("config", &self.config)
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::StoreOptions;
    use object_store::memory::InMemory;
    use async_trait::async_trait;
    use futures::stream::BoxStream;
    use object_store::{
        GetOptions, GetResult, ListResult, MultipartUpload, PutMultipartOpts, PutOptions, PutResult,
    };
    use std::fs::File;
    use std::io::{self, Write};

    fn memory_store(kind: BackendKind, page_size: usize) -> (Arc<InMemory>, ObjectStoreAdapter) {
        let options = StoreOptions::new()
            .with_bucket("test-bucket")
            .with_list_page_size(page_size);
        let config = BackendConfig::resolve(kind, options).unwrap();
        let client = Arc::new(InMemory::new());
        let store = ObjectStoreAdapter::with_client(config, client.clone()).unwrap();
        (client, store)
    }

    /// In-memory bucket where deleting one key either does nothing or fails.
    #[derive(Debug)]
    struct StickyKey {
        inner: InMemory,
        key: ObjectPath,
        refuse: bool,
    }

    impl std::fmt::Display for StickyKey {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "StickyKey({})", self.key)
        }
    }

    #[async_trait]
    impl ObjectStore for StickyKey {
        async fn put_opts(
            &self,
            location: &ObjectPath,
            payload: PutPayload,
            opts: PutOptions,
        ) -> object_store::Result<PutResult> {
            self.inner.put_opts(location, payload, opts).await
        }

        async fn put_multipart_opts(
            &self,
            location: &ObjectPath,
            opts: PutMultipartOpts,
        ) -> object_store::Result<Box<dyn MultipartUpload>> {
            self.inner.put_multipart_opts(location, opts).await
        }

        async fn get_opts(
            &self,
            location: &ObjectPath,
            options: GetOptions,
        ) -> object_store::Result<GetResult> {
            self.inner.get_opts(location, options).await
        }

        async fn delete(&self, location: &ObjectPath) -> object_store::Result<()> {
            if location != &self.key {
                return self.inner.delete(location).await;
            }
            if self.refuse {
                return Err(object_store::Error::Generic {
                    store: "StickyKey",
                    source: "access denied".into(),
                });
            }
            Ok(())
        }

        fn list(&self, prefix: Option<&ObjectPath>) -> BoxStream<'_, object_store::Result<ObjectMeta>> {
            self.inner.list(prefix)
        }

        async fn list_with_delimiter(
            &self,
            prefix: Option<&ObjectPath>,
        ) -> object_store::Result<ListResult> {
            self.inner.list_with_delimiter(prefix).await
        }

        async fn copy(&self, from: &ObjectPath, to: &ObjectPath) -> object_store::Result<()> {
            self.inner.copy(from, to).await
        }

        async fn copy_if_not_exists(&self, from: &ObjectPath, to: &ObjectPath) -> object_store::Result<()> {
            self.inner.copy_if_not_exists(from, to).await
        }
    }

    fn sticky_store(key: &str, refuse: bool, page_size: usize) -> ObjectStoreAdapter {
        let options = StoreOptions::new()
            .with_bucket("test-bucket")
            .with_list_page_size(page_size);
        let config = BackendConfig::resolve(BackendKind::S3, options).unwrap();
        let client = Arc::new(StickyKey {
            inner: InMemory::new(),
            key: ObjectPath::from(key),
            refuse,
        });
        let store = ObjectStoreAdapter::with_client(config, client).unwrap();
        for i in 0..10 {
            store.write_file(&format!("logs/{i:02}.log"), b"entry", 0o644).unwrap();
        }
        store
    }

    fn s3() -> ObjectStoreAdapter {
        memory_store(BackendKind::S3, 1000).1
    }

    fn all_keys(store: &ObjectStoreAdapter) -> Vec<String> {
        let client = &store.client;
        let mut keys: Vec<String> = store
            .runtime
            .block_on(async { client.list(None).try_collect::<Vec<_>>().await })
            .unwrap()
            .into_iter()
            .map(|m| m.location.to_string())
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn round_trip_and_update() {
        let store = s3();
        store.create("testdata/hello.txt", &mut "Hello World!!!!".as_bytes()).unwrap();
        assert_eq!(store.read("testdata/hello.txt").unwrap(), b"Hello World!!!!");

        store.update("testdata/hello.txt", &mut "Hello World.".as_bytes()).unwrap();
        assert_eq!(store.read_file("testdata/hello.txt").unwrap(), b"Hello World.");
    }

    #[test]
    fn update_creates_missing_key() {
        let store = s3();
        store.update("fresh.txt", &mut "new".as_bytes()).unwrap();
        assert_eq!(store.read("fresh.txt").unwrap(), b"new");
    }

    #[test]
    fn delete_then_stat_is_not_found() {
        let store = s3();
        store.write_file("a.txt", b"x", 0o644).unwrap();
        store.delete("a.txt").unwrap();
        let err = store.stat("a.txt").unwrap_err();
        assert!(err.is_not_found());
        assert!(store.read("a.txt").unwrap_err().is_not_found());
    }

    #[test]
    fn stat_matches_exact_key_only() {
        let store = s3();
        store.write_file("a/b.txt", b"short", 0o644).unwrap();
        store.write_file("a/b.txt.bak", b"a longer backup", 0o644).unwrap();

        let desc = store.stat("a/b.txt").unwrap();
        assert_eq!(desc.name, "b.txt");
        assert_eq!(desc.size, 5);
        assert!(!desc.is_dir);
        assert_eq!(desc.mode, 0);
        assert!(desc.modified.is_some());

        assert!(store.stat("a/b").unwrap_err().is_not_found());
        assert!(store.stat("a").unwrap_err().is_not_found());
    }

    #[test]
    fn mkdir_is_a_silent_no_op() {
        let store = s3();
        store.mkdir("dir", 0o755).unwrap();
        store.mkdir_all("deep/nested/dir", 0o700).unwrap();
        store.mkdir("", 0).unwrap();
        assert!(all_keys(&store).is_empty());
        assert!(!store.is_dir("dir"));
    }

    #[test]
    fn remove_all_pages_through_every_key() {
        let (_, store) = memory_store(BackendKind::Gcs, 3);
        for i in 0..10 {
            store.write_file(&format!("logs/{i:02}.log"), b"entry", 0o644).unwrap();
        }
        store.write_file("logs/nested/deep.log", b"entry", 0o644).unwrap();
        store.write_file("logs", b"marker", 0o644).unwrap();
        store.write_file("logsx/keep.log", b"keep", 0o644).unwrap();

        store.remove_all("logs").unwrap();
        assert_eq!(all_keys(&store), ["logsx/keep.log"]);

        // Nothing left to remove.
        store.remove_all("logs").unwrap();
    }

    #[test]
    fn remove_all_stops_when_a_delete_has_no_effect() {
        let store = sticky_store("logs/03.log", false, 3);
        let err = store.remove_all("logs").unwrap_err();
        assert!(
            matches!(&err, StoreError::Undeletable { path } if path == "logs/03.log"),
            "{err}"
        );
        assert_eq!(all_keys(&store), ["logs/03.log"]);
    }

    #[test]
    fn remove_all_stops_at_first_failed_delete() {
        let store = sticky_store("logs/04.log", true, 10);
        let err = store.remove_all("logs").unwrap_err();
        assert!(
            matches!(&err, StoreError::Backend { backend: BackendKind::S3, path, .. } if path == "logs/04.log"),
            "{err}"
        );
        let expected: Vec<String> = (4..10).map(|i| format!("logs/{i:02}.log")).collect();
        assert_eq!(all_keys(&store), expected);
    }

    #[tokio::test]
    async fn store_can_be_used_and_dropped_inside_a_runtime() {
        let store = s3();
        store.write_file("async/a.txt", b"from a task", 0o644).unwrap();
        assert_eq!(store.read("async/a.txt").unwrap(), b"from a task");
        drop(store);
    }

    #[test]
    fn read_dir_lists_direct_children() {
        let store = s3();
        for key in ["docs/a.md", "docs/b.txt", "docs/sub/c.md", "other/d.md"] {
            store.write_file(key, key.as_bytes(), 0o644).unwrap();
        }
        let mut names: Vec<String> = store.read_dir("docs").unwrap().into_iter().map(|d| d.name).collect();
        names.sort();
        assert_eq!(names, ["a.md", "b.txt"]);
        assert_eq!(store.find_by_ext("docs", ".md").unwrap(), ["a.md"]);
    }

    #[test]
    fn accepts_uris_for_its_own_bucket() {
        let store = s3();
        store
            .create("s3://test-bucket/x/y.txt", &mut "via uri".as_bytes())
            .unwrap();
        assert_eq!(store.read("x/y.txt").unwrap(), b"via uri");
        assert!(store.is_file("s3://test-bucket/x/y.txt"));
    }

    #[test]
    fn rejects_uris_for_other_locations() {
        let store = s3();
        for uri in ["s3://other-bucket/k", "gs://test-bucket/k", "http://test-bucket/k"] {
            let err = store.read(uri).unwrap_err();
            assert!(matches!(err, StoreError::InvalidPath { .. }), "{uri}: {err}");
        }
        assert!(matches!(
            store.read("a/../b").unwrap_err(),
            StoreError::InvalidPath { .. }
        ));
    }

    #[test]
    fn write_filter_uploads_staged_output() {
        let scratch = tempfile::tempdir().unwrap();
        let options = StoreOptions::new()
            .with_bucket("test-bucket")
            .with_scratch_dir(scratch.path());
        let config = BackendConfig::resolve(BackendKind::S3, options).unwrap();
        let store = ObjectStoreAdapter::with_client(config, Arc::new(InMemory::new())).unwrap();

        store
            .write_filter("out/bundle.tar", &mut |file: &mut File| -> io::Result<()> {
                file.write_all(b"header")?;
                file.write_all(b"body")
            })
            .unwrap();
        assert_eq!(store.read_file("out/bundle.tar").unwrap(), b"headerbody");
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);

        let err = store
            .write_filter("out/broken.tar", &mut |file: &mut File| -> io::Result<()> {
                file.write_all(b"half")?;
                Err(io::Error::new(io::ErrorKind::Other, "archive failed"))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Filter { .. }));
        assert!(store.stat("out/broken.tar").unwrap_err().is_not_found());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn with_client_rejects_filesystem_config() {
        let config = BackendConfig::resolve(BackendKind::Filesystem, StoreOptions::new()).unwrap();
        let err = ObjectStoreAdapter::with_client(config, Arc::new(InMemory::new())).unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(BackendKind::Filesystem)));
    }

    #[test]
    fn connect_builds_a_session_without_network() {
        let options = StoreOptions::new().with_bucket("archive").with_region("us-west-2");
        let config = BackendConfig::resolve(BackendKind::S3, options).unwrap();
        let store = ObjectStoreAdapter::connect(config).unwrap();
        assert_eq!(store.kind(), BackendKind::S3);
        assert_eq!(store.config().bucket(), Some("archive"));
    }
}
