use omni_types::BackendKind;
use tracing::info;

use crate::error::StoreResult;
use crate::fs::FilesystemStore;
use crate::object::ObjectStoreAdapter;
use crate::options::{BackendConfig, StoreOptions};
use crate::traits::Store;

/// Construct a store for `kind`.
///
/// Options that do not apply to the backend are ignored. Fails for
/// [`BackendKind::Unsupported`], for a remote backend without a bucket, and
/// when the remote client session cannot be built. A returned store is fully
/// usable; every operation is bound.
pub fn init(kind: BackendKind, options: StoreOptions) -> StoreResult<Box<dyn Store>> {
    let config = BackendConfig::resolve(kind, options)?;
    let store: Box<dyn Store> = match config {
        BackendConfig::Filesystem(fs) => Box::new(FilesystemStore::new(fs)),
        remote => Box::new(ObjectStoreAdapter::connect(remote)?),
    };
    info!(backend = %store.kind(), bucket = store.config().bucket().unwrap_or("-"), "store initialized");
    Ok(store)
}
