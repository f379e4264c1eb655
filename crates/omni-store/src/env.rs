//! Environment-derived store selection.
//!
//! The translation from environment variables to a backend and its
//! [`StoreOptions`] is a pure function of a variable map, so it can be tested
//! without touching the process environment. Only [`get_default_store`],
//! [`get_store`] and [`get_store_with`] read the real environment; they are
//! meant to be called once by the program's composition root.
//!
//! Recognized variables:
//!
//! | Variable | Option |
//! |---|---|
//! | `AWS_BUCKET` | `bucket` (S3) |
//! | `AWS_REGION`, `AWS_DEFAULT_REGION` | `region` |
//! | `AWS_ENDPOINT_URL`, `AWS_ENDPOINT` | `endpoint` |
//! | `AWS_ALLOW_HTTP` | `allow_http` |
//! | `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN` | credentials |
//! | `AWS_SDK_LOAD_CONFIG` | `use_ambient_config` |
//! | `GOOGLE_BUCKET` | `bucket` (GCS) |
//! | `GOOGLE_APPLICATION_CREDENTIALS`, `GOOGLE_JSON_CONFIG` | `credentials_file` |

use std::collections::HashMap;
use std::path::PathBuf;

use omni_types::BackendKind;
use tracing::debug;

use crate::error::StoreResult;
use crate::factory::init;
use crate::options::StoreOptions;
use crate::selector::{bucket_from_uri, storage_type};
use crate::traits::Store;

/// Snapshot of environment variables.
pub type EnvVars = HashMap<String, String>;

fn var<'a>(env: &'a EnvVars, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| env.get(*name))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

fn flag(env: &EnvVars, name: &str) -> Option<bool> {
    var(env, &[name]).map(|v| {
        v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes")
    })
}

/// Infer the default backend from the environment.
///
/// Any non-empty `AWS_*` variable selects S3; otherwise `GOOGLE_BUCKET` or
/// `GOOGLE_APPLICATION_CREDENTIALS` selects GCS; otherwise the filesystem.
pub fn default_kind_from_env(env: &EnvVars) -> BackendKind {
    if env
        .iter()
        .any(|(k, v)| k.starts_with("AWS_") && !v.trim().is_empty())
    {
        BackendKind::S3
    } else if var(env, &["GOOGLE_BUCKET", "GOOGLE_APPLICATION_CREDENTIALS"]).is_some() {
        BackendKind::Gcs
    } else {
        BackendKind::Filesystem
    }
}

/// Options for `kind` taken from the environment.
///
/// Only the variables of that backend's family are consulted.
pub fn options_from_env(kind: BackendKind, env: &EnvVars) -> StoreOptions {
    let owned = |names: &[&str]| var(env, names).map(str::to_string);
    match kind {
        BackendKind::S3 => StoreOptions {
            bucket: owned(&["AWS_BUCKET"]),
            region: owned(&["AWS_REGION", "AWS_DEFAULT_REGION"]),
            endpoint: owned(&["AWS_ENDPOINT_URL", "AWS_ENDPOINT"]),
            allow_http: flag(env, "AWS_ALLOW_HTTP"),
            access_key_id: owned(&["AWS_ACCESS_KEY_ID"]),
            secret_access_key: owned(&["AWS_SECRET_ACCESS_KEY"]),
            session_token: owned(&["AWS_SESSION_TOKEN"]),
            use_ambient_config: flag(env, "AWS_SDK_LOAD_CONFIG"),
            ..StoreOptions::default()
        },
        BackendKind::Gcs => StoreOptions {
            bucket: owned(&["GOOGLE_BUCKET"]),
            credentials_file: var(env, &["GOOGLE_APPLICATION_CREDENTIALS", "GOOGLE_JSON_CONFIG"])
                .map(PathBuf::from),
            ..StoreOptions::default()
        },
        BackendKind::Filesystem | BackendKind::Unsupported => StoreOptions::default(),
    }
}

/// Backend and options for the default store described by `env`.
pub fn default_request(env: &EnvVars) -> (BackendKind, StoreOptions) {
    let kind = default_kind_from_env(env);
    (kind, options_from_env(kind, env))
}

/// Backend and options for the store that serves `name`.
///
/// The backend comes from the path or URI. Options are merged in order of
/// precedence: `caller`, then the bucket named in the URI, then `env`.
pub fn store_request(
    name: &str,
    caller: StoreOptions,
    env: &EnvVars,
) -> (BackendKind, StoreOptions) {
    let kind = storage_type(name);
    let from_uri = StoreOptions {
        bucket: bucket_from_uri(name),
        ..StoreOptions::default()
    };
    let options = caller.or(from_uri).or(options_from_env(kind, env));
    (kind, options)
}

fn process_env() -> EnvVars {
    std::env::vars().collect()
}

/// Open the store the process environment points at, falling back to the
/// filesystem.
pub fn get_default_store() -> StoreResult<Box<dyn Store>> {
    let (kind, options) = default_request(&process_env());
    debug!(backend = %kind, "opening default store");
    init(kind, options)
}

/// Open the store serving `name`, using environment-derived options.
pub fn get_store(name: &str) -> StoreResult<Box<dyn Store>> {
    get_store_with(name, StoreOptions::default())
}

/// Open the store serving `name`; `options` take precedence over the
/// environment.
pub fn get_store_with(name: &str, options: StoreOptions) -> StoreResult<Box<dyn Store>> {
    let (kind, options) = store_request(name, options, &process_env());
    debug!(backend = %kind, name, "opening store");
    init(kind, options)
}
