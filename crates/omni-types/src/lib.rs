//! Foundation types for omni.
//!
//! This crate provides the small, backend-agnostic vocabulary shared by every
//! omni crate: which storage backend a path or store refers to, and what a
//! file or object looks like once its native metadata has been adapted.
//!
//! # Key Types
//!
//! - [`BackendKind`] — Backend tag used for dispatch and path inference
//! - [`ObjectDescriptor`] — Name, size, modification time and directory flag
//!   of a file or object

pub mod backend;
pub mod descriptor;
pub mod error;

pub use backend::BackendKind;
pub use descriptor::{base_name, ObjectDescriptor};
pub use error::TypeError;
