// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Typed access to container files.
//!
//! The accessors borrow a native library and the root file handle of an
//! open container. Each operation resolves its path afresh, acquires the
//! sub-handles it needs as [`ScopedHandle`]s and releases them before it
//! returns, on success and on every error path.
//!
//! - [`PathResolver`] - Object kinds, members and attribute existence
//! - [`AttributeAccessor`] - Scalar and string attributes
//! - [`DatasetAccessor`] - Dataset types, shapes and N-dimensional transfer
//! - [`Container`] - Owns the file handle and exposes all of the above

pub mod attribute;
pub mod builder;
pub mod container;
pub mod dataset;
pub mod resolver;

pub use attribute::{AttributeAccessor, AttributeValue};
pub use builder::{ContainerBuilder, ContainerConfig};
pub use container::{Container, OpenMode};
pub use dataset::{DatasetAccessor, DatasetValues};
pub use resolver::{ObjectKind, PathResolver};

use tracing::warn;

use crate::core::AccessError;
use crate::native::{Hid, NativeLibrary, PredefinedType, ScopedHandle};

pub(crate) fn open_group<'a, L: NativeLibrary>(
    lib: &'a L,
    loc: Hid,
    path: &str,
) -> ScopedHandle<'a, L> {
    ScopedHandle::new(lib, lib.group_open(loc, path), L::group_close)
}

pub(crate) fn open_dataset<'a, L: NativeLibrary>(
    lib: &'a L,
    loc: Hid,
    path: &str,
) -> ScopedHandle<'a, L> {
    ScopedHandle::new(lib, lib.dataset_open(loc, path), L::dataset_close)
}

pub(crate) fn new_space<'a, L: NativeLibrary>(lib: &'a L, dims: &[u64]) -> ScopedHandle<'a, L> {
    ScopedHandle::new(lib, lib.space_create_simple(dims), L::space_close)
}

pub(crate) fn copy_type<'a, L: NativeLibrary>(lib: &'a L, ty: Hid) -> ScopedHandle<'a, L> {
    ScopedHandle::new(lib, lib.type_copy(ty), L::type_close)
}

/// Copy of the C string base type; resized by the caller.
pub(crate) fn string_type<'a, L: NativeLibrary>(lib: &'a L) -> ScopedHandle<'a, L> {
    copy_type(lib, lib.predefined(PredefinedType::CString))
}

/// Log an error with its structured fields and hand it back.
pub(crate) fn logged(err: AccessError) -> AccessError {
    let fields = err.log_fields();
    warn!(kind = %err.kind(), fields = ?fields, "{err}");
    err
}

/// `name` below `path`, for error context.
pub(crate) fn join_path(path: &str, name: &str) -> String {
    format!("{}/{}", path.trim_end_matches('/'), name)
}
