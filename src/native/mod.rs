// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Native container library interface.
//!
//! This module defines the contract the access layer consumes from the
//! underlying container library. The trait mirrors a C-style handle API:
//! objects are referred to by [`Hid`] values, a negative value is the
//! invalid sentinel, and every handle returned by an `*_open`, `*_create`,
//! `*_get_*` or `type_copy` call must be released with the matching close
//! call exactly once. [`ScopedHandle`] enforces that pairing.
//!
//! - [`NativeLibrary`] - The library contract
//! - [`ScopedHandle`] - Guard that releases one handle on drop
//! - [`Hdf5Library`] - The HDF5 C library (feature `hdf5`, on by default)
//! - [`MemoryLibrary`] - In-process stand-in with a handle table and fault
//!   injection, used to test the access layer

pub mod handle;
#[cfg(feature = "hdf5")]
pub mod hdf5;
pub mod memory;
pub(crate) mod tree;

use std::fmt;
use std::path::Path;

pub use handle::{Closer, ScopedHandle};
#[cfg(feature = "hdf5")]
pub use hdf5::Hdf5Library;
pub use memory::{FaultInjection, FileStore, MemoryLibrary};

/// Library used by [`Container::open`](crate::Container::open) and
/// [`ContainerBuilder::build`](crate::ContainerBuilder::build).
#[cfg(feature = "hdf5")]
pub type DefaultLibrary = Hdf5Library;

/// Library used by [`Container::open`](crate::Container::open) and
/// [`ContainerBuilder::build`](crate::ContainerBuilder::build).
#[cfg(not(feature = "hdf5"))]
pub type DefaultLibrary = MemoryLibrary;

/// Native object identifier.
pub type Hid = i64;

/// Sentinel for "no object".
pub const INVALID_HID: Hid = -1;

/// Check whether a handle value refers to an object.
pub const fn is_valid_hid(hid: Hid) -> bool {
    hid >= 0
}

/// Failure reported by a native call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeError {
    /// Native operation that failed
    pub operation: &'static str,
    /// Error message
    pub message: String,
}

impl NativeError {
    /// Create a native error.
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.operation, self.message)
    }
}

impl std::error::Error for NativeError {}

/// Result type for native calls.
pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// Access mode for opening an existing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAccess {
    /// Read-only access
    ReadOnly,
    /// Read and write access
    ReadWrite,
}

/// Class of a native datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// Fixed-width integer
    Integer,
    /// IEEE floating point
    Float,
    /// Fixed or variable length string
    String,
    /// Anything else (opaque blobs, compounds, ...)
    Other,
}

/// Kind of object a path resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// Group
    Group,
    /// Dataset
    Dataset,
    /// Named datatype or other object
    Other,
}

/// Object information returned by [`NativeLibrary::object_info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object kind
    pub object_type: ObjectType,
    /// Number of attributes attached to the object
    pub num_attrs: usize,
}

/// Size of a string datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringSize {
    /// Fixed number of bytes, no terminator stored
    Fixed(usize),
    /// Variable length, stored out of line
    Variable,
}

/// Predefined datatypes every library provides.
///
/// `Std*Le` and `Ieee*Le` are the little-endian standard types used for
/// stored data; `Native*` are the platform's in-memory representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredefinedType {
    StdI8Le,
    StdI16Le,
    StdI32Le,
    StdI64Le,
    StdU8Le,
    StdU16Le,
    StdU32Le,
    StdU64Le,
    IeeeF32Le,
    IeeeF64Le,
    NativeI8,
    NativeI16,
    NativeI32,
    NativeI64,
    NativeU8,
    NativeU16,
    NativeU32,
    NativeU64,
    NativeFloat,
    NativeDouble,
    /// One-byte C string base type (size 1, fixed)
    CString,
}

impl PredefinedType {
    /// All predefined types, in identifier order.
    pub const ALL: [PredefinedType; 21] = [
        PredefinedType::StdI8Le,
        PredefinedType::StdI16Le,
        PredefinedType::StdI32Le,
        PredefinedType::StdI64Le,
        PredefinedType::StdU8Le,
        PredefinedType::StdU16Le,
        PredefinedType::StdU32Le,
        PredefinedType::StdU64Le,
        PredefinedType::IeeeF32Le,
        PredefinedType::IeeeF64Le,
        PredefinedType::NativeI8,
        PredefinedType::NativeI16,
        PredefinedType::NativeI32,
        PredefinedType::NativeI64,
        PredefinedType::NativeU8,
        PredefinedType::NativeU16,
        PredefinedType::NativeU32,
        PredefinedType::NativeU64,
        PredefinedType::NativeFloat,
        PredefinedType::NativeDouble,
        PredefinedType::CString,
    ];

    /// Position of this type in [`PredefinedType::ALL`].
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Operations consumed from the native container library.
///
/// Calls that produce a handle return [`INVALID_HID`] on failure; callers
/// wrap the result in a [`ScopedHandle`] and test [`ScopedHandle::valid`].
/// Handles returned by [`NativeLibrary::predefined`] are library-owned and
/// must never be closed.
pub trait NativeLibrary {
    /// Identifier of a predefined datatype.
    fn predefined(&self, ty: PredefinedType) -> Hid;

    // ------------------------------------------------------------------
    // Files
    // ------------------------------------------------------------------

    /// Open an existing file.
    fn file_open(&self, path: &Path, access: FileAccess) -> Hid;

    /// Create a file, truncating any existing one. The file is writable.
    fn file_create(&self, path: &Path) -> Hid;

    /// Persist pending changes of a writable file.
    fn file_flush(&self, file: Hid) -> NativeResult<()>;

    /// Close a file, persisting pending changes.
    fn file_close(&self, file: Hid) -> NativeResult<()>;

    // ------------------------------------------------------------------
    // Objects and groups
    // ------------------------------------------------------------------

    /// Information about the object at `path`, relative to `loc`.
    fn object_info(&self, loc: Hid, path: &str) -> NativeResult<ObjectInfo>;

    /// Visit every object below `loc` depth-first in enumeration order.
    ///
    /// The visitor receives the object's path relative to `loc`.
    fn visit(&self, loc: Hid, visitor: &mut dyn FnMut(&str, &ObjectInfo)) -> NativeResult<()>;

    /// Open the group at `path`.
    fn group_open(&self, loc: Hid, path: &str) -> Hid;

    /// Create a group at `path`; the parent must exist.
    fn group_create(&self, loc: Hid, path: &str) -> Hid;

    /// Number of members of a group.
    fn group_num_objs(&self, group: Hid) -> NativeResult<usize>;

    /// Name of the member at `index`, in enumeration order.
    fn group_objname_by_idx(&self, group: Hid, index: usize) -> NativeResult<String>;

    /// Close a group.
    fn group_close(&self, group: Hid) -> NativeResult<()>;

    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    /// Open the dataset at `path`.
    fn dataset_open(&self, loc: Hid, path: &str) -> Hid;

    /// Create a dataset `name` under group `loc`.
    fn dataset_create(&self, loc: Hid, name: &str, file_type: Hid, space: Hid) -> Hid;

    /// Copy of the dataset's stored datatype.
    fn dataset_get_type(&self, dataset: Hid) -> Hid;

    /// Copy of the dataset's dataspace.
    fn dataset_get_space(&self, dataset: Hid) -> Hid;

    /// Read the full extent, converted to `mem_type`, into `buf`.
    fn dataset_read(&self, dataset: Hid, mem_type: Hid, buf: &mut [u8]) -> NativeResult<()>;

    /// Write the full extent from `buf`, interpreted as `mem_type`.
    fn dataset_write(&self, dataset: Hid, mem_type: Hid, buf: &[u8]) -> NativeResult<()>;

    /// Close a dataset.
    fn dataset_close(&self, dataset: Hid) -> NativeResult<()>;

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Check whether the object at `path` has an attribute `name`.
    fn attr_exists_by_name(&self, loc: Hid, path: &str, name: &str) -> NativeResult<bool>;

    /// Open attribute `name` of the object at `path`.
    fn attr_open_by_name(&self, loc: Hid, path: &str, name: &str) -> Hid;

    /// Create attribute `name` on an open group or dataset.
    fn attr_create(&self, object: Hid, name: &str, file_type: Hid, space: Hid) -> Hid;

    /// Delete attribute `name` from an open group or dataset.
    fn attr_delete(&self, object: Hid, name: &str) -> NativeResult<()>;

    /// Rename attribute `from` of an open group or dataset to `to`, which
    /// must not exist.
    fn attr_rename(&self, object: Hid, from: &str, to: &str) -> NativeResult<()>;

    /// Copy of the attribute's stored datatype.
    fn attr_get_type(&self, attr: Hid) -> Hid;

    /// Copy of the attribute's dataspace.
    fn attr_get_space(&self, attr: Hid) -> Hid;

    /// Read a fixed-size attribute value, converted to `mem_type`.
    fn attr_read(&self, attr: Hid, mem_type: Hid, buf: &mut [u8]) -> NativeResult<()>;

    /// Read a variable-length string attribute.
    ///
    /// Returns a handle to a library-owned buffer holding the first string,
    /// to be released with [`NativeLibrary::vlen_reclaim`].
    fn attr_read_vlen(&self, attr: Hid, mem_type: Hid) -> Hid;

    /// Write an attribute value from `buf`, interpreted as `mem_type`.
    ///
    /// For a variable-length string `mem_type`, `buf` holds one string.
    fn attr_write(&self, attr: Hid, mem_type: Hid, buf: &[u8]) -> NativeResult<()>;

    /// Close an attribute.
    fn attr_close(&self, attr: Hid) -> NativeResult<()>;

    /// Bytes held by a library-owned variable-length buffer.
    fn vlen_copy(&self, buffer: Hid) -> NativeResult<Vec<u8>>;

    /// Release a library-owned variable-length buffer.
    fn vlen_reclaim(&self, buffer: Hid) -> NativeResult<()>;

    // ------------------------------------------------------------------
    // Datatypes
    // ------------------------------------------------------------------

    /// Modifiable copy of a datatype.
    fn type_copy(&self, ty: Hid) -> Hid;

    /// Resize a copied string datatype.
    fn type_set_size(&self, ty: Hid, size: StringSize) -> NativeResult<()>;

    /// Semantic equality of two datatypes.
    fn type_equal(&self, a: Hid, b: Hid) -> NativeResult<bool>;

    /// Class of a datatype.
    fn type_class(&self, ty: Hid) -> NativeResult<TypeClass>;

    /// Whether a string datatype is variable length.
    fn type_is_variable_str(&self, ty: Hid) -> NativeResult<bool>;

    /// Element size in bytes.
    fn type_size(&self, ty: Hid) -> NativeResult<usize>;

    /// Close a datatype.
    fn type_close(&self, ty: Hid) -> NativeResult<()>;

    // ------------------------------------------------------------------
    // Dataspaces
    // ------------------------------------------------------------------

    /// Create a simple dataspace with the given extents.
    fn space_create_simple(&self, dims: &[u64]) -> Hid;

    /// Rank of a dataspace.
    fn space_ndims(&self, space: Hid) -> NativeResult<usize>;

    /// Write the extents into `dims` and return the rank.
    fn space_dims(&self, space: Hid, dims: &mut [u64]) -> NativeResult<usize>;

    /// Close a dataspace.
    fn space_close(&self, space: Hid) -> NativeResult<()>;
}
