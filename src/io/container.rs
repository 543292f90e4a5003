// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Container façade.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::{AccessError, DataType, Element, Result};
use crate::native::{is_valid_hid, DefaultLibrary, FileAccess, Hid, NativeLibrary, INVALID_HID};

use super::{
    logged, AttributeAccessor, AttributeValue, DatasetAccessor, DatasetValues, ObjectKind,
    PathResolver,
};

/// How a container file is opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenMode {
    /// Open an existing file for reading
    #[default]
    ReadOnly,
    /// Create a new file, truncating any existing one
    WriteOnly,
    /// Open an existing file for reading and writing
    ReadWrite,
}

impl OpenMode {
    /// Check if the mode permits modification.
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenMode::ReadOnly)
    }
}

/// An open container file.
///
/// Opening never fails outright: a container that could not be opened is
/// invalid ([`Container::is_valid`] is `false`) and every operation on it
/// reports `NotOpen`, an empty result, `false` or `DataType::None`.
///
/// # Example
///
/// ```rust,no_run
/// use h5access::{Container, OpenMode};
///
/// let container = Container::open("scan.h5", OpenMode::ReadOnly);
/// for name in container.children("/data/tomography")? {
///     println!("{name}: {}", container.data_type(&format!("/data/tomography/{name}")));
/// }
/// let angles = container.read_data::<f32>("/data/tomography/dim1")?;
/// let units: String = container.attribute("/data/tomography/dim1", "units")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Container<L: NativeLibrary = DefaultLibrary> {
    lib: L,
    file: Hid,
    path: PathBuf,
    mode: OpenMode,
}

impl Container<DefaultLibrary> {
    /// Open `path` with the [`DefaultLibrary`], the HDF5 C library unless
    /// the `hdf5` feature is disabled.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Self {
        Self::open_with(DefaultLibrary::new(), path, mode)
    }
}

impl<L: NativeLibrary> Container<L> {
    /// Open `path` through `lib`.
    pub fn open_with<P: AsRef<Path>>(lib: L, path: P, mode: OpenMode) -> Self {
        let path = path.as_ref().to_path_buf();
        let file = match mode {
            OpenMode::ReadOnly => lib.file_open(&path, FileAccess::ReadOnly),
            OpenMode::ReadWrite => lib.file_open(&path, FileAccess::ReadWrite),
            OpenMode::WriteOnly => lib.file_create(&path),
        };
        if is_valid_hid(file) {
            debug!(path = %path.display(), ?mode, "opened container");
        } else {
            warn!(path = %path.display(), ?mode, "failed to open container");
        }
        Self {
            lib,
            file,
            path,
            mode,
        }
    }

    /// Check if the file is open.
    pub fn is_valid(&self) -> bool {
        is_valid_hid(self.file)
    }

    /// Path the container was opened with.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the container was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// The native library this container uses.
    pub fn library(&self) -> &L {
        &self.lib
    }

    /// Path queries on this container.
    pub fn resolver(&self) -> PathResolver<'_, L> {
        PathResolver::new(&self.lib, self.file)
    }

    /// Attribute access on this container.
    pub fn attributes(&self) -> AttributeAccessor<'_, L> {
        AttributeAccessor::new(&self.lib, self.file)
    }

    /// Dataset access on this container.
    pub fn datasets(&self) -> DatasetAccessor<'_, L> {
        DatasetAccessor::new(&self.lib, self.file)
    }

    /// Persist pending changes without closing.
    pub fn flush(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(AccessError::not_open(self.path.display().to_string()));
        }
        self.lib.file_flush(self.file).map_err(|e| {
            AccessError::io_failure("flush", self.path.display().to_string(), e.to_string())
        })
    }

    /// Close the file. Closing an already closed container does nothing.
    pub fn close(&mut self) -> Result<()> {
        if !self.is_valid() {
            return Ok(());
        }
        let file = std::mem::replace(&mut self.file, INVALID_HID);
        debug!(path = %self.path.display(), "closing container");
        self.lib.file_close(file).map_err(|e| {
            AccessError::io_failure("close", self.path.display().to_string(), e.to_string())
        })
    }

    /// Create a group at `path`; its parent must exist.
    pub fn create_group(&self, path: &str) -> Result<()> {
        if !self.is_valid() {
            return Err(AccessError::not_open(path));
        }
        let group = self.lib.group_create(self.file, path);
        if !is_valid_hid(group) {
            return Err(logged(AccessError::io_failure(
                "create group",
                path,
                "native create failed",
            )));
        }
        self.lib
            .group_close(group)
            .map_err(|e| AccessError::io_failure("create group", path, e.to_string()))
    }

    // ------------------------------------------------------------------
    // Paths
    // ------------------------------------------------------------------

    /// Names of the members of the group at `path`, in the library's
    /// enumeration order.
    pub fn children(&self, path: &str) -> Result<Vec<String>> {
        self.resolver().children(path)
    }

    /// Kind of the object at `path`.
    pub fn kind_of(&self, path: &str) -> ObjectKind {
        self.resolver().kind_of(path)
    }

    /// Check if `path` is a dataset.
    pub fn is_dataset(&self, path: &str) -> bool {
        self.datasets().is_dataset(path)
    }

    /// Check if `path` is a group.
    pub fn is_group(&self, path: &str) -> bool {
        self.resolver().is_group(path)
    }

    /// Check if the object at `path` has any attributes.
    pub fn has_attributes(&self, path: &str) -> bool {
        self.resolver().has_attributes(path)
    }

    /// Check if the object at `path` has attribute `name`.
    pub fn has_attribute(&self, path: &str, name: &str) -> bool {
        self.resolver().has_attribute(path, name)
    }

    /// Every dataset path in the file, relative to the root.
    pub fn all_datasets(&self) -> Vec<String> {
        self.resolver().all_datasets()
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Logical type of attribute `name` of the object at `path`.
    pub fn attribute_type(&self, path: &str, name: &str) -> DataType {
        self.attributes().type_of(path, name)
    }

    /// Read attribute `name` of the object at `path`.
    pub fn attribute<T: AttributeValue>(&self, path: &str, name: &str) -> Result<T> {
        self.attributes().read(path, name)
    }

    /// Create or replace attribute `name` of the object at `path`.
    pub fn set_attribute<T: AttributeValue>(&self, path: &str, name: &str, value: T) -> Result<()> {
        self.attributes().write(path, name, &value)
    }

    /// Create or replace a fixed-length string attribute.
    pub fn set_fixed_string_attribute(&self, path: &str, name: &str, value: &str) -> Result<()> {
        self.attributes().write_fixed_string(path, name, value)
    }

    // ------------------------------------------------------------------
    // Datasets
    // ------------------------------------------------------------------

    /// Element type of the dataset at `path`.
    pub fn data_type(&self, path: &str) -> DataType {
        self.datasets().element_type(path)
    }

    /// Extents of the dataset at `path`.
    pub fn dimensions(&self, path: &str) -> Result<Vec<usize>> {
        self.datasets().dimensions(path)
    }

    /// Rank of the dataset at `path`.
    pub fn dimension_count(&self, path: &str) -> Result<usize> {
        self.datasets().rank(path)
    }

    /// Read a rank-1 dataset.
    pub fn read_data<T: Element>(&self, path: &str) -> Result<Vec<T>> {
        self.datasets().read_1d(path)
    }

    /// Read a rank-2 dataset as rows.
    pub fn read_data_2d<T: Element>(&self, path: &str) -> Result<Vec<Vec<T>>> {
        self.datasets().read_2d(path)
    }

    /// Read a dataset of any rank as a flat buffer plus its shape.
    pub fn read_data_flat<T: Element>(&self, path: &str) -> Result<(Vec<T>, Vec<usize>)> {
        self.datasets().read_flat(path)
    }

    /// Read a dataset into caller storage, returning its shape.
    pub fn read_data_into<T: Element>(&self, path: &str, out: &mut [T]) -> Result<Vec<usize>> {
        self.datasets().read_into(path, out)
    }

    /// Read a dataset whose element type is decided at run time.
    pub fn read_values(&self, path: &str) -> Result<(DatasetValues, Vec<usize>)> {
        self.datasets().read_values(path)
    }

    /// Create dataset `name` in the group at `path` and write `data`.
    pub fn write_data<T: Element>(
        &self,
        path: &str,
        name: &str,
        dims: &[usize],
        data: &[T],
    ) -> Result<()> {
        self.datasets().write(path, name, dims, data)
    }
}

impl<L: NativeLibrary> Drop for Container<L> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close container");
        }
    }
}

impl<L: NativeLibrary> std::fmt::Debug for Container<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::native::{FileStore, MemoryLibrary};

    #[test]
    fn test_open_missing_file_is_invalid() {
        let container = Container::open_with(MemoryLibrary::new(), "absent.h5", OpenMode::ReadOnly);
        assert!(!container.is_valid());
        assert_eq!(container.kind_of("/"), ObjectKind::NotFound);
        assert_eq!(
            container.children("/").unwrap_err().kind(),
            ErrorKind::NotOpen
        );
        assert_eq!(container.data_type("/x"), DataType::None);
        assert!(container.all_datasets().is_empty());
        assert_eq!(container.library().open_handle_count(), 0);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut container = Container::open_with(MemoryLibrary::new(), "c.h5", OpenMode::WriteOnly);
        assert!(container.is_valid());
        container.close().unwrap();
        container.close().unwrap();
        assert!(!container.is_valid());
        assert_eq!(container.library().open_handle_count(), 0);
    }

    #[test]
    fn test_modes() {
        let store = FileStore::new();
        let open = |mode| Container::open_with(MemoryLibrary::sharing(&store), "modes.h5", mode);
        {
            let container = open(OpenMode::WriteOnly);
            container.create_group("/g").unwrap();
        }

        let reader = open(OpenMode::ReadOnly);
        assert!(reader.is_group("/g"));
        let err = reader.create_group("/h").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        drop(reader);

        let editor = open(OpenMode::ReadWrite);
        editor.create_group("/g/inner").unwrap();
        editor.flush().unwrap();
        assert_eq!(editor.children("/g").unwrap(), ["inner"]);
        assert!(open(OpenMode::ReadOnly).is_group("/g/inner"));
        assert!(OpenMode::ReadWrite.is_writable());
        assert!(!OpenMode::ReadOnly.is_writable());
    }
}
