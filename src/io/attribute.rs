// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Attribute access.
//!
//! Attributes are small named values attached to a group or dataset. Reads
//! verify the stored type against the requested one before any transfer,
//! and hold exactly one element; strings may be stored fixed-length or
//! variable-length and are told apart in one place,
//! [`String::read_value`](AttributeValue::read_value).
//!
//! Writes never leave a half-written attribute behind: the new value is
//! stored under a staging name first and only renamed over the old one once
//! the transfer has succeeded.

use tracing::debug;

use crate::core::{logical_of, AccessError, DataType, Element, Result};
use crate::native::{
    is_valid_hid, Hid, NativeError, NativeLibrary, ObjectType, ScopedHandle, StringSize,
    TypeClass,
};

use super::{join_path, logged, new_space, open_dataset, open_group, string_type};

/// Prefix of the attribute a new value is written to before it replaces
/// the current one.
const STAGING_PREFIX: &str = ".~";

/// A value that can be stored as an attribute.
///
/// Implemented for every [`Element`] type and for `String`.
pub trait AttributeValue: Sized {
    /// Logical type the value is stored as.
    const DATA_TYPE: DataType;

    /// Check that a stored type can be read as `Self`.
    ///
    /// `target` names the attribute in errors.
    fn check_type<L: NativeLibrary>(lib: &L, stored: Hid, target: &str) -> Result<()>;

    /// Read the value of the open attribute `attr`, whose stored type
    /// passed [`AttributeValue::check_type`].
    fn read_value<L: NativeLibrary>(
        lib: &L,
        attr: Hid,
        stored: Hid,
        target: &str,
    ) -> Result<Self>;

    /// Create attribute `name` on the open group or dataset `object` and
    /// store this value in it.
    fn write_value<L: NativeLibrary>(
        &self,
        lib: &L,
        object: Hid,
        name: &str,
        target: &str,
    ) -> Result<()>;
}

impl<T: Element> AttributeValue for T {
    const DATA_TYPE: DataType = <T as Element>::DATA_TYPE;

    fn check_type<L: NativeLibrary>(lib: &L, stored: Hid, target: &str) -> Result<()> {
        let (on_disk, _) = native_types(lib, <T as Element>::DATA_TYPE, target)?;
        if matches!(lib.type_equal(on_disk, stored), Ok(true)) {
            return Ok(());
        }
        debug!(
            path = target,
            stored,
            requested = on_disk,
            "attribute type ids differ"
        );
        Err(logged(AccessError::type_mismatch(
            target,
            <T as Element>::DATA_TYPE,
            logical_of(lib, stored),
        )))
    }

    fn read_value<L: NativeLibrary>(
        lib: &L,
        attr: Hid,
        _stored: Hid,
        target: &str,
    ) -> Result<Self> {
        let (_, memory) = native_types(lib, <T as Element>::DATA_TYPE, target)?;
        let mut value = T::default();
        lib.attr_read(attr, memory, bytemuck::bytes_of_mut(&mut value))
            .map_err(|e| logged(AccessError::io_failure("read attribute", target, e.to_string())))?;
        Ok(value)
    }

    fn write_value<L: NativeLibrary>(
        &self,
        lib: &L,
        object: Hid,
        name: &str,
        target: &str,
    ) -> Result<()> {
        let (on_disk, memory) = native_types(lib, <T as Element>::DATA_TYPE, target)?;
        let space = new_space(lib, &[1]);
        let attr = create_attribute(lib, object, name, on_disk, &space, target)?;
        lib.attr_write(attr.value(), memory, bytemuck::bytes_of(self))
            .map_err(|e| logged(AccessError::io_failure("write attribute", target, e.to_string())))
    }
}

impl AttributeValue for String {
    const DATA_TYPE: DataType = DataType::String;

    fn check_type<L: NativeLibrary>(lib: &L, stored: Hid, target: &str) -> Result<()> {
        if matches!(lib.type_class(stored), Ok(TypeClass::String)) {
            return Ok(());
        }
        Err(logged(AccessError::type_mismatch(
            target,
            DataType::String,
            logical_of(lib, stored),
        )))
    }

    fn read_value<L: NativeLibrary>(
        lib: &L,
        attr: Hid,
        stored: Hid,
        target: &str,
    ) -> Result<Self> {
        let read_failed = |e: NativeError| {
            logged(AccessError::io_failure("read attribute", target, e.to_string()))
        };

        if lib.type_is_variable_str(stored).map_err(read_failed)? {
            let buffer =
                ScopedHandle::new(lib, lib.attr_read_vlen(attr, stored), L::vlen_reclaim);
            if !buffer.valid() {
                return Err(logged(AccessError::io_failure(
                    "read attribute",
                    target,
                    "variable-length read failed",
                )));
            }
            let bytes = lib.vlen_copy(buffer.value()).map_err(read_failed)?;
            return Ok(String::from_utf8_lossy(&bytes).into_owned());
        }

        let size = lib.type_size(stored).map_err(read_failed)?;
        if size == 0 {
            return Err(AccessError::io_failure(
                "read attribute",
                target,
                "fixed-length string has size 0",
            ));
        }
        // Stored strings carry no terminator; the extra byte holds one.
        let mut scratch = vec![0u8; size + 1];
        lib.attr_read(attr, stored, &mut scratch[..size]).map_err(read_failed)?;
        let end = scratch.iter().position(|&b| b == 0).unwrap_or(size);
        Ok(String::from_utf8_lossy(&scratch[..end]).into_owned())
    }

    fn write_value<L: NativeLibrary>(
        &self,
        lib: &L,
        object: Hid,
        name: &str,
        target: &str,
    ) -> Result<()> {
        let ty = sized_string_type(lib, StringSize::Variable, target)?;
        let space = new_space(lib, &[1]);
        let attr = create_attribute(lib, object, name, ty.value(), &space, target)?;
        lib.attr_write(attr.value(), ty.value(), self.as_bytes())
            .map_err(|e| logged(AccessError::io_failure("write attribute", target, e.to_string())))
    }
}

/// Predefined on-disk and in-memory type ids of a logical type.
fn native_types<L: NativeLibrary>(
    lib: &L,
    data_type: DataType,
    target: &str,
) -> Result<(Hid, Hid)> {
    match (data_type.on_disk_type(), data_type.memory_type()) {
        (Some(on_disk), Some(memory)) => Ok((lib.predefined(on_disk), lib.predefined(memory))),
        _ => Err(AccessError::unsupported_type(target)),
    }
}

fn sized_string_type<'a, L: NativeLibrary>(
    lib: &'a L,
    size: StringSize,
    target: &str,
) -> Result<ScopedHandle<'a, L>> {
    let ty = string_type(lib);
    if !ty.valid() {
        return Err(AccessError::io_failure(
            "create string type",
            target,
            "type copy failed",
        ));
    }
    lib.type_set_size(ty.value(), size)
        .map_err(|e| AccessError::io_failure("create string type", target, e.to_string()))?;
    Ok(ty)
}

fn create_attribute<'a, L: NativeLibrary>(
    lib: &'a L,
    object: Hid,
    name: &str,
    file_type: Hid,
    space: &ScopedHandle<'a, L>,
    target: &str,
) -> Result<ScopedHandle<'a, L>> {
    if !space.valid() {
        return Err(AccessError::io_failure(
            "create attribute",
            target,
            "dataspace creation failed",
        ));
    }
    let attr = ScopedHandle::new(
        lib,
        lib.attr_create(object, name, file_type, space.value()),
        L::attr_close,
    );
    if !attr.valid() {
        return Err(logged(AccessError::io_failure(
            "create attribute",
            target,
            "native create failed",
        )));
    }
    Ok(attr)
}

/// Reads and writes attributes of objects in an open container.
pub struct AttributeAccessor<'a, L> {
    lib: &'a L,
    root: Hid,
}

impl<'a, L: NativeLibrary> AttributeAccessor<'a, L> {
    /// Create an accessor for the file handle `root`.
    pub fn new(lib: &'a L, root: Hid) -> Self {
        Self { lib, root }
    }

    /// Read attribute `name` of the object at `path`.
    ///
    /// # Errors
    ///
    /// - `NotOpen` if the container is not open
    /// - `NotFound` if the object or the attribute does not exist
    /// - `TypeMismatch` if the stored type is not `T`'s type
    /// - `ShapeMismatch` if the attribute does not hold exactly one value
    /// - `IoFailure` if the transfer fails
    pub fn read<T: AttributeValue>(&self, path: &str, name: &str) -> Result<T> {
        if !is_valid_hid(self.root) {
            return Err(AccessError::not_open(path));
        }
        if !self.exists(self.root, path, name) {
            return Err(logged(AccessError::not_found(path, name)));
        }
        let target = join_path(path, name);

        let attr = ScopedHandle::new(
            self.lib,
            self.lib.attr_open_by_name(self.root, path, name),
            L::attr_close,
        );
        if !attr.valid() {
            return Err(AccessError::not_open(target));
        }
        let stored = self.stored_type(attr.value());
        if !stored.valid() {
            return Err(AccessError::io_failure("read attribute", &target, "cannot query type"));
        }

        T::check_type(self.lib, stored.value(), &target)?;
        self.ensure_single_value(attr.value(), &target)?;
        T::read_value(self.lib, attr.value(), stored.value(), &target)
    }

    /// Logical type of attribute `name`, or `DataType::None` if it does not
    /// exist or has no logical counterpart.
    pub fn type_of(&self, path: &str, name: &str) -> DataType {
        if !is_valid_hid(self.root) || !self.exists(self.root, path, name) {
            return DataType::None;
        }
        let attr = ScopedHandle::new(
            self.lib,
            self.lib.attr_open_by_name(self.root, path, name),
            L::attr_close,
        );
        let stored = self.stored_type(attr.value());
        if !stored.valid() {
            return DataType::None;
        }
        match self.lib.type_class(stored.value()) {
            Ok(TypeClass::String) => DataType::String,
            _ => logical_of(self.lib, stored.value()),
        }
    }

    /// Store `value` as attribute `name` of the group or dataset at `path`,
    /// replacing any existing attribute of that name.
    ///
    /// Strings are stored variable-length. If the write fails, an existing
    /// attribute keeps its old value.
    pub fn write<T: AttributeValue>(&self, path: &str, name: &str, value: &T) -> Result<()> {
        let target = join_path(path, name);
        let object = self.open_owner(path)?;
        self.replace(object.value(), name, &target, |staging| {
            value.write_value(self.lib, object.value(), staging, &target)
        })
    }

    /// Store `value` as a fixed-length string attribute sized to the
    /// value's byte length.
    pub fn write_fixed_string(&self, path: &str, name: &str, value: &str) -> Result<()> {
        let target = join_path(path, name);
        let object = self.open_owner(path)?;

        let mut bytes = value.as_bytes().to_vec();
        if bytes.is_empty() {
            bytes.push(0);
        }
        let owner = object.value();
        self.replace(owner, name, &target, |staging| {
            let ty = sized_string_type(self.lib, StringSize::Fixed(bytes.len()), &target)?;
            let space = new_space(self.lib, &[1]);
            let attr = create_attribute(self.lib, owner, staging, ty.value(), &space, &target)?;
            self.lib.attr_write(attr.value(), ty.value(), &bytes).map_err(|e| {
                logged(AccessError::io_failure("write attribute", &target, e.to_string()))
            })
        })
    }

    /// Open the group or dataset at `path` that an attribute is written to.
    fn open_owner(&self, path: &str) -> Result<ScopedHandle<'a, L>> {
        if !is_valid_hid(self.root) {
            return Err(AccessError::not_open(path));
        }
        let object = match self.lib.object_info(self.root, path).map(|i| i.object_type) {
            Ok(ObjectType::Dataset) => open_dataset(self.lib, self.root, path),
            Ok(ObjectType::Group) => open_group(self.lib, self.root, path),
            _ => return Err(logged(AccessError::not_open(path))),
        };
        if !object.valid() {
            return Err(logged(AccessError::not_open(path)));
        }
        Ok(object)
    }

    /// Run `write` against a staging attribute on `object`, then swap it in
    /// for attribute `name`. On failure the staging attribute is removed
    /// and `name` is left as it was.
    fn replace(
        &self,
        object: Hid,
        name: &str,
        target: &str,
        write: impl FnOnce(&str) -> Result<()>,
    ) -> Result<()> {
        let staging = format!("{STAGING_PREFIX}{name}");
        let replace_failed = |e: NativeError| {
            logged(AccessError::io_failure("replace attribute", target, e.to_string()))
        };

        if self.exists(object, ".", &staging) {
            self.lib.attr_delete(object, &staging).map_err(replace_failed)?;
        }
        if let Err(err) = write(&staging) {
            if self.exists(object, ".", &staging) {
                if let Err(e) = self.lib.attr_delete(object, &staging) {
                    debug!(path = target, error = %e, "cannot remove staging attribute");
                }
            }
            return Err(err);
        }
        if self.exists(object, ".", name) {
            self.lib.attr_delete(object, name).map_err(replace_failed)?;
        }
        self.lib.attr_rename(object, &staging, name).map_err(replace_failed)
    }

    fn exists(&self, loc: Hid, path: &str, name: &str) -> bool {
        matches!(self.lib.attr_exists_by_name(loc, path, name), Ok(true))
    }

    fn stored_type(&self, attr: Hid) -> ScopedHandle<'a, L> {
        ScopedHandle::new(self.lib, self.lib.attr_get_type(attr), L::type_close)
    }

    fn ensure_single_value(&self, attr: Hid, target: &str) -> Result<()> {
        let query_failed =
            |e: NativeError| AccessError::io_failure("read attribute", target, e.to_string());

        let space = ScopedHandle::new(self.lib, self.lib.attr_get_space(attr), L::space_close);
        if !space.valid() {
            return Err(AccessError::io_failure(
                "read attribute",
                target,
                "cannot query dataspace",
            ));
        }
        let rank = self.lib.space_ndims(space.value()).map_err(query_failed)?;
        let mut dims = vec![0u64; rank];
        self.lib.space_dims(space.value(), &mut dims).map_err(query_failed)?;

        match dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d)) {
            Some(1) => Ok(()),
            Some(count) => Err(AccessError::shape_mismatch(
                target,
                "1 element",
                format!("{count} elements"),
            )),
            None => Err(AccessError::shape_mismatch(target, "1 element", "overflowing extent")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use std::path::Path;

    use crate::native::{FaultInjection, MemoryLibrary, PredefinedType};

    fn setup(lib: &MemoryLibrary) -> Hid {
        let file = lib.file_create(Path::new("/scratch/attrs.h5"));
        lib.group_close(lib.group_create(file, "/g")).unwrap();
        let space = lib.space_create_simple(&[3]);
        let ds = lib.dataset_create(file, "/g/d", lib.predefined(PredefinedType::StdU8Le), space);
        // Three-element attribute on the dataset.
        let i32_le = lib.predefined(PredefinedType::StdI32Le);
        let attr = lib.attr_create(ds, "triple", i32_le, space);
        lib.attr_close(attr).unwrap();
        lib.dataset_close(ds).unwrap();
        lib.space_close(space).unwrap();
        file
    }

    #[test]
    fn test_numeric_round_trip() {
        let lib = MemoryLibrary::new();
        let file = setup(&lib);
        let attrs = AttributeAccessor::new(&lib, file);

        attrs.write("/g", "count", &42i32).unwrap();
        attrs.write("/g/d", "scale", &0.25f64).unwrap();
        assert_eq!(attrs.read::<i32>("/g", "count").unwrap(), 42);
        assert_eq!(attrs.read::<f64>("/g/d", "scale").unwrap(), 0.25);
        assert_eq!(attrs.type_of("/g", "count"), DataType::Int32);
        assert_eq!(attrs.type_of("/g/d", "scale"), DataType::Float64);

        assert_eq!(lib.open_handle_count(), 1);
        lib.file_close(file).unwrap();
    }

    #[test]
    fn test_overwrite_changes_type() {
        let lib = MemoryLibrary::new();
        let file = setup(&lib);
        let attrs = AttributeAccessor::new(&lib, file);

        attrs.write("/g", "v", &1u8).unwrap();
        attrs.write("/g", "v", &"text".to_string()).unwrap();
        assert_eq!(attrs.type_of("/g", "v"), DataType::String);
        assert_eq!(attrs.read::<String>("/g", "v").unwrap(), "text");
        lib.file_close(file).unwrap();
    }

    #[test]
    fn test_string_storage_forms() {
        let lib = MemoryLibrary::new();
        let file = setup(&lib);
        let attrs = AttributeAccessor::new(&lib, file);

        attrs.write("/g", "vlen", &"angles".to_string()).unwrap();
        attrs.write_fixed_string("/g", "fixed", "[deg]").unwrap();
        attrs.write_fixed_string("/g", "empty", "").unwrap();
        assert_eq!(attrs.read::<String>("/g", "vlen").unwrap(), "angles");
        assert_eq!(attrs.read::<String>("/g", "fixed").unwrap(), "[deg]");
        assert_eq!(attrs.read::<String>("/g", "empty").unwrap(), "");
        assert_eq!(lib.outstanding_vlen_count(), 0);
        lib.file_close(file).unwrap();
    }

    #[test]
    fn test_read_errors() {
        let lib = MemoryLibrary::new();
        let file = setup(&lib);
        let attrs = AttributeAccessor::new(&lib, file);
        attrs.write("/g", "count", &7u16).unwrap();

        let err = attrs.read::<i32>("/missing", "count").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = attrs.read::<i32>("/g", "missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = attrs.read::<u32>("/g", "count").unwrap_err();
        assert_eq!(
            err,
            AccessError::type_mismatch("/g/count", DataType::UInt32, DataType::UInt16)
        );
        let err = attrs.read::<String>("/g", "count").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = attrs.read::<i32>("/g/d", "triple").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
        assert_eq!(attrs.type_of("/g", "missing"), DataType::None);

        assert_eq!(lib.open_handle_count(), 1);
        lib.file_close(file).unwrap();
    }

    #[test]
    fn test_write_to_missing_object() {
        let lib = MemoryLibrary::new();
        let file = setup(&lib);
        let attrs = AttributeAccessor::new(&lib, file);
        let err = attrs.write("/nowhere", "x", &1i8).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotOpen);
        assert_eq!(lib.open_handle_count(), 1);
        lib.file_close(file).unwrap();
    }

    #[test]
    fn test_failed_replace_keeps_old_value() {
        let lib = MemoryLibrary::new();
        let file = setup(&lib);
        let attrs = AttributeAccessor::new(&lib, file);
        attrs.write_fixed_string("/g", "units", "[deg]").unwrap();
        attrs.write("/g", "count", &3u32).unwrap();

        lib.set_faults(FaultInjection {
            fail_transfers: true,
            ..Default::default()
        });
        let err = attrs.write("/g", "units", &"[rad]".to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        let err = attrs.write_fixed_string("/g", "units", "[rad]").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert!(attrs.write("/g", "count", &4u32).is_err());
        lib.set_faults(FaultInjection::default());

        assert_eq!(attrs.read::<String>("/g", "units").unwrap(), "[deg]");
        assert_eq!(attrs.read::<u32>("/g", "count").unwrap(), 3);
        assert_eq!(lib.object_info(file, "/g").unwrap().num_attrs, 2);
        assert!(!lib.attr_exists_by_name(file, "/g", ".~units").unwrap());
        assert_eq!(lib.open_handle_count(), 1);
        lib.file_close(file).unwrap();
    }

    #[test]
    fn test_replace_clears_stale_staging_attribute() {
        let lib = MemoryLibrary::new();
        let file = setup(&lib);
        let attrs = AttributeAccessor::new(&lib, file);
        attrs.write("/g", ".~v", &9i64).unwrap();

        attrs.write("/g", "v", &1i64).unwrap();
        assert_eq!(attrs.read::<i64>("/g", "v").unwrap(), 1);
        assert_eq!(attrs.type_of("/g", ".~v"), DataType::None);
        lib.file_close(file).unwrap();
    }

    #[test]
    fn test_unrecognized_attribute_type() {
        let lib = MemoryLibrary::new();
        let file = setup(&lib);
        let space = lib.space_create_simple(&[1]);
        let opaque = lib.opaque_type(4);
        let group = lib.group_open(file, "/g");
        lib.attr_close(lib.attr_create(group, "blob", opaque, space)).unwrap();
        lib.group_close(group).unwrap();
        lib.type_close(opaque).unwrap();
        lib.space_close(space).unwrap();

        let attrs = AttributeAccessor::new(&lib, file);
        assert_eq!(attrs.type_of("/g", "blob"), DataType::None);
        let err = attrs.read::<i32>("/g", "blob").unwrap_err();
        assert_eq!(
            err,
            AccessError::type_mismatch("/g/blob", DataType::Int32, DataType::None)
        );
        let err = attrs.read::<String>("/g", "blob").unwrap_err();
        assert_eq!(
            err,
            AccessError::type_mismatch("/g/blob", DataType::String, DataType::None)
        );
        assert_eq!(lib.open_handle_count(), 1);
        lib.file_close(file).unwrap();
    }
}
