// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! [`NativeLibrary`] over the HDF5 C library.
//!
//! Every trait call maps onto one or a few calls of the HDF5 C API (1.10 or
//! newer, linked through `hdf5-sys`). Identifiers are passed through
//! unchanged, so a [`Hid`] from this library is a real `hid_t`. The one
//! exception is variable-length string buffers: HDF5 hands those out as raw
//! pointers, which the library keeps in a table under its own identifiers
//! until [`NativeLibrary::vlen_reclaim`] gives them back.
//!
//! HDF5's automatic error printing is switched off on first use. Failures
//! surface as [`INVALID_HID`] or [`NativeError`] and are logged at debug
//! level.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::{c_char, c_int, CStr, CString};
use std::mem::MaybeUninit;
use std::path::Path;
use std::ptr;
use std::sync::Once;

use hdf5_sys::h5::{herr_t, hsize_t, htri_t, H5_index_t, H5_iter_order_t, H5open};
use hdf5_sys::h5a::{
    H5Aclose, H5Acreate2, H5Adelete, H5Aexists_by_name, H5Aget_name_by_idx, H5Aget_space,
    H5Aget_type, H5Aopen_by_name, H5Aread, H5Arename, H5Awrite,
};
use hdf5_sys::h5d::{
    H5Dclose, H5Dcreate2, H5Dget_space, H5Dget_type, H5Dopen2, H5Dread, H5Dvlen_reclaim, H5Dwrite,
};
use hdf5_sys::h5e::{H5Eset_auto2, H5E_DEFAULT};
use hdf5_sys::h5f::{
    H5F_scope_t, H5Fclose, H5Fcreate, H5Fflush, H5Fopen, H5F_ACC_RDONLY, H5F_ACC_RDWR,
    H5F_ACC_TRUNC,
};
use hdf5_sys::h5g::{H5G_info_t, H5Gclose, H5Gcreate2, H5Gget_info, H5Gopen2};
use hdf5_sys::h5i::{H5I_type_t, H5Iget_type};
use hdf5_sys::h5l::H5Lget_name_by_idx;
use hdf5_sys::h5o::{H5Oclose, H5Oopen};
use hdf5_sys::h5p::H5P_DEFAULT;
use hdf5_sys::h5s::{
    H5S_class_t, H5Sclose, H5Screate, H5Screate_simple, H5Sget_simple_extent_dims,
    H5Sget_simple_extent_ndims, H5Sget_simple_extent_npoints, H5S_ALL,
};
use hdf5_sys::h5t::{
    H5T_class_t, H5Tclose, H5Tcopy, H5Tequal, H5Tget_class, H5Tget_size, H5Tis_variable_str,
    H5Tset_size, H5T_VARIABLE,
};
use tracing::debug;

use super::{
    FileAccess, Hid, NativeError, NativeLibrary, NativeResult, ObjectInfo, ObjectType,
    PredefinedType, ScopedHandle, StringSize, TypeClass, INVALID_HID,
};

/// Deepest group nesting [`NativeLibrary::visit`] descends into. Links can
/// form cycles, so the walk needs a bound.
const MAX_VISIT_DEPTH: usize = 64;

/// `"."`, the location itself.
const HERE: &[u8] = b".\0";

static INIT: Once = Once::new();

fn init() {
    INIT.call_once(|| {
        // SAFETY: neither call borrows Rust memory; a null client pointer
        // with no callback disables automatic error printing.
        unsafe {
            H5open();
            H5Eset_auto2(H5E_DEFAULT, None, ptr::null_mut());
        }
    });
}

fn predefined_id(ty: PredefinedType) -> Hid {
    use hdf5_sys::h5t::*;

    // SAFETY: `init` has run H5open, which sets the predefined type globals.
    unsafe {
        match ty {
            PredefinedType::StdI8Le => *H5T_STD_I8LE,
            PredefinedType::StdI16Le => *H5T_STD_I16LE,
            PredefinedType::StdI32Le => *H5T_STD_I32LE,
            PredefinedType::StdI64Le => *H5T_STD_I64LE,
            PredefinedType::StdU8Le => *H5T_STD_U8LE,
            PredefinedType::StdU16Le => *H5T_STD_U16LE,
            PredefinedType::StdU32Le => *H5T_STD_U32LE,
            PredefinedType::StdU64Le => *H5T_STD_U64LE,
            PredefinedType::IeeeF32Le => *H5T_IEEE_F32LE,
            PredefinedType::IeeeF64Le => *H5T_IEEE_F64LE,
            PredefinedType::NativeI8 => *H5T_NATIVE_INT8,
            PredefinedType::NativeI16 => *H5T_NATIVE_INT16,
            PredefinedType::NativeI32 => *H5T_NATIVE_INT32,
            PredefinedType::NativeI64 => *H5T_NATIVE_INT64,
            PredefinedType::NativeU8 => *H5T_NATIVE_UINT8,
            PredefinedType::NativeU16 => *H5T_NATIVE_UINT16,
            PredefinedType::NativeU32 => *H5T_NATIVE_UINT32,
            PredefinedType::NativeU64 => *H5T_NATIVE_UINT64,
            PredefinedType::NativeFloat => *H5T_NATIVE_FLOAT,
            PredefinedType::NativeDouble => *H5T_NATIVE_DOUBLE,
            PredefinedType::CString => *H5T_C_S1,
        }
    }
}

fn c_text(op: &'static str, text: &str) -> NativeResult<CString> {
    CString::new(text).map_err(|_| NativeError::new(op, format!("'{text}' contains a NUL byte")))
}

fn check(op: &'static str, code: herr_t) -> NativeResult<()> {
    if code < 0 {
        return Err(NativeError::new(op, format!("HDF5 call returned {code}")));
    }
    Ok(())
}

fn truth(op: &'static str, code: htri_t) -> NativeResult<bool> {
    if code < 0 {
        return Err(NativeError::new(op, format!("HDF5 call returned {code}")));
    }
    Ok(code > 0)
}

/// Run a handle-producing call, logging failure.
fn issue(op: &'static str, f: impl FnOnce() -> NativeResult<Hid>) -> Hid {
    match f() {
        Ok(hid) if hid >= 0 => hid,
        Ok(_) => {
            debug!(
                context = "hdf5_library",
                operation = op,
                "native call failed"
            );
            INVALID_HID
        }
        Err(e) => {
            debug!(
                context = "hdf5_library",
                operation = op,
                error = %e,
                "native call failed"
            );
            INVALID_HID
        }
    }
}

/// Path in the form HDF5 expects: empty and `.` segments dropped, the
/// location itself spelled `.` (or `/` for an absolute path).
fn object_path(path: &str) -> String {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    match (path.starts_with('/'), parts.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => ".".to_string(),
        (true, false) => format!("/{}", parts.join("/")),
        (false, false) => parts.join("/"),
    }
}

/// A variable-length string read out of an attribute, owned by HDF5.
struct VlenBuffer {
    data: *mut c_char,
    mem_type: Hid,
}

#[derive(Default)]
struct VlenTable {
    buffers: HashMap<Hid, VlenBuffer>,
    next_hid: Hid,
}

/// [`NativeLibrary`] backed by the HDF5 C library.
///
/// Not thread-safe: HDF5 builds without the thread-safety option must not be
/// entered from two threads at once, and this type does not serialize calls.
pub struct Hdf5Library {
    predefined: [Hid; PredefinedType::ALL.len()],
    vlen: RefCell<VlenTable>,
}

impl Default for Hdf5Library {
    fn default() -> Self {
        Self::new()
    }
}

impl Hdf5Library {
    /// Initialize HDF5 (once per process) and look up the predefined types.
    pub fn new() -> Self {
        init();
        Self {
            predefined: PredefinedType::ALL.map(predefined_id),
            vlen: RefCell::new(VlenTable::default()),
        }
    }

    /// Number of variable-length buffers not yet reclaimed.
    pub fn outstanding_vlen_count(&self) -> usize {
        self.vlen.borrow().buffers.len()
    }

    fn attribute_count(&self, object: Hid) -> usize {
        let mut count = 0;
        loop {
            // SAFETY: a null buffer of size 0 only queries the name length.
            let len = unsafe {
                H5Aget_name_by_idx(
                    object,
                    HERE.as_ptr().cast(),
                    H5_index_t::H5_INDEX_NAME,
                    H5_iter_order_t::H5_ITER_INC,
                    count as hsize_t,
                    ptr::null_mut(),
                    0,
                    H5P_DEFAULT,
                )
            };
            if len < 0 {
                return count;
            }
            count += 1;
        }
    }

    /// Number of elements in the dataspace held by `space`.
    fn points(op: &'static str, space: &ScopedHandle<'_, Self>) -> NativeResult<usize> {
        if !space.valid() {
            return Err(NativeError::new(op, "cannot query dataspace"));
        }
        // SAFETY: `space` is an open dataspace.
        let points = unsafe { H5Sget_simple_extent_npoints(space.value()) };
        usize::try_from(points).map_err(|_| NativeError::new(op, "cannot count elements"))
    }

    /// Check that `len` bytes hold every element of `space` as `mem_type`.
    fn check_buffer(
        op: &'static str,
        space: &ScopedHandle<'_, Self>,
        mem_type: Hid,
        len: usize,
    ) -> NativeResult<()> {
        let points = Self::points(op, space)?;
        // SAFETY: plain query; an invalid identifier yields 0.
        let size = unsafe { H5Tget_size(mem_type) };
        if size == 0 {
            return Err(NativeError::new(op, "cannot size memory type"));
        }
        match points.checked_mul(size) {
            Some(needed) if needed == len => Ok(()),
            Some(needed) => Err(NativeError::new(
                op,
                format!("buffer holds {len} bytes, {needed} required"),
            )),
            None => Err(NativeError::new(op, "transfer size overflows")),
        }
    }

    fn check_single(op: &'static str, space: &ScopedHandle<'_, Self>) -> NativeResult<()> {
        match Self::points(op, space)? {
            1 => Ok(()),
            n => Err(NativeError::new(
                op,
                format!("variable-length transfer of {n} elements"),
            )),
        }
    }

    fn release(buffer: VlenBuffer) -> NativeResult<()> {
        let op = "vlen_reclaim";
        let mut data = buffer.data;
        // SAFETY: H5S_SCALAR needs no further arguments.
        let space = unsafe { H5Screate(H5S_class_t::H5S_SCALAR) };
        let reclaimed = if space < 0 {
            Err(NativeError::new(op, "cannot create dataspace"))
        } else {
            // SAFETY: `data` was filled by H5Aread for one element of
            // `mem_type` over a scalar space, and is reclaimed only once.
            #[allow(deprecated)]
            let code = unsafe {
                H5Dvlen_reclaim(
                    buffer.mem_type,
                    space,
                    H5P_DEFAULT,
                    (&mut data as *mut *mut c_char).cast(),
                )
            };
            // SAFETY: `space` was created above.
            unsafe { H5Sclose(space) };
            check(op, code)
        };
        // SAFETY: `mem_type` is the copy taken when the buffer was read.
        let closed = check(op, unsafe { H5Tclose(buffer.mem_type) });
        reclaimed.and(closed)
    }
}

impl Drop for Hdf5Library {
    fn drop(&mut self) {
        let buffers = std::mem::take(&mut self.vlen.get_mut().buffers);
        for (hid, buffer) in buffers {
            if let Err(e) = Self::release(buffer) {
                debug!(handle = hid, error = %e, "failed to reclaim string buffer");
            }
        }
    }
}

// SAFETY notes for the trait impl: every pointer handed to HDF5 is either a
// NUL-terminated `CString` alive for the call, or a Rust buffer whose length
// was checked against the transfer size first. Identifiers need no safety
// argument; HDF5 validates them and fails the call.
impl NativeLibrary for Hdf5Library {
    fn predefined(&self, ty: PredefinedType) -> Hid {
        self.predefined[ty.index()]
    }

    fn file_open(&self, path: &Path, access: FileAccess) -> Hid {
        issue("file_open", || {
            let name = path
                .to_str()
                .ok_or_else(|| NativeError::new("file_open", "path is not valid UTF-8"))?;
            let name = c_text("file_open", name)?;
            let flags = match access {
                FileAccess::ReadOnly => H5F_ACC_RDONLY,
                FileAccess::ReadWrite => H5F_ACC_RDWR,
            };
            Ok(unsafe { H5Fopen(name.as_ptr(), flags, H5P_DEFAULT) })
        })
    }

    fn file_create(&self, path: &Path) -> Hid {
        issue("file_create", || {
            let name = path
                .to_str()
                .ok_or_else(|| NativeError::new("file_create", "path is not valid UTF-8"))?;
            let name = c_text("file_create", name)?;
            Ok(unsafe { H5Fcreate(name.as_ptr(), H5F_ACC_TRUNC, H5P_DEFAULT, H5P_DEFAULT) })
        })
    }

    fn file_flush(&self, file: Hid) -> NativeResult<()> {
        check("file_flush", unsafe {
            H5Fflush(file, H5F_scope_t::H5F_SCOPE_LOCAL)
        })
    }

    fn file_close(&self, file: Hid) -> NativeResult<()> {
        check("file_close", unsafe { H5Fclose(file) })
    }

    fn object_info(&self, loc: Hid, path: &str) -> NativeResult<ObjectInfo> {
        let op = "object_info";
        let name = c_text(op, &object_path(path))?;
        let object = unsafe { H5Oopen(loc, name.as_ptr(), H5P_DEFAULT) };
        if object < 0 {
            return Err(NativeError::new(op, format!("no object at '{path}'")));
        }
        let object_type = match unsafe { H5Iget_type(object) } {
            H5I_type_t::H5I_GROUP => ObjectType::Group,
            H5I_type_t::H5I_DATASET => ObjectType::Dataset,
            _ => ObjectType::Other,
        };
        let num_attrs = self.attribute_count(object);
        check(op, unsafe { H5Oclose(object) })?;
        Ok(ObjectInfo {
            object_type,
            num_attrs,
        })
    }

    fn visit(&self, loc: Hid, visitor: &mut dyn FnMut(&str, &ObjectInfo)) -> NativeResult<()> {
        fn walk(
            lib: &Hdf5Library,
            group: Hid,
            prefix: &str,
            depth: usize,
            visitor: &mut dyn FnMut(&str, &ObjectInfo),
        ) -> NativeResult<()> {
            if depth > MAX_VISIT_DEPTH {
                return Err(NativeError::new("visit", "group nesting too deep"));
            }
            for index in 0..lib.group_num_objs(group)? {
                let name = lib.group_objname_by_idx(group, index)?;
                // Dangling soft and external links have no object to report.
                let Ok(info) = lib.object_info(group, &name) else {
                    continue;
                };
                let path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                };
                visitor(&path, &info);
                if info.object_type == ObjectType::Group {
                    let child = ScopedHandle::new(
                        lib,
                        lib.group_open(group, &name),
                        Hdf5Library::group_close,
                    );
                    if child.valid() {
                        walk(lib, child.value(), &path, depth + 1, visitor)?;
                    }
                }
            }
            Ok(())
        }

        walk(self, loc, "", 0, visitor)
    }

    fn group_open(&self, loc: Hid, path: &str) -> Hid {
        issue("group_open", || {
            let name = c_text("group_open", &object_path(path))?;
            Ok(unsafe { H5Gopen2(loc, name.as_ptr(), H5P_DEFAULT) })
        })
    }

    fn group_create(&self, loc: Hid, path: &str) -> Hid {
        issue("group_create", || {
            let name = c_text("group_create", path)?;
            Ok(unsafe { H5Gcreate2(loc, name.as_ptr(), H5P_DEFAULT, H5P_DEFAULT, H5P_DEFAULT) })
        })
    }

    fn group_num_objs(&self, group: Hid) -> NativeResult<usize> {
        let mut info = MaybeUninit::<H5G_info_t>::uninit();
        check("group_num_objs", unsafe {
            H5Gget_info(group, info.as_mut_ptr())
        })?;
        // SAFETY: H5Gget_info succeeded, so it filled `info`.
        let info = unsafe { info.assume_init() };
        usize::try_from(info.nlinks)
            .map_err(|_| NativeError::new("group_num_objs", "member count overflows"))
    }

    fn group_objname_by_idx(&self, group: Hid, index: usize) -> NativeResult<String> {
        let op = "group_objname_by_idx";
        let query = |buf: *mut c_char, size: usize| unsafe {
            H5Lget_name_by_idx(
                group,
                HERE.as_ptr().cast(),
                H5_index_t::H5_INDEX_NAME,
                H5_iter_order_t::H5_ITER_INC,
                index as hsize_t,
                buf,
                size,
                H5P_DEFAULT,
            )
        };
        let len = usize::try_from(query(ptr::null_mut(), 0))
            .map_err(|_| NativeError::new(op, format!("no member {index}")))?;
        let mut name = vec![0u8; len + 1];
        if query(name.as_mut_ptr().cast(), name.len()) < 0 {
            return Err(NativeError::new(op, format!("no member {index}")));
        }
        name.truncate(len);
        String::from_utf8(name).map_err(|_| NativeError::new(op, "member name is not UTF-8"))
    }

    fn group_close(&self, group: Hid) -> NativeResult<()> {
        check("group_close", unsafe { H5Gclose(group) })
    }

    fn dataset_open(&self, loc: Hid, path: &str) -> Hid {
        issue("dataset_open", || {
            let name = c_text("dataset_open", &object_path(path))?;
            Ok(unsafe { H5Dopen2(loc, name.as_ptr(), H5P_DEFAULT) })
        })
    }

    fn dataset_create(&self, loc: Hid, name: &str, file_type: Hid, space: Hid) -> Hid {
        issue("dataset_create", || {
            let name = c_text("dataset_create", name)?;
            Ok(unsafe {
                H5Dcreate2(
                    loc,
                    name.as_ptr(),
                    file_type,
                    space,
                    H5P_DEFAULT,
                    H5P_DEFAULT,
                    H5P_DEFAULT,
                )
            })
        })
    }

    fn dataset_get_type(&self, dataset: Hid) -> Hid {
        issue("dataset_get_type", || Ok(unsafe { H5Dget_type(dataset) }))
    }

    fn dataset_get_space(&self, dataset: Hid) -> Hid {
        issue("dataset_get_space", || Ok(unsafe { H5Dget_space(dataset) }))
    }

    fn dataset_read(&self, dataset: Hid, mem_type: Hid, buf: &mut [u8]) -> NativeResult<()> {
        let op = "dataset_read";
        let space = ScopedHandle::new(self, self.dataset_get_space(dataset), Self::space_close);
        Self::check_buffer(op, &space, mem_type, buf.len())?;
        check(op, unsafe {
            H5Dread(
                dataset,
                mem_type,
                H5S_ALL,
                H5S_ALL,
                H5P_DEFAULT,
                buf.as_mut_ptr().cast(),
            )
        })
    }

    fn dataset_write(&self, dataset: Hid, mem_type: Hid, buf: &[u8]) -> NativeResult<()> {
        let op = "dataset_write";
        let space = ScopedHandle::new(self, self.dataset_get_space(dataset), Self::space_close);
        Self::check_buffer(op, &space, mem_type, buf.len())?;
        check(op, unsafe {
            H5Dwrite(
                dataset,
                mem_type,
                H5S_ALL,
                H5S_ALL,
                H5P_DEFAULT,
                buf.as_ptr().cast(),
            )
        })
    }

    fn dataset_close(&self, dataset: Hid) -> NativeResult<()> {
        check("dataset_close", unsafe { H5Dclose(dataset) })
    }

    fn attr_exists_by_name(&self, loc: Hid, path: &str, name: &str) -> NativeResult<bool> {
        let op = "attr_exists_by_name";
        let object = c_text(op, &object_path(path))?;
        let name = c_text(op, name)?;
        truth(op, unsafe {
            H5Aexists_by_name(loc, object.as_ptr(), name.as_ptr(), H5P_DEFAULT)
        })
    }

    fn attr_open_by_name(&self, loc: Hid, path: &str, name: &str) -> Hid {
        issue("attr_open_by_name", || {
            let object = c_text("attr_open_by_name", &object_path(path))?;
            let name = c_text("attr_open_by_name", name)?;
            Ok(unsafe {
                H5Aopen_by_name(
                    loc,
                    object.as_ptr(),
                    name.as_ptr(),
                    H5P_DEFAULT,
                    H5P_DEFAULT,
                )
            })
        })
    }

    fn attr_create(&self, object: Hid, name: &str, file_type: Hid, space: Hid) -> Hid {
        issue("attr_create", || {
            let name = c_text("attr_create", name)?;
            Ok(unsafe {
                H5Acreate2(
                    object,
                    name.as_ptr(),
                    file_type,
                    space,
                    H5P_DEFAULT,
                    H5P_DEFAULT,
                )
            })
        })
    }

    fn attr_delete(&self, object: Hid, name: &str) -> NativeResult<()> {
        let name = c_text("attr_delete", name)?;
        check("attr_delete", unsafe { H5Adelete(object, name.as_ptr()) })
    }

    fn attr_rename(&self, object: Hid, from: &str, to: &str) -> NativeResult<()> {
        let from = c_text("attr_rename", from)?;
        let to = c_text("attr_rename", to)?;
        check("attr_rename", unsafe {
            H5Arename(object, from.as_ptr(), to.as_ptr())
        })
    }

    fn attr_get_type(&self, attr: Hid) -> Hid {
        issue("attr_get_type", || Ok(unsafe { H5Aget_type(attr) }))
    }

    fn attr_get_space(&self, attr: Hid) -> Hid {
        issue("attr_get_space", || Ok(unsafe { H5Aget_space(attr) }))
    }

    fn attr_read(&self, attr: Hid, mem_type: Hid, buf: &mut [u8]) -> NativeResult<()> {
        let op = "attr_read";
        let space = ScopedHandle::new(self, self.attr_get_space(attr), Self::space_close);
        Self::check_buffer(op, &space, mem_type, buf.len())?;
        check(op, unsafe {
            H5Aread(attr, mem_type, buf.as_mut_ptr().cast())
        })
    }

    fn attr_read_vlen(&self, attr: Hid, mem_type: Hid) -> Hid {
        let op = "attr_read_vlen";
        let read = || -> NativeResult<VlenBuffer> {
            if !truth(op, unsafe { H5Tis_variable_str(mem_type) })? {
                return Err(NativeError::new(op, "memory type is not a variable-length string"));
            }
            let space = ScopedHandle::new(self, self.attr_get_space(attr), Self::space_close);
            Self::check_single(op, &space)?;

            let owned_type = unsafe { H5Tcopy(mem_type) };
            if owned_type < 0 {
                return Err(NativeError::new(op, "cannot copy memory type"));
            }
            let mut data: *mut c_char = ptr::null_mut();
            // SAFETY: one element of a variable-length string type is a
            // single `char *`, which `data` provides room for.
            let code = unsafe { H5Aread(attr, mem_type, (&mut data as *mut *mut c_char).cast()) };
            if let Err(e) = check(op, code) {
                unsafe { H5Tclose(owned_type) };
                return Err(e);
            }
            Ok(VlenBuffer {
                data,
                mem_type: owned_type,
            })
        };

        match read() {
            Ok(buffer) => {
                let mut table = self.vlen.borrow_mut();
                table.next_hid += 1;
                let hid = table.next_hid;
                table.buffers.insert(hid, buffer);
                hid
            }
            Err(e) => {
                debug!(
                    context = "hdf5_library",
                    operation = op,
                    error = %e,
                    "native call failed"
                );
                INVALID_HID
            }
        }
    }

    fn attr_write(&self, attr: Hid, mem_type: Hid, buf: &[u8]) -> NativeResult<()> {
        let op = "attr_write";
        let space = ScopedHandle::new(self, self.attr_get_space(attr), Self::space_close);
        if !truth(op, unsafe { H5Tis_variable_str(mem_type) })? {
            Self::check_buffer(op, &space, mem_type, buf.len())?;
            return check(op, unsafe { H5Awrite(attr, mem_type, buf.as_ptr().cast()) });
        }

        Self::check_single(op, &space)?;
        let text =
            CString::new(buf).map_err(|_| NativeError::new(op, "string contains a NUL byte"))?;
        let pointer = text.as_ptr();
        // SAFETY: one variable-length string element is a single `char *`;
        // `text` outlives the call.
        check(op, unsafe {
            H5Awrite(attr, mem_type, (&pointer as *const *const c_char).cast())
        })
    }

    fn attr_close(&self, attr: Hid) -> NativeResult<()> {
        check("attr_close", unsafe { H5Aclose(attr) })
    }

    fn vlen_copy(&self, buffer: Hid) -> NativeResult<Vec<u8>> {
        let table = self.vlen.borrow();
        let entry = table
            .buffers
            .get(&buffer)
            .ok_or_else(|| NativeError::new("vlen_copy", format!("no buffer {buffer}")))?;
        if entry.data.is_null() {
            return Ok(Vec::new());
        }
        // SAFETY: HDF5 returns NUL-terminated strings, alive until reclaimed.
        Ok(unsafe { CStr::from_ptr(entry.data) }.to_bytes().to_vec())
    }

    fn vlen_reclaim(&self, buffer: Hid) -> NativeResult<()> {
        let entry = self
            .vlen
            .borrow_mut()
            .buffers
            .remove(&buffer)
            .ok_or_else(|| NativeError::new("vlen_reclaim", format!("no buffer {buffer}")))?;
        Self::release(entry)
    }

    fn type_copy(&self, ty: Hid) -> Hid {
        issue("type_copy", || Ok(unsafe { H5Tcopy(ty) }))
    }

    fn type_set_size(&self, ty: Hid, size: StringSize) -> NativeResult<()> {
        let size = match size {
            StringSize::Fixed(0) => {
                return Err(NativeError::new("type_set_size", "string size must be positive"))
            }
            StringSize::Fixed(n) => n,
            StringSize::Variable => H5T_VARIABLE,
        };
        check("type_set_size", unsafe { H5Tset_size(ty, size) })
    }

    fn type_equal(&self, a: Hid, b: Hid) -> NativeResult<bool> {
        truth("type_equal", unsafe { H5Tequal(a, b) })
    }

    fn type_class(&self, ty: Hid) -> NativeResult<TypeClass> {
        match unsafe { H5Tget_class(ty) } {
            H5T_class_t::H5T_NO_CLASS => Err(NativeError::new("type_class", "not a datatype")),
            H5T_class_t::H5T_INTEGER => Ok(TypeClass::Integer),
            H5T_class_t::H5T_FLOAT => Ok(TypeClass::Float),
            H5T_class_t::H5T_STRING => Ok(TypeClass::String),
            _ => Ok(TypeClass::Other),
        }
    }

    fn type_is_variable_str(&self, ty: Hid) -> NativeResult<bool> {
        truth("type_is_variable_str", unsafe { H5Tis_variable_str(ty) })
    }

    fn type_size(&self, ty: Hid) -> NativeResult<usize> {
        match unsafe { H5Tget_size(ty) } {
            0 => Err(NativeError::new("type_size", "not a datatype")),
            size => Ok(size),
        }
    }

    fn type_close(&self, ty: Hid) -> NativeResult<()> {
        check("type_close", unsafe { H5Tclose(ty) })
    }

    fn space_create_simple(&self, dims: &[u64]) -> Hid {
        issue("space_create_simple", || {
            if dims.is_empty() {
                return Ok(unsafe { H5Screate(H5S_class_t::H5S_SCALAR) });
            }
            let rank = c_int::try_from(dims.len())
                .map_err(|_| NativeError::new("space_create_simple", "rank overflows"))?;
            Ok(unsafe { H5Screate_simple(rank, dims.as_ptr(), ptr::null()) })
        })
    }

    fn space_ndims(&self, space: Hid) -> NativeResult<usize> {
        let rank = unsafe { H5Sget_simple_extent_ndims(space) };
        usize::try_from(rank).map_err(|_| NativeError::new("space_ndims", "not a dataspace"))
    }

    fn space_dims(&self, space: Hid, dims: &mut [u64]) -> NativeResult<usize> {
        let rank = self.space_ndims(space)?;
        let mut extents = vec![0 as hsize_t; rank];
        let written =
            unsafe { H5Sget_simple_extent_dims(space, extents.as_mut_ptr(), ptr::null_mut()) };
        let written = usize::try_from(written)
            .map_err(|_| NativeError::new("space_dims", "not a dataspace"))?;
        let n = written.min(dims.len());
        dims[..n].copy_from_slice(&extents[..n]);
        Ok(written)
    }

    fn space_close(&self, space: Hid) -> NativeResult<()> {
        check("space_close", unsafe { H5Sclose(space) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_normalization() {
        assert_eq!(object_path("/"), "/");
        assert_eq!(object_path(""), ".");
        assert_eq!(object_path("."), ".");
        assert_eq!(object_path("/data/tomography/"), "/data/tomography");
        assert_eq!(object_path("data/./tomography"), "data/tomography");
        assert_eq!(object_path("//data//x"), "/data/x");
    }

    #[test]
    fn test_predefined_types_are_distinct() {
        let lib = Hdf5Library::new();
        for (i, a) in PredefinedType::ALL.iter().enumerate() {
            assert!(lib.predefined(*a) >= 0, "{a:?}");
            for b in &PredefinedType::ALL[i + 1..] {
                assert_ne!(lib.predefined(*a), lib.predefined(*b), "{a:?} {b:?}");
            }
        }
    }

    #[test]
    fn test_string_type_resizing() {
        let lib = Hdf5Library::new();
        let cstr = lib.predefined(PredefinedType::CString);
        let ty = lib.type_copy(cstr);
        assert!(ty >= 0);
        lib.type_set_size(ty, StringSize::Variable).unwrap();
        assert!(lib.type_is_variable_str(ty).unwrap());
        lib.type_set_size(ty, StringSize::Fixed(6)).unwrap();
        assert!(!lib.type_is_variable_str(ty).unwrap());
        assert_eq!(lib.type_size(ty).unwrap(), 6);
        assert_eq!(lib.type_class(ty).unwrap(), TypeClass::String);
        assert!(lib.type_set_size(ty, StringSize::Fixed(0)).is_err());
        lib.type_close(ty).unwrap();
    }

    #[test]
    fn test_semantic_type_equality() {
        let lib = Hdf5Library::new();
        let stored = lib.predefined(PredefinedType::StdI32Le);
        let copy = lib.type_copy(stored);
        assert_ne!(copy, stored);
        assert!(lib.type_equal(copy, stored).unwrap());
        assert!(!lib
            .type_equal(copy, lib.predefined(PredefinedType::StdU32Le))
            .unwrap());
        assert_eq!(lib.type_class(copy).unwrap(), TypeClass::Integer);
        lib.type_close(copy).unwrap();
    }

    #[test]
    fn test_space_queries() {
        let lib = Hdf5Library::new();
        let space = lib.space_create_simple(&[74, 256, 256]);
        assert_eq!(lib.space_ndims(space).unwrap(), 3);
        let mut dims = [0u64; 3];
        assert_eq!(lib.space_dims(space, &mut dims).unwrap(), 3);
        assert_eq!(dims, [74, 256, 256]);
        lib.space_close(space).unwrap();
        assert!(lib.space_close(space).is_err());
    }

    #[test]
    fn test_missing_file_returns_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let lib = Hdf5Library::new();
        let path = dir.path().join("absent.h5");
        assert_eq!(lib.file_open(&path, FileAccess::ReadOnly), INVALID_HID);
    }

    #[test]
    fn test_vlen_string_attribute() {
        let dir = tempfile::tempdir().unwrap();
        let lib = Hdf5Library::new();
        let file = lib.file_create(&dir.path().join("vlen.h5"));
        assert!(file >= 0);

        let vstr = lib.type_copy(lib.predefined(PredefinedType::CString));
        lib.type_set_size(vstr, StringSize::Variable).unwrap();
        let space = lib.space_create_simple(&[1]);
        let attr = lib.attr_create(file, "name", vstr, space);
        lib.attr_write(attr, vstr, b"angles").unwrap();

        let buffer = lib.attr_read_vlen(attr, vstr);
        assert!(buffer >= 0);
        assert_eq!(lib.outstanding_vlen_count(), 1);
        assert_eq!(lib.vlen_copy(buffer).unwrap(), b"angles");
        lib.vlen_reclaim(buffer).unwrap();
        assert_eq!(lib.outstanding_vlen_count(), 0);
        assert!(lib.vlen_copy(buffer).is_err());

        lib.attr_close(attr).unwrap();
        lib.space_close(space).unwrap();
        lib.type_close(vstr).unwrap();
        lib.file_close(file).unwrap();
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let lib = Hdf5Library::new();
        let file = lib.file_create(&dir.path().join("short.h5"));
        let space = lib.space_create_simple(&[4]);
        let u16_le = lib.predefined(PredefinedType::StdU16Le);
        let dataset = lib.dataset_create(file, "d", u16_le, space);
        assert!(dataset >= 0);

        let mem = lib.predefined(PredefinedType::NativeU16);
        assert!(lib.dataset_write(dataset, mem, &[0u8; 6]).is_err());
        lib.dataset_write(dataset, mem, &[1, 0, 2, 0, 3, 0, 4, 0]).unwrap();
        let mut out = [0u8; 8];
        assert!(lib.dataset_read(dataset, mem, &mut out[..7]).is_err());
        lib.dataset_read(dataset, mem, &mut out).unwrap();
        assert_eq!(out, [1, 0, 2, 0, 3, 0, 4, 0]);

        lib.dataset_close(dataset).unwrap();
        lib.space_close(space).unwrap();
        lib.file_close(file).unwrap();
    }
}
