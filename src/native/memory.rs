// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! In-process container library.
//!
//! [`MemoryLibrary`] implements [`NativeLibrary`] over an in-memory object
//! tree per open file. It is the test double for the access layer: files
//! live in a [`FileStore`] instead of on disk, and a writable file's tree is
//! written back to the store when the file is flushed or closed.
//!
//! The library keeps a handle table, so tests can check that every handle
//! the access layer acquires is released
//! ([`MemoryLibrary::open_handle_count`]) and can inject failures
//! ([`FaultInjection`]) to drive error paths.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use super::tree::{
    Array, Attribute, ByteOrder, Node, NodeId, NodeKind, Payload, Tree, TypeDesc, ROOT,
};
use super::{
    FileAccess, Hid, NativeError, NativeLibrary, NativeResult, ObjectInfo, PredefinedType,
    StringSize, TypeClass, INVALID_HID,
};

/// First identifier handed out for dynamic handles.
const FIRST_DYNAMIC_HID: Hid = 256;

/// Failures the library can be told to produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultInjection {
    /// Report one dimension fewer from extent queries than from rank queries
    pub rank_drift: bool,
    /// Fail every dataset and attribute read or write
    pub fail_transfers: bool,
}

/// Files known to one or more [`MemoryLibrary`] instances, keyed by path.
///
/// Cloning shares the store, so a file written through one library can be
/// reopened through another (for example one with faults injected).
#[derive(Clone, Default)]
pub struct FileStore(Rc<RefCell<HashMap<PathBuf, Tree>>>);

impl FileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a file exists at `path`.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.0.borrow().contains_key(path.as_ref())
    }

    /// Number of files in the store.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Check whether the store holds no files.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn load(&self, path: &Path) -> Option<Tree> {
        self.0.borrow().get(path).cloned()
    }

    fn save(&self, path: &Path, tree: Tree) {
        self.0.borrow_mut().insert(path.to_path_buf(), tree);
    }
}

struct FileSlot {
    path: PathBuf,
    writable: bool,
    tree: Tree,
    dirty: bool,
}

impl FileSlot {
    fn persist(&mut self, store: &FileStore) {
        if self.writable && self.dirty {
            store.save(&self.path, self.tree.clone());
            self.dirty = false;
        }
    }
}

enum Slot {
    File(FileSlot),
    Group { file: Hid, node: NodeId },
    Dataset { file: Hid, node: NodeId },
    Attribute { file: Hid, node: NodeId, name: String },
    Datatype(TypeDesc),
    Dataspace(Vec<u64>),
    VlenBuffer(Vec<u8>),
}

impl Slot {
    fn kind(&self) -> &'static str {
        match self {
            Slot::File(_) => "file",
            Slot::Group { .. } => "group",
            Slot::Dataset { .. } => "dataset",
            Slot::Attribute { .. } => "attribute",
            Slot::Datatype(_) => "datatype",
            Slot::Dataspace(_) => "dataspace",
            Slot::VlenBuffer(_) => "vlen buffer",
        }
    }
}

fn fail<T>(operation: &'static str, message: impl Into<String>) -> NativeResult<T> {
    Err(NativeError::new(operation, message))
}

fn predefined_of(hid: Hid) -> Option<PredefinedType> {
    let index = usize::try_from(hid.checked_sub(1)?).ok()?;
    PredefinedType::ALL.get(index).copied()
}

struct State {
    slots: HashMap<Hid, Slot>,
    next_hid: Hid,
    faults: FaultInjection,
    store: FileStore,
}

impl State {
    fn new(store: FileStore) -> Self {
        Self {
            slots: HashMap::new(),
            next_hid: FIRST_DYNAMIC_HID,
            faults: FaultInjection::default(),
            store,
        }
    }

    fn issue(&mut self, slot: Slot) -> Hid {
        let hid = self.next_hid;
        self.next_hid += 1;
        self.slots.insert(hid, slot);
        hid
    }

    fn release(
        &mut self,
        op: &'static str,
        hid: Hid,
        accept: fn(&Slot) -> bool,
    ) -> NativeResult<Slot> {
        match self.slots.get(&hid) {
            Some(slot) if accept(slot) => {}
            Some(slot) => return fail(op, format!("handle {hid} is a {}", slot.kind())),
            None => return fail(op, format!("handle {hid} is not open")),
        }
        self.slots
            .remove(&hid)
            .ok_or_else(|| NativeError::new(op, format!("handle {hid} is not open")))
    }

    fn slot(&self, op: &'static str, hid: Hid) -> NativeResult<&Slot> {
        self.slots
            .get(&hid)
            .ok_or_else(|| NativeError::new(op, format!("handle {hid} is not open")))
    }

    fn file(&self, op: &'static str, file: Hid) -> NativeResult<&FileSlot> {
        match self.slot(op, file)? {
            Slot::File(f) => Ok(f),
            other => fail(op, format!("handle {file} is a {}", other.kind())),
        }
    }

    fn writable_file(&mut self, op: &'static str, file: Hid) -> NativeResult<&mut FileSlot> {
        match self.slots.get_mut(&file) {
            Some(Slot::File(f)) => {
                if f.writable {
                    Ok(f)
                } else {
                    fail(op, format!("'{}' is opened read-only", f.path.display()))
                }
            }
            Some(other) => fail(op, format!("handle {file} is a {}", other.kind())),
            None => fail(op, format!("handle {file} is not open")),
        }
    }

    /// File and node a location handle refers to.
    fn locate(&self, op: &'static str, loc: Hid) -> NativeResult<(Hid, NodeId)> {
        match self.slot(op, loc)? {
            Slot::File(_) => Ok((loc, ROOT)),
            Slot::Group { file, node } | Slot::Dataset { file, node } => Ok((*file, *node)),
            other => fail(
                op,
                format!("handle {loc} is a {}, not a location", other.kind()),
            ),
        }
    }

    /// Resolve `path` below `loc` to a node of that file.
    fn resolve(
        &self,
        op: &'static str,
        loc: Hid,
        path: &str,
    ) -> NativeResult<(Hid, NodeId, &Node)> {
        let (file, from) = self.locate(op, loc)?;
        let tree = &self.file(op, file)?.tree;
        let id = tree
            .resolve(from, path)
            .ok_or_else(|| NativeError::new(op, format!("no object at '{path}'")))?;
        let node = tree
            .node(id)
            .ok_or_else(|| NativeError::new(op, format!("dangling node at '{path}'")))?;
        Ok((file, id, node))
    }

    fn node(&self, op: &'static str, file: Hid, node: NodeId) -> NativeResult<&Node> {
        self.file(op, file)?
            .tree
            .node(node)
            .ok_or_else(|| NativeError::new(op, "object no longer exists"))
    }

    fn dataset(&self, op: &'static str, dataset: Hid) -> NativeResult<&Array> {
        match self.slot(op, dataset)? {
            Slot::Dataset { file, node } => match &self.node(op, *file, *node)?.kind {
                NodeKind::Dataset(array) => Ok(array),
                NodeKind::Group { .. } => fail(op, "object is not a dataset"),
            },
            other => fail(op, format!("handle {dataset} is a {}", other.kind())),
        }
    }

    fn attribute(&self, op: &'static str, attr: Hid) -> NativeResult<&Array> {
        match self.slot(op, attr)? {
            Slot::Attribute { file, node, name } => self
                .node(op, *file, *node)?
                .attr(name)
                .map(|a| &a.value)
                .ok_or_else(|| NativeError::new(op, format!("attribute '{name}' was deleted"))),
            other => fail(op, format!("handle {attr} is a {}", other.kind())),
        }
    }

    /// Run `f` on the stored value of an attribute of a writable file,
    /// marking the file dirty when `f` succeeds.
    fn update_attribute<R>(
        &mut self,
        op: &'static str,
        attr: Hid,
        f: impl FnOnce(&mut Array) -> NativeResult<R>,
    ) -> NativeResult<R> {
        let (file, node, name) = match self.slot(op, attr)? {
            Slot::Attribute { file, node, name } => (*file, *node, name.clone()),
            other => return fail(op, format!("handle {attr} is a {}", other.kind())),
        };
        let slot = self.writable_file(op, file)?;
        let value = slot
            .tree
            .node_mut(node)
            .and_then(|n| n.attr_mut(&name))
            .map(|a| &mut a.value)
            .ok_or_else(|| NativeError::new(op, format!("attribute '{name}' was deleted")))?;
        let result = f(value)?;
        slot.dirty = true;
        Ok(result)
    }

    fn type_desc(&self, op: &'static str, ty: Hid) -> NativeResult<TypeDesc> {
        if let Some(predefined) = predefined_of(ty) {
            return Ok(TypeDesc::predefined(predefined));
        }
        match self.slot(op, ty)? {
            Slot::Datatype(desc) => Ok(desc.clone()),
            other => fail(op, format!("handle {ty} is a {}", other.kind())),
        }
    }

    fn space(&self, op: &'static str, space: Hid) -> NativeResult<&[u64]> {
        match self.slot(op, space)? {
            Slot::Dataspace(dims) => Ok(dims),
            other => fail(op, format!("handle {space} is a {}", other.kind())),
        }
    }

    fn check_transfer(&self, op: &'static str) -> NativeResult<()> {
        if self.faults.fail_transfers {
            return fail(op, "injected transfer failure");
        }
        Ok(())
    }
}

/// Read stored fixed-size elements into a caller buffer of type `mem`.
fn read_elements(
    op: &'static str,
    stored: &Array,
    mem: &TypeDesc,
    buf: &mut [u8],
) -> NativeResult<()> {
    let Payload::Bytes(bytes) = &stored.payload else {
        return fail(op, "variable-length values need a vlen read");
    };
    match (&stored.dtype, mem) {
        (
            TypeDesc::String {
                size: StringSize::Fixed(from),
            },
            TypeDesc::String {
                size: StringSize::Fixed(to),
            },
        ) => copy_fixed_strings(op, bytes, *from, buf, *to, stored.element_count()),
        (dtype, mem) => dtype
            .convert(mem, bytes, buf)
            .map_err(|e| NativeError::new(op, e)),
    }
}

/// Store caller elements of type `mem` into a fixed-size value.
fn write_elements(
    op: &'static str,
    stored: &mut Array,
    mem: &TypeDesc,
    buf: &[u8],
) -> NativeResult<()> {
    let count = stored.element_count();
    let dtype = stored.dtype.clone();
    let Payload::Bytes(bytes) = &mut stored.payload else {
        return fail(op, "variable-length values need a string write");
    };
    match (&dtype, mem) {
        (
            TypeDesc::String {
                size: StringSize::Fixed(to),
            },
            TypeDesc::String {
                size: StringSize::Fixed(from),
            },
        ) => copy_fixed_strings(op, buf, *from, bytes, *to, count),
        (dtype, mem) => mem
            .convert(dtype, buf, bytes)
            .map_err(|e| NativeError::new(op, e)),
    }
}

/// Copy `count` fixed-length strings between widths, truncating or
/// zero-padding each element.
fn copy_fixed_strings(
    op: &'static str,
    src: &[u8],
    src_width: usize,
    dst: &mut [u8],
    dst_width: usize,
    count: usize,
) -> NativeResult<()> {
    if src.len() != src_width * count || dst.len() != dst_width * count {
        return fail(
            op,
            format!(
                "string buffer holds {} bytes, {} required",
                dst.len().min(src.len()),
                dst_width.max(src_width) * count
            ),
        );
    }
    for (from, to) in src.chunks_exact(src_width).zip(dst.chunks_exact_mut(dst_width)) {
        let n = from.len().min(to.len());
        to[..n].copy_from_slice(&from[..n]);
        to[n..].fill(0);
    }
    Ok(())
}

/// In-process [`NativeLibrary`] over a [`FileStore`].
///
/// Not thread-safe; use one instance per thread.
pub struct MemoryLibrary {
    state: RefCell<State>,
}

impl Default for MemoryLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLibrary {
    /// Create a library with no open handles over a fresh store.
    pub fn new() -> Self {
        Self::sharing(&FileStore::new())
    }

    /// Create a library over an existing store.
    pub fn sharing(store: &FileStore) -> Self {
        Self {
            state: RefCell::new(State::new(store.clone())),
        }
    }

    /// Inject the given failures.
    pub fn with_faults(self, faults: FaultInjection) -> Self {
        self.set_faults(faults);
        self
    }

    /// The store this library reads and writes files in.
    pub fn store(&self) -> FileStore {
        self.state.borrow().store.clone()
    }

    /// Change the injected failures.
    pub fn set_faults(&self, faults: FaultInjection) {
        self.state.borrow_mut().faults = faults;
    }

    /// Number of open files, objects, datatypes and dataspaces.
    pub fn open_handle_count(&self) -> usize {
        self.state
            .borrow()
            .slots
            .values()
            .filter(|s| !matches!(s, Slot::VlenBuffer(_)))
            .count()
    }

    /// Number of variable-length buffers not yet reclaimed.
    pub fn outstanding_vlen_count(&self) -> usize {
        self.state
            .borrow()
            .slots
            .values()
            .filter(|s| matches!(s, Slot::VlenBuffer(_)))
            .count()
    }

    /// Run a handle-producing call, mapping failure to the sentinel.
    fn issue(&self, op: &'static str, f: impl FnOnce(&mut State) -> NativeResult<Slot>) -> Hid {
        let mut state = self.state.borrow_mut();
        match f(&mut *state) {
            Ok(slot) => state.issue(slot),
            Err(e) => {
                debug!(
                    context = "memory_library",
                    operation = op,
                    error = %e,
                    "native call failed"
                );
                INVALID_HID
            }
        }
    }

    /// Create an opaque datatype of `size` bytes, a class no element type
    /// maps to.
    pub fn opaque_type(&self, size: usize) -> Hid {
        self.issue("opaque_type", |_| {
            if size == 0 {
                return fail("opaque_type", "opaque size must be positive");
            }
            Ok(Slot::Datatype(TypeDesc::Opaque { size }))
        })
    }

    /// Copy of a numeric datatype with the opposite byte order.
    pub fn type_copy_swapped(&self, ty: Hid) -> Hid {
        self.issue("type_copy_swapped", |state| {
            let swap = |order| match order {
                ByteOrder::Little => ByteOrder::Big,
                ByteOrder::Big => ByteOrder::Little,
            };
            match state.type_desc("type_copy_swapped", ty)? {
                TypeDesc::Integer {
                    size,
                    signed,
                    order,
                } => Ok(Slot::Datatype(TypeDesc::Integer {
                    size,
                    signed,
                    order: swap(order),
                })),
                TypeDesc::Float { size, order } => Ok(Slot::Datatype(TypeDesc::Float {
                    size,
                    order: swap(order),
                })),
                _ => fail("type_copy_swapped", "type has no byte order"),
            }
        })
    }
}

impl NativeLibrary for MemoryLibrary {
    fn predefined(&self, ty: PredefinedType) -> Hid {
        ty.index() as Hid + 1
    }

    fn file_open(&self, path: &Path, access: FileAccess) -> Hid {
        self.issue("file_open", |state| {
            let tree = state.store.load(path).ok_or_else(|| {
                NativeError::new("file_open", format!("no file at '{}'", path.display()))
            })?;
            Ok(Slot::File(FileSlot {
                path: path.to_path_buf(),
                writable: access == FileAccess::ReadWrite,
                tree,
                dirty: false,
            }))
        })
    }

    fn file_create(&self, path: &Path) -> Hid {
        self.issue("file_create", |state| {
            let tree = Tree::new();
            state.store.save(path, tree.clone());
            Ok(Slot::File(FileSlot {
                path: path.to_path_buf(),
                writable: true,
                tree,
                dirty: false,
            }))
        })
    }

    fn file_flush(&self, file: Hid) -> NativeResult<()> {
        let mut state = self.state.borrow_mut();
        let State { slots, store, .. } = &mut *state;
        match slots.get_mut(&file) {
            Some(Slot::File(slot)) => {
                slot.persist(store);
                Ok(())
            }
            Some(other) => fail("file_flush", format!("handle {file} is a {}", other.kind())),
            None => fail("file_flush", format!("handle {file} is not open")),
        }
    }

    fn file_close(&self, file: Hid) -> NativeResult<()> {
        let mut state = self.state.borrow_mut();
        let slot = state.release("file_close", file, |s| matches!(s, Slot::File(_)))?;
        if let Slot::File(mut f) = slot {
            f.persist(&state.store);
        }
        Ok(())
    }

    fn object_info(&self, loc: Hid, path: &str) -> NativeResult<ObjectInfo> {
        let state = self.state.borrow();
        let (_, _, node) = state.resolve("object_info", loc, path)?;
        Ok(node.info())
    }

    fn visit(&self, loc: Hid, visitor: &mut dyn FnMut(&str, &ObjectInfo)) -> NativeResult<()> {
        let mut entries = Vec::new();
        {
            let state = self.state.borrow();
            let (file, from) = state.locate("visit", loc)?;
            state
                .file("visit", file)?
                .tree
                .walk(from, &mut |path, node| entries.push((path.to_string(), node.info())));
        }
        for (path, info) in &entries {
            visitor(path, info);
        }
        Ok(())
    }

    fn group_open(&self, loc: Hid, path: &str) -> Hid {
        self.issue("group_open", |state| {
            let (file, node, found) = state.resolve("group_open", loc, path)?;
            match found.kind {
                NodeKind::Group { .. } => Ok(Slot::Group { file, node }),
                NodeKind::Dataset(_) => fail("group_open", format!("'{path}' is a dataset")),
            }
        })
    }

    fn group_create(&self, loc: Hid, path: &str) -> Hid {
        self.issue("group_create", |state| {
            let (file, from) = state.locate("group_create", loc)?;
            let slot = state.writable_file("group_create", file)?;
            let (parent, name) = slot.tree.resolve_parent(from, path).ok_or_else(|| {
                NativeError::new("group_create", format!("no parent for '{path}'"))
            })?;
            let node = slot.tree.insert(parent, name, Node::group()).ok_or_else(|| {
                NativeError::new("group_create", format!("cannot create '{path}'"))
            })?;
            slot.dirty = true;
            Ok(Slot::Group { file, node })
        })
    }

    fn group_num_objs(&self, group: Hid) -> NativeResult<usize> {
        let state = self.state.borrow();
        let (file, node) = state.locate("group_num_objs", group)?;
        state
            .file("group_num_objs", file)?
            .tree
            .children(node)
            .map(<[_]>::len)
            .ok_or_else(|| NativeError::new("group_num_objs", "object is not a group"))
    }

    fn group_objname_by_idx(&self, group: Hid, index: usize) -> NativeResult<String> {
        let state = self.state.borrow();
        let (file, node) = state.locate("group_objname_by_idx", group)?;
        state
            .file("group_objname_by_idx", file)?
            .tree
            .children(node)
            .and_then(|children| children.get(index))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| {
                NativeError::new("group_objname_by_idx", format!("no member {index}"))
            })
    }

    fn group_close(&self, group: Hid) -> NativeResult<()> {
        self.state
            .borrow_mut()
            .release("group_close", group, |s| matches!(s, Slot::Group { .. }))
            .map(drop)
    }

    fn dataset_open(&self, loc: Hid, path: &str) -> Hid {
        self.issue("dataset_open", |state| {
            let (file, node, found) = state.resolve("dataset_open", loc, path)?;
            match found.kind {
                NodeKind::Dataset(_) => Ok(Slot::Dataset { file, node }),
                NodeKind::Group { .. } => fail("dataset_open", format!("'{path}' is a group")),
            }
        })
    }

    fn dataset_create(&self, loc: Hid, name: &str, file_type: Hid, space: Hid) -> Hid {
        self.issue("dataset_create", |state| {
            let op = "dataset_create";
            let dtype = state.type_desc(op, file_type)?;
            let dims = state.space(op, space)?.to_vec();
            let (file, from) = state.locate(op, loc)?;
            let array = Array::new(dtype, dims)
                .ok_or_else(|| NativeError::new(op, "dataset extent overflows"))?;
            let slot = state.writable_file(op, file)?;
            let (parent, leaf) = slot
                .tree
                .resolve_parent(from, name)
                .ok_or_else(|| NativeError::new(op, format!("no parent for '{name}'")))?;
            let node = slot
                .tree
                .insert(parent, leaf, Node::dataset(array))
                .ok_or_else(|| NativeError::new(op, format!("cannot create '{name}'")))?;
            slot.dirty = true;
            Ok(Slot::Dataset { file, node })
        })
    }

    fn dataset_get_type(&self, dataset: Hid) -> Hid {
        self.issue("dataset_get_type", |state| {
            let array = state.dataset("dataset_get_type", dataset)?;
            Ok(Slot::Datatype(array.dtype.clone()))
        })
    }

    fn dataset_get_space(&self, dataset: Hid) -> Hid {
        self.issue("dataset_get_space", |state| {
            let array = state.dataset("dataset_get_space", dataset)?;
            Ok(Slot::Dataspace(array.dims.clone()))
        })
    }

    fn dataset_read(&self, dataset: Hid, mem_type: Hid, buf: &mut [u8]) -> NativeResult<()> {
        let op = "dataset_read";
        let state = self.state.borrow();
        state.check_transfer(op)?;
        let mem = state.type_desc(op, mem_type)?;
        read_elements(op, state.dataset(op, dataset)?, &mem, buf)
    }

    fn dataset_write(&self, dataset: Hid, mem_type: Hid, buf: &[u8]) -> NativeResult<()> {
        let op = "dataset_write";
        let mut state = self.state.borrow_mut();
        state.check_transfer(op)?;
        let mem = state.type_desc(op, mem_type)?;
        let (file, node) = match state.slot(op, dataset)? {
            Slot::Dataset { file, node } => (*file, *node),
            other => return fail(op, format!("handle {dataset} is a {}", other.kind())),
        };
        let slot = state.writable_file(op, file)?;
        match slot.tree.node_mut(node).map(|n| &mut n.kind) {
            Some(NodeKind::Dataset(array)) => write_elements(op, array, &mem, buf)?,
            _ => return fail(op, "dataset no longer exists"),
        }
        slot.dirty = true;
        Ok(())
    }

    fn dataset_close(&self, dataset: Hid) -> NativeResult<()> {
        self.state
            .borrow_mut()
            .release("dataset_close", dataset, |s| matches!(s, Slot::Dataset { .. }))
            .map(drop)
    }

    fn attr_exists_by_name(&self, loc: Hid, path: &str, name: &str) -> NativeResult<bool> {
        let state = self.state.borrow();
        let (_, _, node) = state.resolve("attr_exists_by_name", loc, path)?;
        Ok(node.attr(name).is_some())
    }

    fn attr_open_by_name(&self, loc: Hid, path: &str, name: &str) -> Hid {
        self.issue("attr_open_by_name", |state| {
            let (file, node, found) = state.resolve("attr_open_by_name", loc, path)?;
            if found.attr(name).is_none() {
                return fail(
                    "attr_open_by_name",
                    format!("no attribute '{name}' on '{path}'"),
                );
            }
            Ok(Slot::Attribute {
                file,
                node,
                name: name.to_string(),
            })
        })
    }

    fn attr_create(&self, object: Hid, name: &str, file_type: Hid, space: Hid) -> Hid {
        self.issue("attr_create", |state| {
            let op = "attr_create";
            let dtype = state.type_desc(op, file_type)?;
            let dims = state.space(op, space)?.to_vec();
            let (file, node) = state.locate(op, object)?;
            let value = Array::new(dtype, dims)
                .ok_or_else(|| NativeError::new(op, "attribute extent overflows"))?;
            let slot = state.writable_file(op, file)?;
            let target = slot
                .tree
                .node_mut(node)
                .ok_or_else(|| NativeError::new(op, "object no longer exists"))?;
            if name.is_empty() || target.attr(name).is_some() {
                return fail(
                    op,
                    format!("attribute '{name}' already exists or is unnamed"),
                );
            }
            target.attrs.push(Attribute {
                name: name.to_string(),
                value,
            });
            slot.dirty = true;
            Ok(Slot::Attribute {
                file,
                node,
                name: name.to_string(),
            })
        })
    }

    fn attr_delete(&self, object: Hid, name: &str) -> NativeResult<()> {
        let op = "attr_delete";
        let mut state = self.state.borrow_mut();
        let (file, node) = state.locate(op, object)?;
        let slot = state.writable_file(op, file)?;
        let target = slot
            .tree
            .node_mut(node)
            .ok_or_else(|| NativeError::new(op, "object no longer exists"))?;
        let before = target.attrs.len();
        target.attrs.retain(|a| a.name != name);
        if target.attrs.len() == before {
            return fail(op, format!("no attribute '{name}'"));
        }
        slot.dirty = true;
        Ok(())
    }

    fn attr_rename(&self, object: Hid, from: &str, to: &str) -> NativeResult<()> {
        let op = "attr_rename";
        let mut state = self.state.borrow_mut();
        let (file, node) = state.locate(op, object)?;
        let slot = state.writable_file(op, file)?;
        let target = slot
            .tree
            .node_mut(node)
            .ok_or_else(|| NativeError::new(op, "object no longer exists"))?;
        if to.is_empty() || target.attr(to).is_some() {
            return fail(op, format!("attribute '{to}' already exists or is unnamed"));
        }
        let attr = target
            .attr_mut(from)
            .ok_or_else(|| NativeError::new(op, format!("no attribute '{from}'")))?;
        attr.name = to.to_string();
        slot.dirty = true;
        Ok(())
    }

    fn attr_get_type(&self, attr: Hid) -> Hid {
        self.issue("attr_get_type", |state| {
            let value = state.attribute("attr_get_type", attr)?;
            Ok(Slot::Datatype(value.dtype.clone()))
        })
    }

    fn attr_get_space(&self, attr: Hid) -> Hid {
        self.issue("attr_get_space", |state| {
            let value = state.attribute("attr_get_space", attr)?;
            Ok(Slot::Dataspace(value.dims.clone()))
        })
    }

    fn attr_read(&self, attr: Hid, mem_type: Hid, buf: &mut [u8]) -> NativeResult<()> {
        let op = "attr_read";
        let state = self.state.borrow();
        state.check_transfer(op)?;
        let mem = state.type_desc(op, mem_type)?;
        read_elements(op, state.attribute(op, attr)?, &mem, buf)
    }

    fn attr_read_vlen(&self, attr: Hid, mem_type: Hid) -> Hid {
        self.issue("attr_read_vlen", |state| {
            let op = "attr_read_vlen";
            state.check_transfer(op)?;
            if !state.type_desc(op, mem_type)?.is_variable_str() {
                return fail(op, "memory type is not a variable-length string");
            }
            match &state.attribute(op, attr)?.payload {
                Payload::Strings(strings) => strings
                    .first()
                    .map(|s| Slot::VlenBuffer(s.as_bytes().to_vec()))
                    .ok_or_else(|| NativeError::new(op, "attribute holds no elements")),
                Payload::Bytes(_) => fail(op, "attribute is not variable length"),
            }
        })
    }

    fn attr_write(&self, attr: Hid, mem_type: Hid, buf: &[u8]) -> NativeResult<()> {
        let op = "attr_write";
        let mut state = self.state.borrow_mut();
        state.check_transfer(op)?;
        let mem = state.type_desc(op, mem_type)?;
        state.update_attribute(op, attr, |value| {
            if !mem.is_variable_str() {
                return write_elements(op, value, &mem, buf);
            }
            let text = std::str::from_utf8(buf)
                .map_err(|_| NativeError::new(op, "string is not valid UTF-8"))?;
            match &mut value.payload {
                Payload::Strings(strings) if !strings.is_empty() => {
                    strings.iter_mut().for_each(|s| *s = text.to_string());
                    Ok(())
                }
                Payload::Strings(_) => fail(op, "attribute holds no elements"),
                Payload::Bytes(_) => fail(op, "attribute is not variable length"),
            }
        })
    }

    fn attr_close(&self, attr: Hid) -> NativeResult<()> {
        self.state
            .borrow_mut()
            .release("attr_close", attr, |s| matches!(s, Slot::Attribute { .. }))
            .map(drop)
    }

    fn vlen_copy(&self, buffer: Hid) -> NativeResult<Vec<u8>> {
        match self.state.borrow().slot("vlen_copy", buffer)? {
            Slot::VlenBuffer(bytes) => Ok(bytes.clone()),
            other => fail(
                "vlen_copy",
                format!("handle {buffer} is a {}", other.kind()),
            ),
        }
    }

    fn vlen_reclaim(&self, buffer: Hid) -> NativeResult<()> {
        self.state
            .borrow_mut()
            .release("vlen_reclaim", buffer, |s| matches!(s, Slot::VlenBuffer(_)))
            .map(drop)
    }

    fn type_copy(&self, ty: Hid) -> Hid {
        self.issue("type_copy", |state| {
            state.type_desc("type_copy", ty).map(Slot::Datatype)
        })
    }

    fn type_set_size(&self, ty: Hid, size: StringSize) -> NativeResult<()> {
        let op = "type_set_size";
        if size == StringSize::Fixed(0) {
            return fail(op, "string size must be positive");
        }
        if predefined_of(ty).is_some() {
            return fail(op, "predefined types are immutable");
        }
        let mut state = self.state.borrow_mut();
        match state.slots.get_mut(&ty) {
            Some(Slot::Datatype(TypeDesc::String { size: current })) => {
                *current = size;
                Ok(())
            }
            Some(Slot::Datatype(_)) => fail(op, "only string types can be resized"),
            Some(other) => fail(op, format!("handle {ty} is a {}", other.kind())),
            None => fail(op, format!("handle {ty} is not open")),
        }
    }

    fn type_equal(&self, a: Hid, b: Hid) -> NativeResult<bool> {
        let state = self.state.borrow();
        Ok(state.type_desc("type_equal", a)? == state.type_desc("type_equal", b)?)
    }

    fn type_class(&self, ty: Hid) -> NativeResult<TypeClass> {
        Ok(self.state.borrow().type_desc("type_class", ty)?.class())
    }

    fn type_is_variable_str(&self, ty: Hid) -> NativeResult<bool> {
        Ok(self
            .state
            .borrow()
            .type_desc("type_is_variable_str", ty)?
            .is_variable_str())
    }

    fn type_size(&self, ty: Hid) -> NativeResult<usize> {
        Ok(self.state.borrow().type_desc("type_size", ty)?.size())
    }

    fn type_close(&self, ty: Hid) -> NativeResult<()> {
        if predefined_of(ty).is_some() {
            return fail("type_close", "predefined types are library-owned");
        }
        self.state
            .borrow_mut()
            .release("type_close", ty, |s| matches!(s, Slot::Datatype(_)))
            .map(drop)
    }

    fn space_create_simple(&self, dims: &[u64]) -> Hid {
        self.issue("space_create_simple", |_| Ok(Slot::Dataspace(dims.to_vec())))
    }

    fn space_ndims(&self, space: Hid) -> NativeResult<usize> {
        Ok(self.state.borrow().space("space_ndims", space)?.len())
    }

    fn space_dims(&self, space: Hid, dims: &mut [u64]) -> NativeResult<usize> {
        let state = self.state.borrow();
        let extents = state.space("space_dims", space)?;
        let n = extents.len().min(dims.len());
        dims[..n].copy_from_slice(&extents[..n]);
        if state.faults.rank_drift {
            return Ok(extents.len().checked_sub(1).unwrap_or(1));
        }
        Ok(extents.len())
    }

    fn space_close(&self, space: Hid) -> NativeResult<()> {
        self.state
            .borrow_mut()
            .release("space_close", space, |s| matches!(s, Slot::Dataspace(_)))
            .map(drop)
    }
}
