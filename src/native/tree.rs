// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! In-memory object tree backing [`MemoryLibrary`](super::MemoryLibrary).

use super::{ObjectInfo, ObjectType, PredefinedType, StringSize, TypeClass};

/// Byte order of a numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub(crate) const fn native() -> Self {
        if cfg!(target_endian = "little") {
            ByteOrder::Little
        } else {
            ByteOrder::Big
        }
    }
}

/// Size reported for a variable-length string element (one pointer).
pub(crate) const VLEN_ELEMENT_SIZE: usize = std::mem::size_of::<usize>();

/// Structural description of a datatype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeDesc {
    Integer {
        size: usize,
        signed: bool,
        order: ByteOrder,
    },
    Float {
        size: usize,
        order: ByteOrder,
    },
    String {
        size: StringSize,
    },
    Opaque {
        size: usize,
    },
}

impl TypeDesc {
    pub(crate) fn predefined(ty: PredefinedType) -> Self {
        use PredefinedType::*;

        let int = |size, signed, order| TypeDesc::Integer {
            size,
            signed,
            order,
        };
        let float = |size, order| TypeDesc::Float { size, order };
        let le = ByteOrder::Little;
        let ne = ByteOrder::native();

        match ty {
            StdI8Le => int(1, true, le),
            StdI16Le => int(2, true, le),
            StdI32Le => int(4, true, le),
            StdI64Le => int(8, true, le),
            StdU8Le => int(1, false, le),
            StdU16Le => int(2, false, le),
            StdU32Le => int(4, false, le),
            StdU64Le => int(8, false, le),
            IeeeF32Le => float(4, le),
            IeeeF64Le => float(8, le),
            NativeI8 => int(1, true, ne),
            NativeI16 => int(2, true, ne),
            NativeI32 => int(4, true, ne),
            NativeI64 => int(8, true, ne),
            NativeU8 => int(1, false, ne),
            NativeU16 => int(2, false, ne),
            NativeU32 => int(4, false, ne),
            NativeU64 => int(8, false, ne),
            NativeFloat => float(4, ne),
            NativeDouble => float(8, ne),
            CString => TypeDesc::String {
                size: StringSize::Fixed(1),
            },
        }
    }

    pub(crate) fn class(&self) -> TypeClass {
        match self {
            TypeDesc::Integer { .. } => TypeClass::Integer,
            TypeDesc::Float { .. } => TypeClass::Float,
            TypeDesc::String { .. } => TypeClass::String,
            TypeDesc::Opaque { .. } => TypeClass::Other,
        }
    }

    /// Element size in bytes.
    pub(crate) fn size(&self) -> usize {
        match self {
            TypeDesc::Integer { size, .. }
            | TypeDesc::Float { size, .. }
            | TypeDesc::Opaque { size } => *size,
            TypeDesc::String {
                size: StringSize::Fixed(n),
            } => *n,
            TypeDesc::String {
                size: StringSize::Variable,
            } => VLEN_ELEMENT_SIZE,
        }
    }

    pub(crate) fn is_variable_str(&self) -> bool {
        matches!(
            self,
            TypeDesc::String {
                size: StringSize::Variable
            }
        )
    }

    fn order(&self) -> Option<ByteOrder> {
        match self {
            TypeDesc::Integer { order, .. } | TypeDesc::Float { order, .. } => Some(*order),
            _ => None,
        }
    }

    /// Convert elements stored as `self` into the `dst` representation.
    ///
    /// Only conversions that preserve the value bit for bit are supported:
    /// the same class, width and signedness, differing at most in byte
    /// order.
    pub(crate) fn convert(
        &self,
        dst: &TypeDesc,
        src_bytes: &[u8],
        out: &mut [u8],
    ) -> Result<(), String> {
        if src_bytes.len() != out.len() {
            return Err(format!(
                "buffer holds {} bytes, {} required",
                out.len(),
                src_bytes.len()
            ));
        }

        let compatible = match (self, dst) {
            (
                TypeDesc::Integer { size: a, signed: sa, .. },
                TypeDesc::Integer { size: b, signed: sb, .. },
            ) => a == b && sa == sb,
            (TypeDesc::Float { size: a, .. }, TypeDesc::Float { size: b, .. }) => a == b,
            (
                TypeDesc::String {
                    size: StringSize::Fixed(a),
                },
                TypeDesc::String {
                    size: StringSize::Fixed(b),
                },
            ) => a == b,
            (TypeDesc::Opaque { size: a }, TypeDesc::Opaque { size: b }) => a == b,
            _ => false,
        };
        if !compatible {
            return Err(format!("no conversion from {self:?} to {dst:?}"));
        }

        out.copy_from_slice(src_bytes);
        if let (Some(a), Some(b)) = (self.order(), dst.order()) {
            let width = self.size();
            if a != b && width > 1 {
                for element in out.chunks_exact_mut(width) {
                    element.reverse();
                }
            }
        }
        Ok(())
    }
}

/// Stored values of a dataset or attribute.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Payload {
    /// Fixed-size elements in the stored type's representation
    Bytes(Vec<u8>),
    /// Variable-length strings, one per element
    Strings(Vec<String>),
}

/// Typed, shaped value of a dataset or attribute.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Array {
    pub(crate) dtype: TypeDesc,
    pub(crate) dims: Vec<u64>,
    pub(crate) payload: Payload,
}

impl Array {
    /// Zero-initialized array.
    pub(crate) fn new(dtype: TypeDesc, dims: Vec<u64>) -> Option<Self> {
        let count = element_count(&dims)?;
        let payload = if dtype.is_variable_str() {
            Payload::Strings(vec![String::new(); count])
        } else {
            Payload::Bytes(vec![0; count.checked_mul(dtype.size())?])
        };
        Some(Self {
            dtype,
            dims,
            payload,
        })
    }

    pub(crate) fn element_count(&self) -> usize {
        element_count(&self.dims).unwrap_or(0)
    }
}

/// Product of extents; a rank-0 space holds one element.
pub(crate) fn element_count(dims: &[u64]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| {
        usize::try_from(d).ok().and_then(|d| acc.checked_mul(d))
    })
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Attribute {
    pub(crate) name: String,
    pub(crate) value: Array,
}

pub(crate) type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeKind {
    Group { children: Vec<(String, NodeId)> },
    Dataset(Array),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) attrs: Vec<Attribute>,
}

impl Node {
    pub(crate) fn group() -> Self {
        Self {
            kind: NodeKind::Group {
                children: Vec::new(),
            },
            attrs: Vec::new(),
        }
    }

    pub(crate) fn dataset(array: Array) -> Self {
        Self {
            kind: NodeKind::Dataset(array),
            attrs: Vec::new(),
        }
    }

    pub(crate) fn info(&self) -> ObjectInfo {
        ObjectInfo {
            object_type: match self.kind {
                NodeKind::Group { .. } => ObjectType::Group,
                NodeKind::Dataset(_) => ObjectType::Dataset,
            },
            num_attrs: self.attrs.len(),
        }
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.name == name)
    }

    pub(crate) fn attr_mut(&mut self, name: &str) -> Option<&mut Attribute> {
        self.attrs.iter_mut().find(|a| a.name == name)
    }
}

/// Arena of nodes; node 0 is the root group.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Tree {
    nodes: Vec<Node>,
}

pub(crate) const ROOT: NodeId = 0;

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node::group()],
        }
    }

    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub(crate) fn children(&self, id: NodeId) -> Option<&[(String, NodeId)]> {
        match &self.node(id)?.kind {
            NodeKind::Group { children } => Some(children),
            NodeKind::Dataset(_) => None,
        }
    }

    pub(crate) fn child(&self, group: NodeId, name: &str) -> Option<NodeId> {
        self.children(group)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| *id)
    }

    /// Resolve `path` starting at `from`; absolute paths start at the root.
    pub(crate) fn resolve(&self, from: NodeId, path: &str) -> Option<NodeId> {
        let start = if path.starts_with('/') { ROOT } else { from };
        segments(path).try_fold(start, |node, name| self.child(node, name))
    }

    /// Resolve everything but the last segment of `path`.
    pub(crate) fn resolve_parent<'p>(
        &self,
        from: NodeId,
        path: &'p str,
    ) -> Option<(NodeId, &'p str)> {
        let parts: Vec<&str> = segments(path).collect();
        let (leaf, parents) = parts.split_last()?;
        let start = if path.starts_with('/') { ROOT } else { from };
        let parent = parents
            .iter()
            .try_fold(start, |node, name| self.child(node, name))?;
        Some((parent, *leaf))
    }

    /// Link a new node under `parent`. Fails if `parent` is not a group or
    /// already has a member called `name`.
    pub(crate) fn insert(&mut self, parent: NodeId, name: &str, node: Node) -> Option<NodeId> {
        if name.is_empty() || name.contains('/') || self.child(parent, name).is_some() {
            return None;
        }
        let id = self.nodes.len();
        match &mut self.nodes.get_mut(parent)?.kind {
            NodeKind::Group { children } => children.push((name.to_string(), id)),
            NodeKind::Dataset(_) => return None,
        }
        self.nodes.push(node);
        Some(id)
    }

    /// Depth-first pre-order walk below `from`, passing relative paths.
    pub(crate) fn walk(&self, from: NodeId, visitor: &mut dyn FnMut(&str, &Node)) {
        self.walk_inner(from, "", visitor);
    }

    fn walk_inner(&self, id: NodeId, prefix: &str, visitor: &mut dyn FnMut(&str, &Node)) {
        let Some(children) = self.children(id) else {
            return;
        };
        for (name, child) in children {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            if let Some(node) = self.node(*child) {
                visitor(&path, node);
                self.walk_inner(*child, &path, visitor);
            }
        }
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree {
        let mut tree = Tree::new();
        let data = tree.insert(ROOT, "data", Node::group()).unwrap();
        let tomo = tree.insert(data, "tomography", Node::group()).unwrap();
        let array = Array::new(TypeDesc::predefined(PredefinedType::StdU8Le), vec![2, 3]).unwrap();
        tree.insert(tomo, "data", Node::dataset(array)).unwrap();
        tree
    }

    #[test]
    fn test_resolve_paths() {
        let tree = sample();
        assert_eq!(tree.resolve(ROOT, "/"), Some(ROOT));
        assert_eq!(tree.resolve(ROOT, ""), Some(ROOT));
        assert!(tree.resolve(ROOT, "/data/tomography/data").is_some());
        assert_eq!(
            tree.resolve(ROOT, "/data/tomography/"),
            tree.resolve(ROOT, "data/./tomography")
        );
        assert_eq!(tree.resolve(ROOT, "/data/missing"), None);
        assert_eq!(tree.resolve(ROOT, "/data/tomography/data/below"), None);
    }

    #[test]
    fn test_relative_resolution_from_group() {
        let tree = sample();
        let data = tree.resolve(ROOT, "/data").unwrap();
        assert_eq!(
            tree.resolve(data, "tomography/data"),
            tree.resolve(ROOT, "/data/tomography/data")
        );
        assert_eq!(tree.resolve(data, "/data"), Some(data));
    }

    #[test]
    fn test_insert_rejects_duplicates_and_datasets() {
        let mut tree = sample();
        let tomo = tree.resolve(ROOT, "/data/tomography").unwrap();
        let ds = tree.resolve(ROOT, "/data/tomography/data").unwrap();
        assert!(tree.insert(tomo, "data", Node::group()).is_none());
        assert!(tree.insert(ds, "x", Node::group()).is_none());
        assert!(tree.insert(tomo, "", Node::group()).is_none());
        assert!(tree.insert(tomo, "a/b", Node::group()).is_none());
    }

    #[test]
    fn test_walk_order() {
        let tree = sample();
        let mut seen = Vec::new();
        tree.walk(ROOT, &mut |path, _| seen.push(path.to_string()));
        assert_eq!(
            seen,
            vec!["data", "data/tomography", "data/tomography/data"]
        );
    }

    #[test]
    fn test_convert_swaps_byte_order() {
        let le = TypeDesc::Integer {
            size: 2,
            signed: false,
            order: ByteOrder::Little,
        };
        let be = TypeDesc::Integer {
            size: 2,
            signed: false,
            order: ByteOrder::Big,
        };
        let mut out = [0u8; 4];
        le.convert(&be, &[0x01, 0x02, 0x03, 0x04], &mut out).unwrap();
        assert_eq!(out, [0x02, 0x01, 0x04, 0x03]);
    }

    #[test]
    fn test_convert_rejects_lossy_pairs() {
        let i32_le = TypeDesc::predefined(PredefinedType::StdI32Le);
        let f32_le = TypeDesc::predefined(PredefinedType::IeeeF32Le);
        let u32_le = TypeDesc::predefined(PredefinedType::StdU32Le);
        let mut out = [0u8; 4];
        assert!(i32_le.convert(&f32_le, &[0; 4], &mut out).is_err());
        assert!(i32_le.convert(&u32_le, &[0; 4], &mut out).is_err());
        assert!(i32_le.convert(&i32_le, &[0; 8], &mut out).is_err());
        assert!(i32_le.convert(&i32_le, &[1, 2, 3, 4], &mut out).is_ok());
        assert_eq!(out, [1, 2, 3, 4]);
    }

    #[test]
    fn test_element_count() {
        assert_eq!(element_count(&[74, 256, 256]), Some(74 * 256 * 256));
        assert_eq!(element_count(&[]), Some(1));
        assert_eq!(element_count(&[0, 5]), Some(0));
        assert_eq!(element_count(&[u64::MAX, 2]), None);
    }
}
