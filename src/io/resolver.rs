// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Path queries: object kinds, group members and attribute existence.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{AccessError, Result};
use crate::native::{is_valid_hid, Hid, NativeLibrary, ObjectType};

use super::{logged, open_group};

/// What a path refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Dataset
    Dataset,
    /// Group
    Group,
    /// Some other object (e.g. a named datatype)
    Other,
    /// Nothing at that path, or the container is not open
    NotFound,
}

/// Resolves paths against an open container.
///
/// Every query resolves its path again; nothing is cached between calls.
pub struct PathResolver<'a, L> {
    lib: &'a L,
    root: Hid,
}

impl<'a, L: NativeLibrary> PathResolver<'a, L> {
    /// Create a resolver for the file handle `root`.
    ///
    /// An invalid `root` yields a resolver whose queries all report
    /// "not found" or `NotOpen`.
    pub fn new(lib: &'a L, root: Hid) -> Self {
        Self { lib, root }
    }

    /// Kind of the object at `path`.
    pub fn kind_of(&self, path: &str) -> ObjectKind {
        if !is_valid_hid(self.root) {
            return ObjectKind::NotFound;
        }
        match self.lib.object_info(self.root, path) {
            Ok(info) => match info.object_type {
                ObjectType::Dataset => ObjectKind::Dataset,
                ObjectType::Group => ObjectKind::Group,
                ObjectType::Other => ObjectKind::Other,
            },
            Err(_) => ObjectKind::NotFound,
        }
    }

    /// Check if `path` is a group.
    pub fn is_group(&self, path: &str) -> bool {
        self.kind_of(path) == ObjectKind::Group
    }

    /// Names of the immediate members of the group at `path`, in the
    /// order the file enumerates them.
    pub fn children(&self, path: &str) -> Result<Vec<String>> {
        if !is_valid_hid(self.root) {
            return Err(AccessError::not_open(path));
        }
        let group = open_group(self.lib, self.root, path);
        if !group.valid() {
            return Err(logged(AccessError::not_open(path)));
        }

        let count = self
            .lib
            .group_num_objs(group.value())
            .map_err(|e| AccessError::io_failure("list group", path, e.to_string()))?;

        (0..count)
            .map(|index| {
                self.lib
                    .group_objname_by_idx(group.value(), index)
                    .map_err(|e| AccessError::io_failure("list group", path, e.to_string()))
            })
            .collect()
    }

    /// Check if the object at `path` carries at least one attribute.
    pub fn has_attributes(&self, path: &str) -> bool {
        is_valid_hid(self.root)
            && self
                .lib
                .object_info(self.root, path)
                .map_or(false, |info| info.num_attrs > 0)
    }

    /// Check if the object at `path` carries an attribute `name`, of any
    /// type.
    pub fn has_attribute(&self, path: &str, name: &str) -> bool {
        is_valid_hid(self.root)
            && self
                .lib
                .attr_exists_by_name(self.root, path, name)
                .unwrap_or(false)
    }

    /// Paths of every dataset in the file, relative to the root, depth
    /// first in enumeration order.
    pub fn all_datasets(&self) -> Vec<String> {
        if !is_valid_hid(self.root) {
            return Vec::new();
        }
        let mut paths = Vec::new();
        let visited = self.lib.visit(self.root, &mut |path, info| {
            if info.object_type == ObjectType::Dataset {
                paths.push(path.to_string());
            }
        });
        if let Err(e) = visited {
            warn!(error = %e, "cannot enumerate datasets");
            return Vec::new();
        }
        paths
    }
}
