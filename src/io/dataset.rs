// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Dataset access.
//!
//! Datasets hold rectangular N-dimensional arrays of one element type.
//! Reads transfer the full extent as a flat row-major buffer, which the
//! rank-specific entry points reshape. Each read runs the same steps: open
//! the dataset, check the stored type, query the shape, then transfer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::shape::{describe, element_count, reshape_2d};
use crate::core::{logical_of, AccessError, DataType, Element, Result};
use crate::native::{is_valid_hid, Hid, NativeLibrary, ObjectType, ScopedHandle};

use super::{join_path, logged, new_space, open_dataset, open_group};

/// Contents of a dataset whose element type is only known at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DatasetValues {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt8(Vec<u8>),
    UInt16(Vec<u16>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! for_each_variant {
    ($self:expr, $values:ident => $body:expr) => {
        match $self {
            DatasetValues::Int8($values) => $body,
            DatasetValues::Int16($values) => $body,
            DatasetValues::Int32($values) => $body,
            DatasetValues::Int64($values) => $body,
            DatasetValues::UInt8($values) => $body,
            DatasetValues::UInt16($values) => $body,
            DatasetValues::UInt32($values) => $body,
            DatasetValues::UInt64($values) => $body,
            DatasetValues::Float32($values) => $body,
            DatasetValues::Float64($values) => $body,
        }
    };
}

impl DatasetValues {
    /// Logical element type of the values.
    pub fn data_type(&self) -> DataType {
        match self {
            DatasetValues::Int8(_) => DataType::Int8,
            DatasetValues::Int16(_) => DataType::Int16,
            DatasetValues::Int32(_) => DataType::Int32,
            DatasetValues::Int64(_) => DataType::Int64,
            DatasetValues::UInt8(_) => DataType::UInt8,
            DatasetValues::UInt16(_) => DataType::UInt16,
            DatasetValues::UInt32(_) => DataType::UInt32,
            DatasetValues::UInt64(_) => DataType::UInt64,
            DatasetValues::Float32(_) => DataType::Float32,
            DatasetValues::Float64(_) => DataType::Float64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        for_each_variant!(self, values => values.len())
    }

    /// Check if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index` widened to `f64`.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        for_each_variant!(self, values => values.get(index).map(|v| *v as f64))
    }
}

/// Reads and writes datasets in an open container.
pub struct DatasetAccessor<'a, L> {
    lib: &'a L,
    root: Hid,
}

impl<'a, L: NativeLibrary> DatasetAccessor<'a, L> {
    /// Create an accessor for the file handle `root`.
    pub fn new(lib: &'a L, root: Hid) -> Self {
        Self { lib, root }
    }

    /// Check if `path` is a dataset.
    pub fn is_dataset(&self, path: &str) -> bool {
        is_valid_hid(self.root)
            && matches!(
                self.lib.object_info(self.root, path),
                Ok(info) if info.object_type == ObjectType::Dataset
            )
    }

    /// Logical element type of the dataset at `path`; `DataType::None` if
    /// there is no dataset or its type has no logical counterpart.
    pub fn element_type(&self, path: &str) -> DataType {
        if !is_valid_hid(self.root) {
            return DataType::None;
        }
        let dataset = open_dataset(self.lib, self.root, path);
        if !dataset.valid() {
            return DataType::None;
        }
        let stored = ScopedHandle::new(
            self.lib,
            self.lib.dataset_get_type(dataset.value()),
            L::type_close,
        );
        if !stored.valid() {
            return DataType::None;
        }
        logical_of(self.lib, stored.value())
    }

    /// Extents of the dataset at `path`, slowest-varying first.
    ///
    /// # Errors
    ///
    /// - `NotOpen` if there is no dataset at `path`
    /// - `ShapeMismatch` for a scalar (rank 0) dataset
    /// - `ShapeInconsistency` if the rank and extents queries disagree
    pub fn dimensions(&self, path: &str) -> Result<Vec<usize>> {
        let dataset = self.open(path)?;
        self.extents(&dataset, path)
    }

    /// Number of dimensions of the dataset at `path`.
    pub fn rank(&self, path: &str) -> Result<usize> {
        self.dimensions(path).map(|dims| dims.len())
    }

    /// Read the full dataset as a flat row-major buffer, with its shape.
    pub fn read_flat<T: Element>(&self, path: &str) -> Result<(Vec<T>, Vec<usize>)> {
        self.read_checked(path, None)
    }

    /// Read a rank-1 dataset.
    pub fn read_1d<T: Element>(&self, path: &str) -> Result<Vec<T>> {
        self.read_checked(path, Some(1)).map(|(data, _)| data)
    }

    /// Read a rank-2 dataset as rows; element `[i][j]` is flat element
    /// `i * cols + j`.
    pub fn read_2d<T: Element>(&self, path: &str) -> Result<Vec<Vec<T>>> {
        let (data, dims) = self.read_checked(path, Some(2))?;
        let count = data.len();
        reshape_2d(data, dims[0], dims[1]).ok_or_else(|| {
            AccessError::shape_mismatch(path, describe(&dims), format!("{count} elements"))
        })
    }

    /// Read the full dataset into the front of `out`, returning the shape.
    ///
    /// `out` must hold at least as many elements as the dataset.
    pub fn read_into<T: Element>(&self, path: &str, out: &mut [T]) -> Result<Vec<usize>> {
        let dataset = self.open(path)?;
        self.check_type::<T>(&dataset, path)?;
        let dims = self.extents(&dataset, path)?;
        let count = Self::count(&dims, path)?;
        if out.len() < count {
            return Err(AccessError::shape_mismatch(
                path,
                format!("buffer of at least {count} elements"),
                format!("buffer of {} elements", out.len()),
            ));
        }
        self.transfer::<T>(&dataset, path, &mut out[..count])?;
        Ok(dims)
    }

    /// Read the full dataset, choosing the element type from the stored
    /// type.
    pub fn read_values(&self, path: &str) -> Result<(DatasetValues, Vec<usize>)> {
        if !self.is_dataset(path) {
            return Err(AccessError::not_open(path));
        }
        match self.element_type(path) {
            DataType::Int8 => self.read_as(path, DatasetValues::Int8),
            DataType::Int16 => self.read_as(path, DatasetValues::Int16),
            DataType::Int32 => self.read_as(path, DatasetValues::Int32),
            DataType::Int64 => self.read_as(path, DatasetValues::Int64),
            DataType::UInt8 => self.read_as(path, DatasetValues::UInt8),
            DataType::UInt16 => self.read_as(path, DatasetValues::UInt16),
            DataType::UInt32 => self.read_as(path, DatasetValues::UInt32),
            DataType::UInt64 => self.read_as(path, DatasetValues::UInt64),
            DataType::Float32 => self.read_as(path, DatasetValues::Float32),
            DataType::Float64 => self.read_as(path, DatasetValues::Float64),
            DataType::String | DataType::None => Err(logged(AccessError::unsupported_type(path))),
        }
    }

    /// Create dataset `name` in the group at `path` with extents `dims` and
    /// write `data`, row-major, into it.
    ///
    /// `data.len()` must equal the product of `dims`; nothing is created
    /// otherwise.
    pub fn write<T: Element>(
        &self,
        path: &str,
        name: &str,
        dims: &[usize],
        data: &[T],
    ) -> Result<()> {
        let target = join_path(path, name);
        if !is_valid_hid(self.root) {
            return Err(AccessError::not_open(&target));
        }
        if dims.is_empty() {
            return Err(AccessError::shape_mismatch(&target, "rank >= 1", "rank 0"));
        }
        let count = Self::count(dims, &target)?;
        if data.len() != count {
            return Err(AccessError::shape_mismatch(
                &target,
                format!("{count} elements for {}", describe(dims)),
                format!("{} elements", data.len()),
            ));
        }
        let (on_disk, memory) = match (T::DATA_TYPE.on_disk_type(), T::DATA_TYPE.memory_type()) {
            (Some(on_disk), Some(memory)) => {
                (self.lib.predefined(on_disk), self.lib.predefined(memory))
            }
            _ => return Err(AccessError::unsupported_type(&target)),
        };

        let group = open_group(self.lib, self.root, path);
        if !group.valid() {
            return Err(logged(AccessError::not_open(path)));
        }
        let extents: Vec<u64> = dims.iter().map(|&d| d as u64).collect();
        let space = new_space(self.lib, &extents);
        if !space.valid() {
            return Err(AccessError::io_failure(
                "create dataspace",
                &target,
                "native create failed",
            ));
        }
        let dataset = ScopedHandle::new(
            self.lib,
            self.lib.dataset_create(group.value(), name, on_disk, space.value()),
            L::dataset_close,
        );
        if !dataset.valid() {
            return Err(logged(AccessError::io_failure(
                "create dataset",
                &target,
                "native create failed",
            )));
        }

        self.lib
            .dataset_write(dataset.value(), memory, bytemuck::cast_slice(data))
            .map_err(|e| logged(AccessError::io_failure("write dataset", &target, e.to_string())))
    }

    fn read_as<T: Element>(
        &self,
        path: &str,
        wrap: fn(Vec<T>) -> DatasetValues,
    ) -> Result<(DatasetValues, Vec<usize>)> {
        self.read_flat::<T>(path).map(|(data, dims)| (wrap(data), dims))
    }

    fn open(&self, path: &str) -> Result<ScopedHandle<'a, L>> {
        if !is_valid_hid(self.root) {
            return Err(AccessError::not_open(path));
        }
        let dataset = open_dataset(self.lib, self.root, path);
        if !dataset.valid() {
            return Err(logged(AccessError::not_open(path)));
        }
        Ok(dataset)
    }

    fn read_checked<T: Element>(
        &self,
        path: &str,
        rank: Option<usize>,
    ) -> Result<(Vec<T>, Vec<usize>)> {
        let dataset = self.open(path)?;
        self.check_type::<T>(&dataset, path)?;
        let dims = self.extents(&dataset, path)?;
        if let Some(rank) = rank {
            if dims.len() != rank {
                return Err(AccessError::shape_mismatch(
                    path,
                    format!("rank {rank}"),
                    format!("rank {}", dims.len()),
                ));
            }
        }

        let mut data = vec![T::default(); Self::count(&dims, path)?];
        self.transfer::<T>(&dataset, path, &mut data)?;
        Ok((data, dims))
    }

    fn check_type<T: Element>(&self, dataset: &ScopedHandle<'a, L>, path: &str) -> Result<()> {
        let stored = ScopedHandle::new(
            self.lib,
            self.lib.dataset_get_type(dataset.value()),
            L::type_close,
        );
        if !stored.valid() {
            return Err(AccessError::io_failure("read dataset", path, "cannot query type"));
        }
        let Some(on_disk) = T::DATA_TYPE.on_disk_type() else {
            return Err(AccessError::unsupported_type(path));
        };
        let requested = self.lib.predefined(on_disk);
        if matches!(self.lib.type_equal(requested, stored.value()), Ok(true)) {
            return Ok(());
        }
        debug!(
            path,
            stored = stored.value(),
            requested,
            "dataset type ids differ"
        );
        Err(logged(AccessError::type_mismatch(
            path,
            T::DATA_TYPE,
            logical_of(self.lib, stored.value()),
        )))
    }

    fn extents(&self, dataset: &ScopedHandle<'a, L>, path: &str) -> Result<Vec<usize>> {
        let space = ScopedHandle::new(
            self.lib,
            self.lib.dataset_get_space(dataset.value()),
            L::space_close,
        );
        if !space.valid() {
            return Err(AccessError::io_failure("query shape", path, "cannot open dataspace"));
        }
        let rank = self
            .lib
            .space_ndims(space.value())
            .map_err(|e| AccessError::io_failure("query shape", path, e.to_string()))?;
        if rank < 1 {
            return Err(AccessError::shape_mismatch(path, "rank >= 1", "rank 0"));
        }

        let mut dims = vec![0u64; rank];
        let extents_rank = self
            .lib
            .space_dims(space.value(), &mut dims)
            .map_err(|e| AccessError::io_failure("query shape", path, e.to_string()))?;
        if extents_rank != rank {
            return Err(logged(AccessError::shape_inconsistency(path, rank, extents_rank)));
        }

        dims.into_iter()
            .map(|d| {
                usize::try_from(d).map_err(|_| {
                    AccessError::shape_mismatch(path, "extents within usize", d.to_string())
                })
            })
            .collect()
    }

    fn count(dims: &[usize], path: &str) -> Result<usize> {
        element_count(dims).ok_or_else(|| {
            AccessError::shape_mismatch(path, "addressable element count", describe(dims))
        })
    }

    fn transfer<T: Element>(
        &self,
        dataset: &ScopedHandle<'a, L>,
        path: &str,
        out: &mut [T],
    ) -> Result<()> {
        let Some(memory) = T::DATA_TYPE.memory_type() else {
            return Err(AccessError::unsupported_type(path));
        };
        self.lib
            .dataset_read(
                dataset.value(),
                self.lib.predefined(memory),
                bytemuck::cast_slice_mut(out),
            )
            .map_err(|e| logged(AccessError::io_failure("read dataset", path, e.to_string())))
    }
}
