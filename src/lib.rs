// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! # h5access
//!
//! Typed access to HDF5 files: groups that hold datasets and other groups,
//! with named attributes on both.
//!
//! The library is organized in three layers:
//! - `native/` - The container library interface ([`native::NativeLibrary`]),
//!   scoped handle ownership ([`native::ScopedHandle`]), the HDF5 C library
//!   binding used by default and an in-process test double
//!   ([`native::MemoryLibrary`])
//! - `core/` - Errors, the logical element types and their native mapping,
//!   and buffer reshaping
//! - `io/` - Path, attribute and dataset accessors and the [`Container`]
//!   façade
//!
//! Callers navigate by path, inspect element types and shapes without
//! reading payloads, and transfer whole datasets as flat or nested vectors.
//! Requesting a type other than the stored one is an error, never a silent
//! conversion.
//!
//! ## Features
//!
//! - `hdf5` (default) - Link the HDF5 C library through `hdf5-sys` and use
//!   it as [`native::DefaultLibrary`]. Without it the default falls back to
//!   [`native::MemoryLibrary`], whose files live only in memory.
//!
//! ## Example: Reading
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use h5access::{Container, DataType, OpenMode};
//!
//! let container = Container::open("scan.h5", OpenMode::ReadOnly);
//! assert_eq!(container.data_type("/data/tomography/data"), DataType::UInt8);
//! let dims = container.dimensions("/data/tomography/data")?;
//! let (voxels, _) = container.read_data_flat::<u8>("/data/tomography/data")?;
//! assert_eq!(voxels.len(), dims.iter().product::<usize>());
//! let name: String = container.attribute("/data/tomography/dim1", "name")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Example: Writing
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use h5access::{Container, OpenMode};
//!
//! let container = Container::open("out.h5", OpenMode::WriteOnly);
//! container.create_group("/images")?;
//! container.write_data("/images", "frame", &[2, 3], &[0u16, 1, 2, 3, 4, 5])?;
//! container.set_attribute("/images/frame", "exposure", 0.5f64)?;
//! # Ok(())
//! # }
//! ```

// Core types
pub mod core;

// Re-export core types for convenience
pub use core::{AccessError, DataType, Element, ErrorKind, Result};

// Native library interface and implementations
pub mod native;

// Accessors and the container façade
pub mod io;

pub use io::{
    AttributeValue, Container, ContainerBuilder, ContainerConfig, DatasetValues, ObjectKind,
    OpenMode,
};
