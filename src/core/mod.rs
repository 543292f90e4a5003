// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core types used throughout h5access.
//!
//! This module provides the foundational types for the library:
//! - [`AccessError`] - Error taxonomy for container operations
//! - [`DataType`] - Logical element types and the native type table
//! - [`Element`] - Rust scalars that can be transferred as elements
//! - [`shape`] - Flat/nested buffer conversions

pub mod error;
pub mod shape;
pub mod types;

pub use error::{AccessError, ErrorKind, Result};
pub use types::{logical_of, type_name, DataType, Element, TypeEntry, TYPE_TABLE};
