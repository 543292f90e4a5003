// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Logical element types and their native type mapping.
//!
//! [`DataType`] is the closed set of element types exposed to callers. Each
//! fixed-width variant is bound to one on-disk native type (little-endian
//! standard type) and one in-memory native type (platform representation)
//! through the static [`TYPE_TABLE`]. Strings are deliberately absent from
//! the table: their stored size and encoding vary, so they are recognized by
//! type class instead.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::native::{Hid, NativeLibrary, PredefinedType, TypeClass};

/// Logical element type of a dataset or attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 8-bit unsigned integer
    UInt8,
    /// 16-bit unsigned integer
    UInt16,
    /// 32-bit unsigned integer
    UInt32,
    /// 64-bit unsigned integer
    UInt64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// String (fixed or variable length)
    String,
    /// Absent or unrecognized type
    None,
}

/// One row of the type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeEntry {
    /// Logical type
    pub data_type: DataType,
    /// Native type used for stored bytes
    pub on_disk: PredefinedType,
    /// Native type used for the caller's buffers
    pub memory: PredefinedType,
    /// Element width in bytes
    pub size: usize,
    /// Display name
    pub name: &'static str,
}

/// Fixed-width numeric types and their native counterparts.
pub static TYPE_TABLE: [TypeEntry; 10] = [
    TypeEntry {
        data_type: DataType::Int8,
        on_disk: PredefinedType::StdI8Le,
        memory: PredefinedType::NativeI8,
        size: 1,
        name: "Int8",
    },
    TypeEntry {
        data_type: DataType::Int16,
        on_disk: PredefinedType::StdI16Le,
        memory: PredefinedType::NativeI16,
        size: 2,
        name: "Int16",
    },
    TypeEntry {
        data_type: DataType::Int32,
        on_disk: PredefinedType::StdI32Le,
        memory: PredefinedType::NativeI32,
        size: 4,
        name: "Int32",
    },
    TypeEntry {
        data_type: DataType::Int64,
        on_disk: PredefinedType::StdI64Le,
        memory: PredefinedType::NativeI64,
        size: 8,
        name: "Int64",
    },
    TypeEntry {
        data_type: DataType::UInt8,
        on_disk: PredefinedType::StdU8Le,
        memory: PredefinedType::NativeU8,
        size: 1,
        name: "UInt8",
    },
    TypeEntry {
        data_type: DataType::UInt16,
        on_disk: PredefinedType::StdU16Le,
        memory: PredefinedType::NativeU16,
        size: 2,
        name: "UInt16",
    },
    TypeEntry {
        data_type: DataType::UInt32,
        on_disk: PredefinedType::StdU32Le,
        memory: PredefinedType::NativeU32,
        size: 4,
        name: "UInt32",
    },
    TypeEntry {
        data_type: DataType::UInt64,
        on_disk: PredefinedType::StdU64Le,
        memory: PredefinedType::NativeU64,
        size: 8,
        name: "UInt64",
    },
    TypeEntry {
        data_type: DataType::Float32,
        on_disk: PredefinedType::IeeeF32Le,
        memory: PredefinedType::NativeFloat,
        size: 4,
        name: "Float",
    },
    TypeEntry {
        data_type: DataType::Float64,
        on_disk: PredefinedType::IeeeF64Le,
        memory: PredefinedType::NativeDouble,
        size: 8,
        name: "Double",
    },
];

const STRING_NAME: &str = "String";

impl DataType {
    /// Table row for a fixed-width type.
    pub fn entry(self) -> Option<&'static TypeEntry> {
        TYPE_TABLE.iter().find(|e| e.data_type == self)
    }

    /// Native type used for the stored representation.
    ///
    /// Defined for every variant except `None`.
    pub fn on_disk_type(self) -> Option<PredefinedType> {
        match self {
            DataType::String => Some(PredefinedType::CString),
            DataType::None => None,
            other => other.entry().map(|e| e.on_disk),
        }
    }

    /// Native type used for in-memory buffers.
    ///
    /// Defined for every variant except `None`.
    pub fn memory_type(self) -> Option<PredefinedType> {
        match self {
            DataType::String => Some(PredefinedType::CString),
            DataType::None => None,
            other => other.entry().map(|e| e.memory),
        }
    }

    /// Element width in bytes, for fixed-width types.
    pub fn size(self) -> Option<usize> {
        self.entry().map(|e| e.size)
    }

    /// Display name; empty for `None`.
    pub fn name(self) -> &'static str {
        match self {
            DataType::String => STRING_NAME,
            DataType::None => "",
            other => other.entry().map_or("", |e| e.name),
        }
    }

    pub(crate) fn name_or(self, fallback: &'static str) -> &'static str {
        match self.name() {
            "" => fallback,
            name => name,
        }
    }

    /// Check if this is one of the fixed-width numeric types.
    pub fn is_numeric(self) -> bool {
        self.entry().is_some()
    }

    /// Parse a display name back into a type.
    pub fn try_from_name(name: &str) -> Option<Self> {
        if name == STRING_NAME {
            return Some(DataType::String);
        }
        TYPE_TABLE
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.data_type)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Display name for a logical type; empty string for `None`.
pub fn type_name(data_type: DataType) -> &'static str {
    data_type.name()
}

/// Map a native type handle to its logical type.
///
/// The comparison uses the library's semantic equality, since two handles
/// for the same type generally carry different identifiers. A type that
/// matches no table row is reported as `String` when its class is string,
/// and as `None` otherwise.
pub fn logical_of<L: NativeLibrary + ?Sized>(lib: &L, native_type: Hid) -> DataType {
    for entry in TYPE_TABLE.iter() {
        if let Ok(true) = lib.type_equal(lib.predefined(entry.on_disk), native_type) {
            return entry.data_type;
        }
    }

    match lib.type_class(native_type) {
        Ok(TypeClass::String) => DataType::String,
        _ => DataType::None,
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust scalar types that can be transferred as dataset or attribute
/// elements.
pub trait Element:
    bytemuck::Pod + Default + PartialEq + fmt::Debug + sealed::Sealed + 'static
{
    /// Logical type of this element.
    const DATA_TYPE: DataType;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const DATA_TYPE: DataType = DataType::$variant;
            }
        )*
    };
}

impl_element! {
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}
