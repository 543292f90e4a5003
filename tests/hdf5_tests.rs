// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Tests against real HDF5 files on disk.
//!
//! Run with: cargo test --test hdf5_tests

#![cfg(feature = "hdf5")]

mod common;

use std::path::PathBuf;

use common::{expected_angles, write_tomography, ANGLES, AXIS_X, TOMOGRAPHY, VOLUME_DIMS};
use h5access::native::Hdf5Library;
use h5access::{AccessError, Container, ContainerBuilder, DataType, ErrorKind, ObjectKind, OpenMode};
use tempfile::TempDir;

const SIGNATURE: &[u8] = b"\x89HDF\r\n\x1a\n";

fn tomography(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("tomography.h5");
    let writer = Container::open(&path, OpenMode::WriteOnly);
    write_tomography(&writer);
    drop(writer);
    path
}

fn assert_no_leaked_buffers(container: &Container<Hdf5Library>) {
    assert_eq!(
        container.library().outstanding_vlen_count(),
        0,
        "variable-length buffers left unreclaimed"
    );
}

#[test]
fn test_written_file_is_hdf5() {
    let dir = tempfile::tempdir().unwrap();
    let path = tomography(&dir);

    let bytes = std::fs::read(&path).unwrap();
    assert!(
        bytes.starts_with(SIGNATURE),
        "missing HDF5 superblock signature"
    );
}

#[test]
fn test_read_tomography() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::open(tomography(&dir), OpenMode::ReadOnly);
    assert!(container.is_valid());

    assert_eq!(container.data_type(ANGLES), DataType::Float32);
    assert_eq!(
        container.read_data::<f32>(ANGLES).unwrap(),
        expected_angles()
    );
    assert_eq!(
        container.dimensions(&format!("{TOMOGRAPHY}/data")).unwrap(),
        VOLUME_DIMS
    );
    assert_eq!(container.read_data::<f32>(AXIS_X).unwrap()[255], 255.0);

    let name: String = container.attribute(ANGLES, "name").unwrap();
    let units: String = container.attribute(ANGLES, "units").unwrap();
    assert_eq!(name, "angles");
    assert_eq!(units, "[deg]");
    assert_eq!(container.attribute_type(ANGLES, "units"), DataType::String);
    assert_no_leaked_buffers(&container);
}

#[test]
fn test_children_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::open(dir.path().join("order.h5"), OpenMode::WriteOnly);
    container.create_group("/zeta").unwrap();
    container.write_data("/", "alpha", &[1], &[1u8]).unwrap();
    container.create_group("/mid").unwrap();

    assert_eq!(container.children("/").unwrap(), ["alpha", "mid", "zeta"]);
    assert_eq!(container.kind_of("/alpha"), ObjectKind::Dataset);
    assert!(container.is_group("/mid"));
}

#[test]
fn test_type_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::open(tomography(&dir), OpenMode::ReadOnly);

    let err = container.read_data::<f64>(ANGLES).unwrap_err();
    assert_eq!(
        err,
        AccessError::type_mismatch(ANGLES, DataType::Float64, DataType::Float32)
    );
    let err = container.attribute::<f32>(ANGLES, "units").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_no_leaked_buffers(&container);
}

#[test]
fn test_attribute_replacement() {
    let dir = tempfile::tempdir().unwrap();
    let path = tomography(&dir);

    let editor = Container::open(&path, OpenMode::ReadWrite);
    editor.set_fixed_string_attribute(ANGLES, "units", "[rad]").unwrap();
    editor.set_attribute(ANGLES, "name", "theta".to_string()).unwrap();
    drop(editor);

    let reader = Container::open(&path, OpenMode::ReadOnly);
    let units: String = reader.attribute(ANGLES, "units").unwrap();
    let name: String = reader.attribute(ANGLES, "name").unwrap();
    assert_eq!(units, "[rad]");
    assert_eq!(name, "theta");
    assert!(!reader.has_attribute(ANGLES, ".~units"));
    assert!(!reader.has_attribute(ANGLES, ".~name"));
    assert_no_leaked_buffers(&reader);
}

#[test]
fn test_builder_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("built.h5");

    let writer = ContainerBuilder::new()
        .path(&path)
        .mode(OpenMode::WriteOnly)
        .build()
        .unwrap();
    writer.create_group("/g").unwrap();
    writer.write_data("/g", "d", &[2, 2], &[1i64, -2, 3, -4]).unwrap();
    drop(writer);

    let reader = ContainerBuilder::new().path(&path).build().unwrap();
    let (values, dims) = reader.read_data_flat::<i64>("/g/d").unwrap();
    assert_eq!(dims, [2, 2]);
    assert_eq!(values, [1, -2, 3, -4]);
    assert_eq!(reader.all_datasets(), ["g/d"]);
}

#[test]
fn test_missing_file_is_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let container = Container::open(dir.path().join("absent.h5"), OpenMode::ReadOnly);
    assert!(!container.is_valid());

    let err = ContainerBuilder::new()
        .path(dir.path().join("absent.h5"))
        .build()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotOpen);
}
