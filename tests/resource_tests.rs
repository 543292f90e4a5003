// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Handle lifetime and failure-path tests.
//!
//! Every operation, successful or not, must leave only the container's own
//! file handle open. Native failures are produced with
//! [`FaultInjection`].
//!
//! Run with: cargo test --test resource_tests

mod common;

use common::*;
use h5access::native::{FaultInjection, FileStore};
use h5access::{AccessError, ContainerBuilder, DataType, ErrorKind, ObjectKind, OpenMode};

#[test]
fn test_no_leaks_after_successful_operations() {
    let fixture = TomographyFixture::create();
    let container = fixture.open();

    container.children(TOMOGRAPHY).unwrap();
    container.all_datasets();
    container.kind_of(VOLUME);
    container.has_attributes(ANGLES);
    container.has_attribute(ANGLES, "name");
    container.attribute_type(ANGLES, "units");
    container.attribute::<String>(ANGLES, "name").unwrap();
    container.attribute::<String>(ANGLES, "units").unwrap();
    container.data_type(VOLUME);
    container.dimensions(VOLUME).unwrap();
    container.read_data::<f32>(AXIS_X).unwrap();
    container.read_data_flat::<u8>(VOLUME).unwrap();
    container.read_values(ANGLES).unwrap();
    assert_no_leaked_handles(&container);
}

#[test]
fn test_no_leaks_after_failed_operations() {
    let fixture = TomographyFixture::create();
    let container = fixture.open();

    assert!(container.children(VOLUME).is_err());
    assert!(container.children("/nope").is_err());
    assert!(container.attribute::<i32>(ANGLES, "missing").is_err());
    assert!(container.attribute::<f64>(ANGLES, "name").is_err());
    assert!(container.attribute::<String>("/nope", "name").is_err());
    assert!(container.dimensions(TOMOGRAPHY).is_err());
    assert!(container.read_data::<i8>(ANGLES).is_err());
    assert!(container.read_data_2d::<f32>(ANGLES).is_err());
    let mut small = [0.0f32; 4];
    assert!(container.read_data_into(ANGLES, &mut small).is_err());
    assert!(container.write_data(TOMOGRAPHY, "x", &[1], &[1u8]).is_err());
    assert_no_leaked_handles(&container);
}

#[test]
fn test_short_buffer_is_left_untouched() {
    let fixture = TomographyFixture::create();
    let container = fixture.open();

    let mut small = [1.5f32; 4];
    let err = container.read_data_into(ANGLES, &mut small).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeMismatch);
    assert_eq!(small, [1.5; 4]);
    assert_no_leaked_handles(&container);
}

#[test]
fn test_rank_drift_is_reported() {
    let fixture = TomographyFixture::create();
    let container = fixture.open_with_faults(OpenMode::ReadOnly, FaultInjection {
        rank_drift: true,
        ..Default::default()
    });
    assert!(container.is_valid());

    let err = container.dimensions(VOLUME).unwrap_err();
    assert_eq!(err, AccessError::shape_inconsistency(VOLUME, 3, 2));
    let err = container.read_data::<f32>(ANGLES).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShapeInconsistency);

    // Metadata that needs no extents is unaffected.
    assert_eq!(container.data_type(VOLUME), DataType::UInt8);
    assert_no_leaked_handles(&container);
}

#[test]
fn test_failed_transfers_are_io_failures() {
    let fixture = TomographyFixture::create();
    let container = fixture.open_with_faults(OpenMode::ReadOnly, FaultInjection {
        fail_transfers: true,
        ..Default::default()
    });

    let err = container.read_data::<f32>(ANGLES).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    let err = container.attribute::<String>(ANGLES, "name").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);
    let err = container.attribute::<String>(ANGLES, "units").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoFailure);

    // Checks that precede the transfer still win.
    let err = container.read_data::<u8>(ANGLES).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(container.dimensions(ANGLES).unwrap(), [74]);
    assert_no_leaked_handles(&container);
}

#[test]
fn test_faults_can_be_cleared() {
    let fixture = TomographyFixture::create();
    let container = fixture.open_with_faults(OpenMode::ReadOnly, FaultInjection {
        fail_transfers: true,
        rank_drift: true,
    });
    assert!(container.read_data::<f32>(ANGLES).is_err());

    container.library().set_faults(FaultInjection::default());
    assert_eq!(
        container.read_data::<f32>(ANGLES).unwrap(),
        expected_angles()
    );
}

#[test]
fn test_invalid_container_reports_not_open() {
    let container = open_in(&FileStore::new(), "absent.h5", OpenMode::ReadOnly);
    assert!(!container.is_valid());

    assert_eq!(container.kind_of("/"), ObjectKind::NotFound);
    assert!(!container.is_group("/"));
    assert!(!container.has_attributes("/"));
    assert_eq!(container.attribute_type("/", "a"), DataType::None);
    assert_eq!(container.data_type(VOLUME), DataType::None);
    assert!(container.all_datasets().is_empty());
    for err in [
        container.children("/").unwrap_err(),
        container.dimensions(VOLUME).unwrap_err(),
        container.read_data::<u8>(VOLUME).unwrap_err(),
        container.attribute::<i32>("/", "a").unwrap_err(),
        container.create_group("/g").unwrap_err(),
        container.flush().unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::NotOpen, "{err}");
    }
    assert_no_leaked_handles(&container);
}

#[test]
fn test_closed_container_releases_file() {
    let fixture = TomographyFixture::create();
    let mut container = fixture.open();
    assert_eq!(container.library().open_handle_count(), 1);

    container.close().unwrap();
    assert!(!container.is_valid());
    assert_eq!(container.library().open_handle_count(), 0);
    assert_eq!(
        container.read_data::<f32>(ANGLES).unwrap_err().kind(),
        ErrorKind::NotOpen
    );
}

#[test]
fn test_builder_with_custom_library() {
    let fixture = TomographyFixture::create();
    let container = ContainerBuilder::new()
        .path(fixture.path())
        .build_with(fixture.library().with_faults(FaultInjection {
            rank_drift: true,
            ..Default::default()
        }))
        .unwrap();
    assert_eq!(
        container.dimension_count(VOLUME).unwrap_err().kind(),
        ErrorKind::ShapeInconsistency
    );

    let err = ContainerBuilder::new()
        .path("/fixtures/other.h5")
        .build_with(fixture.library())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotOpen);
}

#[test]
fn test_failed_attribute_replace_keeps_old_value() {
    let fixture = TomographyFixture::create();
    {
        let container = fixture.open_with_faults(OpenMode::ReadWrite, FaultInjection {
            fail_transfers: true,
            ..Default::default()
        });
        let err = container.set_attribute(ANGLES, "units", "[rad]".to_string()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        let err = container.set_fixed_string_attribute(ANGLES, "name", "theta").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
        assert_no_leaked_handles(&container);
    }

    let container = fixture.open();
    let units: String = container.attribute(ANGLES, "units").unwrap();
    let name: String = container.attribute(ANGLES, "name").unwrap();
    assert_eq!(units, "[deg]");
    assert_eq!(name, "angles");
    assert!(!container.has_attribute(ANGLES, ".~units"));
    assert!(!container.has_attribute(ANGLES, ".~name"));
    assert_no_leaked_handles(&container);
}
