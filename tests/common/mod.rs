// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Common utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use h5access::native::{FaultInjection, FileStore, MemoryLibrary};
use h5access::{Container, OpenMode};

/// Container over the in-process test library.
pub type TestContainer = Container<MemoryLibrary>;

/// Open `path` in `store`.
pub fn open_in(store: &FileStore, path: impl AsRef<Path>, mode: OpenMode) -> TestContainer {
    Container::open_with(MemoryLibrary::sharing(store), path, mode)
}

// ============================================================================
// Tomography fixture
// ============================================================================

/// Group holding the tomography datasets.
pub const TOMOGRAPHY: &str = "/data/tomography";
/// Volume dataset, `u8` of shape [`VOLUME_DIMS`].
pub const VOLUME: &str = "/data/tomography/data";
/// Projection angles, `f32` of shape `[74]`.
pub const ANGLES: &str = "/data/tomography/dim1";
/// Second and third axis coordinates, `f32` of shape `[256]`.
pub const AXIS_Y: &str = "/data/tomography/dim2";
pub const AXIS_X: &str = "/data/tomography/dim3";

pub const VOLUME_DIMS: [usize; 3] = [74, 256, 256];

/// Expected angle values: -73, -71, ..., 73.
pub fn expected_angles() -> Vec<f32> {
    (0..74).map(|i| -73.0 + 2.0 * i as f32).collect()
}

/// Voxel value at flat index `i`.
pub fn voxel(i: usize) -> u8 {
    (i % 251) as u8
}

/// Write the tomography layout into an open, writable container.
pub fn write_tomography<L: h5access::native::NativeLibrary>(container: &Container<L>) {
    assert!(container.is_valid(), "fixture container must open");
    container.create_group("/data").unwrap();
    container.create_group(TOMOGRAPHY).unwrap();

    let count: usize = VOLUME_DIMS.iter().product();
    let volume: Vec<u8> = (0..count).map(voxel).collect();
    container.write_data(TOMOGRAPHY, "data", &VOLUME_DIMS, &volume).unwrap();

    container.write_data(TOMOGRAPHY, "dim1", &[74], &expected_angles()).unwrap();
    container.set_attribute(ANGLES, "name", "angles".to_string()).unwrap();
    container.set_fixed_string_attribute(ANGLES, "units", "[deg]").unwrap();

    let axis: Vec<f32> = (0..256).map(|i| i as f32).collect();
    container.write_data(TOMOGRAPHY, "dim2", &[256], &axis).unwrap();
    container.write_data(TOMOGRAPHY, "dim3", &[256], &axis).unwrap();
}

/// A tomography container held in its own in-memory file store.
pub struct TomographyFixture {
    store: FileStore,
    path: PathBuf,
}

impl TomographyFixture {
    /// Write the fixture file.
    pub fn create() -> Self {
        let store = FileStore::new();
        let path = PathBuf::from("/fixtures/tomography.h5");
        write_tomography(&open_in(&store, &path, OpenMode::WriteOnly));
        Self { store, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A fresh library over the fixture's store.
    pub fn library(&self) -> MemoryLibrary {
        MemoryLibrary::sharing(&self.store)
    }

    /// Open the fixture read-only.
    pub fn open(&self) -> TestContainer {
        self.open_mode(OpenMode::ReadOnly)
    }

    /// Open the fixture with `mode`.
    pub fn open_mode(&self, mode: OpenMode) -> TestContainer {
        let container = open_in(&self.store, &self.path, mode);
        assert!(container.is_valid(), "fixture must reopen");
        container
    }

    /// Open the fixture with injected failures.
    pub fn open_with_faults(&self, mode: OpenMode, faults: FaultInjection) -> TestContainer {
        Container::open_with(self.library().with_faults(faults), &self.path, mode)
    }
}

// ============================================================================
// Assertions
// ============================================================================

/// Assert that only the root file handle is open.
pub fn assert_no_leaked_handles(container: &TestContainer) {
    let expected = usize::from(container.is_valid());
    assert_eq!(
        container.library().open_handle_count(),
        expected,
        "sub-handles left open"
    );
    assert_eq!(
        container.library().outstanding_vlen_count(),
        0,
        "variable-length buffers left unreclaimed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_angles() {
        let angles = expected_angles();
        assert_eq!(angles.len(), 74);
        assert_eq!(angles[0], -73.0);
        assert_eq!(angles[73], 73.0);
    }

    #[test]
    fn test_voxel_pattern() {
        assert_eq!(voxel(0), 0);
        assert_eq!(voxel(250), 250);
        assert_eq!(voxel(251), 0);
    }
}
