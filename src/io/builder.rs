// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Builder pattern for opening containers.
//!
//! The `ContainerBuilder` provides a fluent API for configuring and opening
//! containers, returning an error instead of an invalid container.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{AccessError, Result};
use crate::native::{DefaultLibrary, NativeLibrary};

use super::{Container, OpenMode};

/// Configuration for opening a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Path to the container file
    pub path: PathBuf,
    /// How to open it
    pub mode: OpenMode,
}

/// Builder for opening containers.
///
/// # Example
///
/// ```rust,no_run
/// use h5access::{ContainerBuilder, OpenMode};
///
/// // Read an existing file
/// let container = ContainerBuilder::new()
///     .path("scan.h5")
///     .build()?;
///
/// // Create a new one
/// let output = ContainerBuilder::new()
///     .path("out.h5")
///     .mode(OpenMode::WriteOnly)
///     .build()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    config: ContainerConfig,
}

impl ContainerBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: ContainerConfig) -> Self {
        Self { config }
    }

    /// Set the path to the file.
    pub fn path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.path = path.as_ref().to_path_buf();
        self
    }

    /// Set the open mode.
    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Open the container with the [`DefaultLibrary`].
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` if:
    /// - The path is not set
    /// - The file cannot be opened or created
    pub fn build(self) -> Result<Container> {
        self.build_with(DefaultLibrary::new())
    }

    /// Open the container through `lib`.
    pub fn build_with<L: NativeLibrary>(self, lib: L) -> Result<Container<L>> {
        let path = &self.config.path;
        if path.as_os_str().is_empty() {
            return Err(AccessError::not_open("<unset path>"));
        }

        let container = Container::open_with(lib, path, self.config.mode);
        if !container.is_valid() {
            return Err(AccessError::not_open(path.display().to_string()));
        }
        Ok(container)
    }
}
