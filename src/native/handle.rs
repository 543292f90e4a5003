// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Scoped ownership of native handles.

use std::fmt;

use tracing::warn;

use super::{is_valid_hid, Hid, NativeResult, INVALID_HID};

/// Close operation for a handle owned through `L`.
pub type Closer<L> = fn(&L, Hid) -> NativeResult<()>;

/// Owns one native handle and releases it exactly once.
///
/// The guard accepts handles that failed to open; [`ScopedHandle::valid`]
/// tells them apart. Dropping the guard releases a valid handle, and
/// [`ScopedHandle::clear`] may be called any number of times before that
/// since it resets the guard to the invalid sentinel.
///
/// # Example
///
/// ```
/// use h5access::native::{MemoryLibrary, NativeLibrary, ScopedHandle};
///
/// let lib = MemoryLibrary::new();
/// {
///     let hid = lib.space_create_simple(&[4]);
///     let space = ScopedHandle::new(&lib, hid, MemoryLibrary::space_close);
///     assert!(space.valid());
///     assert_eq!(lib.open_handle_count(), 1);
/// }
/// assert_eq!(lib.open_handle_count(), 0);
/// ```
pub struct ScopedHandle<'a, L: ?Sized> {
    lib: &'a L,
    value: Hid,
    closer: Closer<L>,
}

impl<'a, L: ?Sized> ScopedHandle<'a, L> {
    /// Take ownership of `value`, released with `closer`.
    pub fn new(lib: &'a L, value: Hid, closer: Closer<L>) -> Self {
        Self { lib, value, closer }
    }

    /// Whether the guard holds a usable handle.
    pub fn valid(&self) -> bool {
        is_valid_hid(self.value)
    }

    /// The raw handle, for passing to native calls within the operation.
    pub fn value(&self) -> Hid {
        self.value
    }

    /// Release the handle now if it is still held.
    pub fn clear(&mut self) -> NativeResult<()> {
        if !self.valid() {
            return Ok(());
        }
        let value = std::mem::replace(&mut self.value, INVALID_HID);
        (self.closer)(self.lib, value)
    }
}

impl<L: ?Sized> Drop for ScopedHandle<'_, L> {
    fn drop(&mut self) {
        let value = self.value;
        if let Err(e) = self.clear() {
            warn!(
                handle = value,
                error = %e,
                "failed to release native handle"
            );
        }
    }
}

impl<L: ?Sized> fmt::Debug for ScopedHandle<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedHandle")
            .field("value", &self.value)
            .finish()
    }
}
