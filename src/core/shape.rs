// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Conversions between flat row-major buffers and nested sequences.

/// Number of elements in an array of the given extents.
///
/// Returns `None` if the product overflows `usize`. An empty shape is a
/// scalar and holds one element.
pub fn element_count(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Human-readable shape, e.g. `[74, 256, 256]`.
pub fn describe(dims: &[usize]) -> String {
    format!("{dims:?}")
}

/// Split a row-major buffer into `rows` rows of `cols` elements.
///
/// Returns `None` unless `flat.len() == rows * cols`.
pub fn reshape_2d<T>(flat: Vec<T>, rows: usize, cols: usize) -> Option<Vec<Vec<T>>> {
    if rows.checked_mul(cols)? != flat.len() {
        return None;
    }
    if cols == 0 {
        return Some((0..rows).map(|_| Vec::new()).collect());
    }

    let mut out = Vec::with_capacity(rows);
    let mut rest = flat.into_iter();
    for _ in 0..rows {
        out.push(rest.by_ref().take(cols).collect());
    }
    Some(out)
}

/// Concatenate rows back into a row-major buffer.
pub fn flatten_2d<T: Clone>(rows: &[Vec<T>]) -> Vec<T> {
    rows.iter().flat_map(|row| row.iter().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_count() {
        assert_eq!(element_count(&[74, 256, 256]), Some(4_849_664));
        assert_eq!(element_count(&[5]), Some(5));
        assert_eq!(element_count(&[]), Some(1));
        assert_eq!(element_count(&[3, 0, 7]), Some(0));
        assert_eq!(element_count(&[usize::MAX, 2]), None);
    }

    #[test]
    fn test_reshape_row_major() {
        let rows = reshape_2d((0..6).collect::<Vec<i32>>(), 2, 3).unwrap();
        assert_eq!(rows, vec![vec![0, 1, 2], vec![3, 4, 5]]);
        // element (i, j) is flat[i * cols + j]
        assert_eq!(rows[1][2], 5);
    }

    #[test]
    fn test_reshape_rejects_wrong_length() {
        assert!(reshape_2d(vec![1u8, 2, 3], 2, 2).is_none());
        assert!(reshape_2d(vec![1u8], usize::MAX, 2).is_none());
    }

    #[test]
    fn test_reshape_empty_extents() {
        assert_eq!(
            reshape_2d(Vec::<u8>::new(), 3, 0),
            Some(vec![vec![], vec![], vec![]])
        );
        assert_eq!(reshape_2d(Vec::<u8>::new(), 0, 4), Some(vec![]));
    }

    #[test]
    fn test_flatten_inverts_reshape() {
        let flat: Vec<f32> = (0..12).map(|v| v as f32 * 0.5).collect();
        let rows = reshape_2d(flat.clone(), 4, 3).unwrap();
        assert_eq!(flatten_2d(&rows), flat);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&[74, 256, 256]), "[74, 256, 256]");
        assert_eq!(describe(&[]), "[]");
    }
}
