//! Axis-aligned orientations of an item.

use crate::types::Vec3;

/// Lists the orientations an item may take.
///
/// Locked mode yields exactly the original (length, width, height).
/// Unlocked mode yields up to six permutations, duplicates removed; with
/// `forbid_z_rotation` only those keeping the original height survive.
///
/// # Examples
/// ```
/// use pack_it_now::optimizer::orientations;
/// use pack_it_now::types::Vec3;
///
/// let dims = Vec3::new(3.0, 2.0, 1.0);
/// assert_eq!(orientations(dims, true, false), vec![dims]);
/// assert_eq!(orientations(dims, false, false).len(), 6);
/// assert_eq!(orientations(dims, false, true).len(), 2);
/// ```
pub fn orientations(dims: Vec3, lock_axes_fully: bool, forbid_z_rotation: bool) -> Vec<Vec3> {
    if lock_axes_fully {
        return vec![dims];
    }

    let Vec3 { x: l, y: w, z: h } = dims;
    let candidates = [
        Vec3::new(l, w, h),
        Vec3::new(l, h, w),
        Vec3::new(w, l, h),
        Vec3::new(w, h, l),
        Vec3::new(h, w, l),
        Vec3::new(h, l, w),
    ];

    let mut result: Vec<Vec3> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if forbid_z_rotation && candidate.z != h {
            continue;
        }
        if !result.contains(&candidate) {
            result.push(candidate);
        }
    }
    result
}
