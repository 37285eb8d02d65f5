//! Geometric checks over committed placements.
//!
//! These helpers verify the layout invariants of a bin: no two placements
//! overlap once their clearance margin is included, every placement stays
//! inside the interior, and the floor never holds more than two width bands
//! side by side.

use crate::model::{BinType, Placement};
use crate::types::{EPSILON_GENERAL, EPSILON_POSITION};

/// Checks whether two placements collide after inflating both by `clearance`
/// on every X/Y side.
///
/// Boxes that only touch do not collide.
pub fn intersects(a: &Placement, b: &Placement, clearance: f64) -> bool {
    a.bounding_box()
        .inflated_xy(clearance)
        .intersects(&b.bounding_box().inflated_xy(clearance), EPSILON_GENERAL)
}

/// Checks whether a placement lies fully within the bin interior.
pub fn is_contained(placement: &Placement, bin: &BinType) -> bool {
    placement
        .bounding_box()
        .is_inside(&bin.interior(), EPSILON_GENERAL)
}

/// Returns the first pair of colliding placement indices, if any.
pub fn find_overlap(placements: &[Placement], clearance: f64) -> Option<(usize, usize)> {
    for i in 0..placements.len() {
        for j in (i + 1)..placements.len() {
            if intersects(&placements[i], &placements[j], clearance) {
                return Some((i, j));
            }
        }
    }
    None
}

/// Maximum number of distinct width bands found side by side on the floor.
///
/// For every floor-level placement, counts the distinct Y origins of the
/// floor placements sharing part of its X interval.
pub fn max_floor_bands(placements: &[Placement]) -> usize {
    let floor: Vec<&Placement> = placements
        .iter()
        .filter(|p| p.position.z <= EPSILON_POSITION)
        .collect();

    floor
        .iter()
        .map(|anchor| {
            let (x0, x1) = (anchor.position.x, anchor.position.x + anchor.dims.x);
            let mut origins: Vec<f64> = floor
                .iter()
                .filter(|p| {
                    p.position.x < x1 - EPSILON_GENERAL
                        && x0 < p.position.x + p.dims.x - EPSILON_GENERAL
                })
                .map(|p| p.position.y)
                .collect();
            origins.sort_by(|a, b| a.total_cmp(b));
            origins.dedup_by(|a, b| (*a - *b).abs() < EPSILON_POSITION);
            origins.len()
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UnitItem;
    use crate::types::Vec3;

    fn placed(x: f64, y: f64, z: f64, dims: (f64, f64, f64)) -> Placement {
        let dims = Vec3::new(dims.0, dims.1, dims.2);
        Placement::new(UnitItem::new("A-1", "A", dims), Vec3::new(x, y, z), dims)
    }

    #[test]
    fn touching_boxes_do_not_intersect() {
        let a = placed(0.0, 0.0, 0.0, (10.0, 10.0, 10.0));
        let b = placed(10.0, 0.0, 0.0, (10.0, 10.0, 10.0));
        assert!(!intersects(&a, &b, 0.0));
        assert!(intersects(&a, &b, 1.0));
    }

    #[test]
    fn clearance_spaced_boxes_do_not_intersect() {
        let a = placed(1.0, 1.0, 0.0, (10.0, 10.0, 10.0));
        let b = placed(13.0, 1.0, 0.0, (10.0, 10.0, 10.0));
        assert!(!intersects(&a, &b, 1.0));
        assert_eq!(find_overlap(&[a, b], 1.0), None);
    }

    #[test]
    fn containment_detects_overhang() {
        let bin = BinType::new("S", "Small", Vec3::new(20.0, 10.0, 10.0), 1.0).unwrap();
        assert!(is_contained(&placed(10.0, 0.0, 0.0, (10.0, 10.0, 10.0)), &bin));
        assert!(!is_contained(&placed(11.0, 0.0, 0.0, (10.0, 10.0, 10.0)), &bin));
    }

    #[test]
    fn floor_bands_ignore_stacked_items() {
        let placements = vec![
            placed(0.0, 0.0, 0.0, (10.0, 5.0, 5.0)),
            placed(0.0, 5.0, 0.0, (10.0, 5.0, 5.0)),
            placed(0.0, 2.0, 5.0, (10.0, 3.0, 5.0)),
            placed(10.0, 0.0, 0.0, (10.0, 4.0, 5.0)),
        ];
        assert_eq!(max_floor_bands(&placements), 2);

        let three_wide = vec![
            placed(0.0, 0.0, 0.0, (10.0, 3.0, 5.0)),
            placed(0.0, 3.0, 0.0, (10.0, 3.0, 5.0)),
            placed(0.0, 6.0, 0.0, (10.0, 3.0, 5.0)),
        ];
        assert_eq!(max_floor_bands(&three_wide), 3);
    }
}
