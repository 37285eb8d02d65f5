//! Free-space partitioning inside a single bin.
//!
//! The bin interior starts as one free space. Each placement consumes the
//! first space that accepts the item and replaces it with up to three
//! guillotine children:
//! - lengthwise remainder (always, inherits the column-split count)
//! - widthwise remainder beside the item (only while the split count is 0)
//! - remainder above the item (only when stacking is enabled)
//!
//! The widthwise split happens at most once per lineage, which caps the
//! floor at two width columns.

use std::cmp::Ordering;

use super::orientation::orientations;
use super::{PackOptions, Trial};
use crate::model::{BinType, Placement, UnitItem};
use crate::types::{EPSILON_GENERAL, Vec3, Weighted, desc};

/// An empty axis-aligned box inside a bin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FreeSpace {
    pub origin: Vec3,
    pub dims: Vec3,
    /// Widthwise splits already spent by this space's ancestry (0 or 1).
    pub column_splits: u8,
}

impl FreeSpace {
    /// The whole bin interior.
    pub fn whole(bin: &BinType) -> Self {
        Self {
            origin: Vec3::zero(),
            dims: bin.dims,
            column_splits: 0,
        }
    }

    pub fn volume(&self) -> f64 {
        self.dims.volume()
    }

    /// Floor first, then biggest volume, length and width.
    fn fill_order(a: &Self, b: &Self) -> Ordering {
        a.origin
            .z
            .total_cmp(&b.origin.z)
            .then_with(|| desc(a.volume(), b.volume()))
            .then_with(|| desc(a.dims.x, b.dims.x))
            .then_with(|| desc(a.dims.y, b.dims.y))
    }

    /// Checks whether an oriented item fits this space.
    fn accepts(&self, oriented: Vec3, options: &PackOptions) -> bool {
        if options.keep_z_base && self.origin.z > EPSILON_GENERAL {
            return false;
        }
        let clearance = options.clearance;
        let usable_l = (self.dims.x - 2.0 * clearance).max(0.0);
        let usable_w = (self.dims.y - 2.0 * clearance).max(0.0);
        if oriented.x > usable_l + EPSILON_GENERAL
            || oriented.y > usable_w + EPSILON_GENERAL
            || oriented.z > self.dims.z + EPSILON_GENERAL
        {
            return false;
        }
        match options.max_stack_height {
            Some(limit) => self.origin.z + oriented.z <= limit + EPSILON_GENERAL,
            None => true,
        }
    }

    /// Splits the space around an item placed at its origin.
    ///
    /// The consumed footprint includes the clearance margin on both sides.
    fn split(&self, oriented: Vec3, options: &PackOptions) -> Vec<FreeSpace> {
        let used_l = (oriented.x + 2.0 * options.clearance).min(self.dims.x);
        let used_w = (oriented.y + 2.0 * options.clearance).min(self.dims.y);
        let rest_l = self.dims.x - used_l;
        let rest_w = self.dims.y - used_w;
        let rest_h = self.dims.z - oriented.z;

        let mut children = Vec::with_capacity(3);

        if rest_l > EPSILON_GENERAL {
            children.push(FreeSpace {
                origin: Vec3::new(self.origin.x + used_l, self.origin.y, self.origin.z),
                dims: Vec3::new(rest_l, self.dims.y, self.dims.z),
                column_splits: self.column_splits,
            });
        }

        if rest_w > EPSILON_GENERAL && used_l > EPSILON_GENERAL && self.column_splits < 1 {
            children.push(FreeSpace {
                origin: Vec3::new(self.origin.x, self.origin.y + used_w, self.origin.z),
                dims: Vec3::new(used_l, rest_w, self.dims.z),
                column_splits: self.column_splits + 1,
            });
        }

        if options.stacking_enabled() && rest_h > EPSILON_GENERAL {
            children.push(FreeSpace {
                origin: Vec3::new(self.origin.x, self.origin.y, self.origin.z + oriented.z),
                dims: Vec3::new(used_l, used_w, rest_h),
                column_splits: self.column_splits,
            });
        }

        children
    }
}

/// Working state of one single-bin trial.
#[derive(Debug)]
pub struct FreeSpacePacker<'a> {
    bin: &'a BinType,
    options: &'a PackOptions,
    spaces: Vec<FreeSpace>,
    placements: Vec<Placement>,
    weight_used: f64,
}

impl<'a> FreeSpacePacker<'a> {
    pub fn new(bin: &'a BinType, options: &'a PackOptions) -> Self {
        Self {
            bin,
            options,
            spaces: vec![FreeSpace::whole(bin)],
            placements: Vec::new(),
            weight_used: 0.0,
        }
    }

    /// Current free spaces (unsorted).
    pub fn spaces(&self) -> &[FreeSpace] {
        &self.spaces
    }

    /// Tries to place one item; returns `false` when no space accepts it.
    pub fn insert(&mut self, item: &UnitItem) -> bool {
        if !self.bin.accepts_weight(self.weight_used, item.weight()) {
            return false;
        }

        self.spaces.sort_by(FreeSpace::fill_order);
        let candidates = orientations(
            item.dims,
            self.options.lock_axes_fully,
            self.options.forbid_z_rotation,
        );

        let hit = self.spaces.iter().enumerate().find_map(|(idx, space)| {
            candidates
                .iter()
                .find(|oriented| space.accepts(**oriented, self.options))
                .map(|oriented| (idx, *oriented))
        });

        let Some((idx, oriented)) = hit else {
            return false;
        };

        let space = self.spaces[idx];
        let clearance = self.options.clearance;
        let position = Vec3::new(
            space.origin.x + clearance,
            space.origin.y + clearance,
            space.origin.z,
        );
        self.placements
            .push(Placement::new(item.clone(), position, oriented));
        self.weight_used += item.weight();
        let children = space.split(oriented, self.options);
        self.spaces.splice(idx..=idx, children);
        true
    }

    pub fn finish(self, remaining: Vec<UnitItem>) -> Trial {
        Trial::new(self.placements, remaining)
    }
}

/// Runs one pass over `items` in the given order.
///
/// Items that find no space are returned as remaining; they are never
/// retried within the same pass.
pub fn pack_free_space(bin: &BinType, items: &[UnitItem], options: &PackOptions) -> Trial {
    let mut packer = FreeSpacePacker::new(bin, options);
    let mut remaining = Vec::new();
    for item in items {
        if !packer.insert(item) {
            remaining.push(item.clone());
        }
    }
    packer.finish(remaining)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{find_overlap, is_contained, max_floor_bands};

    fn bin(dims: (f64, f64, f64)) -> BinType {
        BinType::new("T", "Test", Vec3::new(dims.0, dims.1, dims.2), 10.0).unwrap()
    }

    fn items(tag: &str, dims: (f64, f64, f64), count: usize) -> Vec<UnitItem> {
        (1..=count)
            .map(|n| UnitItem::new(format!("{tag}-{n}"), tag, Vec3::new(dims.0, dims.1, dims.2)))
            .collect()
    }

    #[test]
    fn exact_fit_lands_at_origin() {
        let bin = bin((24.0, 10.0, 8.0));
        let trial = pack_free_space(&bin, &items("A", (24.0, 10.0, 8.0), 1), &PackOptions::default());

        assert_eq!(trial.placed_count(), 1);
        assert_eq!(trial.placements[0].position, Vec3::zero());
        assert!((trial.fill_rate(&bin) - 1.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn floor_holds_at_most_two_columns() {
        let bin = bin((10.0, 30.0, 5.0));
        let trial = pack_free_space(&bin, &items("A", (10.0, 10.0, 5.0), 3), &PackOptions::default());

        assert_eq!(trial.placed_count(), 2);
        assert_eq!(trial.remaining.len(), 1);
        assert_eq!(max_floor_bands(&trial.placements), 2);
    }

    #[test]
    fn stacking_uses_space_above() {
        let bin = bin((10.0, 10.0, 20.0));
        let stacked = pack_free_space(&bin, &items("A", (10.0, 10.0, 10.0), 2), &PackOptions::default());
        assert_eq!(stacked.placed_count(), 2);
        assert_eq!(stacked.placements[1].position, Vec3::new(0.0, 0.0, 10.0));

        let floor_only = PackOptions::builder().keep_z_base(true).build();
        let flat = pack_free_space(&bin, &items("A", (10.0, 10.0, 10.0), 2), &floor_only);
        assert_eq!(flat.placed_count(), 1);
    }

    #[test]
    fn max_stack_height_caps_tops() {
        let bin = bin((10.0, 10.0, 30.0));
        let options = PackOptions::builder().max_stack_height(Some(20.0)).build();
        let trial = pack_free_space(&bin, &items("A", (10.0, 10.0, 10.0), 3), &options);

        assert_eq!(trial.placed_count(), 2);
        assert!(trial.placements.iter().all(|p| p.top_z() <= 20.0 + EPSILON_GENERAL));
    }

    #[test]
    fn clearance_insets_and_separates_items() {
        let bin = bin((24.0, 12.0, 10.0));
        let options = PackOptions::builder().clearance(1.0).build();
        let trial = pack_free_space(&bin, &items("A", (10.0, 10.0, 10.0), 3), &options);

        assert_eq!(trial.placed_count(), 2);
        assert_eq!(trial.placements[0].position, Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(trial.placements[1].position, Vec3::new(13.0, 1.0, 0.0));
        assert_eq!(find_overlap(&trial.placements, 1.0), None);
        assert!(trial.placements.iter().all(|p| is_contained(p, &bin)));
    }

    #[test]
    fn rotation_allows_otherwise_impossible_fit() {
        let bin = bin((10.0, 20.0, 10.0));
        let item = items("A", (20.0, 10.0, 10.0), 1);

        let locked = pack_free_space(&bin, &item, &PackOptions::default());
        assert_eq!(locked.placed_count(), 0);

        let free = PackOptions::builder().lock_axes_fully(false).build();
        let rotated = pack_free_space(&bin, &item, &free);
        assert_eq!(rotated.placed_count(), 1);
        assert_eq!(rotated.placements[0].dims, Vec3::new(10.0, 20.0, 10.0));
    }

    #[test]
    fn payload_cap_skips_heavy_items() {
        let bin = bin((30.0, 10.0, 10.0)).with_max_weight(10.0);
        let mut pool = items("A", (10.0, 10.0, 10.0), 3);
        for item in &mut pool {
            item.weight = Some(4.0);
        }
        let trial = pack_free_space(&bin, &pool, &PackOptions::default());
        assert_eq!(trial.placed_count(), 2);
        assert_eq!(trial.remaining.len(), 1);
    }

    #[test]
    fn column_split_happens_once_per_lineage() {
        let bin = bin((40.0, 40.0, 40.0));
        let options = PackOptions::default();
        let mut packer = FreeSpacePacker::new(&bin, &options);
        for item in items("A", (10.0, 10.0, 10.0), 12) {
            packer.insert(&item);
            assert!(packer.spaces().iter().all(|s| s.column_splits <= 1));
        }
    }

    #[test]
    fn free_spaces_never_overlap_placements() {
        let bin = bin((40.0, 30.0, 20.0));
        let options = PackOptions::default();
        let mut packer = FreeSpacePacker::new(&bin, &options);
        for (n, dims) in [(12.0, 9.0, 7.0), (8.0, 14.0, 5.0), (20.0, 6.0, 9.0), (5.0, 5.0, 5.0)]
            .into_iter()
            .enumerate()
        {
            packer.insert(&UnitItem::new(format!("A-{n}"), "A", Vec3::new(dims.0, dims.1, dims.2)));
        }

        let spaces = packer.spaces().to_vec();
        let trial = packer.finish(Vec::new());
        for space in &spaces {
            let region = crate::types::BoundingBox::from_position_and_dims(space.origin, space.dims);
            for placement in &trial.placements {
                assert!(!region.intersects(&placement.bounding_box(), EPSILON_GENERAL));
            }
        }
    }
}
