//! Ordering search: one free-space pass per candidate insertion order.

use std::cmp::Ordering;

use super::free_space::pack_free_space;
use super::{PackOptions, Trial};
use crate::model::{BinType, UnitItem};
use crate::types::{Dimensional, desc};

/// Insertion orders tried for every bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    /// Volume, then length, width, height (all descending).
    ByVolume,
    /// Length, then width, height.
    ByLength,
    /// Width, then length, height.
    ByWidth,
}

impl SortOrder {
    pub const ALL: [SortOrder; 3] = [SortOrder::ByVolume, SortOrder::ByLength, SortOrder::ByWidth];

    pub fn compare(&self, a: &UnitItem, b: &UnitItem) -> Ordering {
        let (da, db) = (a.dims, b.dims);
        match self {
            SortOrder::ByVolume => desc(a.volume(), b.volume())
                .then_with(|| desc(da.x, db.x))
                .then_with(|| desc(da.y, db.y))
                .then_with(|| desc(da.z, db.z)),
            SortOrder::ByLength => desc(da.x, db.x)
                .then_with(|| desc(da.y, db.y))
                .then_with(|| desc(da.z, db.z)),
            SortOrder::ByWidth => desc(da.y, db.y)
                .then_with(|| desc(da.x, db.x))
                .then_with(|| desc(da.z, db.z)),
        }
    }

    /// Returns a stably sorted copy of `items`.
    pub fn sorted(&self, items: &[UnitItem]) -> Vec<UnitItem> {
        let mut sorted = items.to_vec();
        sorted.sort_by(|a, b| self.compare(a, b));
        sorted
    }
}

/// Runs the free-space packer once per sort order and keeps the best trial.
///
/// Best means most items placed, then most volume placed. The earlier
/// order wins ties, so the search is deterministic.
pub fn best_ordering(bin: &BinType, items: &[UnitItem], options: &PackOptions) -> Trial {
    let mut best: Option<Trial> = None;

    for order in SortOrder::ALL {
        let trial = pack_free_space(bin, &order.sorted(items), options);
        let better = match &best {
            None => true,
            Some(current) => trial
                .placed_count()
                .cmp(&current.placed_count())
                .then_with(|| trial.used_volume.total_cmp(&current.used_volume))
                .is_gt(),
        };
        if better {
            best = Some(trial);
        }
    }

    best.unwrap_or_else(|| Trial::new(Vec::new(), items.to_vec()))
}
