//! Pile/column stacking for items sharing one width.
//!
//! Items are first grouped into piles bounded by the bin's height cap.
//! Piles are then laid end to end along the bin length in at most two
//! width lanes ("columns"). Piles dropped onto an existing stack share its
//! X position. On finalization every stack is flattened into placements,
//! tallest items at the bottom.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::{PackOptions, Trial};
use crate::model::{BinType, Placement, UnitItem};
use crate::types::{Dimensional, EPSILON_GENERAL, EPSILON_POSITION, Vec3, Weighted, desc};

/// Items stacked vertically.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Pile {
    pub items: Vec<UnitItem>,
    pub height: f64,
    /// Longest member; the pile's floor footprint along X.
    pub length: f64,
    pub weight: f64,
}

impl Pile {
    fn push(&mut self, item: UnitItem) {
        self.height += item.dims.z;
        self.length = self.length.max(item.dims.x);
        self.weight += item.weight();
        self.items.push(item);
    }
}

/// Piles sharing one X position in a column.
#[derive(Clone, Debug, Default)]
struct Stack {
    piles: Vec<Pile>,
    /// Slot length along X, clearance on both sides included.
    length: f64,
    height: f64,
}

/// One width lane.
#[derive(Clone, Debug, Default)]
struct Column {
    stacks: Vec<Stack>,
    used_length: f64,
}

#[derive(Clone, Copy, Debug)]
enum Target {
    Extend { column: usize, stack: usize },
    Open { column: usize },
}

/// Groups items into piles no taller than `height_cap`.
///
/// Items are taken tallest first; each joins the first pile with room
/// left, else opens a new pile. Without stacking every item is its own pile.
pub fn form_piles(items: &[UnitItem], height_cap: f64, stacking: bool) -> Vec<Pile> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| desc(a.dims.z, b.dims.z).then_with(|| desc(a.dims.x, b.dims.x)));

    let mut piles: Vec<Pile> = Vec::new();
    for item in sorted {
        let slot = if stacking {
            piles
                .iter()
                .position(|pile| pile.height + item.dims.z <= height_cap + EPSILON_GENERAL)
        } else {
            None
        };
        match slot {
            Some(idx) => piles[idx].push(item),
            None => {
                let mut pile = Pile::default();
                pile.push(item);
                piles.push(pile);
            }
        }
    }
    piles
}

/// Checks whether every item shares the same width.
pub fn has_uniform_width(items: &[UnitItem]) -> bool {
    match items.first() {
        Some(first) => items
            .iter()
            .all(|item| (item.dims.y - first.dims.y).abs() <= EPSILON_GENERAL),
        None => false,
    }
}

/// Packs items of uniform width into at most two columns of one bin.
pub fn pack_columns(bin: &BinType, items: &[UnitItem], options: &PackOptions) -> Trial {
    let clearance = options.clearance;
    let height_cap = options.height_cap(bin);
    let length_cap = bin.dims.x;
    let lane_width = items.iter().map(|i| i.dims.y).fold(0.0, f64::max) + 2.0 * clearance;
    let lanes = if 2.0 * lane_width <= bin.dims.y + EPSILON_GENERAL {
        2
    } else if lane_width <= bin.dims.y + EPSILON_GENERAL {
        1
    } else {
        0
    };

    let (fitting, mut remaining): (Vec<UnitItem>, Vec<UnitItem>) =
        items.iter().cloned().partition(|item| {
            lanes > 0
                && item.dims.z <= height_cap + EPSILON_GENERAL
                && item.dims.x + 2.0 * clearance <= length_cap + EPSILON_GENERAL
        });

    let mut piles = form_piles(&fitting, height_cap, options.stacking_enabled());
    piles.sort_by(|a, b| desc(a.length, b.length).then_with(|| desc(a.height, b.height)));

    let mut columns = vec![Column::default(); lanes];
    let mut weight_used = 0.0;

    for pile in piles {
        if !bin.accepts_weight(weight_used, pile.weight) {
            remaining.extend(pile.items);
            continue;
        }
        let slot = pile.length + 2.0 * clearance;
        match choose_target(&columns, &pile, slot, height_cap, length_cap, options) {
            Some(target) => {
                weight_used += pile.weight;
                apply(&mut columns, target, pile, slot);
            }
            None => remaining.extend(pile.items),
        }
    }

    let mut placements = flatten(&columns, lane_width, clearance);
    restack_by_footprint(&mut placements);
    Trial::new(placements, remaining)
}

/// Picks where a pile goes: lowest resulting used length wins.
///
/// Columns are visited least used first; within a column, extending an
/// existing stack is tried before opening a new one, and earlier
/// candidates win ties.
fn choose_target(
    columns: &[Column],
    pile: &Pile,
    slot: f64,
    height_cap: f64,
    length_cap: f64,
    options: &PackOptions,
) -> Option<Target> {
    let mut order: Vec<usize> = (0..columns.len()).collect();
    order.sort_by(|a, b| columns[*a].used_length.total_cmp(&columns[*b].used_length));

    let mut best: Option<(Target, f64)> = None;
    let mut consider = |target: Target, used: f64| {
        if used > length_cap + EPSILON_GENERAL {
            return;
        }
        if best.as_ref().is_none_or(|(_, current)| used < *current - EPSILON_GENERAL) {
            best = Some((target, used));
        }
    };

    for column_idx in order {
        let column = &columns[column_idx];
        if options.stacking_enabled() {
            for (stack_idx, stack) in column.stacks.iter().enumerate() {
                if stack.height + pile.height > height_cap + EPSILON_GENERAL {
                    continue;
                }
                let used = column.used_length - stack.length + stack.length.max(slot);
                consider(
                    Target::Extend {
                        column: column_idx,
                        stack: stack_idx,
                    },
                    used,
                );
            }
        }
        consider(
            Target::Open { column: column_idx },
            column.used_length + slot,
        );
    }

    best.map(|(target, _)| target)
}

fn apply(columns: &mut [Column], target: Target, pile: Pile, slot: f64) {
    match target {
        Target::Extend { column, stack } => {
            let column = &mut columns[column];
            let stack = &mut column.stacks[stack];
            let grown = stack.length.max(slot);
            column.used_length += grown - stack.length;
            stack.length = grown;
            stack.height += pile.height;
            stack.piles.push(pile);
        }
        Target::Open { column } => {
            let column = &mut columns[column];
            column.used_length += slot;
            column.stacks.push(Stack {
                length: slot,
                height: pile.height,
                piles: vec![pile],
            });
        }
    }
}

/// Lays stacks end to end and assigns Z inside each stack.
fn flatten(columns: &[Column], lane_width: f64, clearance: f64) -> Vec<Placement> {
    let mut placements = Vec::new();
    for (lane, column) in columns.iter().enumerate() {
        let y = lane as f64 * lane_width + clearance;
        let mut x = 0.0;
        for stack in &column.stacks {
            let mut members: Vec<UnitItem> = stack
                .piles
                .iter()
                .flat_map(|pile| pile.items.iter().cloned())
                .collect();
            members.sort_by(tallest_first);

            let mut z = 0.0;
            for item in members {
                let dims = item.dims;
                placements.push(Placement::new(item, Vec3::new(x + clearance, y, z), dims));
                z += dims.z;
            }
            x += stack.length;
        }
    }
    placements
}

fn tallest_first(a: &UnitItem, b: &UnitItem) -> Ordering {
    desc(a.dims.z, b.dims.z)
        .then_with(|| desc(a.dims.x, b.dims.x))
        .then_with(|| desc(a.volume(), b.volume()))
}

/// Re-sorts placements sharing a floor footprint so taller items sit lower.
///
/// Placements are grouped by (X, Y) origin; each group is re-stacked from
/// its lowest Z upward, tallest first.
pub fn restack_by_footprint(placements: &mut [Placement]) {
    let key = |value: f64| (value / EPSILON_POSITION).round() as i64;
    let mut groups: BTreeMap<(i64, i64), Vec<usize>> = BTreeMap::new();
    for (idx, placement) in placements.iter().enumerate() {
        groups
            .entry((key(placement.position.x), key(placement.position.y)))
            .or_default()
            .push(idx);
    }

    for indices in groups.values() {
        let base = indices
            .iter()
            .map(|&idx| placements[idx].position.z)
            .fold(f64::INFINITY, f64::min);
        let mut members: Vec<Placement> = indices.iter().map(|&idx| placements[idx].clone()).collect();
        members.sort_by(|a, b| tallest_first(&a.item, &b.item));

        let mut z = base;
        for (&idx, mut member) in indices.iter().zip(members) {
            member.position.z = z;
            z += member.dims.z;
            placements[idx] = member;
        }
    }
}
