//! Packing engine: single-bin strategies and the multi-bin allocator.
//!
//! Two single-bin strategies share one interface (`Packer::pack`):
//! - free-space partitioning with an ordering search, for mixed items
//! - pile/column stacking, for items sharing one width
//!
//! The allocator runs the selected strategy against every bin type, scores
//! each trial under the chosen objective, commits the winner and repeats on
//! the leftover pool. Infeasibility never fails a run; it ends up in
//! `PackResult::unplaced`.

mod columns;
mod free_space;
mod ordering;
mod orientation;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::model::{
    BinType, BinTypeRecord, CommittedBin, ItemRecord, PackResult, Placement, UnitItem,
    UnplacedItem, UnplacedReason, ValidationError, build_catalog, expand_items,
};
use crate::types::{Dimensional, EPSILON_GENERAL, Vec3, Weighted, validation};

pub use columns::{Pile, form_piles, has_uniform_width, pack_columns, restack_by_footprint};
pub use free_space::{FreeSpace, FreeSpacePacker, pack_free_space};
pub use ordering::{SortOrder, best_ordering};
pub use orientation::orientations;

/// Scoring objective of the allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Objective {
    /// Fewest bins: most items, then most volume, then lowest cost.
    #[default]
    #[serde(alias = "min_bins")]
    MinVans,
    /// Lowest cost per placed volume, then most items, then lowest cost.
    MinCost,
}

impl std::str::FromStr for Objective {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "min_vans" | "min_bins" => Ok(Objective::MinVans),
            "min_cost" => Ok(Objective::MinCost),
            other => Err(ValidationError::InvalidOption(format!(
                "unknown strategy '{}', expected min_vans or min_cost",
                other
            ))),
        }
    }
}

/// Which single-bin strategy runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PackerKind {
    /// Columns when all items share a width, free space otherwise.
    #[default]
    Auto,
    FreeSpace,
    Columns,
}

impl std::str::FromStr for PackerKind {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(PackerKind::Auto),
            "free_space" => Ok(PackerKind::FreeSpace),
            "columns" => Ok(PackerKind::Columns),
            other => Err(ValidationError::InvalidOption(format!(
                "unknown packer '{}', expected auto, free_space or columns",
                other
            ))),
        }
    }
}

/// Options controlling a packing run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackOptions {
    /// Inset kept free on every X/Y side of each item.
    pub clearance: f64,
    /// Disables stacking: only floor-level positions are used.
    pub keep_z_base: bool,
    /// Disables rotation: items keep their original orientation.
    pub lock_axes_fully: bool,
    /// Allows rotation only around the vertical axis.
    pub forbid_z_rotation: bool,
    /// Highest allowed top of any item.
    pub max_stack_height: Option<f64>,
    pub objective: Objective,
    pub packer: PackerKind,
    /// Ceiling for allocator iterations.
    pub max_iterations: usize,
}

impl PackOptions {
    pub const DEFAULT_CLEARANCE: f64 = 0.0;
    pub const DEFAULT_KEEP_Z_BASE: bool = false;
    pub const DEFAULT_LOCK_AXES_FULLY: bool = true;
    pub const DEFAULT_FORBID_Z_ROTATION: bool = false;
    pub const DEFAULT_MAX_ITERATIONS: usize = 5000;

    /// Creates a builder for custom options.
    pub fn builder() -> PackOptionsBuilder {
        PackOptionsBuilder::default()
    }

    pub fn stacking_enabled(&self) -> bool {
        !self.keep_z_base
    }

    /// Highest usable Z inside `bin`.
    pub fn height_cap(&self, bin: &BinType) -> f64 {
        match self.max_stack_height {
            Some(limit) => bin.dims.z.min(limit),
            None => bin.dims.z,
        }
    }

    /// Checks option values before a run.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate_non_negative(self.clearance, "clearance")
            .map_err(ValidationError::InvalidOption)?;
        if let Some(limit) = self.max_stack_height {
            validation::validate_positive(limit, "maxStackHeight")
                .map_err(ValidationError::InvalidOption)?;
        }
        if self.max_iterations == 0 {
            return Err(ValidationError::InvalidOption(
                "maxIterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            clearance: Self::DEFAULT_CLEARANCE,
            keep_z_base: Self::DEFAULT_KEEP_Z_BASE,
            lock_axes_fully: Self::DEFAULT_LOCK_AXES_FULLY,
            forbid_z_rotation: Self::DEFAULT_FORBID_Z_ROTATION,
            max_stack_height: None,
            objective: Objective::default(),
            packer: PackerKind::default(),
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// Builder for `PackOptions`.
#[derive(Clone, Debug, Default)]
pub struct PackOptionsBuilder {
    options: PackOptions,
}

impl PackOptionsBuilder {
    pub fn clearance(mut self, clearance: f64) -> Self {
        self.options.clearance = clearance;
        self
    }

    pub fn keep_z_base(mut self, keep: bool) -> Self {
        self.options.keep_z_base = keep;
        self
    }

    pub fn lock_axes_fully(mut self, lock: bool) -> Self {
        self.options.lock_axes_fully = lock;
        self
    }

    pub fn forbid_z_rotation(mut self, forbid: bool) -> Self {
        self.options.forbid_z_rotation = forbid;
        self
    }

    pub fn max_stack_height(mut self, limit: Option<f64>) -> Self {
        self.options.max_stack_height = limit;
        self
    }

    pub fn objective(mut self, objective: Objective) -> Self {
        self.options.objective = objective;
        self
    }

    pub fn packer(mut self, packer: PackerKind) -> Self {
        self.options.packer = packer;
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.options.max_iterations = max_iterations;
        self
    }

    /// Creates the final options.
    pub fn build(self) -> PackOptions {
        self.options
    }
}

/// Outcome of packing one bin of one type.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Trial {
    pub placements: Vec<Placement>,
    pub remaining: Vec<UnitItem>,
    pub used_volume: f64,
}

impl Trial {
    pub fn new(placements: Vec<Placement>, remaining: Vec<UnitItem>) -> Self {
        let used_volume = placements.iter().map(|p| p.volume()).sum();
        Self {
            placements,
            remaining,
            used_volume,
        }
    }

    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    pub fn fill_rate(&self, bin: &BinType) -> f64 {
        let total = bin.volume();
        if total <= 0.0 {
            return 0.0;
        }
        (self.used_volume / total).clamp(0.0, 1.0)
    }
}

/// Single-bin strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Packer {
    /// Free-space partitioning, best of several insertion orders.
    FreeSpace,
    /// Pile/column stacking for uniform-width items.
    Columns,
}

impl Packer {
    /// Resolves the strategy for a pool of items.
    pub fn select(items: &[UnitItem], kind: PackerKind) -> Self {
        match kind {
            PackerKind::FreeSpace => Packer::FreeSpace,
            PackerKind::Columns => Packer::Columns,
            PackerKind::Auto if has_uniform_width(items) => Packer::Columns,
            PackerKind::Auto => Packer::FreeSpace,
        }
    }

    /// Packs as many `items` as possible into one bin of type `bin`.
    pub fn pack(&self, bin: &BinType, items: &[UnitItem], options: &PackOptions) -> Trial {
        match self {
            Packer::FreeSpace => best_ordering(bin, items, options),
            Packer::Columns => pack_columns(bin, items, options),
        }
    }

    /// Shortest footprint length the strategy can give an item.
    fn footprint_length(&self, item: &UnitItem, options: &PackOptions) -> f64 {
        match self {
            Packer::Columns => item.dims.x,
            Packer::FreeSpace => {
                orientations(item.dims, options.lock_axes_fully, options.forbid_z_rotation)
                    .iter()
                    .map(|o| o.x)
                    .fold(f64::INFINITY, f64::min)
            }
        }
    }
}

/// Lexicographic trial score; higher is better.
fn score(objective: Objective, trial: &Trial, bin: &BinType) -> [f64; 3] {
    let placed = trial.placed_count() as f64;
    match objective {
        Objective::MinVans => [placed, trial.used_volume, -bin.cost],
        Objective::MinCost => {
            let divisor = if bin.cost > 0.0 { bin.cost } else { 1.0 };
            [trial.used_volume / divisor, placed, -bin.cost]
        }
    }
}

fn is_better(candidate: &[f64; 3], current: &[f64; 3]) -> bool {
    candidate
        .iter()
        .zip(current.iter())
        .map(|(a, b)| a.total_cmp(b))
        .find(|ord| ord.is_ne())
        .is_some_and(|ord| ord.is_gt())
}

/// Events emitted during a run, suitable for live progress streams.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum PackEvent {
    /// A bin was committed.
    BinCommitted {
        index: usize,
        code: String,
        name: String,
        placed: usize,
        fill_rate: f64,
        remaining: usize,
    },
    /// A group of items was given up on.
    ItemsRejected {
        count: usize,
        reason_code: String,
        reason_text: String,
    },
    /// The run finished.
    Finished {
        bins: usize,
        unplaced: usize,
        total_cost: f64,
    },
}

/// Packs item records into bins of the given catalog.
///
/// Records are expanded and normalized first; malformed records and
/// zero-dimension bin types are dropped silently.
pub fn pack_records(
    items: &[ItemRecord],
    bin_types: &[BinTypeRecord],
    options: &PackOptions,
) -> PackResult {
    pack(expand_items(items), build_catalog(bin_types), options)
}

/// Packs unit items into bins of the given catalog.
pub fn pack(items: Vec<UnitItem>, catalog: Vec<BinType>, options: &PackOptions) -> PackResult {
    pack_with_progress(items, catalog, options, |_| {})
}

/// Packs unit items and reports progress through `on_event`.
pub fn pack_with_progress(
    items: Vec<UnitItem>,
    catalog: Vec<BinType>,
    options: &PackOptions,
    mut on_event: impl FnMut(&PackEvent),
) -> PackResult {
    let (bins, unplaced) = allocate(items, &catalog, options, &mut on_event);
    let result = PackResult::new(bins, unplaced);
    on_event(&PackEvent::Finished {
        bins: result.stats.used_bins,
        unplaced: result.stats.unplaced_count,
        total_cost: result.stats.total_cost,
    });
    result
}

fn allocate(
    items: Vec<UnitItem>,
    catalog: &[BinType],
    options: &PackOptions,
    on_event: &mut impl FnMut(&PackEvent),
) -> (Vec<CommittedBin>, Vec<UnplacedItem>) {
    let mut committed: Vec<CommittedBin> = Vec::new();
    if items.is_empty() {
        return (committed, Vec::new());
    }
    if catalog.is_empty() {
        let unplaced = reject(items, catalog, options, UnplacedReason::DimensionsExceedBins, on_event);
        return (committed, unplaced);
    }

    let packer = Packer::select(&items, options.packer);
    let longest_bin = catalog.iter().map(|b| b.dims.x).fold(0.0, f64::max);
    if items
        .iter()
        .any(|item| packer.footprint_length(item, options) > longest_bin + EPSILON_GENERAL)
    {
        warn!(
            "⚠️ An item is longer than every bin type; rejecting all {} items",
            items.len()
        );
        let unplaced = reject(items, catalog, options, UnplacedReason::BatchRejected, on_event);
        return (committed, unplaced);
    }

    let mut pool = items;
    let mut trials: Vec<Trial> = catalog.iter().map(|bin| packer.pack(bin, &pool, options)).collect();

    // One bin taking the whole pool beats any accumulation: cheapest wins.
    let mut single: Option<usize> = None;
    for (idx, trial) in trials.iter().enumerate() {
        if trial.remaining.is_empty() && trial.placed_count() > 0 {
            let cheaper = single.is_none_or(|best| catalog[idx].cost < catalog[best].cost);
            if cheaper {
                single = Some(idx);
            }
        }
    }
    if let Some(idx) = single {
        debug!("Whole pool fits one '{}' bin", catalog[idx].code);
        let trial = trials.swap_remove(idx);
        commit(&mut committed, &catalog[idx], trial.placements, 0, on_event);
        return (committed, Vec::new());
    }

    let mut iterations = 0;
    loop {
        let mut best: Option<(usize, [f64; 3])> = None;
        for (idx, trial) in trials.iter().enumerate() {
            let key = score(options.objective, trial, &catalog[idx]);
            if best.as_ref().is_none_or(|(_, current)| is_better(&key, current)) {
                best = Some((idx, key));
            }
        }

        let Some((idx, _)) = best.filter(|(idx, _)| trials[*idx].placed_count() > 0) else {
            debug!("No bin type can take any of the {} remaining items", pool.len());
            break;
        };

        let trial = trials.swap_remove(idx);
        pool = trial.remaining;
        commit(&mut committed, &catalog[idx], trial.placements, pool.len(), on_event);

        if pool.is_empty() {
            return (committed, Vec::new());
        }
        iterations += 1;
        if iterations >= options.max_iterations {
            warn!(
                "⚠️ Iteration ceiling of {} reached with {} items left",
                options.max_iterations,
                pool.len()
            );
            break;
        }
        trials = catalog.iter().map(|bin| packer.pack(bin, &pool, options)).collect();
    }

    let unplaced = reject(pool, catalog, options, UnplacedReason::NoSpaceLeft, on_event);
    (committed, unplaced)
}

fn commit(
    committed: &mut Vec<CommittedBin>,
    bin: &BinType,
    placements: Vec<Placement>,
    remaining: usize,
    on_event: &mut impl FnMut(&PackEvent),
) {
    let bin = CommittedBin::new(bin.clone(), placements);
    debug!(
        "Committed bin #{} '{}' with {} items ({:.1}% full)",
        committed.len() + 1,
        bin.bin_type.code,
        bin.placed_count(),
        bin.fill_rate * 100.0
    );
    on_event(&PackEvent::BinCommitted {
        index: committed.len(),
        code: bin.bin_type.code.clone(),
        name: bin.bin_type.name.clone(),
        placed: bin.placed_count(),
        fill_rate: bin.fill_rate,
        remaining,
    });
    committed.push(bin);
}

/// Marks items unplaced, refining `fallback` per item where a sharper reason applies.
fn reject(
    items: Vec<UnitItem>,
    catalog: &[BinType],
    options: &PackOptions,
    fallback: UnplacedReason,
    on_event: &mut impl FnMut(&PackEvent),
) -> Vec<UnplacedItem> {
    let unplaced: Vec<UnplacedItem> = items
        .into_iter()
        .map(|item| {
            let reason = unfit_reason(&item, catalog, options).unwrap_or(fallback);
            UnplacedItem { item, reason }
        })
        .collect();

    let mut reasons: Vec<UnplacedReason> = Vec::new();
    for entry in &unplaced {
        if !reasons.contains(&entry.reason) {
            reasons.push(entry.reason);
        }
    }
    for reason in reasons {
        let count = unplaced.iter().filter(|u| u.reason == reason).count();
        on_event(&PackEvent::ItemsRejected {
            count,
            reason_code: reason.code().to_string(),
            reason_text: reason.to_string(),
        });
    }
    unplaced
}

/// Explains why an item can never fit, if it cannot.
fn unfit_reason(item: &UnitItem, catalog: &[BinType], options: &PackOptions) -> Option<UnplacedReason> {
    let fits_somewhere = catalog.iter().any(|bin| {
        let inner = Vec3::new(
            bin.dims.x - 2.0 * options.clearance,
            bin.dims.y - 2.0 * options.clearance,
            options.height_cap(bin),
        );
        orientations(item.dims, options.lock_axes_fully, options.forbid_z_rotation)
            .iter()
            .any(|o| o.fits_within(&inner, EPSILON_GENERAL))
    });
    if !fits_somewhere {
        return Some(UnplacedReason::DimensionsExceedBins);
    }
    if catalog.iter().all(|bin| !bin.accepts_weight(0.0, item.weight())) {
        return Some(UnplacedReason::TooHeavyForBins);
    }
    None
}
