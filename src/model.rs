//! Data models for the bin loading engine.
//!
//! This module defines the fundamental data structures:
//! - `ItemRecord` / `BinTypeRecord`: raw caller input, parsed leniently
//! - `UnitItem`: a single expanded item ready for packing
//! - `BinType`: a normalized catalog entry with interior dimensions and cost
//! - `Placement`: an item with its chosen orientation and origin inside a bin
//! - `CommittedBin`: a finished bin with fill-rate and weight accounting
//! - `PackResult`: the ordered bins, the unplaced items and summary stats

use serde::{Deserialize, Deserializer, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::types::{BoundingBox, Dimensional, EPSILON_GENERAL, Vec3, Weighted};

/// Validation error for requests and options.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("No usable bin type: {0}")]
    EmptyCatalog(String),
}

/// Reads a JSON number or a numeric string; everything else yields `None`.
fn number_from_value(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Lenient number: malformed or null values normalize to `0.0`.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value).unwrap_or(0.0))
}

/// Lenient optional number: malformed values and non-positive values become `None`.
fn lenient_positive_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(number_from_value)
        .filter(|v| *v > 0.0))
}

/// Lenient string: numbers are stringified, anything else becomes empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn default_type_tag() -> String {
    "item".to_string()
}

fn default_quantity() -> f64 {
    1.0
}

/// Raw item line as supplied by the caller (dimensions in inches).
///
/// `quantity` defaults to 1 when omitted. A present but malformed
/// quantity counts as zero, which excludes the line.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"type": "A", "length": 120.0, "width": 45.0, "height": 33.0, "quantity": 20}))]
pub struct ItemRecord {
    #[serde(rename = "type", alias = "id", default = "default_type_tag")]
    pub type_tag: String,
    #[serde(alias = "l", default, deserialize_with = "lenient_f64")]
    #[schema(value_type = f64)]
    pub length: f64,
    #[serde(alias = "w", default, deserialize_with = "lenient_f64")]
    #[schema(value_type = f64)]
    pub width: f64,
    #[serde(alias = "h", default, deserialize_with = "lenient_f64")]
    #[schema(value_type = f64)]
    pub height: f64,
    #[serde(alias = "wt", default, deserialize_with = "lenient_positive_opt_f64")]
    #[schema(value_type = Option<f64>)]
    pub weight: Option<f64>,
    #[serde(alias = "qty", default = "default_quantity", deserialize_with = "lenient_f64")]
    #[schema(value_type = f64)]
    pub quantity: f64,
}

impl ItemRecord {
    /// Creates a record with quantity 1 and no weight.
    pub fn new(type_tag: impl Into<String>, length: f64, width: f64, height: f64) -> Self {
        Self {
            type_tag: type_tag.into(),
            length,
            width,
            height,
            weight: None,
            quantity: 1.0,
        }
    }

    /// Sets the quantity (Builder pattern light).
    pub fn with_quantity(mut self, quantity: f64) -> Self {
        self.quantity = quantity;
        self
    }

    /// Sets the per-unit weight (Builder pattern light).
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight).filter(|w| *w > 0.0);
        self
    }

    fn dims(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }
}

/// Raw bin type as supplied by the caller.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"code": "48", "name": "Van 48'", "length": 576.0, "width": 100.0, "height": 96.0, "cost": 700.0}))]
pub struct BinTypeRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String)]
    pub code: String,
    #[serde(default, deserialize_with = "lenient_string")]
    #[schema(value_type = String)]
    pub name: String,
    #[serde(alias = "l", default, deserialize_with = "lenient_f64")]
    #[schema(value_type = f64)]
    pub length: f64,
    #[serde(alias = "w", default, deserialize_with = "lenient_f64")]
    #[schema(value_type = f64)]
    pub width: f64,
    #[serde(alias = "h", default, deserialize_with = "lenient_f64")]
    #[schema(value_type = f64)]
    pub height: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    #[schema(value_type = f64)]
    pub cost: f64,
    #[serde(default, deserialize_with = "lenient_positive_opt_f64")]
    #[schema(value_type = Option<f64>)]
    pub max_weight: Option<f64>,
}

impl BinTypeRecord {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        dims: (f64, f64, f64),
        cost: f64,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            length: dims.0,
            width: dims.1,
            height: dims.2,
            cost,
            max_weight: None,
        }
    }

    /// Sets the payload cap (Builder pattern light).
    pub fn with_max_weight(mut self, max_weight: f64) -> Self {
        self.max_weight = Some(max_weight).filter(|w| *w > 0.0);
        self
    }
}

/// A single unit item after expansion. Never split or mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitItem {
    /// `"{type}-{n}"`, unique within one run.
    pub id: String,
    pub type_tag: String,
    /// Original (length, width, height).
    pub dims: Vec3,
    pub weight: Option<f64>,
}

impl UnitItem {
    pub fn new(id: impl Into<String>, type_tag: impl Into<String>, dims: Vec3) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            dims,
            weight: None,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight).filter(|w| *w > 0.0);
        self
    }
}

impl Dimensional for UnitItem {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

impl Weighted for UnitItem {
    fn weight(&self) -> f64 {
        self.weight.unwrap_or(0.0)
    }
}

/// Upper bound on the number of unit items a single request may expand to.
pub const MAX_UNITS: usize = 100_000;

/// Quantity a record contributes, or `None` when the record is dropped.
fn record_quantity(record: &ItemRecord) -> Option<usize> {
    if !record.dims().is_valid_dimension() || !record.quantity.is_finite() {
        return None;
    }
    let quantity = record.quantity.trunc();
    // `as` saturates, so huge quantities land on usize::MAX
    (quantity >= 1.0).then_some(quantity as usize)
}

/// Number of unit items `expand_items` would produce without the cap.
pub fn unit_count(records: &[ItemRecord]) -> usize {
    records
        .iter()
        .filter_map(record_quantity)
        .fold(0usize, usize::saturating_add)
}

/// Expands item records into unit items.
///
/// Records with a non-positive dimension or quantity are silently dropped.
/// Fractional quantities are truncated. Expansion stops at [`MAX_UNITS`].
///
/// # Examples
/// ```
/// use pack_it_now::model::{ItemRecord, expand_items};
///
/// let units = expand_items(&[ItemRecord::new("A", 10.0, 5.0, 5.0).with_quantity(3.0)]);
/// assert_eq!(units.len(), 3);
/// assert_eq!(units[2].id, "A-3");
/// ```
pub fn expand_items(records: &[ItemRecord]) -> Vec<UnitItem> {
    let mut units = Vec::new();
    for record in records {
        let Some(quantity) = record_quantity(record) else {
            continue;
        };
        let budget = MAX_UNITS - units.len();
        if quantity > budget {
            warn!(
                "⚠️ Item type {} asks for {} units; expansion stops at {} units.",
                record.type_tag, quantity, MAX_UNITS
            );
        }
        for n in 1..=quantity.min(budget) {
            units.push(UnitItem {
                id: format!("{}-{}", record.type_tag, n),
                type_tag: record.type_tag.clone(),
                dims: record.dims(),
                weight: record.weight,
            });
        }
        if units.len() >= MAX_UNITS {
            break;
        }
    }
    units
}

/// A normalized bin type. Caller-supplied, never mutated.
#[derive(Clone, Debug, PartialEq)]
pub struct BinType {
    pub code: String,
    pub name: String,
    /// Interior (length, width, height).
    pub dims: Vec3,
    pub cost: f64,
    pub max_weight: Option<f64>,
}

impl BinType {
    /// Creates a bin type, `None` when any interior dimension is not positive.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        dims: Vec3,
        cost: f64,
    ) -> Option<Self> {
        if !dims.is_valid_dimension() {
            return None;
        }
        Some(Self {
            code: code.into(),
            name: name.into(),
            dims,
            cost: if cost.is_finite() { cost.max(0.0) } else { 0.0 },
            max_weight: None,
        })
    }

    pub fn with_max_weight(mut self, max_weight: f64) -> Self {
        self.max_weight = Some(max_weight).filter(|w| *w > 0.0);
        self
    }

    /// Normalizes a record; zero-dimension bin types are excluded.
    pub fn from_record(record: &BinTypeRecord) -> Option<Self> {
        let bin = Self::new(
            record.code.clone(),
            record.name.clone(),
            Vec3::new(record.length, record.width, record.height),
            record.cost,
        )?;
        Some(Self {
            max_weight: record.max_weight,
            ..bin
        })
    }

    /// Interior volume.
    pub fn volume(&self) -> f64 {
        self.dims.volume()
    }

    /// Checks whether an extra `weight` still fits under the payload cap.
    pub fn accepts_weight(&self, used: f64, weight: f64) -> bool {
        match self.max_weight {
            Some(cap) => used + weight <= cap + EPSILON_GENERAL,
            None => true,
        }
    }

    /// Interior as a bounding box anchored at the origin.
    pub fn interior(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(Vec3::zero(), self.dims)
    }
}

impl Dimensional for BinType {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

/// Normalizes a catalog, dropping zero-dimension entries.
pub fn build_catalog(records: &[BinTypeRecord]) -> Vec<BinType> {
    records.iter().filter_map(BinType::from_record).collect()
}

/// An item placed inside a bin.
///
/// `dims` is the chosen orientation, which may differ from `item.dims`.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub item: UnitItem,
    pub position: Vec3,
    pub dims: Vec3,
}

impl Placement {
    pub fn new(item: UnitItem, position: Vec3, dims: Vec3) -> Self {
        Self {
            item,
            position,
            dims,
        }
    }

    /// Returns the top Z coordinate of the placed item.
    pub fn top_z(&self) -> f64 {
        self.position.z + self.dims.z
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.dims)
    }
}

impl Dimensional for Placement {
    fn dimensions(&self) -> Vec3 {
        self.dims
    }
}

impl Weighted for Placement {
    fn weight(&self) -> f64 {
        self.item.weight()
    }
}

/// A finished bin. Immutable once created.
#[derive(Clone, Debug, PartialEq)]
pub struct CommittedBin {
    pub bin_type: BinType,
    pub placements: Vec<Placement>,
    /// Placed volume over interior volume, within `[0, 1]`.
    pub fill_rate: f64,
    /// Sum of placed weights; `None` when no placed item carries a weight.
    pub weight_used: Option<f64>,
}

impl CommittedBin {
    /// Commits placements to a bin and derives the fill/weight accounting.
    pub fn new(bin_type: BinType, placements: Vec<Placement>) -> Self {
        let used_volume: f64 = placements.iter().map(|p| p.volume()).sum();
        let total = bin_type.volume();
        let fill_rate = if total > 0.0 {
            (used_volume / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let weight_used = if placements.iter().any(|p| p.item.weight.is_some()) {
            Some(placements.iter().map(|p| p.weight()).sum())
        } else {
            None
        };
        Self {
            bin_type,
            placements,
            fill_rate,
            weight_used,
        }
    }

    pub fn placed_count(&self) -> usize {
        self.placements.len()
    }

    pub fn used_volume(&self) -> f64 {
        self.placements.iter().map(|p| p.volume()).sum()
    }
}

/// An item that could not be placed, with the reason.
#[derive(Clone, Debug, PartialEq)]
pub struct UnplacedItem {
    pub item: UnitItem,
    pub reason: UnplacedReason,
}

/// Reasons why an item could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnplacedReason {
    DimensionsExceedBins,
    TooHeavyForBins,
    BatchRejected,
    NoSpaceLeft,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::DimensionsExceedBins => "dimensions_exceed_bins",
            UnplacedReason::TooHeavyForBins => "too_heavy_for_bins",
            UnplacedReason::BatchRejected => "batch_rejected",
            UnplacedReason::NoSpaceLeft => "no_space_left",
        }
    }
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::DimensionsExceedBins => {
                write!(f, "Item does not fit any bin type in any allowed orientation")
            }
            UnplacedReason::TooHeavyForBins => {
                write!(f, "Item exceeds the payload limit of every bin type")
            }
            UnplacedReason::BatchRejected => write!(
                f,
                "Batch rejected: an item is longer than every bin type"
            ),
            UnplacedReason::NoSpaceLeft => {
                write!(f, "No bin type could take the item in the remaining runs")
            }
        }
    }
}

/// Summary statistics of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PackStats {
    pub used_bins: usize,
    pub total_cost: f64,
    pub unplaced_count: usize,
}

/// Result of a packing run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackResult {
    pub bins: Vec<CommittedBin>,
    pub unplaced: Vec<UnplacedItem>,
    pub stats: PackStats,
}

impl PackResult {
    /// Builds a result and derives its stats.
    pub fn new(bins: Vec<CommittedBin>, unplaced: Vec<UnplacedItem>) -> Self {
        let stats = PackStats {
            used_bins: bins.len(),
            total_cost: bins.iter().map(|b| b.bin_type.cost).sum(),
            unplaced_count: unplaced.len(),
        };
        Self {
            bins,
            unplaced,
            stats,
        }
    }

    /// Indicates whether every item was placed.
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn placed_count(&self) -> usize {
        self.bins.iter().map(|b| b.placed_count()).sum()
    }

    /// Mean fill-rate over all committed bins.
    pub fn average_fill_rate(&self) -> f64 {
        if self.bins.is_empty() {
            return 0.0;
        }
        self.bins.iter().map(|b| b.fill_rate).sum::<f64>() / self.bins.len() as f64
    }

    /// Total placed weight over all bins.
    pub fn total_weight(&self) -> f64 {
        self.bins.iter().filter_map(|b| b.weight_used).sum()
    }
}
